//! Token-stream helpers.

use crate::tokens::Token;

/// Pending state for one tag attribute while composing.
#[derive(Default)]
struct AttrState {
    pad_before_eq: String,
    pad_after_eq: String,
    seen_equals: bool,
    quote: Option<char>,
}

/// Reassembles the original wikitext from a token stream.
///
/// Structural tokens have fixed source spans, but a few spans depend on
/// surrounding tokens: an `ExternalLinkClose` spans `]` only for a
/// bracketed link, the synthetic tag names of wiki-markup tags span
/// nothing, and attribute paddings and quotes sit between their
/// neighbors. This walker tracks exactly that state, so that for every
/// input `s`, `compose(&tokenize(s)?) == s`.
#[must_use]
pub fn compose(tokens: &[Token]) -> String {
    let mut out = String::new();
    // per open construct: external link bracketing, heading levels, and
    // the wiki markup (if any) of open tags
    let mut ext_links: Vec<bool> = Vec::new();
    let mut headings: Vec<u8> = Vec::new();
    let mut tags: Vec<Option<String>> = Vec::new();
    let mut attr: Option<AttrState> = None;
    // the next text token is a synthetic wiki-markup tag name
    let mut skip_text = false;

    // an attribute's trailing pieces only render once its extent is known
    fn finish_attr(out: &mut String, attr: &mut Option<AttrState>) {
        if let Some(state) = attr.take() {
            if let Some(quote) = state.quote {
                out.push(quote);
            }
            if !state.seen_equals {
                out.push_str(&state.pad_before_eq);
            }
        }
    }

    for token in tokens {
        match token {
            Token::Text { text } => {
                if skip_text {
                    skip_text = false;
                } else {
                    out.push_str(text);
                }
            }
            Token::TemplateOpen => out.push_str("{{"),
            Token::TemplateParamSeparator => out.push('|'),
            Token::TemplateParamEquals => out.push('='),
            Token::TemplateClose => out.push_str("}}"),
            Token::ArgumentOpen => out.push_str("{{{"),
            Token::ArgumentSeparator => out.push('|'),
            Token::ArgumentClose => out.push_str("}}}"),
            Token::WikilinkOpen => out.push_str("[["),
            Token::WikilinkSeparator => out.push('|'),
            Token::WikilinkClose => out.push_str("]]"),
            Token::ExternalLinkOpen { brackets } => {
                if *brackets {
                    out.push('[');
                }
                ext_links.push(*brackets);
            }
            Token::ExternalLinkSeparator => out.push(' '),
            Token::ExternalLinkClose => {
                if ext_links.pop().unwrap_or(false) {
                    out.push(']');
                }
            }
            Token::HeadingStart { level } => {
                let level = u8::from(*level);
                out.push_str(&"=".repeat(usize::from(level)));
                headings.push(level);
            }
            Token::HeadingEnd => {
                let level = headings.pop().unwrap_or(0);
                out.push_str(&"=".repeat(usize::from(level)));
            }
            Token::CommentStart => out.push_str("<!--"),
            Token::CommentEnd => out.push_str("-->"),
            Token::HTMLEntityStart => out.push('&'),
            Token::HTMLEntityNumeric { hexadecimal } => {
                out.push_str(if *hexadecimal { "#x" } else { "#" });
            }
            Token::HTMLEntityEnd => out.push(';'),
            Token::TagOpenOpen { wiki_markup } => {
                match wiki_markup {
                    Some(markup) => {
                        out.push_str(markup);
                        skip_text = true;
                    }
                    None => out.push('<'),
                }
                tags.push(wiki_markup.clone());
            }
            Token::TagAttrStart { pad_first, pad_before_eq, pad_after_eq } => {
                finish_attr(&mut out, &mut attr);
                out.push_str(pad_first);
                attr = Some(AttrState {
                    pad_before_eq: pad_before_eq.clone(),
                    pad_after_eq: pad_after_eq.clone(),
                    ..AttrState::default()
                });
            }
            Token::TagAttrEquals => {
                if let Some(state) = attr.as_mut() {
                    out.push_str(&state.pad_before_eq);
                    out.push('=');
                    out.push_str(&state.pad_after_eq);
                    state.seen_equals = true;
                } else {
                    out.push('=');
                }
            }
            Token::TagAttrQuote { quote } => {
                out.push(*quote);
                if let Some(state) = attr.as_mut() {
                    state.quote = Some(*quote);
                }
            }
            Token::TagCloseOpen { padding, .. } => {
                finish_attr(&mut out, &mut attr);
                if let Some(padding) = padding {
                    out.push_str(padding);
                    out.push('>');
                }
            }
            Token::TagCloseSelfclose { padding, implicit, .. } => {
                finish_attr(&mut out, &mut attr);
                if tags.pop().flatten().is_none() {
                    out.push_str(padding.as_deref().unwrap_or(""));
                    out.push_str(if *implicit { ">" } else { "/>" });
                }
            }
            Token::TagOpenClose => match tags.last().cloned().flatten() {
                Some(markup) => {
                    out.push_str(&markup);
                    skip_text = true;
                }
                None => out.push_str("</"),
            },
            Token::TagCloseClose => {
                if tags.pop().flatten().is_none() {
                    out.push('>');
                }
            }
        }
    }
    out
}
