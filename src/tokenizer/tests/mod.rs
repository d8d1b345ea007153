use crate::helpers::compose;
use crate::tokens::{HeadingLevel, Token};

mod properties;
mod styles_lists;
mod tags;
mod wikilinks;

/// Tokenizes `input` and checks the universal invariants every stream
/// must satisfy: exact source round-trip, no adjacent text tokens, no
/// empty text tokens.
#[track_caller]
pub(super) fn run(input: &str) -> Vec<Token> {
    let _ = env_logger::try_init();
    let tokens = crate::tokenize(input).unwrap();
    assert_eq!(compose(&tokens), input, "token stream does not round-trip");
    for pair in tokens.windows(2) {
        assert!(
            !matches!(pair, [Token::Text { .. }, Token::Text { .. }]),
            "adjacent text tokens: {pair:?}"
        );
    }
    for token in &tokens {
        if let Token::Text { text } = token {
            assert!(!text.is_empty(), "empty text token");
        }
    }
    tokens
}

pub(super) fn text(text: &str) -> Token {
    Token::text(text)
}

pub(super) fn ext_open(brackets: bool) -> Token {
    Token::ExternalLinkOpen { brackets }
}

pub(super) fn heading_start(level: u8) -> Token {
    Token::HeadingStart {
        level: HeadingLevel::try_from(level).unwrap(),
    }
}

pub(super) fn numeric(hexadecimal: bool) -> Token {
    Token::HTMLEntityNumeric { hexadecimal }
}

/// A plain `<`-opened tag.
pub(super) fn tag_open() -> Token {
    Token::TagOpenOpen { wiki_markup: None }
}

/// A tag synthesized from wiki markup.
pub(super) fn markup_open(markup: &str) -> Token {
    Token::TagOpenOpen {
        wiki_markup: Some(markup.into()),
    }
}

pub(super) fn attr_start(pad_first: &str, pad_before_eq: &str, pad_after_eq: &str) -> Token {
    Token::TagAttrStart {
        pad_first: pad_first.into(),
        pad_before_eq: pad_before_eq.into(),
        pad_after_eq: pad_after_eq.into(),
    }
}

pub(super) fn quote(quote: char) -> Token {
    Token::TagAttrQuote { quote }
}

pub(super) fn close_open(padding: &str) -> Token {
    Token::TagCloseOpen {
        padding: Some(padding.into()),
        wiki_markup: None,
    }
}

/// The bodyless close-open of a wiki-markup style tag.
pub(super) fn style_close_open() -> Token {
    Token::TagCloseOpen {
        padding: None,
        wiki_markup: None,
    }
}

pub(super) fn selfclose(padding: &str, implicit: bool) -> Token {
    Token::TagCloseSelfclose {
        padding: Some(padding.into()),
        implicit,
        wiki_markup: None,
    }
}

/// The selfclose of a wiki-markup tag (list markers, rules).
pub(super) fn markup_selfclose() -> Token {
    Token::TagCloseSelfclose {
        padding: None,
        implicit: false,
        wiki_markup: None,
    }
}
