//! The HTML tag handler.
//!
//! A tag opening is its own little state machine: the name, then any
//! number of attributes, each with optional `=`, optional quoting, and
//! three independent whitespace paddings, and finally `>` or `/>`. Quoted
//! attribute values open nested frames so templates, links, comments, and
//! entities parse inside them; everything rolls back to a literal `<` when
//! the opening never completes.

use super::{Context, Error, Route, Run, Unwind, is_marker};
use crate::tokens::Token;

/// The position inside a tag opening.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct TagState(u8);

impl TagState {
    /// Before the first character of the tag name.
    const NAME: TagState = TagState(1 << 0);
    /// Between attributes, after whitespace.
    const ATTR_READY: TagState = TagState(1 << 1);
    /// Inside an attribute name.
    const ATTR_NAME: TagState = TagState(1 << 2);
    /// Inside an attribute value.
    const ATTR_VALUE: TagState = TagState(1 << 3);
    /// The attribute value is quoted.
    const QUOTED: TagState = TagState(1 << 4);
    /// The next attribute requires whitespace first; set after the tag
    /// name and after a closing quote.
    const NOTE_SPACE: TagState = TagState(1 << 5);
    /// Whitespace followed the attribute name, so a bare `=` would belong
    /// to it.
    const NOTE_EQUALS: TagState = TagState(1 << 6);
    /// The next character may open a quoted value.
    const NOTE_QUOTE: TagState = TagState(1 << 7);

    #[inline]
    fn intersects(self, other: TagState) -> bool {
        self.0 & other.0 != 0
    }
}

impl core::ops::BitOr for TagState {
    type Output = TagState;

    #[inline]
    fn bitor(self, rhs: TagState) -> TagState {
        TagState(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for TagState {
    #[inline]
    fn bitor_assign(&mut self, rhs: TagState) {
        self.0 |= rhs.0;
    }
}

impl core::ops::SubAssign for TagState {
    #[inline]
    fn sub_assign(&mut self, rhs: TagState) {
        self.0 &= !rhs.0;
    }
}

/// Working data for one tag opening.
struct TagOpenData {
    state: TagState,
    /// Whitespace before the pending attribute's name.
    pad_first: String,
    /// Whitespace between the pending attribute's name and its `=`.
    pad_before_eq: String,
    /// Whitespace between the `=` and the value.
    pad_after_eq: String,
    /// The quote character wrapping the pending value.
    quoter: Option<char>,
    /// Where to rewind when an unclosed quote is retried as unquoted.
    reset: usize,
}

impl TagOpenData {
    fn new(reset: usize) -> Self {
        Self {
            state: TagState::NAME,
            pad_first: String::new(),
            pad_before_eq: String::new(),
            pad_after_eq: String::new(),
            quoter: None,
            reset,
        }
    }

    /// The padding run the current whitespace belongs to.
    fn pad_mut(&mut self) -> &mut String {
        if self.state.intersects(TagState::NOTE_EQUALS) {
            &mut self.pad_before_eq
        } else if self.state.intersects(TagState::ATTR_VALUE) {
            &mut self.pad_after_eq
        } else {
            &mut self.pad_first
        }
    }
}

impl Run<'_> {
    /// A `<` followed by anything that could be a tag.
    pub(super) fn parse_tag(&mut self) -> Route<()> {
        let reset = self.head;
        self.head += 1;
        match self.really_parse_tag() {
            Ok(tag) => {
                self.emit_all(tag);
                Ok(())
            }
            Err(Unwind::BadRoute(_)) => {
                self.head = reset;
                self.emit_char('<');
                Ok(())
            }
            Err(fatal) => Err(fatal),
        }
    }

    /// Parses a whole tag starting just past the `<`.
    fn really_parse_tag(&mut self) -> Route<Vec<Token>> {
        let mut data = TagOpenData::new(self.head);
        self.push(Context::TAG_OPEN)?;
        self.emit(Token::TagOpenOpen { wiki_markup: None });
        loop {
            let this = self.read();
            let next = self.read_ahead(1);
            let can_exit = !data.state.intersects(TagState::QUOTED | TagState::NAME)
                || data.state.intersects(TagState::NOTE_SPACE);
            match this {
                None => {
                    if self.context().intersects(Context::TAG_ATTR) {
                        if data.state.intersects(TagState::QUOTED) {
                            // unclosed quote: retry the value as unquoted
                            data.state = TagState::ATTR_VALUE;
                            self.pop();
                            self.head = data.reset;
                            continue;
                        }
                        self.pop();
                    }
                    return Err(self.fail_route());
                }
                Some('>') if can_exit => {
                    self.handle_tag_close_open(&mut data, false)?;
                    self.set_context(Context::TAG_BODY);
                    let Some(name) = self.open_tag_name() else {
                        return Err(Unwind::Fatal(Error::Internal("tag frame missing a name")));
                    };
                    if self.config.single_only_tags.contains(name.as_str()) {
                        return self.handle_single_only_tag_end();
                    }
                    if self.config.raw_text_tags.contains(name.as_str()) {
                        return self.handle_raw_text_tag();
                    }
                    return self.parse(Context::default(), false);
                }
                Some('/') if next == Some('>') && can_exit => {
                    self.handle_tag_close_open(&mut data, true)?;
                    return Ok(self.pop());
                }
                Some(c) => self.handle_tag_data(&mut data, c)?,
            }
            self.head += 1;
        }
    }

    /// One character between `<` and `>`.
    fn handle_tag_data(&mut self, data: &mut TagOpenData, text: char) -> Route<()> {
        let state = data.state;
        if state.intersects(TagState::NAME) {
            // tags must start with text, not markup or spaces
            if is_marker(text) || text.is_whitespace() {
                return Err(self.fail_route());
            }
            data.state = TagState::NOTE_SPACE;
            self.handle_tag_text(text)?;
        } else if text.is_whitespace() {
            self.handle_tag_space(data, text)?;
        } else if state.intersects(TagState::NOTE_SPACE) {
            if state.intersects(TagState::QUOTED) {
                // a character directly after a closing quote: the quote
                // was not a delimiter after all, so retry unquoted
                data.state = TagState::ATTR_VALUE;
                self.pop();
                self.head = data.reset - 1; // the loop advances back onto it
            } else if is_marker(text) {
                return Err(self.fail_route());
            } else {
                // still the tag name
                self.handle_tag_text(text)?;
            }
        } else if state.intersects(TagState::ATTR_READY) {
            data.state = TagState::ATTR_NAME;
            self.push(Context::TAG_ATTR)?;
            self.handle_tag_text(text)?;
        } else if state.intersects(TagState::ATTR_NAME) {
            if text == '=' {
                data.state = TagState::ATTR_VALUE | TagState::NOTE_QUOTE;
                self.emit(Token::TagAttrEquals);
                return Ok(());
            }
            if state.intersects(TagState::NOTE_EQUALS) {
                // a new attribute started without an `=`
                self.push_tag_buffer(data)?;
                data.state = TagState::ATTR_NAME;
                self.push(Context::TAG_ATTR)?;
            }
            self.handle_tag_text(text)?;
        } else if state.intersects(TagState::ATTR_VALUE) {
            let escaped =
                self.read_back(1) == Some('\\') && self.read_back(2) != Some('\\');
            if state.intersects(TagState::NOTE_QUOTE) {
                data.state -= TagState::NOTE_QUOTE;
                if matches!(text, '"' | '\'') && !escaped {
                    data.state |= TagState::QUOTED;
                    data.quoter = Some(text);
                    data.reset = self.head;
                    self.push(self.context())?;
                    return Ok(());
                }
            } else if state.intersects(TagState::QUOTED) {
                if Some(text) == data.quoter && !escaped {
                    data.state |= TagState::NOTE_SPACE;
                    return Ok(());
                }
            }
            self.handle_tag_text(text)?;
        } else {
            return Err(Unwind::Fatal(Error::Internal("tag open state broken")));
        }
        Ok(())
    }

    /// Whitespace between `<` and `>`, routed into the right padding run.
    fn handle_tag_space(&mut self, data: &mut TagOpenData, text: char) -> Route<()> {
        let state = data.state;
        let end_of_value = state.intersects(TagState::ATTR_VALUE)
            && !state.intersects(TagState::QUOTED | TagState::NOTE_QUOTE);
        if end_of_value
            || (state.intersects(TagState::QUOTED) && state.intersects(TagState::NOTE_SPACE))
        {
            self.push_tag_buffer(data)?;
            data.state = TagState::ATTR_READY;
        } else if state.intersects(TagState::NOTE_SPACE) {
            data.state = TagState::ATTR_READY;
        } else if state.intersects(TagState::ATTR_NAME) {
            data.state |= TagState::NOTE_EQUALS;
        }
        if state.intersects(TagState::QUOTED) && !state.intersects(TagState::NOTE_SPACE) {
            // whitespace inside a quoted value is value text
            self.handle_tag_text(text)?;
        } else {
            data.pad_mut().push(text);
        }
        Ok(())
    }

    /// Regular text inside a tag opening, which may itself nest markup.
    fn handle_tag_text(&mut self, text: char) -> Route<()> {
        let next = self.read_ahead(1);
        if !self.can_recurse() || !is_marker(text) {
            self.emit_char(text);
        } else if text == '{' && next == Some('{') {
            self.parse_template_or_argument()?;
        } else if text == '[' && next == Some('[') {
            self.parse_wikilink()?;
        } else if text == '<'
            && next == Some('!')
            && self.read_ahead(2) == Some('-')
            && self.read_ahead(3) == Some('-')
        {
            self.parse_comment()?;
        } else if text == '<' {
            self.parse_tag()?;
        } else if text == '&' {
            self.parse_entity()?;
        } else {
            self.emit_char(text);
        }
        Ok(())
    }

    /// Flushes the pending attribute into the tag frame.
    fn push_tag_buffer(&mut self, data: &mut TagOpenData) -> Route<()> {
        if data.state.intersects(TagState::QUOTED) {
            let Some(quote) = data.quoter else {
                return Err(Unwind::Fatal(Error::Internal("quoted value missing quoter")));
            };
            self.emit_first(Token::TagAttrQuote { quote });
            let stack = self.pop();
            self.emit_all(stack);
        }
        self.emit_first(Token::TagAttrStart {
            pad_first: core::mem::take(&mut data.pad_first),
            pad_before_eq: core::mem::take(&mut data.pad_before_eq),
            pad_after_eq: core::mem::take(&mut data.pad_after_eq),
        });
        let stack = self.pop();
        self.emit_all(stack);
        data.reset = self.head;
        Ok(())
    }

    /// The `>` or `/>` ending a tag opening.
    fn handle_tag_close_open(&mut self, data: &mut TagOpenData, selfclose: bool) -> Route<()> {
        if data
            .state
            .intersects(TagState::ATTR_NAME | TagState::ATTR_VALUE)
        {
            self.push_tag_buffer(data)?;
        }
        let padding = Some(core::mem::take(&mut data.pad_first));
        if selfclose {
            self.emit(Token::TagCloseSelfclose {
                padding,
                implicit: false,
                wiki_markup: None,
            });
        } else {
            self.emit(Token::TagCloseOpen {
                padding,
                wiki_markup: None,
            });
        }
        self.head += 1;
        Ok(())
    }

    /// A tag like `<br>` closes as soon as its opening ends.
    fn handle_single_only_tag_end(&mut self) -> Route<Vec<Token>> {
        let Some(Token::TagCloseOpen { padding, .. }) = self.frame_mut().tokens.pop() else {
            return Err(Unwind::Fatal(Error::Internal(
                "single-only tag missing its close-open",
            )));
        };
        self.emit(Token::TagCloseSelfclose {
            padding,
            implicit: true,
            wiki_markup: None,
        });
        self.head -= 1;
        Ok(self.pop())
    }

    /// The input ended inside a tag that supports implicit closure; its
    /// `>` becomes a self-close.
    pub(super) fn handle_single_tag_end(&mut self) -> Route<Vec<Token>> {
        self.push_textbuffer();
        let frame = self.frame_mut();
        let mut depth = 0i32;
        let mut found = None;
        for (index, token) in frame.tokens.iter().enumerate() {
            match token {
                Token::TagOpenOpen { .. } => depth += 1,
                Token::TagCloseOpen { .. } => {
                    depth -= 1;
                    if depth == 0 {
                        found = Some(index);
                        break;
                    }
                }
                Token::TagCloseSelfclose { .. } => depth -= 1,
                _ => {}
            }
        }
        let Some(index) = found else {
            return Err(Unwind::Fatal(Error::Internal(
                "single tag missing its close-open",
            )));
        };
        if let Token::TagCloseOpen { padding, .. } = &frame.tokens[index] {
            frame.tokens[index] = Token::TagCloseSelfclose {
                padding: padding.clone(),
                implicit: true,
                wiki_markup: None,
            };
        }
        Ok(self.pop())
    }

    /// The body of a tag like `<nowiki>`: raw text up to the closing tag.
    fn handle_raw_text_tag(&mut self) -> Route<Vec<Token>> {
        loop {
            match self.read() {
                None => return Err(self.fail_route()),
                Some('<') if self.read_ahead(1) == Some('/') => {
                    self.handle_tag_open_close()?;
                    self.head += 1;
                    return self.parse(Context::default(), false);
                }
                Some(c) => {
                    self.emit_char(c);
                    self.head += 1;
                }
            }
        }
    }

    /// The `</` opening a closing tag.
    pub(super) fn handle_tag_open_close(&mut self) -> Route<()> {
        self.emit(Token::TagOpenClose);
        self.push(Context::TAG_CLOSE)?;
        self.head += 1;
        Ok(())
    }

    /// The `>` ending a closing tag. The route fails unless the closing
    /// name matches the open name.
    pub(super) fn handle_tag_close_close(&mut self) -> Route<Vec<Token>> {
        let closing = self.pop();
        let valid = match closing.as_slice() {
            [Token::Text { text }] => self
                .open_tag_name()
                .is_some_and(|name| name == text.trim_end().to_ascii_lowercase()),
            _ => false,
        };
        if !valid {
            return Err(self.fail_route());
        }
        self.emit_all(closing);
        self.emit(Token::TagCloseClose);
        Ok(self.pop())
    }
}
