//! The tokenizer core.
//!
//! Wikitext is not context-free: whether `{{` opens a template depends on
//! whether a `}}` is reachable under the rules of every enclosing
//! construct. The tokenizer therefore parses speculatively. Each candidate
//! construct opens a [`Frame`] holding its own token accumulator and text
//! buffer; when the construct cannot be closed validly, the frame is
//! discarded, the cursor rewinds to the opener, and the opener is emitted
//! as literal text so the interior is re-scanned in the parent context.
//! This makes the round-trip invariant hold by construction.

mod contexts;
mod tag;
#[cfg(test)]
mod tests;

use crate::{
    config::{self, Configuration},
    tokens::{HeadingLevel, Token},
};
use contexts::Context;

/// A tokenization error.
///
/// Malformed markup is never an error; it rolls back to literal text. The
/// only failure surfaces are resource exhaustion and internal
/// inconsistencies.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The frame stack hit the hard ceiling.
    #[error("frame stack exceeded {limit} frames")]
    DepthExceeded {
        /// The ceiling that was hit.
        limit: usize,
    },
    /// The tokenizer caught itself in an impossible state. This does not
    /// mean the wikitext was invalid; it indicates a bug.
    #[error("tokenizer reached an impossible state: {0}")]
    Internal(&'static str),
}

/// The hard frame-stack ceiling. The recursion gates in
/// [`Configuration::max_depth`] keep real inputs well below this; reaching
/// it fails the invocation with [`Error::DepthExceeded`].
const STACK_CEILING: usize = 100;

/// Characters which can start or delimit markup. Everything else takes the
/// plain-text fast path.
const MARKERS: &str = "{}[]<>|=&'#*;:/\\\"-!\n";

#[inline]
fn is_marker(c: char) -> bool {
    MARKERS.contains(c)
}

/// The reason a parse route stopped short.
enum Unwind {
    /// The current speculative route cannot produce a valid construct. The
    /// failing frame has been discarded; its final context rides along for
    /// the style handlers.
    BadRoute(Context),
    /// Resource exhaustion or an internal inconsistency. Aborts the whole
    /// invocation; never caught by a handler.
    Fatal(Error),
}

type Route<T> = Result<T, Unwind>;

/// One in-progress parse of a single construct.
struct Frame {
    /// Tokens emitted into this frame so far.
    tokens: Vec<Token>,
    /// An in-progress run of literal characters, coalesced into a single
    /// [`Token::Text`] when the next structural token is emitted or the
    /// frame ends.
    textbuffer: String,
    /// The contexts this frame is inside.
    context: Context,
}

/// A wikitext tokenizer.
#[derive(Clone, Copy, Debug)]
pub struct Tokenizer<'a> {
    /// The configuration for the tokenizer.
    config: &'a Configuration,
}

impl<'a> Tokenizer<'a> {
    /// Creates a new tokenizer with the given configuration.
    #[must_use]
    pub fn new(config: &'a Configuration) -> Self {
        Self { config }
    }

    /// Tokenizes `source` into a flat token stream.
    ///
    /// Ill-formed markup becomes literal text, never an error; the only
    /// failures are resource exhaustion and internal bugs.
    pub fn tokenize(&self, source: &str) -> Result<Vec<Token>, Error> {
        let mut run = Run {
            config: self.config,
            text: source.chars().collect(),
            head: 0,
            frames: Vec::new(),
            cycles: 0,
            in_heading: false,
            heading_level: None,
        };
        match run.parse(Context::default(), true) {
            Ok(tokens) => Ok(tokens),
            // The bottom frame has no closer to find, so a route failure
            // cannot legitimately reach the top.
            Err(Unwind::BadRoute(_)) => Err(Error::Internal("top-level route failed")),
            Err(Unwind::Fatal(error)) => Err(error),
        }
    }
}

/// The state of a single tokenization.
pub(crate) struct Run<'a> {
    config: &'a Configuration,
    /// The input, one slot per code point so the dispatcher can look
    /// behind and ahead in constant time.
    text: Vec<char>,
    /// The cursor. Handlers leave it on the last character they consumed;
    /// the dispatcher advances it once per iteration.
    head: usize,
    /// The frame stack: suspended parents below, current parse on top.
    frames: Vec<Frame>,
    /// Total frames pushed this invocation, gating pathological
    /// backtracking.
    cycles: usize,
    /// A heading line is being parsed somewhere below; no new heading may
    /// start.
    in_heading: bool,
    /// The level produced by the most recently completed heading route.
    heading_level: Option<HeadingLevel>,
}

impl Run<'_> {
    #[inline]
    fn read(&self) -> Option<char> {
        self.text.get(self.head).copied()
    }

    #[inline]
    fn read_ahead(&self, offset: usize) -> Option<char> {
        self.text.get(self.head + offset).copied()
    }

    /// Reads behind the cursor; `None` is the start of input.
    #[inline]
    fn read_back(&self, offset: usize) -> Option<char> {
        self.head
            .checked_sub(offset)
            .and_then(|index| self.text.get(index))
            .copied()
    }

    #[inline]
    fn at_line_start(&self) -> bool {
        matches!(self.read_back(1), None | Some('\n'))
    }

    #[inline]
    fn frame(&self) -> &Frame {
        self.frames.last().expect("frame stack empty")
    }

    #[inline]
    fn frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("frame stack empty")
    }

    #[inline]
    fn context(&self) -> Context {
        self.frame().context
    }

    #[inline]
    fn set_context(&mut self, context: Context) {
        self.frame_mut().context = context;
    }

    #[inline]
    fn add_context(&mut self, flags: Context) {
        self.frame_mut().context |= flags;
    }

    #[inline]
    fn del_context(&mut self, flags: Context) {
        self.frame_mut().context -= flags;
    }

    /// Whether a new nested construct may be speculated, or openers should
    /// degrade to literal text instead.
    #[inline]
    fn can_recurse(&self) -> bool {
        self.frames.len() < self.config.max_depth && self.cycles < self.config.max_cycles
    }

    /// Opens a new frame for a speculative parse.
    fn push(&mut self, context: Context) -> Route<()> {
        if self.frames.len() >= STACK_CEILING {
            return Err(Unwind::Fatal(Error::DepthExceeded {
                limit: STACK_CEILING,
            }));
        }
        self.cycles += 1;
        self.frames.push(Frame {
            tokens: Vec::new(),
            textbuffer: String::new(),
            context,
        });
        Ok(())
    }

    /// Flushes the text buffer into a single text token.
    fn push_textbuffer(&mut self) {
        let frame = self.frame_mut();
        if !frame.textbuffer.is_empty() {
            let text = core::mem::take(&mut frame.textbuffer);
            frame.tokens.push(Token::text(text));
        }
    }

    /// Closes the current frame, returning its tokens.
    fn pop(&mut self) -> Vec<Token> {
        self.push_textbuffer();
        self.frames.pop().expect("frame stack empty").tokens
    }

    /// Abandons the current route, discarding its frame.
    fn fail_route(&mut self) -> Unwind {
        let context = self.context();
        let trash = self.pop();
        log::trace!(
            "route failed at {} in {context:?}, dropping {} tokens",
            self.head,
            trash.len(),
        );
        Unwind::BadRoute(context)
    }

    fn emit(&mut self, token: Token) {
        self.push_textbuffer();
        self.frame_mut().tokens.push(token);
    }

    fn emit_first(&mut self, token: Token) {
        self.push_textbuffer();
        self.frame_mut().tokens.insert(0, token);
    }

    #[inline]
    fn emit_char(&mut self, c: char) {
        self.frame_mut().textbuffer.push(c);
    }

    #[inline]
    fn emit_text(&mut self, text: &str) {
        self.frame_mut().textbuffer.push_str(text);
    }

    /// Appends a popped frame's tokens. A leading text token merges into
    /// the buffer so adjacent text always coalesces.
    fn emit_all(&mut self, tokens: Vec<Token>) {
        let mut tokens = tokens.into_iter();
        match tokens.next() {
            Some(Token::Text { text }) => self.emit_text(&text),
            Some(other) => {
                self.push_textbuffer();
                self.frame_mut().tokens.push(other);
            }
            None => {}
        }
        self.push_textbuffer();
        self.frame_mut().tokens.extend(tokens);
    }

    /// Pops the current frame and re-emits it behind literal `text`, used
    /// when a brace run cannot be consumed completely.
    fn emit_text_then_stack(&mut self, text: &str) {
        let stack = self.pop();
        self.emit_text(text);
        if !stack.is_empty() {
            self.emit_all(stack);
        }
        self.head -= 1;
    }

    /// Removes the trailing `len` bytes from the pending text buffer, used
    /// to move a bare URL's scheme into its link frame.
    fn trim_textbuffer(&mut self, len: usize) {
        let frame = self.frame_mut();
        let keep = frame.textbuffer.len().saturating_sub(len);
        frame.textbuffer.truncate(keep);
    }

    /// The name of the open tag owning the current frame, if flushed.
    fn open_tag_name(&self) -> Option<String> {
        match self.frame().tokens.get(1) {
            Some(Token::Text { text }) => Some(text.trim_end().to_ascii_lowercase()),
            _ => None,
        }
    }

    /// Recovers a candidate URI scheme from the tail of the pending text
    /// buffer. Stops at the first non-word character; returns `None` when
    /// a word character that cannot be part of a scheme intervenes.
    fn scheme_behind(&self) -> Option<String> {
        let mut scheme = Vec::new();
        for c in self.frame().textbuffer.chars().rev() {
            if !c.is_alphanumeric() && c != '_' {
                break;
            }
            if !config::SCHEME_CHARS.contains(c) {
                return None;
            }
            scheme.push(c);
        }
        Some(scheme.into_iter().rev().collect())
    }

    /// Incremental safety checks for the contexts in [`Context::UNSAFE`].
    ///
    /// Returns false to fail the route at this character. Some characters
    /// are only conditionally fatal: they arm [`Context::FAIL_NEXT`], which
    /// a successfully parsed construct (a comment in a template name, say)
    /// disarms before the next character is checked.
    fn verify_safe(&mut self, this: Option<char>) -> bool {
        let context = self.context();
        if context.intersects(Context::FAIL_NEXT) {
            return false;
        }
        if context.intersects(Context::WIKILINK_TITLE) {
            match this {
                Some(']' | '{') => self.add_context(Context::FAIL_NEXT),
                Some('\n' | '[' | '}' | '>') => return false,
                Some('<') => {
                    if self.read_ahead(1) == Some('!') {
                        self.add_context(Context::FAIL_NEXT);
                    } else {
                        return false;
                    }
                }
                _ => {}
            }
            true
        } else if context.intersects(Context::EXT_LINK_TITLE) {
            this != Some('\n')
        } else if context.intersects(Context::TEMPLATE_NAME) {
            match this {
                Some('{') => {
                    self.add_context(Context::HAS_TEMPLATE | Context::FAIL_NEXT);
                    true
                }
                Some('}') => {
                    self.add_context(Context::FAIL_NEXT);
                    true
                }
                Some('<') if self.read_ahead(1) == Some('!') => {
                    self.add_context(Context::FAIL_NEXT);
                    true
                }
                Some('[' | ']' | '<' | '>') => false,
                Some('|') => true,
                _ => {
                    if context.intersects(Context::HAS_TEXT) {
                        if context.intersects(Context::FAIL_ON_TEXT) {
                            if !matches!(this, Some(c) if c.is_whitespace()) {
                                return false;
                            }
                        } else if this == Some('\n') {
                            self.add_context(Context::FAIL_ON_TEXT);
                        }
                    } else if !matches!(this, Some(c) if c.is_whitespace()) {
                        self.add_context(Context::HAS_TEXT);
                    }
                    true
                }
            }
        } else if context.intersects(Context::TAG_CLOSE) {
            this != Some('<')
        } else {
            // Template parameter keys and argument names tolerate most
            // markup but track brace balance one character behind.
            if context.intersects(Context::FAIL_ON_EQUALS) {
                if this == Some('=') {
                    return false;
                }
            } else if context.intersects(Context::FAIL_ON_LBRACE) {
                if this == Some('{')
                    || (self.read_back(1) == Some('{') && self.read_back(2) == Some('{'))
                {
                    if context.intersects(Context::TEMPLATE) {
                        self.add_context(Context::FAIL_ON_EQUALS);
                    } else {
                        self.add_context(Context::FAIL_NEXT);
                    }
                    return true;
                }
                self.del_context(Context::FAIL_ON_LBRACE);
            } else if context.intersects(Context::FAIL_ON_RBRACE) {
                if this == Some('}') {
                    if context.intersects(Context::TEMPLATE) {
                        self.add_context(Context::FAIL_ON_EQUALS);
                    } else {
                        self.add_context(Context::FAIL_NEXT);
                    }
                    return true;
                }
                self.del_context(Context::FAIL_ON_RBRACE);
            } else if this == Some('{') {
                self.add_context(Context::FAIL_ON_LBRACE);
            } else if this == Some('}') {
                self.add_context(Context::FAIL_ON_RBRACE);
            }
            true
        }
    }

    /// The end of input. Frames whose construct has no implicit closure
    /// fail; everything else commits.
    fn handle_end(&mut self) -> Route<Vec<Token>> {
        let context = self.context();
        if context.intersects(Context::FAIL) {
            if context.intersects(Context::TAG_BODY)
                && self
                    .open_tag_name()
                    .is_some_and(|name| self.config.single_tags.contains(name.as_str()))
            {
                return self.handle_single_tag_end();
            }
            if context.intersects(Context::DOUBLE) {
                self.pop();
            }
            return Err(self.fail_route());
        }
        Ok(self.pop())
    }

    /// The dispatcher. Tokenizes input in the given context until the
    /// frame's construct closes, its route fails, or the input ends.
    fn parse(&mut self, context: Context, push: bool) -> Route<Vec<Token>> {
        if push {
            self.push(context)?;
        }
        loop {
            let this = self.read();
            if self.context().intersects(Context::UNSAFE) && !self.verify_safe(this) {
                if self.context().intersects(Context::DOUBLE) {
                    self.pop();
                }
                return Err(self.fail_route());
            }
            let Some(this) = this else {
                return self.handle_end();
            };
            if !is_marker(this) {
                self.emit_char(this);
                self.head += 1;
                continue;
            }
            let next = self.read_ahead(1);
            let context = self.context();
            if this == '{' && next == Some('{') {
                if self.can_recurse() {
                    self.parse_template_or_argument()?;
                } else {
                    log::debug!("recursion gate hit at {}; literal brace", self.head);
                    self.emit_char('{');
                }
            } else if this == '|' && context.intersects(Context::TEMPLATE) {
                self.handle_template_param()?;
            } else if this == '=' && context.intersects(Context::TEMPLATE_PARAM_KEY) {
                self.handle_template_param_value();
            } else if this == '}' && next == Some('}') && context.intersects(Context::TEMPLATE) {
                return self.handle_template_end();
            } else if this == '|' && context.intersects(Context::ARGUMENT_NAME) {
                self.handle_argument_separator();
            } else if this == '}' && next == Some('}') && context.intersects(Context::ARGUMENT) {
                if self.read_ahead(2) == Some('}') {
                    return self.handle_argument_end();
                }
                self.emit_char('}');
            } else if this == '[' && next == Some('[') {
                if !context.intersects(Context::NO_WIKILINKS) && self.can_recurse() {
                    self.parse_wikilink()?;
                } else {
                    self.emit_char('[');
                }
            } else if this == '|' && context.intersects(Context::WIKILINK_TITLE) {
                self.handle_wikilink_separator();
            } else if this == ']' && next == Some(']') && context.intersects(Context::WIKILINK) {
                return self.handle_wikilink_end();
            } else if this == '[' {
                self.parse_external_link(true)?;
            } else if this == ':' && self.read_back(1).is_some_and(|c| !is_marker(c)) {
                self.parse_external_link(false)?;
            } else if this == ']' && context.intersects(Context::EXT_LINK_TITLE) {
                return Ok(self.pop());
            } else if this == '=' && !self.in_heading && self.at_line_start() {
                self.parse_heading()?;
            } else if this == '=' && context.intersects(Context::HEADING) {
                return self.handle_heading_end();
            } else if this == '\n' && context.intersects(Context::HEADING) {
                return Err(self.fail_route());
            } else if this == '&' {
                self.parse_entity()?;
            } else if this == '<' && next == Some('!') {
                if self.read_ahead(2) == Some('-') && self.read_ahead(3) == Some('-') {
                    self.parse_comment()?;
                } else {
                    self.emit_char('<');
                }
            } else if this == '<'
                && next == Some('/')
                && self.read_ahead(2).is_some()
                && context.intersects(Context::TAG_BODY)
            {
                self.handle_tag_open_close()?;
            } else if this == '<' && !context.intersects(Context::TAG_CLOSE) {
                self.parse_tag()?;
            } else if this == '>' && context.intersects(Context::TAG_CLOSE) {
                return self.handle_tag_close_close();
            } else if this == '\'' && next == Some('\'') && !self.config.skip_style_tags {
                if let Some(stack) = self.parse_style()? {
                    return Ok(stack);
                }
            } else if this == '\n' && context.intersects(Context::STYLE) {
                // styles do not span lines
                return Err(self.fail_route());
            } else if self.at_line_start() && matches!(this, '#' | '*' | ';' | ':') {
                self.handle_list();
            } else if self.at_line_start()
                && this == '-'
                && next == Some('-')
                && self.read_ahead(2) == Some('-')
                && self.read_ahead(3) == Some('-')
            {
                self.handle_hr();
            } else if (this == '\n' || this == ':') && context.intersects(Context::DL_TERM) {
                self.handle_dl_term();
            } else {
                self.emit_char(this);
            }
            self.head += 1;
        }
    }

    ////////////////////////////
    // Templates and arguments
    ////////////////////////////

    /// A run of two or more `{`. The run is consumed greedily, then
    /// constructs are carved off its inner end, arguments before
    /// templates, until at most a literal leftover brace remains.
    fn parse_template_or_argument(&mut self) -> Route<()> {
        self.head += 2;
        let mut braces = 2usize;
        while self.read() == Some('{') {
            self.head += 1;
            braces += 1;
        }
        let mut has_content = false;
        self.push(Context::default())?;

        while braces > 0 {
            if braces == 1 {
                self.emit_text_then_stack("{");
                return Ok(());
            }
            if braces == 2 {
                match self.parse_template(has_content) {
                    Ok(()) => {}
                    Err(Unwind::BadRoute(_)) => {
                        self.emit_text_then_stack("{{");
                        return Ok(());
                    }
                    Err(fatal) => return Err(fatal),
                }
                break;
            }
            match self.parse_argument() {
                Ok(()) => braces -= 3,
                Err(Unwind::BadRoute(_)) => match self.parse_template(has_content) {
                    Ok(()) => braces -= 2,
                    Err(Unwind::BadRoute(_)) => {
                        self.emit_text_then_stack(&"{".repeat(braces));
                        return Ok(());
                    }
                    Err(fatal) => return Err(fatal),
                },
                Err(fatal) => return Err(fatal),
            }
            if braces > 0 {
                // a nested construct becomes the outer construct's name
                has_content = true;
                self.head += 1;
            }
        }

        let stack = self.pop();
        self.emit_all(stack);
        if self.context().intersects(Context::FAIL_NEXT) {
            self.del_context(Context::FAIL_NEXT);
        }
        Ok(())
    }

    fn parse_template(&mut self, has_content: bool) -> Route<()> {
        let reset = self.head;
        let mut context = Context::TEMPLATE_NAME;
        if has_content {
            context |= Context::HAS_TEMPLATE;
        }
        match self.parse(context, true) {
            Ok(template) => {
                self.emit_first(Token::TemplateOpen);
                self.emit_all(template);
                self.emit(Token::TemplateClose);
                Ok(())
            }
            Err(unwind) => {
                self.head = reset;
                Err(unwind)
            }
        }
    }

    fn parse_argument(&mut self) -> Route<()> {
        let reset = self.head;
        match self.parse(Context::ARGUMENT_NAME, true) {
            Ok(argument) => {
                self.emit_first(Token::ArgumentOpen);
                self.emit_all(argument);
                self.emit(Token::ArgumentClose);
                Ok(())
            }
            Err(unwind) => {
                self.head = reset;
                Err(unwind)
            }
        }
    }

    /// A `|` inside a template. The first one ends the name; later ones
    /// end the previous parameter.
    fn handle_template_param(&mut self) -> Route<()> {
        let context = self.context();
        if context.intersects(Context::TEMPLATE_NAME) {
            if !context.intersects(Context::HAS_TEXT | Context::HAS_TEMPLATE) {
                return Err(self.fail_route());
            }
            self.del_context(Context::TEMPLATE_NAME);
        } else if context.intersects(Context::TEMPLATE_PARAM_VALUE) {
            self.del_context(Context::TEMPLATE_PARAM_VALUE);
        } else {
            let stack = self.pop();
            self.emit_all(stack);
        }
        self.add_context(Context::TEMPLATE_PARAM_KEY);
        self.emit(Token::TemplateParamSeparator);
        self.push(self.context())?;
        Ok(())
    }

    /// The first `=` inside a template parameter.
    fn handle_template_param_value(&mut self) {
        let stack = self.pop();
        self.emit_all(stack);
        self.del_context(Context::TEMPLATE_PARAM_KEY);
        self.add_context(Context::TEMPLATE_PARAM_VALUE);
        self.emit(Token::TemplateParamEquals);
    }

    fn handle_template_end(&mut self) -> Route<Vec<Token>> {
        if self.context().intersects(Context::TEMPLATE_PARAM_KEY) {
            let stack = self.pop();
            self.emit_all(stack);
        }
        self.head += 1;
        Ok(self.pop())
    }

    fn handle_argument_separator(&mut self) {
        self.del_context(Context::ARGUMENT_NAME);
        self.add_context(Context::ARGUMENT_DEFAULT);
        self.emit(Token::ArgumentSeparator);
    }

    fn handle_argument_end(&mut self) -> Route<Vec<Token>> {
        self.head += 2;
        Ok(self.pop())
    }

    ////////////////
    // Wikilinks
    ////////////////

    fn parse_wikilink(&mut self) -> Route<()> {
        let reset = self.head + 1;
        self.head += 2;
        // `[[http://x]]` reads as a bracketed external link, so try that
        // route first.
        match self.really_parse_external_link(true) {
            Ok((link, _extra)) => {
                if self.context().intersects(Context::EXT_LINK_TITLE) {
                    // a link-looking wikilink nested in an external link's
                    // text is plain text
                    self.head = reset;
                    self.emit_text("[[");
                    return Ok(());
                }
                self.emit_char('[');
                self.emit(Token::ExternalLinkOpen { brackets: true });
                self.emit_all(link);
                self.emit(Token::ExternalLinkClose);
                Ok(())
            }
            Err(Unwind::BadRoute(_)) => {
                self.head = reset + 1;
                match self.parse(Context::WIKILINK_TITLE, true) {
                    Ok(wikilink) => {
                        self.emit(Token::WikilinkOpen);
                        self.emit_all(wikilink);
                        self.emit(Token::WikilinkClose);
                        Ok(())
                    }
                    Err(Unwind::BadRoute(title_route)) => {
                        if title_route.intersects(Context::HAS_URL) {
                            // A URL in the title kills the whole wikilink,
                            // which stays one literal run through its `]]`
                            // (or the end of input) with nothing inside it
                            // re-tokenized.
                            let start = reset - 1;
                            let mut end = reset + 1;
                            while end < self.text.len() {
                                if self.text[end] == ']'
                                    && self.text.get(end + 1) == Some(&']')
                                {
                                    end += 2;
                                    break;
                                }
                                end += 1;
                            }
                            let span: String = self.text[start..end].iter().collect();
                            self.emit_text(&span);
                            self.head = end - 1;
                        } else {
                            self.head = reset;
                            self.emit_text("[[");
                        }
                        Ok(())
                    }
                    Err(fatal) => Err(fatal),
                }
            }
            Err(fatal) => Err(fatal),
        }
    }

    fn handle_wikilink_separator(&mut self) {
        self.del_context(Context::WIKILINK_TITLE);
        self.add_context(Context::WIKILINK_TEXT);
        self.emit(Token::WikilinkSeparator);
    }

    fn handle_wikilink_end(&mut self) -> Route<Vec<Token>> {
        self.head += 1;
        Ok(self.pop())
    }

    ////////////////
    // Headings
    ////////////////

    fn parse_heading(&mut self) -> Route<()> {
        self.in_heading = true;
        let reset = self.head;
        self.head += 1;
        let mut best = 1u8;
        while self.read() == Some('=') {
            best += 1;
            self.head += 1;
        }
        let result = self.parse(Context::heading(best.min(6)), true);
        self.in_heading = false;
        match result {
            Ok(title) => {
                let Some(level) = self.heading_level.take() else {
                    return Err(Unwind::Fatal(Error::Internal(
                        "heading route completed without a level",
                    )));
                };
                self.emit(Token::HeadingStart { level });
                if u8::from(level) < best {
                    self.emit_text(&"=".repeat(usize::from(best - u8::from(level))));
                }
                self.emit_all(title);
                self.emit(Token::HeadingEnd);
                Ok(())
            }
            Err(Unwind::BadRoute(_)) => {
                self.head = reset + usize::from(best) - 1;
                self.emit_text(&"=".repeat(usize::from(best)));
                Ok(())
            }
            Err(fatal) => Err(fatal),
        }
    }

    /// A closing `=` run inside a heading. The resolved level is the
    /// shorter of the opening and closing runs; a further closing run on
    /// the same line supersedes this one.
    fn handle_heading_end(&mut self) -> Route<Vec<Token>> {
        let reset = self.head;
        self.head += 1;
        let mut best = 1u8;
        while self.read() == Some('=') {
            best += 1;
            self.head += 1;
        }
        let current = self.context().heading_level();
        let level = current.min(best.min(6));
        match self.parse(self.context(), true) {
            Ok(after) => {
                // another closure further on wins; this run is plain text
                self.emit_text(&"=".repeat(usize::from(best)));
                self.emit_all(after);
                Ok(self.pop())
            }
            Err(Unwind::BadRoute(_)) => {
                if level < best {
                    self.emit_text(&"=".repeat(usize::from(best - level)));
                }
                self.head = reset + usize::from(best) - 1;
                self.heading_level = Some(
                    HeadingLevel::try_from(level)
                        .map_err(|_| Unwind::Fatal(Error::Internal("heading level out of range")))?,
                );
                Ok(self.pop())
            }
            Err(fatal) => Err(fatal),
        }
    }

    ////////////////////
    // External links
    ////////////////////

    fn parse_external_link(&mut self, brackets: bool) -> Route<()> {
        let reset = self.head;
        let context = self.context();
        if !brackets && context.intersects(Context::WIKILINK_TITLE) {
            // a URL in a wikilink title invalidates the whole wikilink
            let slashes =
                self.read_ahead(1) == Some('/') && self.read_ahead(2) == Some('/');
            if let Some(scheme) = self.scheme_behind() {
                if self.config.is_scheme(&scheme, slashes) {
                    self.add_context(Context::HAS_URL);
                    return Err(self.fail_route());
                }
            }
        }
        self.head += 1;
        let attempt = if context.intersects(Context::NO_EXT_LINKS) || !self.can_recurse() {
            Err(Unwind::BadRoute(context))
        } else {
            self.really_parse_external_link(brackets)
        };
        match attempt {
            Ok((link, extra)) => {
                if !brackets {
                    // the scheme was scanned as parent text; move it into
                    // the link
                    if let Some(Token::Text { text }) = link.first() {
                        let scheme_len = text.split(':').next().map_or(0, str::len);
                        self.trim_textbuffer(scheme_len);
                    }
                }
                self.emit(Token::ExternalLinkOpen { brackets });
                self.emit_all(link);
                self.emit(Token::ExternalLinkClose);
                if !extra.is_empty() {
                    self.emit_text(&extra);
                }
                Ok(())
            }
            Err(Unwind::BadRoute(_)) => {
                self.head = reset;
                if !brackets && self.context().intersects(Context::DL_TERM) {
                    self.handle_dl_term();
                } else if let Some(c) = self.read() {
                    self.emit_char(c);
                }
                Ok(())
            }
            Err(fatal) => Err(fatal),
        }
    }

    /// Parses the URL and optional text of an external link, returning the
    /// link's tokens and any trailing punctuation trimmed off a bare URL.
    fn really_parse_external_link(&mut self, brackets: bool) -> Route<(Vec<Token>, String)> {
        if brackets {
            self.parse_bracketed_uri_scheme()?;
        } else {
            self.parse_free_uri_scheme()?;
        }
        let bad_first = match self.read() {
            None => true,
            Some(c) => matches!(c, '\n' | ' ' | ']') || (!brackets && c == '['),
        };
        if bad_first {
            return Err(self.fail_route());
        }
        let mut punct: Vec<char> = vec![',', ';', '.', ':', '!', '?', ')'];
        let mut tail = String::new();
        loop {
            let this = self.read();
            let next = self.read_ahead(1);
            match this {
                Some('&') => {
                    self.flush_link_tail(&mut tail);
                    self.parse_entity()?;
                }
                Some('<')
                    if next == Some('!')
                        && self.read_ahead(2) == Some('-')
                        && self.read_ahead(3) == Some('-') =>
                {
                    self.flush_link_tail(&mut tail);
                    self.parse_comment()?;
                }
                Some('{') if next == Some('{') && self.can_recurse() => {
                    self.flush_link_tail(&mut tail);
                    self.parse_template_or_argument()?;
                }
                None | Some('\n') => {
                    if brackets {
                        return Err(self.fail_route());
                    }
                    self.head -= 1;
                    return Ok((self.pop(), tail));
                }
                Some('[') if next == Some('[') => {
                    if brackets {
                        return Err(self.fail_route());
                    }
                    self.head -= 1;
                    return Ok((self.pop(), tail));
                }
                Some('[') => {
                    if brackets {
                        self.emit_char('[');
                    } else {
                        self.head -= 1;
                        return Ok((self.pop(), tail));
                    }
                }
                Some(']') => {
                    if !brackets {
                        self.head -= 1;
                    }
                    return Ok((self.pop(), tail));
                }
                Some(' ') => {
                    if brackets {
                        self.emit(Token::ExternalLinkSeparator);
                        self.del_context(Context::EXT_LINK_URI);
                        self.add_context(Context::EXT_LINK_TITLE);
                        self.head += 1;
                        let title = self.parse(Context::default(), false)?;
                        return Ok((title, String::new()));
                    }
                    self.head -= 1;
                    return Ok((self.pop(), tail));
                }
                Some('\'') if next == Some('\'') && !brackets => {
                    // a style tag ends a bare URL
                    self.head -= 1;
                    return Ok((self.pop(), tail));
                }
                Some(c) => {
                    if brackets {
                        self.emit_char(c);
                    } else {
                        self.handle_free_link_text(&mut punct, &mut tail, c);
                    }
                }
            }
            self.head += 1;
        }
    }

    /// Flushes pending trimmed punctuation back into the link when a
    /// structural token extends the URL past it.
    fn flush_link_tail(&mut self, tail: &mut String) {
        if !tail.is_empty() {
            let text = core::mem::take(tail);
            self.emit_text(&text);
        }
    }

    /// A character of a bare URL. Candidate trailing punctuation is held
    /// back in `tail` until a non-punctuation character proves the URL
    /// continues.
    fn handle_free_link_text(&mut self, punct: &mut Vec<char>, tail: &mut String, this: char) {
        if this == '(' {
            // a ')' no longer counts as trailing once the URL has a '('
            punct.retain(|&c| c != ')');
        }
        if punct.contains(&this) {
            tail.push(this);
        } else {
            self.flush_link_tail(tail);
            self.emit_char(this);
        }
    }

    /// Validates a bare URL's scheme, which was already consumed into the
    /// parent's text buffer, and opens the link frame.
    fn parse_free_uri_scheme(&mut self) -> Route<()> {
        let Some(scheme) = self.scheme_behind() else {
            return Err(Unwind::BadRoute(self.context()));
        };
        let slashes = self.read() == Some('/') && self.read_ahead(1) == Some('/');
        if !self.config.is_scheme(&scheme, slashes) {
            return Err(Unwind::BadRoute(self.context()));
        }
        self.push(self.context() | Context::EXT_LINK_URI)?;
        self.emit_text(&scheme);
        self.emit_char(':');
        if slashes {
            self.emit_text("//");
            self.head += 2;
        }
        Ok(())
    }

    fn parse_bracketed_uri_scheme(&mut self) -> Route<()> {
        self.push(Context::EXT_LINK_URI)?;
        if self.read() == Some('/') && self.read_ahead(1) == Some('/') {
            // protocol-relative
            self.emit_text("//");
            self.head += 2;
        } else {
            let mut scheme = String::new();
            while let Some(c) = self.read() {
                if !config::SCHEME_CHARS.contains(c) {
                    break;
                }
                scheme.push(c);
                self.emit_char(c);
                self.head += 1;
            }
            if self.read() != Some(':') {
                return Err(self.fail_route());
            }
            self.emit_char(':');
            self.head += 1;
            let slashes = self.read() == Some('/') && self.read_ahead(1) == Some('/');
            if slashes {
                self.emit_text("//");
                self.head += 2;
            }
            if !self.config.is_scheme(&scheme, slashes) {
                return Err(self.fail_route());
            }
        }
        Ok(())
    }

    //////////////////////////
    // Entities and comments
    //////////////////////////

    fn parse_entity(&mut self) -> Route<()> {
        let reset = self.head;
        self.push(Context::HTML_ENTITY)?;
        match self.really_parse_entity() {
            Ok(()) => {
                let stack = self.pop();
                self.emit_all(stack);
                Ok(())
            }
            Err(Unwind::BadRoute(_)) => {
                self.head = reset;
                self.emit_char('&');
                Ok(())
            }
            Err(fatal) => Err(fatal),
        }
    }

    fn really_parse_entity(&mut self) -> Route<()> {
        self.emit(Token::HTMLEntityStart);
        self.head += 1;
        let (numeric, hexadecimal) = match self.read() {
            Some('#') => {
                self.head += 1;
                if self.read() == Some('x') {
                    self.emit(Token::HTMLEntityNumeric { hexadecimal: true });
                    self.head += 1;
                    (true, true)
                } else {
                    self.emit(Token::HTMLEntityNumeric { hexadecimal: false });
                    (true, false)
                }
            }
            Some(_) => (false, false),
            None => return Err(self.fail_route()),
        };
        let mut body = String::new();
        loop {
            match self.read() {
                None => return Err(self.fail_route()),
                Some(';') => {
                    if body.is_empty() {
                        return Err(self.fail_route());
                    }
                    break;
                }
                Some(c) => {
                    let valid = if hexadecimal {
                        c.is_ascii_hexdigit()
                    } else if numeric {
                        c.is_ascii_digit()
                    } else {
                        c.is_ascii_alphanumeric()
                    };
                    if !valid || body.len() >= 8 {
                        return Err(self.fail_route());
                    }
                    body.push(c);
                    self.head += 1;
                }
            }
        }
        if numeric {
            let radix = if hexadecimal { 16 } else { 10 };
            let value = match u32::from_str_radix(&body, radix) {
                Ok(value) => value,
                Err(_) => return Err(self.fail_route()),
            };
            if !(1..=0x10FFFF).contains(&value) {
                return Err(self.fail_route());
            }
        } else if !self.config.html_entities.contains(body.as_str()) {
            return Err(self.fail_route());
        }
        self.emit_text(&body);
        self.emit(Token::HTMLEntityEnd);
        Ok(())
    }

    fn parse_comment(&mut self) -> Route<()> {
        self.head += 4;
        let reset = self.head - 1;
        self.push(Context::default())?;
        loop {
            match self.read() {
                None => {
                    // an unterminated comment is plain text; the interior
                    // is re-scanned in the enclosing context
                    self.pop();
                    self.head = reset;
                    self.emit_text("<!--");
                    return Ok(());
                }
                Some('-')
                    if self.read_ahead(1) == Some('-') && self.read_ahead(2) == Some('>') =>
                {
                    self.emit_first(Token::CommentStart);
                    self.emit(Token::CommentEnd);
                    let stack = self.pop();
                    self.emit_all(stack);
                    self.head += 2;
                    if self.context().intersects(Context::FAIL_NEXT) {
                        // a completed comment never invalidates the
                        // enclosing name or title
                        self.del_context(Context::FAIL_NEXT);
                    }
                    return Ok(());
                }
                Some(c) => {
                    self.emit_char(c);
                    self.head += 1;
                }
            }
        }
    }

    //////////////////////////
    // Styles, lists, rules
    //////////////////////////

    /// A run of two or more `'`. Returns the popped stack when the run
    /// closes the frame's own style route.
    fn parse_style(&mut self) -> Route<Option<Vec<Token>>> {
        self.head += 2;
        let mut ticks = 2usize;
        while self.read() == Some('\'') {
            self.head += 1;
            ticks += 1;
        }
        let context = self.context();
        let italics = context.intersects(Context::STYLE_ITALICS);
        let bold = context.intersects(Context::STYLE_BOLD);
        if ticks > 5 {
            self.emit_text(&"'".repeat(ticks - 5));
            ticks = 5;
        } else if ticks == 4 {
            self.emit_char('\'');
            ticks = 3;
        }
        if (italics && (ticks == 2 || ticks == 5)) || (bold && (ticks == 3 || ticks == 5)) {
            if ticks == 5 {
                // leave the other style's ticks for the enclosing route
                self.head -= if italics { 3 } else { 2 };
            }
            return Ok(Some(self.pop()));
        }
        if !self.can_recurse() {
            self.emit_text(&"'".repeat(ticks));
        } else if ticks == 2 {
            self.parse_italics()?;
        } else if ticks == 3 {
            if self.parse_bold()? {
                return Ok(Some(self.pop()));
            }
        } else {
            self.parse_italics_and_bold()?;
        }
        self.head -= 1;
        Ok(None)
    }

    fn parse_italics(&mut self) -> Route<()> {
        let reset = self.head;
        let stack = match self.parse(Context::STYLE_ITALICS, true) {
            Ok(stack) => stack,
            Err(Unwind::BadRoute(route)) => {
                self.head = reset;
                if route.intersects(Context::STYLE_PASS_AGAIN) {
                    // a bold route failed inside; re-run knowing that
                    let context = Context::STYLE_ITALICS | Context::STYLE_SECOND_PASS;
                    match self.parse(context, true) {
                        Ok(stack) => stack,
                        Err(Unwind::BadRoute(_)) => {
                            self.head = reset;
                            self.emit_text("''");
                            return Ok(());
                        }
                        Err(fatal) => return Err(fatal),
                    }
                } else {
                    self.emit_text("''");
                    return Ok(());
                }
            }
            Err(fatal) => return Err(fatal),
        };
        self.emit_style_tag("i", "''", stack);
        Ok(())
    }

    /// Returns true when the enclosing route should pop as well.
    fn parse_bold(&mut self) -> Route<bool> {
        let reset = self.head;
        match self.parse(Context::STYLE_BOLD, true) {
            Ok(stack) => {
                self.emit_style_tag("b", "'''", stack);
                Ok(false)
            }
            Err(Unwind::BadRoute(_)) => {
                self.head = reset;
                if self.context().intersects(Context::STYLE_SECOND_PASS) {
                    self.emit_char('\'');
                    return Ok(true);
                }
                if self.context().intersects(Context::STYLE_ITALICS) {
                    self.add_context(Context::STYLE_PASS_AGAIN);
                    self.emit_text("'''");
                } else {
                    self.emit_char('\'');
                    self.parse_italics()?;
                }
                Ok(false)
            }
            Err(fatal) => Err(fatal),
        }
    }

    /// Five ticks: try bold-outside-italics, then italics-outside-bold,
    /// then give the ticks up as text.
    fn parse_italics_and_bold(&mut self) -> Route<()> {
        let reset = self.head;
        match self.parse(Context::STYLE_BOLD, true) {
            Ok(stack) => {
                let reset2 = self.head;
                match self.parse(Context::STYLE_ITALICS, true) {
                    Ok(stack2) => {
                        self.push(Context::default())?;
                        self.emit_style_tag("b", "'''", stack);
                        self.emit_all(stack2);
                        let body = self.pop();
                        self.emit_style_tag("i", "''", body);
                        Ok(())
                    }
                    Err(Unwind::BadRoute(_)) => {
                        self.head = reset2;
                        self.emit_text("''");
                        self.emit_style_tag("b", "'''", stack);
                        Ok(())
                    }
                    Err(fatal) => Err(fatal),
                }
            }
            Err(Unwind::BadRoute(_)) => {
                self.head = reset;
                match self.parse(Context::STYLE_ITALICS, true) {
                    Ok(stack) => {
                        let reset2 = self.head;
                        match self.parse(Context::STYLE_BOLD, true) {
                            Ok(stack2) => {
                                self.push(Context::default())?;
                                self.emit_style_tag("i", "''", stack);
                                self.emit_all(stack2);
                                let body = self.pop();
                                self.emit_style_tag("b", "'''", body);
                                Ok(())
                            }
                            Err(Unwind::BadRoute(_)) => {
                                self.head = reset2;
                                self.emit_text("'''");
                                self.emit_style_tag("i", "''", stack);
                                Ok(())
                            }
                            Err(fatal) => Err(fatal),
                        }
                    }
                    Err(Unwind::BadRoute(_)) => {
                        self.head = reset;
                        self.emit_text("'''''");
                        Ok(())
                    }
                    Err(fatal) => Err(fatal),
                }
            }
            Err(fatal) => Err(fatal),
        }
    }

    fn emit_style_tag(&mut self, tag: &str, markup: &str, body: Vec<Token>) {
        self.emit(Token::TagOpenOpen {
            wiki_markup: Some(markup.into()),
        });
        self.emit_text(tag);
        self.emit(Token::TagCloseOpen {
            padding: None,
            wiki_markup: None,
        });
        self.emit_all(body);
        self.emit(Token::TagOpenClose);
        self.emit_text(tag);
        self.emit(Token::TagCloseClose);
    }

    fn handle_list_marker(&mut self, marker: char) {
        if marker == ';' {
            self.add_context(Context::DL_TERM);
        }
        self.emit(Token::TagOpenOpen {
            wiki_markup: Some(marker.to_string()),
        });
        self.emit_text(config::markup_tag_name(marker));
        self.emit(Token::TagCloseSelfclose {
            padding: None,
            implicit: false,
            wiki_markup: None,
        });
    }

    fn handle_list(&mut self) {
        let Some(marker) = self.read() else { return };
        self.handle_list_marker(marker);
        while matches!(self.read_ahead(1), Some('#' | '*' | ';' | ':')) {
            self.head += 1;
            if let Some(marker) = self.read() {
                self.handle_list_marker(marker);
            }
        }
    }

    fn handle_hr(&mut self) {
        let mut length = 4usize;
        self.head += 3;
        while self.read_ahead(1) == Some('-') {
            self.head += 1;
            length += 1;
        }
        self.emit(Token::TagOpenOpen {
            wiki_markup: Some("-".repeat(length)),
        });
        self.emit_text("hr");
        self.emit(Token::TagCloseSelfclose {
            padding: None,
            implicit: false,
            wiki_markup: None,
        });
    }

    /// The term of a definition list ends, at a `:` or the end of the line.
    fn handle_dl_term(&mut self) {
        self.del_context(Context::DL_TERM);
        if self.read() == Some(':') {
            self.handle_list_marker(':');
        } else {
            self.emit_char('\n');
        }
    }
}
