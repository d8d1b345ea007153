//! Flat tokens emitted by the tokenizer.

/// A conversion error for out-of-range heading levels.
#[derive(Debug, thiserror::Error)]
#[error("{0} is not a valid heading level")]
pub struct HeadingRangeError(u8);

/// A heading outline level.
///
/// ```wikitext
/// === Heading ===
/// ^^^ (level 3)
/// ```
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct HeadingLevel(u8);

impl From<HeadingLevel> for u8 {
    fn from(value: HeadingLevel) -> Self {
        value.0
    }
}

impl TryFrom<u8> for HeadingLevel {
    type Error = HeadingRangeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=6).contains(&value) {
            Ok(Self(value))
        } else {
            Err(HeadingRangeError(value))
        }
    }
}

/// A single item of the flat token stream produced by
/// [`Tokenizer::tokenize`](crate::Tokenizer::tokenize).
///
/// Concatenating the source span of every token in a stream reproduces the
/// tokenized input exactly; [`crate::helpers::compose`] performs that
/// reassembly. Structural tokens have fixed spans determined by their kind
/// and attributes, e.g. `TemplateOpen` is always `{{`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Token {
    /// A run of plain text.
    Text {
        /// The literal text.
        text: String,
    },
    /// The `{{` opening a template.
    TemplateOpen,
    /// The `|` between template parameters.
    TemplateParamSeparator,
    /// The first `=` inside a template parameter.
    ///
    /// ```wikitext
    /// {{foo|bar=baz}}
    ///          ^
    /// ```
    TemplateParamEquals,
    /// The `}}` closing a template.
    TemplateClose,
    /// The `{{{` opening a template argument.
    ArgumentOpen,
    /// The first `|` inside a template argument, introducing its default
    /// value.
    ArgumentSeparator,
    /// The `}}}` closing a template argument.
    ArgumentClose,
    /// The `[[` opening a wikilink.
    WikilinkOpen,
    /// The first `|` inside a wikilink, separating the title from the
    /// displayed text.
    WikilinkSeparator,
    /// The `]]` closing a wikilink.
    WikilinkClose,
    /// The start of an external link.
    ExternalLinkOpen {
        /// Whether the link is bracketed. A bracketed open spans `[`; a bare
        /// link open spans nothing.
        brackets: bool,
    },
    /// The space separating a bracketed external link's URL from its text.
    ExternalLinkSeparator,
    /// The end of an external link. Spans `]` for a bracketed link and
    /// nothing for a bare one.
    ExternalLinkClose,
    /// The `=` run opening a heading. Spans one `=` per level.
    HeadingStart {
        /// The heading outline level.
        level: HeadingLevel,
    },
    /// The `=` run closing a heading. Spans one `=` per level of the
    /// matching [`HeadingStart`].
    HeadingEnd,
    /// The `<!--` opening an HTML comment.
    CommentStart,
    /// The `-->` closing an HTML comment.
    CommentEnd,
    /// The `&` opening an HTML entity.
    HTMLEntityStart,
    /// The numeric marker of an HTML entity. Spans `#x` when hexadecimal,
    /// `#` otherwise.
    HTMLEntityNumeric {
        /// Whether the entity value is hexadecimal.
        hexadecimal: bool,
    },
    /// The `;` closing an HTML entity.
    HTMLEntityEnd,
    /// The start of a tag's opening, normally spanning `<`.
    ///
    /// ```wikitext
    /// <ref name="a">b</ref>
    /// ^
    /// ```
    TagOpenOpen {
        /// For a tag synthesized from wiki markup (`''`, `'''`, `;`, `:`,
        /// `*`, `#`, `----`), the original markup. The tag name and close
        /// tokens of such a tag span nothing.
        wiki_markup: Option<String>,
    },
    /// The start of one attribute inside a tag's opening.
    TagAttrStart {
        /// Whitespace before the attribute name.
        pad_first: String,
        /// Whitespace between the attribute name and its `=`.
        pad_before_eq: String,
        /// Whitespace between the `=` and the attribute value.
        pad_after_eq: String,
    },
    /// The `=` between an attribute name and its value.
    TagAttrEquals,
    /// The quote delimiting an attribute value.
    TagAttrQuote {
        /// The quote character, `"` or `'`.
        quote: char,
    },
    /// The end of a tag's opening, spanning the padding before `>` and the
    /// `>` itself.
    TagCloseOpen {
        /// Whitespace before the `>`. Absent for wiki-markup tags, which
        /// have no `>`.
        padding: Option<String>,
        /// The original markup for a tag synthesized from wiki markup.
        wiki_markup: Option<String>,
    },
    /// The self-closing end of a tag's opening.
    TagCloseSelfclose {
        /// Whitespace before the `/>`. Absent for wiki-markup tags.
        padding: Option<String>,
        /// Whether the close was implied rather than written, either by a
        /// single-only tag like `<br>` or by the input ending inside a tag
        /// that supports implicit closure, like `<li>`.
        implicit: bool,
        /// The original markup for a tag synthesized from wiki markup.
        wiki_markup: Option<String>,
    },
    /// The start of a tag's closing, normally spanning `</`. For an
    /// `''`/`'''` style tag this re-spans the markup.
    TagOpenClose,
    /// The end of a tag's closing, spanning `>`. Spans nothing for a
    /// wiki-markup tag.
    TagCloseClose,
}

impl Token {
    /// Creates a text token.
    #[inline]
    pub(crate) fn text(text: impl Into<String>) -> Self {
        Token::Text { text: text.into() }
    }
}
