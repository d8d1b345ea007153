//! Parse context flags.
//!
//! Every frame carries a [`Context`] describing which construct it is
//! inside. The flags control which closers, separators, and nested
//! constructs the dispatcher will recognize, and which characters are
//! fatal to the current route.

/// A bit set of parse contexts.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct Context(u64);

impl Context {
    /// Inside a template name, before the first `|`.
    pub const TEMPLATE_NAME: Context = Context(1 << 0);
    /// Inside a template parameter, before its `=`.
    pub const TEMPLATE_PARAM_KEY: Context = Context(1 << 1);
    /// Inside a template parameter, after its `=`.
    pub const TEMPLATE_PARAM_VALUE: Context = Context(1 << 2);
    /// Inside any part of a template.
    pub const TEMPLATE: Context =
        Context(Self::TEMPLATE_NAME.0 | Self::TEMPLATE_PARAM_KEY.0 | Self::TEMPLATE_PARAM_VALUE.0);

    /// Inside a template argument name, before the first `|`.
    pub const ARGUMENT_NAME: Context = Context(1 << 3);
    /// Inside a template argument default value.
    pub const ARGUMENT_DEFAULT: Context = Context(1 << 4);
    /// Inside any part of a template argument.
    pub const ARGUMENT: Context = Context(Self::ARGUMENT_NAME.0 | Self::ARGUMENT_DEFAULT.0);

    /// Inside a wikilink title, before the first `|`.
    pub const WIKILINK_TITLE: Context = Context(1 << 5);
    /// Inside a wikilink's displayed text.
    pub const WIKILINK_TEXT: Context = Context(1 << 6);
    /// Inside any part of a wikilink.
    pub const WIKILINK: Context = Context(Self::WIKILINK_TITLE.0 | Self::WIKILINK_TEXT.0);

    /// Inside an external link URL.
    pub const EXT_LINK_URI: Context = Context(1 << 7);
    /// Inside a bracketed external link's text.
    pub const EXT_LINK_TITLE: Context = Context(1 << 8);
    /// Inside any part of an external link.
    pub const EXT_LINK: Context = Context(Self::EXT_LINK_URI.0 | Self::EXT_LINK_TITLE.0);

    /// Inside a heading. One bit per level; see [`Context::heading_level`].
    pub const HEADING_LEVEL_1: Context = Context(1 << 9);
    /// Inside any heading.
    pub const HEADING: Context = Context(0b11_1111 << 9);

    /// Inside a tag's opening, between `<` and `>`.
    pub const TAG_OPEN: Context = Context(1 << 15);
    /// Inside a tag attribute.
    pub const TAG_ATTR: Context = Context(1 << 16);
    /// Inside a tag body.
    pub const TAG_BODY: Context = Context(1 << 17);
    /// Inside a tag's closing, between `</` and `>`.
    pub const TAG_CLOSE: Context = Context(1 << 18);
    /// Inside any part of a tag.
    pub const TAG: Context =
        Context(Self::TAG_OPEN.0 | Self::TAG_ATTR.0 | Self::TAG_BODY.0 | Self::TAG_CLOSE.0);

    /// Inside an `''` italic style.
    pub const STYLE_ITALICS: Context = Context(1 << 19);
    /// Inside a `'''` bold style.
    pub const STYLE_BOLD: Context = Context(1 << 20);
    /// A failed bold route wants the enclosing italics route re-run.
    pub const STYLE_PASS_AGAIN: Context = Context(1 << 21);
    /// The italics route is being re-run after a failed bold route.
    pub const STYLE_SECOND_PASS: Context = Context(1 << 22);
    /// Inside any style.
    pub const STYLE: Context = Context(
        Self::STYLE_ITALICS.0
            | Self::STYLE_BOLD.0
            | Self::STYLE_PASS_AGAIN.0
            | Self::STYLE_SECOND_PASS.0,
    );

    /// After a `;` definition-term marker, until the `:` or end of line.
    pub const DL_TERM: Context = Context(1 << 23);

    /// Inside an HTML entity.
    pub const HTML_ENTITY: Context = Context(1 << 24);

    // Safety flags, maintained by the per-character checks while inside the
    // contexts in `UNSAFE`.

    /// The route has seen non-whitespace text.
    pub const HAS_TEXT: Context = Context(1 << 25);
    /// Any further non-whitespace text fails the route.
    pub const FAIL_ON_TEXT: Context = Context(1 << 26);
    /// The next character fails the route unless a construct disarms this.
    pub const FAIL_NEXT: Context = Context(1 << 27);
    /// A lone `{` was seen; the brace-balance check is pending.
    pub const FAIL_ON_LBRACE: Context = Context(1 << 28);
    /// A lone `}` was seen; the brace-balance check is pending.
    pub const FAIL_ON_RBRACE: Context = Context(1 << 29);
    /// An `=` fails the route (unbalanced brace inside a parameter key).
    pub const FAIL_ON_EQUALS: Context = Context(1 << 30);
    /// The route's name content is a nested template or argument.
    pub const HAS_TEMPLATE: Context = Context(1 << 31);
    /// The route failed on a bare URL that its construct cannot contain.
    pub const HAS_URL: Context = Context(1 << 32);

    /// Contexts which cannot reach the end of the input and survive.
    pub const FAIL: Context = Context(
        Self::TEMPLATE.0
            | Self::ARGUMENT.0
            | Self::WIKILINK.0
            | Self::EXT_LINK.0
            | Self::HEADING.0
            | Self::TAG.0
            | Self::STYLE.0,
    );
    /// Contexts requiring the per-character safety checks.
    pub const UNSAFE: Context = Context(
        Self::TEMPLATE_NAME.0
            | Self::WIKILINK_TITLE.0
            | Self::EXT_LINK_TITLE.0
            | Self::TEMPLATE_PARAM_KEY.0
            | Self::ARGUMENT_NAME.0
            | Self::TAG_CLOSE.0,
    );
    /// Contexts which hold an extra frame that must also be popped when the
    /// route fails.
    pub const DOUBLE: Context = Context(Self::TEMPLATE_PARAM_KEY.0 | Self::TAG_CLOSE.0);
    /// Contexts in which `[[` does not open a wikilink.
    pub const NO_WIKILINKS: Context = Context(
        Self::TEMPLATE_NAME.0 | Self::ARGUMENT_NAME.0 | Self::WIKILINK_TITLE.0
            | Self::EXT_LINK_URI.0,
    );
    /// Contexts in which a URL does not open an external link.
    pub const NO_EXT_LINKS: Context =
        Context(Self::TEMPLATE_NAME.0 | Self::ARGUMENT_NAME.0 | Self::WIKILINK_TITLE.0
            | Self::EXT_LINK.0);

    /// Returns the heading context for an opening run of `level` `=`.
    #[inline]
    pub fn heading(level: u8) -> Context {
        debug_assert!((1..=6).contains(&level));
        Context(Self::HEADING_LEVEL_1.0 << (level - 1))
    }

    /// Returns the level of the heading context bit set in `self`.
    #[inline]
    pub fn heading_level(self) -> u8 {
        debug_assert!(self.intersects(Self::HEADING));
        ((self.0 >> 9).trailing_zeros() + 1) as u8
    }

    /// Returns true if any flag of `other` is set in `self`.
    #[inline]
    pub fn intersects(self, other: Context) -> bool {
        self.0 & other.0 != 0
    }
}

impl core::ops::BitOr for Context {
    type Output = Context;

    #[inline]
    fn bitor(self, rhs: Context) -> Context {
        Context(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for Context {
    #[inline]
    fn bitor_assign(&mut self, rhs: Context) {
        self.0 |= rhs.0;
    }
}

impl core::ops::BitAnd for Context {
    type Output = Context;

    #[inline]
    fn bitand(self, rhs: Context) -> Context {
        Context(self.0 & rhs.0)
    }
}

impl core::ops::Sub for Context {
    type Output = Context;

    #[inline]
    fn sub(self, rhs: Context) -> Context {
        Context(self.0 & !rhs.0)
    }
}

impl core::ops::SubAssign for Context {
    #[inline]
    fn sub_assign(&mut self, rhs: Context) {
        self.0 &= !rhs.0;
    }
}
