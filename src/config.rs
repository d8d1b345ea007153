//! Tokenizer configuration data.

use phf::{Map, Set};

/// Tokenizer configuration.
///
/// The defaults mirror the MediaWiki tables the tokenizer's behavior is
/// defined against. Sites with extra protocols or entities substitute their
/// own tables.
#[derive(Clone, Copy, Debug)]
pub struct Configuration {
    /// Protocols that can start an external link, lowercased, mapped to
    /// whether `//` must follow the `:`.
    pub protocols: &'static Map<&'static str, bool>,
    /// Recognized named HTML entities. Matched case-sensitively.
    pub html_entities: &'static Set<&'static str>,
    /// Tags which close implicitly when their enclosing scope ends.
    pub single_tags: &'static Set<&'static str>,
    /// Tags which never take a body and close immediately.
    pub single_only_tags: &'static Set<&'static str>,
    /// Tags whose body is raw text in which no markup is recognized.
    pub raw_text_tags: &'static Set<&'static str>,
    /// Frame depth past which nested constructs degrade to literal text.
    ///
    /// Must stay below the hard 100-frame ceiling, which fails the whole
    /// invocation instead.
    pub max_depth: usize,
    /// Total frames one invocation may push, bounding speculative
    /// backtracking on pathological inputs.
    pub max_cycles: usize,
    /// Treat `''` and `'''` as plain text instead of style tags.
    pub skip_style_tags: bool,
}

impl Configuration {
    /// The default configuration, mirroring MediaWiki's stock tables.
    pub const DEFAULT: Configuration = Configuration {
        protocols: &URI_SCHEMES,
        html_entities: &HTML_ENTITIES,
        single_tags: &SINGLE_TAGS,
        single_only_tags: &SINGLE_ONLY_TAGS,
        raw_text_tags: &RAW_TEXT_TAGS,
        max_depth: 40,
        max_cycles: 100_000,
        skip_style_tags: false,
    };
}

impl Default for Configuration {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Configuration {
    /// Returns true if `scheme` can start an external link, given whether
    /// the `:` is followed by `//`.
    pub(crate) fn is_scheme(&self, scheme: &str, slashes: bool) -> bool {
        let scheme = scheme.to_ascii_lowercase();
        match self.protocols.get(scheme.as_str()) {
            Some(&needs_slashes) => slashes || !needs_slashes,
            None => false,
        }
    }
}

/// Characters valid in a URI scheme, before lowercasing.
pub(crate) const SCHEME_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789+.-";

/// The HTML tag name synthesized for a wiki list marker.
pub(crate) fn markup_tag_name(marker: char) -> &'static str {
    match marker {
        ';' => "dt",
        ':' => "dd",
        '#' | '*' => "li",
        _ => unreachable!("not a list marker"),
    }
}

/// External link protocols, mapped to whether `//` must follow the colon.
// [mediawiki/core.git]/includes/DefaultSettings.php $wgUrlProtocols
static URI_SCHEMES: Map<&str, bool> = phf::phf_map! {
    "http" => true, "https" => true, "ftp" => true, "ftps" => true,
    "ssh" => true, "sftp" => true, "irc" => true, "ircs" => true,
    "xmpp" => false, "sip" => false, "sips" => false, "gopher" => true,
    "telnet" => true, "nntp" => true, "worldwind" => true, "mailto" => false,
    "tel" => false, "sms" => false, "news" => false, "svn" => true,
    "git" => true, "mms" => true, "bitcoin" => false, "magnet" => false,
    "urn" => false, "geo" => false,
};

/// Tags which may close implicitly at the end of their enclosing scope.
static SINGLE_TAGS: Set<&str> = phf::phf_set! {
    "br", "wbr", "hr", "meta", "link", "li", "dt", "dd", "tr", "td", "th",
};

/// Tags which never take a body.
static SINGLE_ONLY_TAGS: Set<&str> = phf::phf_set! {
    "br", "wbr", "hr", "meta", "link",
};

/// Tags whose body the wiki parser does not process.
static RAW_TEXT_TAGS: Set<&str> = phf::phf_set! {
    "ce", "chem", "gallery", "graph", "hiero", "imagemap", "inputbox",
    "math", "nowiki", "pre", "score", "section", "source",
    "syntaxhighlight", "templatedata", "timeline",
};

/// HTML 4 named character references, without the `&` and `;`.
static HTML_ENTITIES: Set<&str> = phf::phf_set! {
    // Markup-significant and internationalization
    "quot", "amp", "lt", "gt",
    "OElig", "oelig", "Scaron", "scaron", "Yuml", "circ", "tilde",
    "ensp", "emsp", "thinsp", "zwnj", "zwj", "lrm", "rlm", "ndash",
    "mdash", "lsquo", "rsquo", "sbquo", "ldquo", "rdquo", "bdquo",
    "dagger", "Dagger", "permil", "lsaquo", "rsaquo", "euro",
    // Latin-1
    "nbsp", "iexcl", "cent", "pound", "curren", "yen", "brvbar", "sect",
    "uml", "copy", "ordf", "laquo", "not", "shy", "reg", "macr", "deg",
    "plusmn", "sup2", "sup3", "acute", "micro", "para", "middot", "cedil",
    "sup1", "ordm", "raquo", "frac14", "frac12", "frac34", "iquest",
    "Agrave", "Aacute", "Acirc", "Atilde", "Auml", "Aring", "AElig",
    "Ccedil", "Egrave", "Eacute", "Ecirc", "Euml", "Igrave", "Iacute",
    "Icirc", "Iuml", "ETH", "Ntilde", "Ograve", "Oacute", "Ocirc",
    "Otilde", "Ouml", "times", "Oslash", "Ugrave", "Uacute", "Ucirc",
    "Uuml", "Yacute", "THORN", "szlig", "agrave", "aacute", "acirc",
    "atilde", "auml", "aring", "aelig", "ccedil", "egrave", "eacute",
    "ecirc", "euml", "igrave", "iacute", "icirc", "iuml", "eth", "ntilde",
    "ograve", "oacute", "ocirc", "otilde", "ouml", "divide", "oslash",
    "ugrave", "uacute", "ucirc", "uuml", "yacute", "thorn", "yuml",
    // Greek
    "fnof", "Alpha", "Beta", "Gamma", "Delta", "Epsilon", "Zeta", "Eta",
    "Theta", "Iota", "Kappa", "Lambda", "Mu", "Nu", "Xi", "Omicron", "Pi",
    "Rho", "Sigma", "Tau", "Upsilon", "Phi", "Chi", "Psi", "Omega",
    "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta",
    "iota", "kappa", "lambda", "mu", "nu", "xi", "omicron", "pi", "rho",
    "sigmaf", "sigma", "tau", "upsilon", "phi", "chi", "psi", "omega",
    "thetasym", "upsih", "piv",
    // General punctuation and symbols
    "bull", "hellip", "prime", "Prime", "oline", "frasl", "weierp",
    "image", "real", "trade", "alefsym", "larr", "uarr", "rarr", "darr",
    "harr", "crarr", "lArr", "uArr", "rArr", "dArr", "hArr",
    // Mathematical operators
    "forall", "part", "exist", "empty", "nabla", "isin", "notin", "ni",
    "prod", "sum", "minus", "lowast", "radic", "prop", "infin", "ang",
    "and", "or", "cap", "cup", "int", "there4", "sim", "cong", "asymp",
    "ne", "equiv", "le", "ge", "sub", "sup", "nsub", "sube", "supe",
    "oplus", "otimes", "perp", "sdot",
    // Technical, shapes, and suits
    "lceil", "rceil", "lfloor", "rfloor", "lang", "rang", "loz",
    "spades", "clubs", "hearts", "diams",
};
