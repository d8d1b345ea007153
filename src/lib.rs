//! A context-sensitive tokenizer for MediaWiki wikitext.
//!
//! Wikitext mixes free text with templates, arguments, wikilinks, external
//! links, headings, HTML-like tags, comments, and entities — and whether a
//! given opener really opens a construct depends on what encloses it.
//! [`Tokenizer::tokenize`] resolves that by parsing speculatively with
//! rollback and returns a flat token stream that reproduces its input
//! exactly (see [`helpers::compose`]). Ill-formed markup is never an
//! error; it comes back out as literal text.
//!
//! ```
//! use wikitok::{Token, tokenize};
//!
//! let tokens = tokenize("{{foo|bar}}").unwrap();
//! assert_eq!(tokens[0], Token::TemplateOpen);
//! ```

mod config;
pub mod helpers;
mod tokenizer;
mod tokens;

pub use config::Configuration;
pub use tokenizer::{Error, Tokenizer};
pub use tokens::{HeadingLevel, HeadingRangeError, Token};

/// Tokenizes `source` with the default [`Configuration`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, Error> {
    Tokenizer::new(&Configuration::DEFAULT).tokenize(source)
}
