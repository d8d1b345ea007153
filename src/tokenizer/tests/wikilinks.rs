//! Wikilinks: title/text contexts and title invalidation.

use super::{close_open, ext_open, run, tag_open, text};
use crate::tokens::Token::*;

#[test]
fn basic() {
    assert_eq!(run("[[foo]]"), [WikilinkOpen, text("foo"), WikilinkClose]);
}

#[test]
fn with_text() {
    assert_eq!(
        run("[[foo|bar]]"),
        [
            WikilinkOpen,
            text("foo"),
            WikilinkSeparator,
            text("bar"),
            WikilinkClose,
        ],
    );
}

#[test]
fn later_pipes_are_literal() {
    assert_eq!(
        run("[[foo|bar|baz]]"),
        [
            WikilinkOpen,
            text("foo"),
            WikilinkSeparator,
            text("bar|baz"),
            WikilinkClose,
        ],
    );
}

#[test]
fn newline_invalidates_title() {
    assert_eq!(run("[[foo\nbar]]"), [text("[[foo\nbar]]")]);
}

#[test]
fn unmatched_opener_is_text() {
    assert_eq!(run("[[foo"), [text("[[foo")]);
}

#[test]
fn tag_invalidates_title() {
    assert_eq!(
        run("[[foo<b>bar</b>]]"),
        [
            text("[[foo"),
            tag_open(),
            text("b"),
            close_open(""),
            text("bar"),
            TagOpenClose,
            text("b"),
            TagCloseClose,
            text("]]"),
        ],
    );
}

#[test]
fn incomplete_comment_invalidates_title() {
    assert_eq!(run("[[foo<!--bar]]"), [text("[[foo<!--bar]]")]);
}

#[test]
fn complete_comment_keeps_title_valid() {
    assert_eq!(
        run("[[foo<!--bar-->]]"),
        [
            WikilinkOpen,
            text("foo"),
            CommentStart,
            text("bar"),
            CommentEnd,
            WikilinkClose,
        ],
    );
}

#[test]
fn template_in_title_is_permitted() {
    assert_eq!(
        run("[[foo{{bar}}]]"),
        [
            WikilinkOpen,
            text("foo"),
            TemplateOpen,
            text("bar"),
            TemplateClose,
            WikilinkClose,
        ],
    );
}

#[test]
fn url_collapses_title_to_text() {
    assert_eq!(
        run("[[File:Example.png http://example.com]]"),
        [text("[[File:Example.png http://example.com]]")],
    );
}

#[test]
fn url_collapses_unterminated_title_to_text() {
    assert_eq!(
        run("[[foo http://example.com"),
        [text("[[foo http://example.com")],
    );
}

#[test]
fn bare_url_is_permitted_in_link_text() {
    assert_eq!(
        run("[[File:Example.png|thumb|http://example.com]]"),
        [
            WikilinkOpen,
            text("File:Example.png"),
            WikilinkSeparator,
            text("thumb|"),
            ext_open(false),
            text("http://example.com"),
            ExternalLinkClose,
            WikilinkClose,
        ],
    );
}

#[test]
fn url_opener_lookalike_becomes_bracketed_link() {
    assert_eq!(
        run("[[http://example.com]]"),
        [
            text("["),
            ext_open(true),
            text("http://example.com"),
            ExternalLinkClose,
            text("]"),
        ],
    );
}
