//! Wiki-markup tags: quote styles, list markers, horizontal rules.

use super::{markup_open, markup_selfclose, run, style_close_open, text};
use crate::config::Configuration;
use crate::tokenizer::Tokenizer;
use crate::tokens::Token::*;

#[test]
fn italics() {
    assert_eq!(
        run("''foo''"),
        [
            markup_open("''"),
            text("i"),
            style_close_open(),
            text("foo"),
            TagOpenClose,
            text("i"),
            TagCloseClose,
        ],
    );
}

#[test]
fn bold() {
    assert_eq!(
        run("'''foo'''"),
        [
            markup_open("'''"),
            text("b"),
            style_close_open(),
            text("foo"),
            TagOpenClose,
            text("b"),
            TagCloseClose,
        ],
    );
}

#[test]
fn unclosed_italics_is_text() {
    assert_eq!(run("''foo"), [text("''foo")]);
}

#[test]
fn styles_do_not_span_lines() {
    assert_eq!(run("''foo\nbar''"), [text("''foo\nbar''")]);
}

#[test]
fn bold_italics() {
    assert_eq!(
        run("'''''foo'''''"),
        [
            markup_open("''"),
            text("i"),
            style_close_open(),
            markup_open("'''"),
            text("b"),
            style_close_open(),
            text("foo"),
            TagOpenClose,
            text("b"),
            TagCloseClose,
            TagOpenClose,
            text("i"),
            TagCloseClose,
        ],
    );
}

#[test]
fn bold_inside_italics() {
    assert_eq!(
        run("''foo'''bar'''baz''"),
        [
            markup_open("''"),
            text("i"),
            style_close_open(),
            text("foo"),
            markup_open("'''"),
            text("b"),
            style_close_open(),
            text("bar"),
            TagOpenClose,
            text("b"),
            TagCloseClose,
            text("baz"),
            TagOpenClose,
            text("i"),
            TagCloseClose,
        ],
    );
}

#[test]
fn skip_style_tags_configuration() {
    let config = Configuration {
        skip_style_tags: true,
        ..Configuration::DEFAULT
    };
    let tokens = Tokenizer::new(&config).tokenize("''foo''").unwrap();
    assert_eq!(tokens, [text("''foo''")]);
}

#[test]
fn list_markers() {
    assert_eq!(
        run("* foo\n# bar"),
        [
            markup_open("*"),
            text("li"),
            markup_selfclose(),
            text(" foo\n"),
            markup_open("#"),
            text("li"),
            markup_selfclose(),
            text(" bar"),
        ],
    );
}

#[test]
fn marker_runs_stack() {
    assert_eq!(
        run("*#*x"),
        [
            markup_open("*"),
            text("li"),
            markup_selfclose(),
            markup_open("#"),
            text("li"),
            markup_selfclose(),
            markup_open("*"),
            text("li"),
            markup_selfclose(),
            text("x"),
        ],
    );
}

#[test]
fn markers_mid_line_are_text() {
    assert_eq!(run("foo*bar"), [text("foo*bar")]);
}

#[test]
fn horizontal_rule() {
    assert_eq!(
        run("----"),
        [markup_open("----"), text("hr"), markup_selfclose()],
    );
}

#[test]
fn horizontal_rule_keeps_surplus_dashes() {
    assert_eq!(
        run("------"),
        [markup_open("------"), text("hr"), markup_selfclose()],
    );
}

#[test]
fn dashes_mid_line_are_text() {
    assert_eq!(run("foo----"), [text("foo----")]);
}
