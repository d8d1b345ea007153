//! HTML tags: attributes, padding, quoting, implicit closure, raw-text
//! bodies, and rollback.

use super::{attr_start, close_open, quote, run, selfclose, tag_open, text};
use crate::tokens::Token::*;

#[test]
fn basic() {
    assert_eq!(
        run("<ref>foo</ref>"),
        [
            tag_open(),
            text("ref"),
            close_open(""),
            text("foo"),
            TagOpenClose,
            text("ref"),
            TagCloseClose,
        ],
    );
}

#[test]
fn quoted_attribute() {
    assert_eq!(
        run("<ref name=\"foo\">bar</ref>"),
        [
            tag_open(),
            text("ref"),
            attr_start(" ", "", ""),
            text("name"),
            TagAttrEquals,
            quote('"'),
            text("foo"),
            close_open(""),
            text("bar"),
            TagOpenClose,
            text("ref"),
            TagCloseClose,
        ],
    );
}

#[test]
fn single_quoted_attribute() {
    assert_eq!(
        run("<ref name='foo'>bar</ref>"),
        [
            tag_open(),
            text("ref"),
            attr_start(" ", "", ""),
            text("name"),
            TagAttrEquals,
            quote('\''),
            text("foo"),
            close_open(""),
            text("bar"),
            TagOpenClose,
            text("ref"),
            TagCloseClose,
        ],
    );
}

#[test]
fn unquoted_attribute() {
    assert_eq!(
        run("<ref name=foo>bar</ref>"),
        [
            tag_open(),
            text("ref"),
            attr_start(" ", "", ""),
            text("name"),
            TagAttrEquals,
            text("foo"),
            close_open(""),
            text("bar"),
            TagOpenClose,
            text("ref"),
            TagCloseClose,
        ],
    );
}

#[test]
fn attribute_paddings_are_preserved() {
    assert_eq!(
        run("<ref name = \"foo\" >x</ref>"),
        [
            tag_open(),
            text("ref"),
            attr_start(" ", " ", " "),
            text("name"),
            TagAttrEquals,
            quote('"'),
            text("foo"),
            close_open(" "),
            text("x"),
            TagOpenClose,
            text("ref"),
            TagCloseClose,
        ],
    );
}

#[test]
fn valueless_attribute() {
    assert_eq!(
        run("<ref name>x</ref>"),
        [
            tag_open(),
            text("ref"),
            attr_start(" ", "", ""),
            text("name"),
            close_open(""),
            text("x"),
            TagOpenClose,
            text("ref"),
            TagCloseClose,
        ],
    );
}

#[test]
fn template_in_attribute_value() {
    assert_eq!(
        run("<ref name={{foo}}>x</ref>"),
        [
            tag_open(),
            text("ref"),
            attr_start(" ", "", ""),
            text("name"),
            TagAttrEquals,
            TemplateOpen,
            text("foo"),
            TemplateClose,
            close_open(""),
            text("x"),
            TagOpenClose,
            text("ref"),
            TagCloseClose,
        ],
    );
}

#[test]
fn explicit_selfclose() {
    assert_eq!(
        run("<br/>"),
        [tag_open(), text("br"), selfclose("", false)],
    );
}

#[test]
fn single_only_tag_closes_implicitly() {
    assert_eq!(run("<br>"), [tag_open(), text("br"), selfclose("", true)]);
}

#[test]
fn single_tag_closes_implicitly_at_end() {
    assert_eq!(
        run("<li>foo"),
        [tag_open(), text("li"), selfclose("", true), text("foo")],
    );
}

#[test]
fn unclosed_tag_is_text() {
    assert_eq!(run("<b>foo"), [text("<b>foo")]);
}

#[test]
fn mismatched_close_is_text() {
    assert_eq!(run("<b>foo</i>"), [text("<b>foo</i>")]);
}

#[test]
fn close_name_is_case_insensitive() {
    assert_eq!(
        run("<b>foo</B>"),
        [
            tag_open(),
            text("b"),
            close_open(""),
            text("foo"),
            TagOpenClose,
            text("B"),
            TagCloseClose,
        ],
    );
}

#[test]
fn tag_in_template_name_invalidates_the_template() {
    assert_eq!(
        run("{{foo<b>bar</b>}}"),
        [
            text("{{foo"),
            tag_open(),
            text("b"),
            close_open(""),
            text("bar"),
            TagOpenClose,
            text("b"),
            TagCloseClose,
            text("}}"),
        ],
    );
}

#[test]
fn raw_text_body_hides_markup() {
    assert_eq!(
        run("<nowiki>{{foo}}</nowiki>"),
        [
            tag_open(),
            text("nowiki"),
            close_open(""),
            text("{{foo}}"),
            TagOpenClose,
            text("nowiki"),
            TagCloseClose,
        ],
    );
}

#[test]
fn unclosed_quote_retries_as_unquoted() {
    assert_eq!(run("<span id=\"foo>"), [text("<span id=\"foo>")]);
}

#[test]
fn nested_tags() {
    assert_eq!(
        run("<b><i>x</i></b>"),
        [
            tag_open(),
            text("b"),
            close_open(""),
            tag_open(),
            text("i"),
            close_open(""),
            text("x"),
            TagOpenClose,
            text("i"),
            TagCloseClose,
            TagOpenClose,
            text("b"),
            TagCloseClose,
        ],
    );
}

#[test]
fn marker_in_tag_name_is_invalid() {
    assert_eq!(run("<fo\"o>"), [text("<fo\"o>")]);
}
