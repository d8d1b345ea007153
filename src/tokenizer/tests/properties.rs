//! Stream-level properties: round-trip fidelity, well-nestedness,
//! boundary inputs, and resource-gate degradation.

use super::{run, text};
use crate::config::Configuration;
use crate::helpers::compose;
use crate::tokenizer::Tokenizer;
use crate::tokens::Token;

/// Construct kinds for the nesting check.
#[derive(Debug, Eq, PartialEq)]
enum Kind {
    Template,
    Argument,
    Wikilink,
    ExtLink,
    Heading,
    Comment,
    Entity,
    Tag,
}

/// Asserts that every paired token kind is balanced and well-nested, and
/// that separators only appear directly inside their construct.
fn check_balanced(tokens: &[Token]) {
    let mut stack: Vec<Kind> = Vec::new();
    for token in tokens {
        match token {
            Token::Text { .. } => {}
            Token::TemplateOpen => stack.push(Kind::Template),
            Token::TemplateClose => assert_eq!(stack.pop(), Some(Kind::Template)),
            Token::TemplateParamSeparator | Token::TemplateParamEquals => {
                assert_eq!(stack.last(), Some(&Kind::Template));
            }
            Token::ArgumentOpen => stack.push(Kind::Argument),
            Token::ArgumentClose => assert_eq!(stack.pop(), Some(Kind::Argument)),
            Token::ArgumentSeparator => assert_eq!(stack.last(), Some(&Kind::Argument)),
            Token::WikilinkOpen => stack.push(Kind::Wikilink),
            Token::WikilinkClose => assert_eq!(stack.pop(), Some(Kind::Wikilink)),
            Token::WikilinkSeparator => assert_eq!(stack.last(), Some(&Kind::Wikilink)),
            Token::ExternalLinkOpen { .. } => stack.push(Kind::ExtLink),
            Token::ExternalLinkClose => assert_eq!(stack.pop(), Some(Kind::ExtLink)),
            Token::ExternalLinkSeparator => assert_eq!(stack.last(), Some(&Kind::ExtLink)),
            Token::HeadingStart { .. } => stack.push(Kind::Heading),
            Token::HeadingEnd => assert_eq!(stack.pop(), Some(Kind::Heading)),
            Token::CommentStart => stack.push(Kind::Comment),
            Token::CommentEnd => assert_eq!(stack.pop(), Some(Kind::Comment)),
            Token::HTMLEntityStart => stack.push(Kind::Entity),
            Token::HTMLEntityEnd => assert_eq!(stack.pop(), Some(Kind::Entity)),
            Token::HTMLEntityNumeric { .. } => assert_eq!(stack.last(), Some(&Kind::Entity)),
            Token::TagOpenOpen { .. } => stack.push(Kind::Tag),
            Token::TagCloseSelfclose { .. } | Token::TagCloseClose => {
                assert_eq!(stack.pop(), Some(Kind::Tag));
            }
            Token::TagAttrStart { .. }
            | Token::TagAttrEquals
            | Token::TagAttrQuote { .. }
            | Token::TagCloseOpen { .. }
            | Token::TagOpenClose => assert_eq!(stack.last(), Some(&Kind::Tag)),
        }
    }
    assert!(stack.is_empty(), "unclosed constructs: {stack:?}");
}

#[test]
fn empty_input_yields_nothing() {
    assert!(crate::tokenize("").unwrap().is_empty());
}

#[test]
fn lone_openers_are_text() {
    for input in ["{", "{{", "{{{", "[", "[[", "<", "&", "=", "'", "''"] {
        assert_eq!(run(input), [text(input)], "input: {input:?}");
    }
}

#[test]
fn pure_closers_are_text() {
    assert_eq!(run("}}}}"), [text("}}}}")]);
}

#[test]
fn literal_inputs_concatenate() {
    for input in ["foo bar", "a}b", "1234", "no markup here."] {
        assert_eq!(run(input), [text(input)], "input: {input:?}");
        let doubled = format!("{input}{input}");
        assert_eq!(run(&doubled), [text(&doubled)], "input: {input:?}");
    }
}

#[test]
fn unicode_text_passes_through() {
    assert_eq!(
        run("fóó {{bär}}"),
        [
            text("fóó "),
            Token::TemplateOpen,
            text("bär"),
            Token::TemplateClose,
        ],
    );
}

#[test]
fn round_trip_and_nesting_over_corpus() {
    let corpus = [
        "{{a|b={{c|[[d]]|{{e}}}}}}",
        "{{a|{{b|{{c|{{d}}}}}}}}",
        "[[a|''b'']]",
        "[[a|[[b]]]]",
        "<ref name={{a}}>[[b]]</ref>",
        "<ref name=\"x\" group='y'>z</ref>",
        "== {{a}} ==\ntext\n----\n* item",
        "=== a == b ===",
        "http://x.com/(a),;.:!? and more",
        "[http://x.com ''styled'' [[link]]]",
        "&amp;&#38;&#x26;",
        "<!--a-->{{b}}<!--c-->",
        "{{a{{b{{c",
        "]]}}}}]]",
        "[[a]]{{b}}''c''",
        ";term:def\n*item",
        "<li>a<li>b",
        "<nowiki>''x''</nowiki>",
        "{{foo|bar=''baz''}}",
        "a&nb{{sp}};b",
        "==\n==x==\n==",
        "'''''x''''' y",
        "{{x|y\n==z==\n}}",
        "text [mailto:a@b.c label] text",
        "\\\"!-",
    ];
    for input in corpus {
        let tokens = run(input);
        check_balanced(&tokens);
    }
}

#[test]
fn recursion_gate_degrades_to_text() {
    let config = Configuration {
        max_depth: 2,
        ..Configuration::DEFAULT
    };
    let tokenizer = Tokenizer::new(&config);
    let tokens = tokenizer.tokenize("{{a{{b}}c}}").unwrap();
    assert_eq!(
        tokens,
        [
            text("{{a"),
            Token::TemplateOpen,
            text("b"),
            Token::TemplateClose,
            text("c}}"),
        ],
    );
    assert_eq!(compose(&tokens), "{{a{{b}}c}}");
}

#[test]
fn pathological_brace_runs_stay_linear() {
    // a long unclosed brace run must come back out as plain text
    let input = "{".repeat(200);
    assert_eq!(run(&input), [text(&input)]);
    let input = format!("{}x{}", "{".repeat(50), "}".repeat(50));
    let tokens = run(&input);
    check_balanced(&tokens);
}
