//! Integration tests for the template compiler.

use pretty_assertions::assert_eq;
use template_compiler::{
    compile, Branch, CompileErrorKind, Dialect, ExpressionContext, Position, TemplateNode,
};

const TOGGLE: &str =
    "{#if isOpen}<div class='content'>Open</div>{else}<div class='closed'>Closed</div>{/if}";
const LIST: &str =
    "{#each item in items}<li>{item.name}</li>{else}<li class='empty'>None</li>{/each}";

fn html_of(nodes: &[TemplateNode]) -> Vec<&str> {
    nodes
        .iter()
        .filter_map(|node| match node {
            TemplateNode::Html(h) => Some(h.html.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_compilation_is_deterministic() {
    for source in [
        TOGGLE,
        LIST,
        "<p title='{t}'>{formatDate(date, 'YYYY')} {#html raw}</p>",
        "{{#each rows}}{{> row cells=cells}}{{/each}}",
        "{#guard total}{#rerender tick}{>slot footer}{/rerender}{/guard}",
    ] {
        assert_eq!(compile(source).unwrap(), compile(source).unwrap());
    }
}

#[test]
fn test_toggle_scenario_structure() {
    let ast = compile(TOGGLE).unwrap();
    assert_eq!(ast.nodes.len(), 1);
    let TemplateNode::If(block) = &ast.nodes[0] else {
        panic!("expected if block");
    };
    assert_eq!(block.condition_source, "isOpen");
    assert_eq!(html_of(&block.content), vec!["<div class=\"content\">Open</div>"]);
    assert_eq!(block.branches.len(), 1);
    let Branch::Else(else_branch) = &block.branches[0] else {
        panic!("expected else branch");
    };
    assert_eq!(
        html_of(&else_branch.content),
        vec!["<div class=\"closed\">Closed</div>"]
    );
}

#[test]
fn test_list_scenario_structure() {
    let ast = compile(LIST).unwrap();
    let TemplateNode::Each(each) = &ast.nodes[0] else {
        panic!("expected each block");
    };
    assert_eq!(each.item_as.as_deref(), Some("item"));
    assert_eq!(each.index_as, None);
    assert_eq!(html_of(&each.content), vec!["<li>", "</li>"]);
    let else_content = each.else_content.as_deref().unwrap();
    assert_eq!(html_of(else_content), vec!["<li class=\"empty\">None</li>"]);
}

#[test]
fn test_double_dialect_blocks() {
    let ast = compile("{{#if a}}{{b}}{{else}}c{{/if}}").unwrap();
    assert_eq!(ast.dialect, Dialect::Double);
    assert!(matches!(ast.nodes[0], TemplateNode::If(_)));
}

#[test]
fn test_mixed_dialect_is_malformed() {
    let err = compile("{{#if a}}x{/if}").unwrap_err();
    assert!(err.is_malformed(), "{err}");

    let err = compile("{#if a}{{b}}{/if}").unwrap_err();
    assert!(err.is_malformed(), "{err}");
}

#[test]
fn test_unclosed_block_names_tag_and_position() {
    let err = compile("<ul>\n  {#each items}\n<li></li>").unwrap_err();
    match &err.kind {
        CompileErrorKind::UnbalancedBlock { tag, message } => {
            assert_eq!(tag, "{#each items}");
            assert!(message.contains("{/each}"), "{message}");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.position, Position::new(2, 3));
}

#[test]
fn test_mismatched_closer() {
    let err = compile("{#if a}{#each b}x{/if}{/each}").unwrap_err();
    match &err.kind {
        CompileErrorKind::UnbalancedBlock { tag, message } => {
            assert_eq!(tag, "{/if}");
            assert!(message.contains("{#each b}"), "{message}");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.position, Position::new(1, 18));
}

#[test]
fn test_misplaced_else() {
    assert!(compile("{else}").unwrap_err().is_unbalanced());
    assert!(compile("{#rerender a}{else}{/rerender}").unwrap_err().is_unbalanced());
    assert!(compile("{#if a}{else}{else}{/if}").unwrap_err().is_unbalanced());
    assert!(compile("{#if a}{else}{else if b}{/if}").unwrap_err().is_unbalanced());
    assert!(compile("{#each a}{else if b}{/each}").unwrap_err().is_unbalanced());
    assert!(compile("{/if}").unwrap_err().is_unbalanced());
}

#[test]
fn test_invalid_expressions_are_malformed() {
    assert!(compile("{}").unwrap_err().is_malformed());
    assert!(compile("{#if}x{/if}").unwrap_err().is_malformed());
    assert!(compile("{#unknown a}{/unknown}").unwrap_err().is_malformed());
    assert!(compile("{name").unwrap_err().is_malformed());
    assert!(compile("<div {#if a}hidden{/if}>").unwrap_err().is_malformed());
}

#[test]
fn test_unknown_helpers_compile() {
    let ast = compile("{notARealHelper a b}").unwrap();
    assert_eq!(ast.call_names(), vec!["notARealHelper"]);
}

#[test]
fn test_expression_error_points_into_tag() {
    let err = compile("<p>{item.name other}</p>").unwrap_err();
    assert!(err.is_malformed());
    assert_eq!(err.position.line, 1);
    assert_eq!(err.position.column, 15);
}

#[test]
fn test_quoted_attribute_number_context() {
    let ast = compile("<span data-number='{count}'></span>").unwrap();
    let TemplateNode::Expression(expr) = &ast.nodes[1] else {
        panic!("expected expression");
    };
    assert_eq!(
        expr.context,
        ExpressionContext::QuotedAttribute {
            name: "data-number".into()
        }
    );
}

#[test]
fn test_non_ascii_text_inside_tags() {
    let ast = compile("<p>{! réservé }</p>").unwrap();
    assert_eq!(html_of(&ast.nodes).concat(), "<p></p>");

    let ast = compile("<p>{café} {upper 'crème'}</p>").unwrap();
    let sources: Vec<&str> = ast
        .nodes
        .iter()
        .filter_map(|node| match node {
            TemplateNode::Expression(expr) => Some(expr.source.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(sources, vec!["café", "upper 'crème'"]);

    let ast = compile("{> badge label=名前 note='über'}").unwrap();
    let TemplateNode::Template(partial) = &ast.nodes[0] else {
        panic!("expected a partial, got {:?}", ast.nodes[0]);
    };
    assert_eq!(partial.name, "badge");
    assert_eq!(partial.data.len(), 1);
    assert_eq!(partial.reactive_data[0].source, "名前");
}

#[test]
fn test_error_positions_count_characters() {
    let err = compile("<p>{name ±}</p>").unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"malformed template: unexpected invalid token at 1:10");

    let err = compile("<p>é {name ±}</p>").unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"malformed template: unexpected invalid token at 1:12");
    assert_eq!(err.span.end_usize() - err.span.start_usize(), '±'.len_utf8());
}
