//! Attached templates: parts patch the DOM as state changes.

use dom_query::Query;
use dom_tree::Document;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::rc::Rc;
use template_runtime::{Lifecycle, Runtime, RuntimeError, Template, TemplateBuilder};

fn attach(runtime: &Runtime, source: &str, state: Value) -> (Document, Template) {
    let definition = runtime
        .define(TemplateBuilder::new("test").source(source).state(state))
        .unwrap();
    let doc = Document::new();
    let template = runtime.create(&definition, None);
    template.attach(&doc, doc.body(), None).unwrap();
    (doc, template)
}

fn body(doc: &Document) -> String {
    doc.inner_html(doc.body())
}

#[test]
fn test_if_switches_branches() {
    let runtime = Runtime::new();
    let (doc, template) = attach(
        &runtime,
        "{#if isOpen}<div class='content'>Open</div>{else}<p>Closed</p>{/if}",
        json!({"isOpen": false}),
    );
    assert_eq!(body(&doc), "<p>Closed</p>");

    template.state().set("isOpen", true);
    runtime.flush();
    assert_eq!(body(&doc), "<div class=\"content\">Open</div>");
    assert_eq!(template.render(None), body(&doc));
}

#[test]
fn test_if_keeps_branch_when_selection_is_unchanged() {
    let runtime = Runtime::new();
    let (doc, template) = attach(
        &runtime,
        "{#if count}<b>{count}</b>{/if}",
        json!({"count": 1}),
    );
    let before = Query::select(&doc, "b").unwrap().get(0);
    template.state().set("count", 2);
    runtime.flush();
    assert_eq!(body(&doc), "<b>2</b>");
    assert_eq!(Query::select(&doc, "b").unwrap().get(0), before);
}

#[test]
fn test_each_renders_else_then_items() {
    let runtime = Runtime::new();
    let (doc, template) = attach(
        &runtime,
        "<ul>{#each items}<li>{name}</li>{else}<li class=\"empty\">None</li>{/each}</ul>",
        json!({"items": []}),
    );
    assert_eq!(body(&doc), "<ul><li class=\"empty\">None</li></ul>");

    template
        .state()
        .set("items", json!([{"name": "A"}, {"name": "B"}]));
    runtime.flush();
    assert_eq!(body(&doc), "<ul><li>A</li><li>B</li></ul>");

    template.state().push("items", json!({"name": "C"}));
    runtime.flush();
    assert_eq!(body(&doc), "<ul><li>A</li><li>B</li><li>C</li></ul>");

    template.state().set("items", json!([]));
    runtime.flush();
    assert_eq!(body(&doc), "<ul><li class=\"empty\">None</li></ul>");
}

#[test]
fn test_keyed_each_reuses_and_moves_nodes() {
    let runtime = Runtime::new();
    let (doc, template) = attach(
        &runtime,
        "<ul>{#each items by id}<li>{name}</li>{/each}</ul>",
        json!({"items": [{"id": 1, "name": "A"}, {"id": 2, "name": "B"}, {"id": 3, "name": "C"}]}),
    );
    let before = Query::select(&doc, "li").unwrap();
    let (a, b, c) = (before[0], before[1], before[2]);

    template.state().set(
        "items",
        json!([{"id": 3, "name": "C"}, {"id": 1, "name": "A!"}, {"id": 4, "name": "D"}]),
    );
    runtime.flush();
    assert_eq!(body(&doc), "<ul><li>C</li><li>A!</li><li>D</li></ul>");

    let after = Query::select(&doc, "li").unwrap();
    assert_eq!(after[0], c);
    assert_eq!(after[1], a);
    assert_ne!(after[2], b);
    assert!(!doc.is_connected(b));
}

#[test]
fn test_text_and_attribute_parts() {
    let runtime = Runtime::new();
    let (doc, template) = attach(
        &runtime,
        "<a class=\"link {kind}\" href={href} {extra}>{label}</a>",
        json!({"kind": "primary", "href": "/a", "label": "Go", "extra": {"data-x": "1"}}),
    );
    let link = Query::select(&doc, "a").unwrap().get(0).unwrap();
    assert_eq!(doc.get_attribute(link, "class").as_deref(), Some("link primary"));
    assert_eq!(doc.get_attribute(link, "href").as_deref(), Some("/a"));
    assert_eq!(doc.get_attribute(link, "data-x").as_deref(), Some("1"));

    runtime.batch(|| {
        template.state().set("kind", "muted");
        template.state().set("href", false);
        template.state().set("label", "<Stop>");
        template.state().set("extra", json!({"title": "t"}));
    });
    assert_eq!(doc.get_attribute(link, "class").as_deref(), Some("link muted"));
    assert_eq!(doc.get_attribute(link, "href"), None);
    assert_eq!(doc.get_attribute(link, "data-x"), None);
    assert_eq!(doc.get_attribute(link, "title").as_deref(), Some("t"));
    assert_eq!(doc.text_content(link), "<Stop>");
    assert_eq!(doc.inner_html(link), "&lt;Stop&gt;");
}

#[test]
fn test_raw_html_is_replaced_on_change() {
    let runtime = Runtime::new();
    let (doc, template) = attach(
        &runtime,
        "<div>{#html body}</div>",
        json!({"body": "<i>one</i>"}),
    );
    assert_eq!(body(&doc), "<div><i>one</i></div>");
    template.state().set("body", "<b>two</b> three");
    runtime.flush();
    assert_eq!(body(&doc), "<div><b>two</b> three</div>");
}

#[test]
fn test_guard_rebuilds_only_on_value_change() {
    let runtime = Runtime::new();
    let (doc, template) = attach(
        &runtime,
        "{#guard greaterThan count 5}<b class=\"g\">g</b>{/guard}{#rerender greaterThan count 5}<b class=\"r\">r</b>{/rerender}",
        json!({"count": 1}),
    );
    let guarded = Query::select(&doc, ".g").unwrap().get(0);
    let rerendered = Query::select(&doc, ".r").unwrap().get(0);

    template.state().set("count", 2);
    runtime.flush();
    assert_eq!(Query::select(&doc, ".g").unwrap().get(0), guarded);
    assert_ne!(Query::select(&doc, ".r").unwrap().get(0), rerendered);

    template.state().set("count", 9);
    runtime.flush();
    assert_ne!(Query::select(&doc, ".g").unwrap().get(0), guarded);
    assert_eq!(body(&doc), "<b class=\"g\">g</b><b class=\"r\">r</b>");
}

#[test]
fn test_only_dependent_parts_rerun() {
    let runtime = Runtime::new();
    let (doc, template) = attach(
        &runtime,
        "<p>{a}</p><p>{b}</p>",
        json!({"a": "x", "b": "y"}),
    );
    let texts: Vec<_> = Query::select(&doc, "p")
        .unwrap()
        .iter()
        .map(|&p| doc.children(p)[0])
        .collect();
    template.state().set("a", "z");
    assert_eq!(runtime.reactor().pending_count(), 1);
    runtime.flush();
    assert_eq!(doc.node_text(texts[0]).as_deref(), Some("z"));
    assert_eq!(doc.node_text(texts[1]).as_deref(), Some("y"));
}

#[test]
fn test_comment_and_raw_text_parts() {
    let runtime = Runtime::new();
    let (doc, template) = attach(
        &runtime,
        "<!-- v{version} --><textarea>{draft}</textarea>",
        json!({"version": 1, "draft": "a < b"}),
    );
    assert_eq!(body(&doc), "<!-- v1 --><textarea>a &lt; b</textarea>");
    template.state().set("version", 2);
    runtime.flush();
    assert_eq!(body(&doc), "<!-- v2 --><textarea>a &lt; b</textarea>");
}

#[test]
fn test_partials_receive_reactive_data() {
    let runtime = Runtime::new();
    runtime
        .define(TemplateBuilder::new("badge").source("<span class=\"badge\">{label}: {count}</span>"))
        .unwrap();
    let (doc, template) = attach(
        &runtime,
        "<div>{> badge label='Items' count=total}</div>",
        json!({"total": 1}),
    );
    assert_eq!(body(&doc), "<div><span class=\"badge\">Items: 1</span></div>");

    template.state().set("total", 3);
    runtime.flush();
    assert_eq!(body(&doc), "<div><span class=\"badge\">Items: 3</span></div>");

    let children = template.children();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name(), "badge");
    assert_eq!(children[0].lifecycle(), Lifecycle::Attached);
    assert_eq!(children[0].parent(), Some(template.clone()));
    assert_eq!(children[0].setting("label"), Some(json!("Items")));
}

#[test]
fn test_partials_inside_if_are_destroyed_with_the_branch() {
    let runtime = Runtime::new();
    runtime
        .define(TemplateBuilder::new("badge").source("<span>{n}</span>"))
        .unwrap();
    let (doc, template) = attach(
        &runtime,
        "{#if show}{> badge n=count}{/if}",
        json!({"show": true, "count": 5}),
    );
    let badge = template.find_child("badge").unwrap();
    assert_eq!(body(&doc), "<span>5</span>");

    template.state().set("show", false);
    runtime.flush();
    assert_eq!(body(&doc), "");
    assert_eq!(badge.lifecycle(), Lifecycle::Destroyed);
    assert!(template.children().is_empty());
    assert_eq!(runtime.find_templates("badge").len(), 0);
}

#[test]
fn test_slots_render_in_the_slotted_context() {
    let runtime = Runtime::new();
    let card = runtime
        .define(
            TemplateBuilder::new("card")
                .source("<section><h2>{>slot header}</h2>{>slot}</section>")
                .state(json!({"name": "X"})),
        )
        .unwrap();
    let doc = Document::new();
    let template = runtime.create(&card, None);
    template.set_slot(Some("header"), "Title {name}").unwrap();
    template.set_slot(None, "<p>Body</p>").unwrap();
    template.attach(&doc, doc.body(), None).unwrap();
    assert_eq!(body(&doc), "<section><h2>Title X</h2><p>Body</p></section>");

    template.state().set("name", "Y");
    runtime.flush();
    assert_eq!(body(&doc), "<section><h2>Title Y</h2><p>Body</p></section>");
}

#[test]
fn test_attach_errors() {
    let runtime = Runtime::new();
    let (doc, template) = attach(&runtime, "<p></p>", json!({}));
    assert!(matches!(
        template.attach(&doc, doc.body(), None),
        Err(RuntimeError::AlreadyAttached { .. })
    ));
    template.destroy();
    assert!(matches!(
        template.attach(&doc, doc.body(), None),
        Err(RuntimeError::Destroyed { .. })
    ));
    assert!(matches!(
        template.query("p"),
        Err(RuntimeError::NotAttached { .. })
    ));
}

#[test]
fn test_attach_into_shadow_root_and_query() {
    let runtime = Runtime::new();
    let definition = runtime
        .define(TemplateBuilder::new("widget").source("<p class=\"note\">inside</p>"))
        .unwrap();
    let doc = Document::from_html("<p class=\"note\">outside</p><div id=\"host\"></div>");
    let host = doc.query_selector(doc.root(), "#host").unwrap().unwrap();
    let shadow = doc
        .attach_shadow(host, dom_tree::ShadowRootMode::Open)
        .unwrap();
    let template = runtime.create(&definition, None);
    template.attach(&doc, shadow, None).unwrap();

    assert_eq!(template.container(), Some(shadow));
    let notes = template.query(".note").unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes.text().as_deref(), Some("inside"));
    assert_eq!(Query::select(&doc, ".note").unwrap().len(), 1);
    assert_eq!(Query::select_deep(&doc, ".note").unwrap().len(), 2);
    assert_eq!(template.html(), "<p class=\"note\">inside</p>");
}

#[test]
fn test_destroy_cleans_up() {
    let runtime = Runtime::new();
    let destroyed = Rc::new(std::cell::Cell::new(0));
    let counter = destroyed.clone();
    let definition = runtime
        .define(
            TemplateBuilder::new("full")
                .source("<ul>{#each items}<li class=\"item\">{this}</li>{/each}</ul>{#if open}<p>{title}</p>{/if}")
                .state(json!({"items": [1, 2], "open": true, "title": "t"}))
                .event("click .item", |_| {})
                .event("global resize", |_| {})
                .key("ctrl+k", |_| None)
                .on_destroyed(move |_| counter.set(counter.get() + 1)),
        )
        .unwrap();
    let doc = Document::new();
    let baseline = runtime.reactor().reaction_count();
    let template = runtime.create(&definition, None);
    template.attach(&doc, doc.body(), None).unwrap();
    assert!(runtime.reactor().reaction_count() > baseline);
    assert_eq!(template.part_count(), runtime.reactor().reaction_count() - baseline);
    assert_eq!(doc.total_listener_count(), 3);
    assert_eq!(runtime.registry().len(), 1);

    template.destroy();
    template.destroy();
    assert_eq!(destroyed.get(), 1);
    assert_eq!(runtime.reactor().reaction_count(), baseline);
    assert_eq!(doc.total_listener_count(), 0);
    assert_eq!(body(&doc), "");
    assert!(runtime.registry().is_empty());
    assert_eq!(template.lifecycle(), Lifecycle::Destroyed);

    template.state().set("title", "after");
    runtime.flush();
    assert_eq!(body(&doc), "");
}
