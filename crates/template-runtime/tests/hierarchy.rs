//! Parent/child links, lookups and lifecycle hook order.

use dom_tree::Document;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use template_runtime::{Lifecycle, Runtime, TemplateBuilder};

#[test]
fn test_nested_partials_form_a_hierarchy() {
    let runtime = Runtime::new();
    let order: Rc<RefCell<Vec<String>>> = Rc::default();
    let hook = |order: &Rc<RefCell<Vec<String>>>, label: &'static str| {
        let order = order.clone();
        move |template: &template_runtime::Template| {
            order
                .borrow_mut()
                .push(format!("{label}:{}", template.name()))
        }
    };
    runtime
        .define(
            TemplateBuilder::new("cell")
                .source("<td>{value}</td>")
                .on_rendered(hook(&order, "rendered"))
                .on_destroyed(hook(&order, "destroyed")),
        )
        .unwrap();
    runtime
        .define(
            TemplateBuilder::new("row")
                .source("<tr>{#each cells}{> cell value=this}{/each}</tr>")
                .on_rendered(hook(&order, "rendered")),
        )
        .unwrap();
    let table = runtime
        .define(
            TemplateBuilder::new("table")
                .source("<table>{#each rows}{> row cells=this}{/each}</table>")
                .state(json!({"rows": [[1, 2], [3]]}))
                .on_created(hook(&order, "created"))
                .on_rendered(hook(&order, "rendered")),
        )
        .unwrap();

    let doc = Document::new();
    let template = runtime.create(&table, None);
    template.attach(&doc, doc.body(), None).unwrap();
    assert_eq!(
        doc.inner_html(doc.body()),
        "<table><tr><td>1</td><td>2</td></tr><tr><td>3</td></tr></table>"
    );
    assert_eq!(
        *order.borrow(),
        vec![
            "rendered:cell",
            "rendered:cell",
            "rendered:row",
            "rendered:cell",
            "rendered:row",
            "created:table",
            "rendered:table",
        ]
    );

    assert_eq!(template.find_children("row").len(), 2);
    assert_eq!(template.find_children("cell").len(), 3);
    let cell = template.find_child("cell").unwrap();
    assert_eq!(cell.find_parent("table"), Some(template.clone()));
    assert_eq!(cell.parent().unwrap().name(), "row");
    assert_eq!(cell.find_template("table"), Some(template.clone()));
    assert_eq!(runtime.find_templates("cell").len(), 3);
    assert_eq!(runtime.find_template("table"), Some(template.clone()));
    assert!(cell.contains_node(cell.nodes()[0]));
    assert!(template.contains_node(cell.nodes()[0]));
    assert!(!cell.contains_node(template.nodes()[0]));

    order.borrow_mut().clear();
    template.state().remove_at("rows", 0);
    runtime.flush();
    assert_eq!(
        doc.inner_html(doc.body()),
        "<table><tr><td>3</td></tr></table>"
    );
    assert_eq!(*order.borrow(), vec!["destroyed:cell", "destroyed:cell"]);
    assert_eq!(cell.lifecycle(), Lifecycle::Destroyed);
    assert_eq!(runtime.find_templates("cell").len(), 1);
    assert_eq!(template.find_children("row").len(), 1);

    template.destroy();
    assert!(runtime.registry().is_empty());
}

#[test]
fn test_explicit_parent_link() {
    let runtime = Runtime::new();
    let shell = runtime
        .define(TemplateBuilder::new("shell").source("<main></main>"))
        .unwrap();
    let panel = runtime
        .define(TemplateBuilder::new("panel").source("<aside>{title}</aside>"))
        .unwrap();
    let doc = Document::new();
    let parent = runtime.create(&shell, None);
    parent.attach(&doc, doc.body(), None).unwrap();
    let main = parent.query("main").unwrap().get(0).unwrap();
    let child = runtime.create(&panel, Some(json!({"title": "Side"})));
    child.attach(&doc, main, Some(&parent)).unwrap();

    assert_eq!(
        doc.inner_html(doc.body()),
        "<main><aside>Side</aside></main>"
    );
    assert_eq!(child.parent(), Some(parent.clone()));
    assert_eq!(parent.children(), vec![child.clone()]);

    parent.destroy();
    assert_eq!(child.lifecycle(), Lifecycle::Destroyed);
    assert_eq!(doc.inner_html(doc.body()), "");
}
