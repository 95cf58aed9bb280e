//! Event maps and key maps on attached templates.

use dom_query::Query;
use dom_tree::{Document, Event, Modifiers, ShadowRootMode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;
use template_runtime::{Runtime, TemplateBuilder};

type Log = Rc<RefCell<Vec<Value>>>;

#[test]
fn test_scoped_delegation_with_dataset() {
    let runtime = Runtime::new();
    let log: Log = Rc::default();
    let seen = log.clone();
    let definition = runtime
        .define(
            TemplateBuilder::new("list")
                .source("<ul>{#each items}<li class=\"item\" data-item-id=\"{id}\">{name}</li>{/each}</ul><p>{selected}</p>")
                .state(json!({"items": [{"id": 1, "name": "A"}, {"id": 2, "name": "B"}], "selected": ""}))
                .event("click .item", move |args| {
                    seen.borrow_mut().push(args.data["itemId"].clone());
                    let name = args.document.text_content(args.target);
                    args.template.state().set("selected", name);
                }),
        )
        .unwrap();
    let doc = Document::from_html("<ul><li class=\"item\" data-item-id=\"9\">outside</li></ul>");
    let template = runtime.create(&definition, None);
    template.attach(&doc, doc.body(), None).unwrap();

    let items = template.query(".item").unwrap();
    assert_eq!(items.len(), 2);
    doc.dispatch(items[1], Event::new("click"));
    runtime.flush();
    assert_eq!(*log.borrow(), vec![json!(2)]);
    assert_eq!(template.query("p").unwrap().text().as_deref(), Some("B"));

    let outside = Query::select(&doc, ".item").unwrap().get(0).unwrap();
    doc.dispatch(outside, Event::new("click"));
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn test_delegation_covers_items_added_later() {
    let runtime = Runtime::new();
    let log: Log = Rc::default();
    let seen = log.clone();
    let definition = runtime
        .define(
            TemplateBuilder::new("list")
                .source("{#each items}<button data-n=\"{this}\">{this}</button>{/each}")
                .state(json!({"items": [1]}))
                .event("click button", move |args| seen.borrow_mut().push(args.data["n"].clone())),
        )
        .unwrap();
    let doc = Document::new();
    let template = runtime.create(&definition, None);
    template.attach(&doc, doc.body(), None).unwrap();
    template.state().push("items", 2);
    runtime.flush();

    for button in template.query("button").unwrap().iter() {
        doc.dispatch(*button, Event::new("click"));
    }
    assert_eq!(*log.borrow(), vec![json!(1), json!(2)]);
}

#[test]
fn test_deep_bindings_see_into_shadow_roots() {
    let runtime = Runtime::new();
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::default();
    let (deep, scoped) = (log.clone(), log.clone());
    let definition = runtime
        .define(
            TemplateBuilder::new("host")
                .source("<div class=\"host\"></div>")
                .on_rendered(|template| {
                    let doc = template.document().unwrap();
                    let host = template.query(".host").unwrap().get(0).unwrap();
                    let shadow = doc.attach_shadow(host, ShadowRootMode::Open).unwrap();
                    doc.set_inner_html(shadow, "<button class=\"go\">Go</button>");
                })
                .event("deep click .go", move |_| deep.borrow_mut().push("deep"))
                .event("click .go", move |_| scoped.borrow_mut().push("scoped")),
        )
        .unwrap();
    let doc = Document::new();
    let template = runtime.create(&definition, None);
    template.attach(&doc, doc.body(), None).unwrap();

    let button = template.query_deep(".go").unwrap().get(0).unwrap();
    assert!(template.query(".go").unwrap().is_empty());
    doc.dispatch(button, Event::new("click").composed(true));
    assert_eq!(*log.borrow(), vec!["deep"]);
}

#[test]
fn test_global_and_bind_scopes() {
    let runtime = Runtime::new();
    let log: Rc<RefCell<Vec<String>>> = Rc::default();
    let (global, bound) = (log.clone(), log.clone());
    let definition = runtime
        .define(
            TemplateBuilder::new("panel")
                .source("<input class=\"field\">")
                .event("global resize", move |args| {
                    global.borrow_mut().push(format!("resize:{}", args.event.event_type))
                })
                .event("bind focus, change .field", move |args| {
                    bound.borrow_mut().push(args.event.event_type.to_string())
                }),
        )
        .unwrap();
    let doc = Document::from_html("<header></header>");
    let template = runtime.create(&definition, None);
    template.attach(&doc, doc.body(), None).unwrap();

    let header = Query::select(&doc, "header").unwrap().get(0).unwrap();
    doc.dispatch(header, Event::new("resize"));
    let field = template.query(".field").unwrap().get(0).unwrap();
    doc.dispatch(field, Event::new("focus").bubbles(false));
    doc.dispatch(field, Event::new("change"));
    assert_eq!(*log.borrow(), vec!["resize:resize", "focus", "change"]);
    assert_eq!(doc.listener_count(field), 2);
}

#[test]
fn test_key_bindings() {
    let runtime = Runtime::new();
    let log: Rc<RefCell<Vec<String>>> = Rc::default();
    let (save, jump) = (log.clone(), log.clone());
    let definition = runtime
        .define(
            TemplateBuilder::new("editor")
                .source("<textarea></textarea>")
                .key("ctrl+s, meta+s", move |args| {
                    save.borrow_mut().push(format!("save:{}", args.chord));
                    Some(false)
                })
                .key("g g", move |args| {
                    jump.borrow_mut().push(format!("top:{}", args.template.name()));
                    None
                }),
        )
        .unwrap();
    let doc = Document::new();
    let template = runtime.create(&definition, None);
    template.attach(&doc, doc.body(), None).unwrap();

    let ctrl = Modifiers {
        ctrl: true,
        ..Modifiers::default()
    };
    let event = doc.dispatch(doc.body(), Event::keydown("s", ctrl));
    assert!(event.default_prevented());

    let plain = doc.dispatch(doc.body(), Event::keydown("s", Modifiers::default()));
    assert!(!plain.default_prevented());

    doc.dispatch(doc.body(), Event::keydown("g", Modifiers::default()));
    doc.dispatch(doc.body(), Event::keydown("Shift", Modifiers::default()));
    let event = doc.dispatch(doc.body(), Event::keydown("g", Modifiers::default()));
    assert!(!event.default_prevented());
    // The history was cleared, so a third press starts a new sequence.
    doc.dispatch(doc.body(), Event::keydown("g", Modifiers::default()));

    assert_eq!(*log.borrow(), vec!["save:ctrl+s", "top:editor"]);

    template.destroy();
    doc.dispatch(doc.body(), Event::keydown("s", ctrl));
    assert_eq!(log.borrow().len(), 2);
}
