//! Live parts: the reactions that keep rendered DOM in step with data.
//!
//! A fragment is hydrated by parsing its marked markup once and replacing
//! every marker with a part. Each part owns one reaction that re-evaluates
//! only what it read:
//!
//! - text parts rewrite one text node
//! - attribute parts set, drop or rewrite attributes on one element
//! - block parts (`if`, `each`, `rerender`, `guard`, raw HTML) own the nodes
//!   between an empty start and end text node and rebuild them in a child
//!   [`Region`]
//!
//! Regions own reactions and partial instances, so tearing down a block
//! disposes exactly what it created.

use crate::error::EvalError;
use crate::eval::{entries, unique_identities, Binding, Env, ItemFrame, Scope};
use crate::program::{
    attribute_marker, comment_marker, has_segments, split_segments, EachPart, Fragment, IfPart,
    Part, RerenderPart, Segment,
};
use crate::render::{attribute_value, part_text, select_branch, static_data, tag_body_attributes};
use crate::template::{Template, WeakTemplate};
use crate::value::{stringify, strict_eq};
use dom_tree::{Document, NodeId, NodeType};
use reactive::{Reaction, Signal};
use rustc_hash::FxHashMap;
use serde_json::Value;
use smol_str::SmolStr;
use std::cell::RefCell;
use std::rc::Rc;
use template_compiler::{ExpressionContext, ExpressionNode, PartialNode, RerenderMode};

/// Owner of the reactions and partial instances created for one piece of
/// rendered content.
#[derive(Default)]
pub(crate) struct Region {
    reactions: RefCell<Vec<Reaction>>,
    children: RefCell<Vec<Rc<Region>>>,
    templates: RefCell<Vec<Template>>,
}

impl Region {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// A nested region, disposed with this one.
    pub(crate) fn child(self: &Rc<Self>) -> Rc<Region> {
        let child = Region::new();
        self.children.borrow_mut().push(child.clone());
        child
    }

    pub(crate) fn own(&self, reaction: Reaction) {
        self.reactions.borrow_mut().push(reaction);
    }

    pub(crate) fn adopt(&self, template: Template) {
        self.templates.borrow_mut().push(template);
    }

    /// Detaches and disposes a child region, returning the templates it
    /// created.
    pub(crate) fn release(&self, child: &Rc<Region>) -> Vec<Template> {
        self.children
            .borrow_mut()
            .retain(|existing| !Rc::ptr_eq(existing, child));
        child.dispose()
    }

    /// Disposes every reaction in this region and below, returning the
    /// templates created here for the caller to destroy.
    pub(crate) fn dispose(&self) -> Vec<Template> {
        let reactions = std::mem::take(&mut *self.reactions.borrow_mut());
        for reaction in reactions {
            reaction.dispose();
        }
        let children = std::mem::take(&mut *self.children.borrow_mut());
        let mut templates = std::mem::take(&mut *self.templates.borrow_mut());
        for child in children {
            templates.extend(child.dispose());
        }
        templates
    }

    /// Live reactions in this region and below.
    pub(crate) fn reaction_count(&self) -> usize {
        self.reactions.borrow().len()
            + self
                .children
                .borrow()
                .iter()
                .map(|child| child.reaction_count())
                .sum::<usize>()
    }
}

fn destroy_all(templates: Vec<Template>) {
    for template in templates {
        template.destroy();
    }
}

/// What every part of one template instance shares.
#[derive(Clone)]
pub(crate) struct Live {
    pub(crate) template: WeakTemplate,
    pub(crate) document: Document,
}

/// The sibling range `start..=end`.
pub(crate) fn range_nodes(doc: &Document, start: NodeId, end: NodeId) -> Vec<NodeId> {
    let mut nodes = vec![start];
    let mut current = start;
    while current != end {
        match doc.next_sibling(current) {
            Some(next) => {
                nodes.push(next);
                current = next;
            }
            None => break,
        }
    }
    nodes
}

/// Removes every node strictly between `start` and `end`.
fn clear_between(doc: &Document, start: NodeId, end: NodeId) {
    while let Some(next) = doc.next_sibling(start) {
        if next == end {
            break;
        }
        doc.remove(next);
    }
}

fn insert_before_marker(doc: &Document, marker: NodeId, node: NodeId) {
    let Some(parent) = doc.parent(marker) else {
        tracing::warn!(%marker, "part marker is detached");
        return;
    };
    if let Err(error) = doc.insert_before(parent, node, Some(marker)) {
        tracing::warn!(%error, "failed to insert rendered content");
    }
}

fn insert_after(doc: &Document, reference: NodeId, node: NodeId) {
    if let Err(error) = doc.insert_after(reference, node) {
        tracing::warn!(%error, "failed to place rendered content");
    }
}

/// Replaces a marker comment with an empty start and end text node.
fn replace_with_range(doc: &Document, marker: NodeId) -> (NodeId, NodeId) {
    let start = doc.create_text("");
    let end = doc.create_text("");
    insert_before_marker(doc, marker, start);
    insert_before_marker(doc, marker, end);
    doc.remove(marker);
    (start, end)
}

/// Parses and hydrates `fragment`, returning a detached document fragment.
pub(crate) fn build(
    live: &Live,
    template: &Template,
    fragment: &Rc<Fragment>,
    scope: &Rc<Scope>,
    region: &Rc<Region>,
) -> NodeId {
    let doc = &live.document;
    let root = doc.parse_fragment(&fragment.marked);
    for node in doc.descendants(root) {
        match doc.node_type(node) {
            Some(NodeType::Comment) => {
                let text = doc.node_text(node).unwrap_or_default();
                if let Some(index) = comment_marker(&text) {
                    bind_marker(live, template, fragment, index, node, scope, region);
                } else if has_segments(&text) {
                    bind_segments(live, template, fragment, node, None, &text, scope, region);
                }
            }
            Some(NodeType::Text) => {
                let text = doc.node_text(node).unwrap_or_default();
                if has_segments(&text) {
                    bind_segments(live, template, fragment, node, None, &text, scope, region);
                }
            }
            Some(NodeType::Element) => {
                bind_attributes(live, template, fragment, node, scope, region);
            }
            _ => {}
        }
    }
    root
}

/// Builds `fragment` into a fresh region and inserts it before `end`.
fn rebuild(
    live: &Live,
    template: &Template,
    fragment: &Rc<Fragment>,
    scope: &Rc<Scope>,
    region: &Rc<Region>,
    end: NodeId,
) {
    let runtime = template.runtime();
    let built = runtime.rendering(|| {
        runtime
            .reactor()
            .untrack(|| build(live, template, fragment, scope, region))
    });
    insert_before_marker(&live.document, end, built);
    runtime.activate_queued();
}

#[allow(clippy::too_many_arguments)]
fn bind_marker(
    live: &Live,
    template: &Template,
    fragment: &Rc<Fragment>,
    index: usize,
    marker: NodeId,
    scope: &Rc<Scope>,
    region: &Rc<Region>,
) {
    let Some(part) = fragment.parts.get(index) else {
        return;
    };
    match part {
        Part::Expression(node) if node.unsafe_html => {
            bind_raw_html(live, template, node.clone(), marker, scope, region)
        }
        Part::Expression(node) => bind_text(live, template, node.clone(), marker, scope, region),
        Part::If(part) => bind_if(live, template, part.clone(), marker, scope, region),
        Part::Each(part) => bind_each(live, template, part.clone(), marker, scope, region),
        Part::Partial(node) => bind_partial(live, template, node, marker, scope, region),
        Part::Slot(name) => {
            if let Some(slot) = template.slot(name) {
                let built = build(live, template, &slot, scope, region);
                insert_before_marker(&live.document, marker, built);
            }
            live.document.remove(marker);
        }
        Part::Rerender(part) => bind_rerender(live, template, part.clone(), marker, scope, region),
    }
}

fn bind_text(
    live: &Live,
    template: &Template,
    node: Rc<ExpressionNode>,
    marker: NodeId,
    scope: &Rc<Scope>,
    region: &Rc<Region>,
) {
    let doc = &live.document;
    let text = doc.create_text("");
    insert_before_marker(doc, marker, text);
    doc.remove(marker);
    let (live, scope) = (live.clone(), scope.clone());
    region.own(template.runtime().reactor().reaction(move || {
        let Some(template) = live.template.upgrade() else {
            return;
        };
        let value = Env::new(&template, &scope).evaluate(&node.expr, &node.source);
        live.document.set_node_text(text, &stringify(&value));
    }));
}

fn bind_raw_html(
    live: &Live,
    template: &Template,
    node: Rc<ExpressionNode>,
    marker: NodeId,
    scope: &Rc<Scope>,
    region: &Rc<Region>,
) {
    let (start, end) = replace_with_range(&live.document, marker);
    let (live, scope) = (live.clone(), scope.clone());
    region.own(template.runtime().reactor().reaction(move || {
        let Some(template) = live.template.upgrade() else {
            return;
        };
        let html = stringify(&Env::new(&template, &scope).evaluate(&node.expr, &node.source));
        let doc = &live.document;
        clear_between(doc, start, end);
        let parsed = doc.parse_fragment(&html);
        insert_before_marker(doc, end, parsed);
    }));
}

fn bind_if(
    live: &Live,
    template: &Template,
    part: Rc<IfPart>,
    marker: NodeId,
    scope: &Rc<Scope>,
    region: &Rc<Region>,
) {
    let (start, end) = replace_with_range(&live.document, marker);
    let (live, scope, parent) = (live.clone(), scope.clone(), region.clone());
    let mut current: Option<(usize, Rc<Region>)> = None;
    region.own(template.runtime().reactor().reaction(move || {
        let Some(template) = live.template.upgrade() else {
            return;
        };
        let selected = select_branch(&Env::new(&template, &scope), &part);
        if current.as_ref().map(|(index, _)| *index) == Some(selected) {
            return;
        }
        if let Some((_, old)) = current.take() {
            destroy_all(parent.release(&old));
        }
        clear_between(&live.document, start, end);
        let child = parent.child();
        rebuild(&live, &template, &part.branches[selected], &scope, &child, end);
        tracing::trace!(template = %template.name(), branch = selected, "if branch switched");
        current = Some((selected, child));
    }));
}

fn bind_rerender(
    live: &Live,
    template: &Template,
    part: Rc<RerenderPart>,
    marker: NodeId,
    scope: &Rc<Scope>,
    region: &Rc<Region>,
) {
    let (start, end) = replace_with_range(&live.document, marker);
    let (live, scope, parent) = (live.clone(), scope.clone(), region.clone());
    let mut current: Option<(Value, Rc<Region>)> = None;
    region.own(template.runtime().reactor().reaction(move || {
        let Some(template) = live.template.upgrade() else {
            return;
        };
        let value = Env::new(&template, &scope).evaluate(&part.expression, &part.source);
        if part.mode == RerenderMode::Guard {
            if let Some((last, _)) = &current {
                if strict_eq(last, &value) {
                    return;
                }
            }
        }
        if let Some((_, old)) = current.take() {
            destroy_all(parent.release(&old));
        }
        clear_between(&live.document, start, end);
        let child = parent.child();
        rebuild(&live, &template, &part.content, &scope, &child, end);
        current = Some((value, child));
    }));
}

/// One rendered item of an `each` block.
struct EachItem {
    identity: String,
    start: NodeId,
    end: NodeId,
    region: Rc<Region>,
    item: Signal<Value>,
    index: Signal<Value>,
    key: Signal<Value>,
}

#[derive(Default)]
struct EachState {
    items: Vec<EachItem>,
    fallback: Option<Rc<Region>>,
}

fn bind_each(
    live: &Live,
    template: &Template,
    part: Rc<EachPart>,
    marker: NodeId,
    scope: &Rc<Scope>,
    region: &Rc<Region>,
) {
    let (start, end) = replace_with_range(&live.document, marker);
    let (live, scope, parent) = (live.clone(), scope.clone(), region.clone());
    let mut state = EachState::default();
    region.own(template.runtime().reactor().reaction(move || {
        let Some(template) = live.template.upgrade() else {
            return;
        };
        update_each(&live, &template, &part, &scope, &parent, &mut state, start, end);
    }));
}

#[allow(clippy::too_many_arguments)]
fn update_each(
    live: &Live,
    template: &Template,
    part: &EachPart,
    scope: &Rc<Scope>,
    region: &Rc<Region>,
    state: &mut EachState,
    start: NodeId,
    end: NodeId,
) {
    let doc = &live.document;
    let env = Env::new(template, scope);
    let collection = env.evaluate(&part.over, &part.over_source);
    let list = match entries(collection) {
        Ok(list) => list,
        Err(found) => {
            template.record_error(EvalError::NotIterable {
                expression: part.over_source.clone(),
                template: template.name().clone(),
                found,
            });
            Vec::new()
        }
    };

    if list.is_empty() {
        for item in state.items.drain(..) {
            remove_item(doc, region, item);
        }
        if state.fallback.is_none() {
            if let Some(fallback) = &part.else_content {
                let child = region.child();
                rebuild(live, template, fallback, scope, &child, end);
                state.fallback = Some(child);
            }
        }
        return;
    }
    if let Some(fallback) = state.fallback.take() {
        destroy_all(region.release(&fallback));
        clear_between(doc, start, end);
    }

    let identities = match &part.key {
        Some(key) => unique_identities(list.iter().map(|entry| {
            let item_scope = scope.child(fixed_frame(part, entry.item.clone(), entry.index, entry.key.clone()));
            Env::new(template, &item_scope).evaluate(key, &part.over_source)
        })),
        None => unique_identities(list.iter().map(|entry| entry.item.clone())),
    };

    let runtime = template.runtime();
    let reactor = runtime.reactor();
    let mut previous: FxHashMap<String, EachItem> = state
        .items
        .drain(..)
        .map(|item| (item.identity.clone(), item))
        .collect();
    let mut next: Vec<(EachItem, Option<NodeId>)> = Vec::with_capacity(list.len());
    for (entry, identity) in list.into_iter().zip(identities) {
        if let Some(existing) = previous.remove(&identity) {
            existing.item.set(entry.item);
            existing.index.set(Value::from(entry.index));
            existing.key.set(entry.key);
            next.push((existing, None));
            continue;
        }
        let item = reactor.signal(entry.item);
        let index = reactor.signal(Value::from(entry.index));
        let key = reactor.signal(entry.key);
        let item_scope = scope.child(ItemFrame {
            item: Binding::Live(item.clone()),
            index: Binding::Live(index.clone()),
            key: Binding::Live(key.clone()),
            item_as: part.item_as.clone(),
            index_as: part.index_as.clone(),
        });
        let item_region = region.child();
        let content = runtime.rendering(|| {
            reactor.untrack(|| build(live, template, &part.content, &item_scope, &item_region))
        });
        let item_start = doc.create_text("");
        let item_end = doc.create_text("");
        let holder = doc.create_fragment();
        for node in [item_start, content, item_end] {
            if let Err(error) = doc.append_child(holder, node) {
                tracing::warn!(%error, "failed to assemble each item");
            }
        }
        next.push((
            EachItem {
                identity,
                start: item_start,
                end: item_end,
                region: item_region,
                item,
                index,
                key,
            },
            Some(holder),
        ));
    }

    for (_, stale) in previous {
        remove_item(doc, region, stale);
    }

    let mut after = start;
    for (item, holder) in &next {
        match holder {
            Some(holder) => insert_after(doc, after, *holder),
            None if doc.prev_sibling(item.start) != Some(after) => {
                let moving = doc.create_fragment();
                for node in range_nodes(doc, item.start, item.end) {
                    if let Err(error) = doc.append_child(moving, node) {
                        tracing::warn!(%error, "failed to move each item");
                    }
                }
                insert_after(doc, after, moving);
            }
            None => {}
        }
        after = item.end;
    }
    state.items = next.into_iter().map(|(item, _)| item).collect();
    runtime.activate_queued();
}

fn fixed_frame(part: &EachPart, item: Value, index: usize, key: Value) -> ItemFrame {
    ItemFrame {
        item: Binding::Fixed(item),
        index: Binding::Fixed(Value::from(index)),
        key: Binding::Fixed(key),
        item_as: part.item_as.clone(),
        index_as: part.index_as.clone(),
    }
}

fn remove_item(doc: &Document, region: &Region, item: EachItem) {
    destroy_all(region.release(&item.region));
    for node in range_nodes(doc, item.start, item.end) {
        doc.remove(node);
    }
}

fn bind_partial(
    live: &Live,
    template: &Template,
    node: &PartialNode,
    marker: NodeId,
    scope: &Rc<Scope>,
    region: &Rc<Region>,
) {
    let doc = &live.document;
    let Some(definition) = template.resolve_partial(&node.name) else {
        template.record_error(EvalError::UnknownPartial {
            partial: node.name.clone(),
            template: template.name().clone(),
        });
        doc.remove(marker);
        return;
    };
    let runtime = template.runtime();
    let child = runtime.create(&definition, Some(Value::Object(static_data(node))));
    for arg in &node.reactive_data {
        let (live, scope, arg, target) = (
            live.clone(),
            scope.clone(),
            arg.clone(),
            child.downgrade(),
        );
        region.own(runtime.reactor().reaction(move || {
            let (Some(template), Some(child)) = (live.template.upgrade(), target.upgrade()) else {
                return;
            };
            let value = Env::new(&template, &scope).evaluate(&arg.expr, &arg.source);
            child.state().set(&arg.name, value);
        }));
    }
    let Some(parent) = doc.parent(marker) else {
        return;
    };
    match child.mount_at(doc, parent, Some(marker), Some(template)) {
        Ok(()) => region.adopt(child),
        Err(error) => tracing::warn!(%error, partial = %node.name, "failed to mount partial"),
    }
    doc.remove(marker);
}

fn bind_attributes(
    live: &Live,
    template: &Template,
    fragment: &Rc<Fragment>,
    element: NodeId,
    scope: &Rc<Scope>,
    region: &Rc<Region>,
) {
    let doc = &live.document;
    for (name, value) in doc.attributes(element) {
        if let Some(index) = attribute_marker(&name) {
            doc.remove_attribute(element, &name);
            let Some(Part::Expression(node)) = fragment.parts.get(index) else {
                continue;
            };
            match &node.context {
                ExpressionContext::UnquotedAttribute { name } => {
                    bind_attribute(live, template, node.clone(), name.clone(), element, scope, region)
                }
                _ => bind_tag_body(live, template, node.clone(), element, scope, region),
            }
        } else if has_segments(&value) {
            bind_segments(live, template, fragment, element, Some(name), &value, scope, region);
        }
    }
}

fn bind_attribute(
    live: &Live,
    template: &Template,
    node: Rc<ExpressionNode>,
    name: SmolStr,
    element: NodeId,
    scope: &Rc<Scope>,
    region: &Rc<Region>,
) {
    let (live, scope) = (live.clone(), scope.clone());
    region.own(template.runtime().reactor().reaction(move || {
        let Some(template) = live.template.upgrade() else {
            return;
        };
        let value = Env::new(&template, &scope).evaluate(&node.expr, &node.source);
        match attribute_value(&value) {
            Some(value) => {
                live.document.set_attribute(element, &name, &value);
            }
            None => {
                live.document.remove_attribute(element, &name);
            }
        }
    }));
}

fn bind_tag_body(
    live: &Live,
    template: &Template,
    node: Rc<ExpressionNode>,
    element: NodeId,
    scope: &Rc<Scope>,
    region: &Rc<Region>,
) {
    let (live, scope) = (live.clone(), scope.clone());
    let mut applied: Vec<SmolStr> = Vec::new();
    region.own(template.runtime().reactor().reaction(move || {
        let Some(template) = live.template.upgrade() else {
            return;
        };
        let value = Env::new(&template, &scope).evaluate(&node.expr, &node.source);
        let doc = &live.document;
        for name in applied.drain(..) {
            doc.remove_attribute(element, &name);
        }
        for (name, value) in tag_body_attributes(&value) {
            doc.set_attribute(element, &name, &value);
            applied.push(name);
        }
    }));
}

/// Binds a text node, comment or attribute value holding sentinel
/// segments. `attribute` names the attribute; `None` targets the node text.
#[allow(clippy::too_many_arguments)]
fn bind_segments(
    live: &Live,
    template: &Template,
    fragment: &Rc<Fragment>,
    node: NodeId,
    attribute: Option<SmolStr>,
    text: &str,
    scope: &Rc<Scope>,
    region: &Rc<Region>,
) {
    let segments = split_segments(text);
    let (live, scope, fragment) = (live.clone(), scope.clone(), fragment.clone());
    region.own(template.runtime().reactor().reaction(move || {
        let Some(template) = live.template.upgrade() else {
            return;
        };
        let env = Env::new(&template, &scope);
        let mut out = String::new();
        for segment in &segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Part(index) => {
                    if let Some(part) = fragment.parts.get(*index) {
                        out.push_str(&part_text(&env, part));
                    }
                }
            }
        }
        match &attribute {
            Some(name) => {
                live.document.set_attribute(node, name, &out);
            }
            None => live.document.set_node_text(node, &out),
        }
    }));
}
