//! Events, listeners and dispatch.
//!
//! Dispatch follows the DOM model closely enough for delegation to work:
//! a capture pass from the root down, then a bubble pass back up. Events that
//! are `composed` cross shadow boundaries, and `target` is retargeted to the
//! shadow host for listeners outside the shadow tree.

use crate::document::{Document, DomTree};
use crate::node::{NodeId, NodeKind};
use smol_str::SmolStr;
use std::rc::Rc;

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Keyboard modifier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// Control key.
    pub ctrl: bool,
    /// Shift key.
    pub shift: bool,
    /// Alt / option key.
    pub alt: bool,
    /// Meta / command key.
    pub meta: bool,
}

/// A dispatched event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The event type, e.g. `click`.
    pub event_type: SmolStr,
    /// Whether the event bubbles.
    pub bubbles: bool,
    /// Whether the event crosses shadow boundaries.
    pub composed: bool,
    /// Key name for keyboard events.
    pub key: Option<String>,
    /// Modifier state for keyboard and pointer events.
    pub modifiers: Modifiers,
    /// Arbitrary payload.
    pub detail: serde_json::Value,
    target: Option<NodeId>,
    original_target: Option<NodeId>,
    current_target: Option<NodeId>,
    path: Vec<NodeId>,
    default_prevented: bool,
    propagation_stopped: bool,
    immediate_stopped: bool,
}

impl Event {
    /// A bubbling, non-composed event.
    pub fn new(event_type: &str) -> Self {
        Self {
            event_type: SmolStr::new(event_type),
            bubbles: true,
            composed: false,
            key: None,
            modifiers: Modifiers::default(),
            detail: serde_json::Value::Null,
            target: None,
            original_target: None,
            current_target: None,
            path: Vec::new(),
            default_prevented: false,
            propagation_stopped: false,
            immediate_stopped: false,
        }
    }

    /// A composed `keydown` event for `key`.
    pub fn keydown(key: &str, modifiers: Modifiers) -> Self {
        Self {
            key: Some(key.to_string()),
            modifiers,
            ..Self::new("keydown").composed(true)
        }
    }

    /// Sets `bubbles`.
    pub fn bubbles(mut self, bubbles: bool) -> Self {
        self.bubbles = bubbles;
        self
    }

    /// Sets `composed`.
    pub fn composed(mut self, composed: bool) -> Self {
        self.composed = composed;
        self
    }

    /// Sets the payload.
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }

    /// The target as seen by the current listener (retargeted across shadow
    /// boundaries).
    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    /// The node the event was dispatched to.
    pub fn original_target(&self) -> Option<NodeId> {
        self.original_target
    }

    /// The node whose listener is running.
    pub fn current_target(&self) -> Option<NodeId> {
        self.current_target
    }

    /// The propagation path, target first.
    pub fn composed_path(&self) -> &[NodeId] {
        &self.path
    }

    /// Requests that the default action not happen.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Whether [`Event::prevent_default`] was called.
    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Stops propagation after the current node.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Stops propagation and skips remaining listeners on the current node.
    pub fn stop_immediate_propagation(&mut self) {
        self.propagation_stopped = true;
        self.immediate_stopped = true;
    }

    /// Whether propagation was stopped.
    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

/// A listener callback.
pub type Listener = Rc<dyn Fn(&Document, &mut Event)>;

/// Listener registration options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListenerOptions {
    /// Run during the capture pass.
    pub capture: bool,
    /// Remove the listener before its first invocation.
    pub once: bool,
    /// Tag used to remove a group of listeners at once.
    pub owner: Option<u64>,
}

struct ListenerEntry {
    id: ListenerId,
    target: NodeId,
    event_type: SmolStr,
    options: ListenerOptions,
    callback: Listener,
}

#[derive(Default)]
pub(crate) struct ListenerStore {
    next: u64,
    entries: Vec<ListenerEntry>,
}

impl ListenerStore {
    fn matching(&self, target: NodeId, event_type: &str, capture: bool) -> Vec<ListenerId> {
        self.entries
            .iter()
            .filter(|e| {
                e.target == target && e.event_type == event_type && e.options.capture == capture
            })
            .map(|e| e.id)
            .collect()
    }

    fn take_for_call(&mut self, id: ListenerId) -> Option<Listener> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        if self.entries[index].options.once {
            Some(self.entries.remove(index).callback)
        } else {
            Some(self.entries[index].callback.clone())
        }
    }
}

fn retarget(tree: &DomTree, target: NodeId, listener_node: NodeId) -> NodeId {
    let mut current = target;
    loop {
        let root = tree.tree_root(current);
        match tree.node(root).map(|n| &n.kind) {
            Some(NodeKind::ShadowRoot { host, .. })
                if !tree.composed_contains(root, listener_node) =>
            {
                current = *host;
            }
            _ => return current,
        }
    }
}

fn event_path(tree: &DomTree, target: NodeId, composed: bool) -> Vec<NodeId> {
    let mut path = vec![target];
    let mut current = target;
    loop {
        let next = match tree.node(current).map(|n| &n.kind) {
            Some(NodeKind::ShadowRoot { host, .. }) => composed.then_some(*host),
            Some(_) => tree.parent(current),
            None => None,
        };
        match next {
            Some(node) => {
                path.push(node);
                current = node;
            }
            None => break,
        }
    }
    path
}

impl Document {
    /// Registers a listener for `event_type` on `target`.
    pub fn add_listener(
        &self,
        target: NodeId,
        event_type: &str,
        options: ListenerOptions,
        callback: impl Fn(&Document, &mut Event) + 'static,
    ) -> ListenerId {
        self.with_mut(|t| {
            t.listeners.next += 1;
            let id = ListenerId(t.listeners.next);
            t.listeners.entries.push(ListenerEntry {
                id,
                target,
                event_type: SmolStr::new(event_type),
                options,
                callback: Rc::new(callback),
            });
            id
        })
    }

    /// Removes a listener. Returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let removed = self.with_mut(|t| {
            let index = t.listeners.entries.iter().position(|e| e.id == id)?;
            Some(t.listeners.entries.remove(index))
        });
        removed.is_some()
    }

    /// Removes every listener registered with `owner`.
    pub fn remove_listeners_by_owner(&self, owner: u64) -> usize {
        // Callbacks may own document handles; drop them outside the borrow.
        let removed: Vec<ListenerEntry> = self.with_mut(|t| {
            let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut t.listeners.entries)
                .into_iter()
                .partition(|e| e.options.owner == Some(owner));
            t.listeners.entries = kept;
            removed
        });
        removed.len()
    }

    /// Removes listeners on `target`, of one type or of every type.
    pub fn remove_listeners(&self, target: NodeId, event_type: Option<&str>) -> usize {
        let removed: Vec<ListenerEntry> = self.with_mut(|t| {
            let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut t.listeners.entries)
                .into_iter()
                .partition(|e| {
                    e.target == target && event_type.map_or(true, |ty| e.event_type == ty)
                });
            t.listeners.entries = kept;
            removed
        });
        removed.len()
    }

    /// Whether a listener is still registered.
    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.with(|t| t.listeners.entries.iter().any(|e| e.id == id))
    }

    /// Number of listeners registered on `target`.
    pub fn listener_count(&self, target: NodeId) -> usize {
        self.with(|t| {
            t.listeners
                .entries
                .iter()
                .filter(|e| e.target == target)
                .count()
        })
    }

    /// Number of listeners registered on any node.
    pub fn total_listener_count(&self) -> usize {
        self.with(|t| t.listeners.entries.len())
    }

    /// Dispatches `event` at `target` and returns it after propagation.
    pub fn dispatch(&self, target: NodeId, mut event: Event) -> Event {
        let path = self.with(|t| event_path(t, target, event.composed));
        event.original_target = Some(target);
        event.path = path.clone();
        tracing::trace!(event = %event.event_type, %target, path = path.len(), "dispatch");

        // Capture pass, root first.
        for &node in path.iter().rev() {
            if self.invoke(node, &mut event, true) {
                return self.finish(event);
            }
        }
        // Bubble pass, target first.
        for (i, &node) in path.iter().enumerate() {
            if i > 0 && !event.bubbles {
                break;
            }
            if self.invoke(node, &mut event, false) {
                break;
            }
        }
        self.finish(event)
    }

    fn finish(&self, mut event: Event) -> Event {
        event.current_target = None;
        event.target = event.original_target;
        event
    }

    /// Runs the listeners of one node; returns whether propagation stopped.
    fn invoke(&self, node: NodeId, event: &mut Event, capture: bool) -> bool {
        let (ids, target) = self.with(|t| {
            let ids = t.listeners.matching(node, &event.event_type, capture);
            let target = event.original_target.map(|o| retarget(t, o, node));
            (ids, target)
        });
        if ids.is_empty() {
            return event.propagation_stopped;
        }
        event.current_target = Some(node);
        event.target = target;
        for id in ids {
            // Listeners removed by an earlier listener are skipped.
            let Some(callback) = self.with_mut(|t| t.listeners.take_for_call(id)) else {
                continue;
            };
            callback(self, event);
            if event.immediate_stopped {
                break;
            }
        }
        event.propagation_stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShadowRootMode;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    fn log() -> Rc<RefCell<Vec<String>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn test_bubbling_order() {
        let doc = Document::from_html("<div><button>x</button></div>");
        let div = doc.element_children(doc.body())[0];
        let button = doc.element_children(div)[0];
        let seen = log();
        for (node, name) in [(button, "button"), (div, "div"), (doc.body(), "body")] {
            let seen = seen.clone();
            doc.add_listener(node, "click", ListenerOptions::default(), move |_, e| {
                assert_eq!(e.target(), Some(button));
                seen.borrow_mut().push(name.to_string());
            });
        }
        doc.dispatch(button, Event::new("click"));
        assert_eq!(*seen.borrow(), vec!["button", "div", "body"]);
    }

    #[test]
    fn test_stop_propagation_and_prevent_default() {
        let doc = Document::from_html("<a>x</a>");
        let a = doc.element_children(doc.body())[0];
        let seen = log();
        doc.add_listener(a, "click", ListenerOptions::default(), |_, e| {
            e.prevent_default();
            e.stop_propagation();
        });
        let s = seen.clone();
        doc.add_listener(doc.body(), "click", ListenerOptions::default(), move |_, _| {
            s.borrow_mut().push("body".into())
        });
        let event = doc.dispatch(a, Event::new("click"));
        assert!(event.default_prevented());
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_once_listener() {
        let doc = Document::new();
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        let options = ListenerOptions {
            once: true,
            ..Default::default()
        };
        doc.add_listener(doc.body(), "x", options, move |_, _| *c.borrow_mut() += 1);
        doc.dispatch(doc.body(), Event::new("x"));
        doc.dispatch(doc.body(), Event::new("x"));
        assert_eq!(*count.borrow(), 1);
        assert_eq!(doc.listener_count(doc.body()), 0);
    }

    #[test]
    fn test_composed_event_retargets_to_host() {
        let doc = Document::new();
        let host = doc.create_element("x-item");
        doc.append_child(doc.body(), host).unwrap();
        let shadow = doc.attach_shadow(host, ShadowRootMode::Open).unwrap();
        let inner = doc.create_element("button");
        doc.append_child(shadow, inner).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        doc.add_listener(doc.body(), "click", ListenerOptions::default(), move |_, e| {
            s.borrow_mut().push(e.target());
        });
        doc.dispatch(inner, Event::new("click"));
        assert!(seen.borrow().is_empty());

        let event = doc.dispatch(inner, Event::new("click").composed(true));
        assert_eq!(*seen.borrow(), vec![Some(host)]);
        assert_eq!(event.composed_path()[0], inner);
        assert!(event.composed_path().contains(&shadow));
    }

    #[test]
    fn test_remove_by_owner() {
        let doc = Document::new();
        let options = ListenerOptions {
            owner: Some(7),
            ..Default::default()
        };
        doc.add_listener(doc.body(), "a", options, |_, _| {});
        doc.add_listener(doc.root(), "b", options, |_, _| {});
        doc.add_listener(doc.root(), "b", ListenerOptions::default(), |_, _| {});
        assert_eq!(doc.remove_listeners_by_owner(7), 2);
        assert_eq!(doc.total_listener_count(), 1);
    }

    #[test]
    fn test_listener_removed_during_dispatch_is_skipped() {
        let doc = Document::new();
        let body = doc.body();
        let seen = log();
        let second: Rc<RefCell<Option<ListenerId>>> = Rc::new(RefCell::new(None));
        let second_ref = second.clone();
        doc.add_listener(body, "x", ListenerOptions::default(), move |doc, _| {
            if let Some(id) = *second_ref.borrow() {
                doc.remove_listener(id);
            }
        });
        let s = seen.clone();
        let id = doc.add_listener(body, "x", ListenerOptions::default(), move |_, _| {
            s.borrow_mut().push("second".into())
        });
        *second.borrow_mut() = Some(id);
        doc.dispatch(body, Event::new("x"));
        assert!(seen.borrow().is_empty());
    }
}
