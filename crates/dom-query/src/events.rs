//! Direct and delegated listeners, triggering and one-shot waits.

use crate::error::QueryError;
use crate::query::Query;
use dom_tree::{Document, Event, ListenerId, ListenerOptions, NodeId, Selector};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Options for [`Query::on_next`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnNextOptions {
    /// Only resolve for events whose path hits a match below the bound
    /// element.
    pub selector: Option<String>,
    /// Give up after this long.
    pub timeout: Option<Duration>,
}

/// Removes the listeners of an [`Query::on_next`] wait when the wait ends,
/// including when its future is dropped before completing.
struct ListenerGuard {
    doc: Document,
    ids: Rc<RefCell<Vec<ListenerId>>>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        for id in self.ids.borrow_mut().drain(..) {
            self.doc.remove_listener(id);
        }
    }
}

/// Finds the delegation match for an event running at its current target:
/// the first node on the propagation path, below the current target, that
/// matches `selector`. With `deep`, nodes inside shadow trees count too;
/// otherwise the search starts at the retargeted target.
pub fn delegated_target(
    doc: &Document,
    event: &Event,
    selector: &Selector,
    deep: bool,
) -> Option<NodeId> {
    let current = event.current_target()?;
    let path = event.composed_path();
    let start = if deep {
        0
    } else {
        let target = event.target()?;
        path.iter().position(|&n| n == target)?
    };
    path[start..]
        .iter()
        .copied()
        .take_while(|&n| n != current)
        .find(|&n| doc.matches(n, selector))
}

impl Query {
    /// Registers a handler for each space-separated event type on every
    /// node. With a selector, the handler runs only for events from matching
    /// descendants and receives the matched node; without one it receives
    /// the bound node.
    pub fn listen(
        &self,
        events: &str,
        selector: Option<&str>,
        options: ListenerOptions,
        handler: impl Fn(&Document, &mut Event, NodeId) + 'static,
    ) -> Result<Vec<ListenerId>, QueryError> {
        let selector = selector.map(Selector::parse).transpose()?.map(Rc::new);
        Ok(self.register(events, selector, options, handler))
    }

    fn register(
        &self,
        events: &str,
        selector: Option<Rc<Selector>>,
        options: ListenerOptions,
        handler: impl Fn(&Document, &mut Event, NodeId) + 'static,
    ) -> Vec<ListenerId> {
        let handler = Rc::new(handler);
        let deep = self.options.pierce_shadow;
        let mut ids = Vec::new();
        for &node in &self.nodes {
            for event_type in events.split_whitespace() {
                let handler = handler.clone();
                let selector = selector.clone();
                let id = self.doc.add_listener(node, event_type, options, move |doc, event| {
                    let matched = match &selector {
                        Some(selector) => match delegated_target(doc, event, selector, deep) {
                            Some(matched) => matched,
                            None => return,
                        },
                        None => node,
                    };
                    handler(doc, event, matched);
                });
                ids.push(id);
            }
        }
        ids
    }

    /// Binds a direct handler.
    pub fn on(
        &self,
        events: &str,
        handler: impl Fn(&Document, &mut Event, NodeId) + 'static,
    ) -> &Self {
        self.register(events, None, ListenerOptions::default(), handler);
        self
    }

    /// Binds a delegated handler for descendants matching `selector`.
    pub fn on_delegated(
        &self,
        events: &str,
        selector: &str,
        handler: impl Fn(&Document, &mut Event, NodeId) + 'static,
    ) -> Result<&Self, QueryError> {
        self.listen(events, Some(selector), ListenerOptions::default(), handler)?;
        Ok(self)
    }

    /// Removes listeners of the given space-separated types, or of every type
    /// when `events` is `None`.
    pub fn off(&self, events: Option<&str>) -> &Self {
        for &node in &self.nodes {
            match events {
                Some(events) => {
                    for event_type in events.split_whitespace() {
                        self.doc.remove_listeners(node, Some(event_type));
                    }
                }
                None => {
                    self.doc.remove_listeners(node, None);
                }
            }
        }
        self
    }

    /// Dispatches a bubbling event of each space-separated type at every
    /// node.
    pub fn trigger(&self, events: &str) -> &Self {
        for &node in &self.nodes {
            for event_type in events.split_whitespace() {
                self.doc.dispatch(node, Event::new(event_type));
            }
        }
        self
    }

    /// Dispatches a copy of `event` at every node.
    pub fn dispatch(&self, event: &Event) -> &Self {
        for &node in &self.nodes {
            self.doc.dispatch(node, event.clone());
        }
        self
    }

    /// Waits for the next matching event on any node.
    ///
    /// Listeners are registered immediately; the returned future resolves with
    /// the first event, or fails with [`QueryError::Timeout`] once the timeout
    /// elapses. Every listener is removed on either path, and later events are
    /// ignored.
    pub fn on_next(
        &self,
        events: &str,
        options: OnNextOptions,
    ) -> Result<impl Future<Output = Result<Event, QueryError>>, QueryError> {
        let selector = options
            .selector
            .as_deref()
            .map(Selector::parse)
            .transpose()?;
        let (tx, rx) = oneshot::channel::<Event>();
        let sender = Rc::new(RefCell::new(Some(tx)));
        let ids: Rc<RefCell<Vec<ListenerId>>> = Rc::default();
        let deep = self.options.pierce_shadow;

        for &node in &self.nodes {
            for event_type in events.split_whitespace() {
                let sender = sender.clone();
                let registered = ids.clone();
                let selector = selector.clone();
                let id = self.doc.add_listener(
                    node,
                    event_type,
                    ListenerOptions::default(),
                    move |doc, event| {
                        if let Some(selector) = &selector {
                            if delegated_target(doc, event, selector, deep).is_none() {
                                return;
                            }
                        }
                        let Some(tx) = sender.borrow_mut().take() else {
                            return;
                        };
                        for &id in registered.borrow().iter() {
                            doc.remove_listener(id);
                        }
                        let _ = tx.send(event.clone());
                    },
                );
                ids.borrow_mut().push(id);
            }
        }
        drop(sender);

        let guard = ListenerGuard {
            doc: self.doc.clone(),
            ids,
        };
        let label = events.to_string();
        Ok(async move {
            let outcome = match options.timeout {
                Some(after) => match tokio::time::timeout(after, rx).await {
                    Ok(received) => received.map_err(|_| QueryError::Cancelled {
                        event: label.clone(),
                    }),
                    Err(_) => Err(QueryError::Timeout {
                        event: label.clone(),
                        after,
                    }),
                },
                None => rx.await.map_err(|_| QueryError::Cancelled {
                    event: label.clone(),
                }),
            };
            drop(guard);
            if let Err(err) = &outcome {
                tracing::debug!(%err, "on_next finished without an event");
            }
            outcome
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QueryOptions;
    use dom_tree::ShadowRootMode;
    use pretty_assertions::assert_eq;

    fn list_doc() -> Document {
        Document::from_html("<ul><li data-id=\"1\"><b>one</b></li><li data-id=\"2\">two</li></ul>")
    }

    #[test]
    fn test_direct_and_multiple_types() {
        let doc = list_doc();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let ul = Query::select(&doc, "ul").unwrap();
        ul.on("click focus", move |_, event, node| {
            s.borrow_mut().push((event.event_type.to_string(), node))
        });
        ul.trigger("focus click");
        assert_eq!(
            *seen.borrow(),
            vec![("focus".to_string(), ul[0]), ("click".to_string(), ul[0])]
        );
        ul.off(Some("click"));
        ul.trigger("click");
        assert_eq!(seen.borrow().len(), 2);
        ul.off(None);
        assert_eq!(doc.total_listener_count(), 0);
    }

    #[test]
    fn test_delegated_matches_ancestor_of_origin() {
        let doc = list_doc();
        let matched = Rc::new(RefCell::new(Vec::new()));
        let m = matched.clone();
        Query::select(&doc, "ul")
            .unwrap()
            .on_delegated("click", "li", move |doc, _, li| {
                m.borrow_mut().push(doc.get_attribute(li, "data-id").unwrap())
            })
            .unwrap();
        Query::select(&doc, "b").unwrap().trigger("click");
        Query::select(&doc, "ul").unwrap().trigger("click");
        assert_eq!(*matched.borrow(), vec!["1"]);
    }

    #[test]
    fn test_deep_delegation_sees_shadow_targets() {
        let doc = Document::from_html("<div id=\"root\"><x-btn></x-btn></div>");
        let host = doc.query_selector(doc.root(), "x-btn").unwrap().unwrap();
        let shadow = doc.attach_shadow(host, ShadowRootMode::Open).unwrap();
        doc.set_inner_html(shadow, "<button class=\"inner\">go</button>");
        let button = doc.query_selector(shadow, "button").unwrap().unwrap();

        let hits = Rc::new(RefCell::new(Vec::new()));
        for deep in [false, true] {
            let h = hits.clone();
            let options = QueryOptions {
                root: None,
                pierce_shadow: deep,
            };
            Query::select_with(&doc, "#root", options)
                .unwrap()
                .on_delegated("click", ".inner", move |_, _, _| h.borrow_mut().push(deep))
                .unwrap();
        }
        doc.dispatch(button, Event::new("click").composed(true));
        assert_eq!(*hits.borrow(), vec![true]);
    }

    #[test]
    fn test_delegated_selector_error() {
        let doc = list_doc();
        let ul = Query::select(&doc, "ul").unwrap();
        assert!(ul.on_delegated("click", "li[", |_, _, _| {}).is_err());
        assert_eq!(doc.total_listener_count(), 0);
    }

    #[tokio::test]
    async fn test_on_next_resolves_once_and_cleans_up() {
        let doc = list_doc();
        let ul = Query::select(&doc, "ul").unwrap();
        let next = ul
            .on_next(
                "click",
                OnNextOptions {
                    selector: Some("li".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(doc.total_listener_count(), 1);
        // Not from a matching descendant: ignored.
        ul.trigger("click");
        Query::select(&doc, "li").unwrap().trigger("click");
        let event = next.await.unwrap();
        assert_eq!(event.original_target(), Some(Query::select(&doc, "li").unwrap()[0]));
        assert_eq!(doc.total_listener_count(), 0);
    }

    #[tokio::test]
    async fn test_on_next_timeout_removes_listener() {
        let doc = list_doc();
        let ul = Query::select(&doc, "ul").unwrap();
        let next = ul
            .on_next(
                "click",
                OnNextOptions {
                    timeout: Some(Duration::from_millis(10)),
                    ..Default::default()
                },
            )
            .unwrap();
        let err = next.await.unwrap_err();
        assert!(matches!(err, QueryError::Timeout { .. }));
        assert_eq!(doc.total_listener_count(), 0);
    }

    #[tokio::test]
    async fn test_on_next_cancelled_when_listeners_removed() {
        let doc = list_doc();
        let ul = Query::select(&doc, "ul").unwrap();
        let next = ul.on_next("click", OnNextOptions::default()).unwrap();
        ul.off(None);
        assert!(matches!(next.await, Err(QueryError::Cancelled { .. })));
    }
}
