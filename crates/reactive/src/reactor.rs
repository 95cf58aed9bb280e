//! Reaction scheduling and dependency tracking.

use crate::signal::{Signal, SignalId};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::{Rc, Weak};

/// Upper bound on reaction runs per flush before the flush is abandoned.
const MAX_RUNS_PER_FLUSH: usize = 100_000;

/// Identifies a reaction. Ids grow monotonically, so ordering by id is
/// creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReactionId(u64);

impl fmt::Display for ReactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reaction#{}", self.0)
    }
}

type Effect = Rc<RefCell<Box<dyn FnMut()>>>;

struct ReactionSlot {
    effect: Effect,
    deps: FxHashSet<SignalId>,
}

/// A dependency-collector frame.
struct Frame {
    /// `None` while inside `untrack`.
    reads: Option<Vec<SignalId>>,
    writes: Vec<SignalId>,
}

impl Frame {
    fn tracking() -> Self {
        Self {
            reads: Some(Vec::new()),
            writes: Vec::new(),
        }
    }

    fn untracked() -> Self {
        Self {
            reads: None,
            writes: Vec::new(),
        }
    }
}

#[derive(Default)]
pub(crate) struct Inner {
    next_signal: u64,
    next_reaction: u64,
    subscribers: FxHashMap<SignalId, BTreeSet<ReactionId>>,
    reactions: BTreeMap<ReactionId, ReactionSlot>,
    frames: Vec<Frame>,
    pending: BTreeSet<ReactionId>,
    batch_depth: usize,
    /// Depth of reaction runs in progress.
    running: usize,
    flushing: bool,
}

impl Inner {
    pub(crate) fn new_signal(&mut self) -> SignalId {
        self.next_signal += 1;
        let id = SignalId(self.next_signal);
        self.subscribers.insert(id, BTreeSet::new());
        id
    }

    pub(crate) fn drop_signal(&mut self, id: SignalId) {
        self.subscribers.remove(&id);
    }

    pub(crate) fn record_read(&mut self, id: SignalId) {
        if let Some(Frame {
            reads: Some(reads), ..
        }) = self.frames.last_mut()
        {
            if !reads.contains(&id) {
                reads.push(id);
            }
        }
    }

    pub(crate) fn schedule_subscribers(&mut self, id: SignalId) {
        for frame in &mut self.frames {
            frame.writes.push(id);
        }
        if let Some(subscribers) = self.subscribers.get(&id) {
            self.pending.extend(subscribers.iter().copied());
        }
    }

    fn unsubscribe(&mut self, reaction: ReactionId, deps: &FxHashSet<SignalId>) {
        for dep in deps {
            if let Some(subscribers) = self.subscribers.get_mut(dep) {
                subscribers.remove(&reaction);
            }
        }
    }
}

/// Owner of the reactive graph.
///
/// Cloning a `Reactor` yields another handle to the same graph.
#[derive(Clone, Default)]
pub struct Reactor {
    inner: Rc<RefCell<Inner>>,
}

impl fmt::Debug for Reactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Reactor")
            .field("signals", &inner.subscribers.len())
            .field("reactions", &inner.reactions.len())
            .field("pending", &inner.pending.len())
            .finish()
    }
}

impl Reactor {
    /// Creates an empty reactive graph.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<Inner>> {
        Rc::downgrade(&self.inner)
    }

    /// Creates a signal holding `value`.
    pub fn signal<T: Clone + PartialEq + 'static>(&self, value: T) -> Signal<T> {
        Signal::new(self, value)
    }

    pub(crate) fn with_inner<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        f(&mut self.inner.borrow_mut())
    }

    /// Registers a reaction and runs it immediately.
    ///
    /// The reaction re-runs on the next flush after any signal it read during
    /// its previous run changes.
    pub fn reaction(&self, effect: impl FnMut() + 'static) -> Reaction {
        let id = {
            let mut inner = self.inner.borrow_mut();
            inner.next_reaction += 1;
            let id = ReactionId(inner.next_reaction);
            inner.reactions.insert(
                id,
                ReactionSlot {
                    effect: Rc::new(RefCell::new(Box::new(effect))),
                    deps: FxHashSet::default(),
                },
            );
            id
        };
        tracing::trace!(%id, "reaction created");
        self.run(id);
        Reaction {
            id,
            reactor: self.downgrade(),
        }
    }

    /// Runs one reaction, replacing its subscriptions with the reads it makes.
    fn run(&self, id: ReactionId) {
        let effect = {
            let mut inner = self.inner.borrow_mut();
            let Some(slot) = inner.reactions.get_mut(&id) else {
                return;
            };
            let effect = slot.effect.clone();
            let old = std::mem::take(&mut slot.deps);
            inner.unsubscribe(id, &old);
            inner.frames.push(Frame::tracking());
            inner.running += 1;
            effect
        };

        if let Ok(mut f) = effect.try_borrow_mut() {
            f();
        }

        let mut inner = self.inner.borrow_mut();
        inner.running -= 1;
        let Some(frame) = inner.frames.pop() else {
            return;
        };
        if !inner.reactions.contains_key(&id) {
            return;
        }
        let reads = frame.reads.unwrap_or_default();
        // A reaction that wrote a signal it reads runs again instead of
        // re-entering itself.
        if reads.iter().any(|read| frame.writes.contains(read)) {
            inner.pending.insert(id);
        }
        let mut deps = FxHashSet::default();
        for dep in reads {
            if let Some(subscribers) = inner.subscribers.get_mut(&dep) {
                subscribers.insert(id);
                deps.insert(dep);
            }
        }
        if let Some(slot) = inner.reactions.get_mut(&id) {
            slot.deps = deps;
        }
    }

    /// Runs every pending reaction until none remain.
    ///
    /// Reactions run in creation order; a reaction scheduled several times
    /// runs once. Calling `flush` from inside a reaction is a no-op; the
    /// enclosing flush picks up whatever was scheduled.
    pub fn flush(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.flushing || inner.running > 0 || inner.pending.is_empty() {
                return;
            }
            inner.flushing = true;
        }
        let mut runs = 0usize;
        loop {
            let next = self.inner.borrow_mut().pending.pop_first();
            let Some(id) = next else {
                break;
            };
            runs += 1;
            if runs > MAX_RUNS_PER_FLUSH {
                let mut inner = self.inner.borrow_mut();
                tracing::error!(
                    pending = inner.pending.len(),
                    "reaction flush exceeded {MAX_RUNS_PER_FLUSH} runs, dropping pending reactions"
                );
                inner.pending.clear();
                break;
            }
            self.run(id);
        }
        tracing::trace!(runs, "flush complete");
        self.inner.borrow_mut().flushing = false;
    }

    /// Runs `f` with flushing deferred until the outermost batch returns.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.borrow_mut().batch_depth += 1;
        let result = f();
        let done = {
            let mut inner = self.inner.borrow_mut();
            inner.batch_depth -= 1;
            inner.batch_depth == 0
        };
        if done {
            self.flush();
        }
        result
    }

    /// Whether a batch is open.
    pub fn in_batch(&self) -> bool {
        self.inner.borrow().batch_depth > 0
    }

    /// Runs `f` in a fresh tracking frame and returns the signals it read.
    pub fn track<R>(&self, f: impl FnOnce() -> R) -> (R, Vec<SignalId>) {
        self.inner.borrow_mut().frames.push(Frame::tracking());
        let result = f();
        let reads = self
            .inner
            .borrow_mut()
            .frames
            .pop()
            .and_then(|frame| frame.reads)
            .unwrap_or_default();
        (result, reads)
    }

    /// Runs `f` without recording any reads.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.borrow_mut().frames.push(Frame::untracked());
        let result = f();
        self.inner.borrow_mut().frames.pop();
        result
    }

    /// Whether a reaction or [`Reactor::track`] is currently recording reads.
    pub fn is_tracking(&self) -> bool {
        matches!(
            self.inner.borrow().frames.last(),
            Some(Frame { reads: Some(_), .. })
        )
    }

    /// Number of live reactions.
    pub fn reaction_count(&self) -> usize {
        self.inner.borrow().reactions.len()
    }

    /// Number of reactions waiting for the next flush.
    pub fn pending_count(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    fn dispose(&self, id: ReactionId) -> bool {
        let slot = {
            let mut inner = self.inner.borrow_mut();
            let Some(slot) = inner.reactions.remove(&id) else {
                return false;
            };
            inner.unsubscribe(id, &slot.deps);
            inner.pending.remove(&id);
            slot
        };
        tracing::trace!(%id, "reaction disposed");
        // The effect may own signals whose drop needs the graph.
        drop(slot);
        true
    }
}

/// Handle to a registered reaction.
///
/// Dropping the handle does not stop the reaction; call
/// [`Reaction::dispose`].
#[derive(Debug, Clone)]
pub struct Reaction {
    id: ReactionId,
    reactor: Weak<RefCell<Inner>>,
}

impl Reaction {
    /// The reaction id.
    pub fn id(&self) -> ReactionId {
        self.id
    }

    /// Unsubscribes the reaction and drops its effect. Idempotent.
    pub fn dispose(&self) {
        if let Some(inner) = self.reactor.upgrade() {
            Reactor { inner }.dispose(self.id);
        }
    }

    /// Whether the reaction was disposed (or its reactor dropped).
    pub fn is_disposed(&self) -> bool {
        self.reactor
            .upgrade()
            .map_or(true, |inner| !inner.borrow().reactions.contains_key(&self.id))
    }
}
