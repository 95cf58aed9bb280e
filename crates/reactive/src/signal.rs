//! Reactive values.

use crate::reactor::{Inner, Reactor};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Identifies a signal within its reactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignalId(pub(crate) u64);

struct SignalCell<T> {
    id: SignalId,
    value: RefCell<T>,
    reactor: Weak<RefCell<Inner>>,
}

impl<T> Drop for SignalCell<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.reactor.upgrade() {
            // Signals dropped while the graph is borrowed leave an empty
            // subscriber entry behind.
            if let Ok(mut inner) = inner.try_borrow_mut() {
                inner.drop_signal(self.id);
            }
        }
    }
}

/// A reactive value.
///
/// Reads through [`Signal::get`] or [`Signal::with`] are recorded by the
/// running reaction; [`Signal::peek`] reads without tracking. Cloning yields
/// another handle to the same value.
pub struct Signal<T> {
    cell: Rc<SignalCell<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.cell.id)
            .field("value", &self.cell.value.borrow())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Signal<T> {
    pub(crate) fn new(reactor: &Reactor, value: T) -> Self {
        let id = reactor.with_inner(|inner| inner.new_signal());
        Self {
            cell: Rc::new(SignalCell {
                id,
                value: RefCell::new(value),
                reactor: reactor.downgrade(),
            }),
        }
    }

    /// The signal id.
    pub fn id(&self) -> SignalId {
        self.cell.id
    }

    /// Whether two handles point at the same signal.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    /// Returns the value, recording the read.
    pub fn get(&self) -> T {
        self.track();
        self.cell.value.borrow().clone()
    }

    /// Borrows the value, recording the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.cell.value.borrow())
    }

    /// Returns the value without recording the read.
    pub fn peek(&self) -> T {
        self.cell.value.borrow().clone()
    }

    /// Replaces the value. Equal values do not notify.
    pub fn set(&self, value: T) {
        {
            let mut current = self.cell.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }
        self.notify();
    }

    /// Mutates the value in place and notifies unconditionally.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.cell.value.borrow_mut());
        self.notify();
    }

    /// Schedules every reaction that read this signal.
    pub fn notify(&self) {
        if let Some(inner) = self.cell.reactor.upgrade() {
            inner.borrow_mut().schedule_subscribers(self.cell.id);
        }
    }

    fn track(&self) {
        if let Some(inner) = self.cell.reactor.upgrade() {
            if let Ok(mut inner) = inner.try_borrow_mut() {
                inner.record_read(self.cell.id);
            }
        }
    }
}
