//! Fine-grained reactive state.
//!
//! A [`Reactor`] owns the dependency graph between [`Signal`]s and
//! reactions. Reading a signal while a reaction runs records the read on the
//! reactor's tracking-frame stack; when the reaction returns, the frame is
//! popped and the collected reads become its subscriptions.
//!
//! Writes never run reactions synchronously. They mark subscribers pending,
//! and [`Reactor::flush`] (or the end of the outermost [`Reactor::batch`])
//! runs each pending reaction once, in creation order. Several writes in the
//! same turn therefore coalesce into a single re-run.
//!
//! ```
//! use reactive::Reactor;
//! use std::{cell::Cell, rc::Rc};
//!
//! let reactor = Reactor::new();
//! let count = reactor.signal(1);
//! let seen = Rc::new(Cell::new(0));
//!
//! let c = count.clone();
//! let s = seen.clone();
//! let _reaction = reactor.reaction(move || s.set(c.get() * 10));
//! assert_eq!(seen.get(), 10);
//!
//! count.set(2);
//! count.set(3);
//! reactor.flush();
//! assert_eq!(seen.get(), 30);
//! ```

mod reactor;
mod signal;

pub use reactor::{Reaction, ReactionId, Reactor};
pub use signal::{Signal, SignalId};
