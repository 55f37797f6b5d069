//! Reactive stores - observable wrappers around plain mutable containers.
//!
//! Three container variants, one constructor each:
//! - [`ReactiveObject`] - key/value container with lazy nested wrapping
//! - [`ReactiveSet`] - membership container over values
//! - [`ReactiveWeakSet`] - membership container over weakly-held objects
//!
//! Every store is constructed around its raw container plus a
//! [`ListenerCell`] - a redirectable set of callbacks invoked synchronously
//! after each observable mutation. The stores never unregister listeners;
//! the consumer (normally a hook subscription, see [`crate::hooks`]) removes
//! its listener when the owning VNode unmounts.

mod listener;
mod object;
mod set;
mod weak_set;

pub use listener::{Change, Listener, ListenerCell, ListenerId};
pub use object::{ReactiveObject, StoreEntry};
pub use set::{RawSet, ReactiveSet};
pub use weak_set::{RawWeakSet, ReactiveWeakSet};
