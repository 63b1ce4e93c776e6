//! # hrpm-events
//!
//! State-transition events and notification fan-out.
//!
//! Every successful transition in the goal and meeting state machines
//! produces one [`TransitionEvent`]. Events are handed to an
//! [`EventDispatcher`], which forwards them to every registered
//! [`NotificationSink`]. Delivery is fire-and-forget: a failing sink is
//! logged and skipped, it never undoes the transition that produced the event.
//!
//! [`ErrorKind`] is the failure taxonomy the goal and scheduling crates
//! classify their errors into.

pub mod error;
pub mod event;
pub mod kind;
pub mod sink;

pub use error::EventError;
pub use event::{EntityType, TransitionEvent};
pub use kind::ErrorKind;
pub use sink::{EventDispatcher, LogSink, NotificationSink};
