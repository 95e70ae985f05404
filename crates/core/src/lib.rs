//! # ForgeGate Core
//!
//! Domain types shared by both engines of the security gate:
//! the action authorizer and the request guard chain.
//! This crate has **no framework dependencies**: it defines the values
//! that cross the gate boundary and the sink trait deny decisions are
//! reported through.
//!
//! ## Design Philosophy
//!
//! Gate decisions are data. An [`Action`] goes in, a [`Verdict`] comes out,
//! and nothing in between is allowed to panic or return an error. The only
//! error here is [`SinkError`], for events that could not be recorded.

pub mod action;
pub mod error;
pub mod event;
pub mod law;
pub mod verdict;

// Re-export key types at crate root for ergonomics
pub use action::{Action, ActionKind, ActionRequest, ActionParseError};
pub use error::SinkError;
pub use event::{AttackCategory, SecurityEvent, SecurityEventKind, SecurityEventSink, emit};
pub use law::{Law, LawClass, LawRefs, default_laws};
pub use verdict::{Verdict, Violation};
