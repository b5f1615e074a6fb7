//! Rule execution engine
//!
//! This crate binds rules to handlers and runs them:
//!
//! - [`RuleEngine`] - binding, connection wiring, status, and one worker per
//!   rule draining that rule's trigger events in arrival order
//! - [`RuleManager`] - add/update/remove/enable with UID assignment and
//!   persistence through a [`rule_storage::RuleStorage`]
//!
//! # Processing a trigger event
//!
//! ```text
//! trigger fires → queue (FIFO per rule) → worker
//!   1. resolve + publish trigger outputs
//!   2. conditions in order, stop at the first unsatisfied one
//!   3. actions in order, publishing their outputs for later actions
//! ```
//!
//! A failing handler aborts only the event being processed.

mod binding;
mod callback;
mod engine;
mod error;
mod manager;
mod queue;
mod runtime;
mod store;
mod wiring;

pub use engine::{RuleEngine, RuleEngineBuilder, SharedRuleEngine};
pub use error::{EngineError, EngineResult, WiringError};
pub use manager::{RuleManager, RULE_UID_PREFIX};
pub use store::{OutputRef, OutputStore};
