//! Chain engine
//!
//! This crate evaluates chains: rules that start when an event fires and walk
//! a graph of links.
//!
//! # Architecture
//!
//! ```text
//! EVENT → CHAIN → LINK (actions, then conditional links) → LINK → ...
//! ```
//!
//! - **Links**: nodes holding an ordered list of actions and an ordered list
//!   of conditional branches into other links
//! - **Chains**: bind a starting event to a starting link
//! - **Dispatcher**: routes fired events to their chains, each in its own task
//!
//! # Key Types
//!
//! - [`LinkGraph`] - Arena of links, built once through [`LinkGraphBuilder`]
//! - [`LinkEvaluator`] - Walks a graph with cycle and depth guards
//! - [`Chain`] - Starting event bound to a starting link
//! - [`ChainDispatcher`] - Registers chains and dispatches events to them

pub mod action;
pub mod chain;
pub mod condition;
pub mod dispatcher;
pub mod eval;
pub mod events;
pub mod link;

pub use action::{UpdateVariable, VALUE_INPUT};
pub use chain::Chain;
pub use condition::{AlwaysFalse, AlwaysTrue};
pub use dispatcher::{ChainDispatcher, ChainOutcome, DispatchError, DispatchHandle};
pub use eval::{
    EvaluationTrace, LinkError, LinkEvaluator, LinkResult, TraceStep, DEFAULT_MAX_DEPTH,
};
pub use events::EventRegistry;
pub use link::{
    ActionStep, ConditionalLink, GraphError, GraphResult, Link, LinkGraph, LinkGraphBuilder,
    LinkId,
};
