//! Generic pipeline-graph execution engine.
//!
//! The engine threads a mutable, typed state value through a directed graph
//! of named steps with conditional routing. It is parameterized over the
//! state type so every agent shares one executor instead of re-implementing
//! graph traversal; the state type declares its own field vocabulary via
//! [`State`].

mod executor;
mod graph;
mod step;

pub use executor::EngineFailure;
pub use graph::{Graph, GraphBuilder, GraphValidationError, Route, Target};
pub use step::{FnStep, State, Step};
