//! Graph construction and validation.

use super::step::{State, Step};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Where a route leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Continue at the named step.
    Step(String),
    /// Terminate the run and return the state.
    End,
}

/// A conditional transition out of a step: a predicate over the state plus a
/// target. Routes are evaluated in declaration order; the first match wins.
pub struct Route<S> {
    predicate: Box<dyn Fn(&S) -> bool + Send + Sync>,
    target: Target,
}

impl<S> Route<S> {
    /// Creates a route guarded by a predicate.
    pub fn when(
        predicate: impl Fn(&S) -> bool + Send + Sync + 'static,
        target: Target,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            target,
        }
    }

    /// Creates an unconditional route to the named step.
    pub fn always_to(step: impl Into<String>) -> Self {
        Self::when(|_| true, Target::Step(step.into()))
    }

    /// Creates an unconditional terminal route.
    #[must_use]
    pub fn always_end() -> Self {
        Self::when(|_| true, Target::End)
    }

    /// Evaluates the predicate against the state.
    pub(crate) fn matches(&self, state: &S) -> bool {
        (self.predicate)(state)
    }

    /// Returns the route target.
    pub(crate) fn target(&self) -> &Target {
        &self.target
    }
}

/// A graph definition failed validation at build time.
///
/// Distinct from the runtime taxonomy: these are caught before any request
/// can reach the graph.
#[derive(Debug, Clone, Error)]
#[error("invalid graph '{graph}': {message}")]
pub struct GraphValidationError {
    /// The graph name.
    pub graph: String,
    /// What is wrong with the definition.
    pub message: String,
}

/// An immutable directed graph of named steps and conditional routes.
pub struct Graph<S: State> {
    name: String,
    entry: String,
    steps: HashMap<String, Arc<dyn Step<S>>>,
    routes: HashMap<String, Vec<Route<S>>>,
}

impl<S: State> fmt::Debug for Graph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut steps: Vec<&str> = self.steps.keys().map(String::as_str).collect();
        steps.sort_unstable();
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("entry", &self.entry)
            .field("steps", &steps)
            .finish_non_exhaustive()
    }
}

impl<S: State> Graph<S> {
    /// Returns the graph name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the entry step name.
    #[must_use]
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Looks up a step by name.
    #[must_use]
    pub fn step(&self, name: &str) -> Option<&Arc<dyn Step<S>>> {
        self.steps.get(name)
    }

    /// Returns the routes declared for a step, in declaration order.
    #[must_use]
    pub fn routes_for(&self, name: &str) -> &[Route<S>] {
        self.routes.get(name).map_or(&[], Vec::as_slice)
    }
}

/// Builder for [`Graph`], validating the definition at `build` time.
pub struct GraphBuilder<S: State> {
    name: String,
    entry: Option<String>,
    steps: HashMap<String, Arc<dyn Step<S>>>,
    order: Vec<String>,
    routes: HashMap<String, Vec<Route<S>>>,
    duplicate: Option<String>,
}

impl<S: State> GraphBuilder<S> {
    /// Starts a builder for a named graph.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: None,
            steps: HashMap::new(),
            order: Vec::new(),
            routes: HashMap::new(),
            duplicate: None,
        }
    }

    /// Registers a step. Duplicate names are rejected at build time.
    #[must_use]
    pub fn step(mut self, step: impl Step<S> + 'static) -> Self {
        let name = step.name().to_string();
        if self.steps.insert(name.clone(), Arc::new(step)).is_some() {
            self.duplicate.get_or_insert(name.clone());
        }
        self.order.push(name);
        self
    }

    /// Sets the entry step.
    #[must_use]
    pub fn entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    /// Appends a route out of the named step.
    #[must_use]
    pub fn route(mut self, from: impl Into<String>, route: Route<S>) -> Self {
        self.routes.entry(from.into()).or_default().push(route);
        self
    }

    /// Validates the definition and builds the immutable graph.
    pub fn build(self) -> Result<Graph<S>, GraphValidationError> {
        let fail = |message: String| GraphValidationError {
            graph: self.name.clone(),
            message,
        };

        if let Some(name) = &self.duplicate {
            return Err(fail(format!("duplicate step '{name}'")));
        }
        if self.steps.is_empty() {
            return Err(fail("graph has no steps".to_string()));
        }
        let entry = self
            .entry
            .clone()
            .ok_or_else(|| fail("no entry step set".to_string()))?;
        if !self.steps.contains_key(&entry) {
            return Err(fail(format!("entry step '{entry}' is not registered")));
        }
        for (from, routes) in &self.routes {
            if !self.steps.contains_key(from) {
                return Err(fail(format!("routes declared for unknown step '{from}'")));
            }
            for route in routes {
                if let Target::Step(to) = route.target() {
                    if !self.steps.contains_key(to) {
                        return Err(fail(format!(
                            "route from '{from}' targets unknown step '{to}'"
                        )));
                    }
                }
            }
        }

        Ok(Graph {
            name: self.name,
            entry,
            steps: self.steps,
            routes: self.routes,
        })
    }
}
