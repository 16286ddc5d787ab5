//! The step trait and the state contract it executes against.

use crate::envelope::RunContext;
use crate::errors::Error;
use async_trait::async_trait;
use std::fmt::{Debug, Display};

/// Contract a pipeline state type fulfils so the engine can enforce step
/// preconditions without knowing the concrete fields.
///
/// Each agent defines one state struct plus a field enum naming everything
/// its steps read or write; `contains` reports whether a field currently
/// holds a usable value (an empty or whitespace-only string does not count).
pub trait State: Debug + Send + 'static {
    /// The field vocabulary of this state type.
    type Field: Copy + Eq + Display + Send + Sync;

    /// Whether the field currently holds a usable value.
    fn contains(&self, field: Self::Field) -> bool;
}

/// One named transformation of pipeline state.
///
/// Steps are registered once, stateless across invocations; any external
/// resource they need is injected at construction, never owned per run.
#[async_trait]
pub trait Step<S: State>: Send + Sync {
    /// Returns the step name, unique within a graph.
    fn name(&self) -> &str;

    /// Fields that must be present before the step runs.
    fn requires(&self) -> &[S::Field] {
        &[]
    }

    /// Runs the step, mutating the state in place.
    async fn run(&self, state: &mut S, ctx: &RunContext) -> Result<(), Error>;
}

/// Returns the names of required fields absent from the state.
pub(crate) fn missing_requirements<S: State>(step: &dyn Step<S>, state: &S) -> Vec<String> {
    step.requires()
        .iter()
        .filter(|field| !state.contains(**field))
        .map(ToString::to_string)
        .collect()
}

/// A synchronous function-based step, mainly for wiring tests.
pub struct FnStep<S: State, F>
where
    F: Fn(&mut S) -> Result<(), Error> + Send + Sync,
{
    name: String,
    requires: Vec<S::Field>,
    func: F,
}

impl<S: State, F> FnStep<S, F>
where
    F: Fn(&mut S) -> Result<(), Error> + Send + Sync,
{
    /// Creates a function step with no required fields.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            requires: Vec::new(),
            func,
        }
    }

    /// Declares the fields this step requires.
    #[must_use]
    pub fn with_requires(mut self, requires: Vec<S::Field>) -> Self {
        self.requires = requires;
        self
    }
}

#[async_trait]
impl<S: State, F> Step<S> for FnStep<S, F>
where
    F: Fn(&mut S) -> Result<(), Error> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> &[S::Field] {
        &self.requires
    }

    async fn run(&self, state: &mut S, _ctx: &RunContext) -> Result<(), Error> {
        (self.func)(state)
    }
}
