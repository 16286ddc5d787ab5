//! Graph traversal: full execution and single-step invocation.

use super::graph::{Graph, Target};
use super::step::{missing_requirements, State};
use crate::envelope::RunContext;
use crate::errors::Error;
use std::collections::HashSet;
use std::fmt;

/// A failed pipeline run: the step that failed, the error, and the state at
/// the moment of failure. Never a partial silent success.
pub struct EngineFailure<S> {
    /// The step that failed.
    pub step: String,
    /// What went wrong.
    pub error: Error,
    /// The state as it was when the step failed.
    pub state: S,
}

impl<S> EngineFailure<S> {
    /// Discards the captured state, keeping only the error.
    #[must_use]
    pub fn into_error(self) -> Error {
        self.error
    }
}

impl<S> fmt::Display for EngineFailure<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step '{}' failed: {}", self.step, self.error)
    }
}

impl<S: fmt::Debug> fmt::Debug for EngineFailure<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineFailure")
            .field("step", &self.step)
            .field("error", &self.error)
            .field("state", &self.state)
            .finish()
    }
}

impl<S: fmt::Debug> std::error::Error for EngineFailure<S> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<S: State> Graph<S> {
    /// Executes the graph from its entry step.
    pub async fn execute(&self, state: S, ctx: &RunContext) -> Result<S, EngineFailure<S>> {
        let entry = self.entry().to_string();
        self.execute_from(&entry, state, ctx).await
    }

    /// Executes the graph starting at the named step.
    ///
    /// Each iteration checks the current step's declared requirements, runs
    /// it, then selects the first matching route in declaration order. A
    /// missing route fails with a routing error; revisiting a step within
    /// one run fails with a cycle error instead of looping. The engine holds
    /// no state of its own across calls.
    pub async fn execute_from(
        &self,
        start: &str,
        mut state: S,
        ctx: &RunContext,
    ) -> Result<S, EngineFailure<S>> {
        let mut current = start.to_string();
        let mut visited: HashSet<String> = HashSet::new();
        let mut trail: Vec<String> = Vec::new();

        loop {
            let step = match self.step(&current) {
                Some(step) => step.clone(),
                None => {
                    let error = Error::Routing {
                        step: current.clone(),
                        reason: "step is not registered in this graph".to_string(),
                    };
                    return Err(EngineFailure { step: current, error, state });
                }
            };

            let missing = missing_requirements(step.as_ref(), &state);
            if !missing.is_empty() {
                let error = Error::precondition(&current, missing);
                return Err(EngineFailure { step: current, error, state });
            }

            tracing::debug!(
                request_id = %ctx.request_id(),
                graph = self.name(),
                step = %current,
                "executing step"
            );
            if let Err(error) = step.run(&mut state, ctx).await {
                return Err(EngineFailure { step: current, error, state });
            }
            visited.insert(current.clone());
            trail.push(current.clone());

            let next = self
                .routes_for(&current)
                .iter()
                .find(|route| route.matches(&state))
                .map(super::graph::Route::target);

            match next {
                None => {
                    let error = Error::Routing {
                        step: current.clone(),
                        reason: "no route matched the current state".to_string(),
                    };
                    return Err(EngineFailure { step: current, error, state });
                }
                Some(Target::End) => {
                    tracing::info!(
                        request_id = %ctx.request_id(),
                        graph = self.name(),
                        steps = trail.len(),
                        "pipeline run complete"
                    );
                    return Ok(state);
                }
                Some(Target::Step(target)) => {
                    if visited.contains(target) {
                        let mut path = trail.clone();
                        path.push(target.clone());
                        let error = Error::CycleDetected {
                            step: target.clone(),
                            path,
                        };
                        return Err(EngineFailure { step: current, error, state });
                    }
                    current = target.clone();
                }
            }
        }
    }

    /// Runs exactly one named step against the state, ignoring any routes
    /// the step declares.
    ///
    /// Requirements are validated up front so a missing field surfaces as a
    /// precondition failure listing what is absent.
    pub async fn execute_single(
        &self,
        step_name: &str,
        mut state: S,
        ctx: &RunContext,
    ) -> Result<S, EngineFailure<S>> {
        let step = match self.step(step_name) {
            Some(step) => step.clone(),
            None => {
                let error = Error::Routing {
                    step: step_name.to_string(),
                    reason: "step is not registered in this graph".to_string(),
                };
                return Err(EngineFailure {
                    step: step_name.to_string(),
                    error,
                    state,
                });
            }
        };

        let missing = missing_requirements(step.as_ref(), &state);
        if !missing.is_empty() {
            let error = Error::precondition(step_name, missing);
            return Err(EngineFailure {
                step: step_name.to_string(),
                error,
                state,
            });
        }

        tracing::debug!(
            request_id = %ctx.request_id(),
            graph = self.name(),
            step = step_name,
            "executing single step"
        );
        match step.run(&mut state, ctx).await {
            Ok(()) => Ok(state),
            Err(error) => Err(EngineFailure {
                step: step_name.to_string(),
                error,
                state,
            }),
        }
    }
}
