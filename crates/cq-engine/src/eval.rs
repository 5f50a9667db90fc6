//! Link evaluation
//!
//! The evaluator walks a [`LinkGraph`] starting from one link. For each link
//! it performs every action in order, awaiting each one, and only then
//! evaluates the conditional links in order, fully evaluating the target of
//! every condition that holds before moving to the next sibling.
//!
//! The walk keeps the path of links currently being evaluated. Re-entering a
//! link that is already on that path fails with [`LinkError::CycleDetected`],
//! and nesting deeper than the configured limit fails with
//! [`LinkError::DepthExceeded`]. A shared link reached through separate
//! branches is evaluated every time it is reached.

use std::future::Future;
use std::pin::Pin;

use cq_core::{ActionFailure, ConditionFailure};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

use crate::link::{LinkGraph, LinkId};

/// Default maximum nesting depth of link evaluation
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Link evaluation errors
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("action {action} in link {link_id} failed")]
    Action {
        link_id: String,
        action: String,
        #[source]
        source: ActionFailure,
    },

    #[error("condition {condition} in link {link_id} failed")]
    Condition {
        link_id: String,
        condition: String,
        #[source]
        source: ConditionFailure,
    },

    #[error("cycle detected: {}", .path.join(" -> "))]
    CycleDetected { link_id: String, path: Vec<String> },

    #[error("link {link_id} exceeds the maximum depth of {max_depth}")]
    DepthExceeded { link_id: String, max_depth: usize },

    #[error("unknown link {0}")]
    UnknownLink(LinkId),
}

/// Result type for link evaluation
pub type LinkResult<T> = Result<T, LinkError>;

/// One step recorded while evaluating
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum TraceStep {
    /// A link was entered at the given depth (0 for the starting link)
    EnterLink { link_id: String, depth: usize },

    /// An action completed
    Action { link_id: String, action: String },

    /// A condition was evaluated
    Condition {
        link_id: String,
        condition: String,
        next: String,
        result: bool,
    },
}

/// Ordered record of one evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationTrace {
    steps: Vec<TraceStep>,
}

impl EvaluationTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    /// Ids of the links entered, in order
    pub fn links_entered(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                TraceStep::EnterLink { link_id, .. } => Some(link_id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of actions that completed
    pub fn actions_performed(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, TraceStep::Action { .. }))
            .count()
    }

    /// Number of branches followed
    pub fn branches_taken(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, TraceStep::Condition { result: true, .. }))
            .count()
    }

    fn push(&mut self, step: TraceStep) {
        self.steps.push(step);
    }
}

/// Evaluates links of a graph
#[derive(Debug, Clone)]
pub struct LinkEvaluator {
    max_depth: usize,
}

impl LinkEvaluator {
    /// Create an evaluator with the given maximum nesting depth
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Evaluate `start` and everything reachable from it
    pub async fn evaluate(&self, graph: &LinkGraph, start: LinkId) -> LinkResult<EvaluationTrace> {
        let mut trace = EvaluationTrace::new();
        self.evaluate_traced(graph, start, &mut trace).await?;
        Ok(trace)
    }

    /// Evaluate `start`, recording into `trace`
    ///
    /// On failure the trace holds every step completed before the failure.
    /// Effects of actions that already ran are kept.
    pub async fn evaluate_traced(
        &self,
        graph: &LinkGraph,
        start: LinkId,
        trace: &mut EvaluationTrace,
    ) -> LinkResult<()> {
        let mut path = Vec::new();
        self.evaluate_link(graph, start, &mut path, trace).await
    }

    fn evaluate_link<'a>(
        &'a self,
        graph: &'a LinkGraph,
        id: LinkId,
        path: &'a mut Vec<LinkId>,
        trace: &'a mut EvaluationTrace,
    ) -> Pin<Box<dyn Future<Output = LinkResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let link = graph.get(id).ok_or(LinkError::UnknownLink(id))?;

            if path.contains(&id) {
                let mut cycle: Vec<String> = path
                    .iter()
                    .filter_map(|p| graph.get(*p).map(|l| l.id().to_string()))
                    .collect();
                cycle.push(link.id().to_string());
                return Err(LinkError::CycleDetected {
                    link_id: link.id().to_string(),
                    path: cycle,
                });
            }
            if path.len() >= self.max_depth {
                return Err(LinkError::DepthExceeded {
                    link_id: link.id().to_string(),
                    max_depth: self.max_depth,
                });
            }

            debug!(link_id = %link.id(), depth = path.len(), "Evaluating link");
            trace.push(TraceStep::EnterLink {
                link_id: link.id().to_string(),
                depth: path.len(),
            });

            for step in link.actions() {
                trace!(link_id = %link.id(), action = %step.action.name(), "Performing action");
                step.action
                    .perform(&step.inputs)
                    .await
                    .map_err(|source| LinkError::Action {
                        link_id: link.id().to_string(),
                        action: step.action.name().to_string(),
                        source,
                    })?;
                trace.push(TraceStep::Action {
                    link_id: link.id().to_string(),
                    action: step.action.name().to_string(),
                });
            }

            path.push(id);
            for branch in link.conditional_links() {
                let next_id = graph
                    .get(branch.next)
                    .map(|l| l.id().to_string())
                    .ok_or(LinkError::UnknownLink(branch.next))?;

                let result = branch
                    .condition
                    .evaluate(&branch.inputs)
                    .await
                    .map_err(|source| LinkError::Condition {
                        link_id: link.id().to_string(),
                        condition: branch.condition.name().to_string(),
                        source,
                    })?;

                trace!(
                    link_id = %link.id(),
                    condition = %branch.condition.name(),
                    next = %next_id,
                    result,
                    "Evaluated condition"
                );
                trace.push(TraceStep::Condition {
                    link_id: link.id().to_string(),
                    condition: branch.condition.name().to_string(),
                    next: next_id,
                    result,
                });

                if result {
                    self.evaluate_link(graph, branch.next, path, trace).await?;
                }
            }
            path.pop();

            Ok(())
        })
    }
}

impl Default for LinkEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}
