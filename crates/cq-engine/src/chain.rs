//! Chains bind an event to the link evaluated when it fires

use std::sync::Arc;

use cq_core::EventId;
use tracing::instrument;

use crate::eval::{EvaluationTrace, LinkEvaluator, LinkResult};
use crate::link::{GraphError, GraphResult, LinkGraph, LinkId};

/// Binding of a starting event to a starting link
#[derive(Debug, Clone)]
pub struct Chain {
    id: String,
    starting_event: EventId,
    graph: Arc<LinkGraph>,
    starting_link: LinkId,
    owner: Option<String>,
}

impl Chain {
    /// Create a chain, checking that the starting link belongs to `graph`
    pub fn new(
        starting_event: impl Into<EventId>,
        graph: Arc<LinkGraph>,
        starting_link: LinkId,
    ) -> GraphResult<Self> {
        if !graph.contains(starting_link) {
            return Err(GraphError::UnknownLink(starting_link));
        }

        Ok(Self {
            id: ulid::Ulid::new().to_string(),
            starting_event: starting_event.into(),
            graph,
            starting_link,
            owner: None,
        })
    }

    /// Replace the generated id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Tag the chain with the addon instance that owns it
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn starting_event(&self) -> &EventId {
        &self.starting_event
    }

    pub fn starting_link(&self) -> LinkId {
        self.starting_link
    }

    pub fn graph(&self) -> &Arc<LinkGraph> {
        &self.graph
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Structural cycle reachable from the starting link, if any
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        self.graph.find_cycle(self.starting_link)
    }

    /// Evaluate the starting link
    #[instrument(skip_all, fields(chain_id = %self.id, event_id = %self.starting_event))]
    pub async fn evaluate(&self, evaluator: &LinkEvaluator) -> LinkResult<EvaluationTrace> {
        evaluator.evaluate(&self.graph, self.starting_link).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AlwaysTrue, UpdateVariable};
    use cq_core::UserInputValue;
    use cq_variables::{ReadWriteVariable, Variable, VariableOptions};
    use serde_json::json;

    #[test]
    fn test_rejects_foreign_link() {
        let mut other = LinkGraph::builder();
        other.add_link("a").unwrap();
        let foreign = other.add_link("b").unwrap();

        let mut builder = LinkGraph::builder();
        builder.add_link("only").unwrap();
        let graph = builder.build();

        assert!(matches!(
            Chain::new("event", graph, foreign),
            Err(GraphError::UnknownLink(_))
        ));
    }

    #[test]
    fn test_ids_and_owner() {
        let mut builder = LinkGraph::builder();
        let start = builder.add_link("start").unwrap();
        let graph = builder.build();

        let generated = Chain::new("event", graph.clone(), start).unwrap();
        assert_eq!(generated.id().len(), 26);
        assert!(generated.owner().is_none());

        let chain = Chain::new("event", graph, start)
            .unwrap()
            .with_id("porch")
            .with_owner("addon-1");
        assert_eq!(chain.id(), "porch");
        assert_eq!(chain.owner(), Some("addon-1"));
        assert_eq!(chain.starting_event().as_str(), "event");
    }

    #[tokio::test]
    async fn test_evaluate_runs_starting_link() {
        let variable = Arc::new(ReadWriteVariable::new(VariableOptions::new(
            "level",
            "Level",
            json!(0),
        )));

        let mut builder = LinkGraph::builder();
        let start = builder.add_link("start").unwrap();
        let next = builder.add_link("next").unwrap();
        builder
            .add_action(
                start,
                Arc::new(UpdateVariable::new(variable.clone())),
                vec![UserInputValue::new("value", 1)],
            )
            .unwrap();
        builder
            .add_conditional_link(
                start,
                Arc::new(AlwaysTrue),
                vec![UserInputValue::new("input", true)],
                next,
            )
            .unwrap();
        builder
            .add_action(
                next,
                Arc::new(UpdateVariable::new(variable.clone())),
                vec![UserInputValue::new("value", 2)],
            )
            .unwrap();
        let chain = Chain::new("go", builder.build(), start).unwrap();

        let trace = chain.evaluate(&LinkEvaluator::default()).await.unwrap();

        assert_eq!(trace.links_entered(), vec!["start", "next"]);
        assert_eq!(variable.retrieve_value().await, json!(2));
        assert!(chain.find_cycle().is_none());
    }
}
