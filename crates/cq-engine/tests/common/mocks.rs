//! Mock actions and conditions

use std::sync::Arc;

use async_trait::async_trait;
use cq_core::{Action, ActionFailure, Condition, ConditionFailure, UserInputValue};

use super::Journal;

/// Action that appends its tag to the journal
pub struct RecordingAction {
    tag: String,
    journal: Journal,
}

impl RecordingAction {
    pub fn arc(tag: &str, journal: &Journal) -> Arc<dyn Action> {
        Arc::new(Self {
            tag: tag.to_string(),
            journal: journal.clone(),
        })
    }
}

#[async_trait]
impl Action for RecordingAction {
    fn name(&self) -> &str {
        &self.tag
    }

    async fn perform(&self, _inputs: &[UserInputValue]) -> Result<(), ActionFailure> {
        self.journal.push(self.tag.clone());
        Ok(())
    }
}

/// Action that records `tag:start`, yields to the runtime, then records `tag:end`
pub struct SuspendingAction {
    tag: String,
    journal: Journal,
}

impl SuspendingAction {
    pub fn arc(tag: &str, journal: &Journal) -> Arc<dyn Action> {
        Arc::new(Self {
            tag: tag.to_string(),
            journal: journal.clone(),
        })
    }
}

#[async_trait]
impl Action for SuspendingAction {
    fn name(&self) -> &str {
        &self.tag
    }

    async fn perform(&self, _inputs: &[UserInputValue]) -> Result<(), ActionFailure> {
        self.journal.push(format!("{}:start", self.tag));
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        self.journal.push(format!("{}:end", self.tag));
        Ok(())
    }
}

/// Action that records its tag and then fails
pub struct FailingAction {
    tag: String,
    journal: Journal,
}

impl FailingAction {
    pub fn arc(tag: &str, journal: &Journal) -> Arc<dyn Action> {
        Arc::new(Self {
            tag: tag.to_string(),
            journal: journal.clone(),
        })
    }
}

#[async_trait]
impl Action for FailingAction {
    fn name(&self) -> &str {
        &self.tag
    }

    async fn perform(&self, _inputs: &[UserInputValue]) -> Result<(), ActionFailure> {
        self.journal.push(self.tag.clone());
        Err(ActionFailure::new(format!("{} failed", self.tag)))
    }
}

/// Condition with a fixed answer that records when it is asked
pub struct ScriptedCondition {
    tag: String,
    answer: bool,
    journal: Journal,
}

impl ScriptedCondition {
    pub fn arc(tag: &str, answer: bool, journal: &Journal) -> Arc<dyn Condition> {
        Arc::new(Self {
            tag: tag.to_string(),
            answer,
            journal: journal.clone(),
        })
    }
}

#[async_trait]
impl Condition for ScriptedCondition {
    fn name(&self) -> &str {
        &self.tag
    }

    async fn evaluate(&self, _inputs: &[UserInputValue]) -> Result<bool, ConditionFailure> {
        self.journal.push(format!("?{}", self.tag));
        Ok(self.answer)
    }
}
