//! Link graph
//!
//! Links are stored in an arena and reference each other by [`LinkId`], so a
//! graph may share links between chains and may contain cycles. A graph is
//! assembled once through [`LinkGraphBuilder`] and is immutable afterwards.

use std::collections::HashSet;
use std::sync::Arc;

use cq_core::{Action, Condition, UserInputValue};
use indexmap::IndexMap;
use thiserror::Error;

/// Graph construction errors
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("link {0} already exists")]
    DuplicateLink(String),

    #[error("unknown link {0}")]
    UnknownLink(LinkId),
}

/// Result type for graph construction
pub type GraphResult<T> = Result<T, GraphError>;

/// Index of a link inside its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(usize);

impl LinkId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An action with the inputs it is performed with
#[derive(Clone)]
pub struct ActionStep {
    pub action: Arc<dyn Action>,
    pub inputs: Vec<UserInputValue>,
}

/// A condition guarding a branch into another link
#[derive(Clone)]
pub struct ConditionalLink {
    pub condition: Arc<dyn Condition>,
    pub inputs: Vec<UserInputValue>,
    pub next: LinkId,
}

/// One node of the evaluation graph
///
/// Evaluating a link performs every action in order, then follows every
/// conditional link whose condition holds, in order.
#[derive(Clone)]
pub struct Link {
    id: String,
    actions: Vec<ActionStep>,
    conditional_links: Vec<ConditionalLink>,
}

impl Link {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn actions(&self) -> &[ActionStep] {
        &self.actions
    }

    pub fn conditional_links(&self) -> &[ConditionalLink] {
        &self.conditional_links
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("id", &self.id)
            .field("actions", &self.actions.len())
            .field(
                "next",
                &self
                    .conditional_links
                    .iter()
                    .map(|c| c.next)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Immutable arena of links
#[derive(Debug, Default)]
pub struct LinkGraph {
    links: IndexMap<String, Link>,
}

impl LinkGraph {
    pub fn builder() -> LinkGraphBuilder {
        LinkGraphBuilder::default()
    }

    /// Get a link by handle
    pub fn get(&self, id: LinkId) -> Option<&Link> {
        self.links.get_index(id.0).map(|(_, link)| link)
    }

    /// Look up a link handle by its string id
    pub fn link_id(&self, id: &str) -> Option<LinkId> {
        self.links.get_index_of(id).map(LinkId)
    }

    pub fn contains(&self, id: LinkId) -> bool {
        id.0 < self.links.len()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Find a structural cycle reachable from `start`
    ///
    /// Returns the ids along the cycle, starting and ending with the link
    /// that closes it. A structural cycle is only a hazard: whether it is
    /// ever followed depends on the conditions guarding it.
    pub fn find_cycle(&self, start: LinkId) -> Option<Vec<String>> {
        let mut path = Vec::new();
        let mut done = HashSet::new();
        self.find_cycle_from(start, &mut path, &mut done)
    }

    fn find_cycle_from(
        &self,
        id: LinkId,
        path: &mut Vec<LinkId>,
        done: &mut HashSet<LinkId>,
    ) -> Option<Vec<String>> {
        if let Some(pos) = path.iter().position(|p| *p == id) {
            let mut cycle: Vec<String> = path[pos..]
                .iter()
                .filter_map(|p| self.get(*p).map(|l| l.id.clone()))
                .collect();
            cycle.extend(self.get(id).map(|l| l.id.clone()));
            return Some(cycle);
        }
        if done.contains(&id) {
            return None;
        }

        let link = self.get(id)?;
        path.push(id);
        for branch in &link.conditional_links {
            if let Some(cycle) = self.find_cycle_from(branch.next, path, done) {
                return Some(cycle);
            }
        }
        path.pop();
        done.insert(id);
        None
    }
}

/// Builder for a [`LinkGraph`]
///
/// Links are added first and wired afterwards, so cycles and shared links can
/// be expressed.
#[derive(Default)]
pub struct LinkGraphBuilder {
    links: IndexMap<String, Link>,
}

impl LinkGraphBuilder {
    /// Add an empty link
    pub fn add_link(&mut self, id: impl Into<String>) -> GraphResult<LinkId> {
        let id = id.into();
        if self.links.contains_key(&id) {
            return Err(GraphError::DuplicateLink(id));
        }

        let (index, _) = self.links.insert_full(
            id.clone(),
            Link {
                id,
                actions: Vec::new(),
                conditional_links: Vec::new(),
            },
        );
        Ok(LinkId(index))
    }

    /// Append an action to a link
    pub fn add_action(
        &mut self,
        link: LinkId,
        action: Arc<dyn Action>,
        inputs: Vec<UserInputValue>,
    ) -> GraphResult<&mut Self> {
        self.link_mut(link)?
            .actions
            .push(ActionStep { action, inputs });
        Ok(self)
    }

    /// Append a conditional branch from `link` into `next`
    pub fn add_conditional_link(
        &mut self,
        link: LinkId,
        condition: Arc<dyn Condition>,
        inputs: Vec<UserInputValue>,
        next: LinkId,
    ) -> GraphResult<&mut Self> {
        if next.0 >= self.links.len() {
            return Err(GraphError::UnknownLink(next));
        }
        self.link_mut(link)?.conditional_links.push(ConditionalLink {
            condition,
            inputs,
            next,
        });
        Ok(self)
    }

    /// Look up a link handle added earlier
    pub fn link_id(&self, id: &str) -> Option<LinkId> {
        self.links.get_index_of(id).map(LinkId)
    }

    pub fn build(self) -> Arc<LinkGraph> {
        Arc::new(LinkGraph { links: self.links })
    }

    fn link_mut(&mut self, link: LinkId) -> GraphResult<&mut Link> {
        self.links
            .get_index_mut(link.0)
            .map(|(_, l)| l)
            .ok_or(GraphError::UnknownLink(link))
    }
}
