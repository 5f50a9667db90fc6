//! Chain dispatch
//!
//! The [`ChainDispatcher`] owns every registered chain, keyed by starting
//! event. When an event fires, each chain bound to it is evaluated in its own
//! task; chains sharing an event run independently with no ordering between
//! them. Dispatch never blocks the event source. The returned
//! [`DispatchHandle`]s let callers that care wait for the outcome.
//!
//! Once started, the dispatcher listens to every occurrence on the event bus
//! through an unbounded subscription, so no fired event is skipped and events
//! raised by variable listeners during a chain start further chains. Each
//! chain runs inside its occurrence's [`Context`], so those follow-up
//! occurrences carry a child context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cq_core::{Context, EventId, EventOccurrence, EventOrigin, EventRecord};
use cq_event_bus::EventBus;
use dashmap::DashMap;
use futures::future::join_all;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, trace, warn};

use crate::chain::Chain;
use crate::eval::{EvaluationTrace, LinkError, LinkEvaluator, LinkResult};
use crate::events::EventRegistry;

/// Errors reported for one dispatched chain
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("task for chain {chain_id} did not complete")]
    Panicked {
        chain_id: String,
        #[source]
        source: JoinError,
    },
}

/// Result of one dispatched chain
#[derive(Debug)]
pub struct ChainOutcome {
    pub chain_id: String,
    pub event_id: EventId,
    pub result: Result<EvaluationTrace, DispatchError>,
}

impl ChainOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Handle to a chain evaluation running in the background
#[derive(Debug)]
pub struct DispatchHandle {
    chain_id: String,
    event_id: EventId,
    handle: JoinHandle<LinkResult<EvaluationTrace>>,
}

impl DispatchHandle {
    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Wait for the evaluation to finish
    pub async fn wait(self) -> ChainOutcome {
        let result = match self.handle.await {
            Ok(result) => result.map_err(DispatchError::from),
            Err(source) => Err(DispatchError::Panicked {
                chain_id: self.chain_id.clone(),
                source,
            }),
        };

        ChainOutcome {
            chain_id: self.chain_id,
            event_id: self.event_id,
            result,
        }
    }
}

/// Routes fired events to the chains bound to them
pub struct ChainDispatcher {
    /// Event bus the dispatcher listens to once started
    event_bus: Arc<EventBus>,
    /// Evaluator shared by every dispatched chain
    evaluator: LinkEvaluator,
    /// Chains keyed by starting event, in registration order
    chains: DashMap<EventId, Vec<Arc<Chain>>>,
    /// Known events and their last triggered time
    events: EventRegistry,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Shutdown signal sender
    shutdown_tx: broadcast::Sender<()>,
}

impl ChainDispatcher {
    /// Create a dispatcher with the default evaluator
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self::with_evaluator(event_bus, LinkEvaluator::default())
    }

    /// Create a dispatcher evaluating chains with `evaluator`
    pub fn with_evaluator(event_bus: Arc<EventBus>, evaluator: LinkEvaluator) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            event_bus,
            evaluator,
            chains: DashMap::new(),
            events: EventRegistry::new(),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    /// Register a chain under its starting event
    ///
    /// A structural cycle reachable from the starting link is reported but
    /// accepted; evaluation stops it if it is ever followed.
    pub fn register_chain(&self, chain: Chain) -> Arc<Chain> {
        if let Some(cycle) = chain.find_cycle() {
            warn!(
                chain_id = %chain.id(),
                cycle = %cycle.join(" -> "),
                "Chain contains a cycle"
            );
        }

        info!(
            chain_id = %chain.id(),
            event_id = %chain.starting_event(),
            owner = ?chain.owner(),
            "Registering chain"
        );

        self.events.claim(chain.starting_event(), chain.owner());

        let chain = Arc::new(chain);
        self.chains
            .entry(chain.starting_event().clone())
            .or_default()
            .push(chain.clone());
        chain
    }

    /// Register an event record so its metadata is known before it fires
    pub fn register_event(&self, record: EventRecord) {
        self.events.register(record);
    }

    /// Register an event on behalf of `owner`, released by [`Self::unregister_owner`]
    pub fn register_owned_event(&self, owner: &str, record: EventRecord) {
        self.events.register_owned(owner, record);
    }

    /// Remove a chain by id
    pub fn unregister_chain(&self, chain_id: &str) -> bool {
        let mut removed = false;
        self.chains.retain(|_, chains| {
            let before = chains.len();
            chains.retain(|c| c.id() != chain_id);
            removed |= chains.len() != before;
            !chains.is_empty()
        });
        if removed {
            debug!(chain_id, "Unregistered chain");
        }
        removed
    }

    /// Remove every chain owned by `owner`, returning how many were removed
    ///
    /// Events only `owner` registered are forgotten as well.
    pub fn unregister_owner(&self, owner: &str) -> usize {
        let mut removed = 0;
        self.chains.retain(|_, chains| {
            let before = chains.len();
            chains.retain(|c| c.owner() != Some(owner));
            removed += before - chains.len();
            !chains.is_empty()
        });
        let events = self.events.release_owner(owner);
        debug!(owner, removed, events, "Unregistered chains of owner");
        removed
    }

    /// Chains bound to `event_id`, in registration order
    pub fn chains_for(&self, event_id: &EventId) -> Vec<Arc<Chain>> {
        self.chains
            .get(event_id)
            .map(|c| c.value().clone())
            .unwrap_or_default()
    }

    /// Total number of registered chains
    pub fn chain_count(&self) -> usize {
        self.chains.iter().map(|c| c.value().len()).sum()
    }

    /// Start every chain bound to the occurrence's event
    ///
    /// Each chain runs in its own task; failures are logged and reported
    /// through the returned handles.
    pub fn dispatch(&self, occurrence: &EventOccurrence) -> Vec<DispatchHandle> {
        if !self
            .events
            .mark_triggered(&occurrence.event_id, occurrence.time_fired)
        {
            trace!(event_id = %occurrence.event_id, "Unregistered event fired");
        }

        let chains = self.chains_for(&occurrence.event_id);
        if chains.is_empty() {
            trace!(event_id = %occurrence.event_id, "No chains bound to event");
            return Vec::new();
        }

        debug!(
            event_id = %occurrence.event_id,
            chains = chains.len(),
            context_id = %occurrence.context.id,
            "Dispatching event"
        );

        chains
            .into_iter()
            .map(|chain| {
                let evaluator = self.evaluator.clone();
                let chain_id = chain.id().to_string();
                let event_id = occurrence.event_id.clone();
                let context = occurrence.context.clone();

                let handle = tokio::spawn(async move {
                    let result = context.scope(chain.evaluate(&evaluator)).await;
                    match &result {
                        Ok(trace) => debug!(
                            chain_id = %chain.id(),
                            links = trace.links_entered().len(),
                            actions = trace.actions_performed(),
                            "Chain completed"
                        ),
                        Err(e) => error!(
                            chain_id = %chain.id(),
                            event_id = %chain.starting_event(),
                            error = %e,
                            "Chain evaluation failed"
                        ),
                    }
                    result
                });

                DispatchHandle {
                    chain_id,
                    event_id,
                    handle,
                }
            })
            .collect()
    }

    /// Dispatch an occurrence and wait for every started chain
    pub async fn dispatch_and_wait(&self, occurrence: &EventOccurrence) -> Vec<ChainOutcome> {
        join_all(self.dispatch(occurrence).into_iter().map(DispatchHandle::wait)).await
    }

    /// Dispatch `event_id` directly, without going through the bus
    pub fn trigger(&self, event_id: impl Into<EventId>) -> Vec<DispatchHandle> {
        let occurrence = EventOccurrence::new(event_id, serde_json::Value::Null, Context::caused())
            .with_origin(EventOrigin::Host);
        self.dispatch(&occurrence)
    }

    /// Start listening to the event bus
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Chain dispatcher already running");
            return;
        }

        info!("Starting chain dispatcher");

        let event_rx = self.event_bus.subscribe_all_unbounded();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let dispatcher = self.clone();

        tokio::spawn(dispatcher.listen(event_rx, shutdown_rx));
    }

    async fn listen(
        self: Arc<Self>,
        mut event_rx: mpsc::UnboundedReceiver<EventOccurrence>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                occurrence = event_rx.recv() => {
                    match occurrence {
                        Some(occurrence) => {
                            self.dispatch(&occurrence);
                        }
                        None => {
                            info!("Event bus closed, stopping chain dispatcher");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Chain dispatcher stopped");
    }

    /// Stop listening to the event bus
    pub fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }

        info!("Stopping chain dispatcher");
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
