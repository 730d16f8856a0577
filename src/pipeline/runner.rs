//! Pipeline wiring: scanner -> evaluator -> coordinator -> relay
//!
//! Scan loops hand observations to a dispatcher over a bounded channel. The dispatcher
//! routes each one to its network's evaluation worker without waiting, so a stalled
//! network only backs up its own queue, and one entry's observations are still evaluated
//! in arrival order. Workers price gas from the fee cache instead of calling the chain.
//! Each accepted trade runs on its own task.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use crate::{
    admission::AdmissionController,
    arbitrage::{ConfidenceModel, EvaluationContext, ProfitabilityEvaluator},
    config::ConfigHandle,
    control::AdminControl,
    errors::{BotError, BotResult, CircuitBreaker},
    execution::{ExecutionCoordinator, InFlightRegistry, NetworkExecution, SettlementGateway, TransactionSigner},
    network::ChainStateSource,
    quotes::QuoteSources,
    relay::{PrivateRelay, PrivateRelayClient},
    scanner::Scanner,
    storage::{record_opportunity_event, record_trade_outcome},
    types::{EvaluationOutcome, HealthStatus, NetworkId, OpportunityEvent, SpreadObservation, TradeOutcome},
    utils::{print_arbitrage_opportunity, print_trade_outcome, run_health_check, Clock, HealthInputs},
    volatility::VolatilityTracker,
};
use super::{FeeCache, PipelineStats, StatsSnapshot};

const EVENT_CHANNEL_CAPACITY: usize = 1_024;

/// External collaborators the pipeline is assembled from.
pub struct PipelineParts {
    pub config: ConfigHandle,
    pub sources: QuoteSources,
    pub chains: HashMap<NetworkId, Arc<dyn ChainStateSource>>,
    pub relays: HashMap<NetworkId, Arc<dyn PrivateRelay>>,
    pub settlement: Arc<dyn SettlementGateway>,
    pub signer: Arc<dyn TransactionSigner>,
    pub confidence: Arc<dyn ConfidenceModel>,
    pub clock: Arc<dyn Clock>,
}

pub struct Pipeline {
    config: ConfigHandle,
    scanner: Arc<Scanner>,
    evaluator: Arc<ProfitabilityEvaluator>,
    coordinator: Arc<ExecutionCoordinator>,
    chains: HashMap<NetworkId, Arc<dyn ChainStateSource>>,
    breaker: Arc<CircuitBreaker>,
    admission: Arc<AdmissionController>,
    admin: Arc<AdminControl>,
    stats: Arc<PipelineStats>,
    fees: Arc<FeeCache>,
    events: broadcast::Sender<OpportunityEvent>,
    outcomes: broadcast::Sender<TradeOutcome>,
    observations: Mutex<Option<mpsc::Receiver<SpreadObservation>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    start_time: Instant,
}

impl Pipeline {
    pub fn new(parts: PipelineParts) -> BotResult<Self> {
        let PipelineParts {
            config,
            sources,
            chains,
            relays,
            settlement,
            signer,
            confidence,
            clock,
        } = parts;
        let snapshot = config.snapshot();

        let admission = Arc::new(AdmissionController::new(snapshot.config.admission.clone(), clock.clone()));
        let breaker = Arc::new(CircuitBreaker::new(clock.clone()));
        let volatility = Arc::new(VolatilityTracker::new(clock.clone()));
        let fees = FeeCache::new(clock);

        let (tx, rx) = mpsc::channel(snapshot.config.scanner.channel_capacity);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (outcomes, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let mut networks = HashMap::new();
        for (network, relay) in relays {
            let chain = chains.get(&network).cloned().ok_or_else(|| BotError::UnknownNetwork {
                network: network.clone(),
                referenced_by: "relay".to_string(),
            })?;
            let client = Arc::new(PrivateRelayClient::new(relay, chain.clone(), admission.clone(), config.clone()));
            networks.insert(network, NetworkExecution { chain, relay: client });
        }

        let scanner = Arc::new(Scanner::new(Arc::new(sources), admission.clone(), config.clone(), tx));
        let evaluator = Arc::new(ProfitabilityEvaluator::new(
            config.clone(),
            breaker.clone(),
            volatility,
            confidence,
        ));
        let coordinator = Arc::new(ExecutionCoordinator::new(
            config.clone(),
            breaker.clone(),
            InFlightRegistry::new(),
            settlement,
            signer,
            networks,
            outcomes.clone(),
        ));
        let admin = Arc::new(AdminControl::new(
            scanner.clone(),
            breaker.clone(),
            config.clone(),
            admission.clone(),
        ));

        Ok(Self {
            config,
            scanner,
            evaluator,
            coordinator,
            chains,
            breaker,
            admission,
            admin,
            stats: Arc::new(PipelineStats::default()),
            fees,
            events,
            outcomes,
            observations: Mutex::new(Some(rx)),
            tasks: Mutex::new(Vec::new()),
            start_time: Instant::now(),
        })
    }

    /// Starts fee refreshers, one evaluation worker per network, and every configured
    /// scan loop. Returns the dispatcher feeding the workers.
    pub fn start(&self) -> BotResult<JoinHandle<()>> {
        let rx = self
            .observations
            .lock()
            .take()
            .ok_or_else(|| BotError::config("pipeline already started"))?;
        let scanner_settings = self.config.snapshot().config.scanner.clone();
        let refresh = Duration::from_millis(scanner_settings.poll_interval_ms);
        let fee_timeout = Duration::from_millis(scanner_settings.quote_timeout_ms);

        let mut tasks = self.tasks.lock();
        let mut queues = HashMap::new();
        for (network, chain) in &self.chains {
            tasks.push(self.fees.spawn_refresher(network.clone(), chain.clone(), refresh, fee_timeout));

            let (tx, worker_rx) = mpsc::channel(scanner_settings.channel_capacity);
            let worker = EvaluationLoop {
                network: network.clone(),
                config: self.config.clone(),
                evaluator: self.evaluator.clone(),
                coordinator: self.coordinator.clone(),
                fees: self.fees.clone(),
                stats: self.stats.clone(),
                events: self.events.clone(),
            };
            tasks.push(tokio::spawn(worker.run(worker_rx)));
            queues.insert(network.clone(), tx);
        }
        drop(tasks);

        let started = self.scanner.start_all()?;
        info!("✅ Started {} watch entries on {} networks", started, queues.len());

        let dispatcher = Dispatcher {
            queues,
            stats: self.stats.clone(),
        };
        Ok(tokio::spawn(dispatcher.run(rx)))
    }

    /// Appends both event streams to JSONL files until the pipeline is dropped.
    pub fn spawn_recorder(&self, output_dir: PathBuf) -> JoinHandle<()> {
        let mut events = self.events.subscribe();
        let mut outcomes = self.outcomes.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(event) => {
                            if let Err(e) = record_opportunity_event(&output_dir, &event) {
                                warn!("Failed to record opportunity event: {}", e);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => warn!("Recorder lagged, {} opportunity events dropped", n),
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    outcome = outcomes.recv() => match outcome {
                        Ok(outcome) => {
                            if let Err(e) = record_trade_outcome(&output_dir, &outcome) {
                                error!("Failed to record trade outcome: {}", e);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => warn!("Recorder lagged, {} trade outcomes dropped", n),
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        })
    }

    pub fn subscribe_opportunities(&self) -> broadcast::Receiver<OpportunityEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<TradeOutcome> {
        self.outcomes.subscribe()
    }

    pub fn admin(&self) -> Arc<AdminControl> {
        self.admin.clone()
    }

    pub fn admission(&self) -> Arc<AdmissionController> {
        self.admission.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn breaker(&self) -> crate::errors::BreakerSnapshot {
        self.breaker.snapshot(&self.config.snapshot().config.risk)
    }

    pub fn health(&self) -> HealthStatus {
        let (running, paused) = self.scanner.counts();
        let breaker = self.breaker();
        run_health_check(HealthInputs {
            watch_entries_running: running,
            watch_entries_paused: paused,
            breaker: &breaker,
            trades_in_flight: self.coordinator.inflight().in_flight(),
            config_version: self.config.version(),
            last_observation: self.scanner.last_observation(),
            start_time: self.start_time,
        })
    }

    pub fn shutdown(&self) {
        self.scanner.shutdown();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

/// Routes observations to their network's worker. Never waits on a worker: a full
/// queue drops the observation, a fresher one follows on the next scan.
struct Dispatcher {
    queues: HashMap<NetworkId, mpsc::Sender<SpreadObservation>>,
    stats: Arc<PipelineStats>,
}

impl Dispatcher {
    async fn run(self, mut rx: mpsc::Receiver<SpreadObservation>) {
        while let Some(observation) = rx.recv().await {
            self.stats.record_observation();
            let Some(queue) = self.queues.get(&observation.pair.network) else {
                warn!(network = %observation.pair.network, "No evaluation worker for network, skipping observation");
                continue;
            };
            match queue.try_send(observation) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(observation)) => {
                    self.stats.record_dropped();
                    warn!(
                        watch_id = %observation.watch_id,
                        network = %observation.pair.network,
                        "⚠️ Evaluation queue full, dropping observation"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(observation)) => {
                    warn!(network = %observation.pair.network, "Evaluation worker stopped, skipping observation");
                }
            }
        }
        info!("Observation channel closed, dispatcher stopping");
    }
}

struct EvaluationLoop {
    network: NetworkId,
    config: ConfigHandle,
    evaluator: Arc<ProfitabilityEvaluator>,
    coordinator: Arc<ExecutionCoordinator>,
    fees: Arc<FeeCache>,
    stats: Arc<PipelineStats>,
    events: broadcast::Sender<OpportunityEvent>,
}

impl EvaluationLoop {
    async fn run(self, mut rx: mpsc::Receiver<SpreadObservation>) {
        while let Some(observation) = rx.recv().await {
            self.handle(observation).await;
        }
        info!(network = %self.network, "Evaluation worker stopping");
    }

    async fn handle(&self, observation: SpreadObservation) {
        let max_age = Duration::from_secs(
            u64::try_from(self.config.snapshot().config.scanner.max_quote_age_secs).unwrap_or(0),
        );
        let Some(fee) = self.fees.get(&self.network, max_age) else {
            debug!(network = %self.network, "No fresh fee estimate, skipping observation");
            return;
        };
        let context = EvaluationContext {
            gas_price_wei: fee.gas_price(),
        };

        match self.evaluator.evaluate(&observation, &context).await {
            EvaluationOutcome::Rejected(rejection) => {
                self.stats.record_rejected(rejection.reason);
                let _ = self.events.send(OpportunityEvent::rejected(&observation, rejection));
            }
            EvaluationOutcome::Accepted(opportunity) => match self.coordinator.begin(opportunity.clone()) {
                Err(rejection) => {
                    self.stats.record_rejected(rejection.reason);
                    let _ = self.events.send(OpportunityEvent::rejected(&observation, rejection));
                }
                Ok(ticket) => {
                    self.stats.record_accepted();
                    print_arbitrage_opportunity(&opportunity);
                    let _ = self.events.send(OpportunityEvent::Accepted { opportunity });
                    let coordinator = self.coordinator.clone();
                    let stats = self.stats.clone();
                    tokio::spawn(async move {
                        let outcome = coordinator.run(ticket).await;
                        stats.record_outcome(&outcome);
                        print_trade_outcome(&outcome);
                    });
                }
            },
        }
    }
}
