use flashguard_arb::admission::AdmissionController;
use flashguard_arb::arbitrage::{EvaluationContext, NeutralConfidence, ProfitabilityEvaluator};
use flashguard_arb::config::{Config, ConfigHandle};
use flashguard_arb::errors::CircuitBreaker;
use flashguard_arb::execution::{
    ExecutionCoordinator, InFlightRegistry, LocalTransactionSigner, NetworkExecution, SettlementGateway,
};
use flashguard_arb::relay::PrivateRelayClient;
use flashguard_arb::types::{NetworkId, TradeOutcome};
use flashguard_arb::utils::{system_clock, Clock};
use flashguard_arb::volatility::VolatilityTracker;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use super::fakes::{FakeChain, FakeRelay, FakeSettlement};
use super::fixtures::{GAS_PRICE_WEI, NETWORK};

pub struct Harness {
    pub config: ConfigHandle,
    pub chain: Arc<FakeChain>,
    pub relay: Arc<FakeRelay>,
    pub settlement: Arc<FakeSettlement>,
    pub breaker: Arc<CircuitBreaker>,
    pub relay_client: Arc<PrivateRelayClient>,
    pub coordinator: Arc<ExecutionCoordinator>,
    pub evaluator: ProfitabilityEvaluator,
    pub outcomes: broadcast::Receiver<TradeOutcome>,
}

impl Harness {
    pub fn new(config: Config, settlement: FakeSettlement, relay: FakeRelay) -> Self {
        Self::with_clock(config, settlement, relay, system_clock())
    }

    pub fn with_clock(config: Config, settlement: FakeSettlement, relay: FakeRelay, clock: Arc<dyn Clock>) -> Self {
        let settlement = Arc::new(settlement);
        Self::assemble(config, settlement.clone(), settlement, relay, clock)
    }

    /// Settles through `gateway` instead of the scripted fake; `settlement` stays idle.
    pub fn with_gateway(config: Config, gateway: Arc<dyn SettlementGateway>, relay: FakeRelay) -> Self {
        Self::assemble(config, gateway, Arc::new(FakeSettlement::new()), relay, system_clock())
    }

    fn assemble(
        config: Config,
        gateway: Arc<dyn SettlementGateway>,
        settlement: Arc<FakeSettlement>,
        relay: FakeRelay,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = ConfigHandle::new(config);
        let chain = Arc::new(FakeChain::new(100));
        let relay = Arc::new(relay);
        let admission = Arc::new(AdmissionController::new(
            config.snapshot().config.admission.clone(),
            clock.clone(),
        ));
        let breaker = Arc::new(CircuitBreaker::new(clock.clone()));
        let relay_client = Arc::new(PrivateRelayClient::new(
            relay.clone(),
            chain.clone(),
            admission,
            config.clone(),
        ));

        let mut networks = HashMap::new();
        networks.insert(
            NetworkId::from(NETWORK),
            NetworkExecution {
                chain: chain.clone(),
                relay: relay_client.clone(),
            },
        );
        let (tx, outcomes) = broadcast::channel(64);
        let coordinator = Arc::new(ExecutionCoordinator::new(
            config.clone(),
            breaker.clone(),
            InFlightRegistry::new(),
            gateway,
            Arc::new(LocalTransactionSigner::random()),
            networks,
            tx,
        ));
        let evaluator = ProfitabilityEvaluator::new(
            config.clone(),
            breaker.clone(),
            Arc::new(VolatilityTracker::new(clock)),
            Arc::new(NeutralConfidence),
        );

        Self {
            config,
            chain,
            relay,
            settlement,
            breaker,
            relay_client,
            coordinator,
            evaluator,
            outcomes,
        }
    }

    pub fn context() -> EvaluationContext {
        EvaluationContext {
            gas_price_wei: GAS_PRICE_WEI,
        }
    }
}
