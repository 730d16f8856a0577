use alloy::primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use flashguard_arb::errors::{BotError, BotResult};
use flashguard_arb::execution::{LoanReceipt, SettlementGateway, SwapDirection};
use flashguard_arb::network::{ChainStateSource, FeeEstimate};
use flashguard_arb::quotes::QuoteSource;
use flashguard_arb::relay::PrivateRelay;
use flashguard_arb::types::{FlashLoanObligation, NetworkId, PriceQuote, RelayInclusion, SimulationResult, VenueId};
use parking_lot::Mutex;
use rust_decimal::prelude::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use super::fixtures::NETWORK;

fn transport_error(what: &str) -> BotError {
    BotError::network(what.to_string(), anyhow::anyhow!("connection reset"))
}

/// Chain whose head only moves when a test says so.
pub struct FakeChain {
    network: NetworkId,
    pub head: AtomicU64,
    pub fee: Mutex<FeeEstimate>,
    pub unavailable: AtomicBool,
    /// Fee reads never complete.
    pub stall_fees: AtomicBool,
    pub nonce_calls: AtomicU32,
}

impl FakeChain {
    pub fn new(head: u64) -> Self {
        Self {
            network: NetworkId::from(NETWORK),
            head: AtomicU64::new(head),
            fee: Mutex::new(FeeEstimate {
                base_fee_per_gas: 9_000_000_000,
                priority_fee_per_gas: 1_000_000_000,
            }),
            unavailable: AtomicBool::new(false),
            stall_fees: AtomicBool::new(false),
            nonce_calls: AtomicU32::new(0),
        }
    }

    pub fn set_gas_price(&self, base_fee_per_gas: u128, priority_fee_per_gas: u128) {
        *self.fee.lock() = FeeEstimate {
            base_fee_per_gas,
            priority_fee_per_gas,
        };
    }

    fn check(&self) -> BotResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BotError::Config {
                message: "chain offline".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChainStateSource for FakeChain {
    fn network(&self) -> &NetworkId {
        &self.network
    }

    async fn block_number(&self) -> BotResult<u64> {
        self.check()?;
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn fee_estimate(&self) -> BotResult<FeeEstimate> {
        if self.stall_fees.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.check()?;
        Ok(*self.fee.lock())
    }

    async fn inclusion_block(&self, _tx_hash: B256) -> BotResult<Option<u64>> {
        Ok(None)
    }

    async fn nonce(&self, _account: Address) -> BotResult<u64> {
        self.check()?;
        Ok(u64::from(self.nonce_calls.fetch_add(1, Ordering::SeqCst)))
    }
}

#[derive(Debug, Clone)]
pub struct Submitted {
    pub transactions: Vec<Bytes>,
    pub block: u64,
}

/// Relay with a scripted simulation verdict, scripted transport failures and a chosen
/// submission that gets included.
pub struct FakeRelay {
    pub simulation: Mutex<SimulationResult>,
    pub simulate_transport_failures: AtomicU32,
    pub reject_submissions: AtomicBool,
    /// Index of the submission the relay reports as included, if any.
    pub include_submission: Mutex<Option<usize>>,
    pub simulations: AtomicU32,
    pub submissions: Mutex<Vec<Submitted>>,
}

impl FakeRelay {
    pub fn new() -> Self {
        Self {
            simulation: Mutex::new(SimulationResult {
                success: true,
                gas_used: 300_000,
                net_value_wei: 1_000_000_000_000_000,
                revert_reason: None,
            }),
            simulate_transport_failures: AtomicU32::new(0),
            reject_submissions: AtomicBool::new(false),
            include_submission: Mutex::new(None),
            simulations: AtomicU32::new(0),
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn including(index: usize) -> Self {
        let relay = Self::new();
        *relay.include_submission.lock() = Some(index);
        relay
    }

    pub fn reverting(reason: &str) -> Self {
        let relay = Self::new();
        *relay.simulation.lock() = SimulationResult {
            success: false,
            gas_used: 0,
            net_value_wei: 0,
            revert_reason: Some(reason.to_string()),
        };
        relay
    }

    pub fn submitted(&self) -> Vec<Submitted> {
        self.submissions.lock().clone()
    }
}

#[async_trait]
impl PrivateRelay for FakeRelay {
    fn endpoint(&self) -> &str {
        "fake-relay"
    }

    async fn simulate(&self, _transactions: &[Bytes], _block: u64) -> BotResult<SimulationResult> {
        self.simulations.fetch_add(1, Ordering::SeqCst);
        let remaining = self.simulate_transport_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.simulate_transport_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(transport_error("eth_callBundle"));
        }
        Ok(self.simulation.lock().clone())
    }

    async fn submit(&self, transactions: &[Bytes], block: u64) -> BotResult<String> {
        if self.reject_submissions.load(Ordering::SeqCst) {
            return Err(BotError::relay("bundle rejected: nonce too low"));
        }
        let mut submissions = self.submissions.lock();
        submissions.push(Submitted {
            transactions: transactions.to_vec(),
            block,
        });
        Ok(format!("{}", submissions.len() - 1))
    }

    async fn inclusion_status(&self, submission_id: &str) -> BotResult<RelayInclusion> {
        let index: usize = submission_id.parse().map_err(|_| BotError::relay("unknown submission"))?;
        let block = self.submissions.lock()[index].block;
        if *self.include_submission.lock() == Some(index) {
            Ok(RelayInclusion::Included { block })
        } else {
            Ok(RelayInclusion::NotIncluded)
        }
    }
}

/// Dry-run stand-in with scripted outputs and an optional slow draw.
pub struct FakeSettlement {
    pub draw_delay: Mutex<Option<Duration>>,
    pub fail_draw: AtomicBool,
    pub fail_first_leg: AtomicBool,
    /// Multiplier in bps applied to every swap's ideal output.
    pub output_bps: AtomicU32,
    pub draws: AtomicU32,
}

impl FakeSettlement {
    pub fn new() -> Self {
        Self {
            draw_delay: Mutex::new(None),
            fail_draw: AtomicBool::new(false),
            fail_first_leg: AtomicBool::new(false),
            output_bps: AtomicU32::new(10_000),
            draws: AtomicU32::new(0),
        }
    }

    pub fn slow_draw(delay: Duration) -> Self {
        let settlement = Self::new();
        *settlement.draw_delay.lock() = Some(delay);
        settlement
    }

    /// Every swap returns this share of the quoted output.
    pub fn with_output_bps(bps: u32) -> Self {
        let settlement = Self::new();
        settlement.output_bps.store(bps, Ordering::SeqCst);
        settlement
    }
}

#[async_trait]
impl SettlementGateway for FakeSettlement {
    async fn draw(&self, asset: Address, principal: u128) -> BotResult<LoanReceipt> {
        self.draws.fetch_add(1, Ordering::SeqCst);
        let delay = *self.draw_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_draw.load(Ordering::SeqCst) {
            return Err(BotError::relay("lender refused"));
        }
        Ok(LoanReceipt {
            asset,
            principal,
            premium: principal * 9 / 10_000,
        })
    }

    async fn swap(&self, leg: &PriceQuote, direction: SwapDirection, amount_in: u128) -> BotResult<u128> {
        if direction == SwapDirection::Forward && self.fail_first_leg.load(Ordering::SeqCst) {
            return Err(BotError::relay("first venue reverted"));
        }
        let amount = Decimal::from_u128(amount_in).ok_or_else(|| BotError::relay("swap overflow"))?;
        let ideal = match direction {
            SwapDirection::Forward => amount * leg.price,
            SwapDirection::Reverse => amount / leg.price,
        };
        let ideal = ideal.trunc().to_u128().ok_or_else(|| BotError::relay("swap overflow"))?;
        Ok(ideal * u128::from(self.output_bps.load(Ordering::SeqCst)) / 10_000)
    }

    async fn repay(&self, obligation: &FlashLoanObligation, available: u128) -> BotResult<()> {
        if available < obligation.total_owed() {
            return Err(BotError::relay("repayment shortfall"));
        }
        Ok(())
    }
}

/// Quote source that serves queued results, then repeats the last quote as is.
pub struct FakeQuoteSource {
    venue: VenueId,
    endpoint: String,
    queue: Mutex<VecDeque<BotResult<PriceQuote>>>,
    last: Mutex<Option<PriceQuote>>,
    pub calls: AtomicU32,
}

impl FakeQuoteSource {
    pub fn new(venue: &str) -> Self {
        Self {
            venue: VenueId::from(venue),
            endpoint: format!("{}-endpoint", venue),
            queue: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            calls: AtomicU32::new(0),
        }
    }

    pub fn push(&self, quote: PriceQuote) {
        self.queue.lock().push_back(Ok(quote));
    }

    pub fn push_failure(&self) {
        self.queue.lock().push_back(Err(transport_error("quote")));
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteSource for FakeQuoteSource {
    fn venue(&self) -> &VenueId {
        &self.venue
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_quote(&self, _network: &NetworkId, _token_in: Address, _token_out: Address) -> BotResult<PriceQuote> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.queue.lock().pop_front();
        match next {
            Some(Ok(quote)) => {
                *self.last.lock() = Some(quote.clone());
                Ok(quote)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last
                .lock()
                .clone()
                .ok_or_else(|| transport_error("no quote scripted")),
        }
    }
}
