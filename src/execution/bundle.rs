//! Settlement calldata, transaction signing and the per-trade bundle plan

use alloy::{
    consensus::{SignableTransaction, TxEip1559, TxEnvelope},
    eips::eip2718::Encodable2718,
    network::TxSignerSync,
    primitives::{Address, Bytes, TxKind, U256},
    signers::local::PrivateKeySigner,
    sol,
    sol_types::SolCall,
};
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use crate::{
    arbitrage::gas_cost_units,
    errors::{BotError, BotResult},
    relay::BundleSource,
    types::AttemptPricing,
    utils::signed,
};

sol! {
    function executeFlashArbitrage(
        address asset,
        uint256 principal,
        address intermediate,
        address firstVenue,
        address secondVenue,
        uint256 minIntermediateOut,
        uint256 minFinalOut,
        uint64 deadlineBlock
    );
}

/// Fields of one EIP-1559 transaction to the settlement executor.
#[derive(Debug, Clone)]
pub struct UnsignedCall {
    pub chain_id: u64,
    pub nonce: u64,
    pub to: Address,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub input: Bytes,
}

#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Address;

    /// EIP-2718 encoded signed transaction.
    async fn sign(&self, call: UnsignedCall) -> BotResult<Bytes>;
}

pub struct LocalTransactionSigner {
    signer: PrivateKeySigner,
}

impl LocalTransactionSigner {
    pub fn from_private_key(private_key: &str) -> BotResult<Self> {
        let signer = PrivateKeySigner::from_str(private_key).map_err(|e| BotError::Signing {
            message: format!("Failed to parse private key: {}", e),
        })?;
        Ok(Self { signer })
    }

    pub fn random() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }
}

#[async_trait]
impl TransactionSigner for LocalTransactionSigner {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn sign(&self, call: UnsignedCall) -> BotResult<Bytes> {
        let mut tx = TxEip1559 {
            chain_id: call.chain_id,
            nonce: call.nonce,
            gas_limit: call.gas_limit,
            max_fee_per_gas: call.max_fee_per_gas,
            max_priority_fee_per_gas: call.max_priority_fee_per_gas,
            to: TxKind::Call(call.to),
            value: U256::ZERO,
            access_list: Default::default(),
            input: call.input,
        };
        let signature = self
            .signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| BotError::Signing { message: e.to_string() })?;
        let envelope: TxEnvelope = tx.into_signed(signature).into();
        Ok(Bytes::from(envelope.encoded_2718()))
    }
}

/// Route and guards derived from the dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashArbitrageRoute {
    pub asset: Address,
    pub principal: u128,
    pub intermediate: Address,
    pub first_venue: Address,
    pub second_venue: Address,
    pub min_intermediate_out: u128,
    pub min_final_out: u128,
}

pub fn encode_flash_arbitrage(route: &FlashArbitrageRoute, deadline_block: u64) -> Bytes {
    executeFlashArbitrageCall {
        asset: route.asset,
        principal: U256::from(route.principal),
        intermediate: route.intermediate,
        firstVenue: route.first_venue,
        secondVenue: route.second_venue,
        minIntermediateOut: U256::from(route.min_intermediate_out),
        minFinalOut: U256::from(route.min_final_out),
        deadlineBlock: deadline_block,
    }
    .abi_encode()
    .into()
}

/// One trade's bundle: a single settlement transaction rebuilt for every target block.
pub struct TradeBundlePlan {
    pub route: FlashArbitrageRoute,
    pub executor: Address,
    pub chain_id: u64,
    pub gas_limit: u64,
    pub nonce: u64,
    /// Dry-run surplus after repaying the loan, before gas.
    pub surplus_before_gas: i128,
    pub native_price_units: u128,
    pub signer: Arc<dyn TransactionSigner>,
}

#[async_trait]
impl BundleSource for TradeBundlePlan {
    async fn build(&self, pricing: &AttemptPricing) -> BotResult<Vec<Bytes>> {
        let input = encode_flash_arbitrage(&self.route, pricing.target_block);
        let raw = self
            .signer
            .sign(UnsignedCall {
                chain_id: self.chain_id,
                nonce: self.nonce,
                to: self.executor,
                gas_limit: self.gas_limit,
                max_fee_per_gas: pricing.max_fee_per_gas,
                max_priority_fee_per_gas: pricing.max_priority_fee_per_gas,
                input,
            })
            .await?;
        debug!(target_block = pricing.target_block, attempt = pricing.attempt, "Signed settlement transaction");
        Ok(vec![raw])
    }

    fn still_profitable(&self, pricing: &AttemptPricing) -> bool {
        let gas = gas_cost_units(self.gas_limit, pricing.max_fee_per_gas, self.native_price_units);
        self.surplus_before_gas - signed(gas) > 0
    }
}
