//! Per-pair single-flight registry and in-flight exposure

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;
use crate::types::{PairKey, RejectionReason};

#[derive(Default)]
pub struct InFlightRegistry {
    slots: DashMap<PairKey, (Uuid, u128)>,
    exposure: Mutex<u128>,
}

/// Holds a pair's slot. Dropping it releases the slot and its exposure.
pub struct InFlightClaim {
    registry: Arc<InFlightRegistry>,
    pair: PairKey,
    trade_id: Uuid,
    notional: u128,
}

impl InFlightClaim {
    pub fn pair(&self) -> &PairKey {
        &self.pair
    }
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        self.registry.release(&self.pair, self.trade_id, self.notional);
    }
}

impl InFlightRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claims `pair` for `trade_id`. `max_exposure` of zero disables the exposure cap.
    pub fn claim(
        self: &Arc<Self>,
        pair: &PairKey,
        trade_id: Uuid,
        notional: u128,
        max_exposure: u128,
    ) -> Result<InFlightClaim, RejectionReason> {
        match self.slots.entry(pair.clone()) {
            Entry::Occupied(_) => Err(RejectionReason::DuplicateInFlight),
            Entry::Vacant(slot) => {
                let mut exposure = self.exposure.lock();
                let next = exposure.saturating_add(notional);
                if max_exposure > 0 && next > max_exposure {
                    return Err(RejectionReason::ExposureCap);
                }
                *exposure = next;
                slot.insert((trade_id, notional));
                debug!(%pair, %trade_id, exposure = next, "Pair claimed");
                Ok(InFlightClaim {
                    registry: self.clone(),
                    pair: pair.clone(),
                    trade_id,
                    notional,
                })
            }
        }
    }

    fn release(&self, pair: &PairKey, trade_id: Uuid, notional: u128) {
        if self.slots.remove_if(pair, |_, (id, _)| *id == trade_id).is_some() {
            let mut exposure = self.exposure.lock();
            *exposure = exposure.saturating_sub(notional);
        }
    }

    pub fn in_flight(&self) -> usize {
        self.slots.len()
    }

    pub fn exposure(&self) -> u128 {
        *self.exposure.lock()
    }

    pub fn is_claimed(&self, pair: &PairKey) -> bool {
        self.slots.contains_key(pair)
    }
}
