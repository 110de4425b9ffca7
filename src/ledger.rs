use crate::types::Side;
use std::collections::HashMap;

/// Net ETF inventory plus bookkeeping for the orders this engine originated.
///
/// `active_bid_id`/`active_ask_id` hold the single resting order per side
/// (zero means none). Every own order id lives in exactly one side map until
/// a terminal status removes it, so fills that race a cancel are still
/// attributed and hedged.
#[derive(Debug, Default, Clone)]
pub struct PositionLedger {
    position: i64,
    active_bid_id: u64,
    active_ask_id: u64,
    bids: HashMap<u64, u64>,
    asks: HashMap<u64, u64>,
    hedges: HashMap<u64, Side>,
    hedged_position: i64,
}

/// Outcome of a primary fill that needs a hedge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillOutcome {
    /// Side of the ETF order that traded.
    pub filled_side: Side,
    pub volume: u64,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn active_bid_id(&self) -> u64 {
        self.active_bid_id
    }

    pub fn active_ask_id(&self) -> u64 {
        self.active_ask_id
    }

    pub fn is_tracked(&self, id: u64) -> bool {
        self.bids.contains_key(&id) || self.asks.contains_key(&id)
    }

    /// Volume still working across all own orders on one side.
    pub fn outstanding_volume(&self, side: Side) -> u64 {
        let book = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        book.values().sum()
    }

    /// Future inventory accumulated from hedge fills.
    pub fn hedged_position(&self) -> i64 {
        self.hedged_position
    }

    pub fn record_open(&mut self, side: Side, id: u64, volume: u64) {
        let slot = match side {
            Side::Buy => &mut self.active_bid_id,
            Side::Sell => &mut self.active_ask_id,
        };
        if *slot != 0 {
            log::debug!(
                "[LEDGER] {} slot already holds {} while recording {}",
                side,
                slot,
                id
            );
        }
        *slot = id;
        match side {
            Side::Buy => self.bids.insert(id, volume),
            Side::Sell => self.asks.insert(id, volume),
        };
    }

    /// Frees the side for a new order once a cancel has been sent. The id
    /// stays tracked until its terminal status arrives.
    pub fn mark_cancel_requested(&mut self, side: Side) -> u64 {
        let slot = match side {
            Side::Buy => &mut self.active_bid_id,
            Side::Sell => &mut self.active_ask_id,
        };
        std::mem::take(slot)
    }

    pub fn apply_fill(&mut self, id: u64, volume: u64) -> Option<FillOutcome> {
        if let Some(remaining) = self.asks.get_mut(&id) {
            *remaining = remaining.saturating_sub(volume);
            self.position -= volume as i64;
            return Some(FillOutcome {
                filled_side: Side::Sell,
                volume,
            });
        }
        if let Some(remaining) = self.bids.get_mut(&id) {
            *remaining = remaining.saturating_sub(volume);
            self.position += volume as i64;
            return Some(FillOutcome {
                filled_side: Side::Buy,
                volume,
            });
        }
        None
    }

    /// Terminal statuses (nothing remaining) retire the id; partial ones only
    /// refresh the remaining volume.
    pub fn apply_status(&mut self, id: u64, remaining_volume: u64) {
        if remaining_volume == 0 {
            if id == self.active_ask_id {
                self.active_ask_id = 0;
            } else if id == self.active_bid_id {
                self.active_bid_id = 0;
            }
            self.asks.remove(&id);
            self.bids.remove(&id);
            return;
        }
        if let Some(remaining) = self.asks.get_mut(&id) {
            *remaining = remaining_volume;
        } else if let Some(remaining) = self.bids.get_mut(&id) {
            *remaining = remaining_volume;
        }
    }

    pub fn record_hedge(&mut self, id: u64, side: Side) {
        self.hedges.insert(id, side);
    }

    /// Returns the hedge side when the id belongs to a hedge this engine sent.
    pub fn apply_hedge_fill(&mut self, id: u64, volume: u64) -> Option<Side> {
        let side = self.hedges.remove(&id)?;
        match side {
            Side::Buy => self.hedged_position += volume as i64,
            Side::Sell => self.hedged_position -= volume as i64,
        }
        Some(side)
    }

    pub fn pending_hedges(&self) -> usize {
        self.hedges.len()
    }

    /// Hedges that never executed are forgotten on error.
    pub fn drop_hedge(&mut self, id: u64) -> bool {
        self.hedges.remove(&id).is_some()
    }
}
