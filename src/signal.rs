use crate::config::StrategyParams;
use crate::sizing::SizingPolicy;
use crate::types::Side;

/// Ratio at which a resting order's premise has closed.
const NEUTRAL_RATIO: f64 = 1.0;

/// Inventory view the engine needs from the ledger for one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Exposure {
    pub position: i64,
    pub has_bid: bool,
    pub has_ask: bool,
    /// Volume still working on own bids, including ones being cancelled.
    pub outstanding_buy: u64,
    pub outstanding_sell: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    CancelBid,
    CancelAsk,
    OpenBuy { price: u64, volume: u64 },
    OpenSell { price: u64, volume: u64 },
}

#[derive(Debug, Clone)]
pub struct SignalEngine {
    lot_size: u64,
    position_limit: i64,
    buy_ratio: f64,
    sell_ratio: f64,
    policy: SizingPolicy,
}

impl SignalEngine {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            lot_size: params.lot_size,
            position_limit: params.position_limit,
            buy_ratio: params.buy_ratio,
            sell_ratio: params.sell_ratio,
            policy: SizingPolicy::new(params),
        }
    }

    pub fn policy(&self) -> &SizingPolicy {
        &self.policy
    }

    /// Runs once per ETF book update. An empty result means "hold".
    pub fn evaluate(
        &mut self,
        ratio: f64,
        etf_best_bid: u64,
        etf_best_ask: u64,
        exposure: &Exposure,
    ) -> Vec<Decision> {
        let mut decisions = Vec::new();
        let mut has_bid = exposure.has_bid;
        let mut has_ask = exposure.has_ask;

        if has_ask && ratio <= NEUTRAL_RATIO {
            decisions.push(Decision::CancelAsk);
            has_ask = false;
        }
        if has_bid && ratio >= NEUTRAL_RATIO {
            decisions.push(Decision::CancelBid);
            has_bid = false;
        }

        self.policy.observe(ratio);

        if !has_bid && ratio < self.buy_ratio && exposure.position < self.position_limit {
            let raw = self.policy.volume(Side::Buy, ratio, self.lot_size);
            let headroom = self.position_limit
                - exposure.position
                - exposure.outstanding_buy as i64;
            match clamp_volume(raw, headroom) {
                Some(volume) if etf_best_ask > 0 => decisions.push(Decision::OpenBuy {
                    price: etf_best_ask,
                    volume,
                }),
                Some(_) => log::debug!("[SIGNAL] no ETF ask to lift, buy skipped"),
                None => log::debug!(
                    "[SIGNAL] buy volume clamped to zero (position={}, outstanding={})",
                    exposure.position,
                    exposure.outstanding_buy
                ),
            }
        }

        if !has_ask && ratio > self.sell_ratio && exposure.position > -self.position_limit {
            let raw = self.policy.volume(Side::Sell, ratio, self.lot_size);
            let headroom = self.position_limit + exposure.position
                - exposure.outstanding_sell as i64;
            match clamp_volume(raw, headroom) {
                Some(volume) if etf_best_bid > 0 => decisions.push(Decision::OpenSell {
                    price: etf_best_bid,
                    volume,
                }),
                Some(_) => log::debug!("[SIGNAL] no ETF bid to hit, sell skipped"),
                None => log::debug!(
                    "[SIGNAL] sell volume clamped to zero (position={}, outstanding={})",
                    exposure.position,
                    exposure.outstanding_sell
                ),
            }
        }

        decisions
    }
}

/// Applies the position clamp last; a non-positive result means no order.
fn clamp_volume(raw: u64, headroom: i64) -> Option<u64> {
    if headroom <= 0 || raw == 0 {
        return None;
    }
    Some(raw.min(headroom as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SizingMode;

    fn engine(mode: SizingMode) -> SignalEngine {
        SignalEngine::new(&StrategyParams {
            sizing_mode: mode,
            ..StrategyParams::default()
        })
    }

    fn flat() -> Exposure {
        Exposure::default()
    }

    #[test]
    fn ratio_on_buy_threshold_does_not_open() {
        let mut engine = engine(SizingMode::Static);
        let ratio = 9950.0 / 10000.0;
        assert!(engine.evaluate(ratio, 9900, 10000, &flat()).is_empty());
    }

    #[test]
    fn ratio_on_sell_threshold_does_not_open() {
        let mut engine = engine(SizingMode::Static);
        let ratio = 10050.0 / 10000.0;
        assert!(engine.evaluate(ratio, 10000, 10100, &flat()).is_empty());
    }

    #[test]
    fn cheap_etf_opens_buy_at_best_ask() {
        let mut engine = engine(SizingMode::Static);
        let decisions = engine.evaluate(0.99, 9800, 9900, &flat());
        assert_eq!(
            decisions,
            vec![Decision::OpenBuy {
                price: 9900,
                volume: 10
            }]
        );
    }

    #[test]
    fn rich_etf_opens_sell_at_best_bid() {
        let mut engine = engine(SizingMode::Static);
        let decisions = engine.evaluate(1.01, 10100, 10200, &flat());
        assert_eq!(
            decisions,
            vec![Decision::OpenSell {
                price: 10100,
                volume: 10
            }]
        );
    }

    #[test]
    fn resting_orders_expire_when_ratio_crosses_neutral() {
        let mut engine = engine(SizingMode::Static);
        let exposure = Exposure {
            has_bid: true,
            has_ask: true,
            ..Exposure::default()
        };
        let decisions = engine.evaluate(1.0, 10000, 10100, &exposure);
        assert_eq!(decisions, vec![Decision::CancelAsk, Decision::CancelBid]);
    }

    #[test]
    fn resting_bid_blocks_second_buy() {
        let mut engine = engine(SizingMode::Static);
        let exposure = Exposure {
            has_bid: true,
            outstanding_buy: 10,
            ..Exposure::default()
        };
        assert!(engine.evaluate(0.98, 9700, 9800, &exposure).is_empty());
    }

    #[test]
    fn buy_volume_is_clamped_to_limit() {
        let mut engine = engine(SizingMode::Static);
        let exposure = Exposure {
            position: 95,
            ..Exposure::default()
        };
        let decisions = engine.evaluate(0.99, 9800, 9900, &exposure);
        assert_eq!(
            decisions,
            vec![Decision::OpenBuy {
                price: 9900,
                volume: 5
            }]
        );
    }

    #[test]
    fn clamp_reaching_zero_is_a_no_op() {
        let mut engine = engine(SizingMode::Static);
        let exposure = Exposure {
            position: 90,
            outstanding_buy: 10,
            ..Exposure::default()
        };
        assert!(engine.evaluate(0.99, 9800, 9900, &exposure).is_empty());

        let at_floor = Exposure {
            position: -100,
            ..Exposure::default()
        };
        assert!(engine.evaluate(1.01, 10100, 10200, &at_floor).is_empty());
    }

    #[test]
    fn bollinger_bonus_is_clamped_after_multiplier() {
        let mut engine = engine(SizingMode::Bollinger);
        for _ in 0..20 {
            engine.evaluate(1.0, 10000, 10000, &flat());
        }
        let exposure = Exposure {
            position: 80,
            ..Exposure::default()
        };
        let decisions = engine.evaluate(0.98, 9700, 9800, &exposure);
        assert_eq!(
            decisions,
            vec![Decision::OpenBuy {
                price: 9800,
                volume: 20
            }]
        );
    }

    #[test]
    fn missing_quote_skips_open() {
        let mut engine = engine(SizingMode::Static);
        assert!(engine.evaluate(0.99, 9800, 0, &flat()).is_empty());
    }
}
