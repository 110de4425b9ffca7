use crate::config::StrategyParams;
use crate::ledger::FillOutcome;
use crate::types::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HedgeRequest {
    pub side: Side,
    pub price: u64,
    pub volume: u64,
}

/// Turns ETF fills into future orders priced at the edge of the tradable
/// range so they execute immediately.
#[derive(Debug, Clone)]
pub struct HedgeCoordinator {
    buy_price: u64,
    sell_price: u64,
}

impl HedgeCoordinator {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            buy_price: params.hedge_buy_price(),
            sell_price: params.min_bid_price,
        }
    }

    pub fn hedge_for(&self, fill: FillOutcome) -> Option<HedgeRequest> {
        if fill.volume == 0 {
            return None;
        }
        let side = fill.filled_side.opposite();
        let price = match side {
            Side::Buy => self.buy_price,
            Side::Sell => self.sell_price,
        };
        Some(HedgeRequest {
            side,
            price,
            volume: fill.volume,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_fill_hedges_with_buy_at_ceiling() {
        let hedger = HedgeCoordinator::new(&StrategyParams::default());
        let req = hedger
            .hedge_for(FillOutcome {
                filled_side: Side::Sell,
                volume: 10,
            })
            .unwrap();
        assert_eq!(req.side, Side::Buy);
        assert_eq!(req.price, 2_147_483_600);
        assert_eq!(req.volume, 10);
    }

    #[test]
    fn bid_fill_hedges_with_sell_at_floor() {
        let params = StrategyParams {
            min_bid_price: 100,
            ..StrategyParams::default()
        };
        let req = HedgeCoordinator::new(&params)
            .hedge_for(FillOutcome {
                filled_side: Side::Buy,
                volume: 7,
            })
            .unwrap();
        assert_eq!(req.side, Side::Sell);
        assert_eq!(req.price, 100);
        assert_eq!(req.volume, 7);
    }

    #[test]
    fn empty_fill_needs_no_hedge() {
        let hedger = HedgeCoordinator::new(&StrategyParams::default());
        assert!(hedger
            .hedge_for(FillOutcome {
                filled_side: Side::Buy,
                volume: 0
            })
            .is_none());
    }
}
