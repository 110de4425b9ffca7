use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

use super::order_gateway::{GatewayError, OrderGateway};
use crate::types::{Instrument, Lifespan, MarketEvent, Side};

#[derive(Debug, Clone, Copy)]
struct RestingOrder {
    side: Side,
    price: u64,
    volume: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Top {
    bid: u64,
    ask: u64,
}

/// Simulated exchange used for replays. Orders that cross the last seen
/// ETF book fill with `fill_probability`, the rest rest until a later book
/// crosses them or they are cancelled. Hedges fill at the future touch.
pub struct PaperGateway {
    fill_probability: f64,
    rng: StdRng,
    etf: Top,
    future: Top,
    resting: BTreeMap<u64, RestingOrder>,
    outbox: Vec<MarketEvent>,
}

impl PaperGateway {
    pub fn new(fill_probability: f64, seed: u64) -> Self {
        Self {
            fill_probability: fill_probability.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(seed),
            etf: Top::default(),
            future: Top::default(),
            resting: BTreeMap::new(),
            outbox: Vec::new(),
        }
    }

    pub fn resting_count(&self) -> usize {
        self.resting.len()
    }

    fn crosses(&self, side: Side, price: u64) -> bool {
        match side {
            Side::Buy => self.etf.ask > 0 && price >= self.etf.ask,
            Side::Sell => self.etf.bid > 0 && price <= self.etf.bid,
        }
    }

    fn fill(&mut self, client_order_id: u64, price: u64, volume: u64) {
        self.outbox.push(MarketEvent::OrderFilled {
            client_order_id,
            price,
            volume,
        });
        self.outbox.push(MarketEvent::OrderStatus {
            client_order_id,
            fill_volume: volume,
            remaining_volume: 0,
            fees: 0,
        });
    }

    fn match_resting(&mut self) {
        let crossed: Vec<u64> = self
            .resting
            .iter()
            .filter(|(_, order)| self.crosses(order.side, order.price))
            .map(|(id, _)| *id)
            .collect();
        for id in crossed {
            if let Some(order) = self.resting.remove(&id) {
                log::debug!("[PAPER] resting order {} crossed by book", id);
                self.fill(id, order.price, order.volume);
            }
        }
    }
}

impl OrderGateway for PaperGateway {
    fn send_insert_order(
        &mut self,
        client_order_id: u64,
        side: Side,
        price: u64,
        volume: u64,
        lifespan: Lifespan,
    ) -> Result<(), GatewayError> {
        if price == 0 || volume == 0 {
            return Err(GatewayError::Rejected(format!(
                "invalid price {} or volume {}",
                price, volume
            )));
        }
        if self.crosses(side, price) && self.rng.gen_bool(self.fill_probability) {
            self.fill(client_order_id, price, volume);
            return Ok(());
        }
        if lifespan == Lifespan::FillAndKill {
            self.outbox.push(MarketEvent::OrderStatus {
                client_order_id,
                fill_volume: 0,
                remaining_volume: 0,
                fees: 0,
            });
            return Ok(());
        }
        self.resting.insert(
            client_order_id,
            RestingOrder {
                side,
                price,
                volume,
            },
        );
        Ok(())
    }

    fn send_cancel_order(&mut self, client_order_id: u64) -> Result<(), GatewayError> {
        if self.resting.remove(&client_order_id).is_none() {
            return Err(GatewayError::Rejected(format!(
                "cancel for unknown order {}",
                client_order_id
            )));
        }
        self.outbox.push(MarketEvent::OrderStatus {
            client_order_id,
            fill_volume: 0,
            remaining_volume: 0,
            fees: 0,
        });
        Ok(())
    }

    fn send_hedge_order(
        &mut self,
        client_order_id: u64,
        side: Side,
        price: u64,
        volume: u64,
    ) -> Result<(), GatewayError> {
        let touch = match side {
            Side::Buy => self.future.ask,
            Side::Sell => self.future.bid,
        };
        let executable = match side {
            Side::Buy => touch > 0 && price >= touch,
            Side::Sell => touch > 0 && price <= touch,
        };
        if !executable {
            return Err(GatewayError::Rejected(format!(
                "hedge {} at {} has no future liquidity",
                side, price
            )));
        }
        self.outbox.push(MarketEvent::HedgeFilled {
            client_order_id,
            price: touch,
            volume,
        });
        Ok(())
    }

    fn observe(&mut self, event: &MarketEvent) {
        if let MarketEvent::OrderBook {
            instrument, book, ..
        } = event
        {
            let top = Top {
                bid: book.best_bid(),
                ask: book.best_ask(),
            };
            match instrument {
                Instrument::Etf => {
                    self.etf = top;
                    self.match_resting();
                }
                Instrument::Future => self.future = top,
            }
        }
    }

    fn poll_events(&mut self) -> Vec<MarketEvent> {
        std::mem::take(&mut self.outbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BookLevels;

    fn book(instrument: Instrument, bid: u64, ask: u64) -> MarketEvent {
        MarketEvent::OrderBook {
            instrument,
            sequence: 0,
            book: BookLevels::top(bid, 10, ask, 10),
        }
    }

    #[test]
    fn marketable_order_fills_immediately() {
        let mut gw = PaperGateway::new(1.0, 1);
        gw.observe(&book(Instrument::Etf, 10000, 10100));
        gw.send_insert_order(1, Side::Sell, 10000, 10, Lifespan::GoodForDay)
            .unwrap();
        let events = gw.poll_events();
        assert_eq!(
            events[0],
            MarketEvent::OrderFilled {
                client_order_id: 1,
                price: 10000,
                volume: 10
            }
        );
        assert!(matches!(
            events[1],
            MarketEvent::OrderStatus {
                remaining_volume: 0,
                ..
            }
        ));
        assert!(gw.poll_events().is_empty());
    }

    #[test]
    fn unfilled_fill_and_kill_is_retired_not_rested() {
        let mut gw = PaperGateway::new(0.0, 1);
        gw.observe(&book(Instrument::Etf, 10000, 10100));
        gw.send_insert_order(4, Side::Buy, 10100, 10, Lifespan::FillAndKill)
            .unwrap();
        assert_eq!(gw.resting_count(), 0);
        assert_eq!(
            gw.poll_events(),
            vec![MarketEvent::OrderStatus {
                client_order_id: 4,
                fill_volume: 0,
                remaining_volume: 0,
                fees: 0
            }]
        );
    }

    #[test]
    fn unlucky_order_rests_until_book_crosses() {
        let mut gw = PaperGateway::new(0.0, 1);
        gw.observe(&book(Instrument::Etf, 10000, 10100));
        gw.send_insert_order(1, Side::Buy, 10100, 10, Lifespan::GoodForDay)
            .unwrap();
        assert!(gw.poll_events().is_empty());
        assert_eq!(gw.resting_count(), 1);

        gw.observe(&book(Instrument::Etf, 9900, 10000));
        let events = gw.poll_events();
        assert_eq!(events.len(), 2);
        assert_eq!(gw.resting_count(), 0);
    }

    #[test]
    fn cancel_of_resting_order_reports_terminal_status() {
        let mut gw = PaperGateway::new(0.0, 1);
        gw.send_insert_order(4, Side::Sell, 10200, 10, Lifespan::GoodForDay)
            .unwrap();
        gw.send_cancel_order(4).unwrap();
        assert_eq!(
            gw.poll_events(),
            vec![MarketEvent::OrderStatus {
                client_order_id: 4,
                fill_volume: 0,
                remaining_volume: 0,
                fees: 0
            }]
        );
        assert!(gw.send_cancel_order(4).is_err());
    }

    #[test]
    fn hedge_fills_at_future_touch() {
        let mut gw = PaperGateway::new(1.0, 1);
        gw.observe(&book(Instrument::Future, 9900, 10100));
        gw.send_hedge_order(2, Side::Buy, 2_147_483_600, 10).unwrap();
        assert_eq!(
            gw.poll_events(),
            vec![MarketEvent::HedgeFilled {
                client_order_id: 2,
                price: 10100,
                volume: 10
            }]
        );
    }

    #[test]
    fn hedge_without_future_book_is_rejected() {
        let mut gw = PaperGateway::new(1.0, 1);
        assert!(matches!(
            gw.send_hedge_order(2, Side::Sell, 1, 10),
            Err(GatewayError::Rejected(_))
        ));
    }

    #[test]
    fn zero_volume_insert_is_rejected() {
        let mut gw = PaperGateway::new(1.0, 1);
        assert!(gw
            .send_insert_order(1, Side::Buy, 10000, 0, Lifespan::GoodForDay)
            .is_err());
    }
}
