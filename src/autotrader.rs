use crate::commands::CommandEmitter;
use crate::config::StrategyParams;
use crate::hedge::HedgeCoordinator;
use crate::ledger::PositionLedger;
use crate::midprice::MidPriceTracker;
use crate::signal::{Decision, Exposure, SignalEngine};
use crate::types::{cents_to_dollars, BookLevels, Command, Instrument, MarketEvent, Side};

/// Framework-facing strategy. Each handler mutates state synchronously and
/// queues commands; the caller drains them with [`AutoTrader::take_commands`].
#[derive(Debug)]
pub struct AutoTrader {
    quotes: MidPriceTracker,
    signal: SignalEngine,
    ledger: PositionLedger,
    hedger: HedgeCoordinator,
    emitter: CommandEmitter,
}

impl AutoTrader {
    pub fn new(params: &StrategyParams) -> Self {
        log::info!(
            "[CONFIG] lot={} limit={} tick={} buy<{} sell>{} sizing={:?}",
            params.lot_size,
            params.position_limit,
            params.tick_size,
            params.buy_ratio,
            params.sell_ratio,
            params.sizing_mode
        );
        Self {
            quotes: MidPriceTracker::new(params.tick_size),
            signal: SignalEngine::new(params),
            ledger: PositionLedger::new(),
            hedger: HedgeCoordinator::new(params),
            emitter: CommandEmitter::new(),
        }
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn quotes(&self) -> &MidPriceTracker {
        &self.quotes
    }

    pub fn signal(&self) -> &SignalEngine {
        &self.signal
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        self.emitter.drain()
    }

    pub fn handle(&mut self, event: &MarketEvent) {
        match event {
            MarketEvent::OrderBook {
                instrument,
                sequence,
                book,
            } => self.on_order_book(*instrument, *sequence, book),
            MarketEvent::TradeTicks {
                instrument,
                sequence,
                book,
            } => self.on_trade_ticks(*instrument, *sequence, book),
            MarketEvent::OrderFilled {
                client_order_id,
                price,
                volume,
            } => self.on_order_filled(*client_order_id, *price, *volume),
            MarketEvent::HedgeFilled {
                client_order_id,
                price,
                volume,
            } => self.on_hedge_filled(*client_order_id, *price, *volume),
            MarketEvent::OrderStatus {
                client_order_id,
                fill_volume,
                remaining_volume,
                fees,
            } => self.on_order_status(*client_order_id, *fill_volume, *remaining_volume, *fees),
            MarketEvent::Error {
                client_order_id,
                message,
            } => self.on_error(*client_order_id, message),
            MarketEvent::Disconnect => self.on_disconnect(),
        }
    }

    pub fn on_order_book(&mut self, instrument: Instrument, sequence: u64, book: &BookLevels) {
        log::debug!(
            "[BOOK] {} seq={} ask={}x{} bid={}x{}",
            instrument,
            sequence,
            book.best_ask(),
            book.best_ask_volume(),
            book.best_bid(),
            book.best_bid_volume()
        );
        self.quotes
            .update_mid(instrument, book.best_bid(), book.best_ask());

        // Future books only refresh the future mid.
        if instrument != Instrument::Etf {
            return;
        }
        let Some(ratio) = self.quotes.ratio() else {
            log::debug!("[SIGNAL] waiting for both mids before trading");
            return;
        };
        log::debug!("[SIGNAL] ratio={:.5}", ratio);

        let exposure = Exposure {
            position: self.ledger.position(),
            has_bid: self.ledger.active_bid_id() != 0,
            has_ask: self.ledger.active_ask_id() != 0,
            outstanding_buy: self.ledger.outstanding_volume(Side::Buy),
            outstanding_sell: self.ledger.outstanding_volume(Side::Sell),
        };
        let decisions = self
            .signal
            .evaluate(ratio, book.best_bid(), book.best_ask(), &exposure);
        for decision in decisions {
            self.apply_decision(decision, ratio);
        }
    }

    fn apply_decision(&mut self, decision: Decision, ratio: f64) {
        match decision {
            Decision::CancelBid | Decision::CancelAsk => {
                let side = if decision == Decision::CancelBid {
                    Side::Buy
                } else {
                    Side::Sell
                };
                let id = self.ledger.mark_cancel_requested(side);
                if id == 0 {
                    return;
                }
                self.emitter.cancel_order(id);
                log::info!(
                    "[ORDER] cancel {} order {} (ratio={:.5})",
                    side,
                    id,
                    ratio
                );
            }
            Decision::OpenBuy { price, volume } => self.open(Side::Buy, price, volume, ratio),
            Decision::OpenSell { price, volume } => self.open(Side::Sell, price, volume, ratio),
        }
    }

    fn open(&mut self, side: Side, price: u64, volume: u64, ratio: f64) {
        let id = self.emitter.insert_order(side, price, volume);
        self.ledger.record_open(side, id, volume);
        log::info!(
            "[ORDER] {} order {} for {} lots at ${} (ratio={:.5}, position={}, sizing={})",
            side,
            id,
            volume,
            cents_to_dollars(price),
            ratio,
            self.ledger.position(),
            self.signal.policy().label()
        );
    }

    pub fn on_trade_ticks(&mut self, instrument: Instrument, sequence: u64, book: &BookLevels) {
        log::debug!(
            "[TRADES] {} seq={} ask={}x{} bid={}x{}",
            instrument,
            sequence,
            book.best_ask(),
            book.best_ask_volume(),
            book.best_bid(),
            book.best_bid_volume()
        );
    }

    pub fn on_order_filled(&mut self, client_order_id: u64, price: u64, volume: u64) {
        log::info!(
            "[FILL] order {} filled for {} lots at ${}",
            client_order_id,
            volume,
            cents_to_dollars(price)
        );
        let Some(fill) = self.ledger.apply_fill(client_order_id, volume) else {
            log::debug!("[FILL] order {} is not ours, ignored", client_order_id);
            return;
        };
        let Some(hedge) = self.hedger.hedge_for(fill) else {
            return;
        };
        let hedge_id = self
            .emitter
            .hedge_order(hedge.side, hedge.price, hedge.volume);
        self.ledger.record_hedge(hedge_id, hedge.side);
        log::info!(
            "[HEDGE] {} future {} lots as order {} (position={})",
            hedge.side,
            hedge.volume,
            hedge_id,
            self.ledger.position()
        );
    }

    pub fn on_hedge_filled(&mut self, client_order_id: u64, price: u64, volume: u64) {
        log::info!(
            "[HEDGE] hedge order {} filled for {} lots at ${} average",
            client_order_id,
            volume,
            cents_to_dollars(price)
        );
        if self
            .ledger
            .apply_hedge_fill(client_order_id, volume)
            .is_none()
        {
            return;
        }
        let net = self.ledger.position() + self.ledger.hedged_position();
        if net != 0 && self.ledger.pending_hedges() == 0 {
            log::warn!(
                "[HEDGE] net exposure {} (etf={}, future={})",
                net,
                self.ledger.position(),
                self.ledger.hedged_position()
            );
        }
    }

    pub fn on_order_status(
        &mut self,
        client_order_id: u64,
        fill_volume: u64,
        remaining_volume: u64,
        fees: i64,
    ) {
        log::info!(
            "[STATUS] order {} filled={} remaining={} fees={}",
            client_order_id,
            fill_volume,
            remaining_volume,
            fees
        );
        self.ledger.apply_status(client_order_id, remaining_volume);
    }

    pub fn on_error(&mut self, client_order_id: u64, message: &str) {
        log::warn!("[ERROR] order {}: {}", client_order_id, message);
        if client_order_id == 0 {
            return;
        }
        self.ledger.drop_hedge(client_order_id);
        self.on_order_status(client_order_id, 0, 0, 0);
    }

    pub fn on_disconnect(&mut self) {
        log::warn!(
            "[SESSION] execution connection lost (position={}, bid={}, ask={})",
            self.ledger.position(),
            self.ledger.active_bid_id(),
            self.ledger.active_ask_id()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SizingMode;
    use crate::types::Lifespan;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn trader() -> AutoTrader {
        AutoTrader::new(&StrategyParams::default())
    }

    fn book(instrument: Instrument, bid: u64, ask: u64) -> MarketEvent {
        MarketEvent::OrderBook {
            instrument,
            sequence: 1,
            book: BookLevels::top(bid, 50, ask, 50),
        }
    }

    /// ETF quoted rich against the future: ratio 10200 / 10000.
    fn rich_etf(trader: &mut AutoTrader) {
        trader.handle(&book(Instrument::Future, 9900, 10100));
        trader.handle(&book(Instrument::Etf, 10100, 10300));
    }

    #[test]
    fn no_decision_until_both_mids_exist() {
        let mut trader = trader();
        trader.handle(&book(Instrument::Etf, 10100, 10300));
        assert!(trader.take_commands().is_empty());
    }

    #[test]
    fn future_book_alone_never_trades() {
        let mut trader = trader();
        trader.handle(&book(Instrument::Etf, 10100, 10300));
        trader.handle(&book(Instrument::Future, 9900, 10100));
        assert!(trader.take_commands().is_empty());
    }

    #[test]
    fn rich_etf_sells_at_best_bid() {
        let mut trader = trader();
        rich_etf(&mut trader);
        assert_eq!(
            trader.take_commands(),
            vec![Command::InsertOrder {
                client_order_id: 1,
                side: Side::Sell,
                price: 10100,
                volume: 10,
                lifespan: Lifespan::GoodForDay,
            }]
        );
        assert_eq!(trader.ledger().active_ask_id(), 1);
        assert_eq!(trader.quotes().mid(Instrument::Etf), 10200);
        assert_eq!(trader.quotes().mid(Instrument::Future), 10000);
        assert_eq!(trader.quotes().ratio(), Some(1.02));
        assert_eq!(trader.signal().policy().label(), "static");
    }

    #[test]
    fn ask_fill_hedges_once_and_waits_for_status_to_clear() {
        let mut trader = trader();
        rich_etf(&mut trader);
        trader.take_commands();

        trader.handle(&MarketEvent::OrderFilled {
            client_order_id: 1,
            price: 10100,
            volume: 10,
        });
        assert_eq!(trader.ledger().position(), -10);
        assert_eq!(
            trader.take_commands(),
            vec![Command::HedgeOrder {
                client_order_id: 2,
                side: Side::Buy,
                price: 2_147_483_600,
                volume: 10,
            }]
        );
        assert_eq!(trader.ledger().active_ask_id(), 1);
        assert!(trader.ledger().is_tracked(1));

        trader.handle(&MarketEvent::OrderStatus {
            client_order_id: 1,
            fill_volume: 10,
            remaining_volume: 0,
            fees: 2,
        });
        assert_eq!(trader.ledger().active_ask_id(), 0);
        assert!(!trader.ledger().is_tracked(1));
    }

    #[test]
    fn hedge_fill_flattens_net_exposure() {
        let mut trader = trader();
        rich_etf(&mut trader);
        trader.handle(&MarketEvent::OrderFilled {
            client_order_id: 1,
            price: 10100,
            volume: 10,
        });
        trader.handle(&MarketEvent::HedgeFilled {
            client_order_id: 2,
            price: 10000,
            volume: 10,
        });
        assert_eq!(trader.ledger().hedged_position(), 10);
        assert_eq!(
            trader.ledger().position() + trader.ledger().hedged_position(),
            0
        );
    }

    #[test]
    fn expiry_cancel_then_terminal_status_clears_everything() {
        let mut trader = trader();
        rich_etf(&mut trader);
        trader.take_commands();

        // ETF falls back to parity: ratio 1.0 expires the resting ask.
        trader.handle(&book(Instrument::Etf, 9900, 10100));
        assert_eq!(
            trader.take_commands(),
            vec![Command::CancelOrder { client_order_id: 1 }]
        );
        assert_eq!(trader.ledger().active_ask_id(), 0);

        trader.handle(&MarketEvent::OrderStatus {
            client_order_id: 1,
            fill_volume: 0,
            remaining_volume: 0,
            fees: 0,
        });
        assert_eq!(trader.ledger().active_ask_id(), 0);
        assert_eq!(trader.ledger().active_bid_id(), 0);
        assert!(!trader.ledger().is_tracked(1));
    }

    #[test]
    fn order_error_acts_as_terminal_status() {
        let mut trader = trader();
        rich_etf(&mut trader);
        trader.handle(&MarketEvent::Error {
            client_order_id: 1,
            message: "out of range price".to_string(),
        });
        assert_eq!(trader.ledger().active_ask_id(), 0);
        assert!(!trader.ledger().is_tracked(1));

        trader.handle(&MarketEvent::Error {
            client_order_id: 0,
            message: "session warning".to_string(),
        });
        assert_eq!(trader.ledger().position(), 0);
    }

    #[test]
    fn unknown_fill_sends_no_hedge() {
        let mut trader = trader();
        trader.handle(&MarketEvent::OrderFilled {
            client_order_id: 77,
            price: 10000,
            volume: 10,
        });
        assert!(trader.take_commands().is_empty());
        assert_eq!(trader.ledger().position(), 0);
    }

    fn random_session(seed: u64, mode: SizingMode) -> (Vec<Command>, AutoTrader) {
        let params = StrategyParams {
            sizing_mode: mode,
            ..StrategyParams::default()
        };
        let mut trader = AutoTrader::new(&params);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut sent = Vec::new();
        let mut live: Vec<(u64, u64)> = Vec::new();
        for step in 0..2_000u64 {
            let future_mid = 10_000 + rng.gen_range(0..5u64) * 100;
            let etf_mid = future_mid as i64 + rng.gen_range(-3..=3i64) * 100;
            trader.handle(&book(Instrument::Future, future_mid - 100, future_mid + 100));
            trader.handle(&MarketEvent::OrderBook {
                instrument: Instrument::Etf,
                sequence: step,
                book: BookLevels::top(etf_mid as u64 - 100, 50, etf_mid as u64 + 100, 50),
            });
            for cmd in trader.take_commands() {
                if let Command::InsertOrder {
                    client_order_id,
                    volume,
                    ..
                } = cmd
                {
                    live.push((client_order_id, volume));
                }
                sent.push(cmd);
            }
            if !live.is_empty() && rng.gen_bool(0.5) {
                let (id, volume) = live.remove(rng.gen_range(0..live.len()));
                let filled = rng.gen_range(0..=volume);
                if filled > 0 {
                    trader.handle(&MarketEvent::OrderFilled {
                        client_order_id: id,
                        price: 10_000,
                        volume: filled,
                    });
                }
                trader.handle(&MarketEvent::OrderStatus {
                    client_order_id: id,
                    fill_volume: filled,
                    remaining_volume: 0,
                    fees: 0,
                });
                sent.extend(trader.take_commands());
            }
            let ledger = trader.ledger();
            assert!(ledger.position().abs() <= 100, "position {}", ledger.position());
        }
        (sent, trader)
    }

    #[test]
    fn position_stays_within_limit_for_random_sessions() {
        for (seed, mode) in [
            (1, SizingMode::Static),
            (2, SizingMode::DecayingExtrema),
            (3, SizingMode::Bollinger),
        ] {
            let (sent, _) = random_session(seed, mode);
            assert!(!sent.is_empty());
        }
    }

    #[test]
    fn replaying_a_session_is_deterministic() {
        let (first, a) = random_session(9, SizingMode::Bollinger);
        let (second, b) = random_session(9, SizingMode::Bollinger);
        assert_eq!(first, second);
        assert_eq!(a.ledger().position(), b.ledger().position());
    }

    #[test]
    fn at_most_one_insert_per_side_is_live() {
        let mut trader = trader();
        rich_etf(&mut trader);
        rich_etf(&mut trader);
        let inserts = trader
            .take_commands()
            .into_iter()
            .filter(|c| matches!(c, Command::InsertOrder { .. }))
            .count();
        assert_eq!(inserts, 1);
    }
}
