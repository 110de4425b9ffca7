use crate::types::Instrument;

/// Latest top-of-book view for one instrument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstrumentQuote {
    /// Always a multiple of the tick size, zero until the first two-sided book.
    pub mid_price: u64,
    pub best_bid: u64,
    pub best_ask: u64,
}

#[derive(Debug, Clone)]
pub struct MidPriceTracker {
    tick_size: u64,
    etf: InstrumentQuote,
    future: InstrumentQuote,
}

impl MidPriceTracker {
    pub fn new(tick_size: u64) -> Self {
        Self {
            tick_size: tick_size.max(1),
            etf: InstrumentQuote::default(),
            future: InstrumentQuote::default(),
        }
    }

    /// Returns false when the update was skipped because a side was empty.
    pub fn update_mid(&mut self, instrument: Instrument, best_bid: u64, best_ask: u64) -> bool {
        // Empty side: keep the stale mid so the ratio never divides by zero.
        if best_bid == 0 || best_ask == 0 {
            log::debug!(
                "[BOOK] {} one-sided book (bid={}, ask={}), mid kept at {}",
                instrument,
                best_bid,
                best_ask,
                self.quote(instrument).mid_price
            );
            return false;
        }
        let mid = round_up_to_tick((best_bid + best_ask) / 2, self.tick_size);
        let quote = self.quote_mut(instrument);
        quote.mid_price = mid;
        quote.best_bid = best_bid;
        quote.best_ask = best_ask;
        true
    }

    pub fn quote(&self, instrument: Instrument) -> &InstrumentQuote {
        match instrument {
            Instrument::Etf => &self.etf,
            Instrument::Future => &self.future,
        }
    }

    fn quote_mut(&mut self, instrument: Instrument) -> &mut InstrumentQuote {
        match instrument {
            Instrument::Etf => &mut self.etf,
            Instrument::Future => &mut self.future,
        }
    }

    pub fn mid(&self, instrument: Instrument) -> u64 {
        self.quote(instrument).mid_price
    }

    /// ETF mid over future mid, once both instruments have a mid.
    pub fn ratio(&self) -> Option<f64> {
        if self.etf.mid_price == 0 || self.future.mid_price == 0 {
            return None;
        }
        Some(self.etf.mid_price as f64 / self.future.mid_price as f64)
    }
}

/// Off-tick prices move up to the next tick, biasing toward the ask.
fn round_up_to_tick(price: u64, tick: u64) -> u64 {
    let rem = price % tick;
    if rem == 0 {
        price
    } else {
        price + (tick - rem)
    }
}
