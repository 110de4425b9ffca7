use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prices travel as integer cents; logs and summaries show dollars.
pub fn cents_to_dollars(cents: u64) -> Decimal {
    Decimal::new(cents as i64, 2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instrument {
    Future,
    Etf,
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Instrument::Future => write!(f, "FUTURE"),
            Instrument::Etf => write!(f, "ETF"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifespan {
    FillAndKill,
    GoodForDay,
}

/// Top-of-book arrays as delivered by the framework. Prices are in cents,
/// a zero price means the level is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevels {
    #[serde(default)]
    pub ask_prices: Vec<u64>,
    #[serde(default)]
    pub ask_volumes: Vec<u64>,
    #[serde(default)]
    pub bid_prices: Vec<u64>,
    #[serde(default)]
    pub bid_volumes: Vec<u64>,
}

impl BookLevels {
    pub fn top(bid_price: u64, bid_volume: u64, ask_price: u64, ask_volume: u64) -> Self {
        Self {
            ask_prices: vec![ask_price],
            ask_volumes: vec![ask_volume],
            bid_prices: vec![bid_price],
            bid_volumes: vec![bid_volume],
        }
    }

    pub fn best_bid(&self) -> u64 {
        self.bid_prices.first().copied().unwrap_or(0)
    }

    pub fn best_ask(&self) -> u64 {
        self.ask_prices.first().copied().unwrap_or(0)
    }

    pub fn best_bid_volume(&self) -> u64 {
        self.bid_volumes.first().copied().unwrap_or(0)
    }

    pub fn best_ask_volume(&self) -> u64 {
        self.ask_volumes.first().copied().unwrap_or(0)
    }
}

/// Callbacks delivered by the exchange-connectivity framework, one at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    OrderBook {
        instrument: Instrument,
        sequence: u64,
        #[serde(flatten)]
        book: BookLevels,
    },
    TradeTicks {
        instrument: Instrument,
        sequence: u64,
        #[serde(flatten)]
        book: BookLevels,
    },
    OrderFilled {
        client_order_id: u64,
        price: u64,
        volume: u64,
    },
    HedgeFilled {
        client_order_id: u64,
        price: u64,
        volume: u64,
    },
    OrderStatus {
        client_order_id: u64,
        fill_volume: u64,
        remaining_volume: u64,
        #[serde(default)]
        fees: i64,
    },
    Error {
        #[serde(default)]
        client_order_id: u64,
        message: String,
    },
    Disconnect,
}

/// Requests issued back to the framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    InsertOrder {
        client_order_id: u64,
        side: Side,
        price: u64,
        volume: u64,
        lifespan: Lifespan,
    },
    CancelOrder {
        client_order_id: u64,
    },
    HedgeOrder {
        client_order_id: u64,
        side: Side,
        price: u64,
        volume: u64,
    },
}

impl Command {
    pub fn client_order_id(&self) -> u64 {
        match self {
            Command::InsertOrder {
                client_order_id, ..
            }
            | Command::CancelOrder { client_order_id }
            | Command::HedgeOrder {
                client_order_id, ..
            } => *client_order_id,
        }
    }
}
