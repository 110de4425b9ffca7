use std::fmt;

use crate::types::{Command, Lifespan, MarketEvent, Side};

#[derive(Debug)]
pub enum GatewayError {
    Rejected(String),
    Io(std::io::Error),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Rejected(reason) => write!(f, "order rejected: {}", reason),
            GatewayError::Io(e) => write!(f, "gateway io error: {}", e),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Io(e) => Some(e),
            GatewayError::Rejected(_) => None,
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> GatewayError {
        GatewayError::Io(err)
    }
}

/// Outbound half of the exchange-connectivity framework.
pub trait OrderGateway: Send {
    fn send_insert_order(
        &mut self,
        client_order_id: u64,
        side: Side,
        price: u64,
        volume: u64,
        lifespan: Lifespan,
    ) -> Result<(), GatewayError>;

    fn send_cancel_order(&mut self, client_order_id: u64) -> Result<(), GatewayError>;

    fn send_hedge_order(
        &mut self,
        client_order_id: u64,
        side: Side,
        price: u64,
        volume: u64,
    ) -> Result<(), GatewayError>;

    /// Sees every inbound event before the trader does.
    fn observe(&mut self, _event: &MarketEvent) {}

    /// Callbacks the gateway produced since the last poll.
    fn poll_events(&mut self) -> Vec<MarketEvent> {
        Vec::new()
    }

    fn send(&mut self, command: &Command) -> Result<(), GatewayError> {
        match *command {
            Command::InsertOrder {
                client_order_id,
                side,
                price,
                volume,
                lifespan,
            } => self.send_insert_order(client_order_id, side, price, volume, lifespan),
            Command::CancelOrder { client_order_id } => self.send_cancel_order(client_order_id),
            Command::HedgeOrder {
                client_order_id,
                side,
                price,
                volume,
            } => self.send_hedge_order(client_order_id, side, price, volume),
        }
    }
}
