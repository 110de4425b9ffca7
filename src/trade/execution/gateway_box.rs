use lazy_static::lazy_static;
use std::env;
use std::io::Write;

use super::order_gateway::{GatewayError, OrderGateway};
use super::paper_gateway::PaperGateway;
use crate::config::{GatewayKind, TraderConfig};
use crate::types::{cents_to_dollars, Command, Lifespan, MarketEvent, Side};

lazy_static! {
    static ref FILLED_PROBABILITY_IN_EMULATION: f64 = {
        match env::var("FILLED_PROBABILITY_IN_EMULATION") {
            Ok(val) => val
                .parse::<f64>()
                .ok()
                .filter(|p| (0.0..=1.0).contains(p))
                .unwrap_or(1.0),
            Err(_) => 1.0,
        }
    };
}

/// Writes every command as one JSON line for an external adapter process.
pub struct StdoutGateway<W: Write + Send> {
    out: W,
}

impl StdoutGateway<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write + Send> StdoutGateway<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, command: &Command) -> Result<(), GatewayError> {
        let line = serde_json::to_string(command)
            .map_err(|e| GatewayError::Rejected(format!("unencodable command: {}", e)))?;
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> OrderGateway for StdoutGateway<W> {
    fn send_insert_order(
        &mut self,
        client_order_id: u64,
        side: Side,
        price: u64,
        volume: u64,
        lifespan: Lifespan,
    ) -> Result<(), GatewayError> {
        self.write(&Command::InsertOrder {
            client_order_id,
            side,
            price,
            volume,
            lifespan,
        })
    }

    fn send_cancel_order(&mut self, client_order_id: u64) -> Result<(), GatewayError> {
        self.write(&Command::CancelOrder { client_order_id })
    }

    fn send_hedge_order(
        &mut self,
        client_order_id: u64,
        side: Side,
        price: u64,
        volume: u64,
    ) -> Result<(), GatewayError> {
        self.write(&Command::HedgeOrder {
            client_order_id,
            side,
            price,
            volume,
        })
    }
}

/// Dry run: commands are logged and never acknowledged.
#[derive(Default)]
pub struct LogGateway;

impl OrderGateway for LogGateway {
    fn send_insert_order(
        &mut self,
        client_order_id: u64,
        side: Side,
        price: u64,
        volume: u64,
        lifespan: Lifespan,
    ) -> Result<(), GatewayError> {
        log::info!(
            "[DRY] insert {} {} x{} at ${} ({:?})",
            client_order_id,
            side,
            volume,
            cents_to_dollars(price),
            lifespan
        );
        Ok(())
    }

    fn send_cancel_order(&mut self, client_order_id: u64) -> Result<(), GatewayError> {
        log::info!("[DRY] cancel {}", client_order_id);
        Ok(())
    }

    fn send_hedge_order(
        &mut self,
        client_order_id: u64,
        side: Side,
        price: u64,
        volume: u64,
    ) -> Result<(), GatewayError> {
        log::info!(
            "[DRY] hedge {} {} x{} at ${}",
            client_order_id,
            side,
            volume,
            cents_to_dollars(price)
        );
        Ok(())
    }
}

pub struct GatewayBox {
    pub inner: Box<dyn OrderGateway>,
}

impl GatewayBox {
    fn report_failure(&self, operation: &str, client_order_id: u64, err: &GatewayError) {
        log::warn!(
            "[GATEWAY] {} for order {} failed: {}",
            operation,
            client_order_id,
            err
        );
    }

    pub fn create(cfg: &TraderConfig) -> Self {
        match cfg.gateway {
            GatewayKind::Paper => {
                let fill_probability = cfg
                    .paper_fill_probability
                    .unwrap_or(*FILLED_PROBABILITY_IN_EMULATION);
                log::info!(
                    "[CONFIG] paper gateway fill_probability={} seed={}",
                    fill_probability,
                    cfg.paper_seed
                );
                GatewayBox {
                    inner: Box::new(PaperGateway::new(fill_probability, cfg.paper_seed)),
                }
            }
            GatewayKind::Stdout => GatewayBox {
                inner: Box::new(StdoutGateway::stdout()),
            },
            GatewayKind::Log => GatewayBox {
                inner: Box::new(LogGateway),
            },
        }
    }
}

impl OrderGateway for GatewayBox {
    fn send_insert_order(
        &mut self,
        client_order_id: u64,
        side: Side,
        price: u64,
        volume: u64,
        lifespan: Lifespan,
    ) -> Result<(), GatewayError> {
        let result = self
            .inner
            .send_insert_order(client_order_id, side, price, volume, lifespan);
        if let Err(ref err) = result {
            self.report_failure("insert", client_order_id, err);
        }
        result
    }

    fn send_cancel_order(&mut self, client_order_id: u64) -> Result<(), GatewayError> {
        let result = self.inner.send_cancel_order(client_order_id);
        if let Err(ref err) = result {
            self.report_failure("cancel", client_order_id, err);
        }
        result
    }

    fn send_hedge_order(
        &mut self,
        client_order_id: u64,
        side: Side,
        price: u64,
        volume: u64,
    ) -> Result<(), GatewayError> {
        let result = self
            .inner
            .send_hedge_order(client_order_id, side, price, volume);
        if let Err(ref err) = result {
            self.report_failure("hedge", client_order_id, err);
        }
        result
    }

    fn observe(&mut self, event: &MarketEvent) {
        self.inner.observe(event)
    }

    fn poll_events(&mut self) -> Vec<MarketEvent> {
        self.inner.poll_events()
    }
}
