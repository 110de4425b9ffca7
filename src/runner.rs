use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};

use crate::autotrader::AutoTrader;
use crate::config::TraderConfig;
use crate::ports::replay_feed::EventFeed;
use crate::trade::execution::order_gateway::OrderGateway;
use crate::types::{cents_to_dollars, MarketEvent};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Events pulled from the feed.
    pub feed_events: u64,
    /// Events handled by the trader, including gateway callbacks.
    pub handled_events: u64,
    pub commands_sent: u64,
    pub gateway_errors: u64,
    pub position: i64,
    pub hedged_position: i64,
    pub etf_volume_traded: u64,
    pub etf_notional: Decimal,
}

/// Single-threaded event loop: every callback, including the ones the
/// gateway answers with, is handled to completion before the next one.
pub struct TradingLoop<G: OrderGateway> {
    trader: AutoTrader,
    gateway: G,
    data_dump_writer: Option<BufWriter<File>>,
    summary: RunSummary,
}

impl<G: OrderGateway> TradingLoop<G> {
    pub fn new(trader: AutoTrader, gateway: G) -> Self {
        Self {
            trader,
            gateway,
            data_dump_writer: None,
            summary: RunSummary::default(),
        }
    }

    pub fn from_config(cfg: &TraderConfig, gateway: G) -> Result<Self> {
        let mut runner = Self::new(AutoTrader::new(&cfg.params), gateway);
        if let Some(path) = &cfg.data_dump_file {
            runner = runner.with_data_dump(path)?;
        }
        Ok(runner)
    }

    pub fn with_data_dump(mut self, path: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("failed to open data dump file {}", path))?;
        log::info!("[CONFIG] dumping feed events to {}", path);
        self.data_dump_writer = Some(BufWriter::new(file));
        Ok(self)
    }

    pub fn trader(&self) -> &AutoTrader {
        &self.trader
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Consumes the feed until it is exhausted or the session disconnects.
    pub async fn run<F: EventFeed + ?Sized>(&mut self, feed: &mut F) -> Result<RunSummary> {
        while let Some(event) = feed.next_event().await? {
            self.summary.feed_events += 1;
            self.dump(&event);
            let disconnected = matches!(event, MarketEvent::Disconnect);
            self.dispatch(event);
            if disconnected {
                break;
            }
        }
        if let Some(writer) = &mut self.data_dump_writer {
            writer.flush().context("failed to flush data dump")?;
        }

        let summary = self.summary();
        log::info!(
            "[SUMMARY] events={} handled={} commands={} gateway_errors={} position={} hedged={} traded={} lots notional=${}",
            summary.feed_events,
            summary.handled_events,
            summary.commands_sent,
            summary.gateway_errors,
            summary.position,
            summary.hedged_position,
            summary.etf_volume_traded,
            summary.etf_notional
        );
        Ok(summary)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            position: self.trader.ledger().position(),
            hedged_position: self.trader.ledger().hedged_position(),
            ..self.summary.clone()
        }
    }

    /// Handles one feed event and every callback it causes.
    pub fn dispatch(&mut self, event: MarketEvent) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            self.gateway.observe(&event);
            if let MarketEvent::OrderFilled { price, volume, .. } = &event {
                self.summary.etf_volume_traded += volume;
                self.summary.etf_notional += cents_to_dollars(*price) * Decimal::from(*volume);
            }
            self.trader.handle(&event);
            self.summary.handled_events += 1;

            let mut failures = Vec::new();
            for command in self.trader.take_commands() {
                self.summary.commands_sent += 1;
                if let Err(err) = self.gateway.send(&command) {
                    self.summary.gateway_errors += 1;
                    failures.push(MarketEvent::Error {
                        client_order_id: command.client_order_id(),
                        message: err.to_string(),
                    });
                }
            }
            // Gateway callbacks go ahead of send failures.
            queue.extend(self.gateway.poll_events());
            queue.extend(failures);
        }
    }

    fn dump(&mut self, event: &MarketEvent) {
        if let Some(writer) = &mut self.data_dump_writer {
            if let Ok(json_string) = serde_json::to_string(event) {
                if writeln!(writer, "{}", json_string).is_err() {
                    log::error!("[DUMP] failed to write to dump file");
                }
            }
        }
    }
}
