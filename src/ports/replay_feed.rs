use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::types::MarketEvent;

/// Source of framework callbacks, delivered strictly in order.
#[async_trait]
pub trait EventFeed: Send {
    /// `Ok(None)` once the source is exhausted.
    async fn next_event(&mut self) -> Result<Option<MarketEvent>>;
}

/// Reads one JSON-encoded [`MarketEvent`] per line. Used for replay files
/// and for piping a live adapter through stdin.
pub struct JsonLinesFeed<R> {
    lines: Lines<R>,
    source: String,
    line_no: usize,
    skipped: usize,
}

impl JsonLinesFeed<BufReader<File>> {
    pub async fn open(path: &str) -> Result<Self> {
        let file = File::open(path)
            .await
            .with_context(|| format!("failed to open replay file {}", path))?;
        Ok(Self::new(BufReader::new(file), path))
    }
}

impl JsonLinesFeed<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), "stdin")
    }
}

impl<R: AsyncBufRead + Unpin> JsonLinesFeed<R> {
    pub fn new(reader: R, source: &str) -> Self {
        Self {
            lines: reader.lines(),
            source: source.to_string(),
            line_no: 0,
            skipped: 0,
        }
    }

    /// Lines that could not be parsed and were dropped.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> EventFeed for JsonLinesFeed<R> {
    async fn next_event(&mut self) -> Result<Option<MarketEvent>> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .with_context(|| format!("failed to read {}", self.source))?;
            let Some(line) = line else {
                return Ok(None);
            };
            self.line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<MarketEvent>(trimmed) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => {
                    self.skipped += 1;
                    log::warn!(
                        "[REPLAY] {}:{} skipped unparsable event: {}",
                        self.source,
                        self.line_no,
                        e
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Instrument;
    use std::io::Write;

    #[tokio::test]
    async fn reads_events_and_skips_garbage() {
        let input = concat!(
            r#"{"type":"order_book","instrument":"future","sequence":1,"ask_prices":[10100],"ask_volumes":[5],"bid_prices":[9900],"bid_volumes":[5]}"#,
            "\n\n",
            "not json\n",
            r#"{"type":"disconnect"}"#,
            "\n"
        );
        let mut feed = JsonLinesFeed::new(input.as_bytes(), "inline");
        match feed.next_event().await.unwrap() {
            Some(MarketEvent::OrderBook { instrument, .. }) => {
                assert_eq!(instrument, Instrument::Future)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            feed.next_event().await.unwrap(),
            Some(MarketEvent::Disconnect)
        );
        assert_eq!(feed.next_event().await.unwrap(), None);
        assert_eq!(feed.skipped(), 1);
    }

    #[tokio::test]
    async fn opens_replay_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"type":"order_status","client_order_id":3,"fill_volume":0,"remaining_volume":0}}"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let mut feed = JsonLinesFeed::open(&path).await.unwrap();
        assert_eq!(
            feed.next_event().await.unwrap(),
            Some(MarketEvent::OrderStatus {
                client_order_id: 3,
                fill_volume: 0,
                remaining_volume: 0,
                fees: 0
            })
        );
    }

    #[tokio::test]
    async fn missing_replay_file_is_an_error() {
        assert!(JsonLinesFeed::open("/nonexistent/ratiotrade.jsonl")
            .await
            .is_err());
    }
}
