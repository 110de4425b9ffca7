use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::replay_feed::EventFeed;
use crate::types::MarketEvent;

/// Feed for embedding the trader in a host process: the host's connectivity
/// layer pushes callbacks into the channel and the trading loop consumes
/// them one at a time.
pub struct ChannelFeed {
    rx: mpsc::Receiver<MarketEvent>,
}

impl ChannelFeed {
    pub fn new(capacity: usize) -> (mpsc::Sender<MarketEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx })
    }
}

#[async_trait]
impl EventFeed for ChannelFeed {
    async fn next_event(&mut self) -> Result<Option<MarketEvent>> {
        // All senders dropped ends the feed.
        Ok(self.rx.recv().await)
    }
}
