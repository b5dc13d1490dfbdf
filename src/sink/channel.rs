use super::{Event, RecordSink, SinkError};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Create a bounded channel sink and the receiver that drains it.
pub fn create_channel(buffer_size: usize) -> (ChannelSink, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (ChannelSink { tx }, rx)
}

/// Forwards events into a tokio channel; blocks while the channel is full.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Event>,
}

#[async_trait]
impl RecordSink for ChannelSink {
    async fn emit(&self, event: Event) -> Result<(), SinkError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| SinkError::ChannelClosed)
    }
}
