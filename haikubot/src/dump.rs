//! `--dump`: echo every received message to stdout as one JSON line.

use std::io::Write;

use async_trait::async_trait;
use haikubot_core::{Message, MessageProcessor, ProcessOutcome, Result, Timestamp};

/// Wraps a processor and prints each message before handing it on.
pub struct DumpProcessor<P> {
    inner: P,
}

impl<P: MessageProcessor> DumpProcessor<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: MessageProcessor> MessageProcessor for DumpProcessor<P> {
    async fn process(&self, message: &Message) -> Result<ProcessOutcome> {
        match serde_json::to_string(message) {
            Ok(line) => {
                let mut stdout = std::io::stdout().lock();
                // a closed stdout must not stop the bot
                let _ = writeln!(stdout, "{}", line);
            }
            Err(e) => tracing::warn!(event_id = %message.id, error = %e, "Failed to dump message"),
        }
        self.inner.process(message).await
    }

    async fn checkpoint(&self, watermark: Timestamp) {
        self.inner.checkpoint(watermark).await
    }
}
