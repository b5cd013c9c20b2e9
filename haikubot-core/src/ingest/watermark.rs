use crate::types::Timestamp;

/// "Processed up to and including this time."
///
/// Only ever moves forward: backfill delivered out of order after a
/// reconnect cannot pull it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark(Timestamp);

impl Watermark {
    pub fn new(start: Timestamp) -> Self {
        Watermark(start)
    }

    pub fn value(&self) -> Timestamp {
        self.0
    }

    /// Move to `max(current, ts)`. Returns true when the value changed.
    pub fn advance(&mut self, ts: Timestamp) -> bool {
        if ts > self.0 {
            self.0 = ts;
            true
        } else {
            false
        }
    }

    /// `since` for the next subscription: the watermark plus a forward slack.
    pub fn since(&self, slack_secs: i64) -> Timestamp {
        self.0.add_secs(slack_secs)
    }
}
