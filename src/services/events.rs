//! Processed-event bookkeeping for webhook deliveries.
//!
//! Gateways redeliver webhooks. The ledger already makes the *order status*
//! idempotent under replays; this cache additionally keeps the post-payment
//! side effects (a second confirmation mail, a double inventory decrement)
//! from firing on a duplicate delivery. Entries expire after a day, well
//! past any gateway's redelivery window.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::domain::Gateway;

const RETENTION_HOURS: i64 = 24;

#[derive(Default)]
pub struct ProcessedEventCache {
    seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl ProcessedEventCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(gateway: Gateway, event_id: &str) -> String {
        format!("{gateway}:{event_id}")
    }

    pub async fn is_duplicate(&self, gateway: Gateway, event_id: &str) -> bool {
        let seen = self.seen.lock().await;
        seen.contains_key(&Self::key(gateway, event_id))
    }

    /// Records a fully processed event. Called only after the update path
    /// succeeded, so a failed delivery can be retried by the gateway.
    pub async fn mark_processed(&self, gateway: Gateway, event_id: &str) {
        let mut seen = self.seen.lock().await;
        let cutoff = Utc::now() - Duration::hours(RETENTION_HOURS);
        seen.retain(|_, processed_at| *processed_at > cutoff);
        seen.insert(Self::key(gateway, event_id), Utc::now());
    }
}
