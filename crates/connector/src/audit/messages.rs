//! Short-lived store for audit messages.
//!
//! Messages outlive the request that produced them (activation redirects to
//! the settings page) but expire quickly, and are cleared once shown.

use std::time::Duration;

use moka::future::Cache;

use checkout_pos_core::AuditSeverity;

use super::AuditEntry;

/// How long audit messages stay readable.
pub const AUDIT_MESSAGE_TTL: Duration = Duration::from_secs(5);

/// Audit messages keyed by severity.
#[derive(Clone)]
pub struct AuditMessages {
    cache: Cache<AuditSeverity, Vec<String>>,
}

impl Default for AuditMessages {
    fn default() -> Self {
        Self::new(AUDIT_MESSAGE_TTL)
    }
}

impl AuditMessages {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(AuditSeverity::ALL.len() as u64)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Append a message under its severity.
    pub async fn record(&self, entry: &AuditEntry) {
        let mut messages = self.cache.get(&entry.severity).await.unwrap_or_default();
        messages.push(entry.message.clone());
        self.cache.insert(entry.severity, messages).await;
    }

    /// Drop every stored message.
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    /// Read and clear the stored messages: errors, then warnings, then
    /// successes.
    pub async fn take(&self) -> Vec<AuditEntry> {
        let mut entries = Vec::new();
        for severity in AuditSeverity::ALL {
            if let Some(messages) = self.cache.remove(&severity).await {
                entries.extend(
                    messages
                        .into_iter()
                        .map(|message| AuditEntry { severity, message }),
                );
            }
        }
        entries
    }
}
