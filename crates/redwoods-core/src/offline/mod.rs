//! Offline data indicator.
//!
//! A simulation that animates sync progress for pending offline items. It
//! keeps no queue and writes nothing anywhere; item failures come from a
//! [`FailureOracle`] so tests can decide them.

mod simulator;

pub use simulator::{
    FailureOracle, RandomFailures, SyncReport, SyncSimulator, SyncStatus, DEFAULT_TICK,
};

use serde::{Deserialize, Serialize};

/// Pending offline data, by category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineCounts {
    pub emails: u32,
    pub messages: u32,
    pub drafts: u32,
    pub attachments: u32,
}

impl OfflineCounts {
    pub fn new(emails: u32, messages: u32, drafts: u32, attachments: u32) -> Self {
        Self {
            emails,
            messages,
            drafts,
            attachments,
        }
    }

    /// Items that take part in a sync. Attachments ride along with emails.
    ///
    /// Summed as `u64` so any combination of counts fits.
    pub fn sync_items(&self) -> u64 {
        u64::from(self.emails) + u64::from(self.messages) + u64::from(self.drafts)
    }

    pub fn has_pending(&self) -> bool {
        self.sync_items() > 0
    }

    /// Estimated local storage in MB, to one decimal.
    pub fn storage_usage_mb(&self) -> f64 {
        let usage = f64::from(self.emails) * 0.1
            + f64::from(self.messages) * 0.05
            + f64::from(self.drafts) * 0.08
            + f64::from(self.attachments) * 2.5;
        (usage * 10.0).round() / 10.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_usage() {
        assert_eq!(OfflineCounts::new(45, 23, 3, 12).storage_usage_mb(), 35.9);
        assert_eq!(OfflineCounts::default().storage_usage_mb(), 0.0);
        assert_eq!(OfflineCounts::new(1, 1, 1, 0).storage_usage_mb(), 0.2);
    }

    #[test]
    fn test_attachments_alone_are_not_pending() {
        assert!(!OfflineCounts::new(0, 0, 0, 4).has_pending());
        assert!(OfflineCounts::new(0, 0, 1, 0).has_pending());
        assert_eq!(OfflineCounts::new(2, 3, 4, 9).sync_items(), 9);
    }

    #[test]
    fn test_counts_near_u32_max_do_not_wrap() {
        let counts = OfflineCounts::new(u32::MAX, 1, 0, 0);
        assert!(counts.has_pending());
        assert_eq!(counts.sync_items(), u64::from(u32::MAX) + 1);

        let full = OfflineCounts::new(u32::MAX, u32::MAX, u32::MAX, u32::MAX);
        assert_eq!(full.sync_items(), 3 * u64::from(u32::MAX));
        assert!(full.storage_usage_mb() > 0.0);
    }
}
