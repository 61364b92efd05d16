//! Processed-activity ledger
//!
//! A row in `processed_activities` is the only authority on whether an
//! inbound activity has been handled. Rows are write-once and never removed.

use std::sync::Arc;

use crate::data::Database;
use crate::error::AppError;

#[derive(Clone)]
pub struct ProcessedActivityLedger {
    db: Arc<Database>,
}

impl ProcessedActivityLedger {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Mark an activity as processed.
    ///
    /// Returns true only for the caller whose insert took effect; concurrent
    /// callers with the same URI get false.
    pub async fn insert_if_absent(&self, activity_uri: &str) -> Result<bool, AppError> {
        self.db.insert_processed_activity(activity_uri).await
    }

    pub async fn contains(&self, activity_uri: &str) -> Result<bool, AppError> {
        self.db.is_activity_processed(activity_uri).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_ledger() -> (ProcessedActivityLedger, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::connect(&temp_dir.path().join("ledger.db"))
            .await
            .unwrap();
        (ProcessedActivityLedger::new(Arc::new(db)), temp_dir)
    }

    #[tokio::test]
    async fn concurrent_inserts_have_one_winner() {
        let (ledger, _temp_dir) = create_test_ledger().await;
        let uri = "https://remote.example/activities/race";

        let attempts = (0..8).map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.insert_if_absent(uri).await.unwrap() })
        });
        let results = futures::future::join_all(attempts).await;

        let winners = results
            .into_iter()
            .map(|result| result.unwrap())
            .filter(|inserted| *inserted)
            .count();
        assert_eq!(winners, 1);
        assert!(ledger.contains(uri).await.unwrap());
    }
}
