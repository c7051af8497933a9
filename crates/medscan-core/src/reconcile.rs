use chrono::Utc;
use serde::Serialize;

use crate::medicine::{CatalogEntry, MedicineKey, ParsedMedicine, PendingEntry};
use crate::storage::Storage;
use crate::{Error, Result};

/// Attempts at settling a key whose open pending entry changes under us
const MAX_ATTEMPTS: usize = 3;

/// Where a scanned medicine ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "entry", rename_all = "snake_case")]
pub enum Reconciliation {
    /// Already in the catalog
    Verified(CatalogEntry),
    /// Awaiting review from an earlier scan; nothing was written
    AlreadyPending(PendingEntry),
    /// Newly queued for review
    Queued(PendingEntry),
}

impl Reconciliation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified(_) => "verified",
            Self::AlreadyPending(_) => "already_pending",
            Self::Queued(_) => "queued",
        }
    }
}

/// Matches parsed medicines against the catalog and the pending queue
#[derive(Clone)]
pub struct ReconciliationEngine {
    storage: Storage,
}

impl ReconciliationEngine {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Catalog first, then the open pending entry, then queue a new one.
    /// Concurrent calls for one key leave at most one open entry.
    pub async fn reconcile(&self, parsed: &ParsedMedicine) -> Result<Reconciliation> {
        parsed.validate()?;
        let key = parsed.key();

        for _ in 0..MAX_ATTEMPTS {
            if let Some(entry) = self.storage.find_catalog_entry(&key).await? {
                tracing::debug!("{} is verified", key);
                return Ok(Reconciliation::Verified(entry));
            }

            if let Some(pending) = self.storage.find_pending(&key).await? {
                tracing::debug!("{} is already awaiting review", key);
                return Ok(Reconciliation::AlreadyPending(pending));
            }

            let entry = PendingEntry::from_parsed(parsed);
            if self.storage.insert_pending(&entry).await? {
                tracing::info!("Queued {} for verification", key);
                return Ok(Reconciliation::Queued(entry));
            }

            // lost the race to another insert; re-read what won
        }

        Err(Error::ReconcileConflict(key))
    }

    /// Approve the open entry for `key`, adding it to the catalog
    pub async fn approve(&self, key: &MedicineKey) -> Result<CatalogEntry> {
        let entry = self.storage.approve_pending(key, Utc::now()).await?;
        tracing::info!("Approved {}", key);
        Ok(entry)
    }

    pub async fn reject(&self, key: &MedicineKey) -> Result<PendingEntry> {
        let entry = self.storage.reject_pending(key, Utc::now()).await?;
        tracing::info!("Rejected {}", key);
        Ok(entry)
    }

    /// Open entries awaiting review, oldest first
    pub async fn pending_queue(&self) -> Result<Vec<PendingEntry>> {
        self.storage.list_pending().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medicine::VerificationStatus;

    async fn engine() -> (ReconciliationEngine, Storage) {
        let storage = Storage::open_memory().await.unwrap();
        (ReconciliationEngine::new(storage.clone()), storage)
    }

    #[tokio::test]
    async fn test_queue_then_already_pending() {
        let (engine, storage) = engine().await;
        let parsed = ParsedMedicine::new("Paracetamol500", "Acme");

        let first = engine.reconcile(&parsed).await.unwrap();
        let second = engine.reconcile(&parsed).await.unwrap();

        let Reconciliation::Queued(queued) = first else {
            panic!("expected Queued, got {first:?}");
        };
        assert_eq!(second, Reconciliation::AlreadyPending(queued));
        assert_eq!(storage.count_pending(&parsed.key()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_catalog_takes_precedence() {
        let (engine, storage) = engine().await;
        let parsed = ParsedMedicine::new("Amoxil250", "GenPharma");
        storage
            .insert_catalog_entry(&CatalogEntry::new("Amoxil250".into(), "GenPharma".into()))
            .await
            .unwrap();
        // stale open entry left over from before the catalog write
        storage
            .insert_pending(&PendingEntry::from_parsed(&parsed))
            .await
            .unwrap();

        let outcome = engine.reconcile(&parsed).await.unwrap();

        assert_eq!(outcome.as_str(), "verified");
        assert_eq!(storage.count_pending(&parsed.key()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_exact() {
        let (engine, _storage) = engine().await;

        let a = engine
            .reconcile(&ParsedMedicine::new("Crocin", "GSK"))
            .await
            .unwrap();
        let b = engine
            .reconcile(&ParsedMedicine::new("crocin", "GSK"))
            .await
            .unwrap();
        let c = engine
            .reconcile(&ParsedMedicine::new("Crocin", ""))
            .await
            .unwrap();

        assert!(matches!(a, Reconciliation::Queued(_)));
        assert!(matches!(b, Reconciliation::Queued(_)));
        assert!(matches!(c, Reconciliation::Queued(_)));
        assert_eq!(engine.pending_queue().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_scans_queue_once() {
        let (engine, storage) = engine().await;
        let parsed = ParsedMedicine::new("Dolo650", "Micro Labs");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                let parsed = parsed.clone();
                tokio::spawn(async move { engine.reconcile(&parsed).await })
            })
            .collect();

        let mut queued = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                Reconciliation::Queued(_) => queued += 1,
                Reconciliation::AlreadyPending(_) => {}
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        assert_eq!(queued, 1);
        assert_eq!(storage.count_pending(&parsed.key()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_approve_then_verified() {
        let (engine, storage) = engine().await;
        let parsed = ParsedMedicine::new("Paracetamol500", "Acme");
        engine.reconcile(&parsed).await.unwrap();

        let entry = engine.approve(&parsed.key()).await.unwrap();

        assert_eq!(entry.key(), parsed.key());
        assert!(engine.pending_queue().await.unwrap().is_empty());
        let again = engine.reconcile(&parsed).await.unwrap();
        assert_eq!(again, Reconciliation::Verified(entry));
        assert_eq!(storage.pending_history(&parsed.key()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reject_allows_requeue() {
        let (engine, _storage) = engine().await;
        let parsed = ParsedMedicine::new("Combiflam", "Sanofi");
        engine.reconcile(&parsed).await.unwrap();

        let rejected = engine.reject(&parsed.key()).await.unwrap();

        assert_eq!(rejected.status, VerificationStatus::Rejected);
        assert!(rejected.decided_at.is_some());
        let again = engine.reconcile(&parsed).await.unwrap();
        assert!(matches!(again, Reconciliation::Queued(_)));
    }

    #[tokio::test]
    async fn test_decide_unknown_key() {
        let (engine, _storage) = engine().await;
        let key = MedicineKey::new("Ghost", "Nobody");

        assert!(matches!(engine.approve(&key).await, Err(Error::PendingNotFound(_))));
        assert!(matches!(engine.reject(&key).await, Err(Error::PendingNotFound(_))));
    }

    #[tokio::test]
    async fn test_blank_brand_rejected() {
        let (engine, _storage) = engine().await;

        let result = engine.reconcile(&ParsedMedicine::new(" ", "Acme")).await;

        assert!(matches!(result, Err(Error::InvalidMedicine(_))));
    }
}
