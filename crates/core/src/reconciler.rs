//! Outcome reconciliation.
//!
//! A database transaction can be rolled back, object store writes cannot. After a transaction
//! reaches its terminal outcome the [`Reconciler`] performs the compensating deletes that make
//! the store agree with the record again:
//!
//! | Outcome       | Deleted                                   | Kept                              |
//! |---------------|-------------------------------------------|-----------------------------------|
//! | `Committed`   | previous filenames of replaced fields     | names the committed record uses   |
//! | `RolledBack`  | filenames staged during the transaction   | names the record used beforehand  |
//!
//! The state machine is `Pending → Committed | RolledBack`. [`Reconciler::settle`] consumes the
//! reconciler, so an outcome can be delivered at most once; a reconciler dropped while still
//! pending settles as rolled back, so every transaction is reconciled exactly once.
//!
//! Delete failures are logged and reported, never returned as errors: by the time we get here
//! the record is already durably correct and a leftover object is only an orphan.

use catalog_files::{ObjectPath, ObjectStore};
use catalog_types::StoredFilename;
use catalog_uuid::EntityId;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Terminal outcome of a relational transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    Committed,
    RolledBack,
}

/// What a reconciliation pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub outcome: TransactionOutcome,
    /// Objects removed (or already absent).
    pub deleted: Vec<ObjectPath>,
    /// Objects whose delete failed; left behind as orphans.
    pub failed: Vec<ObjectPath>,
}

/// Per-transaction record of speculative writes and replaced files.
#[derive(Debug)]
pub struct Reconciler {
    store: Arc<dyn ObjectStore>,
    entity_id: EntityId,
    referenced_before: BTreeSet<StoredFilename>,
    committed_state: Option<BTreeSet<StoredFilename>>,
    staged: BTreeSet<StoredFilename>,
    replaced: BTreeSet<StoredFilename>,
    settled: bool,
}

impl Reconciler {
    /// `referenced_before` is every filename the record pointed at before the transaction
    /// (empty for a create).
    pub fn new(
        store: Arc<dyn ObjectStore>,
        entity_id: EntityId,
        referenced_before: BTreeSet<StoredFilename>,
    ) -> Self {
        Self {
            store,
            entity_id,
            referenced_before,
            committed_state: None,
            staged: BTreeSet::new(),
            replaced: BTreeSet::new(),
            settled: false,
        }
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    /// A file written during this transaction: delete on rollback.
    pub fn track_staged(&mut self, filename: StoredFilename) {
        self.staged.insert(filename);
    }

    /// A previous filename being overwritten: delete on commit.
    pub fn track_replaced(&mut self, filename: StoredFilename) {
        self.replaced.insert(filename);
    }

    /// Filenames the record will reference if the transaction commits.
    ///
    /// Replaced names still in this set (same content uploaded again, or shared with another
    /// field) survive the commit.
    pub fn set_committed_state(&mut self, referenced: BTreeSet<StoredFilename>) {
        self.committed_state = Some(referenced);
    }

    /// Delivers the transaction outcome and performs the compensating deletes.
    pub fn settle(mut self, outcome: TransactionOutcome) -> ReconcileReport {
        self.reconcile(outcome)
    }

    fn doomed(&self, outcome: TransactionOutcome) -> BTreeSet<StoredFilename> {
        match outcome {
            TransactionOutcome::Committed => {
                let retained = self
                    .committed_state
                    .clone()
                    .unwrap_or_else(|| self.staged.clone());
                self.replaced.difference(&retained).cloned().collect()
            }
            TransactionOutcome::RolledBack => self
                .staged
                .difference(&self.referenced_before)
                .cloned()
                .collect(),
        }
    }

    fn reconcile(&mut self, outcome: TransactionOutcome) -> ReconcileReport {
        self.settled = true;

        let mut report = ReconcileReport {
            outcome,
            deleted: Vec::new(),
            failed: Vec::new(),
        };

        for filename in self.doomed(outcome) {
            let path = ObjectPath::new(self.entity_id, filename);
            match self.store.delete(&path) {
                Ok(()) => report.deleted.push(path),
                Err(error) => {
                    tracing::warn!(
                        object = %path,
                        outcome = ?outcome,
                        %error,
                        "failed to delete object during reconciliation; leaving orphan"
                    );
                    report.failed.push(path);
                }
            }
        }

        tracing::debug!(
            entity_id = %self.entity_id,
            outcome = ?outcome,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "reconciled object store"
        );
        report
    }
}

impl Drop for Reconciler {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(
                entity_id = %self.entity_id,
                "reconciler dropped before an outcome was delivered; treating as rolled back"
            );
            self.reconcile(TransactionOutcome::RolledBack);
        }
    }
}
