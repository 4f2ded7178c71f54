use chrono::NaiveDate;
use serde::Serialize;

use crate::backend::{AttendanceBackend, CommitReceipt};
use crate::error::{EngineError, EngineResult};
use crate::pagination::ViewKey;
use crate::status::StatusValue;

/// A snapshot of the working set frozen at the moment a commit was started, together with
/// the view epoch and working-set revision it was taken at.
#[derive(Debug, Clone)]
pub struct CommitTicket {
    pub(crate) key: ViewKey,
    pub(crate) epoch: u64,
    pub(crate) revision: u64,
    pub(crate) snapshot: Vec<StatusValue>,
}

impl CommitTicket {
    pub fn group_id(&self) -> &str {
        &self.key.group_id
    }

    pub fn date(&self) -> NaiveDate {
        self.key.date
    }

    pub fn snapshot(&self) -> &[StatusValue] {
        &self.snapshot
    }

    /// Sends the snapshot as a single upsert batch.
    pub fn submit<B: AttendanceBackend + ?Sized>(&self, backend: &B) -> EngineResult<CommitReceipt> {
        tracing::debug!(
            group_id = %self.key.group_id,
            date = %self.key.date,
            entries = self.snapshot.len(),
            "submitting attendance batch"
        );
        backend.commit_attendance(&self.key.group_id, self.key.date, &self.snapshot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum CommitOutcome {
    /// Nothing marked; no request was sent.
    NothingToCommit,
    #[serde(rename_all = "camelCase")]
    Committed { affected_count: u64 },
    /// The ledger accepted the batch but the view had moved to another scope meanwhile.
    #[serde(rename_all = "camelCase")]
    Superseded { affected_count: u64 },
}

/// One commit in flight per view; a second attempt is rejected, not queued.
#[derive(Debug, Default)]
pub struct CommitGuard {
    in_flight: bool,
}

impl CommitGuard {
    pub fn acquire(&mut self) -> EngineResult<()> {
        if self.in_flight {
            return Err(EngineError::CommitInFlight);
        }
        self.in_flight = true;
        Ok(())
    }

    pub fn release(&mut self) {
        self.in_flight = false;
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }
}
