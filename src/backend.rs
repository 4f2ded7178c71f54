//! Contracts of the remote collaborators the engine consumes: the roster service, the
//! attendance ledger and the analytics service.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::status::{Member, StatusValue};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterPage {
    pub members: Vec<Member>,
    pub statuses: Vec<StatusValue>,
    pub total_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummaryRow {
    pub member_name: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingRow {
    pub rank: u32,
    pub member_id: String,
    pub member_name: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitReceipt {
    pub affected_count: u64,
}

pub trait AttendanceBackend {
    /// Members of the group for one page plus their status on `date`. Members with no
    /// ledger row are simply absent from `statuses`. `total_count` does not depend on `date`.
    fn fetch_roster_page(
        &self,
        group_id: &str,
        date: NaiveDate,
        page: u32,
        page_size: u32,
    ) -> EngineResult<RosterPage>;

    fn fetch_daily_summary(&self, group_id: &str) -> EngineResult<Vec<DailySummaryRow>>;

    fn fetch_ranking(&self, group_id: &str) -> EngineResult<Vec<RankingRow>>;

    /// Upserts `entries` keyed by (group, member, date). Members not in `entries` keep
    /// whatever they had.
    fn commit_attendance(
        &self,
        group_id: &str,
        date: NaiveDate,
        entries: &[StatusValue],
    ) -> EngineResult<CommitReceipt>;
}
