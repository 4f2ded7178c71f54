use serde::Serialize;
use std::cmp::Ordering;

use crate::backend::{DailySummaryRow, RankingRow};
use crate::status::AttendanceStatus;
use crate::working_set::WorkingSet;

pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// Percentage of recorded days a member attended (present or late).
pub fn attendance_percentage(attended: u64, recorded: u64) -> f64 {
    if recorded == 0 {
        return 0.0;
    }
    round_off_1_decimal(100.0 * attended as f64 / recorded as f64)
}

/// Group-wide historical figures. Read-only to the engine and never derived from unsaved
/// edits. `complete` is false when one of the two reads failed and its part is stale or
/// empty; an incomplete snapshot is fetched again on the next page-1 load.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub group_id: String,
    pub daily_summary: Vec<DailySummaryRow>,
    pub ranking: Vec<RankingRow>,
    pub complete: bool,
}

impl AnalyticsSnapshot {
    pub fn new(
        group_id: impl Into<String>,
        daily_summary: Vec<DailySummaryRow>,
        ranking: Vec<RankingRow>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            daily_summary,
            ranking: normalize_ranking(ranking),
            complete: true,
        }
    }

    pub fn incomplete(self) -> Self {
        Self {
            complete: false,
            ..self
        }
    }
}

fn ranking_order(a: &RankingRow, b: &RankingRow) -> Ordering {
    b.percentage
        .total_cmp(&a.percentage)
        .then_with(|| a.member_id.cmp(&b.member_id))
}

/// Orders by percentage descending, ties by member id, and renumbers ranks 1..n so that
/// rank is a total order no matter what the service sent.
pub fn normalize_ranking(mut rows: Vec<RankingRow>) -> Vec<RankingRow> {
    rows.sort_by(ranking_order);
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = u32::try_from(i + 1).unwrap_or(u32::MAX);
    }
    rows
}

/// Today's counters from the working set. These reflect unsaved edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveCounts {
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub unmarked: usize,
}

impl LiveCounts {
    pub fn from_working_set(ws: &WorkingSet) -> Self {
        let mut counts = Self::default();
        for value in ws.entries() {
            match value.status {
                AttendanceStatus::Present => counts.present += 1,
                AttendanceStatus::Absent => counts.absent += 1,
                AttendanceStatus::Late => counts.late += 1,
                AttendanceStatus::Unmarked => counts.unmarked += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.present + self.absent + self.late + self.unmarked
    }
}
