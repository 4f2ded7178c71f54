//! SQLite-backed roster, ledger and analytics service.

use anyhow::Context;
use chrono::{NaiveDate, TimeDelta};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

use crate::analytics::{attendance_percentage, normalize_ranking};
use crate::backend::{AttendanceBackend, CommitReceipt, DailySummaryRow, RankingRow, RosterPage};
use crate::error::{EngineError, EngineResult};
use crate::status::{AttendanceStatus, Member, StatusValue};

pub const DB_FILE_NAME: &str = "rollcall.sqlite3";

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub struct Ledger {
    conn: Connection,
    editable_window_days: Option<i64>,
    today: Option<NaiveDate>,
}

impl Ledger {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(workspace)
            .with_context(|| format!("create workspace {}", workspace.display()))?;
        let conn = Connection::open(workspace.join(DB_FILE_NAME))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn,
            editable_window_days: None,
            today: None,
        })
    }

    /// Commits are only accepted for dates in `[today - days, today]`.
    pub fn with_editable_window(mut self, days: Option<i64>) -> Self {
        self.editable_window_days = days;
        self
    }

    /// Pins "today" for the editable window instead of the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    pub fn create_group(&self, name: &str) -> EngineResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::validation("group name must not be empty"));
        }
        let id = Uuid::new_v4().to_string();
        self.conn
            .execute("INSERT INTO groups(id, name) VALUES(?, ?)", (&id, name))?;
        Ok(id)
    }

    pub fn add_member(
        &self,
        group_id: &str,
        display_name: &str,
        id: Option<&str>,
    ) -> EngineResult<String> {
        self.require_group(group_id)?;
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(EngineError::validation("displayName must not be empty"));
        }
        let id = match id.map(str::trim) {
            Some("") => return Err(EngineError::validation("member id must not be empty")),
            Some(v) => v.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        let taken = self
            .conn
            .query_row("SELECT 1 FROM members WHERE id = ?", [&id], |r| {
                r.get::<_, i64>(0)
            })
            .optional()?
            .is_some();
        if taken {
            return Err(EngineError::validation(format!("member id {} already exists", id)));
        }
        let sort_order: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM members WHERE group_id = ?",
            [group_id],
            |r| r.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO members(id, group_id, display_name, sort_order) VALUES(?, ?, ?, ?)",
            (&id, group_id, display_name, sort_order),
        )?;
        Ok(id)
    }

    fn require_group(&self, group_id: &str) -> EngineResult<()> {
        let exists = self
            .conn
            .query_row("SELECT 1 FROM groups WHERE id = ?", [group_id], |r| {
                r.get::<_, i64>(0)
            })
            .optional()?
            .is_some();
        if exists {
            Ok(())
        } else {
            Err(EngineError::not_found("group not found"))
        }
    }

    fn check_editable(&self, date: NaiveDate) -> EngineResult<()> {
        let Some(days) = self.editable_window_days else {
            return Ok(());
        };
        let today = self.today();
        if date > today {
            return Err(EngineError::validation(format!(
                "date {} is after today ({})",
                date, today
            )));
        }
        // A window reaching past the calendar's start has no lower bound.
        let earliest = TimeDelta::try_days(days).and_then(|span| today.checked_sub_signed(span));
        if let Some(earliest) = earliest {
            if date < earliest {
                return Err(EngineError::validation(format!(
                    "date {} is outside the editable window {}..={}",
                    date, earliest, today
                )));
            }
        }
        Ok(())
    }

    /// (id, name, recorded days, attended days) per member in roster order.
    fn member_tallies(&self, group_id: &str) -> EngineResult<Vec<(String, String, u64, u64)>> {
        self.require_group(group_id)?;
        let mut stmt = self.conn.prepare(
            "SELECT m.id, m.display_name,
                    COUNT(a.member_id),
                    SUM(CASE WHEN a.status IN ('present', 'late') THEN 1 ELSE 0 END)
             FROM members m
             LEFT JOIN attendance a ON a.group_id = m.group_id AND a.member_id = m.id
             WHERE m.group_id = ?
             GROUP BY m.id, m.display_name, m.sort_order
             ORDER BY m.sort_order, m.id",
        )?;
        let rows = stmt
            .query_map([group_id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, Option<i64>>(3)?.unwrap_or(0),
                ))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(rows
            .into_iter()
            .map(|(id, name, recorded, attended)| {
                (id, name, recorded.max(0) as u64, attended.max(0) as u64)
            })
            .collect())
    }
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS groups(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS members(
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            display_name TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(group_id) REFERENCES groups(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_members_group_sort ON members(group_id, sort_order)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            group_id TEXT NOT NULL,
            member_id TEXT NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            notes TEXT,
            updated_at TEXT,
            PRIMARY KEY(group_id, member_id, date),
            FOREIGN KEY(group_id) REFERENCES groups(id),
            FOREIGN KEY(member_id) REFERENCES members(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_group_date ON attendance(group_id, date)",
        [],
    )?;
    Ok(())
}

impl AttendanceBackend for Ledger {
    fn fetch_roster_page(
        &self,
        group_id: &str,
        date: NaiveDate,
        page: u32,
        page_size: u32,
    ) -> EngineResult<RosterPage> {
        if page == 0 || page_size == 0 {
            return Err(EngineError::validation("page and pageSize must be >= 1"));
        }
        self.require_group(group_id)?;
        let total_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM members WHERE group_id = ?",
            [group_id],
            |r| r.get(0),
        )?;
        let offset = i64::from(page - 1) * i64::from(page_size);

        let mut stmt = self.conn.prepare(
            "SELECT m.id, m.display_name, a.status, a.notes
             FROM members m
             LEFT JOIN attendance a
               ON a.group_id = m.group_id AND a.member_id = m.id AND a.date = ?
             WHERE m.group_id = ?
             ORDER BY m.sort_order, m.id
             LIMIT ? OFFSET ?",
        )?;
        let rows = stmt
            .query_map(
                (date_key(date), group_id, i64::from(page_size), offset),
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, Option<String>>(2)?,
                        r.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

        let mut members = Vec::with_capacity(rows.len());
        let mut statuses = Vec::new();
        for (id, name, status, notes) in rows {
            if let Some(raw) = status {
                let status = raw.parse::<AttendanceStatus>().map_err(|_| {
                    EngineError::transient(format!("ledger holds unknown status {:?}", raw))
                })?;
                statuses.push(StatusValue {
                    member_id: id.clone(),
                    status,
                    notes,
                });
            }
            members.push(Member { id, name });
        }

        Ok(RosterPage {
            members,
            statuses,
            total_count: total_count.max(0) as u64,
        })
    }

    fn fetch_daily_summary(&self, group_id: &str) -> EngineResult<Vec<DailySummaryRow>> {
        Ok(self
            .member_tallies(group_id)?
            .into_iter()
            .map(|(_, name, recorded, attended)| DailySummaryRow {
                member_name: name,
                percentage: attendance_percentage(attended, recorded),
            })
            .collect())
    }

    fn fetch_ranking(&self, group_id: &str) -> EngineResult<Vec<RankingRow>> {
        let rows = self
            .member_tallies(group_id)?
            .into_iter()
            .map(|(id, name, recorded, attended)| RankingRow {
                rank: 0,
                member_id: id,
                member_name: name,
                percentage: attendance_percentage(attended, recorded),
            })
            .collect();
        Ok(normalize_ranking(rows))
    }

    fn commit_attendance(
        &self,
        group_id: &str,
        date: NaiveDate,
        entries: &[StatusValue],
    ) -> EngineResult<CommitReceipt> {
        if entries.is_empty() {
            return Err(EngineError::validation("entries must not be empty"));
        }
        self.check_editable(date)?;
        self.require_group(group_id)?;

        let mut seen = HashSet::new();
        for entry in entries {
            if !entry.status.is_marked() {
                return Err(EngineError::validation(format!(
                    "member {} has status unmarked; omit it instead",
                    entry.member_id
                )));
            }
            if !seen.insert(entry.member_id.as_str()) {
                return Err(EngineError::validation(format!(
                    "member {} appears more than once",
                    entry.member_id
                )));
            }
        }

        let day = date_key(date);
        let now = chrono::Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        let mut affected: u64 = 0;
        for entry in entries {
            let in_group = tx
                .query_row(
                    "SELECT 1 FROM members WHERE group_id = ? AND id = ?",
                    (group_id, &entry.member_id),
                    |r| r.get::<_, i64>(0),
                )
                .optional()?
                .is_some();
            if !in_group {
                return Err(EngineError::validation(format!(
                    "member {} is not in this group",
                    entry.member_id
                )));
            }
            let changed = tx.execute(
                "INSERT INTO attendance(group_id, member_id, date, status, notes, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?)
                 ON CONFLICT(group_id, member_id, date) DO UPDATE SET
                   status = excluded.status,
                   notes = excluded.notes,
                   updated_at = excluded.updated_at",
                (
                    group_id,
                    &entry.member_id,
                    &day,
                    entry.status.as_str(),
                    entry.notes.as_deref(),
                    &now,
                ),
            )?;
            affected += changed as u64;
        }
        tx.commit()?;
        tracing::debug!(group_id, date = %day, affected, "attendance batch upserted");
        Ok(CommitReceipt {
            affected_count: affected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    fn entry(member_id: &str, status: AttendanceStatus) -> StatusValue {
        StatusValue {
            member_id: member_id.to_string(),
            status,
            notes: None,
        }
    }

    fn ledger_with_members(ids: &[&str]) -> (Ledger, String) {
        let ledger = Ledger::open_in_memory().expect("ledger");
        let group = ledger.create_group("7B").expect("group");
        for id in ids {
            ledger
                .add_member(&group, &format!("Student {}", id), Some(*id))
                .expect("member");
        }
        (ledger, group)
    }

    #[test]
    fn unknown_group_is_not_found() {
        let ledger = Ledger::open_in_memory().expect("ledger");
        let e = ledger
            .fetch_roster_page("nope", d("2024-03-01"), 1, 10)
            .expect_err("missing group");
        assert!(matches!(e, EngineError::NotFound(_)));
    }

    #[test]
    fn no_rows_for_date_is_not_an_error() {
        let (ledger, group) = ledger_with_members(&["m1", "m2"]);
        let page = ledger
            .fetch_roster_page(&group, d("2024-03-01"), 1, 10)
            .expect("page");
        assert_eq!(page.total_count, 2);
        assert_eq!(page.members.len(), 2);
        assert!(page.statuses.is_empty());
    }

    #[test]
    fn commit_upserts_and_leaves_others_untouched() {
        let (ledger, group) = ledger_with_members(&["m1", "m2", "m3"]);
        let date = d("2024-03-01");
        let receipt = ledger
            .commit_attendance(
                &group,
                date,
                &[entry("m1", AttendanceStatus::Present), entry("m2", AttendanceStatus::Absent)],
            )
            .expect("commit");
        assert_eq!(receipt.affected_count, 2);

        let receipt = ledger
            .commit_attendance(&group, date, &[entry("m2", AttendanceStatus::Late)])
            .expect("commit");
        assert_eq!(receipt.affected_count, 1);

        let page = ledger.fetch_roster_page(&group, date, 1, 10).expect("page");
        let status = |id: &str| {
            page.statuses
                .iter()
                .find(|s| s.member_id == id)
                .map(|s| s.status)
        };
        assert_eq!(status("m1"), Some(AttendanceStatus::Present));
        assert_eq!(status("m2"), Some(AttendanceStatus::Late));
        assert_eq!(status("m3"), None);
    }

    #[test]
    fn rejected_batch_writes_nothing() {
        let (ledger, group) = ledger_with_members(&["m1"]);
        let date = d("2024-03-01");
        let e = ledger
            .commit_attendance(
                &group,
                date,
                &[entry("m1", AttendanceStatus::Present), entry("stranger", AttendanceStatus::Absent)],
            )
            .expect_err("stranger");
        assert!(matches!(e, EngineError::Validation(_)));
        let page = ledger.fetch_roster_page(&group, date, 1, 10).expect("page");
        assert!(page.statuses.is_empty());

        let e = ledger
            .commit_attendance(&group, date, &[entry("m1", AttendanceStatus::Unmarked)])
            .expect_err("unmarked");
        assert!(matches!(e, EngineError::Validation(_)));
        assert!(ledger.commit_attendance(&group, date, &[]).is_err());
    }

    #[test]
    fn editable_window_is_enforced() {
        let (ledger, group) = ledger_with_members(&["m1"]);
        let ledger = ledger
            .with_editable_window(Some(7))
            .with_today(d("2024-03-10"));
        let batch = [entry("m1", AttendanceStatus::Present)];
        assert!(ledger.commit_attendance(&group, d("2024-03-03"), &batch).is_ok());
        assert!(matches!(
            ledger.commit_attendance(&group, d("2024-03-02"), &batch),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            ledger.commit_attendance(&group, d("2024-03-11"), &batch),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn huge_editable_window_has_no_lower_bound() {
        let (ledger, group) = ledger_with_members(&["m1"]);
        let ledger = ledger
            .with_editable_window(Some(i64::MAX / 2))
            .with_today(d("2024-03-10"));
        let batch = [entry("m1", AttendanceStatus::Present)];
        assert!(ledger.commit_attendance(&group, d("1900-01-01"), &batch).is_ok());
        assert!(matches!(
            ledger.commit_attendance(&group, d("2024-03-11"), &batch),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn ranking_and_summary_use_attended_share() {
        let (ledger, group) = ledger_with_members(&["m1", "m2", "m3"]);
        ledger
            .commit_attendance(
                &group,
                d("2024-03-01"),
                &[
                    entry("m1", AttendanceStatus::Present),
                    entry("m2", AttendanceStatus::Late),
                    entry("m3", AttendanceStatus::Absent),
                ],
            )
            .expect("day 1");
        ledger
            .commit_attendance(
                &group,
                d("2024-03-02"),
                &[
                    entry("m1", AttendanceStatus::Absent),
                    entry("m2", AttendanceStatus::Present),
                    entry("m3", AttendanceStatus::Present),
                ],
            )
            .expect("day 2");

        let summary = ledger.fetch_daily_summary(&group).expect("summary");
        let pct: Vec<f64> = summary.iter().map(|r| r.percentage).collect();
        assert_eq!(pct, vec![50.0, 100.0, 50.0]);

        let ranking = ledger.fetch_ranking(&group).expect("ranking");
        let order: Vec<(u32, &str)> = ranking
            .iter()
            .map(|r| (r.rank, r.member_id.as_str()))
            .collect();
        assert_eq!(order, vec![(1, "m2"), (2, "m1"), (3, "m3")]);
    }
}
