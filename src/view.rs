//! One attendance view: a (group, date, page) scope, its working set, the pagination
//! controller and the group's analytics.
//!
//! Every suspension point (roster fetch, analytics fetch, commit) is split into a
//! `begin_*` step that hands out a ticket and a `finish_*` step that applies the result.
//! Tickets remember the scope epoch they were issued under, so a result that arrives after
//! the operator moved to another group, date or page is dropped instead of resurrecting a
//! stale working set. `refresh` and `save` drive the full flow synchronously.

use chrono::NaiveDate;
use serde::Serialize;

use crate::analytics::{AnalyticsSnapshot, LiveCounts};
use crate::backend::{AttendanceBackend, CommitReceipt, DailySummaryRow, RankingRow, RosterPage};
use crate::commit::{CommitGuard, CommitOutcome, CommitTicket};
use crate::error::{EngineError, EngineResult};
use crate::pagination::{LoadState, PageWindow, ViewKey};
use crate::status::{AttendanceStatus, StatusValue};
use crate::working_set::WorkingSet;

#[derive(Debug, Clone)]
pub struct LoadTicket {
    key: ViewKey,
    epoch: u64,
    seq: u64,
    page_size: u32,
    with_analytics: bool,
}

impl LoadTicket {
    pub fn key(&self) -> &ViewKey {
        &self.key
    }

    /// Analytics are group-wide, so only a page-1 load without cached figures asks for them.
    pub fn wants_analytics(&self) -> bool {
        self.with_analytics
    }

    pub fn fetch<B: AttendanceBackend + ?Sized>(&self, backend: &B) -> EngineResult<RosterPage> {
        backend.fetch_roster_page(&self.key.group_id, self.key.date, self.key.page, self.page_size)
    }

    /// The two reads are independent; one failing does not void the other.
    pub fn fetch_analytics<B: AttendanceBackend + ?Sized>(&self, backend: &B) -> AnalyticsFetch {
        AnalyticsFetch {
            daily_summary: backend.fetch_daily_summary(&self.key.group_id),
            ranking: backend.fetch_ranking(&self.key.group_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyticsFetch {
    pub daily_summary: EngineResult<Vec<DailySummaryRow>>,
    pub ranking: EngineResult<Vec<RankingRow>>,
}

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Seeded,
    /// The ticket was issued for a scope or load the view no longer cares about.
    Stale,
    /// The group shrank below the requested page; the window was clamped and needs this load.
    Relocated(LoadTicket),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowView {
    pub member_id: String,
    pub name: String,
    pub status: AttendanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub group_id: String,
    pub date: NaiveDate,
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
    pub load: LoadState,
    pub dirty: bool,
    pub commit_in_flight: bool,
    pub rows: Vec<RowView>,
    pub live_counts: LiveCounts,
    pub analytics: Option<AnalyticsSnapshot>,
}

#[derive(Debug)]
pub struct AttendanceView {
    group_id: String,
    date: NaiveDate,
    window: PageWindow,
    load: LoadState,
    working_set: WorkingSet,
    seeded_for: Option<ViewKey>,
    epoch: u64,
    load_seq: u64,
    commits: CommitGuard,
    analytics: Option<AnalyticsSnapshot>,
}

impl AttendanceView {
    pub fn new(group_id: impl Into<String>, date: NaiveDate, page_size: u32) -> Self {
        Self {
            group_id: group_id.into(),
            date,
            window: PageWindow::new(page_size),
            load: LoadState::Idle,
            working_set: WorkingSet::default(),
            seeded_for: None,
            epoch: 0,
            load_seq: 0,
            commits: CommitGuard::default(),
            analytics: None,
        }
    }

    pub fn key(&self) -> ViewKey {
        ViewKey {
            group_id: self.group_id.clone(),
            date: self.date,
            page: self.window.page(),
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn window(&self) -> &PageWindow {
        &self.window
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.working_set
    }

    pub fn analytics(&self) -> Option<&AnalyticsSnapshot> {
        self.analytics.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.working_set.is_dirty()
    }

    pub fn commit_in_flight(&self) -> bool {
        self.commits.is_in_flight()
    }

    pub fn live_counts(&self) -> LiveCounts {
        LiveCounts::from_working_set(&self.working_set)
    }

    /// Reloads the current scope. Keeps the working set visible until the result arrives.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.load_seq += 1;
        self.load = LoadState::Loading;
        let key = self.key();
        let with_analytics = key.page == 1
            && self
                .analytics
                .as_ref()
                .map(|a| a.group_id != key.group_id || !a.complete)
                .unwrap_or(true);
        LoadTicket {
            key,
            epoch: self.epoch,
            seq: self.load_seq,
            page_size: self.window.page_size(),
            with_analytics,
        }
    }

    /// Switches group. Resets to page 1 and discards the working set, edits included.
    pub fn select_group(&mut self, group_id: &str) -> Option<LoadTicket> {
        if group_id == self.group_id {
            return None;
        }
        self.group_id = group_id.to_string();
        self.analytics = None;
        self.window.reset();
        Some(self.rescope("group"))
    }

    /// Switches date. Resets to page 1 and discards the working set, edits included.
    pub fn select_date(&mut self, date: NaiveDate) -> Option<LoadTicket> {
        if date == self.date {
            return None;
        }
        self.date = date;
        self.window.reset();
        Some(self.rescope("date"))
    }

    /// Moves to `page`. Out-of-range or unchanged pages are rejected without a fetch.
    pub fn go_to_page(&mut self, page: u32) -> Option<LoadTicket> {
        if page == self.window.page() || !self.window.go_to(page) {
            return None;
        }
        Some(self.rescope("page"))
    }

    fn rescope(&mut self, dimension: &str) -> LoadTicket {
        if self.working_set.is_dirty() {
            tracing::info!(
                dimension,
                group_id = %self.group_id,
                date = %self.date,
                "scope changed with unsaved edits; discarding working set"
            );
        }
        self.epoch += 1;
        self.working_set.clear();
        self.seeded_for = None;
        self.begin_load()
    }

    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: EngineResult<RosterPage>,
    ) -> EngineResult<LoadOutcome> {
        if ticket.epoch != self.epoch || ticket.seq != self.load_seq {
            tracing::debug!(page = ticket.key.page, "dropping stale roster result");
            return Ok(LoadOutcome::Stale);
        }

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(
                    group_id = %ticket.key.group_id,
                    date = %ticket.key.date,
                    page = ticket.key.page,
                    error = %e,
                    "roster fetch failed; keeping current working set"
                );
                self.load = LoadState::Error {
                    code: e.code().to_string(),
                    message: e.to_string(),
                };
                return Err(e);
            }
        };

        self.window.set_total_count(page.total_count);
        if self.window.page() != ticket.key.page {
            tracing::debug!(
                requested = ticket.key.page,
                clamped = self.window.page(),
                "group shrank below requested page"
            );
            return Ok(LoadOutcome::Relocated(self.rescope("page")));
        }

        let same_scope = self.seeded_for.as_ref() == Some(&ticket.key);
        if same_scope && self.working_set.is_dirty() {
            tracing::debug!(
                group_id = %ticket.key.group_id,
                date = %ticket.key.date,
                page = ticket.key.page,
                "refresh under unsaved edits; keeping edited members"
            );
            self.working_set.rebase(page.members, page.statuses);
        } else {
            tracing::debug!(
                group_id = %ticket.key.group_id,
                date = %ticket.key.date,
                page = ticket.key.page,
                members = page.members.len(),
                "seeding working set"
            );
            self.working_set.seed(page.members, page.statuses);
        }
        self.seeded_for = Some(ticket.key);
        self.load = LoadState::Ready;
        Ok(LoadOutcome::Seeded)
    }

    /// Applies an analytics fetch if the view still shows that group. Each half is kept on
    /// its own: a failed half falls back to what the cache already held for the group (or
    /// nothing) and leaves the snapshot incomplete, so the next page-1 load asks again.
    pub fn finish_analytics(&mut self, group_id: &str, fetched: AnalyticsFetch) -> bool {
        if group_id != self.group_id {
            tracing::debug!(group_id, "dropping analytics for a group no longer shown");
            return false;
        }
        let previous = self
            .analytics
            .take()
            .filter(|a| a.group_id == group_id);

        let summary = match fetched.daily_summary {
            Ok(rows) => Some(rows),
            Err(e) => {
                tracing::warn!(group_id, error = %e, "daily summary fetch failed");
                None
            }
        };
        let ranking = match fetched.ranking {
            Ok(rows) => Some(rows),
            Err(e) => {
                tracing::warn!(group_id, error = %e, "ranking fetch failed");
                None
            }
        };
        if summary.is_none() && ranking.is_none() {
            self.analytics = previous;
            return false;
        }

        let complete = summary.is_some() && ranking.is_some();
        let summary = summary
            .or_else(|| previous.as_ref().map(|a| a.daily_summary.clone()))
            .unwrap_or_default();
        let ranking = ranking
            .or_else(|| previous.map(|a| a.ranking))
            .unwrap_or_default();
        let snapshot = AnalyticsSnapshot::new(group_id, summary, ranking);
        self.analytics = Some(if complete { snapshot } else { snapshot.incomplete() });
        true
    }

    pub fn mark(&mut self, member_id: &str, status: AttendanceStatus) -> bool {
        let applied = self.working_set.mark(member_id, status);
        if !applied {
            tracing::debug!(member_id, "ignoring mark for member not on this page");
        }
        applied
    }

    pub fn mark_all(&mut self, status: AttendanceStatus) -> usize {
        self.working_set.mark_all(status)
    }

    pub fn set_notes(&mut self, member_id: &str, notes: Option<String>) -> bool {
        self.working_set.set_notes(member_id, notes)
    }

    pub fn revert(&mut self) -> EngineResult<()> {
        if self.commits.is_in_flight() {
            return Err(EngineError::CommitInFlight);
        }
        self.working_set.revert();
        Ok(())
    }

    /// Freezes the working set for a commit. `Ok(None)` when nothing is marked: empty
    /// batches are never sent.
    pub fn begin_commit(&mut self) -> EngineResult<Option<CommitTicket>> {
        if self.commits.is_in_flight() {
            return Err(EngineError::CommitInFlight);
        }
        let Some(key) = self.seeded_for.clone() else {
            return Ok(None);
        };
        let snapshot = self.working_set.snapshot_for_commit();
        if snapshot.is_empty() {
            return Ok(None);
        }
        self.commits.acquire()?;
        tracing::info!(
            group_id = %key.group_id,
            date = %key.date,
            entries = snapshot.len(),
            "commit started"
        );
        Ok(Some(CommitTicket {
            key,
            epoch: self.epoch,
            revision: self.working_set.revision(),
            snapshot,
        }))
    }

    /// Applies a commit result. On failure the working set and its dirty flag are untouched.
    pub fn finish_commit(
        &mut self,
        ticket: &CommitTicket,
        result: EngineResult<CommitReceipt>,
    ) -> EngineResult<CommitOutcome> {
        self.commits.release();
        let receipt = match result {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::warn!(
                    group_id = %ticket.key.group_id,
                    date = %ticket.key.date,
                    error = %e,
                    "commit failed; edits kept"
                );
                return Err(e);
            }
        };

        if self
            .analytics
            .as_ref()
            .map(|a| a.group_id == ticket.key.group_id)
            .unwrap_or(false)
        {
            self.analytics = None;
        }

        if ticket.epoch != self.epoch {
            tracing::info!(
                group_id = %ticket.key.group_id,
                date = %ticket.key.date,
                affected = receipt.affected_count,
                "commit landed after the view moved on"
            );
            return Ok(CommitOutcome::Superseded {
                affected_count: receipt.affected_count,
            });
        }

        self.working_set
            .mark_committed(&ticket.snapshot, ticket.revision);
        tracing::info!(
            group_id = %ticket.key.group_id,
            date = %ticket.key.date,
            affected = receipt.affected_count,
            "commit finished"
        );
        Ok(CommitOutcome::Committed {
            affected_count: receipt.affected_count,
        })
    }

    /// Runs a load to completion, following a relocation once if the group shrank.
    pub fn load<B: AttendanceBackend + ?Sized>(
        &mut self,
        backend: &B,
        ticket: LoadTicket,
    ) -> EngineResult<()> {
        let mut ticket = ticket;
        loop {
            if ticket.wants_analytics() {
                let analytics = ticket.fetch_analytics(backend);
                self.finish_analytics(&ticket.key.group_id, analytics);
            }
            let page = ticket.fetch(backend);
            match self.finish_load(ticket, page)? {
                LoadOutcome::Relocated(next) => ticket = next,
                LoadOutcome::Seeded | LoadOutcome::Stale => return Ok(()),
            }
        }
    }

    pub fn refresh<B: AttendanceBackend + ?Sized>(&mut self, backend: &B) -> EngineResult<()> {
        let ticket = self.begin_load();
        self.load(backend, ticket)
    }

    /// Commits the working set and, once the ledger accepted it, reloads committed truth.
    pub fn save<B: AttendanceBackend + ?Sized>(
        &mut self,
        backend: &B,
    ) -> EngineResult<CommitOutcome> {
        let Some(ticket) = self.begin_commit()? else {
            return Ok(CommitOutcome::NothingToCommit);
        };
        let result = ticket.submit(backend);
        let outcome = self.finish_commit(&ticket, result)?;
        if let CommitOutcome::Committed { .. } = outcome {
            if let Err(e) = self.refresh(backend) {
                tracing::warn!(error = %e, "reload after commit failed");
            }
        }
        Ok(outcome)
    }

    pub fn state(&self) -> ViewState {
        let rows = self
            .working_set
            .members()
            .iter()
            .map(|m| {
                let value = self.working_set.get(&m.id);
                RowView {
                    member_id: m.id.clone(),
                    name: m.name.clone(),
                    status: value.map(|v| v.status).unwrap_or_default(),
                    notes: value.and_then(|v| v.notes.clone()),
                }
            })
            .collect();
        ViewState {
            group_id: self.group_id.clone(),
            date: self.date,
            page: self.window.page(),
            page_size: self.window.page_size(),
            total_count: self.window.total_count(),
            total_pages: self.window.total_pages(),
            load: self.load.clone(),
            dirty: self.working_set.is_dirty(),
            commit_in_flight: self.commits.is_in_flight(),
            rows,
            live_counts: self.live_counts(),
            analytics: self.analytics.clone(),
        }
    }

    /// Status snapshot the next commit would send.
    pub fn pending_entries(&self) -> Vec<StatusValue> {
        self.working_set.snapshot_for_commit()
    }
}
