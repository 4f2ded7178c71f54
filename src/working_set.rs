//! Local, mutable attendance for the currently visible page.
//!
//! The working set is the source of truth for the view until a commit lands. It is
//! seeded wholesale from a roster fetch; a refresh of the same scope rebases pending edits
//! onto the fresh rows instead of dropping them.

use std::collections::HashMap;

use crate::status::{AttendanceStatus, Member, StatusValue};

#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    members: Vec<Member>,
    values: HashMap<String, StatusValue>,
    baseline: HashMap<String, StatusValue>,
    dirty: bool,
    revision: u64,
}

impl WorkingSet {
    /// Replaces the entire set. Members without a status row start `unmarked`; statuses for
    /// members outside `members` are dropped.
    pub fn seed(&mut self, members: Vec<Member>, statuses: Vec<StatusValue>) {
        let mut by_member: HashMap<String, StatusValue> = statuses
            .into_iter()
            .map(|s| (s.member_id.clone(), s))
            .collect();

        let mut ordered = Vec::with_capacity(members.len());
        let mut values = HashMap::with_capacity(members.len());
        for member in members {
            if values.contains_key(&member.id) {
                continue;
            }
            let value = by_member
                .remove(&member.id)
                .unwrap_or_else(|| StatusValue::unmarked(member.id.clone()));
            values.insert(member.id.clone(), value);
            ordered.push(member);
        }

        self.members = ordered;
        self.baseline = values.clone();
        self.values = values;
        self.dirty = false;
        self.revision = 0;
    }

    /// Applies a fresh fetch of the same scope without losing edits: members whose value
    /// differs from the baseline keep it, everyone else takes the fetched status. The baseline
    /// always becomes the fetched truth. Stays dirty while any edit survives.
    pub fn rebase(&mut self, members: Vec<Member>, statuses: Vec<StatusValue>) {
        let edited: HashMap<String, StatusValue> = self
            .values
            .iter()
            .filter(|(id, value)| self.baseline.get(*id) != Some(*value))
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect();
        let revision = self.revision;

        self.seed(members, statuses);
        self.revision = revision;
        let mut kept = 0;
        for (id, value) in edited {
            if let Some(slot) = self.values.get_mut(&id) {
                *slot = value;
                kept += 1;
            }
        }
        self.dirty = kept > 0;
    }

    /// Drops everything, including pending edits.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Returns false (and changes nothing) when `member_id` is not on the current page.
    pub fn mark(&mut self, member_id: &str, status: AttendanceStatus) -> bool {
        let Some(value) = self.values.get_mut(member_id) else {
            return false;
        };
        value.status = status;
        self.touch();
        true
    }

    /// Current page only; members on unfetched pages are not affected.
    pub fn mark_all(&mut self, status: AttendanceStatus) -> usize {
        if self.values.is_empty() {
            return 0;
        }
        for value in self.values.values_mut() {
            value.status = status;
        }
        self.touch();
        self.values.len()
    }

    pub fn set_notes(&mut self, member_id: &str, notes: Option<String>) -> bool {
        let Some(value) = self.values.get_mut(member_id) else {
            return false;
        };
        value.notes = notes.filter(|n| !n.trim().is_empty());
        self.touch();
        true
    }

    /// Marked entries in roster order. `unmarked` is omitted, never sent as a sentinel.
    pub fn snapshot_for_commit(&self) -> Vec<StatusValue> {
        self.entries()
            .filter(|v| v.status.is_marked())
            .cloned()
            .collect()
    }

    /// Records a successful commit of `snapshot` taken at `revision`. The set only becomes
    /// clean when nothing was edited after the snapshot was taken.
    pub fn mark_committed(&mut self, snapshot: &[StatusValue], revision: u64) {
        for value in snapshot {
            if self.baseline.contains_key(&value.member_id) {
                self.baseline.insert(value.member_id.clone(), value.clone());
            }
        }
        if self.revision == revision {
            self.dirty = false;
        }
    }

    /// Restores the last seeded or committed values.
    pub fn revert(&mut self) {
        self.values = self.baseline.clone();
        self.dirty = false;
        self.revision = self.revision.wrapping_add(1);
    }

    pub fn get(&self, member_id: &str) -> Option<&StatusValue> {
        self.values.get(member_id)
    }

    pub fn status_of(&self, member_id: &str) -> Option<AttendanceStatus> {
        self.values.get(member_id).map(|v| v.status)
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn entries(&self) -> impl Iterator<Item = &StatusValue> + '_ {
        self.members.iter().filter_map(|m| self.values.get(&m.id))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.revision = self.revision.wrapping_add(1);
    }
}
