use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    /// No ledger row. Never written to the ledger.
    #[default]
    Unmarked,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
            Self::Unmarked => "unmarked",
        }
    }

    pub fn is_marked(&self) -> bool {
        *self != Self::Unmarked
    }

    /// Present and late both count towards a member's attendance percentage.
    pub fn counts_as_attended(&self) -> bool {
        matches!(self, Self::Present | Self::Late)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            "late" => Ok(Self::Late),
            "unmarked" | "" => Ok(Self::Unmarked),
            other => Err(EngineError::validation(format!(
                "status must be one of: present, absent, late, unmarked (got {})",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusValue {
    pub member_id: String,
    pub status: AttendanceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl StatusValue {
    pub fn unmarked(member_id: impl Into<String>) -> Self {
        Self {
            member_id: member_id.into(),
            status: AttendanceStatus::Unmarked,
            notes: None,
        }
    }
}
