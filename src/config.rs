use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

pub const SETTINGS_FILE_NAME: &str = "rollcall.json";
pub const PAGE_SIZE_ENV: &str = "ROLLCALL_PAGE_SIZE";
pub const LOG_ENV: &str = "ROLLCALL_LOG";

const MAX_PAGE_SIZE: u32 = 500;
const MAX_EDITABLE_WINDOW_DAYS: i64 = 36_500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Members per roster page. Fixed for the life of a view.
    pub page_size: u32,
    /// Commits are accepted for `[today - n, today]` only. No limit when absent.
    pub editable_window_days: Option<i64>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: 100,
            editable_window_days: None,
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn path_in(workspace: &Path) -> PathBuf {
        workspace.join(SETTINGS_FILE_NAME)
    }

    /// Reads `rollcall.json` from the workspace if present, then applies env overrides.
    pub fn load(workspace: &Path) -> anyhow::Result<Self> {
        let path = Self::path_in(workspace);
        let mut settings = if path.is_file() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("read {}", path.display()))?;
            serde_json::from_str::<Settings>(&raw)
                .with_context(|| format!("parse {}", path.display()))?
        } else {
            Settings::default()
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(raw) = lookup(PAGE_SIZE_ENV) {
            self.page_size = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a positive integer", PAGE_SIZE_ENV))?;
        }
        if let Some(filter) = lookup(LOG_ENV) {
            if !filter.trim().is_empty() {
                self.log_filter = filter;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            bail!("pageSize must be in range 1..={}", MAX_PAGE_SIZE);
        }
        if let Some(days) = self.editable_window_days {
            if !(0..=MAX_EDITABLE_WINDOW_DAYS).contains(&days) {
                bail!(
                    "editableWindowDays must be in range 0..={}",
                    MAX_EDITABLE_WINDOW_DAYS
                );
            }
        }
        EnvFilter::try_new(&self.log_filter)
            .with_context(|| format!("logFilter {:?} is not a valid filter", self.log_filter))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let s: Settings = serde_json::from_str(r#"{ "editableWindowDays": 14 }"#).expect("parse");
        assert_eq!(s.page_size, 100);
        assert_eq!(s.editable_window_days, Some(14));
    }

    #[test]
    fn env_overrides_page_size() {
        let mut s = Settings::default();
        s.apply_env(|k| (k == PAGE_SIZE_ENV).then(|| "25".to_string()))
            .expect("apply");
        assert_eq!(s.page_size, 25);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_page_size() {
        let s = Settings {
            page_size: 0,
            ..Settings::default()
        };
        assert!(s.validate().is_err());
        let mut s = Settings::default();
        assert!(s
            .apply_env(|k| (k == PAGE_SIZE_ENV).then(|| "lots".to_string()))
            .is_err());
    }

    #[test]
    fn rejects_editable_window_beyond_a_century() {
        let s = Settings {
            editable_window_days: Some(i64::MAX / 2),
            ..Settings::default()
        };
        assert!(s.validate().is_err());
        let s = Settings {
            editable_window_days: Some(365),
            ..Settings::default()
        };
        assert!(s.validate().is_ok());
    }

    #[test]
    fn rejects_unparseable_log_filter() {
        let s: Settings =
            serde_json::from_str(r#"{ "logFilter": "rollcalld=loud" }"#).expect("parse");
        assert!(s.validate().is_err());
        let s: Settings =
            serde_json::from_str(r#"{ "logFilter": "rollcalld=debug" }"#).expect("parse");
        assert!(s.validate().is_ok());
    }
}
