//! stderr logging with a filter that can be swapped at runtime, so a workspace's
//! `logFilter` takes effect when the workspace is selected.

use anyhow::Context;
use std::io;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

pub type LogHandle = reload::Handle<EnvFilter, Registry>;

/// Installs the global subscriber. `None` if one was already installed.
pub fn init(filter: &str) -> Option<LogHandle> {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, handle) = reload::Layer::new(filter);
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_ansi(false))
        .try_init()
        .ok()
        .map(|_| handle)
}

pub fn apply(handle: &LogHandle, filter: &str) -> anyhow::Result<()> {
    let parsed = EnvFilter::try_new(filter).with_context(|| format!("bad log filter {filter:?}"))?;
    handle
        .reload(parsed)
        .with_context(|| format!("reload log filter {filter:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_swaps_the_active_filter() {
        let (_layer, handle) = reload::Layer::<EnvFilter, Registry>::new(EnvFilter::new("info"));
        apply(&handle, "rollcalld=debug").expect("reload");
        let current = handle.with_current(|f| f.to_string()).expect("current");
        assert_eq!(current, "rollcalld=debug");
    }

    #[test]
    fn apply_rejects_unparseable_filter_and_keeps_the_old_one() {
        let (_layer, handle) = reload::Layer::<EnvFilter, Registry>::new(EnvFilter::new("warn"));
        assert!(apply(&handle, "rollcalld=loud").is_err());
        let current = handle.with_current(|f| f.to_string()).expect("current");
        assert_eq!(current, "warn");
    }
}
