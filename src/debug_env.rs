//! `EGALITO_DEBUG` parsing and the custom [`log::Log`] it installs
//! (SPEC_FULL.md §B). A comma-separated `group=level` list (spec.md §6)
//! controls per-group verbosity; `target()`'s crate-relative module path
//! prefix (e.g. `etelf::pass::jump_table` -> `jump_table`) is the group
//! key. Groups with no explicit entry fall back to a single default level
//! set by `-v`/`-q`.

use std::collections::HashMap;
use std::sync::OnceLock;

use log::{LevelFilter, Log, Metadata, Record};

/// A malformed `EGALITO_DEBUG` entry (spec.md §6: exit code 1).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid EGALITO_DEBUG entry {entry:?}: {reason}")]
pub struct DebugEnvError {
    pub entry: String,
    pub reason: String,
}

/// Per-group level filters parsed from `EGALITO_DEBUG`, plus the default
/// applied to any group with no explicit entry.
#[derive(Debug, Clone, Default)]
pub struct DebugSettings {
    groups: HashMap<String, LevelFilter>,
    default_level: LevelFilter,
}

impl DebugSettings {
    pub fn new(default_level: LevelFilter) -> Self {
        Self {
            groups: HashMap::new(),
            default_level,
        }
    }

    /// Parses a raw `EGALITO_DEBUG` value (`"group=level,group2=level2"`).
    /// An empty segment is skipped (tolerates a trailing comma); a segment
    /// missing `=`, an empty group name, or an unrecognized level name is a
    /// hard error.
    pub fn parse(raw: &str, default_level: LevelFilter) -> Result<Self, DebugEnvError> {
        let mut groups = HashMap::new();
        for entry in raw.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (group, level) = entry.split_once('=').ok_or_else(|| DebugEnvError {
                entry: entry.to_string(),
                reason: "expected `group=level`".to_string(),
            })?;
            if group.is_empty() {
                return Err(DebugEnvError {
                    entry: entry.to_string(),
                    reason: "empty group name".to_string(),
                });
            }
            let level = parse_level(level).ok_or_else(|| DebugEnvError {
                entry: entry.to_string(),
                reason: format!("unknown level {level:?}"),
            })?;
            groups.insert(group.to_string(), level);
        }
        Ok(Self { groups, default_level })
    }

    /// Reads `EGALITO_DEBUG` from the process environment, if set.
    pub fn from_env(default_level: LevelFilter) -> Result<Self, DebugEnvError> {
        match std::env::var("EGALITO_DEBUG") {
            Ok(raw) => Self::parse(&raw, default_level),
            Err(_) => Ok(Self::new(default_level)),
        }
    }

    fn level_for(&self, target: &str) -> LevelFilter {
        let group = target.split("::").last().unwrap_or(target);
        self.groups.get(group).copied().unwrap_or(self.default_level)
    }
}

fn parse_level(s: &str) -> Option<LevelFilter> {
    match s.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

struct GroupFilteredLogger {
    settings: DebugSettings,
}

impl Log for GroupFilteredLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.settings.level_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "[{}][{}] {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<GroupFilteredLogger> = OnceLock::new();

/// Installs `settings` as the global `log` backend. Call once, from
/// `main`; subsequent calls are no-ops (mirrors `env_logger::init`'s
/// at-most-once semantics).
pub fn install(settings: DebugSettings) {
    let max = settings
        .groups
        .values()
        .copied()
        .fold(settings.default_level, std::cmp::max);
    let logger = LOGGER.get_or_init(|| GroupFilteredLogger { settings });
    log::set_max_level(max);
    let _ = log::set_logger(logger);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_group_level_pairs() {
        let settings = DebugSettings::parse("jump_table=debug,shadow_stack=trace", LevelFilter::Warn).unwrap();
        assert_eq!(settings.level_for("etelf::pass::jump_table"), LevelFilter::Debug);
        assert_eq!(settings.level_for("etelf::pass::shadow_stack"), LevelFilter::Trace);
    }

    #[test]
    fn unlisted_group_falls_back_to_default() {
        let settings = DebugSettings::parse("jump_table=debug", LevelFilter::Warn).unwrap();
        assert_eq!(settings.level_for("etelf::pass::fix_environ"), LevelFilter::Warn);
    }

    #[test]
    fn tolerates_a_trailing_comma() {
        let settings = DebugSettings::parse("jump_table=info,", LevelFilter::Warn).unwrap();
        assert_eq!(settings.level_for("etelf::pass::jump_table"), LevelFilter::Info);
    }

    #[test]
    fn unknown_level_name_is_a_hard_error() {
        assert!(DebugSettings::parse("jump_table=verbose", LevelFilter::Warn).is_err());
    }

    #[test]
    fn missing_equals_sign_is_a_hard_error() {
        assert!(DebugSettings::parse("jump_table", LevelFilter::Warn).is_err());
    }

    #[test]
    fn empty_group_name_is_a_hard_error() {
        assert!(DebugSettings::parse("=debug", LevelFilter::Warn).is_err());
    }
}
