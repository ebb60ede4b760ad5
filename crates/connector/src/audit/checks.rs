//! Individual audit checks.
//!
//! Each check takes already-collected host facts and returns the messages it
//! produced plus whether it gates the aggregate result.

use std::collections::{HashMap, HashSet};

use serde_json::Value as JsonValue;

use checkout_pos_core::AuditSeverity;

use super::AuditEntry;
use super::config::{AuditConfig, IniRequirement, OptionRequirement};

const BYTES_PER_MB: i64 = 1024 * 1024;

/// Result of one check category.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CheckOutcome {
    pub passed: bool,
    pub entries: Vec<AuditEntry>,
}

impl CheckOutcome {
    fn passing() -> Self {
        Self {
            passed: true,
            entries: Vec::new(),
        }
    }

    fn record(&mut self, severity: AuditSeverity, message: String) {
        if severity == AuditSeverity::Error {
            self.passed = false;
        }
        self.entries.push(AuditEntry { severity, message });
    }
}

/// Parse a PHP shorthand byte value (`"128M"`, `"1g"`, `"512k"`, `"1048576"`).
#[must_use]
pub fn parse_shorthand_bytes(value: &str) -> Option<i64> {
    let value = value.trim();
    let last = value.chars().last()?;
    let multiplier = match last.to_ascii_lowercase() {
        'g' => 1024 * 1024 * 1024,
        'm' => 1024 * 1024,
        'k' => 1024,
        _ => 1,
    };
    let digits = if multiplier == 1 {
        value
    } else {
        &value[..value.len() - last.len_utf8()]
    };
    digits.trim().parse::<i64>().ok()?.checked_mul(multiplier)
}

/// Minimum PHP ini settings.
///
/// A missing, empty, or `"0"` value counts as not set.
#[must_use]
pub fn check_ini_params(
    requirements: &[IniRequirement],
    values: &HashMap<String, String>,
) -> CheckOutcome {
    let mut outcome = CheckOutcome::passing();

    for requirement in requirements {
        let name = requirement.name.as_str();
        let limit = requirement.limit;
        let Some(value) = values
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty() && *v != "0")
        else {
            outcome.record(
                AuditSeverity::Error,
                format!("System variable not set: {name}"),
            );
            continue;
        };

        match name {
            "memory_limit" => {
                let bytes = parse_shorthand_bytes(value);
                // -1 is PHP's "no limit".
                let sufficient = bytes
                    .is_some_and(|b| b == -1 || b >= limit.saturating_mul(BYTES_PER_MB));
                if !sufficient {
                    outcome.record(
                        AuditSeverity::Error,
                        format!("System memory limit insufficient (< {limit} MB): {value}"),
                    );
                }
            }
            "max_execution_time" => {
                if value.parse::<i64>().unwrap_or(0) < limit {
                    outcome.record(
                        AuditSeverity::Error,
                        format!("Max execution time limit insufficient (< {limit}s): {value}"),
                    );
                }
            }
            _ => {
                if parse_shorthand_bytes(value).unwrap_or(0) < limit {
                    outcome.record(
                        AuditSeverity::Error,
                        format!("System variable {name} insufficient (< {limit}): {value}"),
                    );
                }
            }
        }
    }

    outcome
}

fn scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(true) => Some("1".to_string()),
        JsonValue::Bool(false) | JsonValue::Null => Some(String::new()),
        JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

/// Loose comparison: `"1"` matches `1`, `true` matches `"1"`.
fn loosely_equal(actual: &JsonValue, expected: &JsonValue) -> bool {
    if actual == expected {
        return true;
    }
    match (scalar_text(actual), scalar_text(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Required store option values.
///
/// A mismatch on a `warn_only` option is a warning and never fails the
/// check, whatever order the options come in.
#[must_use]
pub fn check_options(
    requirements: &[OptionRequirement],
    values: &HashMap<String, JsonValue>,
) -> CheckOutcome {
    let mut outcome = CheckOutcome::passing();

    for requirement in requirements {
        let actual = values.get(&requirement.name).unwrap_or(&JsonValue::Null);
        if loosely_equal(actual, &requirement.value) {
            continue;
        }

        let expected = scalar_text(&requirement.value).unwrap_or_else(|| requirement.value.to_string());
        let message = match &requirement.path {
            Some(path) => format!("{} must be set to {expected} ({path})", requirement.gui_name),
            None => format!("{} must be set to {expected}", requirement.gui_name),
        };
        let severity = if requirement.warn_only {
            AuditSeverity::Warning
        } else {
            AuditSeverity::Error
        };
        outcome.record(severity, message);
    }

    outcome
}

/// Plugins that must be installed and active.
#[must_use]
pub fn check_mandatory_plugins(config: &AuditConfig, active: &HashSet<String>) -> CheckOutcome {
    let mut outcome = CheckOutcome::passing();
    let mut seen = HashSet::new();

    for plugin in &config.mandatory_plugins {
        if seen.insert(plugin.as_str()) && !active.contains(plugin) {
            outcome.record(
                AuditSeverity::Error,
                format!(
                    "The following plugin needs to be installed and activated: {}",
                    config.plugin_display(plugin)
                ),
            );
        }
    }

    outcome
}

/// Plugins known to conflict with the connector.
///
/// With `pass_audit_on_warning` every active plugin is a warning and the
/// check passes. Otherwise each active plugin is an error on its own, so the
/// result does not depend on list order.
#[must_use]
pub fn check_incompatible_plugins(config: &AuditConfig, active: &HashSet<String>) -> CheckOutcome {
    let mut outcome = CheckOutcome::passing();
    let severity = if config.pass_audit_on_warning {
        AuditSeverity::Warning
    } else {
        AuditSeverity::Error
    };

    let mut seen = HashSet::new();
    for plugin in &config.incompatible_plugins {
        if !seen.insert(plugin.as_str()) || !active.contains(plugin) {
            continue;
        }
        let mut message = format!(
            "The following active plugin may be incompatible: {}",
            config.plugin_display(plugin)
        );
        if let Some(desc) = config
            .plugin_info(plugin)
            .and_then(|info| info.desc.as_deref())
            .filter(|desc| !desc.is_empty())
        {
            message.push_str(" - ");
            message.push_str(desc);
        }
        outcome.record(severity, message);
    }

    outcome
}
