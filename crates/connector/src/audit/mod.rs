//! System audit.
//!
//! Fetches the check list Checkout POS publishes for the current environment
//! and evaluates it against the host site. The audit never aborts: every
//! failure, including an unreachable config document, becomes a message.
//! Messages are kept for a few seconds so the page that follows an
//! activation can show them.

mod checks;
mod config;
mod host;
mod messages;

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::instrument;

use checkout_pos_core::{AuditSeverity, SyncTarget};

pub use checks::{
    CheckOutcome, check_incompatible_plugins, check_ini_params, check_mandatory_plugins,
    check_options, parse_shorthand_bytes,
};
pub use config::{AuditConfig, IniRequirement, OptionRequirement, PluginInfo};
pub use host::{HostEnvironment, HostReport, LocalizationSettings, StoredHostEnvironment};
pub use messages::{AUDIT_MESSAGE_TTL, AuditMessages};

use crate::db::{ConnectionRepository, RepositoryError};
use crate::db::options::get_string;
use crate::state::AppState;

pub const CONFIG_NOT_FOUND: &str = "System audit configuration file not found!";
pub const AUDIT_PASSED: &str = "System audit passed!";
pub const NOT_CONNECTED: &str =
    "Checkout POS connection is not active. Connect the plugin in the settings page.";
pub const QTRANSLATE_WARNING: &str = "qTranslate seems to be active. Enable \"Hide URL \
    language information for default language\" in Settings > Languages > General to avoid \
    issues with Checkout POS.";

/// One audit message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub severity: AuditSeverity,
    pub message: String,
}

/// Result of one audit run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub passed: bool,
    pub entries: Vec<AuditEntry>,
}

impl AuditReport {
    fn new() -> Self {
        Self {
            passed: true,
            entries: Vec::new(),
        }
    }

    fn push(&mut self, severity: AuditSeverity, message: impl Into<String>) {
        if severity == AuditSeverity::Error {
            self.passed = false;
        }
        self.entries.push(AuditEntry {
            severity,
            message: message.into(),
        });
    }

    fn absorb(&mut self, outcome: CheckOutcome) {
        self.passed &= outcome.passed;
        self.entries.extend(outcome.entries);
    }

    /// Messages of one severity, in recording order.
    pub fn messages(&self, severity: AuditSeverity) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |entry| entry.severity == severity)
            .map(|entry| entry.message.as_str())
    }
}

/// Runs the system audit against the shared state.
pub struct SystemAudit<'a> {
    state: &'a AppState,
}

impl<'a> SystemAudit<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Run every check and store the messages for display.
    #[instrument(skip(self))]
    pub async fn perform(&self) -> AuditReport {
        let store = self.state.audit_messages();
        store.clear().await;

        let mut report = AuditReport::new();
        let config_url = self.state.endpoints().system_audit_config_url;

        match self.state.pos().fetch_audit_config(&config_url).await {
            Ok(config) => self.run_checks(&config, &mut report).await,
            Err(e) => {
                tracing::warn!(url = %config_url, error = %e, "Could not load system audit configuration");
                report.push(AuditSeverity::Error, CONFIG_NOT_FOUND);
            }
        }

        if report.passed {
            report.push(AuditSeverity::Success, AUDIT_PASSED);
        }
        self.align_stock_sync().await;

        for entry in &report.entries {
            store.record(entry).await;
        }

        tracing::info!(
            passed = report.passed,
            errors = report.messages(AuditSeverity::Error).count(),
            warnings = report.messages(AuditSeverity::Warning).count(),
            "System audit finished"
        );
        report
    }

    /// Messages from the last run, errors first. Clears them.
    pub async fn take_report(&self) -> Vec<AuditEntry> {
        self.state.audit_messages().take().await
    }

    async fn run_checks(&self, config: &AuditConfig, report: &mut AuditReport) {
        self.check_connection(report).await;

        if !config.ini_params.is_empty() {
            match self.state.host().ini_values().await {
                Ok(values) => report.absorb(check_ini_params(&config.ini_params, &values)),
                Err(e) => Self::host_unreadable(report, "ini values", &e),
            }
        }

        if !config.wp_options.is_empty() {
            match self.option_values(config).await {
                Ok(values) => report.absorb(check_options(&config.wp_options, &values)),
                Err(e) => Self::host_unreadable(report, "options", &e),
            }
        }

        if let Some(url) = &config.target_url
            && let Err(e) = self.state.pos().probe(url).await
        {
            tracing::warn!(url = %url, error = %e, "Connectivity probe failed");
            report.push(AuditSeverity::Error, format!("Connection to {url} failed"));
        }

        if !config.mandatory_plugins.is_empty() || !config.incompatible_plugins.is_empty() {
            match self.state.host().active_plugins().await {
                Ok(active) => {
                    report.absorb(check_mandatory_plugins(config, &active));
                    report.absorb(check_incompatible_plugins(config, &active));
                }
                Err(e) => Self::host_unreadable(report, "active plugins", &e),
            }
        }

        match self.state.host().localization().await {
            Ok(Some(settings)) if settings.hide_default_language == Some(false) => {
                report.push(AuditSeverity::Warning, QTRANSLATE_WARNING);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Could not read localization settings"),
        }
    }

    /// Values for the required options. Host-reported values win; the
    /// connector's own settings fill in the `kis_*` names the host never
    /// reports.
    async fn option_values(
        &self,
        config: &AuditConfig,
    ) -> Result<HashMap<String, JsonValue>, RepositoryError> {
        let mut values = self.state.host().options().await?;
        for requirement in &config.wp_options {
            if values.contains_key(&requirement.name) {
                continue;
            }
            if let Some(value) = self.state.options().get(&requirement.name).await? {
                values.insert(requirement.name.clone(), value);
            }
        }
        Ok(values)
    }

    async fn check_connection(&self, report: &mut AuditReport) {
        let connected = ConnectionRepository::new(self.state.options())
            .load(self.state.users())
            .await
            .map(|state| state.is_connected)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Could not load connection state");
                false
            });
        if !connected {
            report.push(AuditSeverity::Warning, NOT_CONNECTED);
        }
    }

    fn host_unreadable(report: &mut AuditReport, what: &str, error: &RepositoryError) {
        tracing::error!(what, error = %error, "Could not read host facts for audit");
        report.push(
            AuditSeverity::Error,
            format!("System audit could not read the host {what}."),
        );
    }

    /// Products and stock always sync in the same direction.
    async fn align_stock_sync(&self) {
        let options = self.state.options();
        let product = match get_string(options, SyncTarget::Product.option_key()).await {
            Ok(Some(direction)) if !direction.is_empty() => direction,
            Ok(_) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read product sync direction");
                return;
            }
        };

        if let Err(e) = options
            .set(
                SyncTarget::Stock.option_key(),
                &serde_json::Value::String(product),
            )
            .await
        {
            tracing::warn!(error = %e, "Could not copy product sync direction to stock");
        }
    }
}
