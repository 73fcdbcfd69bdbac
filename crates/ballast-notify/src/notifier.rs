use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

/// Delivery channel for notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyMethod {
    Console,
    File,
    Webhook,
}

/// Message severity, included in webhook payloads and file lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

/// Notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_method")]
    pub method: NotifyMethod,
    /// Log file for the `file` method.
    #[serde(default = "default_file_path")]
    pub file_path: PathBuf,
    /// Target URL for the `webhook` method.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn default_method() -> NotifyMethod {
    NotifyMethod::Console
}

fn default_file_path() -> PathBuf {
    PathBuf::from("notifications.log")
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            method: default_method(),
            file_path: default_file_path(),
            webhook_url: None,
        }
    }
}

/// Best-effort notification sender.
#[derive(Debug, Clone)]
pub struct Notifier {
    config: NotifyConfig,
    http: reqwest::Client,
}

impl Notifier {
    pub fn new(config: NotifyConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Disabled notifier, for tests and dry runs.
    pub fn disabled() -> Self {
        Self::new(NotifyConfig::default())
    }

    /// Deliver one message. Never fails: delivery problems are logged
    /// as warnings and swallowed.
    pub async fn send(&self, severity: Severity, message: &str) {
        if !self.config.enabled {
            return;
        }
        match self.config.method {
            NotifyMethod::Console => {
                println!("[{}] {}", severity.as_str().to_uppercase(), message);
            }
            NotifyMethod::File => {
                if let Err(e) = self.append_to_file(severity, message) {
                    warn!(?e, "Failed to write notification file");
                }
            }
            NotifyMethod::Webhook => self.post_webhook(severity, message).await,
        }
        info!(severity = severity.as_str(), message, "Notification sent");
    }

    fn append_to_file(&self, severity: Severity, message: &str) -> std::io::Result<()> {
        if let Some(parent) = self.config.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.file_path)?;
        writeln!(
            file,
            "{} | {} | {}",
            Utc::now().to_rfc3339(),
            severity.as_str(),
            message
        )
    }

    async fn post_webhook(&self, severity: Severity, message: &str) {
        let Some(url) = &self.config.webhook_url else {
            warn!("Webhook notification configured without webhook_url");
            return;
        };
        let payload = serde_json::json!({
            "text": message,
            "severity": severity.as_str(),
        });
        match self.http.post(url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!(status = %response.status(), "Webhook notification rejected");
            }
            Err(e) => {
                warn!(?e, "Webhook notification failed");
            }
        }
    }
}
