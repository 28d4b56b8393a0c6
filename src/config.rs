use crate::error::{DigestError, Result};
use crate::ledger::DEFAULT_LEDGER_KEY;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

pub const RECIPIENTS_ENV: &str = "SHEET_DIGEST_RECIPIENTS";
pub const SMTP_PASSWORD_ENV: &str = "SHEET_DIGEST_SMTP_PASSWORD";

/// Outgoing mail relay settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    /// Usually supplied through `SHEET_DIGEST_SMTP_PASSWORD` instead of the file.
    #[serde(default)]
    pub password: String,
    pub from: String,
}

/// Everything a scheduled digest run needs to know.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default = "default_ledger_key")]
    pub ledger_key: String,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

fn default_smtp_port() -> u16 {
    465
}

fn default_ledger_key() -> String {
    DEFAULT_LEDGER_KEY.to_string()
}

fn default_subject_prefix() -> String {
    "Spreadsheet changes".to_string()
}

impl Default for DigestConfig {
    fn default() -> Self {
        DigestConfig {
            ledger_key: default_ledger_key(),
            subject_prefix: default_subject_prefix(),
            recipients: Vec::new(),
            smtp: None,
        }
    }
}

impl DigestConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DigestError::Config(e.to_string()))
    }

    /// Load from a JSON file, apply environment overrides, then validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| DigestError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config = Self::from_json(&text)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// `SHEET_DIGEST_RECIPIENTS` (comma separated) replaces the recipient
    /// list; `SHEET_DIGEST_SMTP_PASSWORD` sets the relay password.
    pub fn apply_env(&mut self) {
        if let Ok(list) = env::var(RECIPIENTS_ENV) {
            self.recipients = parse_recipients(&list);
        }
        if let (Ok(password), Some(smtp)) = (env::var(SMTP_PASSWORD_ENV), self.smtp.as_mut()) {
            smtp.password = password;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ledger_key.is_empty() {
            return Err(DigestError::Config("ledger_key cannot be empty".to_string()));
        }
        if self.recipients.is_empty() {
            return Err(DigestError::Config("no recipients configured".to_string()));
        }
        if let Some(bad) = self.recipients.iter().find(|r| !r.contains('@')) {
            return Err(DigestError::Config(format!("invalid recipient '{}'", bad)));
        }
        Ok(())
    }
}

pub fn parse_recipients(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}
