//! Properties-file configuration.
//!
//! Both the ingestion daemon and the query tools read flat `key=value`
//! properties files: `#`-prefixed comments and blank lines are ignored,
//! surrounding double quotes are stripped, and a value that begins with `=`
//! has that leading character removed (a quirk of how some deployments quote
//! URLs).

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// Default number of log entries per ingest batch.
pub const DEFAULT_BATCH_SIZE: usize = 30_000;

/// Default number of delivery attempts per batch.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// A parsed `key=value` properties file.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    values: HashMap<String, String>,
}

impl Properties {
    /// Read and parse a properties file.
    pub fn load(path: &Path) -> Result<Properties> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(Properties::parse(&content))
    }

    /// Parse properties from text. Lines without a `=` are ignored.
    pub fn parse(content: &str) -> Properties {
        let mut values = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            values.insert(key.trim().to_string(), clean_value(value).to_string());
        }
        Properties { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Insert or override a value; used for CLI flag overrides.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    fn require(&self, key: &str) -> Result<String> {
        self.get(key)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::Config(format!("missing required key {key}")))
    }
}

fn clean_value(raw: &str) -> &str {
    let value = raw.trim().trim_matches('"');
    value.strip_prefix('=').unwrap_or(value)
}

/// Settings for the ingestion daemon (`src2index.properties`).
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Absolute path of the tailed log file.
    pub log_file_path: String,

    /// Base URL of the Quickwit server.
    pub quickwit_url: String,

    pub username: String,
    pub password: String,

    /// Entries per ingest batch.
    pub batch_size: usize,

    /// Delivery attempts per batch before giving up.
    pub max_retries: u32,
}

impl IngestSettings {
    /// Build settings from parsed properties, applying defaults and
    /// validating required keys. Malformed numeric values fall back to the
    /// defaults.
    pub fn from_properties(props: &Properties) -> Result<IngestSettings> {
        Ok(IngestSettings {
            log_file_path: props.require("logFilePath")?,
            quickwit_url: props.require("quickwitURL")?,
            username: props.require("username")?,
            password: props.require("password")?,
            batch_size: props
                .get("batchSize")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_BATCH_SIZE),
            max_retries: props
                .get("maxRetries")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_RETRIES),
        })
    }
}

/// Credentials for the query-side tools (`qw-auth.properties`).
#[derive(Debug, Clone)]
pub struct QuickwitAuth {
    pub user: String,
    pub pass: String,

    /// Base URL of the Quickwit server.
    pub url: String,
}

impl QuickwitAuth {
    pub fn load(path: &Path) -> Result<QuickwitAuth> {
        QuickwitAuth::from_properties(&Properties::load(path)?)
    }

    pub fn from_properties(props: &Properties) -> Result<QuickwitAuth> {
        Ok(QuickwitAuth {
            user: props.require("QW_USER")?,
            pass: props.require("QW_PASS")?,
            url: props.require("QW_URL")?,
        })
    }
}
