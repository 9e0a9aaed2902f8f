//! Destinations for plugin output lines

use std::sync::{Mutex, RwLock};

/// Receives output lines, one at a time
pub trait OutputSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Keeps every line in memory
#[derive(Default)]
pub struct CollectingSink {
    lines: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl OutputSink for CollectingSink {
    fn write_line(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

pub const MASK: &str = "***";

/// Replaces registered secret values in output
#[derive(Default)]
pub struct SecretMasker {
    secrets: RwLock<Vec<String>>,
}

impl SecretMasker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, secret: &str) {
        let secret = secret.trim();
        if secret.is_empty() {
            return;
        }
        if let Ok(mut secrets) = self.secrets.write() {
            if !secrets.iter().any(|s| s == secret) {
                secrets.push(secret.to_string());
                // longest first so a secret containing another is masked whole
                secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
            }
        }
    }

    pub fn mask(&self, line: &str) -> String {
        let Ok(secrets) = self.secrets.read() else {
            return line.to_string();
        };
        secrets
            .iter()
            .fold(line.to_string(), |masked, secret| masked.replace(secret.as_str(), MASK))
    }
}
