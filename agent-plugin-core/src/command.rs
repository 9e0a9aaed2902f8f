//! Logging commands embedded in plugin output
//!
//! A logging command is a line of the form
//! `##vso[area.event key=value;key=value;]message`. Property values and the
//! message are percent-escaped so they survive line-oriented transport.

use std::collections::BTreeMap;
use std::fmt;

pub const COMMAND_PREFIX: &str = "##vso[";

/// Prefix for echoing a command line that is about to run
pub const COMMAND_ECHO_PREFIX: &str = "##[command]";

const PROPERTY_ESCAPES: &[(&str, &str)] = &[
    (";", "%3B"),
    ("\r", "%0D"),
    ("\n", "%0A"),
    ("]", "%5D"),
];

const DATA_ESCAPES: &[(&str, &str)] = &[("\r", "%0D"), ("\n", "%0A")];

fn escape(value: &str, table: &[(&str, &str)]) -> String {
    let mut escaped = value.replace('%', "%25");
    for (raw, code) in table {
        escaped = escaped.replace(raw, code);
    }
    escaped
}

fn unescape(value: &str, table: &[(&str, &str)]) -> String {
    let mut raw = value.to_string();
    for (plain, code) in table {
        raw = raw.replace(code, plain);
    }
    raw.replace("%25", "%")
}

pub fn escape_property(value: &str) -> String {
    escape(value, PROPERTY_ESCAPES)
}

pub fn unescape_property(value: &str) -> String {
    unescape(value, PROPERTY_ESCAPES)
}

pub fn escape_data(value: &str) -> String {
    escape(value, DATA_ESCAPES)
}

pub fn unescape_data(value: &str) -> String {
    unescape(value, DATA_ESCAPES)
}

/// A parsed logging command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCommand {
    pub area: String,
    pub event: String,
    pub properties: BTreeMap<String, String>,
    pub data: String,
}

impl LogCommand {
    pub fn new(area: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            area: area.into(),
            event: event.into(),
            properties: BTreeMap::new(),
            data: String::new(),
        }
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }

    /// Lower-cased `area.event`, the dispatch key for command plugins
    pub fn key(&self) -> String {
        format!("{}.{}", self.area, self.event).to_lowercase()
    }

    pub fn get_property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Parse the first logging command found in `line`.
    ///
    /// Returns `None` for ordinary output.
    pub fn parse(line: &str) -> Option<Self> {
        let start = line.find(COMMAND_PREFIX)?;
        let rest = &line[start + COMMAND_PREFIX.len()..];
        let end = rest.find(']')?;
        let info = &rest[..end];
        let data = &rest[end + 1..];

        let split = info.find([' ', ';']).unwrap_or(info.len());
        let (name, props) = info.split_at(split);
        let (area, event) = name.split_once('.')?;
        if area.is_empty() || event.is_empty() || event.contains('.') {
            return None;
        }

        let mut command = LogCommand::new(area, event).data(unescape_data(data));
        for pair in props.split(';') {
            let pair = pair.trim();
            if let Some((key, value)) = pair.split_once('=') {
                let key = key.trim();
                if !key.is_empty() {
                    command
                        .properties
                        .insert(key.to_string(), unescape_property(value));
                }
            }
        }

        Some(command)
    }
}

impl fmt::Display for LogCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}.{}", COMMAND_PREFIX, self.area, self.event)?;
        if !self.properties.is_empty() {
            f.write_str(" ")?;
            for (key, value) in &self.properties {
                write!(f, "{}={};", key, escape_property(value))?;
            }
        }
        write!(f, "]{}", escape_data(&self.data))
    }
}
