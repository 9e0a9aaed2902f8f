//! Description of a single process invocation

use std::collections::HashMap;
use std::path::PathBuf;

/// How output bytes are decoded into lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputEncoding {
    /// UTF-8, invalid sequences replaced
    #[default]
    Utf8,
    /// ISO-8859-1, every byte maps to one char
    Latin1,
}

impl OutputEncoding {
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            OutputEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            OutputEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

/// Everything needed to start one external process
#[derive(Debug, Clone, Default)]
pub struct ProcessSpec {
    pub program: PathBuf,
    /// Single argument string, split with shell-word rules on unix
    pub arguments: String,
    pub working_directory: Option<PathBuf>,
    /// Overlaid on the inherited environment
    pub environment: HashMap<String, String>,
    pub require_exit_code_zero: bool,
    pub kill_on_cancel: bool,
    pub output_encoding: OutputEncoding,
    /// Written to standard input, one per line, before stdin is closed
    pub contents_to_standard_in: Option<Vec<String>>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = arguments.into();
        self
    }

    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, vars: HashMap<String, String>) -> Self {
        self.environment.extend(vars);
        self
    }

    pub fn require_exit_code_zero(mut self, require: bool) -> Self {
        self.require_exit_code_zero = require;
        self
    }

    pub fn kill_on_cancel(mut self, kill: bool) -> Self {
        self.kill_on_cancel = kill;
        self
    }

    pub fn output_encoding(mut self, encoding: OutputEncoding) -> Self {
        self.output_encoding = encoding;
        self
    }

    pub fn stdin_line(mut self, line: impl Into<String>) -> Self {
        self.contents_to_standard_in
            .get_or_insert_with(Vec::new)
            .push(line.into());
        self
    }

    /// Split the argument string into argv entries
    pub fn split_arguments(&self) -> Option<Vec<String>> {
        shlex::split(&self.arguments)
    }

    pub fn program_display(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}
