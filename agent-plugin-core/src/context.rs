//! Execution contexts passed to plugin processes on standard input
//!
//! Both contexts travel as a single JSON line with PascalCase keys. Missing
//! collections deserialize as empty; variable lookups ignore case.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A job variable and whether it must be treated as a secret
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableValue {
    pub value: String,
    #[serde(default)]
    pub secret: bool,
}

impl VariableValue {
    pub fn new(value: impl Into<String>, secret: bool) -> Self {
        Self {
            value: value.into(),
            secret,
        }
    }

    pub fn public(value: impl Into<String>) -> Self {
        Self::new(value, false)
    }

    pub fn secret(value: impl Into<String>) -> Self {
        Self::new(value, true)
    }
}

/// Task stage a plugin is invoked for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Pre,
    #[default]
    Main,
    Post,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Pre => write!(f, "pre"),
            Stage::Main => write!(f, "main"),
            Stage::Post => write!(f, "post"),
        }
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pre" => Ok(Stage::Pre),
            "main" => Ok(Stage::Main),
            "post" => Ok(Stage::Post),
            _ => Err(format!("Invalid stage: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointAuthorization {
    pub scheme: String,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

/// Connection to an external service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceEndpoint {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "Type")]
    pub endpoint_type: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<EndpointAuthorization>,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

/// Source repository available to the job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RepositoryResource {
    pub alias: String,
    #[serde(default)]
    pub id: String,
    #[serde(rename = "Type")]
    pub repository_type: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, rename = "Ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

/// Context handed to a task plugin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskPluginExecutionContext {
    #[serde(default)]
    pub inputs: HashMap<String, String>,
    #[serde(default)]
    pub stage: Stage,
    #[serde(default)]
    pub repositories: Vec<RepositoryResource>,
    #[serde(default)]
    pub endpoints: Vec<ServiceEndpoint>,
    #[serde(default)]
    pub variables: HashMap<String, VariableValue>,
    #[serde(default)]
    pub task_variables: HashMap<String, VariableValue>,
}

/// Context handed to a command plugin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommandPluginExecutionContext {
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    #[serde(default)]
    pub endpoints: Vec<ServiceEndpoint>,
    #[serde(default)]
    pub variables: HashMap<String, VariableValue>,
}

/// Case-insensitive lookup, exact match first
pub fn lookup_ignore_case<'a, V>(map: &'a HashMap<String, V>, name: &str) -> Option<&'a V> {
    map.get(name).or_else(|| {
        map.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

impl TaskPluginExecutionContext {
    pub fn input(&self, name: &str) -> Option<&str> {
        lookup_ignore_case(&self.inputs, name).map(String::as_str)
    }

    pub fn variable(&self, name: &str) -> Option<&VariableValue> {
        lookup_ignore_case(&self.variables, name)
    }

    pub fn task_variable(&self, name: &str) -> Option<&VariableValue> {
        lookup_ignore_case(&self.task_variables, name)
    }

    pub fn repository(&self, alias: &str) -> Option<&RepositoryResource> {
        self.repositories
            .iter()
            .find(|repo| repo.alias.eq_ignore_ascii_case(alias))
    }

    pub fn endpoint(&self, name: &str) -> Option<&ServiceEndpoint> {
        self.endpoints
            .iter()
            .find(|ep| ep.name.eq_ignore_ascii_case(name))
    }
}

impl CommandPluginExecutionContext {
    pub fn property(&self, name: &str) -> Option<&str> {
        lookup_ignore_case(&self.properties, name).map(String::as_str)
    }

    pub fn variable(&self, name: &str) -> Option<&VariableValue> {
        lookup_ignore_case(&self.variables, name)
    }
}
