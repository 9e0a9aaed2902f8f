//! Per-job state shared by every plugin invocation of that job

use crate::error::{WorkerError, WorkerResult};
use crate::output::{OutputSink, SecretMasker};
use agent_plugin_core::{RepositoryResource, ServiceEndpoint, VariableValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Variables, resources and output of a running job
#[derive(Clone)]
pub struct JobContext {
    variables: HashMap<String, String>,
    secret_variables: HashMap<String, String>,
    task_variables: HashMap<String, VariableValue>,
    endpoints: Vec<ServiceEndpoint>,
    repositories: Vec<RepositoryResource>,
    output: Arc<dyn OutputSink>,
    masker: Arc<SecretMasker>,
    cancel: CancellationToken,
    async_commands: AsyncCommandTracker,
}

impl JobContext {
    pub fn new(output: Arc<dyn OutputSink>, cancel: CancellationToken) -> Self {
        Self {
            variables: HashMap::new(),
            secret_variables: HashMap::new(),
            task_variables: HashMap::new(),
            endpoints: Vec::new(),
            repositories: Vec::new(),
            output,
            masker: Arc::new(SecretMasker::new()),
            cancel,
            async_commands: AsyncCommandTracker::default(),
        }
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Adds a private variable; its value is masked in job output from now on
    pub fn secret_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        self.masker.add(&value);
        self.secret_variables.insert(name.into(), value);
        self
    }

    pub fn task_variable(mut self, name: impl Into<String>, value: VariableValue) -> Self {
        if value.secret {
            self.masker.add(&value.value);
        }
        self.task_variables.insert(name.into(), value);
        self
    }

    pub fn endpoint(mut self, endpoint: ServiceEndpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    pub fn repository(mut self, repository: RepositoryResource) -> Self {
        self.repositories.push(repository);
        self
    }

    /// Public and private variables merged; a private value wins a name clash
    pub fn variables_snapshot(&self) -> HashMap<String, VariableValue> {
        let public = self
            .variables
            .iter()
            .map(|(name, value)| (name.clone(), VariableValue::public(value.clone())));
        let private = self
            .secret_variables
            .iter()
            .map(|(name, value)| (name.clone(), VariableValue::secret(value.clone())));
        public.chain(private).collect()
    }

    pub fn task_variables(&self) -> &HashMap<String, VariableValue> {
        &self.task_variables
    }

    pub fn endpoints(&self) -> &[ServiceEndpoint] {
        &self.endpoints
    }

    pub fn repositories(&self) -> &[RepositoryResource] {
        &self.repositories
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn masker(&self) -> &Arc<SecretMasker> {
        &self.masker
    }

    pub fn output(&self) -> &Arc<dyn OutputSink> {
        &self.output
    }

    /// Write a line to the job log with secrets masked
    pub fn write_line(&self, line: &str) {
        self.output.write_line(&self.masker.mask(line));
    }

    pub fn async_commands(&self) -> &AsyncCommandTracker {
        &self.async_commands
    }
}

struct AsyncCommand {
    name: String,
    handle: JoinHandle<WorkerResult<()>>,
}

/// Background command plugin runs that must finish before the job does
#[derive(Clone, Default)]
pub struct AsyncCommandTracker {
    pending: Arc<Mutex<Vec<AsyncCommand>>>,
}

impl AsyncCommandTracker {
    pub fn track(&self, name: impl Into<String>, handle: JoinHandle<WorkerResult<()>>) {
        let name = name.into();
        debug!(command = %name, "Tracking asynchronous command");
        self.lock().push(AsyncCommand { name, handle });
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Await every tracked command, logging each failure
    pub async fn join_all(&self) -> WorkerResult<()> {
        let commands = std::mem::take(&mut *self.lock());
        let mut failed = 0;

        for command in commands {
            match command.handle.await {
                Ok(Ok(())) => debug!(command = %command.name, "Asynchronous command completed"),
                Ok(Err(e)) => {
                    error!(command = %command.name, error = %e, "Asynchronous command failed");
                    failed += 1;
                }
                Err(e) => {
                    error!(
                        command = %command.name,
                        error = %e,
                        "Asynchronous command did not finish"
                    );
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            Err(WorkerError::AsyncCommandsFailed { failed })
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AsyncCommand>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
