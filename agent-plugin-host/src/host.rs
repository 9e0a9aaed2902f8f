//! Dispatch of one plugin invocation
//!
//! `ParseArgs -> ReadContext -> Dispatch -> Invoke -> Report`. Anything failing
//! before Invoke is an infrastructure error returned to the caller. Errors and
//! panics raised by the plugin itself are reported in-band through the
//! context's failure marker and the invocation still succeeds.

use crate::args::HostArgs;
use crate::error::HostError;
use agent_plugin_core::transport::{decode_context, read_context_line};
use agent_plugin_core::{
    CommandContext, CommandPluginExecutionContext, ContextOutput, PluginCatalog, PluginKind,
    PluginOutput, PluginResult, TaskContext, TaskPluginExecutionContext,
};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How the plugin itself finished, once it was invoked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginOutcome {
    Succeeded,
    /// Reported in-band; carries the failure message
    Failed(String),
}

pub struct PluginHost<'a> {
    catalog: &'a PluginCatalog,
    output: PluginOutput,
}

impl<'a> PluginHost<'a> {
    pub fn new(catalog: &'a PluginCatalog, output: PluginOutput) -> Self {
        Self { catalog, output }
    }

    pub async fn run<R>(
        &self,
        args: &HostArgs,
        input: &mut R,
        cancel: CancellationToken,
    ) -> Result<PluginOutcome, HostError>
    where
        R: AsyncBufRead + Unpin,
    {
        let kind: PluginKind = args.kind.parse()?;
        let type_ref = args.type_ref.trim();
        if type_ref.is_empty() {
            return Err(HostError::InvalidArguments(
                "plugin type reference is empty".to_string(),
            ));
        }

        let line = read_context_line(input).await?;
        debug!(%kind, type_ref, bytes = line.len(), "Read execution context");

        match kind {
            PluginKind::Task => {
                let execution: TaskPluginExecutionContext = decode_context(&line)?;
                let plugin = self.catalog.create_task(type_ref)?;
                let context = TaskContext::new(execution, self.output.clone());
                info!(type_ref, stage = %context.stage(), "Running task plugin");

                let result = AssertUnwindSafe(plugin.run(&context, cancel))
                    .catch_unwind()
                    .await;
                Ok(report(&context, result))
            }
            PluginKind::Command => {
                let execution: CommandPluginExecutionContext = decode_context(&line)?;
                let plugin = self.catalog.create_command(type_ref)?;
                let context = CommandContext::new(execution, self.output.clone());
                info!(type_ref, "Running command plugin");

                let result = AssertUnwindSafe(plugin.process(&context, cancel))
                    .catch_unwind()
                    .await;
                Ok(report(&context, result))
            }
        }
    }
}

fn report(
    context: &impl ContextOutput,
    result: Result<PluginResult<()>, Box<dyn Any + Send>>,
) -> PluginOutcome {
    let message = match result {
        Ok(Ok(())) => {
            info!("Plugin completed");
            return PluginOutcome::Succeeded;
        }
        Ok(Err(e)) => e.to_string(),
        Err(payload) => format!("Plugin panicked: {}", panic_message(payload.as_ref())),
    };

    warn!(error = %message, "Plugin failed");
    context.fail(&message);
    PluginOutcome::Failed(message)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_plugin_core::{
        CapturedOutput, CommandPlugin, CommandPluginDescriptor, PluginError, TaskPlugin,
        TaskPluginDescriptor,
    };
    use async_trait::async_trait;
    use tokio::io::BufReader;

    const OK_TASK: &str = "11111111-1111-1111-1111-111111111111";
    const FAILING_TASK: &str = "22222222-2222-2222-2222-222222222222";
    const PANICKING_TASK: &str = "33333333-3333-3333-3333-333333333333";

    struct Greeter;
    struct Failing;
    struct Panicking;

    #[async_trait]
    impl TaskPlugin for Greeter {
        async fn run(&self, ctx: &TaskContext, _: CancellationToken) -> PluginResult<()> {
            ctx.output(&format!("hello {}", ctx.input("name").unwrap_or("nobody")));
            Ok(())
        }
    }

    #[async_trait]
    impl TaskPlugin for Failing {
        async fn run(&self, _: &TaskContext, _: CancellationToken) -> PluginResult<()> {
            Err(PluginError::execution_error("Failing", "disk full"))
        }
    }

    #[async_trait]
    impl TaskPlugin for Panicking {
        async fn run(&self, _: &TaskContext, _: CancellationToken) -> PluginResult<()> {
            panic!("boom");
        }
    }

    #[async_trait]
    impl CommandPlugin for Failing {
        async fn process(&self, _: &CommandContext, _: CancellationToken) -> PluginResult<()> {
            Err(PluginError::execution_error("Failing", "rejected"))
        }
    }

    fn catalog() -> PluginCatalog {
        let id = |s: &str| -> uuid::Uuid { s.parse().unwrap() };
        PluginCatalog::builder()
            .task(TaskPluginDescriptor::new(id(OK_TASK), "1.0.0", "Greeter"), || {
                Box::new(Greeter)
            })
            .task(
                TaskPluginDescriptor::new(id(FAILING_TASK), "1.0.0", "Failing"),
                || Box::new(Failing),
            )
            .task(
                TaskPluginDescriptor::new(id(PANICKING_TASK), "1.0.0", "Panicking"),
                || Box::new(Panicking),
            )
            .command(CommandPluginDescriptor::new("test", "fail", "Fail"), || {
                Box::new(Failing)
            })
            .build()
            .unwrap()
    }

    async fn invoke(
        kind: &str,
        type_ref: &str,
        stdin: &'static str,
    ) -> (Result<PluginOutcome, HostError>, CapturedOutput) {
        let catalog = catalog();
        let (output, captured) = PluginOutput::captured();
        let host = PluginHost::new(&catalog, output);
        let mut input = BufReader::new(stdin.as_bytes());
        let result = host
            .run(
                &HostArgs::new(kind, type_ref),
                &mut input,
                CancellationToken::new(),
            )
            .await;
        (result, captured)
    }

    #[tokio::test]
    async fn test_successful_task() {
        let (result, captured) =
            invoke("task", OK_TASK, "{\"Inputs\":{\"Name\":\"agent\"}}\n").await;
        assert_eq!(result.unwrap(), PluginOutcome::Succeeded);
        assert_eq!(captured.stdout_lines(), vec!["hello agent"]);
    }

    #[tokio::test]
    async fn test_plugin_error_is_reported_in_band() {
        let (result, captured) = invoke("task", FAILING_TASK, "{}\n").await;
        assert!(matches!(result, Ok(PluginOutcome::Failed(_))));
        assert_eq!(
            captured.stdout_lines(),
            vec!["##vso[task.complete result=Failed;]Plugin 'Failing' execution error: disk full"]
        );
        assert!(captured.stderr_lines().is_empty());
    }

    #[tokio::test]
    async fn test_plugin_panic_is_reported_in_band() {
        let (result, captured) = invoke("task", PANICKING_TASK, "{}\n").await;
        assert_eq!(
            result.unwrap(),
            PluginOutcome::Failed("Plugin panicked: boom".to_string())
        );
        assert_eq!(
            captured.stdout_lines(),
            vec!["##vso[task.complete result=Failed;]Plugin panicked: boom"]
        );
    }

    #[tokio::test]
    async fn test_command_failure_also_writes_stderr() {
        let (result, captured) = invoke("command", "Test.Fail", "{\"Data\":\"x\"}\n").await;
        assert!(matches!(result, Ok(PluginOutcome::Failed(_))));
        assert_eq!(
            captured.stderr_lines(),
            vec!["Plugin 'Failing' execution error: rejected"]
        );
    }

    #[tokio::test]
    async fn test_unsupported_kind() {
        let (result, captured) = invoke("job", OK_TASK, "{}\n").await;
        assert!(matches!(
            result,
            Err(HostError::Plugin(PluginError::UnsupportedKind(_)))
        ));
        assert!(captured.stdout_lines().is_empty());
    }

    #[tokio::test]
    async fn test_missing_context() {
        let (result, _) = invoke("task", OK_TASK, "").await;
        assert!(matches!(
            result,
            Err(HostError::Plugin(PluginError::MissingContext))
        ));
    }

    #[tokio::test]
    async fn test_invalid_context() {
        let (result, _) = invoke("task", OK_TASK, "{\"Inputs\":[1,2]}\n").await;
        assert!(matches!(
            result,
            Err(HostError::Plugin(PluginError::InvalidContext(_)))
        ));
    }

    #[tokio::test]
    async fn test_unknown_type_ref() {
        let (result, _) = invoke("task", "44444444-4444-4444-4444-444444444444", "{}\n").await;
        assert!(matches!(
            result,
            Err(HostError::Plugin(PluginError::UnknownTypeRef(_)))
        ));
    }

    #[tokio::test]
    async fn test_blank_type_ref() {
        let (result, _) = invoke("command", "  ", "{}\n").await;
        assert!(matches!(result, Err(HostError::InvalidArguments(_))));
    }
}
