//! Source checkout task
//!
//! Fetches a git repository from the job's repository list into its checkout
//! directory using the `git` command line.

use agent_config::ProcessConfig;
use agent_plugin_core::{
    ContextOutput, PluginError, PluginResult, RepositoryResource, Stage, TaskContext,
    TaskInputDescriptor, TaskPlugin, TaskPluginDescriptor,
};
use agent_process::{ProcessError, ProcessExecutor, ProcessSpec};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const CHECKOUT_TASK_ID: &str = "c61807ba-5e20-4b70-bd8c-3683c9f74003";
const CHECKOUT_TASK_UUID: Uuid = Uuid::from_u128(0xc61807ba_5e20_4b70_bd8c_3683c9f74003);

const NAME: &str = "Checkout";
const DEFAULT_REPOSITORY: &str = "self";
const GIT_REPOSITORY_TYPES: &[&str] = &["git", "github", "githubenterprise", "bitbucket", "tfsgit"];

pub struct CheckoutTask {
    process: ProcessConfig,
    git: PathBuf,
}

impl Default for CheckoutTask {
    fn default() -> Self {
        Self::new(ProcessConfig::default(), "git")
    }
}

impl CheckoutTask {
    pub fn new(process: ProcessConfig, git: impl Into<PathBuf>) -> Self {
        Self {
            process,
            git: git.into(),
        }
    }

    pub fn descriptor() -> TaskPluginDescriptor {
        TaskPluginDescriptor::new(CHECKOUT_TASK_UUID, "1.0.0", NAME)
            .friendly_name("Get Sources")
            .description("Get Sources")
            .author("Build Agent")
            .input(
                TaskInputDescriptor::new("repository", "Repository")
                    .default_value(DEFAULT_REPOSITORY)
                    .required(),
            )
            .stages([Stage::Main, Stage::Post])
    }

    async fn checkout(
        &self,
        ctx: &TaskContext,
        repo: &RepositoryResource,
        cancel: &CancellationToken,
    ) -> PluginResult<()> {
        let repo_type = repo.repository_type.to_lowercase();
        if !GIT_REPOSITORY_TYPES.contains(&repo_type.as_str()) {
            return Err(PluginError::execution_error(
                NAME,
                format!("repository type '{}' is not supported", repo.repository_type),
            ));
        }
        if repo.url.trim().is_empty() {
            return Err(PluginError::execution_error(
                NAME,
                format!("repository '{}' has no url", repo.alias),
            ));
        }

        let target = target_directory(ctx, repo)?;
        tokio::fs::create_dir_all(&target).await?;
        let fresh = !target.join(".git").exists();

        ctx.output(&format!(
            "Syncing repository: {} ({}) into {}",
            repo.alias,
            repo.repository_type,
            target.display()
        ));

        let token = ctx
            .variable("system.accessToken")
            .map(|v| v.value.clone())
            .filter(|t| !t.is_empty());
        if let Some(token) = &token {
            ctx.set_secret(token);
        }

        let url = quote(&repo.url)?;
        if fresh {
            self.git(ctx, &target, "init", None, cancel).await?;
            self.git(ctx, &target, &format!("remote add origin {}", url), None, cancel)
                .await?;
        } else {
            self.git(ctx, &target, &format!("remote set-url origin {}", url), None, cancel)
                .await?;
        }
        ctx.progress(30, "Fetching");

        let fetch_ref = repo.git_ref.as_deref().or(repo.version.as_deref());
        let fetch = format!(
            "fetch --force --tags --prune --progress --no-recurse-submodules origin{}",
            fetch_ref.map(|r| format!(" {}", r)).unwrap_or_default()
        );
        match &token {
            Some(token) => {
                let header = quote(&format!("AUTHORIZATION: bearer {}", token))?;
                let display =
                    format!("-c http.extraheader=\"AUTHORIZATION: bearer ***\" {}", fetch);
                self.git(
                    ctx,
                    &target,
                    &format!("-c http.extraheader={} {}", header, fetch),
                    Some(&display),
                    cancel,
                )
                .await?;
            }
            None => self.git(ctx, &target, &fetch, None, cancel).await?,
        }
        ctx.progress(80, "Checking out");

        let commit = repo.version.as_deref().unwrap_or("FETCH_HEAD");
        self.git(
            ctx,
            &target,
            &format!("checkout --progress --force {}", commit),
            None,
            cancel,
        )
        .await?;
        ctx.progress(100, "Checked out");

        Ok(())
    }

    /// Run git, relaying all of its output as plain lines
    async fn git(
        &self,
        ctx: &TaskContext,
        dir: &Path,
        arguments: &str,
        display: Option<&str>,
        cancel: &CancellationToken,
    ) -> PluginResult<()> {
        let display = display.unwrap_or(arguments);
        ctx.command(&format!("git {}", display));

        let out = ctx.plugin_output().clone();
        let err = out.clone();
        let mut executor = ProcessExecutor::new(self.process.clone())
            .on_stdout(move |lines| lines.iter().for_each(|l| out.write_stdout_line(l)))
            .on_stderr(move |lines| lines.iter().for_each(|l| err.write_stdout_line(l)));

        let spec = ProcessSpec::new(&self.git)
            .arguments(arguments)
            .working_directory(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .require_exit_code_zero(true);

        match executor.run(spec, cancel).await {
            Ok(_) => Ok(()),
            Err(ProcessError::Cancelled) => Err(PluginError::Cancelled),
            Err(ProcessError::ExitCode { exit_code, .. }) => Err(PluginError::execution_error(
                NAME,
                format!("git {} failed with exit code {}", display, exit_code),
            )),
            Err(e) => Err(PluginError::execution_error(NAME, e.to_string())),
        }
    }
}

#[async_trait]
impl TaskPlugin for CheckoutTask {
    async fn run(&self, ctx: &TaskContext, cancel: CancellationToken) -> PluginResult<()> {
        let alias = ctx
            .input("repository")
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(DEFAULT_REPOSITORY);

        match ctx.stage() {
            Stage::Main => {
                let repo = ctx.repository(alias)?;
                self.checkout(ctx, repo, &cancel).await
            }
            Stage::Post => {
                ctx.debug(&format!("Cleaning up repository '{}'", alias));
                Ok(())
            }
            Stage::Pre => Err(PluginError::execution_error(
                NAME,
                "the pre stage is not supported",
            )),
        }
    }
}

fn target_directory(ctx: &TaskContext, repo: &RepositoryResource) -> PluginResult<PathBuf> {
    if let Some(path) = repo.properties.get("path").and_then(|p| p.as_str()) {
        return Ok(PathBuf::from(path));
    }
    ctx.variable("build.sourcesDirectory")
        .map(|v| PathBuf::from(&v.value))
        .ok_or_else(|| {
            PluginError::execution_error(
                NAME,
                format!("no checkout path for repository '{}'", repo.alias),
            )
        })
}

/// Double-quote an argument containing whitespace
fn quote(value: &str) -> PluginResult<String> {
    if value.contains('"') {
        return Err(PluginError::execution_error(
            NAME,
            "arguments may not contain double quotes",
        ));
    }
    if value.contains(char::is_whitespace) {
        Ok(format!("\"{}\"", value))
    } else {
        Ok(value.to_string())
    }
}
