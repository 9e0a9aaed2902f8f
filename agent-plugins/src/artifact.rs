//! `##vso[artifact.upload]` command
//!
//! Copies the file or directory named in the command data into
//! `<build.artifactStagingDirectory>/<artifactname>`.

use agent_plugin_core::{
    CommandContext, CommandPlugin, CommandPluginDescriptor, ContextOutput, PluginError,
    PluginResult,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

const NAME: &str = "Upload Artifact";

pub struct ArtifactUploadCommand;

impl ArtifactUploadCommand {
    pub fn descriptor() -> CommandPluginDescriptor {
        CommandPluginDescriptor::new("artifact", "upload", NAME)
    }
}

#[async_trait]
impl CommandPlugin for ArtifactUploadCommand {
    async fn process(&self, ctx: &CommandContext, cancel: CancellationToken) -> PluginResult<()> {
        ctx.debug(&format!(
            "{} properties, data: {}",
            ctx.execution().properties.len(),
            ctx.data()
        ));

        let name = ctx
            .property("artifactname")
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| PluginError::execution_error(NAME, "artifactname is required"))?;
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(PluginError::execution_error(
                NAME,
                format!("invalid artifact name '{}'", name),
            ));
        }

        let data = ctx.data().trim();
        if data.is_empty() {
            return Err(PluginError::execution_error(NAME, "artifact path is required"));
        }
        let source = resolve_source(ctx, data);
        if tokio::fs::metadata(&source).await.is_err() {
            return Err(PluginError::execution_error(
                NAME,
                format!("path '{}' does not exist", source.display()),
            ));
        }

        let staging = ctx
            .variable("build.artifactStagingDirectory")
            .map(|v| PathBuf::from(&v.value))
            .ok_or_else(|| {
                PluginError::execution_error(NAME, "build.artifactStagingDirectory is not set")
            })?;
        let destination = staging.join(name);

        ctx.output(&format!(
            "Uploading artifact '{}' from {}",
            name,
            source.display()
        ));
        let copied = copy_tree(&source, &destination, &cancel).await?;
        ctx.progress(100, "Upload");
        ctx.output(&format!("Uploaded artifact '{}': {} file(s)", name, copied));

        Ok(())
    }
}

fn resolve_source(ctx: &CommandContext, data: &str) -> PathBuf {
    let path = PathBuf::from(data);
    if path.is_absolute() {
        return path;
    }
    match ctx.variable("build.sourcesDirectory") {
        Some(root) => Path::new(&root.value).join(path),
        None => path,
    }
}

/// Copy a file or directory tree, returning the number of files copied
async fn copy_tree(
    source: &Path,
    destination: &Path,
    cancel: &CancellationToken,
) -> PluginResult<usize> {
    tokio::fs::create_dir_all(destination).await?;

    if tokio::fs::metadata(source).await?.is_file() {
        let file_name = source
            .file_name()
            .ok_or_else(|| PluginError::execution_error(NAME, "source has no file name"))?;
        tokio::fs::copy(source, destination.join(file_name)).await?;
        return Ok(1);
    }

    let mut copied = 0;
    let mut pending = vec![(source.to_path_buf(), destination.to_path_buf())];
    while let Some((from, to)) = pending.pop() {
        tokio::fs::create_dir_all(&to).await?;
        let mut entries = tokio::fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            if cancel.is_cancelled() {
                return Err(PluginError::Cancelled);
            }
            let target = to.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), target));
            } else {
                tokio::fs::copy(entry.path(), target).await?;
                copied += 1;
            }
        }
    }

    Ok(copied)
}
