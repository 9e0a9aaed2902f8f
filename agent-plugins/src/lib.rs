//! Plugins shipped with the agent

pub mod artifact;
pub mod checkout;

pub use artifact::ArtifactUploadCommand;
pub use checkout::CheckoutTask;

use agent_plugin_core::{PluginCatalog, PluginResult};

/// The catalog of every built-in plugin
pub fn builtin_catalog() -> PluginResult<PluginCatalog> {
    PluginCatalog::builder()
        .task(CheckoutTask::descriptor(), || Box::new(CheckoutTask::default()))
        .command(ArtifactUploadCommand::descriptor(), || {
            Box::new(ArtifactUploadCommand)
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_contents() {
        let catalog = builtin_catalog().unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.create_task(checkout::CHECKOUT_TASK_ID).is_ok());
        assert!(catalog.create_command("artifact.upload").is_ok());
    }
}
