use agent_plugin_core::PluginOutput;
use agent_plugin_host::{infrastructure_report, HostArgs, PluginHost};
use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use std::process::ExitCode;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", infrastructure_report(&format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let args = match HostArgs::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print()?;
            return Ok(());
        }
        Err(e) => anyhow::bail!("Invalid arguments: {}", e.to_string().trim()),
    };

    agent_logging::init_stderr_tracing(args.effective_log_level().as_deref())?;

    let catalog = agent_plugins::builtin_catalog()?;
    let cancel = CancellationToken::new();
    watch_for_interrupt(cancel.clone());

    let host = PluginHost::new(&catalog, PluginOutput::stdio());
    let mut stdin = BufReader::new(tokio::io::stdin());
    let outcome = host.run(&args, &mut stdin, cancel).await?;
    info!(?outcome, "Plugin host finished");

    Ok(())
}

/// Cancel `cancel` on Ctrl+C, or SIGTERM on unix
fn watch_for_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        info!("Interrupt received, cancelling plugin");
        cancel.cancel();
    });
}
