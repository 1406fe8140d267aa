use std::path::PathBuf;

use kernel::config::DEFAULT_CONFIG_PATH;
use kernel::{Kernel, KernelBinError, KernelConfig};
use kernel_types::ProcessId;
use tokio::signal;

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("kernel error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), KernelBinError> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let mut command = "run".to_string();
    if let Some(first) = args.first().cloned() {
        args.remove(0);
        if first == "run" || first == "serve-mcp" || first == "--help" || first == "-h" {
            command = first;
        } else if first.starts_with('-') {
            command = "run".to_string();
            args.insert(0, first);
        } else {
            return Err(KernelBinError::Config(format!("unknown subcommand: {first}")));
        }
    }

    if command == "--help" || command == "-h" {
        print_usage();
        return Ok(());
    }

    init_tracing();

    if command == "serve-mcp" {
        return run_serve_mcp(args).await;
    }

    run_kernel(args).await
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}

async fn run_kernel(args: Vec<String>) -> Result<(), KernelBinError> {
    let config = load_config(args)?;
    tracing::info!(env = ?config.redacted_env_summary(), "loaded kernel config");

    let kernel = Kernel::build(&config).await?;
    kernel.start().await?;

    shutdown_signal().await;
    tracing::info!("shutdown signal received");
    kernel.shutdown().await;
    Ok(())
}

async fn run_serve_mcp(args: Vec<String>) -> Result<(), KernelBinError> {
    let mut remaining = args;
    let mut process_id: Option<String> = None;
    let mut config_path: Option<PathBuf> = None;
    while let Some(flag) = remaining.first().cloned() {
        remaining.remove(0);
        match flag.as_str() {
            "--process-id" => process_id = Some(take_arg("--process-id", &mut remaining)?),
            "--config" => config_path = Some(PathBuf::from(take_arg("--config", &mut remaining)?)),
            other => return Err(KernelBinError::Config(format!("unknown flag: {other}"))),
        }
    }
    let process_id = process_id.ok_or_else(|| KernelBinError::Config("missing --process-id".to_string()))?;

    let config = match config_path {
        Some(path) => KernelConfig::from_path(&path)?,
        None => default_or_loaded_config()?,
    };

    // Standalone MCP session: builds its own kernel rather than attaching
    // to a running `run` process, since that would need an IPC transport
    // this core intentionally leaves to the deployment (see
    // kernel_mcp::server). Useful for exercising the tool surface, or as
    // the companion process a real deployment's per-worker wiring spawns
    // against its own in-memory kernel.
    let kernel = Kernel::build(&config).await?;
    kernel.start().await?;

    let result = kernel_mcp::serve_stdio_for_process(ProcessId::from(process_id), kernel.mcp.clone()).await;
    kernel.shutdown().await;
    result.map_err(|err| KernelBinError::Config(err.to_string()))
}

fn default_or_loaded_config() -> Result<KernelConfig, KernelBinError> {
    let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        KernelConfig::from_path(&default_path)
    } else {
        Ok(KernelConfig::default())
    }
}

fn load_config(args: Vec<String>) -> Result<KernelConfig, KernelBinError> {
    let mut config_path: Option<PathBuf> = None;
    let mut remaining = args;
    while let Some(flag) = remaining.first().cloned() {
        remaining.remove(0);
        match flag.as_str() {
            "--config" => config_path = Some(PathBuf::from(take_arg("--config", &mut remaining)?)),
            other => return Err(KernelBinError::Config(format!("unknown flag: {other}"))),
        }
    }
    match config_path {
        Some(path) => KernelConfig::from_path(&path),
        None => default_or_loaded_config(),
    }
}

fn take_arg(flag: &str, remaining: &mut Vec<String>) -> Result<String, KernelBinError> {
    if remaining.is_empty() {
        return Err(KernelBinError::Config(format!("missing value for {flag}")));
    }
    Ok(remaining.remove(0))
}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}

fn print_usage() {
    println!(
        "kernel run [--config kernel.json]\n\
kernel serve-mcp --process-id ID [--config kernel.json]"
    );
}
