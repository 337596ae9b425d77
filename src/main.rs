//! subflow - batch subtitle translation server
//!
//! Entry point: runs the JSON-RPC server, translates a single file from the
//! command line, or writes the default configuration.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subflow::cli::{Args, Commands};
use subflow::config::Config;
use subflow::media::MediaToolkitFactory;
use subflow::pipeline::TranslationPipeline;
use subflow::rpc::{JobDefaults, RpcContext, RpcServer};
use subflow::store::{spawn_sweeper, Store};
use subflow::translate::{OracleFactory, TranslationOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Held until exit so buffered file logs are flushed
    let _log_guard = setup_logging(args.verbose)?;

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Serve { bind, port } => {
            let mut server_config = config.server.clone();
            if let Some(bind) = bind {
                server_config.bind_addr = bind;
            }
            if let Some(port) = port {
                server_config.port = port;
            }
            serve(&config, &server_config).await?;
        }
        Commands::Translate { input, output, language, context, model, batch_size, api_key } => {
            let options = TranslationOptions::new(api_key, language)
                .with_context(context)
                .with_model(model.unwrap_or_else(|| config.translate.default_model.clone()))
                .with_batch_size(batch_size.unwrap_or(config.translate.default_batch_size));
            translate_file(&config, &input, &output, &options).await?;
        }
        Commands::Config { output } => {
            Config::default().save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };
    Ok(config)
}

async fn serve(config: &Config, server_config: &subflow::config::ServerConfig) -> Result<()> {
    let store = Store::new();
    let sweeper = spawn_sweeper(
        store.clone(),
        config.store.sweep_interval(),
        config.store.retention(),
    );

    let media = MediaToolkitFactory::create_default(config.media.clone());
    if let Err(e) = media.locate().await {
        warn!("Media processor is not available; video operations will fail: {}", e);
    }

    let oracle = OracleFactory::create_default(&config.translate)?;
    let pipeline = Arc::new(TranslationPipeline::new(oracle, config.translate.retry_policy()));
    let context = RpcContext::new(store, pipeline, media, JobDefaults::from(&config.translate));

    let server = RpcServer::new(context, server_config);
    let result = server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
        })
        .await;

    sweeper.abort();
    result.context("JSON-RPC server failed")
}

async fn translate_file(
    config: &Config,
    input: &Path,
    output: &Path,
    options: &TranslationOptions,
) -> Result<()> {
    info!("Translating subtitles: {}", input.display());
    let text = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let oracle = OracleFactory::create_default(&config.translate)?;
    let pipeline = TranslationPipeline::new(oracle, config.translate.retry_policy());

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling translation");
                cancel.cancel();
            }
        })
    };

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% ({eta})")?
            .progress_chars("#>-"),
    );

    let progress = pb.clone();
    let outcome = pipeline
        .run(&text, options, &cancel, move |value| {
            progress.set_position((value.clamp(0.0, 1.0) * 100.0).round() as u64);
        })
        .await;
    interrupt.abort();

    let translated = match outcome {
        Ok(translated) => {
            pb.finish();
            translated
        }
        Err(e) => {
            pb.abandon();
            return Err(e.into());
        }
    };

    tokio::fs::write(output, &translated)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!("Translation saved to {}", output.display());
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<WorkerGuard> {
    let log_dir = std::env::current_dir()?.join(".subflow").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // File appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "subflow.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("subflow.log").display()
    );

    Ok(guard)
}
