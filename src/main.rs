use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

mod config;
mod download;
mod errors;
mod utils;

use config::Config;
use download::{
    stderr_hint, AttemptStatus, ChainBuilder, CredentialBundle, DownloadVerdict, MediaRequest,
    Orchestrator, ToolRunner,
};
use errors::SalvageError;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long)]
    config: Option<String>,

    /// Request line (`<url> [audio|video]`), overriding the URL file
    #[arg(short, long)]
    url: Option<String>,

    /// Destination directory, overriding the config
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

fn get_config_path(args: &Args) -> Option<String> {
    if let Some(path) = &args.config {
        return Some(path.clone());
    }

    if let Ok(path) = std::env::var("CONFIG_FILE") {
        return Some(path);
    }

    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        let config_path = format!("{}/salvage/config.toml", xdg_config_home);
        if std::path::Path::new(&config_path).exists() {
            return Some(config_path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        let config_path = format!("{}/.config/salvage/config.toml", home.display());
        if std::path::Path::new(&config_path).exists() {
            return Some(config_path);
        }
    }

    None
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match get_config_path(&args) {
        Some(path) => match Config::from_file(&path) {
            Ok(config) => {
                eprintln!("Loading config from: {}", path);
                config
            }
            Err(e) => {
                eprintln!("Error: {:#}", e);
                return ExitCode::from(SalvageError::Configuration(String::new()).exit_code());
            }
        },
        None => Config::default(),
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    if config.get_logging_format() == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match run(&args, &config).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            let code = e
                .downcast_ref::<SalvageError>()
                .map(|err| err.exit_code())
                .unwrap_or(3);
            ExitCode::from(code)
        }
    }
}

async fn run(args: &Args, config: &Config) -> Result<ExitCode> {
    let destination_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.get_output_dir());
    std::fs::create_dir_all(&destination_dir).with_context(|| {
        format!(
            "Failed to create destination directory {}",
            destination_dir.display()
        )
    })?;

    let input = match &args.url {
        Some(line) => line.clone(),
        None => {
            let url_file = config.get_url_file();
            std::fs::read_to_string(&url_file).map_err(|e| {
                SalvageError::Configuration(format!(
                    "could not read URL file {}: {}",
                    url_file.display(),
                    e
                ))
            })?
        }
    };

    let request = MediaRequest::from_input(&input, destination_dir)?;
    info!("Attempting to download from: {}", request.source_url);

    let credentials = build_credentials(config);
    let builder = ChainBuilder::new(config.user_agents.clone());
    let chain = builder.build(&request, credentials.as_ref());

    let runner = ToolRunner::new(config.get_tool());
    if !runner.probe().await {
        warn!(
            "{} did not answer --version; attempts may fail to spawn",
            config.get_tool()
        );
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, finishing current attempt cleanup");
            signal_cancel.cancel();
        }
    });

    let orchestrator = Orchestrator::new(runner);
    let verdict = orchestrator.run(&request, chain, &cancel).await;
    print_summary(&verdict);

    if verdict.succeeded {
        Ok(ExitCode::SUCCESS)
    } else if verdict.aborted() {
        let err = SalvageError::Environment(format!(
            "{} could not be started; no strategy can work around a missing tool",
            config.get_tool()
        ));
        error!("{}", err);
        Ok(ExitCode::from(err.exit_code()))
    } else {
        Ok(ExitCode::from(1))
    }
}

fn build_credentials(config: &Config) -> Option<CredentialBundle> {
    if config.cookies_file.is_none() && config.cookies_from_browser.is_none() {
        return None;
    }
    Some(CredentialBundle {
        cookies_file: config.cookies_file.clone(),
        from_browser: config.cookies_from_browser.clone(),
    })
}

fn print_summary(verdict: &DownloadVerdict) {
    for (index, attempt) in verdict.attempts.iter().enumerate() {
        let label = match attempt.status {
            AttemptStatus::Success => "success",
            AttemptStatus::ToolError => "tool error",
            AttemptStatus::Timeout => "timeout",
            AttemptStatus::SpawnError => "spawn error",
        };
        match stderr_hint(&attempt.stderr_excerpt) {
            Some(hint) => info!(
                "Attempt {}: {} -> {} (exit {:?}; {})",
                index + 1,
                attempt.strategy_name,
                label,
                attempt.exit_code,
                hint
            ),
            None => info!(
                "Attempt {}: {} -> {} (exit {:?})",
                index + 1,
                attempt.strategy_name,
                label,
                attempt.exit_code
            ),
        }
    }

    if verdict.succeeded {
        info!(
            "Download succeeded via '{}'",
            verdict.successful_strategy.as_deref().unwrap_or("unknown")
        );
        for artifact in &verdict.artifacts {
            info!(
                "Artifact: {} ({})",
                artifact.filename,
                utils::format_bytes(artifact.size_bytes)
            );
        }
    } else {
        error!(
            "Download failed after {} attempt(s); see the attempt log above",
            verdict.attempts.len()
        );
    }
}
