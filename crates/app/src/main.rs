mod report;

use anglicism_core::{
    pdf_words, BuildCoordinator, BuildOptions, Classifier, EngineConfig, FetchPolicy,
    IndexAvailability, LopdfExtractor, PageFetcher, WiktionaryClient, MAX_DOCUMENT_BYTES,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use report::{dedup_words, read_words, render, ReportFormat};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "anglicism-cli", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory for downloaded dictionaries and the index.
    #[arg(long, global = true, env = "ANGLICISM_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// MediaWiki API endpoint used for etymology lookups.
    #[arg(long, global = true, env = "ANGLICISM_ETYMOLOGY_ENDPOINT")]
    etymology_endpoint: Option<String>,

    #[arg(long, global = true, env = "ANGLICISM_ETYMOLOGY_TIMEOUT_SECS")]
    etymology_timeout_secs: Option<u64>,

    #[arg(long, global = true, env = "ANGLICISM_FETCH_TIMEOUT_SECS")]
    fetch_timeout_secs: Option<u64>,

    /// Concurrent downloads and extractions during a build.
    #[arg(long, global = true, env = "ANGLICISM_WORKERS")]
    workers: Option<usize>,

    /// `continue` or `abort` when a dictionary cannot be downloaded.
    #[arg(long, global = true, env = "ANGLICISM_FETCH_POLICY")]
    fetch_policy: Option<FetchPolicy>,
}

#[derive(Subcommand)]
enum Command {
    /// Download the dictionaries and build the presence index.
    Build {
        /// Re-extract every dictionary even if its file is unchanged.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Print build state, per-dictionary readiness and staleness as JSON.
    Status,
    /// Classify words as anglicisms.
    Classify {
        words: Vec<String>,
        /// Read additional words from a file.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Classify the words of a PDF document (up to 50 MB).
        #[arg(long)]
        pdf: Option<PathBuf>,
        /// Classify the visible words of a web page.
        #[arg(long)]
        url: Option<String>,
        #[arg(long, value_enum, default_value = "table")]
        format: ReportFormat,
        /// Write the report here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Words classified at the same time.
        #[arg(long, default_value = "8")]
        concurrency: usize,
    },
}

impl Cli {
    /// Environment first, then explicit flags.
    fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::from_env();
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(endpoint) = &self.etymology_endpoint {
            config.etymology_endpoint = endpoint.clone();
        }
        if let Some(secs) = self.etymology_timeout_secs {
            config.etymology_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.fetch_timeout_secs {
            config.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(workers) = self.workers {
            config.build_workers = workers.max(1);
        }
        if let Some(policy) = self.fetch_policy {
            config.fetch_policy = policy;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = cli.engine_config();
    if let Command::Classify { concurrency, .. } = &cli.command {
        config.classify_concurrency = (*concurrency).max(1);
    }

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        data_dir = %config.data_dir.display(),
        "anglicism-cli boot"
    );

    let coordinator = BuildCoordinator::from_config(config.clone())?;
    let availability = coordinator.load_persisted().await;

    match cli.command {
        Command::Build { force } => {
            match coordinator.build(BuildOptions { force }).await {
                Ok(summary) => {
                    println!(
                        "index ready: {} words from {} dictionaries ({} reused)",
                        summary.words,
                        summary.indexed.len(),
                        summary.reused.len()
                    );
                    for (id, reason) in &summary.unavailable {
                        println!("  unavailable: {id}: {reason}");
                    }
                }
                Err(error) => {
                    println!("{}", serde_json::to_string_pretty(&coordinator.status())?);
                    return Err(error.into());
                }
            }
        }
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&coordinator.status())?);
        }
        Command::Classify {
            words,
            file,
            pdf,
            url,
            format,
            output,
            ..
        } => {
            match &availability {
                IndexAvailability::Ready { words: indexed } => {
                    info!(indexed, "serving persisted index")
                }
                IndexAvailability::Stale { reasons } => {
                    warn!(
                        reasons = reasons.len(),
                        "index is stale, run `build` to refresh; dictionary evidence unavailable"
                    )
                }
                IndexAvailability::Missing | IndexAvailability::Corrupt(_) => {
                    warn!("no usable index, run `build` first; dictionary evidence unavailable")
                }
            }

            let mut input = words;
            if let Some(path) = &file {
                let text = tokio::fs::read_to_string(path).await?;
                input.extend(read_words(&text));
            }
            if let Some(path) = pdf {
                let found = tokio::task::spawn_blocking(move || {
                    pdf_words(&LopdfExtractor, &path, MAX_DOCUMENT_BYTES)
                })
                .await??;
                input.extend(found);
            }
            if let Some(url) = &url {
                input.extend(PageFetcher::new()?.words(url).await?);
            }
            let input = dedup_words(input);
            if input.is_empty() {
                anyhow::bail!("no words to classify; pass words, --file, --pdf or --url");
            }

            let etymology = Arc::new(WiktionaryClient::new(&config)?);
            let classifier = Classifier::new(
                coordinator.index(),
                coordinator.sources(),
                etymology,
                config.classify_concurrency,
            );

            let (cancel_tx, cancel_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted, skipping remaining etymology lookups");
                    let _ = cancel_tx.send(true);
                }
            });

            let verdicts = classifier.classify_batch(&input, cancel_rx).await;
            let rendered = render(&verdicts, format)?;

            match output {
                Some(path) => {
                    tokio::fs::write(&path, rendered).await?;
                    println!(
                        "{} words classified, report at {}",
                        verdicts.len(),
                        path.display()
                    );
                }
                None => println!("{rendered}"),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_environment_defaults() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from([
            "anglicism-cli",
            "--workers",
            "0",
            "--etymology-timeout-secs",
            "3",
            "--fetch-policy",
            "abort",
            "classify",
            "--url",
            "https://example.ru/",
            "креатив",
        ])?;

        let config = cli.engine_config();
        assert_eq!(config.build_workers, 1);
        assert_eq!(config.etymology_timeout, Duration::from_secs(3));
        assert_eq!(config.fetch_policy, FetchPolicy::Abort);
        assert!(matches!(
            cli.command,
            Command::Classify { ref url, ref words, .. }
                if url.as_deref() == Some("https://example.ru/") && words == &["креатив"]
        ));
        Ok(())
    }
}
