use std::future::Future;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use writecheck_core::config_file::{self, ConfigFile};
use writecheck_core::{
    CheckOutcome, CollectionType, Config, HttpEvaluationService, StagedFile, SubmitOutcome,
    WorkflowController,
};

mod output;
mod shell;

use output::{ColorMode, ReportView};

/// WriteCheck - Upload submissions and flag likely duplicates
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Base URL of the evaluation service
    #[arg(long, global = true)]
    url: Option<String>,

    /// Per-request timeout in seconds (0 disables the timeout)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the files stored in the collection
    Files,

    /// Upload files as one batch
    Upload {
        /// Collection type: text (PDF/DOC/DOCX) or handwritten (images)
        #[arg(short = 't', long = "type")]
        collection_type: Option<CollectionType>,

        /// Files to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Delete a stored file
    Delete {
        /// Name of the stored file
        name: String,
    },

    /// Check the collection for likely duplicates
    Check {
        /// Hide pairs scoring below this value (0.0 - 1.0)
        #[arg(long)]
        min_score: Option<f64>,

        /// Merge (a, b) and (b, a) into one row
        #[arg(long)]
        collapse: bool,
    },

    /// Start an interactive session
    Shell,

    /// Print the effective configuration
    Config {
        /// Also write it to the platform config file
        #[arg(long)]
        save: bool,
    },
}

/// `RUST_LOG` sets the level unless `-v` asks for more; default is warn.
fn log_filter(verbosity: u8, rust_log: Option<&str>) -> EnvFilter {
    let builder = EnvFilter::builder().with_default_directive(Level::WARN.into());
    let level = match verbosity {
        0 => return builder.parse_lossy(rust_log.unwrap_or_default()),
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    builder
        .parse_lossy(rust_log.unwrap_or_default())
        .add_directive(level.into())
}

fn init_tracing(verbosity: u8) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    // Logs go to stderr so they never interleave with the report on stdout.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbosity, rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

/// Resolve configuration: CLI flags > env vars > config file > defaults.
fn resolve_config(cli: &Cli, file: &ConfigFile) -> Config {
    let mut config = Config::from_file(file);
    if let Some(url) = cli
        .url
        .clone()
        .or_else(|| std::env::var("WRITECHECK_URL").ok())
    {
        config.base_url = url;
    }
    let timeout = cli.timeout.or_else(|| {
        std::env::var("WRITECHECK_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
    });
    if let Some(secs) = timeout {
        config.timeout_secs = (secs > 0).then_some(secs);
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let file = config_file::load_config();
    let config = resolve_config(&cli, &file);
    let color_pref = file.display.as_ref().and_then(|d| d.color);
    let interactive = std::io::stdout().is_terminal();
    let color = ColorMode(!cli.no_color && color_pref.unwrap_or(true) && interactive);
    tracing::debug!(?config, "effective configuration");

    if let Command::Config { save } = cli.command {
        return show_config(&config, color_pref, save);
    }

    let service = Arc::new(HttpEvaluationService::from_config(&config)?);
    let mut out = std::io::stdout();

    match cli.command {
        Command::Files => {
            let ctl = WorkflowController::new(service, &config);
            let result = ctl.refresh_collection().await;
            let state = ctl.snapshot();
            result.map_err(|_| anyhow::anyhow!(state.status_message.clone()))?;
            output::print_files(&mut out, &state.files, color)?;
        }
        Command::Upload {
            collection_type,
            paths,
        } => {
            for path in &paths {
                if !path.exists() {
                    anyhow::bail!("File not found: {}", path.display());
                }
            }
            let ctl = WorkflowController::new(service, &config);
            ctl.set_type(collection_type.unwrap_or(config.default_type));
            if ctl
                .select_files(paths.iter().map(StagedFile::from_path).collect())
                .is_err()
            {
                anyhow::bail!(ctl.snapshot().status_message);
            }
            output::print_status(&mut out, &ctl.snapshot(), color)?;

            let outcome = with_spinner(&ctl, interactive, ctl.submit_upload()).await;
            let state = ctl.snapshot();
            output::print_status(&mut out, &state, color)?;
            match outcome {
                Ok(SubmitOutcome::Uploaded(_)) => output::print_files(&mut out, &state.files, color)?,
                Ok(SubmitOutcome::AlreadyBusy) => {}
                Err(_) => anyhow::bail!("upload did not complete"),
            }
        }
        Command::Delete { name } => {
            // Deleting needs a listing to check the name against.
            let ctl = WorkflowController::start(service, &config).await;
            let result = ctl.delete_file(&name).await;
            let state = ctl.snapshot();
            output::print_status(&mut out, &state, color)?;
            if result.is_err() {
                anyhow::bail!("delete did not complete");
            }
            output::print_files(&mut out, &state.files, color)?;
        }
        Command::Check {
            min_score,
            collapse,
        } => {
            let ctl = WorkflowController::new(service, &config);
            let outcome = with_spinner(&ctl, interactive, ctl.query_duplicates()).await;
            let state = ctl.snapshot();
            output::print_status(&mut out, &state, color)?;
            match outcome {
                Ok(CheckOutcome::Found(_)) => output::print_duplicates(
                    &mut out,
                    &state.duplicates,
                    ReportView {
                        min_score,
                        collapse,
                    },
                    color,
                )?,
                Ok(_) => {}
                Err(_) => anyhow::bail!("duplicate check did not complete"),
            }
        }
        Command::Shell => {
            let ctl = WorkflowController::start(service, &config).await;
            shell::run(&ctl, color).await?;
        }
        Command::Config { .. } => unreachable!("handled above"),
    }

    out.flush()?;
    Ok(())
}

fn show_config(config: &Config, color: Option<bool>, save: bool) -> anyhow::Result<()> {
    let snapshot = ConfigFile::from_config(config, color);
    print!("{}", toml::to_string_pretty(&snapshot)?);
    if save {
        let path = config_file::save_config(&snapshot).map_err(|e| anyhow::anyhow!(e))?;
        eprintln!("Saved configuration to {}", path.display());
    }
    Ok(())
}

/// Drive `fut` while a spinner mirrors the controller's status line.
async fn with_spinner<F: Future>(ctl: &WorkflowController, show: bool, fut: F) -> F::Output {
    if !show {
        return fut.await;
    }

    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.set_message(ctl.snapshot().status_message);

    let mut rx = ctl.subscribe();
    tokio::pin!(fut);
    let out = loop {
        tokio::select! {
            out = &mut fut => break out,
            changed = rx.changed() => {
                if changed.is_err() {
                    break fut.await;
                }
                bar.set_message(rx.borrow_and_update().status_message.clone());
            }
        }
    };
    bar.finish_and_clear();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(verbosity: u8, rust_log: Option<&str>) -> String {
        log_filter(verbosity, rust_log).to_string().to_lowercase()
    }

    #[test]
    fn default_level_is_warn() {
        assert_eq!(filter(0, None), "warn");
    }

    #[test]
    fn rust_log_sets_level_without_flags() {
        assert_eq!(filter(0, Some("debug")), "debug");
        assert!(filter(0, Some("writecheck_core=trace")).contains("writecheck_core=trace"));
    }

    #[test]
    fn verbose_flag_raises_level() {
        assert!(filter(2, None).contains("debug"));
        assert!(filter(1, Some("writecheck_core=trace")).contains("writecheck_core=trace"));
    }
}
