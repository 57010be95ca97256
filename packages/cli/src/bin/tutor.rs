use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tutor_cli::console::{render, Rendered};
use tutor_cli::manifest::DataFilesManifest;
use tutor_cli::services::{build_services, engine_options};
use tutor_config::EngineConfig;
use tutor_engine::{ConsoleEvent, ReplStatus, ReviewOutcome, RunOutcome, SessionController};

#[derive(Parser)]
#[command(name = "tutor")]
#[command(about = "Run learner code in a sandbox with automated review")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a file in the sandbox, answering input prompts from stdin
    Run {
        /// Source file to run
        file: PathBuf,

        /// JSON manifest of data files to mount before running
        #[arg(long)]
        data_files: Option<PathBuf>,

        /// Skip the automated review for this run
        #[arg(long)]
        no_review: bool,
    },
    /// Save a file as a new code snapshot
    Save {
        /// Source file to save
        file: PathBuf,
    },
    /// Ask the automated reviewer about a file and print its verdict
    Review {
        /// Source file to review
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    if let Err(e) = handle_command(cli.command).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

async fn handle_command(command: Commands) -> Result<()> {
    let config = EngineConfig::from_env().context("Invalid configuration")?;
    match command {
        Commands::Run {
            file,
            data_files,
            no_review,
        } => run_command(&config, &file, data_files.as_deref(), no_review).await,
        Commands::Save { file } => save_command(&config, &file).await,
        Commands::Review { file } => review_command(&config, &file).await,
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn controller_for(config: &EngineConfig, review: bool) -> Result<(SessionController, bool)> {
    let wiring = build_services(config)?;
    let mut options = engine_options(config, wiring.remote);
    options.review_enabled &= review;
    Ok((SessionController::new(wiring.services, options), wiring.remote))
}

async fn run_command(
    config: &EngineConfig,
    file: &Path,
    data_files: Option<&Path>,
    no_review: bool,
) -> Result<()> {
    let code = read_source(file)?;
    let (controller, _) = controller_for(config, !no_review)?;
    controller.set_code(code);
    let mut events = controller.subscribe();

    if !controller.initialize().await {
        bail!("Sandbox worker could not be started (check TUTOR_WORKER_COMMAND)");
    }
    let booted =
        tokio::time::timeout(config.boot_timeout, wait_until_booted(&controller, &mut events))
            .await;
    match booted {
        Ok(result) => result?,
        Err(_) => {
            controller.shutdown().await;
            bail!(
                "Sandbox did not become ready within {}s",
                config.boot_timeout.as_secs()
            );
        }
    }

    if let Some(path) = data_files {
        let manifest = DataFilesManifest::load(path)?;
        let staged = controller
            .provision_data_files(&manifest.settings, &manifest.list())
            .await;
        info!("Mounted {} data file(s)", staged);
    }

    match controller.run_editor().await? {
        RunOutcome::Started => {}
        RunOutcome::EmptyProgram => {
            println!("{}", "Nothing to run".yellow());
            controller.shutdown().await;
            return Ok(());
        }
        other => bail!("Sandbox refused to run: {:?}", other),
    }

    let result = stream_console(&controller, &mut events).await;
    controller.shutdown().await;
    result?;

    if let Some(error) = controller.snapshot().last_error {
        bail!("Program failed: {}", error);
    }
    Ok(())
}

/// Wait for the first session to leave `Loading`
async fn wait_until_booted(
    controller: &SessionController,
    events: &mut tokio::sync::broadcast::Receiver<ConsoleEvent>,
) -> Result<()> {
    loop {
        match controller.status() {
            ReplStatus::Loading => {}
            ReplStatus::Error => bail!("Sandbox failed while booting"),
            _ => return Ok(()),
        }
        match events.recv().await {
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => bail!("Console closed while booting"),
        }
    }
}

/// Print console events until the program finishes; Ctrl-C stops it
async fn stream_console(
    controller: &SessionController,
    events: &mut tokio::sync::broadcast::Receiver<ConsoleEvent>,
) -> Result<()> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, stopping program");
                controller.stop().await?;
                return Ok(());
            }
        };

        let event = match event {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Console fell behind, {} event(s) skipped", skipped);
                continue;
            }
            Err(RecvError::Closed) => return Ok(()),
        };

        if let Some(rendered) = render(&event) {
            print_rendered(rendered)?;
        }

        match event {
            ConsoleEvent::InputRequested { .. } => match stdin.next_line().await? {
                Some(line) => {
                    controller.submit_input(&line).await?;
                }
                None => {
                    controller.cancel_input("").await?;
                }
            },
            // Boot events may still be queued; only the live status ends the run
            ConsoleEvent::Status(_) if !controller.status().is_executing() => {
                return Ok(());
            }
            _ => {}
        }
    }
}

fn print_rendered(rendered: Rendered) -> Result<()> {
    match rendered {
        Rendered::Stdout(text) => {
            let mut stdout = std::io::stdout();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
        Rendered::Stderr(text) => eprintln!("{}", text),
    }
    Ok(())
}

async fn save_command(config: &EngineConfig, file: &Path) -> Result<()> {
    let code = read_source(file)?;
    let (controller, remote) = controller_for(config, false)?;
    if !remote {
        bail!("Saving needs TUTOR_API_HOST, TUTOR_ITEM_ID and TUTOR_API_TOKEN");
    }

    let stored = controller.save(&code).await;
    controller.shutdown().await;
    let stored = stored.context("Failed to save snapshot")?;
    println!("{} snapshot {}", "Saved".green().bold(), stored.id);
    Ok(())
}

async fn review_command(config: &EngineConfig, file: &Path) -> Result<()> {
    let code = read_source(file)?;
    let (controller, remote) = controller_for(config, false)?;
    if !remote {
        bail!("Reviewing needs TUTOR_API_HOST, TUTOR_ITEM_ID and TUTOR_API_TOKEN");
    }
    controller.set_code(code);

    let outcome = controller.request_review().await;
    controller.shutdown().await;
    match outcome {
        ReviewOutcome::NoFeedback => println!("{}", "Looks good, no feedback".green()),
        ReviewOutcome::Commented(comment) => {
            println!("{}", "Reviewer feedback:".yellow().bold());
            println!("{}", comment.content);
        }
        ReviewOutcome::Failed(reason) => bail!("Review failed: {}", reason),
    }
    Ok(())
}
