//! CLI entry point for steady

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use steady_core::config::{Config, ConfigLoader};
use steady_core::logging::init_logging;
use steady_core::pressure::{MemoryMonitor, MemoryPressureLevel, ProcessMemoryProbe};
use steady_core::processor::{
    split_message, split_typed_message, IncrementalProcessor, MessageChunk, ProcessorConfig,
};
use steady_core::timer::{TimerConfig, TimerService};
use steady_core::utils::truncate;
use steady_core::window::recent_window;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const PREVIEW_LEN: usize = 60;

#[derive(Parser)]
#[command(name = "steady")]
#[command(about = "Feed large messages to a consumer in small, steady batches")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue each input line as a message and print chunks as they drain
    Run {
        /// Input file, stdin when omitted
        file: Option<PathBuf>,
        /// Message type used to route every line
        #[arg(short = 't', long = "type", default_value = "line")]
        message_type: String,
        /// Processor preset (high-performance, balanced, conservative)
        #[arg(short, long)]
        preset: Option<String>,
        /// Give up after this many seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
    /// Show how a text would be chunked
    Split {
        /// Maximum characters per chunk
        #[arg(short, long)]
        size: Option<usize>,
        /// Message type recorded on the chunks
        #[arg(short = 't', long = "type")]
        message_type: Option<String>,
        /// Text to split
        text: String,
    },
    /// Print one memory sample with monitor stats
    Memory,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    match cli.command {
        Commands::Run {
            file,
            message_type,
            preset,
            timeout,
        } => {
            run_messages(&config_loader, file, &message_type, preset, timeout).await?;
        }
        Commands::Split {
            size,
            message_type,
            text,
        } => {
            init_stderr_logging();
            run_split(&config_loader, size, message_type, &text)?;
        }
        Commands::Memory => {
            init_stderr_logging();
            run_memory(&config_loader)?;
        }
        Commands::Config { command } => {
            init_stderr_logging();
            match command {
                ConfigCommands::Show => run_config_show(&config_loader)?,
                ConfigCommands::Init { force } => run_config_init(&config_loader, force)?,
            }
        }
    }

    Ok(())
}

/// Plain logging for commands whose stdout is data
fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

/// Relative log directories live under the config directory
fn resolve_log_dir(config_dir: &Path, log_dir: &str) -> String {
    let path = Path::new(log_dir);
    if path.is_absolute() {
        log_dir.to_string()
    } else {
        config_dir.join(path).to_string_lossy().into_owned()
    }
}

fn processor_config(config: &Config, preset: Option<&str>) -> Result<ProcessorConfig> {
    let Some(name) = preset else {
        return Ok(config.processor.clone());
    };
    let Some(mut selected) = ProcessorConfig::preset(name) else {
        bail!(
            "Unknown preset '{}' (expected high-performance, balanced or conservative)",
            name
        );
    };
    selected.debug_mode = config.processor.debug_mode;
    Ok(selected)
}

async fn read_lines(file: Option<&Path>) -> Result<Vec<String>> {
    let lines = match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?
            .lines()
            .map(str::to_string)
            .collect(),
        None => {
            let mut reader = BufReader::new(tokio::io::stdin()).lines();
            let mut lines = Vec::new();
            while let Some(line) = reader.next_line().await? {
                lines.push(line);
            }
            lines
        }
    };
    Ok(lines.into_iter().filter(|l| !l.trim().is_empty()).collect())
}

fn format_chunk(chunk: &MessageChunk) -> String {
    let marker = if chunk.is_complete {
        style("done").green()
    } else {
        style("part").dim()
    };
    format!(
        "{} {}/{} [{}] {}",
        style(&chunk.id).cyan(),
        chunk.chunk_index + 1,
        chunk.total_chunks,
        marker,
        truncate(&chunk.content, PREVIEW_LEN)
    )
}

/// Queue input lines and print every chunk as the processor drains them
async fn run_messages(
    loader: &ConfigLoader,
    file: Option<PathBuf>,
    message_type: &str,
    preset: Option<String>,
    timeout: u64,
) -> Result<()> {
    let mut config = loader.load()?;
    config.logging.dir = resolve_log_dir(loader.config_dir(), &config.logging.dir);
    let _log_guard = init_logging(&config.logging)?;

    let lines = read_lines(file.as_deref()).await?;
    let window = recent_window(&lines, config.window.max_messages);
    if window.len() < lines.len() {
        warn!(
            "Input has {} lines, keeping the first and the newest {}",
            lines.len(),
            window.len().saturating_sub(1)
        );
    }

    let processor = Arc::new(IncrementalProcessor::new(processor_config(
        &config,
        preset.as_deref(),
    )?));
    processor.register_processor(message_type, |chunk: MessageChunk| async move {
        println!("{}", format_chunk(&chunk));
        Ok(())
    });

    let monitor = MemoryMonitor::new(config.memory.clone(), Arc::new(ProcessMemoryProbe));
    let target = Arc::clone(&processor);
    monitor.on_memory_pressure(MemoryPressureLevel::Critical, move |info| {
        let target = Arc::clone(&target);
        async move {
            warn!(heap_used_mb = info.heap_used_mb, "Critical memory pressure, dropping queue");
            target.clear_queue();
            Ok(())
        }
    });
    monitor.start()?;

    let timed_out = Arc::new(Notify::new());
    let timers = TimerService::new();
    let notify = Arc::clone(&timed_out);
    timers.start_timer(
        TimerConfig::new(Duration::from_secs(timeout)).named("Run Timeout"),
        move || notify.notify_one(),
    )?;

    for (index, line) in window.iter().enumerate() {
        let message_id = format!("{}_{}", message_type, index + 1);
        processor.queue_typed_message(message_type, &message_id, line);
    }
    info!(
        messages = window.len(),
        chunks = processor.pending_chunks(),
        "Input queued"
    );

    processor.start()?;
    let poll = processor.config().processing_interval();
    let finished = tokio::select! {
        _ = timed_out.notified() => false,
        _ = wait_until_drained(&processor, poll) => true,
    };

    timers.clear_all_timers();
    monitor.stop();
    let stats = processor.stats();
    processor.shutdown().await;

    if !finished {
        println!(
            "{} timed out after {}s with {} chunks pending",
            style("✗").red(),
            timeout,
            stats.pending_chunks
        );
    }
    println!("{}", style("Processing stats:").bold());
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn wait_until_drained(processor: &IncrementalProcessor, poll: Duration) {
    while processor.pending_chunks() > 0 || processor.is_processing() {
        tokio::time::sleep(poll).await;
    }
}

fn run_split(
    loader: &ConfigLoader,
    size: Option<usize>,
    message_type: Option<String>,
    text: &str,
) -> Result<()> {
    let max_chunk_size = match size {
        Some(size) => size,
        None => loader.load()?.processor.max_chunk_size,
    };

    let chunks = match message_type.as_deref() {
        Some(kind) => split_typed_message(kind, "cli_1", text, max_chunk_size),
        None => split_message("cli_1", text, max_chunk_size),
    };

    println!(
        "{} chars -> {} chunks (max {})",
        text.chars().count(),
        chunks.len(),
        max_chunk_size
    );
    for chunk in &chunks {
        println!(
            "  {:>3}  {:>5} chars  {}",
            chunk.chunk_index,
            chunk.content.chars().count(),
            truncate(&chunk.content, PREVIEW_LEN)
        );
    }
    Ok(())
}

fn run_memory(loader: &ConfigLoader) -> Result<()> {
    let config = loader.load()?;
    let monitor = MemoryMonitor::new(config.memory, Arc::new(ProcessMemoryProbe));
    println!("{}", serde_json::to_string_pretty(&monitor.stats())?);
    Ok(())
}

fn run_config_show(loader: &ConfigLoader) -> Result<()> {
    let config = loader.load()?;
    println!("{}", style(loader.config_path().display()).dim());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn run_config_init(loader: &ConfigLoader, force: bool) -> Result<()> {
    let path = loader.config_path();
    if path.exists() && !force {
        println!(
            "Configuration already exists at {} (use --force to overwrite)",
            path.display()
        );
        return Ok(());
    }
    loader.save(&Config::default())?;
    println!("{} Wrote {}", style("✓").green(), path.display());
    Ok(())
}
