use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ledger_core::constants::DEFAULT_DIFFICULTY;
use ledger_core::{find_invalid, Chain, MineControl};
use ledger_storage::{read_snapshot, LedgerDir};
use serde_json::Value;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger")]
#[command(about = "Record events into a hash-linked ledger and inspect its snapshots")]
struct Cli {
    /// Directory holding snapshot files
    #[arg(long, env = "LEDGER_DIR", default_value = "ledger", global = true)]
    ledger_dir: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mine the given events into a fresh chain and write a snapshot
    Record {
        /// Leading zero hex characters required of each block hash
        #[arg(long, env = "LEDGER_DIFFICULTY", default_value_t = DEFAULT_DIFFICULTY)]
        difficulty: u32,
        /// Give up on a block after this many seconds of mining
        #[arg(long, env = "LEDGER_DEADLINE_SECS")]
        deadline_secs: Option<u64>,
        /// Parse each event as JSON instead of storing it as a string
        #[arg(long)]
        json: bool,
        /// Also read events from stdin, one per line
        #[arg(long)]
        stdin: bool,
        /// Event payloads, appended in order
        events: Vec<String>,
    },
    /// Check a snapshot file for tampering and broken links
    Verify {
        /// Snapshot to check
        file: PathBuf,
    },
    /// List every snapshot in the ledger directory
    List,
}

fn main() -> Result<ExitCode> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let ledger = LedgerDir::open(cli.ledger_dir);
    match cli.cmd {
        Command::Record {
            difficulty,
            deadline_secs,
            json,
            stdin,
            mut events,
        } => {
            if stdin {
                for line in io::stdin().lock().lines() {
                    let line = line.context("reading events from stdin")?;
                    if !line.trim().is_empty() {
                        events.push(line);
                    }
                }
            }
            if events.is_empty() {
                bail!("no events to record");
            }
            record(&ledger, difficulty, deadline_secs, json, events)
        }
        Command::Verify { file } => verify(file),
        Command::List => list(&ledger),
    }
}

fn parse_event(raw: String, json: bool) -> Result<Value> {
    if json {
        serde_json::from_str(&raw).with_context(|| format!("event is not valid JSON: {raw}"))
    } else {
        Ok(Value::String(raw))
    }
}

fn record(
    ledger: &LedgerDir,
    difficulty: u32,
    deadline_secs: Option<u64>,
    json: bool,
    events: Vec<String>,
) -> Result<ExitCode> {
    let payloads = events
        .into_iter()
        .map(|raw| parse_event(raw, json))
        .collect::<Result<Vec<_>>>()?;

    let mut chain = Chain::with_difficulty(difficulty);
    for payload in payloads {
        // each block gets its own budget
        let control = match deadline_secs {
            Some(secs) => MineControl::new().with_timeout(Duration::from_secs(secs)),
            None => MineControl::new(),
        };
        chain.record_with(payload, &control)?;
    }

    let path = ledger.persist(&chain)?;
    info!(path = %path.display(), blocks = chain.len(), "ledger recorded");
    println!("{}", path.display());
    println!("Chain valid: {}", chain.validate());
    Ok(ExitCode::SUCCESS)
}

fn verify(file: PathBuf) -> Result<ExitCode> {
    let blocks = read_snapshot(&file)?;
    match find_invalid(&blocks) {
        None => {
            println!("{}: valid ({} blocks)", file.display(), blocks.len());
            Ok(ExitCode::SUCCESS)
        }
        Some(invalid) => {
            println!(
                "{}: invalid at block {} ({:?})",
                file.display(),
                invalid.position,
                invalid.reason
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

fn list(ledger: &LedgerDir) -> Result<ExitCode> {
    for snapshot in ledger.load_all()? {
        let head = snapshot.head().map(|b| b.hash.as_str()).unwrap_or("-");
        let status = if snapshot.is_valid() { "valid" } else { "invalid" };
        println!(
            "{}\t{} blocks\t{}\t{}",
            snapshot.path.display(),
            snapshot.blocks.len(),
            head,
            status
        );
    }
    Ok(ExitCode::SUCCESS)
}
