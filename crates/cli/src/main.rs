//! deskmigrate command line.
//!
//! Each subcommand runs one migration stage against the snapshot directory;
//! `all` runs every stage in order.
//!
//! ```bash
//! deskmigrate --config deskmigrate.toml contacts
//! deskmigrate tickets && deskmigrate notes && deskmigrate transform
//! DESKMIGRATE_DESTINATION__API_KEY=... deskmigrate post
//! ```

mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use deskmigrate_core::{
    create_audit_system, load_config, load_config_from_env, run_stage, validate_config,
    AteraClient, AuditEvent, AuditStore, AutotaskClient, Config, JsonlAuditStore, Requirements,
    SanitizedConfig, Stage, StageContext, StageSummary, TokioSleeper,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for audit event channel
const AUDIT_BUFFER_SIZE: usize = 1000;

/// Configuration file used when `--config` is not given
const DEFAULT_CONFIG_FILE: &str = "deskmigrate.toml";

#[derive(Parser, Debug)]
#[command(name = "deskmigrate", version, about = "Migrate helpdesk data between REST APIs", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Without it, deskmigrate.toml is used if
    /// present, otherwise configuration comes from DESKMIGRATE_* variables.
    #[arg(long, short, env = "DESKMIGRATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Fetch source contacts and create them at the destination
    Contacts,
    /// Fetch source resources (technicians)
    Resources,
    /// Fetch the contacts that already exist at the destination
    DestinationContacts,
    /// Fetch source tickets for every priority
    Tickets,
    /// Attach notes to the fetched tickets
    Notes,
    /// Build destination ticket payloads from the snapshots
    Transform,
    /// Post ticket payloads and their comments
    Post,
    /// Run every stage in order
    All,
}

impl Command {
    fn name(&self) -> &'static str {
        match self.stages().as_slice() {
            [stage] => stage.name(),
            _ => "all",
        }
    }

    fn stages(&self) -> Vec<Stage> {
        match self {
            Command::Contacts => vec![Stage::Contacts],
            Command::Resources => vec![Stage::Resources],
            Command::DestinationContacts => vec![Stage::DestinationContacts],
            Command::Tickets => vec![Stage::Tickets],
            Command::Notes => vec![Stage::Notes],
            Command::Transform => vec![Stage::Transform],
            Command::Post => vec![Stage::Post],
            Command::All => Stage::ALL.to_vec(),
        }
    }

    fn requirements(&self) -> Requirements {
        self.stages()
            .iter()
            .map(Stage::requirements)
            .fold(Requirements::NONE, |acc, r| Requirements {
                source: acc.source || r.source,
                destination: acc.destination || r.destination,
            })
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            load_config(path).with_context(|| format!("Failed to load config from {:?}", path))
        }
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            load_config(Path::new(DEFAULT_CONFIG_FILE))
                .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG_FILE))
        }
        None => load_config_from_env().context("Failed to load config from the environment"),
    }
}

/// Short hash of the effective configuration, secrets excluded.
fn config_hash(config: &Config) -> String {
    let sanitized = SanitizedConfig::from(config);
    let config_json = serde_json::to_string(&sanitized).unwrap_or_default();
    let hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    hash[..16].to_string()
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref())?;
    logging::init(&config.logging)?;

    validate_config(&config, cli.command.requirements())
        .context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    if let Ok(sanitized) = serde_json::to_string(&SanitizedConfig::from(&config)) {
        info!(config = %sanitized, "Effective configuration");
    }

    let run_id = uuid::Uuid::new_v4().to_string();
    let audit_store: Arc<dyn AuditStore> = Arc::new(
        JsonlAuditStore::open(&config.paths.audit_log).context("Failed to open audit log")?,
    );
    let (audit_handle, audit_writer) =
        create_audit_system(Arc::clone(&audit_store), run_id.clone(), AUDIT_BUFFER_SIZE);
    let writer_handle = tokio::spawn(audit_writer.run());
    info!(run_id = %run_id, audit_log = ?config.paths.audit_log, "Audit log opened");

    let name = cli.command.name();
    audit_handle
        .emit(AuditEvent::RunStarted {
            version: VERSION.to_string(),
            stage: name.to_string(),
            config_hash: config_hash(&config),
        })
        .await;

    let source =
        AutotaskClient::new(config.source.clone()).context("Failed to create source client")?;
    let destination = AteraClient::new(config.destination.clone())
        .context("Failed to create destination client")?;
    let sleeper = TokioSleeper;
    let ctx = StageContext::new(&config, &sleeper, audit_handle.clone());

    let mut summaries: Vec<StageSummary> = Vec::new();
    let mut failure = None;
    for stage in cli.command.stages() {
        match run_stage(stage, &ctx, &source, &destination).await {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    let succeeded = summaries.iter().map(|s| s.succeeded).sum();
    let failed = summaries.iter().map(|s| s.failed).sum();
    audit_handle
        .emit(AuditEvent::RunFinished {
            stage: name.to_string(),
            succeeded,
            failed,
        })
        .await;

    drop(ctx);
    drop(audit_handle);
    if let Err(e) = writer_handle.await {
        warn!("Audit writer task failed: {}", e);
    }

    for summary in &summaries {
        info!(
            stage = %summary.stage,
            succeeded = summary.succeeded,
            failed = summary.failed,
            output = ?summary.output,
            errors = ?summary.error_artifact,
            "Stage summary"
        );
    }

    if let Some(e) = failure {
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_stage_subcommands() {
        let cli = Cli::try_parse_from(["deskmigrate", "destination-contacts"]).unwrap();
        assert_eq!(cli.command, Command::DestinationContacts);
        assert!(cli.config.is_none());

        let cli = Cli::try_parse_from(["deskmigrate", "--config", "alt.toml", "post"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        assert_eq!(cli.command.name(), "post");
    }

    #[test]
    fn test_requirements_follow_stages() {
        assert_eq!(Command::Transform.requirements(), Requirements::NONE);
        assert_eq!(Command::All.requirements(), Requirements::ALL);
        let notes = Command::Notes.requirements();
        assert!(notes.source && !notes.destination);
        assert_eq!(Command::All.name(), "all");
        assert_eq!(Command::All.stages().len(), 7);
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(resolve_config(Some(&missing)).is_err());
    }

    #[test]
    fn test_config_hash_ignores_secrets() {
        let mut a = Config::default();
        a.destination.api_key = "one".to_string();
        let mut b = Config::default();
        b.destination.api_key = "two".to_string();
        assert_eq!(config_hash(&a), config_hash(&b));
        assert_eq!(config_hash(&a).len(), 16);
    }
}
