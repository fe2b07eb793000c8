use std::path::PathBuf;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::{json, Value};
use vrl_server::{open_store, ServerConfig, VrlServer};
use vrl_store::{AdvanceReport, Record, RecordStore, StoredRecord};

use crate::cli::*;

const DEFAULT_DIR: &str = ".vrl";

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;
    let format = cli.format;
    tracing::debug!(ledger = ?config.ledger_path, snapshot = ?config.snapshot_path, "configuration resolved");

    match cli.command {
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::Append(args) => cmd_append(&open(&config).await?, args, format).await,
        Command::Latest(args) => {
            let store = open(&config).await?;
            let key_field = key_field(&config, args.key_field)?;
            let latest = store.latest(&key_field, &args.key).await?;
            print_records(&[latest], format);
            Ok(())
        }
        Command::History(args) => {
            let store = open(&config).await?;
            let key_field = key_field(&config, args.key_field)?;
            let history = store.history(&key_field, &args.key).await?;
            print_records(&history, format);
            Ok(())
        }
        Command::Delete(args) => {
            let store = open(&config).await?;
            let key_field = key_field(&config, args.key_field)?;
            let sequence = store.delete(&key_field, &args.key).await?;
            match format {
                OutputFormat::Json => println!("{}", json!({ "sequence": sequence })),
                OutputFormat::Text => println!(
                    "{} Tombstone for {} = {} at {}",
                    "✓".green().bold(),
                    key_field.cyan(),
                    args.key.yellow(),
                    sequence.to_string().bold()
                ),
            }
            Ok(())
        }
        Command::List => {
            let store = open(&config).await?;
            print_records(&store.get_all().await?, format);
            Ok(())
        }
        Command::Head => {
            let store = open(&config).await?;
            let head = store.head().await?;
            match format {
                OutputFormat::Json => println!("{}", json!({ "head": head })),
                OutputFormat::Text if head.is_genesis() => println!("Ledger is empty."),
                OutputFormat::Text => println!("Head: {}", head.to_string().bold()),
            }
            Ok(())
        }
        Command::Rebuild(args) => {
            let store = open(&config).await?;
            let key_field = key_field(&config, args.key_field)?;
            let report = store.rebuild(&key_field).await?;
            print_report(&report, format);
            Ok(())
        }
    }
}

/// Start from the config file (or defaults) and apply command-line
/// overrides. One-shot commands always use a file ledger.
fn resolve_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_toml_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(ledger) = &cli.ledger {
        config.ledger_path = Some(ledger.clone());
    }
    if let Some(snapshot) = &cli.snapshot {
        config.snapshot_path = Some(snapshot.clone());
    }
    if let Some(identity) = &cli.identity {
        config.store.identity = identity.clone();
    }
    if config.ledger_path.is_none() {
        config.ledger_path = Some(PathBuf::from(DEFAULT_DIR).join("ledger.vrl"));
    }
    if config.snapshot_path.is_none() {
        config.snapshot_path = config
            .ledger_path
            .as_ref()
            .map(|ledger| ledger.with_extension("index.json"));
    }
    Ok(config)
}

async fn open(config: &ServerConfig) -> anyhow::Result<RecordStore> {
    let path = config
        .ledger_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    open_store(config)
        .await
        .with_context(|| format!("opening ledger {path}"))
}

fn key_field(config: &ServerConfig, requested: Option<String>) -> anyhow::Result<String> {
    let field = requested.unwrap_or_else(|| config.default_key_field.clone());
    if !vrl_server::is_valid_field_name(&field) {
        bail!("invalid key field {field:?}");
    }
    if !config.allowed_key_fields.is_empty() && !config.allowed_key_fields.contains(&field) {
        bail!("key field {field:?} is not in allowed_key_fields");
    }
    Ok(field)
}

async fn cmd_serve(mut config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    println!(
        "VRL server on {} (ledger: {})",
        config.bind_addr.to_string().bold(),
        config
            .ledger_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "in-memory".into())
    );
    let server = VrlServer::open(config).await?;
    server.serve().await?;
    Ok(())
}

async fn cmd_append(store: &RecordStore, args: AppendArgs, format: OutputFormat) -> anyhow::Result<()> {
    let value: Value = serde_json::from_str(&args.record).context("record is not valid JSON")?;
    let Value::Object(object) = value else {
        bail!("record must be a JSON object");
    };
    let sequence = store.append(&Record::from_object(object)).await?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "sequence": sequence })),
        OutputFormat::Text => println!(
            "{} Appended at {} by {}",
            "✓".green().bold(),
            sequence.to_string().bold(),
            store.identity().short_id().cyan()
        ),
    }
    Ok(())
}

fn print_records(records: &[StoredRecord], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let values: Vec<Value> = records
                .iter()
                .map(|r| json!({ "sequence": r.sequence, "deleted": r.is_tombstone(), "record": r.record.to_json() }))
                .collect();
            println!("{}", Value::Array(values));
        }
        OutputFormat::Text if records.is_empty() => println!("No records."),
        OutputFormat::Text => {
            for stored in records {
                let body = stored.record.to_json().to_string();
                if stored.is_tombstone() {
                    println!("{}  {} {}", stored.sequence.to_string().yellow(), "deleted".red(), body.dimmed());
                } else {
                    println!("{}  {}", stored.sequence.to_string().yellow(), body);
                }
            }
        }
    }
}

fn print_report(report: &AdvanceReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "key_field": report.key_field,
                "cursor": report.to,
                "scanned": report.scanned,
                "indexed": report.indexed,
                "skipped": report.skipped,
            })
        ),
        OutputFormat::Text => {
            println!("{} Rebuilt index for {}", "✓".green().bold(), report.key_field.cyan());
            println!("  Cursor: {}", report.to.to_string().bold());
            println!("  Scanned: {}, indexed: {}", report.scanned, report.indexed);
            if report.skipped > 0 {
                println!("  {} {} undecodable entries", "Skipped".yellow(), report.skipped);
            }
        }
    }
}
