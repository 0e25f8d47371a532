//! `guardian`: command-line front end for the Health Guardian pipeline.
//!
//! # Usage
//!
//! ```
//! guardian patient --name "Ada Lovelace" --phone 555-0100
//! guardian record PAT001 vital_signs '{"bp": "128/82", "hr": 64}'
//! guardian run --patient PAT001 --message "How am I doing?" --out report.md
//! guardian history PAT001 <session>
//! ```
//!
//! Configuration is read from `guardian.toml` (or `--config`) and
//! `GUARDIAN_*` environment variables.

mod client;
mod config;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use guardian_core::{
  conversation::Role,
  patient::PatientId,
  record::HealthCategory,
  store::HealthRepository,
};
use guardian_pipeline::{Pipeline, RunStatus, write_report};
use guardian_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{client::HttpGenerator, config::CliConfig};

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "guardian", author, version, about = "Health Guardian pipeline")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "guardian.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Look up a patient by name or phone, registering them if unknown.
  Patient {
    /// Update this id's contact details instead of searching.
    #[arg(long)]
    id:    Option<String>,
    #[arg(long)]
    name:  Option<String>,
    #[arg(long)]
    phone: Option<String>,
  },

  /// Append a health record.
  Record {
    patient:  String,
    /// vital_signs, lab_results, medications or conditions.
    category: HealthCategory,
    /// JSON payload.
    payload:  String,
  },

  /// Print the latest record per category.
  Records {
    patient:  String,
    #[arg(long)]
    category: Option<HealthCategory>,
  },

  /// Run the four-stage analysis for one conversation turn.
  Run {
    #[arg(long)]
    patient: Option<String>,
    #[arg(long)]
    name:    Option<String>,
    #[arg(long)]
    phone:   Option<String>,
    /// Session to continue. A new one is started when omitted.
    #[arg(long)]
    session: Option<String>,
    #[arg(short, long)]
    message: String,
    /// Also write the report to this file.
    #[arg(long)]
    out:     Option<PathBuf>,
  },

  /// Print the transcript of one session.
  History { patient: String, session: String },

  /// List a patient's sessions.
  Sessions { patient: String },

  /// Write the last report of a session to a file.
  Export {
    patient: String,
    session: String,
    path:    PathBuf,
  },
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let settings = ::config::Config::builder()
    .add_source(::config::File::from(cli.config.clone()).required(false))
    .add_source(
      ::config::Environment::with_prefix("GUARDIAN")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let cfg: CliConfig = settings
    .try_deserialize()
    .context("failed to deserialise configuration")?;

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  match cli.command {
    Command::Patient { id, name, phone } => patient(&store, id, name, phone).await,
    Command::Record { patient, category, payload } => {
      let payload: serde_json::Value =
        serde_json::from_str(&payload).context("payload is not valid JSON")?;
      let record = store
        .append_health_record(PatientId::new(patient), category, payload)
        .await?;
      println!("{} {} recorded at {}", record.patient_id, record.category, record.recorded_at);
      Ok(())
    }
    Command::Records { patient, category } => records(&store, PatientId::new(patient), category).await,
    Command::Run { patient, name, phone, session, message, out } => {
      let generator = Arc::new(HttpGenerator::new(cfg.generator.clone())?);
      let pipeline = Pipeline::new(Arc::clone(&store), generator, cfg.pipeline.clone());
      let turn = Turn { patient, name, phone, session, message, out };
      run(&pipeline, turn).await
    }
    Command::History { patient, session } => {
      let history = store
        .conversation_history(PatientId::new(patient), session)
        .await?;
      for m in history {
        println!("[{}] {}: {}", m.timestamp.format("%Y-%m-%d %H:%M:%S"), m.role, m.content);
      }
      Ok(())
    }
    Command::Sessions { patient } => {
      for id in store.list_session_ids(PatientId::new(patient)).await? {
        println!("{id}");
      }
      Ok(())
    }
    Command::Export { patient, session, path } => {
      let sessions = guardian_pipeline::SessionService::new(
        Arc::clone(&store),
        cfg.pipeline.app_name.clone(),
      );
      let s = sessions.open(&patient, &session).await;
      let Some(report) = s.board.health_report.as_deref() else {
        bail!("session {session} has no report yet");
      };
      write_report(&path, report).await?;
      Ok(())
    }
  }
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn patient(
  store: &Arc<SqliteStore>,
  id: Option<String>,
  name: Option<String>,
  phone: Option<String>,
) -> Result<()> {
  if let Some(id) = id {
    let p = store.upsert_patient_info(PatientId::new(id), name, phone).await?;
    println!("{}", serde_json::to_string_pretty(&p)?);
    return Ok(());
  }

  let resolver = guardian_pipeline::IdentityResolver::new(Arc::clone(store));
  let resolution = resolver
    .resolve_or_create(None, name.as_deref(), phone.as_deref())
    .await?;
  let verb = if resolution.is_new() { "registered" } else { "found" };
  println!("{} ({verb})", resolution.patient_id());
  Ok(())
}

async fn records(
  store: &SqliteStore,
  patient: PatientId,
  category: Option<HealthCategory>,
) -> Result<()> {
  let out = match category {
    Some(category) => store
      .latest_health_record(patient, category)
      .await?
      .unwrap_or(serde_json::Value::Null),
    None => serde_json::to_value(store.latest_health_records(patient).await?)?,
  };
  println!("{}", serde_json::to_string_pretty(&out)?);
  Ok(())
}

struct Turn {
  patient: Option<String>,
  name:    Option<String>,
  phone:   Option<String>,
  session: Option<String>,
  message: String,
  out:     Option<PathBuf>,
}

async fn run(pipeline: &Pipeline<HttpGenerator, SqliteStore>, turn: Turn) -> Result<()> {
  let held = turn.patient.map(PatientId::new);
  let resolution = pipeline
    .identity()
    .resolve_or_create(held.as_ref(), turn.name.as_deref(), turn.phone.as_deref())
    .await
    .context("cannot identify patient; pass --patient, --name or --phone")?;
  let patient_id = resolution.patient_id().clone();

  let session_id = turn
    .session
    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
  let sessions = pipeline.sessions();
  let mut session = sessions.open(patient_id.as_str(), &session_id).await;

  session.board.patient_id = Some(patient_id);
  if turn.name.is_some() {
    session.board.patient_name = turn.name;
  }
  if turn.phone.is_some() {
    session.board.patient_phone = turn.phone;
  }
  session.board.user_message = Some(turn.message.clone());
  if !sessions.record_message(&mut session, Role::User, turn.message).await {
    tracing::warn!(%session_id, "user message was not saved to the transcript");
  }

  let result = pipeline.run(&mut session).await;
  let markdown = result.report.to_markdown();
  if !sessions
    .record_message(&mut session, Role::Agent, markdown.clone())
    .await
  {
    tracing::warn!(%session_id, "report was not saved to the transcript");
  }

  if let Some(path) = &turn.out {
    write_report(path, &markdown).await?;
  }

  println!("{markdown}");
  match result.status() {
    RunStatus::Complete => tracing::info!(%session_id, "session saved"),
    RunStatus::Incomplete { stages } => {
      tracing::warn!(%session_id, ?stages, "report is missing validated sections");
    }
  }
  if !result.durable {
    tracing::warn!(%session_id, "session state may not have been saved");
  }
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
