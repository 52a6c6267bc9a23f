//! bitinfo - scores, timetable and exams from the campus portal.
//!
//! Each command restores the linked account's session from the store, runs
//! against the portal, and writes the updated session back, even when the
//! command itself failed partway.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use bitinfo_core::{
    Config, CourseFile, CredentialStore, Credentials, ExamRecord, FileStore, HttpTransport,
    ScheduleEvent, ScoreRecord, Session, SessionState, SessionStore,
};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Timeout applied to each request when the config sets none
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const USERNAME_VAR: &str = "BITINFO_USERNAME";
const PASSWORD_VAR: &str = "BITINFO_PASSWORD";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Parser)]
#[command(name = "bitinfo", version, about = "Scores, timetable and exams from the campus portal")]
struct Cli {
    /// Student id. Defaults to $BITINFO_USERNAME, then the last linked account.
    #[arg(long, short, global = true)]
    user: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, store the password in the OS keychain and save the session
    Link,
    /// Forget the saved session and the stored password
    Unlink,
    /// Show the linked account and login status
    Info,
    /// Fetch scores published since the last run
    Scores {
        /// Re-fetch analytics for every course, not only new ones
        #[arg(long)]
        all: bool,
    },
    /// List every class meeting of a term
    Schedule {
        /// Term code such as 2021-2022-1. Defaults to the current term.
        #[arg(long)]
        term: Option<String>,
    },
    /// List exam arrangements
    Exams {
        #[arg(long)]
        term: Option<String>,
    },
    /// List the files of a course on the learning platform
    Files {
        course_id: String,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=bitinfo_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    let store = FileStore::new(config.store_dir()?)?;
    let timeout = config
        .request_timeout()
        .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

    match cli.command {
        Commands::Link => link(&mut config, &store, cli.user, timeout).await,
        Commands::Unlink => unlink(&mut config, &store, cli.user),
        command => {
            let id = resolve_username(cli.user, &config)?;
            run(&config, &store, &id, timeout, command, cli.json).await
        }
    }
}

fn resolve_username(flag: Option<String>, config: &Config) -> Result<String> {
    flag.or_else(|| std::env::var(USERNAME_VAR).ok())
        .or_else(|| config.last_username.clone())
        .ok_or_else(|| anyhow::anyhow!("No account linked. Run `bitinfo link` first."))
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn password_for(id: &str) -> Result<Credentials> {
    let secret = match std::env::var(PASSWORD_VAR) {
        Ok(secret) => secret,
        Err(_) => rpassword::prompt_password(format!("Password for {}: ", id))?,
    };
    Ok(Credentials::new(id, secret))
}

fn save(store: &FileStore, session: &mut Session<HttpTransport>) -> Result<()> {
    let state = session.snapshot()?;
    store.put(&state.username, &state.to_blob()?)
}

async fn link(config: &mut Config, store: &FileStore, user: Option<String>, timeout: Duration) -> Result<()> {
    let id = match user.or_else(|| std::env::var(USERNAME_VAR).ok()) {
        Some(id) => id,
        None => prompt_line("Student ID: ")?,
    };
    if id.is_empty() {
        anyhow::bail!("Student ID is required");
    }
    let credentials = password_for(&id)?;

    let transport = HttpTransport::new(Some(timeout))?;
    let mut session = Session::bind(transport, credentials.clone(), config.session_options());
    session.ensure_authenticated().await.context("Login failed")?;
    let profile = session.profile().await?;

    CredentialStore::store(&credentials)?;
    save(store, &mut session)?;
    config.last_username = Some(id.clone());
    config.save()?;

    info!(user = %id, "Account linked");
    println!("Linked {} ({}, {})", id, profile.display_name, profile.department);
    Ok(())
}

fn unlink(config: &mut Config, store: &FileStore, user: Option<String>) -> Result<()> {
    let id = resolve_username(user, config)?;
    store.delete(&id)?;
    if let Err(e) = CredentialStore::delete(&id) {
        warn!(user = %id, error = %e, "No stored password to delete");
    }
    if config.last_username.as_deref() == Some(id.as_str()) {
        config.last_username = None;
        config.save()?;
    }
    println!("Unlinked {}", id);
    Ok(())
}

async fn run(
    config: &Config,
    store: &FileStore,
    id: &str,
    timeout: Duration,
    command: Commands,
    json: bool,
) -> Result<()> {
    let blob = store
        .get(id)?
        .ok_or_else(|| anyhow::anyhow!("No saved session for {}. Run `bitinfo link` first.", id))?;
    let state = SessionState::from_blob(&blob)?;

    let transport = HttpTransport::new(Some(timeout))?;
    let mut session = Session::restore(transport, state, config.session_options())?;
    let credentials = if std::env::var(PASSWORD_VAR).is_ok() {
        Some(password_for(id)?)
    } else {
        CredentialStore::load(id)
            .map_err(|e| warn!(user = %id, error = %e, "No stored password, using saved cookies only"))
            .ok()
    };
    if let Some(credentials) = credentials {
        session.set_credentials(credentials)?;
    }

    let outcome = execute(&mut session, command, json).await;
    save(store, &mut session)?;
    outcome
}

async fn execute(session: &mut Session<HttpTransport>, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Info => {
            let profile = session.profile().await?;
            let term = session.current_term().await?;
            let phase = session.ensure_authenticated().await?;
            if json {
                let value = serde_json::json!({
                    "id": session.state().username,
                    "name": profile.display_name,
                    "department": profile.department,
                    "term": term,
                    "status": phase.to_string(),
                    "cached_scores": session.state().scores.len(),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{} {} ({})", session.state().username, profile.display_name, profile.department);
                println!("Term:          {}", term);
                println!("Status:        {}", phase);
                println!("Cached scores: {}", session.state().scores.len());
            }
        }
        Commands::Scores { all } => {
            let delta = session.refresh_scores(all).await?;
            let records: Vec<&ScoreRecord> = delta.values().collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No new scores.");
            } else {
                print_scores(&records);
            }
        }
        Commands::Schedule { term } => {
            let events = session.term_schedule(term.as_deref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else {
                print_events(&events);
            }
        }
        Commands::Exams { term } => {
            let exams = session.exams(term.as_deref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&exams)?);
            } else {
                print_exams(&exams);
            }
        }
        Commands::Files { course_id } => {
            let files = session.course_files(&course_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                print_files(&files);
            }
        }
        Commands::Link | Commands::Unlink => {
            anyhow::bail!("link and unlink do not run against a restored session")
        }
    }
    Ok(())
}

fn print_scores(records: &[&ScoreRecord]) {
    for r in records {
        println!(
            "{:<12} {:<10} {:<24} {:>5} {:>5.1}  class {} of {}  major {} of {}  avg {:.1}  max {:.1}",
            r.term,
            r.course_id,
            r.name,
            r.credit,
            r.score,
            ScoreRecord::percent(r.class_rank),
            r.class_total,
            ScoreRecord::percent(r.majority_rank),
            r.majority_total,
            r.average,
            r.max,
        );
    }
}

fn print_events(events: &[ScheduleEvent]) {
    for e in events {
        println!(
            "week {:>2}  {} - {}  {}  {}",
            e.week,
            e.begin.format(TIME_FORMAT),
            e.end.format("%H:%M"),
            e.name,
            e.location
        );
    }
}

fn print_exams(exams: &[ExamRecord]) {
    if exams.is_empty() {
        println!("No exams scheduled.");
    }
    for e in exams {
        println!(
            "{} - {}  {}  {}  {}",
            e.begin.format(TIME_FORMAT),
            e.end.format("%H:%M"),
            e.name,
            e.location,
            e.description
        );
    }
}

fn print_files(files: &[CourseFile]) {
    for f in files {
        println!("{}\t{}", f.path(), f.url);
    }
}
