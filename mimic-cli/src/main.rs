//! mimic CLI: import chat history, print style prompts, inspect and manage learned data.
//! Config from `--config` / MIMIC_CONFIG, with DATABASE_URL and LOG_FILE overrides.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use learning::{ImportOptions, StyleEngine};
use mimic_cli::{open_engine, Cli, Commands};
use mimic_core::{init_tracing, StyleConfig};
use serde_json::json;
use storage::{RecordScope, StyleStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = StyleConfig::load(cli.config.as_deref()).context("Load config")?;
    init_tracing(&config.logging)?;

    let engine = open_engine(config).await?;

    match cli.command {
        Commands::Import {
            user,
            session,
            file,
            speaker,
        } => handle_import(&engine, &user, &session, &file, speaker).await,
        Commands::Prompt {
            user,
            session,
            level,
        } => handle_prompt(&engine, &user, &session, level).await,
        Commands::Stats => handle_stats(&engine).await,
        Commands::Export { user } => handle_export(&engine, user.as_deref()).await,
        Commands::Restore { file } => handle_restore(&engine, &file).await,
        Commands::Clear { user, session } => {
            handle_clear(&engine, user.as_deref(), session.as_deref()).await
        }
    }
}

async fn handle_import(
    engine: &StyleEngine,
    user: &str,
    session: &str,
    file: &Path,
    speaker: Option<String>,
) -> Result<()> {
    let mut options = ImportOptions::default();
    if let Some(speaker) = speaker {
        options = options.with_speaker(speaker);
    }

    let report = engine
        .import_chat_history_with(user, session, file, options)
        .await
        .with_context(|| format!("Import {}", file.display()))?;

    println!(
        "Total: {}, Imported: {}, Filtered: {} (rejected {}, duplicates {}, other speakers {}), Malformed: {}, Time: {}ms",
        report.total_lines,
        report.imported,
        report.skipped_filtered,
        report.rejected,
        report.duplicates,
        report.other_speakers,
        report.malformed,
        report.elapsed_ms
    );
    Ok(())
}

async fn handle_prompt(
    engine: &StyleEngine,
    user: &str,
    session: &str,
    level: Option<f64>,
) -> Result<()> {
    let prompt = match level {
        Some(level) => {
            engine
                .get_style_prompt_with_level(user, session, &[], level)
                .await
        }
        None => engine.get_style_prompt(user, session, &[]).await,
    };
    println!("{}", prompt);
    Ok(())
}

async fn handle_stats(engine: &StyleEngine) -> Result<()> {
    let statistics = engine.get_statistics().await;
    let messages = engine
        .store()
        .message_stats(&RecordScope::all())
        .await
        .context("Query message statistics")?;

    let report = json!({
        "engine": statistics,
        "stored_messages": {
            "total": messages.total_messages,
            "unique_users": messages.unique_users,
            "unique_sessions": messages.unique_sessions,
            "first_message": messages.first_message,
            "last_message": messages.last_message,
        },
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn handle_export(engine: &StyleEngine, user: Option<&str>) -> Result<()> {
    let json = engine.export_profiles(user).await?;
    println!("{}", json);
    Ok(())
}

async fn handle_restore(engine: &StyleEngine, file: &Path) -> Result<()> {
    let json = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Read {}", file.display()))?;
    let restored = engine.restore_profiles(&json).await?;
    println!("Restored {} profile(s) from {}", restored, file.display());
    Ok(())
}

async fn handle_clear(
    engine: &StyleEngine,
    user: Option<&str>,
    session: Option<&str>,
) -> Result<()> {
    let report = engine.clear_data(user, session).await?;
    println!(
        "Removed {} profile(s) and {} message(s)",
        report.profiles_removed, report.messages_removed
    );
    Ok(())
}
