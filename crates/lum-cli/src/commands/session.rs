use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, bail};
use lum_core::entities::LogEntry;
use lum_core::enums::LogLevel;
use lum_migrate::logger::SessionLogWriter;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::SessionCommands;
use crate::commands::parse::parse_enum;
use crate::context::AppContext;
use crate::output::output;

/// Handle `lum session`.
pub fn handle(action: &SessionCommands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match action {
        SessionCommands::Report { session_id, level } => {
            let Some(log_dir) = ctx.config.logging.log_dir() else {
                bail!("session file logging is disabled (logging.log_dir is empty)");
            };
            let min_level = level
                .as_deref()
                .map(|raw| parse_enum::<LogLevel>(raw, "level"))
                .transpose()?;
            let entries = read_session_log(&log_dir, session_id, min_level)?;
            output(&entries, flags.format)
        }
    }
}

fn read_session_log(
    log_dir: &Path,
    session_id: &str,
    min_level: Option<LogLevel>,
) -> anyhow::Result<Vec<LogEntry>> {
    if session_id.is_empty()
        || !session_id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        bail!("invalid session id '{session_id}'");
    }

    let writer = SessionLogWriter::new(log_dir.to_path_buf())
        .with_context(|| format!("failed to open log directory {}", log_dir.display()))?;
    let mut entries = match writer.read(session_id) {
        Ok(entries) => entries,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            bail!("no log found for session {session_id} in {}", log_dir.display())
        }
        Err(error) => {
            return Err(error).with_context(|| format!("failed to read log for session {session_id}"));
        }
    };

    if let Some(min_level) = min_level {
        entries.retain(|entry| entry.level >= min_level);
    }
    Ok(entries)
}
