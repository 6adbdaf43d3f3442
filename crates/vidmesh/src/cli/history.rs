//! History command - show or clear the audit log

use anyhow::{Context, Result};
use vidmesh_gateway::{AuditEntry, AuditRole, AuditSink, JsonlAuditLog};
use vidmesh_protocol::SystemConfig;

pub fn run(config: &SystemConfig, limit: usize, clear: bool, json: bool) -> Result<()> {
    let log = JsonlAuditLog::new(&config.audit_log_path);

    if clear {
        let removed = clear_history(&log)?;
        if json {
            println!("{}", serde_json::json!({ "cleared": removed }));
        } else {
            println!("Cleared {} history entries", removed);
        }
        return Ok(());
    }

    let entries = log
        .recent(limit)
        .with_context(|| format!("Failed to read {}", log.path().display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("No history yet.");
    } else {
        for entry in &entries {
            println!("{}", format_entry(entry));
        }
    }
    Ok(())
}

/// Empty the log, leaving a single system entry that records the clear.
fn clear_history(log: &JsonlAuditLog) -> Result<usize> {
    let removed = log
        .clear()
        .with_context(|| format!("Failed to clear {}", log.path().display()))?;
    log.append(AuditEntry::now(
        AuditRole::System,
        format!("Cleared {} messages.", removed),
    ))
    .with_context(|| format!("Failed to write {}", log.path().display()))?;
    Ok(removed)
}

fn format_entry(entry: &AuditEntry) -> String {
    format!(
        "[{}] {:<9} {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.role.to_string(),
        entry.text
    )
}
