//! Gateway commands - upload, run actions, clarify, download

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use vidmesh_gateway::{Gateway, JsonlAuditLog};
use vidmesh_intent::{Directive, DirectiveKind, SessionId};
use vidmesh_protocol::{ReportFormat, SystemConfig};

fn open_gateway(config: &SystemConfig) -> Gateway {
    let audit = Arc::new(JsonlAuditLog::new(&config.audit_log_path));
    Gateway::from_config(config, audit)
}

fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce()) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human();
    }
    Ok(())
}

pub fn upload(config: &SystemConfig, path: &Path, json: bool) -> Result<()> {
    let gateway = open_gateway(config);
    let file = gateway.upload(path)?;
    let stored = gateway.store().input_path(&file);

    emit(
        json,
        &serde_json::json!({ "file": file, "path": stored }),
        || {
            println!("Uploaded: {}", file);
            println!("Saved to: {}", stored.display());
        },
    )
}

pub async fn transcribe(config: &SystemConfig, file: &str, json: bool) -> Result<()> {
    let transcript = open_gateway(config).transcribe(file).await?;
    emit(json, &serde_json::json!({ "transcript": transcript }), || {
        println!("{}", transcript)
    })
}

pub async fn detect(config: &SystemConfig, file: &str, json: bool) -> Result<()> {
    let objects = open_gateway(config).detect(file).await?;
    emit(json, &serde_json::json!({ "objects": objects }), || {
        print_objects(&objects)
    })
}

pub async fn generate(config: &SystemConfig, file: &str, format: &str, json: bool) -> Result<()> {
    let report_path = open_gateway(config).generate(file, format).await?;
    emit(json, &serde_json::json!({ "report_path": report_path }), || {
        println!("Report generated: {}", report_path)
    })
}

pub async fn clarify(
    config: &SystemConfig,
    query: &str,
    session: Option<&str>,
    file: Option<&str>,
    json: bool,
) -> Result<()> {
    let session = session
        .map(|s| s.parse::<SessionId>())
        .transpose()
        .context("--session must be a UUID")?;

    let gateway = open_gateway(config);
    let directive = gateway.clarify(query, session).await?;

    let Some(file) = file.filter(|_| directive.kind.is_executable()) else {
        return emit(json, &directive, || print_directive(&directive));
    };

    if !json {
        println!("{}", directive.message);
    }
    let outputs = execute(&gateway, &directive, file).await?;
    emit(
        json,
        &serde_json::json!({ "directive": directive, "outputs": outputs }),
        || {
            for output in &outputs {
                println!("{}", output);
            }
        },
    )
}

/// Run an executable directive against `file`, one action per report
/// format for `generate_both`.
async fn execute(gateway: &Gateway, directive: &Directive, file: &str) -> Result<Vec<String>> {
    let outputs = match directive.kind {
        DirectiveKind::Transcribe => vec![gateway.transcribe(file).await?],
        DirectiveKind::Detect => {
            let objects = gateway.detect(file).await?;
            vec![format!("Objects: {}", objects.join(", "))]
        }
        DirectiveKind::GeneratePdf => vec![gateway.generate(file, ReportFormat::Pdf.as_str()).await?],
        DirectiveKind::GeneratePptx => {
            vec![gateway.generate(file, ReportFormat::Pptx.as_str()).await?]
        }
        DirectiveKind::GenerateBoth => {
            let mut paths = Vec::with_capacity(ReportFormat::ALL.len());
            for format in ReportFormat::ALL {
                paths.push(gateway.generate(file, format.as_str()).await?);
            }
            paths
        }
        DirectiveKind::AskGenerateFormat | DirectiveKind::Clarify => Vec::new(),
    };
    Ok(outputs)
}

pub fn download(config: &SystemConfig, name: &str, output: Option<&Path>, json: bool) -> Result<()> {
    let source = open_gateway(config).locate_report(name)?;

    let delivered = match output {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let dest = dir.join(name);
            fs::copy(&source, &dest)
                .with_context(|| format!("Failed to copy report to {}", dest.display()))?;
            dest
        }
        None => source,
    };

    emit(json, &serde_json::json!({ "path": delivered }), || {
        println!("{}", delivered.display())
    })
}

fn print_objects(objects: &[String]) {
    if objects.is_empty() {
        println!("No objects detected.");
        return;
    }
    println!("Objects detected:");
    for object in objects {
        println!("  - {}", object);
    }
}

fn print_directive(directive: &Directive) {
    println!("{}", directive.message);
    for (i, option) in directive.options.iter().enumerate() {
        println!("  {}. {}", i + 1, option);
    }
}
