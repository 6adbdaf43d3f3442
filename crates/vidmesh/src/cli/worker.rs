//! Worker command - serve one capability on a ROUTER socket

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use vidmesh_intent::{Clarifier, CommandEmbedder, Embedder, HashingEmbedder, IntentClassifier};
use vidmesh_protocol::defaults::{DETECTION_SCORE_THRESHOLD, MAX_IN_FLIGHT_REQUESTS};
use vidmesh_protocol::{ArtifactStore, SystemConfig};
use vidmesh_worker::engines::SUMMARY_MAX_CHARS;
use vidmesh_worker::{
    CommandDetector, CommandRenderer, CommandSpeechToText, DependencyResolver, GenerationService,
    IntentService, Service, TranscriptionService, TruncatingSummarizer, VisionService,
    WorkerClient, WorkerServer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Role {
    Transcribe,
    Vision,
    Generate,
    Intent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Transcribe => "transcribe",
            Role::Vision => "vision",
            Role::Generate => "generate",
            Role::Intent => "intent",
        }
    }

    fn default_addr<'a>(&self, config: &'a SystemConfig) -> &'a str {
        match self {
            Role::Transcribe => &config.transcribe_addr,
            Role::Vision => &config.vision_addr,
            Role::Generate => &config.generate_addr,
            Role::Intent => &config.intent_addr,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct WorkerArgs {
    /// Capability to serve
    #[arg(long, value_enum)]
    pub role: Role,

    /// Endpoint to bind (defaults to the role's configured address)
    #[arg(long)]
    pub bind: Option<String>,

    /// External engine program: speech-to-text, detector or renderer
    #[arg(long)]
    pub engine: Option<PathBuf>,

    /// Extra arguments passed to the engine before the input path
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    pub engine_args: Vec<String>,

    /// Embedding program for the intent role (hashing embedder if unset)
    #[arg(long)]
    pub embedder: Option<String>,

    #[arg(long = "embedder-arg", allow_hyphen_values = true)]
    pub embedder_args: Vec<String>,

    /// Detections scoring below this are dropped (vision role)
    #[arg(long, default_value_t = DETECTION_SCORE_THRESHOLD)]
    pub threshold: f32,

    /// Transcript summary length in characters (generate role)
    #[arg(long, default_value_t = SUMMARY_MAX_CHARS)]
    pub summary_chars: usize,

    /// Requests handled concurrently
    #[arg(long, default_value_t = MAX_IN_FLIGHT_REQUESTS)]
    pub max_in_flight: usize,
}

impl WorkerArgs {
    fn require_engine(&self) -> Result<PathBuf> {
        match &self.engine {
            Some(engine) => Ok(engine.clone()),
            None => bail!(
                "the {} worker needs --engine <program>",
                self.role.as_str()
            ),
        }
    }
}

async fn build_service(args: &WorkerArgs, config: &SystemConfig) -> Result<Arc<dyn Service>> {
    let store = ArtifactStore::new(&config.uploads_dir, &config.artifacts_dir);

    let service: Arc<dyn Service> = match args.role {
        Role::Transcribe => {
            let engine = CommandSpeechToText::new(args.require_engine()?, args.engine_args.clone());
            Arc::new(TranscriptionService::new(Arc::new(engine), store))
        }
        Role::Vision => {
            let detector = CommandDetector::new(args.require_engine()?, args.engine_args.clone());
            Arc::new(VisionService::new(Arc::new(detector), store).with_threshold(args.threshold))
        }
        Role::Generate => {
            let renderer = CommandRenderer::new(args.require_engine()?, args.engine_args.clone());
            let resolver = DependencyResolver::new(
                store,
                WorkerClient::connect(&config.transcribe_addr),
                WorkerClient::connect(&config.vision_addr),
            );
            Arc::new(GenerationService::new(
                resolver,
                Arc::new(TruncatingSummarizer::new(args.summary_chars)),
                Arc::new(renderer),
            ))
        }
        Role::Intent => {
            let embedder: Arc<dyn Embedder> = match &args.embedder {
                Some(program) => Arc::new(CommandEmbedder::new(
                    program.clone(),
                    args.embedder_args.clone(),
                )),
                None => Arc::new(HashingEmbedder::default()),
            };
            let classifier = IntentClassifier::new(embedder)
                .await
                .context("Failed to embed intent reference phrases")?;
            let clarifier = Clarifier::new(Arc::new(classifier));
            Arc::new(IntentService::new(Arc::new(clarifier)))
        }
    };
    Ok(service)
}

pub async fn run(args: WorkerArgs, config: &SystemConfig) -> Result<()> {
    let service = build_service(&args, config).await?;
    let addr = args
        .bind
        .clone()
        .unwrap_or_else(|| args.role.default_addr(config).to_string());

    let (server, shutdown_tx) =
        WorkerServer::bind_with_capacity(&addr, service, args.max_in_flight).await?;
    install_signal_handler(shutdown_tx)?;

    info!("{} worker ready on {}", args.role.as_str(), addr);
    server.run().await
}

/// Forward SIGINT/SIGTERM (Ctrl-C on Windows) to the server's shutdown channel.
fn install_signal_handler(shutdown_tx: mpsc::Sender<()>) -> Result<()> {
    #[cfg(unix)]
    {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        std::thread::spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("Received signal {}, shutting down...", sig);
                let _ = shutdown_tx.blocking_send(());
            }
        });
    }

    #[cfg(windows)]
    {
        ctrlc::set_handler(move || {
            info!("Received Ctrl-C, shutting down...");
            let _ = shutdown_tx.blocking_send(());
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: WorkerArgs,
    }

    #[test]
    fn test_engine_args_keep_hyphens() {
        let parsed = Harness::parse_from([
            "worker",
            "--role",
            "vision",
            "--engine",
            "detect.sh",
            "--engine-arg",
            "--model=yolo",
        ]);
        assert_eq!(parsed.args.role, Role::Vision);
        assert_eq!(parsed.args.engine_args, vec!["--model=yolo"]);
        assert_eq!(parsed.args.threshold, DETECTION_SCORE_THRESHOLD);
        assert_eq!(parsed.args.max_in_flight, MAX_IN_FLIGHT_REQUESTS);
    }

    #[tokio::test]
    async fn test_engine_required_for_media_roles() {
        let parsed = Harness::parse_from(["worker", "--role", "transcribe"]);
        let err = build_service(&parsed.args, &SystemConfig::default())
            .await
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains("--engine"));
    }

    #[tokio::test]
    async fn test_intent_role_needs_no_engine() {
        let parsed = Harness::parse_from(["worker", "--role", "intent"]);
        let service = build_service(&parsed.args, &SystemConfig::default())
            .await
            .unwrap();
        assert_eq!(service.name(), "intent");
    }
}
