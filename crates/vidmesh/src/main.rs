//! Vidmesh launcher
//!
//! One binary for both sides of the pipeline:
//! - `vidmesh worker --role <role>` serves one worker capability
//! - every other subcommand drives the gateway against running workers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use vidmesh_logging::{init_logging, LogConfig};
use vidmesh_protocol::defaults::{
    DEFAULT_GENERATE_ADDR, DEFAULT_INTENT_ADDR, DEFAULT_TRANSCRIBE_ADDR, DEFAULT_VISION_ADDR,
};
use vidmesh_protocol::SystemConfig;

mod cli;

use cli::worker::WorkerArgs;

#[derive(Parser, Debug)]
#[command(name = "vidmesh", about = "Local video analysis over ZeroMQ workers")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    endpoints: Endpoints,

    #[command(subcommand)]
    command: Commands,
}

/// Worker addresses. The same values configure the gateway and the
/// generation worker's upstream clients.
#[derive(clap::Args, Debug, Clone)]
struct Endpoints {
    #[arg(long, global = true, env = "VIDMESH_TRANSCRIBE_ADDR", default_value = DEFAULT_TRANSCRIBE_ADDR)]
    transcribe_addr: String,

    #[arg(long, global = true, env = "VIDMESH_VISION_ADDR", default_value = DEFAULT_VISION_ADDR)]
    vision_addr: String,

    #[arg(long, global = true, env = "VIDMESH_GENERATE_ADDR", default_value = DEFAULT_GENERATE_ADDR)]
    generate_addr: String,

    #[arg(long, global = true, env = "VIDMESH_INTENT_ADDR", default_value = DEFAULT_INTENT_ADDR)]
    intent_addr: String,

    /// Overrides ~/.vidmesh/uploads
    #[arg(long, global = true, env = "VIDMESH_UPLOADS_DIR")]
    uploads_dir: Option<PathBuf>,

    /// Overrides ~/.vidmesh/artifacts
    #[arg(long, global = true, env = "VIDMESH_ARTIFACTS_DIR")]
    artifacts_dir: Option<PathBuf>,
}

impl Endpoints {
    fn into_config(self) -> SystemConfig {
        let mut config = SystemConfig {
            transcribe_addr: self.transcribe_addr,
            vision_addr: self.vision_addr,
            generate_addr: self.generate_addr,
            intent_addr: self.intent_addr,
            ..SystemConfig::default()
        };
        if let Some(dir) = self.uploads_dir {
            config.uploads_dir = dir;
        }
        if let Some(dir) = self.artifacts_dir {
            config.artifacts_dir = dir;
        }
        config
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve one worker role until interrupted
    Worker(WorkerArgs),

    /// Copy an .mp4 into the uploads directory
    Upload {
        /// Video to upload
        path: PathBuf,
    },

    /// Transcribe an uploaded video
    Transcribe {
        /// Name returned by `upload`
        file: String,
    },

    /// Detect objects in an uploaded video
    Detect {
        /// Name returned by `upload`
        file: String,
    },

    /// Render a summary report
    Generate {
        /// Name returned by `upload`
        file: String,

        /// pdf or pptx
        #[arg(short, long, default_value = "pdf")]
        format: String,
    },

    /// Ask what to do in plain language
    Clarify {
        /// Free-form request, e.g. "make slides"
        query: String,

        /// Conversation id for follow-up memory
        #[arg(long)]
        session: Option<String>,

        /// Run the resolved action against this upload
        #[arg(long)]
        file: Option<String>,
    },

    /// Show or clear the conversation history
    History {
        /// Number of most recent entries to show
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,

        /// Delete every entry
        #[arg(long)]
        clear: bool,
    },

    /// Locate a rendered report, optionally copying it out
    Download {
        /// Report file name, e.g. <file>_summary.pdf
        name: String,

        /// Copy the report into this directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn app_name(command: &Commands) -> String {
    match command {
        Commands::Worker(args) => format!("vidmesh-{}-worker", args.role.as_str()),
        _ => "vidmesh".to_string(),
    }
}

fn run_command(cli: Cli) -> Result<()> {
    let config = cli.endpoints.into_config();
    let json = cli.json;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Commands::Worker(args) => cli::worker::run(args, &config).await,
            Commands::Upload { path } => cli::gateway::upload(&config, &path, json),
            Commands::Transcribe { file } => cli::gateway::transcribe(&config, &file, json).await,
            Commands::Detect { file } => cli::gateway::detect(&config, &file, json).await,
            Commands::Generate { file, format } => {
                cli::gateway::generate(&config, &file, &format, json).await
            }
            Commands::Clarify {
                query,
                session,
                file,
            } => cli::gateway::clarify(&config, &query, session.as_deref(), file.as_deref(), json).await,
            Commands::History { limit, clear } => cli::history::run(&config, limit, clear, json),
            Commands::Download { name, output } => {
                cli::gateway::download(&config, &name, output.as_deref(), json)
            }
        }
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match init_logging(LogConfig {
        app_name: &app_name(&cli.command),
        verbose: cli.verbose,
        logs_dir: None,
    }) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {:#}", err);
            None
        }
    };

    let json = cli.json;
    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json {
                cli::error::print_json_error(&err);
            } else {
                eprintln!("{}", cli::error::render(&err));
            }
            ExitCode::from(1)
        }
    }
}
