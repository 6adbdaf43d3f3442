//! System configuration shared by the gateway and the launcher.

use std::path::PathBuf;

use crate::{defaults, paths};

/// Where each worker listens and where the gateway keeps its files.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    pub transcribe_addr: String,
    pub vision_addr: String,
    pub generate_addr: String,
    pub intent_addr: String,
    /// Uploaded videos plus `.txt` / `.vision.txt` artifacts
    pub uploads_dir: PathBuf,
    /// Rendered reports
    pub artifacts_dir: PathBuf,
    /// JSON-lines audit history
    pub audit_log_path: PathBuf,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            transcribe_addr: defaults::DEFAULT_TRANSCRIBE_ADDR.to_string(),
            vision_addr: defaults::DEFAULT_VISION_ADDR.to_string(),
            generate_addr: defaults::DEFAULT_GENERATE_ADDR.to_string(),
            intent_addr: defaults::DEFAULT_INTENT_ADDR.to_string(),
            uploads_dir: paths::default_uploads_dir(),
            artifacts_dir: paths::default_artifacts_dir(),
            audit_log_path: paths::default_audit_log_path(),
        }
    }
}
