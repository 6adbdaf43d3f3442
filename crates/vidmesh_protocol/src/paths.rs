use std::path::PathBuf;
use std::sync::Once;

static CREATE_DIR_WARNED: Once = Once::new();

/// Resolve the vidmesh home directory.
///
/// Priority:
/// 1) VIDMESH_HOME
/// 2) HOME/USERPROFILE
/// 3) ./.vidmesh
pub fn vidmesh_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("VIDMESH_HOME") {
        return PathBuf::from(override_path);
    }
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        return PathBuf::from(home).join(".vidmesh");
    }
    PathBuf::from(".").join(".vidmesh")
}

fn ensure_dir(dir: &PathBuf) {
    if let Err(err) = std::fs::create_dir_all(dir) {
        CREATE_DIR_WARNED.call_once(|| {
            eprintln!(
                "Warning: failed to create vidmesh directory {}: {}. Set VIDMESH_HOME to a writable location.",
                dir.display(),
                err
            );
        });
    }
}

/// Uploaded inputs and their transcript / vision artifacts: ~/.vidmesh/uploads
pub fn default_uploads_dir() -> PathBuf {
    let dir = vidmesh_home().join("uploads");
    ensure_dir(&dir);
    dir
}

/// Rendered reports: ~/.vidmesh/artifacts
pub fn default_artifacts_dir() -> PathBuf {
    let dir = vidmesh_home().join("artifacts");
    ensure_dir(&dir);
    dir
}

/// Audit log: ~/.vidmesh/history.jsonl
pub fn default_audit_log_path() -> PathBuf {
    let home = vidmesh_home();
    ensure_dir(&home);
    home.join("history.jsonl")
}

/// Logs directory: ~/.vidmesh/logs
pub fn default_logs_dir() -> PathBuf {
    vidmesh_home().join("logs")
}
