//! Deterministic artifact locations.
//!
//! Any component can check whether an artifact exists without talking to the
//! worker that produces it. Writes overwrite in place; there is no versioning.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::{ArtifactKind, FileRef, ReportFormat};

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    uploads_dir: PathBuf,
    artifacts_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(uploads_dir: impl Into<PathBuf>, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            artifacts_dir: artifacts_dir.into(),
        }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    /// Location of the uploaded input itself.
    pub fn input_path(&self, file: &FileRef) -> PathBuf {
        self.uploads_dir.join(file.as_str())
    }

    /// `<uploads>/<stem>.txt` and `<uploads>/<stem>.vision.txt`.
    pub fn text_path(&self, file: &FileRef, kind: ArtifactKind) -> Option<PathBuf> {
        match kind {
            ArtifactKind::Transcript => Some(self.uploads_dir.join(format!("{}.txt", file.stem()))),
            ArtifactKind::VisionSummary => {
                Some(self.uploads_dir.join(format!("{}.vision.txt", file.stem())))
            }
            ArtifactKind::Report => None,
        }
    }

    /// `<artifacts>/<stem>_summary.<ext>`
    pub fn report_path(&self, file: &FileRef, format: ReportFormat) -> PathBuf {
        self.artifacts_dir
            .join(format!("{}_summary.{}", file.stem(), format.extension()))
    }

    pub fn exists(&self, file: &FileRef, kind: ArtifactKind) -> bool {
        match kind {
            ArtifactKind::Report => ReportFormat::ALL
                .iter()
                .any(|format| self.report_path(file, *format).exists()),
            _ => self
                .text_path(file, kind)
                .map(|path| path.exists())
                .unwrap_or(false),
        }
    }

    /// Read a text artifact; `Ok(None)` when it has not been produced yet.
    pub fn read_text(&self, file: &FileRef, kind: ArtifactKind) -> Result<Option<String>> {
        let Some(path) = self.text_path(file, kind) else {
            return Ok(None);
        };
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write (or overwrite) a text artifact and return where it landed.
    pub fn write_text(&self, file: &FileRef, kind: ArtifactKind, text: &str) -> Result<PathBuf> {
        let path = self.text_path(file, kind).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a text artifact", kind),
            )
        })?;
        fs::create_dir_all(&self.uploads_dir)?;
        fs::write(&path, text)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ArtifactStore {
        ArtifactStore::new(dir.path().join("uploads"), dir.path().join("artifacts"))
    }

    #[test]
    fn test_paths_are_deterministic() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let file = FileRef::parse("abc_clip.mp4").unwrap();

        assert_eq!(
            store.text_path(&file, ArtifactKind::Transcript).unwrap(),
            dir.path().join("uploads").join("abc_clip.txt")
        );
        assert_eq!(
            store.text_path(&file, ArtifactKind::VisionSummary).unwrap(),
            dir.path().join("uploads").join("abc_clip.vision.txt")
        );
        assert_eq!(
            store.report_path(&file, ReportFormat::Pptx),
            dir.path().join("artifacts").join("abc_clip_summary.pptx")
        );
        assert!(store.text_path(&file, ArtifactKind::Report).is_none());
    }

    #[test]
    fn test_write_overwrites_in_place() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let file = FileRef::parse("abc_clip.mp4").unwrap();

        assert!(!store.exists(&file, ArtifactKind::Transcript));
        assert_eq!(store.read_text(&file, ArtifactKind::Transcript).unwrap(), None);

        store
            .write_text(&file, ArtifactKind::Transcript, "first")
            .unwrap();
        store
            .write_text(&file, ArtifactKind::Transcript, "second")
            .unwrap();

        assert!(store.exists(&file, ArtifactKind::Transcript));
        assert_eq!(
            store.read_text(&file, ArtifactKind::Transcript).unwrap(),
            Some("second".to_string())
        );
    }

    #[test]
    fn test_report_is_not_a_text_artifact() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let file = FileRef::parse("abc_clip.mp4").unwrap();
        assert!(store.write_text(&file, ArtifactKind::Report, "x").is_err());
    }
}
