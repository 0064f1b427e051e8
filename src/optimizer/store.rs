//! One JSON file per study

use super::{Study, StudyError, StudyResult};
use crate::config::env_var;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_EXPERIMENT_DIR: &str = "ax_experiments";

/// Keep alphanumerics, space, `_` and `-`
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[derive(Debug, Clone)]
pub struct StudyStore {
    dir: PathBuf,
}

impl StudyStore {
    /// Open (and create if needed) the study directory
    pub fn open<P: AsRef<Path>>(dir: P) -> StudyResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory from `AX_EXPERIMENT_DIR`
    pub fn from_env() -> StudyResult<Self> {
        Self::open(env_var("AX_EXPERIMENT_DIR").unwrap_or_else(|| DEFAULT_EXPERIMENT_DIR.to_string()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> StudyResult<PathBuf> {
        let clean = sanitize_name(name);
        if clean.is_empty() {
            return Err(StudyError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{clean}.json")))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_ok_and(|p| p.exists())
    }

    /// Persist a new study; fails if one with the same file name exists
    pub fn create(&self, study: &Study) -> StudyResult<PathBuf> {
        let path = self.path_for(&study.name)?;
        if path.exists() {
            return Err(StudyError::AlreadyExists(study.name.clone()));
        }
        write_study(&path, study)?;
        tracing::info!(study = %study.name, path = %path.display(), "Study created");
        Ok(path)
    }

    pub fn load(&self, name: &str) -> StudyResult<Study> {
        let path = self.path_for(name)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StudyError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, study: &Study) -> StudyResult<()> {
        let path = self.path_for(&study.name)?;
        write_study(&path, study)
    }
}

/// Write through a temp file so a crash never leaves half a study
fn write_study(path: &Path, study: &Study) -> StudyResult<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(study)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
