use crate::error::{TrainingError, TrainingResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Default artifact holding the checkpoints of a tracked run.
#[must_use]
pub fn default_checkpoint_artifact(run_id: &str) -> String {
    format!("checkpoint-{run_id}:latest")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactAlias {
    Latest,
    Version(u32),
}

/// Parsed `name[:alias]` artifact reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub name: String,
    pub alias: ArtifactAlias,
}

impl ArtifactRef {
    /// Parse `name`, `name:latest` or `name:vN`. An `entity/project/` prefix
    /// is dropped.
    pub fn parse(reference: &str) -> TrainingResult<Self> {
        let reference = reference.rsplit('/').next().unwrap_or(reference).trim();
        let (name, alias) = match reference.split_once(':') {
            Some((name, alias)) => (name, alias),
            None => (reference, "latest"),
        };

        if name.is_empty() {
            return Err(TrainingError::Artifact(format!("artifact reference has no name: {reference}")));
        }

        let alias = if alias == "latest" {
            ArtifactAlias::Latest
        } else if let Some(version) = alias.strip_prefix('v').and_then(|v| v.parse().ok()) {
            ArtifactAlias::Version(version)
        } else {
            return Err(TrainingError::Artifact(format!(
                "unsupported artifact alias `{alias}` (expected `latest` or `v<N>`)"
            )));
        };

        Ok(Self { name: name.to_string(), alias })
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.alias {
            ArtifactAlias::Latest => write!(f, "{}:latest", self.name),
            ArtifactAlias::Version(v) => write!(f, "{}:v{v}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    /// Path relative to the artifact root.
    pub path: PathBuf,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub name: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    /// Run that logged this version.
    pub run_id: String,
    pub files: Vec<ArtifactFile>,
}

pub fn sha256_file(path: &Path) -> TrainingResult<String> {
    let mut file = std::fs::File::open(path)
        .map_err(|source| TrainingError::ReadPath { path: path.to_path_buf(), source })?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Copy every file under `src` into `dest`, returning relative paths with
/// digests in a stable order.
pub fn copy_tree(src: &Path, dest: &Path) -> TrainingResult<Vec<ArtifactFile>> {
    if !src.is_dir() {
        return Err(TrainingError::Artifact(format!(
            "artifact source is not a directory: {}",
            src.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(src).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| TrainingError::Artifact(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| TrainingError::Artifact(e.to_string()))?
            .to_path_buf();
        let target = dest.join(&rel);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(entry.path(), &target)
            .map_err(|source| TrainingError::WritePath { path: target.clone(), source })?;

        files.push(ArtifactFile { sha256: sha256_file(&target)?, path: rel });
    }

    Ok(files)
}

/// Check that `root` holds every file in `files` with matching digests.
pub fn verify_files(root: &Path, files: &[ArtifactFile]) -> TrainingResult<()> {
    for file in files {
        let actual = sha256_file(&root.join(&file.path))?;
        if actual != file.sha256 {
            return Err(TrainingError::Artifact(format!(
                "digest mismatch for {}: expected {}, found {}",
                file.path.display(),
                file.sha256,
                actual
            )));
        }
    }
    Ok(())
}
