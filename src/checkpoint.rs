use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{RecapError, Result};

pub const CHECKPOINT_FILE: &str = "video_checkpoint.json";

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Ocr,
    Scripts,
    Audio,
    Video,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Ocr, Stage::Scripts, Stage::Audio, Stage::Video];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Ocr => "ocr",
            Stage::Scripts => "scripts",
            Stage::Audio => "audio",
            Stage::Video => "video",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Progress record persisted between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineCheckpoint {
    pub last_step: Option<Stage>,
    /// Local time, `%Y-%m-%d %H:%M:%S`
    pub timestamp: String,
    /// Stage name -> artifact path
    #[serde(default)]
    pub data: BTreeMap<String, PathBuf>,
}

impl Default for PipelineCheckpoint {
    fn default() -> Self {
        Self {
            last_step: None,
            timestamp: now_timestamp(),
            data: BTreeMap::new(),
        }
    }
}

impl PipelineCheckpoint {
    /// Whether `stage` was completed according to this checkpoint
    pub fn reached(&self, stage: Stage) -> bool {
        self.last_step.is_some_and(|last| last >= stage)
    }

    pub fn complete(&mut self, stage: Stage, artifact: &Path) {
        self.last_step = Some(stage);
        self.timestamp = now_timestamp();
        self.data.insert(stage.name().to_string(), artifact.to_path_buf());
        // Later stages are stale once an earlier one is redone
        self.data
            .retain(|name, _| Stage::ALL.iter().any(|s| s.name() == name && *s <= stage));
    }
}

fn now_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Serialize to a sibling temp file, fsync, then rename over `path`
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| RecapError::Checkpoint(format!("path has no parent: {}", path.display())))?;
    tokio::fs::create_dir_all(parent).await?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value)?;

    let mut file = tokio::fs::File::create(&tmp_path).await?;
    file.write_all(&data).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }
    Ok(())
}

/// Owner of the checkpoint file inside the temp directory
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(temp_dir: &Path) -> Self {
        Self {
            path: temp_dir.join(CHECKPOINT_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or unreadable checkpoint counts as no progress
    pub async fn load(&self) -> Option<PipelineCheckpoint> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(_) => {
                debug!("No checkpoint at {}", self.path.display());
                return None;
            }
        };

        match serde_json::from_str::<PipelineCheckpoint>(&content) {
            Ok(checkpoint) => {
                info!(
                    "Loaded checkpoint: last step {} at {}",
                    checkpoint.last_step.map(|s| s.name()).unwrap_or("none"),
                    checkpoint.timestamp
                );
                Some(checkpoint)
            }
            Err(e) => {
                warn!("Ignoring unreadable checkpoint {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub async fn save(&self, checkpoint: &PipelineCheckpoint) -> Result<()> {
        write_json_atomic(&self.path, checkpoint).await?;
        debug!("Checkpoint saved at step {:?}", checkpoint.last_step);
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
