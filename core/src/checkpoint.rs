/// JSON checkpoints of learnable cell weights.
///
/// A checkpoint holds the cell configuration, the episode it was taken at,
/// and `CellParams` (controller + interface + output projection). Runtime
/// state (attention, memory) is per-sequence and never persisted.

use std::path::Path;

use serde::{Serialize, Deserialize};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::cell::{CellParams, MemoryCell};
use crate::config::CellConfig;
use crate::controller::Controller;
use crate::error::Result;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint<P> {
    pub episode: usize,
    pub config: CellConfig,
    pub params: CellParams<P>,
}

/// File name used for a given episode, e.g. `cell_episode_00042.json`.
pub fn checkpoint_file_name(episode: usize) -> String {
    format!("cell_episode_{episode:05}.json")
}

/// Save params + config to a JSON file.
pub fn save_checkpoint<P: Serialize + Clone>(
    path: &Path,
    episode: usize,
    params: &CellParams<P>,
    config: &CellConfig,
) -> Result<()> {
    let checkpoint = Checkpoint {
        episode,
        config: config.clone(),
        params: params.clone(),
    };
    let json = serde_json::to_string(&checkpoint)?;
    std::fs::write(path, json)?;
    info!(path = %path.display(), episode, "checkpoint saved");
    Ok(())
}

/// Load params + config from a JSON file. The stored config is validated.
pub fn load_checkpoint<P: DeserializeOwned>(path: &Path) -> Result<Checkpoint<P>> {
    let json = std::fs::read_to_string(path)?;
    let checkpoint: Checkpoint<P> = serde_json::from_str(&json)?;
    checkpoint.config.validate()?;
    info!(path = %path.display(), episode = checkpoint.episode, "checkpoint loaded");
    Ok(checkpoint)
}

impl<C: Controller> MemoryCell<C> {
    /// Save this cell's weights and config.
    pub fn save(&self, path: &Path, episode: usize) -> Result<()> {
        save_checkpoint(path, episode, &self.params(), self.config())
    }

    /// Rebuild a cell from a checkpoint file. When `expected` is given and
    /// differs from the stored config, the stored config wins and a warning
    /// is logged.
    pub fn load(path: &Path, expected: Option<&CellConfig>) -> Result<Self> {
        let checkpoint: Checkpoint<C::Params> = load_checkpoint(path)?;
        if let Some(cfg) = expected {
            if cfg != &checkpoint.config {
                warn!(path = %path.display(), "checkpoint config differs from the requested config; using the stored one");
            }
        }
        MemoryCell::from_params(&checkpoint.config, checkpoint.params)
    }
}
