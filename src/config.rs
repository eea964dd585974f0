//! Session configuration. Every field has a default so a partial JSON
//! document (or an empty object) is a valid config.

use serde::{Deserialize, Serialize};

use crate::error::BingoError;

pub const DEFAULT_GRID_SIDE: usize = 5;
pub const MAX_GRID_SIDE: usize = 10;
pub const DEFAULT_ECHO_WINDOW: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BingoConfig {
    /// Cells per row and column; a card holds `grid_side²` items.
    pub grid_side: usize,
    /// How many unacknowledged local writes a card slot remembers when
    /// telling its own echoes apart from remote updates.
    pub echo_window: usize,
    /// Fixed rng seed. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for BingoConfig {
    fn default() -> Self {
        Self {
            grid_side: DEFAULT_GRID_SIDE,
            echo_window: DEFAULT_ECHO_WINDOW,
            seed: None,
        }
    }
}

impl BingoConfig {
    pub fn card_size(&self) -> usize {
        self.grid_side * self.grid_side
    }

    pub fn validate(&self) -> Result<(), BingoError> {
        if self.grid_side == 0 || self.grid_side > MAX_GRID_SIDE {
            return Err(BingoError::InvalidRequest(format!(
                "grid_side must be between 1 and {MAX_GRID_SIDE}, got {}",
                self.grid_side
            )));
        }
        if self.echo_window == 0 {
            return Err(BingoError::InvalidRequest(
                "echo_window must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a config document.
    pub fn from_json(json: &str) -> Result<Self, BingoError> {
        let config: BingoConfig = serde_json::from_str(json)
            .map_err(|e| BingoError::InvalidRequest(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}
