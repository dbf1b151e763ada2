//! Match configuration, loaded from `config/match.toml` with warn-and-
//! default fallback.

use crazycanvas_core::tunables::DEFAULT_MAX_SCORE;
use crazycanvas_core::GameMode;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::warn;

const DEFAULT_MATCH_PATH: &str = "config/match.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Game mode name: `common_flag` or `team_flag`.
    pub mode: String,
    /// Score that ends the match.
    pub max_score: u32,
    /// Bot players per team in the headless runner.
    pub players_per_team: u32,
    /// Tick budget before the runner gives up on a match.
    pub max_ticks: u64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            mode: "common_flag".to_string(),
            max_score: DEFAULT_MAX_SCORE,
            players_per_team: 1,
            max_ticks: 20_000,
        }
    }
}

impl MatchConfig {
    pub fn load() -> Self {
        Self::load_from_path(Path::new(DEFAULT_MATCH_PATH))
    }

    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<MatchConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    MatchConfig::default()
                }
            },
            Err(err) => {
                if path != Path::new(DEFAULT_MATCH_PATH)
                    || err.kind() != std::io::ErrorKind::NotFound
                {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                }
                MatchConfig::default()
            }
        }
    }

    /// Resolve the mode name, defaulting to common-flag on junk.
    pub fn game_mode(&self) -> GameMode {
        match self.mode.as_str() {
            "common_flag" => GameMode::CtfCommonFlag,
            "team_flag" => GameMode::CtfTeamFlag,
            other => {
                warn!("Unknown game mode '{other}'. Using common_flag");
                GameMode::CtfCommonFlag
            }
        }
    }
}
