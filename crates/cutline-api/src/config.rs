use cutline_core::FrameRate;
use serde::{Deserialize, Serialize};

use crate::marker::MarkerType;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub fps: FrameRate,
    pub default_marker_type: MarkerType,
    /// Maximum number of undo entries kept; 0 keeps everything.
    pub undo_limit: usize,
    /// Threads used for background media loading.
    pub load_workers: usize,
}

impl ProjectConfig {
    pub fn from_json(data: &str) -> Result<ProjectConfig> {
        let config: ProjectConfig = serde_json::from_str(data).map_err(Error::new_json)?;

        if !config.fps.is_valid() {
            return Err(Error::InvalidJson {
                message: format!("invalid frame rate {}/{}", config.fps.num, config.fps.den),
            });
        }

        Ok(config)
    }
}

impl Default for ProjectConfig {
    fn default() -> ProjectConfig {
        ProjectConfig {
            fps: FrameRate::default(),
            default_marker_type: MarkerType::default(),
            undo_limit: 0,
            load_workers: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_uses_defaults() -> Result<()> {
        let config = ProjectConfig::from_json(r#"{ "fps": { "num": 30, "den": 1 } }"#)?;
        assert_eq!(config.fps, FrameRate::FPS_30);
        assert_eq!(config.undo_limit, 0);
        assert_eq!(config.load_workers, 2);
        Ok(())
    }

    #[test]
    fn invalid_marker_type_is_rejected() {
        assert!(matches!(
            ProjectConfig::from_json(r#"{ "default_marker_type": 12 }"#),
            Err(Error::InvalidJson { .. })
        ));
    }

    #[test]
    fn zero_fps_is_rejected() {
        assert!(matches!(
            ProjectConfig::from_json(r#"{ "fps": { "num": 0, "den": 1 } }"#),
            Err(Error::InvalidJson { .. })
        ));
    }
}
