use serde::{Deserialize, Serialize};

use crate::error::HubError;

/// Pipeline-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Cap on retained points. The source prunes its oldest points past this
    /// size and every node drops the same leading entries.
    pub max_cache_size: Option<usize>,
}

impl HubConfig {
    pub fn with_max_cache_size(max_cache_size: usize) -> Self {
        Self {
            max_cache_size: Some(max_cache_size),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, HubError> {
        let config: HubConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HubError> {
        if self.max_cache_size == Some(0) {
            return Err(HubError::configuration("max_cache_size must be > 0"));
        }
        Ok(())
    }
}
