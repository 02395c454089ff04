//! `ModelSpec` — `"providerId:modelName"` parsing (§3, §4.E).

use std::fmt;

use crate::error::{ProviderError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub provider_id: String,
    pub model_name: String,
}

impl ModelSpec {
    /// Parses `"providerId:modelName"`. Rejects strings missing either side.
    pub fn parse(spec: &str) -> Result<Self> {
        let (provider_id, model_name) = spec
            .split_once(':')
            .ok_or_else(|| ProviderError::InvalidModelSpec(spec.to_string()))?;

        if provider_id.is_empty() || model_name.is_empty() {
            return Err(ProviderError::InvalidModelSpec(spec.to_string()));
        }

        Ok(Self {
            provider_id: provider_id.to_string(),
            model_name: model_name.to_string(),
        })
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider_id, self.model_name)
    }
}
