use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

const MAX_CONCURRENCY: usize = 32;

/// Configuration for segmentation and chunk packing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hard chunk budget in tokens (oversized singletons excepted)
    pub max_chunk_tokens: usize,

    /// Token budget of the overlap window re-included at the start of the next chunk
    pub overlap_tokens: usize,

    /// How residual (non-declaration) code is grouped into segments
    pub chunk_strategy: ChunkStrategy,

    /// Which segments of a closed chunk seed the next one
    pub overlap_policy: OverlapPolicyKind,

    /// Render file imports as a context prefix in every chunk
    pub include_imports: bool,

    /// Render the enclosing class/function signature for nested segments
    pub include_enclosing_signature: bool,

    /// Maximum number of import statements kept per file
    pub max_imports: usize,

    /// Files processed concurrently by the batch API
    pub max_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_chunk_tokens: 1024,
            overlap_tokens: 64,
            chunk_strategy: ChunkStrategy::FunctionLevel,
            overlap_policy: OverlapPolicyKind::Trailing,
            include_imports: true,
            include_enclosing_signature: true,
            max_imports: 32,
            max_concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_CONCURRENCY)
}

impl EngineConfig {
    /// Create config sized for a model conversion prompt (large chunks, small overlap)
    pub fn for_llm_conversion() -> Self {
        Self {
            max_chunk_tokens: 2048,
            overlap_tokens: 128,
            ..Default::default()
        }
    }

    /// Create config for small context windows (statement granularity)
    pub fn for_small_context() -> Self {
        Self {
            max_chunk_tokens: 512,
            overlap_tokens: 32,
            chunk_strategy: ChunkStrategy::StatementLevel,
            ..Default::default()
        }
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_tokens == 0 {
            return Err(EngineError::invalid_config("max_chunk_tokens must be > 0"));
        }

        if self.overlap_tokens >= self.max_chunk_tokens {
            return Err(EngineError::invalid_config(format!(
                "overlap_tokens ({}) must be smaller than max_chunk_tokens ({})",
                self.overlap_tokens, self.max_chunk_tokens
            )));
        }

        if self.max_concurrency == 0 || self.max_concurrency > MAX_CONCURRENCY {
            return Err(EngineError::invalid_config(format!(
                "max_concurrency must be within 1..={MAX_CONCURRENCY}, got {}",
                self.max_concurrency
            )));
        }

        Ok(())
    }
}

/// Grouping of residual code into segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Contiguous top-level statements are grouped while they fit the budget
    FunctionLevel,

    /// Every top-level statement becomes its own segment
    StatementLevel,
}

/// Strategy for picking overlap segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicyKind {
    /// Walk back from the end of the closed chunk
    #[default]
    Trailing,

    /// Prefer segments the next segment depends on
    DependencyAware,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_preset_configs_valid() {
        assert!(EngineConfig::for_llm_conversion().validate().is_ok());
        assert!(EngineConfig::for_small_context().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        // Invalid: zero budget
        config.max_chunk_tokens = 0;
        config.overlap_tokens = 0;
        assert!(config.validate().is_err());

        // Invalid: overlap == max
        config.max_chunk_tokens = 100;
        config.overlap_tokens = 100;
        assert!(config.validate().is_err());

        // Invalid: overlap > max
        config.overlap_tokens = 150;
        assert!(config.validate().is_err());

        // Invalid: no workers
        config.overlap_tokens = 10;
        config.max_concurrency = 0;
        assert!(config.validate().is_err());

        // Valid configuration
        config.max_concurrency = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_uses_defaults_for_missing_keys() {
        let config = EngineConfig::from_toml_str(
            r#"
max_chunk_tokens = 300
overlap_tokens = 20
chunk_strategy = "statement_level"
overlap_policy = "dependency_aware"
"#,
        )
        .unwrap();

        assert_eq!(config.max_chunk_tokens, 300);
        assert_eq!(config.overlap_tokens, 20);
        assert_eq!(config.chunk_strategy, ChunkStrategy::StatementLevel);
        assert_eq!(config.overlap_policy, OverlapPolicyKind::DependencyAware);
        assert!(config.include_imports);
        assert_eq!(config.max_imports, 32);
    }

    #[test]
    fn test_from_toml_rejects_invalid_budget() {
        let err = EngineConfig::from_toml_str("max_chunk_tokens = 10\noverlap_tokens = 10\n")
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));

        let err = EngineConfig::from_toml_str("chunk_strategy = \"paragraph\"").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
