//! Runtime configuration loaded from `config.toml`.

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub coaching: CoachingConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub models: ModelsConfig,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Anthropic,
}

fn default_base_url() -> String {
    "https://api.anthropic.com/v1".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ModelsConfig {
    /// Model used for reply generation.
    #[serde(default)]
    pub response: String,
    /// Cheaper model used for context analysis and safety classification.
    #[serde(default)]
    pub classifier: String,
}

impl ModelsConfig {
    /// Fill in unset model tiers. `classifier` defaults to `response`;
    /// `response` defaults to a sensible model for the provider kind.
    pub fn apply_defaults(&mut self, provider_kind: &ProviderKind) {
        if self.response.is_empty() {
            self.response = match provider_kind {
                ProviderKind::Anthropic => "claude-sonnet-4-20250514".to_string(),
            };
        }
        if self.classifier.is_empty() {
            self.classifier = self.response.clone();
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CoachingConfig {
    /// Messages kept in the per-session dialogue window.
    #[serde(default = "default_dialogue_window")]
    pub max_dialogue_window: usize,
    /// Character budget for a normal (short-form) reply.
    #[serde(default = "default_max_chars")]
    pub max_chars_per_message: usize,
    /// Generation attempts per turn (1 original + retries).
    #[serde(default = "default_repeat_count")]
    pub max_repeat_count: usize,
    /// Candidates returned by the practice ranker.
    #[serde(default = "default_top_k")]
    pub ranked_top_k: usize,
    /// Minutes the user is assumed to have for a practice right now.
    #[serde(default = "default_time_budget")]
    pub default_time_budget_min: u32,
    /// Optional JSON catalog file; the built-in catalog is used when unset.
    #[serde(default)]
    pub catalog_path: Option<String>,
}

fn default_dialogue_window() -> usize {
    10
}

fn default_max_chars() -> usize {
    500
}

fn default_repeat_count() -> usize {
    2
}

fn default_top_k() -> usize {
    3
}

fn default_time_budget() -> u32 {
    15
}

impl Default for CoachingConfig {
    fn default() -> Self {
        Self {
            max_dialogue_window: default_dialogue_window(),
            max_chars_per_message: default_max_chars(),
            max_repeat_count: default_repeat_count(),
            ranked_top_k: default_top_k(),
            default_time_budget_min: default_time_budget(),
            catalog_path: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BreakerConfig {
    /// Failures within the window before the breaker opens.
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,
    /// Rolling window for counting failures, in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Time an open breaker waits before admitting a probe call.
    #[serde(default = "default_recovery_secs")]
    pub recovery_secs: u64,
}

fn default_error_threshold() -> u32 {
    3
}

fn default_window_secs() -> u64 {
    60
}

fn default_recovery_secs() -> u64 {
    30
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            error_threshold: default_error_threshold(),
            window_secs: default_window_secs(),
            recovery_secs: default_recovery_secs(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: AppConfig = toml::from_str(&content)?;
        config.provider.models.apply_defaults(&config.provider.kind);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let mut config: AppConfig = toml::from_str(
            r#"
            [provider]
            api_key = "sk-test"
            "#,
        )
        .unwrap();
        config.provider.models.apply_defaults(&config.provider.kind);

        assert_eq!(config.provider.kind, ProviderKind::Anthropic);
        assert!(!config.provider.models.response.is_empty());
        assert_eq!(
            config.provider.models.classifier,
            config.provider.models.response
        );
        assert_eq!(config.coaching.max_dialogue_window, 10);
        assert_eq!(config.coaching.max_repeat_count, 2);
        assert_eq!(config.breaker.error_threshold, 3);
    }

    #[test]
    fn explicit_models_are_kept() {
        let mut config: AppConfig = toml::from_str(
            r#"
            [provider]
            api_key = "sk-test"

            [provider.models]
            response = "claude-sonnet-4-20250514"
            classifier = "claude-haiku-4-5-20251001"

            [coaching]
            max_dialogue_window = 6
            "#,
        )
        .unwrap();
        config.provider.models.apply_defaults(&config.provider.kind);

        assert_eq!(config.provider.models.classifier, "claude-haiku-4-5-20251001");
        assert_eq!(config.coaching.max_dialogue_window, 6);
    }
}
