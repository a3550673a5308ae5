mod types;
mod provider;
mod google;
mod mock;
pub mod sanitize;

pub use types::*;
pub use provider::{ModelProvider, ResponseStream};
pub use google::GoogleProvider;
pub use mock::{MockProvider, ScriptedMockProvider};

use anyhow::bail;
use fsagent_config::ModelConfig;

/// Environment variables consulted for a Gemini key, in order.
const GOOGLE_KEY_ENVS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Construct a boxed [`ModelProvider`] from configuration.
///
/// Provider selection:
/// - `"google"` / `"gemini"` → [`GoogleProvider`]
/// - `"mock"` → [`MockProvider`] (echo-back)
pub fn from_config(cfg: &ModelConfig) -> anyhow::Result<Box<dyn ModelProvider>> {
    match cfg.provider.as_str() {
        "google" | "gemini" => Ok(Box::new(GoogleProvider::new(
            cfg.name.clone(),
            resolve_api_key(cfg, GOOGLE_KEY_ENVS),
            cfg.base_url.clone(),
            cfg.max_tokens,
            cfg.temperature,
        ))),
        "mock" => Ok(Box::new(MockProvider)),
        other => bail!("unknown model provider: {other}"),
    }
}

/// Resolve an API key: explicit value, then the configured env var, then
/// the provider's conventional env vars.
fn resolve_api_key(cfg: &ModelConfig, fallback_envs: &[&str]) -> Option<String> {
    if let Some(k) = &cfg.api_key {
        return Some(k.clone());
    }
    if let Some(env) = &cfg.api_key_env {
        return std::env::var(env).ok();
    }
    fallback_envs
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_alias_selects_google_driver() {
        let cfg = ModelConfig { provider: "gemini".into(), ..ModelConfig::default() };
        let p = from_config(&cfg).unwrap();
        assert_eq!(p.name(), "google");
        assert_eq!(p.model_name(), "gemini-2.0-flash");
    }

    #[test]
    fn mock_provider_selected() {
        let cfg = ModelConfig { provider: "mock".into(), ..ModelConfig::default() };
        assert_eq!(from_config(&cfg).unwrap().name(), "mock");
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let cfg = ModelConfig { provider: "carrier-pigeon".into(), ..ModelConfig::default() };
        let err = from_config(&cfg).err().unwrap();
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    fn explicit_key_wins_over_env() {
        let cfg = ModelConfig {
            api_key: Some("explicit".into()),
            api_key_env: Some("FSAGENT_TEST_UNUSED_KEY".into()),
            ..ModelConfig::default()
        };
        assert_eq!(resolve_api_key(&cfg, GOOGLE_KEY_ENVS).as_deref(), Some("explicit"));
    }

    #[test]
    fn configured_env_var_is_read() {
        std::env::set_var("FSAGENT_TEST_MODEL_KEY", "from-env");
        let cfg = ModelConfig {
            api_key_env: Some("FSAGENT_TEST_MODEL_KEY".into()),
            ..ModelConfig::default()
        };
        assert_eq!(resolve_api_key(&cfg, &[]).as_deref(), Some("from-env"));
    }
}
