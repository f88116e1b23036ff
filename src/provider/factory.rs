// promptforge — Provider factory

use super::{http::HTTPProvider, LLMProvider};
use crate::config::Config;
use std::time::Duration;

/// Create an LLM provider from the loaded config.
///
/// Auto-detects the provider from the judge model name and resolves API credentials.
pub fn create_provider(cfg: &Config) -> anyhow::Result<Box<dyn LLMProvider>> {
    let (api_key, api_base, provider_name) = cfg
        .resolve_provider()
        .ok_or_else(|| anyhow::anyhow!(
            "No API key configured. Set a provider key in ~/.promptforge/config.json or via environment variables.\n\
             Example: PROMPTFORGE_PROVIDERS_OPENAI_API_KEY=sk-..."
        ))?;

    tracing::info!(
        provider = %provider_name,
        model = %cfg.judge.model,
        api_base = %if api_base.is_empty() { "(default)" } else { &api_base },
        "Creating LLM provider"
    );

    let provider = HTTPProvider::new(
        api_key,
        api_base,
        cfg.judge.model.clone(),
        Duration::from_secs(cfg.judge.timeout_secs),
    )?;

    Ok(Box::new(provider))
}
