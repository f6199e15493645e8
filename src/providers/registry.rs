use std::sync::Arc;

use crate::config::types::ProviderConfig;
use crate::error::{Result, StellarError};
use crate::providers::gemini::GeminiProvider;
use crate::providers::traits::ModelProvider;

pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn ModelProvider>> {
    let api_key = std::env::var(&config.api_key_env).map_err(|_| StellarError::ApiKeyMissing {
        provider: config.name.clone(),
        env_var: config.api_key_env.clone(),
    })?;

    let provider: Arc<dyn ModelProvider> = match config.name.as_str() {
        "gemini" => Arc::new(GeminiProvider::new(
            api_key,
            config.model.clone(),
            config.base_url.clone(),
        )),
        _ => {
            return Err(StellarError::ProviderNotFound {
                provider: config.name.clone(),
            });
        }
    };

    Ok(provider)
}
