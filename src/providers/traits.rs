use async_trait::async_trait;

use crate::error::Result;

/// Generative model client: prompt text in, generated text out.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name identifier
    fn name(&self) -> &str;

    /// Generate text for a prompt; any error counts as a failed attempt
    async fn generate(&self, prompt: &str) -> Result<String>;
}
