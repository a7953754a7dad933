use async_trait::async_trait;

use crate::context::LlmContext;
use crate::errors::GatewayError;

/// The language-model collaborator: conversation in, free-text reply out.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn complete(&self, context: &LlmContext) -> Result<String, GatewayError>;
}
