use async_trait::async_trait;

use concierge_core::context::LlmContext;
use concierge_core::errors::GatewayError;
use concierge_core::provider::LlmProvider;

/// Stand-in when no API key is available. Every call fails, so sessions
/// answer general questions with the fallback reply.
pub struct UnconfiguredProvider {
    reason: String,
}

impl UnconfiguredProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for UnconfiguredProvider {
    fn name(&self) -> &str {
        "unconfigured"
    }

    fn model(&self) -> &str {
        "none"
    }

    async fn complete(&self, _context: &LlmContext) -> Result<String, GatewayError> {
        Err(GatewayError::AuthenticationFailed(self.reason.clone()))
    }
}
