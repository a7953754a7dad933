use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use concierge_core::context::LlmContext;
use concierge_core::errors::GatewayError;
use concierge_core::provider::LlmProvider;

/// Pre-programmed responses for deterministic testing without API calls.
#[derive(Clone, Debug)]
pub enum MockResponse {
    Text(String),
    Error(GatewayError),
    /// Wait a duration, then yield the inner response.
    Delay(Duration, Box<MockResponse>),
}

impl MockResponse {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }

    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock provider that returns pre-programmed responses in sequence and
/// records every context it was called with.
pub struct MockProvider {
    responses: Mutex<VecDeque<MockResponse>>,
    contexts: Mutex<Vec<LlmContext>>,
    call_count: AtomicUsize,
}

impl MockProvider {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            contexts: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Contexts received so far, oldest first.
    pub fn contexts(&self) -> Vec<LlmContext> {
        self.contexts.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, context: &LlmContext) -> Result<String, GatewayError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.contexts.lock().push(context.clone());

        let next = self.responses.lock().pop_front();
        let Some(response) = next else {
            return Err(GatewayError::InvalidRequest(format!(
                "MockProvider: no response configured for call {idx}"
            )));
        };

        resolve_response(response).await
    }
}

/// Unrolls nested delays iteratively to avoid recursive async.
async fn resolve_response(response: MockResponse) -> Result<String, GatewayError> {
    let mut current = response;
    loop {
        match current {
            MockResponse::Text(text) => return Ok(text),
            MockResponse::Error(e) => return Err(e),
            MockResponse::Delay(duration, inner) => {
                tokio::time::sleep(duration).await;
                current = *inner;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::messages::Turn;

    #[tokio::test]
    async fn sequential_responses() {
        let mock = MockProvider::new(vec![
            MockResponse::text("first"),
            MockResponse::Error(GatewayError::NetworkError("reset".into())),
        ]);
        let ctx = LlmContext::new("sys", vec![Turn::user("hola")]);

        assert_eq!(mock.complete(&ctx).await.unwrap(), "first");
        assert!(mock.complete(&ctx).await.is_err());
        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.contexts()[0].last_user_text(), Some("hola"));
    }

    #[tokio::test]
    async fn exhausted_script_errors() {
        let mock = MockProvider::new(vec![]);
        let result = mock.complete(&LlmContext::default()).await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_response_waits() {
        let mock = MockProvider::new(vec![MockResponse::delayed(
            Duration::from_secs(5),
            MockResponse::text("late"),
        )]);
        let start = tokio::time::Instant::now();
        let text = mock.complete(&LlmContext::default()).await.unwrap();
        assert_eq!(text, "late");
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
