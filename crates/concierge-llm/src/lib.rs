pub mod mock;
pub mod openai;
pub mod unconfigured;

pub use mock::{MockProvider, MockResponse};
pub use openai::{OpenAiConfig, OpenAiProvider};
pub use unconfigured::UnconfiguredProvider;
