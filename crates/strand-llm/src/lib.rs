pub mod openai;
pub mod streaming;
pub mod traits;
pub mod types;

pub use openai::OpenAIClient;
pub use streaming::{parse_chat_sse_stream, FragmentStream, StreamEvent};
pub use traits::{ChatClient, ChatOptions, ChatRequest, ChatResponse, TokenUsage};
pub use types::ChatMessage;
