pub mod context;
pub mod error;
pub mod locks;
pub mod service;

pub use context::build_context;
pub use error::ChatError;
pub use service::ConversationService;
