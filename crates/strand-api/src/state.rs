use std::sync::Arc;
use strand_chat::ConversationService;
use strand_persist::ThreadIndex;

use crate::config::Config;

/// Shared application state passed to all handlers
///
/// All resources are wrapped in Arc for efficient sharing across async
/// tasks; the service and index share one underlying state store.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub chat: Arc<ConversationService>,
    pub index: Arc<ThreadIndex>,
}

impl AppState {
    pub fn new(config: Config, chat: ConversationService, index: ThreadIndex) -> Self {
        Self {
            config: Arc::new(config),
            chat: Arc::new(chat),
            index: Arc::new(index),
        }
    }
}
