use strand_llm::ChatMessage;
use strand_persist::{Message, MessageRole};

/// Assemble the model context for one query: exactly one leading system
/// message carrying the standing prompt, every prior non-system message
/// with its role preserved, and the new user message last.
pub fn build_context(
    system_prompt: &str,
    history: &[Message],
    question: &Message,
) -> Vec<ChatMessage> {
    let mut context = Vec::with_capacity(history.len() + 2);
    context.push(ChatMessage::system(system_prompt));

    for message in history {
        match message.role {
            MessageRole::System => continue,
            MessageRole::User => context.push(ChatMessage::human(&message.content)),
            MessageRole::Assistant => context.push(ChatMessage::ai(&message.content)),
        }
    }

    context.push(ChatMessage::human(&question.content));
    context
}
