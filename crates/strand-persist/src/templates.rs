/// Standing instructions prepended to every model invocation when no
/// override is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful assistant. Answer the user's questions clearly and \
concisely, and use earlier turns of the conversation for context when \
they are relevant.";
