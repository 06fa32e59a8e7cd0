use ag_domain::content::ContentBlock;
use ag_domain::message::{Message, Role};

/// Fold freshly ingested blocks into the conversation.
///
/// Blocks join the trailing user message when there is one; otherwise
/// they become a new user message at the end. Block order is preserved
/// and nothing before the tail is touched.
pub fn assemble(mut messages: Vec<Message>, blocks: Vec<ContentBlock>) -> Vec<Message> {
    if blocks.is_empty() {
        return messages;
    }
    match messages.last_mut() {
        Some(last) if last.role == Role::User => last.content.extend(blocks),
        _ => messages.push(Message::new(Role::User, blocks)),
    }
    messages
}
