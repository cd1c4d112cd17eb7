use crate::router::ir::ConversationTurn;

/// Collapses a conversation into one prompt: `[ROLE] text` lines in order,
/// joined with `\n`. Output depends only on the turns.
pub fn flatten_prompt(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(|t| format!("[{}] {}", t.role.tag(), t.text))
        .collect::<Vec<_>>()
        .join("\n")
}
