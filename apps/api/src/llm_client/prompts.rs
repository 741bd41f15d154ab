// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// Appended to every analysis system prompt so the report renders cleanly.
pub const MARKDOWN_OUTPUT_INSTRUCTION: &str = "\
    Format your answer as Markdown. Use short headings and bullet lists. \
    Do NOT wrap the answer in code fences.";

/// Combines a role-specific system prompt with the shared output instruction.
pub fn with_output_rules(system: &str) -> String {
    format!("{system}\n{MARKDOWN_OUTPUT_INSTRUCTION}")
}
