// Resume / job-description match analysis.
// Implements: staged prompt pipeline, simplified single-call mode, score heuristic, report assembly.
// All LLM calls go through llm_client; nothing here talks to Groq directly.

pub mod handlers;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod score;
