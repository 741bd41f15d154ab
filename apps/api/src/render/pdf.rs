//! PDF rendering. Translates the Markdown report to Typst markup and compiles
//! it with the external `typst` CLI in a scratch directory.
//!
//! Page setup: A4, 20mm margins on every side.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("I/O error while rendering: {0}")]
    Io(#[from] io::Error),

    #[error("Could not run '{bin}': {source}")]
    ToolUnavailable {
        bin: String,
        #[source]
        source: io::Error,
    },

    #[error("Typst compilation failed: {0}")]
    Compile(String),
}

const TYPST_PREAMBLE: &str = r##"#set document(title: "JDmatcher Report")
#set page(paper: "a4", margin: 20mm)
#set text(size: 11pt)
#set par(leading: 0.8em)
#show heading.where(level: 1): set text(fill: rgb("#2c3e50"))
#show heading.where(level: 2): set text(fill: rgb("#3498db"))
#show heading.where(level: 3): set text(fill: rgb("#2980b9"))
"##;

#[derive(Debug, Clone)]
pub struct PdfRenderer {
    typst_bin: String,
}

impl PdfRenderer {
    pub fn new(typst_bin: impl Into<String>) -> Self {
        Self {
            typst_bin: typst_bin.into(),
        }
    }

    /// Renders `markdown` to PDF bytes.
    pub async fn render(&self, markdown: &str) -> Result<Vec<u8>, RenderError> {
        let workdir = tempfile::tempdir()?;
        let source: PathBuf = workdir.path().join("report.typ");
        let output: PathBuf = workdir.path().join("report.pdf");

        tokio::fs::write(&source, markdown_to_typst(markdown)).await?;

        let result = Command::new(&self.typst_bin)
            .arg("compile")
            .arg(&source)
            .arg(&output)
            .output()
            .await
            .map_err(|source| RenderError::ToolUnavailable {
                bin: self.typst_bin.clone(),
                source,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            return Err(RenderError::Compile(stderr));
        }

        let pdf = tokio::fs::read(&output).await?;
        info!("Rendered PDF report ({} bytes)", pdf.len());
        Ok(pdf)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Markdown → Typst
// ────────────────────────────────────────────────────────────────────────────

/// Converts the subset of Markdown the model produces (ATX headings, bullet and
/// numbered lists, bold/italic, inline and fenced code, rules) to Typst markup.
/// Anything else is escaped and rendered as text.
pub fn markdown_to_typst(markdown: &str) -> String {
    let mut out = String::from(TYPST_PREAMBLE);
    out.push('\n');

    let mut in_fence = false;
    for line in markdown.lines() {
        let trimmed = line.trim_start();

        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            out.push_str(trimmed);
            out.push('\n');
            continue;
        }
        if in_fence {
            out.push_str(line);
            out.push('\n');
            continue;
        }

        out.push_str(&convert_line(line));
        out.push('\n');
    }

    if in_fence {
        debug!("Closing unterminated code fence in report");
        out.push_str("```\n");
    }

    out
}

fn convert_line(line: &str) -> String {
    let trimmed = line.trim_start();
    let indent = &line[..line.len() - trimmed.len()];

    if trimmed.is_empty() {
        return String::new();
    }

    if let Some((level, text)) = heading(trimmed) {
        return format!("{} {}", "=".repeat(level), convert_inline(text));
    }

    if is_rule(trimmed) {
        return "#line(length: 100%)".to_string();
    }

    for marker in ["- ", "* ", "+ "] {
        if let Some(text) = trimmed.strip_prefix(marker) {
            return format!("{indent}- {}", convert_inline(text));
        }
    }

    if let Some(text) = ordered_item(trimmed) {
        return format!("{indent}+ {}", convert_inline(text));
    }

    let converted = convert_inline(trimmed);
    // A leading list/heading/term marker would change the block type in Typst.
    match converted.chars().next() {
        Some('-' | '+' | '=') => format!("\\{converted}"),
        _ => converted,
    }
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|&c| c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    line[level..].strip_prefix(' ').map(|text| (level, text.trim()))
}

fn is_rule(line: &str) -> bool {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && ["-", "*", "_"]
            .iter()
            .any(|m| compact.chars().all(|c| c.to_string() == *m))
}

fn ordered_item(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    line[digits..]
        .strip_prefix(". ")
        .or_else(|| line[digits..].strip_prefix(") "))
}

#[derive(Debug, PartialEq)]
enum Token {
    Text(String),
    Strong,
    Emph,
    Raw(String),
}

fn convert_inline(text: &str) -> String {
    let mut tokens = tokenize_inline(text);
    demote_unpaired(&mut tokens, Token::Strong, "\\*\\*");
    demote_unpaired(&mut tokens, Token::Emph, "\\*");

    let mut out = String::with_capacity(text.len() + 8);
    for token in tokens {
        match token {
            Token::Text(s) => out.push_str(&s),
            Token::Strong => out.push('*'),
            Token::Emph => out.push('_'),
            Token::Raw(s) => {
                out.push('`');
                out.push_str(&s);
                out.push('`');
            }
        }
    }
    out
}

fn tokenize_inline(text: &str) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut i = 0;

    let flush = |buf: &mut String, tokens: &mut Vec<Token>| {
        if !buf.is_empty() {
            tokens.push(Token::Text(std::mem::take(buf)));
        }
    };

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            '`' => {
                if let Some(len) = chars[i + 1..].iter().position(|&ch| ch == '`') {
                    flush(&mut buf, &mut tokens);
                    tokens.push(Token::Raw(chars[i + 1..i + 1 + len].iter().collect()));
                    i += len + 2;
                    continue;
                }
                buf.push_str("\\`");
            }
            '*' | '_' if next == Some(c) => {
                flush(&mut buf, &mut tokens);
                tokens.push(Token::Strong);
                i += 2;
                continue;
            }
            '*' => {
                let prev_space = i == 0 || chars[i - 1].is_whitespace();
                let next_space = next.map_or(true, char::is_whitespace);
                if prev_space && next_space {
                    buf.push_str("\\*");
                } else {
                    flush(&mut buf, &mut tokens);
                    tokens.push(Token::Emph);
                }
            }
            '\\' | '#' | '$' | '@' | '<' | '>' | '[' | ']' | '~' | '/' | '_' => {
                buf.push('\\');
                buf.push(c);
            }
            _ => buf.push(c),
        }
        i += 1;
    }

    flush(&mut buf, &mut tokens);
    tokens
}

/// Turns the last marker of an odd-count kind back into escaped literal text,
/// since Typst rejects unclosed delimiters.
fn demote_unpaired(tokens: &mut [Token], kind: Token, literal: &str) {
    let positions: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| **t == kind)
        .map(|(i, _)| i)
        .collect();

    if positions.len() % 2 == 1 {
        if let Some(&last) = positions.last() {
            tokens[last] = Token::Text(literal.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(markdown: &str) -> String {
        markdown_to_typst(markdown)[TYPST_PREAMBLE.len() + 1..].to_string()
    }

    #[test]
    fn test_preamble_sets_a4_with_20mm_margins() {
        let typst = markdown_to_typst("");
        assert!(typst.contains(r#"#set page(paper: "a4", margin: 20mm)"#));
    }

    #[test]
    fn test_headings_map_to_equals() {
        assert_eq!(
            body("# Title\n## Match Summary\n### Detail"),
            "= Title\n== Match Summary\n=== Detail\n"
        );
    }

    #[test]
    fn test_hash_without_space_is_not_a_heading() {
        assert_eq!(body("#hashtag"), "\\#hashtag\n");
    }

    #[test]
    fn test_lists_convert() {
        assert_eq!(
            body("- Python\n* AWS\n  - Lambda\n1. Learn Go\n2) Ship it"),
            "- Python\n- AWS\n  - Lambda\n+ Learn Go\n+ Ship it\n"
        );
    }

    #[test]
    fn test_bold_and_italic_convert() {
        assert_eq!(
            body("**Overall match:** 73% and *strong* fit"),
            "*Overall match:* 73% and _strong_ fit\n"
        );
    }

    #[test]
    fn test_unpaired_markers_are_escaped() {
        assert_eq!(body("a **dangling marker"), "a \\*\\*dangling marker\n");
        assert_eq!(body("5 * 3 = 15"), "5 \\* 3 = 15\n");
    }

    #[test]
    fn test_special_characters_are_escaped() {
        assert_eq!(
            body("C# and $100k @ACME <team> snake_case https://x.io"),
            "C\\# and \\$100k \\@ACME \\<team\\> snake\\_case https:\\/\\/x.io\n"
        );
    }

    #[test]
    fn test_inline_code_is_kept_raw() {
        assert_eq!(body("use `tokio::spawn` here"), "use `tokio::spawn` here\n");
    }

    #[test]
    fn test_fenced_code_passes_through() {
        assert_eq!(
            body("```rust\nlet x = 5 * 3; // #hash\n```"),
            "```rust\nlet x = 5 * 3; // #hash\n```\n"
        );
    }

    #[test]
    fn test_unterminated_fence_is_closed() {
        assert!(markdown_to_typst("```\ncode").ends_with("code\n```\n"));
    }

    #[test]
    fn test_rule_and_leading_marker_paragraph() {
        assert_eq!(body("---\n-5% churn"), "#line(length: 100%)\n\\-5% churn\n");
    }

    #[tokio::test]
    async fn test_missing_typst_binary_is_reported() {
        let renderer = PdfRenderer::new("jdmatch-no-such-typst-binary");
        let err = renderer.render("# Report").await.unwrap_err();
        assert!(matches!(err, RenderError::ToolUnavailable { .. }));
    }
}
