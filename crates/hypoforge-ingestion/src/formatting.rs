//! Markdown body attached to a published hypothesis.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::{Paper, ProblemStatement};

lazy_static! {
    // Longer labels first: alternation is leftmost-first.
    static ref SECTION_LABEL: Regex = Regex::new(
        r"(?i)^(Background|Outcomes of interest|Objectives|Objective|Methods and Results|Methods|Results|Conclusions|Conclusion|Findings)\b:?\s*(.*)$"
    ).expect("valid regex");
    static ref COLON_LEAD: Regex = Regex::new(r"^([^:]{1,60}:)\s*(.*)$").expect("valid regex");
    static ref CAPS_LEAD: Regex = Regex::new(r"^([A-Z]{2,})\s+(.*)$").expect("valid regex");
}

/// Split on `.`, `?` or `!` followed by whitespace, and on blank lines.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;

    for (i, c) in text.char_indices() {
        let boundary = c.is_whitespace() && matches!(prev, Some('.' | '?' | '!'))
            || c == '\n';
        if boundary {
            let s = text[start..i].trim();
            if !s.is_empty() {
                out.push(s);
            }
            start = i + c.len_utf8();
        }
        prev = Some(c);
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

fn canonical_label(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Bold recognised section labels, render the Results block as bullets.
pub fn format_abstract(abstract_text: &str) -> String {
    let sentences = split_sentences(abstract_text);
    let mut lines: Vec<String> = Vec::new();
    let mut i = 0;

    while i < sentences.len() {
        let sentence = sentences[i];

        if let Some(caps) = SECTION_LABEL.captures(sentence) {
            let label = canonical_label(&caps[1]);
            let rest = caps[2].trim();
            lines.push(String::new());
            lines.push(format!("**{label}:**"));
            lines.push(String::new());
            i += 1;

            if label == "Results" {
                let mut block: Vec<&str> = Vec::new();
                if !rest.is_empty() {
                    block.push(rest);
                }
                while i < sentences.len() && !SECTION_LABEL.is_match(sentences[i]) {
                    block.push(sentences[i]);
                    i += 1;
                }
                lines.extend(block.into_iter().map(|s| format!("- {s}")));
            } else if !rest.is_empty() {
                lines.push(rest.to_string());
            }
            continue;
        }

        if let Some(caps) = COLON_LEAD.captures(sentence) {
            lines.push(format!("**{}**", &caps[1]));
            if !caps[2].trim().is_empty() {
                lines.push(caps[2].trim().to_string());
            }
        } else if let Some(caps) = CAPS_LEAD.captures(sentence) {
            lines.push(format!("**{}**", &caps[1]));
            lines.push(caps[2].trim().to_string());
        } else {
            lines.push(sentence.to_string());
        }
        i += 1;
    }

    lines.join("\n").trim().to_string()
}

/// Full hypothesis body: statement, formatted abstract, authors, DOI, date and link.
pub fn idea_summary(paper: &Paper, statement: &ProblemStatement) -> String {
    let authors = paper.authors
        .iter()
        .map(|a| format!("- {a}"))
        .collect::<Vec<_>>()
        .join("\n");

    let mut md = format!(
        "# {}\n\n---\n\n## Problem Statement\n\n{}\n\n## Abstract\n\n{}\n\n---\n\n## Authors\n{}\n",
        paper.title,
        statement.text,
        format_abstract(&paper.abstract_text),
        authors,
    );

    if let Some(doi) = &paper.doi {
        md.push_str(&format!("\n## DOI\n[{doi}](https://doi.org/{doi})\n"));
    }
    md.push_str(&format!("\n## Published Date\n**{}**\n", paper.publication_date.format("%Y-%m-%d")));
    if let Some(url) = paper.source_url() {
        md.push_str(&format!("\n## [View Full Article]({url})\n"));
    }
    md
}
