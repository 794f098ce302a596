//! System instruction assembly and citation extraction.

use std::sync::LazyLock;

use babysquad_knowledge::RetrievedContext;
use regex::Regex;

const CITATION_OPEN: &str = "(source: ";

// Filenames may contain commas and parentheses; the shortest run up to
// ", p.N)" on one line is the filename.
static CITATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(source: [^\n]+?, p\.\d+\)").unwrap());

const GROUNDING_RULE: &str = "Base your answer on the reference passages below. \
If they do not cover the question, say so plainly and give only general, safe guidance.";

const CITATION_RULE: &str = "Whenever you use a passage, cite it exactly in the form \
(source: filename, p.pagenumber), copying the filename and page number from the passage header.";

const LANGUAGE_RULE: &str = "Reply in the language the parent wrote in.";

/// Persona, grounding and citation rules, then the retrieved context.
pub fn build_system_instruction(persona: &str, context: &RetrievedContext) -> String {
    format!(
        "{persona}\n\nRules:\n- {GROUNDING_RULE}\n- {CITATION_RULE}\n- {LANGUAGE_RULE}\n\nReference passages:\n{}",
        context.render()
    )
}

/// Distinct `(source: file, p.N)` citations in order of first appearance.
pub fn extract_citations(text: &str) -> Vec<String> {
    let mut citations: Vec<String> = Vec::new();
    for m in CITATION_PATTERN.find_iter(text) {
        // A malformed citation earlier on the line is absorbed into the
        // match; keep only the last opening.
        let matched = m.as_str();
        let citation = matched
            .rfind(CITATION_OPEN)
            .map_or(matched, |start| &matched[start..]);
        if !citations.iter().any(|c| c == citation) {
            citations.push(citation.to_string());
        }
    }
    citations
}
