//! Citation tracking: provenance of the chunks that grounded a turn.
//!
//! Sources are deduplicated with first-seen order preserved — two chunks
//! from the same document collapse to one citation entry.

use crate::models::Chunk;

/// Collect the distinct source identifiers of retrieved chunks, in the
/// order they first appear.
pub fn dedupe_sources(chunks: &[Chunk]) -> Vec<String> {
    let mut seen = Vec::new();
    for chunk in chunks {
        if !seen.contains(&chunk.source) {
            seen.push(chunk.source.clone());
        }
    }
    seen
}

/// Render a citation list for display under an assistant turn.
pub fn render(sources: &[String]) -> String {
    sources
        .iter()
        .map(|s| format!("  - 证据来源: {}", s))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str) -> Chunk {
        Chunk {
            text: String::new(),
            source: source.to_string(),
        }
    }

    #[test]
    fn test_dedupes_preserving_first_seen_order() {
        let chunks = vec![chunk("A"), chunk("A"), chunk("B")];
        assert_eq!(dedupe_sources(&chunks), vec!["A", "B"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(dedupe_sources(&[]).is_empty());
    }

    #[test]
    fn test_render_one_line_per_source() {
        let rendered = render(&["X1".to_string(), "X2".to_string()]);
        assert_eq!(rendered.lines().count(), 2);
        assert!(rendered.contains("X1"));
    }
}
