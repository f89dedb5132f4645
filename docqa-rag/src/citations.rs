//! Parsing of `SOURCES:` citations out of source-attributed answers.

use crate::document::SearchResult;
use crate::prompt::SOURCES_DELIMITER;

/// An answer split from the chunk ids it cites.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Citations {
    pub answer: String,
    pub ids: Vec<String>,
}

/// Split model output at the first `\nSOURCES:`.
///
/// The text after the delimiter is a comma-separated list of chunk ids.
/// Spaces and periods are stripped from each item and empty items are
/// dropped. Without the delimiter the whole (trimmed) text is the answer
/// and nothing is cited.
pub fn parse_citations(text: &str) -> Citations {
    let Some((answer, sources)) = text.split_once(SOURCES_DELIMITER) else {
        return Citations { answer: text.trim().to_string(), ids: Vec::new() };
    };
    let ids = sources
        .split(',')
        .map(|item| item.chars().filter(|c| !c.is_whitespace() && *c != '.').collect::<String>())
        .filter(|item| !item.is_empty())
        .collect();
    Citations { answer: answer.trim().to_string(), ids }
}

/// Concatenate the texts of cited chunks in retrieval order, each followed
/// by a blank line.
pub fn resolve_source_text(results: &[SearchResult], cited: &[String]) -> String {
    results
        .iter()
        .filter(|r| cited.iter().any(|id| *id == r.chunk.id))
        .map(|r| format!("{}\n\n", r.chunk.text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;

    fn result(id: &str, text: &str) -> SearchResult {
        SearchResult {
            chunk: Chunk {
                id: id.to_string(),
                text: text.to_string(),
                document_id: "doc.txt".to_string(),
                embedding: Vec::new(),
            },
            score: 0.5,
        }
    }

    #[test]
    fn strips_spaces_and_periods() {
        let parsed = parse_citations("The answer.\nSOURCES: 0, 2.");
        assert_eq!(parsed.answer, "The answer.");
        assert_eq!(parsed.ids, vec!["0", "2"]);
    }

    #[test]
    fn missing_delimiter_cites_nothing() {
        let parsed = parse_citations("  just text\nsources: 1 ");
        assert_eq!(parsed.answer, "just text\nsources: 1");
        assert!(parsed.ids.is_empty());
    }

    #[test]
    fn empty_items_are_dropped() {
        assert_eq!(parse_citations("a\nSOURCES: ,3,, .").ids, vec!["3"]);
    }

    #[test]
    fn source_text_follows_retrieval_order() {
        let results = [result("2", "two"), result("0", "zero"), result("1", "one")];
        let text = resolve_source_text(&results, &["0".to_string(), "2".to_string()]);
        assert_eq!(text, "two\n\nzero\n\n");
    }
}
