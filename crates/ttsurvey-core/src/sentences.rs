//! Pipe-delimited sentence list parser.
//!
//! Each non-empty line is `id|text`. Text may itself contain pipes; everything
//! after the first one belongs to the text. One malformed line rejects the
//! whole list.

use std::path::Path;

use anyhow::{Context, Result};

use crate::error::SentenceListError;
use crate::model::Sentence;

/// Parse a sentence list from its text content.
pub fn parse_sentences(content: &str) -> Result<Vec<Sentence>, SentenceListError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(SentenceListError::Empty);
    }

    trimmed
        .lines()
        .enumerate()
        .map(|(index, line)| {
            let line = line.trim_end_matches('\r');
            let malformed = || SentenceListError::MalformedLine {
                line: index + 1,
                content: line.to_string(),
            };
            let (id, text) = line.split_once('|').ok_or_else(malformed)?;
            let (id, text) = (id.trim(), text.trim());
            if id.is_empty() || text.is_empty() {
                return Err(malformed());
            }
            Ok(Sentence {
                id: id.to_string(),
                text: text.to_string(),
            })
        })
        .collect()
}

/// Load a sentence list file, optionally keeping only the first `limit`.
pub fn load_sentences(path: &Path, limit: Option<usize>) -> Result<Vec<Sentence>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read sentence list: {}", path.display()))?;

    let mut sentences = parse_sentences(&content)
        .with_context(|| format!("failed to parse sentence list: {}", path.display()))?;

    if let Some(limit) = limit.filter(|&l| l > 0) {
        sentences.truncate(limit);
    }

    tracing::info!("loaded {} sentences from {}", sentences.len(), path.display());
    Ok(sentences)
}

/// A warning from sentence list validation.
#[derive(Debug, Clone)]
pub struct SentenceWarning {
    pub sentence_id: String,
    pub message: String,
}

/// Check a parsed list for problems that do not stop a session from running.
pub fn validate_sentences(sentences: &[Sentence]) -> Vec<SentenceWarning> {
    let mut warnings = Vec::new();

    let mut seen = std::collections::HashSet::new();
    for s in sentences {
        if !seen.insert(&s.id) {
            warnings.push(SentenceWarning {
                sentence_id: s.id.clone(),
                message: format!("duplicate sentence ID: {}", s.id),
            });
        }
    }

    for s in sentences {
        if s.id.chars().any(|c| c == '/' || c == '\\') {
            warnings.push(SentenceWarning {
                sentence_id: s.id.clone(),
                message: "sentence ID contains a path separator; audio lookup will fail".into(),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_list() {
        let content = "s1|שלום עולם\ns2|Second sentence\n";
        let sentences = parse_sentences(content).unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].id, "s1");
        assert_eq!(sentences[0].text, "שלום עולם");
    }

    #[test]
    fn text_may_contain_pipes() {
        let sentences = parse_sentences("a| left | right ").unwrap();
        assert_eq!(sentences[0].text, "left | right");
    }

    #[test]
    fn crlf_lines() {
        let sentences = parse_sentences("a|one\r\nb|two\r\n").unwrap();
        assert_eq!(sentences[1].text, "two");
    }

    #[test]
    fn malformed_line_rejects_list() {
        let err = parse_sentences("s1|fine\nbroken line\ns3|fine").unwrap_err();
        assert_eq!(
            err,
            SentenceListError::MalformedLine {
                line: 2,
                content: "broken line".into()
            }
        );
        assert!(parse_sentences("|no id").is_err());
        assert!(parse_sentences("no-text|").is_err());
    }

    #[test]
    fn empty_list() {
        assert_eq!(parse_sentences("  \n "), Err(SentenceListError::Empty));
    }

    #[test]
    fn load_with_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentences.csv");
        std::fs::write(&path, "a|1\nb|2\nc|3\n").unwrap();

        assert_eq!(load_sentences(&path, None).unwrap().len(), 3);
        assert_eq!(load_sentences(&path, Some(2)).unwrap().len(), 2);
        assert_eq!(load_sentences(&path, Some(0)).unwrap().len(), 3);
        assert!(load_sentences(&dir.path().join("missing.csv"), None).is_err());
    }

    #[test]
    fn validate_duplicates() {
        let sentences = parse_sentences("a|1\na|2").unwrap();
        let warnings = validate_sentences(&sentences);
        assert!(warnings.iter().any(|w| w.message.contains("duplicate")));
    }
}
