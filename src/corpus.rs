//! Corpus CSV loader.
//!
//! Reads the chunk-ready corpus produced by `medrag prepare`: a UTF-8 CSV
//! with a `content` column (retrieval text) and a `source` column (opaque
//! provenance identifier carried through to citations).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::error::RagError;
use crate::models::Document;

#[derive(Debug, Deserialize)]
struct CorpusRow {
    content: String,
    source: String,
}

/// Load every corpus record into memory. Missing file or missing columns is
/// a configuration error, fatal at startup.
pub fn load_corpus(path: &Path) -> Result<Vec<Document>> {
    if !path.exists() {
        return Err(RagError::Configuration(format!(
            "corpus file not found: {} (run `medrag prepare` first)",
            path.display()
        ))
        .into());
    }

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open corpus file: {}", path.display()))?;

    let headers = reader.headers().context("Failed to read corpus header")?;
    for required in ["content", "source"] {
        if !headers.iter().any(|h| h == required) {
            return Err(RagError::Configuration(format!(
                "corpus file {} is missing the '{}' column",
                path.display(),
                required
            ))
            .into());
        }
    }

    let mut documents = Vec::new();
    for row in reader.deserialize::<CorpusRow>() {
        let row = row.context("Failed to parse corpus row")?;
        documents.push(Document {
            text: row.content,
            source: row.source,
        });
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_corpus() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "content,source").unwrap();
        writeln!(f, "\"【患者提问】：头痛怎么办\n【医生回答】：建议多休息，多喝水\",X1").unwrap();
        writeln!(f, "【患者提问】：失眠,X2").unwrap();

        let docs = load_corpus(f.path()).unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].text.contains("头痛怎么办"));
        assert_eq!(docs[0].source, "X1");
        assert_eq!(docs[1].source, "X2");
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = load_corpus(Path::new("/nonexistent/corpus.csv")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_column_is_configuration_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "content,origin").unwrap();
        writeln!(f, "text,X1").unwrap();

        let err = load_corpus(f.path()).unwrap_err();
        let rag = err.downcast_ref::<RagError>();
        assert!(matches!(rag, Some(RagError::Configuration(msg)) if msg.contains("source")));
    }
}
