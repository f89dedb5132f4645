//! Shared fixtures for integration tests.

use std::io::{Cursor, Write};

use async_trait::async_trait;
use docqa_rag::{EmbeddingProvider, Result};

pub const DIM: usize = 32;

/// Deterministic bag-of-words embedder: each lowercase word bumps one
/// bucket chosen by a simple hash.
pub struct BagOfWordsEmbedder;

fn bucket(word: &str) -> usize {
    word.bytes().fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize)) % DIM
}

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; DIM];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            vector[bucket(&word.to_lowercase())] += 1.0;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn model(&self) -> &str {
        "bag-of-words"
    }
}

/// Build an in-memory zip archive; names ending in `/` become directories.
#[allow(dead_code)]
pub fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
        } else {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}
