//! Property tests for the recursive chunker.

use docqa_rag::chunking::{Chunker, RecursiveChunker};
use proptest::prelude::*;

fn arb_text() -> impl Strategy<Value = String> {
    "[a-z]{1,8}([ \n]{1,3}[a-z]{1,8}){0,60}"
}

mod prop_chunk_bounds {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// No chunk exceeds the size limit and none is blank.
        #[test]
        fn chunks_respect_size(
            text in arb_text(),
            chunk_size in 10usize..60,
            overlap_ratio in 0usize..50,
        ) {
            let overlap = chunk_size * overlap_ratio / 100;
            let chunks = RecursiveChunker::new(chunk_size, overlap).split(&text);

            prop_assert!(!chunks.is_empty());
            for chunk in &chunks {
                prop_assert!(chunk.chars().count() <= chunk_size);
                prop_assert!(!chunk.trim().is_empty());
            }
        }

        /// Words shorter than the chunk size are never cut.
        #[test]
        fn every_word_survives_whole(
            text in arb_text(),
            chunk_size in 10usize..60,
        ) {
            let chunks = RecursiveChunker::new(chunk_size, chunk_size / 5).split(&text);
            for word in text.split_whitespace() {
                prop_assert!(
                    chunks.iter().any(|c| c.split_whitespace().any(|w| w == word)),
                    "word {:?} missing", word
                );
            }
        }
    }
}
