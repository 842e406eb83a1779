//! Token cost functions used for segment sizes and chunk budgets.

use unicode_segmentation::UnicodeSegmentation;

/// Counts model tokens in a piece of text
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Rough estimate: 4 bytes per token on average for code
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        (text.len() / 4).max(1)
    }
}

/// One token per Unicode word
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCounter;

impl TokenCounter for WordCounter {
    fn count(&self, text: &str) -> usize {
        text.unicode_words().count()
    }
}

#[cfg(feature = "hf-tokenizer")]
pub use hf::HfTokenCounter;

#[cfg(feature = "hf-tokenizer")]
mod hf {
    use super::TokenCounter;
    use crate::error::{EngineError, Result};
    use std::path::Path;
    use tokenizers::Tokenizer;

    /// Counts with a Hugging Face `tokenizer.json`
    pub struct HfTokenCounter {
        tokenizer: Tokenizer,
    }

    impl HfTokenCounter {
        pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
            let tokenizer = Tokenizer::from_file(path.as_ref())
                .map_err(|e| EngineError::invalid_config(format!("cannot load tokenizer: {e}")))?;
            Ok(Self { tokenizer })
        }
    }

    impl TokenCounter for HfTokenCounter {
        fn count(&self, text: &str) -> usize {
            match self.tokenizer.encode(text, false) {
                Ok(encoding) => encoding.len(),
                Err(e) => {
                    log::warn!("tokenizer failed, using byte estimate: {e}");
                    super::HeuristicCounter.count(text)
                }
            }
        }
    }
}
