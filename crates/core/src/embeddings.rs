use crate::error::EmbeddingError;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

#[derive(Debug, Clone, Copy)]
pub struct HashNgramEmbedder {
    pub dimensions: usize,
}

impl Default for HashNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl HashNgramEmbedder {
    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        l2_normalize(vector)
    }
}

impl Embedder for HashNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed_one(text))
    }
}

fn l2_normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in &mut vector {
            *value /= magnitude;
        }
    }
    vector
}

#[cfg(feature = "fastembed")]
pub use model::FastembedEmbedder;

#[cfg(feature = "fastembed")]
mod model {
    use super::{l2_normalize, Embedder};
    use crate::error::EmbeddingError;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::path::Path;
    use std::sync::Mutex;

    pub struct FastembedEmbedder {
        model: Mutex<TextEmbedding>,
        dimensions: usize,
    }

    impl FastembedEmbedder {
        pub fn try_new(cache_dir: &Path, show_progress: bool) -> Result<Self, EmbeddingError> {
            let options = InitOptions::new(EmbeddingModel::BGESmallENV15)
                .with_cache_dir(cache_dir.to_path_buf())
                .with_show_download_progress(show_progress);

            let model = TextEmbedding::try_new(options)
                .map_err(|error| EmbeddingError::Model(error.to_string()))?;

            Ok(Self {
                model: Mutex::new(model),
                dimensions: super::DEFAULT_EMBEDDING_DIMENSIONS,
            })
        }
    }

    impl Embedder for FastembedEmbedder {
        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }

            let mut model = self
                .model
                .lock()
                .map_err(|error| EmbeddingError::Model(format!("model lock poisoned: {error}")))?;

            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            let vectors = model
                .embed(refs, None)
                .map_err(|error| EmbeddingError::Model(error.to_string()))?;

            if vectors.len() != texts.len() {
                return Err(EmbeddingError::BatchSize {
                    expected: texts.len(),
                    actual: vectors.len(),
                });
            }

            Ok(vectors.into_iter().map(l2_normalize).collect())
        }

        fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let mut vectors = self.embed_batch(&[text.to_string()])?;
            vectors.pop().ok_or(EmbeddingError::BatchSize {
                expected: 1,
                actual: 0,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Embedder, HashNgramEmbedder};

    #[test]
    fn embedder_is_deterministic() {
        let embedder = HashNgramEmbedder::default();
        let first = embedder.embed_query("Meeting notes for the renovation").unwrap();
        let second = embedder.embed_query("Meeting notes for the renovation").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_expected_length() {
        let embedder = HashNgramEmbedder { dimensions: 32 };
        let vector = embedder.embed_query("abc").unwrap();
        assert_eq!(vector.len(), 32);
    }

    #[test]
    fn default_dimensions_match_constant() {
        let embedder = HashNgramEmbedder::default();
        assert_eq!(embedder.dimensions(), 384);
    }

    #[test]
    fn vectors_are_unit_length() {
        let embedder = HashNgramEmbedder::default();
        let vector = embedder.embed_query("grocery list with apples and rye bread").unwrap();
        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let embedder = HashNgramEmbedder::default();
        let vector = embedder.embed_query("").unwrap();
        assert!(vector.iter().all(|value| *value == 0.0));
    }

    #[test]
    fn batch_preserves_input_order() {
        let embedder = HashNgramEmbedder::default();
        let texts = vec!["first note".to_string(), "second note".to_string()];
        let batch = embedder.embed_batch(&texts).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed_query("first note").unwrap());
        assert_eq!(batch[1], embedder.embed_query("second note").unwrap());
    }
}
