//! Embedding service trait and implementations.
//!
//! - `HashEmbedder` maps each word to a pseudo-random vector keyed by its hash
//!   and sums them, so texts sharing words land close together. It needs no
//!   model and is the fallback whenever no model is configured.
//! - `OnnxEmbedder` (feature `onnx`) loads a sentence-transformer ONNX model
//!   via ort and tokenizes with the HuggingFace tokenizers crate.

use tracing::warn;
use xxhash_rust::xxh3::xxh3_64;

use sema_core::config::EmbeddingConfig;
use sema_core::error::{Result, SemaError};

/// Service for generating text embeddings.
///
/// Returns one vector per input text, in input order, each of length
/// `dimension()`.
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts.
    fn embed(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>>> + Send;

    /// Return the dimensionality of vectors produced by this service.
    fn dimension(&self) -> usize;

    /// Identifier of the underlying model.
    fn model_name(&self) -> &str;
}

/// Object-safe version of [`Embedder`] for dynamic dispatch.
///
/// `Embedder::embed` returns `impl Future` and is therefore not object-safe.
/// This trait boxes the future instead so `Box<dyn DynEmbedder>` can be
/// stored without generics. Every `Embedder` implements it.
pub trait DynEmbedder: Send + Sync {
    fn embed_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<Vec<f32>>>> + Send + 'a>>;

    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}

impl<T: Embedder> DynEmbedder for T {
    fn embed_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<Vec<f32>>>> + Send + 'a>>
    {
        Box::pin(self.embed(texts))
    }

    fn dimension(&self) -> usize {
        Embedder::dimension(self)
    }

    fn model_name(&self) -> &str {
        Embedder::model_name(self)
    }
}

/// Pick an embedder for the configuration.
///
/// Uses the ONNX model when the `onnx` feature is enabled and `model_dir`
/// holds a loadable model; otherwise falls back to [`HashEmbedder`] with the
/// configured dimension.
pub fn build_embedder(config: &EmbeddingConfig) -> Box<dyn DynEmbedder> {
    if let Some(embedder) = try_model(config) {
        return embedder;
    }

    warn!(
        model = %config.model,
        dimension = config.dimension,
        "Using hash-based fallback embeddings"
    );
    Box::new(HashEmbedder::new(config.dimension))
}

#[cfg(feature = "onnx")]
fn try_model(config: &EmbeddingConfig) -> Option<Box<dyn DynEmbedder>> {
    let dir = config.model_dir.as_ref()?;
    match onnx::OnnxEmbedder::from_directory(dir, &config.model) {
        Ok(embedder) => Some(Box::new(embedder)),
        Err(e) => {
            warn!(error = %e, "ONNX embedder unavailable");
            None
        }
    }
}

#[cfg(not(feature = "onnx"))]
fn try_model(config: &EmbeddingConfig) -> Option<Box<dyn DynEmbedder>> {
    if config.model_dir.is_some() {
        warn!("model_dir is set but ONNX support is not compiled in");
    }
    None
}

// ---------------------------------------------------------------------------
// HashEmbedder - deterministic feature-hashing fallback
// ---------------------------------------------------------------------------

/// Deterministic bag-of-words embedder.
///
/// Each lowercase alphanumeric token seeds a pseudo-random vector in
/// `[-1, 1]^d` from its xxh3 hash; a text's vector is the L2-normalized sum
/// over its tokens. Output depends only on the input text, so vectors saved
/// with one build stay comparable with queries embedded by another.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(SemaError::Embedding("Cannot embed empty text".to_string()));
        }

        let mut result = vec![0.0f32; self.dimension];
        let mut tokens = tokenize(text).peekable();
        if tokens.peek().is_none() {
            // No word characters at all: hash the raw text as one token.
            accumulate(&mut result, text);
        }
        for token in tokens {
            accumulate(&mut result, &token);
        }

        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }
        Ok(result)
    }
}

impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed_one(text)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hash-bow"
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn accumulate(acc: &mut [f32], token: &str) {
    let mut state = xxh3_64(token.as_bytes());
    for val in acc.iter_mut() {
        let bits = splitmix64(&mut state);
        *val += ((bits as f64 / u64::MAX as f64) * 2.0 - 1.0) as f32;
    }
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// ---------------------------------------------------------------------------
// OnnxEmbedder - real ONNX Runtime inference
// ---------------------------------------------------------------------------

#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;

#[cfg(feature = "onnx")]
mod onnx {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use ort::session::Session;
    use ort::value::TensorRef;
    use tokenizers::Tokenizer;
    use tracing::info;

    use sema_core::error::{Result, SemaError};

    use super::Embedder;

    /// ONNX Runtime-backed sentence-transformer embedder.
    ///
    /// Expects a model directory containing `model.onnx` and `tokenizer.json`.
    /// Token embeddings are mean-pooled under the attention mask and
    /// L2-normalized.
    pub struct OnnxEmbedder {
        session: Arc<Mutex<Session>>,
        tokenizer: Arc<Tokenizer>,
        dimension: usize,
        model: String,
    }

    impl std::fmt::Debug for OnnxEmbedder {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("OnnxEmbedder")
                .field("model", &self.model)
                .field("dimension", &self.dimension)
                .finish()
        }
    }

    impl OnnxEmbedder {
        pub fn from_directory(model_dir: &Path, model: &str) -> Result<Self> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");
            for path in [&model_path, &tokenizer_path] {
                if !path.exists() {
                    return Err(SemaError::Embedding(format!(
                        "model file not found at {}",
                        path.display()
                    )));
                }
            }

            let session = Session::builder()
                .map_err(|e| SemaError::Embedding(format!("ONNX session builder: {}", e)))?
                .with_intra_threads(1)
                .map_err(|e| SemaError::Embedding(format!("ONNX set threads: {}", e)))?
                .commit_from_file(&model_path)
                .map_err(|e| SemaError::Embedding(format!("ONNX load model: {}", e)))?;

            // Output is [batch, seq_len, hidden_dim].
            let dimension = session
                .outputs()
                .first()
                .and_then(|out| out.dtype().tensor_shape())
                .and_then(|shape| shape.last().copied())
                .filter(|d| *d > 0)
                .map(|d| d as usize)
                .ok_or_else(|| {
                    SemaError::Embedding("cannot determine model output dimension".to_string())
                })?;

            let tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| SemaError::Embedding(format!("Failed to load tokenizer: {}", e)))?;

            info!(model, dimension, dir = %model_dir.display(), "Loaded ONNX embedding model");

            Ok(Self {
                session: Arc::new(Mutex::new(session)),
                tokenizer: Arc::new(tokenizer),
                dimension,
                model: model.to_string(),
            })
        }

        fn embed_sync(
            session: &Mutex<Session>,
            tokenizer: &Tokenizer,
            text: &str,
        ) -> Result<Vec<f32>> {
            if text.is_empty() {
                return Err(SemaError::Embedding("Cannot embed empty text".to_string()));
            }

            let encoding = tokenizer
                .encode(text, true)
                .map_err(|e| SemaError::Embedding(format!("Tokenization failed: {}", e)))?;

            let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
            let attention_mask: Vec<i64> = encoding
                .get_attention_mask()
                .iter()
                .map(|&m| m as i64)
                .collect();
            let token_type_ids: Vec<i64> =
                encoding.get_type_ids().iter().map(|&t| t as i64).collect();
            let seq_len = input_ids.len();

            let shape_err = |e: ndarray::ShapeError| SemaError::Embedding(format!("input array: {}", e));
            let ids = ndarray::Array2::from_shape_vec((1, seq_len), input_ids).map_err(shape_err)?;
            let mask = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask.clone())
                .map_err(shape_err)?;
            let types =
                ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids).map_err(shape_err)?;

            let tensor_err = |e: ort::Error| SemaError::Embedding(format!("input tensor: {}", e));
            let ids_ref = TensorRef::from_array_view(&ids).map_err(tensor_err)?;
            let mask_ref = TensorRef::from_array_view(&mask).map_err(tensor_err)?;
            let type_ref = TensorRef::from_array_view(&types).map_err(tensor_err)?;

            let mut session = session
                .lock()
                .map_err(|e| SemaError::Embedding(format!("Session lock poisoned: {}", e)))?;
            let outputs = session
                .run(ort::inputs![ids_ref, mask_ref, type_ref])
                .map_err(|e| SemaError::Embedding(format!("ONNX inference failed: {}", e)))?;

            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| SemaError::Embedding(format!("Extract embeddings: {}", e)))?;
            let hidden_dim = match shape.iter().last() {
                Some(&d) if shape.len() >= 2 && d > 0 => d as usize,
                _ => {
                    return Err(SemaError::Embedding(format!(
                        "Unexpected output shape: {:?}",
                        shape
                    )))
                }
            };

            let mut pooled = vec![0.0f32; hidden_dim];
            let mut count = 0.0f32;
            for (tok_idx, &mask_val) in attention_mask.iter().enumerate() {
                if mask_val > 0 {
                    let row = &data[tok_idx * hidden_dim..(tok_idx + 1) * hidden_dim];
                    for (acc, v) in pooled.iter_mut().zip(row) {
                        *acc += v;
                    }
                    count += 1.0;
                }
            }
            if count > 0.0 {
                for val in &mut pooled {
                    *val /= count;
                }
            }

            let norm: f32 = pooled.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                for val in &mut pooled {
                    *val /= norm;
                }
            }
            Ok(pooled)
        }
    }

    impl Embedder for OnnxEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            // Inference is CPU-bound; run the whole batch on a blocking thread.
            let session = Arc::clone(&self.session);
            let tokenizer = Arc::clone(&self.tokenizer);
            let texts = texts.to_vec();

            tokio::task::spawn_blocking(move || {
                texts
                    .iter()
                    .map(|text| Self::embed_sync(&session, &tokenizer, text))
                    .collect()
            })
            .await
            .map_err(|e| SemaError::Embedding(format!("Embedding task panicked: {}", e)))?
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_name(&self) -> &str {
            &self.model
        }
    }
}
