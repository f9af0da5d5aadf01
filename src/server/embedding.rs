//! ONNX sentence-embedding model run inside the daemon.

use std::path::Path;
use std::sync::{Arc, Mutex};

use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tokenizers::{PaddingParams, PaddingStrategy, TruncationParams, TruncationStrategy};
use tracing::{debug, warn};

use crate::error::ModelError;
use crate::models::EmbeddingConfig;

const TOKEN_TYPE_IDS: &str = "token_type_ids";

pub struct EmbeddingModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dimension: usize,
    uses_token_types: bool,
}

impl EmbeddingModel {
    /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
    pub fn load(config: &EmbeddingConfig, model_dir: &Path) -> Result<Self, ModelError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let max_tokens = config.max_tokens as usize;

        if !model_path.exists() {
            return Err(ModelError::NotFound(model_path.display().to_string()));
        }
        if !tokenizer_path.exists() {
            return Err(ModelError::NotFound(tokenizer_path.display().to_string()));
        }

        let session = Session::builder()
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?
            .with_intra_threads(num_cpus())
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?
            .commit_from_file(&model_path)
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?;

        // BERT exports take segment ids; some distilled models do not.
        let uses_token_types = session.inputs.iter().any(|i| i.name == TOKEN_TYPE_IDS);

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| ModelError::TokenizerError(e.to_string()))?;

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_tokens,
                strategy: TruncationStrategy::LongestFirst,
                ..Default::default()
            }))
            .map_err(|e| ModelError::TokenizerError(e.to_string()))?;

        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        debug!(
            model = %model_path.display(),
            uses_token_types,
            max_tokens,
            "loaded embedding model"
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimension: config.dimension as usize,
            uses_token_types,
        })
    }

    /// Mean-pooled, L2-normalized sentence embeddings, one per text.
    pub fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| ModelError::TokenizerError(e.to_string()))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);
        let batch_size = encodings.len();

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let row = i * max_len;
            for (j, ((&id, &mask), &type_id)) in encoding
                .get_ids()
                .iter()
                .zip(encoding.get_attention_mask())
                .zip(encoding.get_type_ids())
                .enumerate()
            {
                input_ids[row + j] = id as i64;
                attention_mask[row + j] = mask as i64;
                token_type_ids[row + j] = type_id as i64;
            }
        }
        let mask = attention_mask.clone();

        let shape = [batch_size, max_len];
        let input_ids = Tensor::from_array((shape, input_ids))
            .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;
        let attention_mask = Tensor::from_array((shape, attention_mask))
            .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ModelError::InferenceError("session lock poisoned".to_string()))?;

        let outputs = if self.uses_token_types {
            let token_type_ids = Tensor::from_array((shape, token_type_ids))
                .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                TOKEN_TYPE_IDS => token_type_ids
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask
            ])
        }
        .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;

        let hidden = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;
        let out_shape = hidden.shape().to_vec();

        let embeddings: Vec<Vec<f32>> = match out_shape.as_slice() {
            // token embeddings: [batch, seq, hidden]
            &[_, seq_len, dim] => (0..batch_size)
                .map(|i| {
                    let mut pooled = vec![0.0f32; dim];
                    let mut tokens = 0.0f32;
                    for j in 0..seq_len.min(max_len) {
                        if mask[i * max_len + j] == 0 {
                            continue;
                        }
                        for (d, value) in pooled.iter_mut().enumerate() {
                            *value += hidden[[i, j, d]];
                        }
                        tokens += 1.0;
                    }
                    if tokens > 0.0 {
                        pooled.iter_mut().for_each(|v| *v /= tokens);
                    }
                    normalize(&pooled)
                })
                .collect(),
            // already pooled: [batch, hidden]
            &[_, dim] => (0..batch_size)
                .map(|i| {
                    let embedding: Vec<f32> = (0..dim).map(|d| hidden[[i, d]]).collect();
                    normalize(&embedding)
                })
                .collect(),
            other => {
                return Err(ModelError::InferenceError(format!(
                    "unexpected output shape: {:?}",
                    other
                )));
            }
        };

        if let Some(first) = embeddings.first()
            && first.len() != self.dimension
        {
            warn!(
                configured = self.dimension,
                actual = first.len(),
                "model output dimension differs from embedding.dimension"
            );
        }

        Ok(embeddings)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

pub type SharedEmbeddingModel = Arc<EmbeddingModel>;
