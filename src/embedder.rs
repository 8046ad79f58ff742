//! Sentence embeddings from a local BERT-family model with candle.
//!
//! Expects a sentence-transformers style directory (`config.json`,
//! `tokenizer.json`, `model.safetensors`), e.g. `intfloat/e5-small-v2`,
//! which is trained on the `query: ` / `passage: ` prefixes the ranker adds.
//! Token states are mean pooled and L2 normalized.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use log::info;
use tokenizers::Tokenizer;

use crate::error::{Error, Result};
use crate::nlp::EmbeddingModel;

const MAX_TOKENS: usize = 512;

fn model_error(context: &str, err: impl Display) -> Error {
    Error::Model(format!("{}: {}", context, err))
}

pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl BertEmbedder {
    /// Load from a model directory on the CPU.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        Self::from_files(
            &dir.join("config.json"),
            &dir.join("tokenizer.json"),
            &dir.join("model.safetensors"),
            &Device::Cpu,
        )
    }

    pub fn from_files(
        config_path: &Path,
        tokenizer_path: &Path,
        weights_path: &Path,
        device: &Device,
    ) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path).map_err(|e| {
            model_error(&format!("failed to read config {}", config_path.display()), e)
        })?;
        let config: BertConfig = serde_json::from_str(&config_str)
            .map_err(|e| model_error("failed to parse BERT config", e))?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| model_error("failed to load tokenizer", e))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)
                .map_err(|e| model_error("failed to load weights", e))?
        };
        let model =
            BertModel::load(vb, &config).map_err(|e| model_error("failed to build BERT model", e))?;

        info!("loaded embedding model from {}", weights_path.display());
        Ok(Self {
            model,
            tokenizer,
            device: device.clone(),
        })
    }

    fn tokenize(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| model_error("tokenization failed", e))?;
        let mut tokens = encoding.get_ids().to_vec();
        tokens.truncate(MAX_TOKENS);
        Ok(tokens)
    }

    /// Embed equal-length sequences in one forward pass. No padding means
    /// no attention mask and a plain mean over the token axis.
    fn embed_group(
        &self,
        tokens: &[u32],
        batch_size: usize,
        seq_len: usize,
    ) -> candle_core::Result<Tensor> {
        let input_ids = Tensor::from_slice(tokens, (batch_size, seq_len), &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, None)?;
        let pooled = hidden.mean(1)?;
        l2_normalize(&pooled)
    }
}

impl EmbeddingModel for BertEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut groups: HashMap<usize, Vec<(usize, Vec<u32>)>> = HashMap::new();
        for (idx, text) in texts.iter().enumerate() {
            let tokens = self.tokenize(text)?;
            groups.entry(tokens.len()).or_default().push((idx, tokens));
        }

        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for (seq_len, entries) in groups {
            let flat: Vec<u32> = entries.iter().flat_map(|(_, t)| t.iter().copied()).collect();
            let embeddings = self
                .embed_group(&flat, entries.len(), seq_len)
                .map_err(|e| model_error("forward pass failed", e))?;

            for (row, (idx, _)) in entries.iter().enumerate() {
                let vector = embeddings
                    .i(row)
                    .and_then(|t| t.to_vec1::<f32>())
                    .map_err(|e| model_error("reading embedding failed", e))?;
                results[*idx] = Some(vector);
            }
        }

        results
            .into_iter()
            .map(|v| v.ok_or_else(|| Error::Model("missing batch embedding result".to_string())))
            .collect()
    }
}

fn l2_normalize(tensor: &Tensor) -> candle_core::Result<Tensor> {
    let norm = tensor
        .sqr()?
        .sum_keepdim(1)?
        .sqrt()?
        .broadcast_add(&Tensor::new(&[1e-12f32], tensor.device())?)?;
    tensor.broadcast_div(&norm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_dir_is_a_model_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BertEmbedder::from_dir(dir.path()).err().unwrap();
        assert!(matches!(err, Error::Model(_)));
    }

    #[test]
    fn test_l2_normalize_rows() {
        let t = Tensor::new(&[[3.0f32, 4.0], [0.0, 2.0]], &Device::Cpu).unwrap();
        let rows = l2_normalize(&t).unwrap().to_vec2::<f32>().unwrap();
        assert!((rows[0][0] - 0.6).abs() < 1e-6);
        assert!((rows[0][1] - 0.8).abs() < 1e-6);
        assert!((rows[1][1] - 1.0).abs() < 1e-6);
    }
}
