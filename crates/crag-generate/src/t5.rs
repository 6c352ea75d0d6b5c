use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use candle_core::{Device, Tensor};
use candle_transformers::models::t5::{Config as T5Config, T5ForConditionalGeneration};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crag_core::traits::Generator;
use crag_embed::{load_weights, select_device};

pub const MAX_INPUT_TOKENS: usize = 512;

/// Greedy text2text decoding with a local flan-t5 checkpoint.
///
/// The model keeps a decoder KV cache, so calls are serialized through a mutex.
pub struct T5Generator {
    model: Mutex<T5ForConditionalGeneration>,
    tokenizer: Tokenizer,
    device: Device,
    max_new_tokens: usize,
    decoder_start_id: u32,
    eos_id: u32,
    use_cache: bool,
    question_label: String,
}

impl T5Generator {
    pub fn load(model_dir: &Path, max_new_tokens: usize) -> Result<Self> {
        let device = select_device();
        info!(model_dir = %model_dir.display(), "loading generation model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: T5Config = serde_json::from_str(&raw)?;
        let fields: serde_json::Value = serde_json::from_str(&raw)?;
        let pad_id = fields["pad_token_id"].as_u64().unwrap_or(0) as u32;
        let decoder_start_id = fields["decoder_start_token_id"].as_u64().map(|v| v as u32).unwrap_or(pad_id);
        let eos_id = fields["eos_token_id"].as_u64().unwrap_or(1) as u32;
        let use_cache = fields["use_cache"].as_bool().unwrap_or(true);

        let vb = load_weights(model_dir, &device)?;
        let model = T5ForConditionalGeneration::load(vb, &config)?;
        info!(max_new_tokens, "generation model loaded");
        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            device,
            max_new_tokens,
            decoder_start_id,
            eos_id,
            use_cache,
            question_label: "Question:".to_string(),
        })
    }

    /// Label that starts the part of the prompt kept whole when the input is too long.
    pub fn with_question_label(mut self, label: impl Into<String>) -> Self {
        self.question_label = label.into();
        self
    }

    /// Token ids for `prompt`. Overlong prompts lose the end of the context;
    /// the question and answer cue are always kept.
    fn input_ids(&self, prompt: &str) -> Result<Vec<u32>> {
        let split = prompt.rfind(self.question_label.as_str()).unwrap_or(0);
        let (head, tail) = prompt.split_at(split);
        let head = self.tokenizer.encode(head, false).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let tail = self.tokenizer.encode(tail, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        fit_to_window(head.get_ids(), tail.get_ids(), MAX_INPUT_TOKENS)
    }
}

/// Joins `head` and `tail` within `max` tokens, cutting from the end of `head`.
/// Fails when `tail` alone does not fit.
pub fn fit_to_window(head: &[u32], tail: &[u32], max: usize) -> Result<Vec<u32>> {
    if tail.len() > max {
        bail!("question is {} tokens, the model accepts {}", tail.len(), max);
    }
    let keep = head.len().min(max - tail.len());
    if keep < head.len() {
        debug!(dropped = head.len() - keep, "context truncated to fit the input window");
    }
    let mut ids = Vec::with_capacity(keep + tail.len());
    ids.extend_from_slice(&head[..keep]);
    ids.extend_from_slice(tail);
    Ok(ids)
}

impl Generator for T5Generator {
    fn generate(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let ids = self.input_ids(prompt)?;
        let input_ids = Tensor::new(ids.as_slice(), &self.device)?.unsqueeze(0)?;

        let mut model = self.model.lock().map_err(|_| anyhow!("generation model lock poisoned"))?;
        model.clear_kv_cache();
        let encoder_output = model.encode(&input_ids)?;

        let mut output = vec![self.decoder_start_id];
        for step in 0..self.max_new_tokens {
            let decoder_ids = if step == 0 || !self.use_cache {
                Tensor::new(output.as_slice(), &self.device)?.unsqueeze(0)?
            } else {
                let last = output[output.len() - 1];
                Tensor::new(&[last], &self.device)?.unsqueeze(0)?
            };
            let logits = model.decode(&decoder_ids, &encoder_output)?.squeeze(0)?;
            let next = logits.argmax(0)?.to_scalar::<u32>()?;
            if next == self.eos_id {
                break;
            }
            output.push(next);
        }
        model.clear_kv_cache();
        drop(model);

        let text = self
            .tokenizer
            .decode(&output[1..], true)
            .map_err(|e| anyhow!("Detokenization failed: {}", e))?;
        debug!(tokens = output.len() - 1, elapsed_ms = start.elapsed().as_millis() as u64, "generated");
        Ok(text)
    }
}
