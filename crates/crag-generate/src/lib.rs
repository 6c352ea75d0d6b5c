//! Text generators behind the `Generator` trait: a candle flan-t5 model and an
//! extractive stand-in for tests and offline runs.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crag_core::config::{env_flag, Settings};
use crag_core::traits::Generator;

mod extractive;
mod t5;

pub use extractive::{ExtractiveGenerator, NO_CONTEXT_ANSWER};
pub use t5::{fit_to_window, T5Generator, MAX_INPUT_TOKENS};

/// Generator described by `settings`; `APP_USE_FAKE_GENERATOR=1` selects [`ExtractiveGenerator`].
pub fn get_default_generator(settings: &Settings) -> Result<Box<dyn Generator>> {
    if env_flag("APP_USE_FAKE_GENERATOR") {
        info!("using extractive generator");
        return Ok(Box::new(ExtractiveGenerator::new(&settings.prompt)));
    }
    let dir = resolve_model_dir(&settings.generation_model_dir())?;
    let generator = T5Generator::load(&dir, settings.generation.max_new_tokens)?
        .with_question_label(settings.prompt.question_label.as_str());
    Ok(Box::new(generator))
}

/// `APP_GENERATION_MODEL_DIR` wins over the configured directory.
pub fn resolve_model_dir(configured: &Path) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("APP_GENERATION_MODEL_DIR") {
        let p = PathBuf::from(dir);
        if p.exists() {
            return Ok(p);
        }
        warn!(path = %p.display(), "APP_GENERATION_MODEL_DIR does not exist, falling back to config");
    }
    if configured.exists() {
        return Ok(configured.to_path_buf());
    }
    Err(anyhow!("Could not locate generation model directory {}", configured.display()))
}
