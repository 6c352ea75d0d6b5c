use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crag_core::traits::Generator;
use crag_core::{Error, Result};

/// Run the generator, giving up after `timeout`.
///
/// An expired call keeps running on its worker thread; its result is discarded.
pub fn generate_with_timeout(
    generator: &Arc<dyn Generator>,
    prompt: &str,
    timeout: Option<Duration>,
) -> Result<String> {
    let Some(limit) = timeout else {
        return generator.generate(prompt).map_err(generation_error);
    };
    let (tx, rx) = mpsc::channel();
    let worker = Arc::clone(generator);
    let prompt = prompt.to_string();
    thread::Builder::new()
        .name("crag-generate".into())
        .spawn(move || {
            let _ = tx.send(worker.generate(&prompt));
        })?;
    match rx.recv_timeout(limit) {
        Ok(result) => result.map_err(generation_error),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            Err(Error::Generation(format!("generation timed out after {:?}", limit)))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(Error::Generation("generator thread panicked".into())),
    }
}

fn generation_error(e: anyhow::Error) -> Error {
    Error::Generation(format!("{:#}", e))
}
