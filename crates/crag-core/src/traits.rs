use std::sync::Arc;

/// Maps text to fixed-dimension vectors.
///
/// Implementations must return vectors of exactly `dim()` values, using the same
/// normalization for documents and queries (L2-normalized for cosine indexes).
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model behind this embedder.
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut out = self.embed_batch(&[text.to_string()])?;
        if out.len() != 1 {
            return Err(anyhow::anyhow!("embedder returned {} vectors for one query", out.len()));
        }
        out.pop().ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Maps a prompt to generated text. Calls may block for a long time.
pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn id(&self) -> &str { (**self).id() }
    fn dim(&self) -> usize { (**self).dim() }
    fn max_len(&self) -> usize { (**self).max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { (**self).embed_batch(texts) }
    fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> { (**self).embed_query(text) }
}

impl<T: Embedder + ?Sized> Embedder for Arc<T> {
    fn id(&self) -> &str { (**self).id() }
    fn dim(&self) -> usize { (**self).dim() }
    fn max_len(&self) -> usize { (**self).max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { (**self).embed_batch(texts) }
    fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> { (**self).embed_query(text) }
}

impl<T: Generator + ?Sized> Generator for Box<T> {
    fn generate(&self, prompt: &str) -> anyhow::Result<String> { (**self).generate(prompt) }
}

impl<T: Generator + ?Sized> Generator for Arc<T> {
    fn generate(&self, prompt: &str) -> anyhow::Result<String> { (**self).generate(prompt) }
}
