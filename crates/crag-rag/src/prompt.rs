use crag_core::config::PromptSettings;
use crag_core::ScoredChunk;

/// Wraps ranked chunks and a question in the configured instruction template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptAssembler {
    settings: PromptSettings,
}

impl PromptAssembler {
    pub fn new(settings: PromptSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PromptSettings {
        &self.settings
    }

    /// Instruction, context block (one rendered chunk per line, in ranked order),
    /// question and answer cue. No truncation: `k` bounds the context.
    pub fn build_prompt(&self, question: &str, ranked: &[ScoredChunk]) -> String {
        let context = ranked.iter().map(|s| s.chunk.render()).collect::<Vec<_>>().join("\n");
        let s = &self.settings;
        let prompt = format!(
            "{}\n\n{}\n{}\n\n{}\n{}\n\n{}",
            s.instruction.trim(),
            s.context_label,
            context,
            s.question_label,
            question,
            s.answer_cue
        );
        prompt.trim().to_string()
    }

    /// The answer part of generated text. An echoed prompt is removed first;
    /// otherwise everything up to the last answer cue is dropped.
    pub fn extract_answer(&self, prompt: &str, generated: &str) -> String {
        let generated = generated.trim_start();
        if let Some(rest) = generated.strip_prefix(prompt) {
            return rest.trim().to_string();
        }
        match generated.rsplit_once(self.settings.answer_cue.as_str()) {
            Some((_, answer)) => answer.trim().to_string(),
            None => generated.trim().to_string(),
        }
    }
}
