use anyhow::Result;
use crag_core::config::PromptSettings;
use crag_core::traits::Generator;

pub const NO_CONTEXT_ANSWER: &str = "I don't have enough information to answer that.";

/// Offline generator that answers with the first context line of the prompt.
///
/// With `echo` set, the prompt is repeated before the answer, the way decoder-only
/// pipelines return their input.
#[derive(Debug, Clone)]
pub struct ExtractiveGenerator {
    context_label: String,
    question_label: String,
    echo: bool,
}

impl ExtractiveGenerator {
    pub fn new(prompt: &PromptSettings) -> Self {
        Self {
            context_label: prompt.context_label.clone(),
            question_label: prompt.question_label.clone(),
            echo: false,
        }
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    fn first_context_line<'a>(&self, prompt: &'a str) -> Option<&'a str> {
        let (_, after) = prompt.split_once(self.context_label.as_str())?;
        let block = match after.find(self.question_label.as_str()) {
            Some(end) => &after[..end],
            None => after,
        };
        block.lines().map(str::trim).find(|l| !l.is_empty())
    }
}

impl Generator for ExtractiveGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        let answer = self.first_context_line(prompt).unwrap_or(NO_CONTEXT_ANSWER);
        if self.echo {
            Ok(format!("{}\n{}", prompt, answer))
        } else {
            Ok(answer.to_string())
        }
    }
}
