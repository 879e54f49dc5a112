use crate::models::{Answer, RetrievedContext};
use crate::traits::LanguageModel;
use crate::ServiceError;
use tracing::debug;

/// Reply the model is told to give when the context lacks the answer.
pub const NOT_FOUND_SENTINEL: &str = "answer is not available in the provided context";

const CONTEXT_SEPARATOR: &str = "\n\n";

pub fn build_prompt(context: &RetrievedContext, question: &str) -> String {
    let context_text = context.texts().collect::<Vec<_>>().join(CONTEXT_SEPARATOR);
    format!(
        "Answer the question as detailed as possible from the provided context, make sure to provide all the details. \
If the answer is not in the provided context just say, \"{NOT_FOUND_SENTINEL}\". \
Do not make up an answer from outside the provided context.\n\n\
Context:\n{context_text}\n\n\
Question:\n{question}\n\n\
Answer:\n"
    )
}

/// Single-shot prompt assembly and model call; keeps no conversation state.
pub struct AnswerSynthesizer<'a, L: ?Sized> {
    model: &'a L,
    temperature: f32,
}

impl<'a, L> AnswerSynthesizer<'a, L>
where
    L: LanguageModel + Sync + ?Sized,
{
    pub fn new(model: &'a L, temperature: f32) -> Self {
        Self { model, temperature }
    }

    pub async fn synthesize(
        &self,
        context: &RetrievedContext,
        question: &str,
    ) -> Result<Answer, ServiceError> {
        let prompt = build_prompt(context, question);
        debug!(
            model = self.model.model(),
            context_chunks = context.chunks.len(),
            prompt_chars = prompt.chars().count(),
            "synthesizing answer"
        );
        let text = self.model.generate(&prompt, self.temperature).await?;
        Ok(Answer { text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoredChunk;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingModel {
        calls: Mutex<Vec<(String, f32)>>,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        fn model(&self) -> &str {
            "recording"
        }

        async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, ServiceError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((prompt.to_string(), temperature));
            }
            Ok(NOT_FOUND_SENTINEL.to_string())
        }
    }

    fn context(texts: &[&str]) -> RetrievedContext {
        RetrievedContext {
            chunks: texts
                .iter()
                .enumerate()
                .map(|(position, text)| ScoredChunk {
                    text: text.to_string(),
                    score: 1.0,
                    position,
                })
                .collect(),
        }
    }

    #[test]
    fn prompt_contains_constraints_context_and_question() {
        let prompt = build_prompt(&context(&["first chunk", "second chunk"]), "Why?");
        assert!(prompt.contains(NOT_FOUND_SENTINEL));
        assert!(prompt.contains("Do not make up an answer"));
        assert!(prompt.contains("first chunk\n\nsecond chunk"));
        assert!(prompt.contains("Question:\nWhy?"));
        let context_at = prompt.find("Context:").expect("context section");
        let question_at = prompt.find("Question:").expect("question section");
        assert!(context_at < question_at);
    }

    #[tokio::test]
    async fn synthesize_uses_configured_temperature_once() {
        let model = RecordingModel::default();
        let synthesizer = AnswerSynthesizer::new(&model, 0.3);

        let answer = synthesizer
            .synthesize(&context(&["nothing relevant"]), "What color is the sky?")
            .await
            .expect("fake model never fails");

        assert!(answer.is_not_found());
        let calls = model.calls.lock().expect("lock").clone();
        assert_eq!(calls.len(), 1);
        assert!((calls[0].1 - 0.3).abs() < f32::EPSILON);
        assert!(calls[0].0.contains("nothing relevant"));
    }

    #[test]
    fn grounded_answer_is_not_sentinel() {
        let answer = Answer {
            text: "The sky is blue.".to_string(),
        };
        assert!(!answer.is_not_found());
        let sentinel = Answer {
            text: "Answer is not available in the provided context.".to_string(),
        };
        assert!(sentinel.is_not_found());
    }
}
