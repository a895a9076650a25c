//! Question generation boundary.
//!
//! The real generator is an external LLM-backed service; the server only
//! depends on the `QuestionSource` trait and treats it as a black box that
//! either returns a question batch or fails. Whether the failure is a
//! timeout, a backend error, or malformed output, the moderator always gets
//! a fully valid question set: the deterministic built-in set is substituted
//! and the failure is reported as a non-fatal warning string.

use log::warn;
use shared::{sample_questions, validate_question_set, Question};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::timeout;

/// Generation calls that outlive this deadline are abandoned in favor of the
/// fallback set, so a moderator is never blocked on the external service.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(10);

pub type QuestionFuture = Pin<Box<dyn Future<Output = Result<Vec<Question>, String>> + Send>>;

/// An external producer of question batches. `generate` is expected to
/// return exactly `count` questions; the caller validates and never trusts
/// the shape.
pub trait QuestionSource: Send + Sync {
    fn generate(&self, prompt: &str, count: usize) -> QuestionFuture;
}

/// Deterministic offline source backed by the built-in sample set. Used when
/// no external generator is wired up, and as the default for the server
/// binary.
pub struct SampleSource;

impl QuestionSource for SampleSource {
    fn generate(&self, _prompt: &str, count: usize) -> QuestionFuture {
        let questions = fallback_set(count);
        Box::pin(async move { Ok(questions) })
    }
}

/// What a generation attempt produced. `warning` is set exactly when the
/// fallback set was substituted.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub questions: Vec<Question>,
    pub warning: Option<String>,
}

impl GenerationOutcome {
    pub fn succeeded(&self) -> bool {
        self.warning.is_none()
    }
}

/// The deterministic fallback: the built-in sample set truncated to `count`.
pub fn fallback_set(count: usize) -> Vec<Question> {
    let mut questions = sample_questions();
    let count = count.clamp(1, questions.len());
    questions.truncate(count);
    questions
}

/// Races the source against the deadline and validates the result. The
/// returned outcome always carries a non-empty, fully valid question set.
pub async fn generate_with_fallback(
    source: &dyn QuestionSource,
    prompt: &str,
    count: usize,
    deadline: Duration,
) -> GenerationOutcome {
    let result = match timeout(deadline, source.generate(prompt, count)).await {
        Ok(result) => result,
        Err(_) => {
            return fallback_outcome(
                count,
                format!(
                    "question generation timed out after {}s; using fallback questions",
                    deadline.as_secs()
                ),
            );
        }
    };

    let mut questions = match result {
        Ok(questions) => questions,
        Err(message) => {
            return fallback_outcome(
                count,
                format!("question generation failed: {}; using fallback questions", message),
            );
        }
    };

    // Sources may omit ids; back-fill before validating.
    for (i, question) in questions.iter_mut().enumerate() {
        if question.id == 0 {
            question.id = i as u32 + 1;
        }
    }

    if !validate_question_set(&questions) {
        return fallback_outcome(
            count,
            "question generation returned malformed questions; using fallback questions".into(),
        );
    }

    if questions.len() != count {
        warn!(
            "Generator returned {} questions, expected {}",
            questions.len(),
            count
        );
    }

    GenerationOutcome {
        questions,
        warning: None,
    }
}

fn fallback_outcome(count: usize, warning: String) -> GenerationOutcome {
    warn!("{}", warning);
    GenerationOutcome {
        questions: fallback_set(count),
        warning: Some(warning),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A source whose future never resolves, for timeout tests.
    struct StalledSource;

    impl QuestionSource for StalledSource {
        fn generate(&self, _prompt: &str, _count: usize) -> QuestionFuture {
            Box::pin(std::future::pending())
        }
    }

    /// A source that fails immediately.
    struct FailingSource;

    impl QuestionSource for FailingSource {
        fn generate(&self, _prompt: &str, _count: usize) -> QuestionFuture {
            Box::pin(async { Err("backend unavailable".to_string()) })
        }
    }

    /// A source that returns structurally broken questions.
    struct MalformedSource;

    impl QuestionSource for MalformedSource {
        fn generate(&self, _prompt: &str, count: usize) -> QuestionFuture {
            let mut questions = fallback_set(count);
            questions[0].correct_index = 9;
            Box::pin(async move { Ok(questions) })
        }
    }

    #[tokio::test]
    async fn test_timeout_substitutes_fallback_with_warning() {
        let outcome = generate_with_fallback(
            &StalledSource,
            "anything",
            5,
            Duration::from_millis(20),
        )
        .await;

        assert!(!outcome.succeeded());
        let warning = outcome.warning.unwrap();
        assert!(!warning.is_empty());
        assert!(warning.contains("timed out"));
        assert_eq!(outcome.questions.len(), 5);
        assert!(validate_question_set(&outcome.questions));
    }

    #[tokio::test]
    async fn test_backend_error_substitutes_fallback() {
        let outcome =
            generate_with_fallback(&FailingSource, "anything", 3, Duration::from_secs(1)).await;

        assert!(!outcome.succeeded());
        assert!(outcome.warning.unwrap().contains("backend unavailable"));
        assert_eq!(outcome.questions.len(), 3);
        assert!(validate_question_set(&outcome.questions));
    }

    #[tokio::test]
    async fn test_malformed_output_is_never_propagated() {
        let outcome =
            generate_with_fallback(&MalformedSource, "anything", 4, Duration::from_secs(1)).await;

        assert!(!outcome.succeeded());
        assert!(validate_question_set(&outcome.questions));
    }

    #[tokio::test]
    async fn test_sample_source_succeeds_without_warning() {
        let outcome =
            generate_with_fallback(&SampleSource, "rust", 5, Duration::from_secs(1)).await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.questions.len(), 5);
        assert!(validate_question_set(&outcome.questions));
    }

    #[tokio::test]
    async fn test_missing_ids_are_backfilled() {
        struct ZeroIdSource;
        impl QuestionSource for ZeroIdSource {
            fn generate(&self, _prompt: &str, count: usize) -> QuestionFuture {
                let mut questions = fallback_set(count);
                for q in &mut questions {
                    q.id = 0;
                }
                Box::pin(async move { Ok(questions) })
            }
        }

        let outcome =
            generate_with_fallback(&ZeroIdSource, "rust", 3, Duration::from_secs(1)).await;
        assert!(outcome.succeeded());
        let ids: Vec<u32> = outcome.questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_fallback_set_clamps_count() {
        assert_eq!(fallback_set(0).len(), 1);
        assert_eq!(fallback_set(5).len(), 5);
        assert_eq!(fallback_set(100).len(), 10);
        assert!(validate_question_set(&fallback_set(100)));
    }
}
