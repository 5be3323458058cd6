//! Token-budget trim policy.
//!
//! [`plan`] works on a borrowed [`Window`](super::transcript::Window) and
//! never mutates the transcript. The caller applies the plan only after the
//! completion succeeds, so a failed turn leaves history exactly as it was.

use crate::llm::TokenCounter;

use super::chatml;
use super::transcript::Transcript;

/// Outcome of fitting a transcript into a token budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimPlan {
    /// Messages to drop from just behind the anchor.
    pub dropped: usize,
    /// Estimate for `prompt`, measured on its JSON-escaped form.
    pub estimated_tokens: usize,
    /// Prompt rendered from the trimmed view.
    pub prompt: String,
}

impl TrimPlan {
    pub fn within(&self, budget: usize) -> bool {
        self.estimated_tokens <= budget
    }
}

/// Drop the oldest non-anchor messages one at a time until the rendered
/// prompt fits `budget` or only [`MIN_RETAINED`](super::transcript::MIN_RETAINED)
/// messages remain. Each step re-renders and re-measures the trimmed view.
pub fn plan(system_prompt: &str, transcript: &Transcript, budget: usize, counter: &TokenCounter) -> TrimPlan {
    let measure = |dropped: usize| {
        let prompt = chatml::render(system_prompt, transcript.window(dropped).iter());
        let tokens = counter.count_json_escaped(&prompt);
        (prompt, tokens)
    };

    let mut dropped = 0;
    let (mut prompt, mut estimated_tokens) = measure(dropped);
    while estimated_tokens > budget && dropped < transcript.droppable() {
        dropped += 1;
        (prompt, estimated_tokens) = measure(dropped);
    }

    TrimPlan { dropped, estimated_tokens, prompt }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::transcript::MIN_RETAINED;

    fn chars() -> TokenCounter {
        TokenCounter::CharsPerToken(1)
    }

    fn with_turns(n: usize) -> Transcript {
        let mut t = Transcript::new();
        for i in 0..n {
            t.record_exchange(&format!("question {i}"), &format!("answer {i}"));
        }
        t
    }

    #[test]
    fn fits_without_trimming() {
        let t = with_turns(2);
        let p = plan("sys", &t, usize::MAX, &chars());
        assert_eq!(p.dropped, 0);
        assert_eq!(p.prompt, chatml::render("sys", t.messages()));
    }

    #[test]
    fn trims_until_within_budget() {
        let t = with_turns(4);
        let full = chars().count_json_escaped(&chatml::render("sys", t.messages()));
        let one_fewer = chars().count_json_escaped(&chatml::render("sys", t.window(1).iter()));
        // Budget between the full and the one-message-shorter prompt.
        let p = plan("sys", &t, one_fewer, &chars());
        assert!(full > one_fewer);
        assert_eq!(p.dropped, 1);
        assert!(p.within(one_fewer));
        assert!(!p.prompt.contains("answer 0"));
        assert!(p.prompt.contains("question 0"));
    }

    #[test]
    fn never_below_floor_or_past_anchor() {
        let t = with_turns(5);
        let p = plan("sys", &t, 0, &chars());
        assert_eq!(p.dropped, t.len() - MIN_RETAINED);
        assert!(!p.within(0));
        assert!(p.prompt.contains("<|im_start|>user\nquestion 0\n<|im_end|>"));
        assert!(p.prompt.contains("answer 4"));
        assert!(!p.prompt.contains("question 4"));
    }

    #[test]
    fn short_transcript_is_never_trimmed() {
        let t = with_turns(1);
        let p = plan("sys", &t, 0, &chars());
        assert_eq!(p.dropped, 0);
    }

    #[test]
    fn budget_uses_json_escaped_length() {
        let t = Transcript::new();
        let prompt = chatml::render("sys", t.messages());
        let raw = chars().count(&prompt);
        let escaped = chars().count_json_escaped(&prompt);
        assert!(escaped > raw);
        let p = plan("sys", &t, raw, &chars());
        assert_eq!(p.estimated_tokens, escaped);
    }
}
