//! Call helpers shared by the roles: retry on empty replies and continue
//! replies that look truncated.

use super::prompts::CONTINUATION_PROMPT;
use crate::display::{self, Tone};
use crate::error::AgentError;
use crate::llm::{ChatBackend, Completion, CompletionRequest, Message, TokenUsage};

/// Send `request`, resending it while the reply is empty or whitespace.
///
/// `attempts` is the total number of calls allowed (at least one).
pub async fn complete_non_empty<B: ChatBackend>(
    backend: &B,
    request: &CompletionRequest,
    attempts: u32,
    role: &str,
) -> Result<Completion, AgentError> {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        let completion = backend.complete(request.clone()).await?;
        if !completion.text.trim().is_empty() {
            return Ok(completion);
        }
        tracing::warn!(role, attempt, model = %request.model, "Empty response received");
        if attempt < attempts {
            display::panel(
                &format!("Empty {role} Response"),
                &format!("Empty response received from the {role}. Retrying..."),
                Tone::Warning,
            );
        }
    }
    Err(AgentError::EmptyResponse {
        role: role.to_string(),
        attempts,
    })
}

/// Whether a reply reached the length at which output may have been cut off.
///
/// Uses the provider's completion token count when reported and the
/// character count otherwise.
pub fn looks_truncated(completion: &Completion, threshold: usize) -> bool {
    match completion.usage.output_tokens {
        Some(tokens) => tokens as usize >= threshold,
        None => completion.text.chars().count() >= threshold,
    }
}

/// Result of [`continue_while_truncated`].
pub struct Continued {
    pub text: String,
    pub usage: TokenUsage,
    pub continuations: u32,
}

/// Keep asking the model to finish its answer while it looks truncated.
///
/// Each continuation replays the original conversation, the answer so far as
/// an assistant turn, and [`CONTINUATION_PROMPT`]. Parts are joined with
/// `separator`.
pub async fn continue_while_truncated<B: ChatBackend>(
    backend: &B,
    base: &CompletionRequest,
    first: Completion,
    threshold: usize,
    max_continuations: u32,
    separator: &str,
) -> Result<Continued, AgentError> {
    let mut text = first.text;
    let mut usage = first.usage;
    let mut last = Completion {
        text: text.clone(),
        usage: first.usage,
    };
    let mut continuations = 0;

    while continuations < max_continuations && looks_truncated(&last, threshold) {
        display::warn_line("Output may be truncated. Attempting to continue the response.");
        tracing::info!(model = %base.model, continuations, "Continuing truncated response");

        let mut request = base.clone();
        request.messages.push(Message::assistant(text.clone()));
        request.messages.push(Message::user(CONTINUATION_PROMPT));

        let next = backend.complete(request).await?;
        continuations += 1;
        usage = usage.add(next.usage);
        if next.text.trim().is_empty() {
            break;
        }
        text.push_str(separator);
        text.push_str(&next.text);
        last = next;
    }

    Ok(Continued {
        text,
        usage,
        continuations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_count_wins_over_characters() {
        let long_text = Completion {
            text: "x".repeat(5000),
            usage: TokenUsage {
                input_tokens: Some(10),
                output_tokens: Some(100),
            },
        };
        assert!(!looks_truncated(&long_text, 4000));

        let many_tokens = Completion {
            text: "short".into(),
            usage: TokenUsage {
                input_tokens: None,
                output_tokens: Some(4000),
            },
        };
        assert!(looks_truncated(&many_tokens, 4000));
    }

    #[test]
    fn falls_back_to_characters() {
        let completion = Completion {
            text: "y".repeat(4000),
            usage: TokenUsage::default(),
        };
        assert!(looks_truncated(&completion, 4000));
        assert!(!looks_truncated(&completion, 4001));
    }
}
