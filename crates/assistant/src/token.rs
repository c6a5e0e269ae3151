//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. Budgets are
//! enforced against this estimate, never against a real tokenizer.

use palaver_core::message::{ContentPart, Message};

/// Flat cost charged for each image part.
pub const IMAGE_PART_TOKENS: usize = 85;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    tokens_for_chars(text.chars().count())
}

fn tokens_for_chars(chars: usize) -> usize {
    chars.div_ceil(4)
}

/// Characters a part contributes to the estimate. Extracted documents are
/// sent as text, so they count in full.
fn part_chars(part: &ContentPart) -> usize {
    match part {
        ContentPart::Text { text } | ContentPart::DocumentExtract { text, .. } => {
            text.chars().count()
        }
        ContentPart::Image { .. } => 0,
    }
}

fn image_count(message: &Message) -> usize {
    message.parts().iter().filter(|p| p.is_image()).count()
}

/// Estimate tokens for a slice of messages.
///
/// All text is pooled before rounding, so splitting a text across several
/// messages does not inflate the estimate.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    let chars: usize = messages
        .iter()
        .flat_map(|m| m.parts())
        .map(part_chars)
        .sum();
    let images: usize = messages.iter().map(image_count).sum();
    tokens_for_chars(chars) + images * IMAGE_PART_TOKENS
}
