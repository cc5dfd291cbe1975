//! Token estimation for conversation turns
//!
//! Exact tokenization is model-specific; the remote service does not expose
//! its tokenizer. We approximate from byte length with a fixed per-turn
//! overhead for role framing. The estimate only needs to be conservative:
//! because byte length is additive and ceiling division is monotone,
//! `estimate(a + b) >= max(estimate(a), estimate(b))` always holds, so budget
//! checks never become more permissive as text grows.

/// Token estimator for outbound context accounting
#[derive(Debug, Clone, Copy)]
pub struct TokenEstimator {
    /// Characters per token (average for English text)
    chars_per_token: f32,
    /// Overhead tokens per turn (role tag, formatting)
    turn_overhead: usize,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenEstimator {
    /// Create an estimator with the common 4-chars-per-token approximation
    pub fn new() -> Self {
        Self {
            chars_per_token: 4.0,
            turn_overhead: 4,
        }
    }

    /// Estimate tokens for a piece of text, without turn overhead
    ///
    /// Deterministic and pure; returns 0 only for empty text.
    pub fn estimate(&self, text: &str) -> usize {
        (text.len() as f32 / self.chars_per_token).ceil() as usize
    }

    /// Estimate tokens for a turn's content, including role framing overhead
    pub fn estimate_turn(&self, content: &str) -> usize {
        self.estimate(content) + self.turn_overhead
    }
}
