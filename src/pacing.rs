//! Human-like timing and typo decisions.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::request::TypingRequest;

/// Each delay is drawn uniformly within ±35% of the base delay.
pub const JITTER: f64 = 0.35;

pub const MISTAKE_ALPHABET: &[u8; 26] = b"asdfghjklqwertyuiopzxcvbnm";

pub fn base_delay_ms(chars_per_second: f64) -> f64 {
    if chars_per_second.is_finite() {
        1000.0 / chars_per_second.max(1.0)
    } else {
        0.0
    }
}

/// Percent (0-100) to probability (0.0-1.0).
pub fn mistake_probability(rate_percent: f64) -> f64 {
    if rate_percent.is_finite() {
        rate_percent.clamp(0.0, 100.0) / 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone)]
pub struct Pacer {
    rng: StdRng,
    base_ms: f64,
    mistake_probability: f64,
}

impl Pacer {
    pub fn new(request: &TypingRequest) -> Self {
        Self::with_rng(request, StdRng::from_entropy())
    }

    pub fn seeded(request: &TypingRequest, seed: u64) -> Self {
        Self::with_rng(request, StdRng::seed_from_u64(seed))
    }

    fn with_rng(request: &TypingRequest, rng: StdRng) -> Self {
        let mistake_probability = if request.mistakes {
            mistake_probability(request.mistake_rate_percent)
        } else {
            0.0
        };
        Self {
            rng,
            base_ms: base_delay_ms(request.chars_per_second),
            mistake_probability,
        }
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_secs_f64(self.base_ms / 1000.0)
    }

    pub fn half_delay(&self) -> Duration {
        Duration::from_secs_f64(self.base_ms / 2000.0)
    }

    pub fn jittered_delay(&mut self) -> Duration {
        let spread = self.base_ms * JITTER;
        let ms = if spread > 0.0 {
            self.rng.gen_range(self.base_ms - spread..=self.base_ms + spread)
        } else {
            self.base_ms
        };
        Duration::from_secs_f64(ms.max(0.0) / 1000.0)
    }

    /// Newlines are never mistyped.
    pub fn should_mistype(&mut self, ch: char) -> bool {
        ch != '\n' && self.mistake_probability > 0.0 && self.rng.gen_bool(self.mistake_probability)
    }

    /// A random lowercase letter different from `intended`.
    pub fn wrong_char(&mut self, intended: char) -> char {
        loop {
            let candidate = MISTAKE_ALPHABET[self.rng.gen_range(0..MISTAKE_ALPHABET.len())] as char;
            if candidate != intended {
                return candidate;
            }
        }
    }
}
