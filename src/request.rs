pub const DEFAULT_CPS: f64 = 12.0;
pub const DEFAULT_MISTAKE_RATE: f64 = 3.0;

/// Everything a typing session needs to know. Fixed once the session starts.
#[derive(Debug, Clone, PartialEq)]
pub struct TypingRequest {
    pub text: String,
    pub chars_per_second: f64,
    pub mistakes: bool,
    pub mistake_rate_percent: f64,
    pub restore_cursor: bool,
    pub force_type: bool,
    pub use_key_events: bool,
}

impl Default for TypingRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            chars_per_second: DEFAULT_CPS,
            mistakes: false,
            mistake_rate_percent: DEFAULT_MISTAKE_RATE,
            restore_cursor: false,
            force_type: false,
            use_key_events: true,
        }
    }
}

impl TypingRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Clamps speed to at least one character per second and the mistake
    /// rate to `0..=100`; non-finite values fall back to the defaults.
    pub fn normalized(mut self) -> Self {
        self.chars_per_second = if self.chars_per_second.is_finite() {
            self.chars_per_second.max(1.0)
        } else {
            DEFAULT_CPS
        };
        self.mistake_rate_percent = if self.mistake_rate_percent.is_finite() {
            self.mistake_rate_percent.clamp(0.0, 100.0)
        } else {
            DEFAULT_MISTAKE_RATE
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_extension_defaults() {
        let req = TypingRequest::new("hi");
        assert_eq!(req.text, "hi");
        assert_eq!(req.chars_per_second, 12.0);
        assert_eq!(req.mistake_rate_percent, 3.0);
        assert!(req.use_key_events);
        assert!(!req.mistakes);
    }

    #[test]
    fn normalized_clamps_ranges() {
        let req = TypingRequest {
            chars_per_second: 0.2,
            mistake_rate_percent: 250.0,
            ..TypingRequest::new("x")
        }
        .normalized();
        assert_eq!(req.chars_per_second, 1.0);
        assert_eq!(req.mistake_rate_percent, 100.0);

        let req = TypingRequest {
            chars_per_second: f64::NAN,
            mistake_rate_percent: -4.0,
            ..TypingRequest::new("x")
        }
        .normalized();
        assert_eq!(req.chars_per_second, 12.0);
        assert_eq!(req.mistake_rate_percent, 0.0);
    }
}
