//! Synthetic keyboard event fields derived from a typed character.

/// The three events dispatched for every simulated key press, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum KeyPhase {
    KeyDown,
    KeyPress,
    KeyUp,
}

pub const KEY_SEQUENCE: [KeyPhase; 3] = [KeyPhase::KeyDown, KeyPhase::KeyPress, KeyPhase::KeyUp];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStroke {
    pub key: String,
    pub code: String,
    pub char_code: u32,
}

const SHIFTED_DIGITS: &str = ")!@#$%^&*(";

impl KeyStroke {
    pub fn for_char(c: char) -> Self {
        match c {
            '\n' => Self::named("Enter", "Enter", 13),
            '\t' => Self::named("Tab", "Tab", 9),
            '\u{8}' => Self::backspace(),
            _ => Self {
                key: c.to_string(),
                code: physical_code(c),
                char_code: c as u32,
            },
        }
    }

    pub fn backspace() -> Self {
        Self::named("Backspace", "Backspace", 8)
    }

    fn named(key: &str, code: &str, char_code: u32) -> Self {
        Self {
            key: key.to_string(),
            code: code.to_string(),
            char_code,
        }
    }
}

/// US-QWERTY physical key code for a character.
fn physical_code(c: char) -> String {
    if c.is_ascii_alphabetic() {
        return format!("Key{}", c.to_ascii_uppercase());
    }
    if c.is_ascii_digit() {
        return format!("Digit{c}");
    }
    if let Some(digit) = SHIFTED_DIGITS.find(c) {
        return format!("Digit{digit}");
    }
    let code = match c {
        ' ' => "Space",
        '-' | '_' => "Minus",
        '=' | '+' => "Equal",
        '[' | '{' => "BracketLeft",
        ']' | '}' => "BracketRight",
        '\\' | '|' => "Backslash",
        ';' | ':' => "Semicolon",
        '\'' | '"' => "Quote",
        ',' | '<' => "Comma",
        '.' | '>' => "Period",
        '/' | '?' => "Slash",
        '`' | '~' => "Backquote",
        _ => "Unidentified",
    };
    code.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_map_to_key_codes() {
        let stroke = KeyStroke::for_char('h');
        assert_eq!(stroke.key, "h");
        assert_eq!(stroke.code, "KeyH");
        assert_eq!(stroke.char_code, 104);
        assert_eq!(KeyStroke::for_char('Q').code, "KeyQ");
    }

    #[test]
    fn digits_and_shifted_digits_share_codes() {
        assert_eq!(KeyStroke::for_char('7').code, "Digit7");
        assert_eq!(KeyStroke::for_char('!').code, "Digit1");
        assert_eq!(KeyStroke::for_char('(').code, "Digit9");
        assert_eq!(KeyStroke::for_char(')').code, "Digit0");
    }

    #[test]
    fn newline_is_enter() {
        let stroke = KeyStroke::for_char('\n');
        assert_eq!(stroke.key, "Enter");
        assert_eq!(stroke.code, "Enter");
        assert_eq!(stroke.char_code, 13);
    }

    #[test]
    fn punctuation_and_space() {
        assert_eq!(KeyStroke::for_char(' ').code, "Space");
        assert_eq!(KeyStroke::for_char('?').code, "Slash");
        assert_eq!(KeyStroke::for_char('"').code, "Quote");
    }

    #[test]
    fn non_ascii_is_unidentified_but_keeps_key() {
        let stroke = KeyStroke::for_char('é');
        assert_eq!(stroke.key, "é");
        assert_eq!(stroke.code, "Unidentified");
        assert_eq!(stroke.char_code, 233);
    }

    #[test]
    fn phases_render_as_dom_event_names() {
        let names: Vec<String> = KEY_SEQUENCE.iter().map(|p| p.to_string()).collect();
        assert_eq!(names, vec!["keydown", "keypress", "keyup"]);
    }
}
