//! Supported input languages and output formats.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A language a query can be asked in.
///
/// Serialized with its display name (`"Hindi"`); [`code`](Self::code)
/// gives the ISO 639-1 code used by the providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputLanguage {
    English,
    Hindi,
    Kannada,
    Telugu,
}

impl InputLanguage {
    pub const ALL: [InputLanguage; 4] = [Self::English, Self::Hindi, Self::Kannada, Self::Telugu];

    /// ISO 639-1 code (`en`, `hi`, `kn`, `te`).
    pub fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Hindi => "hi",
            Self::Kannada => "kn",
            Self::Telugu => "te",
        }
    }

    /// Display name, as accepted on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Hindi => "Hindi",
            Self::Kannada => "Kannada",
            Self::Telugu => "Telugu",
        }
    }

    /// BCP-47 tag for Indian locales, e.g. `hi-IN`.
    pub fn indian_locale(self) -> String {
        format!("{}-IN", self.code())
    }
}

impl fmt::Display for InputLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InputLanguage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.name().eq_ignore_ascii_case(s) || lang.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unsupported language '{s}'"))
    }
}

/// How the answer is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Voice,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("Text"),
            Self::Voice => f.write_str("Voice"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_and_codes() {
        assert_eq!(serde_json::to_value(InputLanguage::Kannada).unwrap(), "Kannada");
        assert_eq!(InputLanguage::Telugu.code(), "te");
        assert_eq!(InputLanguage::Hindi.indian_locale(), "hi-IN");
        assert_eq!("hindi".parse::<InputLanguage>().unwrap(), InputLanguage::Hindi);
        assert_eq!("kn".parse::<InputLanguage>().unwrap(), InputLanguage::Kannada);
        assert!("Tamil".parse::<InputLanguage>().is_err());
    }

    #[test]
    fn output_format_deserializes_from_display_name() {
        let format: OutputFormat = serde_json::from_value(serde_json::json!("Voice")).unwrap();
        assert_eq!(format, OutputFormat::Voice);
    }
}
