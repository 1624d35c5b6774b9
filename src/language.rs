//! The fixed set of languages the chat client supports.
//!
//! Languages are identified by display name throughout the core (users pick
//! "Japanese", not "ja"); the short code and flag glyph exist for UI chrome
//! and for tagging service requests.

/// A supported language: ISO-style short code, display name, flag glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub flag: &'static str,
}

/// Languages selectable at onboarding and assignable to counterparts.
pub const SUPPORTED_LANGUAGES: [LanguageInfo; 10] = [
    LanguageInfo { code: "en", name: "English", flag: "\u{1F1FA}\u{1F1F8}" },
    LanguageInfo { code: "es", name: "Spanish", flag: "\u{1F1EA}\u{1F1F8}" },
    LanguageInfo { code: "fr", name: "French", flag: "\u{1F1EB}\u{1F1F7}" },
    LanguageInfo { code: "ja", name: "Japanese", flag: "\u{1F1EF}\u{1F1F5}" },
    LanguageInfo { code: "de", name: "German", flag: "\u{1F1E9}\u{1F1EA}" },
    LanguageInfo { code: "zh", name: "Chinese", flag: "\u{1F1E8}\u{1F1F3}" },
    LanguageInfo { code: "ko", name: "Korean", flag: "\u{1F1F0}\u{1F1F7}" },
    LanguageInfo { code: "hi", name: "Hindi", flag: "\u{1F1EE}\u{1F1F3}" },
    LanguageInfo { code: "it", name: "Italian", flag: "\u{1F1EE}\u{1F1F9}" },
    LanguageInfo { code: "ar", name: "Arabic", flag: "\u{1F1F8}\u{1F1E6}" },
];

/// Look up a language by display name (case-insensitive).
#[must_use]
pub fn by_name(name: &str) -> Option<&'static LanguageInfo> {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|l| l.name.eq_ignore_ascii_case(name))
}

/// Look up a language by short code (case-insensitive).
#[must_use]
pub fn by_code(code: &str) -> Option<&'static LanguageInfo> {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|l| l.code.eq_ignore_ascii_case(code))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn lookup_by_name_is_case_insensitive() {
        assert_eq!(by_name("japanese").unwrap().code, "ja");
        assert_eq!(by_name("Japanese").unwrap().code, "ja");
        assert!(by_name("Klingon").is_none());
    }

    #[test]
    fn lookup_by_code() {
        assert_eq!(by_code("EN").unwrap().name, "English");
        assert!(by_code("xx").is_none());
    }
}
