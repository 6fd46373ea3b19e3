#![forbid(unsafe_code)]

//! Culture passed to value converters.

use std::env;
use std::fmt;
use std::rc::Rc;

/// A normalized BCP-47-ish language tag such as `en` or `fr-FR`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Locale(Rc<str>);

impl Locale {
    /// Normalize a raw tag. Empty or unparseable input becomes `en`.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self(Rc::from(normalize_raw(raw).unwrap_or_else(|| "en".to_string())))
    }

    /// Detect the system locale from environment variables.
    ///
    /// Preference order: `LC_ALL`, then `LANG`. Falls back to `en`.
    #[must_use]
    pub fn system() -> Self {
        let lc_all = env::var("LC_ALL").ok();
        let lang = env::var("LANG").ok();
        Self::detect_from(lc_all.as_deref(), lang.as_deref())
    }

    #[must_use]
    pub fn detect_from(lc_all: Option<&str>, lang: Option<&str>) -> Self {
        let tag = lc_all
            .and_then(normalize_raw)
            .or_else(|| lang.and_then(normalize_raw))
            .unwrap_or_else(|| "en".to_string());
        Self(Rc::from(tag))
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.0
    }

    /// Primary language subtag (`fr` for `fr-FR`).
    #[must_use]
    pub fn language(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Debug for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Locale({})", self.0)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locale {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl PartialEq<&str> for Locale {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

fn normalize_raw(raw: &str) -> Option<String> {
    let raw = raw.trim();
    // Strip `@modifier` and `.codeset`.
    let raw = raw.split('@').next().unwrap_or(raw);
    let raw = raw.split('.').next().unwrap_or(raw).trim();
    if raw.is_empty() {
        return None;
    }
    if raw.eq_ignore_ascii_case("c") || raw.eq_ignore_ascii_case("posix") {
        return Some("en".to_string());
    }
    Some(raw.replace('_', "-"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lc_all_wins_over_lang() {
        assert_eq!(Locale::detect_from(Some("fr_FR.UTF-8"), Some("en_US.UTF-8")), "fr-FR");
    }

    #[test]
    fn lang_used_when_lc_all_missing_or_blank() {
        assert_eq!(Locale::detect_from(None, Some("de_DE.UTF-8")), "de-DE");
        assert_eq!(Locale::detect_from(Some("  "), Some("de_DE")), "de-DE");
    }

    #[test]
    fn posix_and_missing_default_to_en() {
        assert_eq!(Locale::detect_from(Some("C"), None), "en");
        assert_eq!(Locale::detect_from(Some("POSIX.UTF-8"), None), "en");
        assert_eq!(Locale::detect_from(None, None), "en");
    }

    #[test]
    fn modifier_is_dropped() {
        let locale = Locale::new("sr_RS@latin");
        assert_eq!(locale, "sr-RS");
        assert_eq!(locale.language(), "sr");
    }
}
