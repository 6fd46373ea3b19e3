#![forbid(unsafe_code)]

//! Engine-wide binding options.

use gossamer_core::Locale;

use crate::binding::BindMode;

/// Options shared by every binding an [`Engine`](crate::Engine) creates.
#[derive(Debug, Clone)]
pub struct BindingConfig {
    /// Culture handed to value converters.
    pub culture: Locale,
    /// Mode given to new bindings.
    pub default_mode: BindMode,
    /// Whether `initialize()` activates the binding.
    pub activate_on_initialize: bool,
    /// Whether fluent configuration calls refresh an active binding.
    pub refresh_on_configure: bool,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            culture: Locale::system(),
            default_mode: BindMode::ONE_WAY,
            activate_on_initialize: true,
            refresh_on_configure: true,
        }
    }
}

impl BindingConfig {
    #[must_use]
    pub fn with_culture(mut self, culture: impl Into<Locale>) -> Self {
        self.culture = culture.into();
        self
    }

    #[must_use]
    pub fn with_default_mode(mut self, mode: BindMode) -> Self {
        self.default_mode = mode;
        self
    }

    #[must_use]
    pub fn with_activate_on_initialize(mut self, enabled: bool) -> Self {
        self.activate_on_initialize = enabled;
        self
    }

    #[must_use]
    pub fn with_refresh_on_configure(mut self, enabled: bool) -> Self {
        self.refresh_on_configure = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BindingConfig::default();
        assert_eq!(config.default_mode, BindMode::ONE_WAY);
        assert!(config.activate_on_initialize);
        assert!(config.refresh_on_configure);
    }

    #[test]
    fn builder_overrides() {
        let config = BindingConfig::default()
            .with_culture("de_DE.UTF-8")
            .with_default_mode(BindMode::TWO_WAY)
            .with_activate_on_initialize(false);
        assert_eq!(config.culture, "de-DE");
        assert_eq!(config.default_mode, BindMode::TWO_WAY);
        assert!(!config.activate_on_initialize);
    }
}
