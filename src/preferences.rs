use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::broadcast::{Broadcaster, Subscription};
use crate::storage::SharedStorage;

pub const THEME_STORAGE_KEY: &str = "lifeflow-theme";
pub const LANGUAGE_STORAGE_KEY: &str = "lifeflow-language";

#[derive(Debug, Error)]
#[error("Unknown {kind}: {value}")]
pub struct PreferenceParseError {
    kind: &'static str,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
    /// Follow the operating system's color scheme.
    System,
}

impl Theme {
    pub const ALL: [Theme; 3] = [Theme::Light, Theme::Dark, Theme::System];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }

    /// Parse a stored value, falling back to the default when unrecognized.
    pub fn parse_or_default(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }

    pub fn resolve(self, color_scheme: &ColorScheme) -> ResolvedTheme {
        match self {
            Theme::Light => ResolvedTheme::Light,
            Theme::Dark => ResolvedTheme::Dark,
            Theme::System => color_scheme.current(),
        }
    }
}

impl FromStr for Theme {
    type Err = PreferenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Theme::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| PreferenceParseError {
                kind: "theme",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A theme as actually rendered: `system` is resolved away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolvedTheme {
    Light,
    Dark,
}

impl ResolvedTheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolvedTheme::Light => "light",
            ResolvedTheme::Dark => "dark",
        }
    }
}

impl fmt::Display for ResolvedTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    #[default]
    Ja,
    En,
    Zh,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Ja, Language::En, Language::Zh];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Ja => "ja",
            Language::En => "en",
            Language::Zh => "zh",
        }
    }

    pub fn parse_or_default(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for Language {
    type Err = PreferenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| PreferenceParseError {
                kind: "language",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a language change reaches the rest of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageApply {
    /// Broadcast, then ask the surface to reload from scratch.
    Reload,
    /// Broadcast only; listeners re-render in place.
    Broadcast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceChange {
    Theme(Theme),
    Language(Language),
}

/// The operating system's light/dark preference as a watchable signal.
#[derive(Clone)]
pub struct ColorScheme {
    dark: Arc<AtomicBool>,
    changes: Broadcaster<ResolvedTheme>,
}

impl ColorScheme {
    pub fn new(prefers_dark: bool) -> Self {
        Self {
            dark: Arc::new(AtomicBool::new(prefers_dark)),
            changes: Broadcaster::new(),
        }
    }

    /// Guess from the terminal's `COLORFGBG` ("fg;bg"); dark unless the
    /// background is a light color.
    pub fn from_env() -> Self {
        let prefers_dark = std::env::var("COLORFGBG")
            .ok()
            .and_then(|value| value.rsplit(';').next().and_then(|bg| bg.trim().parse::<u8>().ok()))
            .map(|bg| !matches!(bg, 7 | 9..=15))
            .unwrap_or(true);
        Self::new(prefers_dark)
    }

    pub fn prefers_dark(&self) -> bool {
        self.dark.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> ResolvedTheme {
        if self.prefers_dark() {
            ResolvedTheme::Dark
        } else {
            ResolvedTheme::Light
        }
    }

    /// Record a change in the OS preference, notifying watchers if it differs.
    pub fn set_prefers_dark(&self, dark: bool) {
        if self.dark.swap(dark, Ordering::SeqCst) != dark {
            self.changes.publish(&self.current());
        }
    }

    pub fn watch<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ResolvedTheme) + Send + Sync + 'static,
    {
        self.changes.subscribe(listener)
    }
}

impl fmt::Debug for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColorScheme")
            .field("prefers_dark", &self.prefers_dark())
            .finish()
    }
}

/// Where preference side effects become visible.
pub trait Surface: Send + Sync {
    fn apply_theme(&self, theme: ResolvedTheme);
    fn apply_language(&self, language: Language);
    fn request_reload(&self);
}

/// Attributes of the root document element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentAttributes {
    /// Theme class, also mirrored as `data-theme` and `color-scheme`.
    pub theme: Option<ResolvedTheme>,
    pub lang: Option<Language>,
    pub reload_requests: u32,
}

/// In-process document root.
#[derive(Debug, Default)]
pub struct DocumentState {
    attributes: Mutex<DocumentAttributes>,
}

impl DocumentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> DocumentAttributes {
        self.attributes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Surface for DocumentState {
    fn apply_theme(&self, theme: ResolvedTheme) {
        self.attributes.lock().unwrap_or_else(PoisonError::into_inner).theme = Some(theme);
    }

    fn apply_language(&self, language: Language) {
        self.attributes.lock().unwrap_or_else(PoisonError::into_inner).lang = Some(language);
    }

    fn request_reload(&self) {
        self.attributes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reload_requests += 1;
    }
}

/// Theme and language, persisted as bare strings.
pub struct PreferenceStore {
    storage: Option<SharedStorage>,
    surface: Arc<dyn Surface>,
    color_scheme: ColorScheme,
    changes: Broadcaster<PreferenceChange>,
}

impl PreferenceStore {
    pub fn new(storage: SharedStorage, surface: Arc<dyn Surface>, color_scheme: ColorScheme) -> Self {
        Self {
            storage: Some(storage),
            surface,
            color_scheme,
            changes: Broadcaster::new(),
        }
    }

    /// Without storage every getter returns the default and setters do nothing.
    pub fn detached(surface: Arc<dyn Surface>, color_scheme: ColorScheme) -> Self {
        Self {
            storage: None,
            surface,
            color_scheme,
            changes: Broadcaster::new(),
        }
    }

    pub fn color_scheme(&self) -> &ColorScheme {
        &self.color_scheme
    }

    pub fn theme(&self) -> Theme {
        Theme::parse_or_default(read(self.storage.as_ref(), THEME_STORAGE_KEY).as_deref())
    }

    /// The light/dark value the current theme renders as right now.
    pub fn resolved_theme(&self) -> ResolvedTheme {
        self.theme().resolve(&self.color_scheme)
    }

    pub fn set_theme(&self, theme: Theme) {
        let Some(storage) = &self.storage else {
            return;
        };
        if let Err(e) = storage.set_item(THEME_STORAGE_KEY, theme.as_str()) {
            error!(error = %e, "failed to save theme");
        }
        self.surface.apply_theme(theme.resolve(&self.color_scheme));
        info!(%theme, "theme changed");
        self.changes.publish(&PreferenceChange::Theme(theme));
    }

    pub fn language(&self) -> Language {
        Language::parse_or_default(read(self.storage.as_ref(), LANGUAGE_STORAGE_KEY).as_deref())
    }

    /// Persist and announce a new language. Setting the current language is a no-op.
    pub fn set_language(&self, language: Language, apply: LanguageApply) {
        let Some(storage) = &self.storage else {
            return;
        };
        if self.language() == language {
            debug!(%language, "language already set");
            return;
        }
        if let Err(e) = storage.set_item(LANGUAGE_STORAGE_KEY, language.as_str()) {
            error!(error = %e, "failed to save language");
        }
        self.surface.apply_language(language);
        info!(%language, ?apply, "language changed");
        self.changes.publish(&PreferenceChange::Language(language));
        if apply == LanguageApply::Reload {
            self.surface.request_reload();
        }
    }

    /// Apply the stored theme and keep following the OS scheme while the
    /// stored theme is `system`. Dropping the returned watch stops following.
    pub fn init_theme(&self) -> ThemeWatch {
        self.surface.apply_theme(self.resolved_theme());

        let storage = self.storage.clone();
        let surface = Arc::clone(&self.surface);
        let subscription = self.color_scheme.watch(move |os_theme| {
            if Theme::parse_or_default(read(storage.as_ref(), THEME_STORAGE_KEY).as_deref()) == Theme::System {
                debug!(theme = %os_theme, "following system color scheme");
                surface.apply_theme(*os_theme);
            }
        });
        ThemeWatch {
            _subscription: subscription,
        }
    }

    pub fn init_language(&self) -> LanguageGuard {
        let language = self.language();
        self.surface.apply_language(language);
        debug!(%language, "initial language applied");
        LanguageGuard { language }
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PreferenceChange) + Send + Sync + 'static,
    {
        self.changes.subscribe(listener)
    }
}

fn read(storage: Option<&SharedStorage>, key: &str) -> Option<String> {
    let storage = storage?;
    match storage.get_item(key) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "failed to read preference");
            None
        }
    }
}

/// Keeps the theme synchronized with the OS scheme until dropped.
#[must_use = "dropping a ThemeWatch stops following the system color scheme"]
pub struct ThemeWatch {
    _subscription: Subscription,
}

impl ThemeWatch {
    pub fn stop(self) {}
}

/// Returned by [`PreferenceStore::init_language`]; there is nothing to
/// watch, dropping it only logs.
pub struct LanguageGuard {
    language: Language,
}

impl Drop for LanguageGuard {
    fn drop(&mut self) {
        debug!(language = %self.language, "language guard released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStorage};

    struct Fixture {
        storage: Arc<MemoryStorage>,
        document: Arc<DocumentState>,
        scheme: ColorScheme,
        prefs: PreferenceStore,
    }

    fn fixture(prefers_dark: bool) -> Fixture {
        let storage = Arc::new(MemoryStorage::new());
        let document = Arc::new(DocumentState::new());
        let scheme = ColorScheme::new(prefers_dark);
        let prefs = PreferenceStore::new(storage.clone(), document.clone(), scheme.clone());
        Fixture {
            storage,
            document,
            scheme,
            prefs,
        }
    }

    #[test]
    fn theme_defaults_to_light_and_persists() {
        let f = fixture(false);
        assert_eq!(f.prefs.theme(), Theme::Light);

        f.prefs.set_theme(Theme::Dark);
        assert_eq!(f.prefs.theme(), Theme::Dark);
        assert_eq!(f.storage.get_item(THEME_STORAGE_KEY).unwrap().as_deref(), Some("dark"));
        assert_eq!(f.document.snapshot().theme, Some(ResolvedTheme::Dark));
    }

    #[test]
    fn invalid_stored_values_fall_back() {
        let f = fixture(false);
        f.storage.set_item(THEME_STORAGE_KEY, "solarized").unwrap();
        f.storage.set_item(LANGUAGE_STORAGE_KEY, "fr").unwrap();
        assert_eq!(f.prefs.theme(), Theme::Light);
        assert_eq!(f.prefs.language(), Language::Ja);
    }

    #[test]
    fn system_theme_resolves_through_os_signal() {
        let f = fixture(true);
        f.prefs.set_theme(Theme::System);
        assert_eq!(f.document.snapshot().theme, Some(ResolvedTheme::Dark));
        assert_eq!(f.prefs.resolved_theme(), ResolvedTheme::Dark);
    }

    #[test]
    fn theme_watch_follows_os_only_while_system_selected() {
        let f = fixture(false);
        f.prefs.set_theme(Theme::System);
        let watch = f.prefs.init_theme();
        assert_eq!(f.document.snapshot().theme, Some(ResolvedTheme::Light));

        f.scheme.set_prefers_dark(true);
        assert_eq!(f.document.snapshot().theme, Some(ResolvedTheme::Dark));

        f.prefs.set_theme(Theme::Light);
        f.scheme.set_prefers_dark(false);
        f.scheme.set_prefers_dark(true);
        assert_eq!(f.document.snapshot().theme, Some(ResolvedTheme::Light));

        f.prefs.set_theme(Theme::System);
        watch.stop();
        f.scheme.set_prefers_dark(false);
        assert_eq!(f.document.snapshot().theme, Some(ResolvedTheme::Dark));
    }

    #[test]
    fn language_change_broadcasts_and_optionally_reloads() {
        let f = fixture(false);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = f.prefs.subscribe(move |change| sink.lock().unwrap().push(*change));

        f.prefs.set_language(Language::En, LanguageApply::Broadcast);
        assert_eq!(f.document.snapshot().reload_requests, 0);

        f.prefs.set_language(Language::Zh, LanguageApply::Reload);
        assert_eq!(f.document.snapshot().reload_requests, 1);

        // Unchanged language does nothing.
        f.prefs.set_language(Language::Zh, LanguageApply::Reload);
        assert_eq!(f.document.snapshot().reload_requests, 1);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                PreferenceChange::Language(Language::En),
                PreferenceChange::Language(Language::Zh)
            ]
        );
        assert_eq!(f.document.snapshot().lang, Some(Language::Zh));
    }

    #[test]
    fn init_language_applies_stored_value() {
        let f = fixture(false);
        f.storage.set_item(LANGUAGE_STORAGE_KEY, "en").unwrap();
        let _guard = f.prefs.init_language();
        assert_eq!(f.document.snapshot().lang, Some(Language::En));
    }

    #[test]
    fn detached_preferences_ignore_writes() {
        let document = Arc::new(DocumentState::new());
        let prefs = PreferenceStore::detached(document.clone(), ColorScheme::new(false));
        prefs.set_theme(Theme::Dark);
        prefs.set_language(Language::En, LanguageApply::Reload);
        assert_eq!(prefs.theme(), Theme::Light);
        assert_eq!(prefs.language(), Language::Ja);
        assert_eq!(document.snapshot(), DocumentAttributes::default());
    }

    #[test]
    fn parse_round_trips_literal_values() {
        for theme in Theme::ALL {
            assert_eq!(theme.as_str().parse::<Theme>().unwrap(), theme);
        }
        assert!("Dark".parse::<Theme>().is_err());
        assert_eq!("zh".parse::<Language>().unwrap(), Language::Zh);
    }
}
