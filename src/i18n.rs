use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use regex::{Captures, Regex};
use serde::Deserialize;

mod generated {
    include!(concat!(env!("OUT_DIR"), "/dojoform_i18n_generated.rs"));
}

static CATALOG: LazyLock<I18nCatalog> = LazyLock::new(I18nCatalog::load);

#[derive(Clone, Debug, Eq, PartialEq, Default, Deserialize)]
#[serde(from = "String")]
pub enum Locale {
    #[default]
    System,
    Tag(String),
}

impl From<String> for Locale {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("system") {
            return Self::System;
        }
        Self::Tag(value.trim().to_string())
    }
}

impl From<&str> for Locale {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

/// Resolves message keys against the locale catalogs compiled from `locales/`.
#[derive(Clone)]
pub struct I18nManager {
    catalog: &'static I18nCatalog,
    locale: Arc<RwLock<Locale>>,
}

impl Default for I18nManager {
    fn default() -> Self {
        Self::new()
    }
}

impl I18nManager {
    pub fn new() -> Self {
        Self::with_locale(Locale::System)
    }

    pub fn with_locale(locale: impl Into<Locale>) -> Self {
        Self {
            catalog: &CATALOG,
            locale: Arc::new(RwLock::new(locale.into())),
        }
    }

    pub fn locale(&self) -> Locale {
        self.locale
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_locale(&self, locale: impl Into<Locale>) {
        *self.locale.write().unwrap_or_else(PoisonError::into_inner) = locale.into();
    }

    pub fn default_locale(&self) -> &'static str {
        self.catalog.default_locale
    }

    pub fn resolved_locale(&self) -> &'static str {
        self.catalog
            .resolve_locale(self.requested_locale().as_deref())
    }

    pub fn t(&self, key: &str) -> String {
        self.lookup(key).unwrap_or(key).to_string()
    }

    pub fn t_with(&self, key: &str, params: &[(&str, &str)]) -> String {
        let raw = self.lookup(key).unwrap_or(key);
        if params.is_empty() {
            return raw.to_string();
        }
        format_template(raw, params)
    }

    fn requested_locale(&self) -> Option<String> {
        match self.locale() {
            Locale::System => system_locale(),
            Locale::Tag(tag) => Some(tag),
        }
    }

    fn lookup(&self, key: &str) -> Option<&'static str> {
        let resolved = self.resolved_locale();
        self.catalog
            .lookup(resolved, key)
            .or_else(|| self.catalog.lookup(self.catalog.default_locale, key))
    }
}

#[cfg(feature = "i18n")]
fn system_locale() -> Option<String> {
    sys_locale::get_locale()
}

#[cfg(not(feature = "i18n"))]
fn system_locale() -> Option<String> {
    None
}

struct I18nCatalog {
    default_locale: &'static str,
    locales: HashMap<&'static str, HashMap<&'static str, &'static str>>,
    /// Normalized tags and bare languages, pointing at a catalog locale.
    aliases: HashMap<String, &'static str>,
}

impl I18nCatalog {
    fn load() -> Self {
        let mut aliases = HashMap::new();
        let locales = generated::LOCALES
            .iter()
            .map(|(locale, entries)| {
                let tag = normalize_locale_tag(locale);
                if let Some((language, _)) = tag.split_once('-') {
                    aliases.entry(language.to_string()).or_insert(*locale);
                }
                aliases.insert(tag, *locale);
                (*locale, entries.iter().copied().collect())
            })
            .collect();

        Self {
            default_locale: generated::DEFAULT_LOCALE,
            locales,
            aliases,
        }
    }

    fn resolve_locale(&self, requested: Option<&str>) -> &'static str {
        let Some(tag) = requested.map(normalize_locale_tag) else {
            return self.default_locale;
        };
        let language = tag.split('-').next().unwrap_or_default();
        self.aliases
            .get(&tag)
            .or_else(|| self.aliases.get(language))
            .copied()
            .unwrap_or(self.default_locale)
    }

    fn lookup(&self, locale: &str, key: &str) -> Option<&'static str> {
        self.locales.get(locale)?.get(key).copied()
    }
}

/// `ru_RU.UTF-8@euro` and `RU-ru` both become `ru-ru`.
fn normalize_locale_tag(tag: &str) -> String {
    let tag = tag.trim();
    let end = tag.find(['.', '@']).unwrap_or(tag.len());
    tag[..end]
        .split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(\w+)\}")
        .unwrap_or_else(|error| unreachable!("placeholder pattern is a valid regex: {error}"))
});

/// Substitutes `{name}` placeholders; unknown names are left as written.
fn format_template(template: &str, params: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |captures: &Captures<'_>| {
            let name = &captures[1];
            params
                .iter()
                .find(|(param, _)| *param == name)
                .map_or_else(|| captures[0].to_string(), |(_, value)| value.to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::I18nManager;

    #[test]
    fn missing_translation_shows_key() {
        let i18n = I18nManager::with_locale("ru");
        assert_eq!(i18n.t("validation.unknown_check"), "validation.unknown_check");
    }

    #[test]
    fn supports_locale_tag_normalization() {
        let i18n = I18nManager::with_locale("ru_RU.UTF-8");
        assert_eq!(i18n.resolved_locale(), "ru");
        assert_eq!(i18n.t("validation.email"), "Неверный email адрес");
    }

    #[test]
    fn unknown_locale_falls_back_to_default() {
        let i18n = I18nManager::with_locale("de-DE");
        assert_eq!(i18n.resolved_locale(), i18n.default_locale());
        assert_eq!(i18n.t("validation.email"), "Invalid email address");
    }

    #[test]
    fn unknown_placeholders_are_kept() {
        assert_eq!(
            super::format_template("{min}..{max} {", &[("min", "1")]),
            "1..{max} {"
        );
        assert_eq!(super::normalize_locale_tag(" RU_ru.UTF-8@euro "), "ru-ru");
    }

    #[test]
    fn supports_placeholder_interpolation() {
        let i18n = I18nManager::with_locale("en-US");
        assert_eq!(
            i18n.t_with("validation.min_length", &[("min", "8")]),
            "Must be at least 8 characters"
        );
        i18n.set_locale("ru");
        assert_eq!(
            i18n.t_with("validation.min_length", &[("min", "8")]),
            "Минимум 8 символов"
        );
    }
}
