use std::fmt::{Debug, Display, Formatter};
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::{Arc, LazyLock};

use futures::FutureExt;
use regex::Regex;
use rust_decimal::Decimal;

use super::value::FieldValue;
use crate::i18n::I18nManager;

pub(super) static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap_or_else(|error| {
        unreachable!("email pattern is a valid regex: {error}")
    })
});

/// A validation message: literal text, or a catalog key resolved against the form locale.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ErrorMessage {
    Text(String),
    Catalog {
        key: &'static str,
        params: Vec<(&'static str, String)>,
    },
}

impl ErrorMessage {
    pub fn catalog(key: &'static str) -> Self {
        ErrorMessage::Catalog {
            key,
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: &'static str, value: impl Display) -> Self {
        if let ErrorMessage::Catalog { params, .. } = &mut self {
            params.push((name, value.to_string()));
        }
        self
    }

    pub fn resolve(&self, i18n: &I18nManager) -> String {
        match self {
            ErrorMessage::Text(text) => text.clone(),
            ErrorMessage::Catalog { key, params } => {
                let params = params
                    .iter()
                    .map(|(name, value)| (*name, value.as_str()))
                    .collect::<Vec<_>>();
                i18n.t_with(key, &params)
            }
        }
    }
}

impl From<String> for ErrorMessage {
    fn from(value: String) -> Self {
        ErrorMessage::Text(value)
    }
}

impl From<&str> for ErrorMessage {
    fn from(value: &str) -> Self {
        ErrorMessage::Text(value.to_string())
    }
}

/// Result of a custom check.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CustomOutcome {
    Valid,
    /// Failed; the rule's message (or the generic one) is reported.
    Invalid,
    Message(ErrorMessage),
}

impl From<bool> for CustomOutcome {
    fn from(value: bool) -> Self {
        if value {
            CustomOutcome::Valid
        } else {
            CustomOutcome::Invalid
        }
    }
}

impl From<ErrorMessage> for CustomOutcome {
    fn from(value: ErrorMessage) -> Self {
        CustomOutcome::Message(value)
    }
}

impl From<String> for CustomOutcome {
    fn from(value: String) -> Self {
        CustomOutcome::Message(value.into())
    }
}

impl From<&str> for CustomOutcome {
    fn from(value: &str) -> Self {
        CustomOutcome::Message(value.into())
    }
}

impl From<Option<String>> for CustomOutcome {
    fn from(value: Option<String>) -> Self {
        value.map_or(CustomOutcome::Valid, CustomOutcome::from)
    }
}

/// An async check could not reach a verdict (transport error, timeout, ...).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CheckFailure(String);

impl CheckFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    pub fn reason(&self) -> &str {
        &self.0
    }
}

impl Display for CheckFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CheckFailure {}

pub type AsyncCheck = Result<CustomOutcome, CheckFailure>;
pub type BoxedValidationFuture = Pin<Box<dyn Future<Output = AsyncCheck> + Send + 'static>>;

pub(super) type CustomFn = Arc<dyn Fn(&FieldValue) -> CustomOutcome + Send + Sync>;
pub(super) type AsyncCustomFn = Arc<dyn Fn(FieldValue) -> BoxedValidationFuture + Send + Sync>;

/// Declarative bundle of checks for one field.
///
/// Checks run in a fixed order: required, length, pattern, email, numeric, range, custom,
/// async custom. The first failing check ends the whole validation pass of the field.
#[derive(Clone, Default)]
pub struct ValidationRule {
    required: bool,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<Regex>,
    email: bool,
    numeric: bool,
    min: Option<Decimal>,
    max: Option<Decimal>,
    custom: Option<CustomFn>,
    async_custom: Option<AsyncCustomFn>,
    message: Option<ErrorMessage>,
}

impl ValidationRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn email(mut self) -> Self {
        self.email = true;
        self
    }

    pub fn numeric(mut self) -> Self {
        self.numeric = true;
        self
    }

    pub fn min(mut self, min: impl Into<Decimal>) -> Self {
        self.min = Some(min.into());
        self
    }

    pub fn max(mut self, max: impl Into<Decimal>) -> Self {
        self.max = Some(max.into());
        self
    }

    pub fn custom<F, R>(mut self, check: F) -> Self
    where
        F: Fn(&FieldValue) -> R + Send + Sync + 'static,
        R: Into<CustomOutcome>,
    {
        self.custom = Some(Arc::new(move |value: &FieldValue| -> CustomOutcome {
            check(value).into()
        }));
        self
    }

    pub fn async_custom<F, Fut>(mut self, check: F) -> Self
    where
        F: Fn(FieldValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AsyncCheck> + Send + 'static,
    {
        self.async_custom = Some(Arc::new(move |value: FieldValue| {
            Box::pin(check(value)) as BoxedValidationFuture
        }));
        self
    }

    /// Replaces the default message of every check in this rule.
    pub fn message(mut self, message: impl Into<ErrorMessage>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn has_async_check(&self) -> bool {
        self.async_custom.is_some()
    }

    fn fail(&self, default: ErrorMessage) -> ErrorMessage {
        self.message.clone().unwrap_or(default)
    }

    fn check_sync(&self, value: &FieldValue) -> SyncStep {
        if self.required && value.is_blank() {
            return SyncStep::Fail(self.fail(ErrorMessage::catalog("validation.required")));
        }
        if !self.required && value.is_empty() {
            return SyncStep::Skip;
        }

        if let (Some(min), Some(length)) = (self.min_length, value.length()) {
            if length < min {
                return SyncStep::Fail(
                    self.fail(ErrorMessage::catalog("validation.min_length").with_param("min", min)),
                );
            }
        }
        if let (Some(max), Some(length)) = (self.max_length, value.length()) {
            if length > max {
                return SyncStep::Fail(
                    self.fail(ErrorMessage::catalog("validation.max_length").with_param("max", max)),
                );
            }
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(&value.as_text()) {
                return SyncStep::Fail(self.fail(ErrorMessage::catalog("validation.pattern")));
            }
        }
        if self.email && !EMAIL_PATTERN.is_match(&value.as_text()) {
            return SyncStep::Fail(self.fail(ErrorMessage::catalog("validation.email")));
        }

        let number = value.as_number();
        if self.numeric && number.is_none() {
            return SyncStep::Fail(self.fail(ErrorMessage::catalog("validation.numeric")));
        }
        if let (Some(min), Some(number)) = (self.min, number) {
            if number < min {
                return SyncStep::Fail(
                    self.fail(
                        ErrorMessage::catalog("validation.min").with_param("min", min.normalize()),
                    ),
                );
            }
        }
        if let (Some(max), Some(number)) = (self.max, number) {
            if number > max {
                return SyncStep::Fail(
                    self.fail(
                        ErrorMessage::catalog("validation.max").with_param("max", max.normalize()),
                    ),
                );
            }
        }

        if let Some(custom) = &self.custom {
            match custom(value) {
                CustomOutcome::Valid => {}
                CustomOutcome::Invalid => {
                    return SyncStep::Fail(self.fail(ErrorMessage::catalog("validation.invalid")));
                }
                CustomOutcome::Message(message) => return SyncStep::Fail(message),
            }
        }
        SyncStep::Continue
    }

    async fn check_async(&self, value: &FieldValue) -> Option<ErrorMessage> {
        let check = self.async_custom.as_ref()?;
        let Ok(pending) = catch_unwind(AssertUnwindSafe(|| check(value.clone()))) else {
            tracing::warn!("async validation check panicked before yielding a future");
            return Some(ErrorMessage::catalog("validation.invalid"));
        };
        match AssertUnwindSafe(pending).catch_unwind().await {
            Ok(Ok(CustomOutcome::Valid)) => None,
            Ok(Ok(CustomOutcome::Invalid)) => {
                Some(self.fail(ErrorMessage::catalog("validation.invalid")))
            }
            Ok(Ok(CustomOutcome::Message(message))) => Some(message),
            Ok(Err(failure)) => {
                tracing::warn!(reason = failure.reason(), "async validation check failed");
                Some(ErrorMessage::catalog("validation.invalid"))
            }
            Err(_) => {
                tracing::warn!("async validation check panicked");
                Some(ErrorMessage::catalog("validation.invalid"))
            }
        }
    }
}

impl Debug for ValidationRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationRule")
            .field("required", &self.required)
            .field("min_length", &self.min_length)
            .field("max_length", &self.max_length)
            .field("pattern", &self.pattern.as_ref().map(Regex::as_str))
            .field("email", &self.email)
            .field("numeric", &self.numeric)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("custom", &self.custom.is_some())
            .field("async_custom", &self.async_custom.is_some())
            .field("message", &self.message)
            .finish()
    }
}

enum SyncStep {
    Continue,
    Skip,
    Fail(ErrorMessage),
}

/// Runs `rules` in order against `value`; the first failure wins.
pub async fn evaluate(rules: &[ValidationRule], value: &FieldValue) -> Option<ErrorMessage> {
    for rule in rules {
        match rule.check_sync(value) {
            SyncStep::Fail(message) => return Some(message),
            SyncStep::Skip => continue,
            SyncStep::Continue => {}
        }
        if let Some(message) = rule.check_async(value).await {
            return Some(message);
        }
    }
    None
}
