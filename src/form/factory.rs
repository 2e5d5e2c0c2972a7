//! Ready-made [`ValidationRule`]s. Every rule accepts a caller message through
//! [`ValidationRule::message`]; otherwise the localized default is used.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use rust_decimal::Decimal;

use super::controller::FieldRef;
use super::remote::ExistenceCheck;
use super::rules::{AsyncCheck, CustomOutcome, ErrorMessage, ValidationRule};
use super::value::FieldValue;

pub fn required() -> ValidationRule {
    ValidationRule::new().required()
}

pub fn min_length(min: usize) -> ValidationRule {
    ValidationRule::new().min_length(min)
}

pub fn max_length(max: usize) -> ValidationRule {
    ValidationRule::new().max_length(max)
}

pub fn email() -> ValidationRule {
    ValidationRule::new().email()
}

pub fn pattern(pattern: Regex) -> ValidationRule {
    ValidationRule::new().pattern(pattern)
}

pub fn numeric() -> ValidationRule {
    ValidationRule::new().numeric()
}

pub fn min(min: impl Into<Decimal>) -> ValidationRule {
    ValidationRule::new().min(min)
}

pub fn max(max: impl Into<Decimal>) -> ValidationRule {
    ValidationRule::new().max(max)
}

/// Something whose value is read at validation time.
pub trait ValueSource: Send + Sync + 'static {
    fn current(&self) -> FieldValue;
}

impl<F> ValueSource for F
where
    F: Fn() -> FieldValue + Send + Sync + 'static,
{
    fn current(&self) -> FieldValue {
        self()
    }
}

impl ValueSource for FieldRef {
    fn current(&self) -> FieldValue {
        self.get().unwrap_or_default()
    }
}

/// Passes when the value equals the current value of `source`.
pub fn same_as(source: impl ValueSource) -> ValidationRule {
    ValidationRule::new()
        .custom(move |value: &FieldValue| *value == source.current())
        .message(ErrorMessage::catalog("validation.same_as"))
}

/// Validator returning an error text, or `None` when the value is fine.
pub fn custom<F>(check: F) -> ValidationRule
where
    F: Fn(&FieldValue) -> Option<String> + Send + Sync + 'static,
{
    ValidationRule::new().custom(move |value: &FieldValue| CustomOutcome::from(check(value)))
}

pub fn async_rule<F, Fut>(check: F) -> ValidationRule
where
    F: Fn(FieldValue) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AsyncCheck> + Send + 'static,
{
    ValidationRule::new().async_custom(check)
}

/// Fails when `check` reports the email as already registered.
pub fn email_unique(check: impl ExistenceCheck) -> ValidationRule {
    unique(
        check,
        ErrorMessage::catalog("validation.email_taken"),
        "validation.email_check_failed",
    )
}

/// Fails when `check` reports the username as already taken.
pub fn username_unique(check: impl ExistenceCheck) -> ValidationRule {
    unique(
        check,
        ErrorMessage::catalog("validation.username_taken"),
        "validation.username_check_failed",
    )
}

fn unique(
    check: impl ExistenceCheck,
    taken: ErrorMessage,
    check_failed: &'static str,
) -> ValidationRule {
    let check = Arc::new(check);
    ValidationRule::new()
        .async_custom(move |value: FieldValue| {
            let check = check.clone();
            async move {
                if value.is_empty() {
                    return Ok(CustomOutcome::Valid);
                }
                match check.exists(value.as_text().into_owned()).await {
                    Ok(true) => Ok(CustomOutcome::Invalid),
                    Ok(false) => Ok(CustomOutcome::Valid),
                    Err(failure) => {
                        tracing::warn!(reason = failure.reason(), "uniqueness check failed");
                        Ok(CustomOutcome::Message(ErrorMessage::catalog(check_failed)))
                    }
                }
            }
        })
        .message(taken)
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PasswordStrength {
    Weak,
    #[default]
    Medium,
    Strong,
}

struct StrengthPolicy {
    min_chars: usize,
    classes: Vec<Regex>,
}

static LOWER: LazyLock<Regex> = LazyLock::new(|| compile(r"[a-z]"));
static UPPER: LazyLock<Regex> = LazyLock::new(|| compile(r"[A-Z]"));
static DIGIT: LazyLock<Regex> = LazyLock::new(|| compile(r"[0-9]"));
static SPECIAL: LazyLock<Regex> = LazyLock::new(|| compile(r"[@$!%*?&]"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern)
        .unwrap_or_else(|error| unreachable!("character class `{pattern}` compiles: {error}"))
}

impl PasswordStrength {
    fn policy(self) -> StrengthPolicy {
        match self {
            PasswordStrength::Weak => StrengthPolicy {
                min_chars: 6,
                classes: Vec::new(),
            },
            PasswordStrength::Medium => StrengthPolicy {
                min_chars: 8,
                classes: vec![LOWER.clone(), UPPER.clone(), DIGIT.clone()],
            },
            PasswordStrength::Strong => StrengthPolicy {
                min_chars: 12,
                classes: vec![LOWER.clone(), UPPER.clone(), DIGIT.clone(), SPECIAL.clone()],
            },
        }
    }

    fn message_key(self) -> &'static str {
        match self {
            PasswordStrength::Weak => "validation.password_weak",
            PasswordStrength::Medium => "validation.password_medium",
            PasswordStrength::Strong => "validation.password_strong",
        }
    }

    pub fn accepts(self, password: &str) -> bool {
        let policy = self.policy();
        password.chars().count() >= policy.min_chars
            && policy.classes.iter().all(|class| class.is_match(password))
    }
}

/// Empty passwords pass; pair with [`required`] when the field is mandatory.
pub fn password_strength(level: PasswordStrength) -> ValidationRule {
    ValidationRule::new()
        .custom(move |value: &FieldValue| level.accepts(&value.as_text()))
        .message(ErrorMessage::catalog(level.message_key()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::rules::{CheckFailure, evaluate};
    use futures::executor::block_on;
    use std::sync::Mutex;

    fn run(rule: ValidationRule, value: impl Into<FieldValue>) -> Option<ErrorMessage> {
        block_on(evaluate(&[rule], &value.into()))
    }

    #[test]
    fn password_levels_follow_fixed_policies() {
        assert!(PasswordStrength::Weak.accepts("abcdef"));
        assert!(!PasswordStrength::Weak.accepts("abcde"));
        assert!(PasswordStrength::Medium.accepts("Abcdef12"));
        assert!(!PasswordStrength::Medium.accepts("abcdef12"));
        assert!(!PasswordStrength::Medium.accepts("Abcde12"));
        assert!(PasswordStrength::Strong.accepts("Abcdefgh12!x"));
        assert!(!PasswordStrength::Strong.accepts("Abcdefgh123x"));
    }

    #[test]
    fn password_rule_reports_level_message() {
        assert_eq!(
            run(password_strength(PasswordStrength::Strong), "short"),
            Some(ErrorMessage::catalog("validation.password_strong"))
        );
        assert_eq!(run(password_strength(PasswordStrength::Medium), ""), None);
    }

    #[test]
    fn same_as_reads_source_lazily() {
        let source = Arc::new(Mutex::new(FieldValue::from("secret")));
        let reader = source.clone();
        let rule = same_as(move || {
            reader
                .lock()
                .map(|value| value.clone())
                .unwrap_or_default()
        })
        .message("Пароли не совпадают");

        assert_eq!(run(rule.clone(), "secret"), None);
        *source.lock().expect("source lock") = FieldValue::from("changed");
        assert_eq!(
            run(rule, "secret"),
            Some(ErrorMessage::from("Пароли не совпадают"))
        );
    }

    #[test]
    fn custom_none_passes() {
        let rule = custom(|value: &FieldValue| {
            (value.as_text() == "admin").then(|| "reserved".to_string())
        });
        assert_eq!(run(rule.clone(), "admin"), Some(ErrorMessage::from("reserved")));
        assert_eq!(run(rule, "sensei"), None);
    }

    #[test]
    fn email_unique_maps_existence_and_failures() {
        let taken = email_unique(|email: String| async move {
            Ok::<_, CheckFailure>(email == "used@dojo.ru")
        });
        assert_eq!(
            run(taken.clone(), "used@dojo.ru"),
            Some(ErrorMessage::catalog("validation.email_taken"))
        );
        assert_eq!(run(taken.clone(), "new@dojo.ru"), None);
        assert_eq!(run(taken, ""), None);

        let offline = username_unique(|_name: String| async move {
            Err::<bool, _>(CheckFailure::new("connection refused"))
        });
        assert_eq!(
            run(offline, "sensei"),
            Some(ErrorMessage::catalog("validation.username_check_failed"))
        );
    }

    #[test]
    fn caller_message_overrides_taken_message() {
        let rule = username_unique(|_name: String| async move { Ok::<_, CheckFailure>(true) })
            .message("Ник занят");
        assert_eq!(run(rule, "sensei"), Some(ErrorMessage::from("Ник занят")));
    }
}
