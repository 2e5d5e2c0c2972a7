use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use super::controller::FieldKey;

/// Flat view of every field value, keyed by field.
pub type FormValues = BTreeMap<FieldKey, FieldValue>;

/// Dynamic value held by a form field.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Number(Decimal),
    Text(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// `true` for falsy values: null, `""`, `false` and zero.
    ///
    /// A list is never empty, even without elements.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Bool(value) => !value,
            FieldValue::Number(number) => number.is_zero(),
            FieldValue::Text(text) => text.is_empty(),
            FieldValue::List(_) => false,
        }
    }

    /// Empty, or text made only of whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.trim().is_empty(),
            other => other.is_empty(),
        }
    }

    /// Character count for text, element count for lists.
    pub fn length(&self) -> Option<usize> {
        match self {
            FieldValue::Text(text) => Some(text.chars().count()),
            FieldValue::List(items) => Some(items.len()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            FieldValue::Null => None,
            FieldValue::Bool(value) => Some(if *value { Decimal::ONE } else { Decimal::ZERO }),
            FieldValue::Number(number) => Some(*number),
            FieldValue::Text(text) => parse_decimal(text),
            FieldValue::List(items) => match items.as_slice() {
                [] => Some(Decimal::ZERO),
                [single] => single.as_number(),
                _ => None,
            },
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Text form used by pattern and email checks.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Text(text) => Cow::Borrowed(text),
            other => Cow::Owned(other.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Bool(value) => serde_json::Value::Bool(*value),
            FieldValue::Number(number) => decimal_to_json(*number),
            FieldValue::Text(text) => serde_json::Value::String(text.clone()),
            FieldValue::List(items) => {
                serde_json::Value::Array(items.iter().map(FieldValue::to_json).collect())
            }
        }
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(Decimal::ZERO);
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

fn decimal_to_json(number: Decimal) -> serde_json::Value {
    if number.fract().is_zero() {
        if let Some(integer) = number.to_i64() {
            return serde_json::Value::from(integer);
        }
    }
    number
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map_or(serde_json::Value::Null, serde_json::Value::Number)
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(value) => write!(f, "{value}"),
            FieldValue::Number(number) => write!(f, "{}", number.normalize()),
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(value) => FieldValue::Bool(value),
            serde_json::Value::Number(number) => Decimal::from_str(&number.to_string())
                .ok()
                .or_else(|| number.as_f64().and_then(Decimal::from_f64))
                .map_or(FieldValue::Null, FieldValue::Number),
            serde_json::Value::String(text) => FieldValue::Text(text),
            serde_json::Value::Array(items) => {
                FieldValue::List(items.into_iter().map(FieldValue::from).collect())
            }
            serde_json::Value::Object(_) => FieldValue::Null,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Number(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Decimal::from_f64(value).map_or(FieldValue::Null, FieldValue::Number)
    }
}

macro_rules! impl_integer_field_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::Number(Decimal::from(value))
                }
            }

            impl FromFieldValue for $ty {
                fn from_field_value(value: &FieldValue) -> Option<Self> {
                    match value {
                        FieldValue::Number(number) if number.fract().is_zero() => {
                            number.to_i128().and_then(|wide| <$ty>::try_from(wide).ok())
                        }
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_integer_field_value!(i32, i64, u32, u64);

impl<T> From<Option<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

impl<T> From<Vec<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(value: Vec<T>) -> Self {
        FieldValue::List(value.into_iter().map(Into::into).collect())
    }
}

/// Typed read-back of a [`FieldValue`]; `None` when the variant does not fit.
pub trait FromFieldValue: Sized {
    fn from_field_value(value: &FieldValue) -> Option<Self>;
}

impl FromFieldValue for FieldValue {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromFieldValue for String {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromFieldValue for bool {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl FromFieldValue for Decimal {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Number(number) => Some(*number),
            _ => None,
        }
    }
}

impl FromFieldValue for f64 {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Number(number) => number.to_f64(),
            _ => None,
        }
    }
}

impl<T> FromFieldValue for Option<T>
where
    T: FromFieldValue,
{
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Null => Some(None),
            other => T::from_field_value(other).map(Some),
        }
    }
}

impl<T> FromFieldValue for Vec<T>
where
    T: FromFieldValue,
{
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::List(items) => items.iter().map(T::from_field_value).collect(),
            _ => None,
        }
    }
}
