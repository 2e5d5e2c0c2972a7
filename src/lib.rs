//! Headless form state and validation engine.

extern crate self as dojoform;

pub mod form;
pub mod i18n;
pub mod prelude;

pub use crate::form::{FieldKey, FieldValue, FormEngine, FormError, FormOptions, FormResult};
pub use crate::i18n::{I18nManager, Locale};
