pub use crate::form::factory;
pub use crate::form::{
    CheckFailure, CustomOutcome, ErrorMessage, FieldKey, FieldMeta, FieldValue, FormEngine,
    FormError, FormModel, FormOptions, FormResult, FormSnapshot, FormValues, PasswordStrength,
    SubmitState, ValidationMode, ValidationRule, ValidationSchema,
};
pub use crate::i18n::{I18nManager, Locale};
