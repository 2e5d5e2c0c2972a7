mod controller;
pub mod factory;
mod model;
mod remote;
mod rules;
mod submit;
mod validation;
mod value;


pub use controller::{
    DEFAULT_DEBOUNCE_MS, FieldKey, FieldMeta, FieldRef, FormEngine, FormError, FormId,
    FormOptions, FormResult, FormSnapshot, ValidationMode, ValidationTicket,
};
pub use dojoform_derive::FormModel;
pub use factory::{PasswordStrength, ValueSource};
#[doc(hidden)]
pub use model::{read_field, write_field};
pub use model::FormModel;
pub use remote::{
    CHECK_EMAIL_PATH, CHECK_USERNAME_PATH, CheckEndpoint, ExistenceCheck, ExistsResponse,
    JsonTransport,
};
pub use rules::{
    AsyncCheck, BoxedValidationFuture, CheckFailure, CustomOutcome, ErrorMessage, ValidationRule,
    evaluate,
};
pub use submit::SubmitState;
pub use validation::ValidationResult;
pub use value::{FieldValue, FormValues, FromFieldValue};

/// Rules for several fields, applied with [`FormEngine::set_schema`].
pub type ValidationSchema = std::collections::BTreeMap<FieldKey, Vec<ValidationRule>>;
