use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use futures::future::RemoteHandle;
use futures::task::Spawn;
use serde::Deserialize;

use super::model::FormModel;
use super::rules::ValidationRule;
use super::submit::SubmitState;
use super::value::{FieldValue, FormValues};
use crate::i18n::{I18nManager, Locale};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

impl Display for FormId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "form-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldKey(&'static str);

impl FieldKey {
    pub const fn new(value: &'static str) -> Self {
        Self(value)
    }

    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Identifies one validation run of one field. Only the latest ticket may publish.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValidationTicket(pub u64);

impl ValidationTicket {
    pub(super) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationMode {
    /// Debounced validation after every value change.
    #[default]
    OnChange,
    /// Validation when a field is touched.
    OnBlur,
    /// Validation only on explicit `validate` or submit.
    OnSubmit,
}

pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormOptions {
    pub debounce_ms: u64,
    pub validation_mode: ValidationMode,
    pub locale: Locale,
}

impl FormOptions {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            validation_mode: ValidationMode::OnChange,
            locale: Locale::System,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldMeta {
    pub value: FieldValue,
    pub touched: bool,
    pub validating: bool,
    pub dirty: bool,
    pub error: Option<String>,
}

#[derive(Clone, Debug)]
pub struct FormSnapshot {
    pub values: FormValues,
    pub fields: BTreeMap<FieldKey, FieldMeta>,
    pub errors: BTreeMap<FieldKey, String>,
    pub is_valid: bool,
    pub has_errors: bool,
    pub submit_state: SubmitState,
    pub submit_count: u32,
    pub revision: u64,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FormError {
    UnknownField(FieldKey),
    FieldType {
        field: FieldKey,
        expected: &'static str,
    },
    StatePoisoned(&'static str),
    SpawnFailed(String),
    InvalidStateTransition {
        from: SubmitState,
        to: SubmitState,
    },
    AlreadySubmitting,
    SubmitFailed(String),
}

impl Display for FormError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FormError::UnknownField(field) => write!(f, "unknown form field `{field}`"),
            FormError::FieldType { field, expected } => {
                write!(f, "field `{field}` does not hold a value of type {expected}")
            }
            FormError::StatePoisoned(context) => {
                write!(f, "form state lock poisoned while {context}")
            }
            FormError::SpawnFailed(error) => {
                write!(f, "failed to schedule background validation: {error}")
            }
            FormError::InvalidStateTransition { from, to } => {
                write!(f, "invalid submit state transition: {from:?} -> {to:?}")
            }
            FormError::AlreadySubmitting => f.write_str("form submit is already in progress"),
            FormError::SubmitFailed(error) => write!(f, "submit handler failed: {error}"),
        }
    }
}

impl std::error::Error for FormError {}

pub type FormResult<T> = Result<T, FormError>;

pub(super) struct FieldState {
    pub(super) initial: FieldValue,
    pub(super) meta: FieldMeta,
    pub(super) ticket: ValidationTicket,
    pub(super) edit: u64,
}

impl FieldState {
    fn new(initial: FieldValue) -> Self {
        Self {
            meta: FieldMeta {
                value: initial.clone(),
                ..FieldMeta::default()
            },
            initial,
            ticket: ValidationTicket::default(),
            edit: 0,
        }
    }

    /// Restores the construction snapshot and invalidates pending and running validations.
    fn reset(&mut self) {
        self.meta = FieldMeta {
            value: self.initial.clone(),
            ..FieldMeta::default()
        };
        self.ticket = self.ticket.next();
        self.edit += 1;
    }
}

pub(super) struct FormState {
    pub(super) id: FormId,
    pub(super) fields: BTreeMap<FieldKey, FieldState>,
    pub(super) submit_state: SubmitState,
    pub(super) submit_count: u32,
    /// Bumped by `reset`; a submit started under an older generation stops quietly.
    pub(super) submit_generation: u64,
    pub(super) revision: u64,
}

impl FormState {
    pub(super) fn field(&self, key: FieldKey) -> FormResult<&FieldState> {
        self.fields.get(&key).ok_or(FormError::UnknownField(key))
    }

    pub(super) fn field_mut(&mut self, key: FieldKey) -> FormResult<&mut FieldState> {
        self.fields.get_mut(&key).ok_or(FormError::UnknownField(key))
    }

    pub(super) fn bump_revision(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    pub(super) fn values(&self) -> FormValues {
        self.fields
            .iter()
            .map(|(key, field)| (*key, field.meta.value.clone()))
            .collect()
    }

    fn errors(&self) -> BTreeMap<FieldKey, String> {
        self.fields
            .iter()
            .filter_map(|(key, field)| {
                field
                    .meta
                    .error
                    .as_ref()
                    .filter(|error| !error.is_empty())
                    .map(|error| (*key, error.clone()))
            })
            .collect()
    }

    pub(super) fn is_valid(&self) -> bool {
        self.fields
            .values()
            .all(|field| field.meta.error.as_deref().is_none_or(str::is_empty))
    }
}

pub(super) type SharedRules = Arc<[ValidationRule]>;

/// Headless form state: values, per-field metadata, rules and debounced revalidation.
///
/// Clones share the same state.
#[derive(Clone)]
pub struct FormEngine {
    pub(super) options: FormOptions,
    pub(super) i18n: I18nManager,
    pub(super) spawner: Arc<dyn Spawn + Send + Sync>,
    pub(super) state: Arc<RwLock<FormState>>,
    pub(super) rules: Arc<RwLock<BTreeMap<FieldKey, SharedRules>>>,
    pub(super) dependencies: Arc<RwLock<BTreeMap<FieldKey, BTreeSet<FieldKey>>>>,
    pub(super) pending: Arc<Mutex<BTreeMap<FieldKey, RemoteHandle<()>>>>,
}

impl FormEngine {
    pub fn new<I, S>(initial: I, spawner: S) -> Self
    where
        I: IntoIterator<Item = (FieldKey, FieldValue)>,
        S: Spawn + Send + Sync + 'static,
    {
        Self::with_options(initial, spawner, FormOptions::default())
    }

    pub fn with_options<I, S>(initial: I, spawner: S, options: FormOptions) -> Self
    where
        I: IntoIterator<Item = (FieldKey, FieldValue)>,
        S: Spawn + Send + Sync + 'static,
    {
        let fields = initial
            .into_iter()
            .map(|(key, value)| (key, FieldState::new(value)))
            .collect();
        Self {
            i18n: I18nManager::with_locale(options.locale.clone()),
            options,
            spawner: Arc::new(spawner),
            state: Arc::new(RwLock::new(FormState {
                id: FormId::next(),
                fields,
                submit_state: SubmitState::Idle,
                submit_count: 0,
                submit_generation: 0,
                revision: 0,
            })),
            rules: Arc::new(RwLock::new(BTreeMap::new())),
            dependencies: Arc::new(RwLock::new(BTreeMap::new())),
            pending: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn from_model<M, S>(model: M, spawner: S, options: FormOptions) -> Self
    where
        M: FormModel,
        S: Spawn + Send + Sync + 'static,
    {
        Self::with_options(model.into_values(), spawner, options)
    }

    pub fn form_id(&self) -> FormResult<FormId> {
        Ok(read_lock(&self.state, "reading form id")?.id)
    }

    pub fn options(&self) -> &FormOptions {
        &self.options
    }

    pub fn i18n(&self) -> &I18nManager {
        &self.i18n
    }

    pub fn field_keys(&self) -> FormResult<Vec<FieldKey>> {
        Ok(read_lock(&self.state, "listing field keys")?
            .fields
            .keys()
            .copied()
            .collect())
    }

    pub fn set_field_rules(&self, key: FieldKey, rules: Vec<ValidationRule>) -> FormResult<()> {
        read_lock(&self.state, "checking field before attaching rules")?.field(key)?;
        write_lock(&self.rules, "attaching field rules")?.insert(key, rules.into());
        Ok(())
    }

    /// Attaches rules for several fields at once; nothing is applied if any key is unknown.
    pub fn set_schema<I>(&self, schema: I) -> FormResult<()>
    where
        I: IntoIterator<Item = (FieldKey, Vec<ValidationRule>)>,
    {
        let schema = schema.into_iter().collect::<Vec<_>>();
        {
            let state = read_lock(&self.state, "checking schema fields")?;
            for (key, _) in &schema {
                state.field(*key)?;
            }
        }
        let mut rules = write_lock(&self.rules, "applying validation schema")?;
        for (key, field_rules) in schema {
            rules.insert(key, field_rules.into());
        }
        Ok(())
    }

    pub fn field_rule_count(&self, key: FieldKey) -> FormResult<usize> {
        read_lock(&self.state, "checking field before reading rules")?.field(key)?;
        Ok(read_lock(&self.rules, "reading field rules")?
            .get(&key)
            .map_or(0, |rules| rules.len()))
    }

    /// Revalidates `dependent` whenever `source` changes.
    pub fn register_dependency(&self, source: FieldKey, dependent: FieldKey) -> FormResult<()> {
        {
            let state = read_lock(&self.state, "checking dependency fields")?;
            state.field(source)?;
            state.field(dependent)?;
        }
        write_lock(&self.dependencies, "registering dependency")?
            .entry(source)
            .or_default()
            .insert(dependent);
        Ok(())
    }

    pub fn set_field_value(&self, key: FieldKey, value: impl Into<FieldValue>) -> FormResult<()> {
        self.write_value(key, value.into())?;
        if self.options.validation_mode == ValidationMode::OnChange {
            let delay = self.options.debounce();
            self.schedule_validation(key, delay)?;
            for dependent in self.dependents_of(key)? {
                self.schedule_validation(dependent, delay)?;
            }
        }
        Ok(())
    }

    pub fn set_field_error(&self, key: FieldKey, message: impl Into<String>) -> FormResult<()> {
        let mut state = write_lock(&self.state, "setting field error")?;
        state.field_mut(key)?.meta.error = Some(message.into());
        state.bump_revision();
        Ok(())
    }

    pub fn clear_field_error(&self, key: FieldKey) -> FormResult<()> {
        let mut state = write_lock(&self.state, "clearing field error")?;
        state.field_mut(key)?.meta.error = None;
        state.bump_revision();
        Ok(())
    }

    pub fn clear_errors(&self) -> FormResult<()> {
        let mut state = write_lock(&self.state, "clearing all field errors")?;
        for field in state.fields.values_mut() {
            field.meta.error = None;
        }
        state.bump_revision();
        Ok(())
    }

    pub fn touch_field(&self, key: FieldKey) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "touching field")?;
            state.field_mut(key)?.meta.touched = true;
            state.bump_revision();
        }
        if self.options.validation_mode == ValidationMode::OnBlur {
            self.schedule_validation(key, Duration::ZERO)?;
        }
        Ok(())
    }

    pub fn reset(&self) -> FormResult<()> {
        let mut state = write_lock(&self.state, "resetting form")?;
        for field in state.fields.values_mut() {
            field.reset();
        }
        state.submit_state = SubmitState::Idle;
        state.submit_count = 0;
        state.submit_generation = state.submit_generation.wrapping_add(1);
        state.bump_revision();
        Ok(())
    }

    pub fn reset_field(&self, key: FieldKey) -> FormResult<()> {
        let mut state = write_lock(&self.state, "resetting field")?;
        state.field_mut(key)?.reset();
        state.bump_revision();
        Ok(())
    }

    pub fn get_field_value(&self, key: FieldKey) -> FormResult<FieldValue> {
        Ok(read_lock(&self.state, "reading field value")?
            .field(key)?
            .meta
            .value
            .clone())
    }

    pub fn get_field_error(&self, key: FieldKey) -> FormResult<Option<String>> {
        Ok(read_lock(&self.state, "reading field error")?
            .field(key)?
            .meta
            .error
            .clone())
    }

    pub fn is_field_touched(&self, key: FieldKey) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading touched flag")?
            .field(key)?
            .meta
            .touched)
    }

    pub fn is_field_valid(&self, key: FieldKey) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading field validity")?
            .field(key)?
            .meta
            .error
            .as_deref()
            .is_none_or(str::is_empty))
    }

    pub fn is_field_validating(&self, key: FieldKey) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading validating flag")?
            .field(key)?
            .meta
            .validating)
    }

    pub fn is_field_dirty(&self, key: FieldKey) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading dirty flag")?
            .field(key)?
            .meta
            .dirty)
    }

    pub fn field_meta(&self, key: FieldKey) -> FormResult<FieldMeta> {
        Ok(read_lock(&self.state, "reading field meta")?
            .field(key)?
            .meta
            .clone())
    }

    pub fn values(&self) -> FormResult<FormValues> {
        Ok(read_lock(&self.state, "reading form values")?.values())
    }

    pub fn errors(&self) -> FormResult<BTreeMap<FieldKey, String>> {
        Ok(read_lock(&self.state, "reading form errors")?.errors())
    }

    pub fn is_valid(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading form validity")?.is_valid())
    }

    pub fn has_errors(&self) -> FormResult<bool> {
        Ok(!read_lock(&self.state, "reading form errors")?.is_valid())
    }

    pub fn revision(&self) -> FormResult<u64> {
        Ok(read_lock(&self.state, "reading form revision")?.revision)
    }

    /// Reads the values back into a typed model.
    pub fn model<M>(&self) -> FormResult<M>
    where
        M: FormModel,
    {
        M::from_values(&self.values()?)
    }

    /// Error to render next to the input: hidden until the field is touched or a submit ran.
    pub fn display_error(&self, key: FieldKey) -> FormResult<Option<String>> {
        let state = read_lock(&self.state, "reading display error message")?;
        let meta = &state.field(key)?.meta;
        if !meta.touched && state.submit_count == 0 {
            return Ok(None);
        }
        Ok(meta.error.clone().filter(|error| !error.is_empty()))
    }

    /// Live handle on a field's value, read at use time.
    pub fn field_ref(&self, key: FieldKey) -> FormResult<FieldRef> {
        read_lock(&self.state, "creating field reference")?.field(key)?;
        Ok(FieldRef {
            key,
            state: Arc::downgrade(&self.state),
        })
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot> {
        let state = read_lock(&self.state, "creating form snapshot")?;
        let errors = state.errors();
        Ok(FormSnapshot {
            values: state.values(),
            fields: state
                .fields
                .iter()
                .map(|(key, field)| (*key, field.meta.clone()))
                .collect(),
            has_errors: !errors.is_empty(),
            is_valid: errors.is_empty(),
            errors,
            submit_state: state.submit_state,
            submit_count: state.submit_count,
            revision: state.revision,
        })
    }

    pub(super) fn write_value(&self, key: FieldKey, value: FieldValue) -> FormResult<()> {
        let mut state = write_lock(&self.state, "writing field value")?;
        let field = state.field_mut(key)?;
        field.meta.dirty = value != field.initial;
        field.meta.value = value;
        field.meta.touched = true;
        state.bump_revision();
        Ok(())
    }

    pub(super) fn dependents_of(&self, source: FieldKey) -> FormResult<Vec<FieldKey>> {
        Ok(read_lock(&self.dependencies, "reading field dependencies")?
            .get(&source)
            .map(|dependents| dependents.iter().copied().collect())
            .unwrap_or_default())
    }
}

/// Weak, live reference to one field of a [`FormEngine`].
#[derive(Clone)]
pub struct FieldRef {
    key: FieldKey,
    state: Weak<RwLock<FormState>>,
}

impl FieldRef {
    pub fn key(&self) -> FieldKey {
        self.key
    }

    /// Current value, or `None` once the form is gone.
    pub fn get(&self) -> Option<FieldValue> {
        let state = self.state.upgrade()?;
        let state = read_lock(&state, "reading referenced field").ok()?;
        state
            .fields
            .get(&self.key)
            .map(|field| field.meta.value.clone())
    }
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn lock<'a, T>(
    mutex: &'a Mutex<T>,
    context: &'static str,
) -> FormResult<MutexGuard<'a, T>> {
    mutex.lock().map_err(|_| FormError::StatePoisoned(context))
}
