use std::collections::BTreeMap;
use std::time::Duration;

use futures::future::join_all;
use futures::task::SpawnExt;
use futures_timer::Delay;

use super::controller::{
    FieldKey, FormEngine, FormError, FormResult, SharedRules, ValidationMode, ValidationTicket,
    lock, read_lock, write_lock,
};
use super::rules::evaluate;
use super::value::FieldValue;

/// Outcome of validating every field of a form.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: BTreeMap<FieldKey, String>,
}

impl FormEngine {
    /// Runs the rules of one field and publishes the result.
    ///
    /// Concurrent runs for the same field are allowed; the one started last decides the
    /// stored error. A run that was superseded returns the field's current validity.
    pub async fn validate_field(&self, key: FieldKey) -> FormResult<bool> {
        let (ticket, value) = self.start_validation(key)?;
        let rules = self.rules_for(key)?;
        let error = evaluate(&rules, &value)
            .await
            .map(|message| message.resolve(&self.i18n))
            .filter(|message| !message.is_empty());
        self.finish_validation(key, ticket, error)
    }

    /// Validates one field, or every field concurrently when `key` is `None`.
    pub async fn validate(&self, key: Option<FieldKey>) -> FormResult<bool> {
        if let Some(key) = key {
            return self.validate_field(key).await;
        }
        let keys = self.field_keys()?;
        let results = join_all(keys.into_iter().map(|key| self.validate_field(key))).await;
        let mut is_valid = true;
        for result in results {
            is_valid &= result?;
        }
        Ok(is_valid)
    }

    pub async fn validate_all(&self) -> FormResult<ValidationResult> {
        let is_valid = self.validate(None).await?;
        Ok(ValidationResult {
            is_valid,
            errors: self.errors()?,
        })
    }

    /// Sets the value and waits for its debounced validation in place of spawning it.
    pub async fn set_field_value_async(
        &self,
        key: FieldKey,
        value: impl Into<FieldValue>,
    ) -> FormResult<()> {
        self.write_value(key, value.into())?;
        if self.options.validation_mode != ValidationMode::OnChange {
            return Ok(());
        }
        let delay = self.options.debounce();
        let mut runs = vec![(key, self.next_edit(key)?)];
        for dependent in self.dependents_of(key)? {
            runs.push((dependent, self.next_edit(dependent)?));
        }
        let results = join_all(
            runs.into_iter()
                .map(|(key, edit)| self.debounced_validation(key, edit, delay)),
        )
        .await;
        results.into_iter().collect()
    }

    /// Waits until every scheduled debounced validation has finished.
    pub async fn settle(&self) -> FormResult<()> {
        loop {
            let handles = {
                let mut pending = lock(&self.pending, "draining pending validations")?;
                std::mem::take(&mut *pending)
            };
            if handles.is_empty() {
                return Ok(());
            }
            join_all(handles.into_values()).await;
        }
    }

    /// Spawns a validation of `key` that runs after `delay` unless a newer edit supersedes it.
    pub(super) fn schedule_validation(&self, key: FieldKey, delay: Duration) -> FormResult<()> {
        let edit = self.next_edit(key)?;
        let engine = self.clone();
        let handle = self
            .spawner
            .spawn_with_handle(async move {
                if let Err(error) = engine.debounced_validation(key, edit, delay).await {
                    tracing::warn!(field = %key, %error, "background validation failed");
                }
            })
            .map_err(|error| FormError::SpawnFailed(error.to_string()))?;

        let superseded = lock(&self.pending, "tracking pending validation")?.insert(key, handle);
        if let Some(superseded) = superseded {
            // Keep the superseded task alive; it notices the newer edit and exits.
            superseded.forget();
        }
        Ok(())
    }

    async fn debounced_validation(
        &self,
        key: FieldKey,
        edit: u64,
        delay: Duration,
    ) -> FormResult<()> {
        if !delay.is_zero() {
            Delay::new(delay).await;
        }
        if !self.is_latest_edit(key, edit)? {
            tracing::trace!(field = %key, edit, "debounced validation superseded");
            return Ok(());
        }
        self.validate_field(key).await.map(drop)
    }

    fn next_edit(&self, key: FieldKey) -> FormResult<u64> {
        let mut state = write_lock(&self.state, "arming debounced validation")?;
        let field = state.field_mut(key)?;
        field.edit += 1;
        Ok(field.edit)
    }

    fn is_latest_edit(&self, key: FieldKey, edit: u64) -> FormResult<bool> {
        Ok(read_lock(&self.state, "checking latest edit")?
            .field(key)?
            .edit
            == edit)
    }

    fn start_validation(&self, key: FieldKey) -> FormResult<(ValidationTicket, FieldValue)> {
        let mut state = write_lock(&self.state, "starting field validation")?;
        let field = state.field_mut(key)?;
        field.ticket = field.ticket.next();
        field.meta.validating = true;
        let started = (field.ticket, field.meta.value.clone());
        state.bump_revision();
        Ok(started)
    }

    fn rules_for(&self, key: FieldKey) -> FormResult<SharedRules> {
        Ok(read_lock(&self.rules, "reading rules for validation")?
            .get(&key)
            .cloned()
            .unwrap_or_else(|| SharedRules::from(Vec::new())))
    }

    fn finish_validation(
        &self,
        key: FieldKey,
        ticket: ValidationTicket,
        error: Option<String>,
    ) -> FormResult<bool> {
        let mut state = write_lock(&self.state, "finishing field validation")?;
        let form = state.id;
        let field = state.field_mut(key)?;
        if field.ticket != ticket {
            tracing::trace!(
                %form,
                field = %key,
                ticket = ticket.0,
                "discarding stale validation result"
            );
            return Ok(field.meta.error.as_deref().is_none_or(str::is_empty));
        }
        field.meta.validating = false;
        field.meta.error = error;
        let is_valid = field.meta.error.is_none();
        state.bump_revision();
        tracing::debug!(%form, field = %key, ticket = ticket.0, is_valid, "field validated");
        Ok(is_valid)
    }
}
