use std::future::Future;

use super::controller::{FormEngine, FormError, FormResult, FormState, read_lock, write_lock};
use super::value::FormValues;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitState {
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

impl FormEngine {
    /// Validates every field and hands the values to `f` when the form is valid.
    ///
    /// An invalid form ends in [`SubmitState::Failed`] without calling `f` and returns `Ok`.
    pub async fn submit_async<F, Fut>(&self, f: F) -> FormResult<()>
    where
        F: FnOnce(FormValues) -> Fut,
        Fut: Future<Output = FormResult<()>>,
    {
        let generation = {
            let mut state = write_lock(&self.state, "preparing submit")?;
            if matches!(
                state.submit_state,
                SubmitState::Validating | SubmitState::Submitting
            ) {
                return Err(FormError::AlreadySubmitting);
            }
            transition_submit_state(&mut state, SubmitState::Validating)?;
            state.submit_count = state.submit_count.saturating_add(1);
            state.bump_revision();
            state.submit_generation
        };

        let validation = self.validate(None).await;
        let mut state = write_lock(&self.state, "handling submit validation")?;
        if state.submit_generation != generation {
            tracing::debug!(form = %state.id, "form reset during submit validation");
            return Ok(());
        }
        let is_valid = match validation {
            Ok(is_valid) => is_valid,
            Err(error) => {
                transition_submit_state(&mut state, SubmitState::Failed)?;
                return Err(error);
            }
        };
        if !is_valid {
            transition_submit_state(&mut state, SubmitState::Failed)?;
            state.bump_revision();
            tracing::debug!(form = %state.id, "submit rejected by validation");
            return Ok(());
        }
        transition_submit_state(&mut state, SubmitState::Submitting)?;
        state.bump_revision();
        let values = state.values();
        drop(state);

        let submit_result = f(values).await;

        let mut state = write_lock(&self.state, "completing submit")?;
        if state.submit_generation != generation {
            tracing::debug!(form = %state.id, "form reset while submit handler ran");
            return submit_result;
        }
        if submit_result.is_ok() {
            transition_submit_state(&mut state, SubmitState::Succeeded)?;
        } else {
            transition_submit_state(&mut state, SubmitState::Failed)?;
        }
        state.bump_revision();
        submit_result
    }

    pub fn submit_state(&self) -> FormResult<SubmitState> {
        Ok(read_lock(&self.state, "reading submit state")?.submit_state)
    }

    pub fn is_submitting(&self) -> FormResult<bool> {
        Ok(self.submit_state()? == SubmitState::Submitting)
    }

    pub fn submit_count(&self) -> FormResult<u32> {
        Ok(read_lock(&self.state, "reading submit count")?.submit_count)
    }
}

pub(super) fn transition_submit_state(state: &mut FormState, next: SubmitState) -> FormResult<()> {
    let current = state.submit_state;
    if current == next {
        return Ok(());
    }

    let allowed = matches!(
        (current, next),
        (SubmitState::Idle, SubmitState::Validating)
            | (SubmitState::Validating, SubmitState::Submitting)
            | (SubmitState::Validating, SubmitState::Failed)
            | (SubmitState::Submitting, SubmitState::Succeeded)
            | (SubmitState::Submitting, SubmitState::Failed)
            | (SubmitState::Succeeded, SubmitState::Validating)
            | (SubmitState::Failed, SubmitState::Validating)
            | (_, SubmitState::Idle)
    );
    if !allowed {
        return Err(FormError::InvalidStateTransition {
            from: current,
            to: next,
        });
    }
    state.submit_state = next;
    Ok(())
}
