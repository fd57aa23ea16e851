//! The submit → reconcile state machine shared by every form that posts to
//! the backend (waitlist signup, partner contact).
//!
//! A form holds the user's raw input and the state of its latest attempt.
//! At most one attempt per form is in flight; the backend's `success` flag is
//! the only thing that can turn an attempt into `Succeeded`.

use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Context;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::domain::ValidationError;
use crate::transport::TransportError;
use crate::transport::TransportResponse;
use crate::utils::error_chain_fmt;

/// Shown when the backend rejects a submission without saying why
pub const GENERIC_REJECTION: &str = "Something went wrong. Try again!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    InFlight,
    Succeeded,
    FailedValidation,
    FailedNetwork,
    FailedTimeout,
    FailedRejected,
}

impl SubmissionState {
    pub fn is_terminal(&self) -> bool { !matches!(self, Self::Idle | Self::InFlight) }
}

#[derive(thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("could not submit to the backend")]
    Network(#[source] anyhow::Error),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Rejected(String),
    /// A previous attempt on the same form has not resolved yet. Nothing was
    /// sent and the form was left alone.
    #[error("a submission is already in flight")]
    InFlight,
}

impl std::fmt::Debug for SubmissionError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl SubmissionError {
    /// The state a form ends up in after failing with this error
    pub fn state(&self) -> SubmissionState {
        match self {
            Self::Validation(_) => SubmissionState::FailedValidation,
            Self::Network(_) => SubmissionState::FailedNetwork,
            Self::Timeout(_) => SubmissionState::FailedTimeout,
            Self::Rejected(_) => SubmissionState::FailedRejected,
            Self::InFlight => SubmissionState::InFlight,
        }
    }

    /// Text for the toast shown to the user
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(ValidationError::InvalidFormat(_)) => {
                "Please enter a valid email address".to_string()
            }
            Self::Validation(ValidationError::InvalidName(_)) => {
                "Please enter your name (2 to 100 characters)".to_string()
            }
            Self::Validation(ValidationError::EmptyOrganization) => {
                "Please enter your organization".to_string()
            }
            Self::Validation(ValidationError::EmptyMessage) => "Please enter a message".to_string(),
            Self::Validation(ValidationError::MissingPartnerKind) => {
                "Please choose a partnership type".to_string()
            }
            Self::Network(_) => "Network error. Please try again.".to_string(),
            Self::Timeout(_) => "The request timed out. Please try again.".to_string(),
            Self::Rejected(message) => message.clone(),
            Self::InFlight => "Already submitting, please wait.".to_string(),
        }
    }
}

impl From<TransportError> for SubmissionError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout(limit) => Self::Timeout(limit),
            TransportError::Unreachable(cause) => Self::Network(cause),
        }
    }
}

/// `{ "success": bool, "message": string, ... }`, the body every form
/// endpoint answers with. A missing `success` counts as `false`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    /// Only sent by the waitlist endpoint
    #[serde(default)]
    pub total_subscribers: Option<u64>,
}

/// Decide whether a response confirms the submission. Only a 2xx whose body
/// says `"success": true` does; a non-2xx is never trusted, whatever its body
/// claims.
pub fn accept(response: Result<TransportResponse, TransportError>) -> Result<Envelope, SubmissionError> {
    let response = response?;
    if !response.is_success() {
        return Err(SubmissionError::Network(anyhow::anyhow!(
            "backend answered with status {}",
            response.status
        )));
    }
    let envelope: Envelope = response
        .json()
        .context("response body is not a submission envelope")
        .map_err(SubmissionError::Network)?;
    match envelope.success {
        true => Ok(envelope),
        false => Err(SubmissionError::Rejected(
            envelope
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| GENERIC_REJECTION.to_string()),
        )),
    }
}

/// Lock-free "is something in flight" flag. The flag is held for as long as
/// the returned guard lives.
#[derive(Default)]
pub struct SingleFlight(AtomicBool);

#[derive(Debug)]
pub struct FlightGuard<'a>(&'a AtomicBool);

impl SingleFlight {
    pub fn try_begin(&self) -> Option<FlightGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(&self.0))
    }

    pub fn is_in_flight(&self) -> bool { self.0.load(Ordering::Acquire) }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) { self.0.store(false, Ordering::Release); }
}

struct Form<T> {
    input: T,
    state: SubmissionState,
}

/// One form: its raw input, the state of its latest attempt, and the
/// single-flight flag guarding it.
pub struct Submission<T> {
    flight: SingleFlight,
    form: Mutex<Form<T>>,
}

impl<T: Clone + Default> Default for Submission<T> {
    fn default() -> Self { Self::new() }
}

impl<T: Clone + Default> Submission<T> {
    pub fn new() -> Self {
        Self {
            flight: SingleFlight::default(),
            form: Mutex::new(Form {
                input: T::default(),
                state: SubmissionState::Idle,
            }),
        }
    }

    pub fn input(&self) -> T { self.form.lock().input.clone() }

    pub fn state(&self) -> SubmissionState {
        let state = self.form.lock().state;
        match state {
            // the attempt was dropped before it resolved
            SubmissionState::InFlight if !self.flight.is_in_flight() => SubmissionState::Idle,
            s => s,
        }
    }

    pub fn is_in_flight(&self) -> bool { self.flight.is_in_flight() }

    /// The user changed the input. A resolved (or abandoned) attempt goes
    /// back to `Idle`; an attempt still in flight is unaffected.
    pub fn edit(
        &self,
        input: T,
    ) {
        let in_flight = self.flight.is_in_flight();
        let mut form = self.form.lock();
        form.input = input;
        if form.state.is_terminal() || (form.state == SubmissionState::InFlight && !in_flight) {
            form.state = SubmissionState::Idle;
        }
    }

    /// Run one attempt with `input`. Rejected with `InFlight` (without
    /// touching the form) while another attempt is outstanding. On success
    /// the input is cleared; on failure it is kept for correction.
    pub async fn run<F, Fut, R>(
        &self,
        input: T,
        attempt: F,
    ) -> Result<R, SubmissionError>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = Result<R, SubmissionError>>,
    {
        let Some(_guard) = self.flight.try_begin() else {
            return Err(SubmissionError::InFlight);
        };
        {
            let mut form = self.form.lock();
            form.input = input.clone();
            form.state = SubmissionState::InFlight;
        }

        let result = attempt(input).await;

        let mut form = self.form.lock();
        match &result {
            Ok(_) => {
                form.input = T::default();
                form.state = SubmissionState::Succeeded;
            }
            Err(e) => form.state = e.state(),
        }
        result
    }
}
