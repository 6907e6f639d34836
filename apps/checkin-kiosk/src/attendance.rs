//! Attendance check-in form.
//!
//! The form owns its view state and publishes every change on a
//! [`tokio::sync::watch`] channel so a renderer can follow along. Submissions
//! take `&mut self`, so a second submission cannot start while one is in
//! flight.

use checkin_server_client::Error;
use tokio::sync::watch;
use types_rs::registration::{
    strip_non_digits, AttendanceStatus, MarkAttendanceResponse, PhoneNumber,
};

use crate::api::DynRegistrationApi;

pub(crate) const INVALID_PHONE_NUMBER_MESSAGE: &str =
    "Please enter a valid 10-digit phone number.";
pub(crate) const DEFAULT_FAILURE_MESSAGE: &str = "Could not mark attendance";

/// Backend messages that mean the number has no registration.
const NOT_FOUND_PHRASES: [&str; 3] = ["not found", "not registered", "no user"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MarkedAttendance {
    pub(crate) name: Option<String>,
    /// ISO-8601 timestamp as sent by the backend.
    pub(crate) timestamp: Option<String>,
    /// Opaque token staff scan at the reporting counter.
    pub(crate) token: String,
    pub(crate) already_marked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttendanceOutcome {
    Marked(MarkedAttendance),
    NotFound,
    Failed { message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AttendanceViewState {
    pub(crate) phone_digits: String,
    pub(crate) validation_error: Option<String>,
    pub(crate) is_submitting: bool,
    pub(crate) outcome: Option<AttendanceOutcome>,
}

impl AttendanceViewState {
    pub(crate) fn marked(&self) -> Option<&MarkedAttendance> {
        match &self.outcome {
            Some(AttendanceOutcome::Marked(marked)) => Some(marked),
            _ => None,
        }
    }
}

pub(crate) struct AttendanceForm {
    api: DynRegistrationApi,
    state: watch::Sender<AttendanceViewState>,
}

impl std::fmt::Debug for AttendanceForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttendanceForm")
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl AttendanceForm {
    pub(crate) fn new(api: DynRegistrationApi) -> Self {
        let (state, _) = watch::channel(AttendanceViewState::default());
        Self { api, state }
    }

    pub(crate) fn state(&self) -> AttendanceViewState {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<AttendanceViewState> {
        self.state.subscribe()
    }

    /// Validates `raw` and, if it holds a 10-digit number, asks the backend to
    /// mark attendance for it. Malformed input never reaches the network.
    pub(crate) async fn submit(&mut self, raw: &str) -> AttendanceViewState {
        let whatsapp_number = {
            let digits = strip_non_digits(raw);
            let parsed = PhoneNumber::parse(&digits);
            self.state.send_modify(|state| {
                state.phone_digits = digits;
                state.outcome = None;
                state.validation_error = parsed
                    .is_err()
                    .then(|| INVALID_PHONE_NUMBER_MESSAGE.to_owned());
            });
            match parsed {
                Ok(whatsapp_number) => whatsapp_number,
                Err(e) => {
                    tracing::debug!("rejected phone number input: {e}");
                    return self.state();
                }
            }
        };

        self.state.send_modify(|state| state.is_submitting = true);
        tracing::info!("marking attendance for {whatsapp_number}");
        let outcome = match self.api.mark_attendance(&whatsapp_number).await {
            Ok(response) => outcome_for_response(response),
            Err(e) => outcome_for_error(e),
        };

        self.state.send_modify(|state| {
            if matches!(outcome, AttendanceOutcome::Marked(_)) {
                state.phone_digits.clear();
            }
            state.is_submitting = false;
            state.outcome = Some(outcome);
        });
        self.state()
    }
}

fn outcome_for_response(response: MarkAttendanceResponse) -> AttendanceOutcome {
    let Some(token) = response.marked_token().map(str::to_owned) else {
        tracing::warn!("backend reply did not mark attendance: {response:?}");
        return AttendanceOutcome::Failed {
            message: DEFAULT_FAILURE_MESSAGE.to_owned(),
        };
    };

    let already_marked = response.status == AttendanceStatus::AlreadyMarked;
    tracing::info!(already_marked, "attendance marked");
    AttendanceOutcome::Marked(MarkedAttendance {
        name: response.name.filter(|name| !name.is_empty()),
        timestamp: response.attendance_date.filter(|date| !date.is_empty()),
        token,
        already_marked,
    })
}

fn outcome_for_error(error: Error) -> AttendanceOutcome {
    tracing::error!("failed to mark attendance: {error}");
    if !matches!(error, Error::Http { .. }) {
        return AttendanceOutcome::Failed {
            message: error.to_string(),
        };
    }

    match error.server_message().filter(|message| !message.is_empty()) {
        Some(message) if is_not_found_message(message) => AttendanceOutcome::NotFound,
        Some(message) => AttendanceOutcome::Failed {
            message: message.to_owned(),
        },
        None => AttendanceOutcome::Failed {
            message: DEFAULT_FAILURE_MESSAGE.to_owned(),
        },
    }
}

fn is_not_found_message(message: &str) -> bool {
    let message = message.to_lowercase();
    NOT_FOUND_PHRASES
        .iter()
        .any(|phrase| message.contains(phrase))
}
