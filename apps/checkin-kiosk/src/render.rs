//! Plain-text rendering of the kiosk views.

use qrcode::render::unicode;
use qrcode::QrCode;
use reqwest::Url;
use time::format_description::well_known::Iso8601;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::attendance::{AttendanceOutcome, AttendanceViewState, MarkedAttendance};
use crate::payment::{PaymentView, PaymentViewStatus};

/// Formats an ISO-8601 timestamp for display. Values that do not parse are
/// shown as they are.
pub(crate) fn format_timestamp(iso8601: &str) -> String {
    OffsetDateTime::parse(iso8601, &Iso8601::DEFAULT)
        .ok()
        .and_then(|timestamp| {
            timestamp
                .format(format_description!(
                    "[year]-[month]-[day] [hour]:[minute]:[second] [offset_hour sign:mandatory]:[offset_minute]"
                ))
                .ok()
        })
        .unwrap_or_else(|| iso8601.to_owned())
}

/// Renders `data` as a QR code made of Unicode half blocks, light modules on
/// a dark background so it scans off a dark terminal.
pub(crate) fn qr_code(data: &str) -> Option<String> {
    match QrCode::new(data.as_bytes()) {
        Ok(code) => Some(
            code.render::<unicode::Dense1x2>()
                .dark_color(unicode::Dense1x2::Light)
                .light_color(unicode::Dense1x2::Dark)
                .build(),
        ),
        Err(e) => {
            tracing::warn!("cannot encode attendance token as QR code: {e}");
            None
        }
    }
}

pub(crate) fn attendance(state: &AttendanceViewState, registration_url: &Url) -> String {
    let mut lines = Vec::new();

    if let Some(validation_error) = &state.validation_error {
        lines.push(validation_error.clone());
    }

    if state.is_submitting {
        lines.push(format!("Marking attendance for +91 {}...", state.phone_digits));
    }

    match &state.outcome {
        None => {}
        Some(AttendanceOutcome::NotFound) => {
            lines.push("Number not registered!".to_owned());
            lines.push(format!("Please register here: {registration_url}"));
            lines.push("And please visit the enquiry counter.".to_owned());
        }
        Some(AttendanceOutcome::Failed { message }) => {
            lines.push(format!("Error: {message}"));
        }
        Some(AttendanceOutcome::Marked(marked)) => marked_attendance(marked, &mut lines),
    }

    lines.join("\n")
}

fn marked_attendance(marked: &MarkedAttendance, lines: &mut Vec<String>) {
    if let Some(name) = &marked.name {
        if marked.already_marked {
            lines.push(format!("Attendance already marked for {name}"));
        } else {
            lines.push(format!("Attendance marked for {name}"));
        }
    }
    if let Some(timestamp) = &marked.timestamp {
        lines.push(format!(
            "Attendance marked on: {}",
            format_timestamp(timestamp)
        ));
    }
    lines.push("Show this QR at Reporting Counter and Collect Entry Band".to_owned());
    match qr_code(&marked.token) {
        Some(qr) => lines.push(qr),
        None => lines.push(format!("Token: {}", marked.token)),
    }
    lines.push("Please visit the admin counter.".to_owned());
}

pub(crate) fn payment(view: &PaymentView) -> String {
    let payment_id = &view.payment_id;
    let mut lines = Vec::new();

    match view.status {
        PaymentViewStatus::Loading => {
            lines.push("Checking payment status...".to_owned());
        }
        PaymentViewStatus::Pending => {
            lines.push("Payment Processing".to_owned());
            lines.push(
                "Your payment is being processed. This usually takes 10-20 seconds.".to_owned(),
            );
            lines.push(format!("Payment ID: {payment_id}"));
            if view.polling {
                lines.push(format!(
                    "Please wait... We're automatically checking your payment status. ({} of {})",
                    view.attempts, view.max_attempts
                ));
            }
            lines.push("Need help? Contact support with your payment ID above.".to_owned());
        }
        PaymentViewStatus::Failed => {
            lines.push("Payment Failed".to_owned());
            lines.push(
                "Your payment was not successful. This could be due to payment cancellation, \
                 insufficient funds, or a technical issue."
                    .to_owned(),
            );
            if let Some(reason) = view
                .candidate
                .as_ref()
                .and_then(|candidate| candidate.payment_failure_reason.as_ref())
            {
                lines.push(format!("Reason: {reason}"));
            }
            lines.push(format!("Payment ID: {payment_id}"));
        }
        PaymentViewStatus::Invalid => {
            lines.push("Invalid Payment".to_owned());
            lines.push(
                "This payment ID is not valid or doesn't match any registration.".to_owned(),
            );
        }
        PaymentViewStatus::Error => {
            lines.push("Server Error".to_owned());
            lines.push(
                "Something went wrong while verifying your payment. Please try again later."
                    .to_owned(),
            );
        }
        PaymentViewStatus::Success => {
            lines.push("Registration Successful!".to_owned());
            if let Some(candidate) = &view.candidate {
                lines.push(format!("Thank you, {}!", candidate.name));
                let amount = candidate
                    .payment_amount
                    .as_ref()
                    .map_or_else(|| "N/A".to_owned(), ToString::to_string);
                lines.push(format!("We've received your payment of ₹{amount}"));
                lines.push(format!(
                    "Payment ID: {}",
                    candidate.payment_id.as_deref().unwrap_or(payment_id.as_str())
                ));
            }
        }
    }

    lines.join("\n")
}
