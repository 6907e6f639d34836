//! Types exchanged with the event registration backend.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of digits in a valid phone number.
pub const PHONE_NUMBER_DIGITS: usize = 10;

/// A 10-digit phone number with all formatting removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Strips every non-digit character from `raw` and accepts the result iff
    /// exactly [`PHONE_NUMBER_DIGITS`] digits remain.
    ///
    /// # Example
    ///
    /// ```
    /// # use types_rs::registration::PhoneNumber;
    /// let number = PhoneNumber::parse("98765 43210").unwrap();
    /// assert_eq!(number.as_str(), "9876543210");
    /// assert!(PhoneNumber::parse("+91 98765 43210").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, String> {
        let digits = strip_non_digits(raw);
        if digits.len() == PHONE_NUMBER_DIGITS {
            Ok(Self(digits))
        } else {
            Err(format!(
                "phone number must have exactly {PHONE_NUMBER_DIGITS} digits, got {}",
                digits.len()
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Removes everything but ASCII digits.
pub fn strip_non_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

impl TryFrom<String> for PhoneNumber {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for PhoneNumber {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl FromStr for PhoneNumber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self {
        value.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a registration whose payment is being verified. Taken
/// verbatim from the payment redirect URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct PaymentId(String);

impl PaymentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PaymentId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Err("Payment ID cannot be empty".to_owned())
        } else {
            Ok(Self(value))
        }
    }
}

impl TryFrom<&str> for PaymentId {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.to_owned().try_into()
    }
}

impl FromStr for PaymentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.try_into()
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendanceRequest {
    pub whatsapp_number: PhoneNumber,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceStatus {
    Success,
    AlreadyMarked,
    Unknown(String),
}

impl AttendanceStatus {
    /// Whether the backend considers the attendee checked in.
    pub const fn is_marked(&self) -> bool {
        matches!(self, Self::Success | Self::AlreadyMarked)
    }
}

impl<'de> Deserialize<'de> for AttendanceStatus {
    fn deserialize<D>(deserializer: D) -> Result<AttendanceStatus, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "success" => Ok(AttendanceStatus::Success),
            "already-marked" => Ok(AttendanceStatus::AlreadyMarked),
            _ => Ok(AttendanceStatus::Unknown(s)),
        }
    }
}

impl Serialize for AttendanceStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            AttendanceStatus::Success => serializer.serialize_str("success"),
            AttendanceStatus::AlreadyMarked => serializer.serialize_str("already-marked"),
            AttendanceStatus::Unknown(s) => serializer.serialize_str(s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendanceResponse {
    pub status: AttendanceStatus,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub attendance_token: Option<String>,
    /// ISO-8601 timestamp of the check-in.
    #[serde(default)]
    pub attendance_date: Option<String>,
}

impl MarkAttendanceResponse {
    /// The attendance token, if the backend marked the attendee and sent a
    /// non-empty token along.
    pub fn marked_token(&self) -> Option<&str> {
        if !self.status.is_marked() {
            return None;
        }
        self.attendance_token
            .as_deref()
            .filter(|token| !token.is_empty())
    }
}

/// Body of any non-2xx response from the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Paid,
    Failed,
    Unknown(String),
}

impl<'de> Deserialize<'de> for PaymentStatus {
    fn deserialize<D>(deserializer: D) -> Result<PaymentStatus, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "Paid" => Ok(PaymentStatus::Paid),
            "Failed" => Ok(PaymentStatus::Failed),
            _ => Ok(PaymentStatus::Unknown(s)),
        }
    }
}

impl Serialize for PaymentStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            PaymentStatus::Paid => serializer.serialize_str("Paid"),
            PaymentStatus::Failed => serializer.serialize_str("Failed"),
            PaymentStatus::Unknown(s) => serializer.serialize_str(s),
        }
    }
}

/// A payment amount as sent by the backend, which uses either a number or a
/// string depending on the payment gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Amount {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub payment_amount: Option<Amount>,
    #[serde(default)]
    pub payment_id: Option<String>,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_failure_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VerifyPaymentResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub candidate: Option<Candidate>,
}

/// Outcome of a successful (HTTP 200) payment verification request.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentVerification {
    /// The backend found the registration and reported its payment.
    Verified(Candidate),

    /// The backend answered but did not vouch for a registration.
    Invalid,
}

impl From<VerifyPaymentResponse> for PaymentVerification {
    fn from(response: VerifyPaymentResponse) -> Self {
        match response {
            VerifyPaymentResponse {
                success: true,
                candidate: Some(candidate),
            } => Self::Verified(candidate),
            _ => Self::Invalid,
        }
    }
}
