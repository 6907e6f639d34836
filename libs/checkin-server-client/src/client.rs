use std::fmt::Debug;

use reqwest::{Response, StatusCode, Url};
use serde::Serialize;
use types_rs::registration::{
    ErrorResponse, MarkAttendanceRequest, MarkAttendanceResponse, PaymentId,
    PaymentVerification, PhoneNumber, VerifyPaymentResponse,
};

use crate::result::{Error, Result};

/// A client for the event registration backend.
#[derive(Clone)]
pub struct Client {
    base_url: Url,
    http: reqwest::Client,
}

impl Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Client {
    /// Create a new client with the given base URL. Endpoint paths are
    /// resolved under the base URL's path, so a backend mounted at
    /// `https://host/api` is reached at `https://host/api/users/...`.
    ///
    /// # Example
    ///
    /// ```
    /// # use checkin_server_client::Client;
    /// let base_url = "http://localhost:3300".parse().unwrap();
    /// let client = Client::new(base_url);
    /// ```
    pub fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    /// Create a new client to connect to the backend running on localhost.
    pub fn localhost() -> Self {
        Self::new(
            "http://localhost:3300"
                .parse()
                .expect("hardcoded URL is valid"),
        )
    }

    /// Mark attendance for the attendee registered with `whatsapp_number`.
    ///
    /// Any non-2xx reply becomes [`Error::Http`] carrying the backend's
    /// `message`. A body that is not JSON, whatever the status, becomes
    /// [`Error::Json`].
    ///
    /// # Example
    ///
    /// ```
    /// # use checkin_server_client::Client;
    /// # use types_rs::registration::PhoneNumber;
    /// # async {
    /// # let client = Client::localhost();
    /// let response = client
    ///     .mark_attendance(&PhoneNumber::parse("9876543210").unwrap())
    ///     .await
    ///     .unwrap();
    /// # };
    /// ```
    pub async fn mark_attendance(
        &self,
        whatsapp_number: &PhoneNumber,
    ) -> Result<MarkAttendanceResponse> {
        let request = MarkAttendanceRequest {
            whatsapp_number: whatsapp_number.clone(),
        };
        let response = self.post_json("users/mark-attendance", &request).await?;
        let status_code = response.status();
        let text = response.text().await?;

        if !status_code.is_success() {
            let body: ErrorResponse = serde_json::from_str(&text)?;
            return Err(Error::Http {
                status_code,
                message: body.message,
                context: "failed to mark attendance".to_owned(),
            });
        }

        Ok(serde_json::from_str(&text)?)
    }

    /// Ask the backend whether the payment for `payment_id` went through.
    ///
    /// Only HTTP 200 counts as an answer. A 200 whose body is not a valid
    /// verification payload yields [`PaymentVerification::Invalid`]; any
    /// other status yields [`Error::Http`].
    pub async fn verify_payment(&self, payment_id: &PaymentId) -> Result<PaymentVerification> {
        let mut url = self.base_url.join("users/verify-payment")?;
        url.path_segments_mut()
            .map_err(|()| Error::CannotBeABase(self.base_url.clone()))?
            .push(payment_id.as_str());

        let response = self.get(url.as_str()).await?;
        let status_code = response.status();
        let text = response.text().await?;

        if status_code != StatusCode::OK {
            return Err(Error::Http {
                status_code,
                message: serde_json::from_str::<ErrorResponse>(&text)
                    .ok()
                    .and_then(|body| body.message),
                context: format!("failed to verify payment {payment_id}"),
            });
        }

        match serde_json::from_str::<VerifyPaymentResponse>(&text) {
            Ok(body) => Ok(body.into()),
            Err(e) => {
                tracing::warn!("unreadable payment verification for {payment_id}: {e}");
                Ok(PaymentVerification::Invalid)
            }
        }
    }

    fn normalize_url(&self, path: &str) -> Result<Url> {
        if path.starts_with(self.base_url.as_str()) {
            Ok(Url::parse(path)?)
        } else {
            Ok(self.base_url.join(path)?)
        }
    }

    async fn get(&self, path: &str) -> Result<Response> {
        let url = self.normalize_url(path)?;
        tracing::debug!("GET {url}");
        Ok(self.http.get(url).send().await?)
    }

    async fn post_json(&self, path: &str, body: &impl Serialize) -> Result<Response> {
        let url = self.normalize_url(path)?;
        tracing::debug!("POST {url}");
        Ok(self.http.post(url).json(body).send().await?)
    }
}
