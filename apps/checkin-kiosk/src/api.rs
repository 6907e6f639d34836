//! The seam between the kiosk views and the registration backend.

use std::sync::Arc;

use checkin_server_client::{Client, Result};
use futures::future::BoxFuture;
use types_rs::registration::{MarkAttendanceResponse, PaymentId, PaymentVerification, PhoneNumber};

pub(crate) type DynRegistrationApi = Arc<dyn RegistrationApi + Send + Sync>;

/// Requests the kiosk makes. Returned futures own everything they need so
/// that several can be in flight at once.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait RegistrationApi {
    fn mark_attendance(
        &self,
        whatsapp_number: &PhoneNumber,
    ) -> BoxFuture<'static, Result<MarkAttendanceResponse>>;

    fn verify_payment(&self, payment_id: &PaymentId)
        -> BoxFuture<'static, Result<PaymentVerification>>;
}

impl RegistrationApi for Client {
    fn mark_attendance(
        &self,
        whatsapp_number: &PhoneNumber,
    ) -> BoxFuture<'static, Result<MarkAttendanceResponse>> {
        let client = self.clone();
        let whatsapp_number = whatsapp_number.clone();
        Box::pin(async move { client.mark_attendance(&whatsapp_number).await })
    }

    fn verify_payment(
        &self,
        payment_id: &PaymentId,
    ) -> BoxFuture<'static, Result<PaymentVerification>> {
        let client = self.clone();
        let payment_id = payment_id.clone();
        Box::pin(async move { client.verify_payment(&payment_id).await })
    }
}
