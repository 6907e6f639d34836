//! Payment status polling.
//!
//! A [`PaymentPoller`] is mounted for one payment ID. It owns a single tokio
//! task that checks the payment immediately, then once per interval, until a
//! terminal status is reached, the attempt budget is spent, or the poller is
//! disposed. Checks are not deduplicated: a slow request does not hold back
//! the next tick. Every request carries a sequence number and a response is
//! only applied if nothing newer has been applied and no terminal status has
//! been reached.

use std::time::Duration;

use checkin_server_client::Result;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;
use types_rs::registration::{Candidate, PaymentId, PaymentStatus, PaymentVerification};

use crate::api::DynRegistrationApi;
use crate::config::{DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PaymentViewStatus {
    /// No check has completed yet.
    Loading,
    Pending,
    Success,
    Failed,
    Invalid,
    Error,
}

impl PaymentViewStatus {
    /// Terminal statuses end polling for the lifetime of the poller.
    pub(crate) const fn is_terminal(self) -> bool {
        match self {
            Self::Loading | Self::Pending => false,
            Self::Success | Self::Failed | Self::Invalid | Self::Error => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PaymentView {
    pub(crate) payment_id: PaymentId,
    pub(crate) status: PaymentViewStatus,
    pub(crate) candidate: Option<Candidate>,
    /// Number of checks issued so far.
    pub(crate) attempts: u32,
    pub(crate) max_attempts: u32,
    /// False once the poller has stopped for good.
    pub(crate) polling: bool,
}

impl PaymentView {
    fn new(payment_id: PaymentId, max_attempts: u32) -> Self {
        Self {
            payment_id,
            status: PaymentViewStatus::Loading,
            candidate: None,
            attempts: 0,
            max_attempts,
            polling: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PollConfig {
    pub(crate) interval: Duration,
    pub(crate) max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }
}

/// Maps the result of one check to the status it implies, along with the
/// candidate if the backend sent one.
pub(crate) fn classify(
    result: Result<PaymentVerification>,
) -> (PaymentViewStatus, Option<Candidate>) {
    match result {
        Ok(PaymentVerification::Verified(candidate)) => {
            let status = match candidate.payment_status {
                PaymentStatus::Paid => PaymentViewStatus::Success,
                PaymentStatus::Failed => PaymentViewStatus::Failed,
                PaymentStatus::Unknown(_) => PaymentViewStatus::Pending,
            };
            (status, Some(candidate))
        }
        Ok(PaymentVerification::Invalid) => (PaymentViewStatus::Invalid, None),
        Err(e) => {
            tracing::error!("payment verification failed: {e}");
            (PaymentViewStatus::Error, None)
        }
    }
}

/// Polls the backend for the status of one payment.
pub(crate) struct PaymentPoller {
    handle: Option<JoinHandle<()>>,
    stop: mpsc::Sender<()>,
    view: watch::Receiver<PaymentView>,
}

impl std::fmt::Debug for PaymentPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentPoller")
            .field("view", &*self.view.borrow())
            .finish()
    }
}

impl PaymentPoller {
    /// Starts polling. The first check is issued right away.
    pub(crate) fn mount(api: DynRegistrationApi, payment_id: PaymentId, config: PollConfig) -> Self {
        let (view_tx, view_rx) =
            watch::channel(PaymentView::new(payment_id.clone(), config.max_attempts));
        let (stop_tx, stop_rx) = mpsc::channel(1);

        let span = tracing::info_span!("payment_poll", payment_id = %payment_id);
        let handle = tokio::spawn(poll(api, payment_id, config, view_tx, stop_rx).instrument(span));

        Self {
            handle: Some(handle),
            stop: stop_tx,
            view: view_rx,
        }
    }

    pub(crate) fn view(&self) -> PaymentView {
        self.view.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<PaymentView> {
        self.view.clone()
    }

    /// Waits until the poller stops on its own: a terminal status was reached
    /// or every allowed check has settled.
    pub(crate) async fn settled(&mut self) -> PaymentView {
        if let Err(e) = self.view.wait_for(|view| !view.polling).await {
            tracing::debug!("payment poll ended without settling: {e}");
        }
        self.view()
    }

    /// Stops polling. Once this returns no further check is issued and no
    /// response is applied.
    pub(crate) async fn dispose(mut self) {
        // the task may already be gone, in which case there is nothing to stop
        let _ = self.stop.send(()).await;

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!("payment poll task failed: {e}");
            }
        }
    }
}

impl Drop for PaymentPoller {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

type Check = BoxFuture<'static, (u32, Result<PaymentVerification>)>;

async fn poll(
    api: DynRegistrationApi,
    payment_id: PaymentId,
    config: PollConfig,
    view: watch::Sender<PaymentView>,
    mut stop: mpsc::Receiver<()>,
) {
    let mut ticks = tokio::time::interval(config.interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut in_flight: FuturesUnordered<Check> = FuturesUnordered::new();
    let mut issued: u32 = 0;
    let mut last_applied: u32 = 0;

    loop {
        let scheduling = issued < config.max_attempts;
        if !scheduling && in_flight.is_empty() {
            tracing::info!("giving up after {issued} checks without a final status");
            break;
        }

        tokio::select! {
            biased;

            _ = stop.recv() => {
                tracing::debug!("payment poll disposed");
                return;
            }

            Some((seq, result)) = in_flight.next(), if !in_flight.is_empty() => {
                if seq < last_applied {
                    tracing::debug!("discarding stale response to check {seq}");
                    continue;
                }
                last_applied = seq;

                let (status, candidate) = classify(result);
                tracing::info!("check {seq} reported {status:?}");
                view.send_modify(|view| {
                    view.status = status;
                    if candidate.is_some() {
                        view.candidate = candidate;
                    }
                });

                if status.is_terminal() {
                    // anything still in flight is dropped with `in_flight`
                    break;
                }
            }

            _ = ticks.tick(), if scheduling => {
                issued += 1;
                let seq = issued;
                tracing::debug!("issuing check {seq} of {}", config.max_attempts);
                view.send_modify(|view| view.attempts = seq);

                let request = api.verify_payment(&payment_id);
                in_flight.push(async move { (seq, request.await) }.boxed());
            }
        }
    }

    view.send_modify(|view| view.polling = false);
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use checkin_server_client::Error;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::api::MockRegistrationApi;

    fn candidate(payment_status: PaymentStatus) -> Candidate {
        Candidate {
            name: "Asha".to_owned(),
            payment_amount: None,
            payment_id: Some("pay_1".to_owned()),
            payment_status,
            payment_failure_reason: None,
        }
    }

    fn pending() -> Result<PaymentVerification> {
        Ok(PaymentVerification::Verified(candidate(
            PaymentStatus::Unknown("Pending".to_owned()),
        )))
    }

    fn paid() -> Result<PaymentVerification> {
        Ok(PaymentVerification::Verified(candidate(PaymentStatus::Paid)))
    }

    fn failed() -> Result<PaymentVerification> {
        Ok(PaymentVerification::Verified(candidate(PaymentStatus::Failed)))
    }

    fn server_error() -> Result<PaymentVerification> {
        Err(Error::Http {
            status_code: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            message: Some("DB down".to_owned()),
            context: "failed to verify payment".to_owned(),
        })
    }

    /// A backend whose `n`th check (starting at 0) takes `delay(n)` and
    /// answers `respond(n)`.
    fn scripted(
        calls: Arc<AtomicU32>,
        delay: fn(u32) -> Duration,
        respond: fn(u32) -> Result<PaymentVerification>,
    ) -> DynRegistrationApi {
        let mut api = MockRegistrationApi::new();
        api.expect_verify_payment().returning(move |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                tokio::time::sleep(delay(n)).await;
                respond(n)
            })
        });
        Arc::new(api)
    }

    fn instant(_: u32) -> Duration {
        Duration::ZERO
    }

    fn payment_id() -> PaymentId {
        "order_123".parse().unwrap()
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(paid()).0, PaymentViewStatus::Success);
        assert_eq!(classify(failed()).0, PaymentViewStatus::Failed);
        assert_eq!(classify(pending()).0, PaymentViewStatus::Pending);
        assert_eq!(
            classify(Ok(PaymentVerification::Invalid)),
            (PaymentViewStatus::Invalid, None)
        );
        assert_eq!(classify(server_error()), (PaymentViewStatus::Error, None));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!PaymentViewStatus::Loading.is_terminal());
        assert!(!PaymentViewStatus::Pending.is_terminal());
        assert!(PaymentViewStatus::Success.is_terminal());
        assert!(PaymentViewStatus::Failed.is_terminal());
        assert!(PaymentViewStatus::Invalid.is_terminal());
        assert!(PaymentViewStatus::Error.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let api = scripted(calls.clone(), instant, |n| if n < 2 { pending() } else { paid() });

        let mut poller = PaymentPoller::mount(api, payment_id(), PollConfig::default());
        let view = poller.settled().await;

        assert_eq!(view.status, PaymentViewStatus::Success);
        assert_eq!(view.attempts, 3);
        assert!(!view.polling);
        assert_eq!(
            view.candidate.map(|c| c.payment_status),
            Some(PaymentStatus::Paid)
        );

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let api = scripted(calls.clone(), instant, |_| pending());

        let mut poller = PaymentPoller::mount(api, payment_id(), PollConfig::default());
        let view = poller.settled().await;

        assert_eq!(view.status, PaymentViewStatus::Pending);
        assert_eq!(view.attempts, 10);
        assert!(!view.polling);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_checks_are_spaced_by_interval() {
        let calls = Arc::new(AtomicU32::new(0));
        let api = scripted(calls.clone(), instant, |_| pending());
        let start = tokio::time::Instant::now();

        let mut poller = PaymentPoller::mount(api, payment_id(), PollConfig::default());
        poller.settled().await;

        // first check is immediate, the other nine are three seconds apart
        assert_eq!(start.elapsed(), Duration::from_secs(27));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_stops_polling() {
        let calls = Arc::new(AtomicU32::new(0));
        let api = scripted(calls.clone(), instant, |_| pending());

        let poller = PaymentPoller::mount(api, payment_id(), PollConfig::default());
        let mut view = poller.subscribe();
        view.wait_for(|view| view.status == PaymentViewStatus::Pending)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        poller.dispose().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_drops_in_flight_response() {
        let calls = Arc::new(AtomicU32::new(0));
        let api = scripted(calls.clone(), |_| Duration::from_secs(2), |_| paid());

        let poller = PaymentPoller::mount(api, payment_id(), PollConfig::default());
        let view = poller.subscribe();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        poller.dispose().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(view.borrow().status, PaymentViewStatus::Loading);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let calls = Arc::new(AtomicU32::new(0));
        let api = scripted(calls.clone(), instant, |_| pending());

        let poller = PaymentPoller::mount(api, payment_id(), PollConfig::default());
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(poller);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_does_not_overwrite_terminal_status() {
        let calls = Arc::new(AtomicU32::new(0));
        // check 0 takes 10s and would report a failure; check 1 reports paid
        // after 3s
        let api = scripted(
            calls.clone(),
            |n| {
                if n == 0 {
                    Duration::from_secs(10)
                } else {
                    Duration::ZERO
                }
            },
            |n| if n == 0 { failed() } else { paid() },
        );

        let mut poller = PaymentPoller::mount(api, payment_id(), PollConfig::default());
        let view = poller.settled().await;
        assert_eq!(view.status, PaymentViewStatus::Success);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(poller.view().status, PaymentViewStatus::Success);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_is_discarded() {
        let calls = Arc::new(AtomicU32::new(0));
        // check 0 answers "failed" after 5s, by which time check 1 has
        // already reported pending; check 2 reports paid
        let api = scripted(
            calls.clone(),
            |n| {
                if n == 0 {
                    Duration::from_secs(5)
                } else {
                    Duration::ZERO
                }
            },
            |n| match n {
                0 => failed(),
                1 => pending(),
                _ => paid(),
            },
        );

        let mut poller = PaymentPoller::mount(api, payment_id(), PollConfig::default());
        let view = poller.settled().await;

        assert_eq!(view.status, PaymentViewStatus::Success);
        assert_eq!(view.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_is_terminal() {
        let calls = Arc::new(AtomicU32::new(0));
        let api = scripted(calls.clone(), instant, |_| server_error());

        let mut poller = PaymentPoller::mount(api, payment_id(), PollConfig::default());
        let view = poller.settled().await;
        assert_eq!(view.status, PaymentViewStatus::Error);
        assert_eq!(view.candidate, None);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_is_terminal_and_keeps_candidate() {
        let calls = Arc::new(AtomicU32::new(0));
        let api = scripted(calls.clone(), instant, |n| {
            if n == 0 {
                pending()
            } else {
                Ok(PaymentVerification::Invalid)
            }
        });

        let mut poller = PaymentPoller::mount(api, payment_id(), PollConfig::default());
        let view = poller.settled().await;
        assert_eq!(view.status, PaymentViewStatus::Invalid);
        assert_eq!(view.candidate.map(|c| c.name), Some("Asha".to_owned()));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
