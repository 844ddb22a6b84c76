//! Payment flow: one payment request from "open" to paid, expired or closed.
//!
//! ```text
//! CollectingDetails ──proceed──▶ AwaitingSignature ──submit──▶ Verifying
//!                                      ▲                          │
//!                                      └──────── rejected ◀───────┤
//!                                                                 ▼
//!                                                             Succeeded
//! any non-terminal step ──countdown hits 0──▶ Expired
//! any step ──cancel──▶ Cancelled
//! ```
//!
//! The countdown and a pending ledger lookup can race. Every expiry,
//! cancellation and reopen bumps a generation counter, and a verification
//! result is applied only if the request id and generation it started with
//! are still current.

use crate::config::PaymentFlowConfig;
use crate::error::{FlowError, VerificationError};
use crate::event::{emit, GatewayEvent, GatewayEventsSender};
use crate::ledger::Lamports;
use crate::payment::request::{
    Currency, PaymentPurpose, PaymentRequest, RequestId, VerificationAttempt, VerificationStatus,
};
use crate::payment::verifier::{TransactionVerifier, VerificationOutcome};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Step of a payment flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
    /// Showing amount, currency and network.
    CollectingDetails,
    /// Showing the recipient address, waiting for a signature.
    AwaitingSignature,
    /// A ledger lookup is in flight.
    Verifying,
    /// Payment confirmed.
    Succeeded,
    /// The countdown reached zero.
    Expired,
    /// The user closed the flow.
    Cancelled,
}

impl FlowStep {
    /// Whether the flow can no longer change.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Expired | Self::Cancelled)
    }

    fn name(self) -> &'static str {
        match self {
            Self::CollectingDetails => "collecting details",
            Self::AwaitingSignature => "awaiting signature",
            Self::Verifying => "verifying",
            Self::Succeeded => "succeeded",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Point-in-time copy of a flow's state.
#[derive(Debug, Clone)]
pub struct FlowSnapshot {
    /// Current step.
    pub step: FlowStep,
    /// Active request, `None` once the flow is terminal.
    pub request: Option<PaymentRequest>,
    /// Seconds left on the countdown.
    pub remaining_secs: u64,
    /// Most recent verification attempt.
    pub attempt: Option<VerificationAttempt>,
    /// Error from the most recent rejected attempt.
    pub last_error: Option<VerificationError>,
}

struct FlowState {
    request: Option<PaymentRequest>,
    step: FlowStep,
    remaining_secs: u64,
    generation: u64,
    attempt: Option<VerificationAttempt>,
    last_error: Option<VerificationError>,
}

struct FlowShared {
    state: Mutex<FlowState>,
    events: GatewayEventsSender,
}

impl FlowShared {
    fn tick(&self) -> FlowStep {
        let mut state = self.state.lock();
        if state.step.is_terminal() {
            return state.step;
        }

        state.remaining_secs = state.remaining_secs.saturating_sub(1);
        if state.remaining_secs == 0 {
            self.expire(&mut state);
        }
        state.step
    }

    fn expire(&self, state: &mut FlowState) {
        state.step = FlowStep::Expired;
        state.remaining_secs = 0;
        state.generation += 1;
        if let Some(request) = state.request.take() {
            info!("Payment request {} expired", request.id());
            emit(
                &self.events,
                GatewayEvent::PaymentExpired {
                    request_id: request.id(),
                },
            );
        }
    }
}

/// Returns a `Verifying` flow to `AwaitingSignature` if the submit future
/// is dropped before the lookup finishes.
struct VerifyingGuard<'a> {
    shared: &'a FlowShared,
    generation: u64,
    armed: bool,
}

impl Drop for VerifyingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.shared.state.lock();
        if state.generation == self.generation && state.step == FlowStep::Verifying {
            state.step = FlowStep::AwaitingSignature;
            if let Some(attempt) = state.attempt.as_mut() {
                attempt.resolve(VerificationStatus::Abandoned);
            }
            debug!("Verification abandoned, awaiting a new signature");
        }
    }
}

/// Drives a single payment request end to end.
pub struct PaymentFlow {
    shared: Arc<FlowShared>,
    verifier: Arc<TransactionVerifier>,
    config: PaymentFlowConfig,
    amount: Lamports,
    currency: Currency,
    purpose: PaymentPurpose,
    timed: bool,
    countdown: Mutex<Option<JoinHandle<()>>>,
}

impl PaymentFlow {
    /// Create a flow without a timer. The caller drives the countdown with
    /// [`PaymentFlow::tick`].
    #[must_use]
    pub fn new(
        verifier: Arc<TransactionVerifier>,
        config: PaymentFlowConfig,
        events: GatewayEventsSender,
        amount: Lamports,
        currency: Currency,
        purpose: PaymentPurpose,
    ) -> Self {
        let request = PaymentRequest::new(
            amount,
            currency,
            config.recipient_address.clone(),
            config.window_secs,
        )
        .with_purpose(purpose);
        info!(
            "Payment request {} opened for {amount} ({purpose}, expires {})",
            request.id(),
            request.expires_at()
        );

        let state = FlowState {
            request: Some(request),
            step: FlowStep::CollectingDetails,
            remaining_secs: config.window_secs,
            generation: 0,
            attempt: None,
            last_error: None,
        };

        Self {
            shared: Arc::new(FlowShared {
                state: Mutex::new(state),
                events,
            }),
            verifier,
            config,
            amount,
            currency,
            purpose,
            timed: false,
            countdown: Mutex::new(None),
        }
    }

    /// Create a flow and start its one-second countdown on the current tokio
    /// runtime.
    #[must_use]
    pub fn start(
        verifier: Arc<TransactionVerifier>,
        config: PaymentFlowConfig,
        events: GatewayEventsSender,
        amount: Lamports,
        currency: Currency,
        purpose: PaymentPurpose,
    ) -> Self {
        let mut flow = Self::new(verifier, config, events, amount, currency, purpose);
        flow.timed = true;
        flow.spawn_countdown();
        flow
    }

    fn spawn_countdown(&self) {
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if shared.tick().is_terminal() {
                    break;
                }
            }
        });

        if let Some(previous) = self.countdown.lock().replace(handle) {
            previous.abort();
        }
    }

    fn stop_countdown(&self) {
        if let Some(handle) = self.countdown.lock().take() {
            handle.abort();
        }
    }

    /// Advance the countdown by one second. Returns the step afterwards.
    pub fn tick(&self) -> FlowStep {
        self.shared.tick()
    }

    /// Move from the details step to the signature step.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError`] if the flow is not collecting details.
    pub fn proceed(&self) -> Result<(), FlowError> {
        let mut state = self.shared.state.lock();
        match state.step {
            FlowStep::CollectingDetails => {
                state.step = FlowStep::AwaitingSignature;
                Ok(())
            }
            step if step.is_terminal() => Err(FlowError::Closed(step.name())),
            step => Err(FlowError::InvalidTransition {
                step: step.name(),
                action: "proceed",
            }),
        }
    }

    /// Verify `signature` against the active request.
    ///
    /// On rejection the flow returns to [`FlowStep::AwaitingSignature`] with
    /// the countdown untouched, so the user can paste another signature.
    /// Dropping the returned future mid-lookup does the same.
    ///
    /// # Errors
    ///
    /// - [`FlowError::VerificationInFlight`] if a lookup is already running
    /// - [`FlowError::Verification`] if the verifier rejected the signature
    /// - [`FlowError::Discarded`] if the request expired, was cancelled or
    ///   replaced while the lookup was running
    /// - [`FlowError::Closed`] / [`FlowError::InvalidTransition`] if the flow
    ///   is not awaiting a signature
    pub async fn submit_signature(
        &self,
        signature: &str,
    ) -> Result<VerificationOutcome, FlowError> {
        let (request, generation) = {
            let mut state = self.shared.state.lock();
            match state.step {
                FlowStep::AwaitingSignature => {}
                FlowStep::Verifying => return Err(FlowError::VerificationInFlight),
                step if step.is_terminal() => return Err(FlowError::Closed(step.name())),
                step => {
                    return Err(FlowError::InvalidTransition {
                        step: step.name(),
                        action: "submit a signature",
                    })
                }
            }

            let Some(request) = state.request.clone() else {
                return Err(FlowError::Closed(state.step.name()));
            };
            if request.is_expired_at(Utc::now()) {
                self.shared.expire(&mut state);
                return Err(FlowError::Closed(FlowStep::Expired.name()));
            }

            state.step = FlowStep::Verifying;
            state.last_error = None;
            state.attempt = Some(VerificationAttempt::pending(request.id(), signature));
            (request, state.generation)
        };

        debug!("Verifying signature for {}", request.id());
        let mut guard = VerifyingGuard {
            shared: &self.shared,
            generation,
            armed: true,
        };
        let result = self.verifier.verify(signature, &request).await;
        guard.armed = false;

        let mut state = self.shared.state.lock();
        let still_current = state.generation == generation
            && state.step == FlowStep::Verifying
            && state.request.as_ref().map(PaymentRequest::id) == Some(request.id());
        if !still_current {
            debug!(
                "Discarding verification result for {} (flow is {})",
                request.id(),
                state.step.name()
            );
            return Err(FlowError::Discarded);
        }

        match result {
            Ok(outcome) => {
                state.step = FlowStep::Succeeded;
                if let Some(attempt) = state.attempt.as_mut() {
                    attempt.resolve(VerificationStatus::Valid);
                }
                state.request = None;
                drop(state);

                self.stop_countdown();
                info!("Payment request {} succeeded", request.id());
                emit(
                    &self.shared.events,
                    GatewayEvent::PaymentSucceeded {
                        request_id: request.id(),
                        purpose: request.purpose(),
                    },
                );
                Ok(outcome)
            }
            Err(err) => {
                state.step = FlowStep::AwaitingSignature;
                if let Some(attempt) = state.attempt.as_mut() {
                    attempt.resolve(err.status());
                }
                state.last_error = Some(err.clone());
                debug!("Signature rejected for {}: {err}", request.id());
                Err(FlowError::Verification(err))
            }
        }
    }

    /// Close the flow. Always permitted; a no-op on a terminal flow.
    ///
    /// Returns `true` if this call closed the flow.
    pub fn cancel(&self) -> bool {
        self.stop_countdown();

        let mut state = self.shared.state.lock();
        if state.step.is_terminal() {
            return false;
        }

        state.step = FlowStep::Cancelled;
        state.generation += 1;
        if let Some(request) = state.request.take() {
            info!("Payment request {} cancelled", request.id());
            emit(
                &self.shared.events,
                GatewayEvent::PaymentCancelled {
                    request_id: request.id(),
                },
            );
        }
        true
    }

    /// Start over with a fresh request and a full window after the flow has
    /// ended.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidTransition`] if the flow is still active.
    pub fn reopen(&self) -> Result<RequestId, FlowError> {
        let request_id = {
            let mut state = self.shared.state.lock();
            if !state.step.is_terminal() {
                return Err(FlowError::InvalidTransition {
                    step: state.step.name(),
                    action: "reopen",
                });
            }

            let request = PaymentRequest::new(
                self.amount,
                self.currency,
                self.config.recipient_address.clone(),
                self.config.window_secs,
            )
            .with_purpose(self.purpose);
            let id = request.id();
            info!("Payment request {id} opened for {} (reopen)", self.amount);

            state.request = Some(request);
            state.step = FlowStep::CollectingDetails;
            state.remaining_secs = self.config.window_secs;
            state.generation += 1;
            state.attempt = None;
            state.last_error = None;
            id
        };

        if self.timed {
            self.spawn_countdown();
        }
        Ok(request_id)
    }

    /// Current step.
    #[must_use]
    pub fn step(&self) -> FlowStep {
        self.shared.state.lock().step
    }

    /// Seconds left before expiry.
    #[must_use]
    pub fn remaining_secs(&self) -> u64 {
        self.shared.state.lock().remaining_secs
    }

    /// Countdown as `MM:SS`.
    #[must_use]
    pub fn formatted_remaining(&self) -> String {
        let secs = self.remaining_secs();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }

    /// Active request, if the flow has not ended.
    #[must_use]
    pub fn request(&self) -> Option<PaymentRequest> {
        self.shared.state.lock().request.clone()
    }

    /// Error from the most recent rejected signature.
    #[must_use]
    pub fn last_error(&self) -> Option<VerificationError> {
        self.shared.state.lock().last_error.clone()
    }

    /// Copy of the full flow state.
    #[must_use]
    pub fn snapshot(&self) -> FlowSnapshot {
        let state = self.shared.state.lock();
        FlowSnapshot {
            step: state.step,
            request: state.request.clone(),
            remaining_secs: state.remaining_secs,
            attempt: state.attempt.clone(),
            last_error: state.last_error.clone(),
        }
    }
}

impl Drop for PaymentFlow {
    fn drop(&mut self) {
        self.stop_countdown();
    }
}
