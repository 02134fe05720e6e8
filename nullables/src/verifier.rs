//! Nullable verification method.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use securepool_utils::lock;
use securepool_verification::{Verdict, VerificationError, VerificationMethod, VerificationRequest};

#[derive(Default)]
struct VerifierState {
    verdicts: VecDeque<Result<Verdict, VerificationError>>,
    requests: Vec<VerificationRequest>,
}

/// A verification method that answers from a script after a fixed delay.
///
/// Unscripted requests are approved.
#[derive(Clone)]
pub struct NullVerifier {
    delay: Duration,
    state: Arc<Mutex<VerifierState>>,
}

impl NullVerifier {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: Arc::new(Mutex::new(VerifierState::default())),
        }
    }

    pub fn script(&self, verdict: Result<Verdict, VerificationError>) {
        lock(&self.state).verdicts.push_back(verdict);
    }

    pub fn deny_next(&self, reason: &str) {
        self.script(Ok(Verdict::Denied(reason.to_string())));
    }

    /// Every request seen so far, in arrival order.
    pub fn requests(&self) -> Vec<VerificationRequest> {
        lock(&self.state).requests.clone()
    }
}

#[async_trait]
impl VerificationMethod for NullVerifier {
    fn name(&self) -> &str {
        "null"
    }

    async fn verify(&self, request: &VerificationRequest) -> Result<Verdict, VerificationError> {
        let verdict = {
            let mut state = lock(&self.state);
            state.requests.push(request.clone());
            state.verdicts.pop_front().unwrap_or(Ok(Verdict::Approved))
        };
        tokio::time::sleep(self.delay).await;
        verdict
    }
}
