//! The action verification gate.
//!
//! `Closed → Verifying → {Success → Closed, Failed → Closed}`.
//!
//! [`ActionVerificationGate::open`] starts a verification for one action and
//! takes the action itself as a callback. The callback runs at most once per
//! opening and only after the `Success` transition; the gate then holds the
//! success stage briefly and closes itself. A failed check parks the gate in
//! `Failed` until [`ActionVerificationGate::close`]; there is no implicit retry.
//! Opening again while an earlier opening is still verifying supersedes it:
//! the earlier callback is dropped without running.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use securepool_types::{ActionKind, Clock};
use securepool_utils::lock;

use crate::method::{Verdict, VerificationMethod, VerificationRequest};
use crate::state::{GateOutcome, GateStage, VerificationAttempt};

/// How long the success stage stays up before the gate closes.
pub const DEFAULT_SUCCESS_HOLD: Duration = Duration::from_millis(1_500);

type Callback = Box<dyn FnOnce() + Send>;

/// The opening that currently owns the gate.
struct Owner {
    id: u64,
    /// Taken exactly once, when the check passes.
    on_verified: Option<Callback>,
    outcome: Option<oneshot::Sender<GateOutcome>>,
}

impl Owner {
    /// Resolve the ticket unless it already has an outcome.
    fn resolve(&mut self, outcome: GateOutcome) -> bool {
        match self.outcome.take() {
            Some(tx) => {
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }
}

/// Action released by a passed check.
struct Release {
    on_verified: Callback,
    outcome: Option<oneshot::Sender<GateOutcome>>,
}

/// State shared with the per-opening task.
struct Shared {
    stage: watch::Sender<GateStage>,
    /// `None` when closed. Every stage change happens under this lock.
    owner: Mutex<Option<Owner>>,
}

impl Shared {
    /// Enter `Success` and hand over the action, if `id` still owns the gate.
    /// An `open` or `close` that takes the lock afterwards finds the action
    /// gone and the ticket already claimed.
    fn release(&self, id: u64, stage: GateStage) -> Option<Release> {
        let mut owner = lock(&self.owner);
        let current = owner.as_mut().filter(|o| o.id == id)?;
        let on_verified = current.on_verified.take()?;
        self.stage.send_replace(stage);
        Some(Release {
            on_verified,
            outcome: current.outcome.take(),
        })
    }

    /// Park the gate in `Failed` and resolve the ticket, if `id` still owns it.
    fn fail(&self, id: u64, stage: GateStage, reason: String) -> bool {
        let mut owner = lock(&self.owner);
        let Some(current) = owner.as_mut().filter(|o| o.id == id) else {
            return false;
        };
        current.on_verified = None;
        self.stage.send_replace(stage);
        current.resolve(GateOutcome::Failed(reason));
        true
    }

    /// Close after the success hold, unless a newer opening took over.
    fn finish(&self, id: u64) {
        let mut owner = lock(&self.owner);
        if owner.as_ref().is_some_and(|o| o.id == id) {
            *owner = None;
            self.stage.send_replace(GateStage::Closed);
        }
    }
}

/// Handle to one opening of the gate.
pub struct GateTicket {
    pub attempt: u64,
    rx: oneshot::Receiver<GateOutcome>,
}

impl GateTicket {
    /// Wait for this opening to end.
    pub async fn outcome(self) -> GateOutcome {
        self.rx.await.unwrap_or(GateOutcome::Cancelled)
    }
}

pub struct ActionVerificationGate {
    method: Arc<dyn VerificationMethod>,
    success_hold: Duration,
    clock: Arc<dyn Clock>,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl ActionVerificationGate {
    pub fn new(
        method: Arc<dyn VerificationMethod>,
        success_hold: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (stage, _) = watch::channel(GateStage::Closed);
        Self {
            method,
            success_hold,
            clock,
            shared: Arc::new(Shared {
                stage,
                owner: Mutex::new(None),
            }),
            task: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn method_name(&self) -> &str {
        self.method.name()
    }

    pub fn current(&self) -> GateStage {
        self.shared.stage.borrow().clone()
    }

    /// Subscribe to stage changes.
    pub fn stage(&self) -> watch::Receiver<GateStage> {
        self.shared.stage.subscribe()
    }

    /// Start verifying for `kind`; run `on_verified` once the check passes.
    ///
    /// Must be called within a tokio runtime.
    pub fn open<F>(&self, kind: ActionKind, on_verified: F) -> GateTicket
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let attempt = VerificationAttempt {
            id,
            kind,
            started_at: self.clock.now(),
        };
        let (tx, rx) = oneshot::channel();

        let mut task = lock(&self.task);
        let previous = {
            let mut owner = lock(&self.shared.owner);
            self.shared.stage.send_replace(GateStage::Verifying {
                attempt: attempt.clone(),
            });
            owner.replace(Owner {
                id,
                on_verified: Some(Box::new(on_verified)),
                outcome: Some(tx),
            })
        };
        if let Some(previous) = task.take() {
            previous.abort();
        }
        if let Some(mut previous) = previous {
            if previous.resolve(GateOutcome::Superseded) {
                tracing::debug!(
                    attempt = id,
                    superseded = previous.id,
                    "superseding earlier verification"
                );
            }
        }
        tracing::info!(attempt = id, %kind, method = self.method.name(), "verifying identity");

        *task = Some(tokio::spawn(run_opening(
            Arc::clone(&self.shared),
            Arc::clone(&self.method),
            self.success_hold,
            attempt,
        )));

        GateTicket { attempt: id, rx }
    }

    /// Close the gate. A verification still in progress is cancelled and its
    /// action never runs.
    pub fn close(&self) {
        let task = lock(&self.task).take();
        let previous = {
            let mut owner = lock(&self.shared.owner);
            self.shared.stage.send_replace(GateStage::Closed);
            owner.take()
        };
        if let Some(task) = task {
            task.abort();
        }
        if let Some(mut previous) = previous {
            if previous.resolve(GateOutcome::Cancelled) {
                tracing::debug!(attempt = previous.id, "verification cancelled");
            }
        }
    }
}

impl Drop for ActionVerificationGate {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
    }
}

async fn run_opening(
    shared: Arc<Shared>,
    method: Arc<dyn VerificationMethod>,
    success_hold: Duration,
    attempt: VerificationAttempt,
) {
    let request = VerificationRequest {
        attempt: attempt.id,
        kind: attempt.kind,
        requested_at: attempt.started_at,
    };
    let verdict = match method.verify(&request).await {
        Ok(verdict) => verdict,
        Err(e) => Verdict::Denied(e.to_string()),
    };
    let id = attempt.id;

    match verdict {
        Verdict::Approved => {
            let Some(release) = shared.release(id, GateStage::Success { attempt }) else {
                return;
            };
            tracing::info!(attempt = id, "identity verified, releasing action");
            (release.on_verified)();
            if let Some(tx) = release.outcome {
                let _ = tx.send(GateOutcome::Proceeded);
            }

            tokio::time::sleep(success_hold).await;
            shared.finish(id);
        }
        Verdict::Denied(reason) => {
            let failed = GateStage::Failed {
                attempt,
                reason: reason.clone(),
            };
            if shared.fail(id, failed, reason.clone()) {
                tracing::warn!(attempt = id, %reason, "identity verification failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VerificationError;
    use crate::method::TimedApproval;
    use async_trait::async_trait;
    use securepool_types::SystemClock;
    use std::sync::atomic::AtomicUsize;

    struct AlwaysDeny;

    #[async_trait]
    impl VerificationMethod for AlwaysDeny {
        fn name(&self) -> &str {
            "always-deny"
        }

        async fn verify(&self, _: &VerificationRequest) -> Result<Verdict, VerificationError> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Err(VerificationError::Unavailable("credential service down".into()))
        }
    }

    fn gate(method: impl VerificationMethod + 'static) -> ActionVerificationGate {
        ActionVerificationGate::new(Arc::new(method), DEFAULT_SUCCESS_HOLD, Arc::new(SystemClock))
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn callback_runs_once_after_success_then_gate_closes() {
        let gate = gate(TimedApproval::default());
        let (count, cb) = counter();

        let ticket = gate.open(ActionKind::Staking, cb);
        assert!(matches!(gate.current(), GateStage::Verifying { .. }));

        tokio::time::sleep(Duration::from_millis(1_900)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0, "must not run before success");

        assert_eq!(ticket.outcome().await, GateOutcome::Proceeded);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(matches!(gate.current(), GateStage::Success { .. }));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(gate.current(), GateStage::Closed);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_check_parks_gate_until_closed() {
        let gate = gate(AlwaysDeny);
        let (count, cb) = counter();

        let ticket = gate.open(ActionKind::Insurance, cb);
        let outcome = ticket.outcome().await;
        assert!(matches!(outcome, GateOutcome::Failed(ref r) if r.contains("credential service down")));
        assert!(matches!(gate.current(), GateStage::Failed { .. }));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(matches!(gate.current(), GateStage::Failed { .. }));

        gate.close();
        assert_eq!(gate.current(), GateStage::Closed);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_while_verifying_cancels_action() {
        let gate = gate(TimedApproval::default());
        let (count, cb) = counter();

        let ticket = gate.open(ActionKind::Staking, cb);
        tokio::time::sleep(Duration::from_millis(500)).await;
        gate.close();

        assert_eq!(ticket.outcome().await, GateOutcome::Cancelled);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(gate.current(), GateStage::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_reopen_runs_exactly_one_action() {
        let gate = gate(TimedApproval::default());
        let (first_count, first) = counter();
        let (second_count, second) = counter();
        let (third_count, third) = counter();

        let t1 = gate.open(ActionKind::Staking, first);
        tokio::time::sleep(Duration::from_millis(100)).await;
        let t2 = gate.open(ActionKind::Staking, second);
        tokio::time::sleep(Duration::from_millis(100)).await;
        let t3 = gate.open(ActionKind::Staking, third);

        assert_eq!(t1.outcome().await, GateOutcome::Superseded);
        assert_eq!(t2.outcome().await, GateOutcome::Superseded);
        assert_eq!(t3.outcome().await, GateOutcome::Proceeded);
        tokio::time::sleep(Duration::from_secs(5)).await;

        let total = first_count.load(Ordering::SeqCst)
            + second_count.load(Ordering::SeqCst)
            + third_count.load(Ordering::SeqCst);
        assert_eq!(total, 1);
        assert_eq!(third_count.load(Ordering::SeqCst), 1);
        assert_eq!(gate.current(), GateStage::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn reopening_after_close_starts_fresh_attempt() {
        let gate = gate(TimedApproval::new(Duration::from_millis(200)));
        let (count, cb) = counter();
        let first = gate.open(ActionKind::Staking, cb);
        gate.close();
        assert_eq!(first.outcome().await, GateOutcome::Cancelled);

        let (again, cb) = counter();
        let second = gate.open(ActionKind::Staking, cb);
        assert!(second.attempt > 1);
        assert_eq!(second.outcome().await, GateOutcome::Proceeded);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(again.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_from_the_released_action_keeps_it_proceeded() {
        let gate = Arc::new(gate(TimedApproval::default()));
        let count = Arc::new(AtomicUsize::new(0));
        let ticket = {
            let inner = Arc::clone(&gate);
            let count = Arc::clone(&count);
            gate.open(ActionKind::Staking, move || {
                count.fetch_add(1, Ordering::SeqCst);
                inner.close();
            })
        };

        assert_eq!(ticket.outcome().await, GateOutcome::Proceeded);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(gate.current(), GateStage::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn reopening_from_the_released_action_runs_each_action_once() {
        let gate = Arc::new(gate(TimedApproval::default()));
        let first_count = Arc::new(AtomicUsize::new(0));
        let (second_count, second) = counter();
        let (reopened_tx, reopened_rx) = oneshot::channel();
        let first = {
            let inner = Arc::clone(&gate);
            let count = Arc::clone(&first_count);
            gate.open(ActionKind::Staking, move || {
                count.fetch_add(1, Ordering::SeqCst);
                let _ = reopened_tx.send(inner.open(ActionKind::Insurance, second));
            })
        };

        assert_eq!(first.outcome().await, GateOutcome::Proceeded);
        let reopened = reopened_rx.await.expect("second opening started");
        assert_eq!(reopened.outcome().await, GateOutcome::Proceeded);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(first_count.load(Ordering::SeqCst), 1);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
        assert_eq!(gate.current(), GateStage::Closed);
    }
}
