//! One-shot "wallet connected" notice shown after a successful connect.
//!
//! `Hidden → Confirming → Confirmed → Hidden`, each step after a fixed delay.
//! Showing it again while it is up restarts the sequence.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use securepool_utils::lock;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStage {
    #[default]
    Hidden,
    /// "Connecting to wallet..." spinner.
    Confirming,
    /// "Successfully connected".
    Confirmed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfirmationTimings {
    /// How long the confirming stage is shown.
    pub confirm: Duration,
    /// How long the confirmed stage is shown before dismissal.
    pub dismiss: Duration,
}

impl Default for ConfirmationTimings {
    fn default() -> Self {
        Self {
            confirm: Duration::from_secs(2),
            dismiss: Duration::from_secs(2),
        }
    }
}

pub struct ConfirmationNotice {
    stage: Arc<watch::Sender<ConfirmationStage>>,
    timings: ConfirmationTimings,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConfirmationNotice {
    pub fn new(timings: ConfirmationTimings) -> Self {
        let (tx, _) = watch::channel(ConfirmationStage::Hidden);
        Self {
            stage: Arc::new(tx),
            timings,
            task: Mutex::new(None),
        }
    }

    /// Start (or restart) the notice sequence. Must be called within a tokio runtime.
    pub fn show(&self) {
        let mut task = lock(&self.task);
        if let Some(previous) = task.take() {
            previous.abort();
        }
        self.stage.send_replace(ConfirmationStage::Confirming);

        let stage = Arc::clone(&self.stage);
        let timings = self.timings;
        *task = Some(tokio::spawn(async move {
            tokio::time::sleep(timings.confirm).await;
            stage.send_replace(ConfirmationStage::Confirmed);
            tokio::time::sleep(timings.dismiss).await;
            stage.send_replace(ConfirmationStage::Hidden);
        }));
    }

    /// Hide immediately and cancel any pending step.
    pub fn dismiss(&self) {
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
        self.stage.send_replace(ConfirmationStage::Hidden);
    }

    pub fn current(&self) -> ConfirmationStage {
        *self.stage.borrow()
    }

    /// Subscribe to stage changes.
    pub fn subscribe(&self) -> watch::Receiver<ConfirmationStage> {
        self.stage.subscribe()
    }
}

impl Default for ConfirmationNotice {
    fn default() -> Self {
        Self::new(ConfirmationTimings::default())
    }
}

impl Drop for ConfirmationNotice {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
    }
}
