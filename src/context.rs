//! Execution context threaded through every gateway and service call.
//!
//! An [`OpContext`] carries three things: a cancellation signal, an optional
//! deadline and the tracing span that every event of the call is recorded under.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info_span, Span};
use uuid::Uuid;

use crate::error::{CancelCause, StoreError};

#[derive(Debug, Clone)]
pub struct OpContext {
    cancel: watch::Receiver<bool>,
    deadline: Option<Instant>,
    span: Span,
}

/// Owner side of a cancellable [`OpContext`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl OpContext {
    /// A context that is never canceled and has no deadline.
    pub fn background() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self::from_receiver(rx)
    }

    pub fn cancellable() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (Self::from_receiver(rx), CancelHandle { tx })
    }

    fn from_receiver(cancel: watch::Receiver<bool>) -> Self {
        let request_id = Uuid::new_v4();
        Self {
            cancel,
            deadline: None,
            span: info_span!("op", %request_id),
        }
    }

    /// Tighten the deadline to `timeout` from now. An earlier deadline wins.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        });
        self
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the cancellation cause if the context is already done.
    pub fn check(&self) -> Result<(), StoreError> {
        if *self.cancel.borrow() {
            return Err(StoreError::Canceled(CancelCause::Canceled));
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Err(StoreError::Canceled(CancelCause::DeadlineExceeded))
            }
            _ => Ok(()),
        }
    }

    /// Drive `fut` until it finishes or the context is done, whichever comes
    /// first. Cancellation is polled before the future, so an already canceled
    /// context never starts the work.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::select! {
            biased;
            _ = wait_canceled(self.cancel.clone()) => {
                Err(StoreError::Canceled(CancelCause::Canceled))
            }
            _ = wait_deadline(self.deadline) => {
                Err(StoreError::Canceled(CancelCause::DeadlineExceeded))
            }
            res = fut => res,
        }
    }
}

async fn wait_canceled(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        // A dropped sender can never cancel.
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
