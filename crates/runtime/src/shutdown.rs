use std::{
    future::Future,
    io,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use futures::FutureExt;
use tokio::{
    signal::unix::{Signal, SignalKind},
    time::Sleep,
};
use tracing::{debug, warn};

/// A `ShutdownSignal` resolves when the run should stop issuing new work.
///
/// It listens for SIGINT and SIGTERM and, if configured, an overall run deadline. Work that was
/// already started is left to finish; the signal only tells the caller not to start more.
pub struct ShutdownSignal {
    /// A future that resolves when a SIGINT signal is received.
    ctrl_c: Pin<Box<dyn Future<Output = io::Result<()>> + Send>>,
    /// A future that resolves when a SIGTERM signal is received.
    term_signal: Signal,
    /// Optional deadline for the whole run.
    deadline: Option<Pin<Box<Sleep>>>,
}

impl std::fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("has_deadline", &self.deadline.is_some())
            .finish_non_exhaustive()
    }
}

impl ShutdownSignal {
    /// Creates a new `ShutdownSignal` listening for SIGINT and SIGTERM.
    pub fn new() -> io::Result<Self> {
        let ctrl_c = Box::pin(tokio::signal::ctrl_c());
        let term_signal = tokio::signal::unix::signal(SignalKind::terminate())?;

        Ok(Self { ctrl_c, term_signal, deadline: None })
    }

    /// Also resolve once `after` has elapsed from now.
    pub fn with_deadline(mut self, after: Duration) -> Self {
        self.deadline = Some(Box::pin(tokio::time::sleep(after)));
        self
    }

    /// Like [`Self::with_deadline`], leaving the signal untouched when `after` is `None`.
    pub fn with_optional_deadline(self, after: Option<Duration>) -> Self {
        match after {
            Some(after) => self.with_deadline(after),
            None => self,
        }
    }
}

impl Future for ShutdownSignal {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.ctrl_c.poll_unpin(cx).is_ready() {
            debug!("Received SIGINT signal");
            return Poll::Ready(());
        }

        if this.term_signal.poll_recv(cx).is_ready() {
            debug!("Received SIGTERM signal");
            return Poll::Ready(());
        }

        if let Some(deadline) = this.deadline.as_mut() {
            if deadline.as_mut().poll(cx).is_ready() {
                warn!("Run deadline elapsed");
                return Poll::Ready(());
            }
        }

        Poll::Pending
    }
}
