use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use super::completion::CheckoutCompletion;
use crate::clients::OrderServiceApi;

/// What the PayMe page shows while waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Waiting for the merchant to confirm the transfer.
    Polling { checks: u32 },
    Paid,
    /// Cancelled before payment was seen.
    Stopped,
}

/// Polls `GET /orders/payme/status/{orderNumber}` until the order is paid.
#[derive(Clone)]
pub struct PaymePoller {
    order_service: Arc<dyn OrderServiceApi>,
    completion: Arc<CheckoutCompletion>,
    interval: Duration,
    success_delay: Duration,
}

impl PaymePoller {
    pub fn new(
        order_service: Arc<dyn OrderServiceApi>,
        completion: Arc<CheckoutCompletion>,
        interval: Duration,
        success_delay: Duration,
    ) -> Self {
        Self {
            order_service,
            completion,
            interval,
            success_delay,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Starts polling immediately. The returned handle owns the task;
    /// dropping it stops polling.
    pub fn spawn(&self, order_number: impl Into<String>, email: impl Into<String>) -> PollerHandle {
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (state_tx, state_rx) = watch::channel(PollerState::Polling { checks: 0 });

        let poller = self.clone();
        let task = tokio::spawn(poller.run(
            order_number.into(),
            email.into(),
            refresh_rx,
            shutdown_rx,
            state_tx,
        ));

        PollerHandle {
            refresh_tx,
            shutdown_tx: Some(shutdown_tx),
            state_rx,
            task,
        }
    }

    #[instrument(skip(self, email, refresh_rx, shutdown_rx, state_tx))]
    async fn run(
        self,
        order_number: String,
        email: String,
        mut refresh_rx: mpsc::Receiver<()>,
        mut shutdown_rx: oneshot::Receiver<()>,
        state_tx: watch::Sender<PollerState>,
    ) -> PollerState {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut checks: u32 = 0;

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    debug!("PayMe polling cancelled");
                    let _ = state_tx.send(PollerState::Stopped);
                    return PollerState::Stopped;
                }
                _ = ticker.tick() => {}
                Some(()) = refresh_rx.recv() => {
                    debug!("Manual PayMe status refresh");
                }
            }

            checks = checks.saturating_add(1);
            counter!("checkout.payme.polls", 1);
            match self.order_service.payme_status(&order_number).await {
                Ok(status) if status.payment_status.is_paid() => {
                    counter!("checkout.payme.paid", 1);
                    info!(checks, "PayMe transfer confirmed");
                    let _ = state_tx.send(PollerState::Paid);
                    self.completion
                        .complete(&order_number, &email, self.success_delay);
                    return PollerState::Paid;
                }
                Ok(status) => {
                    debug!(checks, payment_status = %status.payment_status, "PayMe not paid yet");
                }
                Err(err) => {
                    warn!(checks, error = %err, "PayMe status check failed, retrying next tick");
                }
            }
            let _ = state_tx.send(PollerState::Polling { checks });
        }
    }
}

/// Owner of a running poll loop.
#[derive(Debug)]
pub struct PollerHandle {
    refresh_tx: mpsc::Sender<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    state_rx: watch::Receiver<PollerState>,
    task: JoinHandle<PollerState>,
}

impl PollerHandle {
    /// Runs one extra check now. The interval schedule is left alone, and a
    /// refresh already queued absorbs this one.
    pub fn refresh_now(&self) {
        let _ = self.refresh_tx.try_send(());
    }

    pub fn state(&self) -> PollerState {
        *self.state_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollerState> {
        self.state_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops polling between checks and waits for the loop to exit.
    pub async fn cancel(mut self) -> PollerState {
        if let Some(shutdown) = self.shutdown_tx.take() {
            let _ = shutdown.send(());
        }
        self.join().await
    }

    /// Waits until the order is paid or polling is cancelled elsewhere.
    pub async fn wait(mut self) -> PollerState {
        self.join().await
    }

    async fn join(&mut self) -> PollerState {
        match (&mut self.task).await {
            Ok(state) => state,
            Err(_) => PollerState::Stopped,
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
