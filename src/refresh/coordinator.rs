use super::refresher::TokenRefresher;
use crate::error::ApiError;
use crate::redact::redact_secrets;
use crate::state::SessionStore;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    InFlight,
    Succeeded,
    Failed,
}

/// What a waiter learns once the refresh it joined resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    LoggedOut,
}

enum Command {
    Refresh(oneshot::Sender<RefreshOutcome>),
    Logout(oneshot::Sender<()>),
}

enum Resolution {
    Token(String),
    Failed(String),
    Forced,
}

/// Handle to the task that owns refresh state and performs every session write.
///
/// Callers that detect an expired session join the refresh in progress, or start one
/// when none is running. One refresh call is issued per cycle however many callers join.
#[derive(Clone)]
pub struct RefreshCoordinator {
    tx: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<RefreshState>,
    session: Arc<dyn SessionStore>,
}

impl RefreshCoordinator {
    /// Spawns the coordinator task on the current tokio runtime.
    ///
    /// Fails with [`ApiError::CoordinatorUnavailable`] outside a runtime.
    pub fn spawn(
        refresher: Arc<dyn TokenRefresher>,
        session: Arc<dyn SessionStore>,
    ) -> Result<Self, ApiError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ApiError::CoordinatorUnavailable)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(RefreshState::Idle);
        runtime.spawn(run_refresh_loop(refresher, session.clone(), rx, state_tx));
        Ok(Self {
            tx,
            state: state_rx,
            session,
        })
    }

    /// Waits for the current refresh cycle, starting one if the coordinator is idle.
    pub async fn await_refresh(&self) -> Result<RefreshOutcome, ApiError> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::Refresh(tx)).is_err() {
            return Err(ApiError::CoordinatorUnavailable);
        }
        rx.await.map_err(|_| ApiError::CoordinatorUnavailable)
    }

    /// Logs out without attempting a refresh.
    ///
    /// A refresh in flight is abandoned: its waiters are released as logged out and its
    /// token, if one arrives, is never stored.
    pub async fn force_logout(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::Logout(tx)).is_ok() && rx.await.is_ok() {
            return;
        }
        // Loop is gone, so nothing else can write the session.
        self.session.logout().await;
    }

    pub fn state(&self) -> RefreshState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RefreshState> {
        self.state.clone()
    }
}

async fn run_refresh_loop(
    refresher: Arc<dyn TokenRefresher>,
    session: Arc<dyn SessionStore>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<RefreshState>,
) {
    while let Some(command) = rx.recv().await {
        let first = match command {
            Command::Refresh(respond_to) => respond_to,
            Command::Logout(done) => {
                tracing::info!("forced logout");
                session.logout().await;
                let _ = done.send(());
                continue;
            }
        };

        let mut waiters = vec![first];
        let mut forced = Vec::new();
        state.send_replace(RefreshState::InFlight);
        tracing::info!("session expired; refreshing access token");

        // A panicking refresher fails this cycle instead of taking the loop down.
        let mut refresh = {
            let refresher = refresher.clone();
            tokio::spawn(async move { refresher.refresh().await })
        };
        let mut resolution = loop {
            tokio::select! {
              biased;
              Some(command) = rx.recv() => match command {
                Command::Refresh(respond_to) => waiters.push(respond_to),
                Command::Logout(done) => {
                  forced.push(done);
                  refresh.abort();
                  break Resolution::Forced;
                }
              },
              joined = &mut refresh => break match joined {
                Ok(Ok(token)) => Resolution::Token(token),
                Ok(Err(e)) => Resolution::Failed(e.to_string()),
                Err(e) => Resolution::Failed(format!("refresh task failed: {e}")),
              },
            }
        };
        // Commands queued before the result was observed still belong to this cycle.
        while let Ok(command) = rx.try_recv() {
            match command {
                Command::Refresh(respond_to) => waiters.push(respond_to),
                Command::Logout(done) => {
                    forced.push(done);
                    resolution = Resolution::Forced;
                }
            }
        }

        let outcome = match resolution {
            Resolution::Token(token) => {
                session.set_access_token(token).await;
                state.send_replace(RefreshState::Succeeded);
                tracing::info!(waiters = waiters.len(), "access token refreshed");
                RefreshOutcome::Refreshed
            }
            Resolution::Failed(error) => {
                tracing::warn!(
                    error = %redact_secrets(&error),
                    waiters = waiters.len(),
                    "token refresh failed; logging out"
                );
                session.logout().await;
                state.send_replace(RefreshState::Failed);
                RefreshOutcome::LoggedOut
            }
            Resolution::Forced => {
                tracing::info!(waiters = waiters.len(), "forced logout during refresh");
                session.logout().await;
                state.send_replace(RefreshState::Failed);
                RefreshOutcome::LoggedOut
            }
        };

        for waiter in waiters {
            let _ = waiter.send(outcome);
        }
        for done in forced {
            let _ = done.send(());
        }
        state.send_replace(RefreshState::Idle);
    }
    tracing::debug!("refresh coordinator stopped");
}
