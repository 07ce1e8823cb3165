use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ws::{
    transport::{Callbacks, TransportHandle},
    Frame,
};

/// Periodic keepalive sender of one connected period.
///
/// Stopped when `token` or [`cancel`](Self::cancel) is cancelled, aborted when dropped.
pub(crate) struct Heartbeat {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Heartbeat {
    pub fn start<H: TransportHandle>(
        handle: Arc<H>,
        callbacks: Callbacks,
        interval: Duration,
        payload: Frame,
        token: CancellationToken,
    ) -> Self {
        let task = tokio::spawn(Self::run(
            handle,
            callbacks,
            interval,
            payload,
            token.clone(),
        ));

        Self { token, task }
    }

    async fn run<H: TransportHandle>(
        handle: Arc<H>,
        callbacks: Callbacks,
        interval: Duration,
        payload: Frame,
        token: CancellationToken,
    ) {
        log::debug!("Heartbeat start, interval {:?}", interval);

        loop {
            if token.is_cancelled() {
                break;
            }

            log::trace!("Send heartbeat {} frame", payload.type_name());

            if let Err(err) = handle.send(payload.clone()).await {
                if token.is_cancelled() {
                    // connection is closing, the close path reports the end
                    log::debug!("Heartbeat send failed after cancelled: {}", err);
                    break;
                }
                if err.is_fatal() {
                    log::debug!("Heartbeat find connection broken when send: {}", err);
                    callbacks.on_complete_with_error(err);
                    break;
                }
                log::warn!("Send heartbeat failed but ignored: {}", err);
            }

            tokio::select! {
                biased;

                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        log::debug!("Heartbeat stop");
    }

    /// Stop sending, can be called many times.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.cancel();
        self.task.abort();
    }
}
