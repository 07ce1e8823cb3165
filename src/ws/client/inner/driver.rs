use std::sync::Arc;

use tokio::sync::mpsc;

use super::Shared;
use crate::ws::transport::{TransportEvent, TransportHandle};

/// Hand transport callbacks off into the client's serialized context, one at a time.
pub(crate) async fn drive<H: TransportHandle>(
    shared: Arc<Shared<H>>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    log::debug!("Transport event driver start");

    loop {
        let event = tokio::select! {
            biased;

            _ = shared.shutdown.cancelled() => {
                log::debug!("Client dropped, stop driver");
                break;
            }
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let mut inner = shared.inner.lock().await;

        let ended = match event {
            TransportEvent::Open { protocol } => {
                shared.opened(&mut inner, protocol);
                false
            }
            TransportEvent::Received(result) => shared.received(&mut inner, result),
            TransportEvent::Close { code, reason } => shared.closed(&mut inner, code, reason),
            TransportEvent::Error(err) => shared.failed(&mut inner, err),
        };

        if ended {
            inner.driver.take();
            break;
        }
    }

    log::debug!("Transport event driver stop");
}
