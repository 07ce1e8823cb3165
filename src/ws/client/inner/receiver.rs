use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::ws::transport::{Callbacks, TransportHandle};

/// Reissue single shot reads until a fatal error, every result goes to the driver.
pub(super) async fn receive_loop<H: TransportHandle>(
    handle: Arc<H>,
    callbacks: Callbacks,
    shutdown: CancellationToken,
) {
    log::debug!("Receive loop start");

    loop {
        let result = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                log::debug!("Client dropped, stop receive loop");
                break;
            }
            result = handle.receive() => result,
        };
        let fatal = matches!(result, Err(ref err) if err.is_fatal());

        if !callbacks.on_receive(result) {
            log::debug!("Client stopped listening, stop");
            break;
        }

        if fatal {
            log::debug!("Receive loop got fatal error, stop");
            break;
        }
    }
}
