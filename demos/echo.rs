use std::time::Duration;

use futures_util::StreamExt;
use sockline::ws::{
    transport::{tungstenite::TungsteniteTransport, Target},
    CloseCode, FixedTarget, HeartbeatConfig, ReconnectingClient, StateEvent,
};

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let url = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ECHO_URL").ok())
        .unwrap_or_else(|| {
            println!("Usage: echo <ws url>, or set ECHO_URL env var");
            std::process::exit(1);
        });

    let target = match url.parse::<Target>() {
        Ok(target) => target,
        Err(err) => {
            println!("Invalid url {}: {}", url, err);
            std::process::exit(1);
        }
    };

    let mut client = ReconnectingClient::with_heartbeat(
        TungsteniteTransport::default(),
        FixedTarget(target),
        HeartbeatConfig::every(Duration::from_secs(5), "ping"),
    );
    let mut messages = client.messages().unwrap();
    let mut events = client.state_events().unwrap();

    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            log::info!("State event: {:?}", event);
            if matches!(event, StateEvent::Disconnected { .. }) {
                log::info!("Connection ended");
            }
        }
    });

    for round in 1..=2 {
        client.connect().await.unwrap();

        for i in 0..3 {
            client
                .send_text(format!("round {} message {}", round, i))
                .await
                .unwrap();
            match messages.next().await {
                Some(Ok(message)) => println!("Received: {:?}", message),
                Some(Err(err)) => println!("Connection broken: {}", err),
                None => break,
            }
        }

        client
            .disconnect_with(CloseCode::GoingAway, Some("See you later".to_string()))
            .await
            .unwrap();
    }
}
