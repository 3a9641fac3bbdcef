//! WebSocket push channel.
//!
//! A connected browser session subscribes to the catalog event bus and
//! receives product-affecting events as tagged JSON envelopes:
//! `{ "event-type": <tag>, "data": <payload> }`. Inbound frames are drained
//! only to detect the client closing; write errors end the session. The
//! session unsubscribes on every exit path so the bus never retains it.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::oneshot;
use tracing::{debug, error};

use catalog_events::{Event, EventBus};
use catalog_types::{ProductRepository, RateProvider};

use super::handlers::AppState;

/// `GET /ws` - upgrades the connection and runs the push session.
pub async fn ws_handler<R: ProductRepository, P: RateProvider>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<R, P>>>,
) -> Response {
    let bus = Arc::clone(&state.bus);
    ws.on_upgrade(move |socket| handle_socket(socket, bus))
}

async fn handle_socket(socket: WebSocket, bus: Arc<EventBus<Event>>) {
    let (mut sender, mut receiver) = socket.split();

    let mut subscription = bus.subscribe();
    let subscriber_id = subscription.id();

    // Reader task: consume (and discard) inbound frames purely to notice
    // the client going away.
    let (done_tx, mut done_rx) = oneshot::channel::<()>();
    let reader = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
        let _ = done_tx.send(());
    });

    loop {
        tokio::select! {
            _ = &mut done_rx => {
                debug!("WebSocket connection closed by the client");
                break;
            }
            event = subscription.recv() => match event {
                Some(event) => {
                    let Some(message) = envelope(&event) else {
                        continue;
                    };
                    if let Err(err) = sender.send(message).await {
                        error!(error = %err, "Error writing to WebSocket");
                        break;
                    }
                }
                // Bus shut down underneath us.
                None => break,
            }
        }
    }

    bus.unsubscribe(subscriber_id);
    reader.abort();
}

/// Maps a bus event to its client-facing envelope.
///
/// Events that are not meant for browsers (rate changes are internal
/// plumbing) yield `None` and are skipped.
fn envelope(event: &Event) -> Option<Message> {
    let (tag, data) = match event {
        Event::PriceUpdate(e) => ("price_update", serde_json::to_value(e)),
        Event::ProductAdded(e) => ("product_added", serde_json::to_value(e)),
        Event::ProductUpdated(e) => ("product_updated", serde_json::to_value(e)),
        Event::ProductDeleted(e) => ("product_deleted", serde_json::to_value(e)),
        Event::RateChanged(_) => {
            debug!("Skipping internal event kind on push channel");
            return None;
        }
    };

    let data = match data {
        Ok(data) => data,
        Err(err) => {
            error!(error = %err, "Error serialising push event");
            return None;
        }
    };

    let payload = serde_json::json!({
        "event-type": tag,
        "data": data,
    });
    Some(Message::Text(payload.to_string().into()))
}
