//! WebSocket handler for live measurement push
//!
//! Clients connect to /ws (or /api/ws). They first receive the buffered
//! measurements as `{"measuredStorage": [...]}`, then one JSON measurement
//! per sample generated by later polls. A sample generated while the
//! snapshot is being taken is delivered once, in the snapshot.

use crate::api::MeasurementsResponse;
use crate::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashSet;
use telemsim_core::Measurement;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Handle an individual WebSocket connection
async fn handle_ws(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Subscribe before the snapshot so nothing generated in between is missed
    let mut rx = state.ws_tx.subscribe();

    let mut filter = match state.engine.snapshot().await {
        Ok(measurements) => {
            let filter = SnapshotFilter::new(&measurements);
            let response = MeasurementsResponse {
                measured_storage: measurements,
            };
            if let Ok(json) = serde_json::to_string(&response) {
                let _ = ws_sender.send(Message::Text(json.into())).await;
            }
            filter
        }
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket snapshot failed");
            return;
        }
    };

    // Forward broadcast measurements to this client
    let mut send_task = tokio::spawn(async move {
        while let Ok(measurement) = rx.recv().await {
            if !filter.admit(measurement.id) {
                continue;
            }
            let json = match serde_json::to_string(&measurement) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to serialize measurement");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Drain incoming messages (pings, close)
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    tracing::debug!("WebSocket client disconnected");
}

/// Drops pushes already delivered in the connect snapshot
///
/// Only measurements queued before the snapshot can repeat, and they arrive
/// first, so filtering stops at the first id not in the snapshot.
#[derive(Debug)]
struct SnapshotFilter {
    sent: HashSet<u64>,
}

impl SnapshotFilter {
    fn new(snapshot: &[Measurement]) -> Self {
        Self {
            sent: snapshot.iter().map(|m| m.id).collect(),
        }
    }

    fn admit(&mut self, id: u64) -> bool {
        if self.sent.is_empty() {
            return true;
        }
        if self.sent.contains(&id) {
            return false;
        }
        self.sent.clear();
        true
    }
}

/// Broadcast a newly generated measurement to all connected clients
pub fn broadcast_measurement(state: &AppState, measurement: &Measurement) -> usize {
    if state.ws_tx.receiver_count() == 0 {
        return 0;
    }
    state.ws_tx.send(measurement.clone()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn measurement(id: u64) -> Measurement {
        Measurement {
            id,
            timestamp: Utc::now(),
            measured_values: Vec::new(),
        }
    }

    #[test]
    fn test_snapshot_filter_skips_repeats() {
        let snapshot = [measurement(4), measurement(5), measurement(6)];
        let mut filter = SnapshotFilter::new(&snapshot);

        // Generated between subscribe and snapshot
        assert!(!filter.admit(5));
        assert!(!filter.admit(6));
        assert!(filter.admit(7));
    }

    #[test]
    fn test_snapshot_filter_stops_after_first_new_id() {
        let snapshot = [measurement(0), measurement(1)];
        let mut filter = SnapshotFilter::new(&snapshot);
        assert!(filter.admit(2));

        // Ids restart after a clear and must not be mistaken for repeats
        assert!(filter.admit(0));
        assert!(filter.admit(1));
    }

    #[test]
    fn test_empty_snapshot_admits_everything() {
        let mut filter = SnapshotFilter::new(&[]);
        assert!(filter.admit(0));
        assert!(filter.admit(0));
    }
}
