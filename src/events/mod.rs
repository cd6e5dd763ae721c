use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::tracing::{info, warn};

/// Domain events emitted after a transaction commits.
///
/// Events are advisory. A failed send never rolls back the write that
/// produced it; callers log the failure and move on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    MovementRecorded {
        movement_id: Uuid,
        product_id: i64,
        from_location: Option<i64>,
        to_location: Option<i64>,
        quantity: i32,
        reason: String,
        ts: DateTime<Utc>,
    },
    StocktakeStarted {
        session_id: Uuid,
        location_id: i64,
    },
    StocktakeCompleted {
        session_id: Uuid,
        location_id: i64,
        applied: bool,
        total_lines: u64,
        matched_lines: u64,
    },
}

/// Cloneable handle for publishing events onto the process-wide channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Consumes events from the channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        info!("Received event: {:?}", event);
        let result = match event {
            Event::MovementRecorded {
                movement_id,
                product_id,
                from_location,
                to_location,
                quantity,
                reason,
                ts,
            } => {
                handle_movement_recorded(
                    movement_id,
                    product_id,
                    from_location,
                    to_location,
                    quantity,
                    &reason,
                    ts,
                )
                .await
            }
            Event::StocktakeStarted {
                session_id,
                location_id,
            } => handle_stocktake_started(session_id, location_id).await,
            Event::StocktakeCompleted {
                session_id,
                location_id,
                applied,
                total_lines,
                matched_lines,
            } => {
                handle_stocktake_completed(session_id, location_id, applied, total_lines, matched_lines)
                    .await
            }
        };

        if let Err(e) = result {
            warn!("Event handling failed: {}", e);
        }
    }
}

async fn handle_movement_recorded(
    movement_id: Uuid,
    product_id: i64,
    from_location: Option<i64>,
    to_location: Option<i64>,
    quantity: i32,
    reason: &str,
    ts: DateTime<Utc>,
) -> Result<(), String> {
    info!(
        "Movement {} recorded: product {} qty {} from {:?} to {:?} reason {} at {}",
        movement_id, product_id, quantity, from_location, to_location, reason, ts
    );
    counter!("ledger_movements.recorded", 1);
    Ok(())
}

async fn handle_stocktake_started(session_id: Uuid, location_id: i64) -> Result<(), String> {
    info!(
        "Stocktake session {} started at location {}",
        session_id, location_id
    );
    counter!("ledger_stocktakes.started", 1);
    Ok(())
}

async fn handle_stocktake_completed(
    session_id: Uuid,
    location_id: i64,
    applied: bool,
    total_lines: u64,
    matched_lines: u64,
) -> Result<(), String> {
    info!(
        "Stocktake session {} completed at location {}: applied={} lines={} matched={}",
        session_id, location_id, applied, total_lines, matched_lines
    );
    if matched_lines < total_lines {
        warn!(
            "Stocktake session {} found {} discrepant lines",
            session_id,
            total_lines - matched_lines
        );
    }
    counter!("ledger_stocktakes.completed", 1);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_event_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);

        sender
            .send(Event::StocktakeStarted {
                session_id: Uuid::new_v4(),
                location_id: 7,
            })
            .await
            .unwrap();

        match rx.recv().await {
            Some(Event::StocktakeStarted { location_id, .. }) => assert_eq!(location_id, 7),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_reports_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        let result = sender
            .send(Event::StocktakeStarted {
                session_id: Uuid::new_v4(),
                location_id: 1,
            })
            .await;
        assert!(result.is_err());
    }
}
