use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the bus is gone.
    pub async fn send_or_log(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            warn!(event = name, error = %e, "event dropped");
        }
    }
}

/// Domain events published by the services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    WarehouseCreated {
        warehouse_id: Uuid,
        code: String,
    },
    BomCreated {
        bom_id: Uuid,
        bom_number: String,
    },
    ProductionOrderCreated {
        order_id: Uuid,
        order_number: String,
    },
    ProductionOrderStatusChanged {
        order_id: Uuid,
        from: String,
        to: String,
    },
    StockTransferPosted {
        transfer_id: Uuid,
        transfer_number: String,
        production_order_id: Option<Uuid>,
        line_count: usize,
    },
    GoodsReceived {
        grn_id: Uuid,
        purchase_order_id: Uuid,
        accepted_quantity: Decimal,
    },
    DocumentCreated {
        document_id: Uuid,
        kind: String,
        document_number: String,
    },
    DocumentStatusChanged {
        document_id: Uuid,
        from: String,
        to: String,
    },
    DocumentConverted {
        source_id: Uuid,
        target_id: Uuid,
        target_number: String,
    },
    TicketCreated {
        ticket_id: Uuid,
        ticket_number: String,
        source: String,
    },
    TicketReplied {
        ticket_id: Uuid,
        message_id: String,
        delivered: bool,
    },
    TicketReopened {
        ticket_id: Uuid,
        ticket_number: String,
        reopened_count: i32,
    },
    TicketStatusChanged {
        ticket_id: Uuid,
        from: String,
        to: String,
    },
    TicketAssigned {
        ticket_id: Uuid,
        operator_id: Uuid,
        automatic: bool,
    },
    TaskCompleted {
        task_id: Uuid,
        completed_at: DateTime<Utc>,
    },
    AttendanceRecorded {
        operator_id: Uuid,
        work_date: chrono::NaiveDate,
        checked_out: bool,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::WarehouseCreated { .. } => "warehouse_created",
            Event::BomCreated { .. } => "bom_created",
            Event::ProductionOrderCreated { .. } => "production_order_created",
            Event::ProductionOrderStatusChanged { .. } => "production_order_status_changed",
            Event::StockTransferPosted { .. } => "stock_transfer_posted",
            Event::GoodsReceived { .. } => "goods_received",
            Event::DocumentCreated { .. } => "document_created",
            Event::DocumentStatusChanged { .. } => "document_status_changed",
            Event::DocumentConverted { .. } => "document_converted",
            Event::TicketCreated { .. } => "ticket_created",
            Event::TicketReplied { .. } => "ticket_replied",
            Event::TicketReopened { .. } => "ticket_reopened",
            Event::TicketStatusChanged { .. } => "ticket_status_changed",
            Event::TicketAssigned { .. } => "ticket_assigned",
            Event::TaskCompleted { .. } => "task_completed",
            Event::AttendanceRecorded { .. } => "attendance_recorded",
        }
    }
}

/// Drains the event bus, logging and counting every event by name.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        metrics::counter!("erp.events.processed", 1, "event" => event.name());
        match &event {
            Event::TicketReopened {
                ticket_id,
                ticket_number,
                reopened_count,
            } => {
                info!(
                    %ticket_id,
                    ticket_number = %ticket_number,
                    reopened_count,
                    "ticket reopened"
                );
            }
            Event::StockTransferPosted {
                transfer_number,
                line_count,
                ..
            } => {
                info!(transfer_number = %transfer_number, line_count, "stock transfer posted");
            }
            other => {
                let payload = serde_json::to_string(other).unwrap_or_default();
                info!(event = other.name(), payload = %payload, "event received");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_or_log_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let id = Uuid::new_v4();

        sender
            .send_or_log(Event::WarehouseCreated {
                warehouse_id: id,
                code: "MAIN".into(),
            })
            .await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.name(), "warehouse_created");
    }

    #[tokio::test]
    async fn send_fails_once_receiver_is_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        let result = sender
            .send(Event::BomCreated {
                bom_id: Uuid::new_v4(),
                bom_number: "BOM-1".into(),
            })
            .await;
        assert!(result.is_err());
        // must not panic
        sender
            .send_or_log(Event::BomCreated {
                bom_id: Uuid::new_v4(),
                bom_number: "BOM-2".into(),
            })
            .await;
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let value = serde_json::to_value(Event::TicketReopened {
            ticket_id: Uuid::nil(),
            ticket_number: "TKT-0000ABCD".into(),
            reopened_count: 2,
        })
        .unwrap();
        assert_eq!(value["type"], "ticket_reopened");
        assert_eq!(value["reopened_count"], 2);
    }
}
