//! One WebSocket connection bound to one conversation session.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use concierge_core::events::SessionEvent;
use concierge_engine::{EventSink, SessionCoordinator};

use crate::server::AppState;
use crate::wire::{self, Inbound};

/// Feed inbox messages to the coordinator one at a time until the inbox
/// closes or the session is cancelled.
pub async fn run_session(mut coordinator: SessionCoordinator, mut inbox: mpsc::Receiver<String>) {
    let cancel = coordinator.handle().cancel_token().clone();
    coordinator.open();
    loop {
        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            text = inbox.recv() => match text {
                Some(text) => text,
                None => break,
            },
        };
        coordinator.handle_message(&text).await;
    }
    coordinator.close();
    tracing::debug!(session_id = %coordinator.handle().session_id(), "session worker stopped");
}

fn pong() -> SessionEvent {
    SessionEvent::Pong {
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

pub async fn handle_ws_connection(socket: WebSocket, state: AppState) {
    let (client_id, mut rx) = state.clients.register();
    let Some(sink) = state.clients.sink(&client_id) else {
        return;
    };
    let handle = state.sessions.create(client_id.clone());
    let session_id = handle.session_id().clone();
    tracing::info!(client_id = %client_id, session_id = %session_id, "WebSocket client connected");

    let cancel = handle.cancel_token().clone();
    let activity = Arc::clone(&handle);
    let (inbox_tx, inbox_rx) = mpsc::channel::<String>(state.config.inbox_capacity.max(1));
    let coordinator = SessionCoordinator::new(
        state.services.clone(),
        handle,
        Arc::new(sink.clone()) as Arc<dyn EventSink>,
    );
    let worker = tokio::spawn(run_session(coordinator, inbox_rx));

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer task: forward queued frames, close on expiry, periodic ping.
    let writer_cancel = cancel.clone();
    let writer_cid = client_id.clone();
    let heartbeat = state.config.heartbeat_interval;
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat);
        ping_interval.tick().await;

        loop {
            tokio::select! {
                biased;
                msg = rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = writer_cancel.cancelled() => {
                    if let Ok(frame) = serde_json::to_string(&SessionEvent::status("expired")) {
                        let _ = ws_tx.send(WsMessage::Text(frame.into())).await;
                    }
                    let _ = ws_tx.send(WsMessage::Close(None)).await;
                    break;
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(axum::body::Bytes::new())).await.is_err() {
                        break;
                    }
                    tracing::trace!(client_id = %writer_cid, "Sent ping");
                }
            }
        }
    });

    // Reader task: decode frames into the session inbox.
    let reader_cid = client_id.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => match wire::parse_frame(text.as_str()) {
                    Ok(Inbound::UserMessage { text }) => {
                        // Queued work counts as activity until the worker picks it up.
                        activity.touch();
                        if inbox_tx.send(text).await.is_err() {
                            break;
                        }
                    }
                    Ok(Inbound::Ping) => {
                        sink.emit(pong());
                    }
                    Err(e) => {
                        tracing::debug!(client_id = %reader_cid, error = %e, "Invalid frame");
                        sink.emit(SessionEvent::status("invalid_frame"));
                    }
                },
                WsMessage::Close(_) => break,
                // axum answers pings itself
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => {},
        _ = &mut reader => {},
    }
    writer.abort();
    reader.abort();

    state.sessions.remove(&session_id);
    state.clients.unregister(&client_id);
    let _ = worker.await;
    tracing::info!(client_id = %client_id, session_id = %session_id, "WebSocket client disconnected");
}

/// Periodically expire idle sessions. Expiry cancels the session, which
/// makes its connection send `expired` and close.
pub fn start_reaper(state: AppState, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let expired = state.sessions.expire_idle(tokio::time::Instant::now());
            for handle in &expired {
                tracing::info!(
                    session_id = %handle.session_id(),
                    client_id = %handle.client_id(),
                    "Idle session expired"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::NaiveDate;
    use concierge_core::booking::{Rate, RoomType};
    use concierge_core::ids::{ClientId, RoomTypeId};
    use concierge_engine::{
        CoordinatorConfig, FixedClock, ReservationLedger, RoomCatalog, SessionServices,
        SessionStore,
    };
    use concierge_llm::{MockProvider, MockResponse};
    use concierge_store::{Database, ReservationRepo};

    fn services(responses: Vec<MockResponse>) -> SessionServices {
        let catalog = Arc::new(
            RoomCatalog::new(vec![RoomType {
                id: RoomTypeId::from_raw("doble-estandar"),
                name: "Doble Estándar".into(),
                description: "Habitación doble".into(),
                rate: Rate::whole(85, "EUR"),
                inventory: 10,
            }])
            .unwrap(),
        );
        let db = Database::in_memory().unwrap();
        let ledger =
            Arc::new(ReservationLedger::open(catalog, Arc::new(ReservationRepo::new(db))).unwrap());
        SessionServices::new(
            ledger,
            Arc::new(MockProvider::new(responses)),
            Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())),
            CoordinatorConfig::default(),
        )
    }

    async fn next_event(rx: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    async fn next_reply(rx: &mut mpsc::Receiver<SessionEvent>) -> String {
        loop {
            if let SessionEvent::BotMessage { text } = next_event(rx).await {
                return text;
            }
        }
    }

    #[tokio::test]
    async fn worker_processes_messages_in_order() {
        let store = SessionStore::new(Duration::from_secs(60));
        let handle = store.create(ClientId::new());
        let (events_tx, mut events_rx) = mpsc::channel::<SessionEvent>(64);
        let coordinator = SessionCoordinator::new(
            services(vec![]),
            Arc::clone(&handle),
            Arc::new(events_tx) as Arc<dyn EventSink>,
        );
        let (inbox_tx, inbox_rx) = mpsc::channel(8);
        let worker = tokio::spawn(run_session(coordinator, inbox_rx));

        match next_event(&mut events_rx).await {
            SessionEvent::ConnectionStatus { status, session_id } => {
                assert_eq!(status, "connected");
                assert_eq!(session_id.as_ref(), Some(handle.session_id()));
            }
            other => panic!("unexpected first event: {other:?}"),
        }

        inbox_tx.send("¿Qué tipos de habitaciones tenéis?".into()).await.unwrap();
        inbox_tx.send("Muestra las reservas actuales".into()).await.unwrap();

        assert!(next_reply(&mut events_rx).await.contains("Doble Estándar"));
        assert!(next_reply(&mut events_rx).await.contains("No hay reservas"));

        drop(inbox_tx);
        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_session_stops_worker() {
        let store = SessionStore::new(Duration::from_secs(60));
        let handle = store.create(ClientId::new());
        let (events_tx, _events_rx) = mpsc::channel::<SessionEvent>(64);
        let coordinator = SessionCoordinator::new(
            services(vec![]),
            Arc::clone(&handle),
            Arc::new(events_tx) as Arc<dyn EventSink>,
        );
        let (_inbox_tx, inbox_rx) = mpsc::channel(8);
        let worker = tokio::spawn(run_session(coordinator, inbox_rx));

        store.remove(handle.session_id());
        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn pong_has_timestamp() {
        match pong() {
            SessionEvent::Pong { timestamp } => {
                assert!(chrono::DateTime::parse_from_rfc3339(&timestamp).is_ok());
            }
            other => panic!("expected pong, got {other:?}"),
        }
    }
}
