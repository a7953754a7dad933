//! Per-session dialogue state machine.
//!
//! One [`SessionCoordinator`] per connection. Messages are handled one at a
//! time (`handle_message` takes `&mut self`); different sessions run
//! concurrently and only meet inside the [`ReservationLedger`].

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use concierge_core::booking::RoomType;
use concierge_core::context::LlmContext;
use concierge_core::dates::DateRange;
use concierge_core::events::SessionEvent;
use concierge_core::ids::RoomTypeId;
use concierge_core::messages::Turn;
use concierge_core::provider::LlmProvider;

use crate::catalog::RoomCatalog;
use crate::clock::Clock;
use crate::history::ConversationHistory;
use crate::intent::{BookingRequest, Intent, IntentRouter, ReadyBooking};
use crate::ledger::{ReservationFilter, ReservationLedger};
use crate::replies;
use crate::sessions::SessionHandle;

/// Where a session's outbound events go. Delivery is best-effort.
pub trait EventSink: Send + Sync {
    /// Returns `false` if the event was dropped.
    fn emit(&self, event: SessionEvent) -> bool;
}

impl EventSink for mpsc::Sender<SessionEvent> {
    fn emit(&self, event: SessionEvent) -> bool {
        self.try_send(event).is_ok()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingInput,
    Processing,
    Responding,
    Closed,
}

#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    pub history_window: usize,
    pub llm_timeout: Duration,
    pub hotel_name: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            history_window: 10,
            llm_timeout: Duration::from_secs(30),
            hotel_name: "AselvIA".into(),
        }
    }
}

/// Shared collaborators, cloned into every session.
#[derive(Clone)]
pub struct SessionServices {
    pub ledger: Arc<ReservationLedger>,
    pub router: Arc<IntentRouter>,
    pub provider: Arc<dyn LlmProvider>,
    pub clock: Arc<dyn Clock>,
    pub config: CoordinatorConfig,
}

impl SessionServices {
    pub fn new(
        ledger: Arc<ReservationLedger>,
        provider: Arc<dyn LlmProvider>,
        clock: Arc<dyn Clock>,
        config: CoordinatorConfig,
    ) -> Self {
        let router = Arc::new(IntentRouter::new(Arc::clone(ledger.catalog())));
        Self {
            ledger,
            router,
            provider,
            clock,
            config,
        }
    }

    pub fn catalog(&self) -> &RoomCatalog {
        self.ledger.catalog()
    }
}

/// "Assistant is typing". Cleared at most once, on `clear` or drop.
struct TypingIndicator {
    sink: Arc<dyn EventSink>,
    active: bool,
}

impl TypingIndicator {
    fn start(sink: Arc<dyn EventSink>) -> Self {
        sink.emit(SessionEvent::BotTyping { active: true });
        Self { sink, active: true }
    }

    fn clear(&mut self) {
        if self.active {
            self.active = false;
            self.sink.emit(SessionEvent::BotTyping { active: false });
        }
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Tool activity notice, cleared when dropped.
struct ToolNotice {
    sink: Arc<dyn EventSink>,
}

impl ToolNotice {
    fn start(sink: Arc<dyn EventSink>, tool: &str, input: serde_json::Value) -> Self {
        sink.emit(SessionEvent::tool_started(tool, input));
        Self { sink }
    }
}

impl Drop for ToolNotice {
    fn drop(&mut self) {
        self.sink.emit(SessionEvent::tool_cleared());
    }
}

pub struct SessionCoordinator {
    services: SessionServices,
    handle: Arc<SessionHandle>,
    sink: Arc<dyn EventSink>,
    history: ConversationHistory,
    /// Reservation being assembled over several messages.
    draft: Option<BookingRequest>,
    state: SessionState,
}

impl SessionCoordinator {
    pub fn new(services: SessionServices, handle: Arc<SessionHandle>, sink: Arc<dyn EventSink>) -> Self {
        let history = ConversationHistory::new(services.config.history_window);
        Self {
            services,
            handle,
            sink,
            history,
            draft: None,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handle(&self) -> &Arc<SessionHandle> {
        &self.handle
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn draft(&self) -> Option<&BookingRequest> {
        self.draft.as_ref()
    }

    /// Announce the session to the client.
    pub fn open(&mut self) {
        self.sink.emit(SessionEvent::ConnectionStatus {
            status: "connected".into(),
            session_id: Some(self.handle.session_id().clone()),
        });
        self.state = SessionState::AwaitingInput;
    }

    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Process one visitor message and emit the reply.
    ///
    /// Returns the reply, or `None` if the message was empty or the session
    /// was closed before the reply was ready (the late reply is discarded).
    #[instrument(skip_all, fields(session_id = %self.handle.session_id()))]
    pub async fn handle_message(&mut self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() || self.state == SessionState::Closed {
            return None;
        }
        let Ok(_processing) = self.handle.begin_processing() else {
            self.state = SessionState::Closed;
            return None;
        };

        self.state = SessionState::Processing;
        self.history.push(Turn::user(text));
        let mut typing = TypingIndicator::start(Arc::clone(&self.sink));

        let cancel = self.handle.cancel_token().clone();
        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            reply = self.dispatch(text) => Some(reply),
        };

        let Some(reply) = reply else {
            typing.clear();
            self.state = SessionState::Closed;
            debug!("session closed while processing, reply discarded");
            return None;
        };

        self.state = SessionState::Responding;
        self.history.push(Turn::assistant(reply.as_str()));
        typing.clear();
        self.sink.emit(SessionEvent::bot_message(reply.as_str()));
        self.state = SessionState::AwaitingInput;
        Some(reply)
    }

    async fn dispatch(&mut self, text: &str) -> String {
        let today = self.services.clock.today();

        if self.draft.is_some() && self.services.router.is_abandon(text) {
            self.draft = None;
            return replies::DRAFT_DISCARDED.to_string();
        }

        let intent = self.services.router.classify(text, today);
        debug!(intent = intent.name(), "message classified");

        match intent {
            Intent::ListRoomTypes => self.list_room_types(),
            Intent::ListReservations => self.list_reservations(),
            Intent::QueryAvailability { dates, room_type } => {
                self.query_availability(dates, room_type.as_ref())
            }
            Intent::CreateReservation(request) => self.continue_booking(request, today),
            Intent::GeneralQuery(raw) => {
                if self.draft.is_some() {
                    let fields = self.services.router.extract_booking(&raw, today);
                    if !fields.is_empty() {
                        return self.continue_booking(fields, today);
                    }
                }
                self.general_query().await
            }
        }
    }

    fn list_room_types(&self) -> String {
        let _tool = ToolNotice::start(Arc::clone(&self.sink), "listar_tipos_habitaciones", json!({}));
        replies::room_types(
            &self.services.config.hotel_name,
            self.services.catalog().list_room_types(),
        )
    }

    fn list_reservations(&self) -> String {
        let _tool = ToolNotice::start(Arc::clone(&self.sink), "listar_reservas", json!({}));
        let list = self
            .services
            .ledger
            .list_reservations(&ReservationFilter::default());
        replies::reservations(&list, self.services.catalog())
    }

    fn query_availability(&self, dates: Option<DateRange>, room_type: Option<&RoomTypeId>) -> String {
        let Some(dates) = dates else {
            return replies::ASK_AVAILABILITY_DATES.to_string();
        };
        let max_nights = self.services.ledger.max_stay_nights();
        if dates.nights() > max_nights {
            return replies::stay_too_long(max_nights);
        }
        let catalog = self.services.catalog();
        let targets: Vec<&RoomType> = match room_type {
            Some(id) => match catalog.get(id) {
                Ok(rt) => vec![rt],
                Err(e) => return replies::booking_error(&e, catalog),
            },
            None => catalog.list_room_types().iter().collect(),
        };

        let _tool = ToolNotice::start(
            Arc::clone(&self.sink),
            "consultar_disponibilidad",
            json!({
                "room_type": room_type,
                "check_in": dates.check_in(),
                "check_out": dates.check_out(),
            }),
        );

        let mut results = Vec::with_capacity(targets.len());
        for rt in targets {
            match self.services.ledger.check_availability(&rt.id, &dates) {
                Ok(availability) => results.push((rt, availability)),
                Err(e) => {
                    warn!(room_type = %rt.id, error = %e, "availability lookup failed");
                    return replies::UNAVAILABLE.to_string();
                }
            }
        }
        replies::availability(&dates, &results)
    }

    /// Merge `request` into the open draft and book once nothing is missing.
    fn continue_booking(&mut self, request: BookingRequest, today: NaiveDate) -> String {
        let mut draft = self.draft.take().unwrap_or_default();
        draft.merge(request);

        let Some(ready) = draft.ready() else {
            let reply = replies::clarify(&draft.missing_fields());
            self.draft = Some(draft);
            return reply;
        };

        if ready.dates.check_in() < today {
            draft.dates = None;
            self.draft = Some(draft);
            return replies::past_date(ready.dates.check_in());
        }

        let max_nights = self.services.ledger.max_stay_nights();
        if ready.dates.nights() > max_nights {
            draft.dates = None;
            self.draft = Some(draft);
            return replies::stay_too_long(max_nights);
        }

        self.book(ready)
    }

    fn book(&self, ready: ReadyBooking) -> String {
        let catalog = self.services.catalog();
        let _tool = ToolNotice::start(
            Arc::clone(&self.sink),
            "crear_reserva",
            json!({
                "room_type": ready.room_type,
                "check_in": ready.dates.check_in(),
                "check_out": ready.dates.check_out(),
                "guest": ready.guest,
            }),
        );

        match self
            .services
            .ledger
            .create_reservation(&ready.room_type, ready.dates, ready.guest)
        {
            Ok(reservation) => {
                info!(reservation_id = %reservation.id, "booked from conversation");
                replies::confirmation(&self.services.config.hotel_name, &reservation, catalog)
            }
            Err(e) => {
                info!(kind = e.error_kind(), error = %e, "booking refused");
                replies::booking_error(&e, catalog)
            }
        }
    }

    async fn general_query(&self) -> String {
        let context = LlmContext::new(
            replies::system_prompt(&self.services.config.hotel_name, self.services.catalog()),
            self.history.to_vec(),
        );
        let provider = Arc::clone(&self.services.provider);
        let timeout = self.services.config.llm_timeout;
        let _tool = ToolNotice::start(
            Arc::clone(&self.sink),
            "consulta_general",
            json!({ "model": provider.model() }),
        );

        match tokio::time::timeout(timeout, provider.complete(&context)).await {
            Ok(Ok(reply)) if !reply.trim().is_empty() => reply,
            Ok(Ok(_)) => {
                warn!(provider = provider.name(), "language model returned an empty reply");
                replies::FALLBACK.to_string()
            }
            Ok(Err(e)) => {
                warn!(provider = provider.name(), kind = e.error_kind(), error = %e, "language model call failed");
                replies::FALLBACK.to_string()
            }
            Err(_) => {
                warn!(provider = provider.name(), timeout_ms = timeout.as_millis() as u64, "language model call timed out");
                replies::FALLBACK.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use concierge_core::booking::Rate;
    use concierge_core::errors::GatewayError;
    use concierge_core::ids::ClientId;
    use concierge_llm::{MockProvider, MockResponse};
    use concierge_store::{Database, ReservationRepo, RoomTypeRepo};

    use crate::clock::FixedClock;
    use crate::sessions::SessionStore;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<SessionEvent>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<SessionEvent> {
            self.events.lock().clone()
        }

        fn typing_cleared(&self) -> usize {
            self.events()
                .iter()
                .filter(|e| matches!(e, SessionEvent::BotTyping { active: false }))
                .count()
        }

        fn tools(&self) -> Vec<Option<String>> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    SessionEvent::ToolUsed { tool, .. } => Some(tool),
                    _ => None,
                })
                .collect()
        }

        fn messages(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    SessionEvent::BotMessage { text } => Some(text),
                    _ => None,
                })
                .collect()
        }
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: SessionEvent) -> bool {
            self.events.lock().push(event);
            true
        }
    }

    struct Fixture {
        coordinator: SessionCoordinator,
        sink: Arc<RecordingSink>,
        provider: Arc<MockProvider>,
        ledger: Arc<ReservationLedger>,
        store: SessionStore,
    }

    fn room(name: &str, price: u64, inventory: u32) -> RoomType {
        RoomType {
            id: RoomTypeId::from_name(name),
            name: name.into(),
            description: String::new(),
            rate: Rate::whole(price, "EUR"),
            inventory,
        }
    }

    fn fixture(responses: Vec<MockResponse>, llm_timeout: Duration) -> Fixture {
        let room_types = vec![room("Doble Estándar", 85, 10), room("Suite Junior", 140, 1)];
        let db = Database::in_memory().unwrap();
        RoomTypeRepo::new(db.clone()).upsert_all(&room_types).unwrap();
        let catalog = Arc::new(RoomCatalog::new(room_types).unwrap());
        let ledger = Arc::new(
            ReservationLedger::open(catalog, Arc::new(ReservationRepo::new(db))).unwrap(),
        );
        let provider = Arc::new(MockProvider::new(responses));
        let clock = Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()));
        let config = CoordinatorConfig {
            history_window: 4,
            llm_timeout,
            hotel_name: "AselvIA".into(),
        };
        let services = SessionServices::new(Arc::clone(&ledger), provider.clone(), clock, config);

        let store = SessionStore::new(Duration::from_secs(1800));
        let handle = store.create(ClientId::new());
        let sink = Arc::new(RecordingSink::default());
        let mut coordinator = SessionCoordinator::new(services, handle, sink.clone());
        coordinator.open();

        Fixture {
            coordinator,
            sink,
            provider,
            ledger,
            store,
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
    }

    #[tokio::test]
    async fn open_announces_session() {
        let f = fixture(vec![], Duration::from_secs(5));
        assert_eq!(f.coordinator.state(), SessionState::AwaitingInput);
        let events = f.sink.events();
        assert!(matches!(
            &events[0],
            SessionEvent::ConnectionStatus { status, session_id: Some(_) } if status == "connected"
        ));
    }

    #[tokio::test]
    async fn availability_scenario_ten_then_nine() {
        let mut f = fixture(vec![], Duration::from_secs(5));

        let reply = f
            .coordinator
            .handle_message("¿Hay disponibilidad de la doble estándar para el 25 de julio?")
            .await
            .unwrap();
        assert!(reply.contains("Disponibles: 10 de 10"), "{reply}");

        f.ledger
            .create_reservation(
                &RoomTypeId::from_raw("doble-estandar"),
                DateRange::single_night(d(25)),
                concierge_core::booking::GuestInfo::named("Ana García"),
            )
            .unwrap();

        let reply = f
            .coordinator
            .handle_message("¿Y ahora hay disponibilidad de la doble estándar para el 25 de julio?")
            .await
            .unwrap();
        assert!(reply.contains("Disponibles: 9 de 10"), "{reply}");
        assert_eq!(f.provider.call_count(), 0);
        assert_eq!(f.coordinator.state(), SessionState::AwaitingInput);
    }

    #[tokio::test]
    async fn event_order_for_a_ledger_action() {
        let mut f = fixture(vec![], Duration::from_secs(5));
        f.coordinator.handle_message("Muestra las reservas actuales").await;

        let events = f.sink.events();
        let names: Vec<_> = events.iter().skip(1).map(SessionEvent::event_name).collect();
        assert_eq!(
            names,
            vec!["bot_typing", "tool_used", "tool_used", "bot_typing", "bot_message"]
        );
        assert_eq!(f.sink.tools(), vec![Some("listar_reservas".to_string()), None]);
        assert_eq!(f.sink.messages(), vec![replies::NO_RESERVATIONS.to_string()]);
    }

    #[tokio::test]
    async fn incomplete_booking_asks_and_never_touches_ledger() {
        let mut f = fixture(vec![], Duration::from_secs(5));
        let reply = f.coordinator.handle_message("Quiero hacer una reserva").await.unwrap();

        assert!(reply.starts_with("Para crear tu reserva necesito"), "{reply}");
        assert!(f.sink.tools().is_empty());
        assert!(f.ledger.list_reservations(&ReservationFilter::default()).is_empty());
        assert!(f.coordinator.draft().is_some());
        assert_eq!(f.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn draft_completes_over_several_messages() {
        let mut f = fixture(vec![], Duration::from_secs(5));
        f.coordinator.handle_message("Quiero reservar la suite").await;
        f.coordinator.handle_message("del 25 al 27 de julio").await;
        let reply = f
            .coordinator
            .handle_message("Me llamo Ana García, ana@example.com")
            .await
            .unwrap();

        assert!(reply.contains("¡Reserva confirmada!"), "{reply}");
        assert!(f.coordinator.draft().is_none());
        let booked = f.ledger.list_reservations(&ReservationFilter::default());
        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].guest.name, "Ana García");
        assert_eq!(booked[0].guest.email.as_deref(), Some("ana@example.com"));
        assert_eq!(booked[0].dates, DateRange::new(d(25), d(27)).unwrap());
        assert_eq!(
            f.sink.tools(),
            vec![Some("crear_reserva".to_string()), None]
        );
        assert_eq!(f.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn capacity_exceeded_is_a_reply_not_a_failure() {
        let mut f = fixture(vec![], Duration::from_secs(5));
        let request = "Quiero reservar la suite para el 25 de julio, soy Ana García";
        let first = f.coordinator.handle_message(request).await.unwrap();
        assert!(first.contains("¡Reserva confirmada!"), "{first}");

        let second = f.coordinator.handle_message(request).await.unwrap();
        assert!(second.contains("no quedan habitaciones Suite Junior"), "{second}");
        assert_eq!(f.coordinator.state(), SessionState::AwaitingInput);
        assert!(f.coordinator.draft().is_none());
    }

    #[tokio::test]
    async fn past_check_in_is_rejected_before_ledger() {
        let mut f = fixture(vec![], Duration::from_secs(5));
        let reply = f
            .coordinator
            .handle_message("Quiero reservar la suite el 2024-06-10, soy Ana García")
            .await
            .unwrap();
        assert!(reply.contains("ya ha pasado"), "{reply}");
        assert!(f.sink.tools().is_empty());
        assert_eq!(f.coordinator.draft().and_then(|d| d.dates), None);
    }

    #[tokio::test]
    async fn explicit_zero_guests_is_refused() {
        let mut f = fixture(vec![], Duration::from_secs(5));
        let reply = f
            .coordinator
            .handle_message("Quiero reservar la suite para el 25 de julio para 0 personas, soy Ana García")
            .await
            .unwrap();

        assert!(reply.contains("No he podido crear la reserva"), "{reply}");
        assert!(f.ledger.list_reservations(&ReservationFilter::default()).is_empty());
        assert_eq!(f.ledger.occupancy(&RoomTypeId::from_name("Suite Junior"), d(25)), 0);
        assert_eq!(f.coordinator.state(), SessionState::AwaitingInput);
    }

    #[tokio::test]
    async fn overlong_stay_is_refused() {
        let mut f = fixture(vec![], Duration::from_secs(5));
        let reply = f
            .coordinator
            .handle_message("Quiero reservar la suite del 2024-07-25 al 9999-12-31, soy Ana García")
            .await
            .unwrap();
        assert_eq!(reply, replies::stay_too_long(30));
        assert!(f.sink.tools().is_empty());
        assert!(f.ledger.list_reservations(&ReservationFilter::default()).is_empty());
        let draft = f.coordinator.draft().unwrap();
        assert_eq!(draft.dates, None);
        assert_eq!(draft.guest.name.as_deref(), Some("Ana García"));

        let reply = f.coordinator.handle_message("del 25 al 27 de julio").await.unwrap();
        assert!(reply.contains("¡Reserva confirmada!"), "{reply}");

        let reply = f
            .coordinator
            .handle_message("¿Hay disponibilidad de la doble estándar del 2024-07-25 al 9999-12-31?")
            .await
            .unwrap();
        assert_eq!(reply, replies::stay_too_long(30));
    }

    #[tokio::test]
    async fn abandon_discards_draft() {
        let mut f = fixture(vec![], Duration::from_secs(5));
        f.coordinator.handle_message("Quiero reservar la suite").await;
        let reply = f.coordinator.handle_message("olvídalo").await.unwrap();
        assert_eq!(reply, replies::DRAFT_DISCARDED);
        assert!(f.coordinator.draft().is_none());
    }

    #[tokio::test]
    async fn general_query_goes_to_the_model_with_history() {
        let mut f = fixture(
            vec![MockResponse::text("El desayuno se sirve de 7 a 10.")],
            Duration::from_secs(5),
        );
        let reply = f
            .coordinator
            .handle_message("¿A qué hora es el desayuno?")
            .await
            .unwrap();
        assert_eq!(reply, "El desayuno se sirve de 7 a 10.");

        let contexts = f.provider.contexts();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].last_user_text(), Some("¿A qué hora es el desayuno?"));
        assert!(contexts[0].system_prompt.contains("Suite Junior"));
        assert_eq!(f.sink.tools(), vec![Some("consulta_general".to_string()), None]);
        assert_eq!(f.coordinator.history().len(), 2);
    }

    #[tokio::test]
    async fn model_error_falls_back() {
        let mut f = fixture(
            vec![MockResponse::Error(GatewayError::NetworkError("connection reset".into()))],
            Duration::from_secs(5),
        );
        let reply = f.coordinator.handle_message("Cuéntame algo del hotel").await.unwrap();
        assert_eq!(reply, replies::FALLBACK);
        assert_eq!(f.sink.typing_cleared(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn model_timeout_falls_back_and_clears_typing_once() {
        let mut f = fixture(
            vec![MockResponse::delayed(
                Duration::from_secs(120),
                MockResponse::text("demasiado tarde"),
            )],
            Duration::from_secs(30),
        );
        let reply = f.coordinator.handle_message("¿Tenéis parking?").await.unwrap();

        assert_eq!(reply, replies::FALLBACK);
        assert_eq!(f.sink.typing_cleared(), 1);
        assert_eq!(f.sink.messages(), vec![replies::FALLBACK.to_string()]);
        assert_eq!(f.coordinator.state(), SessionState::AwaitingInput);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_in_flight_model_call() {
        let mut f = fixture(
            vec![MockResponse::delayed(
                Duration::from_secs(10),
                MockResponse::text("respuesta tardía"),
            )],
            Duration::from_secs(30),
        );
        let session_id = f.coordinator.handle().session_id().clone();
        let store = &f.store;

        let (reply, _) = tokio::join!(f.coordinator.handle_message("¿Tenéis parking?"), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            store.remove(&session_id);
        });

        assert_eq!(reply, None);
        assert_eq!(f.coordinator.state(), SessionState::Closed);
        assert!(f.sink.messages().is_empty());
        assert_eq!(f.sink.typing_cleared(), 1);
        assert_eq!(f.coordinator.handle_message("¿Sigues ahí?").await, None);
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let mut f = fixture(vec![], Duration::from_secs(5));
        for _ in 0..5 {
            f.coordinator.handle_message("¿Qué tipos de habitaciones tienen?").await;
        }
        assert_eq!(f.coordinator.history().len(), 4);
    }
}
