pub mod catalog;
pub mod clock;
pub mod coordinator;
pub mod error;
pub mod extract;
pub mod history;
pub mod intent;
pub mod ledger;
pub mod replies;
pub mod sessions;

pub use catalog::RoomCatalog;
pub use clock::{Clock, FixedClock, SystemClock};
pub use coordinator::{CoordinatorConfig, EventSink, SessionCoordinator, SessionServices, SessionState};
pub use error::BookingError;
pub use history::ConversationHistory;
pub use intent::{BookingRequest, GuestDetails, Intent, IntentRouter, MissingField, ReadyBooking};
pub use ledger::{
    Availability, ReservationFilter, ReservationLedger, ReservationStore, DEFAULT_MAX_STAY_NIGHTS,
};
pub use sessions::{ProcessingGuard, SessionClosed, SessionHandle, SessionStore};
