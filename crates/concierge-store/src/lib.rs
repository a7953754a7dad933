pub mod database;
pub mod error;
pub mod reservations;
pub mod room_types;
pub mod row_helpers;
pub mod schema;
pub mod seed;

pub use database::Database;
pub use error::StoreError;
pub use reservations::ReservationRepo;
pub use room_types::RoomTypeRepo;
