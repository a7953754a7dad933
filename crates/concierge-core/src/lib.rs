pub mod booking;
pub mod context;
pub mod dates;
pub mod errors;
pub mod events;
pub mod ids;
pub mod messages;
pub mod provider;
pub mod security;
pub mod text;
