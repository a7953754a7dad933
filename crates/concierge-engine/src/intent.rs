//! Message classification.
//!
//! [`IntentRouter::classify`] is pure: the same text and reference date
//! always give the same [`Intent`]. Rules are an ordered predicate list
//! over normalized text; the first match wins and anything unmatched is a
//! [`Intent::GeneralQuery`].

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use concierge_core::booking::GuestInfo;
use concierge_core::dates::DateRange;
use concierge_core::ids::RoomTypeId;
use concierge_core::text::normalize;

use crate::catalog::RoomCatalog;
use crate::extract;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GuestDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party_size: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissingField {
    RoomType,
    Dates,
    GuestName,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoomType => write!(f, "el tipo de habitación"),
            Self::Dates => write!(f, "las fechas de entrada y salida"),
            Self::GuestName => write!(f, "su nombre completo"),
        }
    }
}

/// A reservation request, possibly partial. Also used as the per-session
/// draft that accumulates fields over several messages.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BookingRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_type: Option<RoomTypeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dates: Option<DateRange>,
    pub guest: GuestDetails,
}

/// A request with every required field present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadyBooking {
    pub room_type: RoomTypeId,
    pub dates: DateRange,
    pub guest: GuestInfo,
}

impl BookingRequest {
    pub fn missing_fields(&self) -> Vec<MissingField> {
        let mut missing = Vec::new();
        if self.room_type.is_none() {
            missing.push(MissingField::RoomType);
        }
        if self.dates.is_none() {
            missing.push(MissingField::Dates);
        }
        if self.guest.name.is_none() {
            missing.push(MissingField::GuestName);
        }
        missing
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay the fields present in `newer`.
    pub fn merge(&mut self, newer: BookingRequest) {
        self.room_type = newer.room_type.or(self.room_type.take());
        self.dates = newer.dates.or(self.dates.take());
        self.guest.name = newer.guest.name.or(self.guest.name.take());
        self.guest.email = newer.guest.email.or(self.guest.email.take());
        self.guest.phone = newer.guest.phone.or(self.guest.phone.take());
        self.guest.party_size = newer.guest.party_size.or(self.guest.party_size.take());
    }

    pub fn ready(&self) -> Option<ReadyBooking> {
        Some(ReadyBooking {
            room_type: self.room_type.clone()?,
            dates: self.dates?,
            guest: GuestInfo {
                name: self.guest.name.clone()?,
                email: self.guest.email.clone(),
                phone: self.guest.phone.clone(),
                party_size: self.guest.party_size.unwrap_or(1),
            },
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    QueryAvailability {
        dates: Option<DateRange>,
        room_type: Option<RoomTypeId>,
    },
    ListRoomTypes,
    ListReservations,
    CreateReservation(BookingRequest),
    GeneralQuery(String),
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::QueryAvailability { .. } => "query_availability",
            Self::ListRoomTypes => "list_room_types",
            Self::ListReservations => "list_reservations",
            Self::CreateReservation(_) => "create_reservation",
            Self::GeneralQuery(_) => "general_query",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Rule {
    ListReservations,
    CreateReservation,
    QueryAvailability,
    ListRoomTypes,
}

/// Normalized message split into words.
struct Words<'a> {
    words: Vec<&'a str>,
}

impl<'a> Words<'a> {
    fn new(normalized: &'a str) -> Self {
        Self {
            words: normalized
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    fn has(&self, options: &[&str]) -> bool {
        self.words.iter().any(|w| options.contains(w))
    }

    fn has_prefix(&self, prefixes: &[&str]) -> bool {
        self.words
            .iter()
            .any(|w| prefixes.iter().any(|p| w.starts_with(p)))
    }
}

fn lists_reservations(w: &Words<'_>) -> bool {
    w.has(&["reservas"])
        && (w.has_prefix(&["list", "mostr", "muestr", "ensen", "actual", "registrad"])
            || w.has(&["ver", "cuales", "todas", "hay"]))
}

fn creates_reservation(w: &Words<'_>) -> bool {
    w.has_prefix(&["reserv"])
        && !w.has_prefix(&["cancel", "anul"])
        && w.has_prefix(&[
            "crea", "hacer", "haz", "realiz", "quiero", "quisiera", "gustaria", "deseo",
            "necesito",
        ])
}

fn queries_availability(w: &Words<'_>) -> bool {
    w.has_prefix(&["disponib"]) || w.has(&["libre", "libres", "quedan"])
}

fn lists_room_types(w: &Words<'_>) -> bool {
    w.has(&[
        "tipos", "habitaciones", "precio", "precios", "tarifa", "tarifas", "cuesta", "cuestan",
    ])
}

/// Evaluated in order; more specific intents first.
const RULES: &[(Rule, fn(&Words<'_>) -> bool)] = &[
    (Rule::ListReservations, lists_reservations),
    (Rule::CreateReservation, creates_reservation),
    (Rule::QueryAvailability, queries_availability),
    (Rule::ListRoomTypes, lists_room_types),
];

pub struct IntentRouter {
    catalog: Arc<RoomCatalog>,
}

impl IntentRouter {
    pub fn new(catalog: Arc<RoomCatalog>) -> Self {
        Self { catalog }
    }

    /// Classify `text`. `today` anchors relative and year-less dates.
    pub fn classify(&self, text: &str, today: NaiveDate) -> Intent {
        let normalized = normalize(text);
        let words = Words::new(&normalized);
        let rule = RULES
            .iter()
            .find(|(_, matches)| matches(&words))
            .map(|(rule, _)| *rule);

        match rule {
            Some(Rule::ListReservations) => Intent::ListReservations,
            Some(Rule::CreateReservation) => {
                Intent::CreateReservation(self.extract_booking(text, today))
            }
            Some(Rule::QueryAvailability) => Intent::QueryAvailability {
                dates: extract::extract_dates(&normalized, today),
                room_type: self.room_type_in(text),
            },
            Some(Rule::ListRoomTypes) => Intent::ListRoomTypes,
            None => Intent::GeneralQuery(text.to_string()),
        }
    }

    /// Every booking field recognizable in `text`.
    pub fn extract_booking(&self, text: &str, today: NaiveDate) -> BookingRequest {
        let normalized = normalize(text);
        BookingRequest {
            room_type: self.room_type_in(text),
            dates: extract::extract_dates(&normalized, today),
            guest: GuestDetails {
                name: extract::extract_name(text),
                email: extract::extract_email(text),
                phone: extract::extract_phone(text, today),
                party_size: extract::extract_party_size(&normalized),
            },
        }
    }

    /// Whether the visitor is abandoning an in-progress booking.
    pub fn is_abandon(&self, text: &str) -> bool {
        let normalized = normalize(text);
        Words::new(&normalized).has_prefix(&["cancel", "olvid", "dejalo"])
    }

    fn room_type_in(&self, text: &str) -> Option<RoomTypeId> {
        self.catalog.find_by_mention(text).map(|rt| rt.id.clone())
    }
}
