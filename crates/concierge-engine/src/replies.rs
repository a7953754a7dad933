//! Reply templates. Every deterministic answer the coordinator sends is
//! built here, in Spanish.

use std::fmt::Write;

use chrono::NaiveDate;

use concierge_core::booking::{Reservation, RoomType};
use concierge_core::dates::DateRange;
use concierge_core::ids::RoomTypeId;

use crate::catalog::RoomCatalog;
use crate::error::BookingError;
use crate::intent::MissingField;
use crate::ledger::Availability;

pub const NO_RESERVATIONS: &str = "📝 No hay reservas registradas actualmente.";

pub const ASK_AVAILABILITY_DATES: &str =
    "Para consultar disponibilidad necesito la fecha (y, si quieres, el tipo de habitación). ¿Podrías especificarla?";

pub const UNAVAILABLE: &str =
    "Lo siento, la información no está disponible temporalmente. Por favor, inténtalo de nuevo en unos minutos.";

pub const FALLBACK: &str = "Disculpa, ahora mismo no puedo responder a esa consulta. \
Puedo ayudarte a consultar disponibilidad, ver los tipos de habitación y sus tarifas, \
listar las reservas o crear una reserva nueva.";

pub const DRAFT_DISCARDED: &str =
    "De acuerdo, he descartado la reserva que estábamos preparando. ¿En qué más puedo ayudarte?";

pub fn room_types(hotel_name: &str, room_types: &[RoomType]) -> String {
    let mut out = format!("🏨 **Habitaciones - Hotel {hotel_name}**\n\n");
    for rt in room_types {
        let _ = writeln!(out, "🛏️ **{}**", rt.name);
        if !rt.description.is_empty() {
            let _ = writeln!(out, "📝 {}", rt.description);
        }
        let _ = writeln!(out, "💰 {} por noche", rt.rate);
        let _ = writeln!(out, "🏠 Habitaciones totales: {}\n", rt.inventory);
    }
    out.push_str(
        "¿Te gustaría consultar disponibilidad para alguna fecha o tipo de habitación? \
Si quieres reservar, dime los datos y lo gestiono.",
    );
    out
}

fn availability_lines(out: &mut String, room_type: &RoomType, availability: &Availability) {
    let _ = writeln!(out, "🛏️ **{}**", room_type.name);
    let _ = writeln!(out, "💰 {} por noche", room_type.rate);
    if availability.nights.len() == 1 {
        let _ = writeln!(
            out,
            "🏠 Disponibles: {} de {} habitaciones\n",
            availability.bookable(),
            availability.inventory
        );
    } else {
        for night in &availability.nights {
            let _ = writeln!(
                out,
                "   {}: {} de {}",
                night.date.format("%d/%m/%Y"),
                night.available,
                availability.inventory
            );
        }
        let _ = writeln!(
            out,
            "🏠 Disponibles para toda la estancia: {}\n",
            availability.bookable()
        );
    }
}

/// Availability for one or more room types over the same stay.
pub fn availability(dates: &DateRange, results: &[(&RoomType, Availability)]) -> String {
    let mut out = format!("📊 Disponibilidad para {dates}:\n\n");
    for (room_type, availability) in results {
        availability_lines(&mut out, room_type, availability);
    }
    out.push_str("¿Te gustaría hacer una reserva?");
    out
}

/// Display name of a room type, or its id if the catalog lacks it.
fn room_name<'a>(catalog: &'a RoomCatalog, id: &'a RoomTypeId) -> &'a str {
    catalog.get(id).map_or(id.as_str(), |rt| rt.name.as_str())
}

pub fn reservations(list: &[Reservation], catalog: &RoomCatalog) -> String {
    if list.is_empty() {
        return NO_RESERVATIONS.to_string();
    }
    let mut out = format!("📝 **Reservas actuales ({} en total)**\n\n", list.len());
    for r in list {
        let room = room_name(catalog, &r.room_type);
        let _ = writeln!(out, "🎫 **{}**", r.id);
        let _ = writeln!(out, "👤 {}", r.guest.name);
        let _ = writeln!(out, "🛏️ {room}");
        let _ = writeln!(out, "📅 {}", r.dates);
        let _ = writeln!(out, "👥 {} persona(s)\n", r.guest.party_size);
    }
    out.trim_end().to_string()
}

pub fn confirmation(hotel_name: &str, reservation: &Reservation, catalog: &RoomCatalog) -> String {
    let mut out = String::from("✅ **¡Reserva confirmada!**\n\n");
    let _ = writeln!(out, "🎫 **ID:** {}", reservation.id);
    let _ = writeln!(out, "👤 **Cliente:** {}", reservation.guest.name);
    let _ = writeln!(out, "🛏️ **Habitación:** {}", room_name(catalog, &reservation.room_type));
    let _ = writeln!(out, "📅 **Fechas:** {}", reservation.dates);
    let _ = writeln!(out, "👥 **Personas:** {}", reservation.guest.party_size);
    if let Some(email) = &reservation.guest.email {
        let _ = writeln!(out, "📧 **Email:** {email}");
    }
    let _ = write!(out, "\n¡Gracias por elegir Hotel {hotel_name}! 🏨");
    out
}

/// Ask for whatever the draft still lacks.
pub fn clarify(missing: &[MissingField]) -> String {
    let mut out = String::from("Para crear tu reserva necesito algunos datos más:\n");
    for field in missing {
        let _ = writeln!(out, "• {field}");
    }
    out.push_str("\n¿Podrías proporcionármelos?");
    out
}

pub fn past_date(check_in: NaiveDate) -> String {
    format!(
        "❌ La fecha de entrada {} ya ha pasado. ¿Para qué fechas quieres reservar?",
        check_in.format("%d/%m/%Y")
    )
}

pub fn stay_too_long(max_nights: u32) -> String {
    format!(
        "❌ Solo puedo gestionar estancias de hasta {max_nights} noches. ¿Podrías indicar otras fechas?"
    )
}

pub fn booking_error(err: &BookingError, catalog: &RoomCatalog) -> String {
    match err {
        BookingError::CapacityExceeded { room_type, date } => {
            let name = room_name(catalog, room_type);
            format!(
                "❌ Lo siento, no quedan habitaciones {name} disponibles para el {}. \
¿Quieres probar con otras fechas u otro tipo de habitación?",
                date.format("%d/%m/%Y")
            )
        }
        BookingError::Validation(detail) => {
            format!("❌ No he podido crear la reserva: {detail}. ¿Podrías revisar los datos?")
        }
        BookingError::NotFound(_) => {
            "❌ No encuentro ese tipo de habitación. Puedo mostrarte los tipos disponibles si quieres."
                .to_string()
        }
        BookingError::Persistence(_) => UNAVAILABLE.to_string(),
    }
}

/// Instructions for the language model on general questions.
pub fn system_prompt(hotel_name: &str, catalog: &RoomCatalog) -> String {
    let mut prompt = format!(
        "Eres el asistente digital del hotel {hotel_name}. Solo gestionas reservas, tarifas y \
disponibilidad de este hotel. Responde siempre en español de manera amigable y profesional. \
Nunca muestres JSON ni datos internos. Si el usuario quiere reservar, pide cortésmente el tipo \
de habitación, las fechas, su nombre completo, email y teléfono. Cuando hables de tarifas usa \
un formato claro: 'La tarifa para [habitación] es de [precio] euros por noche'. No confirmes \
reservas ni disponibilidad tú mismo: el sistema lo hace.\n\nHabitaciones del hotel:\n"
    );
    for rt in catalog.list_room_types() {
        let _ = writeln!(prompt, "- {}: {} por noche. {}", rt.name, rt.rate, rt.description);
    }
    prompt
}
