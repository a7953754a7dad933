//! Best-effort extraction of booking fields from free text.
//!
//! Date and count patterns run over normalized text (see
//! [`concierge_core::text::normalize`]). Names, e-mails and phone numbers
//! are read from the original message so capitalization survives.
//! Nothing here fails: an unrecognized field is simply `None`.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;

use concierge_core::dates::DateRange;
use concierge_core::text::normalize;

const MONTHS: &str =
    "enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|setiembre|octubre|noviembre|diciembre";
const COUNT: &str = r"\d{1,2}|una|uno|dos|tres|cuatro|cinco|seis|siete|ocho|nueve|diez";

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());
static WORD_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(\d{{1,2}})\s+(?:al?|-|hasta(?:\s+el)?)\s+(?:el\s+)?(\d{{1,2}})\s+de\s+({MONTHS})(?:\s+(?:de|del)\s+(\d{{4}}))?\b"
    ))
    .unwrap()
});
static NUMERIC_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})\s+al\s+(\d{1,2})[/-](\d{1,2})(?:[/-](\d{2,4}))?\b").unwrap()
});
static WORD_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(\d{{1,2}})\s+de\s+({MONTHS})(?:\s+(?:de|del)\s+(\d{{4}}))?\b"
    ))
    .unwrap()
});
static NUMERIC_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})[/-](\d{1,2})(?:[/-](\d{2,4}))?\b").unwrap());
static RELATIVE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(pasado\s+manana|manana|hoy)\b").unwrap());
static NIGHTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\b({COUNT})\s+noches?\b")).unwrap());

static PARTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b({COUNT})\s+(?:personas?|huespedes|huesped|adultos?|pax)\b"
    ))
    .unwrap()
});
static SOMOS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\bsomos\s+({COUNT})\b")).unwrap());
static PARA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bpara\s+(\d{1,2}|dos|tres|cuatro|cinco|seis|siete|ocho|nueve|diez)\b").unwrap()
});

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());
static PHONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\+?\d[\d\s-]{7,}\d").unwrap());
static NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:me\s+llamo|mi\s+nombre\s+es|a\s+nombre\s+de|soy)\s+(.+)").unwrap()
});

/// Lowercase words allowed inside a capitalized name ("María de la Cruz").
const NAME_CONNECTORS: &[&str] = &["de", "del", "la", "las", "los", "y"];

/// Words that end a lowercase name ("me llamo ana garcia y quiero...").
const NAME_STOPWORDS: &[&str] = &[
    "y", "e", "mi", "con", "para", "el", "la", "los", "las", "de", "del", "un", "una", "que",
    "quiero", "quisiera", "me", "email", "correo", "telefono", "tel", "movil", "por", "favor",
    "en", "a", "al", "somos", "necesito", "tengo", "desde",
];

#[derive(Clone, Copy, Debug)]
enum Found {
    Day(NaiveDate),
    Span(NaiveDate, NaiveDate),
}

#[derive(Clone, Copy, Debug)]
struct Hit {
    start: usize,
    end: usize,
    found: Found,
}

/// Keep `hit` only if it does not overlap an earlier, higher-priority match.
fn push_hit(hits: &mut Vec<Hit>, hit: Hit) {
    if hits.iter().all(|h| hit.end <= h.start || hit.start >= h.end) {
        hits.push(hit);
    }
}

fn parse_count(word: &str) -> Option<u32> {
    match word {
        "una" | "uno" => Some(1),
        "dos" => Some(2),
        "tres" => Some(3),
        "cuatro" => Some(4),
        "cinco" => Some(5),
        "seis" => Some(6),
        "siete" => Some(7),
        "ocho" => Some(8),
        "nueve" => Some(9),
        "diez" => Some(10),
        digits => digits.parse().ok(),
    }
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name {
        "enero" => 1,
        "febrero" => 2,
        "marzo" => 3,
        "abril" => 4,
        "mayo" => 5,
        "junio" => 6,
        "julio" => 7,
        "agosto" => 8,
        "septiembre" | "setiembre" => 9,
        "octubre" => 10,
        "noviembre" => 11,
        "diciembre" => 12,
        _ => return None,
    };
    Some(month)
}

fn parse_year(s: &str) -> Option<i32> {
    let year: i32 = s.parse().ok()?;
    match s.len() {
        2 => Some(2000 + year),
        4 => Some(year),
        _ => None,
    }
}

/// Year for a day-month without one: this year, or next year if the date
/// has already passed.
fn infer_year(day: u32, month: u32, today: NaiveDate) -> i32 {
    match NaiveDate::from_ymd_opt(today.year(), month, day) {
        Some(date) if date >= today => today.year(),
        _ => today.year() + 1,
    }
}

fn resolve(day: u32, month: u32, year: Option<i32>, today: NaiveDate) -> Option<NaiveDate> {
    let year = year.unwrap_or_else(|| infer_year(day, month, today));
    NaiveDate::from_ymd_opt(year, month, day)
}

fn resolve_span(
    from: u32,
    to: u32,
    month: u32,
    year: Option<i32>,
    today: NaiveDate,
) -> Option<Found> {
    let year = year.unwrap_or_else(|| infer_year(from, month, today));
    let start = NaiveDate::from_ymd_opt(year, month, from)?;
    let end = NaiveDate::from_ymd_opt(year, month, to)?;
    (end > start).then_some(Found::Span(start, end))
}

fn num(caps: &regex::Captures<'_>, i: usize) -> Option<u32> {
    caps.get(i)?.as_str().parse().ok()
}

fn year(caps: &regex::Captures<'_>, i: usize) -> Option<Option<i32>> {
    match caps.get(i) {
        Some(m) => parse_year(m.as_str()).map(Some),
        None => Some(None),
    }
}

fn iso_date(caps: &regex::Captures<'_>) -> Option<NaiveDate> {
    let year = caps[1].parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, num(caps, 2)?, num(caps, 3)?)
}

fn word_range(caps: &regex::Captures<'_>, today: NaiveDate) -> Option<Found> {
    let month = month_number(&caps[3])?;
    resolve_span(num(caps, 1)?, num(caps, 2)?, month, year(caps, 4)?, today)
}

fn numeric_range(caps: &regex::Captures<'_>, today: NaiveDate) -> Option<Found> {
    resolve_span(num(caps, 1)?, num(caps, 2)?, num(caps, 3)?, year(caps, 4)?, today)
}

fn word_date(caps: &regex::Captures<'_>, today: NaiveDate) -> Option<NaiveDate> {
    let month = month_number(&caps[2])?;
    resolve(num(caps, 1)?, month, year(caps, 3)?, today)
}

fn numeric_date(caps: &regex::Captures<'_>, today: NaiveDate) -> Option<NaiveDate> {
    resolve(num(caps, 1)?, num(caps, 2)?, year(caps, 3)?, today)
}

/// Run `pattern` over `text`, keeping every match `parse` accepts.
fn collect(
    hits: &mut Vec<Hit>,
    pattern: &Regex,
    text: &str,
    parse: impl Fn(&regex::Captures<'_>) -> Option<Found>,
) {
    for caps in pattern.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        if let Some(found) = parse(&caps) {
            push_hit(hits, Hit { start: m.start(), end: m.end(), found });
        }
    }
}

/// Every date mention in `text`, in order of appearance. Patterns are
/// tried most-specific first; a later pattern never claims text an
/// earlier one already matched.
fn date_hits(text: &str, today: NaiveDate) -> Vec<Hit> {
    let mut hits = Vec::new();

    collect(&mut hits, &ISO_DATE, text, |c| iso_date(c).map(Found::Day));
    collect(&mut hits, &WORD_RANGE, text, |c| word_range(c, today));
    collect(&mut hits, &NUMERIC_RANGE, text, |c| numeric_range(c, today));
    collect(&mut hits, &WORD_DATE, text, |c| word_date(c, today).map(Found::Day));
    collect(&mut hits, &NUMERIC_DATE, text, |c| numeric_date(c, today).map(Found::Day));
    collect(&mut hits, &RELATIVE_DATE, text, |c| {
        let offset = match &c[1] {
            "hoy" => 0,
            "manana" => 1,
            _ => 2,
        };
        Some(Found::Day(today + Duration::days(offset)))
    });

    hits.sort_by_key(|h| h.start);
    hits
}

fn extract_nights(text: &str) -> Option<u32> {
    let caps = NIGHTS.captures(text)?;
    parse_count(&caps[1]).filter(|n| *n > 0)
}

/// Stay dates mentioned in normalized `text`.
///
/// The first mention is the check-in. A range, or a second later date,
/// sets the check-out; otherwise "N noches" does; otherwise one night.
pub fn extract_dates(text: &str, today: NaiveDate) -> Option<DateRange> {
    let mut hits = date_hits(text, today).into_iter();
    let first = hits.next()?;

    let (check_in, check_out) = match first.found {
        Found::Span(start, end) => (start, Some(end)),
        Found::Day(start) => {
            let later = hits.next().and_then(|h| match h.found {
                Found::Day(d) | Found::Span(d, _) if d > start => Some(d),
                _ => None,
            });
            (start, later)
        }
    };

    let check_out = check_out.or_else(|| {
        extract_nights(text).map(|n| check_in + Duration::days(i64::from(n)))
    });

    match check_out {
        Some(out) => DateRange::new(check_in, out).ok(),
        None => Some(DateRange::single_night(check_in)),
    }
}

/// Number of guests in normalized `text`. An explicit zero is returned
/// as `Some(0)` so the ledger can reject it.
pub fn extract_party_size(text: &str) -> Option<u32> {
    if let Some(caps) = PARTY.captures(text).or_else(|| SOMOS.captures(text)) {
        return parse_count(&caps[1]);
    }
    for caps in PARA.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        let rest = text[m.end()..].trim_start();
        // "para 25 de julio", "para 25/07", "para 2 noches" are not guests.
        let is_date_or_stay = rest.starts_with(['/', '-'])
            || rest.starts_with("de ")
            || rest.starts_with("al ")
            || rest.starts_with("noche");
        if !is_date_or_stay {
            return parse_count(&caps[1]);
        }
    }
    None
}

pub fn extract_email(text: &str) -> Option<String> {
    EMAIL.find(text).map(|m| m.as_str().to_lowercase())
}

/// A phone number: 9 to 15 digits, optional leading `+`, spaces or dashes.
/// E-mail addresses and anything that parses as a date are masked first.
pub fn extract_phone(text: &str, today: NaiveDate) -> Option<String> {
    let mut masked = EMAIL.replace_all(text, " ").into_owned();
    // Hits never overlap; replacing back to front keeps offsets valid.
    for hit in date_hits(&masked, today).into_iter().rev() {
        masked.replace_range(hit.start..hit.end, " ");
    }
    PHONE
        .find_iter(&masked)
        .map(|m| m.as_str().trim())
        .find(|candidate| {
            let digits = candidate.chars().filter(char::is_ascii_digit).count();
            (9..=15).contains(&digits)
        })
        .map(str::to_string)
}

fn starts_upper(word: &str) -> bool {
    word.chars().next().is_some_and(char::is_uppercase)
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Guest name introduced by "soy", "me llamo", "mi nombre es" or
/// "a nombre de". Reads the original (non-normalized) message.
pub fn extract_name(text: &str) -> Option<String> {
    let caps = NAME.captures(text)?;
    let words: Vec<&str> = caps.get(1)?.as_str().split_whitespace().collect();
    let capitalized = words.first().is_some_and(|w| starts_upper(w));
    let max_words = if capitalized { 5 } else { 3 };

    let mut name: Vec<String> = Vec::new();
    for (i, raw) in words.iter().enumerate() {
        let word = raw.trim_end_matches(|c: char| !c.is_alphanumeric());
        let ends_clause = word.len() != raw.len();
        if word.is_empty() || word.chars().any(|c| c.is_ascii_digit() || c == '@') {
            break;
        }
        let folded = normalize(word);

        if capitalized {
            let joins_next = !name.is_empty()
                && !ends_clause
                && NAME_CONNECTORS.contains(&folded.as_str())
                && words[i + 1..]
                    .iter()
                    .find(|w| !NAME_CONNECTORS.contains(&normalize(w).as_str()))
                    .is_some_and(|w| starts_upper(w));
            if starts_upper(word) || joins_next {
                name.push(word.to_string());
            } else {
                break;
            }
        } else if NAME_STOPWORDS.contains(&folded.as_str()) {
            break;
        } else {
            name.push(title_case(word));
        }

        if ends_clause || name.len() >= max_words {
            break;
        }
    }

    // A trailing connector never ends a name.
    while name
        .last()
        .is_some_and(|w| NAME_CONNECTORS.contains(&normalize(w).as_str()))
    {
        name.pop();
    }
    (!name.is_empty()).then(|| name.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dates(text: &str) -> Option<(NaiveDate, NaiveDate)> {
        extract_dates(&normalize(text), today()).map(|r| (r.check_in(), r.check_out()))
    }

    #[test]
    fn single_dates_in_every_format() {
        let night = Some((d(2024, 7, 25), d(2024, 7, 26)));
        assert_eq!(dates("¿Hay disponibilidad para el 25 de julio?"), night);
        assert_eq!(dates("el 2024-07-25"), night);
        assert_eq!(dates("para el 25/07/2024"), night);
        assert_eq!(dates("para el 25/07/24"), night);
        assert_eq!(dates("el 25/07"), night);
        assert_eq!(dates("el 25-07"), night);
        assert_eq!(dates("el 25 de julio de 2024"), night);
    }

    #[test]
    fn past_day_month_rolls_to_next_year() {
        assert_eq!(dates("el 15 de enero"), Some((d(2025, 1, 15), d(2025, 1, 16))));
        assert_eq!(dates("el 01/07"), Some((d(2024, 7, 1), d(2024, 7, 2))));
    }

    #[test]
    fn ranges() {
        let stay = Some((d(2024, 7, 25), d(2024, 7, 27)));
        assert_eq!(dates("del 25 al 27 de julio"), stay);
        assert_eq!(dates("25 al 27/07"), stay);
        assert_eq!(dates("del 25/07 al 27/07"), stay);
        assert_eq!(dates("desde el 25 de julio hasta el 27 de julio"), stay);
        assert_eq!(dates("del 2024-07-25 al 2024-07-27"), stay);
    }

    #[test]
    fn nights_extend_the_stay() {
        assert_eq!(dates("el 25 de julio, 3 noches"), Some((d(2024, 7, 25), d(2024, 7, 28))));
        assert_eq!(dates("mañana, dos noches"), Some((d(2024, 7, 2), d(2024, 7, 4))));
        // An explicit check-out wins over a night count.
        assert_eq!(dates("del 25 al 27 de julio, 5 noches"), Some((d(2024, 7, 25), d(2024, 7, 27))));
    }

    #[test]
    fn relative_dates() {
        assert_eq!(dates("para hoy"), Some((d(2024, 7, 1), d(2024, 7, 2))));
        assert_eq!(dates("para mañana"), Some((d(2024, 7, 2), d(2024, 7, 3))));
        assert_eq!(dates("pasado mañana"), Some((d(2024, 7, 3), d(2024, 7, 4))));
    }

    #[test]
    fn unrecognized_dates_are_absent() {
        assert_eq!(dates("Quiero hacer una reserva"), None);
        assert_eq!(dates("el 31 de febrero"), None);
        assert_eq!(dates("el 30/13"), None);
        assert_eq!(dates("para 2 noches"), None);
    }

    #[test]
    fn second_date_before_first_is_ignored() {
        assert_eq!(dates("el 27 de julio o el 25 de julio"), Some((d(2024, 7, 27), d(2024, 7, 28))));
    }

    #[test]
    fn party_size_forms() {
        let size = |t: &str| extract_party_size(&normalize(t));
        assert_eq!(size("somos 3"), Some(3));
        assert_eq!(size("para dos personas"), Some(2));
        assert_eq!(size("una habitación para 4"), Some(4));
        assert_eq!(size("2 adultos"), Some(2));
        assert_eq!(size("para el 25 de julio"), None);
        assert_eq!(size("para 25 de julio"), None);
        assert_eq!(size("para 2 noches"), None);
        assert_eq!(size("0 personas"), Some(0));
        assert_eq!(size("para 0 personas"), Some(0));
    }

    #[test]
    fn capitalized_names() {
        assert_eq!(
            extract_name("Hola, soy Ana García y mi email es ana@example.com").as_deref(),
            Some("Ana García")
        );
        assert_eq!(extract_name("Me llamo María de la Cruz.").as_deref(), Some("María de la Cruz"));
        assert_eq!(extract_name("A nombre de Juan Pérez, por favor").as_deref(), Some("Juan Pérez"));
    }

    #[test]
    fn lowercase_names_are_title_cased() {
        assert_eq!(
            extract_name("me llamo ana garcia y quiero reservar").as_deref(),
            Some("Ana Garcia")
        );
        assert_eq!(extract_name("soy de madrid"), None);
        assert_eq!(extract_name("hola buenas"), None);
    }

    #[test]
    fn contact_details() {
        let text = "Mi correo es Ana.Garcia@Example.com y mi teléfono +34 612 345 678";
        assert_eq!(extract_email(text).as_deref(), Some("ana.garcia@example.com"));
        assert_eq!(extract_phone(text, today()).as_deref(), Some("+34 612 345 678"));
        assert_eq!(extract_phone("el 2024-07-25 somos 2", today()), None);
        assert_eq!(extract_phone("llámame al 612345678", today()).as_deref(), Some("612345678"));
    }

    #[test]
    fn dashed_dates_are_not_phone_numbers() {
        assert_eq!(extract_phone("el 25-07-2024 2 personas", today()), None);
        assert_eq!(extract_phone("del 25-07-2024 al 27-07-2024", today()), None);
        assert_eq!(
            extract_phone("el 25-07-2024, tel 612 345 678", today()).as_deref(),
            Some("612 345 678")
        );
    }
}
