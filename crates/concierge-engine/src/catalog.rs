use std::collections::HashMap;

use concierge_core::booking::RoomType;
use concierge_core::ids::RoomTypeId;
use concierge_core::text::normalize;

use crate::error::BookingError;

/// Read-only room type catalog, in load order.
#[derive(Debug)]
pub struct RoomCatalog {
    room_types: Vec<RoomType>,
    index: HashMap<RoomTypeId, usize>,
    /// Normalized display names, parallel to `room_types`.
    names: Vec<String>,
}

impl RoomCatalog {
    pub fn new(room_types: Vec<RoomType>) -> Result<Self, BookingError> {
        let mut index = HashMap::with_capacity(room_types.len());
        for (i, rt) in room_types.iter().enumerate() {
            if index.insert(rt.id.clone(), i).is_some() {
                return Err(BookingError::Validation(format!("duplicate room type {}", rt.id)));
            }
        }
        let names = room_types.iter().map(|rt| normalize(&rt.name)).collect();
        Ok(Self {
            room_types,
            index,
            names,
        })
    }

    pub fn list_room_types(&self) -> &[RoomType] {
        &self.room_types
    }

    pub fn get(&self, id: &RoomTypeId) -> Result<&RoomType, BookingError> {
        self.index
            .get(id)
            .map(|&i| &self.room_types[i])
            .ok_or_else(|| BookingError::NotFound(format!("room type {id}")))
    }

    pub fn len(&self) -> usize {
        self.room_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.room_types.is_empty()
    }

    /// Find the room type a free-text message refers to.
    ///
    /// A full display-name match wins (longest first). Otherwise a single
    /// distinctive word of one name ("suite", "doble") is enough, as long as
    /// no other room type shares it.
    pub fn find_by_mention(&self, text: &str) -> Option<&RoomType> {
        let text = normalize(text);
        let words: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let full = self
            .names
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty() && text.contains(name.as_str()))
            .max_by_key(|(_, name)| name.len());
        if let Some((i, _)) = full {
            return Some(&self.room_types[i]);
        }

        let mut found: Option<usize> = None;
        for (i, name) in self.names.iter().enumerate() {
            let hit = name
                .split_whitespace()
                .filter(|token| token.len() >= 4)
                .any(|token| words.iter().any(|w| matches_word(w, token)));
            if hit {
                if found.is_some_and(|prev| prev != i) {
                    return None;
                }
                found = Some(i);
            }
        }
        found.map(|i| &self.room_types[i])
    }
}

/// Word equality tolerating a Spanish plural ("dobles", "suites").
fn matches_word(word: &str, token: &str) -> bool {
    word == token
        || word.strip_suffix("es") == Some(token)
        || word.strip_suffix('s') == Some(token)
}
