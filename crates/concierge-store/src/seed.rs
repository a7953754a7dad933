//! Catalog seed file (`hotel_data.json`).
//!
//! ```json
//! {"habitaciones": [{"tipo": "Doble Estándar", "descripcion": "...", "precio": 85, "moneda": "EUR", "total": 10}]}
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use concierge_core::booking::{Rate, RoomType};
use concierge_core::ids::RoomTypeId;

use crate::error::StoreError;
use crate::room_types::RoomTypeRepo;

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    habitaciones: Vec<SeedRoom>,
}

#[derive(Debug, Deserialize)]
struct SeedRoom {
    tipo: String,
    #[serde(default)]
    descripcion: String,
    precio: f64,
    #[serde(default = "default_currency")]
    moneda: String,
    total: u32,
}

fn default_currency() -> String {
    "EUR".to_string()
}

/// Parse seed JSON into room types, in file order.
pub fn parse_seed(json: &str) -> Result<Vec<RoomType>, StoreError> {
    let file: SeedFile = serde_json::from_str(json)?;
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(file.habitaciones.len());

    for room in file.habitaciones {
        let id = RoomTypeId::from_name(&room.tipo);
        if id.as_str().is_empty() {
            return Err(StoreError::InvalidSeed(format!("room type name {:?} is empty", room.tipo)));
        }
        if !seen.insert(id.clone()) {
            return Err(StoreError::InvalidSeed(format!("duplicate room type {id}")));
        }
        if !room.precio.is_finite() || room.precio < 0.0 {
            return Err(StoreError::InvalidSeed(format!(
                "room type {id} has invalid price {}",
                room.precio
            )));
        }
        out.push(RoomType {
            id,
            name: room.tipo.trim().to_string(),
            description: room.descripcion,
            rate: Rate::new((room.precio * 100.0).round() as u64, room.moneda),
            inventory: room.total,
        });
    }
    Ok(out)
}

/// Read the seed file. `Ok(None)` when the file does not exist.
pub fn load_seed_file(path: &Path) -> Result<Option<Vec<RoomType>>, StoreError> {
    if !path.exists() {
        debug!(path = %path.display(), "catalog seed file not found");
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| StoreError::Io(format!("read {}: {e}", path.display())))?;
    parse_seed(&content).map(Some)
}

/// Catalog written when neither the seed file nor the database has any room types.
pub fn default_catalog() -> Vec<RoomType> {
    vec![
        RoomType {
            id: RoomTypeId::from_name("Doble Estándar"),
            name: "Doble Estándar".to_string(),
            description: "Habitación doble con dos camas o cama de matrimonio.".to_string(),
            rate: Rate::whole(85, "EUR"),
            inventory: 10,
        },
        RoomType {
            id: RoomTypeId::from_name("Suite Junior"),
            name: "Suite Junior".to_string(),
            description: "Suite con salón independiente y vistas.".to_string(),
            rate: Rate::whole(140, "EUR"),
            inventory: 3,
        },
    ]
}

/// Bring the `room_types` table in line with the seed file and return the
/// catalog in load order.
pub fn seed_catalog(repo: &RoomTypeRepo, seed_path: &Path) -> Result<Vec<RoomType>, StoreError> {
    match load_seed_file(seed_path)? {
        Some(room_types) if !room_types.is_empty() => {
            info!(count = room_types.len(), path = %seed_path.display(), "seeding catalog");
            repo.upsert_all(&room_types)?;
        }
        _ => {
            if repo.count()? == 0 {
                info!("no catalog found, writing default room types");
                repo.upsert_all(&default_catalog())?;
            }
        }
    }
    repo.list()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    #[test]
    fn parse_seed_builds_slugs_and_minor_units() {
        let rooms = parse_seed(
            r#"{"habitaciones": [
                {"tipo": "Doble Estándar", "descripcion": "Dos camas", "precio": 85, "total": 10},
                {"tipo": "Suite Junior", "precio": 140.5, "moneda": "USD", "total": 3}
            ]}"#,
        )
        .unwrap();
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].id.as_str(), "doble-estandar");
        assert_eq!(rooms[0].rate, Rate::new(8500, "EUR"));
        assert_eq!(rooms[1].rate, Rate::new(14050, "USD"));
        assert_eq!(rooms[1].description, "");
    }

    #[test]
    fn duplicate_slugs_rejected() {
        let result = parse_seed(
            r#"{"habitaciones": [
                {"tipo": "Suite Junior", "precio": 1, "total": 1},
                {"tipo": "suite  júnior", "precio": 2, "total": 1}
            ]}"#,
        );
        assert!(matches!(result, Err(StoreError::InvalidSeed(_))));
    }

    #[test]
    fn negative_price_rejected() {
        let result = parse_seed(r#"{"habitaciones": [{"tipo": "X", "precio": -1, "total": 1}]}"#);
        assert!(matches!(result, Err(StoreError::InvalidSeed(_))));
    }

    #[test]
    fn missing_file_and_empty_db_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let repo = RoomTypeRepo::new(Database::in_memory().unwrap());
        let catalog = seed_catalog(&repo, &dir.path().join("hotel_data.json")).unwrap();
        assert_eq!(catalog, default_catalog());
    }

    #[test]
    fn missing_file_keeps_existing_db_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let repo = RoomTypeRepo::new(Database::in_memory().unwrap());
        repo.upsert_all(&default_catalog()[1..]).unwrap();

        let catalog = seed_catalog(&repo, &dir.path().join("hotel_data.json")).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].id.as_str(), "suite-junior");
    }

    #[test]
    fn seed_file_is_upserted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hotel_data.json");
        std::fs::write(
            &path,
            r#"{"habitaciones": [{"tipo": "Individual", "precio": 60, "total": 4}]}"#,
        )
        .unwrap();
        let repo = RoomTypeRepo::new(Database::in_memory().unwrap());
        let catalog = seed_catalog(&repo, &path).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].inventory, 4);
    }
}
