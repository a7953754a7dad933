use tracing::instrument;

use concierge_core::booking::{Rate, RoomType};
use concierge_core::ids::RoomTypeId;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

const COLUMNS: &str = "id, name, description, rate_minor, currency, inventory";

pub struct RoomTypeRepo {
    db: Database,
}

impl RoomTypeRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert or update every room type, recording slice order as load order.
    /// Runs in one transaction.
    #[instrument(skip(self, room_types), fields(count = room_types.len()))]
    pub fn upsert_all(&self, room_types: &[RoomType]) -> Result<(), StoreError> {
        self.db.with_transaction(|tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO room_types (id, name, description, rate_minor, currency, inventory, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     description = excluded.description,
                     rate_minor = excluded.rate_minor,
                     currency = excluded.currency,
                     inventory = excluded.inventory,
                     position = excluded.position",
            )?;
            for (position, rt) in room_types.iter().enumerate() {
                stmt.execute(rusqlite::params![
                    rt.id.as_str(),
                    rt.name,
                    rt.description,
                    rt.rate.amount_minor as i64,
                    rt.rate.currency,
                    rt.inventory,
                    position as i64,
                ])?;
            }
            Ok(())
        })
    }

    /// All room types in load order.
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<RoomType>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM room_types ORDER BY position ASC, id ASC"
            ))?;
            let mut rows = stmt.query([])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(row_to_room_type(row)?);
            }
            Ok(out)
        })
    }

    #[instrument(skip(self), fields(room_type = %id))]
    pub fn get(&self, id: &RoomTypeId) -> Result<RoomType, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM room_types WHERE id = ?1"))?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_room_type(row),
                None => Err(StoreError::NotFound(format!("room type {id}"))),
            }
        })
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        self.db.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM room_types", [], |row| row.get(0))?;
            Ok(n as usize)
        })
    }
}

fn row_to_room_type(row: &rusqlite::Row<'_>) -> Result<RoomType, StoreError> {
    let id: String = row_helpers::get(row, 0, "room_types", "id")?;
    let rate_minor: i64 = row_helpers::get(row, 3, "room_types", "rate_minor")?;
    let inventory: i64 = row_helpers::get(row, 5, "room_types", "inventory")?;
    let rate_minor = u64::try_from(rate_minor).map_err(|_| StoreError::CorruptRow {
        table: "room_types",
        column: "rate_minor",
        detail: format!("negative rate {rate_minor}"),
    })?;
    let inventory = u32::try_from(inventory).map_err(|_| StoreError::CorruptRow {
        table: "room_types",
        column: "inventory",
        detail: format!("out of range {inventory}"),
    })?;

    Ok(RoomType {
        id: RoomTypeId::from_raw(id),
        name: row_helpers::get(row, 1, "room_types", "name")?,
        description: row_helpers::get(row, 2, "room_types", "description")?,
        rate: Rate::new(rate_minor, row_helpers::get::<String>(row, 4, "room_types", "currency")?),
        inventory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(name: &str, price: u64, inventory: u32) -> RoomType {
        RoomType {
            id: RoomTypeId::from_name(name),
            name: name.to_string(),
            description: format!("{name} desc"),
            rate: Rate::whole(price, "EUR"),
            inventory,
        }
    }

    #[test]
    fn upsert_and_list_in_load_order() {
        let repo = RoomTypeRepo::new(Database::in_memory().unwrap());
        repo.upsert_all(&[room("Suite Junior", 140, 3), room("Doble Estándar", 85, 10)])
            .unwrap();

        let listed = repo.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id.as_str(), "suite-junior");
        assert_eq!(listed[1].name, "Doble Estándar");
        assert_eq!(listed[1].rate, Rate::whole(85, "EUR"));
        assert_eq!(listed[1].inventory, 10);
    }

    #[test]
    fn upsert_updates_existing() {
        let repo = RoomTypeRepo::new(Database::in_memory().unwrap());
        repo.upsert_all(&[room("Doble Estándar", 85, 10)]).unwrap();
        repo.upsert_all(&[room("Doble Estándar", 90, 12)]).unwrap();

        assert_eq!(repo.count().unwrap(), 1);
        let rt = repo.get(&RoomTypeId::from_raw("doble-estandar")).unwrap();
        assert_eq!(rt.rate.amount_minor, 9000);
        assert_eq!(rt.inventory, 12);
    }

    #[test]
    fn get_unknown_is_not_found() {
        let repo = RoomTypeRepo::new(Database::in_memory().unwrap());
        let result = repo.get(&RoomTypeId::from_raw("penthouse"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
