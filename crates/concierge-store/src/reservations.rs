use tracing::instrument;

use concierge_core::booking::{GuestInfo, Reservation, ReservationStatus};
use concierge_core::dates::DateRange;
use concierge_core::ids::{ReservationId, RoomTypeId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

const COLUMNS: &str = "id, room_type_id, check_in, check_out, guest_name, guest_email, \
                       guest_phone, party_size, status, created_at";

pub struct ReservationRepo {
    db: Database,
}

impl ReservationRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, reservation), fields(reservation_id = %reservation.id, room_type = %reservation.room_type))]
    pub fn insert(&self, reservation: &Reservation) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let result = conn.execute(
                "INSERT INTO reservations (id, room_type_id, check_in, check_out, guest_name,
                     guest_email, guest_phone, party_size, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    reservation.id.as_str(),
                    reservation.room_type.as_str(),
                    reservation.dates.check_in().format("%Y-%m-%d").to_string(),
                    reservation.dates.check_out().format("%Y-%m-%d").to_string(),
                    reservation.guest.name,
                    reservation.guest.email,
                    reservation.guest.phone,
                    reservation.guest.party_size,
                    reservation.status.to_string(),
                    reservation
                        .created_at
                        .to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::Conflict(format!("reservation {}", reservation.id)))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    #[instrument(skip(self), fields(reservation_id = %id, status = %status))]
    pub fn set_status(&self, id: &ReservationId, status: ReservationStatus) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE reservations SET status = ?1 WHERE id = ?2",
                rusqlite::params![status.to_string(), id.as_str()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("reservation {id}")));
            }
            Ok(())
        })
    }

    #[instrument(skip(self), fields(reservation_id = %id))]
    pub fn get(&self, id: &ReservationId) -> Result<Reservation, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM reservations WHERE id = ?1"))?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_reservation(row),
                None => Err(StoreError::NotFound(format!("reservation {id}"))),
            }
        })
    }

    /// Every reservation, both statuses, ordered by creation time then id.
    #[instrument(skip(self))]
    pub fn list_all(&self) -> Result<Vec<Reservation>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM reservations ORDER BY created_at ASC, id ASC"
            ))?;
            let mut rows = stmt.query([])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(row_to_reservation(row)?);
            }
            Ok(out)
        })
    }
}

fn row_to_reservation(row: &rusqlite::Row<'_>) -> Result<Reservation, StoreError> {
    const T: &str = "reservations";
    let id: String = row_helpers::get(row, 0, T, "id")?;
    let room_type: String = row_helpers::get(row, 1, T, "room_type_id")?;
    let check_in: String = row_helpers::get(row, 2, T, "check_in")?;
    let check_out: String = row_helpers::get(row, 3, T, "check_out")?;
    let status: String = row_helpers::get(row, 8, T, "status")?;
    let created_at: String = row_helpers::get(row, 9, T, "created_at")?;

    let check_in = row_helpers::parse_date(&check_in, T, "check_in")?;
    let check_out = row_helpers::parse_date(&check_out, T, "check_out")?;
    let dates = DateRange::new(check_in, check_out).map_err(|e| StoreError::CorruptRow {
        table: T,
        column: "check_out",
        detail: e.to_string(),
    })?;

    Ok(Reservation {
        id: ReservationId::from_raw(id),
        room_type: RoomTypeId::from_raw(room_type),
        dates,
        guest: GuestInfo {
            name: row_helpers::get(row, 4, T, "guest_name")?,
            email: row_helpers::get(row, 5, T, "guest_email")?,
            phone: row_helpers::get(row, 6, T, "guest_phone")?,
            party_size: row_helpers::get(row, 7, T, "party_size")?,
        },
        created_at: row_helpers::parse_timestamp(&created_at, T, "created_at")?,
        status: row_helpers::parse_enum(&status, T, "status")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room_types::RoomTypeRepo;
    use chrono::{NaiveDate, TimeZone, Utc};
    use concierge_core::booking::{Rate, RoomType};

    fn setup() -> (Database, ReservationRepo) {
        let db = Database::in_memory().unwrap();
        RoomTypeRepo::new(db.clone())
            .upsert_all(&[RoomType {
                id: RoomTypeId::from_raw("doble-estandar"),
                name: "Doble Estándar".into(),
                description: String::new(),
                rate: Rate::whole(85, "EUR"),
                inventory: 10,
            }])
            .unwrap();
        let repo = ReservationRepo::new(db.clone());
        (db, repo)
    }

    fn reservation(minute: u32) -> Reservation {
        let check_in = NaiveDate::from_ymd_opt(2024, 7, 25).unwrap();
        Reservation {
            id: ReservationId::new(),
            room_type: RoomTypeId::from_raw("doble-estandar"),
            dates: DateRange::new(check_in, NaiveDate::from_ymd_opt(2024, 7, 27).unwrap()).unwrap(),
            guest: GuestInfo {
                name: "Ana García".into(),
                email: Some("ana@example.com".into()),
                phone: None,
                party_size: 2,
            },
            created_at: Utc.with_ymd_and_hms(2024, 7, 1, 12, minute, 0).unwrap(),
            status: ReservationStatus::Confirmed,
        }
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let (_db, repo) = setup();
        let r = reservation(0);
        repo.insert(&r).unwrap();
        assert_eq!(repo.get(&r.id).unwrap(), r);
    }

    #[test]
    fn duplicate_insert_conflicts() {
        let (_db, repo) = setup();
        let r = reservation(0);
        repo.insert(&r).unwrap();
        assert!(matches!(repo.insert(&r), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn unknown_room_type_rejected_by_foreign_key() {
        let (_db, repo) = setup();
        let mut r = reservation(0);
        r.room_type = RoomTypeId::from_raw("penthouse");
        assert!(repo.insert(&r).is_err());
    }

    #[test]
    fn set_status_and_not_found() {
        let (_db, repo) = setup();
        let r = reservation(0);
        repo.insert(&r).unwrap();
        repo.set_status(&r.id, ReservationStatus::Cancelled).unwrap();
        assert_eq!(repo.get(&r.id).unwrap().status, ReservationStatus::Cancelled);

        let missing = ReservationId::from_raw("res_missing");
        assert!(matches!(
            repo.set_status(&missing, ReservationStatus::Cancelled),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(repo.get(&missing), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn list_all_orders_by_creation() {
        let (_db, repo) = setup();
        let later = reservation(30);
        let earlier = reservation(5);
        repo.insert(&later).unwrap();
        repo.insert(&earlier).unwrap();

        let ids: Vec<_> = repo.list_all().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![earlier.id, later.id]);
    }

    #[test]
    fn corrupt_status_surfaces_as_corrupt_row() {
        let (db, repo) = setup();
        let r = reservation(0);
        repo.insert(&r).unwrap();
        db.with_conn(|conn| {
            conn.execute("UPDATE reservations SET status = 'pending'", [])?;
            Ok(())
        })
        .unwrap();
        assert!(matches!(
            repo.list_all(),
            Err(StoreError::CorruptRow { column: "status", .. })
        ));
    }
}
