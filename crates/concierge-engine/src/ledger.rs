//! Reservation ledger: the authoritative reservation set plus the derived
//! per-date occupancy index.
//!
//! Invariant: for every room type and date, confirmed occupancy never
//! exceeds the room type's inventory. Each room type has its own mutex
//! around its occupancy map; booking and cancelling hold it across the
//! whole check, persist, apply sequence. Lock order is room type, then records.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{NaiveDate, SubsecRound, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{info, instrument, warn};

use concierge_core::booking::{GuestInfo, Reservation, ReservationStatus};
use concierge_core::dates::DateRange;
use concierge_core::ids::{ReservationId, RoomTypeId};
use concierge_store::{ReservationRepo, StoreError};

use crate::catalog::RoomCatalog;
use crate::error::BookingError;

/// Durable storage for reservations.
pub trait ReservationStore: Send + Sync {
    fn insert(&self, reservation: &Reservation) -> Result<(), StoreError>;
    fn set_status(&self, id: &ReservationId, status: ReservationStatus) -> Result<(), StoreError>;
    fn load_all(&self) -> Result<Vec<Reservation>, StoreError>;
}

impl ReservationStore for ReservationRepo {
    fn insert(&self, reservation: &Reservation) -> Result<(), StoreError> {
        ReservationRepo::insert(self, reservation)
    }

    fn set_status(&self, id: &ReservationId, status: ReservationStatus) -> Result<(), StoreError> {
        ReservationRepo::set_status(self, id, status)
    }

    fn load_all(&self) -> Result<Vec<Reservation>, StoreError> {
        self.list_all()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ReservationFilter {
    pub include_cancelled: bool,
    pub room_type: Option<RoomTypeId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DateAvailability {
    pub date: NaiveDate,
    pub available: u32,
}

/// Snapshot of free rooms per night. Advisory only: nothing is held.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub room_type: RoomTypeId,
    pub inventory: u32,
    pub nights: Vec<DateAvailability>,
}

impl Availability {
    /// Rooms bookable for the whole stay.
    pub fn bookable(&self) -> u32 {
        self.nights.iter().map(|n| n.available).min().unwrap_or(0)
    }
}

type Occupancy = BTreeMap<NaiveDate, u32>;

/// Longest stay accepted unless overridden with
/// [`ReservationLedger::with_max_stay_nights`].
pub const DEFAULT_MAX_STAY_NIGHTS: u32 = 30;

pub struct ReservationLedger {
    catalog: Arc<RoomCatalog>,
    store: Arc<dyn ReservationStore>,
    max_stay_nights: u32,
    /// One entry per catalog room type, fixed at construction.
    occupancy: HashMap<RoomTypeId, Mutex<Occupancy>>,
    records: RwLock<HashMap<ReservationId, Reservation>>,
}

impl ReservationLedger {
    /// Rebuild the ledger from storage. Fails if stored reservations
    /// reference unknown room types or already exceed capacity.
    #[instrument(skip_all)]
    pub fn open(catalog: Arc<RoomCatalog>, store: Arc<dyn ReservationStore>) -> Result<Self, BookingError> {
        let stored = store.load_all()?;

        let mut occupancy: HashMap<RoomTypeId, Occupancy> = catalog
            .list_room_types()
            .iter()
            .map(|rt| (rt.id.clone(), Occupancy::new()))
            .collect();
        let mut records = HashMap::with_capacity(stored.len());

        for reservation in stored {
            let Some(occ) = occupancy.get_mut(&reservation.room_type) else {
                return Err(BookingError::Persistence(format!(
                    "reservation {} references unknown room type {}",
                    reservation.id, reservation.room_type
                )));
            };
            if reservation.is_confirmed() {
                let inventory = catalog.get(&reservation.room_type)?.inventory;
                for date in reservation.dates.dates() {
                    let count = occ.entry(date).or_insert(0);
                    *count += 1;
                    if *count > inventory {
                        return Err(BookingError::Persistence(format!(
                            "stored reservations exceed capacity for {} on {date}",
                            reservation.room_type
                        )));
                    }
                }
            }
            records.insert(reservation.id.clone(), reservation);
        }

        info!(reservations = records.len(), room_types = occupancy.len(), "ledger loaded");

        Ok(Self {
            catalog,
            store,
            max_stay_nights: DEFAULT_MAX_STAY_NIGHTS,
            occupancy: occupancy
                .into_iter()
                .map(|(id, occ)| (id, Mutex::new(occ)))
                .collect(),
            records: RwLock::new(records),
        })
    }

    /// Reject stays longer than `nights` (clamped to at least one).
    pub fn with_max_stay_nights(mut self, nights: u32) -> Self {
        self.max_stay_nights = nights.max(1);
        self
    }

    pub fn max_stay_nights(&self) -> u32 {
        self.max_stay_nights
    }

    pub fn catalog(&self) -> &Arc<RoomCatalog> {
        &self.catalog
    }

    /// Checked before any room lock is taken: lookups and bookings walk
    /// every night of the stay.
    fn validate_stay(&self, dates: &DateRange) -> Result<(), BookingError> {
        if dates.nights() > self.max_stay_nights {
            return Err(BookingError::Validation(format!(
                "stays are limited to {} nights",
                self.max_stay_nights
            )));
        }
        Ok(())
    }

    fn room_lock(&self, room_type: &RoomTypeId) -> Result<&Mutex<Occupancy>, BookingError> {
        self.occupancy
            .get(room_type)
            .ok_or_else(|| BookingError::NotFound(format!("room type {room_type}")))
    }

    /// Free rooms per night for the stay. Never mutates state.
    pub fn check_availability(
        &self,
        room_type: &RoomTypeId,
        dates: &DateRange,
    ) -> Result<Availability, BookingError> {
        let inventory = self.catalog.get(room_type)?.inventory;
        self.validate_stay(dates)?;
        let occ = self.room_lock(room_type)?.lock();
        let nights = dates
            .dates()
            .map(|date| DateAvailability {
                date,
                available: inventory.saturating_sub(occ.get(&date).copied().unwrap_or(0)),
            })
            .collect();
        Ok(Availability {
            room_type: room_type.clone(),
            inventory,
            nights,
        })
    }

    /// Confirmed reservations covering `date` for `room_type`.
    pub fn occupancy(&self, room_type: &RoomTypeId, date: NaiveDate) -> u32 {
        self.occupancy
            .get(room_type)
            .and_then(|occ| occ.lock().get(&date).copied())
            .unwrap_or(0)
    }

    /// Book a room for every night of `dates`, or nothing at all.
    #[instrument(skip(self, guest), fields(room_type = %room_type, dates = %dates))]
    pub fn create_reservation(
        &self,
        room_type: &RoomTypeId,
        dates: DateRange,
        guest: GuestInfo,
    ) -> Result<Reservation, BookingError> {
        validate_guest(&guest)?;
        self.validate_stay(&dates)?;
        let inventory = self.catalog.get(room_type)?.inventory;

        let mut occ = self.room_lock(room_type)?.lock();

        if let Some(date) = dates
            .dates()
            .find(|date| occ.get(date).copied().unwrap_or(0) >= inventory)
        {
            info!(%date, "capacity exceeded");
            return Err(BookingError::CapacityExceeded {
                room_type: room_type.clone(),
                date,
            });
        }

        let reservation = Reservation {
            id: ReservationId::new(),
            room_type: room_type.clone(),
            dates,
            guest,
            created_at: Utc::now().trunc_subsecs(6),
            status: ReservationStatus::Confirmed,
        };

        // Persist first: a failed write leaves occupancy untouched.
        if let Err(e) = self.store.insert(&reservation) {
            warn!(reservation_id = %reservation.id, error = %e, "failed to persist reservation");
            return Err(e.into());
        }

        for date in reservation.dates.dates() {
            *occ.entry(date).or_insert(0) += 1;
        }
        self.records
            .write()
            .insert(reservation.id.clone(), reservation.clone());
        drop(occ);

        info!(reservation_id = %reservation.id, nights = reservation.dates.nights(), "reservation confirmed");
        Ok(reservation)
    }

    /// Cancel a reservation and release its nights. Cancelling twice is a no-op.
    #[instrument(skip(self), fields(reservation_id = %id))]
    pub fn cancel(&self, id: &ReservationId) -> Result<Reservation, BookingError> {
        let room_type = self.get(id)?.room_type;
        let mut occ = self.room_lock(&room_type)?.lock();

        // Re-read under the room lock: a concurrent cancel may have won.
        let current = self.get(id)?;
        if !current.is_confirmed() {
            return Ok(current);
        }

        if let Err(e) = self.store.set_status(id, ReservationStatus::Cancelled) {
            warn!(error = %e, "failed to persist cancellation");
            return Err(e.into());
        }

        for date in current.dates.dates() {
            if let Some(count) = occ.get_mut(&date) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    occ.remove(&date);
                }
            }
        }

        let mut records = self.records.write();
        let updated = records.get_mut(id).map(|r| {
            r.status = ReservationStatus::Cancelled;
            r.clone()
        });
        drop(records);
        drop(occ);

        info!(room_type = %room_type, "reservation cancelled");
        updated.ok_or_else(|| BookingError::NotFound(format!("reservation {id}")))
    }

    pub fn get(&self, id: &ReservationId) -> Result<Reservation, BookingError> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| BookingError::NotFound(format!("reservation {id}")))
    }

    /// Reservations ordered by creation time, then id.
    pub fn list_reservations(&self, filter: &ReservationFilter) -> Vec<Reservation> {
        let mut out: Vec<Reservation> = self
            .records
            .read()
            .values()
            .filter(|r| filter.include_cancelled || r.is_confirmed())
            .filter(|r| filter.room_type.as_ref().map_or(true, |rt| &r.room_type == rt))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        out
    }
}

fn validate_guest(guest: &GuestInfo) -> Result<(), BookingError> {
    if guest.name.trim().is_empty() {
        return Err(BookingError::Validation("guest name is required".into()));
    }
    if guest.party_size == 0 {
        return Err(BookingError::Validation("party size must be at least 1".into()));
    }
    if let Some(email) = &guest.email {
        if !email.contains('@') {
            return Err(BookingError::Validation(format!("invalid e-mail address {email}")));
        }
    }
    Ok(())
}
