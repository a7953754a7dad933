use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// A stay: check-in inclusive, check-out exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("check-out {check_out} must be after check-in {check_in}")]
pub struct InvalidDateRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl DateRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, InvalidDateRange> {
        if check_out <= check_in {
            return Err(InvalidDateRange {
                check_in,
                check_out,
            });
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    /// One-night stay starting on `date`.
    pub fn single_night(date: NaiveDate) -> Self {
        Self {
            check_in: date,
            check_out: date + Duration::days(1),
        }
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    pub fn nights(&self) -> u32 {
        (self.check_out - self.check_in).num_days() as u32
    }

    /// Every night covered by the stay, in order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let check_out = self.check_out;
        self.check_in.iter_days().take_while(move |d| *d < check_out)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.check_in && date < self.check_out
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nights() == 1 {
            write!(f, "{}", self.check_in.format("%d/%m/%Y"))
        } else {
            write!(
                f,
                "{} al {}",
                self.check_in.format("%d/%m/%Y"),
                self.check_out.format("%d/%m/%Y")
            )
        }
    }
}
