//! GPS ↔ UTC time conversion.
//!
//! GPS time runs continuously from 1980-01-06T00:00:00Z while UTC inserts leap
//! seconds, so the offset between the two scales comes from a leap-second table.
//! The table has a validity horizon: epochs past it may be off by a second if a
//! leap second was announced after the table was built, so callers should run
//! [`LeapSecondTable::check_validity`] on the epochs they process.

use crate::types::{GnssrError, GnssrResult, GpsEpoch, SECONDS_PER_WEEK};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unix timestamp of the GPS epoch, 1980-01-06T00:00:00Z
pub const GPS_EPOCH_UNIX: i64 = 315_964_800;

/// (UTC unix time the offset takes effect, GPS - UTC in seconds)
const BUILTIN_LEAP_SECONDS: [(i64, i32); 18] = [
    (362_793_600, 1),    // 1981-07-01
    (394_329_600, 2),    // 1982-07-01
    (425_865_600, 3),    // 1983-07-01
    (489_024_000, 4),    // 1985-07-01
    (567_993_600, 5),    // 1988-01-01
    (631_152_000, 6),    // 1990-01-01
    (662_688_000, 7),    // 1991-01-01
    (709_948_800, 8),    // 1992-07-01
    (741_484_800, 9),    // 1993-07-01
    (773_020_800, 10),   // 1994-07-01
    (820_454_400, 11),   // 1996-01-01
    (867_715_200, 12),   // 1997-07-01
    (915_148_800, 13),   // 1999-01-01
    (1_136_073_600, 14), // 2006-01-01
    (1_230_768_000, 15), // 2009-01-01
    (1_341_100_800, 16), // 2012-07-01
    (1_435_708_800, 17), // 2015-07-01
    (1_483_228_800, 18), // 2017-01-01
];

/// Validity horizon of the builtin table (IERS Bulletin C 70: no leap
/// second before 2026-06-28)
const BUILTIN_EXPIRES_UNIX: i64 = 1_782_604_800;

/// A leap second insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeapSecond {
    /// UTC unix time at which the new offset applies
    pub effective_unix: i64,
    /// GPS - UTC offset in seconds from that instant on
    pub gps_utc_offset: i32,
}

/// GPS - UTC leap second table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeapSecondTable {
    entries: Vec<LeapSecond>,
    expires_unix: i64,
}

impl Default for LeapSecondTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl LeapSecondTable {
    /// Table compiled into the crate
    pub fn builtin() -> Self {
        let entries = BUILTIN_LEAP_SECONDS
            .iter()
            .map(|&(effective_unix, gps_utc_offset)| LeapSecond {
                effective_unix,
                gps_utc_offset,
            })
            .collect();

        Self {
            entries,
            expires_unix: BUILTIN_EXPIRES_UNIX,
        }
    }

    /// Build a table from explicit entries
    pub fn new(mut entries: Vec<LeapSecond>, expires: DateTime<Utc>) -> GnssrResult<Self> {
        entries.sort_by_key(|e| e.effective_unix);
        entries.dedup_by_key(|e| e.effective_unix);

        for pair in entries.windows(2) {
            if pair[1].gps_utc_offset < pair[0].gps_utc_offset {
                return Err(GnssrError::Config(format!(
                    "leap second offsets must not decrease ({} s at {} after {} s)",
                    pair[1].gps_utc_offset, pair[1].effective_unix, pair[0].gps_utc_offset
                )));
            }
        }

        Ok(Self {
            entries,
            expires_unix: expires.timestamp(),
        })
    }

    /// Extend the builtin table with newer announcements
    pub fn extended(extra: &[LeapSecond], expires: Option<DateTime<Utc>>) -> GnssrResult<Self> {
        let builtin = Self::builtin();
        let mut entries = builtin.entries;
        entries.extend_from_slice(extra);

        let latest_extra = extra.iter().map(|e| e.effective_unix).max();
        let expires_unix = match (expires, latest_extra) {
            (Some(expires), _) => expires.timestamp(),
            (None, Some(latest)) => latest.max(builtin.expires_unix),
            (None, None) => builtin.expires_unix,
        };

        let expires = DateTime::<Utc>::from_timestamp(expires_unix, 0).ok_or_else(|| {
            GnssrError::Config(format!("invalid leap table expiry {}", expires_unix))
        })?;
        Self::new(entries, expires)
    }

    pub fn entries(&self) -> &[LeapSecond] {
        &self.entries
    }

    /// Last instant the table is known to be complete
    pub fn expires(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.expires_unix, 0)
    }

    /// GPS - UTC offset in force at a UTC unix time
    pub fn offset_at_utc(&self, utc_unix: f64) -> i32 {
        self.entries
            .iter()
            .rev()
            .find(|e| utc_unix >= e.effective_unix as f64)
            .map_or(0, |e| e.gps_utc_offset)
    }

    /// GPS - UTC offset in force at an elapsed GPS time
    pub fn offset_at_gps(&self, gps_seconds: f64) -> i32 {
        self.entries
            .iter()
            .rev()
            .find(|e| {
                let effective_gps =
                    (e.effective_unix - GPS_EPOCH_UNIX) as f64 + e.gps_utc_offset as f64;
                gps_seconds >= effective_gps
            })
            .map_or(0, |e| e.gps_utc_offset)
    }

    /// GPS week and second of week to UTC unix timestamp
    pub fn gps_to_utc(&self, week: i64, seconds: f64) -> f64 {
        let gps_total = week as f64 * SECONDS_PER_WEEK + seconds;
        let offset = self.offset_at_gps(gps_total);
        GPS_EPOCH_UNIX as f64 + gps_total - offset as f64
    }

    /// UTC unix timestamp to GPS week and second of week
    pub fn utc_to_gps(&self, utc_unix: f64) -> GpsEpoch {
        let offset = self.offset_at_utc(utc_unix);
        let gps_total = utc_unix - GPS_EPOCH_UNIX as f64 + offset as f64;

        let mut week = (gps_total / SECONDS_PER_WEEK).floor();
        let mut seconds = gps_total - week * SECONDS_PER_WEEK;
        // floor() can leave the remainder one ulp outside [0, week)
        if seconds >= SECONDS_PER_WEEK {
            week += 1.0;
            seconds -= SECONDS_PER_WEEK;
        } else if seconds < 0.0 {
            week -= 1.0;
            seconds += SECONDS_PER_WEEK;
        }

        GpsEpoch::new(week as i64, seconds)
    }

    /// Element-wise [`gps_to_utc`](Self::gps_to_utc)
    pub fn gps_to_utc_array(&self, weeks: &[i64], seconds: &[f64]) -> GnssrResult<Vec<f64>> {
        if weeks.len() != seconds.len() {
            return Err(GnssrError::Shape(format!(
                "GPS weeks ({}) and seconds ({}) differ in length",
                weeks.len(),
                seconds.len()
            )));
        }

        Ok(weeks
            .iter()
            .zip(seconds)
            .map(|(&week, &sec)| self.gps_to_utc(week, sec))
            .collect())
    }

    /// Element-wise [`utc_to_gps`](Self::utc_to_gps)
    pub fn utc_to_gps_array(&self, utc_unix: &[f64]) -> Vec<GpsEpoch> {
        utc_unix.iter().map(|&t| self.utc_to_gps(t)).collect()
    }

    /// Warn when processed epochs run past the table's validity horizon.
    ///
    /// Returns `false` if any epoch is beyond it.
    pub fn check_validity(&self, utc_unix: &[f64]) -> bool {
        let latest = utc_unix
            .iter()
            .copied()
            .filter(|t| t.is_finite())
            .fold(f64::NEG_INFINITY, f64::max);

        if latest > self.expires_unix as f64 {
            let expires = self
                .expires()
                .map_or_else(|| self.expires_unix.to_string(), |d| d.to_rfc3339());
            log::warn!(
                "Leap second table expired at {}; epochs up to {:.0} may be off by whole seconds",
                expires,
                latest
            );
            return false;
        }

        true
    }
}
