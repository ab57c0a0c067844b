//! Data models for the air quality pipeline.
//!
//! Readings and station records are stored with UTC instants; Korean local
//! time (KST, fixed UTC+9) is applied only at the serialization boundary.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// ---

/// KST has no daylight saving, so a fixed offset is sufficient.
const KST_OFFSET_SECS: i32 = 9 * 3600;

pub fn kst() -> FixedOffset {
    // ---
    FixedOffset::east_opt(KST_OFFSET_SECS).unwrap()
}

/// Tag a zone-naive civil time known to be KST and normalize it to UTC.
///
/// The station API reports clock times in Korean local time without an
/// offset; tagging must be explicit rather than relying on the process zone.
pub fn tag_kst(civil: NaiveDateTime) -> DateTime<Utc> {
    // ---
    // A fixed offset has no ambiguous or skipped local times
    civil.and_local_timezone(kst()).unwrap().with_timezone(&Utc)
}

/// Format a stored UTC instant as a KST wall-clock string.
pub fn to_kst_string(instant: DateTime<Utc>, fmt: &str) -> String {
    // ---
    instant.with_timezone(&kst()).format(fmt).to_string()
}

// ---

/// Sentinel-aware float parse: empty and "no data" markers become absent
/// instead of failing the whole record.
pub fn parse_float_field(raw: &str) -> Option<f64> {
    // ---
    let s = raw.trim();
    if matches!(s, "" | "-" | "nan" | "NaN" | "null" | "None") {
        return None;
    }
    s.parse::<f64>().ok()
}

pub fn parse_int_field(raw: &str) -> Option<i32> {
    // ---
    parse_float_field(raw).map(|v| v as i32)
}

// ---

/// An incoming sensor reading before it is persisted.
///
/// Every field is optional: the ESP32 firmware reports "-" for sensors that
/// failed to sample, and the structured endpoint accepts partial objects.
#[derive(Debug, Default, Deserialize)]
pub struct NewReading {
    // ---
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub co2: Option<i32>,
    pub voc: Option<f64>,
    pub pm1: Option<f64>,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
}

impl NewReading {
    /// Parse the firmware's comma-separated upload line.
    ///
    /// Field order is fixed: temperature, humidity, co2, voc, pm2_5, pm10.
    /// Anything other than exactly six fields is rejected before any write.
    pub fn from_csv_line(line: &str) -> Result<Self, String> {
        // ---
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() != 6 {
            return Err(format!("invalid payload (need 6 fields): {line}"));
        }

        Ok(NewReading {
            temperature: parse_float_field(parts[0]),
            humidity: parse_float_field(parts[1]),
            co2: parse_int_field(parts[2]),
            voc: parse_float_field(parts[3]),
            pm1: None,
            pm2_5: parse_float_field(parts[4]),
            pm10: parse_float_field(parts[5]),
        })
    }
}

/// A stored sensor reading as served by the read endpoints.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Reading {
    // ---
    pub id: i32,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub co2: Option<i32>,
    pub voc: Option<f64>,
    pub pm1: Option<f64>,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
    pub measured_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub measured_at_kst: String,
}

impl Reading {
    pub fn with_kst(mut self) -> Self {
        // ---
        self.measured_at_kst = to_kst_string(self.measured_at, "%Y-%m-%d %H:%M:%S");
        self
    }
}

/// A severity score joined with the reading it was derived from.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ScoreRow {
    // ---
    pub id: i32,
    pub reading_id: i32,
    pub value: i16,
    pub computed_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub computed_at_kst: String,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
}

impl ScoreRow {
    pub fn with_kst(mut self) -> Self {
        // ---
        self.computed_at_kst = to_kst_string(self.computed_at, "%Y-%m-%d %H:%M:%S");
        self
    }
}

/// One deduplicated historical record from the national air quality API.
///
/// `recorded_at` is the upstream civil timestamp tagged KST and normalized
/// to UTC; it is the natural key, so the table never holds two rows for the
/// same upstream observation.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct StationRecord {
    // ---
    pub recorded_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub recorded_at_kst: String,
    pub pm10: Option<f64>,
    pub pm2_5: Option<f64>,
    pub pm10_category: Option<i16>,
    pub pm2_5_category: Option<i16>,
    pub o3: Option<f64>,
    pub no2: Option<f64>,
    pub co: Option<f64>,
    pub so2: Option<f64>,
}

impl StationRecord {
    pub fn with_kst(mut self) -> Self {
        // ---
        self.recorded_at_kst = to_kst_string(self.recorded_at, "%Y-%m-%d %H:%M");
        self
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{NaiveDate, TimeZone, Timelike};

    #[test]
    fn test_csv_line_parses_all_fields() {
        // ---
        let r = NewReading::from_csv_line("22.4,51.0,412,0.12,20,40").unwrap();

        assert_eq!(r.temperature, Some(22.4));
        assert_eq!(r.humidity, Some(51.0));
        assert_eq!(r.co2, Some(412));
        assert_eq!(r.voc, Some(0.12));
        assert_eq!(r.pm1, None);
        assert_eq!(r.pm2_5, Some(20.0));
        assert_eq!(r.pm10, Some(40.0));
    }

    #[test]
    fn test_csv_line_rejects_wrong_field_count() {
        // ---
        assert!(NewReading::from_csv_line("1,2,3,4,5").is_err());
        assert!(NewReading::from_csv_line("1,2,3,4,5,6,7").is_err());
        assert!(NewReading::from_csv_line("").is_err());
    }

    #[test]
    fn test_sentinel_fields_become_absent() {
        // ---
        let r = NewReading::from_csv_line("22.4,51.0,412,0.12,-,nan").unwrap();

        assert_eq!(r.pm2_5, None);
        assert_eq!(r.pm10, None);

        assert_eq!(parse_float_field(""), None);
        assert_eq!(parse_float_field("null"), None);
        assert_eq!(parse_float_field("None"), None);
        assert_eq!(parse_float_field("garbage"), None);
        assert_eq!(parse_int_field("-"), None);
        assert_eq!(parse_int_field("2"), Some(2));
    }

    #[test]
    fn test_kst_tagging_normalizes_to_utc() {
        // ---
        // 2025-03-26 18:00 KST is 09:00 UTC
        let civil = NaiveDate::from_ymd_opt(2025, 3, 26)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        let utc = tag_kst(civil);

        assert_eq!(utc.hour(), 9);
        assert_eq!(to_kst_string(utc, "%Y-%m-%d %H:%M"), "2025-03-26 18:00");
    }

    #[test]
    fn test_kst_tagging_is_stable_across_midnight() {
        // ---
        // 2025-01-01 03:30 KST is still 2024-12-31 in UTC
        let civil = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(3, 30, 0)
            .unwrap();
        let utc = tag_kst(civil);

        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 12, 31, 18, 30, 0).unwrap());
        assert_eq!(to_kst_string(utc, "%Y-%m-%d %H:%M"), "2025-01-01 03:30");
    }
}
