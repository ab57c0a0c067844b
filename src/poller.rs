//! Background polling of the national air quality API.
//!
//! A single long-lived task fetches the newest record for one monitoring
//! station on a fixed interval and persists it only if its timestamp has not
//! been seen before. Every kind of failure (transport, malformed payload,
//! database) ends the current cycle with a log line and leaves the loop
//! running; the next tick retries naturally.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDateTime;
use serde::Deserialize;
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::models::{parse_float_field, parse_int_field, tag_kst, StationRecord};
use crate::Config;

// ---

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Timestamp layout of the API's `dataTime` field, KST civil time.
const DATA_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Result code the API uses for a successful query.
const RESULT_OK: &str = "00";

// ---

/// Response envelope of the station measurement API.
///
/// Numeric values arrive as strings with "-" standing in for "no data";
/// grade fields can additionally carry non-numeric markers like "N/A".
#[derive(Debug, Deserialize)]
struct Envelope {
    // ---
    response: ResponseBody,
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    // ---
    header: ResponseHeader,
    #[serde(default)]
    body: Option<ResponseItems>,
}

#[derive(Debug, Deserialize)]
struct ResponseHeader {
    // ---
    #[serde(rename = "resultCode")]
    result_code: String,
    #[serde(rename = "resultMsg", default)]
    result_msg: String,
}

#[derive(Debug, Deserialize)]
struct ResponseItems {
    // ---
    #[serde(default)]
    items: Vec<StationItem>,
}

#[derive(Debug, Deserialize)]
struct StationItem {
    // ---
    #[serde(rename = "dataTime")]
    data_time: String,
    #[serde(rename = "pm10Value", default)]
    pm10_value: String,
    #[serde(rename = "pm25Value", default)]
    pm25_value: String,
    #[serde(rename = "pm10Grade", default)]
    pm10_grade: String,
    #[serde(rename = "pm25Grade", default)]
    pm25_grade: String,
    #[serde(rename = "o3Value", default)]
    o3_value: String,
    #[serde(rename = "no2Value", default)]
    no2_value: String,
    #[serde(rename = "coValue", default)]
    co_value: String,
    #[serde(rename = "so2Value", default)]
    so2_value: String,
}

impl StationItem {
    /// Convert one API item into a storable record.
    ///
    /// The only hard requirement is a parseable `dataTime`; every value
    /// field degrades to absent on a sentinel or malformed string.
    fn into_record(self) -> Result<StationRecord> {
        // ---
        let civil = NaiveDateTime::parse_from_str(&self.data_time, DATA_TIME_FORMAT)
            .with_context(|| format!("unparseable dataTime: {:?}", self.data_time))?;

        Ok(StationRecord {
            recorded_at: tag_kst(civil),
            recorded_at_kst: String::new(),
            pm10: parse_float_field(&self.pm10_value),
            pm2_5: parse_float_field(&self.pm25_value),
            pm10_category: parse_int_field(&self.pm10_grade).map(|v| v as i16),
            pm2_5_category: parse_int_field(&self.pm25_grade).map(|v| v as i16),
            o3: parse_float_field(&self.o3_value),
            no2: parse_float_field(&self.no2_value),
            co: parse_float_field(&self.co_value),
            so2: parse_float_field(&self.so2_value),
        })
    }
}

/// What a completed poll cycle did.
#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome {
    // ---
    Inserted,
    AlreadyPresent,
}

// ---

/// Periodic poll-and-dedup worker for one monitoring station.
#[derive(Debug, Clone)]
pub struct StationPoller {
    // ---
    client: reqwest::Client,
    pool: PgPool,
    api_url: String,
    service_key: String,
    station_name: String,
    interval: Duration,
}

impl StationPoller {
    /// Build the poller, failing startup if the HTTP client cannot be
    /// constructed: the fetch timeout is part of the polling contract.
    pub fn new(cfg: &Config, pool: PgPool) -> Result<Self> {
        // ---
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("failed to build station HTTP client")?;

        Ok(StationPoller {
            client,
            pool,
            api_url: cfg.station_api_url.clone(),
            service_key: cfg.station_api_key.clone(),
            station_name: cfg.station_name.clone(),
            interval: Duration::from_secs(u64::from(cfg.poll_interval_secs)),
        })
    }

    /// Drive the poll loop until the stop signal flips.
    ///
    /// The first tick fires immediately; afterwards the cadence is fixed
    /// regardless of cycle outcome. Intended to be spawned as a task.
    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        // ---
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    info!("Polling station '{}'", self.station_name);
                    match self.poll_once().await {
                        Ok(PollOutcome::Inserted) => {
                            info!("Stored new station record");
                        }
                        Ok(PollOutcome::AlreadyPresent) => {
                            info!("Station record already stored, skipping");
                        }
                        Err(e) => {
                            // Transient: the next tick retries
                            warn!("Station poll cycle failed: {:#}", e);
                        }
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        info!("Station poller stopping");
                        break;
                    }
                }
            }
        }
    }

    /// One fetch-parse-dedup-persist cycle.
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        // ---
        let record = self.fetch_latest().await?;
        self.store_if_absent(&record).await
    }

    /// Fetch the newest measurement for the configured station.
    async fn fetch_latest(&self) -> Result<StationRecord> {
        // ---
        let envelope: Envelope = self
            .client
            .get(&self.api_url)
            .query(&[
                ("serviceKey", self.service_key.as_str()),
                ("stationName", self.station_name.as_str()),
                ("dataTerm", "DAILY"),
                ("pageNo", "1"),
                ("numOfRows", "1"),
                ("returnType", "json"),
                ("ver", "1.3"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let header = &envelope.response.header;
        if header.result_code != RESULT_OK {
            bail!(
                "station API error: code={} msg={}",
                header.result_code,
                header.result_msg
            );
        }

        envelope
            .response
            .body
            .and_then(|b| b.items.into_iter().next())
            .ok_or_else(|| anyhow!("station API returned no items"))?
            .into_record()
    }

    /// Insert the record unless its timestamp was already seen.
    ///
    /// The explicit existence check keeps the common repeat-poll quiet; the
    /// `ON CONFLICT DO NOTHING` covers the race where another tick inserts
    /// the same timestamp between check and insert.
    async fn store_if_absent(&self, record: &StationRecord) -> Result<PollOutcome> {
        // ---
        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM station_records WHERE recorded_at = $1",
        )
        .bind(record.recorded_at)
        .fetch_one(&self.pool)
        .await?;

        if existing > 0 {
            return Ok(PollOutcome::AlreadyPresent);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO station_records (
                recorded_at, pm10, pm2_5, pm10_category, pm2_5_category,
                o3, no2, co, so2
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (recorded_at) DO NOTHING
            "#,
        )
        .bind(record.recorded_at)
        .bind(record.pm10)
        .bind(record.pm2_5)
        .bind(record.pm10_category)
        .bind(record.pm2_5_category)
        .bind(record.o3)
        .bind(record.no2)
        .bind(record.co)
        .bind(record.so2)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Ok(PollOutcome::AlreadyPresent),
            Ok(_) => Ok(PollOutcome::Inserted),
            Err(e) => {
                error!("Failed to store station record: {}", e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_item_json() -> &'static str {
        // ---
        r#"{
            "dataTime": "2025-03-26 18:00",
            "pm10Value": "42",
            "pm25Value": "18.5",
            "pm10Grade": "2",
            "pm25Grade": "2",
            "o3Value": "0.03",
            "no2Value": "0.02",
            "coValue": "0.4",
            "so2Value": "0.003"
        }"#
    }

    #[test]
    fn test_item_maps_to_record() {
        // ---
        let item: StationItem = serde_json::from_str(sample_item_json()).unwrap();
        let record = item.into_record().unwrap();

        // 18:00 KST == 09:00 UTC
        assert_eq!(
            record.recorded_at,
            Utc.with_ymd_and_hms(2025, 3, 26, 9, 0, 0).unwrap()
        );
        assert_eq!(record.pm10, Some(42.0));
        assert_eq!(record.pm2_5, Some(18.5));
        assert_eq!(record.pm10_category, Some(2));
        assert_eq!(record.pm2_5_category, Some(2));
        assert_eq!(record.o3, Some(0.03));
        assert_eq!(record.so2, Some(0.003));
    }

    #[test]
    fn test_sentinel_values_become_null_fields() {
        // ---
        let item: StationItem = serde_json::from_str(
            r#"{
                "dataTime": "2025-03-26 19:00",
                "pm10Value": "-",
                "pm25Value": "-",
                "pm10Grade": "N/A",
                "pm25Grade": "",
                "o3Value": "-",
                "no2Value": "-",
                "coValue": "-",
                "so2Value": "-"
            }"#,
        )
        .unwrap();

        // Sentinels degrade individual fields, never the whole record
        let record = item.into_record().unwrap();
        assert_eq!(record.pm10, None);
        assert_eq!(record.pm2_5, None);
        assert_eq!(record.pm10_category, None);
        assert_eq!(record.pm2_5_category, None);
        assert_eq!(record.o3, None);
    }

    #[test]
    fn test_bad_timestamp_rejects_record() {
        // ---
        let item: StationItem =
            serde_json::from_str(r#"{"dataTime": "not a time"}"#).unwrap();
        assert!(item.into_record().is_err());
    }

    #[test]
    fn test_envelope_shape() {
        // ---
        let envelope: Envelope = serde_json::from_str(&format!(
            r#"{{
                "response": {{
                    "header": {{ "resultCode": "00", "resultMsg": "NORMAL_CODE" }},
                    "body": {{ "items": [{}] }}
                }}
            }}"#,
            sample_item_json()
        ))
        .unwrap();

        assert_eq!(envelope.response.header.result_code, "00");
        let items = envelope.response.body.unwrap().items;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].data_time, "2025-03-26 18:00");
    }

    fn test_config(db_url: String) -> Config {
        // ---
        Config {
            db_url,
            db_pool_max: 1,
            device_api_url: "http://127.0.0.1:1/speed".into(),
            device_api_key: "secret".into(),
            station_api_url: "http://127.0.0.1:1/station".into(),
            station_api_key: "secret".into(),
            station_name: "test-station".into(),
            poll_interval_secs: 3600,
        }
    }

    /// Requires a reachable database; skipped when DATABASE_URL is unset.
    #[tokio::test]
    async fn test_repeat_timestamp_is_stored_once() {
        // ---
        let Ok(db_url) = std::env::var("DATABASE_URL") else {
            return;
        };
        let pool = PgPool::connect(&db_url).await.unwrap();
        crate::schema::create_schema(&pool).await.unwrap();

        let poller = StationPoller::new(&test_config(db_url), pool.clone()).unwrap();

        let record = StationRecord {
            recorded_at: Utc::now(),
            recorded_at_kst: String::new(),
            pm10: Some(42.0),
            pm2_5: Some(18.5),
            pm10_category: Some(2),
            pm2_5_category: Some(2),
            o3: None,
            no2: None,
            co: None,
            so2: None,
        };

        // First cycle writes, the repeat is a quiet skip rather than an error
        let first = poller.store_if_absent(&record).await.unwrap();
        assert_eq!(first, PollOutcome::Inserted);

        let second = poller.store_if_absent(&record).await.unwrap();
        assert_eq!(second, PollOutcome::AlreadyPresent);

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM station_records WHERE recorded_at = $1",
        )
        .bind(record.recorded_at)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);

        sqlx::query("DELETE FROM station_records WHERE recorded_at = $1")
            .bind(record.recorded_at)
            .execute(&pool)
            .await
            .unwrap();
    }

    #[test]
    fn test_error_envelope_has_no_items() {
        // ---
        let envelope: Envelope = serde_json::from_str(
            r#"{
                "response": {
                    "header": { "resultCode": "03", "resultMsg": "NODATA_ERROR" }
                }
            }"#,
        )
        .unwrap();

        assert_ne!(envelope.response.header.result_code, RESULT_OK);
        assert!(envelope.response.body.is_none());
    }
}
