use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::{debug, warn};
use serde_json::Value;

use crate::config::{LocationConfig, MeteoblueConfig};
use crate::db::models::{ForecastConditions, RawForecastHour};
use crate::error::SourceError;

use super::{ForecastFetch, ForecastSource};

const API_NAME: &str = "meteoblue";
const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";
const CREDITS_HEADER: &str = "X-Credits-Used";
const MAX_FORECAST_DAYS: u32 = 7;

pub struct MeteoblueClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    package: String,
}

impl MeteoblueClient {
    pub fn new(config: &MeteoblueConfig, timeout_secs: u64) -> Result<Self, SourceError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or(SourceError::NotConfigured("meteoblue api key"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            package: config.package.clone(),
        })
    }
}

#[async_trait]
impl ForecastSource for MeteoblueClient {
    fn name(&self) -> &'static str {
        API_NAME
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url, self.package)
    }

    async fn fetch(
        &self,
        location: &LocationConfig,
        horizon_hours: u32,
    ) -> Result<ForecastFetch, SourceError> {
        let tz = location
            .tz()
            .map_err(|_| SourceError::NotConfigured("location timezone"))?;
        let days = horizon_hours.div_ceil(24).clamp(1, MAX_FORECAST_DAYS);

        let endpoint = self.endpoint();
        let response = self
            .client
            .get(&endpoint)
            .query(&[
                ("lat", location.latitude.to_string()),
                ("lon", location.longitude.to_string()),
                ("apikey", self.api_key.clone()),
                ("format", "json".to_string()),
                ("forecast_days", days.to_string()),
                ("tz", location.timezone.clone()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        let credits_used = response
            .headers()
            .get(CREDITS_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());

        let body: Value = response.json().await?;
        let hours = parse_payload(&body, tz, horizon_hours)?;
        debug!("meteoblue returned {} hour(s), credits used {:?}", hours.len(), credits_used);

        Ok(ForecastFetch {
            hours,
            credits_used,
        })
    }
}

/// Parse the `data_1h` block: parallel arrays indexed like `time`, with local
/// timestamps in `tz`. Missing or `null` entries become `None`. Hours whose
/// local time is unparseable or does not exist (DST gap) are skipped.
pub fn parse_payload(
    body: &Value,
    tz: Tz,
    horizon_hours: u32,
) -> Result<Vec<RawForecastHour>, SourceError> {
    let data = body
        .get("data_1h")
        .and_then(Value::as_object)
        .ok_or_else(|| SourceError::Payload("missing data_1h".into()))?;
    let times = data
        .get("time")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Payload("missing data_1h.time".into()))?;

    let series = |key: &str| data.get(key).and_then(Value::as_array);
    let seeing = series("seeing_arcsec");
    let jetstream = series("jetstream");
    let total_cloud = series("totalcloudcover");
    let low_cloud = series("lowclouds");
    let mid_cloud = series("midclouds");
    let high_cloud = series("highclouds");
    let visibility = series("visibility");
    let fog = series("fog_probability");
    let moonlight = series("moonlight_actual");
    let zenith = series("zenithangle");
    let temperature = series("temperature");
    let humidity = series("relativehumidity");
    let precipitation = series("precipitation_probability");
    let wind = series("windspeed");

    let mut hours = Vec::with_capacity(times.len());
    for (i, time) in times.iter().enumerate() {
        if hours.len() >= horizon_hours as usize {
            break;
        }

        let Some(target_time) = time.as_str().and_then(|raw| local_to_utc(raw, tz)) else {
            warn!("skipping forecast hour with unusable time {time}");
            continue;
        };

        let at = |values: Option<&Vec<Value>>| values.and_then(|v| v.get(i)).and_then(Value::as_f64);

        hours.push(RawForecastHour {
            target_time,
            conditions: ForecastConditions {
                seeing_arcsec: at(seeing),
                total_cloud_pct: at(total_cloud),
                low_cloud_pct: at(low_cloud),
                mid_cloud_pct: at(mid_cloud),
                high_cloud_pct: at(high_cloud),
                jetstream_speed_ms: at(jetstream),
                moonlight_pct: at(moonlight),
                zenith_angle_deg: at(zenith),
                temperature_c: at(temperature),
                humidity_pct: at(humidity),
                precipitation_prob_pct: at(precipitation),
                wind_speed_kmh: at(wind),
                visibility_m: at(visibility),
                fog_probability_pct: at(fog),
            },
        });
    }

    Ok(hours)
}

/// Ambiguous local times (DST fall-back) resolve to the earlier instant.
fn local_to_utc(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), LOCAL_TIME_FORMAT).ok()?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "metadata": { "name": "Wietesch" },
            "data_1h": {
                "time": ["2024-01-24 01:00", "2024-01-24 02:00", "bogus", "2024-01-24 03:00"],
                "seeing_arcsec": [0.9, 1.1, 1.0, null],
                "jetstream": [18.0, 22.0, 20.0, 25.0],
                "totalcloudcover": [5, 12, 0, 40],
                "moonlight_actual": [10, 10, 10, 10],
                "zenithangle": [150.0, 148.5, 140.0, 144.0],
                "temperature": [-2.1, -2.4, -2.0, -2.9]
            }
        })
    }

    #[test]
    fn local_times_are_converted_to_utc() {
        let hours = parse_payload(&payload(), chrono_tz::Europe::Berlin, 168).unwrap();

        assert_eq!(hours.len(), 3);
        assert_eq!(hours[0].target_time.to_rfc3339(), "2024-01-24T00:00:00+00:00");
        assert_eq!(hours[0].conditions.seeing_arcsec, Some(0.9));
        assert_eq!(hours[0].conditions.total_cloud_pct, Some(5.0));
        assert_eq!(hours[0].conditions.temperature_c, Some(-2.1));
        assert_eq!(hours[2].target_time.to_rfc3339(), "2024-01-24T02:00:00+00:00");
    }

    #[test]
    fn null_and_missing_values_become_none() {
        let hours = parse_payload(&payload(), chrono_tz::UTC, 168).unwrap();
        assert_eq!(hours[2].conditions.seeing_arcsec, None);
        assert_eq!(hours[0].conditions.humidity_pct, None);
        assert_eq!(hours[0].conditions.low_cloud_pct, None);
    }

    #[test]
    fn horizon_truncates_series() {
        let hours = parse_payload(&payload(), chrono_tz::UTC, 2).unwrap();
        assert_eq!(hours.len(), 2);
    }

    #[test]
    fn summer_time_offset_is_applied() {
        let body = json!({ "data_1h": { "time": ["2024-07-01 23:00"] } });
        let hours = parse_payload(&body, chrono_tz::Europe::Berlin, 24).unwrap();
        assert_eq!(hours[0].target_time.to_rfc3339(), "2024-07-01T21:00:00+00:00");
    }

    #[test]
    fn nonexistent_local_hour_is_skipped() {
        let body = json!({ "data_1h": { "time": ["2024-03-31 01:00", "2024-03-31 02:00", "2024-03-31 03:00"] } });
        let hours = parse_payload(&body, chrono_tz::Europe::Berlin, 24).unwrap();
        assert_eq!(hours.len(), 2);
        assert_eq!(hours[1].target_time - hours[0].target_time, chrono::Duration::hours(1));
    }

    #[test]
    fn missing_block_is_a_payload_error() {
        let err = parse_payload(&json!({ "error": "quota" }), chrono_tz::UTC, 24).unwrap_err();
        assert!(matches!(err, SourceError::Payload(_)));
    }

    #[test]
    fn client_requires_api_key() {
        let config = MeteoblueConfig::default();
        assert!(matches!(
            MeteoblueClient::new(&config, 30),
            Err(SourceError::NotConfigured(_))
        ));
    }
}
