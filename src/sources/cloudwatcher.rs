use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeZone, Utc};

use crate::config::CloudWatcherConfig;
use crate::db::models::{DeviceInfo, SensorReadings, SensorSample};
use crate::error::{DataQualityError, SourceError};

use super::{SensorPollError, SensorSource};

const DATA_PATH: &str = "/cgi-bin/cgiLastData";
const GMT_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
/// Wind and gust report this when no anemometer is connected.
const NOT_CONNECTED: f64 = -1.0;

pub struct CloudWatcherClient {
    client: reqwest::Client,
    url: String,
}

impl CloudWatcherClient {
    pub fn new(config: &CloudWatcherConfig, timeout_secs: u64) -> Result<Self, SourceError> {
        let host = config
            .host
            .as_deref()
            .filter(|host| !host.is_empty())
            .ok_or(SourceError::NotConfigured("cloudwatcher host"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: format!("http://{host}:{}{DATA_PATH}", config.port),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SensorSource for CloudWatcherClient {
    async fn poll(&self) -> Result<SensorSample, SensorPollError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(SourceError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                endpoint: self.url.clone(),
                status: status.as_u16(),
            }
            .into());
        }

        let text = response.text().await.map_err(SourceError::from)?;
        Ok(parse_payload(&text)?)
    }
}

/// Parse the device's `key=value` line format.
///
/// The sample keeps the device timestamp; a missing or unparseable
/// `dataGMTTime` rejects the whole sample.
pub fn parse_payload(text: &str) -> Result<SensorSample, DataQualityError> {
    let fields: HashMap<&str, &str> = text
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .collect();

    let raw_time = fields.get("dataGMTTime").copied().unwrap_or_default();
    let timestamp = NaiveDateTime::parse_from_str(raw_time, GMT_TIME_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| DataQualityError::new("dataGMTTime", raw_time, "unparseable timestamp"))?;

    let number = |key: &str| fields.get(key).and_then(|v| v.parse::<f64>().ok());
    let code = |key: &str| fields.get(key).and_then(|v| v.parse::<i64>().ok());
    let connected = |value: Option<f64>| value.filter(|v| *v != NOT_CONNECTED);

    let readings = SensorReadings {
        sky_minus_ambient_c: number("clouds"),
        sky_temp_c: number("rawir"),
        ambient_temp_c: number("temp"),
        dew_point_c: number("dewp"),
        humidity_pct: number("hum"),
        sky_brightness_mpsas: number("lightmpsas"),
        rain_raw: number("rain"),
        rain_dry: code("rainSafe").and_then(|c| match c {
            1 => Some(true),
            0 | 2 => Some(false),
            _ => None,
        }),
        wind_kmh: connected(number("wind")),
        gust_kmh: connected(number("gust")),
        pressure_abs_hpa: number("abspress"),
        pressure_rel_hpa: number("relpress"),
    };

    Ok(SensorSample {
        timestamp,
        readings,
        safety_code: code("cloudsSafe"),
        device: parse_device_info(fields.get("cwinfo").copied().unwrap_or_default()),
    })
}

/// `cwinfo=Serial: 2653, FW: 5.89`
fn parse_device_info(raw: &str) -> DeviceInfo {
    let mut info = DeviceInfo::default();
    for part in raw.split(',') {
        let Some((key, value)) = part.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "Serial" => info.serial = Some(value.to_string()),
            "FW" => info.firmware = Some(value.to_string()),
            _ => {}
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "dataGMTTime=2024/01/23 17:53:25
cwinfo=Serial: 2653, FW: 5.89
clouds=-8.360000
cloudsSafe=2
temp=1.290000
wind=-1
gust=-1
rain=3072
rainSafe=1
lightmpsas=19.87
hum=85
dewp=-1.08
rawir=-7.07
abspress=1012.3
relpress=1017.8
safe=0
";

    #[test]
    fn parses_device_sample() {
        let sample = parse_payload(SAMPLE).unwrap();

        assert_eq!(sample.timestamp.to_rfc3339(), "2024-01-23T17:53:25+00:00");
        assert_eq!(sample.readings.sky_minus_ambient_c, Some(-8.36));
        assert_eq!(sample.readings.sky_temp_c, Some(-7.07));
        assert_eq!(sample.readings.humidity_pct, Some(85.0));
        assert_eq!(sample.readings.sky_brightness_mpsas, Some(19.87));
        assert_eq!(sample.readings.rain_dry, Some(true));
        assert_eq!(sample.safety_code, Some(2));
        assert_eq!(sample.device.serial.as_deref(), Some("2653"));
        assert_eq!(sample.device.firmware.as_deref(), Some("5.89"));
    }

    #[test]
    fn disconnected_anemometer_reads_as_none() {
        let sample = parse_payload(SAMPLE).unwrap();
        assert_eq!(sample.readings.wind_kmh, None);
        assert_eq!(sample.readings.gust_kmh, None);

        let sample = parse_payload(&SAMPLE.replace("wind=-1", "wind=12.5")).unwrap();
        assert_eq!(sample.readings.wind_kmh, Some(12.5));
    }

    #[test]
    fn bad_timestamp_rejects_sample() {
        let err = parse_payload(&SAMPLE.replace("2024/01/23 17:53:25", "garbage")).unwrap_err();
        assert_eq!(err.field, "dataGMTTime");

        let without_time: String = SAMPLE.lines().skip(1).collect::<Vec<_>>().join("\n");
        assert!(parse_payload(&without_time).is_err());
    }

    #[test]
    fn client_requires_host() {
        let config = CloudWatcherConfig::default();
        assert!(matches!(
            CloudWatcherClient::new(&config, 10),
            Err(SourceError::NotConfigured(_))
        ));

        let config = CloudWatcherConfig {
            host: Some("192.168.1.151".into()),
            port: 80,
        };
        let client = CloudWatcherClient::new(&config, 10).unwrap();
        assert_eq!(client.url(), "http://192.168.1.151:80/cgi-bin/cgiLastData");
    }
}
