//! CHORDS `url_create` URI construction

use chrono::DateTime;
use urlencoding::encode;

use crate::telemetry::{AT_KEY, TelemetryRecord};

/// Path of the CHORDS measurement ingest endpoint
const URL_CREATE_PATH: &str = "/measurements/url_create";

/// Build the ingest URI for one record
///
/// `host` may be a bare host name (`http://` is assumed) or a base URL.
/// `at` is sent as an ISO-8601 UTC timestamp.
pub fn build_uri(host: &str, record: &TelemetryRecord, test: bool) -> String {
    let mut uri = format!(
        "{}{}?instrument_id={}",
        base_url(host),
        URL_CREATE_PATH,
        encode(&record.instrument_id)
    );

    for variable in record.measurements() {
        if variable.name == AT_KEY {
            continue;
        }
        uri.push_str(&format!(
            "&{}={}",
            encode(&variable.name),
            encode(&variable.value.to_string())
        ));
    }

    uri.push_str(&format!("&at={}", encode(&format_at(record.at()))));
    uri.push_str(&format!(
        "&email={}&api_key={}",
        encode(&record.api_email),
        encode(&record.api_key)
    ));

    if test {
        uri.push_str("&test");
    }

    uri
}

/// Replace the API key in a URI so it can be logged
pub fn redact(uri: &str) -> String {
    match uri.find("api_key=") {
        Some(start) => {
            let value_start = start + "api_key=".len();
            let value_end = uri[value_start..]
                .find('&')
                .map(|i| value_start + i)
                .unwrap_or(uri.len());
            format!("{}***{}", &uri[..value_start], &uri[value_end..])
        }
        None => uri.to_string(),
    }
}

fn base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

fn format_at(at: i64) -> String {
    match DateTime::from_timestamp(at, 0) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        None => at.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::report::CellValue;

    fn record() -> TelemetryRecord {
        let config = RunConfig::from_json(
            r#"{
                "instrument_id": "3",
                "api_email": "owner@example.org",
                "api_key": "k&y",
                "chords_host": "chords.example.org",
                "variables": []
            }"#,
        )
        .unwrap();
        let mut record = TelemetryRecord::new(&config, 1_644_679_800);
        record.push("prod", CellValue::Float(0.25));
        record.push("note", CellValue::Text("a b".to_string()));
        record
    }

    #[test]
    fn test_build_uri() {
        let uri = build_uri("chords.example.org", &record(), false);
        assert_eq!(
            uri,
            "http://chords.example.org/measurements/url_create?instrument_id=3\
             &prod=0.25&note=a%20b&at=2022-02-12T15%3A30%3A00Z\
             &email=owner%40example.org&api_key=k%26y"
        );
    }

    #[test]
    fn test_build_uri_keeps_scheme_and_test_flag() {
        let uri = build_uri("https://portal.example.org/", &record(), true);
        assert!(uri.starts_with("https://portal.example.org/measurements/url_create?"));
        assert!(uri.ends_with("&test"));
    }

    #[test]
    fn test_redact() {
        let uri = build_uri("chords.example.org", &record(), true);
        let redacted = redact(&uri);
        assert!(redacted.contains("api_key=***&test"));
        assert!(!redacted.contains("k%26y"));
        assert_eq!(redact("http://x/?a=1"), "http://x/?a=1");
    }
}
