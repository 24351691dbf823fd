//! Shared fixtures: a mock Buienradar + Nominatim server

#![allow(dead_code)]

use std::path::Path;

use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use weather_agent::AppConfig;

pub fn feed() -> Value {
    json!({
        "actual": {
            "stationmeasurements": [
                {
                    "stationid": 6344,
                    "stationname": "Meetstation Rotterdam",
                    "lat": 51.95, "lon": 4.45, "regio": "Rotterdam",
                    "timestamp": "2024-05-01T13:50:00",
                    "weatherdescription": "Zwaar bewolkt",
                    "winddirection": "ZW",
                    "temperature": 14.2, "feeltemperature": 13.1,
                    "windspeed": 5.1, "windspeedBft": 3,
                    "humidity": 71.0, "precipitation": 0.0
                },
                {
                    "stationid": 6210,
                    "stationname": "Meetstation Valkenburg Zh",
                    "lat": 52.18, "lon": 4.42, "regio": "Valkenburg",
                    "timestamp": "2024-05-01T13:50:00",
                    "winddirection": "W",
                    "temperature": 8.4,
                    "windspeed": 11.2, "windspeedBft": 6,
                    "precipitation": 0.0
                }
            ]
        },
        "forecast": {
            "weatherreport": {"title": "Koud", "summary": "Fris en droog."},
            "fivedayforecast": []
        }
    })
}

/// Mounts the feed, a dry raintext, Leiden and Rotterdam on Nominatim, and a
/// catch-all geocoder miss.
pub async fn start_mock_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(feed()))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/raintext"))
        .respond_with(ResponseTemplate::new(200).set_body_string("000|13:55\r\n040|14:00\r\n"))
        .mount(&server)
        .await;

    for (name, lat, lon) in [
        ("Leiden", "52.1601", "4.4970"),
        ("Rotterdam", "51.9225", "4.4792"),
    ] {
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", format!("{name}, Netherlands")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "lat": lat, "lon": lon, "name": name,
                "display_name": format!("{name}, Zuid-Holland, Nederland")
            }])))
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    server
}

pub fn config_for(server: &MockServer, cache_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.buienradar.feed_url = format!("{}/feed/json", server.uri());
    config.buienradar.raintext_url = format!("{}/data/raintext", server.uri());
    config.geocoding.base_url = server.uri();
    config.http.max_retries = 0;
    config.cache.location = cache_dir.to_string_lossy().into_owned();
    config
}

/// The same settings as [`config_for`], as a TOML file for the binary
pub fn config_file_for(server: &MockServer, cache_dir: &Path, file: &Path) {
    let toml = format!(
        r#"
[buienradar]
feed_url = "{uri}/feed/json"
raintext_url = "{uri}/data/raintext"

[geocoding]
base_url = "{uri}"

[http]
max_retries = 0

[cache]
location = "{cache}"

[defaults]
city = "Rotterdam"
"#,
        uri = server.uri(),
        cache = cache_dir.to_string_lossy().replace('\\', "/"),
    );
    std::fs::write(file, toml).unwrap();
}
