use async_trait::async_trait;
use road_trip_lib::Coordinate;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::ServiceError,
    services::{GeocodingService, PlaceCandidate},
};

pub const NOMINATIM_SEARCH_PATH: &str = "/search";

#[derive(Deserialize)]
struct NominatimPlace {
    /// Numeric string
    lat: String,
    /// Numeric string
    lon: String,
    display_name: String,
}

pub struct NominatimClientParams {
    pub base_url: String,
    /// Nominatim rejects requests without an identifying user agent
    pub user_agent: String,
}

pub struct NominatimClient {
    params: NominatimClientParams,
    client: reqwest::Client,
}

impl NominatimClient {
    pub fn new(params: NominatimClientParams) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder().user_agent(params.user_agent.clone()).build()?;
        Ok(Self { params, client })
    }
}

#[async_trait]
impl GeocodingService for NominatimClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<PlaceCandidate>, ServiceError> {
        let url = format!("{}{}", self.params.base_url.trim_end_matches('/'), NOMINATIM_SEARCH_PATH);
        let limit = limit.to_string();

        debug!("Nominatim: searching '{}'", query);
        let response = self
            .client
            .get(url)
            .query(&[("format", "json"), ("q", query), ("limit", limit.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api { status, message });
        }

        let body = response.text().await?;
        parse_search_response(&body)
    }
}

/// Candidates with unparsable coordinates are skipped.
pub fn parse_search_response(body: &str) -> Result<Vec<PlaceCandidate>, ServiceError> {
    let places: Vec<NominatimPlace> = serde_json::from_str(body)?;

    Ok(places
        .into_iter()
        .filter_map(|place| {
            let lat = place.lat.trim().parse::<f64>().ok()?;
            let lng = place.lon.trim().parse::<f64>().ok()?;
            let coordinate = Coordinate::new(lat, lng);
            coordinate.is_valid().then_some(PlaceCandidate {
                coordinate,
                display_name: place.display_name,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_BODY: &str = r#"[
        {"place_id": 1, "lat": "-22.9068", "lon": "-43.1729", "display_name": "Rio de Janeiro, Brasil"},
        {"place_id": 2, "lat": "not a number", "lon": "-43.0", "display_name": "Broken"},
        {"place_id": 3, "lat": "-22.5", "lon": "-43.2", "display_name": "Petrópolis, Rio de Janeiro"}
    ]"#;

    #[test]
    fn parses_numeric_strings() {
        let candidates = parse_search_response(SEARCH_BODY).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].coordinate, Coordinate::new(-22.9068, -43.1729));
        assert_eq!(candidates[0].display_name, "Rio de Janeiro, Brasil");
        assert_eq!(candidates[1].display_name, "Petrópolis, Rio de Janeiro");
    }

    #[test]
    fn empty_result_set() {
        assert!(parse_search_response("[]").unwrap().is_empty());
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(matches!(
            parse_search_response("{\"error\": \"oops\"}"),
            Err(ServiceError::Deserialize(_))
        ));
    }
}
