use std::sync::Arc;

use road_trip_lib::Coordinate;
use tracing::{debug, warn};

use crate::{error::NavigationError, services::GeocodingService};

/// Autocomplete only kicks in above this many characters.
pub const SUGGEST_MIN_CHARS: usize = 3;
pub const SUGGEST_LIMIT: usize = 5;

/// Resolves addresses to coordinates. Failures collapse into NotFound.
#[derive(Clone)]
pub struct Geocoder {
    service: Arc<dyn GeocodingService>,
}

impl Geocoder {
    pub fn new(service: Arc<dyn GeocodingService>) -> Self {
        Self { service }
    }

    pub async fn resolve(&self, address: &str) -> Result<Coordinate, NavigationError> {
        let query = address.trim();
        let not_found = || NavigationError::NotFound {
            address: query.to_string(),
        };

        if query.is_empty() {
            return Err(not_found());
        }

        match self.service.search(query, 1).await {
            Ok(candidates) => match candidates.into_iter().next() {
                Some(candidate) => {
                    debug!("Resolved '{}' to {:?}", query, candidate.coordinate);
                    Ok(candidate.coordinate)
                }
                None => {
                    warn!("No geocoding result for '{}'", query);
                    Err(not_found())
                }
            },
            Err(err) => {
                warn!("Geocoding '{}' failed: {}", query, err);
                Err(not_found())
            }
        }
    }

    /// Candidate place names for a partially typed address.
    pub async fn suggest(&self, partial: &str) -> Vec<String> {
        let query = partial.trim();
        if query.chars().count() < SUGGEST_MIN_CHARS {
            return Vec::new();
        }

        match self.service.search(query, SUGGEST_LIMIT).await {
            Ok(candidates) => candidates
                .into_iter()
                .take(SUGGEST_LIMIT)
                .map(|candidate| candidate.display_name)
                .collect(),
            Err(err) => {
                warn!("Suggestions for '{}' failed: {}", query, err);
                Vec::new()
            }
        }
    }
}
