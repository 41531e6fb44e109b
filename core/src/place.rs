use anyhow::{Result, bail};
use serde::Deserialize;

use crate::db::Database;
use crate::models::NewFoodItem;

const UNKNOWN_ADDRESS: &str = "Unknown address";

/// Place search backend.
///
/// The store never talks to a map service itself; callers hand in an
/// implementation carrying whatever credentials it needs. Called
/// synchronously, so UI callers should run it off their main thread.
pub trait PlaceLookupProvider: Send + Sync {
    /// Candidates for a free-text `query`, narrowed by a `region` hint
    /// (usually a city name). Best match first.
    fn search(&self, query: &str, region: &str) -> Result<Vec<PlaceCandidate>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceCandidate {
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl PlaceCandidate {
    /// Seed an add from this place. Everything the place does not know comes
    /// from the caller.
    #[must_use]
    pub fn to_new_item(
        &self,
        city: &str,
        rating: f64,
        reason: Option<&str>,
        food_type: &str,
    ) -> NewFoodItem {
        NewFoodItem {
            name: self.name.clone(),
            city: city.to_string(),
            address: self.address.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            rating,
            reason: reason.map(ToString::to_string),
            food_type: food_type.to_string(),
            ..NewFoodItem::default()
        }
    }
}

// --- Place search response (`place/v2/search` style JSON) ---

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub status: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResult {
    pub name: Option<String>,
    pub address: Option<String>,
    pub location: Option<SearchLocation>,
}

#[derive(Debug, Deserialize)]
pub struct SearchLocation {
    pub lat: f64,
    pub lng: f64,
}

/// Convert a decoded search response into candidates. A non-zero status is
/// an error; results without a location are dropped.
pub fn candidates_from_response(response: SearchResponse) -> Result<Vec<PlaceCandidate>> {
    if response.status != 0 {
        bail!(
            "Place search failed with status {}: {}",
            response.status,
            response.message.as_deref().unwrap_or("no message")
        );
    }
    Ok(response
        .results
        .into_iter()
        .filter_map(result_to_candidate)
        .collect())
}

#[must_use]
pub fn result_to_candidate(result: SearchResult) -> Option<PlaceCandidate> {
    let name = result.name.filter(|n| !n.trim().is_empty())?;
    let location = result.location?;
    Some(PlaceCandidate {
        name,
        address: result
            .address
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string()),
        latitude: location.lat,
        longitude: location.lng,
    })
}

/// First candidate for `query` in `region`, if any.
pub fn locate(
    provider: &dyn PlaceLookupProvider,
    query: &str,
    region: &str,
) -> Result<Option<PlaceCandidate>> {
    if query.trim().is_empty() {
        bail!("Place name is required");
    }
    Ok(provider.search(query.trim(), region.trim())?.into_iter().next())
}

/// Look the place up and store it as a new personal item.
/// Returns `Ok(None)` when the provider finds nothing.
pub fn add_located_item(
    db: &Database,
    provider: &dyn PlaceLookupProvider,
    query: &str,
    city: &str,
    rating: f64,
    reason: Option<&str>,
    food_type: &str,
) -> Result<Option<i64>> {
    let Some(place) = locate(provider, query, city)? else {
        return Ok(None);
    };
    let id = db.add_item(&place.to_new_item(city, rating, reason, food_type))?;
    Ok(Some(id))
}
