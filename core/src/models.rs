use anyhow::{Result, bail};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 10.0;
pub const DEFAULT_RATING: f64 = 5.0;
pub const DEFAULT_FOOD_TYPE: &str = "Other";

pub const PERSONAL_COLLECTION_NAME: &str = "My Food Map";
pub const PERSONAL_COLLECTION_DESCRIPTION: &str = "Personal food collection";

/// Version string written into collection export metadata.
pub const EXPORT_VERSION: &str = "2.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub is_personal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodItem {
    pub id: i64,
    pub collection_id: i64,
    pub name: String,
    pub city: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub rating: f64,
    pub reason: Option<String>,
    pub food_type: String,
    pub is_imported: bool,
    pub created_at: String,
    pub photo_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub id: i64,
    pub food_item_id: i64,
    pub data: Vec<u8>,
}

/// A food item together with its decoded photo blobs, for full-detail display.
#[derive(Debug, Clone)]
pub struct FoodItemDetail {
    pub item: FoodItem,
    pub photos: Vec<Photo>,
}

/// Input for `add_item` and `update_item`.
///
/// On update every field except `photos` and `tags` replaces the stored
/// value; `photos` and `tags` are appended to what the item already has.
/// A `collection_id` of `None` means the personal collection.
#[derive(Debug, Clone, Default)]
pub struct NewFoodItem {
    pub name: String,
    pub city: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub rating: f64,
    pub reason: Option<String>,
    pub food_type: String,
    pub collection_id: Option<i64>,
    pub photos: Vec<Vec<u8>>,
    pub tags: Vec<String>,
}

impl NewFoodItem {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("Name is required");
        }
        if self.city.trim().is_empty() {
            bail!("City is required");
        }
        if self.address.trim().is_empty() {
            bail!("Address is required");
        }
        validate_coordinates(self.latitude, self.longitude)?;
        validate_rating(self.rating)?;
        for tag in &self.tags {
            validate_tag(tag)?;
        }
        Ok(())
    }

    /// Reason with surrounding whitespace removed; blank reasons are stored as NULL.
    #[must_use]
    pub fn normalized_reason(&self) -> Option<&str> {
        self.reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    #[must_use]
    pub fn normalized_food_type(&self) -> &str {
        normalize_food_type(&self.food_type)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TagCount {
    pub name: String,
    pub item_count: i64,
}

// --- Export documents ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionExport {
    pub metadata: ExportMetadata,
    pub food_items: Vec<ExportFoodItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub name: String,
    pub description: String,
    pub created_at: String,
    pub export_time: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportFoodItem {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub rating: f64,
    pub reason: Option<String>,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub food_type: String,
    pub created_at: String,
    pub photos: Vec<ExportPhoto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportPhoto {
    pub id: i64,
    /// Standard base64 (with padding) of the stored blob.
    pub data: String,
}

/// Whole-store export entry in the older bare-array file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyExportItem {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub rating: f64,
    pub reason: Option<String>,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub food_type: String,
    pub created_at: String,
    pub has_photos: bool,
}

/// One CSV row. Photos have no tabular representation and are left out.
#[derive(Debug, Clone, Serialize)]
pub struct CsvFoodRow {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub rating: f64,
    pub reason: Option<String>,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub food_type: String,
    pub created_at: String,
    pub is_imported: bool,
    pub collection_id: i64,
}

impl From<&FoodItem> for CsvFoodRow {
    fn from(item: &FoodItem) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            city: item.city.clone(),
            rating: item.rating,
            reason: item.reason.clone(),
            address: item.address.clone(),
            latitude: item.latitude,
            longitude: item.longitude,
            food_type: item.food_type.clone(),
            created_at: item.created_at.clone(),
            is_imported: item.is_imported,
            collection_id: item.collection_id,
        }
    }
}

impl From<&FoodItem> for LegacyExportItem {
    fn from(item: &FoodItem) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            city: item.city.clone(),
            rating: item.rating,
            reason: item.reason.clone(),
            address: item.address.clone(),
            latitude: item.latitude,
            longitude: item.longitude,
            food_type: item.food_type.clone(),
            created_at: item.created_at.clone(),
            has_photos: !item.photo_ids.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub collection_id: i64,
    pub collection_name: String,
    pub imported: usize,
    pub skipped: usize,
    pub duplicates: usize,
}

/// Outcome of a file import as shown to the user: `success` is false only
/// when the document could not be read or written at all.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ImportSummary>,
}

impl ImportReport {
    #[must_use]
    pub fn imported(&self) -> usize {
        self.summary.as_ref().map_or(0, |s| s.imported)
    }
}

// --- Validation ---

pub fn validate_rating(rating: f64) -> Result<()> {
    if !rating.is_finite() || !(MIN_RATING..=MAX_RATING).contains(&rating) {
        bail!("Rating must be between {MIN_RATING} and {MAX_RATING} (got {rating})");
    }
    if (rating * 2.0).fract() != 0.0 {
        bail!("Rating must be in steps of 0.5 (got {rating})");
    }
    Ok(())
}

/// Round a rating to the nearest half point.
#[must_use]
pub fn snap_rating(rating: f64) -> f64 {
    (rating * 2.0).round() / 2.0
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        bail!("Latitude must be between -90 and 90 (got {latitude})");
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        bail!("Longitude must be between -180 and 180 (got {longitude})");
    }
    Ok(())
}

pub fn validate_tag(tag: &str) -> Result<()> {
    if tag.trim().is_empty() {
        bail!("Tag must not be empty");
    }
    Ok(())
}

#[must_use]
pub fn normalize_food_type(food_type: &str) -> &str {
    let trimmed = food_type.trim();
    if trimmed.is_empty() {
        DEFAULT_FOOD_TYPE
    } else {
        trimmed
    }
}

/// Creation timestamp: UTC RFC 3339 with fixed-width microseconds, so
/// lexicographic order matches chronological order.
#[must_use]
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
