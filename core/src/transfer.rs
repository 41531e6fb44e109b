//! Collection export (JSON with embedded photos, CSV, legacy JSON) and the
//! lenient JSON import that reads them back.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::db::{Database, insert_collection, insert_item, item_exists};
use crate::error::{ItemError, TransferError, TransferResult};
use crate::models::{
    CollectionExport, CsvFoodRow, DEFAULT_FOOD_TYPE, DEFAULT_RATING, EXPORT_VERSION,
    ExportFoodItem, ExportMetadata, ExportPhoto, ImportReport, ImportSummary, LegacyExportItem,
    NewFoodItem, now_timestamp, snap_rating,
};

const UNKNOWN_NAME: &str = "Unknown shop";
const UNKNOWN_CITY: &str = "Unknown city";
const UNKNOWN_ADDRESS: &str = "Unknown address";
const FALLBACK_COLLECTION_NAME: &str = "Imported collection";

const CSV_HEADER: [&str; 12] = [
    "id",
    "name",
    "city",
    "rating",
    "reason",
    "address",
    "latitude",
    "longitude",
    "food_type",
    "created_at",
    "is_imported",
    "collection_id",
];

/// Where imported items go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTarget {
    /// Create a collection named `name`, else the document's `metadata.name`,
    /// else the file name. Items are not de-duplicated.
    NewCollection { name: Option<String> },
    /// Append to an existing collection, skipping any item whose exact
    /// `(name, address)` pair is already stored.
    Existing(i64),
}

// --- Export ---

/// Build the self-contained export document for one collection.
pub fn export_collection(db: &Database, collection_id: i64) -> TransferResult<CollectionExport> {
    let collection = db
        .get_collection(collection_id)?
        .ok_or(TransferError::CollectionNotFound(collection_id))?;

    let items = db.by_collection(collection_id)?;
    let mut food_items = Vec::with_capacity(items.len());
    for item in items {
        let photos = db
            .photos_for_item(item.id)?
            .into_iter()
            .map(|photo| ExportPhoto {
                id: photo.id,
                data: BASE64.encode(&photo.data),
            })
            .collect();
        food_items.push(ExportFoodItem {
            id: item.id,
            name: item.name,
            city: item.city,
            rating: item.rating,
            reason: item.reason,
            address: item.address,
            latitude: item.latitude,
            longitude: item.longitude,
            food_type: item.food_type,
            created_at: item.created_at,
            photos,
            tags: item.tags,
        });
    }

    Ok(CollectionExport {
        metadata: ExportMetadata {
            name: collection.name,
            description: collection.description.unwrap_or_default(),
            created_at: collection.created_at,
            export_time: now_timestamp(),
            version: EXPORT_VERSION.to_string(),
        },
        food_items,
    })
}

/// Write a collection export as pretty JSON. Returns the number of items.
pub fn write_collection_export(
    db: &Database,
    collection_id: i64,
    path: &Path,
) -> TransferResult<usize> {
    let export = export_collection(db, collection_id)?;
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &export)?;
    writer.flush()?;
    info!(
        collection_id,
        items = export.food_items.len(),
        path = %path.display(),
        "Exported collection"
    );
    Ok(export.food_items.len())
}

/// Export every item in the store. `.csv` paths get CSV; anything else gets
/// the legacy bare-array JSON with a `has_photos` flag instead of blobs.
pub fn export_all(db: &Database, path: &Path) -> TransferResult<usize> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    let file = File::create(path)?;
    let count = if is_csv {
        write_csv(db, file)?
    } else {
        let items = legacy_export(db)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &items)?;
        writer.flush()?;
        items.len()
    };
    info!(items = count, path = %path.display(), "Exported all items");
    Ok(count)
}

/// All items, newest first, in the legacy whole-store shape.
pub fn legacy_export(db: &Database) -> TransferResult<Vec<LegacyExportItem>> {
    Ok(db.list_all()?.iter().map(LegacyExportItem::from).collect())
}

/// Flatten all items to CSV. Photos are not representable and are omitted.
/// The header row is written even when the store is empty.
pub fn write_csv<W: Write>(db: &Database, writer: W) -> TransferResult<usize> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(CSV_HEADER)?;

    let items = db.list_all()?;
    for item in &items {
        wtr.serialize(CsvFoodRow::from(item))?;
    }
    wtr.flush()?;
    Ok(items.len())
}

// --- Import ---

/// A parsed import document in one of the two accepted shapes.
#[derive(Debug, Clone)]
pub enum ImportDocument {
    /// `{"metadata": {...}, "food_items": [...]}` as written by `export_collection`.
    Collection {
        metadata: Map<String, Value>,
        items: Vec<Value>,
    },
    /// A bare array of food item objects.
    Legacy(Vec<Value>),
}

impl ImportDocument {
    #[must_use]
    pub fn items(&self) -> &[Value] {
        match self {
            ImportDocument::Collection { items, .. } | ImportDocument::Legacy(items) => items,
        }
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        match self {
            ImportDocument::Collection { metadata, .. } => metadata
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty()),
            ImportDocument::Legacy(_) => None,
        }
    }
}

/// Parse document bytes. Items themselves are not inspected here.
pub fn parse_document(bytes: &[u8]) -> TransferResult<ImportDocument> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| TransferError::MalformedDocument(e.to_string()))?;

    match value {
        Value::Array(items) => Ok(ImportDocument::Legacy(items)),
        Value::Object(mut obj) => {
            let items = match obj.remove("food_items") {
                Some(Value::Array(items)) => items,
                Some(_) => {
                    return Err(TransferError::MalformedDocument(
                        "'food_items' must be an array".to_string(),
                    ));
                }
                None => {
                    return Err(TransferError::MalformedDocument(
                        "expected a 'food_items' array or a list of food items".to_string(),
                    ));
                }
            };
            let metadata = match obj.remove("metadata") {
                Some(Value::Object(metadata)) => metadata,
                None | Some(Value::Null) => Map::new(),
                Some(_) => {
                    return Err(TransferError::MalformedDocument(
                        "'metadata' must be an object".to_string(),
                    ));
                }
            };
            Ok(ImportDocument::Collection { metadata, items })
        }
        _ => Err(TransferError::MalformedDocument(
            "expected a JSON object or array".to_string(),
        )),
    }
}

/// Check the path and parse the file. Nothing is written.
pub fn read_document(path: &Path) -> TransferResult<ImportDocument> {
    if !path.is_file() {
        return Err(TransferError::FileNotFound(path.to_path_buf()));
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if !extension.eq_ignore_ascii_case("json") {
        let shown = if extension.is_empty() {
            "(none)".to_string()
        } else {
            format!(".{extension}")
        };
        return Err(TransferError::UnsupportedFormat(shown));
    }
    let bytes = std::fs::read(path)?;
    parse_document(&bytes)
}

/// Write a parsed document into the store in one transaction.
///
/// Items that cannot be used are logged and skipped; the rest are
/// committed. Each item is written under its own savepoint so a failure
/// part-way through an item leaves none of its rows behind.
/// `fallback_name` names a new collection when neither the target nor the
/// document supplies one.
pub fn import_document(
    db: &Database,
    document: &ImportDocument,
    target: &ImportTarget,
    fallback_name: &str,
) -> TransferResult<ImportSummary> {
    let mut tx = db.conn().unchecked_transaction()?;

    let (collection_id, dedupe) = match target {
        ImportTarget::NewCollection { name } => {
            let name = name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .or_else(|| document.metadata_str("name"))
                .unwrap_or(fallback_name);
            let description = document.metadata_str("description");
            (insert_collection(&tx, name, description)?, false)
        }
        ImportTarget::Existing(id) => {
            let exists: i64 = tx.query_row(
                "SELECT COUNT(*) FROM collections WHERE id = ?1",
                [id],
                |row| row.get(0),
            )?;
            if exists == 0 {
                return Err(TransferError::CollectionNotFound(*id));
            }
            (*id, true)
        }
    };
    let collection_name: String = tx.query_row(
        "SELECT name FROM collections WHERE id = ?1",
        [collection_id],
        |row| row.get(0),
    )?;

    let mut summary = ImportSummary {
        collection_id,
        collection_name,
        imported: 0,
        skipped: 0,
        duplicates: 0,
    };

    for (index, value) in document.items().iter().enumerate() {
        let item = match normalize_item(value) {
            Ok(item) => item,
            Err(e) => {
                warn!(index, error = %e, "Skipping imported item");
                summary.skipped += 1;
                continue;
            }
        };

        if dedupe && item_exists(&tx, &item.name, &item.address)? {
            debug!(index, name = %item.name, "Item already present, not importing");
            summary.duplicates += 1;
            continue;
        }

        let sp = tx.savepoint()?;
        match insert_item(&sp, &item, collection_id, true) {
            Ok(_) => {
                sp.commit()?;
                summary.imported += 1;
            }
            Err(e) => {
                warn!(index, error = %format!("{e:#}"), "Skipping imported item");
                summary.skipped += 1;
            }
        }
    }

    tx.commit()?;
    info!(
        collection_id,
        imported = summary.imported,
        skipped = summary.skipped,
        duplicates = summary.duplicates,
        "Import finished"
    );
    Ok(summary)
}

/// Read and import a `.json` file.
pub fn import_file(
    db: &Database,
    path: &Path,
    target: &ImportTarget,
) -> TransferResult<ImportSummary> {
    let document = read_document(path)?;
    let fallback = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(FALLBACK_COLLECTION_NAME);
    import_document(db, &document, target, fallback)
}

/// `import_file` reduced to a success flag and a message for display.
pub fn import_collection(db: &Database, path: &Path, target: &ImportTarget) -> ImportReport {
    match import_file(db, path, target) {
        Ok(summary) => ImportReport {
            success: true,
            message: summary_message(&summary),
            summary: Some(summary),
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Import failed");
            ImportReport {
                success: false,
                message: e.to_string(),
                summary: None,
            }
        }
    }
}

fn summary_message(summary: &ImportSummary) -> String {
    let mut message = format!(
        "Imported {} item{} into '{}'",
        summary.imported,
        if summary.imported == 1 { "" } else { "s" },
        summary.collection_name
    );
    if summary.duplicates > 0 {
        message.push_str(&format!(", {} already present", summary.duplicates));
    }
    if summary.skipped > 0 {
        message.push_str(&format!(", {} skipped as invalid", summary.skipped));
    }
    message
}

/// Turn one foreign item object into a validated insert, filling defaults
/// for anything missing.
pub fn normalize_item(value: &Value) -> Result<NewFoodItem, ItemError> {
    let obj = value.as_object().ok_or(ItemError::NotAnObject)?;

    let item = NewFoodItem {
        name: text_field(obj, "name", UNKNOWN_NAME)?,
        city: text_field(obj, "city", UNKNOWN_CITY)?,
        address: text_field(obj, "address", UNKNOWN_ADDRESS)?,
        latitude: number_field(obj, "latitude", 0.0)?,
        longitude: number_field(obj, "longitude", 0.0)?,
        rating: snap_rating(number_field(obj, "rating", DEFAULT_RATING)?),
        reason: optional_text_field(obj, "reason")?,
        food_type: text_field(obj, "food_type", DEFAULT_FOOD_TYPE)?,
        collection_id: None,
        photos: photo_field(obj)?,
        tags: tag_field(obj),
    };
    item.validate()
        .map_err(|e| ItemError::Rejected(e.to_string()))?;
    Ok(item)
}

fn text_field(
    obj: &Map<String, Value>,
    field: &'static str,
    default: &str,
) -> Result<String, ItemError> {
    Ok(optional_text_field(obj, field)?.unwrap_or_else(|| default.to_string()))
}

fn optional_text_field(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, ItemError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(invalid(field, other)),
    }
}

fn number_field(
    obj: &Map<String, Value>,
    field: &'static str,
    default: f64,
) -> Result<f64, ItemError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| invalid(field, &obj[field])),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(default),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid(field, &obj[field])),
        Some(other) => Err(invalid(field, other)),
    }
}

/// Photos arrive as `{"id": .., "data": "<base64>"}` objects or bare base64 strings.
fn photo_field(obj: &Map<String, Value>) -> Result<Vec<Vec<u8>>, ItemError> {
    let photos = match obj.get("photos") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(photos)) => photos,
        Some(other) => return Err(invalid("photos", other)),
    };

    photos
        .iter()
        .enumerate()
        .map(|(index, photo)| {
            let encoded = match photo {
                Value::String(s) => s.as_str(),
                Value::Object(o) => o
                    .get("data")
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid("photos", photo))?,
                other => return Err(invalid("photos", other)),
            };
            BASE64
                .decode(encoded.trim())
                .map_err(|source| ItemError::InvalidPhoto { index, source })
        })
        .collect()
}

/// Tags are optional decoration; unusable entries are dropped rather than
/// failing the item.
fn tag_field(obj: &Map<String, Value>) -> Vec<String> {
    obj.get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn invalid(field: &'static str, value: &Value) -> ItemError {
    let mut shown = value.to_string();
    if shown.chars().count() > 40 {
        shown = shown.chars().take(37).collect::<String>() + "...";
    }
    ItemError::InvalidField {
        field,
        value: shown,
    }
}
