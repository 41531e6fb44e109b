use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use foodmap_core::db::Database;

use super::helpers::not_found;
use crate::ingest::load_photo;

pub(crate) fn cmd_photo_add(
    db: &Database,
    item_id: i64,
    files: &[PathBuf],
    json: bool,
) -> Result<()> {
    if db.get_item(item_id)?.is_none() {
        not_found(&format!("Food item {item_id} not found"), json);
    }

    // Decode everything before touching the store.
    let photos = files
        .iter()
        .map(|file| load_photo(file))
        .collect::<Result<Vec<_>>>()?;
    let ids = db.add_photos(item_id, &photos)?;

    if json {
        println!("{}", serde_json::json!({ "food_item_id": item_id, "photo_ids": ids }));
    } else {
        println!("Added {} photo(s) to food item {item_id}", ids.len());
    }
    Ok(())
}

pub(crate) fn cmd_photo_get(db: &Database, photo_id: i64, output: &Path, json: bool) -> Result<()> {
    let Some(data) = db.get_photo(photo_id)? else {
        not_found(&format!("Photo {photo_id} not found"), json);
    };
    std::fs::write(output, &data)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "photo_id": photo_id,
                "path": output.display().to_string(),
                "bytes": data.len(),
            })
        );
    } else {
        println!(
            "Wrote photo {photo_id} ({} bytes) to {}",
            data.len(),
            output.display()
        );
    }
    Ok(())
}

pub(crate) fn cmd_photo_delete(db: &Database, photo_id: i64, json: bool) -> Result<()> {
    if !db.delete_photo(photo_id)? {
        not_found(&format!("Photo {photo_id} not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": photo_id }));
    } else {
        println!("Deleted photo {photo_id}");
    }
    Ok(())
}
