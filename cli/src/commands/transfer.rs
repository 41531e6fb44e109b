use anyhow::{Result, bail};
use std::path::Path;
use std::process;

use foodmap_core::blog::write_blog;
use foodmap_core::db::Database;
use foodmap_core::error::TransferError;
use foodmap_core::transfer::{ImportTarget, export_all, import_collection, write_collection_export};

use super::helpers::not_found;

pub(crate) fn cmd_export_collection(
    db: &Database,
    collection_id: i64,
    output: &Path,
    json: bool,
) -> Result<()> {
    let count = match write_collection_export(db, collection_id, output) {
        Ok(count) => count,
        Err(TransferError::CollectionNotFound(id)) => {
            not_found(&format!("Collection {id} not found"), json)
        }
        Err(e) => return Err(e.into()),
    };
    print_exported(count, output, json);
    Ok(())
}

pub(crate) fn cmd_export_all(db: &Database, output: &Path, json: bool) -> Result<()> {
    let count = export_all(db, output)?;
    print_exported(count, output, json);
    Ok(())
}

pub(crate) fn cmd_export_blog(
    db: &Database,
    collection_id: i64,
    output: &Path,
    json: bool,
) -> Result<()> {
    if db.get_collection(collection_id)?.is_none() {
        not_found(&format!("Collection {collection_id} not found"), json);
    }
    let count = write_blog(db, collection_id, output)?;
    print_exported(count, output, json);
    Ok(())
}

fn print_exported(count: usize, output: &Path, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({ "exported": count, "path": output.display().to_string() })
        );
    } else {
        println!("Exported {count} item(s) to {}", output.display());
    }
}

pub(crate) fn cmd_import(
    db: &Database,
    file: &Path,
    name: Option<String>,
    into: Option<i64>,
    json: bool,
) -> Result<()> {
    let target = match into {
        Some(id) => ImportTarget::Existing(id),
        None => ImportTarget::NewCollection { name },
    };
    let report = import_collection(db, file, &target);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        if !report.success {
            process::exit(1);
        }
        return Ok(());
    }

    if !report.success {
        bail!("{}", report.message);
    }
    println!("{}", report.message);
    Ok(())
}
