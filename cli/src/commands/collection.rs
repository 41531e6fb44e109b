use anyhow::{Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use foodmap_core::db::Database;

use super::helpers::{format_timestamp, not_found, print_item_table, truncate};

pub(crate) fn cmd_collection_list(db: &Database, json: bool) -> Result<()> {
    // Listing always shows the personal collection, creating it on first use.
    db.get_or_create_personal_collection()?;
    let collections = db.list_collections()?;

    if json {
        let entries = collections
            .iter()
            .map(|c| {
                Ok(serde_json::json!({
                    "id": c.id,
                    "name": c.name,
                    "description": c.description,
                    "created_at": c.created_at,
                    "is_personal": c.is_personal,
                    "item_count": db.count_items_in_collection(c.id)?,
                }))
            })
            .collect::<Result<Vec<_>>>()?;
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct CollectionRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Items")]
        items: i64,
        #[tabled(rename = "Description")]
        description: String,
        #[tabled(rename = "Created")]
        created: String,
    }

    let rows = collections
        .iter()
        .map(|c| {
            Ok(CollectionRow {
                id: c.id,
                name: if c.is_personal {
                    format!("{} (personal)", c.name)
                } else {
                    truncate(&c.name, 30)
                },
                items: db.count_items_in_collection(c.id)?,
                description: c
                    .description
                    .as_deref()
                    .map(|d| truncate(d, 40))
                    .unwrap_or_default(),
                created: format_timestamp(&c.created_at),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_collection_show(db: &Database, id: i64, json: bool) -> Result<()> {
    let Some(collection) = db.get_collection(id)? else {
        not_found(&format!("Collection {id} not found"), json);
    };
    let items = db.by_collection(id)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "collection": collection,
                "food_items": items,
            }))?
        );
        return Ok(());
    }

    println!(
        "{}{}",
        collection.name,
        if collection.is_personal { " (personal)" } else { "" }
    );
    if let Some(ref d) = collection.description {
        println!("  {d}");
    }
    println!("  Created: {}", format_timestamp(&collection.created_at));
    println!();
    if items.is_empty() {
        println!("No items yet. Use `foodmap add --collection {id}` to add one.");
    } else {
        print_item_table(&items);
    }
    Ok(())
}

pub(crate) fn cmd_collection_create(
    db: &Database,
    name: &str,
    description: Option<&str>,
    json: bool,
) -> Result<()> {
    let id = db.create_collection(name, description)?;
    if json {
        match db.get_collection(id)? {
            Some(c) => println!("{}", serde_json::to_string_pretty(&c)?),
            None => bail!("Collection {id} disappeared after creation"),
        }
    } else {
        println!("Created collection '{}' (ID {id})", name.trim());
    }
    Ok(())
}

pub(crate) fn cmd_collection_rename(
    db: &Database,
    id: i64,
    name: &str,
    description: Option<&str>,
    json: bool,
) -> Result<()> {
    // Keep the old description unless a new one is given.
    let description = match description {
        Some(d) => Some(d.to_string()),
        None => db.get_collection(id)?.and_then(|c| c.description),
    };
    if !db.rename_collection(id, name, description.as_deref())? {
        not_found(&format!("Collection {id} not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "renamed": id, "name": name.trim() }));
    } else {
        println!("Renamed collection {id} to '{}'", name.trim());
    }
    Ok(())
}

pub(crate) fn cmd_collection_delete(db: &Database, id: i64, json: bool) -> Result<()> {
    match db.is_personal_collection(id)? {
        None => not_found(&format!("Collection {id} not found"), json),
        Some(true) => bail!("The personal collection cannot be deleted"),
        Some(false) => {}
    }

    let items = db.count_items_in_collection(id)?;
    db.delete_collection(id)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "deleted": id, "items_deleted": items })
        );
    } else {
        println!("Deleted collection {id} and its {items} item(s)");
    }
    Ok(())
}
