use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use foodmap_core::db::Database;

use super::helpers::not_found;

pub(crate) fn cmd_tag_add(db: &Database, item_id: i64, tags: &[String], json: bool) -> Result<()> {
    if db.get_item(item_id)?.is_none() {
        not_found(&format!("Food item {item_id} not found"), json);
    }
    let mut added = Vec::new();
    for tag in tags {
        if db.tag_item(item_id, tag)? {
            added.push(tag.trim().to_string());
        }
    }

    if json {
        println!(
            "{}",
            serde_json::json!({ "food_item_id": item_id, "added": added, "tags": db.tags_for_item(item_id)? })
        );
    } else if added.is_empty() {
        println!("Food item {item_id} already has those tags");
    } else {
        println!("Tagged food item {item_id}: {}", added.join(", "));
    }
    Ok(())
}

pub(crate) fn cmd_tag_remove(db: &Database, item_id: i64, tag: &str, json: bool) -> Result<()> {
    if !db.untag_item(item_id, tag)? {
        not_found(
            &format!("Food item {item_id} has no tag '{}'", tag.trim()),
            json,
        );
    }
    if json {
        println!(
            "{}",
            serde_json::json!({ "food_item_id": item_id, "removed": tag.trim() })
        );
    } else {
        println!("Removed tag '{}' from food item {item_id}", tag.trim());
    }
    Ok(())
}

pub(crate) fn cmd_tag_list(db: &Database, json: bool) -> Result<()> {
    let tags = db.list_tags()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tags)?);
    } else if tags.is_empty() {
        eprintln!("No tags yet. Use `foodmap tag add <item> <tag>` to add one.");
    } else {
        #[derive(Tabled)]
        struct TagRow {
            #[tabled(rename = "Tag")]
            name: String,
            #[tabled(rename = "Items")]
            items: i64,
        }

        let rows: Vec<TagRow> = tags
            .into_iter()
            .map(|t| TagRow {
                name: t.name,
                items: t.item_count,
            })
            .collect();
        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..2)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }
    Ok(())
}
