use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use foodmap_core::db::Database;
use foodmap_core::models::{DEFAULT_FOOD_TYPE, FoodItem, NewFoodItem};

use super::helpers::{format_timestamp, not_found, print_item_table};
use crate::config::Settings;
use crate::ingest::load_photo;

#[derive(Args)]
pub(crate) struct AddArgs {
    /// Place name
    pub name: String,
    /// City (default: `default_city` setting)
    #[arg(long)]
    pub city: Option<String>,
    /// Street address
    #[arg(long)]
    pub address: String,
    /// Latitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,
    /// Longitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lng: f64,
    /// Rating from 1 to 10 in steps of 0.5
    #[arg(short, long)]
    pub rating: f64,
    /// Why it is worth going
    #[arg(long)]
    pub reason: Option<String>,
    /// Cuisine or kind of place
    #[arg(long = "type", default_value = DEFAULT_FOOD_TYPE)]
    pub food_type: String,
    /// Collection ID (default: personal collection)
    #[arg(short, long)]
    pub collection: Option<i64>,
    /// Photo file to attach (repeatable)
    #[arg(long = "photo", value_name = "PATH")]
    pub photos: Vec<PathBuf>,
    /// Tag to attach (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub(crate) struct UpdateArgs {
    /// Food item ID
    pub id: i64,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub city: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    pub lat: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub lng: Option<f64>,
    #[arg(short, long)]
    pub rating: Option<f64>,
    /// New reason (pass an empty string to clear it)
    #[arg(long)]
    pub reason: Option<String>,
    #[arg(long = "type")]
    pub food_type: Option<String>,
    /// Move the item to another collection
    #[arg(short, long)]
    pub collection: Option<i64>,
    /// Photo file to add (repeatable; existing photos are kept)
    #[arg(long = "photo", value_name = "PATH")]
    pub photos: Vec<PathBuf>,
    /// Tag to add (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub(crate) struct ListArgs {
    /// Only items in this city
    #[arg(long)]
    pub city: Option<String>,
    /// Only items rated at least this
    #[arg(long)]
    pub min_rating: Option<f64>,
    /// Only items in this collection
    #[arg(short, long)]
    pub collection: Option<i64>,
    /// Only items with this tag
    #[arg(long)]
    pub tag: Option<String>,
    /// Only items you added yourself
    #[arg(long, conflicts_with = "imported")]
    pub personal: bool,
    /// Only imported items
    #[arg(long)]
    pub imported: bool,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

fn load_photos(paths: &[PathBuf]) -> Result<Vec<Vec<u8>>> {
    paths.iter().map(|p| load_photo(p)).collect()
}

pub(crate) fn cmd_add(db: &Database, settings: &Settings, args: AddArgs) -> Result<()> {
    let city = args
        .city
        .or_else(|| settings.default_city.clone())
        .context("No city given. Pass --city or set one with `foodmap config set default_city <city>`")?;

    let item = NewFoodItem {
        name: args.name,
        city,
        address: args.address,
        latitude: args.lat,
        longitude: args.lng,
        rating: args.rating,
        reason: args.reason,
        food_type: args.food_type,
        collection_id: args.collection,
        photos: load_photos(&args.photos)?,
        tags: args.tags,
    };

    let id = db.add_item(&item)?;
    let Some(stored) = db.get_item(id)? else {
        not_found(&format!("Food item {id} not found"), args.json);
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stored)?);
    } else {
        println!(
            "Added '{}' ({:.1}/10) in {} with ID {id}",
            stored.name, stored.rating, stored.city
        );
        if !stored.photo_ids.is_empty() {
            println!("  Photos: {}", stored.photo_ids.len());
        }
    }
    Ok(())
}

pub(crate) fn cmd_show(db: &Database, id: i64, json: bool) -> Result<()> {
    let Some(item) = db.get_item(id)? else {
        not_found(&format!("Food item {id} not found"), json);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    let collection = db
        .get_collection(item.collection_id)?
        .map_or_else(|| format!("#{}", item.collection_id), |c| c.name);

    println!("{} ({:.1}/10)", item.name, item.rating);
    println!("  Type:       {}", item.food_type);
    println!("  City:       {}", item.city);
    println!("  Address:    {}", item.address);
    println!("  Location:   {:.6}, {:.6}", item.latitude, item.longitude);
    println!("  Collection: {collection}");
    if let Some(ref reason) = item.reason {
        println!("  Reason:     {reason}");
    }
    if !item.tags.is_empty() {
        println!("  Tags:       {}", item.tags.join(", "));
    }
    if !item.photo_ids.is_empty() {
        let ids: Vec<String> = item.photo_ids.iter().map(ToString::to_string).collect();
        println!("  Photos:     {}", ids.join(", "));
    }
    println!(
        "  Added:      {}{}",
        format_timestamp(&item.created_at),
        if item.is_imported { " (imported)" } else { "" }
    );
    Ok(())
}

/// Fields not given on the command line keep their stored values.
fn merge_update(existing: FoodItem, args: UpdateArgs, photos: Vec<Vec<u8>>) -> NewFoodItem {
    NewFoodItem {
        name: args.name.unwrap_or(existing.name),
        city: args.city.unwrap_or(existing.city),
        address: args.address.unwrap_or(existing.address),
        latitude: args.lat.unwrap_or(existing.latitude),
        longitude: args.lng.unwrap_or(existing.longitude),
        rating: args.rating.unwrap_or(existing.rating),
        reason: args.reason.or(existing.reason),
        food_type: args.food_type.unwrap_or(existing.food_type),
        collection_id: Some(args.collection.unwrap_or(existing.collection_id)),
        photos,
        tags: args.tags,
    }
}

pub(crate) fn cmd_update(db: &Database, args: UpdateArgs) -> Result<()> {
    let id = args.id;
    let json = args.json;
    let Some(existing) = db.get_item(id)? else {
        not_found(&format!("Food item {id} not found"), json);
    };

    let photos = load_photos(&args.photos)?;
    let update = merge_update(existing, args, photos);
    if !db.update_item(id, &update)? {
        not_found(&format!("Food item {id} not found"), json);
    }

    let Some(item) = db.get_item(id)? else {
        not_found(&format!("Food item {id} not found"), json);
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        println!("Updated '{}' ({:.1}/10)", item.name, item.rating);
    }
    Ok(())
}

pub(crate) fn cmd_delete(db: &Database, id: i64, json: bool) -> Result<()> {
    if !db.delete_item(id)? {
        not_found(&format!("Food item {id} not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted food item {id}");
    }
    Ok(())
}

pub(crate) fn cmd_list(db: &Database, args: &ListArgs) -> Result<()> {
    let items = filtered_items(db, args)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        eprintln!("No food items found. Use `foodmap add` to record one.");
    } else {
        print_item_table(&items);
    }
    Ok(())
}

/// Query by the most selective filter, then apply the rest in memory.
fn filtered_items(db: &Database, args: &ListArgs) -> Result<Vec<FoodItem>> {
    let mut items = if let Some(id) = args.collection {
        db.by_collection(id)?
    } else if let Some(ref tag) = args.tag {
        db.by_tag(tag)?
    } else if let Some(ref city) = args.city {
        db.by_city(city)?
    } else if args.personal {
        db.personal_only()?
    } else if args.imported {
        db.imported_only()?
    } else if let Some(min) = args.min_rating {
        db.by_min_rating(min)?
    } else {
        db.list_all()?
    };

    items.retain(|i| {
        args.city.as_ref().is_none_or(|c| i.city == *c)
            && args.min_rating.is_none_or(|r| i.rating >= r)
            && args.tag.as_ref().is_none_or(|t| i.tags.iter().any(|x| x == t.trim()))
            && (!args.personal || !i.is_imported)
            && (!args.imported || i.is_imported)
    });
    Ok(items)
}
