mod commands;
mod config;
mod ingest;
mod logging;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use crate::commands::{
    AddArgs, ListArgs, UpdateArgs, cmd_add, cmd_collection_create, cmd_collection_delete,
    cmd_collection_list, cmd_collection_rename, cmd_collection_show, cmd_config_set,
    cmd_config_show, cmd_delete, cmd_export_all, cmd_export_blog, cmd_export_collection,
    cmd_import, cmd_list, cmd_photo_add, cmd_photo_delete, cmd_photo_get, cmd_show,
    cmd_tag_add, cmd_tag_list, cmd_tag_remove, cmd_update,
};
use crate::config::Config;
use foodmap_core::db::Database;

#[derive(Parser)]
#[command(
    name = "foodmap",
    version,
    about = "A local-first notebook for restaurant recommendations"
)]
struct Cli {
    /// Database file (default: foodmap.db in the data directory)
    #[arg(long, global = true, env = "FOODMAP_DB", value_name = "PATH")]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage collections
    Collection {
        #[command(subcommand)]
        command: CollectionCommands,
    },
    /// Record a new place
    Add(AddArgs),
    /// Show one food item
    Show {
        /// Food item ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a food item; unspecified fields are kept
    Update(UpdateArgs),
    /// Delete a food item with its photos
    Delete {
        /// Food item ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List food items, newest first (best rated first when filtering by city or rating)
    List(ListArgs),
    /// Manage photos of a food item
    Photo {
        #[command(subcommand)]
        command: PhotoCommands,
    },
    /// Manage tags
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },
    /// Export collections or the whole store
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// Import a collection from a .json export
    Import {
        /// Path to the .json file
        file: PathBuf,
        /// Name for the new collection (default: from the file)
        #[arg(long, conflicts_with = "into")]
        name: Option<String>,
        /// Add to an existing collection instead, skipping places already stored
        #[arg(long, value_name = "COLLECTION_ID")]
        into: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum CollectionCommands {
    /// List collections with item counts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a collection and its items
    Show {
        /// Collection ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create an empty collection
    Create {
        /// Collection name
        name: String,
        /// Optional description
        #[arg(short, long)]
        description: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rename a collection
    Rename {
        /// Collection ID
        id: i64,
        /// New name
        name: String,
        /// New description
        #[arg(short, long)]
        description: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a collection and everything in it
    Delete {
        /// Collection ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PhotoCommands {
    /// Attach photos (resized to at most 800x800 and stored as JPEG)
    Add {
        /// Food item ID
        item_id: i64,
        /// Image files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a stored photo to a file
    Get {
        /// Photo ID
        photo_id: i64,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a photo
    Delete {
        /// Photo ID
        photo_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum TagCommands {
    /// Tag a food item
    Add {
        /// Food item ID
        item_id: i64,
        /// Tags to add
        #[arg(required = true)]
        tags: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a tag from a food item
    Remove {
        /// Food item ID
        item_id: i64,
        /// Tag to remove
        tag: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List tags with usage counts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ExportCommands {
    /// Export one collection as JSON with embedded photos
    Collection {
        /// Collection ID
        id: i64,
        /// Output .json file
        #[arg(short, long)]
        output: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export every item (.csv for CSV, anything else for JSON without photos)
    All {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Render a collection as a standalone HTML page
    Blog {
        /// Collection ID
        id: i64,
        /// Output .html file
        #[arg(short, long)]
        output: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show paths and settings (keys are masked)
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set a setting: place_search_key, map_display_key, default_city
    Set {
        /// Setting name
        key: String,
        /// New value (empty to clear)
        value: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.db)?;
    let settings = config.load_settings()?;

    // Settings commands work without touching the database.
    let command = match cli.command {
        Commands::Config { command } => {
            return match command {
                ConfigCommands::Show { json } => cmd_config_show(&config, &settings, json),
                ConfigCommands::Set { key, value, json } => {
                    cmd_config_set(&config, settings, &key, &value, json)
                }
            };
        }
        other => other,
    };

    let db = Database::open(&config.db_path)?;

    match command {
        Commands::Collection { command } => match command {
            CollectionCommands::List { json } => cmd_collection_list(&db, json),
            CollectionCommands::Show { id, json } => cmd_collection_show(&db, id, json),
            CollectionCommands::Create {
                name,
                description,
                json,
            } => cmd_collection_create(&db, &name, description.as_deref(), json),
            CollectionCommands::Rename {
                id,
                name,
                description,
                json,
            } => cmd_collection_rename(&db, id, &name, description.as_deref(), json),
            CollectionCommands::Delete { id, json } => cmd_collection_delete(&db, id, json),
        },
        Commands::Add(args) => cmd_add(&db, &settings, args),
        Commands::Show { id, json } => cmd_show(&db, id, json),
        Commands::Update(args) => cmd_update(&db, args),
        Commands::Delete { id, json } => cmd_delete(&db, id, json),
        Commands::List(args) => cmd_list(&db, &args),
        Commands::Photo { command } => match command {
            PhotoCommands::Add {
                item_id,
                files,
                json,
            } => cmd_photo_add(&db, item_id, &files, json),
            PhotoCommands::Get {
                photo_id,
                output,
                json,
            } => cmd_photo_get(&db, photo_id, &output, json),
            PhotoCommands::Delete { photo_id, json } => cmd_photo_delete(&db, photo_id, json),
        },
        Commands::Tag { command } => match command {
            TagCommands::Add {
                item_id,
                tags,
                json,
            } => cmd_tag_add(&db, item_id, &tags, json),
            TagCommands::Remove { item_id, tag, json } => cmd_tag_remove(&db, item_id, &tag, json),
            TagCommands::List { json } => cmd_tag_list(&db, json),
        },
        Commands::Export { command } => match command {
            ExportCommands::Collection { id, output, json } => {
                cmd_export_collection(&db, id, &output, json)
            }
            ExportCommands::All { output, json } => cmd_export_all(&db, &output, json),
            ExportCommands::Blog { id, output, json } => cmd_export_blog(&db, id, &output, json),
        },
        Commands::Import {
            file,
            name,
            into,
            json,
        } => cmd_import(&db, &file, name, into, json),
        // Returned above.
        Commands::Config { .. } => Ok(()),
    }
}
