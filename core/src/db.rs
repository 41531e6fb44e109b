use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use tracing::debug;

use crate::models::{
    Collection, DEFAULT_RATING, FoodItem, FoodItemDetail, NewFoodItem,
    PERSONAL_COLLECTION_DESCRIPTION, PERSONAL_COLLECTION_NAME, Photo, TagCount, now_timestamp,
    validate_tag,
};
use crate::schema;

const ITEM_COLUMNS: &str = "id, collection_id, name, city, address, latitude, longitude, rating, reason, food_type, is_imported, created_at";

const NEWEST_FIRST: &str = "ORDER BY created_at DESC, id DESC";
const BEST_RATED_FIRST: &str = "ORDER BY rating DESC, created_at DESC, id DESC";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        let db = Database { conn };
        db.ensure_schema()?;
        Ok(db)
    }

    /// Create or migrate tables; see [`schema::ensure_schema`].
    pub fn ensure_schema(&self) -> Result<()> {
        schema::ensure_schema(&self.conn)
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Row mapping helpers ---

    fn collection_from_row(row: &rusqlite::Row) -> rusqlite::Result<Collection> {
        Ok(Collection {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            created_at: row.get(3)?,
            is_personal: row.get(4)?,
        })
    }

    // Expects ITEM_COLUMNS order. Photo ids and tags are filled in by
    // `with_attachments`.
    fn item_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodItem> {
        Ok(FoodItem {
            id: row.get(0)?,
            collection_id: row.get(1)?,
            name: row.get(2)?,
            city: row.get(3)?,
            address: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            latitude: row.get(5)?,
            longitude: row.get(6)?,
            rating: row.get::<_, Option<f64>>(7)?.unwrap_or(DEFAULT_RATING),
            reason: row.get(8)?,
            food_type: row.get(9)?,
            is_imported: row.get::<_, Option<bool>>(10)?.unwrap_or(false),
            created_at: row.get(11)?,
            photo_ids: Vec::new(),
            tags: Vec::new(),
        })
    }

    fn with_attachments(&self, mut items: Vec<FoodItem>) -> Result<Vec<FoodItem>> {
        for item in &mut items {
            item.photo_ids = self.photo_ids_for_item(item.id)?;
            item.tags = self.tags_for_item(item.id)?;
        }
        Ok(items)
    }

    fn query_items<P: rusqlite::Params>(&self, clause: &str, params: P) -> Result<Vec<FoodItem>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {ITEM_COLUMNS} FROM food_items {clause}"))?;
        let items = stmt
            .query_map(params, Self::item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        self.with_attachments(items)
    }

    // --- Collections ---

    /// Id of the personal collection, creating it if this is the first access.
    ///
    /// Runs in an `IMMEDIATE` transaction so concurrent first callers are
    /// serialized; the partial unique index on `is_personal` backs this up.
    pub fn get_or_create_personal_collection(&self) -> Result<i64> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let id = ensure_personal_collection(&tx)?;
        tx.commit()?;
        Ok(id)
    }

    /// Personal collection first, then the most recently created.
    pub fn list_collections(&self) -> Result<Vec<Collection>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, created_at, is_personal FROM collections
             ORDER BY is_personal DESC, created_at DESC, id DESC",
        )?;
        let collections = stmt
            .query_map([], Self::collection_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(collections)
    }

    pub fn get_collection(&self, id: i64) -> Result<Option<Collection>> {
        let collection = self
            .conn
            .query_row(
                "SELECT id, name, description, created_at, is_personal FROM collections WHERE id = ?1",
                params![id],
                Self::collection_from_row,
            )
            .optional()?;
        Ok(collection)
    }

    pub fn create_collection(&self, name: &str, description: Option<&str>) -> Result<i64> {
        let id = insert_collection(&self.conn, name, description)?;
        debug!(id, name, "Created collection");
        Ok(id)
    }

    pub fn rename_collection(&self, id: i64, name: &str, description: Option<&str>) -> Result<bool> {
        let name = name.trim();
        if name.is_empty() {
            bail!("Collection name is required");
        }
        let changed = self.conn.execute(
            "UPDATE collections SET name = ?1, description = ?2 WHERE id = ?3",
            params![name, description.map(str::trim).filter(|d| !d.is_empty()), id],
        )?;
        Ok(changed > 0)
    }

    /// `None` when the collection does not exist.
    ///
    /// The store will delete the personal collection if asked; refusing to is
    /// left to callers, which use this to enforce it.
    pub fn is_personal_collection(&self, id: i64) -> Result<Option<bool>> {
        let flag = self
            .conn
            .query_row(
                "SELECT is_personal FROM collections WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(flag)
    }

    /// Delete a collection with all of its items, their photos and tag links.
    pub fn delete_collection(&self, id: i64) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM food_tags WHERE food_item_id IN
                (SELECT id FROM food_items WHERE collection_id = ?1)",
            params![id],
        )?;
        tx.execute(
            "DELETE FROM photos WHERE food_item_id IN
                (SELECT id FROM food_items WHERE collection_id = ?1)",
            params![id],
        )?;
        let items = tx.execute("DELETE FROM food_items WHERE collection_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM collections WHERE id = ?1", params![id])?;
        tx.commit()?;
        debug!(id, items, "Deleted collection");
        Ok(removed > 0)
    }

    pub fn count_items_in_collection(&self, id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM food_items WHERE collection_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // --- Food items ---

    /// Insert an item with its photos and tags in one transaction.
    pub fn add_item(&self, item: &NewFoodItem) -> Result<i64> {
        item.validate()?;
        let tx = self.conn.unchecked_transaction()?;
        let collection_id = resolve_collection(&tx, item.collection_id)?;
        let id = insert_item(&tx, item, collection_id, false)?;
        tx.commit()?;
        debug!(id, collection_id, photos = item.photos.len(), "Added food item");
        Ok(id)
    }

    pub fn get_item(&self, id: i64) -> Result<Option<FoodItem>> {
        let item = self
            .conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM food_items WHERE id = ?1"),
                params![id],
                Self::item_from_row,
            )
            .optional()?;
        match item {
            Some(item) => Ok(self.with_attachments(vec![item])?.pop()),
            None => Ok(None),
        }
    }

    /// Like `get_item`, with the photo blobs loaded.
    pub fn get_item_detail(&self, id: i64) -> Result<Option<FoodItemDetail>> {
        let Some(item) = self.get_item(id)? else {
            return Ok(None);
        };
        let photos = self.photos_for_item(id)?;
        Ok(Some(FoodItemDetail { item, photos }))
    }

    /// Replace the mutable fields of an item; photos and tags in `item` are
    /// added to the existing ones. `created_at` and `is_imported` are kept.
    pub fn update_item(&self, id: i64, item: &NewFoodItem) -> Result<bool> {
        item.validate()?;
        let tx = self.conn.unchecked_transaction()?;
        let collection_id = resolve_collection(&tx, item.collection_id)?;
        let changed = tx.execute(
            "UPDATE food_items SET name = ?1, city = ?2, address = ?3, latitude = ?4,
             longitude = ?5, rating = ?6, reason = ?7, food_type = ?8, collection_id = ?9
             WHERE id = ?10",
            params![
                item.name.trim(),
                item.city.trim(),
                item.address.trim(),
                item.latitude,
                item.longitude,
                item.rating,
                item.normalized_reason(),
                item.normalized_food_type(),
                collection_id,
                id,
            ],
        )?;
        if changed == 0 {
            return Ok(false);
        }
        for photo in &item.photos {
            insert_photo(&tx, id, photo)?;
        }
        for tag in &item.tags {
            link_tag(&tx, id, tag)?;
        }
        tx.commit()?;
        debug!(id, new_photos = item.photos.len(), "Updated food item");
        Ok(true)
    }

    /// Delete an item with its photos and tag links. False if there was no such item.
    pub fn delete_item(&self, id: i64) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = delete_item_rows(&tx, id)?;
        tx.commit()?;
        Ok(removed)
    }

    pub fn list_all(&self) -> Result<Vec<FoodItem>> {
        self.query_items(NEWEST_FIRST, [])
    }

    pub fn by_city(&self, city: &str) -> Result<Vec<FoodItem>> {
        self.query_items(&format!("WHERE city = ?1 {BEST_RATED_FIRST}"), params![city])
    }

    pub fn by_min_rating(&self, threshold: f64) -> Result<Vec<FoodItem>> {
        self.query_items(
            &format!("WHERE rating >= ?1 {BEST_RATED_FIRST}"),
            params![threshold],
        )
    }

    pub fn by_collection(&self, collection_id: i64) -> Result<Vec<FoodItem>> {
        self.query_items(
            &format!("WHERE collection_id = ?1 {NEWEST_FIRST}"),
            params![collection_id],
        )
    }

    pub fn personal_only(&self) -> Result<Vec<FoodItem>> {
        self.query_items(
            &format!("WHERE is_imported = 0 OR is_imported IS NULL {NEWEST_FIRST}"),
            [],
        )
    }

    pub fn imported_only(&self) -> Result<Vec<FoodItem>> {
        self.query_items(&format!("WHERE is_imported = 1 {NEWEST_FIRST}"), [])
    }

    pub fn by_tag(&self, tag: &str) -> Result<Vec<FoodItem>> {
        self.query_items(
            &format!(
                "WHERE id IN (SELECT ft.food_item_id FROM food_tags ft
                              JOIN tags t ON t.id = ft.tag_id WHERE t.name = ?1)
                 {NEWEST_FIRST}"
            ),
            params![tag.trim()],
        )
    }

    pub fn list_cities(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT city FROM food_items ORDER BY city")?;
        let cities = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cities)
    }

    /// Whether an item with this exact (name, address) pair exists anywhere.
    pub fn item_exists(&self, name: &str, address: &str) -> Result<bool> {
        item_exists(&self.conn, name, address)
    }

    // --- Photos ---

    pub fn add_photo(&self, food_item_id: i64, data: &[u8]) -> Result<i64> {
        if !item_id_exists(&self.conn, food_item_id)? {
            bail!("Food item {food_item_id} not found");
        }
        insert_photo(&self.conn, food_item_id, data)
    }

    /// Attach several photos in one transaction; either all are stored or none.
    pub fn add_photos(&self, food_item_id: i64, photos: &[Vec<u8>]) -> Result<Vec<i64>> {
        let tx = self.conn.unchecked_transaction()?;
        if !item_id_exists(&tx, food_item_id)? {
            bail!("Food item {food_item_id} not found");
        }
        let ids = photos
            .iter()
            .map(|data| insert_photo(&tx, food_item_id, data))
            .collect::<Result<Vec<_>>>()?;
        tx.commit()?;
        debug!(food_item_id, photos = ids.len(), "Added photos");
        Ok(ids)
    }

    pub fn get_photo(&self, id: i64) -> Result<Option<Vec<u8>>> {
        let data = self
            .conn
            .query_row(
                "SELECT data FROM photos WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(data)
    }

    pub fn delete_photo(&self, id: i64) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM photos WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    pub fn photo_ids_for_item(&self, food_item_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM photos WHERE food_item_id = ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![food_item_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn photos_for_item(&self, food_item_id: i64) -> Result<Vec<Photo>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, food_item_id, data FROM photos WHERE food_item_id = ?1 ORDER BY id",
        )?;
        let photos = stmt
            .query_map(params![food_item_id], |row| {
                Ok(Photo {
                    id: row.get(0)?,
                    food_item_id: row.get(1)?,
                    data: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(photos)
    }

    // --- Tags ---

    /// Attach a tag, creating it on first use. False if the item already had it.
    pub fn tag_item(&self, food_item_id: i64, tag: &str) -> Result<bool> {
        validate_tag(tag)?;
        if !item_id_exists(&self.conn, food_item_id)? {
            bail!("Food item {food_item_id} not found");
        }
        link_tag(&self.conn, food_item_id, tag)
    }

    pub fn untag_item(&self, food_item_id: i64, tag: &str) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM food_tags WHERE food_item_id = ?1
             AND tag_id = (SELECT id FROM tags WHERE name = ?2)",
            params![food_item_id, tag.trim()],
        )?;
        Ok(removed > 0)
    }

    pub fn tags_for_item(&self, food_item_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.name FROM tags t JOIN food_tags ft ON ft.tag_id = t.id
             WHERE ft.food_item_id = ?1 ORDER BY t.name",
        )?;
        let tags = stmt
            .query_map(params![food_item_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    /// Tags in use, most used first.
    pub fn list_tags(&self) -> Result<Vec<TagCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.name, COUNT(ft.food_item_id) AS n FROM tags t
             JOIN food_tags ft ON ft.tag_id = t.id
             GROUP BY t.id ORDER BY n DESC, t.name",
        )?;
        let tags = stmt
            .query_map([], |row| {
                Ok(TagCount {
                    name: row.get(0)?,
                    item_count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }
}

// Statement helpers shared by the store and the import engine. They take a
// plain connection so they can run inside a transaction or savepoint.

/// Returns the personal collection id, inserting it if missing. Callers
/// provide the surrounding transaction.
pub(crate) fn ensure_personal_collection(conn: &Connection) -> Result<i64> {
    let inserted = conn.execute(
        "INSERT INTO collections (name, description, created_at, is_personal)
         SELECT ?1, ?2, ?3, 1
         WHERE NOT EXISTS (SELECT 1 FROM collections WHERE is_personal = 1)",
        params![
            PERSONAL_COLLECTION_NAME,
            PERSONAL_COLLECTION_DESCRIPTION,
            now_timestamp()
        ],
    )?;
    if inserted > 0 {
        debug!("Created personal collection");
    }
    let id = conn.query_row(
        "SELECT id FROM collections WHERE is_personal = 1",
        [],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub(crate) fn insert_collection(
    conn: &Connection,
    name: &str,
    description: Option<&str>,
) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Collection name is required");
    }
    conn.execute(
        "INSERT INTO collections (name, description, created_at, is_personal)
         VALUES (?1, ?2, ?3, 0)",
        params![
            name,
            description.map(str::trim).filter(|d| !d.is_empty()),
            now_timestamp()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn resolve_collection(conn: &Connection, collection_id: Option<i64>) -> Result<i64> {
    match collection_id {
        Some(id) => {
            let exists: i64 = conn.query_row(
                "SELECT COUNT(*) FROM collections WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            if exists == 0 {
                bail!("Collection {id} not found");
            }
            Ok(id)
        }
        None => ensure_personal_collection(conn),
    }
}

/// Insert the item row, its photos and its tags. No validation.
pub(crate) fn insert_item(
    conn: &Connection,
    item: &NewFoodItem,
    collection_id: i64,
    is_imported: bool,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO food_items (collection_id, name, city, address, latitude, longitude,
         rating, reason, food_type, is_imported, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            collection_id,
            item.name.trim(),
            item.city.trim(),
            item.address.trim(),
            item.latitude,
            item.longitude,
            item.rating,
            item.normalized_reason(),
            item.normalized_food_type(),
            is_imported,
            now_timestamp(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    for photo in &item.photos {
        insert_photo(conn, id, photo)?;
    }
    for tag in &item.tags {
        link_tag(conn, id, tag)?;
    }
    Ok(id)
}

fn insert_photo(conn: &Connection, food_item_id: i64, data: &[u8]) -> Result<i64> {
    conn.execute(
        "INSERT INTO photos (food_item_id, data) VALUES (?1, ?2)",
        params![food_item_id, data],
    )?;
    Ok(conn.last_insert_rowid())
}

fn link_tag(conn: &Connection, food_item_id: i64, tag: &str) -> Result<bool> {
    let tag = tag.trim();
    conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![tag])?;
    let tag_id: i64 = conn.query_row(
        "SELECT id FROM tags WHERE name = ?1",
        params![tag],
        |row| row.get(0),
    )?;
    let linked = conn.execute(
        "INSERT OR IGNORE INTO food_tags (food_item_id, tag_id) VALUES (?1, ?2)",
        params![food_item_id, tag_id],
    )?;
    Ok(linked > 0)
}

fn delete_item_rows(conn: &Connection, id: i64) -> Result<bool> {
    conn.execute("DELETE FROM food_tags WHERE food_item_id = ?1", params![id])?;
    conn.execute("DELETE FROM photos WHERE food_item_id = ?1", params![id])?;
    let removed = conn.execute("DELETE FROM food_items WHERE id = ?1", params![id])?;
    Ok(removed > 0)
}

fn item_id_exists(conn: &Connection, id: i64) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM food_items WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub(crate) fn item_exists(conn: &Connection, name: &str, address: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM food_items WHERE name = ?1 AND address = ?2",
        params![name.trim(), address.trim()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use super::*;

    fn sample_item() -> NewFoodItem {
        NewFoodItem {
            name: "Joe's Diner".to_string(),
            city: "Springfield".to_string(),
            address: "1 Main St".to_string(),
            latitude: 1.0,
            longitude: 2.0,
            rating: 8.5,
            reason: Some("great pie".to_string()),
            food_type: "American".to_string(),
            photos: vec![vec![0x00, 0x01]],
            ..NewFoodItem::default()
        }
    }

    fn item_named(name: &str, city: &str, rating: f64) -> NewFoodItem {
        NewFoodItem {
            name: name.to_string(),
            city: city.to_string(),
            address: format!("{name} street"),
            latitude: 10.0,
            longitude: 20.0,
            rating,
            food_type: "Other".to_string(),
            ..NewFoodItem::default()
        }
    }

    fn count(db: &Database, sql: &str) -> i64 {
        db.conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    // --- Collections ---

    #[test]
    fn test_personal_collection_is_stable() {
        let db = Database::open_in_memory().unwrap();
        let first = db.get_or_create_personal_collection().unwrap();
        let second = db.get_or_create_personal_collection().unwrap();
        assert_eq!(first, second);

        let collection = db.get_collection(first).unwrap().unwrap();
        assert_eq!(collection.name, "My Food Map");
        assert_eq!(collection.description.as_deref(), Some("Personal food collection"));
        assert!(collection.is_personal);
    }

    #[test]
    fn test_personal_collection_recreated_lazily() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute("DELETE FROM collections WHERE is_personal = 1", [])
            .unwrap();
        let id = db.get_or_create_personal_collection().unwrap();
        assert_eq!(db.is_personal_collection(id).unwrap(), Some(true));
        assert_eq!(count(&db, "SELECT COUNT(*) FROM collections"), 1);
    }

    #[test]
    fn test_second_personal_row_rejected_by_index() {
        let db = Database::open_in_memory().unwrap();
        let result = db.conn.execute(
            "INSERT INTO collections (name, created_at, is_personal) VALUES ('Dup', 'x', 1)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_concurrent_personal_creation_yields_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("race.db");
        let setup = Database::open(&path).unwrap();
        let racers: Vec<Database> = (0..2).map(|_| Database::open(&path).unwrap()).collect();
        setup
            .conn
            .execute("DELETE FROM collections WHERE is_personal = 1", [])
            .unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = racers
            .into_iter()
            .map(|db| {
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    db.get_or_create_personal_collection().unwrap()
                })
            })
            .collect();
        let ids: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(ids[0], ids[1]);
        assert_eq!(
            count(&setup, "SELECT COUNT(*) FROM collections WHERE is_personal = 1"),
            1
        );
    }

    #[test]
    fn test_list_collections_order() {
        let db = Database::open_in_memory().unwrap();
        let personal = db.get_or_create_personal_collection().unwrap();
        let older = db.create_collection("Older", None).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        let newer = db.create_collection("Newer", Some("trip")).unwrap();

        let ids: Vec<i64> = db.list_collections().unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![personal, newer, older]);
    }

    #[test]
    fn test_create_collection_requires_name() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.create_collection("  ", None).is_err());
        let id = db.create_collection("Tokyo trip", Some("  ")).unwrap();
        let collection = db.get_collection(id).unwrap().unwrap();
        assert!(!collection.is_personal);
        assert!(collection.description.is_none());
    }

    #[test]
    fn test_rename_collection() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_collection("Old", None).unwrap();
        assert!(db.rename_collection(id, "New", Some("desc")).unwrap());
        assert!(!db.rename_collection(9999, "New", None).unwrap());
        let collection = db.get_collection(id).unwrap().unwrap();
        assert_eq!(collection.name, "New");
        assert_eq!(collection.description.as_deref(), Some("desc"));
    }

    #[test]
    fn test_is_personal_collection_missing() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.is_personal_collection(12345).unwrap(), None);
        let id = db.create_collection("Other", None).unwrap();
        assert_eq!(db.is_personal_collection(id).unwrap(), Some(false));
    }

    #[test]
    fn test_delete_collection_cascades() {
        let db = Database::open_in_memory().unwrap();
        let keep = db.add_item(&item_named("Keep", "Paris", 7.0)).unwrap();
        let trip = db.create_collection("Trip", None).unwrap();
        let mut doomed = sample_item();
        doomed.collection_id = Some(trip);
        doomed.tags = vec!["pie".to_string()];
        let doomed_id = db.add_item(&doomed).unwrap();
        let doomed_photos = db.photo_ids_for_item(doomed_id).unwrap();
        let mut second = item_named("Second", "Paris", 6.0);
        second.collection_id = Some(trip);
        second.photos = vec![vec![9, 9, 9], vec![8]];
        db.add_item(&second).unwrap();

        assert!(db.delete_collection(trip).unwrap());

        assert!(db.get_collection(trip).unwrap().is_none());
        assert!(db.by_collection(trip).unwrap().is_empty());
        assert!(db.get_item(doomed_id).unwrap().is_none());
        for photo in doomed_photos {
            assert!(db.get_photo(photo).unwrap().is_none());
        }
        assert_eq!(count(&db, "SELECT COUNT(*) FROM photos"), 0);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM food_tags"), 0);
        assert!(db.get_item(keep).unwrap().is_some());
        assert!(!db.delete_collection(trip).unwrap());
    }

    #[test]
    fn test_store_deletes_personal_collection_when_asked() {
        let db = Database::open_in_memory().unwrap();
        let personal = db.get_or_create_personal_collection().unwrap();
        db.add_item(&sample_item()).unwrap();
        assert!(db.delete_collection(personal).unwrap());
        assert!(db.list_all().unwrap().is_empty());
    }

    // --- Food items ---

    #[test]
    fn test_add_and_get_item_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let personal = db.get_or_create_personal_collection().unwrap();
        let input = sample_item();
        let id = db.add_item(&input).unwrap();

        let item = db.get_item(id).unwrap().unwrap();
        assert_eq!(item.name, input.name);
        assert_eq!(item.city, input.city);
        assert_eq!(item.address, input.address);
        assert_eq!(item.latitude, input.latitude);
        assert_eq!(item.longitude, input.longitude);
        assert_eq!(item.rating, input.rating);
        assert_eq!(item.reason, input.reason);
        assert_eq!(item.food_type, input.food_type);
        assert_eq!(item.collection_id, personal);
        assert!(!item.is_imported);
        assert_eq!(item.photo_ids.len(), 1);

        let detail = db.get_item_detail(id).unwrap().unwrap();
        assert_eq!(detail.photos[0].data, vec![0x00, 0x01]);
    }

    #[test]
    fn test_add_item_with_several_photos_and_tags() {
        let db = Database::open_in_memory().unwrap();
        let mut input = sample_item();
        input.photos = vec![vec![1], vec![2], vec![3]];
        input.tags = vec!["pie".to_string(), "diner".to_string()];
        let id = db.add_item(&input).unwrap();
        let item = db.get_item(id).unwrap().unwrap();
        assert_eq!(item.photo_ids.len(), 3);
        assert_eq!(item.tags, vec!["diner".to_string(), "pie".to_string()]);
    }

    #[test]
    fn test_add_item_rejects_missing_fields() {
        let db = Database::open_in_memory().unwrap();
        let mut input = sample_item();
        input.address = String::new();
        assert!(db.add_item(&input).is_err());

        let mut input = sample_item();
        input.rating = 11.0;
        assert!(db.add_item(&input).is_err());

        assert_eq!(count(&db, "SELECT COUNT(*) FROM food_items"), 0);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM photos"), 0);
    }

    #[test]
    fn test_add_item_unknown_collection_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let mut input = sample_item();
        input.collection_id = Some(777);
        assert!(db.add_item(&input).is_err());
        assert_eq!(count(&db, "SELECT COUNT(*) FROM food_items"), 0);
    }

    #[test]
    fn test_get_item_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_item(42).unwrap().is_none());
        assert!(db.get_item_detail(42).unwrap().is_none());
    }

    #[test]
    fn test_update_item_replaces_fields_and_appends_photos() {
        let db = Database::open_in_memory().unwrap();
        let id = db.add_item(&sample_item()).unwrap();
        let before = db.get_item(id).unwrap().unwrap();
        let trip = db.create_collection("Trip", None).unwrap();

        let update = NewFoodItem {
            name: "Joe's Pie Shop".to_string(),
            city: "Shelbyville".to_string(),
            address: "2 Oak Ave".to_string(),
            latitude: 3.0,
            longitude: 4.0,
            rating: 9.0,
            reason: None,
            food_type: "Bakery".to_string(),
            collection_id: Some(trip),
            photos: vec![vec![0xAA]],
            tags: Vec::new(),
        };
        assert!(db.update_item(id, &update).unwrap());

        let after = db.get_item(id).unwrap().unwrap();
        assert_eq!(after.name, "Joe's Pie Shop");
        assert_eq!(after.city, "Shelbyville");
        assert_eq!(after.rating, 9.0);
        assert!(after.reason.is_none());
        assert_eq!(after.food_type, "Bakery");
        assert_eq!(after.collection_id, trip);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.is_imported, before.is_imported);
        assert_eq!(after.photo_ids.len(), 2);
        assert_eq!(after.photo_ids[0], before.photo_ids[0]);
    }

    #[test]
    fn test_update_item_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.update_item(99, &sample_item()).unwrap());
        assert_eq!(count(&db, "SELECT COUNT(*) FROM photos"), 0);
    }

    #[test]
    fn test_delete_item_cascades_to_photos() {
        let db = Database::open_in_memory().unwrap();
        let mut input = sample_item();
        input.photos = vec![vec![1], vec![2]];
        input.tags = vec!["pie".to_string()];
        let id = db.add_item(&input).unwrap();
        let photos = db.photo_ids_for_item(id).unwrap();

        assert!(db.delete_item(id).unwrap());
        assert!(db.get_item(id).unwrap().is_none());
        for photo in photos {
            assert!(db.get_photo(photo).unwrap().is_none());
        }
        assert_eq!(count(&db, "SELECT COUNT(*) FROM food_tags"), 0);
        assert!(!db.delete_item(id).unwrap());
    }

    #[test]
    fn test_foreign_keys_block_orphaning_delete() {
        let db = Database::open_in_memory().unwrap();
        let id = db.add_item(&sample_item()).unwrap();
        let result = db
            .conn
            .execute("DELETE FROM food_items WHERE id = ?1", params![id]);
        assert!(result.is_err());
    }

    #[test]
    fn test_queries_filter_and_order() {
        let db = Database::open_in_memory().unwrap();
        let a = db.add_item(&item_named("A", "Paris", 6.0)).unwrap();
        let b = db.add_item(&item_named("B", "Paris", 9.5)).unwrap();
        let c = db.add_item(&item_named("C", "Lyon", 8.0)).unwrap();

        let all: Vec<i64> = db.list_all().unwrap().iter().map(|i| i.id).collect();
        assert_eq!(all, vec![c, b, a]);

        let paris: Vec<i64> = db.by_city("Paris").unwrap().iter().map(|i| i.id).collect();
        assert_eq!(paris, vec![b, a]);

        let good: Vec<i64> = db.by_min_rating(8.0).unwrap().iter().map(|i| i.id).collect();
        assert_eq!(good, vec![b, c]);

        assert_eq!(db.list_cities().unwrap(), vec!["Lyon", "Paris"]);
    }

    #[test]
    fn test_by_collection() {
        let db = Database::open_in_memory().unwrap();
        let personal = db.get_or_create_personal_collection().unwrap();
        let trip = db.create_collection("Trip", None).unwrap();
        db.add_item(&item_named("Home", "Paris", 6.0)).unwrap();
        let mut away = item_named("Away", "Rome", 7.0);
        away.collection_id = Some(trip);
        db.add_item(&away).unwrap();

        assert_eq!(db.by_collection(personal).unwrap().len(), 1);
        let trip_items = db.by_collection(trip).unwrap();
        assert_eq!(trip_items.len(), 1);
        assert_eq!(trip_items[0].name, "Away");
        assert_eq!(db.count_items_in_collection(trip).unwrap(), 1);
    }

    #[test]
    fn test_personal_and_imported_filters() {
        let db = Database::open_in_memory().unwrap();
        let personal = db.get_or_create_personal_collection().unwrap();
        db.add_item(&item_named("Mine", "Paris", 6.0)).unwrap();
        insert_item(&db.conn, &item_named("Theirs", "Paris", 6.0), personal, true).unwrap();

        let mine = db.personal_only().unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "Mine");
        let theirs = db.imported_only().unwrap();
        assert_eq!(theirs.len(), 1);
        assert!(theirs[0].is_imported);
    }

    #[test]
    fn test_queries_tolerate_null_optional_fields() {
        let db = Database::open_in_memory().unwrap();
        let personal = db.get_or_create_personal_collection().unwrap();
        // Rows written by older versions carry NULL reasons and integer ratings.
        db.conn
            .execute(
                "INSERT INTO food_items (collection_id, name, city, address, latitude, longitude,
                 rating, reason, food_type, is_imported, created_at)
                 VALUES (?1, 'Old', 'Paris', 'x', 0, 0, 7, NULL, 'Other', 0, '2020-01-01T00:00:00Z')",
                params![personal],
            )
            .unwrap();
        let items = db.by_city("Paris").unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].reason.is_none());
        assert_eq!(items[0].rating, 7.0);
        assert_eq!(db.personal_only().unwrap().len(), 1);
    }

    #[test]
    fn test_item_exists_exact_match() {
        let db = Database::open_in_memory().unwrap();
        db.add_item(&sample_item()).unwrap();
        assert!(db.item_exists("Joe's Diner", "1 Main St").unwrap());
        assert!(!db.item_exists("joe's diner", "1 Main St").unwrap());
        assert!(!db.item_exists("Joe's Diner", "1 Main Street").unwrap());
    }

    // --- Photos ---

    #[test]
    fn test_photo_crud() {
        let db = Database::open_in_memory().unwrap();
        let mut input = sample_item();
        input.photos.clear();
        let item = db.add_item(&input).unwrap();

        let photo = db.add_photo(item, b"not really a jpeg").unwrap();
        assert_eq!(db.get_photo(photo).unwrap().unwrap(), b"not really a jpeg");
        assert_eq!(db.photo_ids_for_item(item).unwrap(), vec![photo]);

        assert!(db.delete_photo(photo).unwrap());
        assert!(db.get_photo(photo).unwrap().is_none());
        assert!(!db.delete_photo(photo).unwrap());
        assert!(db.get_item(item).unwrap().is_some());
    }

    #[test]
    fn test_add_photo_to_missing_item() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.add_photo(404, &[1, 2, 3]).is_err());
        assert_eq!(count(&db, "SELECT COUNT(*) FROM photos"), 0);
    }

    #[test]
    fn test_add_photos_in_one_transaction() {
        let db = Database::open_in_memory().unwrap();
        let mut input = sample_item();
        input.photos.clear();
        let item = db.add_item(&input).unwrap();

        let ids = db.add_photos(item, &[vec![1], vec![2], vec![3]]).unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(db.photo_ids_for_item(item).unwrap(), ids);
        assert!(db.add_photos(404, &[vec![1]]).is_err());
    }

    #[test]
    fn test_add_photos_failure_stores_none() {
        let db = Database::open_in_memory().unwrap();
        let mut input = sample_item();
        input.photos.clear();
        let item = db.add_item(&input).unwrap();
        db.conn
            .execute_batch(
                "CREATE TEMP TRIGGER reject_empty_photo BEFORE INSERT ON photos
                 WHEN length(NEW.data) = 0
                 BEGIN SELECT RAISE(ABORT, 'empty photo'); END;",
            )
            .unwrap();

        assert!(db.add_photos(item, &[vec![0xFF, 0xD8], Vec::new()]).is_err());
        assert!(db.photo_ids_for_item(item).unwrap().is_empty());
    }

    // --- Tags ---

    #[test]
    fn test_tag_crud() {
        let db = Database::open_in_memory().unwrap();
        let a = db.add_item(&item_named("A", "Paris", 6.0)).unwrap();
        let b = db.add_item(&item_named("B", "Paris", 7.0)).unwrap();

        assert!(db.tag_item(a, "brunch").unwrap());
        assert!(!db.tag_item(a, " brunch ").unwrap());
        assert!(db.tag_item(b, "brunch").unwrap());
        assert!(db.tag_item(b, "cheap").unwrap());

        let brunch: Vec<i64> = db.by_tag("brunch").unwrap().iter().map(|i| i.id).collect();
        assert_eq!(brunch, vec![b, a]);

        let tags = db.list_tags().unwrap();
        assert_eq!(tags[0].name, "brunch");
        assert_eq!(tags[0].item_count, 2);

        assert!(db.untag_item(a, "brunch").unwrap());
        assert!(!db.untag_item(a, "brunch").unwrap());
        assert!(db.tags_for_item(a).unwrap().is_empty());
    }

    #[test]
    fn test_tag_missing_item_or_blank() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.tag_item(1, "x").is_err());
        let a = db.add_item(&item_named("A", "Paris", 6.0)).unwrap();
        assert!(db.tag_item(a, "  ").is_err());
    }
}
