//! The catalog: a SQLite index of everything in the library.

mod schema;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

pub use schema::SCHEMA;

use crate::error::{Error, Result};
use crate::models::{DateChange, NewPhoto, Photo};

const PHOTO_COLUMNS: &str = "id, original_path, library_path, filename, hash, date_taken, \
                             camera_model, latitude, longitude, import_date";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable photo index. Uniqueness of `hash`, `library_path` and `filename` is
/// enforced by the database itself, so concurrent writers (threads or
/// processes) cannot both insert the same content.
pub struct Catalog {
    conn: Mutex<Connection>,
}

impl Catalog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        Self::initialize(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!("Catalog schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves nothing half-applied in SQLite.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a placed photo. Fails with [`Error::DuplicateHash`] if the
    /// content is already catalogued.
    pub fn insert(&self, photo: &NewPhoto) -> Result<Photo> {
        let conn = self.conn();
        let (latitude, longitude) = match photo.location {
            Some(loc) => (Some(loc.latitude), Some(loc.longitude)),
            None => (None, None),
        };

        let result = conn.execute(
            r#"
            INSERT INTO photos (original_path, library_path, filename, hash, date_taken,
                                camera_model, latitude, longitude, import_date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                photo.original_path.to_string_lossy(),
                photo.library_path.to_string_lossy(),
                photo.filename,
                photo.hash,
                photo.date_taken,
                photo.camera_model.as_deref().unwrap_or(""),
                latitude,
                longitude,
                Utc::now(),
            ],
        );

        match result {
            Ok(_) => {
                let id = conn.last_insert_rowid();
                query_photo(&conn, "id = ?1", id)?.ok_or(Error::NotFound(id))
            }
            Err(rusqlite::Error::SqliteFailure(err, message))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                if query_photo(&conn, "hash = ?1", &photo.hash)?.is_some() {
                    return Err(Error::DuplicateHash(photo.hash.clone()));
                }
                Err(Error::Conflict(
                    message.unwrap_or_else(|| err.to_string()),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_by_hash(&self, hash: &str) -> Result<Option<Photo>> {
        query_photo(&self.conn(), "hash = ?1", hash)
    }

    pub fn find_by_filename(&self, filename: &str) -> Result<Option<Photo>> {
        query_photo(&self.conn(), "filename = ?1", filename)
    }

    pub fn get(&self, id: i64) -> Result<Option<Photo>> {
        query_photo(&self.conn(), "id = ?1", id)
    }

    /// Every photo, oldest id first.
    pub fn list(&self) -> Result<Vec<Photo>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {PHOTO_COLUMNS} FROM photos ORDER BY id ASC"))?;
        let photos = stmt
            .query_map([], photo_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Overwrite `date_taken` and record the change, atomically.
    pub fn update_date_taken(&self, id: i64, date_taken: DateTime<Utc>) -> Result<Photo> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let old: DateTime<Utc> = tx
            .query_row("SELECT date_taken FROM photos WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?
            .ok_or(Error::NotFound(id))?;

        tx.execute(
            "UPDATE photos SET date_taken = ?1 WHERE id = ?2",
            params![date_taken, id],
        )?;
        tx.execute(
            r#"
            INSERT INTO metadata_history (photo_id, field_name, old_value, new_value, changed_at)
            VALUES (?1, 'date_taken', ?2, ?3, ?4)
            "#,
            params![
                id,
                old.to_rfc3339_opts(SecondsFormat::Secs, true),
                date_taken.to_rfc3339_opts(SecondsFormat::Secs, true),
                Utc::now(),
            ],
        )?;

        let photo = query_photo(&tx, "id = ?1", id)?.ok_or(Error::NotFound(id))?;
        tx.commit()?;
        Ok(photo)
    }

    /// Date edits for a photo, oldest first.
    pub fn date_history(&self, photo_id: i64) -> Result<Vec<DateChange>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, photo_id, field_name, old_value, new_value, changed_at
            FROM metadata_history
            WHERE photo_id = ?1 AND field_name = 'date_taken'
            ORDER BY id ASC
            "#,
        )?;
        let changes = stmt
            .query_map([photo_id], |row| {
                Ok(DateChange {
                    id: row.get(0)?,
                    photo_id: row.get(1)?,
                    field_name: row.get(2)?,
                    old_value: row.get(3)?,
                    new_value: row.get(4)?,
                    changed_at: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(changes)
    }
}

fn query_photo<P: rusqlite::ToSql>(
    conn: &Connection,
    condition: &str,
    param: P,
) -> Result<Option<Photo>> {
    let sql = format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE {condition}");
    let photo = conn.query_row(&sql, [param], photo_from_row).optional()?;
    Ok(photo)
}

fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(0)?,
        original_path: row.get(1)?,
        library_path: row.get(2)?,
        filename: row.get(3)?,
        hash: row.get(4)?,
        date_taken: row.get(5)?,
        camera_model: row.get(6)?,
        latitude: row.get(7)?,
        longitude: row.get(8)?,
        import_date: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GpsCoordinates;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn new_photo(hash: &str) -> NewPhoto {
        NewPhoto {
            original_path: PathBuf::from(format!("/src/{hash}.jpg")),
            library_path: PathBuf::from(format!("/lib/2024/03/{hash}.jpg")),
            filename: format!("{hash}.jpg"),
            hash: hash.to_string(),
            date_taken: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            camera_model: None,
            location: None,
        }
    }

    #[test]
    fn test_insert_and_find() {
        let catalog = Catalog::open_in_memory().unwrap();
        let mut photo = new_photo("aaaa");
        photo.camera_model = Some("Pixel 7".to_string());
        photo.location = GpsCoordinates::new(48.8584, 2.2945);

        let stored = catalog.insert(&photo).unwrap();
        assert!(stored.id > 0);
        assert_eq!(stored.camera_model, "Pixel 7");
        assert_eq!(stored.latitude, Some(48.8584));
        assert_eq!(stored.library_path, "/lib/2024/03/aaaa.jpg");

        assert_eq!(catalog.find_by_hash("aaaa").unwrap(), Some(stored.clone()));
        assert_eq!(catalog.find_by_filename("aaaa.jpg").unwrap(), Some(stored.clone()));
        assert_eq!(catalog.get(stored.id).unwrap(), Some(stored));
        assert_eq!(catalog.find_by_hash("bbbb").unwrap(), None);
    }

    #[test]
    fn test_missing_location_is_null() {
        let catalog = Catalog::open_in_memory().unwrap();
        let stored = catalog.insert(&new_photo("cccc")).unwrap();
        assert_eq!(stored.latitude, None);
        assert_eq!(stored.longitude, None);
        assert_eq!(stored.camera_model, "");
    }

    #[test]
    fn test_duplicate_hash_rejected() {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.insert(&new_photo("dddd")).unwrap();

        let mut again = new_photo("dddd");
        again.library_path = PathBuf::from("/lib/2024/03/other.jpg");
        again.filename = "other.jpg".to_string();

        assert!(matches!(catalog.insert(&again), Err(Error::DuplicateHash(h)) if h == "dddd"));
        assert_eq!(catalog.count().unwrap(), 1);
    }

    #[test]
    fn test_library_path_conflict() {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.insert(&new_photo("eeee")).unwrap();

        let mut clash = new_photo("ffff");
        clash.library_path = PathBuf::from("/lib/2024/03/eeee.jpg");
        assert!(matches!(catalog.insert(&clash), Err(Error::Conflict(_))));
    }

    #[test]
    fn test_list_orders_by_id() {
        let catalog = Catalog::open_in_memory().unwrap();
        for hash in ["zz", "aa", "mm"] {
            catalog.insert(&new_photo(hash)).unwrap();
        }
        let hashes: Vec<String> = catalog.list().unwrap().into_iter().map(|p| p.hash).collect();
        assert_eq!(hashes, vec!["zz", "aa", "mm"]);
        assert_eq!(catalog.count().unwrap(), 3);
    }

    #[test]
    fn test_update_date_taken_only_touches_date() {
        let catalog = Catalog::open_in_memory().unwrap();
        let before = catalog.insert(&new_photo("gggg")).unwrap();
        let new_date = Utc.with_ymd_and_hms(2020, 12, 25, 8, 30, 0).unwrap();

        let after = catalog.update_date_taken(before.id, new_date).unwrap();

        assert_eq!(after.date_taken, new_date);
        assert_eq!(
            Photo {
                date_taken: before.date_taken,
                ..after.clone()
            },
            before
        );

        let history = catalog.date_history(before.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].field_name, "date_taken");
        assert_eq!(history[0].old_value, "2024-03-01T10:00:00Z");
        assert_eq!(history[0].new_value, "2020-12-25T08:30:00Z");
    }

    #[test]
    fn test_update_missing_id() {
        let catalog = Catalog::open_in_memory().unwrap();
        let result = catalog.update_date_taken(999_999, Utc::now());
        assert!(matches!(result, Err(Error::NotFound(999_999))));
        assert_eq!(catalog.count().unwrap(), 0);
        assert!(catalog.date_history(999_999).unwrap().is_empty());
    }

    #[test]
    fn test_identity_fields_are_immutable() {
        let catalog = Catalog::open_in_memory().unwrap();
        let photo = catalog.insert(&new_photo("hhhh")).unwrap();
        let result = catalog.conn().execute(
            "UPDATE photos SET hash = 'changed' WHERE id = ?1",
            [photo.id],
        );
        assert!(result.is_err());
        assert_eq!(catalog.get(photo.id).unwrap().unwrap().hash, "hhhh");
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/photoo.db");
        let id = {
            let catalog = Catalog::open(&path).unwrap();
            catalog.insert(&new_photo("iiii")).unwrap().id
        };
        let catalog = Catalog::open(&path).unwrap();
        assert_eq!(catalog.get(id).unwrap().unwrap().hash, "iiii");
    }
}
