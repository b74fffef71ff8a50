pub const SCHEMA: &str = r#"
-- Photos table: one row per imported original
CREATE TABLE IF NOT EXISTS photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    original_path TEXT NOT NULL,
    library_path TEXT NOT NULL UNIQUE,
    filename TEXT NOT NULL UNIQUE,
    hash TEXT NOT NULL UNIQUE CHECK (length(hash) > 0),
    date_taken TEXT NOT NULL,
    camera_model TEXT NOT NULL DEFAULT '',
    latitude REAL,
    longitude REAL,
    import_date TEXT NOT NULL,

    -- A location is either complete or absent
    CHECK ((latitude IS NULL) = (longitude IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_photos_date_taken ON photos(date_taken);

-- Only date_taken may change after import
CREATE TRIGGER IF NOT EXISTS photos_immutable_fields
BEFORE UPDATE ON photos
WHEN NEW.id IS NOT OLD.id
  OR NEW.import_date IS NOT OLD.import_date
  OR NEW.hash IS NOT OLD.hash
  OR NEW.library_path IS NOT OLD.library_path
  OR NEW.original_path IS NOT OLD.original_path
  OR NEW.filename IS NOT OLD.filename
BEGIN
    SELECT RAISE(ABORT, 'photo identity fields are immutable');
END;

-- Audit trail of user edits
CREATE TABLE IF NOT EXISTS metadata_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    photo_id INTEGER NOT NULL REFERENCES photos(id),
    field_name TEXT NOT NULL,
    old_value TEXT NOT NULL,
    new_value TEXT NOT NULL,
    changed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_photo ON metadata_history(photo_id);
"#;
