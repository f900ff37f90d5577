//! SQLite-backed dedup catalog.

use std::fs::{self, File};
use std::io;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tempfile::TempPath;

use super::entry::{blob_to_path, path_to_blob, EntryKind, Payload, PendingEntry, SortOrder};
use super::order::sort_entries;
use crate::identity::FileIdentity;

/// Schema version stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Name accepted by SQLite for a private in-memory database.
pub const MEMORY: &str = ":memory:";

const PRAGMAS: &str = "
    PRAGMA auto_vacuum   = FULL;
    PRAGMA foreign_keys  = ON;
    PRAGMA journal_mode  = WAL;
    PRAGMA secure_delete = ON;
";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS info (
      id         INTEGER   NOT NULL PRIMARY KEY,
      path       BLOB      NOT NULL UNIQUE,
      dev        INTEGER   NOT NULL CHECK (0 < dev),
      nlink      INTEGER   NOT NULL DEFAULT 1 CHECK (0 < nlink),
      mtime      INTEGER   NOT NULL,
      updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS file (
      id         INTEGER   NOT NULL PRIMARY KEY,
      info_id    INTEGER   NOT NULL UNIQUE REFERENCES info (id) ON DELETE CASCADE,
      size       INTEGER   NOT NULL CHECK (0 <= size)
    );
    CREATE INDEX IF NOT EXISTS file_size ON file (size);
    CREATE TABLE IF NOT EXISTS symlink (
      id         INTEGER   NOT NULL PRIMARY KEY,
      info_id    INTEGER   NOT NULL UNIQUE REFERENCES info (id) ON DELETE CASCADE,
      target     BLOB      NOT NULL
    );
    CREATE INDEX IF NOT EXISTS symlink_target ON symlink (target);
    CREATE TABLE IF NOT EXISTS master (
      type       TEXT      NOT NULL UNIQUE,
      done       INTEGER   NOT NULL DEFAULT 0 CHECK (0 <= done),
      total      INTEGER   NOT NULL DEFAULT 0 CHECK (0 <= total)
    );
    INSERT OR IGNORE INTO master (type) VALUES ('file'), ('symlink');
";

/// Errors raised by the catalog.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// The underlying SQLite operation failed.
    #[error("catalog database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Reading attributes of a specific path failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The entry is neither a regular file nor a symlink.
    #[error("Unsupported file type: {0}")]
    UnsupportedType(PathBuf),

    /// A value does not fit in an SQLite integer.
    #[error("Value out of range for column {0}")]
    OutOfRange(&'static str),

    /// Commit or rollback was requested with no open transaction.
    #[error("No open catalog transaction")]
    NoTransaction,

    /// The cache file was written with an incompatible schema.
    #[error("Unsupported cache schema version {found} (expected {expected})")]
    SchemaVersion {
        /// Version found in the file
        found: i64,
        /// Version this build understands
        expected: i64,
    },
}

impl CatalogError {
    /// True for errors scoped to a single path, which a scan may skip.
    #[must_use]
    pub fn is_path_error(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::UnsupportedType(_))
    }

    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Persistent store of scanned paths and pending dedup work.
///
/// Holds three record families:
///
/// * `info`: one row per path ever observed
/// * `file` / `symlink`: at most one pending record per path
/// * `master`: arrivals (`total`) and completions (`done`) per kind
///
/// Every insert into or delete from a pending table goes through
/// `put_pending` or `drop_pending`, which adjust `master` in the same
/// transaction, so `total - done` always equals the number of live pending
/// rows of that kind.
///
/// Transactions nest: [`begin`](Self::begin) pushes an SQLite savepoint and
/// [`commit`](Self::commit) / [`rollback`](Self::rollback) pop it. Operations
/// called outside any scope run in their own implicit transaction.
pub struct Catalog {
    conn: Connection,
    depth: usize,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("path", &self.conn.path())
            .field("depth", &self.depth)
            .finish()
    }
}

impl Catalog {
    /// Create a fresh catalog, discarding any existing cache file.
    pub fn create(path: &Path) -> CatalogResult<Self> {
        if path.as_os_str() != MEMORY {
            for suffix in ["", "-wal", "-shm"] {
                let mut name = path.as_os_str().to_os_string();
                name.push(suffix);
                match fs::remove_file(&name) {
                    Ok(()) => log::debug!("Removed stale cache file {}", Path::new(&name).display()),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(CatalogError::io(Path::new(&name), e)),
                }
            }
        }
        Self::open(path)
    }

    /// Open a catalog, keeping its contents.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        let conn = Connection::open(path)?;
        Self::setup(conn)
    }

    /// Open a private in-memory catalog.
    pub fn open_in_memory() -> CatalogResult<Self> {
        Self::setup(Connection::open_in_memory()?)
    }

    fn setup(conn: Connection) -> CatalogResult<Self> {
        conn.execute_batch(PRAGMAS)?;

        let found: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if found != 0 && found != SCHEMA_VERSION {
            return Err(CatalogError::SchemaVersion {
                found,
                expected: SCHEMA_VERSION,
            });
        }

        conn.execute_batch(SCHEMA)?;
        conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))?;
        log::debug!("Catalog schema ready (version {})", SCHEMA_VERSION);

        Ok(Self { conn, depth: 0 })
    }

    /// Set the page cache size in KiB.
    pub fn set_cache_size(&self, kib: u64) -> CatalogResult<()> {
        let kib = i64::try_from(kib).map_err(|_| CatalogError::OutOfRange("cache_size"))?;
        // Negative values are interpreted by SQLite as KiB rather than pages.
        self.conn.pragma_update(None, "cache_size", -kib)?;
        log::debug!("Catalog page cache set to {} KiB", kib);
        Ok(())
    }

    /// Checkpoint the write-ahead log and close the database.
    pub fn close(self) -> CatalogResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE)")?;
        self.conn.close().map_err(|(_, e)| CatalogError::Sqlite(e))
    }

    /// Number of open transaction scopes.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Open a nested transaction scope.
    pub fn begin(&mut self) -> CatalogResult<()> {
        self.conn
            .execute_batch(&format!("SAVEPOINT {}", savepoint(self.depth)))?;
        self.depth += 1;
        Ok(())
    }

    /// Commit the innermost transaction scope.
    pub fn commit(&mut self) -> CatalogResult<()> {
        let depth = self.depth.checked_sub(1).ok_or(CatalogError::NoTransaction)?;
        self.conn
            .execute_batch(&format!("RELEASE {}", savepoint(depth)))?;
        self.depth = depth;
        Ok(())
    }

    /// Discard everything done in the innermost transaction scope.
    pub fn rollback(&mut self) -> CatalogResult<()> {
        let depth = self.depth.checked_sub(1).ok_or(CatalogError::NoTransaction)?;
        let name = savepoint(depth);
        self.conn
            .execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))?;
        self.depth = depth;
        Ok(())
    }

    /// Run `f` in a nested scope: commit on `Ok`, roll back on `Err`.
    pub fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<CatalogError>,
    {
        self.begin()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = self.rollback() {
                    log::error!("Catalog rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Record the current state of a scanned file or symlink.
    ///
    /// Reads the link target of symlinks; failures to read it, or to query
    /// the device and link count, are reported as [`CatalogError::Io`].
    pub fn upsert<F: FileIdentity>(&mut self, stat: &F) -> CatalogResult<()> {
        let path = stat.path();
        let payload = if stat.is_symlink() {
            let target = fs::read_link(path).map_err(|e| CatalogError::io(path, e))?;
            Payload::Target(target)
        } else if stat.is_file() {
            Payload::Size(stat.size())
        } else {
            return Err(CatalogError::UnsupportedType(path.to_path_buf()));
        };

        let entry = PendingEntry {
            path: path.to_path_buf(),
            dev: stat.device().map_err(|e| CatalogError::io(path, e))?,
            nlink: stat.link_count().map_err(|e| CatalogError::io(path, e))?,
            mtime: stat.mtime(),
            payload,
        };
        self.upsert_record(&entry)
    }

    /// Insert or update the path record and the pending record of `entry`.
    ///
    /// A pending record of the opposite kind for the same path is retired.
    pub fn upsert_record(&mut self, entry: &PendingEntry) -> CatalogResult<()> {
        let dev = to_sql_int(entry.dev, "dev")?;
        let nlink = to_sql_int(entry.nlink, "nlink")?;
        let value = payload_value(&entry.payload)?;
        let path = path_to_blob(&entry.path);

        self.transaction(|catalog| {
            let info_id: i64 = catalog.conn.query_row(
                "INSERT INTO info (path, dev, nlink, mtime)
                   VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (path) DO UPDATE
                    SET dev        = excluded.dev,
                        nlink      = excluded.nlink,
                        mtime      = excluded.mtime,
                        updated_at = CASE
                                       WHEN dev   IS excluded.dev
                                        AND nlink IS excluded.nlink
                                        AND mtime IS excluded.mtime
                                       THEN updated_at
                                       ELSE CURRENT_TIMESTAMP
                                     END
                 RETURNING id",
                params![path, dev, nlink, entry.mtime],
                |row| row.get(0),
            )?;
            put_pending(&catalog.conn, info_id, entry.kind(), value)
        })
    }

    /// Pick one pending record of `kind` and return every pending record
    /// sharing its bucket key, sorted by the tie-break order.
    ///
    /// The key is (size or target, device) plus the modification time when
    /// `use_mtime` is set. An empty result means no work of `kind` remains.
    pub fn next_bucket(
        &self,
        kind: EntryKind,
        use_mtime: bool,
        order: SortOrder,
    ) -> CatalogResult<Vec<PendingEntry>> {
        let (table, column) = (kind.table(), kind.key_column());

        let seed: Option<(i64, Value, i64)> = self
            .conn
            .query_row(
                &format!(
                    "SELECT i.dev, p.{column}, i.mtime
                       FROM {table} AS p
                      INNER JOIN info AS i ON p.info_id = i.id
                      LIMIT 1"
                ),
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((dev, key, mtime)) = seed else {
            return Ok(Vec::new());
        };

        let mut sql = format!(
            "SELECT i.path, i.dev, i.nlink, i.mtime, p.{column}
               FROM {table} AS p
              INNER JOIN info AS i ON p.info_id = i.id
              WHERE i.dev = ?1
                AND p.{column} = ?2"
        );
        if use_mtime {
            sql.push_str(" AND i.mtime = ?3");
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = if use_mtime {
            stmt.query_map(params![dev, key, mtime], |row| read_entry(row, kind))?
                .collect::<Result<Vec<_>, _>>()?
        } else {
            stmt.query_map(params![dev, key], |row| read_entry(row, kind))?
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut entries = rows;
        sort_entries(&mut entries, order);
        log::trace!("Next {} bucket: {} entries", kind, entries.len());
        Ok(entries)
    }

    /// Remove any pending record for `path` and count it as completed.
    ///
    /// Retiring a path with nothing pending is a no-op.
    pub fn retire(&mut self, path: &Path) -> CatalogResult<()> {
        let blob = path_to_blob(path);
        self.transaction(|catalog| {
            let info_id: Option<i64> = catalog
                .conn
                .query_row("SELECT id FROM info WHERE path = ?1", [blob], |row| {
                    row.get(0)
                })
                .optional()?;
            if let Some(info_id) = info_id {
                drop_pending(&catalog.conn, info_id)?;
            }
            Ok(())
        })
    }

    /// Completions and arrivals of `kind`, as `(done, total)`.
    pub fn counts(&self, kind: EntryKind) -> CatalogResult<(u64, u64)> {
        let (done, total): (i64, i64) = self.conn.query_row(
            "SELECT done, total FROM master WHERE type = ?1",
            [kind.table()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((from_sql_int(done), from_sql_int(total)))
    }

    /// Number of distinct paths ever recorded.
    pub fn path_count(&self) -> CatalogResult<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT count(*) FROM info", [], |row| row.get(0))?;
        Ok(from_sql_int(n))
    }

    /// Number of live pending records of `kind`, counted from the table.
    pub fn pending_count(&self, kind: EntryKind) -> CatalogResult<u64> {
        let n: i64 = self.conn.query_row(
            &format!("SELECT count(*) FROM {}", kind.table()),
            [],
            |row| row.get(0),
        )?;
        Ok(from_sql_int(n))
    }

    /// Kinds of pending record currently held for `path`.
    pub fn pending_kinds(&self, path: &Path) -> CatalogResult<Vec<EntryKind>> {
        let blob = path_to_blob(path);
        let mut kinds = Vec::new();
        for kind in EntryKind::ALL {
            let exists: bool = self.conn.query_row(
                &format!(
                    "SELECT EXISTS (
                       SELECT *
                         FROM {} AS p
                        INNER JOIN info AS i ON p.info_id = i.id
                        WHERE i.path = ?1
                     )",
                    kind.table()
                ),
                [&blob],
                |row| row.get(0),
            )?;
            if exists {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }
}

/// Insert or refresh the pending record of `kind` for `info_id`, retiring
/// the opposite kind. Counters move in the same transaction.
fn put_pending(conn: &Connection, info_id: i64, kind: EntryKind, value: Value) -> CatalogResult<()> {
    let other = kind.opposite();
    let removed = conn.execute(
        &format!("DELETE FROM {} WHERE info_id = ?1", other.table()),
        [info_id],
    )?;
    if removed > 0 {
        bump(conn, other, "done", removed)?;
    }

    let column = kind.key_column();
    let updated = conn.execute(
        &format!("UPDATE {} SET {column} = ?2 WHERE info_id = ?1", kind.table()),
        params![info_id, value],
    )?;
    if updated == 0 {
        conn.execute(
            &format!("INSERT INTO {} (info_id, {column}) VALUES (?1, ?2)", kind.table()),
            params![info_id, value],
        )?;
        bump(conn, kind, "total", 1)?;
    }
    Ok(())
}

/// Delete every pending record for `info_id`, counting each as completed.
fn drop_pending(conn: &Connection, info_id: i64) -> CatalogResult<()> {
    for kind in EntryKind::ALL {
        let removed = conn.execute(
            &format!("DELETE FROM {} WHERE info_id = ?1", kind.table()),
            [info_id],
        )?;
        if removed > 0 {
            bump(conn, kind, "done", removed)?;
        }
    }
    Ok(())
}

fn bump(conn: &Connection, kind: EntryKind, counter: &str, by: usize) -> CatalogResult<()> {
    let by = i64::try_from(by).map_err(|_| CatalogError::OutOfRange("master"))?;
    conn.execute(
        &format!("UPDATE master SET {counter} = {counter} + ?2 WHERE type = ?1"),
        params![kind.table(), by],
    )?;
    Ok(())
}

fn read_entry(row: &Row<'_>, kind: EntryKind) -> rusqlite::Result<PendingEntry> {
    let payload = match kind {
        EntryKind::File => Payload::Size(from_sql_int(row.get(4)?)),
        EntryKind::Symlink => Payload::Target(blob_to_path(row.get(4)?)),
    };
    Ok(PendingEntry {
        path: blob_to_path(row.get(0)?),
        dev: from_sql_int(row.get(1)?),
        nlink: from_sql_int(row.get(2)?),
        mtime: row.get(3)?,
        payload,
    })
}

fn payload_value(payload: &Payload) -> CatalogResult<Value> {
    Ok(match payload {
        Payload::Size(size) => Value::Integer(to_sql_int(*size, "size")?),
        Payload::Target(target) => Value::Blob(path_to_blob(target)),
    })
}

fn to_sql_int(value: u64, column: &'static str) -> CatalogResult<i64> {
    i64::try_from(value).map_err(|_| CatalogError::OutOfRange(column))
}

fn from_sql_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn savepoint(depth: usize) -> String {
    format!("scope_{depth}")
}

/// A throwaway copy of a cache file, deleted when dropped.
///
/// Pretend runs operate on one of these so the real cache keeps its pending
/// work. Dereferences to the [`Catalog`] opened on the copy.
#[derive(Debug)]
pub struct ScratchCatalog {
    // Declared before `_file` so the connection closes before the file goes.
    catalog: Catalog,
    _file: TempPath,
}

impl ScratchCatalog {
    /// Copy the cache file at `path` and open the copy.
    ///
    /// The source should be closed first so its write-ahead log has been
    /// checkpointed into the main file.
    pub fn copy_of(path: &Path) -> CatalogResult<Self> {
        let mut source = File::open(path).map_err(|e| CatalogError::io(path, e))?;
        let mut scratch = tempfile::Builder::new()
            .prefix("rustdedup")
            .suffix(".db")
            .tempfile()
            .map_err(|e| CatalogError::io(path, e))?;
        io::copy(&mut source, &mut scratch).map_err(|e| CatalogError::io(path, e))?;
        scratch
            .as_file()
            .sync_all()
            .map_err(|e| CatalogError::io(scratch.path(), e))?;

        let file = scratch.into_temp_path();
        log::debug!("Pretend catalog copied to {}", file.display());
        let catalog = Catalog::open(&file)?;
        Ok(Self {
            catalog,
            _file: file,
        })
    }
}

impl Deref for ScratchCatalog {
    type Target = Catalog;

    fn deref(&self) -> &Catalog {
        &self.catalog
    }
}

impl DerefMut for ScratchCatalog {
    fn deref_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }
}
