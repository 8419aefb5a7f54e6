use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Persistent key-value collaborator. Values are opaque strings replaced
/// wholesale on every `set`; there are no transactional guarantees across
/// keys.
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

pub struct SqliteStorage {
    conn: Connection,
    path: PathBuf,
}

impl SqliteStorage {
    pub fn open() -> Result<Self> {
        let path = Self::default_path()?;
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open storage at {}", path.display()))?;
        let storage = Self {
            conn,
            path: path.to_path_buf(),
        };
        storage.init()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn,
            path: PathBuf::from(":memory:"),
        };
        storage.init()?;
        Ok(storage)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn default_path() -> Result<PathBuf> {
        // XDG data directory, with a cwd fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobmatch") {
            Ok(proj_dirs.data_dir().join("jobmatch.db"))
        } else {
            Ok(PathBuf::from("jobmatch.db"))
        }
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl Storage for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let result = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            });
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e).context("Failed to read from storage"),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                [key, value],
            )
            .context("Failed to write to storage")?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", [key])
            .context("Failed to delete from storage")?;
        Ok(())
    }
}

/// In-memory storage double for tests, with write-failure injection and a
/// write counter so tests can assert on write-back behavior.
#[cfg(test)]
pub struct MemoryStorage {
    map: std::cell::RefCell<std::collections::HashMap<String, String>>,
    fail_writes: std::cell::Cell<bool>,
    fail_reads: std::cell::Cell<bool>,
    writes: std::cell::Cell<u32>,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            map: std::cell::RefCell::new(std::collections::HashMap::new()),
            fail_writes: std::cell::Cell::new(false),
            fail_reads: std::cell::Cell::new(false),
            writes: std::cell::Cell::new(0),
        }
    }

    pub fn seed(&self, key: &str, value: &str) {
        self.map.borrow_mut().insert(key.to_string(), value.to_string());
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.set(fail);
    }

    pub fn write_count(&self) -> u32 {
        self.writes.get()
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.map.borrow().get(key).cloned()
    }
}

#[cfg(test)]
impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.get() {
            anyhow::bail!("injected read failure");
        }
        Ok(self.map.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.get() {
            anyhow::bail!("injected write failure");
        }
        self.writes.set(self.writes.get() + 1);
        self.map
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        if self.fail_writes.get() {
            anyhow::bail!("injected write failure");
        }
        self.map.borrow_mut().remove(key);
        Ok(())
    }
}
