use crate::Database;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

impl Database {
    // -- Recipients --

    /// Insert-or-ignore. Returns `true` if the row was new.
    pub fn insert_recipient(
        &self,
        id: i64,
        display_name: &str,
        handle: Option<&str>,
        joined_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_writer(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO recipients (id, display_name, handle, joined_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, display_name, handle, joined_at.to_rfc3339()],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn count_recipients(&self) -> Result<u64> {
        self.with_reader(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM recipients", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    /// Every recipient id, in id order, read inside a single statement so the
    /// result is a consistent point-in-time snapshot.
    pub fn list_recipient_ids(&self) -> Result<Vec<i64>> {
        self.with_reader(query_recipient_ids)
    }
}

fn query_recipient_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM recipients ORDER BY id")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("herald.db")).unwrap();
        (dir, db)
    }

    fn display_name(db: &Database, id: i64) -> Option<String> {
        db.with_reader(|conn| {
            let mut stmt = conn.prepare("SELECT display_name FROM recipients WHERE id = ?1")?;
            let mut rows = stmt.query([id])?;
            Ok(match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            })
        })
        .unwrap()
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let (_dir, db) = open_temp();
        let now = Utc::now();

        assert!(db.insert_recipient(42, "Ada Lovelace", Some("ada"), now).unwrap());
        assert!(!db.insert_recipient(42, "Someone Else", None, now).unwrap());

        assert_eq!(db.count_recipients().unwrap(), 1);
        assert_eq!(display_name(&db, 42).as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn count_is_inserts_minus_duplicates() {
        let (_dir, db) = open_temp();
        let now = Utc::now();
        let ids = [5, 1, 9, 1, 5, 7];

        for id in ids {
            db.insert_recipient(id, "user", None, now).unwrap();
        }

        assert_eq!(db.count_recipients().unwrap(), 4);
        assert_eq!(db.list_recipient_ids().unwrap(), vec![1, 5, 7, 9]);
    }

    #[test]
    fn missing_recipient_is_none() {
        let (_dir, db) = open_temp();
        assert!(display_name(&db, 1).is_none());
        assert!(db.list_recipient_ids().unwrap().is_empty());
    }

    #[test]
    fn reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("herald.db");
        {
            let db = Database::open(&path).unwrap();
            db.insert_recipient(3, "kept", None, Utc::now()).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_recipient_ids().unwrap(), vec![3]);
    }
}
