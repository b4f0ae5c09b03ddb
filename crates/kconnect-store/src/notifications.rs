//! Persistence for the notification log.
//!
//! The log is written as a full snapshot. Rows are ordered by `created_at`
//! and an insertion sequence, never by their position in the in-memory list.

use kconnect_shared::notification::Notification;
use rusqlite::params;

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Replace the stored log with `items`. The slice is expected in
    /// chronological order; its index becomes the tie-breaker for equal
    /// timestamps.
    pub fn replace_notifications(&self, items: &[Notification]) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        tx.execute("DELETE FROM notifications", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO notifications (id, created_at, seq, is_read, json)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (seq, item) in items.iter().enumerate() {
                stmt.execute(params![
                    item.id.to_string(),
                    item.created_at.timestamp_micros(),
                    seq as i64,
                    item.is_read,
                    serde_json::to_string(item)?,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(count = items.len(), "notification log saved");
        Ok(())
    }

    /// Load the stored log, oldest first.
    pub fn load_notifications(&self) -> Result<Vec<Notification>> {
        let mut stmt = self.conn().prepare(
            "SELECT json FROM notifications ORDER BY created_at ASC, seq ASC",
        )?;

        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut items = Vec::new();
        for row in rows {
            items.push(serde_json::from_str(&row?)?);
        }
        Ok(items)
    }
}
