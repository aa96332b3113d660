use crate::Database;
use crate::models::{ConversationLogRow, ItemRow, NewConversationLog, UserRow};
use anyhow::Result;
use rusqlite::{Connection, Row};

impl Database {
    // -- Users --

    /// Insert a user. Returns `None` when the email is already registered,
    /// so concurrent registrations can never produce a duplicate row.
    pub fn create_user(&self, email: &str, password_hash: &str) -> Result<Option<UserRow>> {
        let created_at = chrono::Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.query_row(
                "INSERT INTO users (email, password_hash, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(email) DO NOTHING
                 RETURNING id, email, password_hash, created_at",
                (email, password_hash, &created_at),
                map_user,
            )
            .optional()
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    // -- Items --

    pub fn create_item(&self, title: &str, description: Option<&str>) -> Result<ItemRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO items (title, description) VALUES (?1, ?2)",
                (title, description),
            )?;
            Ok(ItemRow {
                id: conn.last_insert_rowid(),
                title: title.to_string(),
                description: description.map(str::to_string),
            })
        })
    }

    pub fn list_items(&self, skip: u32, limit: u32) -> Result<Vec<ItemRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, description FROM items ORDER BY id LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt
                .query_map((limit, skip), |row| {
                    Ok(ItemRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        description: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Conversation logs --

    /// Append one interaction. The row is written in a single statement.
    pub fn insert_conversation_log(&self, log: &NewConversationLog) -> Result<ConversationLogRow> {
        let timestamp = chrono::Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversation_logs
                    (user_id, text_query, image_url, response_text, llm_model_name, vlm_model_name, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    log.user_id,
                    log.text_query,
                    log.image_url,
                    log.response_text,
                    log.llm_model_name,
                    log.vlm_model_name,
                    timestamp,
                ],
            )?;
            Ok(ConversationLogRow {
                id: conn.last_insert_rowid(),
                user_id: log.user_id,
                text_query: log.text_query.clone(),
                image_url: log.image_url.clone(),
                response_text: Some(log.response_text.clone()),
                llm_model_name: log.llm_model_name.clone(),
                vlm_model_name: log.vlm_model_name.clone(),
                timestamp,
            })
        })
    }

    /// A user's log, newest first.
    pub fn list_conversation_logs(
        &self,
        user_id: i64,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<ConversationLogRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, text_query, image_url, response_text, llm_model_name, vlm_model_name, timestamp
                 FROM conversation_logs
                 WHERE user_id = ?1
                 ORDER BY id DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map((user_id, limit, skip), |row| {
                    Ok(ConversationLogRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        text_query: row.get(2)?,
                        image_url: row.get(3)?,
                        response_text: row.get(4)?,
                        llm_model_name: row.get(5)?,
                        vlm_model_name: row.get(6)?,
                        timestamp: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, email, password_hash, created_at FROM users WHERE email = ?1")?;

    stmt.query_row([email], map_user).optional()
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn duplicate_email_is_rejected_without_a_second_row() {
        let db = db();
        let first = db.create_user("ada@example.com", "hash").unwrap();
        assert!(first.is_some());

        let second = db.create_user("ada@example.com", "other-hash").unwrap();
        assert!(second.is_none());

        let count: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 1);

        let stored = db.get_user_by_email("ada@example.com").unwrap().unwrap();
        assert_eq!(stored.password_hash, "hash");
    }

    #[test]
    fn unknown_email_is_none() {
        assert!(db().get_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn items_paginate_in_insertion_order() {
        let db = db();
        for i in 0..5 {
            db.create_item(&format!("item {i}"), None).unwrap();
        }
        db.create_item("described", Some("has text")).unwrap();

        let page = db.list_items(2, 2).unwrap();
        let titles: Vec<_> = page.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["item 2", "item 3"]);

        let last = db.list_items(5, 100).unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].description.as_deref(), Some("has text"));
    }

    #[test]
    fn conversation_logs_are_scoped_and_newest_first() {
        let db = db();
        let ada = db.create_user("ada@example.com", "h").unwrap().unwrap();
        let bob = db.create_user("bob@example.com", "h").unwrap().unwrap();

        for (user, query) in [(ada.id, "first"), (bob.id, "other"), (ada.id, "second")] {
            db.insert_conversation_log(&NewConversationLog {
                user_id: user,
                text_query: Some(query.to_string()),
                image_url: None,
                response_text: format!("re: {query}"),
                llm_model_name: Some("llm".into()),
                vlm_model_name: None,
            })
            .unwrap();
        }

        let logs = db.list_conversation_logs(ada.id, 0, 10).unwrap();
        let queries: Vec<_> = logs.iter().filter_map(|l| l.text_query.as_deref()).collect();
        assert_eq!(queries, ["second", "first"]);
        assert_eq!(logs[0].response_text.as_deref(), Some("re: second"));
    }

    #[test]
    fn conversation_log_requires_existing_user() {
        let res = db().insert_conversation_log(&NewConversationLog {
            user_id: 42,
            text_query: None,
            image_url: Some("/static/images/x.png".into()),
            response_text: "I see: x".into(),
            llm_model_name: None,
            vlm_model_name: Some("vlm".into()),
        });
        assert!(res.is_err());
    }
}
