//! SQLite storage layer for secret-pages.
//!
//! Owns the schema and every table operation the web server performs:
//! accounts and sessions, per-page secret messages, and friend requests.
//! Foreign keys are enforced so deleting a user cascades through every row
//! that references them.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// Authentication record for one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: u64,
}

/// Publicly searchable part of an account, used for friend lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    pub email: String,
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRow {
    /// Hex SHA-256 of the bearer token; the token itself is never stored.
    pub token_hash: String,
    pub user_id: String,
    pub created_at: u64,
    pub expires_at: u64,
}

/// One message per (user, page).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMessageRow {
    pub user_id: String,
    pub page_number: u8,
    pub message: String,
    pub updated_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
        }
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "accepted" => Ok(RequestStatus::Accepted),
            other => Err(format!("unknown friend request status: {other}")),
        }
    }
}

/// Friend request row stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequestRow {
    pub id: i64,
    pub sender_id: String,
    pub receiver_id: String,
    pub status: RequestStatus,
    pub created_at: u64,
    pub updated_at: u64,
}

impl FriendRequestRow {
    pub fn involves(&self, user_id: &str) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }

    /// The participant that is not `user_id`.
    pub fn other_party(&self, user_id: &str) -> &str {
        if self.sender_id == user_id {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }
}

/// A pending request joined with the profile of the other participant
/// (the sender for incoming requests, the receiver for outgoing ones).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequestView {
    pub id: i64,
    pub other: ProfileRow,
    pub created_at: u64,
}

/// An accepted request seen from one side: the other user's profile and the
/// row id that links them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendshipView {
    pub request_id: i64,
    pub friend: ProfileRow,
    pub since: u64,
}

/// A friend's secret message joined with the friend's email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendMessageRow {
    pub user_id: String,
    pub email: String,
    pub message: String,
    pub updated_at: u64,
}

// ---------------------------------------------------------------------------
// Storage handle
// ---------------------------------------------------------------------------

/// Main storage handle wrapping a SQLite connection.
pub struct Storage {
    conn: Connection,
}

const FRIEND_REQUEST_COLUMNS: &str =
    "id, sender_id, receiver_id, status, created_at, updated_at";

impl Storage {
    /// Open or create a database at the given path. Creates schema if needed.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let storage = Self { conn };
        storage.create_schema()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let storage = Self { conn };
        storage.create_schema()?;
        Ok(storage)
    }

    fn create_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                created_at      INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS profiles (
                id          TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                email       TEXT NOT NULL UNIQUE,
                created_at  INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                token_hash  TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  INTEGER NOT NULL,
                expires_at  INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expiry ON sessions(expires_at);

            CREATE TABLE IF NOT EXISTS secret_messages (
                user_id     TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                page_number INTEGER NOT NULL,
                message     TEXT NOT NULL,
                updated_at  INTEGER NOT NULL,
                PRIMARY KEY (user_id, page_number)
            );

            CREATE INDEX IF NOT EXISTS idx_secret_messages_page
                ON secret_messages(page_number, user_id);

            CREATE TABLE IF NOT EXISTS friend_requests (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id   TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                receiver_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                status      TEXT NOT NULL DEFAULT 'pending',
                created_at  INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL,
                UNIQUE (sender_id, receiver_id)
            );

            CREATE INDEX IF NOT EXISTS idx_friend_requests_receiver
                ON friend_requests(receiver_id, status);
            CREATE INDEX IF NOT EXISTS idx_friend_requests_sender
                ON friend_requests(sender_id, status);
            ",
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Users & profiles
    // -----------------------------------------------------------------------

    /// Create an account and its profile atomically.
    pub fn create_user(&self, row: &UserRow) -> Result<(), StorageError> {
        if self.get_user_by_email(&row.email)?.is_some() {
            return Err(StorageError::AlreadyExists(format!("user {}", row.email)));
        }
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO users (id, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![row.id, row.email, row.password_hash, row.created_at as i64],
        )?;
        tx.execute(
            "INSERT INTO profiles (id, email, created_at) VALUES (?1, ?2, ?3)",
            params![row.id, row.email, row.created_at as i64],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, email, password_hash, created_at FROM users WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, email, password_hash, created_at FROM users WHERE email = ?1",
                params![normalize(email)],
                user_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn count_users(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Delete an account. Sessions, profile, messages and friend requests
    /// go with it through the foreign key cascades.
    pub fn delete_user(&self, id: &str) -> Result<bool, StorageError> {
        let affected = self
            .conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    pub fn find_profile_by_email(&self, email: &str) -> Result<Option<ProfileRow>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, email, created_at FROM profiles WHERE email = ?1",
                params![normalize(email)],
                profile_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn get_profile(&self, id: &str) -> Result<Option<ProfileRow>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, email, created_at FROM profiles WHERE id = ?1",
                params![id],
                profile_from_row,
            )
            .optional()?;
        Ok(row)
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    pub fn insert_session(&self, row: &SessionRow) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                row.token_hash,
                row.user_id,
                row.created_at as i64,
                row.expires_at as i64,
            ],
        )?;
        Ok(())
    }

    /// Look up a live session. Sessions that expired at or before `now` are
    /// reported as absent.
    pub fn get_session(&self, token_hash: &str, now: u64) -> Result<Option<SessionRow>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT token_hash, user_id, created_at, expires_at
                 FROM sessions WHERE token_hash = ?1 AND expires_at > ?2",
                params![token_hash, now as i64],
                |row| {
                    Ok(SessionRow {
                        token_hash: row.get(0)?,
                        user_id: row.get(1)?,
                        created_at: row.get::<_, i64>(2)? as u64,
                        expires_at: row.get::<_, i64>(3)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn delete_session(&self, token_hash: &str) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "DELETE FROM sessions WHERE token_hash = ?1",
            params![token_hash],
        )?;
        Ok(affected > 0)
    }

    /// Remove every session that has expired by `now`. Returns how many went.
    pub fn purge_expired_sessions(&self, now: u64) -> Result<u32, StorageError> {
        let affected = self.conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![now as i64],
        )?;
        Ok(affected as u32)
    }

    // -----------------------------------------------------------------------
    // Secret messages
    // -----------------------------------------------------------------------

    /// Insert or replace the message stored under (user, page).
    pub fn upsert_secret_message(&self, row: &SecretMessageRow) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO secret_messages (user_id, page_number, message, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, page_number)
             DO UPDATE SET message = excluded.message, updated_at = excluded.updated_at",
            params![
                row.user_id,
                row.page_number,
                row.message,
                row.updated_at as i64,
            ],
        )?;
        Ok(())
    }

    pub fn get_secret_message(
        &self,
        user_id: &str,
        page_number: u8,
    ) -> Result<Option<SecretMessageRow>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT user_id, page_number, message, updated_at
                 FROM secret_messages WHERE user_id = ?1 AND page_number = ?2",
                params![user_id, page_number],
                secret_message_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Every page message of one user, ordered by page.
    pub fn list_secret_messages(&self, user_id: &str) -> Result<Vec<SecretMessageRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, page_number, message, updated_at
             FROM secret_messages WHERE user_id = ?1 ORDER BY page_number",
        )?;
        let rows = stmt.query_map(params![user_id], secret_message_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn delete_secret_message(&self, user_id: &str, page_number: u8) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "DELETE FROM secret_messages WHERE user_id = ?1 AND page_number = ?2",
            params![user_id, page_number],
        )?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Friend requests
    // -----------------------------------------------------------------------

    /// Insert a pending request. Returns the new request id.
    pub fn insert_friend_request(
        &self,
        sender_id: &str,
        receiver_id: &str,
        now: u64,
    ) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO friend_requests (sender_id, receiver_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![
                sender_id,
                receiver_id,
                RequestStatus::Pending.as_str(),
                now as i64,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_friend_request(&self, id: i64) -> Result<Option<FriendRequestRow>, StorageError> {
        let query = format!("SELECT {FRIEND_REQUEST_COLUMNS} FROM friend_requests WHERE id = ?1");
        let row = self
            .conn
            .query_row(&query, params![id], friend_request_from_row)
            .optional()?;
        Ok(row)
    }

    /// Find a request between two users in either direction, any status.
    pub fn find_request_between(
        &self,
        a: &str,
        b: &str,
    ) -> Result<Option<FriendRequestRow>, StorageError> {
        let query = format!(
            "SELECT {FRIEND_REQUEST_COLUMNS} FROM friend_requests
             WHERE (sender_id = ?1 AND receiver_id = ?2)
                OR (sender_id = ?2 AND receiver_id = ?1)
             ORDER BY created_at DESC LIMIT 1"
        );
        let row = self
            .conn
            .query_row(&query, params![a, b], friend_request_from_row)
            .optional()?;
        Ok(row)
    }

    /// Profiles on the other end of every accepted request involving `user_id`.
    pub fn list_friends(&self, user_id: &str) -> Result<Vec<ProfileRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.email, p.created_at
             FROM friend_requests fr
             JOIN profiles p ON p.id = CASE WHEN fr.sender_id = ?1
                                            THEN fr.receiver_id
                                            ELSE fr.sender_id END
             WHERE fr.status = 'accepted'
               AND (fr.sender_id = ?1 OR fr.receiver_id = ?1)
             ORDER BY p.email",
        )?;
        let rows = stmt.query_map(params![user_id], profile_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Like [`Storage::list_friends`], keeping the linking request id.
    pub fn list_friendships(&self, user_id: &str) -> Result<Vec<FriendshipView>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT fr.id, p.id, p.email, p.created_at, fr.updated_at
             FROM friend_requests fr
             JOIN profiles p ON p.id = CASE WHEN fr.sender_id = ?1
                                            THEN fr.receiver_id
                                            ELSE fr.sender_id END
             WHERE fr.status = 'accepted'
               AND (fr.sender_id = ?1 OR fr.receiver_id = ?1)
             ORDER BY p.email",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(FriendshipView {
                request_id: row.get(0)?,
                friend: ProfileRow {
                    id: row.get(1)?,
                    email: row.get(2)?,
                    created_at: row.get::<_, i64>(3)? as u64,
                },
                since: row.get::<_, i64>(4)? as u64,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn are_friends(&self, a: &str, b: &str) -> Result<bool, StorageError> {
        Ok(self
            .find_request_between(a, b)?
            .is_some_and(|r| r.status == RequestStatus::Accepted))
    }

    /// Pending requests addressed to `user_id`, with the sender's profile.
    pub fn list_incoming_requests(&self, user_id: &str) -> Result<Vec<PendingRequestView>, StorageError> {
        self.list_pending_requests(
            "SELECT fr.id, p.id, p.email, p.created_at, fr.created_at
             FROM friend_requests fr
             JOIN profiles p ON p.id = fr.sender_id
             WHERE fr.receiver_id = ?1 AND fr.status = 'pending'
             ORDER BY fr.created_at DESC, fr.id DESC",
            user_id,
        )
    }

    /// Pending requests sent by `user_id`, with the receiver's profile.
    pub fn list_outgoing_requests(&self, user_id: &str) -> Result<Vec<PendingRequestView>, StorageError> {
        self.list_pending_requests(
            "SELECT fr.id, p.id, p.email, p.created_at, fr.created_at
             FROM friend_requests fr
             JOIN profiles p ON p.id = fr.receiver_id
             WHERE fr.sender_id = ?1 AND fr.status = 'pending'
             ORDER BY fr.created_at DESC, fr.id DESC",
            user_id,
        )
    }

    fn list_pending_requests(
        &self,
        query: &str,
        user_id: &str,
    ) -> Result<Vec<PendingRequestView>, StorageError> {
        let mut stmt = self.conn.prepare(query)?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(PendingRequestView {
                id: row.get(0)?,
                other: ProfileRow {
                    id: row.get(1)?,
                    email: row.get(2)?,
                    created_at: row.get::<_, i64>(3)? as u64,
                },
                created_at: row.get::<_, i64>(4)? as u64,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn update_friend_request_status(
        &self,
        id: i64,
        status: RequestStatus,
        now: u64,
    ) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "UPDATE friend_requests SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now as i64, id],
        )?;
        Ok(affected > 0)
    }

    pub fn delete_friend_request(&self, id: i64) -> Result<bool, StorageError> {
        let affected = self
            .conn
            .execute("DELETE FROM friend_requests WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    /// Messages on `page_number` written by accepted friends of `user_id`,
    /// most recently updated first.
    pub fn list_friend_messages(
        &self,
        user_id: &str,
        page_number: u8,
    ) -> Result<Vec<FriendMessageRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT m.user_id, p.email, m.message, m.updated_at
             FROM secret_messages m
             JOIN profiles p ON p.id = m.user_id
             WHERE m.page_number = ?2
               AND m.user_id IN (
                   SELECT CASE WHEN sender_id = ?1 THEN receiver_id ELSE sender_id END
                   FROM friend_requests
                   WHERE status = 'accepted' AND (sender_id = ?1 OR receiver_id = ?1)
               )
             ORDER BY m.updated_at DESC, p.email",
        )?;
        let rows = stmt.query_map(params![user_id, page_number], |row| {
            Ok(FriendMessageRow {
                user_id: row.get(0)?,
                email: row.get(1)?,
                message: row.get(2)?,
                updated_at: row.get::<_, i64>(3)? as u64,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get::<_, i64>(3)? as u64,
    })
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get(0)?,
        email: row.get(1)?,
        created_at: row.get::<_, i64>(2)? as u64,
    })
}

fn secret_message_from_row(row: &Row<'_>) -> rusqlite::Result<SecretMessageRow> {
    Ok(SecretMessageRow {
        user_id: row.get(0)?,
        page_number: row.get(1)?,
        message: row.get(2)?,
        updated_at: row.get::<_, i64>(3)? as u64,
    })
}

fn friend_request_from_row(row: &Row<'_>) -> rusqlite::Result<FriendRequestRow> {
    let status: String = row.get(3)?;
    let status = status.parse::<RequestStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            e.into(),
        )
    })?;
    Ok(FriendRequestRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        status,
        created_at: row.get::<_, i64>(4)? as u64,
        updated_at: row.get::<_, i64>(5)? as u64,
    })
}

fn normalize(email: &str) -> String {
    crate::auth::normalize_email(email)
}

/// Database file inside the data directory.
pub fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("secret-pages.db")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn test_storage() -> Storage {
        Storage::open_in_memory().unwrap()
    }

    fn add_user(storage: &Storage, id: &str, email: &str) {
        storage
            .create_user(&UserRow {
                id: id.to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
                created_at: now_secs(),
            })
            .unwrap();
    }

    fn befriend(storage: &Storage, a: &str, b: &str) -> i64 {
        let id = storage.insert_friend_request(a, b, now_secs()).unwrap();
        storage
            .update_friend_request_status(id, RequestStatus::Accepted, now_secs())
            .unwrap();
        id
    }

    fn save_message(storage: &Storage, user: &str, page: u8, message: &str) {
        storage
            .upsert_secret_message(&SecretMessageRow {
                user_id: user.to_string(),
                page_number: page,
                message: message.to_string(),
                updated_at: now_secs(),
            })
            .unwrap();
    }

    #[test]
    fn test_user_crud() {
        let storage = test_storage();
        assert_eq!(storage.count_users().unwrap(), 0);

        add_user(&storage, "u1", "alice@example.com");
        let user = storage.get_user("u1").unwrap().unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.password_hash, "hash");

        // Lookups normalize the email
        let by_email = storage.get_user_by_email("  Alice@Example.COM ").unwrap();
        assert_eq!(by_email.unwrap().id, "u1");

        let profile = storage.find_profile_by_email("ALICE@example.com").unwrap().unwrap();
        assert_eq!(profile.id, "u1");
        assert_eq!(storage.count_users().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let storage = test_storage();
        add_user(&storage, "u1", "alice@example.com");
        let err = storage
            .create_user(&UserRow {
                id: "u2".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "hash".to_string(),
                created_at: now_secs(),
            })
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
        assert!(storage.get_user("u2").unwrap().is_none());
    }

    #[test]
    fn test_sessions_expire() {
        let storage = test_storage();
        add_user(&storage, "u1", "alice@example.com");
        let now = now_secs();

        storage
            .insert_session(&SessionRow {
                token_hash: "live".to_string(),
                user_id: "u1".to_string(),
                created_at: now,
                expires_at: now + 60,
            })
            .unwrap();
        storage
            .insert_session(&SessionRow {
                token_hash: "stale".to_string(),
                user_id: "u1".to_string(),
                created_at: now - 120,
                expires_at: now - 60,
            })
            .unwrap();

        assert_eq!(storage.get_session("live", now).unwrap().unwrap().user_id, "u1");
        assert!(storage.get_session("stale", now).unwrap().is_none());
        assert!(storage.get_session("live", now + 60).unwrap().is_none());

        assert_eq!(storage.purge_expired_sessions(now).unwrap(), 1);
        assert!(storage.delete_session("live").unwrap());
        assert!(!storage.delete_session("live").unwrap());
    }

    #[test]
    fn test_secret_message_upsert() {
        let storage = test_storage();
        add_user(&storage, "u1", "alice@example.com");

        assert!(storage.get_secret_message("u1", 2).unwrap().is_none());

        save_message(&storage, "u1", 2, "first");
        save_message(&storage, "u1", 2, "second");
        save_message(&storage, "u1", 3, "other page");

        let loaded = storage.get_secret_message("u1", 2).unwrap().unwrap();
        assert_eq!(loaded.message, "second");

        let all = storage.list_secret_messages("u1").unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].page_number, 2);
        assert_eq!(all[1].page_number, 3);

        assert!(storage.delete_secret_message("u1", 2).unwrap());
        assert!(storage.get_secret_message("u1", 2).unwrap().is_none());
    }

    #[test]
    fn test_message_requires_existing_profile() {
        let storage = test_storage();
        let result = storage.upsert_secret_message(&SecretMessageRow {
            user_id: "ghost".to_string(),
            page_number: 1,
            message: "boo".to_string(),
            updated_at: now_secs(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_friend_request_lifecycle() {
        let storage = test_storage();
        add_user(&storage, "a", "a@example.com");
        add_user(&storage, "b", "b@example.com");

        let id = storage.insert_friend_request("a", "b", now_secs()).unwrap();
        let fr = storage.get_friend_request(id).unwrap().unwrap();
        assert_eq!(fr.status, RequestStatus::Pending);
        assert!(fr.involves("a") && fr.involves("b"));
        assert_eq!(fr.other_party("a"), "b");

        // Lookup works from either side
        assert_eq!(storage.find_request_between("b", "a").unwrap().unwrap().id, id);

        let incoming = storage.list_incoming_requests("b").unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].other.email, "a@example.com");
        let outgoing = storage.list_outgoing_requests("a").unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].other.email, "b@example.com");
        assert!(!storage.are_friends("a", "b").unwrap());

        assert!(storage
            .update_friend_request_status(id, RequestStatus::Accepted, 4242)
            .unwrap());
        let accepted = storage.get_friend_request(id).unwrap().unwrap();
        assert_eq!(accepted.updated_at, 4242);
        assert!(storage.are_friends("b", "a").unwrap());
        assert!(storage.list_incoming_requests("b").unwrap().is_empty());
        assert!(storage.list_outgoing_requests("a").unwrap().is_empty());

        let friends_of_a = storage.list_friends("a").unwrap();
        assert_eq!(friends_of_a.len(), 1);
        assert_eq!(friends_of_a[0].id, "b");
        let friends_of_b = storage.list_friends("b").unwrap();
        assert_eq!(friends_of_b[0].id, "a");

        let friendships = storage.list_friendships("b").unwrap();
        assert_eq!(friendships.len(), 1);
        assert_eq!(friendships[0].request_id, id);
        assert_eq!(friendships[0].friend.email, "a@example.com");
        assert_eq!(friendships[0].since, 4242);

        assert!(storage.delete_friend_request(id).unwrap());
        assert!(storage.list_friends("a").unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_direction_rejected_by_schema() {
        let storage = test_storage();
        add_user(&storage, "a", "a@example.com");
        add_user(&storage, "b", "b@example.com");
        storage.insert_friend_request("a", "b", now_secs()).unwrap();
        assert!(storage.insert_friend_request("a", "b", now_secs()).is_err());
    }

    #[test]
    fn test_friend_messages_only_from_accepted_friends() {
        let storage = test_storage();
        add_user(&storage, "me", "me@example.com");
        add_user(&storage, "friend", "friend@example.com");
        add_user(&storage, "pending", "pending@example.com");
        add_user(&storage, "stranger", "stranger@example.com");

        befriend(&storage, "friend", "me");
        storage.insert_friend_request("me", "pending", now_secs()).unwrap();

        save_message(&storage, "friend", 3, "friend secret");
        save_message(&storage, "friend", 2, "not on the social page");
        save_message(&storage, "pending", 3, "pending secret");
        save_message(&storage, "stranger", 3, "stranger secret");
        save_message(&storage, "me", 3, "my own secret");

        let messages = storage.list_friend_messages("me", 3).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].email, "friend@example.com");
        assert_eq!(messages[0].message, "friend secret");
    }

    #[test]
    fn test_delete_user_cascades() {
        let storage = test_storage();
        add_user(&storage, "a", "a@example.com");
        add_user(&storage, "b", "b@example.com");
        add_user(&storage, "c", "c@example.com");
        let now = now_secs();

        storage
            .insert_session(&SessionRow {
                token_hash: "tok".to_string(),
                user_id: "a".to_string(),
                created_at: now,
                expires_at: now + 60,
            })
            .unwrap();
        save_message(&storage, "a", 1, "gone soon");
        let accepted = befriend(&storage, "a", "b");
        let pending = storage.insert_friend_request("c", "a", now).unwrap();

        assert!(storage.delete_user("a").unwrap());

        assert!(storage.get_user("a").unwrap().is_none());
        assert!(storage.get_profile("a").unwrap().is_none());
        assert!(storage.get_session("tok", now).unwrap().is_none());
        assert!(storage.get_secret_message("a", 1).unwrap().is_none());
        assert!(storage.get_friend_request(accepted).unwrap().is_none());
        assert!(storage.get_friend_request(pending).unwrap().is_none());
        assert!(storage.list_friends("b").unwrap().is_empty());

        // Other accounts are untouched
        assert!(storage.get_user("b").unwrap().is_some());
        assert!(!storage.delete_user("a").unwrap());
    }

    #[test]
    fn test_open_on_disk_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = db_path(&dir.path().join("nested"));
        {
            let storage = Storage::open(&path).unwrap();
            add_user(&storage, "u1", "alice@example.com");
        }
        let reopened = Storage::open(&path).unwrap();
        assert!(reopened.get_user("u1").unwrap().is_some());
    }
}
