use chrono::Utc;
use rusqlite::OptionalExtension;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use roster_core::ids::UserId;
use roster_core::presence::normalize_email;
use roster_core::UserSummary;

use crate::database::Database;
use crate::error::StoreError;
use crate::password;

/// A validated registration, ready to persist.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub mobile: String,
    pub email: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub login_id: String,
    pub password: SecretString,
}

/// Public projection of a stored user. The password digest never leaves the
/// store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub mobile: String,
    pub email: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub login_id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            created_at: self.created_at.clone(),
        }
    }
}

const USER_COLUMNS: &str = "id, first_name, last_name, mobile, email, street, city, state, country, \
                            login_id, created_at, updated_at";

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId::from_raw(row.get::<_, String>(0)?),
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        mobile: row.get(3)?,
        email: row.get(4)?,
        street: row.get(5)?,
        city: row.get(6)?,
        state: row.get(7)?,
        country: row.get(8)?,
        login_id: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

pub struct UserRepo {
    db: Database,
}

impl UserRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a new user. Email and mobile must be unused.
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let id = UserId::new();
        let now = Utc::now().to_rfc3339();
        let digest = password::hash_password(user.password.expose_secret());

        self.db.with_conn(|conn| {
            let email_taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                [&user.email],
                |row| row.get(0),
            )?;
            if email_taken {
                return Err(StoreError::Conflict("Email already exists!".into()));
            }

            let mobile_taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE mobile = ?1)",
                [&user.mobile],
                |row| row.get(0),
            )?;
            if mobile_taken {
                return Err(StoreError::Conflict("Mobile already exists!".into()));
            }

            conn.execute(
                "INSERT INTO users (id, first_name, last_name, mobile, email, street, city, state,
                                    country, login_id, password_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                rusqlite::params![
                    id.as_str(),
                    user.first_name,
                    user.last_name,
                    user.mobile,
                    user.email,
                    user.street,
                    user.city,
                    user.state,
                    user.country,
                    user.login_id,
                    digest,
                    now,
                    now,
                ],
            )?;

            Ok(User {
                id,
                first_name: user.first_name,
                last_name: user.last_name,
                mobile: user.mobile,
                email: user.email,
                street: user.street,
                city: user.city,
                state: user.state,
                country: user.country,
                login_id: user.login_id,
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    /// Look up a user by email and check the password. `None` on any mismatch.
    #[instrument(skip(self, password))]
    pub fn find_by_credentials(&self, email: &str, password: &str) -> Result<Option<User>, StoreError> {
        let email = normalize_email(email);
        self.db.with_conn(|conn| {
            let found = conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"),
                    [&email],
                    |row| Ok((row_to_user(row)?, row.get::<_, String>(12)?)),
                )
                .optional()?;

            Ok(found.and_then(|(user, digest)| {
                password::verify_password(password, &digest).then_some(user)
            }))
        })
    }

    /// List all users, oldest first.
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<User>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt
                .query_map([], row_to_user)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Number of stored users.
    #[instrument(skip(self))]
    pub fn count(&self) -> Result<u64, StoreError> {
        self.db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
        })
    }
}
