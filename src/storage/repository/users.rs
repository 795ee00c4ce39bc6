// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User repository backing signup and login.
//!
//! Emails must be unique: the email index is checked and written in the
//! same write transaction that inserts the user record, so two concurrent
//! signups for the same address cannot both succeed.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Role;

use super::super::db::{FleetDb, USERS, USER_EMAIL_INDEX};
use super::super::{StoreError, StoreResult};

/// Stored user record. The password hash never leaves the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Argon2 PHC hash string
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// User representation returned to API clients (no credentials).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

/// Repository for user records.
pub struct UserRepository<'a> {
    db: &'a FleetDb,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a FleetDb) -> Self {
        Self { db }
    }

    /// Create a new user.
    ///
    /// The store assigns the id. Fails with `AlreadyExists` when the email
    /// is already registered (case-insensitive).
    pub fn create(
        &self,
        name: String,
        email: String,
        password_hash: String,
        role: Role,
        now: DateTime<Utc>,
    ) -> StoreResult<User> {
        let user = User {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            role,
            created_at: now,
        };
        let email_key = user.email.to_lowercase();
        let user_id = user.id.to_string();
        let json = serde_json::to_vec(&user)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut email_index = write_txn.open_table(USER_EMAIL_INDEX)?;
            if email_index.get(email_key.as_str())?.is_some() {
                return Err(StoreError::AlreadyExists(
                    "Email already registered".to_string(),
                ));
            }
            email_index.insert(email_key.as_str(), user_id.as_str())?;

            let mut users = write_txn.open_table(USERS)?;
            users.insert(user_id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;

        Ok(user)
    }

    /// Look up a user by email (case-insensitive).
    pub fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email_key = email.to_lowercase();
        let read_txn = self.db.begin_read()?;

        let email_index = read_txn.open_table(USER_EMAIL_INDEX)?;
        let user_id = match email_index.get(email_key.as_str())? {
            Some(v) => v.value().to_string(),
            None => return Ok(None),
        };

        let users = read_txn.open_table(USERS)?;
        match users.get(user_id.as_str())? {
            Some(v) => {
                let user: User = serde_json::from_slice(v.value())?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }
}
