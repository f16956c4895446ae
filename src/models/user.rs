use crate::schema::*;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// A feed owner. Only a name; there is no login or session state.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, PartialEq)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
struct InsertableUser<'a> {
    name: &'a str,
    created_at: NaiveDateTime,
}

#[derive(Debug, PartialEq)]
pub enum UserTableError {
    NameExists,
    InvalidName,
    UserNotFound,
    DatabaseError,
}

impl User {
    pub fn create(conn: &mut SqliteConnection, name: &str) -> Result<User, UserTableError> {
        let name = name.trim();
        if name.is_empty() || name.len() > 100 {
            log::warn!("Rejected user name {:?}", name);
            return Err(UserTableError::InvalidName);
        }

        if Self::get_by_name(conn, name).is_some() {
            log::warn!("User {} already exists", name);
            return Err(UserTableError::NameExists);
        }

        let user = InsertableUser {
            name,
            created_at: chrono::Utc::now().naive_utc(),
        };

        match diesel::insert_into(users::table)
            .values(&user)
            .get_result(conn)
        {
            Ok(in_db) => Ok(in_db),
            Err(err) => {
                log::error!("Failed to insert user into database: {:?}", err);
                Err(UserTableError::DatabaseError)
            }
        }
    }

    pub fn get_by_name(conn: &mut SqliteConnection, name: &str) -> Option<User> {
        match users::table
            .filter(users::name.eq(name))
            .first::<User>(conn)
        {
            Ok(user) => Some(user),
            Err(e) => {
                log::debug!("User '{}' not found: {:?}", name, e);
                None
            }
        }
    }

    /// Look up an owner by name, distinguishing a missing user from a
    /// failed query.
    pub fn require(conn: &mut SqliteConnection, name: &str) -> Result<User, UserTableError> {
        users::table
            .filter(users::name.eq(name))
            .first::<User>(conn)
            .optional()
            .map_err(|e| {
                log::error!("Error looking up user {}: {:?}", name, e);
                UserTableError::DatabaseError
            })?
            .ok_or(UserTableError::UserNotFound)
    }

    pub fn get_all(conn: &mut SqliteConnection) -> Result<Vec<User>, UserTableError> {
        users::table
            .order(users::name.asc())
            .load::<User>(conn)
            .map_err(|e| {
                log::warn!("Error getting users: {:?}", e);
                UserTableError::DatabaseError
            })
    }
}
