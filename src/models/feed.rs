use super::user::User;
use crate::schema::*;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Associations, PartialEq)]
#[diesel(belongs_to(User))]
#[diesel(table_name = feeds)]
pub struct Feed {
    pub id: i32,
    pub name: String,
    pub url: String,
    pub user_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    /// None until the aggregator first claims this feed
    pub last_fetched_at: Option<NaiveDateTime>,
    pub last_error: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = feeds)]
pub struct NewFeed<'a> {
    pub name: &'a str,
    pub url: &'a str,
    pub user_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Column updates; `Some(None)` clears a nullable column.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = feeds)]
pub struct PartialFeed {
    pub updated_at: Option<NaiveDateTime>,
    pub last_fetched_at: Option<Option<NaiveDateTime>>,
    pub last_error: Option<Option<String>>,
}

#[derive(Debug, PartialEq)]
pub enum FeedTableError {
    UrlExists,
    InvalidUrl(String),
    InvalidName,
    DatabaseError,
}

impl<'a> NewFeed<'a> {
    pub fn new(name: &'a str, url: &'a str, user_id: Option<i32>) -> Self {
        let now = chrono::Utc::now().naive_utc();
        NewFeed {
            name,
            url,
            user_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn insert(&self, conn: &mut SqliteConnection) -> Result<Feed, FeedTableError> {
        use diesel::result::{DatabaseErrorKind, Error as DieselError};

        if self.name.trim().is_empty() || self.name.len() > 100 {
            return Err(FeedTableError::InvalidName);
        }
        validate_feed_url(self.url).map_err(FeedTableError::InvalidUrl)?;

        match diesel::insert_into(feeds::table).values(self).get_result(conn) {
            Ok(feed) => Ok(feed),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                log::info!("Feed {} is already registered", self.url);
                Err(FeedTableError::UrlExists)
            }
            Err(e) => {
                log::warn!("Error inserting feed: {:?}", e);
                Err(FeedTableError::DatabaseError)
            }
        }
    }
}

/// Feed URLs must be absolute http(s) URLs with a host.
pub fn validate_feed_url(url: &str) -> Result<(), String> {
    if url.len() > 2048 {
        return Err("URL too long (max 2048 characters)".to_string());
    }
    let parsed = url::Url::parse(url).map_err(|e| format!("{url}: {e}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("{url}: must be HTTP or HTTPS"));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(format!("{url}: missing host"));
    }
    Ok(())
}

impl Feed {
    pub fn get_by_id(conn: &mut SqliteConnection, id: i32) -> Option<Feed> {
        match feeds::table.find(id).first::<Feed>(conn) {
            Ok(feed) => Some(feed),
            Err(e) => {
                log::warn!("Error getting feed: {:?}", e);
                None
            }
        }
    }

    pub fn get_by_url(conn: &mut SqliteConnection, url: &str) -> Option<Feed> {
        match feeds::table.filter(feeds::url.eq(url)).first::<Feed>(conn) {
            Ok(feed) => Some(feed),
            Err(e) => {
                log::info!("Requested feed w/ URL '{}' not found: {:?}", url, e);
                None
            }
        }
    }

    /// The feed fetched longest ago. SQLite sorts NULL first in ascending
    /// order, so never-fetched feeds always win; ties go to the oldest id.
    pub fn next_to_fetch(conn: &mut SqliteConnection) -> QueryResult<Option<Feed>> {
        feeds::table
            .order((feeds::last_fetched_at.asc(), feeds::id.asc()))
            .first::<Feed>(conn)
            .optional()
    }

    pub fn mark_fetched(
        conn: &mut SqliteConnection,
        feed_id: i32,
        fetched_at: NaiveDateTime,
    ) -> QueryResult<Feed> {
        let update = PartialFeed {
            updated_at: Some(fetched_at),
            last_fetched_at: Some(Some(fetched_at)),
            ..Default::default()
        };
        Self::update(conn, feed_id, &update)
    }

    pub fn update(
        conn: &mut SqliteConnection,
        feed_id: i32,
        update: &PartialFeed,
    ) -> QueryResult<Feed> {
        diesel::update(feeds::table.find(feed_id))
            .set(update)
            .get_result(conn)
    }

    /// All feeds with their owner's name, oldest registration first.
    pub fn get_all_with_owner(
        conn: &mut SqliteConnection,
    ) -> QueryResult<Vec<(Feed, Option<String>)>> {
        feeds::table
            .left_join(users::table)
            .select((feeds::all_columns, users::name.nullable()))
            .order(feeds::id.asc())
            .load::<(Feed, Option<String>)>(conn)
    }
}
