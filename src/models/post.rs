use super::feed::Feed;
use crate::schema::*;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Associations, PartialEq)]
#[diesel(belongs_to(Feed))]
#[diesel(table_name = posts)]
pub struct Post {
    pub id: i32,
    pub feed_id: i32,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub published_at: NaiveDateTime,
    /// when the aggregator ingested it
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = posts)]
pub struct NewPost<'a> {
    pub feed_id: i32,
    pub url: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub published_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

impl<'a> NewPost<'a> {
    /// Insert as-is. A post whose URL already exists comes back as a
    /// `UniqueViolation` database error; callers decide what that means.
    pub fn insert(&self, conn: &mut SqliteConnection) -> QueryResult<Post> {
        diesel::insert_into(posts::table)
            .values(self)
            .get_result(conn)
    }
}

impl Post {
    pub fn get_by_url(conn: &mut SqliteConnection, url: &str) -> Option<Post> {
        match posts::table.filter(posts::url.eq(url)).first::<Post>(conn) {
            Ok(post) => Some(post),
            Err(e) => {
                log::debug!("Post '{}' not found: {:?}", url, e);
                None
            }
        }
    }

    pub fn get_by_feed(conn: &mut SqliteConnection, feed_id: i32) -> QueryResult<Vec<Post>> {
        posts::table
            .filter(posts::feed_id.eq(feed_id))
            .order(posts::id.asc())
            .load::<Post>(conn)
    }

    /// Newest posts first, optionally restricted to one feed URL.
    pub fn recent(
        conn: &mut SqliteConnection,
        limit: i64,
        feed_url: Option<&str>,
    ) -> QueryResult<Vec<Post>> {
        let mut query = posts::table
            .inner_join(feeds::table)
            .select(posts::all_columns)
            .order((posts::published_at.desc(), posts::id.desc()))
            .limit(limit)
            .into_boxed();
        if let Some(feed_url) = feed_url {
            query = query.filter(feeds::url.eq(feed_url));
        }
        query.load::<Post>(conn)
    }

    pub fn count(conn: &mut SqliteConnection) -> QueryResult<i64> {
        posts::table.count().get_result(conn)
    }
}
