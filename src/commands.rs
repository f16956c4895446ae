//! Command handlers. Each writes its human-readable output to `out` so the
//! binary can pass stdout and tests can pass a buffer.

use std::io::Write;

use diesel::prelude::*;
use diesel::SqliteConnection;

use crate::errors::{AppError, AppResult};
use crate::models::{
    feed::{Feed, NewFeed},
    post::Post,
    user::User,
};
use crate::schema;

pub const DEFAULT_BROWSE_LIMIT: i64 = 2;

pub fn register(conn: &mut SqliteConnection, name: &str, out: &mut impl Write) -> AppResult<User> {
    let user = User::create(conn, name)?;
    tracing::info!(user_id = user.id, name = %user.name, "Registered user");
    writeln!(out, "User created: {}", user.name)?;
    Ok(user)
}

pub fn users(conn: &mut SqliteConnection, out: &mut impl Write) -> AppResult<()> {
    let users = User::get_all(conn)?;
    if users.is_empty() {
        writeln!(out, "No users registered")?;
    }
    for user in users {
        writeln!(out, "* {}", user.name)?;
    }
    Ok(())
}

pub fn add_feed(
    conn: &mut SqliteConnection,
    name: &str,
    url: &str,
    owner: Option<&str>,
    out: &mut impl Write,
) -> AppResult<Feed> {
    let user_id = match owner {
        Some(owner) => Some(User::require(conn, owner)?.id),
        None => None,
    };
    let feed = NewFeed::new(name.trim(), url.trim(), user_id).insert(conn)?;
    tracing::info!(feed_id = feed.id, feed_url = %feed.url, "Registered feed");
    writeln!(out, "Feed added: {} ({})", feed.name, feed.url)?;
    Ok(feed)
}

pub fn feeds(conn: &mut SqliteConnection, out: &mut impl Write) -> AppResult<()> {
    let rows = Feed::get_all_with_owner(conn)?;
    if rows.is_empty() {
        writeln!(out, "No feeds registered")?;
    }
    for (feed, owner) in rows {
        writeln!(out, "* {}", feed.name)?;
        writeln!(out, "  URL:          {}", feed.url)?;
        writeln!(out, "  Owner:        {}", owner.as_deref().unwrap_or("-"))?;
        match feed.last_fetched_at {
            Some(at) => writeln!(out, "  Last fetched: {}", at.format("%Y-%m-%d %H:%M:%S UTC"))?,
            None => writeln!(out, "  Last fetched: never")?,
        }
        if let Some(error) = feed.last_error {
            writeln!(out, "  Last error:   {}", error)?;
        }
    }
    Ok(())
}

pub fn browse(
    conn: &mut SqliteConnection,
    limit: i64,
    feed_url: Option<&str>,
    json: bool,
    out: &mut impl Write,
) -> AppResult<Vec<Post>> {
    if limit < 1 {
        return Err(AppError::invalid_input("limit", "must be at least 1"));
    }
    if let Some(url) = feed_url {
        if Feed::get_by_url(conn, url).is_none() {
            return Err(AppError::resource_not_found("Feed"));
        }
    }

    let posts = Post::recent(conn, limit, feed_url)?;
    if json {
        serde_json::to_writer_pretty(&mut *out, &posts)?;
        writeln!(out)?;
        return Ok(posts);
    }

    if posts.is_empty() {
        writeln!(out, "No posts yet")?;
    }
    for post in &posts {
        writeln!(out, "{} | {}", post.published_at.format("%Y-%m-%d %H:%M"), post.title)?;
        writeln!(out, "    {}", post.url)?;
        if let Some(description) = &post.description {
            writeln!(out, "    {}", description)?;
        }
    }
    Ok(posts)
}

#[derive(Debug, Default, PartialEq)]
pub struct ResetSummary {
    pub posts: usize,
    pub feeds: usize,
    pub users: usize,
}

/// Delete everything, children first.
pub fn reset(conn: &mut SqliteConnection, out: &mut impl Write) -> AppResult<ResetSummary> {
    let summary = conn.transaction::<_, diesel::result::Error, _>(|conn| {
        Ok(ResetSummary {
            posts: diesel::delete(schema::posts::table).execute(conn)?,
            feeds: diesel::delete(schema::feeds::table).execute(conn)?,
            users: diesel::delete(schema::users::table).execute(conn)?,
        })
    })?;
    tracing::warn!(
        posts = summary.posts,
        feeds = summary.feeds,
        users = summary.users,
        "Database reset"
    );
    writeln!(
        out,
        "Deleted {} posts, {} feeds and {} users",
        summary.posts, summary.feeds, summary.users
    )?;
    Ok(summary)
}
