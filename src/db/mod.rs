use rusqlite::{
  params,
  OptionalExtension,
  Params,
  Row,
  TransactionBehavior
};
use r2d2_sqlite::SqliteConnectionManager;
use std::time::Duration;
pub mod entities;
mod helpers;
mod mappers;
mod queries;
use eyre::WrapErr;
use color_eyre::Result;
use log::debug;
use entities::*;
use mappers::{map_blog_post, map_visitor};
use queries::{Order, OrderBy, Query};

// Type alias to make function signatures much clearer:
pub type Pool = r2d2::Pool<SqliteConnectionManager>;

// A repeat visitor is only counted again once this much
// time has passed since their last counted visit.
pub const VISITOR_WINDOW_SECS: i64 = 24 * 60 * 60;

const BLOG_POSTS: &str = "blog_posts";
const ADMIN_USERS: &str = "admin_users";
const VISITORS: &str = "visitors";
const BLOG_POST_FIELDS: [&str; 7] = [
  "id",
  "title",
  "content",
  "created_by",
  "cover_image_url",
  "view_count",
  "created_at"
];
const VISITOR_FIELDS: [&str; 3] = ["visitor_id", "view", "visit_time"];

const SCHEMA: &str = "
  CREATE TABLE IF NOT EXISTS blog_posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    created_by TEXT NOT NULL,
    cover_image_url TEXT,
    view_count INTEGER NOT NULL DEFAULT 0 CHECK (view_count >= 0),
    created_at INTEGER NOT NULL
  );
  CREATE INDEX IF NOT EXISTS blog_posts_created_at ON blog_posts (created_at);
  CREATE TABLE IF NOT EXISTS admin_users (
    email TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL
  );
  CREATE TABLE IF NOT EXISTS visitors (
    visitor_id TEXT PRIMARY KEY,
    view INTEGER NOT NULL CHECK (view > 0),
    visit_time INTEGER NOT NULL
  );
";

// Concurrent writers wait on each other (busy timeout)
// instead of failing with SQLITE_BUSY.
pub fn open_pool(db_path: &str) -> Result<Pool> {
  let manager = SqliteConnectionManager::file(db_path)
    .with_init(|conn| {
      conn.busy_timeout(Duration::from_secs(5))?;
      conn.pragma_update_and_check(
        None,
        "journal_mode",
        "WAL",
        |row| row.get::<_, String>(0)
      )?;
      Ok(())
    });
  Pool::new(manager)
    .context("Opening database connection pool")
}

pub fn init_schema(pool: &Pool) -> Result<()> {
  let conn = pool.get()?;
  conn.execute_batch(SCHEMA)
    .context("Creating database schema")
}

fn select_many<T, P, F>(
  pool: &Pool,
  query: &str,
  params: P,
  mapper: F
) -> Result<Vec<T>>
  where
    P: Params,
    F: FnMut(&Row<'_>) -> Result<T, rusqlite::Error>,
{
  let conn = pool.get()?;
  let mut stmt = conn.prepare(query)?;
  let rows = stmt.query_map(params, mapper)?;
  rows.collect::<Result<Vec<T>, rusqlite::Error>>()
    .context("Generic select_many query")
}

pub fn all_blog_posts(pool: &Pool) -> Result<Vec<BlogPost>> {
  let query = Query::select(BLOG_POSTS, &BLOG_POST_FIELDS)
    .order(OrderBy::new(
      Order::Desc,
      vec!["created_at".to_string(), "id".to_string()]
    ));
  select_many(pool, &query.to_string(), [], map_blog_post)
}

pub fn blog_post_by_id(pool: &Pool, id: i64) -> Result<Option<BlogPost>> {
  let query = Query::select(BLOG_POSTS, &BLOG_POST_FIELDS)
    .where_clause("id = ?");
  let conn = pool.get()?;
  conn.query_row(&query.to_string(), params![id], map_blog_post)
    .optional()
    .context("Selecting blog post by id")
}

pub fn insert_blog_post(
  pool: &Pool,
  post: &NewBlogPost,
  created_at: i64
) -> Result<BlogPost> {
  let query = Query::insert(
    BLOG_POSTS,
    &["title", "content", "created_by", "cover_image_url", "created_at"]
  ).returning(&BLOG_POST_FIELDS);
  let conn = pool.get()?;
  conn.query_row(
    &query.to_string(),
    params![
      post.title,
      post.content,
      post.created_by,
      post.cover_image_url,
      created_at
    ],
    map_blog_post
  ).context("Inserting blog post")
}

// Single statement, so concurrent increments can't read
// the same value and lose an update. None means no post
// has that id and nothing was written.
pub fn increment_view_count(pool: &Pool, id: i64) -> Result<Option<i64>> {
  let query = Query::update(BLOG_POSTS, &["view_count = view_count + 1"])
    .where_clause("id = ?")
    .returning(&["view_count"]);
  let conn = pool.get()?;
  conn.query_row(&query.to_string(), params![id], |row| row.get(0))
    .optional()
    .context("Incrementing blog post view count")
}

// Returns the amount of rows deleted, which can be 0.
pub fn delete_blog_post(pool: &Pool, id: i64) -> Result<usize> {
  let query = Query::delete(BLOG_POSTS).where_clause("id = ?");
  let conn = pool.get()?;
  conn.execute(&query.to_string(), params![id])
    .context("Deleting blog post")
}

pub fn admin_password_hashes(pool: &Pool, email: &str) -> Result<Vec<String>> {
  let query = Query::select(ADMIN_USERS, &["password"])
    .where_clause("email = ?");
  select_many(pool, &query.to_string(), params![email], |row| row.get(0))
}

pub fn insert_admin_user(pool: &Pool, email: &str, password_hash: &str) -> Result<()> {
  let query = Query::insert(ADMIN_USERS, &["email", "password"]);
  let conn = pool.get()?;
  conn.execute(&query.to_string(), params![email, password_hash])
    .context("Inserting admin user")?;
  Ok(())
}

// Sorted by id so the listing is stable between calls.
pub fn all_visitors(pool: &Pool) -> Result<Vec<Visitor>> {
  let query = Query::select(VISITORS, &VISITOR_FIELDS)
    .order(OrderBy::new(Order::Asc, vec!["visitor_id".to_string()]));
  select_many(pool, &query.to_string(), [], map_visitor)
}

// The IMMEDIATE transaction takes the write lock before
// reading, so two requests for the same visitor can't
// both decide to count the visit.
pub fn record_visit(
  pool: &Pool,
  visitor_id: &str,
  now: i64
) -> Result<(VisitOutcome, Visitor)> {
  let mut conn = pool.get()?;
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let select = Query::select(VISITORS, &VISITOR_FIELDS)
    .where_clause("visitor_id = ?");
  let existing = tx.query_row(&select.to_string(), params![visitor_id], map_visitor)
    .optional()?;
  let (outcome, visitor) = helpers::next_visit(
    existing,
    visitor_id,
    now,
    VISITOR_WINDOW_SECS
  );
  debug!("Visit from {} - {:?}", visitor_id, outcome);
  match outcome {
    VisitOutcome::Created => {
      let insert = Query::insert(VISITORS, &VISITOR_FIELDS);
      tx.execute(
        &insert.to_string(),
        params![visitor.visitor_id, visitor.view, visitor.visit_time]
      )?;
    },
    VisitOutcome::Counted => {
      let update = Query::update(VISITORS, &["view = ?", "visit_time = ?"])
        .where_clause("visitor_id = ?");
      tx.execute(
        &update.to_string(),
        params![visitor.view, visitor.visit_time, visitor.visitor_id]
      )?;
    },
    VisitOutcome::Unchanged => ()
  }
  tx.commit().context("Recording visitor")?;
  Ok((outcome, visitor))
}

// In-memory database for tests. Only one connection
// or every connection would get its own database.
#[cfg(test)]
pub fn memory_pool() -> Pool {
  let manager = SqliteConnectionManager::memory();
  let pool = Pool::builder()
    .max_size(1)
    .build(manager)
    .unwrap();
  init_schema(&pool).unwrap();
  pool
}
