use super::entities::*;
use rusqlite::{Row, Error};

// Column order has to match BLOG_POST_FIELDS and
// VISITOR_FIELDS in db/mod.rs.

pub fn map_blog_post(row: &Row) -> Result<BlogPost, Error> {
  Ok(BlogPost {
    id: row.get(0)?,
    title: row.get(1)?,
    content: row.get(2)?,
    created_by: row.get(3)?,
    cover_image_url: row.get(4)?,
    view_count: row.get(5)?,
    created_at: row.get(6)?
  })
}

pub fn map_visitor(row: &Row) -> Result<Visitor, Error> {
  Ok(Visitor {
    visitor_id: row.get(0)?,
    view: row.get(1)?,
    visit_time: row.get(2)?
  })
}
