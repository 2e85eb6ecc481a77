// Plain rows, the way SQLite hands them back. Timestamps
// are Unix seconds (UTC). JSON shapes live in app::dtos.

#[derive(Debug, Clone, PartialEq)]
pub struct BlogPost {
  pub id: i64,
  pub title: String,
  pub content: String,
  pub created_by: String,
  pub cover_image_url: Option<String>,
  pub view_count: i64,
  pub created_at: i64
}

// What the handlers give us to insert, the store
// fills in id, view_count and created_at.
#[derive(Debug, Clone)]
pub struct NewBlogPost {
  pub title: String,
  pub content: String,
  pub created_by: String,
  pub cover_image_url: Option<String>
}

#[derive(Debug, Clone, PartialEq)]
pub struct Visitor {
  pub visitor_id: String,
  pub view: i64,
  pub visit_time: i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitOutcome {
  // First time we see that visitor_id.
  Created,
  // Last counted visit is older than the window.
  Counted,
  // Still inside the window, nothing written.
  Unchanged
}
