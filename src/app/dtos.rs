use serde::{Deserialize, Serialize};
use crate::db::entities::*;
use crate::utils::time_utils;

// I'm using the From trait to convert entities to DTOs,
// only the entity -> DTO direction is needed.
// Field names are snake_case like the columns, that's
// what the frontend already reads.

#[derive(Debug, Serialize, Deserialize)]
pub struct BlogPostDto {
  pub id: i64,
  pub title: String,
  pub content: String,
  pub created_by: String,
  pub cover_image_url: Option<String>,
  pub view_count: i64,
  pub created_at: String
}

impl From<BlogPost> for BlogPostDto {
  fn from(post: BlogPost) -> Self {
    Self {
      id: post.id,
      title: post.title,
      content: post.content,
      created_by: post.created_by,
      cover_image_url: post.cover_image_url,
      view_count: post.view_count,
      created_at: time_utils::timestamp_to_rfc3339(post.created_at)
    }
  }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VisitorDto {
  pub visitor_id: String,
  pub view: i64,
  pub visit_time: String
}

impl From<Visitor> for VisitorDto {
  fn from(visitor: Visitor) -> Self {
    Self {
      visitor_id: visitor.visitor_id,
      view: visitor.view,
      visit_time: time_utils::timestamp_to_rfc3339(visitor.visit_time)
    }
  }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ViewCountDto {
  pub id: i64,
  pub view_count: i64
}

/* --- Request bodies --- */
// Missing strings default to empty so that the handlers
// can answer with a useful message instead of a generic
// deserialization error.
#[derive(Debug, Deserialize)]
pub struct LoginBody {
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub password: String
}

#[derive(Debug, Deserialize)]
pub struct VisitorBody {
  #[serde(default)]
  pub visitor: String
}

#[derive(Debug, Deserialize)]
pub struct ContactBody {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub email: String,
  pub subject: Option<String>,
  #[serde(default)]
  pub message: String
}
/* --- End request bodies --- */

// All the response envelopes have "success" and
// "message", then one payload field.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
  pub success: bool,
  pub message: String
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContentResponse<T> {
  pub success: bool,
  pub message: String,
  pub content: Vec<T>
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
  pub success: bool,
  pub message: String,
  pub data: T
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UrlResponse {
  pub success: bool,
  pub message: String,
  pub url: String
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
  pub success: bool,
  pub message: String,
  pub deleted: usize
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
  pub success: bool,
  pub message: String,
  pub error: String
}

impl MessageResponse {
  pub fn ok(message: &str) -> Self {
    Self { success: true, message: message.to_string() }
  }
}

impl<T> ContentResponse<T> {
  pub fn ok(message: &str, content: Vec<T>) -> Self {
    Self { success: true, message: message.to_string(), content }
  }
}

impl<T> DataResponse<T> {
  pub fn ok(message: &str, data: T) -> Self {
    Self { success: true, message: message.to_string(), data }
  }
}

impl UrlResponse {
  pub fn ok(message: &str, url: String) -> Self {
    Self { success: true, message: message.to_string(), url }
  }
}

impl DeletedResponse {
  pub fn ok(message: &str, deleted: usize) -> Self {
    Self { success: true, message: message.to_string(), deleted }
  }
}
