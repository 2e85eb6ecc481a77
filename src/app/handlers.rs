use actix_multipart::Multipart;
use actix_web::{
  web,
  HttpResponse,
  HttpRequest,
  Result
};
use serde_json::json;
use crate::db::entities::*;
use crate::db;
use crate::storage::{
  object_path,
  timestamped_object_path,
  COVER_IMAGES,
  CONTENT_IMAGES
};
use crate::utils::{password_utils, time_utils, serde_utils};
use log::{error, info, warn};
use super::contact_relay::ContactMessage;
use super::dtos::*;
use super::error::{Error, map_db_error};
use super::multipart::{MultipartForm, UploadedFile};
use super::AppState;
use super::helpers::{self, json_no_store};

// Module with all the API handler functions.
// Multipart field names are the ones the admin
// frontend has always been sending.
const COVER_IMAGE_FIELD: &str = "coverImage";
const WORD_FILE_FIELD: &str = "wordFile";
const IMAGE_FIELD: &str = "image";

// Default response when no route matched the request:
pub async fn not_found() -> Result<HttpResponse, Error> {
  Err(Error::not_found("Not found", "Endpoint doesn't exist"))
}

pub async fn ping() -> HttpResponse {
  json_no_store(json!({ "message": "alive" }))
}

fn required_text(form: &MultipartForm, name: &str) -> Result<String, Error> {
  form.text(name)
    .map(String::from)
    .and_then(|v| serde_utils::empty_string_to_none(Some(v)))
    .ok_or_else(|| Error::BadRequest(format!("Field \"{}\" is required", name)))
}

// The object key is whatever make_path builds out of the
// original file name.
async fn upload_file(
  app_state: &AppState,
  file: UploadedFile,
  make_path: fn(&str, &str) -> String,
  namespace: &str
) -> Result<String, Error> {
  if file.file_name.trim().is_empty() {
    return Err(Error::BadRequest("Uploaded file has no name".to_string()));
  }
  let path = make_path(namespace, &file.file_name);
  let url = app_state.storage.upload(&path, file.bytes).await?;
  info!("Uploaded {}", path);
  Ok(url)
}

// Nothing is rolled back when the insert fails, the image
// stays in the bucket. Logging the URL at least makes it
// possible to clean up by hand.
fn insert_post(
  app_state: &AppState,
  post: NewBlogPost
) -> Result<BlogPost, Error> {
  db::insert_blog_post(&app_state.pool, &post, time_utils::current_timestamp())
    .map_err(|e| {
      if let Some(url) = &post.cover_image_url {
        error!("Blog post insert failed, orphaned cover image: {}", url);
      }
      map_db_error(e)
    })
}

pub async fn blog_posts(
  app_state: web::Data<AppState>
) -> Result<HttpResponse, Error> {
  let posts: Vec<BlogPostDto> = db::all_blog_posts(&app_state.pool)
    .map_err(map_db_error)?
    .into_iter()
    .map(Into::into)
    .collect();
  Ok(json_no_store(ContentResponse::ok("Blog posts", posts)))
}

pub async fn add_blog_post(
  app_state: web::Data<AppState>,
  payload: Multipart
) -> Result<HttpResponse, Error> {
  let mut form = MultipartForm::read(payload, app_state.settings.max_upload_size).await?;
  let title = required_text(&form, "title")?;
  let author = required_text(&form, "author")?;
  let content = required_text(&form, "content")?;

  // Original file name used as-is, same name twice means
  // the second upload replaces the first one.
  let cover_image_url = match form.take_file(COVER_IMAGE_FIELD) {
    Some(file) => Some(upload_file(&app_state, file, object_path, COVER_IMAGES).await?),
    None => None
  };

  let post = insert_post(&app_state, NewBlogPost {
    title,
    content,
    created_by: author,
    cover_image_url
  })?;
  info!("Blog post {} created", post.id);
  Ok(json_no_store(DataResponse::ok("Blog post saved", BlogPostDto::from(post))))
}

pub async fn add_word_blog_post(
  app_state: web::Data<AppState>,
  payload: Multipart
) -> Result<HttpResponse, Error> {
  let mut form = MultipartForm::read(payload, app_state.settings.max_upload_size).await?;
  let word_file = form.take_file(WORD_FILE_FIELD)
    .ok_or_else(|| Error::BadRequest("No Word document provided".to_string()))?;

  let cover_image_url = match form.take_file(COVER_IMAGE_FIELD) {
    Some(file) => Some(
      upload_file(&app_state, file, timestamped_object_path, COVER_IMAGES).await?
    ),
    None => None
  };

  let converted = app_state.converter.convert(&word_file.bytes)
    .await
    .map_err(|e| {
      if let Some(url) = &cover_image_url {
        error!("Word document conversion failed, orphaned cover image: {}", url);
      }
      Error::from(e)
    })?;

  let post = insert_post(&app_state, NewBlogPost {
    title: converted.title,
    content: converted.html,
    created_by: app_state.settings.word_blog_author.clone(),
    cover_image_url
  })?;
  info!("Blog post {} created from Word document {}", post.id, word_file.file_name);
  Ok(json_no_store(
    DataResponse::ok("Blog post created from Word document", BlogPostDto::from(post))
  ))
}

// Path variables have to be in a tuple.
pub async fn increment_view_count(
  app_state: web::Data<AppState>,
  path: web::Path<(i64,)>
) -> Result<HttpResponse, Error> {
  let id = path.into_inner().0;
  match db::increment_view_count(&app_state.pool, id).map_err(map_db_error)? {
    Some(view_count) => Ok(json_no_store(DataResponse::ok(
      &format!("View count incremented, new value: {}", view_count),
      ViewCountDto { id, view_count }
    ))),
    None => Err(Error::not_found(
      "Blog post not found",
      &format!("No blog post with id {}", id)
    ))
  }
}

// Doesn't check if the post exists, deleting nothing
// is still a success.
pub async fn delete_blog_post(
  app_state: web::Data<AppState>,
  path: web::Path<(i64,)>
) -> Result<HttpResponse, Error> {
  let id = path.into_inner().0;
  let deleted = db::delete_blog_post(&app_state.pool, id)
    .map_err(map_db_error)?;
  info!("Delete request for blog post {}, {} row(s) removed", id, deleted);
  Ok(json_no_store(DeletedResponse::ok("Blog post deleted", deleted)))
}

pub async fn upload_image(
  app_state: web::Data<AppState>,
  payload: Multipart
) -> Result<HttpResponse, Error> {
  let mut form = MultipartForm::read(payload, app_state.settings.max_upload_size).await?;
  let image = form.take_file(IMAGE_FIELD)
    .ok_or_else(|| Error::BadRequest("No image file provided".to_string()))?;
  let url = upload_file(&app_state, image, object_path, CONTENT_IMAGES).await?;
  Ok(json_no_store(UrlResponse::ok("Image uploaded", url)))
}

// Only checks the credentials, there's no session or
// token coming out of this.
pub async fn login(
  app_state: web::Data<AppState>,
  body: web::Json<LoginBody>,
  req: HttpRequest
) -> Result<HttpResponse, Error> {
  let email = body.email.trim();
  if email.is_empty() || body.password.is_empty() {
    return Err(Error::BadRequest("Email and password are required".to_string()));
  }
  if app_state.check_rate_limit() {
    return Err(Error::TooManyRequests);
  }

  let client_ip = helpers::real_ip_addr(&req)
    .map(|ip| ip.to_string())
    .unwrap_or_else(|| "unknown".to_string());
  let hashes = db::admin_password_hashes(&app_state.pool, email)
    .map_err(map_db_error)?;
  // Unique column, anything but one row is "not found".
  let stored_hash = match hashes.as_slice() {
    [hash] => hash,
    _ => {
      warn!("Login attempt for unknown user {} from {}", email, client_ip);
      return Err(Error::not_found("User not found", "No admin user with that email"));
    }
  };
  if password_utils::verify_password(&body.password, stored_hash).map_err(map_db_error)? {
    info!("Successful login for {}", email);
    Ok(json_no_store(MessageResponse::ok("Logged in")))
  } else {
    warn!("Wrong password for {} from {}", email, client_ip);
    Err(Error::WrongPassword)
  }
}

pub async fn record_visit(
  app_state: web::Data<AppState>,
  body: web::Json<VisitorBody>
) -> Result<HttpResponse, Error> {
  let visitor_id = body.visitor.trim();
  if visitor_id.is_empty() {
    return Err(Error::BadRequest("Visitor id is required".to_string()));
  }
  let (outcome, visitor) = db::record_visit(
    &app_state.pool,
    visitor_id,
    time_utils::current_timestamp()
  ).map_err(map_db_error)?;
  let message = match outcome {
    VisitOutcome::Created => "New visitor recorded",
    VisitOutcome::Counted => "Visit counted",
    VisitOutcome::Unchanged => "Already counted in the last 24 hours"
  };
  Ok(json_no_store(DataResponse::ok(message, VisitorDto::from(visitor))))
}

pub async fn visitors(
  app_state: web::Data<AppState>
) -> Result<HttpResponse, Error> {
  let visitors: Vec<VisitorDto> = db::all_visitors(&app_state.pool)
    .map_err(map_db_error)?
    .into_iter()
    .map(Into::into)
    .collect();
  Ok(json_no_store(ContentResponse::ok("Visitors", visitors)))
}

// Shares the rate limiter with the login endpoint.
pub async fn contact(
  app_state: web::Data<AppState>,
  body: web::Json<ContactBody>
) -> Result<HttpResponse, Error> {
  let body = body.into_inner();
  let message = ContactMessage::new(body.name, body.email, body.subject, body.message)
    .map_err(Error::BadRequest)?;
  if app_state.check_rate_limit() {
    return Err(Error::TooManyRequests);
  }
  let relay = app_state.contact_relay.as_ref()
    .ok_or(Error::RelayUnavailable)?;
  relay.send(&message).await?;
  Ok(json_no_store(MessageResponse::ok("Message sent")))
}

#[cfg(test)]
mod tests {
  use super::*;
  use actix_web::{
    http::{header, StatusCode},
    test,
    App
  };
  use rusqlite::params;
  use serde_json::Value;
  use std::sync::{Arc, RwLock};
  use crate::app::{api_config, contact_relay::ContactRelay, rate_limiter::BasicRateLimiter};
  use crate::config::BlogSettings;
  use crate::convert::{docx::fixtures, DocumentConverter, DEFAULT_TITLE};
  use crate::storage::memory::MemoryStorage;

  const BOUNDARY: &str = "----blogtestboundary";

  struct Setup {
    storage: Arc<MemoryStorage>,
    contact_relay: Option<ContactRelay>,
    max_upload_size: usize,
    rl_max_requests: u32
  }

  impl Default for Setup {
    fn default() -> Self {
      Self {
        storage: Arc::new(MemoryStorage::new()),
        contact_relay: None,
        max_upload_size: 1024 * 1024,
        rl_max_requests: 100
      }
    }
  }

  impl Setup {
    fn state(self) -> web::Data<AppState> {
      web::Data::new(AppState {
        pool: db::memory_pool(),
        storage: self.storage.clone(),
        converter: DocumentConverter::new(self.storage, DEFAULT_TITLE),
        contact_relay: self.contact_relay,
        rate_limiter: RwLock::new(BasicRateLimiter::new(self.rl_max_requests, 60, 120)),
        settings: BlogSettings {
          word_blog_author: "Admin".to_string(),
          max_upload_size: self.max_upload_size
        }
      })
    }
  }

  // Same wiring as the real server minus the logger.
  macro_rules! test_app {
    ($state:expr) => {
      test::init_service(
        App::new()
          .app_data($state.clone())
          .configure(api_config)
          .default_service(web::route().to(not_found))
      ).await
    };
  }

  enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8])
  }

  fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
      body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
      match part {
        Part::Text(name, value) => {
          body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes()
          );
          body.extend_from_slice(value.as_bytes());
        },
        Part::File(name, file_name, bytes) => {
          body.extend_from_slice(
            format!(
              "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
              Content-Type: application/octet-stream\r\n\r\n",
              name, file_name
            ).as_bytes()
          );
          body.extend_from_slice(bytes);
        }
      }
      body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
  }

  fn multipart_request(uri: &str, parts: &[Part]) -> test::TestRequest {
    test::TestRequest::post()
      .uri(uri)
      .insert_header((
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={}", BOUNDARY)
      ))
      .set_payload(multipart_body(parts))
  }

  fn insert_post(state: &AppState, title: &str, created_at: i64) -> BlogPost {
    db::insert_blog_post(&state.pool, &NewBlogPost {
      title: title.to_string(),
      content: "<p>x</p>".to_string(),
      created_by: "A".to_string(),
      cover_image_url: None
    }, created_at).unwrap()
  }

  fn add_admin(state: &AppState, email: &str, password: &str) {
    let hash = password_utils::hash_password(password).unwrap();
    db::insert_admin_user(&state.pool, email, &hash).unwrap();
  }

  #[actix_web::test]
  async fn ping_and_unknown_routes() {
    let state = Setup::default().state();
    let app = test_app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/ping").to_request()).await;
    assert_eq!(StatusCode::OK, resp.status());
    let json: Value = test::read_body_json(resp).await;
    assert_eq!("alive", json["message"]);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/nope").to_request()).await;
    assert_eq!(StatusCode::NOT_FOUND, resp.status());
    let json: Value = test::read_body_json(resp).await;
    assert_eq!(false, json["success"]);
  }

  #[actix_web::test]
  async fn list_posts_newest_first() {
    let state = Setup::default().state();
    insert_post(&state, "old", 1000);
    insert_post(&state, "new", 2000);
    let app = test_app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/blogposts").to_request()).await;
    assert_eq!(StatusCode::OK, resp.status());
    assert_eq!("no-store", resp.headers().get(header::CACHE_CONTROL).unwrap().to_str().unwrap());
    let json: Value = test::read_body_json(resp).await;
    assert_eq!(true, json["success"]);
    assert_eq!("new", json["content"][0]["title"]);
    assert_eq!("old", json["content"][1]["title"]);
  }

  #[actix_web::test]
  async fn plain_post_round_trip() {
    let state = Setup::default().state();
    let app = test_app!(state);

    let req = multipart_request("/api/blog", &[
      Part::Text("title", "T"),
      Part::Text("author", "A"),
      Part::Text("content", "<p>x</p>")
    ]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::OK, resp.status());
    let json: Value = test::read_body_json(resp).await;
    assert!(json["data"]["cover_image_url"].is_null());

    let id = json["data"]["id"].as_i64().unwrap();
    let stored = db::blog_post_by_id(&state.pool, id).unwrap().unwrap();
    assert_eq!("T", stored.title);
    assert_eq!("A", stored.created_by);
    assert_eq!("<p>x</p>", stored.content);
    assert_eq!(None, stored.cover_image_url);
  }

  #[actix_web::test]
  async fn post_with_cover_image() {
    let setup = Setup::default();
    let storage = setup.storage.clone();
    let state = setup.state();
    let app = test_app!(state);

    let req = multipart_request("/api/blog", &[
      Part::Text("title", "T"),
      Part::Text("author", "A"),
      Part::Text("content", "<p>x</p>"),
      Part::File("coverImage", "cover.png", &[1, 2, 3])
    ]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::OK, resp.status());
    let json: Value = test::read_body_json(resp).await;
    assert_eq!("https://storage.test/coverImages/cover.png", json["data"]["cover_image_url"]);
    assert_eq!(vec!["coverImages/cover.png".to_string()], storage.paths());
  }

  #[actix_web::test]
  async fn post_without_title_is_rejected() {
    let state = Setup::default().state();
    let app = test_app!(state);

    let req = multipart_request("/api/blog", &[
      Part::Text("title", "  "),
      Part::Text("author", "A"),
      Part::Text("content", "<p>x</p>")
    ]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::BAD_REQUEST, resp.status());
    assert!(db::all_blog_posts(&state.pool).unwrap().is_empty());
  }

  #[actix_web::test]
  async fn oversized_file_is_rejected() {
    let setup = Setup { max_upload_size: 8, ..Setup::default() };
    let storage = setup.storage.clone();
    let state = setup.state();
    let app = test_app!(state);

    let req = multipart_request("/api/upload-image", &[
      Part::File("image", "big.png", &[0; 64])
    ]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::PAYLOAD_TOO_LARGE, resp.status());
    assert!(storage.paths().is_empty());
  }

  // Every file fits on its own but the form as a whole
  // doesn't.
  #[actix_web::test]
  async fn too_many_files_are_rejected() {
    let setup = Setup { max_upload_size: 8, ..Setup::default() };
    let storage = setup.storage.clone();
    let state = setup.state();
    let app = test_app!(state);

    let req = multipart_request("/api/upload-image", &[
      Part::File("extra1", "a.png", &[0; 8]),
      Part::File("extra2", "b.png", &[0; 8]),
      Part::File("image", "c.png", &[0; 8])
    ]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::PAYLOAD_TOO_LARGE, resp.status());
    assert!(storage.paths().is_empty());

    let req = multipart_request("/api/upload-image", &[
      Part::Text("note", "hello"),
      Part::File("image", "c.png", &[0; 8])
    ]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::OK, resp.status());
  }

  #[actix_web::test]
  async fn word_blog_post() {
    let setup = Setup::default();
    let storage = setup.storage.clone();
    let state = setup.state();
    let app = test_app!(state);

    let docx = fixtures::build_docx(&format!(
      "{}{}{}",
      fixtures::heading("Heading1", "From Word"),
      fixtures::paragraph("Body"),
      fixtures::image_paragraph("rId5", "pic")
    ));
    let req = multipart_request("/api/wordBlog", &[
      Part::File("coverImage", "cover.jpg", &[9, 9]),
      Part::File("wordFile", "post.docx", &docx)
    ]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::OK, resp.status());
    let json: Value = test::read_body_json(resp).await;
    assert_eq!("From Word", json["data"]["title"]);
    assert_eq!("Admin", json["data"]["created_by"]);
    let content = json["data"]["content"].as_str().unwrap();
    assert!(!content.contains("<h1"));
    assert!(!content.contains("data:"));
    assert!(content.contains("https://storage.test/contentImages/"));

    let paths = storage.paths();
    assert_eq!(2, paths.len());
    assert!(paths[0].starts_with("coverImages/"));
    assert!(paths[0].ends_with("_cover.jpg"));
    assert!(paths[1].starts_with("contentImages/"));
  }

  #[actix_web::test]
  async fn word_blog_without_document() {
    let state = Setup::default().state();
    let app = test_app!(state);

    let req = multipart_request("/api/wordBlog", &[
      Part::File("coverImage", "cover.jpg", &[9, 9])
    ]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::BAD_REQUEST, resp.status());
    let json: Value = test::read_body_json(resp).await;
    assert_eq!("No Word document provided", json["error"]);
  }

  #[actix_web::test]
  async fn word_blog_with_broken_document() {
    let state = Setup::default().state();
    let app = test_app!(state);

    let req = multipart_request("/api/wordBlog", &[
      Part::File("wordFile", "post.docx", b"not a zip file")
    ]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, resp.status());
    assert!(db::all_blog_posts(&state.pool).unwrap().is_empty());
  }

  #[actix_web::test]
  async fn word_blog_with_failing_storage() {
    let setup = Setup {
      storage: Arc::new(MemoryStorage::failing_after(0)),
      ..Setup::default()
    };
    let state = setup.state();
    let app = test_app!(state);

    let docx = fixtures::build_docx(&fixtures::image_paragraph("rId5", "pic"));
    let req = multipart_request("/api/wordBlog", &[
      Part::File("wordFile", "post.docx", &docx)
    ]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, resp.status());
    let json: Value = test::read_body_json(resp).await;
    assert_eq!("Storage error", json["message"]);
    assert!(db::all_blog_posts(&state.pool).unwrap().is_empty());
  }

  #[actix_web::test]
  async fn increment_view_count_from_five() {
    let state = Setup::default().state();
    let post = insert_post(&state, "T", 1000);
    state.pool.get().unwrap()
      .execute("UPDATE blog_posts SET view_count = 5 WHERE id = ?", params![post.id])
      .unwrap();
    let app = test_app!(state);

    let req = test::TestRequest::post()
      .uri(&format!("/api/blogposts/{}/view", post.id))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::OK, resp.status());
    let json: Value = test::read_body_json(resp).await;
    assert_eq!(6, json["data"]["view_count"]);
  }

  #[actix_web::test]
  async fn increment_unknown_post() {
    let state = Setup::default().state();
    let post = insert_post(&state, "T", 1000);
    let app = test_app!(state);

    let req = test::TestRequest::post()
      .uri(&format!("/api/blogposts/{}/view", post.id + 1))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::NOT_FOUND, resp.status());
    assert_eq!(0, db::blog_post_by_id(&state.pool, post.id).unwrap().unwrap().view_count);

    let req = test::TestRequest::post().uri("/api/blogposts/abc/view").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::BAD_REQUEST, resp.status());
  }

  #[actix_web::test]
  async fn delete_post_twice() {
    let state = Setup::default().state();
    let post = insert_post(&state, "T", 1000);
    let app = test_app!(state);

    for expected in [1, 0] {
      let req = test::TestRequest::delete()
        .uri(&format!("/api/deleteBlog/{}", post.id))
        .to_request();
      let resp = test::call_service(&app, req).await;
      assert_eq!(StatusCode::OK, resp.status());
      let json: Value = test::read_body_json(resp).await;
      assert_eq!(expected, json["deleted"]);
    }
  }

  #[actix_web::test]
  async fn standalone_image_upload() {
    let setup = Setup::default();
    let storage = setup.storage.clone();
    let state = setup.state();
    let app = test_app!(state);

    let req = multipart_request("/api/upload-image", &[
      Part::File("image", "photo.webp", &[7; 16])
    ]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::OK, resp.status());
    let json: Value = test::read_body_json(resp).await;
    assert_eq!("https://storage.test/contentImages/photo.webp", json["url"]);
    assert_eq!(vec!["contentImages/photo.webp".to_string()], storage.paths());

    let req = multipart_request("/api/upload-image", &[Part::Text("other", "x")]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::BAD_REQUEST, resp.status());
  }

  #[actix_web::test]
  async fn login_outcomes() {
    let state = Setup::default().state();
    add_admin(&state, "admin@example.com", "correct horse");
    let app = test_app!(state);

    let login = |email: &str, password: &str| test::TestRequest::post()
      .uri("/api/login")
      .set_json(json!({ "email": email, "password": password }))
      .to_request();

    let resp = test::call_service(&app, login("admin@example.com", "correct horse")).await;
    assert_eq!(StatusCode::OK, resp.status());

    let resp = test::call_service(&app, login("admin@example.com", "battery staple")).await;
    assert_eq!(StatusCode::UNAUTHORIZED, resp.status());
    let json: Value = test::read_body_json(resp).await;
    assert_eq!("Wrong password", json["message"]);

    let resp = test::call_service(&app, login("nobody@example.com", "correct horse")).await;
    assert_eq!(StatusCode::NOT_FOUND, resp.status());
    let json: Value = test::read_body_json(resp).await;
    assert_eq!("User not found", json["message"]);
  }

  #[actix_web::test]
  async fn login_is_rate_limited() {
    let state = Setup { rl_max_requests: 1, ..Setup::default() }.state();
    add_admin(&state, "admin@example.com", "pw");
    let app = test_app!(state);

    let login = || test::TestRequest::post()
      .uri("/api/login")
      .set_json(json!({ "email": "admin@example.com", "password": "pw" }))
      .to_request();
    let resp = test::call_service(&app, login()).await;
    assert_eq!(StatusCode::OK, resp.status());
    let resp = test::call_service(&app, login()).await;
    assert_eq!(StatusCode::TOO_MANY_REQUESTS, resp.status());
  }

  #[actix_web::test]
  async fn malformed_json_is_bad_request() {
    let state = Setup::default().state();
    let app = test_app!(state);

    let req = test::TestRequest::post()
      .uri("/api/login")
      .insert_header((header::CONTENT_TYPE, "application/json"))
      .set_payload("{not json")
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::BAD_REQUEST, resp.status());
    let json: Value = test::read_body_json(resp).await;
    assert_eq!(false, json["success"]);
  }

  #[actix_web::test]
  async fn visitor_counted_once_per_window() {
    let state = Setup::default().state();
    let app = test_app!(state);

    let visit = || test::TestRequest::post()
      .uri("/api/view")
      .set_json(json!({ "visitor": "v-1" }))
      .to_request();
    for _ in 0..2 {
      let resp = test::call_service(&app, visit()).await;
      assert_eq!(StatusCode::OK, resp.status());
      let json: Value = test::read_body_json(resp).await;
      assert_eq!(1, json["data"]["view"]);
    }

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/getViews").to_request()).await;
    let json: Value = test::read_body_json(resp).await;
    assert_eq!(1, json["content"].as_array().unwrap().len());
    assert_eq!("v-1", json["content"][0]["visitor_id"]);

    let req = test::TestRequest::post()
      .uri("/api/view")
      .set_json(json!({ "visitor": " " }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::BAD_REQUEST, resp.status());
  }

  #[actix_web::test]
  async fn contact_without_relay() {
    let state = Setup::default().state();
    let app = test_app!(state);

    let req = test::TestRequest::post()
      .uri("/api/contact")
      .set_json(json!({ "name": "Jo", "email": "jo@example.com", "message": "Hi" }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::SERVICE_UNAVAILABLE, resp.status());

    let req = test::TestRequest::post()
      .uri("/api/contact")
      .set_json(json!({ "name": "Jo", "email": "nope", "message": "Hi" }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::BAD_REQUEST, resp.status());
  }

  #[actix_web::test]
  async fn contact_through_relay() {
    use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200))
      .expect(1)
      .mount(&server)
      .await;
    let state = Setup {
      contact_relay: Some(ContactRelay::new(&server.uri(), None)),
      ..Setup::default()
    }.state();
    let app = test_app!(state);

    let req = test::TestRequest::post()
      .uri("/api/contact")
      .set_json(json!({ "name": "Jo", "email": "jo@example.com", "subject": "Hey", "message": "Hi" }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(StatusCode::OK, resp.status());
    let json: Value = test::read_body_json(resp).await;
    assert_eq!(true, json["success"]);
  }
}
