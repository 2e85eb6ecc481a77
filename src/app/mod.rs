use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use actix_web::error::JsonPayloadError;
use color_eyre::Result;
use eyre::WrapErr;
use log::{debug, error, info};
use rate_limiter::BasicRateLimiter;
use contact_relay::ContactRelay;
use std::sync::{Arc, RwLock};
// I think we have to add crate here because
// of the other crate named "config" that we
// use as a dependency.
use crate::config::{BlogSettings, Config};
use crate::convert::DocumentConverter;
use crate::db::{self, Pool};
use crate::storage::{FirebaseStorage, StorageClient};
use error::Error;
mod handlers;
mod dtos;
mod error;
mod helpers;
mod rate_limiter;
mod multipart;
mod contact_relay;

// Same as the body parser limit the old API had.
pub const MAX_JSON_SIZE: usize = 50 * 1024 * 1024;

// Declare app state struct. Every client is built once in
// run() and shared by all the workers.
pub struct AppState {
  pub pool: Pool,
  pub storage: Arc<dyn StorageClient>,
  pub converter: DocumentConverter,
  pub contact_relay: Option<ContactRelay>,
  pub rate_limiter: RwLock<BasicRateLimiter>,
  pub settings: BlogSettings
}

impl AppState {

  // True when the current request has to be refused.
  pub fn check_rate_limit(&self) -> bool {
    let (needs_update, is_locked) = self.rate_limiter_needs_update();
    if needs_update {
      // Get a lock on the rate limiter:
      match self.rate_limiter.write() {
        Ok(mut rl) => return rl.update(),
        Err(e) => {
          error!("Could not get a write handle on the \
          rate limiter, SHOULD NEVER HAPPEN - {}", e);
        }
      }
    }
    is_locked
  }

  // Returns tuple: "needs update" first, then the current
  // is_locked value. A locked limiter only needs an update
  // once the block has expired.
  fn rate_limiter_needs_update(&self) -> (bool, bool) {
    match self.rate_limiter.read() {
      Ok(rl) => (
        !rl.is_locked() || rl.is_expired(),
        rl.is_locked()
      ),
      Err(e) => {
        // I decided to ignore possible weird rate limiter lock
        // errors which should never happen.
        error!("Could not get a read handle on the rate limiter - \
          SHOULD NEVER HAPPEN - {}", e);
        (false, false)
      }
    }
  }

}

// Function to start the server.
// Has to be async because there should be a .await at the end.
pub async fn run() -> Result<()> {
  let config = Config::from_env()
    .context("Configuration (environment or .env file) is missing")?;
  debug!("Current config: {:?}", config);

  let pool = db::open_pool(&config.db_path)?;
  db::init_schema(&pool)?;
  info!("Database ready at {}", config.db_path);

  let storage: Arc<dyn StorageClient> = Arc::new(
    FirebaseStorage::new(
      &config.storage_api_root,
      &config.storage_bucket,
      config.storage_auth_token.clone()
    ).context("Creating storage client")?
  );
  let contact_relay = match &config.contact_relay_url {
    Some(url) => Some(ContactRelay::new(url, config.contact_relay_token.clone())),
    None => {
      info!("No contact relay configured, /api/contact will answer 503");
      None
    }
  };

  let app_state = web::Data::new(
    AppState {
      pool,
      converter: DocumentConverter::new(storage.clone(), &config.untitled_blog_title),
      storage,
      contact_relay,
      rate_limiter: RwLock::new(
        BasicRateLimiter::new(
          config.rl_max_requests,
          config.rl_max_requests_time,
          config.rl_block_duration
        )
      ),
      settings: BlogSettings::from(&config)
    }
  );

  info!("Listening on {}", config.bind_address);
  HttpServer::new(move|| {
    App::new()
      .app_data(app_state.clone())
      .wrap(Cors::permissive())
      .wrap(middleware::Logger::default())
      .configure(api_config)
      .default_service(web::route().to(handlers::not_found))
  })
  .bind(config.bind_address.as_str())?
  .run()
  .await
  .context("Start Actix web server")
}

// Extractor errors get the same JSON envelope as
// everything else.
fn json_config() -> web::JsonConfig {
  web::JsonConfig::default()
    .limit(MAX_JSON_SIZE)
    .error_handler(|err, _| {
      let error = match err {
        JsonPayloadError::Overflow { .. }
        | JsonPayloadError::OverflowKnownLength { .. } =>
          Error::PayloadTooLarge("JSON body is too large".to_string()),
        other => Error::BadRequest(format!("Invalid JSON body - {}", other))
      };
      error.into()
    })
}

// Route configuration:
pub(crate) fn api_config(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api")
      .app_data(json_config())
      .app_data(web::PathConfig::default().error_handler(|_, _| {
        Error::BadRequest("Invalid path arguments".to_string()).into()
      }))
      .route("/ping", web::get().to(handlers::ping))
      .route("/blogposts", web::get().to(handlers::blog_posts))
      .route("/blog", web::post().to(handlers::add_blog_post))
      .route("/wordBlog", web::post().to(handlers::add_word_blog_post))
      .route("/blogposts/{id}/view", web::post().to(handlers::increment_view_count))
      .route("/deleteBlog/{id}", web::delete().to(handlers::delete_blog_post))
      .route("/upload-image", web::post().to(handlers::upload_image))
      .route("/login", web::post().to(handlers::login))
      .route("/view", web::post().to(handlers::record_visit))
      .route("/getViews", web::get().to(handlers::visitors))
      .route("/contact", web::post().to(handlers::contact))
  );
}
