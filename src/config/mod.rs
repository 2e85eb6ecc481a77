// Adding the context method to errors:
use eyre::WrapErr;
use color_eyre::Result;
use serde::Deserialize;
use std::convert::From;

#[derive(Debug, Deserialize)]
pub struct Config {
  pub db_path: String,
  pub bind_address: String,
  // Firebase Storage settings:
  pub storage_bucket: String,
  pub storage_api_root: String,
  pub storage_auth_token: Option<String>,
  // Author name used for posts created from
  // Word documents:
  pub word_blog_author: String,
  pub untitled_blog_title: String,
  // Byte ceiling for any single uploaded file.
  pub max_upload_size: usize,
  pub contact_relay_url: Option<String>,
  pub contact_relay_token: Option<String>,
  // Rate limiter settings:
  pub rl_max_requests: u32,
  pub rl_max_requests_time: u32,
  pub rl_block_duration: u32
}

// The handlers don't need the whole config (which has
// tokens in it), this is the part they actually read.
#[derive(Debug, Clone)]
pub struct BlogSettings {
  pub word_blog_author: String,
  pub max_upload_size: usize
}

impl From<&Config> for BlogSettings {
  fn from(config: &Config) -> Self {
    Self {
      word_blog_author: config.word_blog_author.clone(),
      max_upload_size: config.max_upload_size
    }
  }
}

impl Config {

  pub fn from_env() -> Result<Config> {
    // RUST_LOG is already set in main.rs if it
    // was absent.
    // Keys have to be lowercase when compared to
    // what's in the .env file.
    let c = config::Config::builder()
      .set_default("bind_address", "127.0.0.1:8080")?
      .set_default("storage_api_root", "https://firebasestorage.googleapis.com")?
      .set_default("word_blog_author", "Admin")?
      .set_default("untitled_blog_title", "Untitled Blog")?
      // 100 MB, same as the old upload middleware:
      .set_default("max_upload_size", 104_857_600_i64)?
      .set_default("rl_max_requests", 20_i64)?
      .set_default("rl_max_requests_time", 60_i64)?
      .set_default("rl_block_duration", 120_i64)?
      .add_source(config::Environment::default())
      .build()
      .context("Reading configuration sources")?;
    c.try_deserialize()
      .context("Loading configuration from env")
  }

}
