mod config;
mod db;
mod utils;
mod storage;
mod convert;
mod app;
use std::env;
use color_eyre::Result;
use dotenv::dotenv;

#[actix_web::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  // Load the .env file before anything reads the
  // environment:
  dotenv().ok();
  // Default log level is info, RUST_LOG wins when
  // it's set.
  if env::var("RUST_LOG").is_err() {
    env::set_var("RUST_LOG", "info");
  }
  env_logger::init();

  app::run().await
}
