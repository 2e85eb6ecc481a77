#![allow(dead_code)]
mod config;
mod db;
mod utils;

use std::env;
use std::io::{self, BufRead, Write};
use color_eyre::Result;
use eyre::eyre;
use dotenv::dotenv;
use log::info;
use getopts::{Matches, Options};
use crate::config::Config;
use crate::utils::password_utils;

// Copy pasted this from getopts doc.
fn print_usage(program: &str, opts: Options) {
  let brief = format!("Usage: {} [options]", program);
  print!("{}", opts.usage(&brief));
}

fn options() -> Options {
  let mut opts = Options::new();
  opts.optflag("i", "init-schema", "Create the database tables if they don't exist");
  opts.optopt(
    "a",
    "add-admin",
    "Create an admin user with that email, the password is read \
    from ADMIN_PASSWORD or from standard input",
    "EMAIL"
  );
  opts.optflag("h", "help", "Program usage");
  opts
}

enum Operation {
  Help,
  InitSchema,
  AddAdmin { email: String }
}

fn operation(matches: &Matches) -> Result<Operation> {
  if matches.opt_present("h") {
    return Ok(Operation::Help);
  }
  if let Some(email) = matches.opt_str("a") {
    let email = email.trim().to_string();
    if email.is_empty() {
      return Err(eyre!("Admin email cannot be empty"));
    }
    return Ok(Operation::AddAdmin { email });
  }
  if matches.opt_present("i") {
    return Ok(Operation::InitSchema);
  }
  Ok(Operation::Help)
}

// Passwords never go on the command line where ps and the
// shell history would keep them.
fn read_password(from_env: Option<String>, input: &mut impl BufRead) -> Result<String> {
  let password = match from_env {
    Some(password) => password,
    None => {
      eprint!("Password: ");
      io::stderr().flush()?;
      let mut line = String::new();
      input.read_line(&mut line)?;
      line.trim_end_matches(&['\r', '\n'][..]).to_string()
    }
  };
  if password.is_empty() {
    return Err(eyre!("Admin password cannot be empty"));
  }
  Ok(password)
}

/**
 * Operator tool for things the HTTP API doesn't do:
 * creating the schema and the admin users.
 */
fn main() -> Result<()> {
  color_eyre::install()?;
  dotenv().ok();
  if env::var("RUST_LOG").is_err() {
    env::set_var("RUST_LOG", "info");
  }
  env_logger::init();

  let args: Vec<String> = env::args().collect();
  let program = args[0].clone();
  let opts = options();
  let matches = opts.parse(&args[1..])?;

  let operation = operation(&matches)?;
  if let Operation::Help = operation {
    print_usage(&program, opts);
    return Ok(());
  }

  let config = Config::from_env()?;
  let pool = db::open_pool(&config.db_path)?;
  // Creating an admin on a fresh database should just
  // work, so the schema is always there first.
  db::init_schema(&pool)?;
  info!("Schema ready in {}", config.db_path);

  if let Operation::AddAdmin { email } = operation {
    let password = read_password(
      env::var("ADMIN_PASSWORD").ok(),
      &mut io::stdin().lock()
    )?;
    let hash = password_utils::hash_password(&password)?;
    db::insert_admin_user(&pool, &email, &hash)?;
    info!("Admin user {} created", email);
  }
  Ok(())
}
