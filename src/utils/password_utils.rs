use argon2::password_hash::{
  rand_core::OsRng,
  PasswordHash,
  PasswordHasher,
  PasswordVerifier,
  SaltString
};
use argon2::Argon2;
use color_eyre::Result;
use eyre::eyre;

// Admin passwords are stored as Argon2id PHC strings,
// salt included ("$argon2id$v=19$...").

pub fn hash_password(password: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| eyre!("Could not hash password - {}", e))
}

// Ok(false) means wrong password, an Err means the
// stored hash itself is unusable.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
  let parsed = PasswordHash::new(stored_hash)
    .map_err(|e| eyre!("Stored password hash is malformed - {}", e))?;
  Ok(
    Argon2::default()
      .verify_password(password.as_bytes(), &parsed)
      .is_ok()
  )
}
