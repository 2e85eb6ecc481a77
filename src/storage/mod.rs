/*
 * Storage Client: takes a named blob, hands back a public
 * URL. Built once at startup and shared by the handlers and
 * the document converter as an Arc<dyn StorageClient>.
 */

use async_trait::async_trait;
use derive_more::Display;
use rand::Rng;
use crate::utils::time_utils::current_timestamp_millis;
pub mod firebase;
pub use firebase::FirebaseStorage;

pub const COVER_IMAGES: &str = "coverImages";
pub const CONTENT_IMAGES: &str = "contentImages";
// Length of the random suffix for generated names:
const RANDOM_SUFFIX_LEN: usize = 7;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Display)]
pub enum StorageError {
  #[display(fmt = "Storage request failed: {}", _0)]
  Request(String),
  #[display(fmt = "Storage answered with status {}: {}", _0, _1)]
  Status(u16, String),
  #[display(fmt = "Unexpected storage response: {}", _0)]
  Response(String)
}

impl std::error::Error for StorageError {}

#[async_trait]
pub trait StorageClient: Send + Sync {
  async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, StorageError>;
}

// The original file name is used verbatim, two uploads
// with the same name overwrite each other.
pub fn object_path(namespace: &str, file_name: &str) -> String {
  format!("{}/{}", namespace, file_name)
}

// Same as above with a millisecond timestamp in front.
pub fn timestamped_object_path(namespace: &str, file_name: &str) -> String {
  format!("{}/{}_{}", namespace, current_timestamp_millis(), file_name)
}

// Time based prefix plus random suffix, for blobs that
// don't come with a name (images inside documents).
pub fn generated_object_path(namespace: &str, extension: &str) -> String {
  let mut rng = rand::thread_rng();
  let suffix: String = (0..RANDOM_SUFFIX_LEN)
    .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
    .collect();
  format!(
    "{}/{}_{}.{}",
    namespace,
    current_timestamp_millis(),
    suffix,
    extension
  )
}

pub fn content_type_for(path: &str) -> &'static str {
  let extension = path.rsplit('.')
    .next()
    .map(|ext| ext.to_lowercase())
    .unwrap_or_default();
  match extension.as_str() {
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "webp" => "image/webp",
    "svg" => "image/svg+xml",
    "bmp" => "image/bmp",
    _ => "application/octet-stream"
  }
}
