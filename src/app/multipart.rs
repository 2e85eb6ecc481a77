use actix_multipart::Multipart;
use futures::{StreamExt, TryStreamExt};
use std::collections::HashMap;
use super::error::Error;

// Text fields are post bodies at worst, all of them together
// get the same ceiling as JSON bodies.
pub const MAX_TEXT_FIELD_SIZE: usize = 50 * 1024 * 1024;
// No form takes more than a cover image and a document.
pub const MAX_FILES_PER_FORM: usize = 2;

#[derive(Debug)]
pub struct UploadedFile {
  pub file_name: String,
  pub bytes: Vec<u8>
}

// Whole multipart body read into memory. Fields with a
// filename are files, everything else is text. Browsers
// send an empty part for an untouched file input, those
// are dropped.
#[derive(Debug, Default)]
pub struct MultipartForm {
  fields: HashMap<String, String>,
  files: HashMap<String, UploadedFile>
}

impl MultipartForm {

  pub async fn read(mut payload: Multipart, max_file_size: usize) -> Result<Self, Error> {
    let mut form = MultipartForm::default();
    let mut text_left = MAX_TEXT_FIELD_SIZE;
    let mut files_left = max_file_size.saturating_mul(MAX_FILES_PER_FORM);
    while let Some(mut field) = payload.try_next()
      .await
      .map_err(|e| Error::BadRequest(format!("Invalid multipart body - {}", e)))? {
      let disposition = field.content_disposition();
      let name = match disposition.get_name() {
        Some(name) => name.to_string(),
        None => continue
      };
      let file_name = disposition.get_filename().map(String::from);
      // Per field ceiling, capped by what's left of the
      // budget for the whole body.
      let (limit, left) = match file_name {
        Some(_) => (max_file_size.min(files_left), &mut files_left),
        None => (text_left, &mut text_left)
      };

      let mut bytes: Vec<u8> = Vec::new();
      while let Some(chunk) = field.next().await {
        let chunk = chunk
          .map_err(|e| Error::BadRequest(format!("Invalid multipart body - {}", e)))?;
        if bytes.len() + chunk.len() > limit {
          return Err(Error::PayloadTooLarge(
            format!("Field \"{}\" goes over the {} bytes allowed", name, limit)
          ));
        }
        bytes.extend_from_slice(&chunk);
      }
      *left -= bytes.len();

      match file_name {
        Some(file_name) => {
          if !file_name.is_empty() || !bytes.is_empty() {
            form.files.insert(name, UploadedFile { file_name, bytes });
          }
        },
        None => {
          let value = String::from_utf8(bytes)
            .map_err(|_| Error::BadRequest(format!("Field \"{}\" is not valid UTF-8", name)))?;
          form.fields.insert(name, value);
        }
      }
    }
    Ok(form)
  }

  pub fn text(&self, name: &str) -> Option<&str> {
    self.fields.get(name).map(|v| v.as_str())
  }

  pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
    self.files.remove(name)
  }

}
