/*
 * Document Converter: Word document in, title and styled
 * HTML out. Embedded pictures end up in the storage bucket
 * and the HTML points to them.
 */

use std::sync::Arc;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use derive_more::Display;
use lazy_static::lazy_static;
use log::{debug, error};
use regex::Regex;
use crate::storage::{
  generated_object_path,
  StorageClient,
  StorageError,
  CONTENT_IMAGES
};
use html::{Element, Fragment};
pub mod docx;
pub mod html;

pub const DEFAULT_TITLE: &str = "Untitled Blog";
pub const SPACER_PARAGRAPH_STYLE: &str = "min-height:20px;margin-bottom:15px;";
pub const TEXT_PARAGRAPH_STYLE: &str = "font-size:18px;line-height:1.8;margin-bottom:15px;";
pub const LIST_STYLE: &str = "margin-left: 40px; font-size:18px;line-height:1.8;";
// Whatever the picture was, the stored name says png:
const IMAGE_EXTENSION: &str = "png";

lazy_static! {
  static ref DATA_URI_REGEX: Regex = Regex::new(
    r"^data:image/[^;,]+;base64,"
  ).unwrap();
}

#[derive(Debug, Display)]
pub enum ConvertError {
  #[display(fmt = "Could not read document archive: {}", _0)]
  Archive(String),
  #[display(fmt = "Could not parse document XML: {}", _0)]
  Xml(String),
  #[display(fmt = "Invalid embedded image: {}", _0)]
  Image(String),
  #[display(fmt = "Image upload failed: {}", _0)]
  Upload(StorageError)
}

impl std::error::Error for ConvertError {}

impl From<zip::result::ZipError> for ConvertError {
  fn from(e: zip::result::ZipError) -> Self {
    ConvertError::Archive(e.to_string())
  }
}

impl From<std::io::Error> for ConvertError {
  fn from(e: std::io::Error) -> Self {
    ConvertError::Archive(e.to_string())
  }
}

impl From<xml::reader::Error> for ConvertError {
  fn from(e: xml::reader::Error) -> Self {
    ConvertError::Xml(e.to_string())
  }
}

impl From<StorageError> for ConvertError {
  fn from(e: StorageError) -> Self {
    ConvertError::Upload(e)
  }
}

#[derive(Debug, PartialEq)]
pub struct ConvertedDocument {
  pub title: String,
  pub html: String
}

pub struct DocumentConverter {
  storage: Arc<dyn StorageClient>,
  untitled_title: String
}

impl DocumentConverter {

  pub fn new(storage: Arc<dyn StorageClient>, untitled_title: &str) -> Self {
    Self {
      storage,
      untitled_title: untitled_title.to_string()
    }
  }

  // Uploads that went through before a failure stay in the
  // bucket, nothing is rolled back.
  pub async fn convert(&self, bytes: &[u8]) -> Result<ConvertedDocument, ConvertError> {
    let mut fragment = docx::docx_to_fragment(bytes)?;
    let title = extract_title(&mut fragment)
      .unwrap_or_else(|| self.untitled_title.clone());
    style_paragraphs(&mut fragment);
    style_lists(&mut fragment);
    let uploaded = rehost_images(&mut fragment, self.storage.as_ref()).await?;
    debug!("Converted document \"{}\", rehosted {} image(s)", title, uploaded);
    Ok(ConvertedDocument {
      title,
      html: fragment.to_html()
    })
  }

}

// Detaches the first h1. An h1 with nothing but whitespace
// in it still goes away but doesn't count as a title.
pub fn extract_title(fragment: &mut Fragment) -> Option<String> {
  fragment.take_first(|e| e.name == "h1")
    .map(|h1| h1.text_content().trim().to_string())
    .filter(|title| !title.is_empty())
}

pub fn style_paragraphs(fragment: &mut Fragment) {
  fragment.visit_elements_mut(&mut |e: &mut Element| {
    if e.name == "p" {
      if e.text_content().trim().is_empty() {
        e.append_style(SPACER_PARAGRAPH_STYLE);
      } else {
        e.append_style(TEXT_PARAGRAPH_STYLE);
      }
    }
  });
}

pub fn style_lists(fragment: &mut Fragment) {
  fragment.visit_elements_mut(&mut |e: &mut Element| {
    if e.name == "ul" || e.name == "ol" {
      e.append_style(LIST_STYLE);
    }
  });
}

// Can't hold the tree mutably across the uploads, so it's
// three passes: collect and decode the data URIs, upload
// them one by one, then swap the sources in the same
// document order. Returns how many images were uploaded.
pub async fn rehost_images(
  fragment: &mut Fragment,
  storage: &dyn StorageClient
) -> Result<usize, ConvertError> {
  let mut payloads: Vec<Result<Vec<u8>, ConvertError>> = Vec::new();
  fragment.visit_elements(&mut |e: &Element| {
    if let Some(src) = inline_image_source(e) {
      payloads.push(decode_data_uri(src));
    }
  });

  let mut urls = Vec::with_capacity(payloads.len());
  for payload in payloads {
    let bytes = payload?;
    let path = generated_object_path(CONTENT_IMAGES, IMAGE_EXTENSION);
    match storage.upload(&path, bytes).await {
      Ok(url) => urls.push(url),
      Err(e) => {
        error!(
          "Upload of embedded image {} failed after {} successful upload(s) - {}",
          path, urls.len(), e
        );
        return Err(e.into());
      }
    }
  }

  let count = urls.len();
  let mut urls = urls.into_iter();
  fragment.visit_elements_mut(&mut |e: &mut Element| {
    if inline_image_source(e).is_some() {
      if let Some(url) = urls.next() {
        e.set_attribute("src", &url);
      }
    }
  });
  Ok(count)
}

fn inline_image_source(e: &Element) -> Option<&str> {
  if e.name != "img" {
    return None;
  }
  e.attribute("src").filter(|src| DATA_URI_REGEX.is_match(src))
}

fn decode_data_uri(src: &str) -> Result<Vec<u8>, ConvertError> {
  let payload = DATA_URI_REGEX.replace(src, "");
  // Data URIs are allowed to wrap lines.
  let payload: String = payload.chars()
    .filter(|c| !c.is_ascii_whitespace())
    .collect();
  STANDARD.decode(payload)
    .map_err(|e| ConvertError::Image(e.to_string()))
}
