use async_trait::async_trait;
use log::{debug, error};
use reqwest::Url;
use serde::Deserialize;
use super::{content_type_for, StorageClient, StorageError};

// Firebase Storage through its REST API. Objects are
// created with a "media" upload and the public URL is the
// same download URL the Firebase SDKs hand out:
// {root}/v0/b/{bucket}/o/{encoded name}?alt=media&token={token}
pub struct FirebaseStorage {
  client: reqwest::Client,
  api_root: Url,
  bucket: String,
  auth_token: Option<String>
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedObject {
  name: String,
  // Can be a comma separated list, first one is fine.
  download_tokens: Option<String>
}

impl FirebaseStorage {

  pub fn new(
    api_root: &str,
    bucket: &str,
    auth_token: Option<String>
  ) -> Result<Self, StorageError> {
    let api_root = Url::parse(api_root)
      .map_err(|e| StorageError::Request(format!("Invalid storage API root - {}", e)))?;
    Ok(Self {
      client: reqwest::Client::new(),
      api_root,
      bucket: bucket.to_string(),
      auth_token
    })
  }

  fn objects_url(&self) -> Result<Url, StorageError> {
    let mut url = self.api_root.clone();
    url.path_segments_mut()
      .map_err(|_| StorageError::Request("Storage API root cannot be a base URL".to_string()))?
      .pop_if_empty()
      .extend(&["v0", "b", self.bucket.as_str(), "o"]);
    Ok(url)
  }

  // push() percent-encodes "/" in the object name, which
  // is what the download URLs need.
  fn download_url(&self, name: &str, token: Option<&str>) -> Result<Url, StorageError> {
    let mut url = self.objects_url()?;
    url.path_segments_mut()
      .map_err(|_| StorageError::Request("Storage API root cannot be a base URL".to_string()))?
      .push(name);
    {
      let mut query = url.query_pairs_mut();
      query.append_pair("alt", "media");
      if let Some(token) = token {
        query.append_pair("token", token);
      }
    }
    Ok(url)
  }

}

#[async_trait]
impl StorageClient for FirebaseStorage {

  async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
    let mut url = self.objects_url()?;
    url.query_pairs_mut()
      .append_pair("uploadType", "media")
      .append_pair("name", path);
    debug!("Uploading {} bytes to {}", bytes.len(), path);

    let mut request = self.client.post(url)
      .header(reqwest::header::CONTENT_TYPE, content_type_for(path))
      .body(bytes);
    if let Some(token) = &self.auth_token {
      request = request.bearer_auth(token);
    }
    let response = request.send()
      .await
      .map_err(|e| StorageError::Request(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      error!("Storage upload of {} failed with status {}", path, status);
      return Err(StorageError::Status(status.as_u16(), body));
    }
    let uploaded: UploadedObject = response.json()
      .await
      .map_err(|e| StorageError::Response(e.to_string()))?;
    let token = uploaded.download_tokens
      .as_deref()
      .and_then(|tokens| tokens.split(',').next())
      .filter(|t| !t.is_empty());
    self.download_url(&uploaded.name, token)
      .map(|url| url.to_string())
  }

}
