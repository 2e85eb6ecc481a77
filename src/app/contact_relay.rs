use derive_more::Display;
use log::{debug, error};
use serde::Serialize;
use crate::utils::text_utils;

const MAX_NAME_LENGTH: usize = 100;
const MAX_EMAIL_LENGTH: usize = 254;
const MAX_SUBJECT_LENGTH: usize = 200;
const MAX_MESSAGE_LENGTH: usize = 5000;

#[derive(Debug, Display)]
pub enum RelayError {
  #[display(fmt = "Relay request failed: {}", _0)]
  Request(String),
  #[display(fmt = "Relay answered with status {}", _0)]
  Status(u16)
}

impl std::error::Error for RelayError {}

// What gets forwarded. Everything has already been
// truncated and HTML escaped, the relay puts it in an
// email body as-is.
#[derive(Debug, Serialize, PartialEq)]
pub struct ContactMessage {
  pub name: String,
  pub email: String,
  pub subject: String,
  pub message: String
}

impl ContactMessage {

  // Returns what's wrong with the input when it can't be
  // sent.
  pub fn new(
    mut name: String,
    mut email: String,
    subject: Option<String>,
    mut message: String
  ) -> Result<Self, String> {
    text_utils::truncate_utf8(&mut name, MAX_NAME_LENGTH);
    text_utils::truncate_utf8(&mut email, MAX_EMAIL_LENGTH);
    text_utils::truncate_utf8(&mut message, MAX_MESSAGE_LENGTH);
    let mut subject = subject.unwrap_or_default();
    text_utils::truncate_utf8(&mut subject, MAX_SUBJECT_LENGTH);

    let (name, email, message) = (name.trim(), email.trim(), message.trim());
    if name.is_empty() || message.is_empty() {
      return Err("Name and message cannot be empty".to_string());
    }
    if !email.contains('@') {
      return Err("Invalid email address".to_string());
    }
    Ok(Self {
      name: text_utils::escape_html(name),
      email: text_utils::escape_html(email),
      subject: text_utils::escape_html(subject.trim()),
      message: text_utils::escape_html(message)
    })
  }

}

pub struct ContactRelay {
  client: reqwest::Client,
  url: String,
  token: Option<String>
}

impl ContactRelay {

  pub fn new(url: &str, token: Option<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      url: url.to_string(),
      token
    }
  }

  pub async fn send(&self, message: &ContactMessage) -> Result<(), RelayError> {
    let mut request = self.client.post(&self.url).json(message);
    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }
    let response = request.send()
      .await
      .map_err(|e| RelayError::Request(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
      error!("Contact relay refused message with status {}", status);
      return Err(RelayError::Status(status.as_u16()));
    }
    debug!("Contact message from {} relayed", message.email);
    Ok(())
  }

}
