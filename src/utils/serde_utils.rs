// Multipart fields and JSON bodies sometimes carry empty
// strings where we really mean "nothing". I'm doing the
// empty string to None conversion with a plain old
// function instead of a serde attribute.
pub fn empty_string_to_none(value: Option<String>) -> Option<String> {
  match value {
    Some(s) => if s.trim().is_empty()
      { None } else { Some(s) },
    None => None
  }
}
