// String::truncate panics when cutting a multibyte
// char in half, this walks back to the nearest
// char boundary first.
pub fn truncate_utf8(s: &mut String, max_bytes: usize) {
  if s.len() <= max_bytes {
    return;
  }
  let mut index = max_bytes;
  while !s.is_char_boundary(index) {
    index -= 1;
  }
  s.truncate(index);
}

pub fn escape_html(s: &str) -> String {
  let mut escaped = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      '"' => escaped.push_str("&quot;"),
      '\'' => escaped.push_str("&#39;"),
      _ => escaped.push(c)
    }
  }
  escaped
}
