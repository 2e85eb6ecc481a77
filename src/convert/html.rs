// Minimal HTML tree: elements and text, nothing else.
// The document reader builds it, the converter mutates it
// through the visitor functions and serializes it back.

// Written as <name ...> with no closing tag:
const VOID_ELEMENTS: [&str; 3] = ["br", "hr", "img"];

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
  Element(Element),
  Text(String)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
  pub name: String,
  // Kept in insertion order so the output is stable.
  pub attributes: Vec<(String, String)>,
  pub children: Vec<Node>
}

impl Element {

  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      attributes: Vec::new(),
      children: Vec::new()
    }
  }

  pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
    self.set_attribute(name, value);
    self
  }

  pub fn with_children(mut self, children: Vec<Node>) -> Self {
    self.children = children;
    self
  }

  pub fn attribute(&self, name: &str) -> Option<&str> {
    self.attributes.iter()
      .find(|(n, _)| n == name)
      .map(|(_, v)| v.as_str())
  }

  pub fn set_attribute(&mut self, name: &str, value: &str) {
    match self.attributes.iter_mut().find(|(n, _)| n == name) {
      Some(attribute) => attribute.1 = value.to_string(),
      None => self.attributes.push((name.to_string(), value.to_string()))
    }
  }

  // New declarations go after whatever was already there.
  pub fn append_style(&mut self, style: &str) {
    let current = self.attribute("style").unwrap_or("").to_string();
    self.set_attribute("style", &format!("{}{}", current, style));
  }

  pub fn text_content(&self) -> String {
    let mut text = String::new();
    collect_text(&self.children, &mut text);
    text
  }

}

fn collect_text(nodes: &[Node], text: &mut String) {
  for node in nodes {
    match node {
      Node::Text(t) => text.push_str(t),
      Node::Element(e) => collect_text(&e.children, text)
    }
  }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment {
  pub nodes: Vec<Node>
}

impl Fragment {

  pub fn new(nodes: Vec<Node>) -> Self {
    Self { nodes }
  }

  // Depth-first, document order.
  pub fn visit_elements<F: FnMut(&Element)>(&self, visitor: &mut F) {
    visit(&self.nodes, visitor);
  }

  pub fn visit_elements_mut<F: FnMut(&mut Element)>(&mut self, visitor: &mut F) {
    visit_mut(&mut self.nodes, visitor);
  }

  // Detaches the first element (document order) matching
  // the predicate and hands it back.
  pub fn take_first<P: Fn(&Element) -> bool>(&mut self, predicate: P) -> Option<Element> {
    remove_first(&mut self.nodes, &predicate)
  }

  pub fn to_html(&self) -> String {
    let mut html = String::new();
    for node in &self.nodes {
      write_node(node, &mut html);
    }
    html
  }

}

fn visit<F: FnMut(&Element)>(nodes: &[Node], visitor: &mut F) {
  for node in nodes {
    if let Node::Element(e) = node {
      visitor(e);
      visit(&e.children, visitor);
    }
  }
}

fn visit_mut<F: FnMut(&mut Element)>(nodes: &mut [Node], visitor: &mut F) {
  for node in nodes.iter_mut() {
    if let Node::Element(e) = node {
      visitor(e);
      visit_mut(&mut e.children, visitor);
    }
  }
}

fn remove_first<P: Fn(&Element) -> bool>(
  nodes: &mut Vec<Node>,
  predicate: &P
) -> Option<Element> {
  for i in 0..nodes.len() {
    let matched = match &nodes[i] {
      Node::Element(e) => predicate(e),
      Node::Text(_) => false
    };
    if matched {
      return match nodes.remove(i) {
        Node::Element(e) => Some(e),
        Node::Text(_) => None
      };
    }
    if let Node::Element(e) = &mut nodes[i] {
      if let Some(found) = remove_first(&mut e.children, predicate) {
        return Some(found);
      }
    }
  }
  None
}

fn write_node(node: &Node, html: &mut String) {
  match node {
    Node::Text(text) => html.push_str(&escape_text(text)),
    Node::Element(e) => {
      html.push('<');
      html.push_str(&e.name);
      for (name, value) in &e.attributes {
        html.push_str(&format!(" {}=\"{}\"", name, escape_attribute(value)));
      }
      html.push('>');
      if VOID_ELEMENTS.contains(&e.name.as_str()) {
        return;
      }
      for child in &e.children {
        write_node(child, html);
      }
      html.push_str(&format!("</{}>", e.name));
    }
  }
}

fn escape_text(text: &str) -> String {
  text.replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
  value.replace('&', "&amp;")
    .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
  use super::*;

  fn text(t: &str) -> Node {
    Node::Text(t.to_string())
  }

  fn sample() -> Fragment {
    Fragment::new(vec![
      Node::Element(Element::new("div").with_children(vec![
        Node::Element(Element::new("h1").with_children(vec![text("nested")]))
      ])),
      Node::Element(Element::new("h1").with_children(vec![text("top")])),
      Node::Element(Element::new("p").with_children(vec![
        text("a "),
        Node::Element(Element::new("strong").with_children(vec![text("b")]))
      ]))
    ])
  }

  #[test]
  fn text_content_is_recursive() {
    let fragment = sample();
    match &fragment.nodes[2] {
      Node::Element(p) => assert_eq!("a b", p.text_content()),
      _ => panic!("expected an element")
    }
  }

  #[test]
  fn take_first_is_document_order() {
    let mut fragment = sample();
    let h1 = fragment.take_first(|e| e.name == "h1").unwrap();
    assert_eq!("nested", h1.text_content());
    assert_eq!(
      "<div></div><h1>top</h1><p>a <strong>b</strong></p>",
      fragment.to_html()
    );
  }

  #[test]
  fn visit_in_document_order() {
    let fragment = sample();
    let mut names = Vec::new();
    fragment.visit_elements(&mut |e: &Element| names.push(e.name.clone()));
    assert_eq!(vec!["div", "h1", "h1", "p", "strong"], names);
  }

  #[test]
  fn append_style_keeps_existing() {
    let mut p = Element::new("p").with_attribute("style", "color:red;");
    p.append_style("margin:0;");
    assert_eq!(Some("color:red;margin:0;"), p.attribute("style"));
    let mut q = Element::new("p");
    q.append_style("margin:0;");
    assert_eq!(Some("margin:0;"), q.attribute("style"));
  }

  #[test]
  fn serialize_escapes_and_void_elements() {
    let fragment = Fragment::new(vec![
      Node::Element(Element::new("p").with_children(vec![
        text("1 < 2 & 3 > 2"),
        Node::Element(Element::new("br")),
        Node::Element(
          Element::new("img")
            .with_attribute("src", "https://x/?a=1&b=2")
            .with_attribute("alt", "say \"hi\"")
        )
      ]))
    ]);
    assert_eq!(
      "<p>1 &lt; 2 &amp; 3 &gt; 2<br><img src=\"https://x/?a=1&amp;b=2\" alt=\"say &quot;hi&quot;\"></p>",
      fragment.to_html()
    );
  }
}
