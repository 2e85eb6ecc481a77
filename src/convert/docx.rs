// Reads a .docx (zip of OOXML parts) into an HTML fragment.
// Only what the blog needs is mapped: headings, paragraphs,
// bullet/numbered lists, bold, italic, line breaks, links
// and embedded pictures (as base64 data URIs).

use std::collections::HashMap;
use std::io::{Cursor, Read};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use xml::attribute::OwnedAttribute;
use xml::name::OwnedName;
use xml::reader::{EventReader, XmlEvent};
use zip::ZipArchive;
use zip::result::ZipError;
use crate::storage::content_type_for;
use super::ConvertError;
use super::html::{Element, Fragment, Node};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const WP_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const V_NS: &str = "urn:schemas-microsoft-com:vml";

const MC_NS: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";

// Uncompressed bytes read out of one package, all parts
// together.
pub const MAX_UNPACKED_SIZE: u64 = 256 * 1024 * 1024;

const DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";
const NUMBERING_PART: &str = "word/numbering.xml";
const RELS_PART: &str = "word/_rels/document.xml.rels";

#[derive(Debug, Clone, Copy, PartialEq)]
enum ListKind {
  Ordered,
  Unordered
}

impl ListKind {
  fn tag(&self) -> &'static str {
    match self {
      ListKind::Ordered => "ol",
      ListKind::Unordered => "ul"
    }
  }
}

#[derive(Debug, PartialEq)]
enum Inline {
  Text { text: String, bold: bool, italic: bool },
  Break,
  Image { rel_id: String, alt: Option<String> },
  Link { href: String, children: Vec<Inline> }
}

#[derive(Debug, Default)]
struct Paragraph {
  style_id: Option<String>,
  num_id: Option<String>,
  level: u32,
  inlines: Vec<Inline>
}

struct Relationship {
  target: String,
  external: bool
}

// Everything from the package that the body refers to.
struct Package {
  // styleId -> style name
  styles: HashMap<String, String>,
  // numId -> (level -> numFmt)
  numbering: HashMap<String, HashMap<u32, String>>,
  relationships: HashMap<String, Relationship>
}

pub fn docx_to_fragment(bytes: &[u8]) -> Result<Fragment, ConvertError> {
  read_docx(bytes, MAX_UNPACKED_SIZE)
}

fn read_docx(bytes: &[u8], unpacked_budget: u64) -> Result<Fragment, ConvertError> {
  let mut parts = PartReader {
    zip: ZipArchive::new(Cursor::new(bytes))?,
    budget: unpacked_budget
  };
  let document = parts.text(DOCUMENT_PART)?
    .ok_or_else(|| ConvertError::Archive(format!("{} is missing", DOCUMENT_PART)))?;
  let package = Package {
    styles: match parts.text(STYLES_PART)? {
      Some(xml) => parse_styles(&xml)?,
      None => HashMap::new()
    },
    numbering: match parts.text(NUMBERING_PART)? {
      Some(xml) => parse_numbering(&xml)?,
      None => HashMap::new()
    },
    relationships: match parts.text(RELS_PART)? {
      Some(xml) => parse_relationships(&xml)?,
      None => HashMap::new()
    }
  };
  let paragraphs = parse_body(&document)?;
  build_fragment(paragraphs, &package, &mut parts)
}

// Zip entries only say how big they are once inflated, and
// that header can lie. Every read counts against a budget
// for the whole package so a tiny upload can't unpack into
// gigabytes.
struct PartReader<'a> {
  zip: ZipArchive<Cursor<&'a [u8]>>,
  budget: u64
}

impl<'a> PartReader<'a> {

  fn bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>, ConvertError> {
    let file = match self.zip.by_name(name) {
      Ok(file) => file,
      Err(ZipError::FileNotFound) => return Ok(None),
      Err(e) => return Err(e.into())
    };
    let mut contents = Vec::new();
    file.take(self.budget + 1).read_to_end(&mut contents)?;
    let read = contents.len() as u64;
    if read > self.budget {
      return Err(ConvertError::Archive(
        format!("{} unpacks past the size allowed for a document", name)
      ));
    }
    self.budget -= read;
    Ok(Some(contents))
  }

  fn text(&mut self, name: &str) -> Result<Option<String>, ConvertError> {
    match self.bytes(name)? {
      Some(bytes) => String::from_utf8(bytes)
        .map(Some)
        .map_err(|_| ConvertError::Archive(format!("{} is not valid UTF-8", name))),
      None => Ok(None)
    }
  }

}

fn is(name: &OwnedName, namespace: &str, local: &str) -> bool {
  name.local_name == local && name.namespace.as_deref() == Some(namespace)
}

fn attribute<'a>(
  attributes: &'a [OwnedAttribute],
  namespace: &str,
  local: &str
) -> Option<&'a str> {
  attributes.iter()
    .find(|a| is(&a.name, namespace, local))
    .map(|a| a.value.as_str())
}

// Toggle properties like <w:b/> are on unless w:val says
// otherwise.
fn toggle_on(attributes: &[OwnedAttribute]) -> bool {
  !matches!(
    attribute(attributes, W_NS, "val"),
    Some("0") | Some("false") | Some("off") | Some("none")
  )
}

fn parse_styles(xml: &str) -> Result<HashMap<String, String>, ConvertError> {
  let mut styles = HashMap::new();
  let mut current: Option<String> = None;
  for event in EventReader::new(xml.as_bytes()) {
    match event? {
      XmlEvent::StartElement { name, attributes, .. } => {
        if is(&name, W_NS, "style") {
          current = attribute(&attributes, W_NS, "styleId").map(String::from);
        } else if is(&name, W_NS, "name") {
          if let (Some(id), Some(value)) = (&current, attribute(&attributes, W_NS, "val")) {
            styles.insert(id.clone(), value.to_string());
          }
        }
      },
      XmlEvent::EndElement { name } if is(&name, W_NS, "style") => current = None,
      _ => ()
    }
  }
  Ok(styles)
}

fn parse_numbering(xml: &str) -> Result<HashMap<String, HashMap<u32, String>>, ConvertError> {
  let mut abstract_formats: HashMap<String, HashMap<u32, String>> = HashMap::new();
  let mut num_to_abstract: HashMap<String, String> = HashMap::new();
  let mut current_abstract: Option<String> = None;
  let mut current_level: Option<u32> = None;
  let mut current_num: Option<String> = None;
  for event in EventReader::new(xml.as_bytes()) {
    match event? {
      XmlEvent::StartElement { name, attributes, .. } => {
        if is(&name, W_NS, "abstractNum") {
          current_abstract = attribute(&attributes, W_NS, "abstractNumId").map(String::from);
        } else if is(&name, W_NS, "lvl") {
          current_level = attribute(&attributes, W_NS, "ilvl").and_then(|l| l.parse().ok());
        } else if is(&name, W_NS, "numFmt") {
          if let (Some(abstract_id), Some(level), Some(format)) =
            (&current_abstract, current_level, attribute(&attributes, W_NS, "val")) {
            abstract_formats.entry(abstract_id.clone())
              .or_default()
              .insert(level, format.to_string());
          }
        } else if is(&name, W_NS, "num") {
          current_num = attribute(&attributes, W_NS, "numId").map(String::from);
        } else if is(&name, W_NS, "abstractNumId") {
          if let (Some(num_id), Some(abstract_id)) = (&current_num, attribute(&attributes, W_NS, "val")) {
            num_to_abstract.insert(num_id.clone(), abstract_id.to_string());
          }
        }
      },
      XmlEvent::EndElement { name } => {
        if is(&name, W_NS, "abstractNum") {
          current_abstract = None;
        } else if is(&name, W_NS, "lvl") {
          current_level = None;
        } else if is(&name, W_NS, "num") {
          current_num = None;
        }
      },
      _ => ()
    }
  }
  Ok(
    num_to_abstract.into_iter()
      .filter_map(|(num_id, abstract_id)| {
        abstract_formats.get(&abstract_id).map(|formats| (num_id, formats.clone()))
      })
      .collect()
  )
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, Relationship>, ConvertError> {
  let mut relationships = HashMap::new();
  for event in EventReader::new(xml.as_bytes()) {
    if let XmlEvent::StartElement { name, attributes, .. } = event? {
      if name.local_name != "Relationship" {
        continue;
      }
      let value = |key: &str| attributes.iter()
        .find(|a| a.name.local_name == key && a.name.namespace.is_none())
        .map(|a| a.value.clone());
      if let (Some(id), Some(target)) = (value("Id"), value("Target")) {
        let external = value("TargetMode")
          .map(|mode| mode.eq_ignore_ascii_case("external"))
          .unwrap_or(false);
        relationships.insert(id, Relationship { target, external });
      }
    }
  }
  Ok(relationships)
}

// A paragraph being read. Text boxes put whole paragraphs
// inside a run, those come out right after the paragraph
// holding them.
#[derive(Default)]
struct OpenParagraph {
  paragraph: Paragraph,
  link: Option<(String, Vec<Inline>)>,
  nested: Vec<Paragraph>,
  // Run formatting of the enclosing paragraph, put back
  // when this one closes.
  outer_bold: bool,
  outer_italic: bool
}

impl OpenParagraph {

  // Inlines go to the hyperlink being read if there is one.
  // Adjacent runs with the same formatting are merged.
  fn push(&mut self, inline: Inline) {
    let inlines = match &mut self.link {
      Some((_, children)) => children,
      None => &mut self.paragraph.inlines
    };
    if let Inline::Text { text, bold, italic } = &inline {
      if let Some(Inline::Text { text: last, bold: last_bold, italic: last_italic }) = inlines.last_mut() {
        if last_bold == bold && last_italic == italic {
          last.push_str(text);
          return;
        }
      }
    }
    inlines.push(inline);
  }

  // The paragraph itself first, then whatever text boxes
  // it was carrying.
  fn close(mut self) -> Vec<Paragraph> {
    // Unclosed hyperlink, keep its text anyway.
    if let Some((href, children)) = self.link.take() {
      self.paragraph.inlines.push(Inline::Link { href, children });
    }
    let mut done = vec![self.paragraph];
    done.extend(self.nested);
    done
  }

}

fn parse_body(xml: &str) -> Result<Vec<Paragraph>, ConvertError> {
  let mut paragraphs = Vec::new();
  let mut open: Vec<OpenParagraph> = Vec::new();
  let mut in_paragraph_props = false;
  let mut in_run_props = false;
  let mut in_text = false;
  let mut bold = false;
  let mut italic = false;
  let mut drawing_alt: Option<String> = None;
  // Word writes mc:AlternateContent with the same content
  // twice, only the Fallback branch is read.
  let mut choice_depth = 0usize;

  for event in EventReader::new(xml.as_bytes()) {
    let event = event?;
    if choice_depth > 0 {
      match event {
        XmlEvent::StartElement { .. } => choice_depth += 1,
        XmlEvent::EndElement { .. } => choice_depth -= 1,
        _ => ()
      }
      continue;
    }
    match event {
      XmlEvent::StartElement { name, attributes, .. } => {
        if is(&name, MC_NS, "Choice") {
          choice_depth = 1;
          continue;
        }
        if is(&name, W_NS, "p") {
          open.push(OpenParagraph { outer_bold: bold, outer_italic: italic, ..Default::default() });
          continue;
        }
        let current = match open.last_mut() {
          Some(p) => p,
          None => continue
        };
        match (name.namespace.as_deref(), name.local_name.as_str()) {
          (Some(W_NS), "pPr") => in_paragraph_props = true,
          (Some(W_NS), "pStyle") if in_paragraph_props => {
            current.paragraph.style_id = attribute(&attributes, W_NS, "val").map(String::from);
          },
          (Some(W_NS), "numId") if in_paragraph_props => {
            current.paragraph.num_id = attribute(&attributes, W_NS, "val")
              .filter(|id| *id != "0")
              .map(String::from);
          },
          (Some(W_NS), "ilvl") if in_paragraph_props => {
            current.paragraph.level = attribute(&attributes, W_NS, "val")
              .and_then(|l| l.parse().ok())
              .unwrap_or(0);
          },
          (Some(W_NS), "r") => {
            bold = false;
            italic = false;
          },
          (Some(W_NS), "rPr") if !in_paragraph_props => in_run_props = true,
          (Some(W_NS), "b") if in_run_props => bold = toggle_on(&attributes),
          (Some(W_NS), "i") if in_run_props => italic = toggle_on(&attributes),
          (Some(W_NS), "t") => in_text = true,
          (Some(W_NS), "tab") if !in_paragraph_props => {
            current.push(Inline::Text { text: "\t".to_string(), bold, italic });
          },
          (Some(W_NS), "br") => {
            // Page and column breaks have no meaning in a blog post.
            if attribute(&attributes, W_NS, "type").map_or(true, |t| t == "textWrapping") {
              current.push(Inline::Break);
            }
          },
          (Some(W_NS), "hyperlink") => {
            let href = attribute(&attributes, R_NS, "id")
              .map(|id| format!("rel:{}", id))
              .or_else(|| attribute(&attributes, W_NS, "anchor").map(|a| format!("#{}", a)))
              .unwrap_or_default();
            current.link = Some((href, Vec::new()));
          },
          (Some(WP_NS), "docPr") => {
            drawing_alt = attributes.iter()
              .find(|a| a.name.local_name == "descr")
              .map(|a| a.value.trim())
              .filter(|d| !d.is_empty())
              .map(String::from);
          },
          (Some(A_NS), "blip") => {
            if let Some(rel_id) = attribute(&attributes, R_NS, "embed") {
              current.push(Inline::Image {
                rel_id: rel_id.to_string(),
                alt: drawing_alt.clone()
              });
            }
          },
          (Some(V_NS), "imagedata") => {
            if let Some(rel_id) = attribute(&attributes, R_NS, "id") {
              current.push(Inline::Image {
                rel_id: rel_id.to_string(),
                alt: attributes.iter()
                  .find(|a| a.name.local_name == "title")
                  .map(|a| a.value.clone())
              });
            }
          },
          _ => ()
        }
      },
      XmlEvent::Characters(text) | XmlEvent::Whitespace(text) | XmlEvent::CData(text) => {
        if in_text {
          if let Some(current) = open.last_mut() {
            current.push(Inline::Text { text, bold, italic });
          }
        }
      },
      XmlEvent::EndElement { name } => {
        match (name.namespace.as_deref(), name.local_name.as_str()) {
          (Some(W_NS), "p") => {
            if let Some(finished) = open.pop() {
              bold = finished.outer_bold;
              italic = finished.outer_italic;
              let done = finished.close();
              match open.last_mut() {
                Some(outer) => outer.nested.extend(done),
                None => paragraphs.extend(done)
              }
            }
          },
          (Some(W_NS), "pPr") => in_paragraph_props = false,
          (Some(W_NS), "rPr") => in_run_props = false,
          (Some(W_NS), "t") => in_text = false,
          (Some(W_NS), "hyperlink") => {
            if let Some(current) = open.last_mut() {
              if let Some((href, children)) = current.link.take() {
                current.paragraph.inlines.push(Inline::Link { href, children });
              }
            }
          },
          (Some(W_NS), "drawing") => drawing_alt = None,
          _ => ()
        }
      },
      _ => ()
    }
  }
  Ok(paragraphs)
}

fn heading_level(style_id: &str, styles: &HashMap<String, String>) -> Option<usize> {
  let name = styles.get(style_id)
    .map(|s| s.to_lowercase())
    .unwrap_or_else(|| style_id.to_lowercase());
  name.strip_prefix("heading")
    .map(str::trim)
    .and_then(|level| level.parse::<usize>().ok())
    .filter(|level| (1..=6).contains(level))
}

fn list_kind(num_id: &str, level: u32, package: &Package) -> ListKind {
  match package.numbering.get(num_id).and_then(|levels| levels.get(&level)) {
    Some(format) if format == "bullet" => ListKind::Unordered,
    Some(_) => ListKind::Ordered,
    None => ListKind::Unordered
  }
}

// "word/" relative targets, or absolute from the package root.
fn part_path(target: &str) -> String {
  match target.strip_prefix('/') {
    Some(absolute) => absolute.to_string(),
    None => format!("word/{}", target)
  }
}

fn inline_nodes(
  inlines: Vec<Inline>,
  package: &Package,
  parts: &mut PartReader
) -> Result<Vec<Node>, ConvertError> {
  let mut nodes = Vec::new();
  for inline in inlines {
    match inline {
      Inline::Text { text, bold, italic } => {
        let mut node = Node::Text(text);
        if italic {
          node = Node::Element(Element::new("em").with_children(vec![node]));
        }
        if bold {
          node = Node::Element(Element::new("strong").with_children(vec![node]));
        }
        nodes.push(node);
      },
      Inline::Break => nodes.push(Node::Element(Element::new("br"))),
      Inline::Image { rel_id, alt } => {
        let target = match package.relationships.get(&rel_id) {
          Some(rel) if !rel.external => part_path(&rel.target),
          // Linked (not embedded) pictures have no bytes here.
          _ => continue
        };
        if let Some(bytes) = parts.bytes(&target)? {
          let src = format!("data:{};base64,{}", content_type_for(&target), STANDARD.encode(bytes));
          let mut img = Element::new("img").with_attribute("src", &src);
          if let Some(alt) = alt {
            img.set_attribute("alt", &alt);
          }
          nodes.push(Node::Element(img));
        }
      },
      Inline::Link { href, children } => {
        let href = match href.strip_prefix("rel:") {
          Some(rel_id) => package.relationships.get(rel_id)
            .map(|rel| rel.target.clone())
            .unwrap_or_default(),
          None => href
        };
        let children = inline_nodes(children, package, parts)?;
        if href.is_empty() {
          nodes.extend(children);
        } else {
          nodes.push(Node::Element(
            Element::new("a").with_attribute("href", &href).with_children(children)
          ));
        }
      }
    }
  }
  Ok(nodes)
}

// Closes the innermost open list: it goes into the last
// item of its parent list, or to the output at the top.
fn close_list(stack: &mut Vec<(u32, ListKind, Element)>, output: &mut Vec<Node>) {
  if let Some((_, _, list)) = stack.pop() {
    let list = Node::Element(list);
    match stack.last_mut() {
      Some((_, _, parent)) => match parent.children.last_mut() {
        Some(Node::Element(item)) => item.children.push(list),
        _ => parent.children.push(list)
      },
      None => output.push(list)
    }
  }
}

fn build_fragment(
  paragraphs: Vec<Paragraph>,
  package: &Package,
  parts: &mut PartReader
) -> Result<Fragment, ConvertError> {
  let mut output: Vec<Node> = Vec::new();
  let mut lists: Vec<(u32, ListKind, Element)> = Vec::new();

  for paragraph in paragraphs {
    let children = inline_nodes(paragraph.inlines, package, parts)?;
    let heading = paragraph.style_id.as_deref()
      .and_then(|style| heading_level(style, &package.styles));

    match (&paragraph.num_id, heading) {
      (Some(num_id), None) => {
        let level = paragraph.level;
        let kind = list_kind(num_id, level, package);
        while lists.last().map_or(false, |(l, _, _)| *l > level) {
          close_list(&mut lists, &mut output);
        }
        if lists.last().map_or(false, |(l, k, _)| *l == level && *k != kind) {
          close_list(&mut lists, &mut output);
        }
        if lists.last().map_or(true, |(l, _, _)| *l < level) {
          lists.push((level, kind, Element::new(kind.tag())));
        }
        if let Some((_, _, list)) = lists.last_mut() {
          list.children.push(Node::Element(Element::new("li").with_children(children)));
        }
      },
      _ => {
        while !lists.is_empty() {
          close_list(&mut lists, &mut output);
        }
        let tag = match heading {
          Some(level) => format!("h{}", level),
          None => "p".to_string()
        };
        output.push(Node::Element(Element::new(&tag).with_children(children)));
      }
    }
  }
  while !lists.is_empty() {
    close_list(&mut lists, &mut output);
  }
  Ok(Fragment::new(output))
}
