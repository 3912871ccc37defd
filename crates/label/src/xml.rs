//! XML forms of the label tree.
//!
//! [`emit`]/[`parse`] use a fixed schema that round-trips every tree:
//!
//! ```xml
//! <Label>
//!   <Object name="IsisCube">
//!     <Group name="Dimensions">
//!       <Keyword name="Samples"><Value>32</Value></Keyword>
//!     </Group>
//!   </Object>
//! </Label>
//! ```
//!
//! [`from_generic_xml`] turns an arbitrary XML document (a PDS4 label, say)
//! into a tree: elements with element children become objects, leaf elements
//! become keywords carrying their `unit` attribute.

use crate::tree::{Container, Keyword, Node, Value};
use cube_common::{CubeError, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

fn xml_err(e: quick_xml::Error) -> CubeError {
    CubeError::parse(format!("XML error: {e}"))
}

// ============================================================================
// Emission
// ============================================================================

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<()> {
    match node {
        Node::Keyword(k) => {
            let start = BytesStart::new("Keyword").with_attributes([("name", k.name.as_str())]);
            writer.write_event(Event::Start(start)).map_err(xml_err)?;
            for c in &k.comments {
                writer
                    .write_event(Event::Start(BytesStart::new("Comment")))
                    .map_err(xml_err)?;
                writer.write_event(Event::Text(BytesText::new(c))).map_err(xml_err)?;
                writer.write_event(Event::End(BytesEnd::new("Comment"))).map_err(xml_err)?;
            }
            for v in &k.values {
                let mut start = BytesStart::new("Value");
                if let Some(u) = &v.unit {
                    start.push_attribute(("unit", u.as_str()));
                }
                if v.quoted {
                    start.push_attribute(("quoted", "true"));
                }
                writer.write_event(Event::Start(start)).map_err(xml_err)?;
                writer.write_event(Event::Text(BytesText::new(&v.text))).map_err(xml_err)?;
                writer.write_event(Event::End(BytesEnd::new("Value"))).map_err(xml_err)?;
            }
            writer.write_event(Event::End(BytesEnd::new("Keyword"))).map_err(xml_err)?;
        }
        Node::Group(c) | Node::Object(c) => {
            let tag = if matches!(node, Node::Group(_)) { "Group" } else { "Object" };
            let start = BytesStart::new(tag).with_attributes([("name", c.name.as_str())]);
            writer.write_event(Event::Start(start)).map_err(xml_err)?;
            write_children(writer, c)?;
            writer.write_event(Event::End(BytesEnd::new(tag))).map_err(xml_err)?;
        }
    }
    Ok(())
}

fn write_children(writer: &mut Writer<Vec<u8>>, container: &Container) -> Result<()> {
    for c in &container.comments {
        writer
            .write_event(Event::Start(BytesStart::new("Comment")))
            .map_err(xml_err)?;
        writer.write_event(Event::Text(BytesText::new(c))).map_err(xml_err)?;
        writer.write_event(Event::End(BytesEnd::new("Comment"))).map_err(xml_err)?;
    }
    for node in container.children() {
        write_node(writer, node)?;
    }
    Ok(())
}

/// Emit the tree in the label XML schema.
pub fn emit(root: &Container) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;
    let start = BytesStart::new("Label").with_attributes([("name", root.name.as_str())]);
    writer.write_event(Event::Start(start)).map_err(xml_err)?;
    write_children(&mut writer, root)?;
    writer.write_event(Event::End(BytesEnd::new("Label"))).map_err(xml_err)?;
    String::from_utf8(writer.into_inner()).map_err(|e| CubeError::parse(e.to_string()))
}

// ============================================================================
// Parsing
// ============================================================================

fn attribute(e: &BytesStart, key: &str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| CubeError::parse(format!("XML attribute error: {e}")))?;
        if attr.key.as_ref() == key.as_bytes() {
            let value = attr.unescape_value().map_err(xml_err)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

enum Open {
    Container { container: Container, group: bool },
    Keyword(Keyword),
    Value(Value),
    Comment(String),
}

/// Parse the label XML schema produced by [`emit`].
pub fn parse(text: &str) -> Result<Container> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut stack: Vec<Open> = Vec::new();
    let mut root: Option<Container> = None;

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(ref e) => {
                let name = attribute(e, "name")?.unwrap_or_default();
                let open = match e.name().as_ref() {
                    b"Label" => Open::Container {
                        container: Container::new(if name.is_empty() { "Root".to_string() } else { name }),
                        group: false,
                    },
                    b"Object" => Open::Container {
                        container: Container::new(name),
                        group: false,
                    },
                    b"Group" => Open::Container {
                        container: Container::new(name),
                        group: true,
                    },
                    b"Keyword" => Open::Keyword(Keyword::empty(name)),
                    b"Value" => Open::Value(Value {
                        text: String::new(),
                        unit: attribute(e, "unit")?,
                        quoted: attribute(e, "quoted")?.as_deref() == Some("true"),
                    }),
                    b"Comment" => Open::Comment(String::new()),
                    other => {
                        return Err(CubeError::parse(format!(
                            "unexpected element <{}> in label XML",
                            String::from_utf8_lossy(other)
                        )))
                    }
                };
                stack.push(open);
            }
            Event::Empty(ref e) => {
                if e.name().as_ref() == b"Value" {
                    let value = Value {
                        text: String::new(),
                        unit: attribute(e, "unit")?,
                        quoted: true,
                    };
                    if let Some(Open::Keyword(k)) = stack.last_mut() {
                        k.values.push(value);
                    }
                }
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(xml_err)?.into_owned();
                match stack.last_mut() {
                    Some(Open::Value(v)) => v.text.push_str(&text),
                    Some(Open::Comment(c)) => c.push_str(&text),
                    _ => {}
                }
            }
            Event::End(_) => {
                let done = stack
                    .pop()
                    .ok_or_else(|| CubeError::parse("unbalanced label XML"))?;
                match (done, stack.last_mut()) {
                    (Open::Value(v), Some(Open::Keyword(k))) => k.values.push(v),
                    (Open::Comment(c), Some(Open::Keyword(k))) => k.comments.push(c),
                    (Open::Comment(c), Some(Open::Container { container, .. })) => {
                        container.comments.push(c)
                    }
                    (Open::Keyword(k), Some(Open::Container { container, .. })) => container.add_keyword(k),
                    (Open::Container { container: c, group }, Some(Open::Container { container, .. })) => {
                        if group {
                            container.add_group(c)
                        } else {
                            container.add_object(c)
                        }
                    }
                    (Open::Container { container, .. }, None) => root = Some(container),
                    _ => return Err(CubeError::parse("misplaced element in label XML")),
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    root.ok_or_else(|| CubeError::parse("label XML has no <Label> element"))
}

// ============================================================================
// Generic XML
// ============================================================================

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn from_start(e: &BytesStart) -> Result<Self> {
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| CubeError::parse(format!("XML attribute error: {e}")))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            if key == "xmlns" || attr.key.as_ref().starts_with(b"xmlns:") {
                continue;
            }
            let value = attr.unescape_value().map_err(xml_err)?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name: local_name(e),
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    fn into_node(self) -> Node {
        if self.children.is_empty() {
            let mut value = Value::new(self.text.trim());
            let mut extra = Vec::new();
            for (k, v) in self.attributes {
                if k == "unit" {
                    value.unit = Some(v);
                } else {
                    extra.push(k);
                }
            }
            let mut keyword = Keyword::new(self.name, value);
            keyword.comments.extend(extra.into_iter().map(|k| format!("attribute {k}")));
            Node::Keyword(keyword)
        } else {
            let mut container = Container::new(self.name);
            for (k, v) in self.attributes {
                container.add_keyword(Keyword::new(k, v));
            }
            for child in self.children {
                match child.into_node() {
                    Node::Keyword(k) => container.add_keyword(k),
                    Node::Object(o) | Node::Group(o) => container.add_object(o),
                }
            }
            Node::Object(container)
        }
    }
}

/// Convert any XML document into a label tree rooted at a container holding
/// the document element as an object. Namespace prefixes are dropped.
pub fn from_generic_xml(text: &str) -> Result<Container> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut document: Option<Element> = None;

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(ref e) => stack.push(Element::from_start(e)?),
            Event::Empty(ref e) => {
                let element = Element::from_start(e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => document = Some(element),
                }
            }
            Event::Text(e) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&e.unescape().map_err(xml_err)?);
                }
            }
            Event::CData(e) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(_) => {
                let done = stack.pop().ok_or_else(|| CubeError::parse("unbalanced XML"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(done),
                    None => document = Some(done),
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let document = document.ok_or_else(|| CubeError::parse("XML document has no root element"))?;
    let mut root = Container::root();
    match document.into_node() {
        Node::Object(o) | Node::Group(o) => root.add_object(o),
        Node::Keyword(k) => root.add_keyword(k),
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Traverse;

    #[test]
    fn test_xml_round_trip() {
        let mut pixels = Container::new("Pixels");
        pixels.add_keyword(Keyword::new("Type", "Real"));
        let mut k = Keyword::with_unit("Radii", "3396.19", "km");
        k.add_value(Value::with_unit("3376.2", "km"));
        k.add_comment("equatorial & polar");
        pixels.add_keyword(k);

        let mut core = Container::new("Core");
        core.add_group(pixels);
        let mut root = Container::root();
        root.add_object(core);

        let xml = emit(&root).unwrap();
        assert!(xml.contains("<Group name=\"Pixels\">"));
        let back = parse(&xml).unwrap();
        assert_eq!(back, root);
    }

    #[test]
    fn test_generic_pds4() {
        let doc = r#"<?xml version="1.0"?>
<Product_Observational xmlns="http://pds.nasa.gov/pds4/pds/v1">
  <File_Area_Observational>
    <File><file_name>image.img</file_name></File>
    <Array_2D_Image>
      <offset unit="byte">0</offset>
      <Axis_Array><axis_name>Line</axis_name><elements>4</elements></Axis_Array>
      <Axis_Array><axis_name>Sample</axis_name><elements>8</elements></Axis_Array>
    </Array_2D_Image>
  </File_Area_Observational>
</Product_Observational>"#;
        let root = from_generic_xml(doc).unwrap();
        let image = root.object("Array_2D_Image", Traverse::DepthFirst).unwrap();
        let offset = image.keyword("offset", Traverse::CurrentLevel).unwrap();
        assert_eq!(offset.unit(0).unwrap(), Some("byte"));
        let axes: Vec<_> = image.objects_named("Axis_Array").collect();
        assert_eq!(axes.len(), 2);
        assert_eq!(axes[1].keyword_value("elements", Traverse::CurrentLevel).unwrap(), "8");
        assert_eq!(root.keyword_value("file_name", Traverse::DepthFirst).unwrap(), "image.img");
    }

    #[test]
    fn test_bad_xml_is_parse_error() {
        let err = parse("<Label><Nope></Nope></Label>").unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::Parse);
    }
}
