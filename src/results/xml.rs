//! Minimal XML element tree
//!
//! Remote testcase records are carried through the runner untouched, so they
//! are kept as generic elements rather than mapped onto fixed structs.

use anyhow::{bail, Context, Result};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Write;

/// XML node
#[derive(Clone, Debug, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
}

/// XML element with ordered attributes and children
#[derive(Clone, Debug, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    #[cfg(test)]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value in place
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |element| element.name == name)
    }

    /// Concatenated text and CDATA directly below this element
    #[cfg(test)]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                XmlNode::Text(text) | XmlNode::CData(text) => Some(text.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    /// Parse a document and return its root element
    pub fn parse(xml: &str) -> Result<XmlElement> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader
                .read_event()
                .with_context(|| format!("invalid XML at byte {}", reader.buffer_position()))?;

            match event {
                Event::Start(start) => stack.push(element_from_start(&start)?),
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().context("unbalanced closing tag")?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().context("invalid XML text")?;
                    if let Some(parent) = stack.last_mut() {
                        if !text.trim().is_empty() {
                            parent.children.push(XmlNode::Text(text.into_owned()));
                        }
                    }
                }
                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                        parent.children.push(XmlNode::CData(text));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            bail!("unclosed element <{}>", open.name);
        }

        root.context("document has no root element")
    }

    /// Write this element and its subtree
    pub fn write_to<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        for child in &self.children {
            match child {
                XmlNode::Element(element) => element.write_to(writer)?,
                XmlNode::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
                // "]]>" cannot live inside a CDATA section, fall back to escaped text
                XmlNode::CData(text) if text.contains("]]>") => {
                    writer.write_event(Event::Text(BytesText::new(text)))?
                }
                XmlNode::CData(text) => {
                    writer.write_event(Event::CData(BytesCData::new(text.as_str())))?
                }
            }
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;

        Ok(())
    }

    /// Serialize as a standalone document with an XML declaration
    pub fn to_document(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        self.write_to(&mut writer)?;

        String::from_utf8(writer.into_inner()).context("serialized XML is not UTF-8")
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()));

    for attribute in start.attributes() {
        let attribute = attribute.context("invalid XML attribute")?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .with_context(|| format!("invalid value for attribute '{key}'"))?;
        element.attributes.push((key, value.into_owned()));
    }

    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => bail!("document has more than one root element"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_document() {
        let xml = r#"<?xml version="1.0"?>
            <testsuite name="Suite" tests="1">
              <testcase name="Suite.A" time="0.5">
                <failure message="expected &lt;1&gt;" type="assertion"/>
                <system-out><![CDATA[raw <html>]]></system-out>
              </testcase>
            </testsuite>"#;

        let root = XmlElement::parse(xml).unwrap();
        assert_eq!(root.name, "testsuite");
        assert_eq!(root.attribute("name"), Some("Suite"));

        let testcase = root.elements_named("testcase").next().unwrap();
        let failure = testcase.elements_named("failure").next().unwrap();
        assert_eq!(failure.attribute("message"), Some("expected <1>"));

        let out = testcase.elements_named("system-out").next().unwrap();
        assert_eq!(out.text(), "raw <html>");
    }

    #[test]
    fn test_written_document_parses_back_to_the_same_tree() {
        let element = XmlElement::new("testsuite")
            .with_attribute("name", "A & B")
            .with_child(
                XmlElement::new("testcase")
                    .with_attribute("name", "A.B")
                    .with_child(XmlElement::new("failure").with_attribute("message", "\"quoted\""))
                    .with_text("trailing <text>"),
            );

        let xml = element.to_document().unwrap();
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#));
        assert_eq!(XmlElement::parse(&xml).unwrap(), element);
    }

    #[test]
    fn test_set_attribute_keeps_position() {
        let mut element = XmlElement::new("testsuite")
            .with_attribute("name", "x")
            .with_attribute("tests", "0");
        element.set_attribute("name", "y");

        assert_eq!(
            element.attributes,
            vec![
                ("name".to_string(), "y".to_string()),
                ("tests".to_string(), "0".to_string())
            ]
        );
    }

    #[test]
    fn test_rejects_broken_documents() {
        assert!(XmlElement::parse("").is_err());
        assert!(XmlElement::parse("<a><b></a>").is_err());
        assert!(XmlElement::parse("<a/><b/>").is_err());
        assert!(XmlElement::parse("<a>").is_err());
    }
}
