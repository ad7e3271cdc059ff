//! Bounded-memory reading of large XML evidence documents.
//!
//! A [`SubtreeReader`] walks the document with a pull parser and only
//! materializes the subtrees rooted at the configured "record" tags. Every
//! record is handed out as an owned [`XmlNode`] and the reader keeps nothing
//! of it afterwards, so memory stays bounded by the largest single record
//! (one scan, one protein group ...) rather than by the document.

use crate::errors::EvidenceReadingError;
use quick_xml::Reader;
use quick_xml::events::{
    BytesStart,
    Event,
};
use std::collections::HashSet;
use std::io::{
    BufRead,
    BufReader,
};
use std::path::Path;
use std::str::FromStr;

/// Owned element with its attributes, children and concatenated text.
///
/// Names are local names, namespace prefixes are dropped.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub text: String,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn require_attr(&self, key: &str) -> Result<&str, EvidenceReadingError> {
        self.attr(key)
            .ok_or_else(|| EvidenceReadingError::MissingAttribute {
                element: self.name.clone(),
                attribute: key.to_string(),
            })
    }

    /// Parses an optional attribute. A present but unparsable value is an error.
    pub fn parse_attr<T: FromStr>(&self, key: &str) -> Result<Option<T>, EvidenceReadingError> {
        match self.attr(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
                EvidenceReadingError::InvalidValue {
                    field: format!("{}@{}", self.name, key),
                    value: raw.to_string(),
                }
            }),
        }
    }

    pub fn require_parsed<T: FromStr>(&self, key: &str) -> Result<T, EvidenceReadingError> {
        self.parse_attr(key)?
            .ok_or_else(|| EvidenceReadingError::MissingAttribute {
                element: self.name.clone(),
                attribute: key.to_string(),
            })
    }

    /// First direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First node with the given name in depth-first order, excluding self.
    pub fn find(&self, name: &str) -> Option<&XmlNode> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// Every node with the given name in depth-first order, excluding self.
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a XmlNode> {
        let mut out = Vec::new();
        self.collect_named(name, &mut out);
        out
    }

    fn collect_named<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlNode>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.collect_named(name, out);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlStreamEvent {
    /// A watched container element was opened. Only its attributes are filled.
    Opened(XmlNode),
    /// A complete record subtree.
    Record(XmlNode),
}

pub struct SubtreeReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    open_tags: HashSet<String>,
    record_tags: HashSet<String>,
    // Partially built record, outermost first.
    building: Vec<XmlNode>,
    // Names of every currently open element.
    open_path: Vec<String>,
    finished: bool,
}

impl SubtreeReader<BufReader<std::fs::File>> {
    pub fn from_path(
        path: &Path,
        open_tags: &[&str],
        record_tags: &[&str],
    ) -> Result<Self, EvidenceReadingError> {
        let file =
            std::fs::File::open(path).map_err(|e| EvidenceReadingError::io_at(e, path))?;
        Ok(Self::new(BufReader::new(file), open_tags, record_tags))
    }
}

impl<R: BufRead> SubtreeReader<R> {
    pub fn new(inner: R, open_tags: &[&str], record_tags: &[&str]) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            open_tags: open_tags.iter().map(|x| x.to_string()).collect(),
            record_tags: record_tags.iter().map(|x| x.to_string()).collect(),
            building: Vec::new(),
            open_path: Vec::new(),
            finished: false,
        }
    }

    /// Byte offset of the parser in the underlying input.
    pub fn position(&self) -> u64 {
        self.reader.buffer_position()
    }

    fn next_event(&mut self) -> Result<Option<XmlStreamEvent>, EvidenceReadingError> {
        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(source) => {
                    return Err(EvidenceReadingError::Xml {
                        source,
                        position: self.reader.buffer_position(),
                    });
                }
            };
            match event {
                Event::Start(e) => {
                    let node = node_from_start(&e);
                    self.open_path.push(node.name.clone());
                    if !self.building.is_empty() || self.record_tags.contains(&node.name) {
                        self.building.push(node);
                    } else if self.open_tags.contains(&node.name) {
                        return Ok(Some(XmlStreamEvent::Opened(node)));
                    }
                }
                Event::Empty(e) => {
                    let node = node_from_start(&e);
                    if let Some(parent) = self.building.last_mut() {
                        parent.children.push(node);
                    } else if self.record_tags.contains(&node.name) {
                        return Ok(Some(XmlStreamEvent::Record(node)));
                    } else if self.open_tags.contains(&node.name) {
                        return Ok(Some(XmlStreamEvent::Opened(node)));
                    }
                }
                Event::End(_) => {
                    self.open_path.pop();
                    if let Some(node) = self.building.pop() {
                        match self.building.last_mut() {
                            Some(parent) => parent.children.push(node),
                            None => return Ok(Some(XmlStreamEvent::Record(node))),
                        }
                    }
                }
                Event::Text(e) => {
                    if let Some(current) = self.building.last_mut() {
                        let text = e
                            .unescape()
                            .map(|x| x.into_owned())
                            .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                        current.text.push_str(&text);
                    }
                }
                Event::CData(e) => {
                    if let Some(current) = self.building.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Event::Eof => {
                    return match self.open_path.pop() {
                        Some(open_element) => {
                            Err(EvidenceReadingError::UnexpectedEof { open_element })
                        }
                        None => Ok(None),
                    };
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for SubtreeReader<R> {
    type Item = Result<XmlStreamEvent, EvidenceReadingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let out = self.next_event().transpose();
        if !matches!(out, Some(Ok(_))) {
            self.finished = true;
        }
        out
    }
}

fn node_from_start(e: &BytesStart) -> XmlNode {
    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let attributes = e
        .attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            (key, value)
        })
        .collect();
    XmlNode {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    }
}
