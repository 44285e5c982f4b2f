//! A small owned XML DOM for the reverse path.
//!
//! Descriptor files are read through quick-xml events into a tree of
//! [`XmlNode`]s keyed by *local* tag name — the reverse path matches
//! elements structurally and never cares which namespace prefix a
//! re-exported descriptor happens to use.

use quick_xml::Reader;
use quick_xml::events::Event;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML parse error at position {position}: {message}")]
    Parse { position: u64, message: String },

    #[error("document has no root element")]
    NoRoot,

    #[error("invalid UTF-8 in document: {0}")]
    Utf8(String),
}

/// One element: local tag name, attributes, concatenated text, children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Parse a document and return its root element.
    pub fn parse(input: &str) -> Result<XmlNode, XmlError> {
        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    stack.push(node_from_start(e)?);
                }
                Ok(Event::Empty(ref e)) => {
                    let node = node_from_start(e)?;
                    attach(&mut stack, &mut root, node);
                }
                Ok(Event::Text(ref t)) => {
                    if let Some(top) = stack.last_mut() {
                        let text = t
                            .unescape()
                            .map_err(|e| XmlError::Utf8(e.to_string()))?;
                        top.text.push_str(&text);
                    }
                }
                Ok(Event::CData(ref c)) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(c));
                    }
                }
                Ok(Event::End(_)) => {
                    let node = stack.pop().ok_or(XmlError::NoRoot)?;
                    attach(&mut stack, &mut root, node);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(XmlError::Parse {
                        position: reader.buffer_position(),
                        message: e.to_string(),
                    });
                }
            }
        }
        root.ok_or(XmlError::NoRoot)
    }

    /// Parse a file, tolerating a UTF-8 byte-order mark.
    pub fn parse_file(path: &std::path::Path) -> Result<XmlNode, XmlError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| XmlError::Utf8(format!("{}: {e}", path.display())))?;
        Self::parse(crate::config::strip_bom(&text))
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child with the given local tag.
    pub fn child(&self, tag: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// Text of a direct child, when present and non-empty.
    pub fn child_text(&self, tag: &str) -> Option<&str> {
        self.child(tag).map(|c| c.text.as_str()).filter(|t| !t.is_empty())
    }

    /// Depth-first descendant iterator (excluding `self`).
    pub fn descendants(&self) -> impl Iterator<Item = &XmlNode> {
        let mut queue: Vec<&XmlNode> = self.children.iter().collect();
        std::iter::from_fn(move || {
            let node = queue.pop()?;
            for child in node.children.iter().rev() {
                queue.push(child);
            }
            Some(node)
        })
    }

    /// First descendant with the given local tag, document order.
    pub fn find(&self, tag: &str) -> Option<&XmlNode> {
        if self.tag == tag {
            return Some(self);
        }
        // document order: walk children left to right
        for child in &self.children {
            if let Some(found) = child.find(tag) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants with the given local tag, document order.
    pub fn find_all<'a>(&'a self, tag: &'a str) -> Vec<&'a XmlNode> {
        let mut out = Vec::new();
        fn rec<'a>(node: &'a XmlNode, tag: &str, out: &mut Vec<&'a XmlNode>) {
            if node.tag == tag {
                out.push(node);
            }
            for child in &node.children {
                rec(child, tag, out);
            }
        }
        for child in &self.children {
            rec(child, tag, &mut out);
        }
        out
    }

    /// Multilingual text: `{lang → content}` from `v8:item` entries under
    /// the named child.
    pub fn multilang(&self, tag: &str) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Some(prop) = self.child(tag) {
            for item in prop.find_all("item") {
                if let (Some(lang), Some(content)) = (item.child("lang"), item.child("content")) {
                    out.push((lang.text.clone(), content.text.clone()));
                }
            }
        }
        out
    }
}

fn node_from_start(e: &quick_xml::events::BytesStart<'_>) -> Result<XmlNode, XmlError> {
    let raw = std::str::from_utf8(e.name().as_ref())
        .map_err(|err| XmlError::Utf8(err.to_string()))?
        .to_string();
    let tag = local_name(&raw).to_string();
    let mut attrs = Vec::new();
    for attr in e.attributes().flatten() {
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|err| XmlError::Utf8(err.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|err| XmlError::Utf8(err.to_string()))?;
        attrs.push((local_name(key).to_string(), value.to_string()));
    }
    Ok(XmlNode {
        tag,
        attrs,
        text: String::new(),
        children: Vec::new(),
    })
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if root.is_none() {
                *root = Some(node);
            }
        }
    }
}

fn local_name(qualified: &str) -> &str {
    qualified.rsplit(':').next().unwrap_or(qualified)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<ns:Root xmlns:ns="urn:x" xmlns:v8="urn:y">
  <ns:Properties><ns:Name>MyProc</ns:Name></ns:Properties>
  <v8:item><v8:lang>ru</v8:lang><v8:content>Мой</v8:content></v8:item>
  <Empty/>
</ns:Root>"#;

    #[test]
    fn namespace_prefixes_are_stripped() {
        let root = XmlNode::parse(SAMPLE).unwrap();
        assert_eq!(root.tag, "Root");
        assert_eq!(root.child("Properties").unwrap().child_text("Name"), Some("MyProc"));
        assert!(root.child("Empty").is_some());
    }

    #[test]
    fn find_walks_depth_first() {
        let root = XmlNode::parse(SAMPLE).unwrap();
        assert_eq!(root.find("Name").unwrap().text, "MyProc");
        assert!(root.find("Nothing").is_none());
    }

    #[test]
    fn multilang_items_extract() {
        let xml = r#"<A><Synonym><item><lang>ru</lang><content>Р</content></item>
            <item><lang>en</lang><content>E</content></item></Synonym></A>"#;
        let root = XmlNode::parse(xml).unwrap();
        let ml = root.multilang("Synonym");
        assert_eq!(ml.len(), 2);
        assert_eq!(ml[0], ("ru".to_string(), "Р".to_string()));
    }
}
