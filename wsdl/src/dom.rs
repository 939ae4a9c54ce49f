//! A small owned XML tree.
//!
//! Every document loaded for one WSDL (the WSDL itself and each imported
//! schema) is parsed into the same [`Tree`], so a [`NodeId`] identifies a tag
//! uniquely across all of them.

use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};
use std::fmt;

use lather_util::xml::{
    into_string, split_qualified_name, write_end, write_start, write_text, Writer,
};

use super::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct NodeData {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    text: String,
    self_closing: bool,
}

#[derive(Debug, Default, Clone)]
pub struct Tree {
    nodes: Vec<NodeData>,
}

/// Borrowed view of one element in a [`Tree`].
#[derive(Clone, Copy)]
pub struct Node<'t> {
    tree: &'t Tree,
    id: NodeId,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses one document into the tree and returns its root element.
    pub fn parse(&mut self, text: &str) -> Result<NodeId, Error> {
        let mut reader = Reader::from_str(text);
        let mut stack = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    let id = self.handle_start(&stack, &start, false)?;
                    root.get_or_insert(id);
                    stack.push(id);
                }

                Event::Empty(start) => {
                    let id = self.handle_start(&stack, &start, true)?;
                    root.get_or_insert(id);
                }

                Event::End(..) => {
                    stack.pop();
                }

                Event::Text(text) => self.handle_text(&stack, &text.unescape()?),

                Event::CData(data) => {
                    let data = data.into_inner();
                    self.handle_text(&stack, std::str::from_utf8(&data)?)
                }

                Event::Eof => break,

                _ => (),
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::UnclosedElement(self.nodes[open.0].name.clone()));
        }

        root.ok_or(Error::EmptyDocument)
    }

    pub fn node(&self, id: NodeId) -> Node<'_> {
        Node { tree: self, id }
    }

    fn handle_start(
        &mut self,
        stack: &[NodeId],
        start: &BytesStart<'_>,
        self_closing: bool,
    ) -> Result<NodeId, Error> {
        let name = std::str::from_utf8(start.name().as_ref())?.to_owned();

        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(quick_xml::Error::from)?;
            let key = std::str::from_utf8(attribute.key.as_ref())?.to_owned();
            let value = attribute.unescape_value()?.into_owned();
            attributes.push((key, value));
        }

        let id = NodeId(self.nodes.len());
        let parent = stack.last().copied();

        self.nodes.push(NodeData {
            name,
            attributes,
            children: Vec::new(),
            parent,
            text: String::new(),
            self_closing,
        });

        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }

        Ok(id)
    }

    fn handle_text(&mut self, stack: &[NodeId], text: &str) {
        if text.trim().is_empty() {
            return;
        }

        if let Some(current) = stack.last() {
            self.nodes[current.0].text.push_str(text);
        }
    }
}

impl<'t> Node<'t> {
    fn data(self) -> &'t NodeData {
        &self.tree.nodes[self.id.0]
    }

    pub fn id(self) -> NodeId {
        self.id
    }

    pub fn tree(self) -> &'t Tree {
        self.tree
    }

    /// The tag name as written, including any prefix.
    pub fn name(self) -> &'t str {
        &self.data().name
    }

    pub fn local_name(self) -> &'t str {
        split_qualified_name(self.name()).1
    }

    pub fn prefix(self) -> Option<&'t str> {
        split_qualified_name(self.name()).0
    }

    pub fn attribute(self, name: &str) -> Option<&'t str> {
        self.data()
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attributes(self) -> impl Iterator<Item = (&'t str, &'t str)> {
        self.data()
            .attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Concatenated text and CDATA directly inside this element.
    pub fn text(self) -> &'t str {
        &self.data().text
    }

    /// Whether the element was written as `<tag/>`.
    pub fn is_self_closing(self) -> bool {
        self.data().self_closing
    }

    pub fn parent(self) -> Option<Node<'t>> {
        let tree = self.tree;
        self.data().parent.map(|id| Node { tree, id })
    }

    pub fn children(self) -> impl Iterator<Item = Node<'t>> {
        let tree = self.tree;
        self.data().children.iter().map(move |&id| Node { tree, id })
    }

    /// Direct children with the given local name, whatever their prefix.
    pub fn children_named<'a>(self, local_name: &'a str) -> impl Iterator<Item = Node<'t>> + 'a
    where
        't: 'a,
    {
        self.children()
            .filter(move |child| child.local_name() == local_name)
    }

    pub fn first_child_named(self, local_name: &str) -> Option<Node<'t>> {
        self.children().find(|child| child.local_name() == local_name)
    }

    /// All descendants with the given local name, in document order.
    pub fn descendants_named(self, local_name: &str) -> Vec<Node<'t>> {
        let mut found = Vec::new();
        self.collect_descendants(local_name, &mut found);
        found
    }

    fn collect_descendants(self, local_name: &str, found: &mut Vec<Node<'t>>) {
        for child in self.children() {
            if child.local_name() == local_name {
                found.push(child);
            }
            child.collect_descendants(local_name, found);
        }
    }

    /// Resolves `prefix` (or the default namespace for `None`) against the
    /// declarations in scope at this element.
    pub fn lookup_namespace(self, prefix: Option<&str>) -> Option<&'t str> {
        let key = match prefix {
            Some("xml") => return Some("http://www.w3.org/XML/1998/namespace"),
            Some(prefix) => format!("xmlns:{}", prefix),
            None => "xmlns".to_owned(),
        };

        let mut current = Some(self);
        while let Some(node) = current {
            if let Some(uri) = node.attribute(&key) {
                return Some(uri);
            }
            current = node.parent();
        }

        None
    }

    /// Serialises this element and its descendants. Text is written before
    /// child elements.
    pub fn to_xml(self) -> Result<String, Error> {
        let mut writer = Writer::new(Vec::new());
        self.write_xml(&mut writer)?;
        Ok(into_string(writer)?)
    }

    fn write_xml(self, writer: &mut Writer<Vec<u8>>) -> Result<(), Error> {
        let data = self.data();
        let empty = data.children.is_empty() && data.text.is_empty();

        write_start(writer, &data.name, self.attributes(), empty)?;
        if empty {
            return Ok(());
        }

        if !data.text.is_empty() {
            write_text(writer, &data.text)?;
        }
        for child in self.children() {
            child.write_xml(writer)?;
        }
        write_end(writer, &data.name)?;

        Ok(())
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"<?xml version="1.0"?>
<wsdl:definitions xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/" xmlns:tns="urn:test" name="demo">
  <wsdl:types>
    <xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:test">
      <xsd:element name="ping" type="xsd:string"/>
    </xsd:schema>
  </wsdl:types>
  <wsdl:documentation>Ping &amp; pong<![CDATA[ <raw> ]]></wsdl:documentation>
</wsdl:definitions>"#;

    #[test]
    fn parses_elements_and_attributes() {
        let mut tree = Tree::new();
        let root_id = tree.parse(DOCUMENT).unwrap();
        let root = tree.node(root_id);

        assert_eq!(root.name(), "wsdl:definitions");
        assert_eq!(root.local_name(), "definitions");
        assert_eq!(root.prefix(), Some("wsdl"));
        assert_eq!(root.attribute("name"), Some("demo"));
        assert_eq!(root.children().count(), 2);

        let element = root.descendants_named("element")[0];
        assert_eq!(element.attribute("type"), Some("xsd:string"));
        assert!(element.is_self_closing());
        assert_eq!(element.parent().unwrap().local_name(), "schema");
    }

    #[test]
    fn collects_text_and_cdata() {
        let mut tree = Tree::new();
        let root_id = tree.parse(DOCUMENT).unwrap();
        let root = tree.node(root_id);
        let docs = root.first_child_named("documentation").unwrap();

        assert_eq!(docs.text(), "Ping & pong <raw> ");
    }

    #[test]
    fn resolves_namespaces_in_scope() {
        let mut tree = Tree::new();
        let root_id = tree.parse(DOCUMENT).unwrap();
        let root = tree.node(root_id);
        let element = root.descendants_named("element")[0];

        assert_eq!(
            element.lookup_namespace(Some("xsd")),
            Some("http://www.w3.org/2001/XMLSchema")
        );
        assert_eq!(element.lookup_namespace(Some("tns")), Some("urn:test"));
        assert_eq!(element.lookup_namespace(Some("missing")), None);
        assert_eq!(root.lookup_namespace(Some("xsd")), None);
    }

    #[test]
    fn keeps_documents_apart_in_one_tree() {
        let mut tree = Tree::new();
        let first = tree.parse("<a><b/></a>").unwrap();
        let second = tree.parse("<c/>").unwrap();

        assert_ne!(first, second);
        assert_eq!(tree.node(second).name(), "c");
        assert!(tree.node(second).parent().is_none());
        assert_eq!(tree.node(first).children_named("b").count(), 1);
    }

    #[test]
    fn serialises_subtrees() {
        let mut tree = Tree::new();
        let root = tree
            .parse(r#"<r><item id="1">a &lt; b</item><empty/></r>"#)
            .unwrap();

        assert_eq!(
            tree.node(root).to_xml().unwrap(),
            r#"<r><item id="1">a &lt; b</item><empty/></r>"#
        );
    }

    #[test]
    fn rejects_unbalanced_input() {
        let mut tree = Tree::new();

        assert!(tree.parse("<a><b></a>").is_err());
        assert!(matches!(tree.parse("   "), Err(Error::EmptyDocument)));
    }
}
