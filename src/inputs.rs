//! Settable trees of input values, one per message part.
//!
//! An [`InputTree`] mirrors the flattened element structure of a part's
//! element. Each node is one of four kinds, decided once when the tree is
//! built:
//!
//! | leaf | repeats | kind |
//! |------|---------|------|
//! | yes  | no      | [`InputKind::Element`] |
//! | yes  | yes     | [`InputKind::Repeatable`] |
//! | no   | no      | [`InputKind::Container`] |
//! | no   | yes     | [`InputKind::Collection`] |
//!
//! Repeatables and collections always hold at least one instance, so index
//! `0` is valid straight after construction.
//!
//! Nodes are addressed by dotted paths relative to the root element, e.g.
//! `"details.items.1.name"`. A numeric segment picks an instance of a
//! repeatable or collection; leaving it out means instance `0`. The empty
//! path is the root itself.

use std::{fmt, rc::Rc};
use tracing::debug;

use lather_wsdl::{dom::NodeId, schema::SchemaGraph, types::ElementDecl};

use super::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    Element { value: Option<String> },
    Container { children: Vec<InputId> },
    Repeatable { elements: Vec<InputId> },
    Collection { containers: Vec<InputId> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputAttribute {
    pub name: String,
    pub value: Option<String>,
    pub default: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InputNode {
    decl: Rc<ElementDecl>,
    parent: Option<InputId>,
    kind: InputKind,
    inner_xml: Option<String>,
    attributes: Vec<InputAttribute>,
    render_empty: bool,
}

#[derive(Debug, Clone)]
pub struct InputTree {
    part: String,
    nodes: Vec<InputNode>,
    root: InputId,
}

impl InputAttribute {
    pub fn is_default(&self) -> bool {
        self.value.is_none() || self.value == self.default
    }
}

impl InputNode {
    fn new(decl: Rc<ElementDecl>, parent: Option<InputId>, kind: InputKind) -> Self {
        let attributes = decl
            .attributes
            .iter()
            .map(|attribute| InputAttribute {
                name: attribute.name.clone(),
                value: attribute.default.clone(),
                default: attribute.default.clone(),
            })
            .collect();

        Self {
            decl,
            parent,
            kind,
            inner_xml: None,
            attributes,
            render_empty: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.decl.name
    }

    pub fn decl(&self) -> &Rc<ElementDecl> {
        &self.decl
    }

    pub fn parent(&self) -> Option<InputId> {
        self.parent
    }

    pub fn kind(&self) -> &InputKind {
        &self.kind
    }

    pub fn value(&self) -> Option<&str> {
        match &self.kind {
            InputKind::Element { value } => value.as_deref(),
            _ => None,
        }
    }

    pub fn inner_xml(&self) -> Option<&str> {
        self.inner_xml.as_deref()
    }

    pub fn attributes(&self) -> &[InputAttribute] {
        &self.attributes
    }

    pub fn render_empty(&self) -> bool {
        self.render_empty
    }

    pub fn is_setable(&self) -> bool {
        matches!(
            self.kind,
            InputKind::Element { .. } | InputKind::Repeatable { .. }
        )
    }

    /// Instances held by a repeatable or collection.
    pub fn instances(&self) -> &[InputId] {
        match &self.kind {
            InputKind::Repeatable { elements } => elements,
            InputKind::Collection { containers } => containers,
            _ => &[],
        }
    }

    pub fn children(&self) -> &[InputId] {
        match &self.kind {
            InputKind::Container { children } => children,
            _ => &[],
        }
    }
}

impl InputTree {
    /// Builds the tree for a part whose element is `root`.
    pub fn build(graph: &SchemaGraph, part: &str, root: Rc<ElementDecl>) -> Result<Self, Error> {
        let mut tree = Self {
            part: part.to_owned(),
            nodes: Vec::new(),
            root: InputId(0),
        };

        let mut ancestors = Vec::new();
        tree.root = tree.build_node(graph, root, None, &mut ancestors)?;

        debug!(part, nodes = tree.nodes.len(), "built input tree");
        Ok(tree)
    }

    fn push(&mut self, node: InputNode) -> InputId {
        let id = InputId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn build_node(
        &mut self,
        graph: &SchemaGraph,
        decl: Rc<ElementDecl>,
        parent: Option<InputId>,
        ancestors: &mut Vec<NodeId>,
    ) -> Result<InputId, Error> {
        let children: Vec<_> = graph
            .element_children(&decl, ancestors)?
            .into_iter()
            .filter(|child| child.tag != decl.tag)
            .collect();

        let setable = children.is_empty();
        let repeatable = decl.is_repeatable();

        let id = match (setable, repeatable) {
            (true, false) => self.push(InputNode::new(decl, parent, InputKind::Element { value: None })),

            (true, true) => {
                let id = self.push(InputNode::new(
                    Rc::clone(&decl),
                    parent,
                    InputKind::Repeatable { elements: Vec::new() },
                ));
                let seed = self.push(InputNode::new(decl, Some(id), InputKind::Element { value: None }));
                self.nodes[id.0].kind = InputKind::Repeatable { elements: vec![seed] };
                id
            }

            (false, false) => {
                let id = self.push(InputNode::new(
                    Rc::clone(&decl),
                    parent,
                    InputKind::Container { children: Vec::new() },
                ));
                self.build_children(graph, &decl, children, id, ancestors)?;
                id
            }

            (false, true) => {
                let id = self.push(InputNode::new(
                    Rc::clone(&decl),
                    parent,
                    InputKind::Collection { containers: Vec::new() },
                ));
                let seed = self.push(InputNode::new(
                    Rc::clone(&decl),
                    Some(id),
                    InputKind::Container { children: Vec::new() },
                ));
                self.build_children(graph, &decl, children, seed, ancestors)?;
                self.nodes[id.0].kind = InputKind::Collection { containers: vec![seed] };
                id
            }
        };

        Ok(id)
    }

    fn build_children(
        &mut self,
        graph: &SchemaGraph,
        decl: &ElementDecl,
        children: Vec<Rc<ElementDecl>>,
        container: InputId,
        ancestors: &mut Vec<NodeId>,
    ) -> Result<(), Error> {
        ancestors.push(decl.tag);

        let mut ids = Vec::with_capacity(children.len());
        for child in children {
            ids.push(self.build_node(graph, child, Some(container), ancestors)?);
        }

        ancestors.pop();
        self.nodes[container.0].kind = InputKind::Container { children: ids };
        Ok(())
    }

    /// The message part this tree fills in.
    pub fn part(&self) -> &str {
        &self.part
    }

    pub fn root(&self) -> InputId {
        self.root
    }

    pub fn node(&self, id: InputId) -> &InputNode {
        &self.nodes[id.0]
    }

    /// The child of container `id` named `name`.
    pub fn child(&self, id: InputId, name: &str) -> Option<InputId> {
        self.node(id)
            .children()
            .iter()
            .copied()
            .find(|child| self.node(*child).name() == name)
    }

    pub fn lookup(&self, path: &str) -> Result<InputId, Error> {
        let not_found = || Error::InputNotFound(path.to_owned());
        let mut current = self.root;

        for segment in path.split('.').filter(|segment| !segment.is_empty()) {
            if let Ok(index) = segment.parse::<usize>() {
                current = *self
                    .node(current)
                    .instances()
                    .get(index)
                    .ok_or_else(not_found)?;
                continue;
            }

            if let Some(first) = self.node(current).instances().first() {
                current = *first;
            }

            current = self.child(current, segment).ok_or_else(not_found)?;
        }

        Ok(current)
    }

    // Repeatables stand for their first instance when read or written
    // directly.
    fn element(&self, path: &str) -> Result<InputId, Error> {
        let id = self.lookup(path)?;

        match &self.node(id).kind {
            InputKind::Repeatable { elements } => Ok(elements[0]),
            InputKind::Element { .. } => Ok(id),
            _ => Err(Error::NotSetable(self.node(id).name().to_owned())),
        }
    }

    pub fn value(&self, path: &str) -> Result<Option<&str>, Error> {
        Ok(self.node(self.element(path)?).value())
    }

    /// Sets the scalar value of a leaf. Booleans render as `true`/`false`.
    pub fn set_value<V: ToString>(&mut self, path: &str, value: V) -> Result<(), Error> {
        let id = self.element(path)?;
        self.nodes[id.0].kind = InputKind::Element {
            value: Some(value.to_string()),
        };
        Ok(())
    }

    pub fn clear_value(&mut self, path: &str) -> Result<(), Error> {
        let id = self.element(path)?;
        self.nodes[id.0].kind = InputKind::Element { value: None };
        Ok(())
    }

    pub fn inner_xml(&self, path: &str) -> Result<Option<&str>, Error> {
        Ok(self.node(self.lookup(path)?).inner_xml())
    }

    /// Replaces everything inside the node's tag with `xml`, verbatim.
    pub fn set_inner_xml<S: Into<String>>(&mut self, path: &str, xml: S) -> Result<(), Error> {
        let id = self.lookup(path)?;
        self.nodes[id.0].inner_xml = Some(xml.into());
        Ok(())
    }

    pub fn attribute(&self, path: &str, name: &str) -> Result<Option<&str>, Error> {
        let node = self.node(self.lookup(path)?);

        node.attributes
            .iter()
            .find(|attribute| attribute.name == name)
            .map(|attribute| attribute.value.as_deref())
            .ok_or_else(|| Error::AttributeNotFound {
                element: node.name().to_owned(),
                attribute: name.to_owned(),
            })
    }

    pub fn set_attribute<V: ToString>(&mut self, path: &str, name: &str, value: V) -> Result<(), Error> {
        let id = self.lookup(path)?;
        let node = &mut self.nodes[id.0];
        let element = node.decl.name.clone();

        let attribute = node
            .attributes
            .iter_mut()
            .find(|attribute| attribute.name == name)
            .ok_or_else(|| Error::AttributeNotFound {
                element,
                attribute: name.to_owned(),
            })?;

        attribute.value = Some(value.to_string());
        Ok(())
    }

    /// Number of instances of a repeatable or collection; one otherwise.
    pub fn len(&self, path: &str) -> Result<usize, Error> {
        let node = self.node(self.lookup(path)?);

        Ok(match node.instances().len() {
            0 => 1,
            count => count,
        })
    }

    /// Adds an instance to a repeatable, returning its index.
    pub fn append<V: ToString>(&mut self, path: &str, value: Option<V>) -> Result<usize, Error> {
        let id = self.lookup(path)?;

        if matches!(self.node(id).kind, InputKind::Collection { .. }) {
            return self.append_group(path);
        }
        if !matches!(self.node(id).kind, InputKind::Repeatable { .. }) {
            return Err(Error::NotRepeatable(self.node(id).name().to_owned()));
        }

        let decl = Rc::clone(&self.node(id).decl);
        let instance = self.push(InputNode::new(
            decl,
            Some(id),
            InputKind::Element {
                value: value.map(|value| value.to_string()),
            },
        ));

        match &mut self.nodes[id.0].kind {
            InputKind::Repeatable { elements } => {
                elements.push(instance);
                Ok(elements.len() - 1)
            }
            _ => Err(Error::NotRepeatable(path.to_owned())),
        }
    }

    pub fn extend<I, V>(&mut self, path: &str, values: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        for value in values {
            self.append(path, Some(value))?;
        }
        Ok(())
    }

    /// Adds an unfilled container instance to a collection, returning its
    /// index.
    pub fn append_group(&mut self, path: &str) -> Result<usize, Error> {
        let id = self.lookup(path)?;

        let seed = match &self.node(id).kind {
            InputKind::Collection { containers } => containers[0],
            _ => return Err(Error::NotRepeatable(self.node(id).name().to_owned())),
        };

        let instance = self.fresh_copy(seed, id);

        match &mut self.nodes[id.0].kind {
            InputKind::Collection { containers } => {
                containers.push(instance);
                Ok(containers.len() - 1)
            }
            _ => Err(Error::NotRepeatable(path.to_owned())),
        }
    }

    // Copies the shape below `source` without any of its values. Nested
    // repeatables and collections start over with a single instance.
    fn fresh_copy(&mut self, source: InputId, parent: InputId) -> InputId {
        let decl = Rc::clone(&self.node(source).decl);

        let kind = match &self.node(source).kind {
            InputKind::Element { .. } => InputKind::Element { value: None },
            InputKind::Container { .. } => InputKind::Container { children: Vec::new() },
            InputKind::Repeatable { .. } => InputKind::Repeatable { elements: Vec::new() },
            InputKind::Collection { .. } => InputKind::Collection { containers: Vec::new() },
        };

        let sources: Vec<InputId> = match &self.node(source).kind {
            InputKind::Element { .. } => Vec::new(),
            InputKind::Container { children } => children.clone(),
            InputKind::Repeatable { elements } => vec![elements[0]],
            InputKind::Collection { containers } => vec![containers[0]],
        };

        let id = self.push(InputNode::new(decl, Some(parent), kind));
        let copies: Vec<_> = sources
            .into_iter()
            .map(|source| self.fresh_copy(source, id))
            .collect();

        match &mut self.nodes[id.0].kind {
            InputKind::Container { children } => *children = copies,
            InputKind::Repeatable { elements } => *elements = copies,
            InputKind::Collection { containers } => *containers = copies,
            InputKind::Element { .. } => (),
        }

        id
    }

    /// Fills a collection from parallel columns: row `i` of every column
    /// goes into instance `i`, in order. Instances are appended as needed
    /// and filling stops at the shortest column. Returns the number of rows
    /// written.
    pub fn fill_columns<N, V>(&mut self, path: &str, columns: &[(N, Vec<V>)]) -> Result<usize, Error>
    where
        N: AsRef<str>,
        V: ToString,
    {
        let id = self.lookup(path)?;
        if !matches!(self.node(id).kind, InputKind::Collection { .. }) {
            return Err(Error::NotRepeatable(self.node(id).name().to_owned()));
        }

        let rows = columns
            .iter()
            .map(|(_, values)| values.len())
            .min()
            .unwrap_or(0);

        for row in 0..rows {
            while self.node(id).instances().len() <= row {
                self.append_group(path)?;
            }

            for (name, values) in columns {
                let cell = format!("{}.{}", row, name.as_ref());
                let cell = if path.is_empty() {
                    cell
                } else {
                    format!("{}.{}", path, cell)
                };

                self.set_value(&cell, values[row].to_string())?;
            }
        }

        Ok(rows)
    }

    /// Makes the node render even when it holds nothing and may be left
    /// out. Its ancestors are marked too, so they are not dropped around it.
    pub fn render_empty(&mut self, path: &str) -> Result<(), Error> {
        let mut current = Some(self.lookup(path)?);

        while let Some(id) = current {
            self.nodes[id.0].render_empty = true;
            current = self.nodes[id.0].parent;
        }

        Ok(())
    }

    /// Whether anything at or below `id` would put content on the wire: a
    /// value, inner XML, or an attribute changed from its default.
    pub fn has_content(&self, id: InputId) -> bool {
        let node = self.node(id);

        if node.inner_xml.is_some()
            || node.value().is_some()
            || node.attributes.iter().any(|attribute| !attribute.is_default())
        {
            return true;
        }

        match &node.kind {
            InputKind::Element { .. } => false,
            InputKind::Container { children } => children.iter().any(|child| self.has_content(*child)),
            InputKind::Repeatable { elements } => elements.iter().any(|element| self.has_content(*element)),
            InputKind::Collection { containers } => {
                containers.iter().any(|container| self.has_content(*container))
            }
        }
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, id: InputId, label: &str, depth: usize) -> fmt::Result {
        let node = self.node(id);
        let indent = "  ".repeat(depth);

        match &node.kind {
            _ if node.inner_xml.is_some() => {
                writeln!(f, "{}{} : {}", indent, label, node.inner_xml.as_deref().unwrap_or_default())?
            }
            InputKind::Element { value: Some(value) } => writeln!(f, "{}{} = {:?}", indent, label, value)?,
            InputKind::Element { value: None } => writeln!(f, "{}{} = None", indent, label)?,
            InputKind::Container { .. } => writeln!(f, "{}{}", indent, label)?,

            InputKind::Repeatable { elements } | InputKind::Collection { containers: elements } => {
                for (index, instance) in elements.iter().enumerate() {
                    self.fmt_node(f, *instance, &format!("{}[{}]", node.name(), index), depth)?;
                }
                return Ok(());
            }
        }

        for attribute in &node.attributes {
            match &attribute.value {
                Some(value) => writeln!(f, "{}  @{} = {:?}", indent, attribute.name, value)?,
                None => writeln!(f, "{}  @{} = None", indent, attribute.name)?,
            }
        }

        if node.inner_xml.is_none() {
            for child in node.children() {
                self.fmt_node(f, *child, self.node(*child).name(), depth + 1)?;
            }
        }

        Ok(())
    }
}

impl fmt::Display for InputTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, self.root, self.node(self.root).name(), 0)
    }
}
