//! The schema graph: every `<schema>` reachable from a WSDL, with lazily
//! resolved structural children and qualified-name lookups.
//!
//! Nodes are keyed by the [`NodeId`] of their tag. Children, element
//! declarations and name lookups are each computed at most once per graph
//! and then served from a cache, so walks over self-referential types only
//! ever resolve a given `type=` once.

use std::{cell::RefCell, collections::HashMap, rc::Rc};
use tracing::{debug, trace, warn};
use url::Url;

use lather_util::xml::{local_name, split_qualified_name};

use super::{
    dom::{Node, NodeId, Tree},
    error::Error,
    namespace::Namespace,
    types::{
        AttributeDecl, ElementDecl, Form, Occurs, Schema, SchemaId, SchemaKind, SchemaNode,
        XML_SCHEMA,
    },
};

/// What a qualified name is expected to point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    Element,
    Type,
}

// Tags mapping to `None` are understood but carry nothing renderable.
const TYPE_FACTORY: &[(&str, Option<SchemaKind>)] = &[
    ("element", Some(SchemaKind::Element)),
    ("complexType", Some(SchemaKind::ComplexType)),
    ("simpleType", Some(SchemaKind::SimpleType)),
    ("union", Some(SchemaKind::Union)),
    ("list", Some(SchemaKind::List)),
    ("sequence", Some(SchemaKind::Sequence)),
    ("all", Some(SchemaKind::All)),
    ("choice", Some(SchemaKind::Choice)),
    ("complexContent", Some(SchemaKind::ComplexContent)),
    ("simpleContent", Some(SchemaKind::SimpleContent)),
    ("extension", Some(SchemaKind::Extension)),
    ("restriction", Some(SchemaKind::Restriction)),
    ("enumeration", Some(SchemaKind::Enumeration)),
    ("annotation", Some(SchemaKind::Annotation)),
    ("documentation", Some(SchemaKind::Documentation)),
    ("attribute", None),
    ("attributeGroup", None),
    ("anyAttribute", None),
    ("any", None),
    ("appinfo", None),
    ("key", None),
    ("keyref", None),
    ("unique", None),
];

type LookupKey = (Lookup, Option<String>, String);

#[derive(Debug)]
pub struct SchemaGraph {
    tree: Tree,
    namespace: Namespace,
    schemas: Vec<Schema>,

    children: RefCell<HashMap<NodeId, Rc<[SchemaNode]>>>,
    elements: RefCell<HashMap<NodeId, Rc<ElementDecl>>>,
    lookups: RefCell<HashMap<LookupKey, Option<SchemaNode>>>,
}

#[derive(Default)]
struct Facets {
    enum_hint: Vec<String>,
    documentation: Option<String>,
    attributes: Vec<AttributeDecl>,
}

impl Lookup {
    fn prefers(self, kind: SchemaKind) -> bool {
        match self {
            Lookup::Element => kind.is_element(),
            Lookup::Type => kind.is_type(),
        }
    }
}

impl Schema {
    /// Reads the schema-level settings of a `<schema>` tag.
    pub fn read(
        tag: Node<'_>,
        location: Url,
        is_local: bool,
        inherited_namespace: Option<&str>,
    ) -> Self {
        Self {
            tag: tag.id(),
            target_namespace: tag
                .attribute("targetNamespace")
                .or(inherited_namespace)
                .map(str::to_owned),
            element_form: Form::parse(tag.attribute("elementFormDefault"), Form::Unqualified),
            attribute_form: Form::parse(tag.attribute("attributeFormDefault"), Form::Unqualified),
            namespace: Namespace::of(tag),
            is_local,
            location,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }
}

impl SchemaGraph {
    /// `namespace` holds the declarations made on the WSDL root.
    pub fn new(tree: Tree, namespace: Namespace, schemas: Vec<Schema>) -> Self {
        debug!(schemas = schemas.len(), "building schema graph");

        Self {
            tree,
            namespace,
            schemas,

            children: Default::default(),
            elements: Default::default(),
            lookups: Default::default(),
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }

    pub fn schema(&self, id: SchemaId) -> &Schema {
        &self.schemas[id]
    }

    pub fn root_namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Maps a tag to the node kind it represents. Tags that describe
    /// nothing renderable yield `None`; unknown tags are an error.
    pub fn type_factory(&self, tag: NodeId, schema: SchemaId) -> Result<Option<SchemaNode>, Error> {
        let name = self.tree.node(tag).local_name();

        match TYPE_FACTORY.iter().find(|(known, _)| *known == name) {
            Some((_, kind)) => Ok(kind.map(|kind| SchemaNode { tag, kind, schema })),
            None => Err(Error::NotImplemented(name.to_owned())),
        }
    }

    /// Resolves a `type=`/`base=` style name. `target_namespace` overrides
    /// the prefix when given.
    pub fn find_type_by_name(
        &self,
        qualified_name: &str,
        target_namespace: Option<&str>,
    ) -> Option<SchemaNode> {
        self.lookup(Lookup::Type, qualified_name, target_namespace)
    }

    /// Resolves a message part or `ref=` name to a global element.
    pub fn find_element_by_name(
        &self,
        qualified_name: &str,
        target_namespace: Option<&str>,
    ) -> Option<SchemaNode> {
        self.lookup(Lookup::Element, qualified_name, target_namespace)
    }

    /// Resolves a name written on `context`, using the namespace
    /// declarations in scope there.
    pub fn resolve_reference(
        &self,
        context: NodeId,
        qualified_name: &str,
        lookup: Lookup,
    ) -> Option<SchemaNode> {
        let (prefix, _) = split_qualified_name(qualified_name);

        let namespace = self
            .tree
            .node(context)
            .lookup_namespace(prefix)
            .or_else(|| match prefix {
                Some(_) => None,
                None => self
                    .enclosing_schema(context)
                    .and_then(|schema| self.schemas[schema].name()),
            });

        self.lookup(lookup, qualified_name, namespace)
    }

    fn lookup(
        &self,
        lookup: Lookup,
        qualified_name: &str,
        target_namespace: Option<&str>,
    ) -> Option<SchemaNode> {
        let (prefix, local) = split_qualified_name(qualified_name);

        let namespace = match target_namespace {
            Some(namespace) => Some(namespace),
            None => prefix.and_then(|prefix| self.resolve_prefix(prefix)),
        };

        if namespace == Some(XML_SCHEMA) {
            trace!(name = qualified_name, "built-in schema type");
            return None;
        }

        let key = (lookup, namespace.map(str::to_owned), local.to_owned());
        if let Some(found) = self.lookups.borrow().get(&key) {
            return *found;
        }

        let found = match namespace {
            Some(namespace) => self.scan(lookup, local, |schema| schema.name() == Some(namespace)),

            None => {
                warn!(
                    name = qualified_name,
                    "namespace could not be resolved, taking the first match from any schema"
                );
                self.scan(lookup, local, |_| true)
            }
        };

        if found.is_none() {
            debug!(name = qualified_name, ?namespace, ?lookup, "no declaration found");
        }

        self.lookups.borrow_mut().insert(key, found);
        found
    }

    fn resolve_prefix(&self, prefix: &str) -> Option<&str> {
        self.namespace.resolve(prefix).ok().or_else(|| {
            self.schemas
                .iter()
                .find_map(|schema| schema.namespace.resolve(prefix).ok())
        })
    }

    fn scan(
        &self,
        lookup: Lookup,
        local: &str,
        accept: impl Fn(&Schema) -> bool,
    ) -> Option<SchemaNode> {
        let mut fallback = None;

        for (id, schema) in self.schemas.iter().enumerate() {
            if !accept(schema) {
                continue;
            }

            for tag in self.tree.node(schema.tag).children() {
                if tag.attribute("name") != Some(local) {
                    continue;
                }

                if let Ok(Some(node)) = self.type_factory(tag.id(), id) {
                    if lookup.prefers(node.kind) {
                        return Some(node);
                    }
                    fallback.get_or_insert(node);
                }
            }
        }

        fallback
    }

    fn enclosing_schema(&self, tag: NodeId) -> Option<SchemaId> {
        let mut current = Some(self.tree.node(tag));

        while let Some(node) = current {
            if let Some(id) = self.schemas.iter().position(|schema| schema.tag == node.id()) {
                return Some(id);
            }
            current = node.parent();
        }

        None
    }

    /// Structural children of `node`: its literal child tags plus, for
    /// elements, the named type they refer to. Extensions put their base
    /// first; simple restrictions are replaced by their base.
    pub fn children(&self, node: SchemaNode) -> Result<Rc<[SchemaNode]>, Error> {
        if let Some(children) = self.children.borrow().get(&node.tag) {
            return Ok(Rc::clone(children));
        }

        let children: Rc<[SchemaNode]> = self.resolve_children(node)?.into();

        debug!(
            tag = self.tree.node(node.tag).name(),
            count = children.len(),
            "resolved schema children"
        );

        self.children
            .borrow_mut()
            .insert(node.tag, Rc::clone(&children));

        Ok(children)
    }

    fn resolve_children(&self, node: SchemaNode) -> Result<Vec<SchemaNode>, Error> {
        let tag = self.tree.node(node.tag);

        match node.kind {
            SchemaKind::Element => {
                if let Some(reference) = tag.attribute("ref") {
                    return match self.resolve_reference(node.tag, reference, Lookup::Element) {
                        Some(target) if target.tag != node.tag && target.kind.is_element() => {
                            Ok(self.children(target)?.to_vec())
                        }
                        _ => Ok(Vec::new()),
                    };
                }

                let mut children = self.literal_children(node)?;
                if let Some(type_name) = tag.attribute("type") {
                    children.extend(self.resolve_reference(node.tag, type_name, Lookup::Type));
                }

                Ok(children)
            }

            SchemaKind::Extension => {
                let mut children: Vec<_> = self.base(node).into_iter().collect();
                children.extend(self.literal_children(node)?);
                Ok(children)
            }

            // A complex restriction restates the content it keeps.
            SchemaKind::Restriction
                if tag.parent().map(Node::local_name) == Some("complexContent") =>
            {
                self.literal_children(node)
            }

            SchemaKind::Restriction => Ok(self.base(node).into_iter().collect()),

            _ => self.literal_children(node),
        }
    }

    fn literal_children(&self, node: SchemaNode) -> Result<Vec<SchemaNode>, Error> {
        let mut children = Vec::new();

        for child in self.tree.node(node.tag).children() {
            children.extend(self.type_factory(child.id(), node.schema)?);
        }

        Ok(children)
    }

    fn base(&self, node: SchemaNode) -> Option<SchemaNode> {
        self.tree
            .node(node.tag)
            .attribute("base")
            .and_then(|base| self.resolve_reference(node.tag, base, Lookup::Type))
    }

    fn is_top_level(&self, node: SchemaNode) -> bool {
        self.tree.node(node.tag).parent().map(Node::id) == Some(self.schemas[node.schema].tag)
    }

    /// The annotated declaration for an `element` node.
    pub fn element(&self, node: SchemaNode) -> Result<Rc<ElementDecl>, Error> {
        if let Some(decl) = self.elements.borrow().get(&node.tag) {
            return Ok(Rc::clone(decl));
        }

        let tag = self.tree.node(node.tag);
        let reference = tag.attribute("ref");

        let definition = match reference
            .and_then(|reference| self.resolve_reference(node.tag, reference, Lookup::Element))
        {
            Some(target) if target.tag != node.tag && target.kind.is_element() => target,
            _ => node,
        };

        let source = self.tree.node(definition.tag);
        let facets = self.facets(definition)?;

        let decl = Rc::new(ElementDecl {
            tag: node.tag,
            definition,
            name: source
                .attribute("name")
                .or_else(|| reference.map(local_name))
                .unwrap_or_default()
                .to_owned(),
            type_name: source.attribute("type").map(str::to_owned),
            min_occurs: Occurs::parse(tag.attribute("minOccurs")),
            max_occurs: Occurs::parse(tag.attribute("maxOccurs")),
            nillable: source.attribute("nillable") == Some("true"),
            form: Form::parse(source.attribute("form"), Form::Qualified),
            global: reference.is_some() || self.is_top_level(definition),
            enum_hint: facets.enum_hint,
            documentation: facets.documentation,
            attributes: facets.attributes,
        });

        debug!(name = %decl.name, min = %decl.min_occurs, max = %decl.max_occurs, "element declaration");

        self.elements
            .borrow_mut()
            .insert(node.tag, Rc::clone(&decl));

        Ok(decl)
    }

    /// Flattens the structure below `decl` into the elements that render as
    /// its XML children, in declaration order.
    ///
    /// `ancestors` are the element tags already open above `decl`; any of
    /// them met again is left out, which cuts recursive types. Elements
    /// under a `choice` come back with `min_occurs` of zero.
    pub fn element_children(
        &self,
        decl: &ElementDecl,
        ancestors: &[NodeId],
    ) -> Result<Vec<Rc<ElementDecl>>, Error> {
        let mut visited = ancestors.to_vec();
        visited.push(decl.tag);
        visited.push(decl.definition.tag);

        let mut found = Vec::new();
        self.collect_elements(decl.definition, &mut visited, false, &mut found)?;
        Ok(found)
    }

    fn collect_elements(
        &self,
        node: SchemaNode,
        visited: &mut Vec<NodeId>,
        optional: bool,
        found: &mut Vec<Rc<ElementDecl>>,
    ) -> Result<(), Error> {
        for child in self.children(node)?.iter().copied() {
            if visited.contains(&child.tag) {
                trace!(tag = self.tree.node(child.tag).name(), "skipping recursive reference");
                continue;
            }

            match child.kind {
                SchemaKind::Element => {
                    let decl = self.element(child)?;
                    if visited.contains(&decl.definition.tag) {
                        continue;
                    }

                    if optional && !decl.is_optional() {
                        found.push(Rc::new(ElementDecl {
                            min_occurs: Occurs::Count(0),
                            ..(*decl).clone()
                        }));
                    } else {
                        found.push(decl);
                    }
                }

                SchemaKind::Annotation | SchemaKind::Documentation | SchemaKind::Enumeration => (),

                kind => {
                    visited.push(child.tag);
                    self.collect_elements(
                        child,
                        visited,
                        optional || kind == SchemaKind::Choice,
                        found,
                    )?;
                    visited.pop();
                }
            }
        }

        Ok(())
    }

    fn facets(&self, node: SchemaNode) -> Result<Facets, Error> {
        let mut facets = Facets::default();
        let mut visited = vec![node.tag];

        self.fold_facets(node, &mut visited, &mut facets)?;
        Ok(facets)
    }

    // Nested elements carry their own facets and are not entered.
    fn fold_facets(
        &self,
        node: SchemaNode,
        visited: &mut Vec<NodeId>,
        facets: &mut Facets,
    ) -> Result<(), Error> {
        for child in self.children(node)?.iter().copied() {
            if visited.contains(&child.tag) {
                continue;
            }

            let tag = self.tree.node(child.tag);

            match child.kind {
                SchemaKind::Element => (),

                SchemaKind::Documentation => {
                    let text = tag.text().trim();
                    if facets.documentation.is_none() && !text.is_empty() {
                        facets.documentation = Some(text.to_owned());
                    }
                }

                SchemaKind::Enumeration => {
                    facets
                        .enum_hint
                        .extend(tag.attribute("value").map(str::to_owned));
                }

                _ => {
                    visited.push(child.tag);
                    self.fold_facets(child, visited, facets)?;
                    visited.pop();
                }
            }
        }

        let tag = self.tree.node(node.tag);

        if node.kind == SchemaKind::Restriction {
            facets.enum_hint.extend(
                tag.children_named("enumeration")
                    .filter_map(|enumeration| enumeration.attribute("value"))
                    .map(str::to_owned),
            );
        }

        if !node.kind.is_element() {
            facets.attributes.extend(
                tag.children_named("attribute")
                    .filter(|attribute| attribute.attribute("use") != Some("prohibited"))
                    .map(attribute_decl),
            );
        }

        Ok(())
    }
}

fn attribute_decl(tag: Node<'_>) -> AttributeDecl {
    let fixed = tag.attribute("fixed");

    AttributeDecl {
        // Referenced attributes keep their prefix, e.g. `xml:lang`.
        name: tag
            .attribute("name")
            .or_else(|| tag.attribute("ref"))
            .unwrap_or_default()
            .to_owned(),
        type_name: tag.attribute("type").map(str::to_owned),
        default: fixed.or_else(|| tag.attribute("default")).map(str::to_owned),
        fixed: fixed.is_some(),
    }
}
