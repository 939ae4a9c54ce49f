//! WSDL loading and the models built from it.
//!
//! [`load`] fetches a WSDL and everything it imports into a [`Wsdl`], which
//! owns the [`SchemaGraph`](schema::SchemaGraph) used to resolve message
//! types and hands out the structural handles in [`model`].

use url::Url;

use lather_util::transport::{parse_location, RequestOptions, Transport};

mod parser;

pub mod dom;
pub mod error;
pub mod model;
pub mod namespace;
pub mod schema;
pub mod types;

use self::{
    dom::{Node, NodeId, Tree},
    error::Error,
    model::{find_definition, Binding, Message, PortType, Service},
    namespace::Namespace,
    schema::SchemaGraph,
    types::{Schema, SchemaNode},
};

/// A loaded WSDL document with its imports.
#[derive(Debug)]
pub struct Wsdl {
    location: Url,
    definitions: Vec<NodeId>,
    graph: SchemaGraph,
}

/// Loads a WSDL from an absolute URL or a filesystem path.
pub fn load<S: AsRef<str>>(
    location: S,
    transport: &dyn Transport,
    options: &RequestOptions,
) -> Result<Wsdl, Error> {
    let url = parse_location(location)?;
    let text = transport.get(&url, options)?;

    parser::parse(url, &text, transport, options)
}

impl Wsdl {
    /// Parses WSDL text already in memory. Imports are resolved against
    /// `location`.
    pub fn parse(
        text: &str,
        location: Url,
        transport: &dyn Transport,
        options: &RequestOptions,
    ) -> Result<Self, Error> {
        parser::parse(location, text, transport, options)
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }

    pub fn tree(&self) -> &Tree {
        self.graph.tree()
    }

    pub fn root(&self) -> Node<'_> {
        self.tree().node(self.definitions[0])
    }

    /// The `<definitions>` roots: this document's first, then imported ones.
    pub fn definitions(&self) -> &[NodeId] {
        &self.definitions
    }

    pub fn namespace(&self) -> &Namespace {
        self.graph.root_namespace()
    }

    pub fn target_namespace(&self) -> Option<&str> {
        self.root().attribute("targetNamespace")
    }

    pub fn schemas(&self) -> &[Schema] {
        self.graph.schemas()
    }

    pub fn services(&self) -> Vec<Service<'_>> {
        model::definitions_named(self, "service")
            .into_iter()
            .map(|node| Service::from_tag(self, node.id()))
            .collect()
    }

    pub fn service(&self, name: &str) -> Option<Service<'_>> {
        self.services()
            .into_iter()
            .find(|service| service.name() == name)
    }

    /// Every binding, validated.
    pub fn bindings(&self) -> Result<Vec<Binding<'_>>, Error> {
        model::definitions_named(self, "binding")
            .into_iter()
            .map(|node| Binding::new(self, node.id()))
            .collect()
    }

    pub fn binding(&self, name: &str) -> Result<Option<Binding<'_>>, Error> {
        find_definition(self, "binding", name)
            .map(|node| Binding::new(self, node.id()))
            .transpose()
    }

    pub fn port_type(&self, name: &str) -> Option<PortType<'_>> {
        find_definition(self, "portType", name).map(|node| PortType::from_tag(self, node.id()))
    }

    pub fn message(&self, name: &str) -> Option<Message<'_>> {
        find_definition(self, "message", name).map(|node| Message::from_tag(self, node.id()))
    }

    pub fn find_type_by_name(&self, name: &str, target_namespace: Option<&str>) -> Option<SchemaNode> {
        self.graph.find_type_by_name(name, target_namespace)
    }

    pub fn find_element_by_name(
        &self,
        name: &str,
        target_namespace: Option<&str>,
    ) -> Option<SchemaNode> {
        self.graph.find_element_by_name(name, target_namespace)
    }
}
