//! Handles onto the WSDL's structural tags. Each handle borrows the
//! [`Wsdl`] and resolves its cross references on demand.

use std::{fmt, rc::Rc};
use tracing::warn;

use lather_util::xml::local_name;

use super::{
    dom::{Node, NodeId},
    error::Error,
    schema::Lookup,
    types::{ElementDecl, SchemaNode, SoapVersion},
    Wsdl,
};

macro_rules! wsdl_handle {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Clone, Copy)]
            pub struct $name<'w> {
                wsdl: &'w Wsdl,
                tag: NodeId,
            }

            impl<'w> $name<'w> {
                pub(crate) fn from_tag(wsdl: &'w Wsdl, tag: NodeId) -> Self {
                    Self { wsdl, tag }
                }

                pub fn tag(&self) -> NodeId {
                    self.tag
                }

                pub fn node(&self) -> Node<'w> {
                    self.wsdl.tree().node(self.tag)
                }

                pub fn name(&self) -> &'w str {
                    self.node().attribute("name").unwrap_or_default()
                }
            }

            impl fmt::Debug for $name<'_> {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.debug_struct(stringify!($name))
                        .field("name", &self.name())
                        .finish()
                }
            }
        )*
    };
}

wsdl_handle!(Service, Port, Binding, PortType, Operation, Message, Part);

/// Finds a top-level definition (`message`, `portType`, ...) by the local
/// part of its qualified name.
pub(crate) fn find_definition<'w>(wsdl: &'w Wsdl, kind: &str, name: &str) -> Option<Node<'w>> {
    let name = local_name(name);

    wsdl.definitions()
        .iter()
        .flat_map(|root| wsdl.tree().node(*root).children())
        .find(|node| node.local_name() == kind && node.attribute("name") == Some(name))
}

pub(crate) fn definitions_named<'w>(wsdl: &'w Wsdl, kind: &str) -> Vec<Node<'w>> {
    wsdl.definitions()
        .iter()
        .flat_map(|root| wsdl.tree().node(*root).children())
        .filter(|node| node.local_name() == kind)
        .collect()
}

impl<'w> Service<'w> {
    pub fn ports(&self) -> Vec<Port<'w>> {
        let wsdl = self.wsdl;

        self.node()
            .children_named("port")
            .map(|port| Port::from_tag(wsdl, port.id()))
            .collect()
    }

    pub fn port(&self, name: &str) -> Option<Port<'w>> {
        self.ports().into_iter().find(|port| port.name() == name)
    }
}

impl<'w> Port<'w> {
    pub fn binding_name(&self) -> Option<&'w str> {
        self.node().attribute("binding")
    }

    /// The referenced binding, validated. `Ok(None)` when the port names a
    /// binding that is not defined.
    pub fn binding(&self) -> Result<Option<Binding<'w>>, Error> {
        match self.binding_name() {
            Some(name) => self.wsdl.binding(name),
            None => Ok(None),
        }
    }

    /// The endpoint URL from the port's `address` extension element.
    pub fn location(&self) -> Option<&'w str> {
        self.node()
            .first_child_named("address")
            .and_then(|address| address.attribute("location"))
    }
}

impl<'w> Binding<'w> {
    /// Wraps a `<binding>` tag, rejecting anything but document style.
    pub fn new(wsdl: &'w Wsdl, tag: NodeId) -> Result<Self, Error> {
        let binding = Self::from_tag(wsdl, tag);

        if let Some(soap) = binding.soap_binding() {
            binding.check_style(soap.attribute("style"))?;
        }

        for operation in binding.node().children_named("operation") {
            if let Some(soap) = operation.first_child_named("operation") {
                binding.check_style(soap.attribute("style"))?;
            }
        }

        Ok(binding)
    }

    fn check_style(&self, style: Option<&str>) -> Result<(), Error> {
        match style.unwrap_or("document") {
            "document" => Ok(()),
            other => Err(Error::UnsupportedBindingStyle {
                binding: self.name().to_owned(),
                style: other.to_owned(),
            }),
        }
    }

    fn soap_binding(&self) -> Option<Node<'w>> {
        self.node().first_child_named("binding")
    }

    pub fn soap_version(&self) -> Option<SoapVersion> {
        let soap = self.soap_binding()?;
        let uri = soap.lookup_namespace(soap.prefix())?;

        SoapVersion::from_binding_namespace(uri)
    }

    pub fn is_soap(&self) -> bool {
        self.soap_version().is_some()
    }

    pub fn port_type_name(&self) -> Option<&'w str> {
        self.node().attribute("type")
    }

    pub fn port_type(&self) -> Option<PortType<'w>> {
        let wsdl = self.wsdl;

        self.port_type_name()
            .and_then(|name| find_definition(wsdl, "portType", name))
            .map(|node| PortType::from_tag(wsdl, node.id()))
    }

    /// The `soapAction` declared for `operation`, if any.
    pub fn soap_action(&self, operation: &str) -> Option<&'w str> {
        let action = self
            .node()
            .children_named("operation")
            .find(|node| node.attribute("name") == Some(operation))
            .and_then(|node| node.first_child_named("operation"))
            .and_then(|soap| soap.attribute("soapAction"));

        if action.is_none() {
            warn!(binding = self.name(), operation, "no SOAPAction declared");
        }

        action
    }
}

impl<'w> PortType<'w> {
    pub fn operations(&self) -> Vec<Operation<'w>> {
        let wsdl = self.wsdl;

        self.node()
            .children_named("operation")
            .map(|operation| Operation::from_tag(wsdl, operation.id()))
            .collect()
    }

    pub fn operation(&self, name: &str) -> Option<Operation<'w>> {
        self.operations()
            .into_iter()
            .find(|operation| operation.name() == name)
    }
}

impl<'w> Operation<'w> {
    fn message(&self, direction: Node<'w>) -> Option<Message<'w>> {
        let wsdl = self.wsdl;

        direction
            .attribute("message")
            .and_then(|name| find_definition(wsdl, "message", name))
            .map(|node| Message::from_tag(wsdl, node.id()))
    }

    pub fn input(&self) -> Option<Message<'w>> {
        self.node()
            .first_child_named("input")
            .and_then(|input| self.message(input))
    }

    pub fn output(&self) -> Option<Message<'w>> {
        self.node()
            .first_child_named("output")
            .and_then(|output| self.message(output))
    }

    pub fn faults(&self) -> Vec<Message<'w>> {
        let faults: Vec<_> = self
            .node()
            .children_named("fault")
            .filter_map(|fault| self.message(fault))
            .collect();

        if faults.is_empty() {
            warn!(operation = self.name(), "operation declares no faults");
        }

        faults
    }

    pub fn documentation(&self) -> Option<&'w str> {
        self.node()
            .first_child_named("documentation")
            .map(|docs| docs.text().trim())
            .filter(|docs| !docs.is_empty())
    }
}

impl<'w> Message<'w> {
    pub fn parts(&self) -> Vec<Part<'w>> {
        let wsdl = self.wsdl;

        self.node()
            .children_named("part")
            .map(|part| Part::from_tag(wsdl, part.id()))
            .collect()
    }
}

impl<'w> Part<'w> {
    /// The qualified name of the part's element (or type, for parts
    /// declared with `type=`).
    pub fn element_name(&self) -> Option<&'w str> {
        let node = self.node();
        node.attribute("element").or_else(|| node.attribute("type"))
    }

    pub fn schema_node(&self) -> Option<SchemaNode> {
        let element = self.node().attribute("element")?;

        self.wsdl
            .graph()
            .resolve_reference(self.tag, element, Lookup::Element)
            .filter(|node| node.kind.is_element())
    }

    /// The declaration of the part's element. `Ok(None)` when the element
    /// cannot be found in any loaded schema.
    pub fn element(&self) -> Result<Option<Rc<ElementDecl>>, Error> {
        match self.schema_node() {
            Some(node) => self.wsdl.graph().element(node).map(Some),
            None => Ok(None),
        }
    }
}
