//! Renders input trees into a SOAP envelope.

use tracing::trace;

use lather_util::xml::{
    into_string, qualify, write_end, write_raw, write_start, write_text_element, Writer,
    NO_ATTRIBUTES,
};
use lather_wsdl::{
    types::{ElementDecl, SoapVersion, XML_SCHEMA_INSTANCE},
    Wsdl,
};

use super::{
    error::Error,
    inputs::{InputId, InputKind, InputTree},
};

/// `xmlns` declarations collected while rendering, in declaration order.
#[derive(Default, Debug, Clone)]
struct Namespaces {
    declarations: Vec<(String, String)>,
    generated: usize,
}

impl Namespaces {
    fn declare(&mut self, prefix: &str, uri: &str) {
        if !self.declarations.iter().any(|(declared, _)| declared == prefix) {
            self.declarations.push((prefix.to_owned(), uri.to_owned()));
        }
    }

    /// The prefix bound to `uri`, binding a fresh `nsN` if there is none.
    fn add_or_get(&mut self, uri: &str) -> String {
        if let Some((prefix, _)) = self.declarations.iter().find(|(_, value)| value == uri) {
            return prefix.clone();
        }

        let prefix = format!("ns{}", self.generated);
        self.generated += 1;
        self.declarations.push((prefix.clone(), uri.to_owned()));
        prefix
    }

    fn attributes(&self) -> Vec<(String, &str)> {
        self.declarations
            .iter()
            .map(|(prefix, uri)| (format!("xmlns:{}", prefix), uri.as_str()))
            .collect()
    }
}

pub struct Envelope<'w> {
    wsdl: &'w Wsdl,
    version: SoapVersion,
    namespaces: Namespaces,
}

impl<'w> Envelope<'w> {
    pub fn new(wsdl: &'w Wsdl, version: SoapVersion) -> Self {
        Self {
            wsdl,
            version,
            namespaces: Namespaces::default(),
        }
    }

    /// Renders one body element per input tree. The same trees always
    /// render to the same text.
    pub fn render(mut self, inputs: &[InputTree]) -> Result<String, Error> {
        let wsdl = self.wsdl;

        self.namespaces
            .declare("soapenv", self.version.envelope_namespace());

        let target = inputs
            .first()
            .and_then(|tree| {
                let decl = tree.node(tree.root()).decl();
                wsdl.graph().schema(decl.definition.schema).name()
            })
            .or_else(|| wsdl.target_namespace());

        if let Some(target) = target {
            self.namespaces.declare("tns", target);
        }

        // Declarations are only known once the body has been rendered.
        let mut body = Writer::new(Vec::new());
        for tree in inputs {
            self.render_node(&mut body, tree, tree.root(), true)?;
        }
        let body = into_string(body)?;

        let declarations = self.namespaces.attributes();
        let mut writer = Writer::new(Vec::new());

        write_start(
            &mut writer,
            "soapenv:Envelope",
            declarations
                .iter()
                .map(|(name, uri)| (name.as_str(), *uri)),
            false,
        )?;
        write_start(&mut writer, "soapenv:Header", NO_ATTRIBUTES, true)?;
        write_start(&mut writer, "soapenv:Body", NO_ATTRIBUTES, false)?;
        write_raw(&mut writer, &body)?;
        write_end(&mut writer, "soapenv:Body")?;
        write_end(&mut writer, "soapenv:Envelope")?;

        Ok(into_string(writer)?)
    }

    fn render_node(
        &mut self,
        writer: &mut Writer<Vec<u8>>,
        tree: &InputTree,
        id: InputId,
        top_level: bool,
    ) -> Result<(), Error> {
        let node = tree.node(id);

        match node.kind() {
            _ if node.inner_xml().is_some() => self.render_instance(writer, tree, id, top_level, false),

            InputKind::Repeatable { elements } | InputKind::Collection { containers: elements } => {
                let forced = node.render_empty();
                let filled: Vec<_> = elements
                    .iter()
                    .copied()
                    .filter(|instance| tree.has_content(*instance))
                    .collect();

                if filled.is_empty() {
                    return self.render_instance(writer, tree, elements[0], top_level, forced);
                }

                for instance in filled {
                    self.render_instance(writer, tree, instance, top_level, forced)?;
                }
                Ok(())
            }

            _ => self.render_instance(writer, tree, id, top_level, false),
        }
    }

    fn render_instance(
        &mut self,
        writer: &mut Writer<Vec<u8>>,
        tree: &InputTree,
        id: InputId,
        top_level: bool,
        forced: bool,
    ) -> Result<(), Error> {
        let node = tree.node(id);
        let decl = node.decl();
        let forced = forced || node.render_empty();
        let has_content = tree.has_content(id);

        if !has_content && !forced && !top_level && decl.is_optional() {
            trace!(name = %decl.name, "omitting empty optional element");
            return Ok(());
        }

        let mut attributes: Vec<(&str, &str)> = node
            .attributes()
            .iter()
            .filter_map(|attribute| {
                attribute
                    .value
                    .as_deref()
                    .map(|value| (attribute.name.as_str(), value))
            })
            .collect();

        let name = self.tag_name(decl, top_level);

        if let Some(xml) = node.inner_xml() {
            write_start(writer, &name, attributes, false)?;
            write_raw(writer, xml)?;
            write_end(writer, &name)?;
            return Ok(());
        }

        if let Some(value) = node.value() {
            write_text_element(writer, &name, attributes, value)?;
            return Ok(());
        }

        let children_render = (has_content || forced)
            && node
                .children()
                .iter()
                .any(|child| Self::node_renders(tree, *child));

        if children_render {
            write_start(writer, &name, attributes, false)?;
            for child in node.children() {
                self.render_node(writer, tree, *child, false)?;
            }
            write_end(writer, &name)?;
            return Ok(());
        }

        if has_content {
            write_start(writer, &name, attributes, false)?;
            write_end(writer, &name)?;
            return Ok(());
        }

        if decl.nillable {
            self.namespaces.declare("xsi", XML_SCHEMA_INSTANCE);
            attributes.push(("xsi:nil", "true"));
        }

        write_start(writer, &name, attributes, true)?;
        Ok(())
    }

    /// Whether [`Self::render_node`] writes anything for a non-top-level node.
    fn node_renders(tree: &InputTree, id: InputId) -> bool {
        let node = tree.node(id);

        match node.kind() {
            _ if node.inner_xml().is_some() => true,

            InputKind::Repeatable { elements } | InputKind::Collection { containers: elements } => {
                elements.iter().any(|instance| tree.has_content(*instance))
                    || Self::instance_renders(tree, elements[0], node.render_empty())
            }

            _ => Self::instance_renders(tree, id, false),
        }
    }

    fn instance_renders(tree: &InputTree, id: InputId, forced: bool) -> bool {
        let node = tree.node(id);
        forced || node.render_empty() || tree.has_content(id) || !node.decl().is_optional()
    }

    /// The tag for `decl`, binding its schema's namespace. Only qualified
    /// elements carry the prefix.
    fn tag_name(&mut self, decl: &ElementDecl, top_level: bool) -> String {
        let schema = self.wsdl.graph().schema(decl.definition.schema);
        let prefix = schema.name().map(|uri| self.namespaces.add_or_get(uri));

        match prefix {
            Some(prefix) if top_level || decl.is_qualified(schema) => {
                qualify(Some(&prefix), &decl.name)
            }
            _ => decl.name.clone(),
        }
    }
}
