use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

use lather_util::transport::{RequestOptions, Transport};

use super::{
    dom::{NodeId, Tree},
    error::Error,
    namespace::Namespace,
    schema::SchemaGraph,
    types::Schema,
    Wsdl,
};

/// Collects the WSDL, every imported WSDL and every reachable schema into
/// one tree.
struct Parser<'a> {
    transport: &'a dyn Transport,
    options: &'a RequestOptions,

    tree: Tree,
    seen: HashSet<Url>,
    definitions: Vec<NodeId>,
    schemas: Vec<Schema>,
}

enum Import<'a> {
    Wsdl,
    Schema,
    Include { namespace: Option<&'a str> },
}

impl<'a> Parser<'a> {
    fn new(transport: &'a dyn Transport, options: &'a RequestOptions) -> Self {
        Self {
            transport,
            options,

            tree: Tree::new(),
            seen: HashSet::new(),
            definitions: Vec::new(),
            schemas: Vec::new(),
        }
    }

    fn parse(mut self, url: Url, text: &str) -> Result<Wsdl, Error> {
        info!(%url, "loading WSDL");
        self.seen.insert(url.clone());

        let root = self.tree.parse(text)?;
        if self.tree.node(root).local_name() != "definitions" {
            return Err(Error::MissingDefinitions(url.to_string()));
        }

        self.handle_definitions(root, &url, true)?;

        let namespace = Namespace::of(self.tree.node(root));
        debug!(
            documents = self.seen.len(),
            schemas = self.schemas.len(),
            "finished loading WSDL"
        );

        Ok(Wsdl {
            location: url,
            definitions: self.definitions,
            graph: SchemaGraph::new(self.tree, namespace, self.schemas),
        })
    }

    fn handle_definitions(&mut self, root: NodeId, url: &Url, is_local: bool) -> Result<(), Error> {
        self.definitions.push(root);

        let node = self.tree.node(root);

        let imports: Vec<String> = node
            .children_named("import")
            .filter_map(|import| import.attribute("location"))
            .map(str::to_owned)
            .collect();

        let schemas: Vec<NodeId> = node
            .children_named("types")
            .flat_map(|types| types.children_named("schema"))
            .map(|schema| schema.id())
            .collect();

        for schema in schemas {
            self.handle_schema(schema, url, is_local, None)?;
        }

        for location in imports {
            self.import(url, &location, Import::Wsdl)?;
        }

        Ok(())
    }

    fn handle_schema(
        &mut self,
        tag: NodeId,
        url: &Url,
        is_local: bool,
        inherited_namespace: Option<&str>,
    ) -> Result<(), Error> {
        let schema = Schema::read(self.tree.node(tag), url.clone(), is_local, inherited_namespace);
        let namespace = schema.target_namespace.clone();

        debug!(namespace = ?namespace, %url, is_local, "registering schema");
        self.schemas.push(schema);

        let mut imports = Vec::new();
        for child in self.tree.node(tag).children() {
            let include = match child.local_name() {
                "import" => false,
                "include" | "redefine" => true,
                _ => continue,
            };

            match child
                .attribute("schemaLocation")
                .or_else(|| child.attribute("location"))
            {
                Some(location) => imports.push((location.to_owned(), include)),
                None => debug!(
                    namespace = ?child.attribute("namespace"),
                    "import without schemaLocation, assuming the schema is already loaded"
                ),
            }
        }

        for (location, include) in imports {
            let kind = if include {
                Import::Include {
                    namespace: namespace.as_deref(),
                }
            } else {
                Import::Schema
            };

            self.import(url, &location, kind)?;
        }

        Ok(())
    }

    fn import(&mut self, base: &Url, location: &str, kind: Import<'_>) -> Result<(), Error> {
        let url = base.join(location)?;

        if !self.seen.insert(url.clone()) {
            debug!(%url, "already imported");
            return Ok(());
        }

        info!(%url, "importing");
        let text = self.transport.get(&url, self.options)?;
        let root = self.tree.parse(&text)?;
        let root_name = self.tree.node(root).local_name().to_owned();

        match (root_name.as_str(), kind) {
            ("definitions", _) => self.handle_definitions(root, &url, false),
            ("schema", Import::Include { namespace }) => {
                self.handle_schema(root, &url, false, namespace)
            }
            ("schema", _) => self.handle_schema(root, &url, false, None),
            (other, _) => {
                warn!(%url, root = other, "imported document is neither a WSDL nor a schema");
                Ok(())
            }
        }
    }
}

pub fn parse(
    url: Url,
    text: &str,
    transport: &dyn Transport,
    options: &RequestOptions,
) -> Result<Wsdl, Error> {
    Parser::new(transport, options).parse(url, text)
}
