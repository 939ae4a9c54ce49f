use super::{dom::Node, error::Error};

/// Prefix to URI declarations made directly on one element.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    declarations: Vec<(Option<String>, String)>,
}

impl Namespace {
    /// Scrapes the `xmlns` and `xmlns:*` attributes of `node`.
    pub fn of(node: Node<'_>) -> Self {
        let declarations = node
            .attributes()
            .filter_map(|(key, value)| match key.split_once(':') {
                Some(("xmlns", prefix)) => Some((Some(prefix.to_owned()), value.to_owned())),
                None if key == "xmlns" => Some((None, value.to_owned())),
                _ => None,
            })
            .collect();

        Self { declarations }
    }

    pub fn resolve(&self, prefix: &str) -> Result<&str, Error> {
        self.declarations
            .iter()
            .find(|(declared, _)| declared.as_deref() == Some(prefix))
            .map(|(_, uri)| uri.as_str())
            .ok_or_else(|| Error::NamespaceNotFound(prefix.to_owned()))
    }

    pub fn default_namespace(&self) -> Option<&str> {
        self.declarations
            .iter()
            .find(|(declared, _)| declared.is_none())
            .map(|(_, uri)| uri.as_str())
    }

    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.declarations
            .iter()
            .find(|(declared, value)| declared.is_some() && value == uri)
            .and_then(|(declared, _)| declared.as_deref())
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.declarations
            .iter()
            .filter_map(|(prefix, _)| prefix.as_deref())
    }
}
