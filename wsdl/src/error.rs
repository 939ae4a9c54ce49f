use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to parse provided URL")]
    UrlParseError(#[from] url::ParseError),

    #[error("Unable to retrieve document")]
    TransportError(#[from] lather_util::transport::Error),

    #[error("Error reading or writing XML")]
    XmlParseError(#[from] quick_xml::Error),

    #[error("XML input is not valid UTF-8")]
    Utf8Error(#[from] std::str::Utf8Error),

    #[error("XML input has no root element")]
    EmptyDocument,

    #[error("Unclosed element <{0}> at end of input")]
    UnclosedElement(String),

    #[error("Document at {0} does not contain WSDL definitions")]
    MissingDefinitions(String),

    #[error("XML Element Type <{0}> not yet implemented")]
    NotImplemented(String),

    #[error("No namespace defined in this element with name {0}")]
    NamespaceNotFound(String),

    #[error("Binding {binding} uses style {style:?}; only document style bindings are supported")]
    UnsupportedBindingStyle { binding: String, style: String },
}
