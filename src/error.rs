use thiserror::Error;

use lather_util::{transport, xml};
use lather_wsdl::types::UnsupportedSoapVersion;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Error loading WSDL")]
    WsdlError(#[from] lather_wsdl::error::Error),

    #[error(transparent)]
    UnsupportedSoapVersion(#[from] UnsupportedSoapVersion),

    #[error("Unknown client option {0:?}")]
    UnknownOption(String),

    #[error("Invalid value {value:?} for client option {key}")]
    InvalidOption { key: String, value: String },

    #[error("WSDL contains no service named {0}")]
    ServiceNotFound(String),

    #[error("Service has no port named {0}")]
    PortNotFound(String),

    #[error("No such operation: {0}")]
    OperationNotFound(String),

    #[error("No input at {0:?}")]
    InputNotFound(String),

    #[error("An operation must be selected first")]
    NoOperationSelected,

    #[error("Can't set value of element {0}")]
    NotSetable(String),

    #[error("Element {0} does not repeat")]
    NotRepeatable(String),

    #[error("Element {element} declares no attribute {attribute}")]
    AttributeNotFound { element: String, attribute: String },

    #[error("Part {0} does not name an element known to the WSDL's schemas")]
    MissingPartElement(String),

    #[error("Operation {0} has no endpoint location")]
    MissingLocation(String),

    #[error("Invalid endpoint location")]
    LocationError(#[from] url::ParseError),

    #[error("Unable to write envelope")]
    XmlError(#[from] xml::Error),

    #[error("Connection failure")]
    Connection(#[source] transport::Error),
}
