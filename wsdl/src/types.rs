use std::{fmt, str::FromStr};
use thiserror::Error;
use url::Url;

use super::{dom::NodeId, namespace::Namespace};

pub const XML_SCHEMA: &str = "http://www.w3.org/2001/XMLSchema";
pub const XML_SCHEMA_INSTANCE: &str = "http://www.w3.org/2001/XMLSchema-instance";

pub const WSDL_SOAP11: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
pub const WSDL_SOAP12: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    Element,
    ComplexType,
    SimpleType,
    Union,
    List,
    Sequence,
    All,
    Choice,
    ComplexContent,
    SimpleContent,
    Extension,
    Restriction,
    Enumeration,
    Annotation,
    Documentation,
}

pub type SchemaId = usize;

/// A schema tag the type factory recognised, tied to the schema declaring it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaNode {
    pub tag: NodeId,
    pub kind: SchemaKind,
    pub schema: SchemaId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    Qualified,
    Unqualified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurs {
    Count(u32),
    Unbounded,
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub tag: NodeId,
    /// The schema's name. Chameleon includes adopt the includer's namespace.
    pub target_namespace: Option<String>,
    pub element_form: Form,
    pub attribute_form: Form,
    pub namespace: Namespace,
    /// Declared inside the primary WSDL rather than pulled in by an import.
    pub is_local: bool,
    pub location: Url,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDecl {
    pub name: String,
    pub type_name: Option<String>,
    pub default: Option<String>,
    pub fixed: bool,
}

/// Annotated, immutable view of an `element` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDecl {
    /// The `element` tag this declaration was read from.
    pub tag: NodeId,
    /// Where name, type and children come from. Differs from `tag` for
    /// `ref=` elements.
    pub definition: SchemaNode,
    pub name: String,
    pub type_name: Option<String>,
    pub min_occurs: Occurs,
    pub max_occurs: Occurs,
    pub nillable: bool,
    pub form: Form,
    /// Declared at schema top level (or reached through `ref=`).
    pub global: bool,
    pub enum_hint: Vec<String>,
    pub documentation: Option<String>,
    pub attributes: Vec<AttributeDecl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoapVersion {
    #[default]
    V1_1,
    V1_2,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unsupported SOAP version {0:?}; expected 1.1 or 1.2")]
pub struct UnsupportedSoapVersion(pub String);

impl SchemaKind {
    pub fn is_element(self) -> bool {
        self == SchemaKind::Element
    }

    pub fn is_type(self) -> bool {
        matches!(self, SchemaKind::ComplexType | SchemaKind::SimpleType)
    }
}

impl Form {
    pub fn parse(value: Option<&str>, default: Form) -> Form {
        match value {
            Some("qualified") => Form::Qualified,
            Some("unqualified") => Form::Unqualified,
            _ => default,
        }
    }
}

impl Occurs {
    /// Reads a `minOccurs`/`maxOccurs` value. Absent or malformed values
    /// mean one.
    pub fn parse(value: Option<&str>) -> Occurs {
        match value.map(str::trim) {
            Some("unbounded") => Occurs::Unbounded,
            Some(count) => Occurs::Count(count.parse().unwrap_or(1)),
            None => Occurs::Count(1),
        }
    }

    pub fn is_zero(self) -> bool {
        self == Occurs::Count(0)
    }

    pub fn allows_many(self) -> bool {
        match self {
            Occurs::Unbounded => true,
            Occurs::Count(count) => count > 1,
        }
    }
}

impl fmt::Display for Occurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Occurs::Count(count) => write!(f, "{}", count),
            Occurs::Unbounded => f.write_str("unbounded"),
        }
    }
}

impl ElementDecl {
    pub fn is_optional(&self) -> bool {
        self.min_occurs.is_zero()
    }

    pub fn is_repeatable(&self) -> bool {
        self.max_occurs.allows_many()
    }

    /// Whether the element's tag carries its namespace prefix when
    /// rendered below the top level.
    pub fn is_qualified(&self, schema: &Schema) -> bool {
        self.global || (schema.element_form == Form::Qualified && self.form == Form::Qualified)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDecl> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }
}

impl SoapVersion {
    pub fn envelope_namespace(self) -> &'static str {
        match self {
            SoapVersion::V1_1 => "http://schemas.xmlsoap.org/soap/envelope/",
            SoapVersion::V1_2 => "http://www.w3.org/2003/05/soap-envelope",
        }
    }

    pub fn binding_namespace(self) -> &'static str {
        match self {
            SoapVersion::V1_1 => WSDL_SOAP11,
            SoapVersion::V1_2 => WSDL_SOAP12,
        }
    }

    pub fn from_binding_namespace(uri: &str) -> Option<Self> {
        match uri {
            WSDL_SOAP11 => Some(SoapVersion::V1_1),
            WSDL_SOAP12 => Some(SoapVersion::V1_2),
            _ => None,
        }
    }

    /// `Content-Type` of a request, carrying the action for SOAP 1.2.
    pub fn content_type(self, action: Option<&str>) -> String {
        match (self, action) {
            (SoapVersion::V1_1, _) => "text/xml;charset=UTF-8".to_owned(),
            (SoapVersion::V1_2, Some(action)) => {
                format!("application/soap+xml;charset=UTF-8;action=\"{}\"", action)
            }
            (SoapVersion::V1_2, None) => "application/soap+xml;charset=UTF-8".to_owned(),
        }
    }
}

impl FromStr for SoapVersion {
    type Err = UnsupportedSoapVersion;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "1.1" | "11" => Ok(SoapVersion::V1_1),
            "1.2" | "12" => Ok(SoapVersion::V1_2),
            other => Err(UnsupportedSoapVersion(other.to_owned())),
        }
    }
}

impl fmt::Display for SoapVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SoapVersion::V1_1 => "1.1",
            SoapVersion::V1_2 => "1.2",
        })
    }
}
