//! The answer to a SOAP call, sliced by the operation's declared output and
//! fault elements.

use bytes::Bytes;
use tracing::debug;

use lather_util::transport::HttpResponse;
use lather_wsdl::dom::{Node, NodeId, Tree};

/// A SOAP `Fault` from the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFault {
    /// `faultcode` (1.1) or `Code/Value` (1.2), e.g. `soapenv:Client`.
    pub fault_code: String,

    /// `faultstring` (1.1) or the first `Reason/Text` (1.2).
    pub fault_string: String,

    /// Serialised content of the `detail` element, if any.
    pub detail: Option<String>,
}

pub struct Response {
    http: HttpResponse,
    document: Option<(Tree, NodeId)>,
    output_names: Vec<String>,
    fault_names: Vec<String>,
}

fn is_empty(node: Node<'_>) -> bool {
    node.text().trim().is_empty() && node.children().next().is_none()
}

fn child_text<'t>(node: Node<'t>, path: &[&str]) -> Option<&'t str> {
    let mut current = node;
    for name in path {
        current = current.first_child_named(name)?;
    }
    Some(current.text().trim())
}

impl Response {
    pub(crate) fn new(http: HttpResponse, output_names: Vec<String>, fault_names: Vec<String>) -> Self {
        let is_xml = http
            .content_type()
            .map(|content_type| content_type.contains("xml"))
            .unwrap_or(false);

        let document = if is_xml {
            parse_document(&http.body)
        } else {
            debug!(content_type = ?http.content_type(), "response is not XML");
            None
        };

        Self {
            http,
            document,
            output_names,
            fault_names,
        }
    }

    pub fn status(&self) -> u16 {
        self.http.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.http.header(name)
    }

    pub fn body(&self) -> &Bytes {
        &self.http.body
    }

    /// The body as text, when it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.http.body).ok()
    }

    pub fn is_xml(&self) -> bool {
        self.document.is_some()
    }

    /// Root element of the parsed response.
    pub fn document(&self) -> Option<Node<'_>> {
        self.document.as_ref().map(|(tree, root)| tree.node(*root))
    }

    fn named(&self, names: &[String]) -> Vec<Node<'_>> {
        let root = match self.document() {
            Some(root) => root,
            None => return Vec::new(),
        };

        names
            .iter()
            .flat_map(|name| root.descendants_named(name))
            .collect()
    }

    /// Elements matching the output message's parts. Shorter than the part
    /// list when the service answered with something else.
    pub fn outputs(&self) -> Vec<Node<'_>> {
        self.named(&self.output_names)
    }

    /// Non-empty elements matching the operation's fault messages.
    pub fn faults(&self) -> Vec<Node<'_>> {
        self.named(&self.fault_names)
            .into_iter()
            .filter(|fault| !is_empty(*fault))
            .collect()
    }

    pub fn soap_fault(&self) -> Option<SoapFault> {
        let fault = self
            .document()?
            .descendants_named("Fault")
            .into_iter()
            .next()?;

        let (fault_code, fault_string, detail) = if fault.first_child_named("Code").is_some() {
            (
                child_text(fault, &["Code", "Value"]),
                child_text(fault, &["Reason", "Text"]),
                fault.first_child_named("Detail"),
            )
        } else {
            (
                child_text(fault, &["faultcode"]),
                child_text(fault, &["faultstring"]),
                fault.first_child_named("detail"),
            )
        };

        Some(SoapFault {
            fault_code: fault_code.unwrap_or_default().to_owned(),
            fault_string: fault_string.unwrap_or_default().to_owned(),
            detail: detail
                .filter(|detail| !is_empty(*detail))
                .and_then(|detail| {
                    detail
                        .children()
                        .map(Node::to_xml)
                        .collect::<Result<String, _>>()
                        .ok()
                }),
        })
    }

    /// A 2xx XML answer carrying every declared output and no fault.
    pub fn is_success(&self) -> bool {
        self.http.is_success()
            && self.is_xml()
            && self.outputs().len() >= self.output_names.len()
            && self.faults().is_empty()
            && self.soap_fault().is_none()
    }
}

fn parse_document(body: &[u8]) -> Option<(Tree, NodeId)> {
    let text = match std::str::from_utf8(body) {
        Ok(text) => text,
        Err(e) => {
            debug!(error = %e, "response body is not UTF-8");
            return None;
        }
    };

    let mut tree = Tree::new();
    match tree.parse(text) {
        Ok(root) => Some((tree, root)),
        Err(e) => {
            debug!(error = %e, "unparseable XML response");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK: &str = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
        <soapenv:Body>
            <ns1:getBankResponse xmlns:ns1="http://thomas-bayer.com/blz/">
                <ns1:details><ns1:bezeichnung>Bank</ns1:bezeichnung></ns1:details>
            </ns1:getBankResponse>
        </soapenv:Body>
    </soapenv:Envelope>"#;

    const FAULT_11: &str = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
        <soapenv:Body>
            <soapenv:Fault>
                <faultcode>soapenv:Client</faultcode>
                <faultstring>Bad routing code</faultstring>
                <detail><code>42</code></detail>
            </soapenv:Fault>
        </soapenv:Body>
    </soapenv:Envelope>"#;

    const FAULT_12: &str = r#"<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope">
        <env:Body>
            <env:Fault>
                <env:Code><env:Value>env:Sender</env:Value></env:Code>
                <env:Reason><env:Text xml:lang="en">Bad routing code</env:Text></env:Reason>
            </env:Fault>
        </env:Body>
    </env:Envelope>"#;

    fn response(status: u16, content_type: &str, body: &str) -> Response {
        Response::new(
            HttpResponse::new(status, content_type, body.to_owned()),
            vec!["getBankResponse".to_owned()],
            vec!["bankFault".to_owned()],
        )
    }

    #[test]
    fn slices_outputs() {
        let response = response(200, "text/xml;charset=UTF-8", OK);

        assert!(response.is_xml());
        assert!(response.is_success());
        assert_eq!(response.outputs().len(), 1);
        assert_eq!(response.outputs()[0].local_name(), "getBankResponse");
        assert!(response.faults().is_empty());
        assert_eq!(response.soap_fault(), None);
    }

    #[test]
    fn reads_soap_11_faults() {
        let response = response(500, "text/xml", FAULT_11);

        assert!(!response.is_success());
        assert!(response.outputs().is_empty());
        assert_eq!(
            response.soap_fault(),
            Some(SoapFault {
                fault_code: "soapenv:Client".to_owned(),
                fault_string: "Bad routing code".to_owned(),
                detail: Some("<code>42</code>".to_owned()),
            })
        );
    }

    #[test]
    fn reads_soap_12_faults() {
        let fault = response(500, "application/soap+xml", FAULT_12)
            .soap_fault()
            .unwrap();

        assert_eq!(fault.fault_code, "env:Sender");
        assert_eq!(fault.fault_string, "Bad routing code");
        assert_eq!(fault.detail, None);
    }

    #[test]
    fn html_error_pages_are_not_success() {
        let response = response(500, "text/html", "<html><body>oops</body></html>");

        assert!(!response.is_xml());
        assert!(response.document().is_none());
        assert!(response.outputs().is_empty());
        assert_eq!(response.text(), Some("<html><body>oops</body></html>"));
        assert!(!response.is_success());
    }

    #[test]
    fn empty_fault_elements_are_ignored() {
        let body = OK.replace(
            "</ns1:getBankResponse>",
            "</ns1:getBankResponse><ns1:bankFault/>",
        );
        let response = response(200, "text/xml", &body);

        assert!(response.faults().is_empty());
        assert!(response.is_success());
    }
}
