use tracing::{debug, error, info};
use url::Url;

use lather_util::{
    transport::{HttpTransport, Transport},
    xml::local_name,
};
use lather_wsdl::{
    model::{Binding, Message, Operation, Port, Service},
    types::{Schema, SoapVersion},
    Wsdl,
};

use super::{
    error::Error,
    inputs::InputTree,
    marshal::Envelope,
    options::{ClientBuilder, ClientOptions},
    plugins::Doctor,
    response::Response,
};

/// Everything derived from the selected operation. Rebuilt whenever the
/// selection changes.
struct Selection {
    binding: String,
    operation: String,
    location: Option<Url>,
    inputs: Vec<InputTree>,
    outputs: Vec<String>,
    faults: Vec<String>,
}

pub struct Client {
    wsdl: Wsdl,
    options: ClientOptions,
    transport: Box<dyn Transport>,
    service: Option<String>,
    selection: Option<Selection>,
    headers: Vec<(String, String)>,
}

fn element_names(messages: &[Message<'_>]) -> Vec<String> {
    messages
        .iter()
        .flat_map(|message| message.parts())
        .filter_map(|part| part.element_name())
        .map(|name| local_name(name).to_owned())
        .collect()
}

impl Client {
    /// Loads the WSDL at `location` with default options over HTTP.
    pub fn new<S: AsRef<str>>(location: S) -> Result<Self, Error> {
        Self::with_options(location.as_ref(), ClientOptions::default(), Box::new(HttpTransport))
    }

    pub fn builder<S: Into<String>>(location: S) -> ClientBuilder {
        ClientBuilder::new(location)
    }

    pub(crate) fn with_options(
        location: &str,
        options: ClientOptions,
        transport: Box<dyn Transport>,
    ) -> Result<Self, Error> {
        let wsdl = lather_wsdl::load(location, transport.as_ref(), &options.request)?;

        let bindings = wsdl.bindings()?.len();
        debug!(location, bindings, "loaded WSDL");

        let mut client = Self {
            wsdl,
            options,
            transport,
            service: None,
            selection: None,
            headers: Vec::new(),
        };

        if let Some(service) = client.options.service.clone() {
            client.select_service(&service)?;
        }

        if let Some(operation) = client.options.operation.clone() {
            client.select_operation(&operation)?;
        }

        Ok(client)
    }

    pub fn wsdl(&self) -> &Wsdl {
        &self.wsdl
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn version(&self) -> SoapVersion {
        self.options.version
    }

    /// Restricts operation lookups to one service. Clears the selected
    /// operation.
    pub fn select_service(&mut self, name: &str) -> Result<(), Error> {
        if self.wsdl.service(name).is_none() {
            error!(service = name, "no such service");
            return Err(Error::ServiceNotFound(name.to_owned()));
        }

        info!(service = name, "selected service");
        self.service = Some(name.to_owned());
        self.selection = None;
        Ok(())
    }

    pub fn service(&self) -> Option<Service<'_>> {
        self.service
            .as_deref()
            .and_then(|name| self.wsdl.service(name))
    }

    /// Selects `name` from the first SOAP port offering it, preferring ports
    /// bound to the configured SOAP version, and builds fresh inputs for it.
    pub fn select_operation(&mut self, name: &str) -> Result<(), Error> {
        let selection = self.resolve_operation(name)?;

        info!(
            operation = name,
            location = ?selection.location.as_ref().map(Url::as_str),
            "selected operation"
        );

        self.selection = Some(selection);
        Ok(())
    }

    fn candidate_ports(&self) -> Result<Vec<Port<'_>>, Error> {
        let services: Vec<Service<'_>> = match &self.service {
            Some(name) => self.wsdl.service(name).into_iter().collect(),
            None => self.wsdl.services(),
        };

        let mut ports: Vec<_> = services.iter().flat_map(|service| service.ports()).collect();

        if let Some(port) = &self.options.port {
            ports.retain(|candidate| candidate.name() == port);

            if ports.is_empty() {
                error!(port = %port, "no such port");
                return Err(Error::PortNotFound(port.clone()));
            }
        }

        Ok(ports)
    }

    fn resolve_operation(&self, name: &str) -> Result<Selection, Error> {
        let mut found: Option<(Port<'_>, Binding<'_>, Operation<'_>)> = None;

        for port in self.candidate_ports()? {
            let binding = match port.binding()? {
                Some(binding) if binding.is_soap() => binding,
                _ => continue,
            };

            let operation = match binding.port_type().and_then(|port_type| port_type.operation(name)) {
                Some(operation) => operation,
                None => continue,
            };

            if binding.soap_version() == Some(self.options.version) {
                found = Some((port, binding, operation));
                break;
            }

            if found.is_none() {
                found = Some((port, binding, operation));
            }
        }

        let (port, binding, operation) = match found {
            Some(found) => found,
            None => {
                error!(operation = name, "no such operation");
                return Err(Error::OperationNotFound(name.to_owned()));
            }
        };

        debug!(port = port.name(), binding = binding.name(), operation = name, "resolved operation");

        let mut inputs = Vec::new();
        for part in operation.input().map(|message| message.parts()).unwrap_or_default() {
            let decl = part
                .element()?
                .ok_or_else(|| Error::MissingPartElement(part.name().to_owned()))?;

            inputs.push(InputTree::build(self.wsdl.graph(), part.name(), decl)?);
        }

        let location = match self.options.location.as_deref().or_else(|| port.location()) {
            Some(location) => Some(Url::parse(location)?),
            None => None,
        };

        Ok(Selection {
            binding: binding.name().to_owned(),
            operation: operation.name().to_owned(),
            location,
            inputs,
            outputs: element_names(&operation.output().into_iter().collect::<Vec<_>>()),
            faults: element_names(&operation.faults()),
        })
    }

    fn selection(&self) -> Result<&Selection, Error> {
        self.selection.as_ref().ok_or(Error::NoOperationSelected)
    }

    fn selection_mut(&mut self) -> Result<&mut Selection, Error> {
        self.selection.as_mut().ok_or(Error::NoOperationSelected)
    }

    pub fn operation_name(&self) -> Result<&str, Error> {
        Ok(&self.selection()?.operation)
    }

    pub fn binding(&self) -> Result<Binding<'_>, Error> {
        let selection = self.selection()?;

        self.wsdl
            .binding(&selection.binding)?
            .ok_or_else(|| Error::OperationNotFound(selection.operation.clone()))
    }

    pub fn operation(&self) -> Result<Operation<'_>, Error> {
        let selection = self.selection()?;

        self.binding()?
            .port_type()
            .and_then(|port_type| port_type.operation(&selection.operation))
            .ok_or_else(|| Error::OperationNotFound(selection.operation.clone()))
    }

    pub fn soap_action(&self) -> Result<Option<&str>, Error> {
        let selection = self.selection()?;
        Ok(self.binding()?.soap_action(&selection.operation))
    }

    pub fn location(&self) -> Result<Option<&Url>, Error> {
        Ok(self.selection()?.location.as_ref())
    }

    pub fn set_location(&mut self, location: &str) -> Result<(), Error> {
        let location = Url::parse(location)?;
        info!(%location, "changed location");

        self.selection_mut()?.location = Some(location);
        Ok(())
    }

    /// One input tree per part of the operation's input message.
    pub fn inputs(&self) -> Result<&[InputTree], Error> {
        Ok(&self.selection()?.inputs)
    }

    pub fn inputs_mut(&mut self) -> Result<&mut [InputTree], Error> {
        Ok(&mut self.selection_mut()?.inputs)
    }

    /// The input tree for the part named `part`.
    pub fn input_mut(&mut self, part: &str) -> Result<&mut InputTree, Error> {
        self.inputs_mut()?
            .iter_mut()
            .find(|input| input.part() == part)
            .ok_or_else(|| Error::InputNotFound(part.to_owned()))
    }

    /// The schema declaring the operation's first input element.
    pub fn schema(&self) -> Result<Option<&Schema>, Error> {
        let schema = self.inputs()?.first().map(|input| {
            let decl = input.node(input.root()).decl();
            self.wsdl.graph().schema(decl.definition.schema)
        });

        Ok(schema)
    }

    /// Adds a request header, replacing any header of the same name.
    pub fn set_header<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        let name = name.into();
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn request_envelope(&self) -> Result<String, Error> {
        Envelope::new(&self.wsdl, self.options.version).render(self.inputs()?)
    }

    fn request_headers(&self) -> Result<Vec<(String, String)>, Error> {
        let action = self.soap_action()?;
        let version = self.options.version;

        let mut headers = vec![("Content-Type".to_owned(), version.content_type(action))];
        if let (SoapVersion::V1_1, Some(action)) = (version, action) {
            headers.push(("SOAPAction".to_owned(), format!("\"{}\"", action)));
        }

        for (name, value) in &self.headers {
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }

        Ok(headers)
    }

    /// Renders the envelope, passes it through `doctors` in order and posts
    /// it to the operation's location.
    pub fn call(&mut self, doctors: &[&dyn Doctor]) -> Result<Response, Error> {
        let mut xml = self.request_envelope()?;
        for doctor in doctors {
            xml = doctor.treat(self, xml);
        }

        let selection = self.selection()?;
        let location = selection
            .location
            .clone()
            .ok_or_else(|| Error::MissingLocation(selection.operation.clone()))?;

        let headers = self.request_headers()?;
        debug!(%location, operation = %selection.operation, "calling operation");

        let response = self
            .transport
            .post(&location, &headers, xml.into_bytes(), &self.options.request)
            .map_err(Error::Connection)?;

        info!(status = response.status, "received response");
        Ok(Response::new(
            response,
            selection.outputs.clone(),
            selection.faults.clone(),
        ))
    }
}
