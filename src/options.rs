use tracing::debug;

use lather_util::transport::{Credentials, HttpTransport, RequestOptions, Transport};
use lather_wsdl::types::SoapVersion;

use super::{client::Client, error::Error};

/// Settings fixed when a [`Client`] is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOptions {
    pub version: SoapVersion,
    /// Proxy, TLS verification and basic auth, used for every request.
    pub request: RequestOptions,
    pub service: Option<String>,
    pub port: Option<String>,
    pub operation: Option<String>,
    /// Endpoint to use instead of the port's address.
    pub location: Option<String>,
}

pub struct ClientBuilder {
    wsdl: String,
    options: ClientOptions,
    transport: Option<Box<dyn Transport>>,
}

fn parse_bool(key: &str, value: &str) -> Result<bool, Error> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(Error::InvalidOption {
            key: key.to_owned(),
            value: value.to_owned(),
        }),
    }
}

impl ClientBuilder {
    /// Starts a client for the WSDL at `wsdl` (a URL or a filesystem path).
    pub fn new<S: Into<String>>(wsdl: S) -> Self {
        Self {
            wsdl: wsdl.into(),
            options: ClientOptions::default(),
            transport: None,
        }
    }

    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn version(mut self, version: SoapVersion) -> Self {
        self.options.version = version;
        self
    }

    pub fn proxy<S: Into<String>>(mut self, proxy: S) -> Self {
        self.options.request.proxy = Some(proxy.into());
        self
    }

    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.options.request.verify_tls = verify;
        self
    }

    pub fn credentials<U: Into<String>, P: Into<String>>(mut self, username: U, password: P) -> Self {
        self.options.request.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn service<S: Into<String>>(mut self, service: S) -> Self {
        self.options.service = Some(service.into());
        self
    }

    pub fn port<S: Into<String>>(mut self, port: S) -> Self {
        self.options.port = Some(port.into());
        self
    }

    pub fn operation<S: Into<String>>(mut self, operation: S) -> Self {
        self.options.operation = Some(operation.into());
        self
    }

    pub fn location<S: Into<String>>(mut self, location: S) -> Self {
        self.options.location = Some(location.into());
        self
    }

    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Applies a `key=value` style option, as given on the command line.
    pub fn option(mut self, key: &str, value: &str) -> Result<Self, Error> {
        debug!(key, value, "client option");

        match key {
            "version" => self.options.version = value.parse()?,
            "proxy" => self.options.request.proxy = Some(value.to_owned()),
            "verify" | "verify_tls" => self.options.request.verify_tls = parse_bool(key, value)?,

            "username" => {
                let credentials = self.options.request.credentials.get_or_insert(Credentials {
                    username: String::new(),
                    password: String::new(),
                });
                credentials.username = value.to_owned();
            }

            "password" => {
                let credentials = self.options.request.credentials.get_or_insert(Credentials {
                    username: String::new(),
                    password: String::new(),
                });
                credentials.password = value.to_owned();
            }

            "service" => self.options.service = Some(value.to_owned()),
            "port" => self.options.port = Some(value.to_owned()),
            "operation" => self.options.operation = Some(value.to_owned()),
            "location" => self.options.location = Some(value.to_owned()),

            other => return Err(Error::UnknownOption(other.to_owned())),
        }

        Ok(self)
    }

    /// Loads the WSDL and applies any preselected service and operation.
    pub fn build(self) -> Result<Client, Error> {
        let transport = self
            .transport
            .unwrap_or_else(|| Box::new(HttpTransport));

        Client::with_options(&self.wsdl, self.options, transport)
    }
}
