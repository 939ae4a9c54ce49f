use bytes::Bytes;
use reqwest::blocking::Client as Reqwest;
use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    path::Path,
    rc::Rc,
};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to parse provided URL")]
    UrlParseError(#[from] url::ParseError),

    #[error("Unable to convert provided path {0}")]
    PathConversionError(String, #[source] Option<std::io::Error>),

    #[error("Unsupported URL scheme {0}")]
    UnsupportedScheme(String),

    #[error("Unable to open file {0}")]
    FileOpenError(String, #[source] std::io::Error),

    #[error("Unable to reach {0}")]
    ReqwestError(String, #[source] reqwest::Error),

    #[error("No document available at {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Per-request knobs the client forwards to whichever transport it uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    pub proxy: Option<String>,
    pub verify_tls: bool,
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lower case.
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

/// Moves documents and requests. `get` is used for WSDL and schema
/// retrieval, `post` for the SOAP call itself.
pub trait Transport {
    fn get(&self, url: &Url, options: &RequestOptions) -> Result<String, Error>;

    fn post(
        &self,
        url: &Url,
        headers: &[(String, String)],
        body: Vec<u8>,
        options: &RequestOptions,
    ) -> Result<HttpResponse, Error>;
}

/// Blocking transport backed by `reqwest`, reading `file://` URLs from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpTransport;

/// Serves canned documents and responses without touching the network.
/// Every posted request is recorded and can be inspected afterwards.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    documents: HashMap<String, String>,
    response: Option<HttpResponse>,
    requests: RefCell<Vec<PostedRequest>>,
}

#[derive(Debug, Clone)]
pub struct PostedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            proxy: None,
            verify_tls: true,
            credentials: None,
        }
    }
}

impl HttpResponse {
    pub fn new(status: u16, content_type: &str, body: impl Into<Bytes>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_owned(), content_type.to_owned());

        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Accepts an absolute URL or a filesystem path; paths become `file://` URLs.
pub fn parse_location<S: AsRef<str>>(location: S) -> Result<Url, Error> {
    let location = location.as_ref();

    let url = match Url::parse(location) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let path = Path::new(location)
                .canonicalize()
                .map_err(|err| Error::PathConversionError(location.to_owned(), Some(err)))?;

            Url::from_file_path(&path)
                .map_err(|()| Error::PathConversionError(location.to_owned(), None))?
        }
        Err(err) => return Err(err.into()),
    };

    match url.scheme() {
        "file" | "http" | "https" => Ok(url),
        other => Err(Error::UnsupportedScheme(other.into())),
    }
}

pub fn read_file(url: &Url) -> Result<String, Error> {
    let path = url
        .to_file_path()
        .map_err(|()| Error::PathConversionError(url.to_string(), None))?;

    std::fs::read_to_string(&path).map_err(|err| Error::FileOpenError(url.to_string(), err))
}

impl HttpTransport {
    fn client(options: &RequestOptions) -> Result<Reqwest, reqwest::Error> {
        let mut builder = Reqwest::builder().danger_accept_invalid_certs(!options.verify_tls);

        if let Some(proxy) = &options.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }

        builder.build()
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &Url, options: &RequestOptions) -> Result<String, Error> {
        debug!(%url, "fetching document");

        match url.scheme() {
            "file" => read_file(url),

            "http" | "https" => {
                let fetch = || -> Result<String, reqwest::Error> {
                    let mut request = Self::client(options)?.get(url.clone());
                    if let Some(credentials) = &options.credentials {
                        request =
                            request.basic_auth(&credentials.username, Some(&credentials.password));
                    }

                    request.send()?.error_for_status()?.text()
                };

                fetch().map_err(|err| Error::ReqwestError(url.to_string(), err))
            }

            other => Err(Error::UnsupportedScheme(other.into())),
        }
    }

    fn post(
        &self,
        url: &Url,
        headers: &[(String, String)],
        body: Vec<u8>,
        options: &RequestOptions,
    ) -> Result<HttpResponse, Error> {
        match url.scheme() {
            "http" | "https" => (),
            other => return Err(Error::UnsupportedScheme(other.into())),
        }

        info!(%url, bytes = body.len(), "posting request");

        let send = || -> Result<HttpResponse, reqwest::Error> {
            let mut request = Self::client(options)?.post(url.clone()).body(body);

            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }

            if let Some(credentials) = &options.credentials {
                request = request.basic_auth(&credentials.username, Some(&credentials.password));
            }

            let response = request.send()?;
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_owned(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect();

            Ok(HttpResponse {
                status,
                headers,
                body: response.bytes()?,
            })
        };

        send().map_err(|err| Error::ReqwestError(url.to_string(), err))
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: &str, text: impl Into<String>) -> Self {
        self.documents.insert(url.to_owned(), text.into());
        self
    }

    pub fn with_response(mut self, response: HttpResponse) -> Self {
        self.response = Some(response);
        self
    }

    pub fn requests(&self) -> Vec<PostedRequest> {
        self.requests.borrow().clone()
    }
}

impl Transport for MemoryTransport {
    fn get(&self, url: &Url, _: &RequestOptions) -> Result<String, Error> {
        match self.documents.get(url.as_str()) {
            Some(text) => Ok(text.clone()),
            None if url.scheme() == "file" => read_file(url),
            None => Err(Error::NotFound(url.to_string())),
        }
    }

    fn post(
        &self,
        url: &Url,
        headers: &[(String, String)],
        body: Vec<u8>,
        _: &RequestOptions,
    ) -> Result<HttpResponse, Error> {
        self.requests.borrow_mut().push(PostedRequest {
            url: url.to_string(),
            headers: headers.to_vec(),
            body,
        });

        self.response
            .clone()
            .ok_or_else(|| Error::NotFound(url.to_string()))
    }
}

/// Lets a caller keep a handle on a transport it hands over, e.g. to inspect
/// a [`MemoryTransport`]'s recorded requests.
impl<T: Transport + ?Sized> Transport for Rc<T> {
    fn get(&self, url: &Url, options: &RequestOptions) -> Result<String, Error> {
        (**self).get(url, options)
    }

    fn post(
        &self,
        url: &Url,
        headers: &[(String, String)],
        body: Vec<u8>,
        options: &RequestOptions,
    ) -> Result<HttpResponse, Error> {
        (**self).post(url, headers, body, options)
    }
}
