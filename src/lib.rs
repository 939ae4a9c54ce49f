//! A SOAP client driven by WSDL.
//!
//! ```no_run
//! # fn main() -> Result<(), lather::error::Error> {
//! let mut client = lather::Client::builder("http://www.thomas-bayer.com/axis2/services/BLZService?wsdl")
//!     .operation("getBank")
//!     .build()?;
//!
//! client.inputs_mut()?[0].set_value("blz", "37050198")?;
//!
//! let response = client.call(&[])?;
//! for output in response.outputs() {
//!     println!("{}", output.to_xml()?);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod options;

pub mod error;
pub mod inputs;
pub mod marshal;
pub mod plugins;
pub mod response;

pub use self::{
    client::Client,
    options::{ClientBuilder, ClientOptions},
};

pub use lather_util::transport::{
    Credentials, HttpResponse, HttpTransport, MemoryTransport, RequestOptions, Transport,
};
pub use lather_wsdl::{self as wsdl, types::SoapVersion, Wsdl};
