//! Collaborators shared by the WSDL model and the client: moving bytes over
//! `file`/`http`/`https`, and writing XML text.

pub mod transport;
pub mod xml;
