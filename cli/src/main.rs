use structopt::StructOpt;
use thiserror::Error;
use tracing::{warn, Level};

use lather::{wsdl, Client, ClientBuilder};

#[derive(Debug, Error)]
enum Error {
    #[error("Error parsing WSDL")]
    ParseError(#[from] wsdl::error::Error),

    #[error(transparent)]
    ClientError(#[from] lather::error::Error),

    #[error("Expected key=value, got {0:?}")]
    InvalidPair(String),

    #[error("Operation has no input message")]
    NoInputs,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn parse_pair(pair: &str) -> Result<(String, String), Error> {
    pair.split_once('=')
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .ok_or_else(|| Error::InvalidPair(pair.to_owned()))
}

#[derive(StructOpt)]
struct Request {
    operation: String,

    /// Input values as path=value, e.g. details.name=foo
    #[structopt(short, long = "set", parse(try_from_str = parse_pair), number_of_values = 1)]
    set: Vec<(String, String)>,
}

#[derive(StructOpt)]
enum Command {
    /// List services, ports and operations
    Operations,

    /// Print the input tree of an operation
    Inputs { operation: String },

    /// Render the request envelope
    Envelope(Request),

    /// Send the request and print the response body
    Call {
        #[structopt(flatten)]
        request: Request,

        #[structopt(long)]
        location: Option<String>,
    },
}

#[derive(StructOpt)]
struct Args {
    /// WSDL URL or path
    wsdl: String,

    /// Client options as key=value (version, proxy, verify, username, password, service, port)
    #[structopt(short, long = "option", parse(try_from_str = parse_pair), number_of_values = 1)]
    options: Vec<(String, String)>,

    #[structopt(short, long, parse(from_occurrences))]
    verbose: u8,

    #[structopt(subcommand)]
    command: Command,
}

fn list_operations(client: &Client) -> Result<(), Error> {
    for service in client.wsdl().services() {
        println!("{}", service.name());

        for port in service.ports() {
            let binding = port.binding()?;
            let version = binding.and_then(|binding| binding.soap_version());

            match version {
                Some(version) => println!("  {} (SOAP {})", port.name(), version),
                None => println!("  {} (not SOAP)", port.name()),
            }

            for operation in binding
                .and_then(|binding| binding.port_type())
                .map(|port_type| port_type.operations())
                .unwrap_or_default()
            {
                match operation.documentation() {
                    Some(docs) => println!("    {} - {}", operation.name(), docs),
                    None => println!("    {}", operation.name()),
                }
            }
        }
    }

    Ok(())
}

fn prepare(builder: ClientBuilder, request: &Request) -> Result<Client, Error> {
    let mut client = builder.operation(&request.operation).build()?;

    if !request.set.is_empty() {
        let input = client.inputs_mut()?.first_mut().ok_or(Error::NoInputs)?;

        for (path, value) in &request.set {
            input.set_value(path, value)?;
        }
    }

    Ok(client)
}

#[paw::main]
fn main(args: Args) -> Result<(), Error> {
    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut builder = Client::builder(args.wsdl);
    for (key, value) in &args.options {
        builder = builder.option(key, value)?;
    }

    match args.command {
        Command::Operations => list_operations(&builder.build()?)?,

        Command::Inputs { operation } => {
            let client = builder.operation(operation).build()?;
            for input in client.inputs()? {
                print!("{}", input);
            }
        }

        Command::Envelope(request) => {
            let client = prepare(builder, &request)?;
            println!("{}", client.request_envelope()?);
        }

        Command::Call { request, location } => {
            if let Some(location) = location {
                builder = builder.location(location);
            }

            let mut client = prepare(builder, &request)?;
            let response = client.call(&[])?;

            if !response.is_success() {
                warn!(status = response.status(), "call did not succeed");
            }

            if let Some(fault) = response.soap_fault() {
                warn!(code = %fault.fault_code, reason = %fault.fault_string, "SOAP fault");
            }

            println!("{}", response.text().unwrap_or_default());
        }
    }

    Ok(())
}
