use std::rc::Rc;

use lather::{
    error::Error,
    plugins::{Doctor, Multipart},
    Client, HttpResponse, MemoryTransport, SoapVersion,
};

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

const BANK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
  <soapenv:Body>
    <ns1:getBankResponse xmlns:ns1="http://thomas-bayer.com/blz/">
      <ns1:details>
        <ns1:bezeichnung>Sparkasse KölnBonn</ns1:bezeichnung>
        <ns1:bic>COLSDE33XXX</ns1:bic>
      </ns1:details>
    </ns1:getBankResponse>
  </soapenv:Body>
</soapenv:Envelope>"#;

const ORDER_FAULT: &str = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
  <soapenv:Body>
    <soapenv:Fault>
      <faultcode>soapenv:Server</faultcode>
      <faultstring>Out of stock</faultstring>
      <detail><tns:orderFault xmlns:tns="urn:orders"><reason>sku A-1</reason></tns:orderFault></detail>
    </soapenv:Fault>
  </soapenv:Body>
</soapenv:Envelope>"#;

fn blz(transport: &Rc<MemoryTransport>, version: SoapVersion) -> Client {
    let mut client = Client::builder(fixture("blz.wsdl"))
        .version(version)
        .operation("getBank")
        .transport(Rc::clone(transport))
        .build()
        .unwrap();

    client.inputs_mut().unwrap()[0].set_value("blz", "37050198").unwrap();
    client
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

#[test]
fn selects_the_soap_port_for_the_version() {
    let transport = Rc::new(MemoryTransport::new());

    let client = blz(&transport, SoapVersion::V1_1);
    assert_eq!(client.operation_name().unwrap(), "getBank");
    assert_eq!(client.binding().unwrap().name(), "BLZServiceSOAP11Binding");
    assert_eq!(client.soap_action().unwrap(), Some("urn:getBank"));
    assert_eq!(
        client.location().unwrap().map(|url| url.as_str()),
        Some("http://www.thomas-bayer.com/axis2/services/BLZService")
    );
    assert_eq!(
        client.operation().unwrap().documentation(),
        Some("Looks up a bank by its routing code.")
    );
    assert_eq!(
        client.schema().unwrap().and_then(|schema| schema.name()),
        Some("http://thomas-bayer.com/blz/")
    );

    let client = blz(&transport, SoapVersion::V1_2);
    assert_eq!(client.binding().unwrap().name(), "BLZServiceSOAP12Binding");
}

#[test]
fn calls_post_the_envelope() {
    let transport = Rc::new(
        MemoryTransport::new().with_response(HttpResponse::new(200, "text/xml;charset=UTF-8", BANK)),
    );
    let mut client = blz(&transport, SoapVersion::V1_1);

    let response = client.call(&[]).unwrap();

    assert!(response.is_success());
    assert_eq!(response.status(), 200);
    assert_eq!(response.outputs().len(), 1);

    let details = response.outputs()[0].first_child_named("details").unwrap();
    assert_eq!(
        details.first_child_named("bic").map(|bic| bic.text()),
        Some("COLSDE33XXX")
    );

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "http://www.thomas-bayer.com/axis2/services/BLZService");
    assert_eq!(
        header(&requests[0].headers, "Content-Type"),
        Some("text/xml;charset=UTF-8")
    );
    assert_eq!(header(&requests[0].headers, "SOAPAction"), Some("\"urn:getBank\""));
    assert_eq!(
        String::from_utf8(requests[0].body.clone()).unwrap(),
        client.request_envelope().unwrap()
    );
}

#[test]
fn soap_12_moves_the_action_into_the_content_type() {
    let transport = Rc::new(
        MemoryTransport::new().with_response(HttpResponse::new(200, "application/soap+xml", BANK)),
    );
    let mut client = blz(&transport, SoapVersion::V1_2);
    client.call(&[]).unwrap();

    let requests = transport.requests();
    let headers = &requests[0].headers;
    assert_eq!(
        header(headers, "Content-Type"),
        Some("application/soap+xml;charset=UTF-8;action=\"urn:getBank\"")
    );
    assert_eq!(header(headers, "SOAPAction"), None);
}

#[test]
fn doctors_rewrite_requests_in_order() {
    let transport = Rc::new(
        MemoryTransport::new().with_response(HttpResponse::new(200, "text/xml", BANK)),
    );
    let mut client = blz(&transport, SoapVersion::V1_1);

    let relocate = |client: &mut Client, xml: String| -> String {
        client.set_location("http://localhost:8080/blz").unwrap();
        xml.replace("37050198", "10020030")
    };
    let annotate = |client: &mut Client, xml: String| -> String {
        client.set_header("X-Trace", "1");
        format!("<!-- traced -->{}", xml)
    };

    let doctors: [&dyn Doctor; 2] = [&relocate, &annotate];
    client.call(&doctors).unwrap();

    let requests = transport.requests();
    let request = &requests[0];
    let body = String::from_utf8(request.body.clone()).unwrap();

    assert_eq!(request.url, "http://localhost:8080/blz");
    assert!(body.starts_with("<!-- traced --><soapenv:Envelope"));
    assert!(body.contains("<tns:blz>10020030</tns:blz>"));
    assert_eq!(header(&request.headers, "X-Trace"), Some("1"));
}

#[test]
fn client_headers_override_defaults() {
    let transport = Rc::new(
        MemoryTransport::new().with_response(HttpResponse::new(200, "text/xml", BANK)),
    );
    let mut client = blz(&transport, SoapVersion::V1_1);
    client.set_header("soapaction", "\"custom\"");

    client.call(&[]).unwrap();

    let requests = transport.requests();
    let headers = &requests[0].headers;
    assert_eq!(
        headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("SOAPAction"))
            .count(),
        1
    );
    assert_eq!(header(headers, "SOAPAction"), Some("\"custom\""));
}

#[test]
fn multipart_wraps_the_envelope() {
    let transport = Rc::new(
        MemoryTransport::new().with_response(HttpResponse::new(200, "text/xml", BANK)),
    );
    let mut client = blz(&transport, SoapVersion::V1_1);

    let multipart = Multipart::new("MIME_BOUNDARY").attach("note", "text/plain", "hello");
    let doctors: [&dyn Doctor; 1] = [&multipart];
    client.call(&doctors).unwrap();

    let requests = transport.requests();
    let request = &requests[0];
    let body = String::from_utf8(request.body.clone()).unwrap();

    assert_eq!(
        header(&request.headers, "Content-Type"),
        Some(r#"multipart/related; type="text/xml"; start="<rootpart@lather>"; boundary="MIME_BOUNDARY""#)
    );
    assert!(body.starts_with(
        "--MIME_BOUNDARY\r\nContent-Type: text/xml;charset=UTF-8\r\nContent-ID: <rootpart@lather>\r\n\r\n<soapenv:Envelope"
    ));
    assert!(body.contains("--MIME_BOUNDARY\r\nContent-Type: text/plain\r\nContent-ID: <note>\r\n\r\nhello\r\n"));
    assert!(body.ends_with("--MIME_BOUNDARY--\r\n"));
}

#[test]
fn faults_make_responses_unsuccessful() {
    let transport = Rc::new(
        MemoryTransport::new().with_response(HttpResponse::new(500, "text/xml", ORDER_FAULT)),
    );
    let mut client = Client::builder(fixture("orders.wsdl"))
        .operation("placeOrder")
        .transport(Rc::clone(&transport))
        .build()
        .unwrap();

    let response = client.call(&[]).unwrap();

    assert!(!response.is_success());
    assert!(response.outputs().is_empty());
    assert_eq!(response.faults().len(), 1);
    assert_eq!(response.faults()[0].local_name(), "orderFault");

    let fault = response.soap_fault().unwrap();
    assert_eq!(fault.fault_code, "soapenv:Server");
    assert_eq!(fault.fault_string, "Out of stock");
}

#[test]
fn non_xml_answers_are_unsuccessful() {
    let transport = Rc::new(
        MemoryTransport::new().with_response(HttpResponse::new(502, "text/html", "<h1>Bad Gateway</h1>")),
    );
    let mut client = blz(&transport, SoapVersion::V1_1);

    let response = client.call(&[]).unwrap();

    assert!(!response.is_xml());
    assert!(response.outputs().is_empty());
    assert!(!response.is_success());
}

#[test]
fn transport_failures_are_connection_errors() {
    let transport = Rc::new(MemoryTransport::new());
    let mut client = blz(&transport, SoapVersion::V1_1);

    assert!(matches!(client.call(&[]), Err(Error::Connection(_))));
}

#[test]
fn configured_location_overrides_the_port() {
    let client = Client::builder(fixture("blz.wsdl"))
        .location("https://mirror.example.com/blz")
        .operation("getBank")
        .build()
        .unwrap();

    assert_eq!(
        client.location().unwrap().map(|url| url.as_str()),
        Some("https://mirror.example.com/blz")
    );
}

#[test]
fn nothing_is_available_before_an_operation_is_selected() {
    let mut client = Client::new(fixture("blz.wsdl")).unwrap();

    assert!(matches!(client.inputs(), Err(Error::NoOperationSelected)));
    assert!(matches!(client.location(), Err(Error::NoOperationSelected)));
    assert!(matches!(client.schema(), Err(Error::NoOperationSelected)));
    assert!(matches!(client.request_envelope(), Err(Error::NoOperationSelected)));
    assert!(matches!(client.call(&[]), Err(Error::NoOperationSelected)));

    client.select_operation("getBank").unwrap();
    assert_eq!(client.inputs().unwrap().len(), 1);
}

#[test]
fn selections_name_what_was_missing() {
    let mut client = Client::new(fixture("blz.wsdl")).unwrap();

    assert!(matches!(
        client.select_service("Nope"),
        Err(Error::ServiceNotFound(name)) if name == "Nope"
    ));
    assert!(matches!(
        client.select_operation("getCity"),
        Err(Error::OperationNotFound(name)) if name == "getCity"
    ));

    client.select_service("BLZService").unwrap();
    client.select_operation("getBank").unwrap();

    assert!(matches!(
        Client::builder(fixture("blz.wsdl")).port("Nope").operation("getBank").build(),
        Err(Error::PortNotFound(_))
    ));
}

#[test]
fn ports_can_be_preselected() {
    let client = Client::builder(fixture("blz.wsdl"))
        .port("BLZServiceSOAP12port_http")
        .operation("getBank")
        .build()
        .unwrap();

    assert_eq!(client.binding().unwrap().soap_version(), Some(SoapVersion::V1_2));
}

#[test]
fn rpc_bindings_fail_at_construction() {
    assert!(matches!(
        Client::new(fixture("rpc.wsdl")),
        Err(Error::WsdlError(lather::wsdl::error::Error::UnsupportedBindingStyle { style, .. })) if style == "rpc"
    ));
}
