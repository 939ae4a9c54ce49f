use lather_util::transport::{HttpTransport, MemoryTransport, RequestOptions};
use lather_wsdl::{error::Error, load, types::SoapVersion, Wsdl};
use url::Url;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn read(name: &str) -> String {
    std::fs::read_to_string(fixture(name)).unwrap()
}

#[test]
fn follows_imports_and_includes() {
    let wsdl = load(fixture("catalog.wsdl"), &HttpTransport, &RequestOptions::default()).unwrap();

    let schemas: Vec<_> = wsdl
        .schemas()
        .iter()
        .map(|schema| (schema.name(), schema.is_local))
        .collect();

    assert_eq!(
        schemas,
        [
            (Some("urn:catalog"), true),
            (Some("urn:common"), false),
            (Some("urn:common"), false),
            (Some("urn:extra"), false),
        ]
    );
    assert_eq!(wsdl.definitions().len(), 2);
    assert_eq!(wsdl.target_namespace(), Some("urn:catalog"));
}

#[test]
fn imported_definitions_take_part_in_lookups() {
    let wsdl = load(fixture("catalog.wsdl"), &HttpTransport, &RequestOptions::default()).unwrap();

    let port = wsdl.service("Catalog").unwrap().ports().remove(0);
    let binding = port.binding().unwrap().unwrap();
    assert_eq!(binding.soap_version(), Some(SoapVersion::V1_2));
    assert_eq!(binding.soap_action("lookup"), None);

    let operation = binding.port_type().unwrap().operation("lookup").unwrap();
    assert_eq!(operation.input().unwrap().name(), "lookupRequest");
    assert_eq!(operation.faults().len(), 1);

    let lookup = operation.input().unwrap().parts()[0].element().unwrap().unwrap();
    assert_eq!(lookup.name, "lookup");
}

#[test]
fn resolves_types_across_schemas() {
    let wsdl = load(fixture("catalog.wsdl"), &HttpTransport, &RequestOptions::default()).unwrap();
    let graph = wsdl.graph();

    let lookup = graph
        .element(wsdl.find_element_by_name("tns:lookup", None).unwrap())
        .unwrap();
    let children = graph.element_children(&lookup, &[]).unwrap();

    let names: Vec<_> = children.iter().map(|decl| decl.name.as_str()).collect();
    assert_eq!(names, ["item", "unit"]);

    let unit = &children[1];
    assert!(unit.global);
    assert!(unit.is_optional());
    assert_eq!(unit.enum_hint, ["kg", "m"]);
    assert_eq!(unit.documentation.as_deref(), Some("Unit of measure."));
    assert_eq!(graph.schema(unit.definition.schema).name(), Some("urn:common"));

    let item = graph.element_children(&children[0], &[lookup.tag]).unwrap();
    assert_eq!(item[0].name, "code");
    assert_eq!(item[1].name, "origin");
    assert_eq!(graph.schema(children[0].definition.schema).name(), Some("urn:catalog"));
    assert_eq!(graph.schema(item[0].definition.schema).name(), Some("urn:common"));

    let origin = graph.element_children(&item[1], &[lookup.tag, children[0].tag]).unwrap();
    assert_eq!(origin[0].name, "country");
    assert_eq!(graph.schema(origin[0].definition.schema).name(), Some("urn:extra"));
}

#[test]
fn parses_from_memory() {
    let base = "http://example.com/svc/";
    let transport = MemoryTransport::new()
        .with_document(&format!("{}catalog-messages.wsdl", base), read("catalog-messages.wsdl"))
        .with_document(&format!("{}common.xsd", base), read("common.xsd"))
        .with_document(&format!("{}units.xsd", base), read("units.xsd"))
        .with_document(&format!("{}extra/extra.xsd", base), read("extra/extra.xsd"));

    let location = Url::parse(base).unwrap().join("catalog.wsdl").unwrap();
    let wsdl = Wsdl::parse(&read("catalog.wsdl"), location, &transport, &RequestOptions::default())
        .unwrap();

    assert_eq!(wsdl.schemas().len(), 4);
    assert_eq!(wsdl.location().as_str(), "http://example.com/svc/catalog.wsdl");
}

#[test]
fn missing_imports_are_errors() {
    let location = Url::parse("http://example.com/catalog.wsdl").unwrap();
    let err = Wsdl::parse(
        &read("catalog.wsdl"),
        location,
        &MemoryTransport::new(),
        &RequestOptions::default(),
    )
    .unwrap_err();

    assert!(matches!(err, Error::TransportError(_)));
}

#[test]
fn rejects_documents_without_definitions() {
    let location = Url::parse("http://example.com/units.xsd").unwrap();
    let err = Wsdl::parse(
        &read("units.xsd"),
        location,
        &MemoryTransport::new(),
        &RequestOptions::default(),
    )
    .unwrap_err();

    assert!(matches!(err, Error::MissingDefinitions(_)));
}

#[test]
fn rejects_unknown_schemes() {
    let err = load(
        "ftp://example.com/service.wsdl",
        &HttpTransport,
        &RequestOptions::default(),
    )
    .unwrap_err();

    assert!(matches!(err, Error::TransportError(_)));
}

#[test]
fn schema_imports_may_use_location() {
    let document = r#"<?xml version="1.0"?>
<wsdl:definitions xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/" xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:legacy">
  <wsdl:types>
    <xs:schema targetNamespace="urn:legacy">
      <xs:import namespace="urn:extra" location="schemas/extra.xsd"/>
    </xs:schema>
  </wsdl:types>
</wsdl:definitions>"#;

    let origin = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:extra">
  <xs:complexType name="Origin"><xs:sequence><xs:element name="country" type="xs:string"/></xs:sequence></xs:complexType>
</xs:schema>"#;

    let transport =
        MemoryTransport::new().with_document("http://example.com/legacy/schemas/extra.xsd", origin);
    let location = Url::parse("http://example.com/legacy/service.wsdl").unwrap();
    let wsdl = Wsdl::parse(document, location, &transport, &RequestOptions::default()).unwrap();

    let schemas: Vec<_> = wsdl
        .schemas()
        .iter()
        .map(|schema| (schema.name(), schema.is_local))
        .collect();
    assert_eq!(schemas, [(Some("urn:legacy"), true), (Some("urn:extra"), false)]);
    assert!(wsdl.find_type_by_name("Origin", Some("urn:extra")).is_some());
}
