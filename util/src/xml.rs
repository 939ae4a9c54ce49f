use std::io::Write;

pub use quick_xml::{
    escape::escape,
    events::{self, BytesEnd, BytesStart, BytesText, Event},
    Error, Result, Writer,
};

pub const NO_ATTRIBUTES: [(&str, &str); 0] = [];

/// Splits `prefix:local` into its parts. Names without a prefix yield `None`.
pub fn split_qualified_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

pub fn local_name(name: &str) -> &str {
    split_qualified_name(name).1
}

pub fn qualify(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, name),
        None => name.to_owned(),
    }
}

/// Writes `<name a="v" ...>`, or `<name .../>` when `self_closing`.
pub fn write_start<'a, W, I>(
    writer: &mut Writer<W>,
    name: &str,
    attributes: I,
    self_closing: bool,
) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let start = BytesStart::new(name).with_attributes(attributes);

    if self_closing {
        writer.write_event(Event::Empty(start))
    } else {
        writer.write_event(Event::Start(start))
    }
}

pub fn write_end<W: Write>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(name)))
}

pub fn write_text<W: Write>(writer: &mut Writer<W>, text: &str) -> Result<()> {
    writer.write_event(Event::Text(BytesText::new(text)))
}

/// Writes `xml` as it is, without escaping.
pub fn write_raw<W: Write>(writer: &mut Writer<W>, xml: &str) -> Result<()> {
    writer.write_event(Event::Text(BytesText::from_escaped(xml)))
}

/// Writes `<name attrs>text</name>` with `text` escaped.
pub fn write_text_element<'a, W, I>(
    writer: &mut Writer<W>,
    name: &str,
    attributes: I,
    text: &str,
) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    write_start(writer, name, attributes, false)?;
    write_text(writer, text)?;
    write_end(writer, name)
}

pub fn into_string(writer: Writer<Vec<u8>>) -> Result<String> {
    String::from_utf8(writer.into_inner()).map_err(|error| error.utf8_error().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_names() {
        assert_eq!(split_qualified_name("xsd:string"), (Some("xsd"), "string"));
        assert_eq!(split_qualified_name("string"), (None, "string"));
        assert_eq!(local_name("tns:getBank"), "getBank");
    }

    #[test]
    fn writes_escaped_elements() {
        let mut writer = Writer::new(Vec::new());
        write_text_element(&mut writer, "tns:q", [("lang", "a\"b")], "1 < 2 & 3").unwrap();

        assert_eq!(
            into_string(writer).unwrap(),
            "<tns:q lang=\"a&quot;b\">1 &lt; 2 &amp; 3</tns:q>"
        );
    }

    #[test]
    fn writes_self_closing_tags() {
        let mut writer = Writer::new(Vec::new());
        write_start(&mut writer, "empty", [("xsi:nil", "true")], true).unwrap();

        assert_eq!(into_string(writer).unwrap(), "<empty xsi:nil=\"true\"/>");
    }

    #[test]
    fn writes_raw_content_verbatim() {
        let mut writer = Writer::new(Vec::new());
        write_start(&mut writer, "wrapper", NO_ATTRIBUTES, false).unwrap();
        write_raw(&mut writer, "<raw a=\"1\">&amp;</raw>").unwrap();
        write_end(&mut writer, "wrapper").unwrap();

        assert_eq!(
            into_string(writer).unwrap(),
            "<wrapper><raw a=\"1\">&amp;</raw></wrapper>"
        );
    }
}
