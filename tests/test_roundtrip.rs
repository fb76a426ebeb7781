use easyxml::{Error, XmlBuilder, XmlParser};
use proptest::prelude::*;

fn build<F>(content: F) -> Result<String, Error>
where
    F: FnOnce(&mut XmlBuilder<'_>) -> Result<(), Error>,
{
    let mut builder = XmlBuilder::new();
    builder.start_document()?.start_element("v")?;
    content(&mut builder)?;
    builder.end_element()?.end_document()?;
    builder.output()
}

fn read_value(xml: &str) -> Result<Option<String>, Error> {
    let mut parser = XmlParser::new(xml);
    let value = parser.value("v")?;
    parser.parse()?;
    Ok(value.take())
}

// carriage returns are normalized by any conforming reader, so they are
// left out
const CONTENT: &str = "[a-zA-Z0-9 <>&\\]\"'\n\täß€]{0,40}";

proptest! {
    #[test]
    fn test_cdata_roundtrip(content in CONTENT) {
        let xml = build(|builder| {
            builder.write_cdata(&content)?;
            Ok(())
        }).unwrap();
        prop_assert_eq!(read_value(&xml).unwrap().unwrap_or_default(), content);
    }

    #[test]
    fn test_text_roundtrip(content in CONTENT) {
        let xml = build(|builder| {
            builder.text(&content)?;
            Ok(())
        }).unwrap();
        prop_assert_eq!(read_value(&xml).unwrap().unwrap_or_default(), content);
    }

    #[test]
    fn test_attribute_roundtrip(content in CONTENT) {
        let xml = build(|builder| {
            builder.write_attribute("a", content.as_str())?;
            Ok(())
        }).unwrap();
        let mut parser = XmlParser::new(&xml);
        let value = parser.attribute("v", "a").unwrap();
        parser.parse().unwrap();
        prop_assert_eq!(value.take(), Some(content));
    }
}

#[test]
fn test_cdata_terminator_survives() {
    let xml = build(|builder| {
        builder.write_cdata("a]]>b")?;
        Ok(())
    })
    .unwrap();
    assert!(xml.contains("<![CDATA[a]]]]><![CDATA[>b]]>"));
    assert_eq!(read_value(&xml).unwrap().as_deref(), Some("a]]>b"));
}
