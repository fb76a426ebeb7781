use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use easyxml::{Data, DataKind, Error, XmlBuilder};
use insta::assert_snapshot;
use rstest::rstest;

const DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

#[derive(Clone, Default)]
struct SharedSink(Rc<RefCell<Vec<u8>>>);

impl SharedSink {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_simple_document() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .start_element("doc")
        .unwrap()
        .write_attribute("id", 5)
        .unwrap()
        .write_element("p", "a < b & c")
        .unwrap()
        .write_element("empty", Data::Null)
        .unwrap()
        .end_element()
        .unwrap()
        .end_document()
        .unwrap();
    assert_eq!(
        builder.output().unwrap(),
        format!(
            "{}<doc id=\"5\"><p>a &lt; b &amp; c</p><empty/></doc>\n",
            DECLARATION
        )
    );
}

#[test]
fn test_force_end_element() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .start_element("doc")
        .unwrap()
        .force_end_element()
        .unwrap()
        .end_document()
        .unwrap();
    assert_eq!(
        builder.output().unwrap(),
        format!("{}<doc></doc>\n", DECLARATION)
    );
}

#[test]
fn test_misuse_emits_nothing() {
    let mut builder = XmlBuilder::new();
    builder.start_document().unwrap();
    let before = builder.output().unwrap();
    assert_eq!(before, DECLARATION);

    assert!(matches!(
        builder.end_element(),
        Err(Error::IllegalState(_))
    ));
    assert!(matches!(builder.text("x"), Err(Error::IllegalState(_))));
    assert!(matches!(
        builder.start_attribute("a"),
        Err(Error::IllegalState(_))
    ));
    assert!(matches!(builder.data("x"), Err(Error::IllegalState(_))));
    assert!(matches!(builder.end_cdata(), Err(Error::IllegalState(_))));
    assert!(matches!(
        builder.start_cdata(),
        Err(Error::IllegalState(_))
    ));
    assert!(matches!(
        builder.end_comment(),
        Err(Error::IllegalState(_))
    ));
    assert!(matches!(
        builder.end_attribute(),
        Err(Error::IllegalState(_))
    ));
    assert_eq!(builder.output().unwrap(), "");
}

#[test]
fn test_element_outside_document() {
    let mut builder = XmlBuilder::new();
    assert!(matches!(
        builder.start_element("doc"),
        Err(Error::IllegalState(_))
    ));
}

#[test]
fn test_second_root_element() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .write_element("a", Data::Null)
        .unwrap();
    assert!(matches!(
        builder.start_element("b"),
        Err(Error::IllegalState(_))
    ));
}

#[test]
fn test_end_document_with_open_element() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .start_element("a")
        .unwrap();
    assert!(matches!(
        builder.end_document(),
        Err(Error::IllegalState(_))
    ));
}

#[test]
fn test_document_started_twice() {
    let mut builder = XmlBuilder::new();
    builder.start_document().unwrap();
    assert!(matches!(
        builder.start_document(),
        Err(Error::IllegalState(_))
    ));
}

#[rstest]
#[case("1abc")]
#[case("a b")]
#[case("")]
#[case("-a")]
fn test_invalid_element_name(#[case] name: &str) {
    let mut builder = XmlBuilder::new();
    builder.start_document().unwrap();
    builder.output().unwrap();
    assert!(matches!(
        builder.start_element(name),
        Err(Error::InvalidInput(_))
    ));
    assert_eq!(builder.output().unwrap(), "");
    // the failed element left no trace on the stack
    builder.write_element("ok", Data::Null).unwrap();
    builder.end_document().unwrap();
    assert_eq!(builder.output().unwrap(), "<ok/>\n");
}

#[test]
fn test_undeclared_prefix() {
    let mut builder = XmlBuilder::new();
    builder.start_document().unwrap();
    assert!(matches!(
        builder.start_element("p:doc"),
        Err(Error::UndeclaredPrefix(prefix)) if prefix == "p"
    ));
}

#[test]
fn test_generated_prefix_declared_once_below_namespaced_parent() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .start_element("{urn:u}root")
        .unwrap()
        .write_element("{urn:u}tag", "1")
        .unwrap()
        .write_element("{urn:u}tag", "2")
        .unwrap()
        .end_element()
        .unwrap()
        .end_document()
        .unwrap();
    let output = builder.output().unwrap();
    assert_eq!(
        output,
        format!(
            "{}<a:root xmlns:a=\"urn:u\"><a:tag>1</a:tag><a:tag>2</a:tag></a:root>\n",
            DECLARATION
        )
    );
    assert_eq!(output.matches("xmlns:").count(), 1);
}

#[test]
fn test_generated_prefix_reused_by_siblings() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .start_element("root")
        .unwrap()
        .write_element("{urn:u}tag", "1")
        .unwrap()
        .write_element("{urn:u}tag", "2")
        .unwrap()
        .end_element()
        .unwrap()
        .end_document()
        .unwrap();
    assert_eq!(
        builder.output().unwrap(),
        format!(
            "{}<root><a:tag xmlns:a=\"urn:u\">1</a:tag><a:tag xmlns:a=\"urn:u\">2</a:tag></root>\n",
            DECLARATION
        )
    );
}

#[test]
fn test_declared_namespace_is_reused() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .start_element_with_attributes("root", [("xmlns:p", "urn:p")])
        .unwrap()
        .start_element_with_attributes("child", [("xmlns:p", "urn:p")])
        .unwrap()
        .write_element("{urn:p}leaf", Data::Null)
        .unwrap()
        .write_element("p:other", Data::Null)
        .unwrap()
        .end_element()
        .unwrap()
        .end_element()
        .unwrap()
        .end_document()
        .unwrap();
    assert_eq!(
        builder.output().unwrap(),
        format!(
            "{}<root xmlns:p=\"urn:p\"><child><p:leaf/><p:other/></child></root>\n",
            DECLARATION
        )
    );
}

#[test]
fn test_namespace_declarations_kept_without_deduplication() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .start_element_with_attributes("root", [("xmlns:p", "urn:p")])
        .unwrap()
        .start_element_with_options("child", [("xmlns:p", "urn:p")], false)
        .unwrap()
        .end_element()
        .unwrap()
        .end_element()
        .unwrap()
        .end_document()
        .unwrap();
    assert_eq!(
        builder.output().unwrap(),
        format!(
            "{}<root xmlns:p=\"urn:p\"><child xmlns:p=\"urn:p\"/></root>\n",
            DECLARATION
        )
    );
}

#[test]
fn test_generated_prefix_skips_declared_prefix() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .start_element_with_attributes("{urn:u}root", [("xmlns:a", "urn:other")])
        .unwrap()
        .end_element()
        .unwrap()
        .end_document()
        .unwrap();
    let output = builder.output().unwrap();
    assert_eq!(
        output,
        format!(
            "{}<b:root xmlns:a=\"urn:other\" xmlns:b=\"urn:u\"/>\n",
            DECLARATION
        )
    );
    assert_eq!(output.matches("xmlns:a=").count(), 1);
}

#[test]
fn test_prefix_declared_twice_on_element() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .start_element("{urn:u}root")
        .unwrap();
    assert!(matches!(
        builder.write_attribute("xmlns:a", "urn:other"),
        Err(Error::InvalidInput(_))
    ));
    builder.write_attribute("xmlns:b", "urn:other").unwrap();
    assert!(matches!(
        builder.write_attribute("xmlns:b", "urn:other"),
        Err(Error::InvalidInput(_))
    ));
    builder.end_element().unwrap().end_document().unwrap();
    assert_eq!(
        builder.output().unwrap(),
        format!(
            "{}<a:root xmlns:b=\"urn:other\" xmlns:a=\"urn:u\"/>\n",
            DECLARATION
        )
    );
}

#[test]
fn test_default_namespace_not_used_for_attributes() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .start_element_with_attributes("root", [("xmlns", "urn:d")])
        .unwrap()
        .write_element_with_attributes("{urn:d}item", Data::Null, [("{urn:d}id", "1")])
        .unwrap()
        .end_element()
        .unwrap()
        .end_document()
        .unwrap();
    assert_eq!(
        builder.output().unwrap(),
        format!(
            "{}<root xmlns=\"urn:d\"><item a:id=\"1\" xmlns:a=\"urn:d\"/></root>\n",
            DECLARATION
        )
    );
}

#[test]
fn test_cdata_splits_terminator() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .start_element("doc")
        .unwrap()
        .write_cdata("a]]>b")
        .unwrap()
        .end_element()
        .unwrap()
        .end_document()
        .unwrap();
    assert_eq!(
        builder.output().unwrap(),
        format!("{}<doc><![CDATA[a]]]]><![CDATA[>b]]></doc>\n", DECLARATION)
    );
}

#[test]
fn test_comment_terminator_rejected() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .start_element("doc")
        .unwrap();
    builder.output().unwrap();
    assert!(matches!(
        builder.write_comment("a-->b"),
        Err(Error::InvalidInput(_))
    ));
    assert_eq!(builder.output().unwrap(), "");

    builder.start_comment().unwrap();
    builder.output().unwrap();
    assert!(matches!(builder.text("-->"), Err(Error::InvalidInput(_))));
    assert_eq!(builder.output().unwrap(), "");
    builder
        .text(" fine ")
        .unwrap()
        .end_comment()
        .unwrap()
        .end_element()
        .unwrap();
    assert_eq!(builder.output().unwrap(), "<!-- fine --></doc>");
}

#[test]
fn test_cdata_terminator_split_over_calls() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .start_element("doc")
        .unwrap()
        .start_cdata()
        .unwrap()
        .data("a]")
        .unwrap()
        .data("]")
        .unwrap()
        .data(">b")
        .unwrap()
        .end_cdata()
        .unwrap()
        .end_element()
        .unwrap()
        .end_document()
        .unwrap();
    assert_eq!(
        builder.output().unwrap(),
        format!("{}<doc><![CDATA[a]]]]><![CDATA[>b]]></doc>\n", DECLARATION)
    );
}

#[test]
fn test_comment_terminator_split_over_calls() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .start_element("doc")
        .unwrap()
        .start_comment()
        .unwrap()
        .text("a-")
        .unwrap();
    builder.output().unwrap();
    assert!(matches!(builder.text("->"), Err(Error::InvalidInput(_))));
    assert_eq!(builder.output().unwrap(), "");
    builder
        .text(" b")
        .unwrap()
        .end_comment()
        .unwrap()
        .end_element()
        .unwrap();
    assert_eq!(builder.output().unwrap(), " b--></doc>");
}

#[test]
fn test_system_dtd() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .write_system_dtd("html", "about:legacy-compat")
        .unwrap()
        .write_element("html", Data::Null)
        .unwrap()
        .end_document()
        .unwrap();
    assert_eq!(
        builder.output().unwrap(),
        format!(
            "{}<!DOCTYPE html SYSTEM \"about:legacy-compat\"><html/>\n",
            DECLARATION
        )
    );
}

#[test]
fn test_public_dtd() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .write_public_dtd(
            "html",
            "-//W3C//DTD XHTML 1.0 Strict//EN",
            "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd",
        )
        .unwrap();
    assert!(builder.output().unwrap().ends_with(
        "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\">"
    ));
}

#[test]
fn test_dtd_after_root() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .start_element("html")
        .unwrap();
    assert!(matches!(
        builder.write_system_dtd("html", "x"),
        Err(Error::IllegalState(_))
    ));
}

#[test]
fn test_dtd_invalid_name() {
    let mut builder = XmlBuilder::new();
    builder.start_document().unwrap();
    assert!(matches!(
        builder.write_system_dtd("1html", "x"),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_output_encoding() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document_with("1.0", Some("ISO-8859-1"), Some(true))
        .unwrap()
        .write_element("a", "\u{e4}\u{151}")
        .unwrap()
        .end_document()
        .unwrap();
    let mut expected =
        b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\" standalone=\"yes\"?>\n<a>".to_vec();
    expected.push(0xe4);
    expected.extend_from_slice(b"&#337;</a>\n");
    assert_eq!(builder.output_bytes().unwrap(), expected);
}

#[test]
fn test_unknown_encoding() {
    let mut builder = XmlBuilder::new();
    assert!(matches!(
        builder.start_document_with("1.0", Some("no-such-encoding"), None),
        Err(Error::Encoding(_))
    ));
}

#[test]
fn test_utf16_output_rejected() {
    let mut builder = XmlBuilder::new();
    assert!(matches!(
        builder.start_document_with("1.0", Some("UTF-16"), None),
        Err(Error::Encoding(_))
    ));
    assert_eq!(builder.output().unwrap(), "");
    // a failed start leaves the builder usable
    builder
        .start_document()
        .unwrap()
        .write_element("a", Data::Null)
        .unwrap()
        .end_document()
        .unwrap();
    assert_eq!(builder.output().unwrap(), format!("{}<a/>\n", DECLARATION));
}

#[test]
fn test_indent() {
    let mut builder = XmlBuilder::new();
    builder.set_indent(true, "  ");
    builder
        .start_document()
        .unwrap()
        .start_element("my-tag")
        .unwrap()
        .start_element("inner")
        .unwrap()
        .write_element("leaf", "content")
        .unwrap()
        .write_element("empty", Data::Null)
        .unwrap()
        .end_element()
        .unwrap()
        .end_element()
        .unwrap()
        .end_document()
        .unwrap();
    assert_snapshot!(builder.output().unwrap(), @r###"
<?xml version="1.0" encoding="UTF-8"?>
<my-tag>
  <inner>
    <leaf>content</leaf>
    <empty/>
  </inner>
</my-tag>
"###);
}

#[test]
fn test_auto_flush_threshold() {
    let sink = SharedSink::default();
    let mut builder = XmlBuilder::from_writer(sink.clone());
    builder.auto_flush(10).unwrap();
    builder
        .start_document()
        .unwrap()
        .start_element("root")
        .unwrap()
        .text("abcdef")
        .unwrap();
    assert_eq!(sink.contents(), "");
    builder.text("g").unwrap();
    assert_eq!(
        sink.contents(),
        format!("{}<root>abcdefg", DECLARATION)
    );
    builder.end_element().unwrap();
    assert_eq!(
        sink.contents(),
        format!("{}<root>abcdefg", DECLARATION)
    );
    builder.end_document().unwrap();
    assert_eq!(
        sink.contents(),
        format!("{}<root>abcdefg</root>\n", DECLARATION)
    );
}

#[test]
fn test_auto_flush_not_for_memory() {
    let mut builder = XmlBuilder::new();
    assert!(matches!(
        builder.auto_flush(10),
        Err(Error::IllegalState(_))
    ));
    let mut builder = XmlBuilder::from_writer(SharedSink::default());
    assert!(matches!(builder.auto_flush(0), Err(Error::InvalidInput(_))));
}

#[test]
fn test_drop_flushes_borrowed_stream() {
    let mut out = Vec::new();
    {
        let mut builder = XmlBuilder::from_writer(&mut out);
        builder
            .start_document()
            .unwrap()
            .write_element("a", "b")
            .unwrap()
            .end_document()
            .unwrap();
        assert!(matches!(
            builder.output(),
            Err(Error::IllegalState(_))
        ));
    }
    assert_eq!(
        String::from_utf8(out).unwrap(),
        format!("{}<a>b</a>\n", DECLARATION)
    );
}

#[test]
fn test_explicit_flush() {
    let sink = SharedSink::default();
    let mut builder = XmlBuilder::from_writer(sink.clone());
    builder
        .start_document()
        .unwrap()
        .start_element("a")
        .unwrap()
        .text("b")
        .unwrap();
    assert_eq!(sink.contents(), "");
    let written = builder.flush().unwrap();
    assert_eq!(written, DECLARATION.len() + "<a>b".len());
    assert_eq!(sink.contents(), format!("{}<a>b", DECLARATION));
}

#[test]
fn test_content_handler() {
    let mut builder = XmlBuilder::new();
    builder.set_handler(DataKind::Bool, |value, builder| {
        builder.text(if value.is_truthy() { "yes" } else { "no" })?;
        Ok(())
    });
    builder
        .start_document()
        .unwrap()
        .start_element("flags")
        .unwrap()
        .write_element("a", true)
        .unwrap()
        .write_element("b", false)
        .unwrap()
        .end_element()
        .unwrap()
        .end_document()
        .unwrap();
    assert_eq!(
        builder.output().unwrap(),
        format!("{}<flags><a>yes</a><b>no</b></flags>\n", DECLARATION)
    );
}

#[test]
fn test_attribute_handler() {
    let mut builder = XmlBuilder::new();
    builder.set_attribute_handler(DataKind::Float, |value, _| {
        Ok(value.to_text().map(|text| text.replace('.', ",")))
    });
    builder
        .start_document()
        .unwrap()
        .write_element_with_attributes("price", Data::Null, [("value", 1.5)])
        .unwrap()
        .end_document()
        .unwrap();
    assert_eq!(
        builder.output().unwrap(),
        format!("{}<price value=\"1,5\"/>\n", DECLARATION)
    );
}

#[test]
fn test_attribute_must_be_scalar() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .start_element("a")
        .unwrap();
    assert!(matches!(
        builder.write_attribute("b", Data::list(["x"])),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_attribute_escaping() {
    let mut builder = XmlBuilder::new();
    builder
        .start_document()
        .unwrap()
        .write_element_with_attributes("a", Data::Null, [("b", "\"<&>\"")])
        .unwrap()
        .end_document()
        .unwrap();
    assert_eq!(
        builder.output().unwrap(),
        format!("{}<a b=\"&quot;&lt;&amp;&gt;&quot;\"/>\n", DECLARATION)
    );
}
