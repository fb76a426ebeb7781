use std::borrow::Cow;
use std::io::Read;

use encoding_rs::{Encoding, UTF_8};
use xhtmlchardet::detect;

use crate::error::Error;

pub(crate) fn encoding(data: &[u8], hint: Option<String>) -> Option<&'static Encoding> {
    let mut cursor = std::io::Cursor::new(data);
    let charsets = detect(&mut cursor, hint).ok()?;
    // no encoding detected
    let label = if charsets.is_empty() {
        "UTF-8"
    } else {
        &charsets[0]
    };
    Encoding::for_label(label.as_bytes())
}

/// Look up an encoding by its label, as used in the XML declaration.
pub(crate) fn for_label(label: &str) -> Result<&'static Encoding, Error> {
    Encoding::for_label(label.as_bytes())
        .ok_or_else(|| Error::Encoding(format!("unknown encoding \"{}\"", label)))
}

/// Look up an encoding output can be written in. `encoding_rs` has no
/// encoders for UTF-16, it would silently write UTF-8 instead.
pub(crate) fn output_encoding(label: &str) -> Result<&'static Encoding, Error> {
    let encoding = for_label(label)?;
    if encoding.output_encoding() != encoding {
        return Err(Error::Encoding(format!(
            "cannot write output in encoding \"{}\"",
            label
        )));
    }
    Ok(encoding)
}

/// Decode raw XML bytes into a string the parser can borrow.
///
/// The encoding is taken from a byte order mark, the XML declaration or
/// content sniffing, in that order. Without any clue UTF-8 is assumed.
pub fn decode(data: &[u8]) -> Result<String, Error> {
    let encoding = encoding(data, None).unwrap_or(UTF_8);
    let (decoded, used, had_errors) = encoding.decode(data);
    if had_errors {
        return Err(Error::Encoding(format!(
            "input is not valid {}",
            used.name()
        )));
    }
    Ok(decoded.into_owned())
}

/// Read an XML source to its end and decode it, see [`decode`].
pub fn read_source<R: Read>(mut source: R) -> Result<String, Error> {
    let mut data = Vec::new();
    source.read_to_end(&mut data)?;
    decode(&data)
}

/// Encode serialized XML into the document's output encoding.
///
/// Characters the encoding cannot represent are written as numeric
/// character references.
pub(crate) fn encode<'a>(content: &'a str, encoding: &'static Encoding) -> Cow<'a, [u8]> {
    if encoding == UTF_8 {
        return Cow::Borrowed(content.as_bytes());
    }
    let (encoded, _, _) = encoding.encode(content);
    encoded
}
