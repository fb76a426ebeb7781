use std::borrow::Cow;

use crate::error::Error;

/// Resolve predefined entities and character references.
pub(crate) fn parse_entities(content: Cow<str>) -> Result<Cow<str>, Error> {
    if !content.contains('&') {
        return Ok(content);
    }
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c == '&' {
            let mut entity = String::new();
            let mut is_complete = false;
            for c in chars.by_ref() {
                if c == ';' {
                    is_complete = true;
                    break;
                }
                entity.push(c);
            }
            if !is_complete {
                return Err(Error::UnclosedEntity(entity));
            }
            match entity.as_str() {
                "amp" => result.push('&'),
                "apos" => result.push('\''),
                "gt" => result.push('>'),
                "lt" => result.push('<'),
                "quot" => result.push('"'),
                _ => result.push(parse_character_reference(&entity)?),
            }
        } else {
            result.push(c);
        }
    }
    Ok(result.into())
}

fn parse_character_reference(entity: &str) -> Result<char, Error> {
    let code = if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(decimal) = entity.strip_prefix('#') {
        decimal.parse::<u32>().ok()
    } else {
        None
    };
    code.and_then(char::from_u32)
        .ok_or_else(|| Error::InvalidEntity(entity.to_string()))
}

/// Normalize line endings: `\r\n` and a lone `\r` become `\n`.
pub(crate) fn normalize_newlines(content: Cow<str>) -> Cow<str> {
    if !content.contains('\r') {
        return content;
    }
    content.replace("\r\n", "\n").replace('\r', "\n").into()
}

/// Attribute value normalization: literal tabs and newlines become spaces.
///
/// This runs on the raw value, before entities are resolved, so that
/// `&#10;` survives as a newline.
pub(crate) fn normalize_attribute(content: &str) -> Cow<str> {
    if !content.contains(['\t', '\n', '\r']) {
        return Cow::Borrowed(content);
    }
    let content = content.replace("\r\n", " ");
    content.replace(['\t', '\n', '\r'], " ").into()
}

pub(crate) fn serialize_text(content: Cow<str>) -> Cow<str> {
    if !content.contains(['&', '<', '>', '\r']) {
        return content;
    }
    let mut result = String::with_capacity(content.len() + 8);
    for c in content.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '\r' => result.push_str("&#13;"),
            _ => result.push(c),
        }
    }
    result.into()
}

pub(crate) fn serialize_attribute(content: Cow<str>) -> Cow<str> {
    if !content.contains(['&', '<', '>', '"', '\n', '\r', '\t']) {
        return content;
    }
    let mut result = String::with_capacity(content.len() + 8);
    for c in content.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\n' => result.push_str("&#10;"),
            '\r' => result.push_str("&#13;"),
            '\t' => result.push_str("&#9;"),
            _ => result.push(c),
        }
    }
    result.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let text = "A &amp; B";
        assert_eq!(parse_entities(text.into()).unwrap(), "A & B");
    }

    #[test]
    fn test_parse_multiple() {
        let text = "&amp;&apos;&gt;&lt;&quot;";
        assert_eq!(parse_entities(text.into()).unwrap(), "&'><\"");
    }

    #[test]
    fn test_parse_character_references() {
        let text = "&#65;&#x42;&#x263A;";
        assert_eq!(parse_entities(text.into()).unwrap(), "AB\u{263A}");
    }

    #[test]
    fn test_parse_unknown_entity() {
        let text = "&unknown;";
        let err = parse_entities(text.into());
        if let Err(Error::InvalidEntity(entity)) = err {
            assert_eq!(entity, "unknown");
        } else {
            unreachable!();
        }
    }

    #[test]
    fn test_parse_invalid_character_reference() {
        let err = parse_entities("&#xD800;".into());
        assert!(matches!(err, Err(Error::InvalidEntity(_))));
    }

    #[test]
    fn test_parse_unfinished_entity() {
        let text = "&amp";
        let err = parse_entities(text.into());
        if let Err(Error::UnclosedEntity(entity)) = err {
            assert_eq!(entity, "amp");
        } else {
            unreachable!();
        }
    }

    #[test]
    fn test_parse_no_entities() {
        let text = "hello";
        let result = parse_entities(text.into()).unwrap();
        // this is the same slice
        assert!(std::ptr::eq(text, result.as_ref()));
    }

    #[test]
    fn test_normalize_newlines() {
        assert_eq!(normalize_newlines("a\r\nb\rc".into()), "a\nb\nc");
    }

    #[test]
    fn test_normalize_attribute() {
        assert_eq!(normalize_attribute("a\tb\r\nc\nd"), "a b c d");
    }

    #[test]
    fn test_serialize_text() {
        let text = "\"A\" & <B>";
        assert_eq!(serialize_text(text.into()), "\"A\" &amp; &lt;B&gt;");
    }

    #[test]
    fn test_serialize_attribute() {
        let text = "\">a\n";
        assert_eq!(serialize_attribute(text.into()), "&quot;&gt;a&#10;");
    }

    #[test]
    fn test_serialize_no_entities() {
        let text = "hello";
        let result = serialize_text(text.into());
        // this is the same slice
        assert!(std::ptr::eq(text, result.as_ref()));
    }
}
