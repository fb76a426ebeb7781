//! Value converters applied to extracted text.
//!
//! A converter is given as a pipeline string such as
//! `"default:x|trim|upper"`: stages are separated by `|`, arguments are
//! appended to a stage name with `:`. Stages run left to right.
//!
//! Built-in stages:
//!
//! - `default[:value]`: replaces a missing or whitespace-only value
//! - `defaultNull`: replaces a missing or whitespace-only value with null
//! - `trim`, `upper`, `lower`
//! - `bool`: `false`, `0` and the empty string are false
//! - `number[:separator]`: a decimal number, normalized to use `.`
//! - `int[:separator]`: like `number`, but without a fraction
//! - `date[:timezone]`: a date; dates without an offset are interpreted in
//!   the given fixed offset (`+01:00`, `UTC`) or the local zone

use std::rc::Rc;

use ahash::HashMap;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone};

use crate::error::Error;

/// The result of a conversion.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Converted {
    /// No value.
    #[default]
    Null,
    /// Text, including numbers which are kept in their textual form.
    Text(String),
    /// A boolean.
    Bool(bool),
    /// A date and time.
    Date(DateTime<FixedOffset>),
}

impl Converted {
    /// Whether there is no value.
    pub fn is_null(&self) -> bool {
        matches!(self, Converted::Null)
    }

    /// The text, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Converted::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The boolean, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Converted::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// The date, if this is a date.
    pub fn as_date(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Converted::Date(date) => Some(date),
            _ => None,
        }
    }

    /// The textual form of any value, `None` for null.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Converted::Null => None,
            Converted::Text(text) => Some(text.clone()),
            Converted::Bool(true) => Some("1".to_string()),
            Converted::Bool(false) => Some(String::new()),
            Converted::Date(date) => Some(date.to_rfc3339()),
        }
    }
}

impl From<Option<String>> for Converted {
    fn from(value: Option<String>) -> Self {
        value.map_or(Converted::Null, Converted::Text)
    }
}

impl From<&str> for Converted {
    fn from(value: &str) -> Self {
        Converted::Text(value.to_string())
    }
}

/// A custom pipeline stage, called with the value and the stage arguments.
pub type ConverterFn = Rc<dyn Fn(Converted, &[String]) -> Converted>;

/// How to convert a value.
#[derive(Clone)]
pub enum Convert {
    /// A pipeline string such as `"trim|upper"`.
    Pipeline(String),
    /// A function.
    Func(Rc<dyn Fn(Converted) -> Converted>),
    /// Several conversions applied in order.
    Chain(Vec<Convert>),
}

impl Convert {
    /// Convert with a function.
    pub fn func<F: Fn(Converted) -> Converted + 'static>(f: F) -> Self {
        Convert::Func(Rc::new(f))
    }
}

impl From<&str> for Convert {
    fn from(pipeline: &str) -> Self {
        Convert::Pipeline(pipeline.to_string())
    }
}

impl From<String> for Convert {
    fn from(pipeline: String) -> Self {
        Convert::Pipeline(pipeline)
    }
}

impl From<Vec<Convert>> for Convert {
    fn from(chain: Vec<Convert>) -> Self {
        Convert::Chain(chain)
    }
}

// whitespace stripped by `trim`
const TRIM_CHARS: &[char] = &[' ', '\t', '\n', '\r', '\0', '\x0B'];

#[derive(Clone)]
pub(crate) struct Converters {
    custom: HashMap<String, ConverterFn>,
    decimal_separator: String,
}

impl Default for Converters {
    fn default() -> Self {
        Converters {
            custom: HashMap::default(),
            decimal_separator: ".".to_string(),
        }
    }
}

impl Converters {
    pub(crate) fn set(&mut self, name: &str, converter: ConverterFn) {
        self.custom.insert(name.to_string(), converter);
    }

    pub(crate) fn set_decimal_separator(&mut self, separator: &str) {
        self.decimal_separator = separator.to_string();
    }

    /// Apply a conversion.
    pub(crate) fn convert(&self, value: Converted, convert: &Convert) -> Result<Converted, Error> {
        match convert {
            Convert::Func(f) => Ok(f(value)),
            Convert::Chain(chain) => chain
                .iter()
                .try_fold(value, |value, convert| self.convert(value, convert)),
            Convert::Pipeline(pipeline) => pipeline
                .split('|')
                .try_fold(value, |value, stage| self.stage(value, stage)),
        }
    }

    fn stage(&self, value: Converted, stage: &str) -> Result<Converted, Error> {
        let mut parts = stage.split(':');
        let name = parts.next().unwrap_or_default();
        let args: Vec<String> = parts.map(str::to_string).collect();

        if let Some(converter) = self.custom.get(name) {
            return Ok(converter(value, &args));
        }
        let first = args.first().map(String::as_str);
        Ok(match name {
            "default" => convert_default(value, first),
            "defaultNull" => convert_default(value, None),
            "trim" => Converted::Text(text(&value).trim_matches(TRIM_CHARS).to_string()),
            "upper" => Converted::Text(text(&value).to_uppercase()),
            "lower" => Converted::Text(text(&value).to_lowercase()),
            "bool" => convert_bool(&value),
            "number" => self.convert_number(&value, first).into(),
            "int" => self
                .convert_number(&value, first)
                .filter(|number| !number.contains('.'))
                .into(),
            // an offset such as +01:00 was split at the colon
            "date" => convert_date(&value, &args.join(":"))?,
            _ => {
                return Err(Error::invalid_input(format!(
                    "unknown converter \"{}\"",
                    name
                )))
            }
        })
    }

    fn convert_number(&self, value: &Converted, separator: Option<&str>) -> Option<String> {
        let value = text(value);
        let value = value.trim_matches(TRIM_CHARS);
        let separator = separator
            .filter(|s| !s.trim_matches(TRIM_CHARS).is_empty())
            .unwrap_or(self.decimal_separator.as_str());

        let unsigned = value.strip_prefix('-').unwrap_or(value);
        let (integer, fraction) = match unsigned.split_once(separator) {
            Some((integer, fraction)) => (integer, Some(fraction)),
            None => (unsigned, None),
        };
        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !digits(integer) || !fraction.map_or(true, digits) {
            return None;
        }
        Some(if separator == "." {
            value.to_string()
        } else {
            value.replacen(separator, ".", 1)
        })
    }
}

fn text(value: &Converted) -> String {
    value.to_text().unwrap_or_default()
}

fn convert_default(value: Converted, default: Option<&str>) -> Converted {
    if text(&value).trim_matches(TRIM_CHARS).is_empty() {
        default.map_or(Converted::Null, Converted::from)
    } else {
        value
    }
}

fn convert_bool(value: &Converted) -> Converted {
    let value = text(value).trim_matches(TRIM_CHARS).to_lowercase();
    Converted::Bool(!matches!(value.as_str(), "false" | "0" | ""))
}

enum Zone {
    Local,
    Fixed(FixedOffset),
}

impl Zone {
    fn parse(zone: &str) -> Result<Self, Error> {
        if zone.is_empty() {
            return Ok(Zone::Local);
        }
        if zone.eq_ignore_ascii_case("utc") || zone == "Z" {
            return FixedOffset::east_opt(0)
                .map(Zone::Fixed)
                .ok_or_else(|| invalid_zone(zone));
        }
        let (sign, rest) = match zone.as_bytes().first() {
            Some(b'+') => (1, &zone[1..]),
            Some(b'-') => (-1, &zone[1..]),
            _ => return Err(invalid_zone(zone)),
        };
        let digits = rest.replace(':', "");
        if !matches!(digits.len(), 2 | 4) || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid_zone(zone));
        }
        let hours: i32 = digits[..2].parse().map_err(|_| invalid_zone(zone))?;
        let minutes: i32 = match digits.get(2..) {
            Some(minutes) if !minutes.is_empty() => {
                minutes.parse().map_err(|_| invalid_zone(zone))?
            }
            _ => 0,
        };
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Zone::Fixed)
            .ok_or_else(|| invalid_zone(zone))
    }

    fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self {
            Zone::Fixed(offset) => offset.from_local_datetime(&naive).single(),
            Zone::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|date| date.with_timezone(date.offset())),
        }
    }
}

fn invalid_zone(zone: &str) -> Error {
    Error::invalid_input(format!("unknown timezone \"{}\"", zone))
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

fn convert_date(value: &Converted, zone: &str) -> Result<Converted, Error> {
    if let Converted::Date(date) = value {
        return Ok(Converted::Date(*date));
    }
    let value = text(value);
    let value = value.trim_matches(TRIM_CHARS);
    if value.is_empty() {
        return Ok(Converted::Null);
    }
    let zone = Zone::parse(zone)?;
    Ok(parse_date(value, &zone).map_or(Converted::Null, Converted::Date))
}

fn parse_date(value: &str, zone: &Zone) -> Option<DateTime<FixedOffset>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date);
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return zone.localize(naive);
        }
    }
    let (day, utc) = match value.strip_suffix('Z') {
        Some(day) => (day, true),
        None => (value, false),
    };
    let midnight = NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)?;
    if utc {
        Zone::Fixed(FixedOffset::east_opt(0)?).localize(midnight)
    } else {
        zone.localize(midnight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn run(pipeline: &str, value: Option<&str>) -> Converted {
        Converters::default()
            .convert(value.map(str::to_string).into(), &pipeline.into())
            .unwrap()
    }

    #[rstest]
    #[case("default:x", Some("  "), Converted::from("x"))]
    #[case("default:x", None, Converted::from("x"))]
    #[case("default", Some(""), Converted::Null)]
    #[case("defaultNull", Some("a"), Converted::from("a"))]
    #[case("trim", Some(" a\t\n"), Converted::from("a"))]
    #[case("trim", None, Converted::from(""))]
    #[case("upper", Some("straße"), Converted::from("STRASSE"))]
    #[case("lower", Some("ÄB"), Converted::from("äb"))]
    #[case("default:x|trim|upper", Some(" a "), Converted::from("A"))]
    #[case("default:x|trim|upper", Some(""), Converted::from("X"))]
    fn test_text_stages(
        #[case] pipeline: &str,
        #[case] value: Option<&str>,
        #[case] expected: Converted,
    ) {
        assert_eq!(run(pipeline, value), expected);
    }

    #[rstest]
    #[case(Some("false"), false)]
    #[case(Some(" FALSE "), false)]
    #[case(Some("0"), false)]
    #[case(Some(""), false)]
    #[case(None, false)]
    #[case(Some("1"), true)]
    #[case(Some("yes"), true)]
    fn test_bool(#[case] value: Option<&str>, #[case] expected: bool) {
        assert_eq!(run("bool", value), Converted::Bool(expected));
    }

    #[rstest]
    #[case("number", "0", Some("0"))]
    #[case("number", "", None)]
    #[case("number", "E", None)]
    #[case("number", "1e10", None)]
    #[case("number", "-15", Some("-15"))]
    #[case("number", "-15.78", Some("-15.78"))]
    #[case("number", "15.", None)]
    #[case("number:,", "-15,78", Some("-15.78"))]
    #[case("number:,", "15.78", None)]
    #[case("int", "15", Some("15"))]
    #[case("int", "15.78", None)]
    fn test_numbers(#[case] pipeline: &str, #[case] value: &str, #[case] expected: Option<&str>) {
        assert_eq!(
            run(pipeline, Some(value)),
            expected.map(str::to_string).into()
        );
    }

    #[test]
    fn test_default_decimal_separator() {
        let mut converters = Converters::default();
        converters.set_decimal_separator(",");
        let converted = converters
            .convert(Converted::from("15,78"), &"number".into())
            .unwrap();
        assert_eq!(converted, Converted::from("15.78"));
    }

    #[rstest]
    #[case("2019-01-06T10:21:00Z", "2019-01-06T10:21:00+00:00")]
    #[case("2019-01-06T10:21:00+02:00", "2019-01-06T10:21:00+02:00")]
    #[case("2019-01-06T10:21:00", "2019-01-06T10:21:00+01:00")]
    #[case("2019-01-06 10:21", "2019-01-06T10:21:00+01:00")]
    #[case("2019-01-06Z", "2019-01-06T00:00:00+00:00")]
    #[case("2019-01-06", "2019-01-06T00:00:00+01:00")]
    fn test_date(#[case] value: &str, #[case] expected: &str) {
        let converted = run("date:+01:00", Some(value));
        assert_eq!(converted.as_date().unwrap().to_rfc3339(), expected);
    }

    #[test]
    fn test_invalid_date() {
        assert_eq!(run("date:UTC", Some("asd")), Converted::Null);
        assert_eq!(run("date:UTC", Some("")), Converted::Null);
    }

    #[test]
    fn test_invalid_timezone() {
        let result =
            Converters::default().convert(Converted::from("2019-01-06"), &"date:Mars".into());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_custom_converter_takes_precedence() {
        let mut converters = Converters::default();
        converters.set(
            "trim",
            Rc::new(|value: Converted, args: &[String]| {
                Converted::Text(format!("{}-{}", value.to_text().unwrap_or_default(), args.join(",")))
            }),
        );
        let converted = converters
            .convert(Converted::from("a"), &"trim:1:2".into())
            .unwrap();
        assert_eq!(converted, Converted::from("a-1,2"));
    }

    #[test]
    fn test_unknown_converter() {
        let result = Converters::default().convert(Converted::Null, &"nope".into());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_func_and_chain() {
        let convert = Convert::Chain(vec![
            "trim".into(),
            Convert::func(|value| Converted::Text(format!("<{}>", value.to_text().unwrap()))),
        ]);
        let converted = Converters::default()
            .convert(Converted::from(" a "), &convert)
            .unwrap();
        assert_eq!(converted, Converted::from("<a>"));
    }
}
