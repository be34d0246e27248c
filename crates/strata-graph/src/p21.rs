//! Part 21 (ISO 10303-21) physical file format parser.
//!
//! Only the DATA section is decoded. The header carries nothing the
//! assembly extraction needs.

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{alpha1, char, digit1, one_of},
    combinator::{map, map_res, opt, recognize, value},
    multi::{many1, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::error::{GraphError, Result};

/// A STEP entity instance as it appears in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInstance {
    /// Instance number (the `123` in `#123`).
    pub id: u64,
    /// Primary type name, upper-cased.
    pub type_name: String,
    /// Every partial type of a complex instance, in file order.
    /// Simple instances carry only their own type.
    pub type_names: Vec<String>,
    /// Parameters; complex instances are flattened in record order.
    pub params: Vec<StepValue>,
}

impl EntityInstance {
    /// Whether this instance is (or, for complex instances, includes) `type_name`.
    pub fn has_type(&self, type_name: &str) -> bool {
        self.type_names.iter().any(|t| t == type_name)
    }

    /// Every instance reference appearing anywhere in the parameters,
    /// in parameter order, without duplicates.
    pub fn references(&self) -> Vec<u64> {
        let mut refs = Vec::new();
        for param in &self.params {
            param.collect_references(&mut refs);
        }
        let mut seen = rustc_hash::FxHashSet::default();
        refs.retain(|r| seen.insert(*r));
        refs
    }
}

/// A STEP value in a parameter list.
#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    /// Integer value
    Integer(i64),
    /// Real value
    Real(f64),
    /// String value, escapes decoded
    String(String),
    /// Entity reference (#123)
    Reference(u64),
    /// Enumeration (.VALUE.)
    Enum(String),
    /// List of values
    List(Vec<StepValue>),
    /// Omitted value ($)
    Omitted,
    /// Derived value (*)
    Derived,
    /// Typed value (TYPE(...))
    Typed { type_name: String, value: Box<StepValue> },
}

impl StepValue {
    fn collect_references(&self, out: &mut Vec<u64>) {
        match self {
            StepValue::Reference(r) => out.push(*r),
            StepValue::List(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
            StepValue::Typed { value, .. } => value.collect_references(out),
            _ => {}
        }
    }
}

/// Skip whitespace and `/* ... */` comments.
fn ws(input: &str) -> IResult<&str, ()> {
    let mut rest = input;
    loop {
        rest = rest.trim_start();
        match rest.strip_prefix("/*") {
            Some(body) => match body.find("*/") {
                Some(end) => rest = &body[end + 2..],
                None => {
                    return Err(nom::Err::Error(nom::error::Error::new(
                        rest,
                        nom::error::ErrorKind::TakeUntil,
                    )))
                }
            },
            None => return Ok((rest, ())),
        }
    }
}

/// Parse a STEP entity ID (#123).
fn entity_id(input: &str) -> IResult<&str, u64> {
    preceded(char('#'), map_res(digit1, str::parse::<u64>))(input)
}

/// Parse an integer.
fn integer(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(one_of("+-")), digit1)), str::parse::<i64>)(input)
}

/// Parse a real number. Part 21 reals always carry a decimal point.
fn real(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(tuple((
            opt(one_of("+-")),
            digit1,
            char('.'),
            opt(digit1),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        str::parse::<f64>,
    )(input)
}

/// Parse a string literal, handling `''` and the `\X\`, `\X2\` escapes.
fn string_literal(input: &str) -> IResult<&str, String> {
    let (body, _) = char('\'')(input)?;
    let mut raw = String::new();
    let mut chars = body.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if c != '\'' {
            raw.push(c);
            continue;
        }
        if let Some((_, '\'')) = chars.peek() {
            raw.push('\'');
            chars.next();
            continue;
        }
        return Ok((&body[pos + 1..], decode_step_string(&raw)));
    }

    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

/// Decode STEP control directives (`\X2\HHHH...\X0\`, `\X\HH`, `\\`).
fn decode_step_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find('\\') {
        result.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if let Some(after) = rest.strip_prefix("\\X2\\") {
            let end = after.find("\\X0\\").unwrap_or(after.len());
            let hex = &after[..end];
            let units: Vec<u16> = hex
                .as_bytes()
                .chunks(4)
                .filter_map(|chunk| std::str::from_utf8(chunk).ok())
                .filter_map(|h| u16::from_str_radix(h, 16).ok())
                .collect();
            result.extend(char::decode_utf16(units).filter_map(|c| c.ok()));
            rest = after.get(end + 4..).unwrap_or("");
        } else if let Some(after) = rest.strip_prefix("\\X\\") {
            match after.get(..2).and_then(|h| u8::from_str_radix(h, 16).ok()) {
                Some(byte) => {
                    result.push(byte as char);
                    rest = &after[2..];
                }
                None => {
                    result.push_str("\\X\\");
                    rest = after;
                }
            }
        } else if let Some(after) = rest.strip_prefix("\\\\") {
            result.push('\\');
            rest = after;
        } else {
            result.push('\\');
            rest = &rest[1..];
        }
    }

    result.push_str(rest);
    result
}

/// Parse an enumeration value.
fn enumeration(input: &str) -> IResult<&str, String> {
    delimited(
        char('.'),
        map(take_while1(|c: char| c.is_alphanumeric() || c == '_'), String::from),
        char('.'),
    )(input)
}

/// Parse a binary literal ("0FF0"); kept as its hex text.
fn binary(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(take_while(|c: char| c.is_ascii_hexdigit()), String::from),
        char('"'),
    )(input)
}

fn keyword(input: &str) -> IResult<&str, &str> {
    recognize(pair(alpha1, take_while(|c: char| c.is_alphanumeric() || c == '_')))(input)
}

/// Parse a parenthesised, comma-separated parameter list.
fn parameter_list(input: &str) -> IResult<&str, Vec<StepValue>> {
    delimited(
        pair(char('('), ws),
        terminated(
            separated_list0(delimited(ws, char(','), ws), step_value),
            ws,
        ),
        char(')'),
    )(input)
}

/// Parse a typed value: TYPE_NAME(value) or TYPE_NAME(val1, val2, ...).
fn typed_parameter(input: &str) -> IResult<&str, StepValue> {
    let (input, type_name) = keyword(input)?;
    let (input, _) = ws(input)?;
    let (input, mut values) = parameter_list(input)?;

    let inner = if values.len() == 1 {
        values.remove(0)
    } else {
        StepValue::List(values)
    };

    Ok((
        input,
        StepValue::Typed {
            type_name: type_name.to_uppercase(),
            value: Box::new(inner),
        },
    ))
}

/// Parse a STEP value.
fn step_value(input: &str) -> IResult<&str, StepValue> {
    let (input, _) = ws(input)?;

    alt((
        value(StepValue::Omitted, char('$')),
        value(StepValue::Derived, char('*')),
        map(entity_id, StepValue::Reference),
        map(enumeration, StepValue::Enum),
        map(string_literal, StepValue::String),
        map(binary, StepValue::String),
        typed_parameter,
        map(real, StepValue::Real),
        map(integer, StepValue::Integer),
        map(parameter_list, StepValue::List),
    ))(input)
}

/// Parse one record (TYPE_NAME ( params )).
fn record(input: &str) -> IResult<&str, (String, Vec<StepValue>)> {
    let (input, _) = ws(input)?;
    let (input, type_name) = keyword(input)?;
    let (input, _) = ws(input)?;
    let (input, params) = parameter_list(input)?;
    Ok((input, (type_name.to_uppercase(), params)))
}

/// Parse an entity instance (simple or complex).
pub fn entity_instance(input: &str) -> IResult<&str, EntityInstance> {
    let (input, _) = ws(input)?;
    let (input, id) = entity_id(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = char('=')(input)?;
    let (input, _) = ws(input)?;

    let (input, records) = if input.starts_with('(') {
        delimited(
            char('('),
            many1(terminated(record, ws)),
            char(')'),
        )(input)?
    } else {
        map(record, |r| vec![r])(input)?
    };

    let (input, _) = ws(input)?;
    let (input, _) = char(';')(input)?;

    let type_names: Vec<String> = records.iter().map(|(t, _)| t.clone()).collect();
    let type_name = type_names.first().cloned().unwrap_or_default();
    let params = records.into_iter().flat_map(|(_, p)| p).collect();

    Ok((
        input,
        EntityInstance {
            id,
            type_name,
            type_names,
            params,
        },
    ))
}

/// Length of `;` plus any whitespace before it, if `rest` closes a keyword
/// statement.
fn statement_end(rest: &str) -> Option<usize> {
    let (after, _) = ws(rest).ok()?;
    let tail = after.strip_prefix(';')?;
    Some(rest.len() - tail.len())
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Byte offset just past the first `KEYWORD ;` statement outside string
/// literals and comments.
fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\'' {
                        if bytes.get(i + 1) != Some(&b'\'') {
                            break;
                        }
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = match text[i + 2..].find("*/") {
                    Some(end) => i + 2 + end + 2,
                    None => bytes.len(),
                };
            }
            _ => {
                let boundary = i == 0 || !is_name_byte(bytes[i - 1]);
                if boundary && bytes[i..].starts_with(keyword.as_bytes()) {
                    let after = i + keyword.len();
                    if let Some(end) = statement_end(&text[after..]) {
                        return Some(after + end);
                    }
                }
                i += 1;
            }
        }
    }
    None
}

fn at_section_end(rest: &str) -> bool {
    rest.strip_prefix("ENDSEC")
        .and_then(statement_end)
        .is_some()
}

/// Parse the DATA section of a STEP file.
///
/// The `DATA;` keyword is only recognized outside string literals, so header
/// text mentioning it is ignored. Parsing stops at `ENDSEC;` or at end of
/// input. The reported offset of a failure is the byte position of the
/// instance that could not be read.
pub fn parse_data_section(text: &str) -> Result<Vec<EntityInstance>> {
    let start = find_keyword(text, "DATA").ok_or(GraphError::MissingDataSection)?;
    let mut rest = &text[start..];

    let mut instances = Vec::new();
    loop {
        let before = text.len() - rest.len();
        rest = match ws(rest) {
            Ok((remaining, _)) => remaining,
            Err(_) => return Err(GraphError::parse_at("unterminated comment", before)),
        };

        if rest.is_empty() || at_section_end(rest) {
            break;
        }

        let offset = text.len() - rest.len();
        match entity_instance(rest) {
            Ok((remaining, instance)) => {
                instances.push(instance);
                rest = remaining;
            }
            Err(_) => {
                let snippet: String = rest.chars().take(40).collect();
                return Err(GraphError::parse_at(
                    format!("malformed entity instance near `{}`", snippet),
                    offset,
                ));
            }
        }
    }

    Ok(instances)
}
