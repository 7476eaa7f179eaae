use std::cell::Cell;
use std::convert::TryFrom;
use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{is_a, is_not, tag, take};
use nom::character::complete::{digit0, digit1};
use nom::combinator::{map, map_res, opt, value};
use nom::multi::many0;
use nom::sequence::{preceded, tuple};
use crate::error::{TraceableError, ArgumentError, LuaError};
use crate::vm::{ExecutionState, helper};
use crate::constants::types::{LUA_INT, LUA_INT_UNSIGNED, LUA_FLOAT};
use crate::types::value::LuaValue;
use crate::types::value::string::LuaString;
use crate::types::value::number::LuaNumber;
use crate::types::value::table::LuaTable;
use crate::types::value::function::{LuaFunction, NativeFunction};
use crate::types::varargs::Varargs;
use crate::types::parameters::LuaParameters;
use crate::types::{LuaType, CoerceFrom};
use crate::stdlib::LibraryDescriptor;

use self::pattern::{compile_pattern, Match};

/// Start index of a range; Negative indices count from the end, out of range indices clamp to 1
fn start_index(index: LUA_INT, len: usize) -> usize {
    if index > 0 {
        index as usize
    } else if index == 0 || index.unsigned_abs() as usize > len {
        1
    } else {
        len - index.unsigned_abs() as usize + 1
    }
}

/// End index of a range; Negative indices count from the end, out of range indices clamp to the string bounds
fn end_index(index: LUA_INT, len: usize) -> usize {
    if index > len as LUA_INT {
        len
    } else if index >= 0 {
        index as usize
    } else if index.unsigned_abs() as usize > len {
        0
    } else {
        len - index.unsigned_abs() as usize + 1
    }
}

pub fn byte(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let string = params.try_coerce::<LuaString>(0)?;
    let i = params.opt_coerce::<LUA_INT>(1)?.unwrap_or(1);
    let j = params.opt_coerce::<LUA_INT>(2)?.unwrap_or(i);
    let start = start_index(i, string.len());
    let end = end_index(j, string.len());
    if start > end {
        return Ok(Varargs::empty());
    }
    let bytes = &string.as_bytes()[start - 1..end];
    let mut values = Vec::new();
    values.try_reserve(bytes.len())?;
    values.extend(bytes.iter().map(|b| LuaValue::from(*b as LUA_INT)));
    Ok(Varargs::from(values))
}

pub fn char(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let mut bytes = Vec::new();
    bytes.try_reserve(params.len())?;
    for index in 0..params.len() {
        let code = params.try_coerce::<LUA_INT>(index)?;
        match u8::try_from(code) {
            Ok(byte) => bytes.push(byte),
            Err(_) => return Err(ArgumentError::OutOfRange { message: "value out of range", index }.into()),
        }
    }
    Ok(Varargs::from(LuaString::from(bytes)))
}

/// Values produced by a match: the captures, or the whole match when the pattern has none
fn match_values(bytes: &[u8], found: &Match) -> Varargs {
    if found.groups.is_empty() {
        Varargs::from(&bytes[found.start..found.end])
    } else {
        Varargs::from(found.groups.iter()
            .map(|group| group.map(|(s, e)| LuaValue::from(&bytes[s..e])).unwrap_or(LuaValue::NIL))
            .collect::<Vec<LuaValue>>())
    }
}

fn has_specials(pattern: &[u8]) -> bool {
    pattern.iter().any(|b| b"^$*+?.([%-".contains(b))
}

fn find_plain(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn str_find(params: &[LuaValue], find: bool) -> Result<Varargs, TraceableError> {
    let string = params.try_coerce::<LuaString>(0)?;
    let pattern = params.try_coerce::<LuaString>(1)?;
    let init = start_index(params.opt_coerce::<LUA_INT>(2)?.unwrap_or(1), string.len());
    if init > string.len() + 1 {
        return Ok(Varargs::nil());
    }
    let bytes = string.as_bytes();
    let plain = params.get_value_or_nil(3).truthy();
    if find && (plain || !has_specials(pattern.as_bytes())) {
        return Ok(match find_plain(&bytes[init - 1..], pattern.as_bytes()) {
            Some(offset) => {
                let start = init + offset;
                Varargs::from((start, start + pattern.len() - 1))
            }
            None => Varargs::nil(),
        });
    }
    let regex = compile_pattern(pattern.as_bytes())?;
    match pattern::find_at(&regex, bytes, init - 1) {
        Some(found) if find => {
            let position = Varargs::from((found.start + 1, found.end));
            if found.groups.is_empty() {
                Ok(position)
            } else {
                let captures = match_values(bytes, &found);
                Ok(Varargs::from(position.into_iter().chain(captures.into_iter()).collect::<Vec<LuaValue>>()))
            }
        }
        Some(found) => Ok(match_values(bytes, &found)),
        None => Ok(Varargs::nil()),
    }
}

pub fn find(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    str_find(params, true)
}

pub fn string_match(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    str_find(params, false)
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
struct FormatFlags {
    left_justify: bool,
    force_sign: bool,
    pad_sign: bool,
    hash: bool,
    zero_pad: bool,
}

impl FormatFlags {
    fn from_bytes(flags: Option<&[u8]>) -> FormatFlags {
        let flags = flags.unwrap_or(&[]);
        FormatFlags {
            left_justify: flags.contains(&b'-'),
            force_sign: flags.contains(&b'+'),
            pad_sign: flags.contains(&b' '),
            hash: flags.contains(&b'#'),
            zero_pad: flags.contains(&b'0'),
        }
    }

    fn sign(&self, negative: bool) -> &'static str {
        if negative {
            "-"
        } else if self.force_sign {
            "+"
        } else if self.pad_sign {
            " "
        } else {
            ""
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FormatElement<'a> {
    RawString(&'a [u8]),
    Percent,
    Format { flags: FormatFlags, width: Option<usize>, precision: Option<usize>, specifier: u8 },
}

fn parse_usize(digits: &[u8]) -> Result<usize, std::num::ParseIntError> {
    String::from_utf8_lossy(digits).parse()
}

fn parse_format_element(i: &[u8]) -> IResult<&[u8], FormatElement> {
    alt((
        map(is_not("%"), FormatElement::RawString),
        value(FormatElement::Percent, tag("%%")),
        map(
            preceded(tag("%"), tuple((
                opt(is_a("-+ #0")),
                opt(map_res(digit1, parse_usize)),
                opt(preceded(tag("."), map(digit0, |d: &[u8]| parse_usize(d).unwrap_or(0)))),
                take(1usize),
            ))),
            |(flags, width, precision, specifier): (Option<&[u8]>, Option<usize>, Option<usize>, &[u8])| FormatElement::Format {
                flags: FormatFlags::from_bytes(flags),
                width,
                precision,
                specifier: specifier[0],
            },
        ),
    ))(i)
}

fn parse_format(format: &[u8]) -> Result<Vec<FormatElement>, ArgumentError> {
    match many0(parse_format_element)(format) {
        Ok((rest, elements)) if rest.is_empty() => Ok(elements),
        Ok((rest, _)) => Err(ArgumentError::InvalidPatternOrFormat {
            message: format!("invalid conversion '{}' to 'format'", String::from_utf8_lossy(rest)),
        }),
        Err(err) => Err(ArgumentError::InvalidPatternOrFormat { message: format!("{}", err) }),
    }
}

/// Pads `body` to `width`; Zero padding goes between the sign/prefix and the digits
fn pad(flags: &FormatFlags, width: Option<usize>, prefix: &str, body: &str, numeric: bool) -> String {
    let len = prefix.len() + body.len();
    let width = width.unwrap_or(0);
    if len >= width {
        return format!("{}{}", prefix, body);
    }
    let fill = width - len;
    if flags.left_justify {
        format!("{}{}{}", prefix, body, " ".repeat(fill))
    } else if flags.zero_pad && numeric {
        format!("{}{}{}", prefix, "0".repeat(fill), body)
    } else {
        format!("{}{}{}", " ".repeat(fill), prefix, body)
    }
}

fn pad_bytes(buffer: &mut Vec<u8>, flags: &FormatFlags, width: Option<usize>, bytes: &[u8]) {
    let fill = width.unwrap_or(0).saturating_sub(bytes.len());
    if flags.left_justify {
        buffer.extend_from_slice(bytes);
        buffer.extend(std::iter::repeat(b' ').take(fill));
    } else {
        buffer.extend(std::iter::repeat(b' ').take(fill));
        buffer.extend_from_slice(bytes);
    }
}

/// C-style `%e`: at least two exponent digits with an explicit sign
fn format_exponent(float: LUA_FLOAT, precision: usize, upper: bool) -> String {
    let formatted = format!("{:.*e}", precision, float);
    let (mantissa, exponent) = formatted.split_at(formatted.find('e').unwrap_or(formatted.len()));
    let exponent: i32 = exponent.get(1..).and_then(|e| e.parse().ok()).unwrap_or(0);
    let result = format!("{}e{}{:02}", mantissa, if exponent < 0 { '-' } else { '+' }, exponent.abs());
    if upper { result.to_uppercase() } else { result }
}

fn strip_fraction_zeros(formatted: String) -> String {
    match formatted.find(|c| c == 'e' || c == 'E') {
        Some(position) => {
            let (mantissa, exponent) = formatted.split_at(position);
            let mantissa = if mantissa.contains('.') { mantissa.trim_end_matches('0').trim_end_matches('.') } else { mantissa };
            format!("{}{}", mantissa, exponent)
        }
        None if formatted.contains('.') => formatted.trim_end_matches('0').trim_end_matches('.').to_string(),
        None => formatted,
    }
}

/// C-style `%g`
fn format_general(float: LUA_FLOAT, precision: Option<usize>, hash: bool, upper: bool) -> String {
    let precision = match precision.unwrap_or(6) {
        0 => 1,
        p => p,
    };
    if float == 0.0 {
        let zero = if hash { format!("{:.*}", precision - 1, float) } else { String::from("0") };
        return if float.is_sign_negative() { format!("-{}", zero.trim_start_matches('-')) } else { zero };
    }
    // The exponent after rounding to `precision` significant digits decides the style
    let rounded = format_exponent(float, precision - 1, false);
    let exponent: i64 = rounded.rsplit('e').next().and_then(|e| e.parse().ok()).unwrap_or(0);
    let formatted = if exponent < -4 || exponent >= precision as i64 {
        format_exponent(float, precision - 1, upper)
    } else {
        format!("{:.*}", (precision as i64 - 1 - exponent).max(0) as usize, float)
    };
    if hash { formatted } else { strip_fraction_zeros(formatted) }
}

/// C-style `%a`
fn format_hex_float(float: LUA_FLOAT, upper: bool) -> String {
    let bits = float.to_bits();
    let exponent_bits = ((bits >> 52) & 0x7FF) as i64;
    let mantissa = bits & 0x000F_FFFF_FFFF_FFFF;
    let (lead, exponent) = match (exponent_bits, mantissa) {
        (0, 0) => (0, 0),
        (0, _) => (0, -1022),
        (e, _) => (1, e - 1023),
    };
    let digits = format!("{:013x}", mantissa);
    let digits = digits.trim_end_matches('0');
    let result = if digits.is_empty() {
        format!("0x{}p{:+}", lead, exponent)
    } else {
        format!("0x{}.{}p{:+}", lead, digits, exponent)
    };
    if upper { result.to_uppercase() } else { result }
}

fn format_float(flags: &FormatFlags, width: Option<usize>, precision: Option<usize>, specifier: u8, float: LUA_FLOAT) -> String {
    let upper = specifier.is_ascii_uppercase();
    let sign = flags.sign(float.is_sign_negative() && !float.is_nan());
    let magnitude = float.abs();
    let body = if magnitude.is_infinite() {
        String::from(if upper { "INF" } else { "inf" })
    } else if magnitude.is_nan() {
        String::from(if upper { "NAN" } else { "nan" })
    } else {
        match specifier {
            b'f' | b'F' => {
                let formatted = format!("{:.*}", precision.unwrap_or(6), magnitude);
                if flags.hash && !formatted.contains('.') { formatted + "." } else { formatted }
            }
            b'e' | b'E' => format_exponent(magnitude, precision.unwrap_or(6), upper),
            b'a' | b'A' => format_hex_float(magnitude, upper),
            _ => format_general(magnitude, precision, flags.hash, upper),
        }
    };
    pad(flags, width, sign, &body, magnitude.is_finite())
}

fn format_integer(flags: &FormatFlags, width: Option<usize>, precision: Option<usize>, specifier: u8, int: LUA_INT) -> String {
    let (sign, digits, prefix) = match specifier {
        b'd' | b'i' => (flags.sign(int < 0), format!("{}", int.unsigned_abs()), ""),
        b'u' => ("", format!("{}", int as LUA_INT_UNSIGNED), ""),
        b'o' => ("", format!("{:o}", int as LUA_INT_UNSIGNED), if flags.hash && int != 0 { "0" } else { "" }),
        b'x' => ("", format!("{:x}", int as LUA_INT_UNSIGNED), if flags.hash && int != 0 { "0x" } else { "" }),
        _ => ("", format!("{:X}", int as LUA_INT_UNSIGNED), if flags.hash && int != 0 { "0X" } else { "" }),
    };
    let digits = match precision {
        Some(0) if int == 0 => String::new(),
        Some(precision) if digits.len() < precision => format!("{}{}", "0".repeat(precision - digits.len()), digits),
        _ => digits,
    };
    // An explicit precision disables zero padding, as in C
    let flags = FormatFlags { zero_pad: flags.zero_pad && precision.is_none(), ..*flags };
    pad(&flags, width, &format!("{}{}", sign, prefix), &digits, true)
}

/// `%q`: A literal that reads back as the same value
fn quote_value(value: &LuaValue, buffer: &mut Vec<u8>) -> Result<(), LuaError> {
    match value {
        LuaValue::STRING(string) => {
            let bytes = string.as_bytes();
            buffer.push(b'"');
            for (index, byte) in bytes.iter().enumerate() {
                match byte {
                    b'"' | b'\\' => buffer.extend_from_slice(&[b'\\', *byte]),
                    b'\n' => buffer.extend_from_slice(b"\\\n"),
                    b'\r' => buffer.extend_from_slice(b"\\r"),
                    b'\0' => {
                        let next_is_digit = bytes.get(index + 1).map(u8::is_ascii_digit).unwrap_or(false);
                        buffer.extend_from_slice(if next_is_digit { b"\\000" } else { b"\\0" });
                    }
                    byte if byte.is_ascii_control() => {
                        let next_is_digit = bytes.get(index + 1).map(u8::is_ascii_digit).unwrap_or(false);
                        let escaped = if next_is_digit { format!("\\{:03}", byte) } else { format!("\\{}", byte) };
                        buffer.extend_from_slice(escaped.as_bytes());
                    }
                    byte => buffer.push(*byte),
                }
            }
            buffer.push(b'"');
        }
        LuaValue::NUMBER(LuaNumber::INT(int)) => {
            let formatted = if *int == LUA_INT::MIN { format!("0x{:x}", int) } else { format!("{}", int) };
            buffer.extend_from_slice(formatted.as_bytes());
        }
        LuaValue::NUMBER(LuaNumber::FLOAT(float)) => {
            let formatted = if float.is_infinite() {
                String::from(if *float > 0.0 { "1e9999" } else { "-1e9999" })
            } else if float.is_nan() {
                String::from("(0/0)")
            } else if float.fract() == 0.0 {
                // Integral floats keep a float literal form
                format!("{}", LuaNumber::FLOAT(*float))
            } else {
                let sign = if float.is_sign_negative() { "-" } else { "" };
                format!("{}{}", sign, format_hex_float(float.abs(), false))
            };
            buffer.extend_from_slice(formatted.as_bytes());
        }
        LuaValue::NIL | LuaValue::BOOLEAN(_) => buffer.extend_from_slice(format!("{}", value).as_bytes()),
        _ => return Err(ArgumentError::InvalidPatternOrFormat { message: String::from("value has no literal form") }.into()),
    }
    Ok(())
}

fn check_format_limits(width: Option<usize>, precision: Option<usize>, specifier: u8) -> Result<(), ArgumentError> {
    if width.unwrap_or(0) > 99 || precision.unwrap_or(0) > 99 {
        return Err(ArgumentError::InvalidPatternOrFormat { message: format!("invalid conversion '%{}' to 'format'", specifier as char) });
    }
    Ok(())
}

pub fn format(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let format_string = params.try_coerce::<LuaString>(0)?;
    let elements = parse_format(format_string.as_bytes())?;
    let mut buffer: Vec<u8> = Vec::new();
    buffer.try_reserve(format_string.len())?;
    let mut argument = 0;
    for element in elements {
        let (flags, width, precision, specifier) = match element {
            FormatElement::RawString(raw) => {
                buffer.extend_from_slice(raw);
                continue;
            }
            FormatElement::Percent => {
                buffer.push(b'%');
                continue;
            }
            FormatElement::Format { flags, width, precision, specifier } => (flags, width, precision, specifier),
        };
        check_format_limits(width, precision, specifier)?;
        argument += 1;
        match specifier {
            b'c' => {
                let code = params.try_coerce::<LUA_INT>(argument)?;
                pad_bytes(&mut buffer, &flags, width, &[code as u8]);
            }
            b'd' | b'i' | b'u' | b'o' | b'x' | b'X' => {
                let number = params.try_coerce::<LuaNumber>(argument)?;
                let int = number.to_exact_int().ok_or(ArgumentError::InvalidArgument {
                    expected: String::from("number has no integer representation"),
                    found: "number",
                    index: argument,
                })?;
                buffer.extend_from_slice(format_integer(&flags, width, precision, specifier, int).as_bytes());
            }
            b'a' | b'A' | b'e' | b'E' | b'f' | b'F' | b'g' | b'G' => {
                let float = params.try_coerce::<LUA_FLOAT>(argument)?;
                buffer.extend_from_slice(format_float(&flags, width, precision, specifier, float).as_bytes());
            }
            b'q' => quote_value(params.check_any(argument)?, &mut buffer)?,
            b's' => {
                let value = params.check_any(argument)?;
                let string = match helper::tostring(execstate, value)? {
                    LuaValue::STRING(string) => string,
                    other => LuaString::from(format!("{}", other)),
                };
                let bytes = match precision {
                    Some(precision) if precision < string.len() => &string.as_bytes()[..precision],
                    _ => string.as_bytes(),
                };
                pad_bytes(&mut buffer, &flags, width, bytes);
            }
            other => return Err(ArgumentError::InvalidPatternOrFormat { message: format!("invalid conversion '%{}' to 'format'", other as char) }.into()),
        }
    }
    Ok(Varargs::from(LuaString::from(buffer)))
}

/// `string.gmatch(s, pattern [, init])`; The iterator keeps its position between calls
pub fn gmatch(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let string = params.try_coerce::<LuaString>(0)?;
    let pattern = params.try_coerce::<LuaString>(1)?;
    let init = start_index(params.opt_coerce::<LUA_INT>(2)?.unwrap_or(1), string.len());
    let regex = compile_pattern(pattern.as_bytes())?;
    let position = Cell::new(init - 1);
    let last_end: Cell<Option<usize>> = Cell::new(None);
    let iterator = LuaFunction::closure("gmatch_step", move |_execstate, _params| {
        let bytes = string.as_bytes();
        let mut from = position.get();
        while from <= bytes.len() {
            match pattern::find_at(&regex, bytes, from) {
                // An empty match right after the previous match is skipped
                Some(found) if found.start == found.end && Some(found.end) == last_end.get() => from = found.start + 1,
                Some(found) => {
                    position.set(found.end);
                    last_end.set(Some(found.end));
                    return Ok(match_values(bytes, &found));
                }
                None => break,
            }
        }
        position.set(bytes.len() + 1);
        Ok(Varargs::nil())
    });
    Ok(Varargs::from(iterator))
}

#[derive(Debug, PartialEq)]
enum ReplacementElement<'a> {
    RawString(&'a [u8]),
    Capture(usize),
}

fn parse_replacement(input: &[u8]) -> Result<Vec<ReplacementElement>, ArgumentError> {
    let mut elements = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        match rest.iter().position(|b| *b == b'%') {
            Some(0) => match rest.get(1) {
                Some(b'%') => {
                    elements.push(ReplacementElement::RawString(&rest[1..2]));
                    rest = &rest[2..];
                }
                Some(digit @ b'0'..=b'9') => {
                    elements.push(ReplacementElement::Capture((digit - b'0') as usize));
                    rest = &rest[2..];
                }
                _ => return Err(ArgumentError::InvalidPatternOrFormat { message: String::from("invalid use of '%' in replacement string") }),
            },
            Some(position) => {
                elements.push(ReplacementElement::RawString(&rest[..position]));
                rest = &rest[position..];
            }
            None => {
                elements.push(ReplacementElement::RawString(rest));
                rest = &[];
            }
        }
    }
    Ok(elements)
}

/// Capture `index` of a match; `%0`, and `%1` in a pattern without captures, are the whole match
fn capture_bytes<'a>(bytes: &'a [u8], found: &Match, index: usize) -> Result<&'a [u8], ArgumentError> {
    if index == 0 || (index == 1 && found.groups.is_empty()) {
        return Ok(&bytes[found.start..found.end]);
    }
    match found.groups.get(index - 1) {
        Some(Some((start, end))) => Ok(&bytes[*start..*end]),
        Some(None) => Ok(&[]),
        None => Err(ArgumentError::InvalidPatternOrFormat { message: format!("invalid capture index %{} in replacement string", index) }),
    }
}

enum Replacement<'a> {
    Template(Vec<ReplacementElement<'a>>),
    Table(LuaValue),
    Function(LuaValue),
}

pub fn gsub(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let string = params.try_coerce::<LuaString>(0)?;
    let pattern = params.try_coerce::<LuaString>(1)?;
    let replacement_string;
    let replacement = match params.get_value_or_nil(2) {
        value @ LuaValue::STRING(_) | value @ LuaValue::NUMBER(_) => {
            replacement_string = LuaString::coerce_from(value)?;
            Replacement::Template(parse_replacement(replacement_string.as_bytes())?)
        }
        table @ LuaValue::TABLE(_) => Replacement::Table(table.clone()),
        function @ LuaValue::FUNCTION(_) => Replacement::Function(function.clone()),
        other => return Err(ArgumentError::InvalidArgument { expected: String::from("string/function/table"), found: other.type_name(), index: 2 }.into()),
    };
    let max_replacements = params.opt_coerce::<LUA_INT>(3)?;
    let regex = compile_pattern(pattern.as_bytes())?;

    let anchored = pattern.as_bytes().first() == Some(&b'^');
    let bytes = string.as_bytes();
    let mut result = Vec::new();
    result.try_reserve(bytes.len())?;
    let mut position = 0;
    let mut last_match = None;
    let mut count: LUA_INT = 0;
    while max_replacements.map(|max| count < max).unwrap_or(true) {
        let found = match pattern::find_at(&regex, bytes, position) {
            Some(found) => found,
            None => break,
        };
        // An empty match where the previous match ended is not a new match
        if found.start == found.end && Some(found.end) == last_match {
            if found.start < bytes.len() {
                result.push(bytes[found.start]);
            }
            position = found.start + 1;
        } else {
            result.extend_from_slice(&bytes[position..found.start]);
            let replaced = match &replacement {
                Replacement::Template(elements) => {
                    for element in elements {
                        match element {
                            ReplacementElement::RawString(raw) => result.extend_from_slice(raw),
                            ReplacementElement::Capture(index) => result.extend_from_slice(capture_bytes(bytes, &found, *index)?),
                        }
                    }
                    None
                }
                Replacement::Table(table) => Some(table.index_with_metatable(match_values(bytes, &found).first(), &execstate.metatables)?),
                Replacement::Function(function) => Some(helper::call(execstate, function.clone(), match_values(bytes, &found))?.into_first()),
            };
            match replaced {
                None => {}
                Some(LuaValue::NIL) | Some(LuaValue::BOOLEAN(false)) => result.extend_from_slice(&bytes[found.start..found.end]),
                Some(value @ LuaValue::STRING(_)) | Some(value @ LuaValue::NUMBER(_)) => result.extend_from_slice(LuaString::coerce_from(&value)?.as_bytes()),
                Some(other) => return Err(LuaError::user_string(format!("invalid replacement value (a {})", other.type_name())).into()),
            }
            count += 1;
            position = found.end;
            last_match = Some(found.end);
        }
        if position > bytes.len() || anchored {
            break;
        }
    }
    if position < bytes.len() {
        result.extend_from_slice(&bytes[position..]);
    }
    Ok(Varargs::from((LuaString::from(result), count)))
}

pub fn len(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let string = params.try_coerce::<LuaString>(0)?;
    Ok(Varargs::from(string.len()))
}

pub fn lower(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let string = params.try_coerce::<LuaString>(0)?;
    Ok(Varargs::from(LuaString::from(string.as_bytes().to_ascii_lowercase())))
}

pub fn rep(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let string = params.try_coerce::<LuaString>(0)?;
    let repetitions = params.try_coerce::<LUA_INT>(1)?;
    let separator = params.opt_coerce::<LuaString>(2)?;
    let separator = separator.as_ref().map(LuaString::as_bytes).unwrap_or(&b""[..]);

    if repetitions <= 0 {
        return Ok(Varargs::from(""));
    }
    let repetitions = repetitions as usize;
    let size = string.len()
        .checked_add(separator.len())
        .and_then(|unit| unit.checked_mul(repetitions))
        .ok_or(ArgumentError::ConcatenationTooLarge)?;
    let mut buffer = Vec::new();
    buffer.try_reserve(size)?;
    for i in 0..repetitions {
        if i != 0 {
            buffer.extend_from_slice(separator);
        }
        buffer.extend_from_slice(string.as_bytes());
    }
    Ok(Varargs::from(LuaString::from(buffer)))
}

pub fn reverse(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let string = params.try_coerce::<LuaString>(0)?;
    let mut bytes = string.as_bytes().to_vec();
    bytes.reverse();
    Ok(Varargs::from(LuaString::from(bytes)))
}

pub fn sub(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let string = params.try_coerce::<LuaString>(0)?;
    let start = start_index(params.opt_coerce::<LUA_INT>(1)?.unwrap_or(1), string.len());
    let end = end_index(params.opt_coerce::<LUA_INT>(2)?.unwrap_or(-1), string.len());
    if start > end {
        Ok(Varargs::from(""))
    } else {
        Ok(Varargs::from(&string.as_bytes()[start - 1..end]))
    }
}

pub fn upper(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let string = params.try_coerce::<LuaString>(0)?;
    Ok(Varargs::from(LuaString::from(string.as_bytes().to_ascii_uppercase())))
}

pub const FUNCTIONS: &[(&str, NativeFunction)] = &[
    ("byte", lua_func!(byte)),
    ("char", lua_func!(char)),
    ("find", lua_func!(find)),
    ("format", lua_func!(format)),
    ("gmatch", lua_func!(gmatch)),
    ("gsub", lua_func!(gsub)),
    ("len", lua_func!(len)),
    ("lower", lua_func!(lower)),
    ("match", lua_func!("match", string_match)),
    ("rep", lua_func!(rep)),
    ("reverse", lua_func!(reverse)),
    ("sub", lua_func!(sub)),
    ("upper", lua_func!(upper)),
];

/// Strings index the string table, so `s:upper()` works
fn install_extras(execstate: &mut ExecutionState, table: &LuaTable) -> Result<(), LuaError> {
    let metatable = LuaTable::empty();
    metatable.raw_set("__index", table.clone())?;
    execstate.metatables.string = Some(metatable);
    Ok(())
}

pub const LIBRARY: LibraryDescriptor = LibraryDescriptor {
    name: "string",
    functions: FUNCTIONS,
    install_extras,
};

pub mod pattern {
    //! Lua patterns, compiled to byte regexes.
    //!
    //! Balanced matches (`%b`), frontier sets (`%f`), back references and position captures have no regex
    //! equivalent and are rejected.

    use std::fmt::Write;
    use regex::bytes::Regex;
    use nom::IResult;
    use nom::branch::alt;
    use nom::bytes::complete::{tag, take};
    use nom::character::complete::{char, none_of, one_of};
    use nom::combinator::{eof, map, opt, value};
    use nom::multi::many0;
    use nom::sequence::{pair, preceded, terminated, tuple};
    use crate::error::ArgumentError;

    /// A match, with byte offsets into the searched string
    #[derive(Debug, Clone, PartialEq)]
    pub struct Match {
        pub start: usize,
        pub end: usize,
        pub groups: Vec<Option<(usize, usize)>>,
    }

    #[derive(Debug, Copy, Clone, PartialEq)]
    enum CharacterClass {
        Any,
        Byte(u8),
        Class { ranges: &'static str, negated: bool },
    }

    #[derive(Debug, Clone, PartialEq)]
    enum SetItem {
        Class(CharacterClass),
        Range(u8, u8),
    }

    #[derive(Debug, Clone, PartialEq)]
    enum SingleClass {
        Class(CharacterClass),
        Set { negated: bool, items: Vec<SetItem> },
    }

    #[derive(Debug, Copy, Clone, PartialEq)]
    enum Quantifier {
        ZeroOrOne,
        ZeroOrMore,
        OneOrMore,
        ZeroOrMoreLazy,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum PatternItem {
        Single(SingleClass, Option<Quantifier>),
        CaptureOpen,
        CaptureClose,
        EndAnchor,
        Unsupported(&'static str),
    }

    fn class_ranges(letter: u8) -> Option<&'static str> {
        Some(match letter.to_ascii_lowercase() {
            b'a' => r"\x41-\x5A\x61-\x7A",
            b'c' => r"\x00-\x1F\x7F",
            b'd' => r"\x30-\x39",
            b'g' => r"\x21-\x7E",
            b'l' => r"\x61-\x7A",
            b'p' => r"\x21-\x2F\x3A-\x40\x5B-\x60\x7B-\x7E",
            b's' => r"\x09-\x0D\x20",
            b'u' => r"\x41-\x5A",
            b'w' => r"\x30-\x39\x41-\x5A\x61-\x7A",
            b'x' => r"\x30-\x39\x41-\x46\x61-\x66",
            _ => return None,
        })
    }

    fn byte_of(c: char) -> u8 {
        c as u32 as u8
    }

    /// `%x`; Letters naming a class are classes, any other escaped byte matches itself
    fn parse_escape(i: &[u8]) -> IResult<&[u8], CharacterClass> {
        map(preceded(char('%'), take(1usize)), |escaped: &[u8]| {
            let letter = escaped[0];
            match class_ranges(letter) {
                Some(ranges) => CharacterClass::Class { ranges, negated: letter.is_ascii_uppercase() },
                None => CharacterClass::Byte(letter),
            }
        })(i)
    }

    fn parse_set_item(i: &[u8]) -> IResult<&[u8], SetItem> {
        alt((
            map(tuple((none_of("]%"), char('-'), none_of("]"))), |(start, _, end)| SetItem::Range(byte_of(start), byte_of(end))),
            map(parse_escape, SetItem::Class),
            map(none_of("]"), |c| SetItem::Class(CharacterClass::Byte(byte_of(c)))),
        ))(i)
    }

    fn parse_set(i: &[u8]) -> IResult<&[u8], SingleClass> {
        let (i, _) = char('[')(i)?;
        let (i, negated) = map(opt(char('^')), |caret| caret.is_some())(i)?;
        // A `]` right after the opening bracket is a literal
        let (i, first) = alt((
            map(char(']'), |_| SetItem::Class(CharacterClass::Byte(b']'))),
            parse_set_item,
        ))(i)?;
        let (i, mut items) = many0(parse_set_item)(i)?;
        let (i, _) = char(']')(i)?;
        items.insert(0, first);
        Ok((i, SingleClass::Set { negated, items }))
    }

    fn parse_single_class(i: &[u8]) -> IResult<&[u8], SingleClass> {
        alt((
            value(SingleClass::Class(CharacterClass::Any), char('.')),
            parse_set,
            map(parse_escape, SingleClass::Class),
            map(none_of("()%.["), |c| SingleClass::Class(CharacterClass::Byte(byte_of(c)))),
        ))(i)
    }

    fn parse_quantifier(i: &[u8]) -> IResult<&[u8], Quantifier> {
        alt((
            value(Quantifier::ZeroOrOne, char('?')),
            value(Quantifier::ZeroOrMore, char('*')),
            value(Quantifier::OneOrMore, char('+')),
            value(Quantifier::ZeroOrMoreLazy, char('-')),
        ))(i)
    }

    fn parse_pattern_item(i: &[u8]) -> IResult<&[u8], PatternItem> {
        alt((
            value(PatternItem::EndAnchor, terminated(char('$'), eof)),
            value(PatternItem::Unsupported("balanced matches (%b) are unsupported"), tag("%b")),
            value(PatternItem::Unsupported("frontier patterns (%f) are unsupported"), tag("%f")),
            value(PatternItem::Unsupported("back references are unsupported"), preceded(char('%'), one_of("0123456789"))),
            value(PatternItem::Unsupported("position captures are unsupported"), tag("()")),
            value(PatternItem::CaptureOpen, char('(')),
            value(PatternItem::CaptureClose, char(')')),
            map(pair(parse_single_class, opt(parse_quantifier)), |(class, quantifier)| PatternItem::Single(class, quantifier)),
        ))(i)
    }

    #[derive(Debug, PartialEq)]
    struct Pattern {
        anchored: bool,
        items: Vec<PatternItem>,
    }

    fn parse_pattern(i: &[u8]) -> IResult<&[u8], Pattern> {
        map(pair(opt(char('^')), many0(parse_pattern_item)), |(anchor, items)| Pattern { anchored: anchor.is_some(), items })(i)
    }

    fn push_byte(byte: u8, buf: &mut String) {
        if byte.is_ascii_alphanumeric() {
            buf.push(byte as char)
        } else {
            let _ = write!(buf, r"\x{:02X}", byte);
        }
    }

    impl CharacterClass {
        /// Contents of a bracketed class, without the brackets
        fn compile_in_set(&self, buf: &mut String) {
            match self {
                CharacterClass::Any => buf.push('.'),
                CharacterClass::Byte(byte) => push_byte(*byte, buf),
                CharacterClass::Class { ranges, negated: false } => buf.push_str(ranges),
                CharacterClass::Class { ranges, negated: true } => {
                    buf.push_str("[^");
                    buf.push_str(ranges);
                    buf.push(']');
                }
            }
        }

        fn compile(&self, buf: &mut String) {
            match self {
                CharacterClass::Any => buf.push('.'),
                CharacterClass::Byte(byte) => push_byte(*byte, buf),
                CharacterClass::Class { ranges, negated } => {
                    buf.push_str(if *negated { "[^" } else { "[" });
                    buf.push_str(ranges);
                    buf.push(']');
                }
            }
        }
    }

    impl SingleClass {
        fn compile(&self, buf: &mut String) {
            match self {
                SingleClass::Class(class) => class.compile(buf),
                SingleClass::Set { negated, items } => {
                    let mut contents = String::new();
                    for item in items {
                        match item {
                            SetItem::Class(class) => class.compile_in_set(&mut contents),
                            // Reversed ranges match nothing
                            SetItem::Range(start, end) if start > end => {}
                            SetItem::Range(start, end) => {
                                push_byte(*start, &mut contents);
                                contents.push('-');
                                push_byte(*end, &mut contents);
                            }
                        }
                    }
                    match (contents.is_empty(), negated) {
                        (true, false) => buf.push_str(r"[^\x00-\xFF]"),
                        (true, true) => buf.push_str(r"[\x00-\xFF]"),
                        (false, negated) => {
                            buf.push_str(if *negated { "[^" } else { "[" });
                            buf.push_str(&contents);
                            buf.push(']');
                        }
                    }
                }
            }
        }
    }

    impl Pattern {
        fn compile(&self) -> Result<String, ArgumentError> {
            // Byte-oriented; `.` also matches newlines
            let mut buf = String::from("(?s-u)");
            if self.anchored {
                buf.push('^');
            }
            let mut depth = 0usize;
            for item in &self.items {
                match item {
                    PatternItem::Single(class, quantifier) => {
                        class.compile(&mut buf);
                        buf.push_str(match quantifier {
                            None => "",
                            Some(Quantifier::ZeroOrOne) => "?",
                            Some(Quantifier::ZeroOrMore) => "*",
                            Some(Quantifier::OneOrMore) => "+",
                            Some(Quantifier::ZeroOrMoreLazy) => "*?",
                        });
                    }
                    PatternItem::CaptureOpen => {
                        depth += 1;
                        buf.push('(');
                    }
                    PatternItem::CaptureClose => {
                        depth = depth.checked_sub(1).ok_or_else(|| ArgumentError::InvalidPatternOrFormat { message: String::from("invalid pattern capture") })?;
                        buf.push(')');
                    }
                    PatternItem::EndAnchor => buf.push('$'),
                    PatternItem::Unsupported(message) => return Err(ArgumentError::InvalidPatternFeature { message }),
                }
            }
            if depth != 0 {
                return Err(ArgumentError::InvalidPatternOrFormat { message: String::from("unfinished capture") });
            }
            Ok(buf)
        }
    }

    pub fn compile_pattern(bytes: &[u8]) -> Result<Regex, ArgumentError> {
        let pattern = match parse_pattern(bytes) {
            Ok((rest, pattern)) if rest.is_empty() => pattern,
            Ok((rest, _)) => {
                let message = match rest.first() {
                    Some(b'%') => "malformed pattern (ends with '%')",
                    Some(b'[') => "malformed pattern (missing ']')",
                    _ => "malformed pattern",
                };
                return Err(ArgumentError::InvalidPatternOrFormat { message: String::from(message) });
            }
            Err(err) => return Err(ArgumentError::InvalidPatternOrFormat { message: format!("{}", err) }),
        };
        let source = pattern.compile()?;
        Regex::new(&source).map_err(|err| ArgumentError::InvalidPatternOrFormat { message: format!("{}", err) })
    }

    /// First match starting at or after byte offset `from`; `^` anchors at `from`
    pub fn find_at(regex: &Regex, bytes: &[u8], from: usize) -> Option<Match> {
        let haystack = bytes.get(from..)?;
        let captures = regex.captures(haystack)?;
        let whole = captures.get(0)?;
        let groups = (1..captures.len())
            .map(|index| captures.get(index).map(|m| (from + m.start(), from + m.end())))
            .collect();
        Some(Match { start: from + whole.start(), end: from + whole.end(), groups })
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn matches(pattern: &str, subject: &str) -> Option<(usize, usize)> {
            let regex = compile_pattern(pattern.as_bytes()).unwrap();
            find_at(&regex, subject.as_bytes(), 0).map(|m| (m.start, m.end))
        }

        #[test]
        fn character_classes() {
            assert_eq!(matches("%d+", "abc123def"), Some((3, 6)));
            assert_eq!(matches("%a+", "123abc"), Some((3, 6)));
            assert_eq!(matches("%S+", "  word "), Some((2, 6)));
            assert_eq!(matches("[%a_][%w_]*", "1 _name2 "), Some((2, 8)));
            assert_eq!(matches("[^%s]+", " x "), Some((1, 2)));
        }

        #[test]
        fn anchors_and_quantifiers() {
            assert_eq!(matches("^abc", "xabc"), None);
            assert_eq!(matches("abc$", "abcx"), None);
            assert_eq!(matches("a$b", "a$b"), Some((0, 3)));
            assert_eq!(matches("a-b", "aaab"), Some((0, 4)));
            assert_eq!(matches("<.->", "<a><b>"), Some((0, 3)));
            assert_eq!(matches("<.*>", "<a><b>"), Some((0, 6)));
        }

        #[test]
        fn escapes_and_sets() {
            assert_eq!(matches("%.", "a.b"), Some((1, 2)));
            assert_eq!(matches("[]]", "a]"), Some((1, 2)));
            assert_eq!(matches("[a-c]+", "xxbcay"), Some((2, 5)));
            assert_eq!(matches("*", "a*"), Some((1, 2)));
        }

        #[test]
        fn captures_are_reported() {
            let regex = compile_pattern(b"(%a+)=(%d+)").unwrap();
            let found = find_at(&regex, b" key=42", 0).unwrap();
            assert_eq!(found.groups, vec![Some((1, 4)), Some((5, 7))]);
        }

        #[test]
        fn unsupported_features_are_rejected() {
            for pattern in &["%b()", "%f[%a]", "(a)%1", "()a"] {
                match compile_pattern(pattern.as_bytes()) {
                    Err(ArgumentError::InvalidPatternFeature { .. }) => {}
                    other => panic!("{} compiled to {:?}", pattern, other),
                }
            }
        }

        #[test]
        fn malformed_patterns() {
            assert!(matches!(compile_pattern(b"abc%"), Err(ArgumentError::InvalidPatternOrFormat { .. })));
            assert!(matches!(compile_pattern(b"[abc"), Err(ArgumentError::InvalidPatternOrFormat { .. })));
            assert!(matches!(compile_pattern(b"(abc"), Err(ArgumentError::InvalidPatternOrFormat { .. })));
            assert!(matches!(compile_pattern(b"abc)"), Err(ArgumentError::InvalidPatternOrFormat { .. })));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    fn state() -> ExecutionState {
        ExecutionState::with_stdlib(RuntimeConfig::default()).unwrap()
    }

    fn call(function: fn(&mut ExecutionState, &[LuaValue]) -> Result<Varargs, TraceableError>, params: &[LuaValue]) -> Varargs {
        let mut execstate = state();
        function(&mut execstate, params).unwrap()
    }

    fn string_of(value: &LuaValue) -> String {
        match value {
            LuaValue::STRING(s) => String::from_utf8_lossy(s.as_bytes()).into_owned(),
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn relative_indices() {
        assert_eq!(start_index(-2, 5), 4);
        assert_eq!(start_index(-10, 5), 1);
        assert_eq!(start_index(0, 5), 1);
        assert_eq!(end_index(-1, 5), 5);
        assert_eq!(end_index(10, 5), 5);
        assert_eq!(end_index(-10, 5), 0);
    }

    #[test]
    fn sub_and_byte() {
        let result = call(sub, &[LuaValue::from("hello"), LuaValue::from(2 as LUA_INT), LuaValue::from(-2 as LUA_INT)]);
        assert_eq!(string_of(result.first()), "ell");
        let result = call(byte, &[LuaValue::from("AB"), LuaValue::from(1 as LUA_INT), LuaValue::from(2 as LUA_INT)]);
        assert_eq!(result, Varargs::from((65 as LUA_INT, 66 as LUA_INT)));
    }

    #[test]
    fn find_plain_and_pattern() {
        let result = call(find, &[LuaValue::from("a.b.c"), LuaValue::from("."), LuaValue::from(1 as LUA_INT), LuaValue::from(true)]);
        assert_eq!(result, Varargs::from((2usize, 2usize)));
        let result = call(find, &[LuaValue::from("key = value"), LuaValue::from("(%w+)%s*=%s*(%w+)")]);
        assert_eq!(result.count(), 4);
        assert_eq!(string_of(result.n(3)), "value");
        let result = call(find, &[LuaValue::from("abc"), LuaValue::from("x")]);
        assert_eq!(result.first(), &LuaValue::NIL);
    }

    #[test]
    fn match_returns_captures_or_whole_match() {
        let result = call(string_match, &[LuaValue::from("2024-01-05"), LuaValue::from("(%d+)-(%d+)")]);
        assert_eq!(string_of(result.first()), "2024");
        assert_eq!(string_of(result.n(1)), "01");
        let result = call(string_match, &[LuaValue::from("  trim  "), LuaValue::from("%S+")]);
        assert_eq!(string_of(result.first()), "trim");
    }

    #[test]
    fn gsub_with_template() {
        let result = call(gsub, &[LuaValue::from("hello world"), LuaValue::from("(%w+)"), LuaValue::from("<%1>")]);
        assert_eq!(string_of(result.first()), "<hello> <world>");
        assert_eq!(result.n(1), &LuaValue::from(2 as LUA_INT));
        let result = call(gsub, &[LuaValue::from("abc"), LuaValue::from(""), LuaValue::from("-")]);
        assert_eq!(string_of(result.first()), "-a-b-c-");
        let result = call(gsub, &[LuaValue::from("aaa"), LuaValue::from("a"), LuaValue::from("b"), LuaValue::from(2 as LUA_INT)]);
        assert_eq!(string_of(result.first()), "bba");
    }

    #[test]
    fn gsub_with_table_and_function() {
        let table = LuaTable::empty();
        table.raw_set("name", "Lua").unwrap();
        let result = call(gsub, &[LuaValue::from("hi $name, $other"), LuaValue::from("%$(%w+)"), LuaValue::from(table)]);
        assert_eq!(string_of(result.first()), "hi Lua, $other");

        fn shout(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
            let word = params.try_coerce::<LuaString>(0)?;
            Ok(Varargs::from(LuaString::from(word.as_bytes().to_ascii_uppercase())))
        }
        let result = call(gsub, &[LuaValue::from("a b"), LuaValue::from("%a"), LuaValue::from(lua_func!(shout))]);
        assert_eq!(string_of(result.first()), "A B");
    }

    #[test]
    fn gmatch_iterates_matches() {
        let mut execstate = state();
        let iterator = gmatch(&mut execstate, &[LuaValue::from("one two  three"), LuaValue::from("%a+")]).unwrap().into_first();
        let mut words = Vec::new();
        loop {
            let result = execstate.call(iterator.clone(), Varargs::empty()).unwrap();
            match result.first() {
                LuaValue::NIL => break,
                word => words.push(string_of(word)),
            }
        }
        assert_eq!(words, vec!["one", "two", "three"]);
    }

    #[test]
    fn format_specifiers() {
        let result = call(format, &[
            LuaValue::from("%5d|%-5s|%05.1f|%x|%q"),
            LuaValue::from(42 as LUA_INT),
            LuaValue::from("ab"),
            LuaValue::from(3.14159),
            LuaValue::from(255 as LUA_INT),
            LuaValue::from("a\"b\n"),
        ]);
        assert_eq!(string_of(result.first()), "   42|ab   |003.1|ff|\"a\\\"b\\\n\"");
    }

    #[test]
    fn format_floats_like_c() {
        assert_eq!(format_general(100000.0, None, false, false), "100000");
        assert_eq!(format_general(1e20, None, false, false), "1e+20");
        assert_eq!(format_general(0.0001, None, false, false), "0.0001");
        assert_eq!(format_exponent(12345.678, 2, false), "1.23e+04");
        assert_eq!(format_hex_float(1.0, false), "0x1p+0");
        assert_eq!(format_hex_float(0.5, false), "0x1p-1");
    }

    #[test]
    fn format_rejects_bad_conversions() {
        let mut execstate = state();
        assert!(format(&mut execstate, &[LuaValue::from("%y"), LuaValue::from(1 as LUA_INT)]).is_err());
        assert!(format(&mut execstate, &[LuaValue::from("%d"), LuaValue::from(1.5)]).is_err());
        assert!(format(&mut execstate, &[LuaValue::from("%d")]).is_err());
        assert!(format(&mut execstate, &[LuaValue::from("100%")]).is_err());
    }

    #[test]
    fn rep_with_separator() {
        let result = call(rep, &[LuaValue::from("ab"), LuaValue::from(3 as LUA_INT), LuaValue::from(",")]);
        assert_eq!(string_of(result.first()), "ab,ab,ab");
        let result = call(rep, &[LuaValue::from("ab"), LuaValue::from(0 as LUA_INT)]);
        assert_eq!(string_of(result.first()), "");
    }

    #[test]
    fn string_values_index_the_string_table() {
        let execstate = state();
        let upper = LuaValue::from("x").index_with_metatable(&LuaValue::from("upper"), &execstate.metatables).unwrap();
        assert!(matches!(upper, LuaValue::FUNCTION(_)));
    }
}
