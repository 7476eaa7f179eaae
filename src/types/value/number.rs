use crate::error::ArgumentError;
use crate::constants::types::{LUA_INT, LUA_FLOAT};
use std::ops::Neg;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::fmt;
use std::convert::TryInto;
use crate::types::{LuaType, CoerceFrom};
use crate::types::value::LuaValue;

#[derive(PartialEq, Copy, Clone, Debug)]
pub enum LuaNumber {
    INT(LUA_INT),
    FLOAT(LUA_FLOAT),
}

impl LuaNumber {
    pub fn as_int(&self) -> Result<LUA_INT, ArgumentError> {
        match self {
            LuaNumber::INT(int) => Ok(*int),
            LuaNumber::FLOAT(float) => {
                if float.is_finite() {
                    Ok(*float as LUA_INT)
                } else {
                    Err(ArgumentError::InvalidType { expected: "Integer or finite float", found: "Infinite float" })
                }
            }
        }
    }

    /// Integer representation, only if the conversion is exact
    pub fn to_exact_int(&self) -> Option<LUA_INT> {
        match self {
            LuaNumber::INT(int) => Some(*int),
            LuaNumber::FLOAT(float) => {
                // 2^63 itself is not representable; `as` would saturate
                if float.fract() == 0.0 && *float >= -9.223_372_036_854_776e18 && *float < 9.223_372_036_854_776e18 {
                    Some(*float as LUA_INT)
                } else {
                    None
                }
            }
        }
    }

    pub fn as_float(&self) -> LUA_FLOAT {
        match self {
            LuaNumber::INT(int) => *int as LUA_FLOAT,
            LuaNumber::FLOAT(float) => *float,
        }
    }

    pub fn floor(&self) -> Self {
        match self {
            LuaNumber::INT(_) => *self,
            LuaNumber::FLOAT(f) => LuaNumber::float_to_int_if_fits(f.floor()),
        }
    }

    pub fn ceil(&self) -> Self {
        match self {
            LuaNumber::INT(_) => *self,
            LuaNumber::FLOAT(f) => LuaNumber::float_to_int_if_fits(f.ceil()),
        }
    }

    fn float_to_int_if_fits(float: LUA_FLOAT) -> Self {
        match LuaNumber::FLOAT(float).to_exact_int() {
            Some(int) => LuaNumber::INT(int),
            None => LuaNumber::FLOAT(float),
        }
    }

    /// Parses a numeral the way the Lua lexer does, including hexadecimal integers and surrounding whitespace
    pub fn parse(string: &str) -> Option<LuaNumber> {
        let trimmed = string.trim();
        let (negative, digits) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        if digits.is_empty() {
            return None;
        }
        if digits.starts_with("0x") || digits.starts_with("0X") {
            let hex = &digits[2..];
            if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;    // Hexadecimal floats are not supported
            }
            // Hexadecimal integers wrap around on overflow
            let value = hex.bytes().fold(0 as LUA_INT, |acc, b| {
                acc.wrapping_mul(16).wrapping_add((b as char).to_digit(16).unwrap_or(0) as LUA_INT)
            });
            return Some(LuaNumber::INT(if negative { value.wrapping_neg() } else { value }));
        }
        if !digits.bytes().all(|b| b.is_ascii_digit() || b == b'.' || b == b'e' || b == b'E' || b == b'-' || b == b'+') {
            return None;    // Rejects "inf", "nan" and friends that Rust would otherwise accept
        }
        if let Ok(int) = digits.parse::<LUA_INT>() {
            return Some(LuaNumber::INT(if negative { int.wrapping_neg() } else { int }));
        }
        digits.parse::<LUA_FLOAT>().ok().map(|float| LuaNumber::FLOAT(if negative { -float } else { float }))
    }
}

impl LuaType for LuaNumber {
    const CONTAINER_NAME: &'static str = "number";
}

impl<T: Into<LuaValue> + Clone> CoerceFrom<T> for LuaNumber {
    fn coerce(value: &T) -> Option<Self> {
        match value.clone().into() {
            LuaValue::NUMBER(number) => Some(number),
            LuaValue::STRING(string) => string.try_utf8().ok().and_then(LuaNumber::parse),
            _ => None
        }
    }
}

impl From<LUA_INT> for LuaNumber {
    fn from(int: LUA_INT) -> Self {
        LuaNumber::INT(int)
    }
}

impl From<LUA_FLOAT> for LuaNumber {
    fn from(float: LUA_FLOAT) -> Self {
        LuaNumber::FLOAT(float)
    }
}

impl From<usize> for LuaNumber {
    fn from(num: usize) -> Self {
        match num.try_into() {
            Ok(n) => LuaNumber::INT(n),
            Err(_) => LuaNumber::FLOAT(num as f64)
        }
    }
}

impl Neg for LuaNumber {
    type Output = LuaNumber;

    fn neg(self) -> Self::Output {
        match self {
            LuaNumber::INT(int) => LuaNumber::INT(int.wrapping_neg()),
            LuaNumber::FLOAT(float) => LuaNumber::FLOAT(-float),
        }
    }
}

impl PartialOrd for LuaNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (LuaNumber::INT(lhs), LuaNumber::INT(rhs)) => lhs.partial_cmp(rhs),
            (LuaNumber::INT(lhs), LuaNumber::FLOAT(rhs)) => (*lhs as f64).partial_cmp(rhs),
            (LuaNumber::FLOAT(lhs), LuaNumber::INT(rhs)) => lhs.partial_cmp(&(*rhs as f64)),
            (LuaNumber::FLOAT(lhs), LuaNumber::FLOAT(rhs)) => lhs.partial_cmp(rhs),
        }
    }
}

impl PartialEq<LUA_INT> for LuaNumber {
    fn eq(&self, other: &LUA_INT) -> bool {
        *self == LuaNumber::INT(*other) || self.to_exact_int() == Some(*other)
    }
}

/// Formats a float like C's `%.14g`, which is what `tostring` uses for floats
pub(crate) fn format_float(float: LUA_FLOAT) -> String {
    if float.is_nan() {
        return String::from(if float.is_sign_negative() { "-nan" } else { "nan" });
    }
    if float.is_infinite() {
        return String::from(if float > 0.0 { "inf" } else { "-inf" });
    }
    if float == 0.0 {
        return String::from(if float.is_sign_negative() { "-0.0" } else { "0.0" });
    }
    let exponent = float.abs().log10().floor() as i32;
    let formatted = if exponent < -4 || exponent >= 14 {
        let s = format!("{:.13e}", float);
        // Rust prints "1.5000000000000e20"; Trim mantissa zeros and pad the exponent as C does
        let (mantissa, exp) = s.split_at(s.find('e').unwrap_or(s.len()));
        let mantissa = if mantissa.contains('.') { mantissa.trim_end_matches('0').trim_end_matches('.') } else { mantissa };
        let exp_value: i32 = exp.get(1..).and_then(|e| e.parse().ok()).unwrap_or(0);
        format!("{}e{}{:02}", mantissa, if exp_value < 0 { '-' } else { '+' }, exp_value.abs())
    } else {
        let decimals = (13 - exponent).max(0) as usize;
        let s = format!("{:.*}", decimals, float);
        if s.contains('.') { s.trim_end_matches('0').trim_end_matches('.').to_string() } else { s }
    };
    if formatted.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
        formatted + ".0"    // Floats with integral values keep a marker to distinguish them from integers
    } else {
        formatted
    }
}

impl Display for LuaNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            LuaNumber::INT(integer) => write!(f, "{}", integer),
            LuaNumber::FLOAT(float) => write!(f, "{}", format_float(*float)),
        }
    }
}
