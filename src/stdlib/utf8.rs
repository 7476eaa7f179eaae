use crate::vm::ExecutionState;
use crate::error::{TraceableError, ArgumentError, LuaError};
use crate::constants::{UTF8_PATTERN, UTF8_MAX};
use crate::constants::types::LUA_INT;
use crate::types::value::LuaValue;
use crate::types::value::string::LuaString;
use crate::types::value::table::LuaTable;
use crate::types::value::function::NativeFunction;
use crate::types::varargs::Varargs;
use crate::types::parameters::LuaParameters;
use crate::stdlib::LibraryDescriptor;

const MAX_UNICODE: u32 = 0x10_FFFF;

fn is_continuation(bytes: &[u8], index: usize) -> bool {
    bytes.get(index).map(|b| b & 0xC0 == 0x80).unwrap_or(false)
}

/// Decodes one sequence at the start of `bytes`, accepting the original 6-byte encoding up to 2^31.
///
/// Strict decoding rejects surrogates and values above U+10FFFF. Returns the code and the sequence length.
fn decode(bytes: &[u8], strict: bool) -> Option<(u32, usize)> {
    const LIMITS: [u32; 6] = [u32::MAX, 0x80, 0x800, 0x1_0000, 0x20_0000, 0x400_0000];
    let mut c = *bytes.first()? as u32;
    let mut code: u32 = 0;
    let mut count = 0;
    if c < 0x80 {
        code = c;
    } else {
        while c & 0x40 != 0 {
            count += 1;
            if count > 5 {
                return None;
            }
            let continuation = *bytes.get(count)? as u32;
            if continuation & 0xC0 != 0x80 {
                return None;
            }
            code = (code << 6) | (continuation & 0x3F);
            c <<= 1;
        }
        code |= (c & 0x7F) << (count * 5);
        if code > UTF8_MAX || code < LIMITS[count] {
            return None;
        }
    }
    if strict && (code > MAX_UNICODE || (0xD800..=0xDFFF).contains(&code)) {
        return None;
    }
    Some((code, count + 1))
}

/// Encodes `code` the way Lua's `\u{XXX}` escape does, up to 6 bytes
fn encode(mut code: u32, buffer: &mut Vec<u8>) {
    if code < 0x80 {
        buffer.push(code as u8);
        return;
    }
    let mut tail = Vec::with_capacity(5);
    let mut max_first = 0x3Fu32;
    loop {
        tail.push(0x80 | (code & 0x3F) as u8);
        code >>= 6;
        max_first >>= 1;
        if code <= max_first {
            break;
        }
    }
    buffer.push(((!max_first << 1) | code) as u8);
    buffer.extend(tail.iter().rev());
}

/// Converts a relative position; Negative positions count from the end of the string
fn relative_position(position: LUA_INT, len: usize) -> LUA_INT {
    if position >= 0 {
        position
    } else if position.unsigned_abs() as usize > len {
        0
    } else {
        len as LUA_INT + position + 1
    }
}

pub fn char(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let mut buffer = Vec::new();
    buffer.try_reserve(params.len())?;
    for index in 0..params.len() {
        let code = params.try_coerce::<LUA_INT>(index)?;
        if code < 0 || code > UTF8_MAX as LUA_INT {
            return Err(ArgumentError::OutOfRange { message: "value out of range", index }.into());
        }
        encode(code as u32, &mut buffer);
    }
    Ok(Varargs::from(LuaString::from(buffer)))
}

pub fn codepoint(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let string = params.try_coerce::<LuaString>(0)?;
    let bytes = string.as_bytes();
    let start = relative_position(params.opt_coerce::<LUA_INT>(1)?.unwrap_or(1), bytes.len());
    let end = relative_position(params.opt_coerce::<LUA_INT>(2)?.unwrap_or(start), bytes.len());
    let lax = params.get_value_or_nil(3).truthy();
    if start < 1 {
        return Err(ArgumentError::OutOfRange { message: "out of bounds", index: 1 }.into());
    }
    if end > bytes.len() as LUA_INT {
        return Err(ArgumentError::OutOfRange { message: "out of bounds", index: 2 }.into());
    }
    let mut codes = Vec::new();
    let mut position = start as usize - 1;
    while (position as LUA_INT) < end {
        let (code, len) = decode(&bytes[position..], !lax).ok_or_else(|| LuaError::user_str("invalid UTF-8 code"))?;
        codes.try_reserve(1)?;
        codes.push(LuaValue::from(code as LUA_INT));
        position += len;
    }
    Ok(Varargs::from(codes))
}

/// Number of characters starting between positions `i` and `j`; Invalid input yields `nil` and the offending position
pub fn len(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let string = params.try_coerce::<LuaString>(0)?;
    let bytes = string.as_bytes();
    let start = relative_position(params.opt_coerce::<LUA_INT>(1)?.unwrap_or(1), bytes.len());
    let end = relative_position(params.opt_coerce::<LUA_INT>(2)?.unwrap_or(-1), bytes.len());
    let lax = params.get_value_or_nil(3).truthy();
    if start < 1 || start - 1 > bytes.len() as LUA_INT {
        return Err(ArgumentError::OutOfRange { message: "initial position out of bounds", index: 1 }.into());
    }
    if end - 1 >= bytes.len() as LUA_INT {
        return Err(ArgumentError::OutOfRange { message: "final position out of bounds", index: 2 }.into());
    }
    let mut position = start - 1;
    let mut count: LUA_INT = 0;
    while position < end {
        match decode(&bytes[position as usize..], !lax) {
            Some((_, len)) => {
                position += len as LUA_INT;
                count += 1;
            }
            None => return Ok(Varargs::from((LuaValue::NIL, position + 1))),
        }
    }
    Ok(Varargs::from(count))
}

/// Byte position where the `n`-th character, counting from position `i`, starts
pub fn offset(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let string = params.try_coerce::<LuaString>(0)?;
    let bytes = string.as_bytes();
    let len = bytes.len() as LUA_INT;
    let mut n = params.try_coerce::<LUA_INT>(1)?;
    let default = if n >= 0 { 1 } else { len + 1 };
    let mut position = relative_position(params.opt_coerce::<LUA_INT>(2)?.unwrap_or(default), bytes.len()) - 1;
    if position < 0 || position > len {
        return Err(ArgumentError::OutOfRange { message: "position out of bounds", index: 2 }.into());
    }
    if n == 0 {
        while position > 0 && is_continuation(bytes, position as usize) {
            position -= 1;
        }
        return Ok(Varargs::from(position + 1));
    }
    if is_continuation(bytes, position as usize) {
        return Err(LuaError::user_str("initial position is a continuation byte").into());
    }
    if n < 0 {
        while n < 0 && position > 0 {
            position -= 1;
            while position > 0 && is_continuation(bytes, position as usize) {
                position -= 1;
            }
            n += 1;
        }
    } else {
        n -= 1;
        while n > 0 && position < len {
            position += 1;
            while is_continuation(bytes, position as usize) {
                position += 1;
            }
            n -= 1;
        }
    }
    if n == 0 {
        Ok(Varargs::from(position + 1))
    } else {
        Ok(Varargs::nil())
    }
}

fn codes_next(params: &[LuaValue], strict: bool) -> Result<Varargs, TraceableError> {
    let string = params.try_coerce::<LuaString>(0)?;
    let bytes = string.as_bytes();
    let mut position = params.try_coerce::<LUA_INT>(1)?;
    if position < 0 {
        return Ok(Varargs::nil());
    }
    while is_continuation(bytes, position as usize) {
        position += 1;
    }
    if position as usize >= bytes.len() {
        return Ok(Varargs::nil());
    }
    match decode(&bytes[position as usize..], strict) {
        Some((code, len)) if !is_continuation(bytes, position as usize + len) => Ok(Varargs::from((position + 1, code as LUA_INT))),
        _ => Err(LuaError::user_str("invalid UTF-8 code").into()),
    }
}

fn codes_step(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    codes_next(params, true)
}

fn codes_step_lax(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    codes_next(params, false)
}

/// Generic `for` iterator over `(position, code)` pairs
pub fn codes(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let string = params.try_coerce::<LuaString>(0)?;
    if is_continuation(string.as_bytes(), 0) {
        return Err(LuaError::user_str("invalid UTF-8 code").into());
    }
    let step = if params.get_value_or_nil(1).truthy() {
        lua_func!("codes_step", codes_step_lax)
    } else {
        lua_func!(codes_step)
    };
    Ok(Varargs::from((step, string, 0 as LUA_INT)))
}

pub const FUNCTIONS: &[(&str, NativeFunction)] = &[
    ("char", lua_func!(char)),
    ("codepoint", lua_func!(codepoint)),
    ("codes", lua_func!(codes)),
    ("len", lua_func!(len)),
    ("offset", lua_func!(offset)),
];

fn install_extras(_execstate: &mut ExecutionState, table: &LuaTable) -> Result<(), LuaError> {
    table.raw_set("charpattern", UTF8_PATTERN)?;
    Ok(())
}

pub const LIBRARY: LibraryDescriptor = LibraryDescriptor {
    name: "utf8",
    functions: FUNCTIONS,
    install_extras,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    fn state() -> ExecutionState {
        ExecutionState::new(RuntimeConfig::default()).unwrap()
    }

    fn int(value: LUA_INT) -> LuaValue {
        LuaValue::from(value)
    }

    #[test]
    fn encodes_like_lua_escapes() {
        let mut buffer = Vec::new();
        encode(0x20AC, &mut buffer);
        assert_eq!(buffer, "€".as_bytes());
        buffer.clear();
        encode(0x7FFF_FFFF, &mut buffer);
        assert_eq!(buffer, vec![0xFD, 0xBF, 0xBF, 0xBF, 0xBF, 0xBF]);
        assert_eq!(decode(&buffer, false), Some((0x7FFF_FFFF, 6)));
        assert_eq!(decode(&buffer, true), None);
    }

    #[test]
    fn rejects_invalid_sequences() {
        assert_eq!(decode(&[0x80], false), None);
        assert_eq!(decode(&[0xC0, 0x80], false), None);   // Overlong
        assert_eq!(decode(&[0xE2, 0x82], false), None);   // Truncated
        assert_eq!(decode(&[0xED, 0xA0, 0x80], true), None);   // Surrogate
        assert_eq!(decode(&[0xED, 0xA0, 0x80], false), Some((0xD800, 3)));
    }

    #[test]
    fn char_and_codepoint() {
        let mut execstate = state();
        let string = char(&mut execstate, &[int(72), int(0x20AC)]).unwrap().into_first();
        assert_eq!(string, LuaValue::from("H€"));
        let codes = codepoint(&mut execstate, &[string, int(1), int(-1)]).unwrap();
        assert_eq!(codes, Varargs::from((72 as LUA_INT, 0x20AC as LUA_INT)));
        assert!(char(&mut execstate, &[int(-1)]).is_err());
    }

    #[test]
    fn len_counts_characters() {
        let mut execstate = state();
        assert_eq!(len(&mut execstate, &[LuaValue::from("añb")]).unwrap(), Varargs::from(3 as LUA_INT));
        let invalid = LuaValue::from(&b"ab\xFFc"[..]);
        assert_eq!(len(&mut execstate, &[invalid]).unwrap(), Varargs::from((LuaValue::NIL, 3 as LUA_INT)));
    }

    #[test]
    fn offset_walks_characters() {
        let mut execstate = state();
        let string = LuaValue::from("añb");
        assert_eq!(offset(&mut execstate, &[string.clone(), int(3)]).unwrap(), Varargs::from(4 as LUA_INT));
        assert_eq!(offset(&mut execstate, &[string.clone(), int(-1)]).unwrap(), Varargs::from(4 as LUA_INT));
        assert_eq!(offset(&mut execstate, &[string.clone(), int(0), int(3)]).unwrap(), Varargs::from(2 as LUA_INT));
        assert_eq!(offset(&mut execstate, &[string.clone(), int(5)]).unwrap(), Varargs::nil());
        assert!(offset(&mut execstate, &[string, int(1), int(3)]).is_err());
    }

    #[test]
    fn codes_iterates_positions() {
        let mut execstate = state();
        let string = LuaValue::from("añ");
        let first = codes_step(&mut execstate, &[string.clone(), int(0)]).unwrap();
        assert_eq!(first, Varargs::from((1 as LUA_INT, 0x61 as LUA_INT)));
        let second = codes_step(&mut execstate, &[string.clone(), int(1)]).unwrap();
        assert_eq!(second, Varargs::from((2 as LUA_INT, 0xF1 as LUA_INT)));
        let done = codes_step(&mut execstate, &[string, int(2)]).unwrap();
        assert_eq!(done, Varargs::nil());
    }
}
