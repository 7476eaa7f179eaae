use std::io::Write;
use crate::error::{TracedError, TraceableError, LuaError, ArgumentError};
use crate::vm::{ExecutionState, helper};
use crate::constants::{LUA_GNAME, LUA_VERSION};
use crate::constants::types::{LUA_INT, LUA_FLOAT};
use crate::types::value::LuaValue;
use crate::types::varargs::Varargs;
use crate::types::value::string::LuaString;
use crate::types::value::number::LuaNumber;
use crate::types::value::function::{LuaFunction, NativeFunction, Sequence, Step};
use crate::types::parameters::LuaParameters;
use crate::types::value::table::LuaTable;
use crate::types::{LuaType, CoerceFrom};
use crate::stdlib::LibraryDescriptor;

pub fn assert(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let value = params.check_any(0)?;
    if value.truthy() {
        Ok(Varargs::from(params))
    } else {
        match params.get(1) {
            Some(message) => Err(LuaError::UserError { message: Some(message.clone()), level: 1 }.into()),
            None => Err(LuaError::user_str("assertion failed!").into()),
        }
    }
}

/// Memory is reference counted, so collection requests complete immediately and no heap size is tracked.
///
/// Reference cycles are never reclaimed. A table that reaches itself stays alive, as does a suspended coroutine whose
/// frames hold its own thread (e.g. saved from `coroutine.running()`); Such a thread stays in the root set until it is
/// closed or runs to completion.
pub fn collectgarbage(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let option = params.opt_coerce::<LuaString>(0)?.unwrap_or_else(|| LuaString::from("collect"));
    match option.as_bytes() {
        b"collect" | b"stop" | b"restart" => Ok(Varargs::from(0 as LUA_INT)),
        b"count" => Ok(Varargs::from(0.0 as LUA_FLOAT)),
        b"step" | b"isrunning" => Ok(Varargs::from(true)),
        b"incremental" | b"generational" => Ok(Varargs::from("incremental")),
        _ => Err(ArgumentError::InvalidArgument { expected: String::from("valid option"), found: "invalid option", index: 0 }.into()),
    }
}

pub fn error(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let level = params.opt_coerce::<LUA_INT>(1)?.unwrap_or(1);
    Err(LuaError::UserError { message: params.first().cloned(), level }.into())
}

pub fn getmetatable(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let value = params.check_any(0)?;
    match value.get_metatable(&execstate.metatables) {
        Some(metatable) => match metatable.raw_get_into("__metatable") {
            LuaValue::NIL => Ok(Varargs::from(metatable)),
            guard => Ok(Varargs::from(guard)),
        },
        None => Ok(Varargs::nil()),
    }
}

fn ipairs_step(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let index = params.try_coerce::<LUA_INT>(1)?.wrapping_add(1);
    let value = params.get_value_or_nil(0).index_with_metatable(&LuaValue::from(index), &execstate.metatables)?;
    match value {
        LuaValue::NIL => Ok(Varargs::nil()),
        value => Ok(Varargs::from((index, value))),
    }
}

pub fn ipairs(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let value = params.check_any(0)?;
    Ok(Varargs::from((lua_func!("ipairs_step", ipairs_step), value.clone(), 0 as LUA_INT)))
}

pub fn next(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let table = params.try_coerce::<LuaTable>(0)?;
    match table.next(params.get_value_or_nil(1))? {
        Some((key, value)) => Ok(Varargs::from((key, value))),
        None => Ok(Varargs::nil()),
    }
}

pub fn pairs(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let value = params.check_any(0)?;
    if let Some(metamethod) = value.metafield("__pairs", &execstate.metatables) {
        let result = helper::call(execstate, metamethod, Varargs::from(value.clone()))?;
        return Ok(result.adjusted(3));
    }
    let table = params.try_coerce::<LuaTable>(0)?;
    Ok(Varargs::from((lua_func!(next), table, LuaValue::NIL)))
}

pub fn print(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let mut line = Vec::new();
    for (index, value) in params.iter().enumerate() {
        if index > 0 {
            line.push(b'\t');
        }
        match helper::tostring(execstate, value)? {
            LuaValue::STRING(string) => line.extend_from_slice(string.as_bytes()),
            other => line.extend_from_slice(format!("{}", other).as_bytes()),
        }
    }
    line.push(b'\n');
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(&line)
        .and_then(|_| handle.flush())
        .map_err(|err| LuaError::user_string(format!("print: {}", err)))?;
    Ok(Varargs::empty())
}

pub fn rawequal(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let lhs = params.check_any(0)?;
    let rhs = params.check_any(1)?;
    Ok(Varargs::from(lhs == rhs))
}

pub fn rawget(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let table = params.try_coerce::<LuaTable>(0)?;
    let index = params.check_any(1)?;
    Ok(Varargs::from(table.raw_get(index)?))
}

pub fn rawlen(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    match params.first() {
        Some(LuaValue::TABLE(t)) => Ok(Varargs::from(t.len())),
        Some(LuaValue::STRING(s)) => Ok(Varargs::from(s.len())),
        Some(_) | None => Err(ArgumentError::InvalidArgument { expected: String::from("table or string"), found: params.get_value_or_nil(0).type_name(), index: 0 }.into())
    }
}

pub fn rawset(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let table = params.try_coerce::<LuaTable>(0)?;
    let index = params.check_any(1)?.clone();
    let value = params.check_any(2)?.clone();
    table.raw_set(index, value)?;
    Ok(Varargs::from(table))
}

pub fn select(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let count = params.len().saturating_sub(1) as LUA_INT;
    if let Some(LuaValue::STRING(s)) = params.first() {
        if s == "#" {
            return Ok(Varargs::from(count));
        }
    }
    let index = params.try_coerce::<LUA_INT>(0)?;
    let start = if index < 0 {
        count + index
    } else if index > 0 {
        index - 1
    } else {
        -1
    };
    if start < 0 {
        return Err(ArgumentError::OutOfRange { message: "index out of range", index: 0 }.into());
    }
    Ok(Varargs::from(&params[1..]).select_range(start as usize..))
}

pub fn setmetatable(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let table = params.try_coerce::<LuaTable>(0)?;
    let new_metatable = match params.get_value_or_nil(1) {
        LuaValue::NIL => None,
        LuaValue::TABLE(metatable) => Some(metatable.clone()),
        other => return Err(ArgumentError::InvalidArgument { expected: String::from("nil or table"), found: other.type_name(), index: 1 }.into()),
    };
    if let Some(current_metatable) = table.metatable() {
        if current_metatable.raw_get_into("__metatable") != LuaValue::NIL {
            return Err(LuaError::user_str("cannot change a protected metatable").into());
        }
    }
    table.set_metatable(new_metatable);
    Ok(Varargs::from(table))
}

/// Parses an integer numeral in the given base, as `tonumber(s, base)` does
fn parse_with_base(string: &str, base: u32) -> Option<LUA_INT> {
    let trimmed = string.trim();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        _ => (false, trimmed),
    };
    if digits.is_empty() {
        return None;
    }
    let mut value: LUA_INT = 0;
    for c in digits.chars() {
        let digit = c.to_digit(base)?;
        value = value.wrapping_mul(base as LUA_INT).wrapping_add(digit as LUA_INT);
    }
    Some(if negative { value.wrapping_neg() } else { value })
}

pub fn tonumber(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    match params.opt_coerce::<LUA_INT>(1)? {
        None => {
            let value = params.check_any(0)?;
            Ok(Varargs::from(LuaNumber::coerce(value).map(LuaValue::from).unwrap_or(LuaValue::NIL)))
        }
        Some(base) => {
            if !(2..=36).contains(&base) {
                return Err(ArgumentError::OutOfRange { message: "base out of range", index: 1 }.into());
            }
            let string = params.try_coerce::<LuaString>(0)?;
            let parsed = string.try_utf8().ok().and_then(|s| parse_with_base(s, base as u32));
            Ok(Varargs::from(parsed.map(LuaValue::from).unwrap_or(LuaValue::NIL)))
        }
    }
}

pub fn tostring(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let value = params.check_any(0)?;
    Ok(Varargs::from(helper::tostring(execstate, value)?))
}

pub fn lua_type(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let value = params.check_any(0)?;
    Ok(Varargs::from(value.type_name()))
}

enum ProtectedState {
    Start,
    Calling,
    Handling,
}

/// `pcall` and `xpcall`; Protected calls are frames, so the protected function may yield
struct ProtectedCall {
    state: ProtectedState,
    handler: Option<LuaValue>,
    with_handler: bool,
}

impl ProtectedCall {
    fn new(with_handler: bool) -> ProtectedCall {
        ProtectedCall { state: ProtectedState::Start, handler: None, with_handler }
    }
}

impl Sequence for ProtectedCall {
    fn poll(&mut self, _execstate: &mut ExecutionState, input: Varargs) -> Result<Step, TraceableError> {
        match self.state {
            ProtectedState::Start => {
                input.as_slice().check_any(0)?;
                let function = input.first().clone();
                let args = if self.with_handler {
                    self.handler = Some(input.as_slice().check_any(1)?.clone());
                    input.select_range(2..)
                } else {
                    input.select_range(1..)
                };
                self.state = ProtectedState::Calling;
                Ok(Step::Call { function, args })
            }
            ProtectedState::Calling => Ok(Step::Return(Varargs::prepend(true, &input))),
            ProtectedState::Handling => Ok(Step::Return(Varargs::from((false, input.into_first())))),
        }
    }

    fn error(&mut self, _execstate: &mut ExecutionState, error: TracedError) -> Result<Step, TraceableError> {
        let handler = self.handler.take();
        match self.state {
            ProtectedState::Start => Err(TraceableError::TRACED(error)),
            ProtectedState::Calling => match handler {
                Some(handler) => {
                    self.state = ProtectedState::Handling;
                    Ok(Step::Call { function: handler, args: Varargs::from(error.message()) })
                }
                None => Ok(Step::Return(Varargs::from((false, error.message())))),
            },
            // Errors in the message handler are not handled again
            ProtectedState::Handling => Ok(Step::Return(Varargs::from((false, error.message())))),
        }
    }
}

pub fn pcall() -> LuaFunction {
    LuaFunction::sequence("pcall", || Box::new(ProtectedCall::new(false)))
}

pub fn xpcall() -> LuaFunction {
    LuaFunction::sequence("xpcall", || Box::new(ProtectedCall::new(true)))
}

pub const FUNCTIONS: &[(&str, NativeFunction)] = &[
    ("assert", lua_func!(assert)),
    ("collectgarbage", lua_func!(collectgarbage)),
    ("error", lua_func!(error)),
    ("getmetatable", lua_func!(getmetatable)),
    ("ipairs", lua_func!(ipairs)),
    ("next", lua_func!(next)),
    ("pairs", lua_func!(pairs)),
    ("print", lua_func!(print)),
    ("rawequal", lua_func!(rawequal)),
    ("rawget", lua_func!(rawget)),
    ("rawlen", lua_func!(rawlen)),
    ("rawset", lua_func!(rawset)),
    ("select", lua_func!(select)),
    ("setmetatable", lua_func!(setmetatable)),
    ("tonumber", lua_func!(tonumber)),
    ("tostring", lua_func!(tostring)),
    ("type", lua_func!("type", lua_type)),
];

fn install_extras(_execstate: &mut ExecutionState, globals: &LuaTable) -> Result<(), LuaError> {
    crate::set_table!(globals,
        LUA_GNAME => globals.clone(),
        "_VERSION" => LUA_VERSION,
        "pcall" => pcall(),
        "xpcall" => xpcall(),
    )?;
    Ok(())
}

pub const LIBRARY: LibraryDescriptor = LibraryDescriptor {
    name: LUA_GNAME,
    functions: FUNCTIONS,
    install_extras,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numerals_in_base() {
        assert_eq!(parse_with_base("ff", 16), Some(255));
        assert_eq!(parse_with_base(" -101 ", 2), Some(-5));
        assert_eq!(parse_with_base("z", 36), Some(35));
        assert_eq!(parse_with_base("9", 8), None);
        assert_eq!(parse_with_base("", 10), None);
    }
}
