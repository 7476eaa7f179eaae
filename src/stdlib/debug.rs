use crate::vm::ExecutionState;
use crate::error::{TraceableError, ArgumentError, LuaError};
use crate::constants::types::LUA_INT;
use crate::types::value::LuaValue;
use crate::types::value::string::LuaString;
use crate::types::value::table::LuaTable;
use crate::types::value::thread::LuaThread;
use crate::types::value::function::NativeFunction;
use crate::types::varargs::Varargs;
use crate::types::parameters::LuaParameters;
use crate::types::LuaType;
use crate::stdlib::{LibraryDescriptor, no_extras};

/// Splits off the optional leading thread argument
fn thread_argument<'a>(execstate: &ExecutionState, params: &'a [LuaValue]) -> (LuaThread, &'a [LuaValue], usize) {
    match params.first() {
        Some(LuaValue::THREAD(thread)) => (thread.clone(), &params[1..], 1),
        _ => (execstate.current_thread().clone(), params, 0),
    }
}

/// `debug.traceback([thread,] [message [, level]])`; Non-string messages are returned untouched
pub fn traceback(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let (thread, params, offset) = thread_argument(execstate, params);
    let message = match params.get_value_or_nil(0) {
        LuaValue::NIL => None,
        value @ LuaValue::STRING(_) | value @ LuaValue::NUMBER(_) => Some(value.clone()),
        other => return Ok(Varargs::from(other.clone())),
    };
    let default_level = if offset == 0 { 1 } else { 0 };
    let level = params.opt_coerce::<LUA_INT>(1)
        .map_err(|_| ArgumentError::InvalidArgument { expected: String::from("number"), found: params.get_value_or_nil(1).type_name(), index: 1 + offset })?
        .unwrap_or(default_level)
        .max(0) as usize;

    let mut buffer = Vec::new();
    if let Some(message) = message {
        buffer.extend_from_slice(format!("{}", message).as_bytes());
        buffer.push(b'\n');
    }
    buffer.extend_from_slice(b"stack traceback:");
    // Level 1 is the caller of traceback, the innermost frame; Running coroutines continue into their resumer
    let mut skip = level.saturating_sub(1);
    let mut current = Some(thread);
    while let Some(thread) = current {
        for name in thread.frame_names().into_iter().skip(skip) {
            buffer.extend_from_slice(format!("\n\t[native]: in function '{}'", name).as_bytes());
        }
        skip = 0;
        if !thread.is_main() {
            buffer.extend_from_slice(format!("\n\t[coroutine {}]", thread.id()).as_bytes());
        }
        current = thread.resumer();
    }
    Ok(Varargs::from(LuaString::from(buffer)))
}

/// `debug.getinfo([thread,] f [, what])`; Only native functions exist, so the report is a fixed shape
pub fn getinfo(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let (thread, params, offset) = thread_argument(execstate, params);
    let (name, function) = match params.get_value_or_nil(0) {
        LuaValue::FUNCTION(function) => (function.name(), Some(LuaValue::from(function.clone()))),
        LuaValue::NUMBER(_) => {
            let level = params.try_coerce::<LUA_INT>(0)?;
            if level < 0 {
                return Ok(Varargs::nil());
            }
            match level {
                0 => ("getinfo", None),
                level => match thread.frame_names().get(level as usize - 1) {
                    Some(name) => (*name, None),
                    None => return Ok(Varargs::nil()),
                },
            }
        }
        other => return Err(ArgumentError::InvalidArgument { expected: String::from("function or level"), found: other.type_name(), index: offset }.into()),
    };
    let info = LuaTable::try_with_capacity(0, 10)?;
    crate::set_table!(info,
        "what" => "C",
        "source" => "=[C]",
        "short_src" => "[C]",
        "linedefined" => -1 as LUA_INT,
        "lastlinedefined" => -1 as LUA_INT,
        "currentline" => -1 as LUA_INT,
        "name" => name,
        "namewhat" => "",
        "nups" => 0 as LUA_INT,
        "nparams" => 0 as LUA_INT,
        "isvararg" => true,
        "istailcall" => false,
    )?;
    if let Some(function) = function {
        info.raw_set("func", function)?;
    }
    Ok(Varargs::from(info))
}

/// Metatable of any value, ignoring `__metatable` protection
pub fn getmetatable(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let value = params.check_any(0)?;
    Ok(Varargs::from(value.get_metatable(&execstate.metatables)))
}

/// Sets the metatable of any value; Values other than tables share one metatable per type
pub fn setmetatable(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let value = params.check_any(0)?;
    let metatable = match params.get_value_or_nil(1) {
        LuaValue::NIL => None,
        LuaValue::TABLE(metatable) => Some(metatable.clone()),
        other => return Err(ArgumentError::InvalidArgument { expected: String::from("nil or table"), found: other.type_name(), index: 1 }.into()),
    };
    let metatables = &mut execstate.metatables;
    match value {
        LuaValue::TABLE(table) => table.set_metatable(metatable),
        LuaValue::BOOLEAN(_) => metatables.boolean = metatable,
        LuaValue::NUMBER(_) => metatables.number = metatable,
        LuaValue::STRING(_) => metatables.string = metatable,
        LuaValue::FUNCTION(_) => metatables.function = metatable,
        LuaValue::THREAD(_) => metatables.thread = metatable,
        LuaValue::NIL => return Err(LuaError::user_str("cannot set the metatable of nil").into()),
    }
    Ok(Varargs::from(value.clone()))
}

pub const FUNCTIONS: &[(&str, NativeFunction)] = &[
    ("getinfo", lua_func!(getinfo)),
    ("getmetatable", lua_func!(getmetatable)),
    ("setmetatable", lua_func!(setmetatable)),
    ("traceback", lua_func!(traceback)),
];

pub const LIBRARY: LibraryDescriptor = LibraryDescriptor {
    name: "debug",
    functions: FUNCTIONS,
    install_extras: no_extras,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    fn state() -> ExecutionState {
        ExecutionState::with_stdlib(RuntimeConfig::default()).unwrap()
    }

    #[test]
    fn traceback_prefixes_message() {
        let mut execstate = state();
        let result = traceback(&mut execstate, &[LuaValue::from("boom")]).unwrap();
        assert_eq!(result.first(), &LuaValue::from("boom\nstack traceback:"));
        let table = LuaValue::from(LuaTable::empty());
        assert_eq!(traceback(&mut execstate, &[table.clone()]).unwrap().first(), &table);
    }

    #[test]
    fn setmetatable_on_type_slots() {
        let mut execstate = state();
        let metatable = LuaTable::empty();
        metatable.raw_set("__name", "Flag").unwrap();
        setmetatable(&mut execstate, &[LuaValue::from(true), LuaValue::from(metatable.clone())]).unwrap();
        let result = getmetatable(&mut execstate, &[LuaValue::from(false)]).unwrap();
        assert_eq!(result.first(), &LuaValue::from(metatable));
        assert!(setmetatable(&mut execstate, &[LuaValue::NIL, LuaValue::NIL]).is_err());
    }

    #[test]
    fn getinfo_describes_natives() {
        let mut execstate = state();
        let print = execstate.get_global("print");
        let info = getinfo(&mut execstate, &[print]).unwrap().into_first();
        match info {
            LuaValue::TABLE(info) => {
                assert_eq!(info.raw_get_into("what"), LuaValue::from("C"));
                assert_eq!(info.raw_get_into("name"), LuaValue::from("print"));
            }
            other => panic!("expected table, got {:?}", other),
        }
        assert_eq!(getinfo(&mut execstate, &[LuaValue::from(50 as LUA_INT)]).unwrap(), Varargs::nil());
    }
}
