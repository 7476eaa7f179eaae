use crate::vm::ExecutionState;
use crate::vm::executor::{self, Exit};
use crate::error::{TracedError, LuaError};
use crate::types::varargs::Varargs;
use crate::types::value::LuaValue;

/// Calls `function` from host code and runs it to completion on the current thread.
///
/// The call is a boundary: the callee cannot yield the thread, as the host stack between here and the caller
/// cannot be suspended.
pub fn call(execstate: &mut ExecutionState, function: LuaValue, args: Varargs) -> Result<Varargs, TracedError> {
    execstate.enter_host().map_err(TracedError::untraced)?;
    let thread = execstate.current_thread().clone();
    thread.enter_non_yieldable();
    let base = thread.frame_count();
    let next = executor::invoke(execstate, &thread, function, args);
    let result = executor::run(execstate, &thread, base, next);
    thread.exit_non_yieldable();
    execstate.exit_host();
    match result? {
        Exit::Returned(values) => Ok(values),
        Exit::Yielded(_) => Err(TracedError::untraced(LuaError::interpreter_bug("yield escaped a non-yieldable call"))),
    }
}

/// Calls the `__tostring` metamethod if present, else formats the value with the `__name` metafield or its default
/// representation
pub fn tostring(execstate: &mut ExecutionState, value: &LuaValue) -> Result<LuaValue, TracedError> {
    if let Some(metamethod) = value.metafield("__tostring", &execstate.metatables) {
        let result = call(execstate, metamethod, Varargs::from(value.clone()))?.into_first();
        return match result {
            LuaValue::STRING(_) => Ok(result),
            LuaValue::NUMBER(number) => Ok(LuaValue::from(format!("{}", number))),
            _ => Err(TracedError::untraced(LuaError::user_str("'__tostring' must return a string"))),
        };
    }
    match (value, value.metafield("__name", &execstate.metatables)) {
        (LuaValue::TABLE(table), Some(LuaValue::STRING(name))) => {
            let display = format!("{}", table);
            Ok(LuaValue::from(display.replacen("table", &name.to_string(), 1)))
        }
        _ => Ok(LuaValue::from(format!("{}", value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::error::TraceableError;
    use crate::types::value::function::LuaFunction;
    use crate::types::value::table::LuaTable;

    use crate::constants::types::LUA_INT;

    fn double(_: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
        use crate::types::parameters::LuaParameters;
        Ok(Varargs::from(params.try_coerce::<LUA_INT>(0)? * 2))
    }

    #[test]
    fn calls_native_functions() {
        let mut execstate = ExecutionState::new(RuntimeConfig::default()).unwrap();
        let function = LuaValue::from(crate::lua_func!(double));
        let result = call(&mut execstate, function, Varargs::from(21 as LUA_INT)).unwrap();
        assert_eq!(result.into_first(), LuaValue::from(42 as LUA_INT));
    }

    #[test]
    fn tostring_honors_metamethod() {
        let mut execstate = ExecutionState::new(RuntimeConfig::default()).unwrap();
        let table = LuaTable::empty();
        let meta = LuaTable::empty();
        meta.raw_set("__tostring", LuaFunction::closure("tostring", |_, _| Ok(Varargs::from("custom")))).unwrap();
        table.raw_set("x", 1 as LUA_INT).unwrap();
        table.set_metatable(Some(meta));
        let result = tostring(&mut execstate, &LuaValue::from(table)).unwrap();
        assert_eq!(result, LuaValue::from("custom"));
    }
}
