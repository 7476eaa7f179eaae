use crate::vm::{ExecutionState, coroutine as manager};
use crate::error::{TraceableError, CoroutineError, LuaError};
use crate::types::value::LuaValue;
use crate::types::value::table::LuaTable;
use crate::types::value::thread::LuaThread;
use crate::types::value::function::{LuaFunction, NativeFunction, Sequence, Step};
use crate::types::varargs::Varargs;
use crate::types::parameters::LuaParameters;
use crate::stdlib::LibraryDescriptor;

pub fn create(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let body = params.try_coerce::<LuaFunction>(0)?;
    let thread = manager::create(execstate, LuaValue::from(body))?;
    Ok(Varargs::from(thread))
}

/// Returns `true` and the transferred values, or `false` and the error; Never raises
pub fn resume(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let thread = params.try_coerce::<LuaThread>(0)?;
    let args = Varargs::from(&params[1..]);
    match manager::resume(execstate, &thread, args) {
        Ok(values) => Ok(Varargs::prepend(true, &values)),
        Err(error) => Ok(Varargs::from((false, error.into_value()))),
    }
}

pub fn running(execstate: &mut ExecutionState, _params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let (thread, is_main) = manager::running(execstate);
    Ok(Varargs::from((thread, is_main)))
}

pub fn status(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let thread = params.try_coerce::<LuaThread>(0)?;
    Ok(Varargs::from(manager::status(execstate, &thread).name()))
}

/// Without an argument, whether the running thread may yield
pub fn isyieldable(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    match params.opt_coerce::<LuaThread>(0)? {
        Some(thread) => Ok(Varargs::from(!thread.is_main() && !thread.is_non_yieldable())),
        None => Ok(Varargs::from(manager::is_yieldable(execstate))),
    }
}

pub fn close(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let thread = params.try_coerce::<LuaThread>(0)?;
    manager::close(execstate, &thread)?;
    Ok(Varargs::from(true))
}

/// A function that resumes a new coroutine on every call; Errors from the body propagate to the caller
pub fn wrap(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let body = params.try_coerce::<LuaFunction>(0)?;
    let thread = manager::create(execstate, LuaValue::from(body))?;
    let wrapper = LuaFunction::closure("wrap", move |execstate, params| {
        match manager::resume(execstate, &thread, Varargs::from(params)) {
            Ok(values) => Ok(values),
            Err(CoroutineError::UncaughtBody(error)) => Err(TraceableError::TRACED(*error)),
            Err(error) => Err(error.into()),
        }
    });
    Ok(Varargs::from(wrapper))
}

/// `coroutine.yield`: Suspends with its arguments, then returns the values passed to the next resume
#[derive(Default)]
struct Yield {
    suspended: bool,
}

impl Sequence for Yield {
    fn poll(&mut self, _execstate: &mut ExecutionState, input: Varargs) -> Result<Step, TraceableError> {
        if self.suspended {
            Ok(Step::Return(input))
        } else {
            self.suspended = true;
            Ok(Step::Yield(input))
        }
    }
}

pub fn lua_yield() -> LuaFunction {
    LuaFunction::sequence("yield", || Box::new(Yield::default()))
}

pub const FUNCTIONS: &[(&str, NativeFunction)] = &[
    ("close", lua_func!(close)),
    ("create", lua_func!(create)),
    ("isyieldable", lua_func!(isyieldable)),
    ("resume", lua_func!(resume)),
    ("running", lua_func!(running)),
    ("status", lua_func!(status)),
    ("wrap", lua_func!(wrap)),
];

fn install_extras(_execstate: &mut ExecutionState, table: &LuaTable) -> Result<(), LuaError> {
    table.raw_set("yield", lua_yield())?;
    Ok(())
}

pub const LIBRARY: LibraryDescriptor = LibraryDescriptor {
    name: "coroutine",
    functions: FUNCTIONS,
    install_extras,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::constants::types::LUA_INT;

    fn state() -> ExecutionState {
        ExecutionState::with_stdlib(RuntimeConfig::default()).unwrap()
    }

    /// Yields its argument plus one, then returns the resumed value doubled
    struct Counter {
        step: u8,
    }

    impl Sequence for Counter {
        fn poll(&mut self, _execstate: &mut ExecutionState, input: Varargs) -> Result<Step, TraceableError> {
            self.step += 1;
            match self.step {
                1 => Ok(Step::Call { function: LuaValue::from(lua_yield()), args: input }),
                _ => {
                    let value = input.as_slice().try_coerce::<LUA_INT>(0)?;
                    Ok(Step::Return(Varargs::from(value * 2)))
                }
            }
        }
    }

    fn counter() -> LuaValue {
        LuaValue::from(LuaFunction::sequence("counter", || Box::new(Counter { step: 0 })))
    }

    #[test]
    fn resume_reports_success_and_failure() {
        let mut execstate = state();
        let thread = create(&mut execstate, &[counter()]).unwrap().into_first();

        let first = resume(&mut execstate, &[thread.clone(), LuaValue::from(5 as LUA_INT)]).unwrap();
        assert_eq!(first, Varargs::from((true, 5 as LUA_INT)));
        let second = resume(&mut execstate, &[thread.clone(), LuaValue::from(7 as LUA_INT)]).unwrap();
        assert_eq!(second, Varargs::from((true, 14 as LUA_INT)));
        let third = resume(&mut execstate, &[thread.clone()]).unwrap();
        assert_eq!(third, Varargs::from((false, "cannot resume dead coroutine")));
        assert_eq!(status(&mut execstate, &[thread]).unwrap(), Varargs::from("dead"));
    }

    #[test]
    fn wrap_raises_errors() {
        let mut execstate = state();
        let wrapped = wrap(&mut execstate, &[counter()]).unwrap().into_first();
        assert_eq!(execstate.call(wrapped.clone(), Varargs::from(1 as LUA_INT)).unwrap(), Varargs::from(1 as LUA_INT));
        assert_eq!(execstate.call(wrapped.clone(), Varargs::from(4 as LUA_INT)).unwrap(), Varargs::from(8 as LUA_INT));
        let error = execstate.call(wrapped, Varargs::empty()).unwrap_err();
        assert_eq!(format!("{}", error.cause()), "cannot resume dead coroutine");
    }

    #[test]
    fn main_thread_is_not_yieldable() {
        let mut execstate = state();
        assert_eq!(isyieldable(&mut execstate, &[]).unwrap(), Varargs::from(false));
        let (main, is_main) = match running(&mut execstate, &[]).unwrap().into_vec().as_slice() {
            [LuaValue::THREAD(thread), LuaValue::BOOLEAN(is_main)] => (thread.clone(), *is_main),
            other => panic!("unexpected running result {:?}", other),
        };
        assert!(is_main);
        assert_eq!(&main, execstate.main_thread());
        let error = execstate.call(LuaValue::from(lua_yield()), Varargs::empty()).unwrap_err();
        assert!(matches!(error.cause(), LuaError::Coroutine(CoroutineError::YieldOutsideCoroutine)));
    }

    #[test]
    fn close_suspended_and_dead() {
        let mut execstate = state();
        let thread = create(&mut execstate, &[counter()]).unwrap().into_first();
        resume(&mut execstate, &[thread.clone(), LuaValue::from(1 as LUA_INT)]).unwrap();
        assert_eq!(close(&mut execstate, &[thread.clone()]).unwrap(), Varargs::from(true));
        assert_eq!(close(&mut execstate, &[thread.clone()]).unwrap(), Varargs::from(true));
        assert_eq!(status(&mut execstate, &[thread]).unwrap(), Varargs::from("dead"));
    }
}
