use std::fmt::{Formatter, Debug, Display};
use std::fmt;
use std::rc::Rc;
use crate::types::value::LuaValue;
use crate::vm::ExecutionState;
use crate::types::varargs::Varargs;
use crate::error::{TracedError, TraceableError};
use crate::types::{AsLuaPointer, ref_to_pointer, LuaType, CoerceFrom};

pub type NativeFunctionPtr = fn(&mut ExecutionState, &[LuaValue]) -> Result<Varargs, TraceableError>;

/// Plain host function; Runs to completion and cannot yield
#[derive(Copy, Clone)]
pub struct NativeFunction {
    name: &'static str,
    ptr: NativeFunctionPtr,
}

impl NativeFunction {
    pub const fn from_parts(name: &'static str, ptr: NativeFunctionPtr) -> NativeFunction {
        NativeFunction { name, ptr }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn call(&self, execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
        (self.ptr)(execstate, params)
    }
}

impl LuaType for NativeFunction {
    const CONTAINER_NAME: &'static str = "Host function";
}

impl<T: Into<LuaValue> + Clone> CoerceFrom<T> for NativeFunction {
    fn coerce(value: &T) -> Option<Self> {
        if let LuaValue::FUNCTION(LuaFunction::RUST_FUNCTION(func)) = value.clone().into() {
            Some(func)
        } else {
            None
        }
    }
}

pub type NativeClosureFn = dyn Fn(&mut ExecutionState, &[LuaValue]) -> Result<Varargs, TraceableError>;

/// Host function with captured state
#[derive(Clone)]
pub struct NativeClosure {
    name: &'static str,
    func: Rc<NativeClosureFn>,
}

impl NativeClosure {
    pub fn new<F>(name: &'static str, func: F) -> NativeClosure
        where F: Fn(&mut ExecutionState, &[LuaValue]) -> Result<Varargs, TraceableError> + 'static {
        NativeClosure { name, func: Rc::new(func) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn call(&self, execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
        (self.func)(execstate, params)
    }
}

impl LuaType for NativeClosure {
    const CONTAINER_NAME: &'static str = "Host closure";
}

/// Action requested by a `Sequence` from the executor
pub enum Step {
    /// Completes the sequence with the given results
    Return(Varargs),
    /// Calls `function`; Its results are the input of the next poll
    Call { function: LuaValue, args: Varargs },
    /// Replaces the sequence with a call to `function`
    TailCall { function: LuaValue, args: Varargs },
    /// Suspends the running coroutine; The values passed to the next resume are the input of the next poll
    Yield(Varargs),
}

impl Debug for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Step::Return(values) => f.debug_tuple("Step::Return").field(&values.count()).finish(),
            Step::Call { function, args } => f.debug_struct("Step::Call").field("function", function).field("args", &args.count()).finish(),
            Step::TailCall { function, args } => f.debug_struct("Step::TailCall").field("function", function).field("args", &args.count()).finish(),
            Step::Yield(values) => f.debug_tuple("Step::Yield").field(&values.count()).finish(),
        }
    }
}

/// Resumable host function body.
///
/// The executor keeps sequences on the frame stack of the thread running them, so a sequence may call other
/// functions and yield without occupying the host stack. The first poll receives the call arguments.
pub trait Sequence {
    fn poll(&mut self, execstate: &mut ExecutionState, input: Varargs) -> Result<Step, TraceableError>;

    /// Invoked when a call made by this sequence raised an error
    fn error(&mut self, _execstate: &mut ExecutionState, error: TracedError) -> Result<Step, TraceableError> {
        Err(TraceableError::TRACED(error))
    }
}

pub type SequenceFactory = dyn Fn() -> Box<dyn Sequence>;

#[derive(Clone)]
pub struct SequenceFunction {
    name: &'static str,
    factory: Rc<SequenceFactory>,
}

impl SequenceFunction {
    pub fn new<F>(name: &'static str, factory: F) -> SequenceFunction where F: Fn() -> Box<dyn Sequence> + 'static {
        SequenceFunction { name, factory: Rc::new(factory) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn start(&self) -> Box<dyn Sequence> {
        (self.factory)()
    }
}

#[allow(non_camel_case_types)]
#[derive(Clone)]
pub enum LuaFunction {
    RUST_FUNCTION(NativeFunction),
    RUST_CLOSURE(NativeClosure),
    RUST_SEQUENCE(SequenceFunction),
}

impl LuaFunction {
    pub fn name(&self) -> &'static str {
        match self {
            LuaFunction::RUST_FUNCTION(func) => func.name(),
            LuaFunction::RUST_CLOSURE(closure) => closure.name(),
            LuaFunction::RUST_SEQUENCE(sequence) => sequence.name(),
        }
    }

    pub fn closure<F>(name: &'static str, func: F) -> LuaFunction
        where F: Fn(&mut ExecutionState, &[LuaValue]) -> Result<Varargs, TraceableError> + 'static {
        LuaFunction::RUST_CLOSURE(NativeClosure::new(name, func))
    }

    pub fn sequence<F>(name: &'static str, factory: F) -> LuaFunction where F: Fn() -> Box<dyn Sequence> + 'static {
        LuaFunction::RUST_SEQUENCE(SequenceFunction::new(name, factory))
    }
}

impl From<NativeFunction> for LuaFunction {
    fn from(func: NativeFunction) -> Self {
        LuaFunction::RUST_FUNCTION(func)
    }
}

impl LuaType for LuaFunction {
    const CONTAINER_NAME: &'static str = "function";
}

impl<T: Into<LuaValue> + Clone> CoerceFrom<T> for LuaFunction {
    fn coerce(value: &T) -> Option<Self> {
        if let LuaValue::FUNCTION(func) = value.clone().into() {
            Some(func)
        } else {
            None
        }
    }
}

impl Debug for LuaFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LuaFunction::RUST_FUNCTION(func) => f.debug_tuple("LuaFunction::RUST_FUNCTION").field(&func.name).finish(),
            LuaFunction::RUST_CLOSURE(closure) => f.debug_tuple("LuaFunction::RUST_CLOSURE").field(&closure.name).finish(),
            LuaFunction::RUST_SEQUENCE(sequence) => f.debug_tuple("LuaFunction::RUST_SEQUENCE").field(&sequence.name).finish(),
        }
    }
}

impl Display for LuaFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "function: builtin: 0x{:08x}", self.as_lua_pointer())
    }
}

impl AsLuaPointer for LuaFunction {
    fn as_lua_pointer(&self) -> usize {
        match self {
            LuaFunction::RUST_FUNCTION(func) => func.ptr as usize,
            LuaFunction::RUST_CLOSURE(closure) => ref_to_pointer(closure.func.as_ref()),
            LuaFunction::RUST_SEQUENCE(sequence) => ref_to_pointer(sequence.factory.as_ref()),
        }
    }
}

impl Eq for LuaFunction {}

impl PartialEq for LuaFunction {
    fn eq(&self, other: &Self) -> bool {
        self.as_lua_pointer() == other.as_lua_pointer()
    }
}
