use std::fmt::{Formatter, Debug, Display};
use std::fmt;
use std::collections::TryReserveError;
use thiserror::Error;
use crate::constants::types::LUA_INT;
use crate::types::value::LuaValue;
use crate::types::value::thread::ThreadStatus;

pub enum TraceEntry {
    NATIVE(&'static str),
    COROUTINE(u64),
}

impl Debug for TraceEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TraceEntry::NATIVE(name) => f.debug_tuple("TraceEntry::NATIVE").field(name).finish(),
            TraceEntry::COROUTINE(id) => f.debug_tuple("TraceEntry::COROUTINE").field(id).finish(),
        }
    }
}

impl Display for TraceEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TraceEntry::NATIVE(name) => write!(f, "[native]: in function '{}'", name),
            TraceEntry::COROUTINE(id) => write!(f, "[coroutine {}]", id),
        }
    }
}

#[derive(Debug)]
pub struct TracedError {
    cause: LuaError,
    stacktrace: Vec<TraceEntry>,
}

impl TracedError {
    pub fn from_native<T: Into<LuaError>>(cause: T, name: &'static str) -> TracedError {
        TracedError {
            cause: cause.into(),
            stacktrace: vec![TraceEntry::NATIVE(name)],
        }
    }

    pub fn untraced<T: Into<LuaError>>(cause: T) -> TracedError {
        TracedError {
            cause: cause.into(),
            stacktrace: vec![],
        }
    }

    pub fn push_native(mut self, name: &'static str) -> TracedError {
        self.stacktrace.push(TraceEntry::NATIVE(name));
        self
    }

    pub fn push_coroutine(mut self, id: u64) -> TracedError {
        self.stacktrace.push(TraceEntry::COROUTINE(id));
        self
    }

    pub fn cause(&self) -> &LuaError {
        &self.cause
    }

    pub fn stacktrace(&self) -> &[TraceEntry] {
        &self.stacktrace[..]
    }

    /// Converts the error into the value seen by `pcall` and `coroutine.resume`
    pub fn message(self) -> LuaValue {
        self.cause.into_value()
    }
}

impl Display for TracedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cause)?;
        if !self.stacktrace.is_empty() {
            write!(f, "\nstack traceback:")?;
            for entry in &self.stacktrace {
                write!(f, "\n\t{}", entry)?;
            }
        }
        Ok(())
    }
}

pub enum TraceableError {
    TRACED(TracedError),
    LUA(LuaError),
}

impl TraceableError {
    pub fn trace(self, caller: &'static str) -> TracedError {
        match self {
            TraceableError::TRACED(error) => error.push_native(caller),
            TraceableError::LUA(error) => TracedError::from_native(error, caller)
        }
    }
}

impl Debug for TraceableError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TraceableError::TRACED(err) => f.debug_tuple("TraceableError::TRACED").field(err).finish(),
            TraceableError::LUA(err) => f.debug_tuple("TraceableError::LUA").field(err).finish(),
        }
    }
}

impl<T: Into<LuaError>> From<T> for TraceableError {
    fn from(e: T) -> Self {
        TraceableError::LUA(e.into())
    }
}

impl From<TracedError> for TraceableError {
    fn from(e: TracedError) -> Self {
        TraceableError::TRACED(e)
    }
}

#[derive(Debug)]
pub enum LuaError {
    ArgumentError(ArgumentError),
    Coroutine(CoroutineError),
    UserError { message: Option<LuaValue>, level: LUA_INT },
    AllocationFailure(TryReserveError),
    InterpreterBug { message: &'static str },
}

impl LuaError {
    pub fn user_str(message: &str) -> Self {
        LuaError::UserError { message: Some(LuaValue::from(message)), level: 0 }
    }

    pub fn user_string(message: String) -> Self {
        LuaError::UserError { message: Some(LuaValue::from(message)), level: 0 }
    }

    pub fn interpreter_bug(message: &'static str) -> Self {
        LuaError::InterpreterBug { message }
    }

    pub fn into_value(self) -> LuaValue {
        match self {
            LuaError::UserError { message, level: _ } => message.unwrap_or(LuaValue::NIL),
            LuaError::Coroutine(CoroutineError::UncaughtBody(err)) => (*err).message(),
            other => LuaValue::from(format!("{}", other)),
        }
    }
}

impl Display for LuaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LuaError::ArgumentError(err) => write!(f, "{}", err),
            LuaError::Coroutine(err) => write!(f, "{}", err),
            LuaError::UserError { message: Some(message), .. } => write!(f, "{}", message),
            LuaError::UserError { message: None, .. } => write!(f, "nil"),
            LuaError::AllocationFailure(err) => write!(f, "not enough memory ({})", err),
            LuaError::InterpreterBug { message } => write!(f, "interpreter bug: {}", message),
        }
    }
}

impl From<ArgumentError> for LuaError {
    fn from(e: ArgumentError) -> Self { LuaError::ArgumentError(e) }
}

impl From<CoroutineError> for LuaError {
    fn from(e: CoroutineError) -> Self { LuaError::Coroutine(e) }
}

impl From<TryReserveError> for LuaError {
    fn from(e: TryReserveError) -> Self { LuaError::AllocationFailure(e) }
}

#[derive(Debug)]
pub enum ArgumentError {
    InvalidArgument { expected: String, found: &'static str, index: usize },
    CannotCoerce { expected: &'static str, found: &'static str },
    InvalidType { expected: &'static str, found: &'static str },
    OutOfRange { message: &'static str, index: usize },
    TableKeyIsNaN,
    TableKeyIsNil,
    AttemptToCallNonFunction(&'static str),
    AttemptToIndex(&'static str),
    MetamethodLoop(&'static str),
    ConcatenationTooLarge,
    IncomparableTypes { lhs_type: &'static str, rhs_type: &'static str },
    InvalidPatternFeature { message: &'static str },
    InvalidPatternOrFormat { message: String },
    InvalidTableContent { expected: &'static str, found: &'static str, key: LuaValue },
}

impl Display for ArgumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentError::InvalidArgument { expected, found, index } => write!(f, "bad argument #{} ({} expected, got {})", index + 1, expected, found),
            ArgumentError::InvalidType { expected, found } => write!(f, "Invalid type expected: {}, found: {}", expected, found),
            ArgumentError::CannotCoerce { expected, found } => write!(f, "Cannot coerce {} to {}", found, expected),
            ArgumentError::OutOfRange { message, index } => write!(f, "bad argument #{} ({})", index + 1, message),
            ArgumentError::TableKeyIsNaN => write!(f, "table index is NaN"),
            ArgumentError::TableKeyIsNil => write!(f, "table index is nil"),
            ArgumentError::AttemptToCallNonFunction(type_name) => write!(f, "attempt to call a {} value", type_name),
            ArgumentError::AttemptToIndex(type_name) => write!(f, "attempt to index a {} value", type_name),
            ArgumentError::MetamethodLoop(event) => write!(f, "'{}' chain too long; possible loop", event),
            ArgumentError::ConcatenationTooLarge => write!(f, "resulting string too large"),
            ArgumentError::IncomparableTypes { lhs_type, rhs_type } => write!(f, "attempt to compare {} with {}", lhs_type, rhs_type),
            ArgumentError::InvalidPatternFeature { message } => write!(f, "Invalid pattern: {}", message),
            ArgumentError::InvalidPatternOrFormat { message } => write!(f, "Invalid pattern/format: {}", message),
            ArgumentError::InvalidTableContent { expected, found, key } => write!(f, "invalid value (at index {}) in table ({} expected, got {})", key, expected, found),
        }
    }
}

/// Operation attempted on a coroutine, used to phrase state errors
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CoroutineOperation {
    Resume,
    Close,
}

#[derive(Debug, Error)]
pub enum CoroutineError {
    #[error("cannot resume dead coroutine")]
    ResumeDead,
    #[error("cannot resume non-suspended coroutine")]
    ResumeNonSuspended { status: ThreadStatus },
    #[error("cannot close a {status} coroutine")]
    CloseActive { status: ThreadStatus },
    #[error("invalid coroutine transition {event:?} from {status}")]
    InvalidTransition { status: ThreadStatus, event: &'static str },
    #[error("attempt to yield across a C-call boundary")]
    YieldAcrossBoundary,
    #[error("attempt to yield from outside a coroutine")]
    YieldOutsideCoroutine,
    #[error("stack overflow")]
    StackOverflow { depth: usize },
    #[error("C stack overflow")]
    ResumeDepthExceeded { depth: usize },
    #[error("C stack overflow")]
    HostDepthExceeded { depth: usize },
    #[error("{0}")]
    UncaughtBody(Box<TracedError>),
}

impl CoroutineError {
    /// Builds the error for an operation attempted in a state that does not allow it
    pub fn invalid_state(operation: CoroutineOperation, status: ThreadStatus) -> CoroutineError {
        match (operation, status) {
            (CoroutineOperation::Resume, ThreadStatus::Dead) => CoroutineError::ResumeDead,
            (CoroutineOperation::Resume, status) => CoroutineError::ResumeNonSuspended { status },
            (CoroutineOperation::Close, status) => CoroutineError::CloseActive { status },
        }
    }

    /// Any of the errors raised for illegal resume/yield/close given the coroutine's current status
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, CoroutineError::ResumeDead | CoroutineError::ResumeNonSuspended { .. } | CoroutineError::CloseActive { .. } | CoroutineError::InvalidTransition { .. })
    }

    /// Converts the error into the value handed to Lua code
    pub fn into_value(self) -> LuaValue {
        match self {
            CoroutineError::UncaughtBody(err) => (*err).message(),
            other => LuaValue::from(format!("{}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncaught_body_carries_the_inner_error() {
        let inner = TracedError::from_native(LuaError::user_str("inner"), "body").push_coroutine(3);
        let error = CoroutineError::UncaughtBody(Box::new(inner));
        assert_eq!(format!("{}", error), "inner\nstack traceback:\n\t[native]: in function 'body'\n\t[coroutine 3]");
        assert_eq!(LuaError::from(error).into_value(), LuaValue::from("inner"));
    }
}
