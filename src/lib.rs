//! Standard library bootstrap and coroutine runtime for a Lua 5.4 style interpreter.
//!
//! An [`ExecutionState`] owns the global table, the per-type metatables and the threads of one interpreter
//! instance. [`ExecutionState::with_stdlib`] creates an instance with every standard library installed.

#[macro_use]
mod macros;
pub mod config;
pub mod constants;
pub mod error;
pub mod types;
pub mod vm;
pub mod stdlib;

pub use crate::config::{RuntimeConfig, ConfigError};
pub use crate::error::{LuaError, ArgumentError, CoroutineError, TracedError, TraceableError};
pub use crate::types::value::LuaValue;
pub use crate::types::value::table::LuaTable;
pub use crate::types::value::thread::{LuaThread, ThreadStatus};
pub use crate::types::value::function::{LuaFunction, NativeFunction, Sequence, Step};
pub use crate::types::varargs::Varargs;
pub use crate::vm::ExecutionState;
