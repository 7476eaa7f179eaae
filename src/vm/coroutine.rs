//! Coroutine manager: creation, resume/yield handoff and closing of execution contexts.
//!
//! A coroutine runs on its own frame stack. `resume` drives that stack with the executor until the body yields or
//! completes; a yield leaves the frames in place, so the next resume continues where the body suspended.

use tracing::{debug, trace};
use crate::error::{CoroutineError, CoroutineOperation, LuaError, ArgumentError};
use crate::types::LuaType;
use crate::types::value::LuaValue;
use crate::types::value::function::LuaFunction;
use crate::types::value::thread::{LuaThread, ThreadStatus, ThreadEvent};
use crate::types::varargs::Varargs;
use crate::vm::ExecutionState;
use crate::vm::executor::{self, Exit, Next};

pub fn create(execstate: &mut ExecutionState, body: LuaValue) -> Result<LuaThread, LuaError> {
    if !matches!(body, LuaValue::FUNCTION(_)) {
        return Err(LuaError::from(ArgumentError::InvalidArgument {
            expected: String::from(LuaFunction::CONTAINER_NAME),
            found: body.type_name(),
            index: 0,
        }));
    }
    let thread = LuaThread::new_coroutine(execstate.registry(), body);
    debug!(target: "lua_runtime::coroutine", id = thread.id(), roots = execstate.root_count(), "coroutine created");
    Ok(thread)
}

/// Resumes `thread` with `args`, returning the values it yields or returns.
///
/// An error raised by the body kills the coroutine and is returned here, once, as `CoroutineError::UncaughtBody`.
pub fn resume(execstate: &mut ExecutionState, thread: &LuaThread, args: Varargs) -> Result<Varargs, CoroutineError> {
    let status = thread.status();
    if status != ThreadStatus::Suspended {
        debug!(target: "lua_runtime::coroutine", id = thread.id(), %status, "resume rejected");
        return Err(CoroutineError::invalid_state(CoroutineOperation::Resume, status));
    }
    let depth = execstate.resume_depth();
    if depth >= execstate.config().max_resume_depth {
        debug!(target: "lua_runtime::coroutine", id = thread.id(), depth, "resume depth exceeded");
        return Err(CoroutineError::ResumeDepthExceeded { depth });
    }
    if let Err(error) = execstate.enter_host() {
        debug!(target: "lua_runtime::coroutine", id = thread.id(), depth = execstate.host_depth(), "host depth exceeded");
        return Err(error);
    }
    let result = resume_suspended(execstate, thread, args);
    execstate.exit_host();
    result
}

fn resume_suspended(execstate: &mut ExecutionState, thread: &LuaThread, args: Varargs) -> Result<Varargs, CoroutineError> {
    let caller = execstate.current_thread().clone();
    caller.apply(ThreadEvent::Await)?;
    if let Err(error) = thread.apply(ThreadEvent::Resume) {
        caller.apply(ThreadEvent::Wake)?;
        return Err(error);
    }
    thread.set_resumer(Some(&caller));
    execstate.push_running(thread.clone());
    trace!(target: "lua_runtime::coroutine", id = thread.id(), caller = caller.id(), args = args.count(), "resume");

    let next = match thread.take_body() {
        Some(body) => executor::invoke(execstate, thread, body, args),
        None => Next::Poll(args),
    };
    let outcome = executor::run(execstate, thread, 0, next);

    execstate.pop_running();
    thread.set_resumer(None);
    caller.apply(ThreadEvent::Wake)?;

    match outcome {
        Ok(Exit::Yielded(values)) => {
            thread.apply(ThreadEvent::Yield)?;
            Ok(values)
        }
        Ok(Exit::Returned(values)) => {
            thread.apply(ThreadEvent::Return)?;
            thread.clear_frames();
            debug!(target: "lua_runtime::coroutine", id = thread.id(), "coroutine returned");
            Ok(values)
        }
        Err(error) => {
            thread.apply(ThreadEvent::Fail)?;
            thread.clear_frames();
            debug!(target: "lua_runtime::coroutine", id = thread.id(), %error, "coroutine died");
            Err(CoroutineError::UncaughtBody(Box::new(error.push_coroutine(thread.id()))))
        }
    }
}

pub fn status(_execstate: &ExecutionState, thread: &LuaThread) -> ThreadStatus {
    thread.status()
}

/// Whether the running thread may yield; The main thread never can
pub fn is_yieldable(execstate: &ExecutionState) -> bool {
    let thread = execstate.current_thread();
    !thread.is_main() && !thread.is_non_yieldable()
}

/// The running thread, and whether it is the main thread
pub fn running(execstate: &ExecutionState) -> (LuaThread, bool) {
    let thread = execstate.current_thread().clone();
    let is_main = thread.is_main();
    (thread, is_main)
}

/// Kills a suspended coroutine, releasing its frames. Closing a dead coroutine does nothing.
pub fn close(_execstate: &mut ExecutionState, thread: &LuaThread) -> Result<(), CoroutineError> {
    match thread.status() {
        status @ ThreadStatus::Suspended | status @ ThreadStatus::Dead => {
            thread.apply(ThreadEvent::Close)?;
            thread.take_body();
            thread.clear_frames();
            debug!(target: "lua_runtime::coroutine", id = thread.id(), from = %status, "coroutine closed");
            Ok(())
        }
        status @ ThreadStatus::Running | status @ ThreadStatus::Normal => {
            debug!(target: "lua_runtime::coroutine", id = thread.id(), %status, "close rejected");
            Err(CoroutineError::invalid_state(CoroutineOperation::Close, status))
        }
    }
}
