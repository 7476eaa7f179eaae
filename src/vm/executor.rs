use tracing::{trace, warn};
use crate::error::{TracedError, TraceableError, LuaError, CoroutineError};
use crate::types::value::LuaValue;
use crate::types::value::function::{LuaFunction, Step};
use crate::types::value::thread::LuaThread;
use crate::types::varargs::Varargs;
use crate::vm::ExecutionState;
use crate::vm::frame::Frame;

/// How `run` left the thread
pub(crate) enum Exit {
    /// Every frame above the base completed
    Returned(Varargs),
    /// The thread suspended; Its frames are left in place
    Yielded(Varargs),
}

/// Input for the topmost frame
pub(crate) enum Next {
    Poll(Varargs),
    Raise(TracedError),
}

/// Starts a call of `function` on `thread`.
///
/// Native functions run immediately; Sequences are pushed as a new frame, to be polled by `run`.
pub(crate) fn invoke(execstate: &mut ExecutionState, thread: &LuaThread, function: LuaValue, args: Varargs) -> Next {
    let (function, args) = match function.prep_call_with_metatable(args, &execstate.metatables) {
        Ok(call) => call,
        Err(error) => return Next::Raise(TracedError::untraced(error)),
    };

    let depth = thread.call_depth();
    if depth >= execstate.config().max_call_depth {
        warn!(target: "lua_runtime::vm", thread = thread.id(), depth, function = function.name(), "stack overflow");
        return Next::Raise(TracedError::from_native(CoroutineError::StackOverflow { depth }, function.name()));
    }

    match function {
        LuaFunction::RUST_FUNCTION(func) => call_native(execstate, thread, func.name(), |execstate| func.call(execstate, args.as_slice())),
        LuaFunction::RUST_CLOSURE(closure) => call_native(execstate, thread, closure.name(), |execstate| closure.call(execstate, args.as_slice())),
        LuaFunction::RUST_SEQUENCE(sequence) => {
            match thread.push_frame(Frame::new(sequence.name(), sequence.start())) {
                Ok(()) => Next::Poll(args),
                Err(error) => Next::Raise(TracedError::from_native(error, sequence.name())),
            }
        }
    }
}

/// Runs a native function to completion. Natives run on the host stack, which every thread shares.
fn call_native<F>(execstate: &mut ExecutionState, thread: &LuaThread, name: &'static str, call: F) -> Next
    where F: FnOnce(&mut ExecutionState) -> Result<Varargs, TraceableError> {
    if let Err(error) = execstate.enter_host() {
        warn!(target: "lua_runtime::vm", thread = thread.id(), depth = execstate.host_depth(), function = name, "C stack overflow");
        return Next::Raise(TracedError::from_native(error, name));
    }
    thread.enter_native();
    let result = call(execstate);
    thread.exit_native();
    execstate.exit_host();
    match result {
        Ok(values) => Next::Poll(values),
        Err(error) => Next::Raise(error.trace(name)),
    }
}

/// Whether the thread may suspend right now
fn check_yield(thread: &LuaThread) -> Result<(), CoroutineError> {
    if thread.is_main() {
        Err(CoroutineError::YieldOutsideCoroutine)
    } else if thread.is_non_yieldable() {
        Err(CoroutineError::YieldAcrossBoundary)
    } else {
        Ok(())
    }
}

/// Drives the frames of `thread` above `base` until they all complete or the thread yields.
///
/// Errors unwind frame by frame; Each frame's `Sequence::error` may recover. Errors that reach `base` are returned.
pub(crate) fn run(execstate: &mut ExecutionState, thread: &LuaThread, base: usize, mut next: Next) -> Result<Exit, TracedError> {
    loop {
        if thread.frame_count() <= base {
            return match next {
                Next::Poll(values) => Ok(Exit::Returned(values)),
                Next::Raise(error) => Err(error),
            };
        }
        let mut frame = match thread.pop_frame() {
            Some(frame) => frame,
            None => return Err(TracedError::untraced(LuaError::interpreter_bug("frame stack underflow"))),
        };

        let step = match next {
            Next::Poll(input) => frame.sequence().poll(execstate, input),
            Next::Raise(error) => frame.sequence().error(execstate, error),
        };

        next = match step {
            Ok(Step::Return(values)) => Next::Poll(values),
            Ok(Step::Call { function, args }) => {
                let name = frame.name();
                match thread.push_frame(frame) {
                    Ok(()) => invoke(execstate, thread, function, args),
                    Err(error) => Next::Raise(TracedError::from_native(error, name)),
                }
            }
            Ok(Step::TailCall { function, args }) => {
                drop(frame);
                invoke(execstate, thread, function, args)
            }
            Ok(Step::Yield(values)) => {
                match check_yield(thread) {
                    Ok(()) => {
                        let name = frame.name();
                        thread.push_frame(frame).map_err(|error| TracedError::from_native(error, name))?;
                        trace!(target: "lua_runtime::coroutine", thread = thread.id(), values = values.count(), "yield");
                        return Ok(Exit::Yielded(values));
                    }
                    Err(error) => {
                        warn!(target: "lua_runtime::coroutine", thread = thread.id(), %error, "yield rejected");
                        Next::Raise(TracedError::from_native(error, frame.name()))
                    }
                }
            }
            Err(error) => Next::Raise(error.trace(frame.name())),
        };
    }
}
