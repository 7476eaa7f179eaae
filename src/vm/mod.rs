pub(crate) mod frame;
pub(crate) mod executor;
pub mod gc;
pub mod helper;
pub mod coroutine;

use std::rc::Rc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;
use crate::config::RuntimeConfig;
use crate::error::{TracedError, LuaError, CoroutineError, ArgumentError};
use crate::types::value::LuaValue;
use crate::types::value::TypeMetatables;
use crate::types::value::table::LuaTable;
use crate::types::value::thread::LuaThread;
use crate::types::varargs::Varargs;
use crate::vm::gc::RootRegistry;

/// Interpreter instance; Owns the global table, the main thread and every coroutine created through it
pub struct ExecutionState {
    pub metatables: TypeMetatables,
    globals: LuaTable,
    main_thread: LuaThread,
    /// Resume chain, outermost first; The last entry is the running coroutine
    running: Vec<LuaThread>,
    /// Nesting of native calls, host calls and resumes, summed over every thread
    host_depth: usize,
    registry: Rc<RootRegistry>,
    config: RuntimeConfig,
    pub(crate) rng: StdRng,
}

impl ExecutionState {
    /// Instance with an empty global table
    pub fn new(config: RuntimeConfig) -> Result<ExecutionState, LuaError> {
        let registry = Rc::new(RootRegistry::new());
        let main_thread = LuaThread::new_main(&registry);
        let globals = LuaTable::try_with_capacity(0, 64)?;
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        debug!(target: "lua_runtime::vm", max_call_depth = config.max_call_depth, max_resume_depth = config.max_resume_depth, max_host_depth = config.max_host_depth, "execution state created");
        Ok(ExecutionState {
            metatables: TypeMetatables::default(),
            globals,
            main_thread,
            running: Vec::new(),
            host_depth: 0,
            registry,
            config,
            rng,
        })
    }

    /// Instance with the standard libraries installed
    pub fn with_stdlib(config: RuntimeConfig) -> Result<ExecutionState, LuaError> {
        let mut execstate = ExecutionState::new(config)?;
        execstate.open_libs()?;
        Ok(execstate)
    }

    pub fn open_libs(&mut self) -> Result<(), LuaError> {
        crate::stdlib::open_libs(self)
    }

    pub fn globals(&self) -> LuaTable {
        self.globals.clone()
    }

    pub fn get_global(&self, name: &str) -> LuaValue {
        self.globals.raw_get_into(name)
    }

    pub fn set_global<V: Into<LuaValue>>(&self, name: &str, value: V) -> Result<(), LuaError> {
        self.globals.raw_set(name, value)?;
        Ok(())
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Calls `function` on the current thread, to completion
    pub fn call<A: Into<Varargs>>(&mut self, function: LuaValue, args: A) -> Result<Varargs, TracedError> {
        helper::call(self, function, args.into())
    }

    /// Calls the global function `name`
    pub fn call_global<A: Into<Varargs>>(&mut self, name: &str, args: A) -> Result<Varargs, TracedError> {
        let function = self.get_global(name);
        if function == LuaValue::NIL {
            return Err(TracedError::untraced(ArgumentError::AttemptToCallNonFunction("nil")));
        }
        self.call(function, args)
    }

    pub fn create_thread(&mut self, body: LuaValue) -> Result<LuaThread, LuaError> {
        coroutine::create(self, body)
    }

    pub fn resume<A: Into<Varargs>>(&mut self, thread: &LuaThread, args: A) -> Result<Varargs, CoroutineError> {
        coroutine::resume(self, thread, args.into())
    }

    pub fn main_thread(&self) -> &LuaThread {
        &self.main_thread
    }

    /// Thread currently executing; The main thread if no coroutine is running
    pub fn current_thread(&self) -> &LuaThread {
        self.running.last().unwrap_or(&self.main_thread)
    }

    pub(crate) fn resume_depth(&self) -> usize {
        self.running.len()
    }

    /// Host stack levels in use; Zero whenever control is back in the embedding program
    pub fn host_depth(&self) -> usize {
        self.host_depth
    }

    pub(crate) fn enter_host(&mut self) -> Result<(), CoroutineError> {
        let depth = self.host_depth;
        if depth >= self.config.max_host_depth {
            return Err(CoroutineError::HostDepthExceeded { depth });
        }
        self.host_depth += 1;
        Ok(())
    }

    pub(crate) fn exit_host(&mut self) {
        self.host_depth = self.host_depth.saturating_sub(1);
    }

    pub(crate) fn push_running(&mut self, thread: LuaThread) {
        self.running.push(thread);
    }

    pub(crate) fn pop_running(&mut self) -> Option<LuaThread> {
        self.running.pop()
    }

    pub(crate) fn registry(&self) -> &Rc<RootRegistry> {
        &self.registry
    }

    /// Number of execution-context stacks currently registered as roots, including the main thread
    pub fn root_count(&self) -> usize {
        self.registry.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_has_only_main_thread_root() {
        let execstate = ExecutionState::new(RuntimeConfig::default()).unwrap();
        assert_eq!(execstate.root_count(), 1);
        assert!(execstate.current_thread().is_main());
        assert_eq!(execstate.get_global("print"), LuaValue::NIL);
    }

    #[test]
    fn calling_missing_global_fails() {
        let mut execstate = ExecutionState::new(RuntimeConfig::default()).unwrap();
        let err = execstate.call_global("missing", Varargs::empty()).unwrap_err();
        assert_eq!(format!("{}", err.cause()), "attempt to call a nil value");
    }

    #[test]
    fn host_depth_is_limited() {
        let mut execstate = ExecutionState::new(RuntimeConfig { max_host_depth: 2, ..RuntimeConfig::default() }).unwrap();
        execstate.enter_host().unwrap();
        execstate.enter_host().unwrap();
        let err = execstate.enter_host().unwrap_err();
        assert!(matches!(err, CoroutineError::HostDepthExceeded { depth: 2 }));
        assert_eq!(format!("{}", err), "C stack overflow");
        execstate.exit_host();
        execstate.exit_host();
        assert_eq!(execstate.host_depth(), 0);
    }
}
