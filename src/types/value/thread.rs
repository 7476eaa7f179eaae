use std::fmt::{Display, Formatter, Debug};
use std::fmt;
use std::rc::{Rc, Weak};
use std::cell::RefCell;
use tracing::trace;
use crate::types::{LuaType, CoerceFrom, AsLuaPointer, ref_to_pointer};
use crate::types::value::LuaValue;
use crate::error::{CoroutineError, LuaError};
use crate::vm::frame::Frame;
use crate::vm::gc::RootRegistry;

/// Coroutine status, as reported by `coroutine.status`
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ThreadStatus {
    Suspended,
    Running,
    Normal,
    Dead,
}

/// Events driving the status machine
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ThreadEvent {
    /// Target of a resume starts running
    Resume,
    /// Running thread resumes another thread and waits for it
    Await,
    /// Waiting thread regains control
    Wake,
    Yield,
    Return,
    Fail,
    Close,
}

impl ThreadEvent {
    fn name(self) -> &'static str {
        match self {
            ThreadEvent::Resume => "resume",
            ThreadEvent::Await => "await",
            ThreadEvent::Wake => "wake",
            ThreadEvent::Yield => "yield",
            ThreadEvent::Return => "return",
            ThreadEvent::Fail => "fail",
            ThreadEvent::Close => "close",
        }
    }
}

impl ThreadStatus {
    pub fn transition(self, event: ThreadEvent) -> Result<ThreadStatus, CoroutineError> {
        use ThreadStatus::*;
        match (self, event) {
            (Suspended, ThreadEvent::Resume) => Ok(Running),
            (Running, ThreadEvent::Await) => Ok(Normal),
            (Normal, ThreadEvent::Wake) => Ok(Running),
            (Running, ThreadEvent::Yield) => Ok(Suspended),
            (Running, ThreadEvent::Return) => Ok(Dead),
            (Running, ThreadEvent::Fail) => Ok(Dead),
            (Suspended, ThreadEvent::Close) => Ok(Dead),
            (Dead, ThreadEvent::Close) => Ok(Dead),
            (Suspended, _) | (Running, _) | (Normal, _) | (Dead, _) => Err(CoroutineError::InvalidTransition { status: self, event: event.name() }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ThreadStatus::Suspended => "suspended",
            ThreadStatus::Running => "running",
            ThreadStatus::Normal => "normal",
            ThreadStatus::Dead => "dead",
        }
    }
}

impl Display for ThreadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Execution context; One per coroutine, plus the main thread of an `ExecutionState`
pub struct ThreadImpl {
    id: u64,
    status: ThreadStatus,
    frames: Vec<Frame>,
    body: Option<LuaValue>,
    resumer: Option<Weak<RefCell<ThreadImpl>>>,
    non_yieldable: usize,
    native_depth: usize,
    is_main: bool,
    registry: Rc<RootRegistry>,
}

impl Drop for ThreadImpl {
    fn drop(&mut self) {
        trace!(target: "lua_runtime::gc", id = self.id, frames = self.frames.len(), "thread dropped");
        self.registry.unregister(self.id);
    }
}

#[derive(Clone)]
pub struct LuaThread {
    inner: Rc<RefCell<ThreadImpl>>
}

impl LuaThread {
    pub(crate) fn new_main(registry: &Rc<RootRegistry>) -> LuaThread {
        let thread = LuaThread::with_body(registry, None);
        {
            let mut inner = thread.inner.borrow_mut();
            inner.is_main = true;
            inner.status = ThreadStatus::Running;
        }
        thread
    }

    pub(crate) fn new_coroutine(registry: &Rc<RootRegistry>, body: LuaValue) -> LuaThread {
        LuaThread::with_body(registry, Some(body))
    }

    fn with_body(registry: &Rc<RootRegistry>, body: Option<LuaValue>) -> LuaThread {
        let id = registry.register();
        LuaThread {
            inner: Rc::new(RefCell::new(ThreadImpl {
                id,
                status: ThreadStatus::Suspended,
                frames: Vec::new(),
                body,
                resumer: None,
                non_yieldable: 0,
                native_depth: 0,
                is_main: false,
                registry: registry.clone(),
            }))
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.borrow().id
    }

    pub fn status(&self) -> ThreadStatus {
        self.inner.borrow().status
    }

    pub fn is_main(&self) -> bool {
        self.inner.borrow().is_main
    }

    pub(crate) fn apply(&self, event: ThreadEvent) -> Result<ThreadStatus, CoroutineError> {
        let mut inner = self.inner.borrow_mut();
        let new_status = inner.status.transition(event)?;
        trace!(target: "lua_runtime::coroutine", id = inner.id, from = %inner.status, to = %new_status, ?event, "status transition");
        inner.status = new_status;
        Ok(new_status)
    }

    /// Frames plus native calls currently active on this thread
    pub(crate) fn call_depth(&self) -> usize {
        let inner = self.inner.borrow();
        inner.frames.len() + inner.native_depth
    }

    pub(crate) fn frame_count(&self) -> usize {
        self.inner.borrow().frames.len()
    }

    pub(crate) fn push_frame(&self, frame: Frame) -> Result<(), LuaError> {
        let mut inner = self.inner.borrow_mut();
        inner.frames.try_reserve(1)?;
        inner.frames.push(frame);
        Ok(())
    }

    pub(crate) fn pop_frame(&self) -> Option<Frame> {
        self.inner.borrow_mut().frames.pop()
    }

    /// Names of the frames on this thread, innermost first
    pub(crate) fn frame_names(&self) -> Vec<&'static str> {
        self.inner.borrow().frames.iter().rev().map(Frame::name).collect()
    }

    /// Discards all frames; Frames are dropped outside of the borrow, as dropping them may drop other threads
    pub(crate) fn clear_frames(&self) {
        let frames = std::mem::take(&mut self.inner.borrow_mut().frames);
        drop(frames);
    }

    pub(crate) fn take_body(&self) -> Option<LuaValue> {
        self.inner.borrow_mut().body.take()
    }

    pub(crate) fn resumer(&self) -> Option<LuaThread> {
        self.inner.borrow().resumer.as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| LuaThread { inner })
    }

    pub(crate) fn set_resumer(&self, resumer: Option<&LuaThread>) {
        self.inner.borrow_mut().resumer = resumer.map(|thread| Rc::downgrade(&thread.inner));
    }

    pub(crate) fn enter_non_yieldable(&self) {
        self.inner.borrow_mut().non_yieldable += 1;
    }

    pub(crate) fn exit_non_yieldable(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.non_yieldable = inner.non_yieldable.saturating_sub(1);
    }

    pub(crate) fn is_non_yieldable(&self) -> bool {
        self.inner.borrow().non_yieldable > 0
    }

    pub(crate) fn enter_native(&self) {
        self.inner.borrow_mut().native_depth += 1;
    }

    pub(crate) fn exit_native(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.native_depth = inner.native_depth.saturating_sub(1);
    }
}

impl LuaType for LuaThread {
    const CONTAINER_NAME: &'static str = "thread";
}

impl<T: Into<LuaValue> + Clone> CoerceFrom<T> for LuaThread {
    fn coerce(value: &T) -> Option<Self> {
        if let LuaValue::THREAD(thread) = value.clone().into() {
            Some(thread)
        } else {
            None
        }
    }
}

impl AsLuaPointer for LuaThread {
    fn as_lua_pointer(&self) -> usize {
        ref_to_pointer(self.inner.as_ref())
    }
}

impl Debug for LuaThread {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f.debug_struct("LuaThread")
                .field("id", &inner.id)
                .field("status", &inner.status)
                .field("frames", &inner.frames.len())
                .finish(),
            Err(_) => f.debug_struct("LuaThread").finish(),
        }
    }
}

impl Display for LuaThread {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "thread: 0x{:08x}", self.as_lua_pointer())
    }
}

impl PartialEq for LuaThread {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_machine_accepts_lua_lifecycle() {
        let status = ThreadStatus::Suspended;
        let status = status.transition(ThreadEvent::Resume).unwrap();
        assert_eq!(status, ThreadStatus::Running);
        let status = status.transition(ThreadEvent::Await).unwrap();
        assert_eq!(status, ThreadStatus::Normal);
        let status = status.transition(ThreadEvent::Wake).unwrap();
        let status = status.transition(ThreadEvent::Yield).unwrap();
        assert_eq!(status, ThreadStatus::Suspended);
        let status = status.transition(ThreadEvent::Resume).unwrap();
        assert_eq!(status.transition(ThreadEvent::Return).unwrap(), ThreadStatus::Dead);
    }

    #[test]
    fn status_machine_rejects_illegal_events() {
        assert!(ThreadStatus::Dead.transition(ThreadEvent::Resume).is_err());
        assert!(ThreadStatus::Running.transition(ThreadEvent::Resume).is_err());
        assert!(ThreadStatus::Normal.transition(ThreadEvent::Close).is_err());
        assert!(ThreadStatus::Running.transition(ThreadEvent::Close).is_err());
        assert!(ThreadStatus::Suspended.transition(ThreadEvent::Yield).is_err());
        assert_eq!(ThreadStatus::Dead.transition(ThreadEvent::Close).unwrap(), ThreadStatus::Dead);
    }

    #[test]
    fn threads_register_and_unregister_as_roots() {
        let registry = Rc::new(RootRegistry::new());
        let thread = LuaThread::new_coroutine(&registry, LuaValue::NIL);
        assert_eq!(registry.count(), 1);
        assert!(registry.contains(thread.id()));
        drop(thread);
        assert_eq!(registry.count(), 0);
    }
}
