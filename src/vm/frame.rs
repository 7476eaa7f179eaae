use crate::types::value::function::Sequence;

/// Suspended sequence on a thread's frame stack, waiting for the results of a call or a resume
pub(crate) struct Frame {
    name: &'static str,
    sequence: Box<dyn Sequence>,
}

impl Frame {
    pub(crate) fn new(name: &'static str, sequence: Box<dyn Sequence>) -> Frame {
        Frame { name, sequence }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn sequence(&mut self) -> &mut dyn Sequence {
        &mut *self.sequence
    }
}
