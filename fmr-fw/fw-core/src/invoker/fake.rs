//! Invoker that records calls instead of executing them.

use super::Invoker;
use alloc::vec::Vec;
use fmr_model::{ArgType, Args, ErrorKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub address: u32,
    pub ret: ArgType,
    pub args: Args,
}

/// Records every call and answers with [`FakeInvoker::value`].
#[derive(Debug, Default)]
pub struct FakeInvoker {
    calls: Vec<RecordedCall>,
    /// Value returned from every call
    pub value: u32,
}

impl FakeInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning(value: u32) -> Self {
        Self {
            calls: Vec::new(),
            value,
        }
    }

    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }
}

impl Invoker for FakeInvoker {
    fn invoke(&mut self, address: u32, ret: ArgType, args: &Args) -> Result<u32, ErrorKind> {
        log::debug!("fake invoke 0x{address:08x}{args} -> {ret}");
        self.calls.push(RecordedCall {
            address,
            ret,
            args: args.clone(),
        });
        Ok(self.value)
    }
}
