//! Device-side message runtime.
//!
//! One [`Runtime`] owns every piece of device state: heap, module registry,
//! application list, scheduler and invoker. The serve loop pulls a packet,
//! dispatches it to completion, pushes the result and clears the error
//! slot before the next packet is read.

use crate::application::Applications;
use crate::config::RuntimeConfig;
use crate::heap::{Arena, Heap};
use crate::invoker::Invoker;
use crate::registry::ModuleRegistry;
use crate::scheduler::Scheduler;
use fmr_model::{
    Arg, Args, CONFIGURATION_SIZE, CallResult, ErrorKind, Invocation, PACKET_SIZE, Packet,
    WireError,
};
use fmr_shared::{Endpoint, EndpointError};

/// What happened to one received packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Served {
    /// Dispatched; the result was sent back
    Replied(CallResult),
    /// Failed validation; nothing was sent back
    Dropped,
}

pub struct Runtime<S: Scheduler, I: Invoker> {
    pub(crate) config: RuntimeConfig,
    configuration: [u8; CONFIGURATION_SIZE],
    pub(crate) heap: Heap,
    pub(crate) registry: ModuleRegistry,
    pub(crate) apps: Applications,
    pub(crate) scheduler: S,
    pub(crate) invoker: I,
    /// Swap buffer of the push or pull being served
    pub(crate) swap: Option<u32>,
    /// Set when a push target keeps the swap buffer
    pub(crate) retain_swap: bool,
    error: Option<ErrorKind>,
}

impl<S: Scheduler, I: Invoker> Runtime<S, I> {
    /// Create a runtime.
    ///
    /// # Arguments
    /// * `config` - device identity, heap placement and limits
    /// * `scheduler` - runs application tasks
    /// * `invoker` - calls into loaded module code
    ///
    /// # Returns
    /// * `Err(WireError)` if the device configuration cannot be encoded
    pub fn new(config: RuntimeConfig, scheduler: S, invoker: I) -> Result<Self, WireError> {
        let configuration = config.device.encode()?;
        let heap = Heap::new(config.placement, config.heap_limit);
        Ok(Self {
            config,
            configuration,
            heap,
            registry: ModuleRegistry::new(),
            apps: Applications::new(),
            scheduler,
            invoker,
            swap: None,
            retain_swap: false,
            error: None,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn applications(&self) -> &Applications {
        &self.apps
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Error of the call being served. Always `None` between packets.
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.error
    }

    /// Serve packets until the endpoint fails.
    pub fn run(&mut self, endpoint: &mut dyn Endpoint) -> EndpointError {
        loop {
            if let Err(err) = self.serve_one(endpoint) {
                log::info!("serve loop stopped: {err}");
                return err;
            }
        }
    }

    /// Pull one packet, dispatch it and push its result.
    pub fn serve_one(&mut self, endpoint: &mut dyn Endpoint) -> Result<Served, EndpointError> {
        let mut buf = [0u8; PACKET_SIZE];
        endpoint.pull(&mut buf)?;

        let packet = match Packet::decode(&buf) {
            Ok(packet) => packet,
            Err(err) => {
                log::warn!("dropping packet: {err}");
                return Ok(Served::Dropped);
            }
        };
        log::trace!("received {packet}");

        let result = self.dispatch(packet, endpoint)?;
        self.error = result.error_kind();
        if let Some(kind) = self.error {
            log::debug!("call failed: {kind}");
        }
        let sent = endpoint.push(&result.encode());
        self.error = None;
        sent?;

        self.reap();
        Ok(Served::Replied(result))
    }

    /// Run a validated packet. Bulk transfers of push and pull packets
    /// happen here; the result itself is left to the caller.
    pub fn dispatch(
        &mut self,
        packet: Packet,
        endpoint: &mut dyn Endpoint,
    ) -> Result<CallResult, EndpointError> {
        let result = match packet {
            Packet::Configuration => {
                endpoint.push(&self.configuration)?;
                CallResult::ok(0)
            }
            Packet::Standard(call) if call.is_user() => {
                log::warn!("standard packet addressed to user module {call}");
                CallResult::err(ErrorKind::MalformedPacket)
            }
            Packet::User(call) if !call.is_user() => {
                log::warn!("user packet addressed to standard module {call}");
                CallResult::err(ErrorKind::MalformedPacket)
            }
            Packet::Standard(call) | Packet::User(call) => {
                let args = call.args.clone();
                self.invoke(&call, args).into()
            }
            Packet::Push { length, call } => self.serve_push(length, &call, endpoint)?,
            Packet::Pull { length, call } => self.serve_pull(length, &call, endpoint)?,
            Packet::Event { identifier, value } => {
                log::debug!("event 0x{identifier:04x} = 0x{value:x} ignored");
                CallResult::err(ErrorKind::Unimplemented)
            }
        };
        Ok(result)
    }

    fn serve_push(
        &mut self,
        length: u32,
        call: &Invocation,
        endpoint: &mut dyn Endpoint,
    ) -> Result<CallResult, EndpointError> {
        let len = length as usize;
        let swap = match self.heap.alloc(len) {
            Ok(swap) => swap,
            Err(kind) => {
                discard(endpoint, len)?;
                return Ok(CallResult::err(kind));
            }
        };
        let received = match self.heap.get_mut(swap) {
            Some(arena) => endpoint.pull(arena),
            None => Ok(()),
        };
        if let Err(err) = received {
            let _ = self.heap.free(swap);
            return Err(err);
        }

        let result = self.invoke_with_swap(call, swap, length);
        if !core::mem::take(&mut self.retain_swap) {
            let _ = self.heap.free(swap);
        }
        Ok(result.into())
    }

    fn serve_pull(
        &mut self,
        length: u32,
        call: &Invocation,
        endpoint: &mut dyn Endpoint,
    ) -> Result<CallResult, EndpointError> {
        let len = length as usize;
        let swap = match self.heap.alloc(len) {
            Ok(swap) => swap,
            Err(kind) => {
                pad(endpoint, len)?;
                return Ok(CallResult::err(kind));
            }
        };

        let result = self.invoke_with_swap(call, swap, length);
        self.retain_swap = false;
        match self.heap.take(swap) {
            Some(bytes) => endpoint.push(&bytes)?,
            None => pad(endpoint, len)?,
        }
        Ok(result.into())
    }

    fn invoke_with_swap(
        &mut self,
        call: &Invocation,
        swap: u32,
        length: u32,
    ) -> Result<u32, ErrorKind> {
        let args = call
            .args
            .clone()
            .append(Arg::Pointer(swap))
            .append(Arg::Int32(length));
        self.swap = Some(swap);
        let result = self.invoke(call, args);
        self.swap = None;
        result
    }

    /// Route a call to a standard or a loaded module.
    fn invoke(&mut self, call: &Invocation, args: Args) -> Result<u32, ErrorKind> {
        let value = if call.is_user() {
            self.call_user(call, &args)?
        } else {
            self.call_standard(call.module, call.function, &args)?
        };
        Ok(call.ret.truncate(value))
    }

    fn call_user(&mut self, call: &Invocation, args: &Args) -> Result<u32, ErrorKind> {
        let module = self.registry.get(call.module_index())?;
        let address = module.function(call.function as usize)?;
        log::debug!(
            "user call {}.{} at 0x{address:08x}",
            module.name(),
            call.function
        );
        self.invoker.invoke(address, call.ret, args)
    }

    /// Tear down applications whose tasks have exited.
    pub fn reap(&mut self) {
        while let Some(hook) = self.scheduler.exited() {
            self.exit_application(hook);
        }
    }

    /// Bytes at a device address, from a staged buffer or a loaded image.
    pub fn read_memory(&self, address: u32, len: usize) -> Option<&[u8]> {
        self.heap
            .find(address, len)
            .or_else(|| {
                self.registry
                    .iter()
                    .find_map(|(_, m)| m.image().slice(address, len))
            })
            .or_else(|| self.apps.iter().find_map(|a| a.image().slice(address, len)))
    }

    /// Mutable swap buffer of the current push or pull.
    pub(crate) fn swap_mut(&mut self, swap: u32) -> Result<&mut Arena, ErrorKind> {
        if self.swap != Some(swap) {
            return Err(ErrorKind::Null);
        }
        self.heap.get_mut(swap).ok_or(ErrorKind::Null)
    }
}

/// Consume and drop `len` bulk bytes so the stream stays in step.
fn discard(endpoint: &mut dyn Endpoint, mut len: usize) -> Result<(), EndpointError> {
    let mut scratch = [0u8; PACKET_SIZE];
    while len > 0 {
        let n = len.min(scratch.len());
        endpoint.pull(&mut scratch[..n])?;
        len -= n;
    }
    Ok(())
}

/// Send `len` zero bytes in place of a bulk buffer that could not be built.
fn pad(endpoint: &mut dyn Endpoint, mut len: usize) -> Result<(), EndpointError> {
    let zeros = [0u8; PACKET_SIZE];
    while len > 0 {
        let n = len.min(zeros.len());
        endpoint.push(&zeros[..n])?;
        len -= n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FakeInvoker, FakeScheduler};
    use alloc::vec::Vec;
    use fmr_model::standard::{fld, ram, sys};
    use fmr_model::{
        ArgType, DeviceConfiguration, ImageBuilder, RESULT_SIZE, USER_INVOCATION_BIT,
        module_identifier,
    };
    use fmr_shared::FakeEndpoint;
    use test_log::test;

    type TestRuntime = Runtime<FakeScheduler, FakeInvoker>;

    fn runtime() -> TestRuntime {
        Runtime::new(
            RuntimeConfig::virtual_machine().unwrap(),
            FakeScheduler::new(),
            FakeInvoker::returning(7),
        )
        .unwrap()
    }

    fn endpoint() -> FakeEndpoint {
        let mut endpoint = FakeEndpoint::new();
        endpoint.configure().unwrap();
        endpoint
    }

    fn call(module: u16, function: u8, args: Args) -> Packet {
        Packet::call(Invocation::new(module, function, ArgType::Int32, args).unwrap())
    }

    fn serve(runtime: &mut TestRuntime, endpoint: &mut FakeEndpoint, packet: Packet) -> CallResult {
        endpoint.queue(&packet.encode().unwrap());
        let served = runtime.serve_one(endpoint).unwrap();
        let sent = endpoint.take_sent();
        let result = CallResult::decode(&sent[sent.len() - RESULT_SIZE..]).unwrap();
        assert_eq!(served, Served::Replied(result));
        result
    }

    fn gpio() -> Vec<u8> {
        ImageBuilder::new("gpio")
            .code(&[0x11; 16])
            .function(0)
            .function(8)
            .build()
    }

    #[test]
    fn test_configuration_reply() {
        let mut runtime = runtime();
        let mut endpoint = endpoint();
        endpoint.queue(&Packet::Configuration.encode().unwrap());
        runtime.serve_one(&mut endpoint).unwrap();

        let sent = endpoint.take_sent();
        assert_eq!(sent.len(), CONFIGURATION_SIZE + RESULT_SIZE);
        let reported = DeviceConfiguration::decode(&sent).unwrap();
        assert_eq!(reported, runtime.config().device);
        let result = CallResult::decode(&sent[CONFIGURATION_SIZE..]).unwrap();
        assert_eq!(result, CallResult::ok(0));
    }

    #[test]
    fn test_standard_call() {
        let mut runtime = runtime();
        let mut endpoint = endpoint();
        let result = serve(&mut runtime, &mut endpoint, call(sys::MODULE, sys::PING, Args::new()));
        assert_eq!(
            result.into_result(),
            Ok(runtime.config().device.identifier as u32)
        );
        assert_eq!(runtime.last_error(), None);
    }

    #[test]
    fn test_malformed_packet_is_dropped() {
        let mut runtime = runtime();
        let mut endpoint = endpoint();
        let mut buf = call(sys::MODULE, sys::PING, Args::new()).encode().unwrap();
        buf[8] ^= 0x40;
        endpoint.queue(&buf);
        assert_eq!(runtime.serve_one(&mut endpoint).unwrap(), Served::Dropped);
        assert!(endpoint.sent().is_empty());
    }

    #[test]
    fn test_user_call_bounds() {
        let mut runtime = runtime();
        let mut endpoint = endpoint();
        let result = serve(&mut runtime, &mut endpoint, call(USER_INVOCATION_BIT, 0, Args::new()));
        assert_eq!(result.error_kind(), Some(ErrorKind::OutOfBounds));

        runtime.load_bytes(gpio()).unwrap();
        let result = serve(&mut runtime, &mut endpoint, call(USER_INVOCATION_BIT, 1, Args::new()));
        assert_eq!(result.into_result(), Ok(7));
        let result = serve(&mut runtime, &mut endpoint, call(USER_INVOCATION_BIT, 2, Args::new()));
        assert_eq!(result.error_kind(), Some(ErrorKind::OutOfBounds));
        let result = serve(&mut runtime, &mut endpoint, call(USER_INVOCATION_BIT | 1, 0, Args::new()));
        assert_eq!(result.error_kind(), Some(ErrorKind::OutOfBounds));
    }

    #[test]
    fn test_user_call_reaches_relocated_address() {
        let mut runtime = runtime();
        let mut endpoint = endpoint();
        runtime.load_bytes(gpio()).unwrap();
        let expected = runtime.registry().get(0).unwrap().function(1).unwrap();

        let args = Args::new().append(3u8).append(1u8);
        serve(&mut runtime, &mut endpoint, call(USER_INVOCATION_BIT, 1, args.clone()));
        let calls = runtime.invoker().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].address, expected);
        assert_eq!(calls[0].args, args);
    }

    #[test]
    fn test_released_slot_keeps_count_bound() {
        let mut runtime = runtime();
        let mut endpoint = endpoint();
        for name in ["a", "b"] {
            let image = ImageBuilder::new(name).code(&[0; 8]).function(0).build();
            runtime.load_bytes(image).unwrap();
        }
        runtime.release_module(0).unwrap();
        let count = runtime.registry().count() as u16;
        assert_eq!(count, 2);

        let result = serve(&mut runtime, &mut endpoint, call(USER_INVOCATION_BIT | count, 0, Args::new()));
        assert_eq!(result.error_kind(), Some(ErrorKind::OutOfBounds));
        let result = serve(&mut runtime, &mut endpoint, call(USER_INVOCATION_BIT, 0, Args::new()));
        assert_eq!(result.error_kind(), Some(ErrorKind::UnresolvedFunction));
        assert!(runtime.invoker().calls().is_empty());

        let result = serve(&mut runtime, &mut endpoint, call(USER_INVOCATION_BIT | 1, 0, Args::new()));
        assert_eq!(result.into_result(), Ok(7));
    }

    #[test]
    fn test_class_must_match_module_bit() {
        let mut runtime = runtime();
        let mut endpoint = endpoint();
        runtime.load_bytes(gpio()).unwrap();

        let misrouted = Invocation::new(USER_INVOCATION_BIT, 0, ArgType::Int32, Args::new()).unwrap();
        let result = serve(&mut runtime, &mut endpoint, Packet::Standard(misrouted));
        assert_eq!(result.error_kind(), Some(ErrorKind::MalformedPacket));

        let misrouted = Invocation::new(sys::MODULE, sys::PING, ArgType::Int32, Args::new()).unwrap();
        let result = serve(&mut runtime, &mut endpoint, Packet::User(misrouted));
        assert_eq!(result.error_kind(), Some(ErrorKind::MalformedPacket));
        assert!(runtime.invoker().calls().is_empty());
    }

    #[test]
    fn test_null_function_is_unresolved() {
        let mut runtime = runtime();
        let mut endpoint = endpoint();
        let image = ImageBuilder::new("sparse")
            .code(&[0; 8])
            .null_function()
            .build();
        runtime.load_bytes(image).unwrap();
        let result = serve(&mut runtime, &mut endpoint, call(USER_INVOCATION_BIT, 0, Args::new()));
        assert_eq!(result.error_kind(), Some(ErrorKind::UnresolvedFunction));
        assert!(runtime.invoker().calls().is_empty());
    }

    #[test]
    fn test_failure_does_not_poison_next_call() {
        let mut runtime = runtime();
        let mut endpoint = endpoint();
        let result = serve(&mut runtime, &mut endpoint, call(9, 0, Args::new()));
        assert_eq!(result.error_kind(), Some(ErrorKind::OutOfBounds));
        let result = serve(&mut runtime, &mut endpoint, call(sys::MODULE, sys::VERSION, Args::new()));
        assert_eq!(result.error, 0);
    }

    #[test]
    fn test_push_stage_then_load() {
        let mut runtime = runtime();
        let mut endpoint = endpoint();
        let image = gpio();

        let push = Packet::Push {
            length: image.len() as u32,
            call: Invocation::new(ram::MODULE, ram::LOAD, ArgType::Pointer, Args::new()).unwrap(),
        };
        endpoint.queue(&push.encode().unwrap());
        endpoint.queue(&image);
        runtime.serve_one(&mut endpoint).unwrap();
        let address = CallResult::decode(&endpoint.take_sent()).unwrap().into_result().unwrap();
        assert_eq!(runtime.heap().get(address).map(|a| a.as_slice()), Some(image.as_slice()));

        let load = call(fld::MODULE, fld::LOAD, Args::new().append(Arg::Pointer(address)));
        assert_eq!(serve(&mut runtime, &mut endpoint, load).into_result(), Ok(0));
        assert!(runtime.heap().is_empty());

        let index = call(
            fld::MODULE,
            fld::INDEX,
            Args::new().append(module_identifier("gpio")),
        );
        assert_eq!(serve(&mut runtime, &mut endpoint, index).into_result(), Ok(0));
        let count = call(sys::MODULE, sys::MODULE_COUNT, Args::new());
        assert_eq!(serve(&mut runtime, &mut endpoint, count).into_result(), Ok(1));
    }

    #[test]
    fn test_push_to_user_module_gets_trailing_arguments() {
        let mut runtime = runtime();
        let mut endpoint = endpoint();
        runtime.load_bytes(gpio()).unwrap();

        let push = Packet::Push {
            length: 3,
            call: Invocation::new(USER_INVOCATION_BIT, 0, ArgType::Int32, Args::new().append(5u8))
                .unwrap(),
        };
        endpoint.queue(&push.encode().unwrap());
        endpoint.queue(&[1, 2, 3]);
        runtime.serve_one(&mut endpoint).unwrap();

        let call = &runtime.invoker().calls()[0];
        assert_eq!(call.args.len(), 3);
        assert_eq!(call.args.get(0), Some(&Arg::Int8(5)));
        assert!(matches!(call.args.get(1), Some(Arg::Pointer(_))));
        assert_eq!(call.args.get(2), Some(&Arg::Int32(3)));
        // swap buffer is released after the call
        assert!(runtime.heap().is_empty());
    }

    #[test]
    fn test_pull_reads_relocated_table() {
        let mut runtime = runtime();
        let mut endpoint = endpoint();
        runtime.load_bytes(gpio()).unwrap();
        let module = runtime.registry().get(0).unwrap();
        let table = module.base() + module.image().header().module.offset;
        let first = module.function(0).unwrap();

        let pull = Packet::Pull {
            length: 4,
            call: Invocation::new(
                ram::MODULE,
                ram::READ,
                ArgType::Int32,
                Args::new().append(Arg::Pointer(table)),
            )
            .unwrap(),
        };
        endpoint.queue(&pull.encode().unwrap());
        runtime.serve_one(&mut endpoint).unwrap();
        let sent = endpoint.take_sent();
        assert_eq!(&sent[..4], &first.to_le_bytes());
        assert_eq!(CallResult::decode(&sent[4..]).unwrap(), CallResult::ok(4));
    }

    #[test]
    fn test_push_allocation_failure_keeps_stream_in_step() {
        let config = RuntimeConfig::virtual_machine().unwrap().with_heap_limit(16);
        let mut runtime = Runtime::new(config, FakeScheduler::new(), FakeInvoker::new()).unwrap();
        let mut endpoint = endpoint();

        let push = Packet::Push {
            length: 100,
            call: Invocation::new(ram::MODULE, ram::LOAD, ArgType::Pointer, Args::new()).unwrap(),
        };
        endpoint.queue(&push.encode().unwrap());
        endpoint.queue(&[0xAB; 100]);
        runtime.serve_one(&mut endpoint).unwrap();
        let result = CallResult::decode(&endpoint.take_sent()).unwrap();
        assert_eq!(result.error_kind(), Some(ErrorKind::Allocation));

        let result = serve(&mut runtime, &mut endpoint, call(sys::MODULE, sys::PING, Args::new()));
        assert_eq!(result.error, 0);
    }

    #[test]
    fn test_event_is_not_served() {
        let mut runtime = runtime();
        let mut endpoint = endpoint();
        let event = Packet::Event {
            identifier: 1,
            value: 2,
        };
        let result = serve(&mut runtime, &mut endpoint, event);
        assert_eq!(result.error_kind(), Some(ErrorKind::Unimplemented));
    }
}
