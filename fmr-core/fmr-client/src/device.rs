//! One attached device.

use crate::error::ClientError;
use fmr_model::standard::{fld, ram, sys};
use fmr_model::{
    Arg, ArgType, Args, CONFIGURATION_SIZE, CallResult, DeviceConfiguration, ErrorKind,
    Invocation, Packet, RESULT_SIZE,
};
use fmr_shared::Endpoint;
use serde::Serialize;
use std::fmt;

/// Host-assigned handle of an attached device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bulk data moved alongside a call.
enum Bulk<'a> {
    None,
    Push(&'a [u8]),
    Pull(&'a mut [u8]),
}

/// An attached device: its endpoint, configuration and last error.
///
/// Calls take `&mut self`, so at most one call is in flight per device.
pub struct Device {
    id: DeviceId,
    endpoint: Box<dyn Endpoint>,
    configuration: DeviceConfiguration,
    last_error: Option<ErrorKind>,
    selected: bool,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("configuration", &self.configuration)
            .field("last_error", &self.last_error)
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Configure `endpoint` and ask the device for its configuration.
    ///
    /// # Returns
    /// * `Ok(Device)` - the configuration query succeeded
    /// * `Err(ClientError)` - the endpoint is released again
    pub fn attach(id: DeviceId, mut endpoint: Box<dyn Endpoint>) -> Result<Self, ClientError> {
        endpoint.configure()?;
        let configuration = match query_configuration(endpoint.as_mut()) {
            Ok(configuration) => configuration,
            Err(err) => {
                log::warn!("attach {id} failed: {err}");
                let _ = endpoint.destroy();
                return Err(err);
            }
        };
        log::info!(
            "attached '{}' {id} (identifier 0x{:04x}, version {})",
            configuration.name,
            configuration.identifier,
            configuration.version
        );
        Ok(Self {
            id,
            endpoint,
            configuration,
            last_error: None,
            selected: false,
        })
    }

    /// Release the endpoint.
    pub fn detach(mut self) -> Result<(), ClientError> {
        log::info!("detaching '{}' {}", self.configuration.name, self.id);
        self.endpoint.destroy()?;
        Ok(())
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn configuration(&self) -> &DeviceConfiguration {
        &self.configuration
    }

    /// Error of the most recent call, `None` if it succeeded.
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.last_error
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub(crate) fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    /// Invoke `module.function(args)` and return its value.
    ///
    /// The packet class follows the module index: standard when the user
    /// bit is clear, user when it is set.
    pub fn invoke(
        &mut self,
        module: u16,
        function: u8,
        ret: ArgType,
        args: Args,
    ) -> Result<u32, ClientError> {
        let call = Invocation::new(module, function, ret, args)?;
        self.transact(Packet::call(call), Bulk::None)
    }

    /// Send `data` to the device, then invoke with the staged buffer
    /// appended to `args`.
    pub fn push(
        &mut self,
        module: u16,
        function: u8,
        ret: ArgType,
        args: Args,
        data: &[u8],
    ) -> Result<u32, ClientError> {
        let call = Invocation::new(module, function, ret, args)?;
        let packet = Packet::Push {
            length: bulk_length(data.len())?,
            call,
        };
        self.transact(packet, Bulk::Push(data))
    }

    /// Invoke with a device buffer of `buf.len()` bytes appended to
    /// `args`, then receive that buffer into `buf`.
    pub fn pull(
        &mut self,
        module: u16,
        function: u8,
        ret: ArgType,
        args: Args,
        buf: &mut [u8],
    ) -> Result<u32, ClientError> {
        let call = Invocation::new(module, function, ret, args)?;
        let packet = Packet::Pull {
            length: bulk_length(buf.len())?,
            call,
        };
        self.transact(packet, Bulk::Pull(buf))
    }

    fn transact(&mut self, packet: Packet, bulk: Bulk<'_>) -> Result<u32, ClientError> {
        let outcome = self.exchange(packet, bulk);
        self.last_error = outcome.as_ref().err().map(ClientError::kind);
        outcome
    }

    fn exchange(&mut self, packet: Packet, bulk: Bulk<'_>) -> Result<u32, ClientError> {
        let ret = match &packet {
            Packet::Standard(call)
            | Packet::User(call)
            | Packet::Push { call, .. }
            | Packet::Pull { call, .. } => call.ret,
            _ => ArgType::Int32,
        };
        log::trace!("{} <- {packet}", self.id);
        self.endpoint.push(&packet.encode()?)?;
        match bulk {
            Bulk::None => {}
            Bulk::Push(data) => self.endpoint.push(data)?,
            Bulk::Pull(buf) => self.endpoint.pull(buf)?,
        }
        let mut reply = [0u8; RESULT_SIZE];
        self.endpoint.pull(&mut reply)?;
        let result = CallResult::decode(&reply)?;
        log::trace!("{} -> value 0x{:x} error {}", self.id, result.value, result.error);
        result
            .into_result()
            .map(|value| ret.truncate(value))
            .map_err(ClientError::Remote)
    }

    /// Device identifier as reported by `sys.ping`.
    pub fn ping(&mut self) -> Result<u32, ClientError> {
        self.invoke(sys::MODULE, sys::PING, ArgType::Int32, Args::new())
    }

    pub fn version(&mut self) -> Result<u16, ClientError> {
        self.invoke(sys::MODULE, sys::VERSION, ArgType::Int16, Args::new())
            .map(|v| v as u16)
    }

    /// Number of loaded user modules.
    pub fn module_count(&mut self) -> Result<u32, ClientError> {
        self.invoke(sys::MODULE, sys::MODULE_COUNT, ArgType::Int32, Args::new())
    }

    /// Stage `data` in device memory, returning its device address.
    ///
    /// An empty buffer sends nothing and returns `0`.
    pub fn ram_load(&mut self, data: &[u8]) -> Result<u32, ClientError> {
        if data.is_empty() {
            return Ok(0);
        }
        self.push(ram::MODULE, ram::LOAD, ArgType::Pointer, Args::new(), data)
    }

    /// Read `len` bytes of device memory at `address`.
    pub fn ram_read(&mut self, address: u32, len: usize) -> Result<Vec<u8>, ClientError> {
        let mut buf = vec![0u8; len];
        let args = Args::new().append(Arg::Pointer(address));
        self.pull(ram::MODULE, ram::READ, ArgType::Int32, args, &mut buf)?;
        Ok(buf)
    }

    /// Free a buffer staged with [`Device::ram_load`].
    pub fn ram_free(&mut self, address: u32) -> Result<(), ClientError> {
        let args = Args::new().append(Arg::Pointer(address));
        self.invoke(ram::MODULE, ram::FREE, ArgType::Int32, args)?;
        Ok(())
    }

    /// Load the image staged at `address`: a slot index for modules, a
    /// task id for applications.
    pub fn load(&mut self, address: u32) -> Result<u32, ClientError> {
        let args = Args::new().append(Arg::Pointer(address));
        self.invoke(fld::MODULE, fld::LOAD, ArgType::Int32, args)
    }

    /// Stage and load an image in one step.
    pub fn install(&mut self, image: &[u8]) -> Result<u32, ClientError> {
        let address = self.ram_load(image)?;
        log::debug!("{} staged {} bytes at 0x{address:08x}", self.id, image.len());
        self.load(address)
    }

    /// Registry slot of the module with `identifier`.
    pub fn module_index(&mut self, identifier: u16) -> Result<u16, ClientError> {
        let args = Args::new().append(identifier);
        self.invoke(fld::MODULE, fld::INDEX, ArgType::Int16, args)
            .map(|v| v as u16)
    }

    pub fn release_module(&mut self, index: u16) -> Result<(), ClientError> {
        let args = Args::new().append(index);
        self.invoke(fld::MODULE, fld::RELEASE, ArgType::Int32, args)?;
        Ok(())
    }
}

fn bulk_length(len: usize) -> Result<u32, ClientError> {
    u32::try_from(len).map_err(|_| ClientError::Remote(ErrorKind::OutOfBounds))
}

/// Configuration packet, configuration record, then a result.
fn query_configuration(endpoint: &mut dyn Endpoint) -> Result<DeviceConfiguration, ClientError> {
    endpoint.push(&Packet::Configuration.encode()?)?;
    let mut record = [0u8; CONFIGURATION_SIZE];
    endpoint.pull(&mut record)?;
    let mut reply = [0u8; RESULT_SIZE];
    endpoint.pull(&mut reply)?;
    CallResult::decode(&reply)?
        .into_result()
        .map_err(ClientError::Remote)?;
    DeviceConfiguration::decode(&record).map_err(|err| ClientError::Configuration(err.to_string()))
}
