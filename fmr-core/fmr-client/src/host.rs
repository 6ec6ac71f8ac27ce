//! Host context: attached devices, the current device and events.

use crate::device::{Device, DeviceId};
use crate::error::ClientError;
use crate::event::EventRegistry;
use fmr_model::{ArgType, Args, Crc, ErrorKind, USER_INVOCATION_BIT, module_identifier};
use fmr_shared::Endpoint;
use serde::Serialize;

/// A module loaded on a device, bound by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleHandle {
    pub name: String,
    /// CRC of the name, terminator included
    pub identifier: Crc,
    /// Registry slot with the user bit set
    pub index: u16,
    pub device: DeviceId,
}

/// Everything the host knows about. Dropping it shuts it down.
#[derive(Debug, Default)]
pub struct Host {
    devices: Vec<Device>,
    current: Option<DeviceId>,
    next_id: u32,
    events: EventRegistry,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device over `endpoint` and make it current.
    pub fn attach(&mut self, endpoint: Box<dyn Endpoint>) -> Result<DeviceId, ClientError> {
        self.next_id += 1;
        let id = DeviceId(self.next_id);
        let device = Device::attach(id, endpoint)?;
        self.devices.push(device);
        self.select(id)?;
        Ok(id)
    }

    /// Make `id` the current device.
    pub fn select(&mut self, id: DeviceId) -> Result<(), ClientError> {
        if !self.devices.iter().any(|d| d.id() == id) {
            return Err(ClientError::NoDevice);
        }
        for device in &mut self.devices {
            device.set_selected(device.id() == id);
        }
        self.current = Some(id);
        Ok(())
    }

    pub fn current(&mut self) -> Result<&mut Device, ClientError> {
        let id = self.current.ok_or(ClientError::NoDevice)?;
        self.device(id)
    }

    pub fn device(&mut self, id: DeviceId) -> Result<&mut Device, ClientError> {
        self.devices
            .iter_mut()
            .find(|d| d.id() == id)
            .ok_or(ClientError::NoDevice)
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Detach a device, releasing its endpoint.
    pub fn detach(&mut self, id: DeviceId) -> Result<(), ClientError> {
        let index = self
            .devices
            .iter()
            .position(|d| d.id() == id)
            .ok_or(ClientError::NoDevice)?;
        let device = self.devices.remove(index);
        if self.current == Some(id) {
            self.current = None;
        }
        device.detach()
    }

    /// Bind to a loaded module on the current device by name.
    pub fn bind(&mut self, name: &str) -> Result<ModuleHandle, ClientError> {
        let identifier = module_identifier(name);
        let device = self.current()?;
        let index = match device.module_index(identifier) {
            Ok(index) => index,
            Err(ClientError::Remote(ErrorKind::NoCounterpartModule)) => {
                return Err(ClientError::NoCounterpartModule(name.to_string()));
            }
            Err(err) => return Err(err),
        };
        log::debug!("bound '{name}' to slot {index} on {}", device.id());
        Ok(ModuleHandle {
            name: name.to_string(),
            identifier,
            index: index | USER_INVOCATION_BIT,
            device: device.id(),
        })
    }

    /// Invoke a function of a bound module on the device it was bound on.
    pub fn invoke(
        &mut self,
        module: &ModuleHandle,
        function: u8,
        ret: ArgType,
        args: Args,
    ) -> Result<u32, ClientError> {
        self.device(module.device)?
            .invoke(module.index, function, ret, args)
    }

    /// Push `data` to a function of a bound module.
    pub fn push(
        &mut self,
        module: &ModuleHandle,
        function: u8,
        ret: ArgType,
        args: Args,
        data: &[u8],
    ) -> Result<u32, ClientError> {
        self.device(module.device)?
            .push(module.index, function, ret, args, data)
    }

    /// Pull into `buf` from a function of a bound module.
    pub fn pull(
        &mut self,
        module: &ModuleHandle,
        function: u8,
        ret: ArgType,
        args: Args,
        buf: &mut [u8],
    ) -> Result<u32, ClientError> {
        self.device(module.device)?
            .pull(module.index, function, ret, args, buf)
    }

    pub fn events(&mut self) -> &mut EventRegistry {
        &mut self.events
    }

    /// Release every event and detach every device.
    pub fn shutdown(&mut self) {
        let released = self.events.release_all();
        if released > 0 {
            log::debug!("released {released} events");
        }
        self.current = None;
        for device in self.devices.drain(..) {
            let id = device.id();
            if let Err(err) = device.detach() {
                log::warn!("detaching {id}: {err}");
            }
        }
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.shutdown();
    }
}
