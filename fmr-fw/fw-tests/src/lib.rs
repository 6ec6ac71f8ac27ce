//! Firmware integration tests
//!
//! Helpers shared by the end-to-end tests: a host attached to a virtual
//! device, and sample images.

use fmr_client::{DeviceId, Host};
use fmr_model::ImageBuilder;
use fw_emu::VirtualEndpoint;

/// A host with one virtual device attached and selected.
pub fn attach_virtual() -> (Host, DeviceId) {
    let mut host = Host::new();
    let endpoint = VirtualEndpoint::new().expect("virtual device configuration");
    let id = host
        .attach(Box::new(endpoint))
        .expect("attach virtual device");
    (host, id)
}

/// Module image named `name` with `functions` entries, some data and bss.
pub fn module_image(name: &str, functions: usize) -> Vec<u8> {
    let mut builder = ImageBuilder::new(name)
        .code(&[0x13; 32])
        .got_data(0)
        .data(&[0xDE, 0xAD, 0xBE, 0xEF])
        .bss(16);
    for i in 0..functions {
        builder = builder.function(i as u32 * 8);
    }
    builder.build()
}

/// The two-function `gpio` module.
pub fn gpio_image() -> Vec<u8> {
    module_image("gpio", 2)
}

/// Application image named `name`.
pub fn application_image(name: &str) -> Vec<u8> {
    ImageBuilder::new(name)
        .code(&[0x13; 16])
        .entry(0)
        .bss(32)
        .build()
}
