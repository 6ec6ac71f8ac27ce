//! End-to-end scenarios: host library, virtual endpoint and firmware core.

use fmr_client::ClientError;
use fmr_model::standard::sys;
use fmr_model::{AbiHeader, ArgType, Args, ErrorKind, USER_INVOCATION_BIT};
use fw_core::RuntimeConfig;
use fw_tests::{application_image, attach_virtual, gpio_image, module_image};
use test_log::test;

#[test]
fn test_configuration_matches_device() {
    let (mut host, _) = attach_virtual();
    let expected = RuntimeConfig::virtual_machine().unwrap().device;
    assert_eq!(host.current().unwrap().configuration(), &expected);
}

#[test]
fn test_standard_call_without_arguments() {
    let (mut host, _) = attach_virtual();
    let device = host.current().unwrap();
    let value = device
        .invoke(sys::MODULE, 0, ArgType::Int32, Args::new())
        .unwrap();
    assert_eq!(value, device.configuration().identifier as u32);
    assert_eq!(device.last_error(), None);
}

#[test]
fn test_user_call_past_registry_count() {
    let (mut host, _) = attach_virtual();
    let device = host.current().unwrap();
    let count = device.module_count().unwrap() as u16;
    let err = device
        .invoke(USER_INVOCATION_BIT | count, 0, ArgType::Int32, Args::new())
        .unwrap_err();
    assert_eq!(err, ClientError::Remote(ErrorKind::OutOfBounds));
    assert_eq!(device.last_error(), Some(ErrorKind::OutOfBounds));
}

#[test]
fn test_user_call_past_count_after_release() {
    let (mut host, _) = attach_virtual();
    let device = host.current().unwrap();
    assert_eq!(device.install(&module_image("a", 1)).unwrap(), 0);
    assert_eq!(device.install(&module_image("b", 1)).unwrap(), 1);
    device.release_module(0).unwrap();

    let count = device.module_count().unwrap() as u16;
    assert_eq!(count, 2);
    assert_eq!(
        device.invoke(USER_INVOCATION_BIT | count, 0, ArgType::Int32, Args::new()),
        Err(ClientError::Remote(ErrorKind::OutOfBounds))
    );
    assert!(device
        .invoke(USER_INVOCATION_BIT | 1, 0, ArgType::Int32, Args::new())
        .is_ok());
}

#[test]
fn test_gpio_module_load_and_call() {
    let (mut host, _) = attach_virtual();
    let before = host.current().unwrap().module_count().unwrap();
    host.current().unwrap().install(&gpio_image()).unwrap();
    assert_eq!(host.current().unwrap().module_count().unwrap(), before + 1);

    let gpio = host.bind("gpio").unwrap();
    assert_eq!(gpio.index & USER_INVOCATION_BIT, USER_INVOCATION_BIT);
    let args = Args::new().append(4u8).append(1u8);
    host.invoke(&gpio, 1, ArgType::Int32, args).unwrap();

    let err = host
        .invoke(&gpio, 2, ArgType::Int32, Args::new())
        .unwrap_err();
    assert_eq!(err, ClientError::Remote(ErrorKind::OutOfBounds));
}

#[test]
fn test_failed_call_does_not_leak_into_next() {
    let (mut host, _) = attach_virtual();
    let device = host.current().unwrap();
    assert!(device.invoke(USER_INVOCATION_BIT | 3, 0, ArgType::Int32, Args::new()).is_err());
    assert!(device.ping().is_ok());
    assert_eq!(device.last_error(), None);
}

#[test]
fn test_reload_replaces_module_in_place() {
    let (mut host, _) = attach_virtual();
    let device = host.current().unwrap();
    let first = device.install(&module_image("gpio", 2)).unwrap();
    device.install(&module_image("adc", 1)).unwrap();
    let again = device.install(&module_image("gpio", 3)).unwrap();
    assert_eq!(first, again);
    assert_eq!(device.module_count().unwrap(), 2);

    let gpio = host.bind("gpio").unwrap();
    assert!(host.invoke(&gpio, 2, ArgType::Int32, Args::new()).is_ok());
}

#[test]
fn test_relocated_table_read_back() {
    let (mut host, _) = attach_virtual();
    let image = gpio_image();
    let header = AbiHeader::parse(&image).unwrap();
    let device = host.current().unwrap();

    let base = device.ram_load(&image).unwrap();
    let staged = device.ram_read(base, image.len()).unwrap();
    assert_eq!(staged, image);

    device.load(base).unwrap();
    let table = device
        .ram_read(base + header.module.offset, header.module.size as usize)
        .unwrap();
    for (i, word) in table.chunks(4).enumerate() {
        let relocated = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        let at = header.module.offset as usize + i * 4;
        let original = u32::from_le_bytes([image[at], image[at + 1], image[at + 2], image[at + 3]]);
        assert_eq!(relocated, original + base);
    }

    let bss = device
        .ram_read(base + header.bss.offset, header.bss.size as usize)
        .unwrap();
    assert!(bss.iter().all(|&b| b == 0));
}

#[test]
fn test_release_module() {
    let (mut host, _) = attach_virtual();
    host.current().unwrap().install(&gpio_image()).unwrap();
    let gpio = host.bind("gpio").unwrap();
    let slot = gpio.index & !USER_INVOCATION_BIT;

    let device = host.current().unwrap();
    device.release_module(slot).unwrap();
    // the count is a high-water mark; the released slot stays addressable
    assert_eq!(device.module_count().unwrap(), 1);
    assert_eq!(
        device.invoke(gpio.index, 0, ArgType::Int32, Args::new()),
        Err(ClientError::Remote(ErrorKind::UnresolvedFunction))
    );
    assert_eq!(
        device.release_module(slot),
        Err(ClientError::Remote(ErrorKind::Null))
    );
    assert!(matches!(host.bind("gpio"), Err(ClientError::NoCounterpartModule(_))));
}

#[test]
fn test_application_install_returns_task() {
    let (mut host, _) = attach_virtual();
    let device = host.current().unwrap();
    let first = device.install(&application_image("blink")).unwrap();
    let second = device.install(&application_image("blink")).unwrap();
    assert_ne!(first, second);
    assert_eq!(device.module_count().unwrap(), 0);
}

#[test]
fn test_invalid_image_rejected() {
    let (mut host, _) = attach_virtual();
    let device = host.current().unwrap();
    let mut image = gpio_image();
    // module table claims more bytes than the image holds
    image[12..16].copy_from_slice(&0x1000u32.to_le_bytes());
    assert_eq!(
        device.install(&image),
        Err(ClientError::Remote(ErrorKind::InvalidImage))
    );
    assert_eq!(device.module_count().unwrap(), 0);
}

#[test]
fn test_bulk_free() {
    let (mut host, _) = attach_virtual();
    let device = host.current().unwrap();
    let address = device.ram_load(&[1, 2, 3, 4]).unwrap();
    device.ram_free(address).unwrap();
    assert_eq!(
        device.ram_free(address),
        Err(ClientError::Remote(ErrorKind::Null))
    );
}
