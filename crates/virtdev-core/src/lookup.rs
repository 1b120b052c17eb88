//! Device identity lookup
//!
//! Finds a single device among host-agent objects, persisted configuration
//! records or domain XML elements. Every lookup is a linear scan returning
//! the first match in iteration order; collections are small (one VM's
//! devices) and uniqueness of keys is the caller's contract.

use thiserror::Error;
use tracing::debug;

use crate::device::{DeviceConf, DeviceIdentity, HwClass};
use crate::xml::Element;

/// The only failure of a lookup: nothing matched the given key
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    #[error("No such drive: name={0:?}")]
    Name(String),
    #[error("No such drive: serial={0:?}")]
    Serial(String),
    #[error("No such device: alias={0:?}")]
    Alias(String),
    #[error("Unable to find matching drive for {0}")]
    Unidentified(String),
    #[error("No such device conf: type={class}, alias={alias:?}")]
    Conf { class: HwClass, alias: String },
    #[error("No such device element: alias={0:?}")]
    Element(String),
}

/// Find the drive whose guest-visible name is `name`
pub fn drive_by_name<'a, D: DeviceIdentity>(drives: &'a [D], name: &str) -> Result<&'a D, NotFound> {
    drives
        .iter()
        .find(|drive| drive.name() == Some(name))
        .ok_or_else(|| NotFound::Name(name.to_string()))
}

/// Find the drive whose storage serial is `serial`
pub fn drive_by_serial<'a, D: DeviceIdentity>(
    drives: &'a [D],
    serial: &str,
) -> Result<&'a D, NotFound> {
    drives
        .iter()
        .find(|drive| drive.serial() == Some(serial))
        .ok_or_else(|| NotFound::Serial(serial.to_string()))
}

/// Find the device of any class whose alias is `alias`
pub fn device_by_alias<'a, D: DeviceIdentity>(
    devices: &'a [D],
    alias: &str,
) -> Result<&'a D, NotFound> {
    devices
        .iter()
        .find(|device| device.alias() == Some(alias))
        .ok_or_else(|| NotFound::Alias(alias.to_string()))
}

/// Resolve the drive described by a device-descriptor element (e.g. `<disk>`).
///
/// A non-empty `<serial>` takes precedence over `<alias name=...>`. Whichever
/// identifier is chosen decides the outcome: a serial that matches no drive
/// is reported as not found even if the alias would match, since a stale
/// serial must not silently resolve to a different drive.
pub fn drive_from_element<'a, D: DeviceIdentity>(
    element: &Element,
    drives: &'a [D],
) -> Result<&'a D, NotFound> {
    if let Some(serial) = find_device_serial(element) {
        debug!(serial = %serial, "Resolving drive by serial");
        return drive_by_serial(drives, &serial);
    }

    if let Some(alias) = find_device_alias(element) {
        debug!(alias = %alias, "Resolving drive by alias");
        return device_by_alias(drives, alias);
    }

    let description = element
        .to_fragment()
        .unwrap_or_else(|_| format!("<{}>", element.name));
    Err(NotFound::Unidentified(description))
}

/// Find the configuration record of class `class` with alias `alias`.
///
/// Records missing either key, or holding non-string values for them, are
/// skipped rather than treated as errors.
pub fn conf_by_alias<'a>(
    devices_conf: &'a [DeviceConf],
    class: HwClass,
    alias: &str,
) -> Result<&'a DeviceConf, NotFound> {
    devices_conf
        .iter()
        .find(|conf| {
            let conf_alias = conf.get("alias").and_then(|v| v.as_str());
            let conf_type = conf.get("type").and_then(|v| v.as_str());
            conf_alias == Some(alias) && conf_type == Some(class.as_str())
        })
        .ok_or_else(|| NotFound::Conf {
            class,
            alias: alias.to_string(),
        })
}

/// The `name` attribute of an element's `<alias>` child, if non-empty
pub fn find_device_alias(element: &Element) -> Option<&str> {
    element
        .find("alias")
        .and_then(|alias| alias.attr("name"))
        .filter(|name| !name.is_empty())
}

/// The trimmed text of an element's `<serial>` child, if non-empty
pub fn find_device_serial(element: &Element) -> Option<String> {
    element
        .find("serial")
        .and_then(|serial| serial.text())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// All `<disk>` elements under `<devices>` of a domain description
pub fn disk_elements(domain: &Element) -> impl Iterator<Item = &Element> {
    domain
        .find("devices")
        .into_iter()
        .flat_map(|devices| devices.find_all(HwClass::Disk.as_str()))
}

/// Find the device element under `<devices>` whose alias is `alias`
pub fn device_element_by_alias<'a>(domain: &'a Element, alias: &str) -> Result<&'a Element, NotFound> {
    domain
        .find("devices")
        .into_iter()
        .flat_map(|devices| devices.child_elements())
        .find(|element| find_device_alias(element) == Some(alias))
        .ok_or_else(|| NotFound::Element(alias.to_string()))
}

/// Mutable variant of [`device_element_by_alias`], for hooks that edit the
/// element in place
pub fn device_element_by_alias_mut<'a>(
    domain: &'a mut Element,
    alias: &str,
) -> Result<&'a mut Element, NotFound> {
    domain
        .find_mut("devices")
        .into_iter()
        .flat_map(|devices| devices.child_elements_mut())
        .find(|element| find_device_alias(element) == Some(alias))
        .ok_or_else(|| NotFound::Element(alias.to_string()))
}
