//! Subcommand implementations
//!
//! Each command works on an already-loaded domain description and returns
//! the text to print, so the I/O stays in `main`.

use anyhow::{anyhow, Result};
use tracing::warn;
use virtdev_core::lookup::{
    device_element_by_alias, disk_elements, find_device_alias, find_device_serial,
};
use virtdev_core::xml::indent;
use virtdev_core::{
    conf_by_alias, drive_from_element, Device, DeviceConf, DeviceIdentity, Element, HwClass,
};

/// How a disk element is selected on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskKey {
    Serial(String),
    Alias(String),
}

/// Indented XML of a single element, without declaration
pub fn pretty_fragment(element: &Element) -> Result<String> {
    let mut element = element.clone();
    indent(&mut element, 0);
    Ok(element.to_fragment()?)
}

pub fn show(domain: &Element) -> Result<String> {
    Ok(domain.to_pretty_xml()?)
}

pub fn find_device(domain: &Element, alias: &str) -> Result<String> {
    let element = device_element_by_alias(domain, alias)?;
    pretty_fragment(element)
}

pub fn find_disk(domain: &Element, key: &DiskKey) -> Result<String> {
    let disk = disk_elements(domain)
        .find(|disk| match key {
            DiskKey::Serial(serial) => find_device_serial(disk).as_deref() == Some(serial.as_str()),
            DiskKey::Alias(alias) => find_device_alias(disk) == Some(alias.as_str()),
        })
        .ok_or_else(|| anyhow!("No disk element matches {:?}", key))?;
    pretty_fragment(disk)
}

/// One line per disk element: `<alias or #index> -> <drive name>`
pub fn resolve_disks(domain: &Element, devices: &[Device]) -> Vec<String> {
    disk_elements(domain)
        .enumerate()
        .map(|(index, disk)| {
            let label = find_device_alias(disk)
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", index));
            match drive_from_element(disk, devices) {
                Ok(drive) => format!("{} -> {}", label, drive.name().unwrap_or("(unnamed)")),
                Err(e) => {
                    warn!(disk = %label, error = %e, "Unresolved disk");
                    format!("{} -> unresolved ({})", label, e)
                }
            }
        })
        .collect()
}

pub fn conf(devices_conf: &[DeviceConf], class: HwClass, alias: &str) -> Result<String> {
    let record = conf_by_alias(devices_conf, class, alias)?;
    Ok(serde_json::to_string_pretty(record)?)
}
