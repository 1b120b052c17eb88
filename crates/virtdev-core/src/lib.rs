//! virtdev Core - Device identity lookup and domain XML exchange
//!
//! This crate provides the pieces shared by the host agent and hook
//! processes:
//! - Device types and the identity surface (name, serial, alias) they expose
//! - Lookup of a single device by name, serial, alias or XML descriptor
//! - A small mutable XML element tree for domain descriptions
//! - The file-based hand-off of the domain description to and from hooks

pub mod device;
pub mod hooking;
pub mod lookup;
pub mod xml;

pub use device::{Device, DeviceConf, DeviceIdentity, Drive, HwClass};
pub use hooking::{DomXmlChannel, HookError, JsonChannel};
pub use lookup::{
    conf_by_alias, device_by_alias, drive_by_name, drive_by_serial, drive_from_element, NotFound,
};
pub use xml::{Element, Node, XmlError};
