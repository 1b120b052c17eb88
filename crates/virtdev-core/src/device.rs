//! Device types as seen by the host agent
//!
//! Devices of every hardware class share one identity surface
//! ([`DeviceIdentity`]). Only drives carry a guest-visible name and a
//! storage serial; every class may carry a host-assigned alias.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Persisted description of one device, as a free-form mapping.
///
/// The keys `type` and `alias` are the only ones the lookup code reads.
pub type DeviceConf = serde_json::Map<String, serde_json::Value>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown hardware class: {0}")]
pub struct UnknownHwClass(pub String);

/// Hardware class of a device, matching the element names used in domain XML
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HwClass {
    Disk,
    #[serde(rename = "interface")]
    Nic,
    Video,
    Graphics,
    Sound,
    Controller,
    General,
    Balloon,
    Redir,
    Rng,
    Watchdog,
    Console,
    Smartcard,
    Tpm,
    Hostdev,
    Memory,
    Lease,
}

impl HwClass {
    pub const ALL: [HwClass; 17] = [
        HwClass::Disk,
        HwClass::Nic,
        HwClass::Video,
        HwClass::Graphics,
        HwClass::Sound,
        HwClass::Controller,
        HwClass::General,
        HwClass::Balloon,
        HwClass::Redir,
        HwClass::Rng,
        HwClass::Watchdog,
        HwClass::Console,
        HwClass::Smartcard,
        HwClass::Tpm,
        HwClass::Hostdev,
        HwClass::Memory,
        HwClass::Lease,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HwClass::Disk => "disk",
            HwClass::Nic => "interface",
            HwClass::Video => "video",
            HwClass::Graphics => "graphics",
            HwClass::Sound => "sound",
            HwClass::Controller => "controller",
            HwClass::General => "general",
            HwClass::Balloon => "balloon",
            HwClass::Redir => "redir",
            HwClass::Rng => "rng",
            HwClass::Watchdog => "watchdog",
            HwClass::Console => "console",
            HwClass::Smartcard => "smartcard",
            HwClass::Tpm => "tpm",
            HwClass::Hostdev => "hostdev",
            HwClass::Memory => "memory",
            HwClass::Lease => "lease",
        }
    }
}

impl std::fmt::Display for HwClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HwClass {
    type Err = UnknownHwClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HwClass::ALL
            .iter()
            .copied()
            .find(|class| class.as_str() == s)
            .ok_or_else(|| UnknownHwClass(s.to_string()))
    }
}

/// Identity fields a device may expose.
///
/// Classes implement only what is meaningful to them; the rest stay `None`.
pub trait DeviceIdentity {
    fn hw_class(&self) -> HwClass;

    /// Guest-visible device name (drives only)
    fn name(&self) -> Option<&str> {
        None
    }

    /// Storage-layer serial number (drives only)
    fn serial(&self) -> Option<&str> {
        None
    }

    /// Host-assigned alias, unique within a running domain
    fn alias(&self) -> Option<&str> {
        None
    }
}

/// A storage drive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drive {
    /// Guest device name derived from bus position (e.g. "vda", "sdb"),
    /// unset until the drive has been placed on a bus
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    /// Bus interface ("virtio", "scsi", "ide", ...)
    #[serde(default)]
    pub iface: Option<String>,
    /// Backing path on the host
    #[serde(default)]
    pub path: Option<String>,
}

impl Drive {
    pub fn new(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn with_serial(mut self, serial: &str) -> Self {
        self.serial = Some(serial.to_string());
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }
}

impl DeviceIdentity for Drive {
    fn hw_class(&self) -> HwClass {
        HwClass::Disk
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}

/// Memory module (DIMM)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    #[serde(default)]
    pub alias: Option<String>,
    /// Size in MiB
    pub size: u64,
    #[serde(default)]
    pub node: Option<u32>,
}

/// Sound card
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sound {
    #[serde(default)]
    pub alias: Option<String>,
    pub model: String,
}

/// Network interface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nic {
    #[serde(default)]
    pub alias: Option<String>,
    pub mac_addr: String,
    #[serde(default)]
    pub network: Option<String>,
}

/// Bus controller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controller {
    #[serde(default)]
    pub alias: Option<String>,
    /// Controller type ("scsi", "virtio-serial", "usb", ...)
    pub kind: String,
    #[serde(default)]
    pub index: u32,
}

/// Video adapter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    #[serde(default)]
    pub alias: Option<String>,
    pub model: String,
}

macro_rules! alias_only {
    ($ty:ty, $class:expr) => {
        impl DeviceIdentity for $ty {
            fn hw_class(&self) -> HwClass {
                $class
            }

            fn alias(&self) -> Option<&str> {
                self.alias.as_deref()
            }
        }
    };
}

alias_only!(Memory, HwClass::Memory);
alias_only!(Sound, HwClass::Sound);
alias_only!(Nic, HwClass::Nic);
alias_only!(Controller, HwClass::Controller);
alias_only!(Video, HwClass::Video);

/// Any device known to the host agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Device {
    #[serde(rename = "disk")]
    Drive(Drive),
    Memory(Memory),
    Sound(Sound),
    #[serde(rename = "interface")]
    Nic(Nic),
    Controller(Controller),
    Video(Video),
}

impl Device {
    fn identity(&self) -> &dyn DeviceIdentity {
        match self {
            Device::Drive(d) => d,
            Device::Memory(d) => d,
            Device::Sound(d) => d,
            Device::Nic(d) => d,
            Device::Controller(d) => d,
            Device::Video(d) => d,
        }
    }

    pub fn as_drive(&self) -> Option<&Drive> {
        match self {
            Device::Drive(drive) => Some(drive),
            _ => None,
        }
    }
}

impl DeviceIdentity for Device {
    fn hw_class(&self) -> HwClass {
        self.identity().hw_class()
    }

    fn name(&self) -> Option<&str> {
        self.identity().name()
    }

    fn serial(&self) -> Option<&str> {
        self.identity().serial()
    }

    fn alias(&self) -> Option<&str> {
        self.identity().alias()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hw_class_strings() {
        assert_eq!(HwClass::Nic.as_str(), "interface");
        assert_eq!("memory".parse::<HwClass>().unwrap(), HwClass::Memory);
        assert_eq!(
            "floppy".parse::<HwClass>(),
            Err(UnknownHwClass("floppy".to_string()))
        );

        for class in HwClass::ALL {
            assert_eq!(class.to_string().parse::<HwClass>().unwrap(), class);
        }
    }

    #[test]
    fn test_hw_class_serde_matches_as_str() {
        for class in HwClass::ALL {
            let json = serde_json::to_string(&class).unwrap();
            assert_eq!(json, format!("\"{}\"", class.as_str()));
        }
    }

    #[test]
    fn test_non_drive_exposes_alias_only() {
        let dimm = Device::Memory(Memory {
            alias: Some("dimm0".to_string()),
            size: 1024,
            node: None,
        });
        assert_eq!(dimm.hw_class(), HwClass::Memory);
        assert_eq!(dimm.alias(), Some("dimm0"));
        assert_eq!(dimm.name(), None);
        assert_eq!(dimm.serial(), None);
        assert!(dimm.as_drive().is_none());
    }

    #[test]
    fn test_device_from_json() {
        let json = r#"[
            {"type": "disk", "name": "vda", "serial": "virtio0000", "alias": "ua-1"},
            {"type": "sound", "alias": "ac97", "model": "ac97"}
        ]"#;

        let devices: Vec<Device> = serde_json::from_str(json).unwrap();
        assert_eq!(devices.len(), 2);

        let drive = devices[0].as_drive().unwrap();
        assert_eq!(drive.name.as_deref(), Some("vda"));
        assert_eq!(devices[0].serial(), Some("virtio0000"));
        assert_eq!(devices[1].hw_class(), HwClass::Sound);
        assert_eq!(devices[1].alias(), Some("ac97"));
    }

    #[test]
    fn test_unnamed_drive_from_json() {
        let json = r#"[{"type": "disk", "serial": "s1", "alias": "ua-1"}]"#;

        let devices: Vec<Device> = serde_json::from_str(json).unwrap();
        assert_eq!(devices[0].name(), None);
        assert_eq!(devices[0].serial(), Some("s1"));
        assert_eq!(devices[0].as_drive().unwrap().name, None);
    }
}
