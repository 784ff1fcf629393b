// Output device discovery (cpal)

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};

use crate::audio::engine::AudioError;

#[derive(Clone, Debug)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

pub struct AudioDeviceManager {
    host: Host,
}

impl AudioDeviceManager {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// All output devices the host reports, default first flagged
    pub fn list_output_devices(&self) -> Vec<AudioDeviceInfo> {
        let default_name = self
            .host
            .default_output_device()
            .and_then(|d| d.name().ok())
            .unwrap_or_default();

        let Ok(devices) = self.host.output_devices() else {
            return Vec::new();
        };

        devices
            .filter_map(|device| device.name().ok())
            .map(|name| AudioDeviceInfo {
                is_default: name == default_name,
                name,
            })
            .collect()
    }

    /// Named device, or the host default when `name` is `None`
    pub fn output_device(&self, name: Option<&str>) -> Result<Device, AudioError> {
        match name {
            Some(name) => self
                .output_device_by_name(name)
                .ok_or_else(|| AudioError::DeviceNotFound(name.to_string())),
            None => self
                .host
                .default_output_device()
                .ok_or(AudioError::NoDevice),
        }
    }

    fn output_device_by_name(&self, device_name: &str) -> Option<Device> {
        self.host
            .output_devices()
            .ok()?
            .find(|device| device.name().is_ok_and(|name| name == device_name))
    }
}

impl Default for AudioDeviceManager {
    fn default() -> Self {
        Self::new()
    }
}
