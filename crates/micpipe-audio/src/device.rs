use cpal::traits::{DeviceTrait, HostTrait};

use micpipe_foundation::AudioError;

/// Thin wrapper over the host's device list: the default input, or the
/// first input whose name matches.
pub fn open_input_device(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_input_device()
            .ok_or(AudioError::DeviceNotFound { name: None }),
        Some(wanted) => {
            let mut devices = host.input_devices()?;
            devices
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| AudioError::DeviceNotFound {
                    name: Some(wanted.to_string()),
                })
        }
    }
}
