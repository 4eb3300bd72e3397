use link_protocol::{OpenError, PortDescriptor};
use serialport::{SerialPortInfo, SerialPortType};

/// Enumerate serial endpoints currently present on this machine
pub fn list_ports() -> Result<Vec<PortDescriptor>, OpenError> {
    let ports = serialport::available_ports()
        .map_err(|e| OpenError::Other(format!("port enumeration failed: {}", e)))?;
    Ok(ports.into_iter().map(descriptor).collect())
}

fn descriptor(info: SerialPortInfo) -> PortDescriptor {
    let mut port = PortDescriptor::new(info.port_name);
    if let SerialPortType::UsbPort(usb) = info.port_type {
        port.vid = Some(usb.vid);
        port.pid = Some(usb.pid);
        port.serial_number = usb.serial_number;
        port.manufacturer = usb.manufacturer;
        port.product = usb.product;
    }
    port
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    #[test]
    fn test_usb_identity_is_kept() {
        let port = descriptor(SerialPortInfo {
            port_name: "/dev/ttyACM0".into(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x2341,
                pid: 0x0043,
                serial_number: Some("85736323838351F0E1E1".into()),
                manufacturer: Some("Arduino".into()),
                product: Some("Uno".into()),
            }),
        });
        assert_eq!(port.path, "/dev/ttyACM0");
        assert_eq!(port.vid, Some(0x2341));
        assert_eq!(port.pid, Some(0x0043));
        assert_eq!(port.manufacturer.as_deref(), Some("Arduino"));
    }

    #[test]
    fn test_non_usb_port_has_no_identity() {
        let port = descriptor(SerialPortInfo {
            port_name: "/dev/ttyS0".into(),
            port_type: SerialPortType::PciPort,
        });
        assert_eq!(port, PortDescriptor::new("/dev/ttyS0"));
    }
}
