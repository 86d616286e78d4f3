use std::time::Duration;

use serialport::SerialPort;

use crate::channel::{Channel, ChannelError, SerialChannel, SerialFilter, SerialSelector};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SerialPortSummary {
    pub port_name: String,
    pub vid: u16,
    pub pid: u16,
    pub serial_number: Option<String>,
    pub product: Option<String>,
}

pub fn list_ports(filter: &SerialFilter) -> Result<Vec<SerialPortSummary>, ChannelError> {
    let mut out: Vec<SerialPortSummary> = Vec::new();
    for p in serialport::available_ports()? {
        let serialport::SerialPortInfo {
            port_name,
            port_type,
        } = p;

        let serialport::SerialPortType::UsbPort(usb) = port_type else {
            continue;
        };
        if usb.vid != filter.vendor_id {
            continue;
        }

        out.push(SerialPortSummary {
            port_name,
            vid: usb.vid,
            pid: usb.pid,
            serial_number: usb.serial_number,
            product: usb.product,
        });
    }
    out.sort_by(|a, b| a.port_name.cmp(&b.port_name));
    Ok(out)
}

/// Selects PJRC USB serial ports through the `serialport` crate.
#[derive(Debug, Default)]
pub struct UsbSerialSelector;

impl SerialSelector for UsbSerialSelector {
    type Port = UsbSerialPort;

    /// A named port is used as given, even if enumeration would not report it.
    fn select(&mut self, filter: &SerialFilter) -> Result<Option<UsbSerialPort>, ChannelError> {
        if let Some(wanted) = filter.port_name.as_deref() {
            return Ok(Some(UsbSerialPort::new(wanted.to_string())));
        }
        let name = list_ports(filter)?.into_iter().next().map(|p| p.port_name);
        Ok(name.map(UsbSerialPort::new))
    }
}

pub struct UsbSerialPort {
    name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl UsbSerialPort {
    pub fn new(name: String) -> Self {
        Self { name, port: None }
    }
}

impl Channel for UsbSerialPort {
    fn label(&self) -> String {
        self.name.clone()
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        self.port.take();
        Ok(())
    }
}

impl SerialChannel for UsbSerialPort {
    fn open(&mut self, baud_rate: u32) -> Result<(), ChannelError> {
        let mut port = serialport::new(&self.name, baud_rate)
            .timeout(Duration::from_millis(500))
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .open()?;

        // Some drivers only send line coding on explicit set.
        let _ = port.set_baud_rate(baud_rate);
        self.port = Some(port);
        Ok(())
    }
}
