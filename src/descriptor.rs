//! Structural description of one logged component.
//!
//! The descriptor is produced elsewhere (device catalog resolution) and is
//! only read here. It carries what the decoder needs to know about a
//! component's frames: its kind, sample dimensionality, datatype, timing and
//! the transport packet sizes.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod status;

/// Size of the integrity counter in front of every transport packet.
pub const COUNTER_SIZE: usize = 4;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    #[error("Unknown component type code: {0}")]
    UnknownComponentType(u64),
    #[error("Unknown sensor category code: {0}")]
    UnknownSensorCategory(u64),
    #[error("Unknown data type: {0:?}")]
    UnknownDataType(String),
    #[error(
        "Unknown transport selector: {0}, valid are 0 (sd card), 1 (usb), \
        2 (ble) and 3 (serial). Check the acquisition info"
    )]
    UnknownTransport(u64),
    #[error("Descriptor has no data packet size for transport {0}")]
    MissingPacketSize(Transport),
    #[error(
        "Data packet size for transport {transport} is {size} which can not \
        hold any payload"
    )]
    PacketSizeTooSmall { transport: Transport, size: usize },
    #[error("Descriptor misses required field `{0}`")]
    MissingField(&'static str),
    #[error("Could not parse status record: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    /// Packed 3 byte signed integer, widened to i32 when decoded
    Int24,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl DataType {
    /// Number of bytes one value occupies in the raw file.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int24 => 3,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
            DataType::Float64 => 8,
        }
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let name = name.strip_suffix("_t").unwrap_or(&name);
        Ok(match name {
            "int8" => DataType::Int8,
            "uint8" => DataType::UInt8,
            "int16" => DataType::Int16,
            "uint16" => DataType::UInt16,
            "int24" => DataType::Int24,
            "int32" => DataType::Int32,
            "uint32" => DataType::UInt32,
            "float" | "float32" => DataType::Float32,
            "double" | "float64" => DataType::Float64,
            _ => return Err(Error::UnknownDataType(s.to_owned())),
        })
    }
}

/// The link the acquisition was recorded over. Selects which of the
/// descriptor's packet sizes applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transport {
    /// Sd card
    Storage,
    Usb,
    /// Ble
    Wireless,
    Serial,
}

impl Transport {
    /// # Errors
    /// Selectors outside 0..=3 are rejected.
    pub fn from_selector(selector: u64) -> Result<Self, Error> {
        Ok(match selector {
            0 => Transport::Storage,
            1 => Transport::Usb,
            2 => Transport::Wireless,
            3 => Transport::Serial,
            other => return Err(Error::UnknownTransport(other)),
        })
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transport::Storage => "sd card",
            Transport::Usb => "usb",
            Transport::Wireless => "ble",
            Transport::Serial => "serial",
        };
        f.write_str(name)
    }
}

/// Data packet sizes as the device reports them. The sd card size includes
/// the integrity counter, the others do not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketSizes {
    pub sd: Option<usize>,
    pub usb: Option<usize>,
    pub ble: Option<usize>,
    pub serial: Option<usize>,
}

impl PacketSizes {
    /// Payload bytes between two counters for the given transport.
    ///
    /// # Errors
    /// If the size for this transport is missing or leaves no room for payload.
    pub fn payload_size(&self, transport: Transport) -> Result<usize, Error> {
        let size = match transport {
            Transport::Storage => self.sd,
            Transport::Usb => self.usb,
            Transport::Wireless => self.ble,
            Transport::Serial => self.serial,
        }
        .ok_or(Error::MissingPacketSize(transport))?;

        let payload = match transport {
            Transport::Storage => size.checked_sub(COUNTER_SIZE).unwrap_or(0),
            Transport::Usb | Transport::Wireless | Transport::Serial => size,
        };
        if payload == 0 {
            return Err(Error::PacketSizeTooSmall { transport, size });
        }
        Ok(payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorCategory {
    Mems,
    Audio,
    Ranging,
    Light,
    Camera,
    Presence,
    PowerMeter,
}

impl SensorCategory {
    /// # Errors
    /// Codes unknown to this decoder are rejected.
    pub fn from_code(code: u64) -> Result<Self, Error> {
        Ok(match code {
            0 => SensorCategory::Mems,
            1 => SensorCategory::Audio,
            2 => SensorCategory::Ranging,
            3 => SensorCategory::Light,
            4 => SensorCategory::Camera,
            5 => SensorCategory::Presence,
            6 => SensorCategory::PowerMeter,
            other => return Err(Error::UnknownSensorCategory(other)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub category: SensorCategory,
    pub dim: usize,
    /// Nominal output data rate in Hz
    pub odr: Option<f64>,
    /// Measured output data rate in Hz, preferred over `odr` when nonzero
    pub measodr: Option<f64>,
    /// Light sensors only, milliseconds
    pub intermeasurement_time: Option<f64>,
    /// Light sensors only, microseconds
    pub exposure_time: Option<f64>,
    /// Power meters only, microseconds
    pub adc_conversion_time: Option<f64>,
}

impl Sensor {
    #[must_use]
    pub fn new(category: SensorCategory, dim: usize) -> Self {
        Self {
            category,
            dim,
            odr: None,
            measodr: None,
            intermeasurement_time: None,
            exposure_time: None,
            adc_conversion_time: None,
        }
    }

    #[must_use]
    pub fn with_odr(mut self, odr: f64) -> Self {
        self.odr = Some(odr);
        self
    }

    #[must_use]
    pub fn with_measodr(mut self, measodr: f64) -> Self {
        self.measodr = Some(measodr);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Algorithm {
    Fft { length: usize, sample_freq: f64 },
    /// Algorithms whose output layout this decoder does not know
    Other { algorithm_type: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telemetry {
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actuator {
    /// In the order they are interleaved in a sample
    pub telemetries: Vec<Telemetry>,
    pub odr: Option<f64>,
    pub current_scale: Option<f64>,
    pub voltage_scale: Option<f64>,
}

impl Actuator {
    pub fn enabled(&self) -> impl Iterator<Item = &Telemetry> + '_ {
        self.telemetries.iter().filter(|t| t.enabled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Kind {
    Sensor(Sensor),
    Algorithm(Algorithm),
    Actuator(Actuator),
}

/// How many samples share one embedded timestamp. Devices report either a
/// plain number or an object `{ "val": N }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SamplesPerTs {
    Count(u32),
    Val { val: Option<u32> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub kind: Kind,
    pub data_type: DataType,
    pub samples_per_ts: Option<SamplesPerTs>,
    pub packet_sizes: PacketSizes,
    pub sensitivity: f64,
    /// Time origin of the acquisition for this component in seconds
    pub ioffset: f64,
}

impl ComponentDescriptor {
    #[must_use]
    pub fn new(kind: Kind, data_type: DataType) -> Self {
        Self {
            kind,
            data_type,
            samples_per_ts: None,
            packet_sizes: PacketSizes::default(),
            sensitivity: 1.0,
            ioffset: 0.0,
        }
    }

    #[must_use]
    pub fn with_samples_per_ts(mut self, samples_per_ts: u32) -> Self {
        self.samples_per_ts = Some(SamplesPerTs::Count(samples_per_ts));
        self
    }

    #[must_use]
    pub fn with_packet_sizes(mut self, packet_sizes: PacketSizes) -> Self {
        self.packet_sizes = packet_sizes;
        self
    }

    #[must_use]
    pub fn with_sensitivity(mut self, sensitivity: f64) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    #[must_use]
    pub fn with_ioffset(mut self, ioffset: f64) -> Self {
        self.ioffset = ioffset;
        self
    }

    /// Samples per timestamp as declared by the device. The object form
    /// without a value means 1 for actuators and 0 (no timestamps) for
    /// everything else, a missing field is treated the same.
    #[must_use]
    pub fn declared_samples_per_ts(&self) -> u32 {
        let object_default = match self.kind {
            Kind::Actuator(_) => 1,
            Kind::Sensor(_) | Kind::Algorithm(_) => 0,
        };
        match self.samples_per_ts {
            Some(SamplesPerTs::Count(n)) => n,
            Some(SamplesPerTs::Val { val }) => val.unwrap_or(object_default),
            None => object_default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_type_names() {
        assert_eq!("int16_t".parse(), Ok(DataType::Int16));
        assert_eq!("float".parse(), Ok(DataType::Float32));
        assert_eq!("int24".parse(), Ok(DataType::Int24));
        assert_eq!("uint8_t".parse(), Ok(DataType::UInt8));
        assert_eq!("double".parse(), Ok(DataType::Float64));
        assert!("complex".parse::<DataType>().is_err());
    }

    #[test]
    fn sd_size_includes_counter() {
        let sizes = PacketSizes {
            sd: Some(2048),
            usb: Some(512),
            ble: None,
            serial: Some(64),
        };
        assert_eq!(sizes.payload_size(Transport::Storage), Ok(2044));
        assert_eq!(sizes.payload_size(Transport::Usb), Ok(512));
        assert_eq!(
            sizes.payload_size(Transport::Wireless),
            Err(Error::MissingPacketSize(Transport::Wireless))
        );
    }

    #[test]
    fn samples_per_ts_object_form() {
        let sensor = Kind::Sensor(Sensor::new(SensorCategory::Mems, 3));
        let mut descriptor = ComponentDescriptor::new(sensor, DataType::Int16);
        assert_eq!(descriptor.declared_samples_per_ts(), 0);

        descriptor.samples_per_ts = Some(SamplesPerTs::Val { val: Some(12) });
        assert_eq!(descriptor.declared_samples_per_ts(), 12);

        descriptor.kind = Kind::Actuator(Actuator {
            telemetries: Vec::new(),
            odr: Some(10.0),
            current_scale: None,
            voltage_scale: None,
        });
        descriptor.samples_per_ts = Some(SamplesPerTs::Val { val: None });
        assert_eq!(descriptor.declared_samples_per_ts(), 1);
    }
}
