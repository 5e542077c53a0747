//! Resolve the per-frame byte layout of a component from its descriptor.

use crate::descriptor::{Algorithm, ComponentDescriptor, DataType, Kind, Sensor, SensorCategory};

/// Bytes taken by the timestamp at the end of a timestamped frame.
pub const TIMESTAMP_SIZE: usize = 8;
/// Columns in the output of an in-sensor processing unit.
pub const ISPU_COLUMNS: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    #[error("Descriptor misses `{0}`, needed to determine the frame layout")]
    MissingField(&'static str),
    #[error("Algorithm type {0} is not supported, only fft output can be decoded")]
    UnsupportedAlgorithm(u64),
    #[error("Component has no channels (dimension is zero)")]
    NoChannels,
    #[error("Rate must be a positive finite number, got: {0}")]
    InvalidRate(f64),
    #[error(
        "Packet size {packet} leaves {data} data bytes per frame which can \
        not hold whole samples of {sample_size} bytes"
    )]
    UnalignedFrame {
        packet: usize,
        data: usize,
        sample_size: usize,
    },
}

/// What one frame in the payload stream looks like.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameLayout {
    /// Sample bytes per frame
    pub data_bytes: usize,
    /// 0 or [`TIMESTAMP_SIZE`]
    pub timestamp_bytes: usize,
    pub samples_per_frame: usize,
    pub dim: usize,
    pub data_type: DataType,
    /// Nominal samples per second, `None` if the device does not report one
    pub rate: Option<f64>,
    /// Expected time between two frame timestamps, zero for auxiliary
    /// channels (machine learning core and ispu output)
    pub frame_period: f64,
    /// Expected time between two samples
    pub nominal_period: f64,
    pub auxiliary: bool,
}

impl FrameLayout {
    /// # Errors
    /// If the descriptor misses fields needed for its kind or describes an
    /// algorithm whose output can not be decoded.
    pub fn resolve(name: &str, descriptor: &ComponentDescriptor) -> Result<Self, Error> {
        let ispu = is_ispu(name);
        let auxiliary = ispu || name.contains("_mlc");

        let (dim, data_type, rate) = match &descriptor.kind {
            Kind::Sensor(_) if ispu => (ISPU_COLUMNS, DataType::Int8, None),
            Kind::Sensor(sensor) => (sensor.dim, descriptor.data_type, Some(sensor_rate(sensor)?)),
            Kind::Algorithm(Algorithm::Fft {
                length,
                sample_freq,
            }) => (*length, descriptor.data_type, Some(*sample_freq)),
            Kind::Algorithm(Algorithm::Other { algorithm_type }) => {
                return Err(Error::UnsupportedAlgorithm(*algorithm_type))
            }
            Kind::Actuator(actuator) => {
                (actuator.enabled().count(), descriptor.data_type, actuator.odr)
            }
        };
        // ispu output is sampled at the rate of the sensor hosting it
        let rate = match (&descriptor.kind, rate) {
            (Kind::Sensor(sensor), None) => sensor.measodr.or(sensor.odr),
            (_, rate) => rate,
        };

        if dim == 0 {
            return Err(Error::NoChannels);
        }
        if let Some(rate) = rate {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(Error::InvalidRate(rate));
            }
        }

        let sample_size = dim * data_type.size();
        let (data_bytes, timestamp_bytes) = match &descriptor.kind {
            Kind::Algorithm(_) => (sample_size, 0),
            Kind::Actuator(actuator) if actuator.odr.is_none() => {
                // without a rate the device fills each usb packet with one
                // frame
                let packet = descriptor
                    .packet_sizes
                    .usb
                    .ok_or(Error::MissingField("usb_dps"))?;
                let data = packet.saturating_sub(TIMESTAMP_SIZE);
                if data == 0 || data % sample_size != 0 {
                    return Err(Error::UnalignedFrame {
                        packet,
                        data,
                        sample_size,
                    });
                }
                (data, TIMESTAMP_SIZE)
            }
            Kind::Sensor(_) | Kind::Actuator(_) => match descriptor.declared_samples_per_ts() {
                0 => (sample_size, 0),
                n => (n as usize * sample_size, TIMESTAMP_SIZE),
            },
        };
        let samples_per_frame = data_bytes / sample_size;

        let nominal_period = rate.map(|r| 1.0 / r).unwrap_or(0.0);
        let frame_period = match rate {
            Some(rate) if !auxiliary => samples_per_frame as f64 / rate,
            _ => 0.0,
        };

        Ok(Self {
            data_bytes,
            timestamp_bytes,
            samples_per_frame,
            dim,
            data_type,
            rate,
            frame_period,
            nominal_period,
            auxiliary,
        })
    }

    #[must_use]
    pub fn frame_size(&self) -> usize {
        self.data_bytes + self.timestamp_bytes
    }

    #[must_use]
    pub fn sample_size(&self) -> usize {
        self.dim * self.data_type.size()
    }

    #[must_use]
    pub fn has_timestamps(&self) -> bool {
        self.timestamp_bytes > 0
    }
}

pub(crate) fn is_ispu(name: &str) -> bool {
    name.contains("_ispu")
}

/// Effective output rate in Hz, light sensors and power meters derive it
/// from their integration settings.
fn sensor_rate(sensor: &Sensor) -> Result<f64, Error> {
    Ok(match sensor.category {
        SensorCategory::Light => {
            let intermeasurement = sensor
                .intermeasurement_time
                .ok_or(Error::MissingField("intermeasurement_time"))?;
            let exposure = sensor
                .exposure_time
                .ok_or(Error::MissingField("exposure_time"))?;
            let readout_ms = exposure / 1000.0 + 6.0;
            if intermeasurement > readout_ms {
                1.0 / (intermeasurement / 1000.0)
            } else {
                1.0 / (readout_ms / 1000.0)
            }
        }
        SensorCategory::PowerMeter => {
            let conversion = sensor
                .adc_conversion_time
                .ok_or(Error::MissingField("adc_conversion_time"))?;
            1.0 / (conversion / 1_000_000.0)
        }
        SensorCategory::Mems
        | SensorCategory::Audio
        | SensorCategory::Ranging
        | SensorCategory::Camera
        | SensorCategory::Presence => sensor
            .measodr
            .filter(|measured| *measured != 0.0)
            .or(sensor.odr)
            .ok_or(Error::MissingField("odr"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Actuator, PacketSizes, Telemetry};

    fn mems(dim: usize, data_type: DataType) -> ComponentDescriptor {
        let sensor = Sensor::new(SensorCategory::Mems, dim).with_odr(100.0);
        ComponentDescriptor::new(Kind::Sensor(sensor), data_type)
    }

    #[test]
    fn timestamped_sensor() {
        let descriptor = mems(3, DataType::Float32).with_samples_per_ts(10);
        let layout = FrameLayout::resolve("iis3dwb_acc", &descriptor).unwrap();
        assert_eq!(layout.data_bytes, 120);
        assert_eq!(layout.frame_size(), 128);
        assert_eq!(layout.samples_per_frame, 10);
        assert_eq!(layout.frame_period, 0.1);
    }

    #[test]
    fn sensor_without_timestamps() {
        let layout = FrameLayout::resolve("stts22h_temp", &mems(1, DataType::Int16)).unwrap();
        assert_eq!(layout.frame_size(), 2);
        assert!(!layout.has_timestamps());
        assert_eq!(layout.samples_per_frame, 1);
    }

    #[test]
    fn measured_rate_preferred() {
        let mut descriptor = mems(3, DataType::Int16);
        let Kind::Sensor(sensor) = &mut descriptor.kind else {
            unreachable!()
        };
        sensor.measodr = Some(104.5);
        let layout = FrameLayout::resolve("lsm6_acc", &descriptor).unwrap();
        assert_eq!(layout.rate, Some(104.5));

        let Kind::Sensor(sensor) = &mut descriptor.kind else {
            unreachable!()
        };
        sensor.measodr = Some(0.0);
        let layout = FrameLayout::resolve("lsm6_acc", &descriptor).unwrap();
        assert_eq!(layout.rate, Some(100.0));
    }

    #[test]
    fn light_rate_from_integration_settings() {
        let mut sensor = Sensor::new(SensorCategory::Light, 6);
        sensor.intermeasurement_time = Some(500.0);
        sensor.exposure_time = Some(100_000.0);
        let descriptor = ComponentDescriptor::new(Kind::Sensor(sensor.clone()), DataType::UInt32);
        let layout = FrameLayout::resolve("vd6283tx_als", &descriptor).unwrap();
        assert_eq!(layout.rate, Some(2.0));

        // readout is longer then the requested intermeasurement time
        sensor.intermeasurement_time = Some(50.0);
        let descriptor = ComponentDescriptor::new(Kind::Sensor(sensor), DataType::UInt32);
        let layout = FrameLayout::resolve("vd6283tx_als", &descriptor).unwrap();
        assert_eq!(layout.rate, Some(1.0 / 0.106));
    }

    #[test]
    fn power_meter_rate() {
        let mut sensor = Sensor::new(SensorCategory::PowerMeter, 4);
        sensor.adc_conversion_time = Some(2000.0);
        let descriptor = ComponentDescriptor::new(Kind::Sensor(sensor), DataType::Int32);
        let layout = FrameLayout::resolve("stpm_power", &descriptor).unwrap();
        assert_eq!(layout.rate, Some(500.0));
    }

    #[test]
    fn fft_frames() {
        let kind = Kind::Algorithm(Algorithm::Fft {
            length: 512,
            sample_freq: 10.0,
        });
        let descriptor = ComponentDescriptor::new(kind, DataType::Float32).with_samples_per_ts(1);
        let layout = FrameLayout::resolve("fft", &descriptor).unwrap();
        assert_eq!(layout.dim, 512);
        assert_eq!(layout.samples_per_frame, 1);
        assert_eq!(layout.timestamp_bytes, 0);
        assert_eq!(layout.rate, Some(10.0));
    }

    #[test]
    fn unsupported_algorithm() {
        let kind = Kind::Algorithm(Algorithm::Other { algorithm_type: 2 });
        let descriptor = ComponentDescriptor::new(kind, DataType::Float32);
        assert_eq!(
            FrameLayout::resolve("classifier", &descriptor),
            Err(Error::UnsupportedAlgorithm(2))
        );
    }

    #[test]
    fn ispu_output() {
        let descriptor = mems(3, DataType::Int16).with_samples_per_ts(1);
        let layout = FrameLayout::resolve("ism330is_ispu", &descriptor).unwrap();
        assert_eq!(layout.dim, 64);
        assert_eq!(layout.data_type, DataType::Int8);
        assert_eq!(layout.frame_size(), 72);
        assert_eq!(layout.frame_period, 0.0);
        assert!(layout.auxiliary);
    }

    #[test]
    fn telemetries_without_rate_fill_a_packet() {
        let telemetries = ["i_q", "i_d", "v_bus", "speed"]
            .into_iter()
            .map(|name| Telemetry {
                name: name.to_owned(),
                enabled: true,
            })
            .collect();
        let actuator = Actuator {
            telemetries,
            odr: None,
            current_scale: None,
            voltage_scale: None,
        };
        let descriptor = ComponentDescriptor::new(Kind::Actuator(actuator), DataType::Int16)
            .with_packet_sizes(PacketSizes {
                usb: Some(72),
                ..PacketSizes::default()
            });
        let layout = FrameLayout::resolve("fast_mc_telemetries", &descriptor).unwrap();
        assert_eq!(layout.data_bytes, 64);
        assert_eq!(layout.samples_per_frame, 8);
        assert_eq!(layout.rate, None);
        assert_eq!(layout.frame_period, 0.0);
    }
}
