//! Build a [`ComponentDescriptor`] from the key/value status record a device
//! reports for one of its components.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::{
    Actuator, Algorithm, ComponentDescriptor, DataType, Error, Kind, PacketSizes,
    SamplesPerTs, Sensor, SensorCategory, Telemetry,
};

const SENSOR: u64 = 0;
const ALGORITHM: u64 = 1;
const ACTUATOR: u64 = 3;

const FFT: u64 = 0;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Sensitivity {
    Uniform(f64),
    PerChannel {
        current: Option<f64>,
        voltage: Option<f64>,
    },
}

#[derive(Debug, Deserialize)]
struct StatusRecord {
    c_type: u64,
    sensor_category: Option<u64>,
    dim: Option<usize>,
    data_type: Option<String>,
    odr: Option<f64>,
    measodr: Option<f64>,
    intermeasurement_time: Option<f64>,
    exposure_time: Option<f64>,
    adc_conversion_time: Option<f64>,
    algorithm_type: Option<u64>,
    fft_length: Option<usize>,
    fft_sample_freq: Option<f64>,
    samples_per_ts: Option<SamplesPerTs>,
    sd_dps: Option<usize>,
    usb_dps: Option<usize>,
    ble_dps: Option<usize>,
    serial_dps: Option<usize>,
    sensitivity: Option<Sensitivity>,
    ioffset: Option<f64>,
    st_ble_stream: Option<Map<String, Value>>,
    /// Fast telemetries list their channels as top level objects
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl ComponentDescriptor {
    /// Parse a component's status record, the json object the device keeps
    /// per component.
    ///
    /// # Errors
    /// When the record is malformed or misses a field required for its kind.
    pub fn from_status(status: &Value) -> Result<Self, Error> {
        let record =
            StatusRecord::deserialize(status).map_err(|e| Error::Parse(e.to_string()))?;

        let (sensitivity, per_channel) = match record.sensitivity {
            Some(Sensitivity::Uniform(s)) => (s, None),
            Some(Sensitivity::PerChannel { current, voltage }) => (1.0, Some((current, voltage))),
            None => (1.0, None),
        };

        let kind = match record.c_type {
            SENSOR => {
                let category = record
                    .sensor_category
                    .ok_or(Error::MissingField("sensor_category"))
                    .and_then(SensorCategory::from_code)?;
                Kind::Sensor(Sensor {
                    category,
                    dim: record.dim.unwrap_or(1),
                    odr: record.odr,
                    measodr: record.measodr,
                    intermeasurement_time: record.intermeasurement_time,
                    exposure_time: record.exposure_time,
                    adc_conversion_time: record.adc_conversion_time,
                })
            }
            ALGORITHM => {
                let algorithm_type = record
                    .algorithm_type
                    .ok_or(Error::MissingField("algorithm_type"))?;
                if algorithm_type == FFT {
                    Kind::Algorithm(Algorithm::Fft {
                        length: record.fft_length.ok_or(Error::MissingField("fft_length"))?,
                        sample_freq: record
                            .fft_sample_freq
                            .ok_or(Error::MissingField("fft_sample_freq"))?,
                    })
                } else {
                    Kind::Algorithm(Algorithm::Other { algorithm_type })
                }
            }
            ACTUATOR => {
                let telemetries = match &record.st_ble_stream {
                    Some(stream) => telemetries(stream, "enable"),
                    None => telemetries(&record.rest, "enabled"),
                };
                let (current_scale, voltage_scale) = per_channel.unwrap_or((None, None));
                Kind::Actuator(Actuator {
                    telemetries,
                    odr: record.odr,
                    current_scale,
                    voltage_scale,
                })
            }
            other => return Err(Error::UnknownComponentType(other)),
        };

        let data_type = match record.data_type {
            Some(name) => name.parse()?,
            // actuator telemetries are reported without a datatype
            None if matches!(kind, Kind::Actuator(_)) => DataType::Int16,
            None => return Err(Error::MissingField("data_type")),
        };

        Ok(ComponentDescriptor {
            kind,
            data_type,
            samples_per_ts: record.samples_per_ts,
            packet_sizes: PacketSizes {
                sd: record.sd_dps,
                usb: record.usb_dps,
                ble: record.ble_dps,
                serial: record.serial_dps,
            },
            sensitivity,
            ioffset: record.ioffset.unwrap_or(0.0),
        })
    }
}

/// Channels are the object valued entries carrying an enable flag, in the
/// order the device lists them.
fn telemetries(entries: &Map<String, Value>, flag: &str) -> Vec<Telemetry> {
    entries
        .iter()
        .filter_map(|(name, entry)| {
            let enabled = entry.as_object()?.get(flag)?.as_bool()?;
            Some(Telemetry {
                name: name.clone(),
                enabled,
            })
        })
        .collect()
}
