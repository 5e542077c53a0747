//! Conversion of raw sample values to physical units.

use crate::decode::{Samples, Values};
use crate::descriptor::{ComponentDescriptor, Kind};
use crate::layout::{is_ispu, FrameLayout};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Scaling {
    /// Leave values as they were decoded
    Keep,
    /// Convert to `f32` and multiply each column by its factor
    Columns(Vec<f32>),
}

impl Scaling {
    pub(crate) fn new(
        name: &str,
        descriptor: &ComponentDescriptor,
        layout: &FrameLayout,
        raw: bool,
    ) -> Self {
        // ispu output is a packed structure, not a measurement
        if raw || is_ispu(name) {
            return Scaling::Keep;
        }

        match &descriptor.kind {
            Kind::Actuator(actuator) => Scaling::Columns(
                actuator
                    .enabled()
                    .map(|telemetry| {
                        let factor = if telemetry.name.contains('i') {
                            actuator.current_scale
                        } else if telemetry.name.contains('v') {
                            actuator.voltage_scale
                        } else {
                            None
                        };
                        factor.unwrap_or(1.0) as f32
                    })
                    .collect(),
            ),
            Kind::Sensor(_) | Kind::Algorithm(_) => {
                Scaling::Columns(vec![descriptor.sensitivity as f32; layout.dim])
            }
        }
    }

    pub(crate) fn apply(&self, samples: Samples) -> Samples {
        match self {
            Scaling::Keep => samples,
            Scaling::Columns(factors) => {
                samples.map_values(|values| Values::F32(values.scale(factors)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{
        Actuator, DataType, PacketSizes, Sensor, SensorCategory, Telemetry,
    };

    #[test]
    fn sensitivity_applied_to_every_column() {
        let sensor = Sensor::new(SensorCategory::Mems, 2).with_odr(10.0);
        let descriptor = ComponentDescriptor::new(Kind::Sensor(sensor), DataType::Int16)
            .with_sensitivity(0.5);
        let layout = FrameLayout::resolve("acc", &descriptor).unwrap();
        let scaling = Scaling::new("acc", &descriptor, &layout, false);
        let samples = Samples::new(2, Values::I16(vec![2, -4, 6, 8]));
        assert_eq!(
            scaling.apply(samples).into_values(),
            Values::F32(vec![1.0, -2.0, 3.0, 4.0])
        );
    }

    #[test]
    fn raw_keeps_type() {
        let sensor = Sensor::new(SensorCategory::Mems, 1).with_odr(10.0);
        let descriptor = ComponentDescriptor::new(Kind::Sensor(sensor), DataType::Int16)
            .with_sensitivity(0.5);
        let layout = FrameLayout::resolve("acc", &descriptor).unwrap();
        assert_eq!(Scaling::new("acc", &descriptor, &layout, true), Scaling::Keep);
    }

    #[test]
    fn telemetry_factor_by_channel_name() {
        let telemetries = ["i_q", "v_bus", "speed", "i_d"]
            .into_iter()
            .map(|name| Telemetry {
                name: name.to_owned(),
                enabled: name != "i_d",
            })
            .collect();
        let actuator = Actuator {
            telemetries,
            odr: None,
            current_scale: Some(0.25),
            voltage_scale: Some(3.0),
        };
        let descriptor = ComponentDescriptor::new(Kind::Actuator(actuator), DataType::Int16)
            .with_packet_sizes(PacketSizes {
                usb: Some(14),
                ..PacketSizes::default()
            });
        let layout = FrameLayout::resolve("fast_mc_telemetries", &descriptor).unwrap();
        let scaling = Scaling::new("fast_mc_telemetries", &descriptor, &layout, false);
        assert_eq!(scaling, Scaling::Columns(vec![0.25, 3.0, 1.0]));
    }
}
