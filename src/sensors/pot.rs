//! Potentiometer sampler.
//!
//! Averages a burst of raw ADC conversions into one normalised reading:
//! the accumulator is guarded against overflow (an impossible sum pins the
//! reading to the range maximum), the average is clamped into the configured
//! range, and the result is optionally mirrored for inverted wiring.

use log::warn;

use crate::app::ports::AnalogInput;
use crate::config::SamplerConfig;
use crate::error::SensorError;

pub struct PotSampler {
    cfg: SamplerConfig,
}

impl PotSampler {
    pub fn new(cfg: SamplerConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.cfg
    }

    /// How often the main loop should call [`sample`](Self::sample).
    pub fn read_interval_ms(&self) -> u32 {
        self.cfg.read_interval_ms()
    }

    /// Take one averaged, clamped, optionally inverted reading.
    pub fn sample(&self, adc: &mut impl AnalogInput) -> Result<i32, SensorError> {
        let range = self.cfg.range;
        let samples = i64::from(self.cfg.samples_per_read.max(1));

        let mut total: i64 = 0;
        for _ in 0..samples {
            total += i64::from(adc.read_raw()?);
        }

        let ceiling = i64::from(range.max) * samples;
        let reading = if total > ceiling {
            warn!("pot: measurement overflow ({total} > {ceiling})");
            range.max
        } else {
            ((total / samples) as i32).clamp(range.min, range.max)
        };

        Ok(if self.cfg.invert {
            range.max - (reading - range.min)
        } else {
            reading
        })
    }
}
