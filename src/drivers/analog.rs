//! Potentiometer ADC driver (ESP-IDF oneshot).
//!
//! Owns the ADC unit and one channel; the sampler calls [`AnalogInput`] for
//! each raw conversion of its averaging burst.

#[cfg(target_os = "espidf")]
pub use espidf::PotAdc;

#[cfg(target_os = "espidf")]
mod espidf {
    use esp_idf_hal::adc::attenuation::DB_11;
    use esp_idf_hal::adc::oneshot::config::AdcChannelConfig;
    use esp_idf_hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
    use esp_idf_hal::gpio::ADCPin;
    use esp_idf_hal::peripheral::Peripheral;
    use esp_idf_hal::sys::EspError;

    use crate::app::ports::AnalogInput;
    use crate::error::SensorError;

    pub struct PotAdc<'d, P: ADCPin> {
        channel: AdcChannelDriver<'d, P, AdcDriver<'d, P::Adc>>,
    }

    impl<'d, P: ADCPin> PotAdc<'d, P> {
        /// 11 dB attenuation covers the full wiper swing on a 3.3 V divider.
        pub fn new(
            adc: impl Peripheral<P = P::Adc> + 'd,
            pin: impl Peripheral<P = P> + 'd,
        ) -> Result<Self, EspError> {
            let driver = AdcDriver::new(adc)?;
            let config = AdcChannelConfig {
                attenuation: DB_11,
                calibration: true,
                ..Default::default()
            };
            Ok(Self {
                channel: AdcChannelDriver::new(driver, pin, &config)?,
            })
        }
    }

    impl<P: ADCPin> AnalogInput for PotAdc<'_, P> {
        fn read_raw(&mut self) -> Result<u16, SensorError> {
            self.channel.read().map_err(|e| {
                log::warn!("adc: read failed ({e})");
                SensorError::AdcReadFailed
            })
        }
    }
}
