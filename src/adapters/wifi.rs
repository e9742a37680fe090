//! WiFi station bring-up.
//!
//! Network bootstrap is a wiring concern, not part of the command channel:
//! both binaries call [`connect_station`] once at startup and hold the
//! returned driver for the process lifetime. Credentials come from the
//! build environment (`ESPCONTROL_SSID` / `ESPCONTROL_PASS`).

#[cfg(target_os = "espidf")]
pub use espidf::connect_station;

#[cfg(target_os = "espidf")]
mod espidf {
    use anyhow::{Context as _, anyhow};
    use log::info;

    use esp_idf_hal::modem::Modem;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::wifi::{
        AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi,
    };

    /// Bring the station interface up and block until it has an IP.
    pub fn connect_station(
        modem: Modem,
        ssid: &str,
        password: &str,
    ) -> anyhow::Result<Box<EspWifi<'static>>> {
        let sysloop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take()?;
        let mut esp_wifi = Box::new(EspWifi::new(modem, sysloop.clone(), Some(nvs))?);

        let config = Configuration::Client(ClientConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|()| anyhow!("SSID too long (max 32 bytes)"))?,
            password: password
                .try_into()
                .map_err(|()| anyhow!("password too long (max 64 bytes)"))?,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        });

        {
            let mut wifi = BlockingWifi::wrap(esp_wifi.as_mut(), sysloop)?;
            wifi.set_configuration(&config)?;
            wifi.start().context("WiFi start")?;
            wifi.connect().context("WiFi connect")?;
            wifi.wait_netif_up().context("WiFi netif up")?;
        }

        let ip = esp_wifi.sta_netif().get_ip_info()?;
        info!("WiFi: connected, IP {}", ip.ip);
        Ok(esp_wifi)
    }
}
