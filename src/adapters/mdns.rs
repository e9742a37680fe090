//! mDNS adapters: service advertisement (controller) and service browsing
//! (remote).
//!
//! Both sides speak `_ESPControl._tcp`. The advertiser registers the node's
//! hostname and the API port; the browser issues one PTR query per
//! discovery pass and normalises answers into [`ServiceAnswer`] records
//! with fully-qualified `.local` host names, which is what the locator
//! matches against.
//!
//! Uses the ESP-IDF mDNS component on device and is inert on simulation
//! targets (the browser answers every query with an empty set).

use log::info;

use crate::app::ports::{MAX_ANSWERS, ServiceAnswer, ServiceDiscovery};
use crate::error::DiscoveryError;

// ───────────────────────────────────────────────────────────────
// Advertiser (controller side)
// ───────────────────────────────────────────────────────────────

/// mDNS advertisement adapter.
pub struct MdnsAdvertiser {
    hostname: heapless::String<32>,
    port: u16,
    active: bool,
}

impl MdnsAdvertiser {
    pub fn new(hostname: &str, port: u16) -> Result<Self, DiscoveryError> {
        Ok(Self {
            hostname: heapless::String::try_from(hostname)
                .map_err(|_| DiscoveryError::ResponderInit)?,
            port,
            active: false,
        })
    }

    /// Whether mDNS is currently advertising.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start hostname + service advertisement.
    /// Call after the network is up and has an IP.
    pub fn start(&mut self) {
        if self.active {
            return;
        }
        self.platform_start();
        self.active = true;
        info!(
            "mDNS: advertising {}.local → _ESPControl._tcp:{}",
            self.hostname, self.port
        );
    }

    /// Stop advertisement. Call before the network goes down.
    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.platform_stop();
        self.active = false;
        info!("mDNS: stopped");
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&self) {
        use esp_idf_svc::sys::*;
        unsafe {
            let ret = mdns_init();
            if ret != ESP_OK as i32 {
                log::error!("mDNS: mdns_init failed ({})", ret);
                return;
            }

            let mut hostname_buf = [0u8; 33];
            let hb = self.hostname.as_bytes();
            let hl = hb.len().min(32);
            hostname_buf[..hl].copy_from_slice(&hb[..hl]);
            mdns_hostname_set(hostname_buf.as_ptr() as *const _);
            mdns_instance_name_set(b"ESPControl Node\0".as_ptr() as *const _);

            mdns_service_add(
                b"ESPControl\0".as_ptr() as *const _,
                b"_ESPControl\0".as_ptr() as *const _,
                b"_tcp\0".as_ptr() as *const _,
                self.port,
                core::ptr::null_mut(),
                0,
            );
        }
        info!(
            "mDNS(espidf): registered {}.local _ESPControl._tcp:{} v={}",
            self.hostname,
            self.port,
            env!("CARGO_PKG_VERSION")
        );
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&self) {
        info!(
            "mDNS(sim): registered {}.local _ESPControl._tcp:{} v={}",
            self.hostname,
            self.port,
            env!("CARGO_PKG_VERSION")
        );
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&self) {
        unsafe {
            esp_idf_svc::sys::mdns_free();
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&self) {
        info!("mDNS(sim): unregistered");
    }
}

// ───────────────────────────────────────────────────────────────
// Browser (remote side)
// ───────────────────────────────────────────────────────────────

/// Milliseconds one PTR query waits for answers.
const QUERY_TIMEOUT_MS: u64 = 2000;

/// mDNS query adapter implementing the [`ServiceDiscovery`] port.
pub struct MdnsBrowser {
    #[cfg(target_os = "espidf")]
    mdns: esp_idf_svc::mdns::EspMdns,
}

impl MdnsBrowser {
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, DiscoveryError> {
        let mdns = esp_idf_svc::mdns::EspMdns::take().map_err(|e| {
            log::error!("mDNS: take failed ({e})");
            DiscoveryError::ResponderInit
        })?;
        Ok(Self { mdns })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, DiscoveryError> {
        info!("mDNS(sim): browser with no answers");
        Ok(Self {})
    }
}

#[cfg(target_os = "espidf")]
impl ServiceDiscovery for MdnsBrowser {
    fn query(
        &mut self,
        service: &str,
        protocol: &str,
    ) -> Result<heapless::Vec<ServiceAnswer, MAX_ANSWERS>, DiscoveryError> {
        use core::fmt::Write as _;
        use core::net::IpAddr;

        // The IDF query API wants the underscore-prefixed labels.
        let mut service_label = heapless::String::<34>::new();
        write!(service_label, "_{service}").ok();
        let mut proto_label = heapless::String::<8>::new();
        write!(proto_label, "_{protocol}").ok();

        let results = self
            .mdns
            .query_ptr(
                &service_label,
                &proto_label,
                core::time::Duration::from_millis(QUERY_TIMEOUT_MS),
                MAX_ANSWERS,
            )
            .map_err(|e| {
                log::warn!("mDNS: query failed ({e})");
                DiscoveryError::QueryFailed
            })?;

        let mut answers = heapless::Vec::new();
        for result in &results {
            let Some(host) = result.hostname.as_deref() else {
                continue;
            };
            // The IDF reports bare host names; the port contract wants them
            // fully qualified.
            let mut hostname = heapless::String::<64>::new();
            write!(hostname, "{host}.local").ok();
            let Some(addr) = result.addr.iter().find_map(|a| match a {
                IpAddr::V4(v4) => Some(*v4),
                IpAddr::V6(_) => None,
            }) else {
                continue;
            };
            if answers
                .push(ServiceAnswer {
                    hostname,
                    addr,
                    port: result.port,
                })
                .is_err()
            {
                break;
            }
        }
        Ok(answers)
    }
}

#[cfg(not(target_os = "espidf"))]
impl ServiceDiscovery for MdnsBrowser {
    fn query(
        &mut self,
        _service: &str,
        _protocol: &str,
    ) -> Result<heapless::Vec<ServiceAnswer, MAX_ANSWERS>, DiscoveryError> {
        Ok(heapless::Vec::new())
    }
}
