//! Service location: mDNS query passes that resolve logical hosts and pull
//! their capability documents.
//!
//! One *pass* issues a single broadcast query and walks the answers against
//! every device still pending discovery. Matching is exact and
//! case-sensitive on the fully-qualified record name
//! (`"<logical-host>.local"`). Devices already AVAILABLE are not touched, so
//! several hosts resolve incrementally across passes without re-querying the
//! ones already found.
//!
//! A miss is never fatal: the caller re-runs the pass after a fixed retry
//! delay, which is skipped before the first pass of an episode so cold
//! start (and recovery after a demotion) reacts immediately.

use core::fmt::Write as _;

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, ServiceAnswer, ServiceDiscovery, Transport};
use crate::capability::{self, CapabilityDoc};
use crate::dispatch::{Endpoint, Registry};

pub struct ServiceLocator {
    service: &'static str,
    protocol: &'static str,
    /// Passes issued in the current discovery episode. Reset once nothing
    /// is pending, so the next outage starts with an immediate pass again.
    passes: u32,
}

impl ServiceLocator {
    pub fn new(service: &'static str, protocol: &'static str) -> Self {
        Self {
            service,
            protocol,
            passes: 0,
        }
    }

    /// Delay the caller should sleep before the next pass. Zero before the
    /// first pass of an episode, the fixed retry delay afterwards.
    pub fn pre_pass_delay_ms(&self, retry_ms: u32) -> u32 {
        if self.passes == 0 { 0 } else { retry_ms }
    }

    /// Run one discovery pass. Returns how many devices became AVAILABLE.
    pub fn pass(
        &mut self,
        registry: &mut Registry,
        discovery: &mut impl ServiceDiscovery,
        transport: &mut impl Transport,
        sink: &mut impl EventSink,
    ) -> usize {
        let pending = registry.pending_discovery_count();
        if pending == 0 {
            return 0;
        }
        self.passes += 1;
        info!(
            "mDNS query for _{}._{} (pass {}, {} unresolved)",
            self.service, self.protocol, self.passes, pending
        );

        let answers = match discovery.query(self.service, self.protocol) {
            Ok(answers) => answers,
            Err(e) => {
                warn!("discovery pass failed: {e}");
                return 0;
            }
        };
        if answers.is_empty() {
            info!("no services found");
            return 0;
        }

        let mut newly_available = 0;
        for answer in &answers {
            newly_available += self.match_answer(answer, registry, transport, sink);
        }

        if registry.pending_discovery_count() == 0 {
            self.passes = 0;
        }
        newly_available
    }

    /// Match one answer against every pending device; fetch the answering
    /// host's capability document at most once.
    fn match_answer(
        &self,
        answer: &ServiceAnswer,
        registry: &mut Registry,
        transport: &mut impl Transport,
        sink: &mut impl EventSink,
    ) -> usize {
        let endpoint = Endpoint {
            addr: answer.addr,
            port: answer.port,
        };
        let mut doc: Option<CapabilityDoc> = None;
        let mut fetched = false;
        let mut newly_available = 0;

        for device in registry.iter_mut().filter(|d| d.pending_discovery()) {
            if device.expected_record() != answer.hostname {
                continue;
            }
            info!(
                "[{}] host {} resolved to {}:{}",
                device.name, answer.hostname, answer.addr, answer.port
            );
            device.channel.endpoint = Some(endpoint);
            sink.emit(&AppEvent::HostResolved {
                device: device.name.clone(),
                addr: answer.addr,
                port: answer.port,
            });

            if !fetched {
                fetched = true;
                doc = fetch_capability(transport, endpoint);
            }
            let Some(doc) = doc.as_ref() else {
                // Fetch failed; device stays UNAVAILABLE and the next pass
                // retries it.
                continue;
            };
            match capability::apply(doc, device) {
                Ok(()) => {
                    device.channel.host_available = true;
                    device.channel.consecutive_failures = 0;
                    newly_available += 1;
                    sink.emit(&AppEvent::HostConfigured {
                        device: device.name.clone(),
                        rate_ms: device.channel.host_rate_ms,
                        bounds: device.channel.bounds,
                    });
                }
                Err(e) => {
                    warn!("[{}] capability rejected: {e}", device.name);
                }
            }
        }
        newly_available
    }
}

/// `GET http://<addr>:<port>/api/config`, parsed. `None` on any failure.
fn fetch_capability(transport: &mut impl Transport, endpoint: Endpoint) -> Option<CapabilityDoc> {
    let mut url = heapless::String::<64>::new();
    write!(url, "http://{}:{}/api/config", endpoint.addr, endpoint.port).ok();

    match transport.get(&url) {
        Ok(reply) if reply.is_success() => match capability::parse(&reply.body) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!("capability fetch from {}: {e}", endpoint.addr);
                None
            }
        },
        Ok(reply) => {
            warn!(
                "capability fetch from {}: HTTP {}",
                endpoint.addr, reply.status
            );
            None
        }
        Err(e) => {
            warn!("capability fetch from {}: {e}", endpoint.addr);
            None
        }
    }
}
