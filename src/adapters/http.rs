//! HTTP adapters: the GET transport (remote side) and the API server
//! wiring (controller side).
//!
//! The transport enforces a maximum wait on every request so a dead host
//! costs one bounded timeout per dispatch, never a hung loop. Response
//! bodies are read into the bounded [`HttpReply`] buffer and truncated
//! beyond it.
//!
//! Both halves are ESP-IDF-only; host tests drive the same ports with mock
//! implementations.

#[cfg(target_os = "espidf")]
pub use espidf::{EspTransport, register_api};

#[cfg(target_os = "espidf")]
mod espidf {
    use std::sync::Arc;
    use std::time::Duration;

    use log::warn;

    use esp_idf_svc::http::Method;
    use esp_idf_svc::http::client::{Configuration as ClientConfiguration, EspHttpConnection};
    use esp_idf_svc::http::server::EspHttpServer;
    use esp_idf_svc::io::{Read as _, Write as _};

    use crate::adapters::log_sink::LogEventSink;
    use crate::adapters::time::UptimeClock;
    use crate::api::ControlApi;
    use crate::app::ports::{HttpReply, Transport};
    use crate::error::TransportError;

    // ── Client ────────────────────────────────────────────────

    /// Blocking GET transport over `EspHttpConnection`.
    pub struct EspTransport {
        timeout: Duration,
    }

    impl EspTransport {
        pub fn new(timeout_ms: u32) -> Self {
            Self {
                timeout: Duration::from_millis(u64::from(timeout_ms)),
            }
        }
    }

    impl Transport for EspTransport {
        fn get(&mut self, url: &str) -> Result<HttpReply, TransportError> {
            let mut conn = EspHttpConnection::new(&ClientConfiguration {
                timeout: Some(self.timeout),
                ..Default::default()
            })
            .map_err(|e| {
                warn!("http: connection setup failed ({e})");
                TransportError::ConnectFailed
            })?;

            conn.initiate_request(Method::Get, url, &[])
                .map_err(|_| TransportError::ConnectFailed)?;
            conn.initiate_response()
                .map_err(|_| TransportError::Timeout)?;

            let status = conn.status();
            let mut body = heapless::String::new();
            let mut buf = [0u8; 128];
            loop {
                let n = conn.read(&mut buf).map_err(|_| TransportError::Protocol)?;
                if n == 0 {
                    break;
                }
                // Both payloads on this API are ASCII.
                let chunk =
                    core::str::from_utf8(&buf[..n]).map_err(|_| TransportError::Protocol)?;
                if body.push_str(chunk).is_err() {
                    break; // truncate at capacity
                }
            }
            Ok(HttpReply { status, body })
        }
    }

    // ── Server ────────────────────────────────────────────────

    /// Register the controller API endpoints on a running server.
    pub fn register_api(
        server: &mut EspHttpServer<'static>,
        api: Arc<ControlApi>,
        clock: UptimeClock,
    ) -> anyhow::Result<()> {
        let config_api = Arc::clone(&api);
        server.fn_handler::<anyhow::Error, _>("/api/config", Method::Get, move |req| {
            let body = config_api.config_json()?;
            let mut resp = req.into_response(
                200,
                Some("OK"),
                &[
                    ("Content-Type", "application/json"),
                    ("Access-Control-Allow-Origin", "*"),
                ],
            )?;
            resp.write_all(body.as_bytes())?;
            Ok(())
        })?;

        server.fn_handler::<anyhow::Error, _>("/api/control", Method::Get, move |req| {
            let uri = req.uri();
            let query = uri.split_once('?').map_or("", |(_, q)| q);
            let mut sink = LogEventSink::new();
            let reply = api.handle_control(query, &mut sink, clock.uptime_ms());
            let mut resp = req.into_response(
                reply.status,
                None,
                &[("Content-Type", reply.content_type)],
            )?;
            resp.write_all(reply.body.as_bytes())?;
            Ok(())
        })?;

        Ok(())
    }
}
