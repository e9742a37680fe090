//! Fuzz the capability-document parser with arbitrary bytes: whatever a
//! misbehaving controller serves at /api/config must never panic the
//! remote, only leave the device unavailable.

#![no_main]

use libfuzzer_sys::fuzz_target;

use espcontrol::capability;
use espcontrol::config::RemoteConfig;
use espcontrol::devices::InputKind;
use espcontrol::dispatch::RemoteDevice;

fuzz_target!(|data: &[u8]| {
    let Ok(body) = core::str::from_utf8(data) else {
        return;
    };
    let Ok(doc) = capability::parse(body) else {
        return;
    };
    // A parsed document must also apply cleanly (or be rejected) without
    // panicking, and must leave the channel with sane bounds.
    let cfg = RemoteConfig::default();
    let Ok(mut dev) = RemoteDevice::new("Pot1", "Controller1", "Stepper1", InputKind::Toggle, &cfg)
    else {
        return;
    };
    if capability::apply(&doc, &mut dev).is_ok() {
        let bounds = dev.channel.bounds;
        assert!(bounds.min <= 0 && bounds.max >= 0);
        assert!(dev.channel.host_rate_ms > 0);
    }
});
