//! Fuzz the control endpoint with arbitrary query strings: the handler
//! must always produce a bounded reply and keep the setpoint within the
//! device bounds.

#![no_main]

use libfuzzer_sys::fuzz_target;

use espcontrol::api::ControlApi;
use espcontrol::app::ports::NullEventSink;
use espcontrol::devices::CommandBounds;

fuzz_target!(|data: &[u8]| {
    let Ok(query) = core::str::from_utf8(data) else {
        return;
    };

    let mut api = ControlApi::new("Controller1", 500).unwrap();
    let stepper = api
        .add_stepper("Stepper1", CommandBounds::new(-511, 512))
        .unwrap();
    api.add_led("Led1", true).unwrap();

    let reply = api.handle_control(query, &mut NullEventSink, 0);
    assert!(reply.status == 200 || reply.status == 500);
    let sp = stepper.set_point();
    assert!((-511..=512).contains(&sp));
});
