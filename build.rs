fn main() {
    // ESP-IDF link args are only needed when building for the device.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
