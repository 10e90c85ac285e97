fn main() {
    // ESP-IDF toolchain environment is only needed for the device build;
    // host test builds run with `--no-default-features`.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
