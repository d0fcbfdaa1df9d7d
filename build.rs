fn main() {
    // Host builds need no ESP-IDF environment; flash builds export the
    // toolchain paths discovered by embuild.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
