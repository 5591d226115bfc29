fn main() {
    // ESP-IDF link arguments are only needed for target builds; host
    // simulation and tests link against std alone.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
