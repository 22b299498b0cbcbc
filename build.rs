fn main() {
    // ESP-IDF link arguments are only needed for the firmware build; host
    // tests compile without the `espidf` feature.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
