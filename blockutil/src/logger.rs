/// Intercept messages from the `log` crate and print them to STDOUT, defaulting to info level.
/// Call this once from binaries; libraries just use the macros.
pub fn setup() {
    use env_logger::{Builder, Env};
    Builder::from_env(Env::default().default_filter_or("info")).init();
}
