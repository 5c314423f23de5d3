#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Numerical core for aircraft geometry: curve-curve intersection and
//! bilinear patch point inversion, built on a small 2-parameter Newton
//! optimizer.

pub mod geom;

cfg_if::cfg_if! {
    if #[cfg(feature = "debug_logs")] {
        /// Installs `env_logger` (filter from `RUST_LOG`, `debug` otherwise).
        ///
        /// Safe to call more than once; later calls are ignored.
        pub fn init_logger() {
            let _ = env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or("debug"),
            )
            .is_test(cfg!(test))
            .try_init();
        }
    } else {
        pub fn init_logger() {
            // no-op fallback when debug logs are disabled
        }
    }
}
