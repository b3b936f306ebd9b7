//! Process-wide logging setup.
//!
//! Everything in the crate logs through the `log` facade; the binary installs
//! `env_logger` once at start-up. `RUST_LOG` overrides the default `info` level.

use env_logger::Env;

pub fn init() {
    let result = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
    if let Err(err) = result {
        // A logger installed by the embedding application wins.
        log::debug!("logger already initialised: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init();
        init();
        log::info!("logger initialised twice without panicking");
    }
}
