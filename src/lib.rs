pub mod appointment; // Appointment dashboard overlay
pub mod chat; // Patient communication inbox
pub mod commands;
pub mod config;
pub mod core_state;
pub mod db;
pub mod models;
pub mod print; // Referral print/export
pub mod records; // Records browser
pub mod referral; // Referral form

use tracing_subscriber::EnvFilter;

pub use core_state::{CoreError, CoreState};

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the
/// default filter. Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("KonsultaLokal core v{}", config::APP_VERSION);
    }
}
