//! Initialisation des logs depuis la section `host.logger` de la configuration

use pmoconfig::Config;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Construit le filtre : `RUST_LOG` s'il est défini, sinon le niveau configuré
pub fn log_filter(config: &Config) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = config
        .get_log_min_level()
        .unwrap_or_else(|_| "INFO".to_string())
        .to_lowercase();
    EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installe le subscriber global
///
/// Ne fait rien si un subscriber est déjà installé.
pub fn init_logging(config: &Config) {
    let subscriber = Registry::default().with(log_filter(config));
    let enable_console = config.get_log_enable_console().unwrap_or(true);

    let _ = if enable_console {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .try_init()
    } else {
        subscriber.try_init()
    };
}
