//! Réglages du simulateur stockés dans pmoconfig
//!
//! ```yaml
//! mock:
//!   http_port: 3210
//!   page_size: 14
//!   enforce_tokens: false
//! ```

use anyhow::Result;
use pmoconfig::{Config, impl_bool_config, impl_u64_config};

pub const DEFAULT_HTTP_PORT: u64 = 3210;
pub const DEFAULT_PAGE_SIZE: u64 = 14;

/// Trait d'extension ajoutant la section `mock` à [`Config`]
pub trait MockConfigExt {
    fn get_mock_http_port(&self) -> Result<u64>;
    fn set_mock_http_port(&self, port: u64) -> Result<()>;

    /// Items par page de `get_ordered_list`
    fn get_mock_page_size(&self) -> Result<u64>;
    fn set_mock_page_size(&self, size: u64) -> Result<()>;

    /// Refuse les appels de contenu dont le bearer token n'a pas été confirmé par `get_profile`
    fn get_mock_enforce_tokens(&self) -> Result<bool>;
    fn set_mock_enforce_tokens(&self, enforce: bool) -> Result<()>;
}

impl MockConfigExt for Config {
    impl_u64_config!(
        get_mock_http_port,
        set_mock_http_port,
        &["mock", "http_port"],
        DEFAULT_HTTP_PORT
    );

    impl_u64_config!(
        get_mock_page_size,
        set_mock_page_size,
        &["mock", "page_size"],
        DEFAULT_PAGE_SIZE
    );

    impl_bool_config!(
        get_mock_enforce_tokens,
        set_mock_enforce_tokens,
        &["mock", "enforce_tokens"],
        false
    );
}
