//! # pmostalkermock - Simulateur déterministe de portail Stalker
//!
//! Sert des catalogues générés via le protocole des portails Stalker, pour
//! tester des clients sans vrai middleware.
//!
//! Chaque adresse MAC (ou compte `username:password`) correspond à un scénario.
//! La graine du scénario alimente un RNG ChaCha8 : un boîtier voit toujours les mêmes
//! catégories, items, saisons et guide des programmes, d'une exécution et d'une machine à l'autre.
//!
//! ## Structure des modules
//!
//! ```text
//! pmostalkermock/
//! ├── src/
//! │   ├── lib.rs          # Module principal (ce fichier)
//! │   ├── scenarios.rs    # Registre des scénarios, graines MAC/compte
//! │   ├── fake.rs         # Tables de mots tirées au hasard
//! │   ├── generator.rs    # Catalogue, saisons, EPG, liens de flux
//! │   ├── store.rs        # Catalogues par boîtier, favoris, tokens
//! │   ├── dispatch.rs     # Action -> réponse
//! │   ├── server.rs       # Routes axum
//! │   ├── local.rs        # PortalTransport en mémoire
//! │   ├── logs.rs         # Initialisation de tracing-subscriber
//! │   ├── config_ext.rs   # Extension pmoconfig
//! │   ├── error.rs
//! │   └── bin/main.rs     # Serveur autonome
//! ```
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use pmostalkermock::{DataStore, Dispatcher, LocalTransport};
//! use pmostalker::{ContentKind, PortalSession, StalkerClient};
//! use std::sync::Arc;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let dispatcher = Arc::new(Dispatcher::new(Arc::new(DataStore::default())));
//! let client = StalkerClient::new(Arc::new(LocalTransport::new(dispatcher)));
//! let session = PortalSession::new(
//!     "http://localhost:3210/stalker_portal/server/load.php",
//!     "00:1A:79:00:00:01",
//! );
//! let categories = client.categories(&session, ContentKind::Vod).await?;
//! assert_eq!(categories.len(), 8);
//! # Ok(())
//! # }
//! ```

pub mod config_ext;
pub mod dispatch;
pub mod error;
mod fake;
pub mod generator;
pub mod local;
pub mod logs;
pub mod scenarios;
pub mod server;
pub mod store;

pub use config_ext::MockConfigExt;
pub use dispatch::{AUTH_FAILED_MESSAGE, DEFAULT_MAC, Dispatcher, PortalCall};
pub use error::{MockError, Result};
pub use generator::{GeneratedCatalog, TEST_HLS_STREAMS, resolve_stream_url};
pub use local::LocalTransport;
pub use scenarios::{
    AccountStatus, Credential, ScenarioConfig, ScenarioRegistry, account_to_seed, mac_to_seed,
};
pub use server::{MockServer, router};
pub use store::DataStore;
