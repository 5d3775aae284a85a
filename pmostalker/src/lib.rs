//! # pmostalker - Client de portail Stalker/Ministra
//!
//! Cette crate s'authentifie auprès des portails middleware Stalker en se
//! présentant comme un boîtier MAG, puis récupère le catalogue une fois la session établie.
//!
//! ## Vue d'ensemble
//!
//! - Identité du boîtier dérivée de l'adresse MAC (prehash, device ids, numéro de série)
//! - Établissement de session : handshake puis profil
//! - Un token par couple (URL du portail, adresse MAC), partagé entre appelants concurrents
//! - Échecs d'autorisation détectés dans les réponses et rejoués une seule fois
//! - Accès typé aux catégories, listes, saisons, liens, EPG et favoris
//!
//! ## Structure des modules
//!
//! ```text
//! pmostalker/
//! ├── src/
//! │   ├── lib.rs              # Module principal (ce fichier)
//! │   ├── identity.rs         # Dérivation de l'identité du boîtier
//! │   ├── auth_failure.rs     # Détection des échecs d'autorisation
//! │   ├── models.rs           # Types du protocole et union des réponses
//! │   ├── transport.rs        # Trait PortalTransport et transport reqwest
//! │   ├── flight.rs           # Cache de tokens single-flight
//! │   ├── session.rs          # Handshake, profil, ensure_token, rejeu
//! │   ├── client.rs           # Client typé du catalogue
//! │   ├── recent.rs           # Éléments vus récemment
//! │   ├── config_ext.rs       # Extension pmoconfig
//! │   └── error.rs            # Types d'erreurs
//! ```
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use pmostalker::{ContentKind, PortalSession, StalkerClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = StalkerClient::from_config()?;
//!     let session = PortalSession::new(
//!         "http://portal.example/stalker_portal/server/load.php",
//!         "00:1A:79:00:00:01",
//!     );
//!
//!     for category in client.categories(&session, ContentKind::Vod).await? {
//!         println!("{} {}", category.id, category.title);
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth_failure;
pub mod client;
pub mod config_ext;
pub mod error;
mod flight;
pub mod identity;
pub mod models;
pub mod recent;
pub mod session;
pub mod transport;

pub use auth_failure::is_authorization_failure;
pub use client::{ListQuery, StalkerClient};
pub use config_ext::StalkerConfigExt;
pub use error::{Result, StalkerError};
pub use identity::{
    DeviceIdentity, IdentityOverrides, derive_device_id, derive_prehash, derive_serial_number,
    generate_random_nonce, is_full_stalker_portal,
};
pub use models::{
    AccountInfo, Category, Channel, ContentItem, ContentKind, EmbeddedEpisode, EpgProgram,
    FavoriteOp, FavoritesData, HandshakeData, LinkData, OrderedList, PortalAction, PortalResponse,
    ProfileData, Season, SeriesItem, VodItem,
};
pub use recent::{RecentItem, RecentlyViewed};
pub use session::{AuthToken, PortalSession, SessionKey, StalkerSession};
pub use transport::{HttpTransport, PortalRequest, PortalTransport};
