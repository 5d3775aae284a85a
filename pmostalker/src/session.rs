//! Établissement des sessions de portail et gestion des tokens
//!
//! Une session passe par `Unauthenticated -> Handshaking -> ProfileFetching
//! -> Authenticated`, et revient à `Unauthenticated` quand un appel de contenu
//! reçoit un échec d'autorisation. [`StalkerSession`] garde un token par couple
//! (URL du portail, adresse MAC) et garantit qu'au plus un aller-retour
//! handshake + profil est en cours par couple à tout instant.

use crate::error::{Result, StalkerError};
use crate::flight::FlightMap;
use crate::identity::{
    DEFAULT_SERIAL_NUMBER, DEVICE_MODEL, DeviceIdentity, IdentityOverrides, derive_prehash,
    generate_random_nonce, is_full_stalker_portal,
};
use crate::models::{AccountInfo, HandshakeData, PortalAction, PortalResponse, ProfileData};
use crate::transport::{PortalRequest, PortalTransport, truncate};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Marqueur `JsHttpRequest` porté par toutes les requêtes stbapp
const JS_HTTP_REQUEST: &str = "1-xml";

/// Identité sous laquelle les tokens sont mis en cache
///
/// L'adresse MAC est passée en minuscules : deux écritures d'un même boîtier
/// partagent un token, deux portails jamais.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub portal_url: String,
    pub mac_address: String,
}

/// Tout ce qu'il faut pour parler à un portail en tant qu'un boîtier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalSession {
    pub portal_url: String,
    pub mac_address: String,
    /// Le portail exige-t-il le flux handshake + profil
    pub full_portal: bool,
    #[serde(default)]
    pub overrides: IdentityOverrides,
}

impl PortalSession {
    /// Session dont la forme est déduite de l'URL du portail
    pub fn new(portal_url: impl Into<String>, mac_address: impl Into<String>) -> Self {
        let portal_url = portal_url.into();
        Self {
            full_portal: is_full_stalker_portal(&portal_url),
            portal_url,
            mac_address: mac_address.into(),
            overrides: IdentityOverrides::default(),
        }
    }

    pub fn with_full_portal(mut self, full_portal: bool) -> Self {
        self.full_portal = full_portal;
        self
    }

    pub fn with_overrides(mut self, overrides: IdentityOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn key(&self) -> SessionKey {
        SessionKey {
            portal_url: self.portal_url.trim().to_string(),
            mac_address: self.mac_address.trim().to_lowercase(),
        }
    }

    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::with_overrides(&self.mac_address, &self.overrides)
    }

    fn validate(&self) -> Result<()> {
        if self.portal_url.trim().is_empty() || self.mac_address.trim().is_empty() {
            return Err(StalkerError::InvalidSession(
                "portal URL and MAC address are required".into(),
            ));
        }
        Ok(())
    }
}

/// Résultat d'une authentification réussie, en cache par [`SessionKey`]
#[derive(Debug, Clone, PartialEq)]
pub struct AuthToken {
    pub token: String,
    pub serial_number: String,
    pub account_info: Option<AccountInfo>,
}

/// Handshake, profil et requêtes authentifiées sur un [`PortalTransport`]
#[derive(Clone)]
pub struct StalkerSession {
    transport: Arc<dyn PortalTransport>,
    serial_number: String,
    tokens: Arc<FlightMap<SessionKey, AuthToken>>,
}

impl StalkerSession {
    pub fn new(transport: Arc<dyn PortalTransport>) -> Self {
        Self {
            transport,
            serial_number: DEFAULT_SERIAL_NUMBER.to_string(),
            tokens: Arc::new(FlightMap::new()),
        }
    }

    /// Numéro de série utilisé quand la session n'en impose pas
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = serial_number.into();
        self
    }

    /// Session sur le transport HTTP, configurée depuis pmoconfig
    pub fn from_config(config: &pmoconfig::Config) -> Result<Self> {
        use crate::config_ext::StalkerConfigExt;
        use crate::transport::HttpTransport;

        let transport = HttpTransport::from_config(config)?;
        Ok(Self::new(Arc::new(transport)).with_serial_number(config.get_stalker_serial_number()?))
    }

    pub fn transport(&self) -> &Arc<dyn PortalTransport> {
        &self.transport
    }

    fn serial_for(&self, session: &PortalSession) -> String {
        session
            .overrides
            .serial_number
            .as_deref()
            .map(str::trim)
            .filter(|sn| !sn.is_empty())
            .unwrap_or(&self.serial_number)
            .to_string()
    }

    // ============ Cache des tokens ============

    pub fn cached_token(&self, session: &PortalSession) -> Option<String> {
        self.tokens.get(&session.key()).map(|auth| auth.token)
    }

    pub fn set_cached_token(&self, session: &PortalSession, token: impl Into<String>) {
        self.tokens.insert(
            session.key(),
            AuthToken {
                token: token.into(),
                serial_number: self.serial_for(session),
                account_info: None,
            },
        );
    }

    pub fn clear_cached_token(&self, session: &PortalSession) {
        if self.tokens.remove(&session.key()).is_some() {
            debug!("Cleared cached token for {}", session.mac_address);
        }
    }

    /// Retire le token en cache seulement s'il vaut encore `stale`
    ///
    /// Un token remis en cache entre-temps par un autre appelant est conservé.
    /// Indique si une entrée a été retirée.
    pub fn invalidate_token(&self, session: &PortalSession, stale: &str) -> bool {
        let removed = self
            .tokens
            .remove_if(&session.key(), |auth| auth.token == stale)
            .is_some();
        if removed {
            debug!("Invalidated token {}...", truncate(stale, 10));
        }
        removed
    }

    /// Oublie tous les tokens en cache
    pub fn clear_all_tokens(&self) {
        self.tokens.clear();
    }

    pub fn is_authenticating(&self, session: &PortalSession) -> bool {
        self.tokens.is_pending(&session.key())
    }

    // ============ Étapes du protocole ============

    /// Envoie le handshake et retourne le token et le nonce
    pub async fn perform_handshake(
        &self,
        portal_url: &str,
        mac_address: &str,
    ) -> Result<HandshakeData> {
        let request = PortalRequest::new(portal_url, mac_address).with_params([
            ("type", "stb".to_string()),
            ("action", "handshake".to_string()),
            ("token", String::new()),
            ("prehash", derive_prehash(mac_address)),
            ("JsHttpRequest", JS_HTTP_REQUEST.to_string()),
        ]);

        debug!("Handshake with {} as {}", portal_url, mac_address);
        let response = self.transport.send(request).await?;

        match PortalResponse::parse(&PortalAction::Handshake, response) {
            Ok(PortalResponse::Handshake(data)) if !data.token.is_empty() => {
                debug!("Handshake token: {}...", truncate(&data.token, 10));
                Ok(data)
            }
            Ok(PortalResponse::Error(message)) => Err(StalkerError::Handshake(message)),
            Ok(_) => Err(StalkerError::Handshake("no token received".into())),
            Err(err) => {
                warn!("Unreadable handshake answer: {}", err);
                Err(StalkerError::Handshake(format!("no token received ({err})")))
            }
        }
    }

    /// Récupère le profil, ce qui active `token` côté serveur
    ///
    /// Un `msg` ou `block_msg` dans la réponse est remonté en
    /// [`StalkerError::Profile`].
    pub async fn get_profile(
        &self,
        portal_url: &str,
        token: &str,
        serial_number: &str,
        handshake_random: Option<&str>,
        identity: &DeviceIdentity,
    ) -> Result<ProfileData> {
        let random = handshake_random
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .unwrap_or_else(generate_random_nonce);

        let metrics = json!({
            "mac": identity.mac_address,
            "model": DEVICE_MODEL,
            "type": "STB",
            "random": random,
            "sn": serial_number,
        });

        let mut params = vec![
            ("type", "stb".to_string()),
            ("action", "get_profile".to_string()),
            ("hd", "1".to_string()),
            ("not_valid_token", "0".to_string()),
            ("video_out", "hdmi".to_string()),
            ("auth_second_step", "1".to_string()),
            ("num_banks", "2".to_string()),
            ("metrics", metrics.to_string()),
            ("sn", serial_number.to_string()),
            ("device_id", identity.device_id1.clone()),
            ("device_id2", identity.device_id2.clone()),
            ("signature", identity.signature1.clone()),
        ];
        if !identity.signature2.is_empty() {
            params.push(("signature2", identity.signature2.clone()));
        }
        params.extend([
            ("prehash", identity.prehash()),
            ("stb_type", String::new()),
            ("JsHttpRequest", JS_HTTP_REQUEST.to_string()),
        ]);

        let request = PortalRequest::new(portal_url, &identity.mac_address)
            .with_params(params)
            .with_token(Some(token.to_string()))
            .with_serial_number(Some(serial_number.to_string()));

        let response = self.transport.send(request).await?;

        match PortalResponse::parse(&PortalAction::GetProfile, response)? {
            PortalResponse::Profile(profile) => match profile.error_message() {
                Some(message) => {
                    warn!("Profile rejected: {}", message);
                    Err(StalkerError::Profile(message.to_string()))
                }
                None => Ok(profile),
            },
            PortalResponse::Error(message) => Err(StalkerError::Profile(message)),
            other => Err(StalkerError::unexpected("get_profile", format!("{other:?}"))),
        }
    }

    /// Connexion par compte, `true` quand le portail répond `{ js: true }`
    pub async fn do_auth(
        &self,
        portal_url: &str,
        token: &str,
        login: &str,
        password: &str,
        identity: &DeviceIdentity,
    ) -> Result<bool> {
        let request = PortalRequest::new(portal_url, &identity.mac_address)
            .with_params([
                ("type", "stb"),
                ("action", "do_auth"),
                ("login", login),
                ("password", password),
                ("device_id", identity.device_id1.as_str()),
                ("device_id2", identity.device_id2.as_str()),
                ("JsHttpRequest", JS_HTTP_REQUEST),
            ])
            .with_token(Some(token.to_string()));

        let response = self.transport.send(request).await?;
        match PortalResponse::parse(&PortalAction::DoAuth, response)? {
            PortalResponse::DoAuth(true) => {
                info!("do_auth accepted for {}", login);
                Ok(true)
            }
            other => {
                warn!("do_auth refused for {}: {:?}", login, other);
                Ok(false)
            }
        }
    }

    /// Handshake puis profil
    ///
    /// Un échec du profil fait échouer toute l'authentification ; le token du
    /// handshake est abandonné.
    pub async fn authenticate(&self, session: &PortalSession) -> Result<AuthToken> {
        session.validate()?;
        let identity = session.identity();
        let serial_number = self.serial_for(session);

        info!(
            "Authenticating {} on {} (sn {})",
            session.mac_address, session.portal_url, serial_number
        );

        let handshake = self
            .perform_handshake(&session.portal_url, &session.mac_address)
            .await?;

        let profile = self
            .get_profile(
                &session.portal_url,
                &handshake.token,
                &serial_number,
                handshake.random.as_deref(),
                &identity,
            )
            .await?;

        info!("Authenticated {} on {}", session.mac_address, session.portal_url);
        Ok(AuthToken {
            token: handshake.token,
            serial_number,
            account_info: profile.account_info,
        })
    }

    /// Token de `session`, en s'authentifiant au plus une fois par identité
    ///
    /// Retourne `None` pour les portails sans handshake. Les appelants concurrents
    /// d'une même identité partagent une seule authentification.
    pub async fn ensure_token(&self, session: &PortalSession) -> Result<Option<AuthToken>> {
        if !session.full_portal {
            return Ok(None);
        }
        session.validate()?;

        let this = self.clone();
        let owned = session.clone();
        let auth = self
            .tokens
            .get_or_start(session.key(), move || async move {
                this.authenticate(&owned).await
            })
            .await?;

        debug!("Using token {}...", truncate(&auth.token, 10));
        Ok(Some(auth))
    }

    /// Envoie `params` avec un token valide
    ///
    /// Quand la réponse (ou l'erreur levée) est un échec d'autorisation et que
    /// `retry_on_auth_failure` est actif, le token refusé sort du cache (sauf
    /// s'il a déjà été remplacé) et la requête est rejouée une fois après une
    /// nouvelle authentification. Un second échec est retourné en
    /// [`StalkerError::Authorization`].
    pub async fn make_authenticated_request<K, V>(
        &self,
        session: &PortalSession,
        params: &[(K, V)],
        retry_on_auth_failure: bool,
    ) -> Result<Value>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();
        let action = params
            .iter()
            .find(|(k, _)| k == "action")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();

        let mut retry = retry_on_auth_failure;
        loop {
            let auth = self.ensure_token(session).await?;
            let (token, serial_number) = match auth {
                Some(auth) => (Some(auth.token), Some(auth.serial_number)),
                None => (None, None),
            };
            let used_token = token.clone().unwrap_or_default();

            debug!("Authenticated request: {}", action);
            let request = PortalRequest {
                url: session.portal_url.clone(),
                mac_address: session.mac_address.clone(),
                params: params.clone(),
                token,
                serial_number,
            };

            let can_retry = retry && session.full_portal;
            match self.transport.send(request).await {
                Ok(response) if crate::auth_failure::is_authorization_failure(&response) => {
                    warn!("Authorization failure in {} response", action);
                    if can_retry {
                        self.invalidate_token(session, &used_token);
                        retry = false;
                        continue;
                    }
                    return Err(StalkerError::Authorization(format!(
                        "{} rejected by {}",
                        action, session.portal_url
                    )));
                }
                Ok(response) => return Ok(response),
                Err(err) if can_retry && err.is_authorization_failure() => {
                    warn!("Authorization failure raised by {}: {}", action, err);
                    self.invalidate_token(session, &used_token);
                    retry = false;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
