//! Transport en mémoire
//!
//! [`LocalTransport`] branche un [`Dispatcher`] directement sur le client de portail :
//! le code client tourne contre des portails simulés sans socket.

use crate::dispatch::{Dispatcher, PortalCall};
use async_trait::async_trait;
use pmostalker::{PortalRequest, PortalTransport, Result};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct LocalTransport {
    dispatcher: Arc<Dispatcher>,
    requests: AtomicUsize,
}

impl LocalTransport {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Requêtes traitées jusqu'ici
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortalTransport for LocalTransport {
    async fn send(&self, request: PortalRequest) -> Result<Value> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let call = PortalCall::new(request.mac_address, request.params).with_token(request.token);
        Ok(self.dispatcher.dispatch(&call))
    }
}
