//! ODAP gateway: phase-1 transfer initialization
//!
//! The client gateway receives a [`SendClientV1Request`], checks that it is
//! the named source gateway, and sends a signed transfer initialization
//! request to the recipient gateway. The recipient checks the signature and
//! that it serves the named DLT, records the session, and answers with a
//! signed acknowledgement carrying the hash of the request it received.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use cactus_core::checks::non_blank_string;
use cactus_core::{
    CactusPlugin, EndpointDescriptor, KeyPair, PluginCapability, PluginRegistry,
    WebServicePlugin,
};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{OdapError, Result};
use crate::messages::{message_hash, sign_message, verify_message};
use crate::types::{
    GatewayRole, HexPublicKey, SendClientV1Request, SessionData, SessionStep,
    TransferInitializationRequest, TransferInitializationResponse,
    INIT_TRANSFER_ACK_MESSAGE_TYPE, INIT_TRANSFER_MESSAGE_TYPE,
};
use crate::web::TRANSFER_INITIATION_PATH;

pub const PACKAGE_NAME: &str = "cactus-plugin-odap-hermes";

fn default_instance_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_negotiation_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OdapGatewayOptions {
    pub name: String,

    /// DLT systems this gateway serves
    #[serde(alias = "dltIDs")]
    pub dlt_ids: Vec<String>,

    #[serde(default = "default_instance_id")]
    pub instance_id: String,

    /// PKCS#8 PEM of the gateway key. A fresh key is generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_pair_pem: Option<String>,

    /// Object store that receives a copy of every session record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_store_instance_id: Option<String>,

    #[serde(default = "default_negotiation_timeout_ms")]
    pub negotiation_timeout_ms: u64,
}

impl OdapGatewayOptions {
    pub fn new(name: impl Into<String>, dlt_ids: Vec<String>) -> Self {
        Self {
            name: name.into(),
            dlt_ids,
            instance_id: default_instance_id(),
            key_pair_pem: None,
            object_store_instance_id: None,
            negotiation_timeout_ms: default_negotiation_timeout_ms(),
        }
    }
}

/// Key under which a session record is written to the object store
pub fn session_object_key(session_id: &str) -> String {
    format!("odap/sessions/{}", session_id)
}

pub struct OdapGateway {
    name: String,
    instance_id: String,
    dlt_ids: BTreeSet<String>,
    key_pair: KeyPair,
    pub_key: HexPublicKey,
    sessions: RwLock<HashMap<String, SessionData>>,
    registry: Option<PluginRegistry>,
    object_store_instance_id: Option<String>,
    http: reqwest::Client,
}

impl std::fmt::Debug for OdapGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OdapGateway")
            .field("name", &self.name)
            .field("instance_id", &self.instance_id)
            .field("dlt_ids", &self.dlt_ids)
            .field("pub_key", &self.pub_key)
            .finish()
    }
}

impl OdapGateway {
    /// Build a gateway. The registry is only consulted for the object store.
    pub fn new(options: OdapGatewayOptions, registry: Option<PluginRegistry>) -> Result<Self> {
        non_blank_string(&options.name, "name")?;
        non_blank_string(&options.instance_id, "instanceId")?;
        if options.dlt_ids.is_empty() {
            return Err(OdapError::InvalidArgument(
                "dltIDs must name at least one DLT system".into(),
            ));
        }
        for dlt_id in &options.dlt_ids {
            non_blank_string(dlt_id, "dltIDs")?;
        }
        if options.object_store_instance_id.is_some() && registry.is_none() {
            return Err(OdapError::InvalidArgument(
                "objectStoreInstanceId requires a plugin registry".into(),
            ));
        }

        let key_pair = match &options.key_pair_pem {
            Some(pem) => KeyPair::from_pkcs8_pem(pem)?,
            None => KeyPair::generate(),
        };
        let pub_key = HexPublicKey::from(key_pair.public_key());
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(options.negotiation_timeout_ms))
            .build()
            .map_err(|e| OdapError::HttpClient(e.to_string()))?;

        info!(
            name = %options.name,
            instance_id = %options.instance_id,
            pub_key = %pub_key,
            "ODAP gateway initialized"
        );

        Ok(Self {
            name: options.name,
            instance_id: options.instance_id,
            dlt_ids: options.dlt_ids.into_iter().collect(),
            key_pair,
            pub_key,
            sessions: RwLock::new(HashMap::new()),
            registry,
            object_store_instance_id: options.object_store_instance_id,
            http,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hex public key identifying this gateway
    pub fn pub_key(&self) -> &HexPublicKey {
        &self.pub_key
    }

    pub fn serves(&self, dlt_id: &str) -> bool {
        self.dlt_ids.contains(dlt_id)
    }

    pub fn get_session(&self, session_id: &str) -> Option<SessionData> {
        self.sessions.read().get(session_id).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Snapshot of every session this gateway has recorded
    pub fn sessions(&self) -> Vec<SessionData> {
        self.sessions.read().values().cloned().collect()
    }

    /// Client side of phase 1.
    ///
    /// Returns the recipient's acknowledgement once its signature and the
    /// echoed request hash check out.
    pub async fn send_client_request(
        &self,
        request: SendClientV1Request,
    ) -> Result<TransferInitializationResponse> {
        if request.client_identity_pubkey != self.pub_key {
            return Err(OdapError::InvalidArgument(format!(
                "clientIdentityPubkey {} does not identify this gateway",
                request.client_identity_pubkey
            )));
        }
        if !self.serves(&request.source_gateway_dlt_system) {
            return Err(OdapError::InvalidArgument(format!(
                "sourceGatewayDltSystem {} is not served by this gateway",
                request.source_gateway_dlt_system
            )));
        }
        non_blank_string(&request.server_gateway_configuration.api_host, "apiHost")?;

        let initialization = self.initialization_request(&request)?;
        let request_hash = message_hash(&initialization)?;
        let session_id = initialization.session_id.clone();

        let mut session = SessionData {
            id: session_id.clone(),
            role: GatewayRole::Client,
            step: SessionStep::TransferInitiationSent,
            initialization_request: initialization.clone(),
            initial_request_message_hash: request_hash.clone(),
            initialization_response: None,
            updated_at: Utc::now(),
        };
        self.store_session(&session).await?;

        let response = match self
            .exchange_initialization(&request, &initialization, &request_hash)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Transfer initialization failed");
                session.step = SessionStep::TransferInitiationFailed;
                session.updated_at = Utc::now();
                if let Err(store_err) = self.store_session(&session).await {
                    warn!(session_id = %session_id, error = %store_err, "Could not record failed session");
                }
                return Err(e);
            }
        };

        session.step = SessionStep::TransferInitiationAccepted;
        session.initialization_response = Some(response.clone());
        session.updated_at = Utc::now();
        self.store_session(&session).await?;

        info!(session_id = %session_id, "Transfer initialization accepted");
        Ok(response)
    }

    /// Send the signed request and check the acknowledgement against it
    async fn exchange_initialization(
        &self,
        request: &SendClientV1Request,
        initialization: &TransferInitializationRequest,
        request_hash: &str,
    ) -> Result<TransferInitializationResponse> {
        let session_id = &initialization.session_id;
        let url = format!(
            "{}{}",
            request
                .server_gateway_configuration
                .api_host
                .trim_end_matches('/'),
            TRANSFER_INITIATION_PATH
        );
        info!(session_id = %session_id, url = %url, "Sending transfer initialization request");
        let response = self.post_initialization(&url, initialization).await?;

        if &response.session_id != session_id {
            return Err(OdapError::VerificationFailed(format!(
                "response names session {} instead of {}",
                response.session_id, session_id
            )));
        }
        if response.initial_request_message_hash != request_hash {
            return Err(OdapError::VerificationFailed(
                "response does not acknowledge the request that was sent".into(),
            ));
        }
        if response.server_identity_pubkey != request.recipient_gateway_pubkey {
            return Err(OdapError::VerificationFailed(format!(
                "response signed by {} instead of recipient gateway {}",
                response.server_identity_pubkey, request.recipient_gateway_pubkey
            )));
        }
        verify_message(&response, &request.recipient_gateway_pubkey.public_key())?;
        Ok(response)
    }

    /// Server side of phase 1
    pub async fn on_transfer_initiation_request(
        &self,
        request: TransferInitializationRequest,
    ) -> Result<TransferInitializationResponse> {
        if request.message_type != INIT_TRANSFER_MESSAGE_TYPE {
            return Err(OdapError::InvalidArgument(format!(
                "unexpected message type {}",
                request.message_type
            )));
        }
        non_blank_string(&request.session_id, "sessionId")?;
        verify_message(&request, &request.source_gateway_pubkey.public_key()).inspect_err(
            |e| warn!(session_id = %request.session_id, error = %e, "Rejected transfer initialization"),
        )?;
        if request.recipient_gateway_pubkey != self.pub_key {
            return Err(OdapError::InvalidArgument(format!(
                "recipientGatewayPubkey {} does not identify this gateway",
                request.recipient_gateway_pubkey
            )));
        }
        if !self.serves(&request.recipient_gateway_dlt_system) {
            return Err(OdapError::InvalidArgument(format!(
                "recipientGatewayDltSystem {} is not served by this gateway",
                request.recipient_gateway_dlt_system
            )));
        }
        let request_hash = message_hash(&request)?;
        let mut response = TransferInitializationResponse {
            message_type: INIT_TRANSFER_ACK_MESSAGE_TYPE.into(),
            session_id: request.session_id.clone(),
            sequence_number: request.sequence_number,
            initial_request_message_hash: request_hash.clone(),
            timestamp: Utc::now().to_rfc3339(),
            server_identity_pubkey: self.pub_key.clone(),
            signature: String::new(),
        };
        sign_message(&mut response, &self.key_pair)?;

        let session = SessionData {
            id: request.session_id.clone(),
            role: GatewayRole::Server,
            step: SessionStep::TransferInitiationAccepted,
            initialization_request: request,
            initial_request_message_hash: request_hash,
            initialization_response: Some(response.clone()),
            updated_at: Utc::now(),
        };
        self.claim_session(&session)?;
        if let Err(e) = self.persist_session(&session).await {
            self.sessions.write().remove(&session.id);
            return Err(e);
        }

        info!(session_id = %session.id, "Accepted transfer initialization");
        Ok(response)
    }

    fn initialization_request(
        &self,
        request: &SendClientV1Request,
    ) -> Result<TransferInitializationRequest> {
        let mut message = TransferInitializationRequest {
            message_type: INIT_TRANSFER_MESSAGE_TYPE.into(),
            session_id: Uuid::new_v4().to_string(),
            sequence_number: 1,
            version: request.version.clone(),
            logging_profile: request.logging_profile.clone(),
            access_control_profile: request.access_control_profile.clone(),
            application_profile: request.application_profile.clone(),
            payload_profile: request.pay_load_profile.clone(),
            asset_profile: request.asset_profile.clone(),
            asset_control_profile: request.asset_control_profile.clone(),
            originator_pubkey: request.originator_pubkey.clone(),
            beneficiary_pubkey: request.beneficiary_pubkey.clone(),
            client_identity_pubkey: request.client_identity_pubkey.clone(),
            server_identity_pubkey: request.server_identity_pubkey.clone(),
            client_dlt_system: request.client_dlt_system.clone(),
            server_dlt_system: request.server_dlt_system.clone(),
            source_gateway_pubkey: self.pub_key.clone(),
            source_gateway_dlt_system: request.source_gateway_dlt_system.clone(),
            recipient_gateway_pubkey: request.recipient_gateway_pubkey.clone(),
            recipient_gateway_dlt_system: request.recipient_gateway_dlt_system.clone(),
            signature: String::new(),
        };
        sign_message(&mut message, &self.key_pair)?;
        Ok(message)
    }

    async fn post_initialization(
        &self,
        url: &str,
        message: &TransferInitializationRequest,
    ) -> Result<TransferInitializationResponse> {
        let transport_error = |e: reqwest::Error| {
            if e.is_timeout() {
                OdapError::NegotiationTimeout(format!("{}: {}", url, e))
            } else {
                OdapError::NegotiationFailed(format!("{}: {}", url, e))
            }
        };

        let response = self
            .http
            .post(url)
            .json(message)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url = %url, status = %status, "Recipient gateway refused transfer initialization");
            return Err(OdapError::NegotiationFailed(format!(
                "recipient gateway answered {}: {}",
                status, body
            )));
        }
        response.json().await.map_err(transport_error)
    }

    /// Record a new session id, refusing one that is already known
    fn claim_session(&self, session: &SessionData) -> Result<()> {
        match self.sessions.write().entry(session.id.clone()) {
            Entry::Occupied(_) => Err(OdapError::InvalidArgument(format!(
                "session {} already exists",
                session.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(())
            }
        }
    }

    async fn store_session(&self, session: &SessionData) -> Result<()> {
        self.sessions
            .write()
            .insert(session.id.clone(), session.clone());
        self.persist_session(session).await
    }

    async fn persist_session(&self, session: &SessionData) -> Result<()> {
        let (Some(registry), Some(store_id)) = (&self.registry, &self.object_store_instance_id)
        else {
            return Ok(());
        };
        let store = registry.get_object_store(store_id)?;
        let bytes = serde_json::to_vec(session).map_err(cactus_core::CactusError::from)?;
        store.set(&session_object_key(&session.id), bytes).await?;
        debug!(session_id = %session.id, store = %store_id, "Persisted session record");
        Ok(())
    }
}

impl CactusPlugin for OdapGateway {
    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn package_name(&self) -> &str {
        PACKAGE_NAME
    }

    fn capabilities(self: Arc<Self>) -> Vec<PluginCapability> {
        vec![PluginCapability::WebService(self)]
    }
}

impl WebServicePlugin for OdapGateway {
    fn endpoints(&self) -> Vec<EndpointDescriptor> {
        crate::web::endpoints()
    }

    fn router(self: Arc<Self>) -> axum::Router {
        crate::web::router(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssetProfile, GatewayConfiguration, PayloadProfile};
    use cactus_core::plugin::memory::PluginObjectStoreMemory;
    use cactus_core::CactusError;

    fn gateway(name: &str) -> OdapGateway {
        OdapGateway::new(OdapGatewayOptions::new(name, vec!["dummy".into()]), None).unwrap()
    }

    fn client_request(client: &OdapGateway, server: &OdapGateway) -> SendClientV1Request {
        let party = HexPublicKey::from(KeyPair::generate().public_key());
        let asset_profile = AssetProfile::new("2060-12-25T00:00:00Z");
        SendClientV1Request {
            server_gateway_configuration: GatewayConfiguration {
                api_host: "http://127.0.0.1:9".into(),
            },
            version: "0.0.0".into(),
            logging_profile: "dummy".into(),
            access_control_profile: "dummy".into(),
            application_profile: "dummy".into(),
            pay_load_profile: PayloadProfile {
                asset_profile: asset_profile.clone(),
                capabilities: String::new(),
            },
            asset_profile,
            asset_control_profile: "dummy".into(),
            beneficiary_pubkey: party.clone(),
            client_dlt_system: "dummy".into(),
            client_identity_pubkey: client.pub_key().clone(),
            originator_pubkey: party,
            recipient_gateway_dlt_system: "dummy".into(),
            recipient_gateway_pubkey: server.pub_key().clone(),
            server_dlt_system: "dummy".into(),
            server_identity_pubkey: server.pub_key().clone(),
            source_gateway_dlt_system: "dummy".into(),
        }
    }

    #[test]
    fn test_options_are_validated() {
        assert!(OdapGateway::new(OdapGatewayOptions::new("  ", vec!["dummy".into()]), None).is_err());
        assert!(OdapGateway::new(OdapGatewayOptions::new("gw", vec![]), None).is_err());

        let mut options = OdapGatewayOptions::new("gw", vec!["dummy".into()]);
        options.object_store_instance_id = Some("store".into());
        assert!(matches!(
            OdapGateway::new(options, None),
            Err(OdapError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_options_accept_dlt_ids_alias() {
        let options: OdapGatewayOptions = serde_json::from_value(serde_json::json!({
            "name": "cactus-plugin#odapGateway",
            "dltIDs": ["dummy"],
        }))
        .unwrap();
        assert_eq!(options.dlt_ids, vec!["dummy".to_string()]);
        assert!(!options.instance_id.is_empty());
        assert_eq!(options.negotiation_timeout_ms, 10_000);
    }

    #[tokio::test]
    async fn test_client_request_must_name_this_gateway() {
        let client = gateway("client");
        let server = gateway("server");
        let mut request = client_request(&client, &server);
        request.client_identity_pubkey = server.pub_key().clone();

        let err = client.send_client_request(request).await.unwrap_err();
        assert!(matches!(err, OdapError::InvalidArgument(_)));
        assert_eq!(client.session_count(), 0);
    }

    #[tokio::test]
    async fn test_client_request_needs_served_dlt() {
        let client = gateway("client");
        let server = gateway("server");
        let mut request = client_request(&client, &server);
        request.source_gateway_dlt_system = "fabric".into();

        assert!(matches!(
            client.send_client_request(request).await,
            Err(OdapError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_server_accepts_signed_initialization() {
        let client = gateway("client");
        let server = gateway("server");
        let message = client
            .initialization_request(&client_request(&client, &server))
            .unwrap();

        let response = server
            .on_transfer_initiation_request(message.clone())
            .await
            .unwrap();
        assert_eq!(response.session_id, message.session_id);
        assert_eq!(
            response.initial_request_message_hash,
            message_hash(&message).unwrap()
        );
        verify_message(&response, &server.pub_key().public_key()).unwrap();

        let session = server.get_session(&message.session_id).unwrap();
        assert_eq!(session.role, GatewayRole::Server);
        assert_eq!(session.initialization_request.asset_profile.expiration_date, "2060-12-25T00:00:00Z");

        // Replaying the same session is refused
        assert!(server.on_transfer_initiation_request(message).await.is_err());
    }

    #[tokio::test]
    async fn test_server_rejects_tampered_initialization() {
        let client = gateway("client");
        let server = gateway("server");
        let mut message = client
            .initialization_request(&client_request(&client, &server))
            .unwrap();
        message.asset_control_profile = "tampered".into();

        assert!(matches!(
            server.on_transfer_initiation_request(message).await,
            Err(OdapError::VerificationFailed(_))
        ));
        assert_eq!(server.session_count(), 0);
    }

    #[tokio::test]
    async fn test_server_rejects_initialization_for_other_gateway() {
        let client = gateway("client");
        let server = gateway("server");
        let bystander = gateway("bystander");
        let message = client
            .initialization_request(&client_request(&client, &server))
            .unwrap();

        assert!(matches!(
            bystander.on_transfer_initiation_request(message).await,
            Err(OdapError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_sessions_persist_to_object_store() {
        let store = Arc::new(PluginObjectStoreMemory::new("odap-store"));
        let registry = PluginRegistry::new();
        registry.add(store.clone());

        let client = gateway("client");
        let mut options = OdapGatewayOptions::new("server", vec!["dummy".into()]);
        options.object_store_instance_id = Some("odap-store".into());
        let server = OdapGateway::new(options, Some(registry)).unwrap();

        let message = client
            .initialization_request(&client_request(&client, &server))
            .unwrap();
        server
            .on_transfer_initiation_request(message.clone())
            .await
            .unwrap();

        let bytes = cactus_core::ObjectStorePlugin::get(
            store.as_ref(),
            &session_object_key(&message.session_id),
        )
        .await
        .unwrap()
        .unwrap();
        let stored: SessionData = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(stored.id, message.session_id);
    }

    #[tokio::test]
    async fn test_missing_object_store_surfaces_not_found() {
        let client = gateway("client");
        let mut options = OdapGatewayOptions::new("server", vec!["dummy".into()]);
        options.object_store_instance_id = Some("absent".into());
        let server = OdapGateway::new(options, Some(PluginRegistry::new())).unwrap();

        let message = client
            .initialization_request(&client_request(&client, &server))
            .unwrap();
        assert!(matches!(
            server.on_transfer_initiation_request(message.clone()).await,
            Err(OdapError::Core(CactusError::NotFound(_)))
        ));
        // An unpersisted session does not block a retry
        assert_eq!(server.session_count(), 0);
        assert!(matches!(
            server.on_transfer_initiation_request(message).await,
            Err(OdapError::Core(CactusError::NotFound(_)))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicates_accept_exactly_one() {
        let client = gateway("client");
        let server = Arc::new(gateway("server"));
        let message = client
            .initialization_request(&client_request(&client, &server))
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let server = server.clone();
                let message = message.clone();
                tokio::spawn(async move { server.on_transfer_initiation_request(message).await })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(e) => assert!(matches!(e, OdapError::InvalidArgument(_)), "{:?}", e),
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(server.session_count(), 1);
    }
}
