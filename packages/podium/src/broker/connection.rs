//! Per-connection actor.
//!
//! A [`Connection`] owns its role and the sending half of its outbound queue.
//! Inbound events are handled one at a time in arrival order; the gateway
//! drives it and calls [`Connection::close`] once the socket goes away.

use std::sync::Arc;

use podium_auth::SessionSecret;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::protocol::{ClientEvent, InitPayload, ResumeClaim, ServerEvent, StartRequest};
use super::role::{Action, Role, follower_greeting, remote_greeting, route};
use crate::error::BrokerError;
use crate::metrics::ServerMetrics;
use crate::qr::{ImageEncoder, encode_pair};
use crate::registry::SessionRegistry;
use crate::rooms::{ConnectionId, RoomHub};
use crate::session::{MultiplexId, RemoteId, SessionIds};
use crate::urls;

/// Process-wide services every connection uses.
pub struct BrokerContext {
    pub registry: Arc<SessionRegistry>,
    pub rooms: Arc<RoomHub>,
    pub encoder: Arc<dyn ImageEncoder>,
    pub secret: SessionSecret,
    /// Normalized, starts and ends with `/`
    pub base_path: String,
    pub metrics: Arc<ServerMetrics>,
}

pub struct Connection {
    id: ConnectionId,
    /// `scheme://host` the client reached us at, for join links
    origin: String,
    role: Role,
    /// Set by the first `start`, valid or not; later ones are never consulted
    start_seen: bool,
    tx: mpsc::Sender<ServerEvent>,
    ctx: Arc<BrokerContext>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        origin: String,
        tx: mpsc::Sender<ServerEvent>,
        ctx: Arc<BrokerContext>,
    ) -> Self {
        Self {
            id,
            origin,
            role: Role::Unidentified,
            start_seen: false,
            tx,
            ctx,
        }
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Handle one inbound event. Nothing here fails the connection: errors
    /// are logged and the connection carries on.
    pub async fn handle(&mut self, event: ClientEvent) {
        self.ctx.metrics.message_received();

        if self.role == Role::Unidentified {
            match event {
                ClientEvent::Start(_) if self.start_seen => {
                    debug!(conn_id = %self.id, "Ignoring start after a malformed one")
                }
                ClientEvent::Start(data) => {
                    self.start_seen = true;
                    match StartRequest::from_value(&data) {
                        Some(request) => {
                            if let Err(e) = self.initiate(request).await {
                                warn!(conn_id = %self.id, role = self.role.name(), "Initiation failed: {}", e);
                            }
                        }
                        None => debug!(conn_id = %self.id, "Ignoring malformed start"),
                    }
                }
                other => {
                    debug!(conn_id = %self.id, event = other.name(), "Ignoring event before start")
                }
            }
            return;
        }

        let name = event.name();
        let actions = route(&self.role, event);
        if actions.is_empty() {
            debug!(conn_id = %self.id, role = self.role.name(), event = name, "Ignoring event");
            return;
        }
        if let Err(e) = self.apply(actions).await {
            warn!(conn_id = %self.id, event = name, "Dispatch failed: {}", e);
        }
    }

    /// Leave every room and, for a presenter, drop its cached session.
    pub async fn close(self) {
        self.ctx.rooms.leave_all(self.id).await;
        if let Role::Presenter(ids) = &self.role {
            self.ctx
                .registry
                .destroy(&ids.remote_id, &ids.multiplex_id)
                .await;
            info!(conn_id = %self.id, remote_id = %ids.remote_id, "Presenter session closed");
        }
    }

    async fn initiate(&mut self, request: StartRequest) -> Result<(), BrokerError> {
        match request {
            StartRequest::Presenter { share_url, resume } => {
                self.start_presenter(share_url, resume).await
            }
            StartRequest::Remote { id } => self.start_remote(id).await,
            StartRequest::Follower { id } => self.start_follower(id).await,
        }
    }

    async fn start_presenter(
        &mut self,
        share_url: String,
        claim: Option<ResumeClaim>,
    ) -> Result<(), BrokerError> {
        let resumed = claim.as_ref().and_then(|c| {
            SessionIds::resume(&c.remote_id, &c.multiplex_id, &c.hash, &self.ctx.secret)
        });

        let (ids, was_resumed) = match resumed {
            Some(ids) => {
                self.ctx.registry.open(&ids.remote_id).await;
                info!(conn_id = %self.id, remote_id = %ids.remote_id, "Presenter resumed session");
                (ids, true)
            }
            None => {
                if claim.is_some() {
                    info!(conn_id = %self.id, "Resumption rejected, issuing fresh identifiers");
                }
                let (remote_id, multiplex_id) = self.ctx.registry.create().await;
                let ids = SessionIds::issue(remote_id, multiplex_id, &self.ctx.secret);
                info!(conn_id = %self.id, remote_id = %ids.remote_id, "Presenter session opened");
                (ids, false)
            }
        };
        self.ctx.metrics.presenter_started(was_resumed);
        self.commit(Role::Presenter(ids.clone())).await;

        let remote_url = urls::remote_url(&self.origin, &self.ctx.base_path, ids.remote_id.as_str());
        let multiplex_url = urls::multiplex_url(&share_url, ids.multiplex_id.as_str());

        let (remote_image, multiplex_image) = encode_pair(
            self.ctx.encoder.clone(),
            remote_url.clone(),
            multiplex_url.clone(),
        )
        .await
        .inspect_err(|_| self.ctx.metrics.encode_failed())?;

        self.send(ServerEvent::Init(InitPayload {
            remote_url,
            multiplex_url,
            hash: ids.hash,
            remote_id: ids.remote_id,
            multiplex_id: ids.multiplex_id,
            remote_image,
            multiplex_image,
        }))
        .await
    }

    // Join before reading the cache: an update racing the join is then
    // either replayed or relayed, never missed.

    async fn start_remote(&mut self, id: RemoteId) -> Result<(), BrokerError> {
        self.commit(Role::RemoteController(id.clone())).await;
        self.ctx.metrics.remote_joined();
        debug!(conn_id = %self.id, remote_id = %id, "Remote controller joined");

        let cached = self.ctx.registry.get(&id).await;
        self.apply(remote_greeting(&id, cached)).await
    }

    async fn start_follower(&mut self, id: MultiplexId) -> Result<(), BrokerError> {
        self.commit(Role::Follower(id.clone())).await;
        self.ctx.metrics.follower_joined();
        debug!(conn_id = %self.id, multiplex_id = %id, "Follower joined");

        let cached = self.ctx.registry.multiplex(&id).await;
        self.apply(follower_greeting(cached)).await
    }

    async fn commit(&mut self, role: Role) {
        for room in role.rooms() {
            self.ctx.rooms.join(room, self.id, self.tx.clone()).await;
        }
        self.role = role;
    }

    async fn apply(&self, actions: Vec<Action>) -> Result<(), BrokerError> {
        for action in actions {
            match action {
                Action::RecordState(id, payload) => {
                    self.ctx.registry.record_state(&id, payload).await
                }
                Action::RecordNotes(id, payload) => {
                    self.ctx.registry.record_notes(&id, payload).await
                }
                Action::RecordMultiplex(id, payload) => {
                    self.ctx.registry.record_multiplex(&id, payload).await
                }
                Action::Publish { room, event } => {
                    let delivery = self.ctx.rooms.publish(&room, event, Some(self.id)).await;
                    debug!(conn_id = %self.id, room = %room, delivered = delivery.delivered, "Relayed");
                    self.ctx.metrics.record_delivery(delivery);
                }
                Action::Reply(event) => self.send(event).await?,
            }
        }
        Ok(())
    }

    async fn send(&self, event: ServerEvent) -> Result<(), BrokerError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| BrokerError::ChannelClosed)
    }
}
