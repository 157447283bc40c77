//! Request handling: decode, validate, execute, persist, respond.
//!
//! Every failure is turned into a status on the method's own response type;
//! nothing propagates back to the transport.

use std::sync::Arc;

use lds_core::messages::{
    FindNodePropertiesResponse, FindNodesResponse, LookupUriResponse, NotificationsRequest,
};
use lds_core::{ObserverId, Request, RequestMessage, Response, Ttl, UCode, UStatus, Uri};
use lds_graph::GraphStore;

use crate::error::{Result, ServiceError};
use crate::observer::ObserverRegistry;
use crate::persist::PersistenceCoordinator;

/// Status message for any request that arrives before the graph is loaded.
pub const NOT_INITIALIZED: &str = "Database not initialized";

/// Executes decoded requests against the graph and observer registry.
#[derive(Clone)]
pub struct RequestHandler {
    graph: Arc<GraphStore>,
    observers: Arc<ObserverRegistry>,
    persistence: Arc<PersistenceCoordinator>,
}

impl RequestHandler {
    pub fn new(
        graph: Arc<GraphStore>,
        observers: Arc<ObserverRegistry>,
        persistence: Arc<PersistenceCoordinator>,
    ) -> Self {
        Self {
            graph,
            observers,
            persistence,
        }
    }

    /// Answer one request. Always returns the response type of
    /// `message.method`.
    pub async fn handle(&self, message: RequestMessage) -> Response {
        let method = message.method;
        if !self.graph.is_initialized() {
            return Response::error(method, UCode::FailedPrecondition, NOT_INITIALIZED);
        }

        let request = match Request::decode(method, message.payload) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(method = %method, error = %e, "Undecodable payload");
                return Response::failure(method, ServiceError::UnexpectedPayload.to_status());
            }
        };

        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(method = %method, error = %e, "Request failed");
                Response::failure(method, e.to_status())
            }
        }
    }

    async fn dispatch(&self, request: Request) -> Result<Response> {
        let response = match request {
            // ── Queries ──────────────────────────────────────────
            Request::LookupUri(r) => {
                let uri = parse_uri(&r.uri, "uri")?;
                Response::LookupUri(LookupUriResponse {
                    status: UStatus::ok(),
                    uris: self.graph.lookup_uri(&uri)?,
                })
            }
            Request::FindNodes(r) => {
                let uri = parse_uri(&r.uri, "uri")?;
                Response::FindNodes(FindNodesResponse {
                    status: UStatus::ok(),
                    nodes: vec![self.graph.find_node(&uri, r.depth)?],
                })
            }
            Request::FindNodeProperties(r) => {
                let uri = parse_uri(&r.uri, "uri")?;
                Response::FindNodeProperties(FindNodePropertiesResponse {
                    status: UStatus::ok(),
                    properties: self.graph.find_node_properties(&uri, &r.properties)?,
                })
            }

            // ── Mutations ────────────────────────────────────────
            Request::UpdateNode(r) => {
                let node = r.node.ok_or_else(|| ServiceError::required("node"))?;
                let ttl = Ttl::from_wire(r.ttl)?;
                self.graph.update_node(node, ttl)?;
                self.persistence.persist_or_degrade().await;
                Response::UpdateNode(UStatus::ok())
            }
            Request::UpdateProperty(r) => {
                let uri = parse_uri(&r.uri, "uri")?;
                if r.property.is_empty() {
                    return Err(ServiceError::required("property"));
                }
                let value = r.value.ok_or_else(|| ServiceError::required("value"))?;
                self.graph.update_property(&uri, &r.property, value)?;
                self.persistence.persist_or_degrade().await;
                Response::UpdateProperty(UStatus::ok())
            }
            Request::AddNodes(r) => {
                let parent = parse_uri(&r.parent_uri, "parent_uri")?;
                if r.nodes.is_empty() {
                    return Err(ServiceError::required("nodes"));
                }
                self.graph.add_nodes(&parent, r.nodes)?;
                self.persistence.persist_or_degrade().await;
                Response::AddNodes(UStatus::ok())
            }
            Request::DeleteNodes(r) => {
                let uris = parse_uris(&r.uris)?;
                self.graph.delete_nodes(&uris)?;
                self.persistence.persist_or_degrade().await;
                Response::DeleteNodes(UStatus::ok())
            }

            // ── Observers ────────────────────────────────────────
            Request::RegisterForNotifications(r) => {
                let (observer, uris) = parse_notifications(r)?;
                self.observers.register(&observer, &uris)?;
                Response::RegisterForNotifications(UStatus::ok())
            }
            Request::UnregisterForNotifications(r) => {
                let (observer, uris) = parse_notifications(r)?;
                self.observers.unregister(&observer, &uris)?;
                Response::UnregisterForNotifications(UStatus::ok())
            }
        };
        Ok(response)
    }
}

fn parse_uri(raw: &str, field: &str) -> Result<Uri> {
    if raw.is_empty() {
        return Err(ServiceError::required(field));
    }
    Ok(Uri::parse(raw)?)
}

fn parse_uris(raw: &[String]) -> Result<Vec<Uri>> {
    if raw.is_empty() {
        return Err(ServiceError::required("uris"));
    }
    raw.iter().map(|uri| parse_uri(uri, "uris")).collect()
}

fn parse_notifications(request: NotificationsRequest) -> Result<(ObserverId, Vec<Uri>)> {
    let observer = request
        .observer
        .filter(|o| !o.uri.is_empty())
        .ok_or_else(|| ServiceError::required("observer"))?;
    let uris = parse_uris(&request.uris)?;
    Ok((ObserverId::new(observer.uri), uris))
}
