//! Open Match frontend client using `tonic`.
//!
//! The protobuf messages are declared by hand with `prost` derives and
//! cover only the fields the client touches. Field tags match Open
//! Match's `api/messages.proto` and `api/frontend.proto`.

use std::time::Duration;

use futures_util::StreamExt;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};

use crate::{
    AssignmentStream, AssignmentUpdate, Connector, FrontendClient,
    FrontendError, StatusCode, Ticket, TicketId,
};

const CREATE_TICKET_PATH: &str = "/openmatch.FrontendService/CreateTicket";
const WATCH_ASSIGNMENTS_PATH: &str =
    "/openmatch.FrontendService/WatchAssignments";
const DELETE_TICKET_PATH: &str = "/openmatch.FrontendService/DeleteTicket";

/// Wire messages (subset of the `openmatch` package).
mod proto {
    use std::collections::HashMap;

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct SearchFields {
        #[prost(map = "string, double", tag = "1")]
        pub double_args: HashMap<String, f64>,
        #[prost(map = "string, string", tag = "2")]
        pub string_args: HashMap<String, String>,
        #[prost(string, repeated, tag = "3")]
        pub tags: Vec<String>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Assignment {
        #[prost(string, tag = "1")]
        pub connection: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Ticket {
        #[prost(string, tag = "1")]
        pub id: String,
        #[prost(message, optional, tag = "3")]
        pub assignment: Option<Assignment>,
        #[prost(message, optional, tag = "4")]
        pub search_fields: Option<SearchFields>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct CreateTicketRequest {
        #[prost(message, optional, tag = "1")]
        pub ticket: Option<Ticket>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct DeleteTicketRequest {
        #[prost(string, tag = "1")]
        pub ticket_id: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct WatchAssignmentsRequest {
        #[prost(string, tag = "1")]
        pub ticket_id: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct WatchAssignmentsResponse {
        #[prost(message, optional, tag = "1")]
        pub assignment: Option<Assignment>,
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<Ticket> for proto::Ticket {
    fn from(ticket: Ticket) -> Self {
        let fields = ticket.search_fields;
        Self {
            id: String::new(),
            assignment: None,
            search_fields: Some(proto::SearchFields {
                double_args: fields.double_args,
                string_args: fields.string_args,
                tags: fields.tags,
            }),
        }
    }
}

impl From<proto::WatchAssignmentsResponse> for AssignmentUpdate {
    fn from(resp: proto::WatchAssignmentsResponse) -> Self {
        Self {
            assignment: resp.assignment.map(|a| crate::Assignment {
                connection: a.connection,
            }),
        }
    }
}

impl From<tonic::Code> for StatusCode {
    fn from(code: tonic::Code) -> Self {
        use tonic::Code;
        match code {
            Code::Cancelled => Self::Cancelled,
            Code::InvalidArgument => Self::InvalidArgument,
            Code::DeadlineExceeded => Self::DeadlineExceeded,
            Code::NotFound => Self::NotFound,
            Code::AlreadyExists => Self::AlreadyExists,
            Code::PermissionDenied => Self::PermissionDenied,
            Code::ResourceExhausted => Self::ResourceExhausted,
            Code::FailedPrecondition => Self::FailedPrecondition,
            Code::Aborted => Self::Aborted,
            Code::OutOfRange => Self::OutOfRange,
            Code::Unimplemented => Self::Unimplemented,
            Code::Internal => Self::Internal,
            Code::Unavailable => Self::Unavailable,
            Code::DataLoss => Self::DataLoss,
            Code::Unauthenticated => Self::Unauthenticated,
            // An `Ok` status never arrives as an error.
            Code::Ok | Code::Unknown => Self::Unknown,
        }
    }
}

impl From<tonic::Status> for FrontendError {
    fn from(status: tonic::Status) -> Self {
        FrontendError::status(status.code().into(), status.message())
    }
}

/// Turns `host:port` into a URI tonic accepts. An explicit scheme is kept.
fn endpoint_uri(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

// ---------------------------------------------------------------------------
// GrpcConnector
// ---------------------------------------------------------------------------

/// A [`Connector`] that speaks gRPC to an Open Match frontend.
///
/// Channels are created lazily: `connect` only validates the endpoint,
/// and the TCP/HTTP2 connection is established by the first call.
#[derive(Debug, Clone)]
pub struct GrpcConnector {
    connect_timeout: Duration,
}

impl GrpcConnector {
    /// Creates a connector with a 10-second connect timeout.
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Sets how long establishing the HTTP/2 connection may take.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for GrpcConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for GrpcConnector {
    type Client = GrpcFrontend;

    async fn connect(&self, endpoint: &str) -> Result<GrpcFrontend, FrontendError> {
        let channel = Endpoint::from_shared(endpoint_uri(endpoint))
            .map_err(|e| FrontendError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?
            .connect_timeout(self.connect_timeout)
            .connect_lazy();

        tracing::debug!(endpoint, "gRPC channel created");
        Ok(GrpcFrontend {
            inner: tonic::client::Grpc::new(channel),
        })
    }
}

// ---------------------------------------------------------------------------
// GrpcFrontend
// ---------------------------------------------------------------------------

/// A [`FrontendClient`] bound to one gRPC channel.
///
/// Cheap to clone; clones share the underlying HTTP/2 connection.
#[derive(Debug, Clone)]
pub struct GrpcFrontend {
    inner: tonic::client::Grpc<Channel>,
}

impl GrpcFrontend {
    /// Returns a client that is ready to issue a call.
    async fn ready(&self) -> Result<tonic::client::Grpc<Channel>, FrontendError> {
        let mut grpc = self.inner.clone();
        grpc.ready().await.map_err(|e| {
            FrontendError::status(
                StatusCode::Unavailable,
                format!("service was not ready: {e}"),
            )
        })?;
        Ok(grpc)
    }
}

impl FrontendClient for GrpcFrontend {
    async fn create_ticket(&self, ticket: Ticket) -> Result<TicketId, FrontendError> {
        let mut grpc = self.ready().await?;
        let request = tonic::Request::new(proto::CreateTicketRequest {
            ticket: Some(ticket.into()),
        });
        let codec: ProstCodec<proto::CreateTicketRequest, proto::Ticket> =
            ProstCodec::default();

        let created = grpc
            .unary(request, PathAndQuery::from_static(CREATE_TICKET_PATH), codec)
            .await?
            .into_inner();

        if created.id.is_empty() {
            return Err(FrontendError::Malformed(
                "created ticket has no id".into(),
            ));
        }
        Ok(TicketId::new(created.id))
    }

    async fn watch_assignments(
        &self,
        ticket_id: &TicketId,
        timeout: Duration,
    ) -> Result<AssignmentStream, FrontendError> {
        let mut grpc = self.ready().await?;
        let mut request = tonic::Request::new(proto::WatchAssignmentsRequest {
            ticket_id: ticket_id.to_string(),
        });
        // Sent as the `grpc-timeout` header; the service ends the stream
        // with DEADLINE_EXCEEDED when it passes.
        request.set_timeout(timeout);
        let codec: ProstCodec<
            proto::WatchAssignmentsRequest,
            proto::WatchAssignmentsResponse,
        > = ProstCodec::default();

        let stream = grpc
            .server_streaming(
                request,
                PathAndQuery::from_static(WATCH_ASSIGNMENTS_PATH),
                codec,
            )
            .await?
            .into_inner()
            .map(|item| item.map(AssignmentUpdate::from).map_err(FrontendError::from));

        Ok(Box::pin(stream))
    }

    async fn delete_ticket(&self, ticket_id: &TicketId) -> Result<(), FrontendError> {
        let mut grpc = self.ready().await?;
        let request = tonic::Request::new(proto::DeleteTicketRequest {
            ticket_id: ticket_id.to_string(),
        });
        // `google.protobuf.Empty` encodes exactly like `()`.
        let codec: ProstCodec<proto::DeleteTicketRequest, ()> =
            ProstCodec::default();

        grpc.unary(request, PathAndQuery::from_static(DELETE_TICKET_PATH), codec)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_uri_adds_http_scheme() {
        assert_eq!(endpoint_uri("localhost:50504"), "http://localhost:50504");
    }

    #[test]
    fn test_endpoint_uri_keeps_explicit_scheme() {
        assert_eq!(
            endpoint_uri("https://om.example.com:443"),
            "https://om.example.com:443"
        );
    }

    #[test]
    fn test_status_conversion_keeps_code_and_message() {
        let status = tonic::Status::not_found("pool not found");
        let err = FrontendError::from(status);
        assert_eq!(err.code(), Some(StatusCode::NotFound));
        assert_eq!(err.to_string(), "pool not found");
    }

    #[test]
    fn test_deadline_status_is_recognized() {
        let err = FrontendError::from(tonic::Status::deadline_exceeded(""));
        assert!(err.is_deadline_exceeded());
    }

    #[test]
    fn test_ticket_conversion_carries_search_fields() {
        let ticket = Ticket::new()
            .with_tag("mode.session")
            .with_string_arg("region", "us-west");

        let wire: proto::Ticket = ticket.into();

        assert!(wire.id.is_empty());
        let fields = wire.search_fields.expect("search fields set");
        assert_eq!(fields.tags, vec!["mode.session".to_string()]);
        assert_eq!(fields.string_args["region"], "us-west");
    }

    #[test]
    fn test_watch_response_conversion() {
        let resp = proto::WatchAssignmentsResponse {
            assignment: Some(proto::Assignment {
                connection: "10.0.0.5:7777".into(),
            }),
        };
        let update = AssignmentUpdate::from(resp);
        assert_eq!(update.connection(), Some("10.0.0.5:7777"));
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_endpoint() {
        let result = GrpcConnector::new().connect("bad endpoint with spaces").await;
        assert!(matches!(
            result,
            Err(FrontendError::InvalidEndpoint { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_is_lazy_for_unreachable_endpoint() {
        // Nothing listens here; a lazy channel must still be created.
        let result = GrpcConnector::new().connect("127.0.0.1:1").await;
        assert!(result.is_ok());
    }
}
