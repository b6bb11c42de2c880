//! Channel capability: the narrow interface the engine sends requests through.
//!
//! The engine only sees serialized bytes going out and coming back. The
//! production implementation, [`GrpcChannel`], is a lazily connected tonic
//! channel; tests and embedders can supply any other [`Channel`].

use std::fmt;

use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes};
use tokio::time::Instant;
use tonic::client::Grpc;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::MetadataValue;
use tonic::transport::{ClientTlsConfig, Endpoint};
use tonic::{Code, Status};
use tracing::debug;

use crate::config::Settings;
use crate::error::ConfigError;

/// Remote method invoked by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Submit a score.
    SubmitScore,
    /// Fetch a page of a leaderboard.
    GetLeaderboard,
    /// Fetch one player's rank.
    GetPlayerRank,
}

impl Operation {
    /// Method name as declared by the service.
    pub fn name(self) -> &'static str {
        match self {
            Operation::SubmitScore => "SubmitScore",
            Operation::GetLeaderboard => "GetLeaderboard",
            Operation::GetPlayerRank => "GetPlayerRank",
        }
    }

    /// Full gRPC path of the method.
    pub fn path(self) -> &'static str {
        match self {
            Operation::SubmitScore => "/ascnd.v1.AscndService/SubmitScore",
            Operation::GetLeaderboard => "/ascnd.v1.AscndService/GetLeaderboard",
            Operation::GetPlayerRank => "/ascnd.v1.AscndService/GetPlayerRank",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Non-OK status reported by a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportStatus {
    /// Status code.
    pub code: Code,
    /// Status message.
    pub message: String,
}

impl TransportStatus {
    /// Creates a status.
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<Status> for TransportStatus {
    fn from(status: Status) -> Self {
        Self {
            code: status.code(),
            message: status.message().to_string(),
        }
    }
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

/// Connection to the leaderboard service.
///
/// The engine holds the channel behind one exclusive lock, so implementations
/// see at most one call at a time and may keep mutable connection state.
#[async_trait]
pub trait Channel: Send + 'static {
    /// Sends a serialized request and returns the serialized response.
    ///
    /// `deadline` is when the engine abandons this attempt; implementations
    /// should propagate it to the server. `auth_token` is the API key, if any.
    async fn send(
        &mut self,
        operation: Operation,
        payload: Bytes,
        deadline: Instant,
        auth_token: Option<&str>,
    ) -> Result<Bytes, TransportStatus>;

    /// Returns true if the service can be reached before `deadline`.
    async fn is_ready(&mut self, deadline: Instant) -> bool;
}

/// Codec that hands payload bytes through untouched.
///
/// Message encoding happens in the engine so that decode failures can be told
/// apart from transport failures.
#[derive(Debug, Clone, Copy, Default)]
struct RawCodec;

impl Codec for RawCodec {
    type Encode = Bytes;
    type Decode = Bytes;
    type Encoder = RawCodec;
    type Decoder = RawCodec;

    fn encoder(&mut self) -> Self::Encoder {
        RawCodec
    }

    fn decoder(&mut self) -> Self::Decoder {
        RawCodec
    }
}

impl Encoder for RawCodec {
    type Item = Bytes;
    type Error = Status;

    fn encode(&mut self, item: Bytes, dst: &mut EncodeBuf<'_>) -> Result<(), Status> {
        dst.put(item);
        Ok(())
    }
}

impl Decoder for RawCodec {
    type Item = Bytes;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Bytes>, Status> {
        let len = src.remaining();
        Ok(Some(src.copy_to_bytes(len)))
    }
}

/// Builds the endpoint URI, adding a scheme when the address has none.
pub(crate) fn endpoint_uri(server_address: &str, use_ssl: bool) -> String {
    let addr = server_address.trim_end_matches('/');
    if addr.contains("://") {
        addr.to_string()
    } else if use_ssl {
        format!("https://{addr}")
    } else {
        format!("http://{addr}")
    }
}

/// gRPC channel to the Ascnd service.
pub struct GrpcChannel {
    endpoint: Endpoint,
    grpc: Grpc<tonic::transport::Channel>,
}

impl GrpcChannel {
    /// Configures a lazily connected channel.
    ///
    /// No I/O happens here; the connection is established on first use. Must
    /// be called from within a tokio runtime.
    pub fn open(settings: &Settings) -> Result<Self, ConfigError> {
        let uri = endpoint_uri(&settings.server_address, settings.use_ssl);
        let invalid = |reason: String| ConfigError::InvalidEndpoint {
            endpoint: uri.clone(),
            reason,
        };

        let mut endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|e| invalid(e.to_string()))?
            .connect_timeout(settings.connection_timeout)
            .user_agent(settings.user_agent.clone())
            .map_err(|e| invalid(e.to_string()))?;

        if settings.use_ssl {
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new().with_native_roots())
                .map_err(|e| invalid(e.to_string()))?;
        }

        debug!(endpoint = %uri, tls = settings.use_ssl, "opening channel");
        let grpc = Grpc::new(endpoint.connect_lazy());
        Ok(Self { endpoint, grpc })
    }
}

impl fmt::Debug for GrpcChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrpcChannel")
            .field("uri", self.endpoint.uri())
            .finish()
    }
}

#[async_trait]
impl Channel for GrpcChannel {
    async fn send(
        &mut self,
        operation: Operation,
        payload: Bytes,
        deadline: Instant,
        auth_token: Option<&str>,
    ) -> Result<Bytes, TransportStatus> {
        self.grpc.ready().await.map_err(|e| {
            TransportStatus::new(Code::Unavailable, format!("channel not ready: {e}"))
        })?;

        let mut request = tonic::Request::new(payload);
        request.set_timeout(deadline.saturating_duration_since(Instant::now()));
        if let Some(token) = auth_token {
            let value = MetadataValue::try_from(format!("Bearer {token}")).map_err(|_| {
                TransportStatus::new(Code::Unauthenticated, "api key is not valid header text")
            })?;
            request.metadata_mut().insert("authorization", value);
        }

        let path = PathAndQuery::from_static(operation.path());
        let response = self.grpc.unary(request, path, RawCodec).await?;
        Ok(response.into_inner())
    }

    async fn is_ready(&mut self, deadline: Instant) -> bool {
        matches!(
            tokio::time::timeout_at(deadline, self.endpoint.connect()).await,
            Ok(Ok(_))
        )
    }
}
