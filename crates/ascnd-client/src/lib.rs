#![warn(missing_docs)]

//! Ascnd leaderboard client: submit scores and query rankings over gRPC with
//! bounded retry, blocking and asynchronous entry points, and drain-on-drop
//! shutdown.

pub mod channel;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod pending;
pub mod retry;
pub mod types;

pub use channel::{Channel, GrpcChannel, Operation, TransportStatus};
pub use client::{AscndClient, DEFAULT_LEADERBOARD_LIMIT};
pub use config::{ClientConfig, Credential, Settings};
pub use engine::Engine;
pub use error::{ApiError, ApiResult, ConfigError};
pub use lifecycle::LifecycleState;
pub use logging::{init_logging, shutdown_logging, LogLevel, LoggingOptions};
pub use metrics::MetricsSnapshot;
pub use pending::PendingResult;
pub use retry::RetryPolicy;
pub use tonic::Code;
pub use types::{
    GetLeaderboardRequest, GetLeaderboardResponse, GetPlayerRankRequest, GetPlayerRankResponse,
    LeaderboardEntry, SubmitScoreRequest, SubmitScoreResponse,
};
