//! The public client: blocking facade, asynchronous dispatch, and shutdown.
//!
//! An [`AscndClient`] owns a small multi-threaded tokio runtime that acts as
//! its background execution unit. Blocking calls run the engine on that
//! runtime and wait for it; `*_async` calls return a [`PendingResult`];
//! `*_with_callback` calls invoke a closure on a runtime worker thread.
//! Dropping the client waits for every asynchronous operation it started.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use prost::Message;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::channel::{Channel, GrpcChannel, Operation};
use crate::config::{ClientConfig, Credential, Settings};
use crate::engine::Engine;
use crate::error::{ApiError, ApiResult, ConfigError};
use crate::lifecycle::OperationTracker;
use crate::metrics::MetricsSnapshot;
use crate::pending::PendingResult;
use crate::types::{
    GetLeaderboardRequest, GetLeaderboardResponse, GetPlayerRankRequest, GetPlayerRankResponse,
    SubmitScoreRequest, SubmitScoreResponse,
};

/// Page size used by [`AscndClient::get_leaderboard_top`] callers that have no preference.
pub const DEFAULT_LEADERBOARD_LIMIT: i32 = 10;

const WORKER_THREADS: usize = 2;

/// Thread-safe client for the Ascnd leaderboard API.
///
/// ```no_run
/// use ascnd_client::{AscndClient, ClientConfig, SubmitScoreRequest};
///
/// let client = AscndClient::new(ClientConfig::new("api.ascnd.gg:443", "your-api-key"))?;
/// match client.submit_score(SubmitScoreRequest::new("high-scores", "player123", 1000)) {
///     Ok(resp) => println!("rank: {}", resp.rank),
///     Err(e) => eprintln!("submit failed ({}): {}", e.code(), e),
/// }
/// # Ok::<(), ascnd_client::ConfigError>(())
/// ```
///
/// Callbacks run on the client's two worker threads. Two things are
/// unsupported inside a callback, and both can hang the client:
///
/// * dropping the last handle to the client that is running it;
/// * making a blocking call (`submit_score`, `ping`, `PendingResult::wait`,
///   ...) on the same client, which parks a worker the call needs.
///
/// To chain work from a callback, use the `*_with_callback` or `*_async`
/// forms, which return without waiting.
pub struct AscndClient {
    engine: Arc<Engine>,
    config: ClientConfig,
    tracker: OperationTracker,
    runtime: Option<Runtime>,
    handle: Handle,
}

impl AscndClient {
    /// Validates `config` and creates a client over a gRPC channel.
    ///
    /// No network I/O happens here; the channel connects on first use.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let settings = config.validate()?;
        let runtime = build_runtime()?;
        let channel = {
            let _guard = runtime.enter();
            GrpcChannel::open(&settings)?
        };
        Ok(Self::assemble(config, settings, runtime, Box::new(channel)))
    }

    /// Creates a client from a server address and API key with default settings.
    pub fn connect(
        server_address: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Self::new(ClientConfig::new(server_address, api_key))
    }

    /// Validates `config` and creates a client over a caller-supplied channel.
    pub fn with_channel(config: ClientConfig, channel: impl Channel) -> Result<Self, ConfigError> {
        let settings = config.validate()?;
        let runtime = build_runtime()?;
        Ok(Self::assemble(config, settings, runtime, Box::new(channel)))
    }

    fn assemble(
        config: ClientConfig,
        settings: Settings,
        runtime: Runtime,
        channel: Box<dyn Channel>,
    ) -> Self {
        info!(
            server = %settings.server_address,
            tls = settings.use_ssl,
            max_retries = settings.retry.max_retries,
            "client created"
        );
        let credential = Credential::new(config.api_key.clone());
        let handle = runtime.handle().clone();
        Self {
            engine: Arc::new(Engine::new(settings, credential, channel)),
            config,
            tracker: OperationTracker::new(),
            runtime: Some(runtime),
            handle,
        }
    }

    // Blocking API

    /// Submits a score.
    pub fn submit_score(&self, request: SubmitScoreRequest) -> ApiResult<SubmitScoreResponse> {
        self.call(Operation::SubmitScore, request)
    }

    /// Fetches a page of leaderboard entries.
    pub fn get_leaderboard(
        &self,
        request: GetLeaderboardRequest,
    ) -> ApiResult<GetLeaderboardResponse> {
        self.call(Operation::GetLeaderboard, request)
    }

    /// Fetches one player's rank.
    pub fn get_player_rank(
        &self,
        request: GetPlayerRankRequest,
    ) -> ApiResult<GetPlayerRankResponse> {
        self.call(Operation::GetPlayerRank, request)
    }

    /// Submits a score with no metadata or idempotency key.
    pub fn submit_score_for(
        &self,
        leaderboard_id: &str,
        player_id: &str,
        score: i64,
    ) -> ApiResult<SubmitScoreResponse> {
        self.submit_score(SubmitScoreRequest::new(leaderboard_id, player_id, score))
    }

    /// Fetches the top `limit` entries of the current period.
    pub fn get_leaderboard_top(
        &self,
        leaderboard_id: &str,
        limit: i32,
    ) -> ApiResult<GetLeaderboardResponse> {
        self.get_leaderboard(GetLeaderboardRequest::new(leaderboard_id).with_limit(limit))
    }

    /// Fetches a player's rank in the current period.
    pub fn get_player_rank_for(
        &self,
        leaderboard_id: &str,
        player_id: &str,
    ) -> ApiResult<GetPlayerRankResponse> {
        self.get_player_rank(GetPlayerRankRequest::new(leaderboard_id, player_id))
    }

    // Future-returning API

    /// Submits a score in the background.
    pub fn submit_score_async(
        &self,
        request: SubmitScoreRequest,
    ) -> PendingResult<SubmitScoreResponse> {
        self.call_async(Operation::SubmitScore, request)
    }

    /// Fetches a leaderboard page in the background.
    pub fn get_leaderboard_async(
        &self,
        request: GetLeaderboardRequest,
    ) -> PendingResult<GetLeaderboardResponse> {
        self.call_async(Operation::GetLeaderboard, request)
    }

    /// Fetches a player's rank in the background.
    pub fn get_player_rank_async(
        &self,
        request: GetPlayerRankRequest,
    ) -> PendingResult<GetPlayerRankResponse> {
        self.call_async(Operation::GetPlayerRank, request)
    }

    // Callback API

    /// Submits a score and hands the result to `callback` on a worker thread.
    pub fn submit_score_with_callback<F>(&self, request: SubmitScoreRequest, callback: F)
    where
        F: FnOnce(ApiResult<SubmitScoreResponse>) + Send + 'static,
    {
        self.call_with_callback(Operation::SubmitScore, request, callback)
    }

    /// Fetches a leaderboard page and hands the result to `callback` on a worker thread.
    pub fn get_leaderboard_with_callback<F>(&self, request: GetLeaderboardRequest, callback: F)
    where
        F: FnOnce(ApiResult<GetLeaderboardResponse>) + Send + 'static,
    {
        self.call_with_callback(Operation::GetLeaderboard, request, callback)
    }

    /// Fetches a player's rank and hands the result to `callback` on a worker thread.
    pub fn get_player_rank_with_callback<F>(&self, request: GetPlayerRankRequest, callback: F)
    where
        F: FnOnce(ApiResult<GetPlayerRankResponse>) + Send + 'static,
    {
        self.call_with_callback(Operation::GetPlayerRank, request, callback)
    }

    // Configuration and health

    /// Replaces the API key used by subsequent attempts.
    pub fn set_api_key(&self, api_key: impl Into<String>) {
        self.engine.credential().set(api_key);
    }

    /// Returns the configuration, with the current API key.
    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            api_key: self.engine.credential().get(),
            ..self.config.clone()
        }
    }

    /// Returns true if the service is reachable within the connection timeout.
    pub fn ping(&self) -> bool {
        let engine = Arc::clone(&self.engine);
        let task = self.handle.spawn(async move { engine.ping().await });
        futures::executor::block_on(task).unwrap_or(false)
    }

    /// Request counters for this client.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.engine.metrics().snapshot()
    }

    /// Waits for every asynchronous operation and stops the background runtime.
    ///
    /// Dropping the client does the same.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.tracker.drain();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }

    fn call<Req, Resp>(&self, operation: Operation, request: Req) -> ApiResult<Resp>
    where
        Req: Message + 'static,
        Resp: Message + Default + 'static,
    {
        let engine = Arc::clone(&self.engine);
        let task = self
            .handle
            .spawn(async move { engine.execute::<Req, Resp>(operation, &request).await });
        futures::executor::block_on(task)
            .unwrap_or_else(|e| Err(ApiError::TaskFailed(e.to_string())))
    }

    fn call_async<Req, Resp>(&self, operation: Operation, request: Req) -> PendingResult<Resp>
    where
        Req: Message + 'static,
        Resp: Message + Default + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let engine = Arc::clone(&self.engine);
        let task = async move {
            let result = engine.execute::<Req, Resp>(operation, &request).await;
            // The caller may have dropped the handle; the work still counts.
            let _ = tx.send(result);
        };

        match self.tracker.spawn(&self.handle, task) {
            Ok(()) => PendingResult::new(rx, self.handle.clone()),
            Err(_) => {
                let (tx, rx) = oneshot::channel();
                let _ = tx.send(Err(ApiError::Shutdown));
                PendingResult::new(rx, self.handle.clone())
            }
        }
    }

    fn call_with_callback<Req, Resp, F>(&self, operation: Operation, request: Req, callback: F)
    where
        Req: Message + 'static,
        Resp: Message + Default + 'static,
        F: FnOnce(ApiResult<Resp>) + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        let task = async move {
            let result = engine.execute::<Req, Resp>(operation, &request).await;
            invoke_callback(&engine, operation, callback, result);
        };
        // A rejected task is dropped with its callback; the tracker logs it.
        let _ = self.tracker.spawn(&self.handle, task);
    }

    #[cfg(test)]
    fn lifecycle_state(&self) -> crate::lifecycle::LifecycleState {
        self.tracker.state()
    }
}

impl Drop for AscndClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for AscndClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AscndClient")
            .field("engine", &self.engine)
            .field("tracker", &self.tracker)
            .finish()
    }
}

fn build_runtime() -> std::io::Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(WORKER_THREADS)
        .thread_name("ascnd-worker")
        .enable_all()
        .build()
}

/// Runs a user callback, containing any panic it raises.
fn invoke_callback<T, F>(engine: &Engine, operation: Operation, callback: F, result: ApiResult<T>)
where
    F: FnOnce(ApiResult<T>),
{
    if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(move || callback(result))) {
        engine.metrics().inc_callback_faults();
        error!(
            operation = %operation,
            panic = panic_message(payload.as_ref()),
            "callback panicked"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
