//! Request and response messages of the Ascnd leaderboard service.
//!
//! These are protobuf messages; the field tags match the `ascnd.v1` schema.

/// Request to submit a score to a leaderboard.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubmitScoreRequest {
    /// The leaderboard to submit the score to.
    #[prost(string, tag = "1")]
    pub leaderboard_id: String,
    /// The player's unique identifier.
    #[prost(string, tag = "2")]
    pub player_id: String,
    /// The score value.
    #[prost(int64, tag = "3")]
    pub score: i64,
    /// Game-specific data, usually JSON.
    #[prost(string, optional, tag = "4")]
    pub metadata: Option<String>,
    /// Key the server uses to drop duplicate submissions.
    #[prost(string, optional, tag = "5")]
    pub idempotency_key: Option<String>,
}

impl SubmitScoreRequest {
    /// Creates a request with only the required fields set.
    pub fn new(
        leaderboard_id: impl Into<String>,
        player_id: impl Into<String>,
        score: i64,
    ) -> Self {
        Self {
            leaderboard_id: leaderboard_id.into(),
            player_id: player_id.into(),
            score,
            ..Default::default()
        }
    }

    /// Attaches metadata.
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    /// Attaches an idempotency key.
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Request for a page of leaderboard entries.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetLeaderboardRequest {
    /// The leaderboard to retrieve.
    #[prost(string, tag = "1")]
    pub leaderboard_id: String,
    /// Maximum number of entries (server default 10, max 100).
    #[prost(int32, optional, tag = "2")]
    pub limit: Option<i32>,
    /// Number of entries to skip.
    #[prost(int32, optional, tag = "3")]
    pub offset: Option<i32>,
    /// `"current"`, `"previous"`, or a timestamp.
    #[prost(string, optional, tag = "4")]
    pub period: Option<String>,
}

impl GetLeaderboardRequest {
    /// Creates a request for the given leaderboard with server defaults.
    pub fn new(leaderboard_id: impl Into<String>) -> Self {
        Self {
            leaderboard_id: leaderboard_id.into(),
            ..Default::default()
        }
    }

    /// Sets the page size.
    pub fn with_limit(mut self, limit: i32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the page offset.
    pub fn with_offset(mut self, offset: i32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Selects a period.
    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = Some(period.into());
        self
    }
}

/// Request for one player's rank.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPlayerRankRequest {
    /// The leaderboard to query.
    #[prost(string, tag = "1")]
    pub leaderboard_id: String,
    /// The player's unique identifier.
    #[prost(string, tag = "2")]
    pub player_id: String,
    /// `"current"`, `"previous"`, or a timestamp.
    #[prost(string, optional, tag = "3")]
    pub period: Option<String>,
}

impl GetPlayerRankRequest {
    /// Creates a request for the given leaderboard and player.
    pub fn new(leaderboard_id: impl Into<String>, player_id: impl Into<String>) -> Self {
        Self {
            leaderboard_id: leaderboard_id.into(),
            player_id: player_id.into(),
            period: None,
        }
    }

    /// Selects a period.
    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = Some(period.into());
        self
    }
}

/// Result of a score submission.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubmitScoreResponse {
    /// Identifier of the stored score.
    #[prost(string, tag = "1")]
    pub score_id: String,
    /// The player's rank after this submission.
    #[prost(int32, tag = "2")]
    pub rank: i32,
    /// Whether this is the player's best score for the period.
    #[prost(bool, tag = "3")]
    pub is_new_best: bool,
    /// Whether the server recognised the submission as a duplicate.
    #[prost(bool, tag = "4")]
    pub was_deduplicated: bool,
}

/// A single leaderboard row.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LeaderboardEntry {
    /// 1-indexed rank.
    #[prost(int32, tag = "1")]
    pub rank: i32,
    /// The player's unique identifier.
    #[prost(string, tag = "2")]
    pub player_id: String,
    /// The player's score.
    #[prost(int64, tag = "3")]
    pub score: i64,
    /// Submission time, ISO 8601.
    #[prost(string, tag = "4")]
    pub submitted_at: String,
    /// Metadata stored with the score.
    #[prost(string, optional, tag = "5")]
    pub metadata: Option<String>,
}

/// A page of leaderboard entries.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetLeaderboardResponse {
    /// Entries in rank order.
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<LeaderboardEntry>,
    /// Approximate total number of entries.
    #[prost(int32, tag = "2")]
    pub total_entries: i32,
    /// Whether more entries follow this page.
    #[prost(bool, tag = "3")]
    pub has_more: bool,
    /// Start of the period, ISO 8601.
    #[prost(string, tag = "4")]
    pub period_start: String,
    /// End of the period, ISO 8601, if bounded.
    #[prost(string, optional, tag = "5")]
    pub period_end: Option<String>,
}

/// A player's standing on a leaderboard.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPlayerRankResponse {
    /// Rank, absent if the player has no score.
    #[prost(int32, optional, tag = "1")]
    pub rank: Option<i32>,
    /// Current score, absent if the player has no score.
    #[prost(int64, optional, tag = "2")]
    pub score: Option<i64>,
    /// Best score this period.
    #[prost(int64, optional, tag = "3")]
    pub best_score: Option<i64>,
    /// Total number of entries on the leaderboard.
    #[prost(int32, tag = "4")]
    pub total_entries: i32,
    /// Percentile label, e.g. `"top 5%"`.
    #[prost(string, optional, tag = "5")]
    pub percentile: Option<String>,
}

impl GetPlayerRankResponse {
    /// Whether the player appears on the leaderboard at all.
    pub fn is_ranked(&self) -> bool {
        self.rank.is_some()
    }
}
