//! Typed client for the code forge REST API (GitHub-compatible).
//!
//! The client signs an RS256 app JWT, exchanges it for a short-lived
//! installation token, and exposes the handful of issue/PR operations the
//! relay pipeline needs. The installation token is minted lazily, at most
//! once per inbound request, on a [`ForgeSession`].
//!
//! The client never retries: callers decide whether a failed call aborts
//! their pipeline or triggers a fallback.

pub mod app_token;
pub mod forge_client;

pub use app_token::{mint_app_jwt, AppTokenClaims};
pub use forge_client::{
    ForgeClient, ForgeClientConfig, ForgeComment, ForgeCommentCreated, ForgeError, ForgeIssue,
    ForgeSession, RepoRef, COMMENTS_PAGE_SIZE,
};
