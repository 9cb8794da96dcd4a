//! Client-side state of the GM portal: wallet bridge, greeting feed,
//! submission flow, and the [`Portal`] context that keeps them in step
//! with the chain.

pub mod bridge;
pub mod config;
pub mod feed;
pub mod hooks;
pub mod portal;
pub mod submission;

pub use bridge::{AuthorizationStatus, WalletBridge};
pub use config::PortalConfig;
pub use feed::{FeedPolicy, GreetingFeed};
pub use hooks::{ErrorHook, PortalError, PortalOperation, UpdateHook};
pub use portal::{Portal, PortalSnapshot};
pub use submission::{SubmissionError, SubmissionFlow, SubmissionState};
