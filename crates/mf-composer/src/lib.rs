//! # mf-composer
//!
//! The orchestrator callers talk to. [`Composer`] checks every request,
//! resolves the profile (and the layout, for composites) and submits one task
//! to the execution layer. Submission never waits for completion; pair it
//! with [`mf_jobs::CompletionBarrier`] for that.
//!
//! [`FfmpegWorker`] is the production [`mf_jobs::TaskWorker`]: it fetches
//! inputs from an [`AssetStore`], runs ffmpeg in a scratch workspace, stores
//! and inspects the outputs.

pub mod composer;
pub mod store;
pub mod worker;

pub use composer::{CompositeElement, Composer};
pub use store::{AssetStore, FsAssetStore};
pub use worker::FfmpegWorker;
