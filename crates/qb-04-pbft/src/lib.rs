//! # qb-04-pbft
//!
//! Four-phase PBFT agreement over blocks, with every protocol message
//! authenticated by a USS signature.
//!
//! ## Round Flow
//!
//! ```text
//! request ─→ [primary] pre_prepare ─PrePrepare─→ [backups] prepare
//!                                                     │
//!            ┌────────────────Prepare─────────────────┘
//!            ↓
//!   commit (2F prepares) ─Commit─→ reply (2F+1 commits) ─Reply─→ origin
//! ```
//!
//! Each transition either returns an error (message dropped, state
//! untouched) or a [`Progress`] outcome. Waiting for quorum and repeated
//! emission are outcomes, not errors.
//!
//! ## Limitations
//!
//! There is no view change and no round timeout. A round that never gathers
//! a quorum stalls until the process restarts.

pub mod domain;

pub use domain::{
    preprepare_signing_message, reply_signing_message, vote_signing_message, CommitMsg,
    ConsensusState, MessageLogs, PbftConfig, PbftError, PbftResult, PrePrepareMsg, PrepareMsg,
    Progress, ReplyCollector, ReplyMsg, ReplyStatus, Stage,
};
