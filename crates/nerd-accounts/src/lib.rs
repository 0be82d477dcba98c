//! Account Rotation & Health Core: a disk-backed pool of upstream LLM
//! credentials with health scoring, admission control, and a
//! sticky/hybrid selection strategy.

pub mod bucket;
pub mod health;
pub mod manager;
pub mod quota;
pub mod selector;
pub mod store;

pub use bucket::{TokenBucketConfig, TokenBucketTracker};
pub use health::HealthTracker;
pub use manager::{AccountManager, AcquireError, Strategy};
pub use quota::quota_key;
pub use selector::{select, stats, AccountSnapshot, SelectionOutcome, SelectorStats};
pub use store::{AccountStore, AccountStoreError};
