//! Application services: the feed engine and the operations around it.

pub mod conditional;
pub mod error;
pub mod fingerprint;
pub mod notifier;
pub mod pagination;
pub mod photos;
pub mod repos;
pub mod search;
pub mod session;
pub mod stream;
