//! # CS Test Utilities
//!
//! Shared test utilities for the conference service.
//!
//! This crate provides:
//! - Server test harness (`TestConferenceServer` for E2E tests)
//! - Polling assertion for work done after a webhook is acknowledged
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cs_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<()> {
//!     let server = TestConferenceServer::spawn().await?;
//!
//!     let status = server.post_message(ORGANIZER, "+19195551000").await?;
//!     assert_eq!(status, 200);
//!
//!     assert_eventually(SETTLE_TIMEOUT, || async {
//!         server.coordinator().snapshot().await.is_some()
//!     })
//!     .await
//!     .unwrap();
//!     Ok(())
//! }
//! ```

pub mod eventual;
pub mod server_harness;

// Re-export commonly used items
pub use eventual::*;
pub use server_harness::*;
