//! # tryon-session
//!
//! Async client and session controller for server-side virtual try-on
//! image generation.
//!
//! Generation runs remotely and takes tens of seconds. A
//! [`SessionController`] starts the job, checks its status at a fixed
//! interval (never more than one request in flight), tracks progress and
//! the server's completion estimate, and stops cleanly on success, failure,
//! timeout or an explicit stop. State is published as a [`SessionView`]
//! through [`SessionController::state()`] and a watch channel.
//!
//! The HTTP side lives behind the [`TryOnApi`] trait, implemented by
//! [`TryOnClient`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use tryon_session::{
//!     GenerationRequest, SessionController, StaticToken, TryOnApi, TryOnClient,
//! };
//!
//! # async fn example() -> tryon_session::Result<()> {
//! let client = TryOnClient::new("https://wardrobe.example.com")
//!     .with_token_provider(StaticToken("id-token".into()));
//!
//! if !client.check_service_availability().await?.available {
//!     return Ok(());
//! }
//!
//! let controller = SessionController::new(client);
//! controller
//!     .start_generation(GenerationRequest::new("outfit-42").occasion("dinner"))
//!     .await;
//!
//! let mut updates = controller.subscribe();
//! while updates.changed().await.is_ok() {
//!     let view = updates.borrow_and_update().clone();
//!     println!("{}%", view.progress_percent);
//!     if view.is_settled() {
//!         break;
//!     }
//! }
//!
//! if controller.state().error().is_some() {
//!     controller.retry_generation().await;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod timer;
pub mod types;

pub use client::{StaticToken, TokenProvider, TryOnApi, TryOnClient};
pub use config::{ControllerConfig, ControllerConfigBuilder};
pub use controller::{Failure, FailureKind, SessionController, SessionView, TIMEOUT_MESSAGE};
pub use error::{Result, TryOnError};
pub use timer::PollTimer;
pub use types::{
    GenerationRequest, RateLimits, ServiceAvailability, SessionHistory, SessionSnapshot,
    StartResponse, TryOnContext, TryOnStatus, UsageStats,
};
