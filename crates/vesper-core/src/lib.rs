//! # Vesper Core - App Activation Stack
//!
//! Arbitration of which application instance owns the user's attention on a
//! single-session voice device. The stack tracks running executor
//! instances, an ordered foreground stack, and a background set, with
//! daemon and keep-alive semantics deciding the fate of preempted or
//! deactivated apps.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                       Lifetime                        │
//! │  registry ──create──▶ inactive ──activate──▶ stack    │
//! │                          │                    │       │
//! │                          │   deactivate/      ▼       │
//! │                          │   preemption   background  │
//! │                          └──────destroy──────┘        │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! The voice session controller (vesper-voice) brackets awaken windows with
//! [`Lifetime::pause_lifetime`] / [`Lifetime::resume_lifetime`].

pub mod app;
pub mod error;
pub mod lifetime;

pub use app::{AppExecutor, AppInstance, AppRegistration, ContextOptions, PlaceholderExecutor};
pub use error::{CoreResult, LifetimeError};
pub use lifetime::{Lifetime, DEFAULT_FORM};
