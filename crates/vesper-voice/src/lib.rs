//! # Vesper Voice - Session Core
//!
//! This crate implements the voice interaction session of the Vesper runtime:
//! a single-task state machine that turns wake/ASR events into awaken windows,
//! tracks the two session timers, and brackets each window with a pause and
//! resume of the app activation stack in `vesper-core`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Voice Session                           │
//! │  ┌──────────────┐  ┌───────────────┐  ┌──────────────────┐  │
//! │  │ Wire Events  │→ │ Command Queue │→ │ Session Handlers │  │
//! │  │ (from_wire)  │  │ (one drainer) │  │ (awaken machine) │  │
//! │  └──────────────┘  └───────────────┘  └──────────────────┘  │
//! │         ↑                  ↑                    ↓            │
//! │  ┌──────────────┐  ┌───────────────┐  ┌──────────────────┐  │
//! │  │  Timer Set   │→─│  TimerFired   │  │  Lifetime pause  │  │
//! │  │ (generations)│  │   (tagged)    │  │  / resume        │  │
//! │  └──────────────┘  └───────────────┘  └──────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod events;
pub mod services;
pub mod session;
pub mod startup;
pub mod timers;

pub use error::{VoiceError, VoiceResult};
pub use events::{NlpResult, VoiceEvent, NETWORK_ERROR_CODE_BASE};
pub use services::{
    CommandDispatcher, FeedbackSink, FlowLauncher, NetworkReadiness, PlaybackRecovery,
    SessionServices, SpeakerControl, SystemFlow, UpdateGate, VoiceTriggerBus,
};
pub use session::{AsrState, SessionConfig, SessionStatus, VoiceSession, VoiceSessionHandle};
pub use startup::{write_startup_flag, STARTUP_FLAG_FILE};
pub use timers::{SessionTimer, TimerSet};
