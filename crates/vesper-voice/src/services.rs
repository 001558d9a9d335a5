//! Collaborator seams of the session controller.
//!
//! The controller consumes these interfaces but never owns their state:
//! network readiness probing, visual/audible feedback, speaker gating,
//! command dispatch, playback recovery, the fire-and-forget voice-trigger
//! bus, system recovery flows, and the staged-update gate. Each trait ships
//! with a `Placeholder*` implementation so the session can run (and be
//! tested) without any of the real device services.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::VoiceResult;

/// Visual effect shown while the device is awaken.
pub const AWAKE_EFFECT: &str = "system://awake";
/// Visual effect shown while a recognized command is being handled.
pub const LOADING_EFFECT: &str = "system://loading";
/// Spoken guide prompting the user to configure the network.
pub const GUIDE_CONFIG_NETWORK_SOUND: &str = "system://guide_config_network.ogg";
/// Notice played while a known network is reconnecting.
pub const WIFI_CONNECTING_SOUND: &str = "system://wifi_is_connecting.ogg";
/// Notice played when the speech service reports a network-class error.
pub const NETWORK_LAG_SOUND: &str = "system://network_lag_common.ogg";

/// Recovery and exception flows the controller can open on the app runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemFlow {
    /// The network app is mid-configuration; renew its interaction window.
    NetworkRenew,
    /// No stored credentials; walk the user through device setup.
    NetworkSetup,
    /// A malicious recognition result needs the exception handler.
    MaliciousNlp,
    /// Speech service fault, keyed by its error code.
    SpeechError { code: u32 },
}

/// Network-readiness probe.
pub trait NetworkReadiness: Send + Sync {
    /// Connected and logged in.
    fn is_ready(&self) -> bool;
    /// A network-configuration flow is currently in progress.
    fn is_configuring(&self) -> bool;
    /// Number of stored network credentials.
    fn history_count(&self) -> usize;
    /// Kick a passive scan for known networks. Fire-and-forget.
    fn enable_passive_scan(&self) {}
}

/// Visual/audible feedback sink (light effects and one-shot sounds).
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn play(&self, effect: &str) -> VoiceResult<()>;
    async fn stop(&self, effect: &str) -> VoiceResult<()>;
    /// Play a one-shot system sound; resolves when playback is accepted.
    async fn tts_sound(&self, sound: &str) -> VoiceResult<()>;
}

/// Speaker volume gating.
pub trait SpeakerControl: Send + Sync {
    fn is_muted(&self) -> bool;
    fn unmute(&self);
    /// Whether `intent` controls the speaker volume itself (such intents
    /// depend on the current mute state and must not trigger an unmute).
    fn is_volume_intent(&self, intent: &Value) -> bool;
}

/// Turns a recognized intent into an app invocation.
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    /// `Ok(true)` when an app accepted the command, `Ok(false)` when every
    /// handler rejected it.
    async fn dispatch(&self, asr: &str, intent: &Value, action: &Value) -> VoiceResult<bool>;
}

/// Best-effort resume of speech/media paused for an awaken window.
#[async_trait]
pub trait PlaybackRecovery: Send + Sync {
    async fn resume_speech(&self, app_id: Option<&str>) -> VoiceResult<()>;
    async fn resume_media(&self, app_id: Option<&str>) -> VoiceResult<()>;
}

/// Fire-and-forget notifications to the voice-trigger hardware layer.
/// No acknowledgement is awaited.
pub trait VoiceTriggerBus: Send + Sync {
    fn set_pickup(&self, active: bool);
    fn set_mute(&self, muted: bool);
    fn add_activation_word(&self, word: &str, phonetic: &str);
    fn remove_activation_word(&self, word: &str);
}

/// Opens system recovery/exception flows on the app runtime.
#[async_trait]
pub trait FlowLauncher: Send + Sync {
    async fn open(&self, flow: SystemFlow) -> VoiceResult<()>;
}

/// Gate for a staged system update waiting for an idle window.
#[async_trait]
pub trait UpdateGate: Send + Sync {
    fn is_pending(&self) -> bool;
    async fn start(&self) -> VoiceResult<()>;
}

/// The full set of collaborators handed to the session controller.
#[derive(Clone)]
pub struct SessionServices {
    pub network: Arc<dyn NetworkReadiness>,
    pub feedback: Arc<dyn FeedbackSink>,
    pub speaker: Arc<dyn SpeakerControl>,
    pub dispatcher: Arc<dyn CommandDispatcher>,
    pub recovery: Arc<dyn PlaybackRecovery>,
    pub trigger: Arc<dyn VoiceTriggerBus>,
    pub flows: Arc<dyn FlowLauncher>,
    pub updates: Arc<dyn UpdateGate>,
}

impl SessionServices {
    /// All-placeholder services: network ready, speaker audible, every call
    /// accepted. Useful for tests and for bringing a session up before the
    /// real device services are wired in.
    pub fn placeholder() -> Self {
        Self {
            network: Arc::new(PlaceholderNetwork::default()),
            feedback: Arc::new(PlaceholderFeedback),
            speaker: Arc::new(PlaceholderSpeaker::default()),
            dispatcher: Arc::new(PlaceholderDispatcher::default()),
            recovery: Arc::new(PlaceholderRecovery),
            trigger: Arc::new(PlaceholderTriggerBus),
            flows: Arc::new(PlaceholderFlowLauncher),
            updates: Arc::new(PlaceholderUpdateGate),
        }
    }
}

/// Placeholder readiness probe. Ready by default; flip the fields to walk
/// the degraded branches.
#[derive(Debug)]
pub struct PlaceholderNetwork {
    pub ready: AtomicBool,
    pub configuring: AtomicBool,
    pub history: AtomicUsize,
}

impl Default for PlaceholderNetwork {
    fn default() -> Self {
        Self {
            ready: AtomicBool::new(true),
            configuring: AtomicBool::new(false),
            history: AtomicUsize::new(1),
        }
    }
}

impl NetworkReadiness for PlaceholderNetwork {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    fn is_configuring(&self) -> bool {
        self.configuring.load(Ordering::Relaxed)
    }

    fn history_count(&self) -> usize {
        self.history.load(Ordering::Relaxed)
    }
}

/// Placeholder feedback sink that accepts every effect.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderFeedback;

#[async_trait]
impl FeedbackSink for PlaceholderFeedback {
    async fn play(&self, _effect: &str) -> VoiceResult<()> {
        Ok(())
    }

    async fn stop(&self, _effect: &str) -> VoiceResult<()> {
        Ok(())
    }

    async fn tts_sound(&self, _sound: &str) -> VoiceResult<()> {
        Ok(())
    }
}

/// Placeholder speaker: audible unless muted via the field.
#[derive(Debug, Default)]
pub struct PlaceholderSpeaker {
    pub muted: AtomicBool,
}

impl SpeakerControl for PlaceholderSpeaker {
    fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    fn unmute(&self) {
        self.muted.store(false, Ordering::Relaxed);
    }

    fn is_volume_intent(&self, intent: &Value) -> bool {
        intent
            .get("intent")
            .and_then(Value::as_str)
            .is_some_and(|name| name.starts_with("volume"))
    }
}

/// Placeholder dispatcher: reports the configured outcome for every command.
#[derive(Debug)]
pub struct PlaceholderDispatcher {
    pub accept: AtomicBool,
}

impl Default for PlaceholderDispatcher {
    fn default() -> Self {
        Self {
            accept: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl CommandDispatcher for PlaceholderDispatcher {
    async fn dispatch(&self, _asr: &str, _intent: &Value, _action: &Value) -> VoiceResult<bool> {
        Ok(self.accept.load(Ordering::Relaxed))
    }
}

/// Placeholder recovery that accepts every resume request.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderRecovery;

#[async_trait]
impl PlaybackRecovery for PlaceholderRecovery {
    async fn resume_speech(&self, _app_id: Option<&str>) -> VoiceResult<()> {
        Ok(())
    }

    async fn resume_media(&self, _app_id: Option<&str>) -> VoiceResult<()> {
        Ok(())
    }
}

/// Placeholder trigger bus that drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderTriggerBus;

impl VoiceTriggerBus for PlaceholderTriggerBus {
    fn set_pickup(&self, _active: bool) {}
    fn set_mute(&self, _muted: bool) {}
    fn add_activation_word(&self, _word: &str, _phonetic: &str) {}
    fn remove_activation_word(&self, _word: &str) {}
}

/// Placeholder flow launcher that accepts every flow.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderFlowLauncher;

#[async_trait]
impl FlowLauncher for PlaceholderFlowLauncher {
    async fn open(&self, _flow: SystemFlow) -> VoiceResult<()> {
        Ok(())
    }
}

/// Placeholder update gate with no update staged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderUpdateGate;

#[async_trait]
impl UpdateGate for PlaceholderUpdateGate {
    fn is_pending(&self) -> bool {
        false
    }

    async fn start(&self) -> VoiceResult<()> {
        Ok(())
    }
}
