//! The voice session controller.
//!
//! Consumes voice-trigger events, owns the awaken/picking-up/mute state,
//! drives the two session timers, and brackets awaken windows with
//! pause/resume requests on the app activation stack. All events, timer
//! expirations, and auxiliary commands are serialized onto one queue
//! drained by a single task, so no two handlers ever race against the
//! shared session state or the stack.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use vesper_core::Lifetime;

use crate::error::{VoiceError, VoiceResult};
use crate::events::{NlpResult, VoiceEvent, NETWORK_ERROR_CODE_BASE};
use crate::services::{
    SessionServices, SystemFlow, AWAKE_EFFECT, GUIDE_CONFIG_NETWORK_SOUND, LOADING_EFFECT,
    NETWORK_LAG_SOUND, WIFI_CONNECTING_SOUND,
};
use crate::timers::{SessionTimer, TimerFired, TimerSet};

/// Default wait for ASR activity after a `voice-coming`.
pub const DEFAULT_SOLITARY_VOICE_COMING_TIMEOUT: Duration = Duration::from_millis(3000);
/// Default wait for voice input after recognition went pending.
pub const DEFAULT_NO_VOICE_INPUT_TIMEOUT: Duration = Duration::from_millis(6000);

/// Session tunables. `from_env` honors millisecond overrides via
/// `VESPER_SOLITARY_VOICE_COMING_TIMEOUT` and
/// `VESPER_NO_VOICE_INPUT_TIMEOUT`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub solitary_voice_coming_timeout: Duration,
    pub no_voice_input_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            solitary_voice_coming_timeout: DEFAULT_SOLITARY_VOICE_COMING_TIMEOUT,
            no_voice_input_timeout: DEFAULT_NO_VOICE_INPUT_TIMEOUT,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(timeout) = env_ms("VESPER_SOLITARY_VOICE_COMING_TIMEOUT") {
            config.solitary_voice_coming_timeout = timeout;
        }
        if let Some(timeout) = env_ms("VESPER_NO_VOICE_INPUT_TIMEOUT") {
            config.no_voice_input_timeout = timeout;
        }
        config
    }
}

fn env_ms(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_millis)
}

/// Recognition phase of the current utterance. Initial and terminal value
/// is `Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AsrState {
    Pending,
    Fake,
    #[default]
    Ended,
}

/// Diagnostic snapshot of the session state.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub muted: bool,
    pub awaken: bool,
    pub asr_state: AsrState,
    pub picking_up: bool,
    pub picking_up_discard_next: bool,
    pub solitary_timer_armed: bool,
    pub no_voice_input_timer_armed: bool,
    pub awakened_at: Option<DateTime<Utc>>,
}

enum SessionCommand {
    Event(VoiceEvent),
    SetPickup(bool),
    SetMuted {
        value: Option<bool>,
        reply: oneshot::Sender<bool>,
    },
    AddActivationWord {
        word: String,
        phonetic: String,
    },
    RemoveActivationWord {
        word: String,
    },
    Status(oneshot::Sender<SessionStatus>),
}

/// Cloneable facade over the session queue. Dropping every handle shuts the
/// session task down once the queue drains.
#[derive(Clone)]
pub struct VoiceSessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl VoiceSessionHandle {
    /// External entry point: event name plus optional payload. Names the
    /// core does not understand are logged and ignored.
    pub fn dispatch(&self, name: &str, payload: Option<serde_json::Value>) -> VoiceResult<()> {
        match VoiceEvent::from_wire(name, payload) {
            Some(event) => self.event(event),
            None => {
                info!(name, "skipping voice event with no handler");
                Ok(())
            }
        }
    }

    /// Enqueue an already-typed event.
    pub fn event(&self, event: VoiceEvent) -> VoiceResult<()> {
        self.send(SessionCommand::Event(event))
    }

    /// Toggle raw audio capture. Deactivating marks the next nlp result for
    /// discard; the hardware layer is notified either way.
    pub fn set_pickup(&self, active: bool) -> VoiceResult<()> {
        self.send(SessionCommand::SetPickup(active))
    }

    /// Set (or with `None`, toggle) microphone muting. Returns the new
    /// muted state.
    pub async fn set_muted(&self, value: Option<bool>) -> VoiceResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::SetMuted { value, reply })?;
        rx.await.map_err(|_| VoiceError::QueueClosed)
    }

    pub fn add_activation_word(&self, word: &str, phonetic: &str) -> VoiceResult<()> {
        self.send(SessionCommand::AddActivationWord {
            word: word.to_string(),
            phonetic: phonetic.to_string(),
        })
    }

    pub fn remove_activation_word(&self, word: &str) -> VoiceResult<()> {
        self.send(SessionCommand::RemoveActivationWord {
            word: word.to_string(),
        })
    }

    /// Snapshot of the session state, serialized through the queue so it
    /// observes a consistent point between handlers.
    pub async fn status(&self) -> VoiceResult<SessionStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Status(reply))?;
        rx.await.map_err(|_| VoiceError::QueueClosed)
    }

    fn send(&self, command: SessionCommand) -> VoiceResult<()> {
        self.commands
            .send(command)
            .map_err(|_| VoiceError::QueueClosed)
    }
}

/// The session state machine. Owned by its queue-draining task; construct
/// via [`VoiceSession::spawn`].
pub struct VoiceSession {
    life: Arc<Mutex<Lifetime>>,
    services: SessionServices,
    config: SessionConfig,
    timers: TimerSet,

    muted: bool,
    awaken: bool,
    asr_state: AsrState,
    picking_up: bool,
    picking_up_discard_next: bool,
    awakened_at: Option<DateTime<Utc>>,
}

impl VoiceSession {
    /// Spawn the session task over its serialized command queue.
    pub fn spawn(
        life: Arc<Mutex<Lifetime>>,
        services: SessionServices,
        config: SessionConfig,
    ) -> (VoiceSessionHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let session = VoiceSession {
            life,
            services,
            config,
            timers: TimerSet::new(fired_tx),
            muted: false,
            awaken: false,
            asr_state: AsrState::Ended,
            picking_up: false,
            picking_up_discard_next: false,
            awakened_at: None,
        };
        let join = tokio::spawn(session.run(command_rx, fired_rx));
        (VoiceSessionHandle { commands: command_tx }, join)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut fired: mpsc::UnboundedReceiver<TimerFired>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    // every handle dropped, session is over
                    None => break,
                },
                Some(expiry) = fired.recv() => self.handle_timer(expiry).await,
            }
        }
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Event(event) => self.handle_event(event).await,
            SessionCommand::SetPickup(active) => self.set_pickup(active),
            SessionCommand::SetMuted { value, reply } => {
                let muted = self.set_muted(value).await;
                let _ = reply.send(muted);
            }
            SessionCommand::AddActivationWord { word, phonetic } => {
                self.services.trigger.add_activation_word(&word, &phonetic);
            }
            SessionCommand::RemoveActivationWord { word } => {
                self.services.trigger.remove_activation_word(&word);
            }
            SessionCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
        }
    }

    async fn handle_event(&mut self, event: VoiceEvent) {
        if self.muted {
            warn!(event = event.name(), "microphone muted, rejecting voice event");
            return;
        }
        debug!(event = event.name(), "handling voice event");
        match event {
            VoiceEvent::VoiceComing => self.handle_voice_coming().await,
            // nothing to do on a local awake confirmation
            VoiceEvent::VoiceLocalAwake => {}
            VoiceEvent::AsrPending => self.handle_asr_pending(),
            VoiceEvent::AsrEnd => self.handle_asr_end().await,
            VoiceEvent::AsrFake => self.handle_asr_fake().await,
            VoiceEvent::StartVoice => self.picking_up = true,
            VoiceEvent::EndVoice => self.handle_end_voice().await,
            VoiceEvent::NlpResult(result) => self.handle_nlp_result(result).await,
            VoiceEvent::MaliciousNlpResult => self.handle_malicious_nlp().await,
            VoiceEvent::SpeechError { code } => self.handle_speech_error(code).await,
        }
    }

    async fn handle_timer(&mut self, fired: TimerFired) {
        if !self.timers.accept(fired) {
            debug!(timer = ?fired.timer, "dropping stale timer expiry");
            return;
        }
        match fired.timer {
            SessionTimer::SolitaryVoiceComing => {
                warn!("solitary voice-coming detected, resetting awaken");
                self.set_pickup(false);
                self.reset_awaken(true).await;
            }
            SessionTimer::NoVoiceInput => {
                warn!("no more voice input detected, closing pickup");
                self.set_pickup(false);
            }
        }
    }

    async fn handle_voice_coming(&mut self) {
        if !self.services.network.is_ready() {
            warn!("network not ready, taking degraded voice-coming path");
            self.set_pickup(false);
            self.handle_voice_coming_offline().await;
            return;
        }

        self.set_awaken().await;
        self.timers.arm(
            SessionTimer::SolitaryVoiceComing,
            self.config.solitary_voice_coming_timeout,
        );

        if self.services.updates.is_pending() {
            // the staged update starts however the awaken pause settled
            if let Err(err) = self.services.updates.start().await {
                error!(error = %err, "failed to start pending system update");
            }
        }

        // allow the next nlp result through
        self.picking_up_discard_next = false;
    }

    /// Degraded `voice-coming` path. `awaken` is never set here, so paused
    /// media is recovered directly where applicable.
    async fn handle_voice_coming_offline(&mut self) {
        if self.services.network.is_configuring() {
            info!("configuring network, renewing the network flow");
            self.open_flow(SystemFlow::NetworkRenew).await;
            return;
        }

        if self.services.network.history_count() == 0 {
            if self.current_app_id().await.is_some() {
                // an app is running with nothing to connect to; guide the
                // user without tearing it down
                info!("no stored network credentials, continuing current app");
                if let Err(err) = self
                    .services
                    .feedback
                    .tts_sound(GUIDE_CONFIG_NETWORK_SOUND)
                    .await
                {
                    warn!(error = %err, "failed to play network guide sound");
                }
                self.recover_paused().await;
                return;
            }
            info!("no stored network credentials, opening device setup");
            self.open_flow(SystemFlow::NetworkSetup).await;
            return;
        }

        info!("stored network known, announcing reconnection");
        self.services.network.enable_passive_scan();
        if let Err(err) = self.services.feedback.tts_sound(WIFI_CONNECTING_SOUND).await {
            warn!(error = %err, "failed to play reconnect notice");
        }
        self.recover_paused().await;
    }

    fn handle_asr_pending(&mut self) {
        self.asr_state = AsrState::Pending;
        self.timers.disarm(SessionTimer::SolitaryVoiceComing);
        self.timers
            .arm(SessionTimer::NoVoiceInput, self.config.no_voice_input_timeout);
    }

    async fn handle_asr_end(&mut self) {
        self.asr_state = AsrState::Ended;
        self.timers.disarm(SessionTimer::NoVoiceInput);
        // the command handler owns recovery once a result is on its way
        self.reset_awaken(false).await;

        if self.picking_up_discard_next {
            // this pickup was manually cancelled, show no loading state
            return;
        }
        if let Err(err) = self.services.feedback.play(LOADING_EFFECT).await {
            warn!(error = %err, "failed to show loading effect");
        }
    }

    async fn handle_asr_fake(&mut self) {
        self.asr_state = AsrState::Fake;
        self.timers.disarm(SessionTimer::NoVoiceInput);
        self.reset_awaken(true).await;
    }

    async fn handle_end_voice(&mut self) {
        self.picking_up = false;
        info!(asr = ?self.asr_state, "end of voice");
        if self.asr_state == AsrState::Ended {
            return;
        }
        if self.awaken {
            // voice ended without any asr conclusion, give the session back
            self.reset_awaken(true).await;
        }
    }

    async fn handle_nlp_result(&mut self, result: NlpResult) {
        if self.picking_up_discard_next {
            self.picking_up_discard_next = false;
            warn!(asr = %result.asr, "discarding nlp result for cancelled pickup");
            return;
        }

        if self.services.speaker.is_muted() && !self.services.speaker.is_volume_intent(&result.nlp)
        {
            // volume intents depend on current speaker state; everything
            // else needs the speaker audible again
            self.services.speaker.unmute();
        }

        if self.awaken {
            self.reset_awaken(false).await;
        }

        match self
            .services
            .dispatcher
            .dispatch(&result.asr, &result.nlp, &result.action)
            .await
        {
            Ok(true) => {
                self.stop_loading().await;
            }
            Ok(false) => {
                self.stop_loading().await;
                // every handler rejected the command; put paused playback back
                self.recover_paused().await;
            }
            Err(err) => {
                self.stop_loading().await;
                error!(error = %err, "unexpected error handling nlp result");
            }
        }
    }

    async fn handle_malicious_nlp(&mut self) {
        if self.awaken {
            // arrived before asr-end / end-voice; recover playback directly,
            // no exception flow needed
            self.reset_awaken(true).await;
            return;
        }
        if !self.services.network.is_ready() {
            warn!("network not ready, skipping malicious nlp result");
            return;
        }
        self.open_flow(SystemFlow::MaliciousNlp).await;
        self.stop_loading().await;
    }

    async fn handle_speech_error(&mut self, code: u32) {
        if self.awaken {
            self.reset_awaken(true).await;
            return;
        }
        if !self.services.network.is_ready() {
            warn!(code, "network not ready, skipping speech error");
            return;
        }

        if code >= NETWORK_ERROR_CODE_BASE {
            // degraded-network notice, then recover playback however the
            // notice itself fared
            if let Err(err) = self.services.feedback.tts_sound(NETWORK_LAG_SOUND).await {
                error!(error = %err, "failed to play network lag notice");
            }
            self.recover_paused().await;
            return;
        }

        self.open_flow(SystemFlow::SpeechError { code }).await;
        self.stop_loading().await;
    }

    /// Take exclusive foreground attention: mark awaken and pause the
    /// activation stack so no app preemption lands mid-session.
    async fn set_awaken(&mut self) {
        if self.awaken {
            warn!("session already awaken");
        }
        self.awaken = true;
        self.awakened_at = Some(Utc::now());

        let mut life = self.life.lock().await;
        info!(current = ?life.current_app_id(), "awaken, pausing app lifetime");
        life.pause_lifetime();
    }

    /// Reverse the awaken pause: stop the awake effect, resume the stack,
    /// and with `recover` also resume previously paused speech/media.
    /// Returns immediately with no collaborator calls when not awaken.
    async fn reset_awaken(&mut self, recover: bool) {
        if !self.awaken {
            debug!("session was not awaken, skipping reset");
            return;
        }
        self.awaken = false;
        self.awakened_at = None;
        info!(recover, "reset awaken");

        if let Err(err) = self.services.feedback.stop(AWAKE_EFFECT).await {
            warn!(error = %err, "failed to stop awake effect");
        }
        self.life.lock().await.resume_lifetime(recover).await;

        if recover {
            self.recover_paused().await;
        }
    }

    /// Best-effort resume of speech/media paused for the awaken window.
    /// Failures are logged, never propagated.
    async fn recover_paused(&mut self) {
        let current = self.current_app_id().await;
        let current = current.as_deref();
        info!(app = ?current, "recovering previously paused speech/media");
        if let Err(err) = self.services.recovery.resume_speech(current).await {
            warn!(error = %err, "speech recovery failed");
        }
        if let Err(err) = self.services.recovery.resume_media(current).await {
            warn!(error = %err, "media recovery failed");
        }
    }

    async fn current_app_id(&self) -> Option<String> {
        self.life.lock().await.current_app_id().map(str::to_owned)
    }

    async fn open_flow(&mut self, flow: SystemFlow) {
        if let Err(err) = self.services.flows.open(flow).await {
            error!(?flow, error = %err, "failed to open system flow");
        }
    }

    async fn stop_loading(&mut self) {
        if let Err(err) = self.services.feedback.stop(LOADING_EFFECT).await {
            warn!(error = %err, "failed to stop loading effect");
        }
    }

    fn set_pickup(&mut self, active: bool) {
        // cancelling a pickup discards the nlp result already in flight
        self.picking_up_discard_next = !active;
        self.services.trigger.set_pickup(active);
    }

    async fn set_muted(&mut self, value: Option<bool>) -> bool {
        let muted = value.unwrap_or(!self.muted);
        self.muted = muted;
        self.services.trigger.set_mute(muted);

        if muted && self.asr_state == AsrState::Pending {
            // the mic went away mid-recognition, give the session back in full
            self.reset_awaken(true).await;
        }
        self.muted
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            muted: self.muted,
            awaken: self.awaken,
            asr_state: self.asr_state,
            picking_up: self.picking_up,
            picking_up_discard_next: self.picking_up_discard_next,
            solitary_timer_armed: self.timers.is_armed(SessionTimer::SolitaryVoiceComing),
            no_voice_input_timer_armed: self.timers.is_armed(SessionTimer::NoVoiceInput),
            awakened_at: self.awakened_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use vesper_core::{AppRegistration, PlaceholderExecutor};

    fn empty_lifetime() -> Arc<Mutex<Lifetime>> {
        let executor = Arc::new(PlaceholderExecutor);
        let mut registry = HashMap::new();
        registry.insert("player".to_string(), AppRegistration::new(executor));
        Arc::new(Mutex::new(Lifetime::new(registry)))
    }

    #[test]
    fn config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.solitary_voice_coming_timeout, Duration::from_millis(3000));
        assert_eq!(config.no_voice_input_timeout, Duration::from_millis(6000));
    }

    #[tokio::test]
    async fn set_muted_defaults_to_toggle() {
        let (session, _join) = VoiceSession::spawn(
            empty_lifetime(),
            SessionServices::placeholder(),
            SessionConfig::default(),
        );
        assert!(session.set_muted(None).await.unwrap());
        assert!(!session.set_muted(None).await.unwrap());
        assert!(session.set_muted(Some(true)).await.unwrap());
        assert!(session.set_muted(Some(true)).await.unwrap());
    }

    #[tokio::test]
    async fn muted_session_rejects_events() {
        let (session, _join) = VoiceSession::spawn(
            empty_lifetime(),
            SessionServices::placeholder(),
            SessionConfig::default(),
        );
        session.set_muted(Some(true)).await.unwrap();
        session.dispatch("voice-coming", None).unwrap();

        let status = session.status().await.unwrap();
        assert!(!status.awaken);
        assert!(!status.solitary_timer_armed);
    }

    #[tokio::test]
    async fn unknown_event_names_are_ignored() {
        let (session, _join) = VoiceSession::spawn(
            empty_lifetime(),
            SessionServices::placeholder(),
            SessionConfig::default(),
        );
        session.dispatch("tts-progress", None).unwrap();
        let status = session.status().await.unwrap();
        assert!(!status.awaken);
    }

    #[tokio::test]
    async fn start_and_end_voice_toggle_pickup() {
        let (session, _join) = VoiceSession::spawn(
            empty_lifetime(),
            SessionServices::placeholder(),
            SessionConfig::default(),
        );
        session.dispatch("start-voice", None).unwrap();
        assert!(session.status().await.unwrap().picking_up);
        session.dispatch("end-voice", None).unwrap();
        assert!(!session.status().await.unwrap().picking_up);
    }
}
