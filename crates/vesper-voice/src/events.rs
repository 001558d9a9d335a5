//! Wire events consumed by the voice session controller.
//!
//! The hardware layer delivers events as a name plus an optional JSON
//! payload; [`VoiceEvent::from_wire`] maps them onto a closed sum type so
//! the dispatch in the controller is exhaustive by construction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Speech error codes at or above this value denote network-class faults.
pub const NETWORK_ERROR_CODE_BASE: u32 = 100;

/// A recognized voice command as delivered by the speech service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NlpResult {
    /// Raw transcript of the utterance.
    #[serde(default)]
    pub asr: String,
    /// Recognized intent, opaque to the session core.
    #[serde(default)]
    pub nlp: Value,
    /// Action payload forwarded to the command dispatcher.
    #[serde(default)]
    pub action: Value,
}

/// The closed set of events the session controller understands.
#[derive(Debug, Clone)]
pub enum VoiceEvent {
    /// Wake word detected; an awaken session may begin.
    VoiceComing,
    /// Local wake confirmation; explicitly a no-op.
    VoiceLocalAwake,
    /// Recognition of an utterance has started.
    AsrPending,
    /// Recognition concluded with a transcript on its way.
    AsrEnd,
    /// Recognition concluded as a false wake.
    AsrFake,
    /// Raw audio capture started.
    StartVoice,
    /// Raw audio capture ended.
    EndVoice,
    /// A recognized command arrived.
    NlpResult(NlpResult),
    /// An unexpected malicious recognition result arrived.
    MaliciousNlpResult,
    /// The speech service reported a fault.
    SpeechError { code: u32 },
}

impl VoiceEvent {
    /// Map an external event name and optional payload onto the closed set.
    /// Returns `None` for names this core does not understand.
    pub fn from_wire(name: &str, payload: Option<Value>) -> Option<Self> {
        let event = match name {
            "voice-coming" => VoiceEvent::VoiceComing,
            "voice-local-awake" => VoiceEvent::VoiceLocalAwake,
            "asr-pending" => VoiceEvent::AsrPending,
            "asr-end" => VoiceEvent::AsrEnd,
            "asr-fake" => VoiceEvent::AsrFake,
            "start-voice" => VoiceEvent::StartVoice,
            "end-voice" => VoiceEvent::EndVoice,
            "nlp-result" => {
                let result = payload
                    .and_then(|value| serde_json::from_value(value).ok())
                    .unwrap_or_default();
                VoiceEvent::NlpResult(result)
            }
            "malicious-nlp-result" => VoiceEvent::MaliciousNlpResult,
            "speech-error" => {
                let code = payload.as_ref().and_then(Value::as_u64).unwrap_or(0) as u32;
                VoiceEvent::SpeechError { code }
            }
            _ => return None,
        };
        Some(event)
    }

    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            VoiceEvent::VoiceComing => "voice-coming",
            VoiceEvent::VoiceLocalAwake => "voice-local-awake",
            VoiceEvent::AsrPending => "asr-pending",
            VoiceEvent::AsrEnd => "asr-end",
            VoiceEvent::AsrFake => "asr-fake",
            VoiceEvent::StartVoice => "start-voice",
            VoiceEvent::EndVoice => "end-voice",
            VoiceEvent::NlpResult(_) => "nlp-result",
            VoiceEvent::MaliciousNlpResult => "malicious-nlp-result",
            VoiceEvent::SpeechError { .. } => "speech-error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_wire_maps_every_known_name() {
        let names = [
            "voice-coming",
            "voice-local-awake",
            "asr-pending",
            "asr-end",
            "asr-fake",
            "start-voice",
            "end-voice",
            "nlp-result",
            "malicious-nlp-result",
            "speech-error",
        ];
        for name in names {
            let event = VoiceEvent::from_wire(name, None)
                .unwrap_or_else(|| panic!("{name} shall be recognized"));
            assert_eq!(event.name(), name);
        }
    }

    #[test]
    fn from_wire_ignores_unknown_names() {
        assert!(VoiceEvent::from_wire("tts-progress", None).is_none());
        assert!(VoiceEvent::from_wire("", None).is_none());
    }

    #[test]
    fn nlp_payload_is_parsed() {
        let payload = json!({
            "asr": "play some jazz",
            "nlp": { "intent": "play_music" },
            "action": { "target": "cloud-player" },
        });
        let event = VoiceEvent::from_wire("nlp-result", Some(payload)).unwrap();
        let VoiceEvent::NlpResult(result) = event else {
            panic!("expected an nlp result");
        };
        assert_eq!(result.asr, "play some jazz");
        assert_eq!(result.nlp["intent"], "play_music");
    }

    #[test]
    fn speech_error_code_defaults_to_zero() {
        let VoiceEvent::SpeechError { code } =
            VoiceEvent::from_wire("speech-error", None).unwrap()
        else {
            panic!("expected a speech error");
        };
        assert_eq!(code, 0);

        let VoiceEvent::SpeechError { code } =
            VoiceEvent::from_wire("speech-error", Some(json!(120))).unwrap()
        else {
            panic!("expected a speech error");
        };
        assert!(code >= NETWORK_ERROR_CODE_BASE);
    }
}
