use super::dialogue::{DialogueLine, Stage, Typewriter, TypingOptions, OTHER_SLOT, SELF_SLOT};
use super::transcript::Transcript;
use crate::llm::transmitter::{Pending, Settled, Transmitter};
use crate::llm::{RequestReset, RequestSendPlayerMessage, ResponseReset, ResponseSendPlayerMessage};

/// Face code for the player's own lines: leave the avatar as it is.
pub const SELF_FACE_TYPE: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Resetting,
    Active,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionState {
    pub score: u32,
    pub phase: Phase,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct Talkers {
    #[serde(default)]
    pub self_name: String,
    #[serde(default)]
    pub other_name: String,
    #[serde(default)]
    pub name_plates: Vec<String>,
}

impl Default for Talkers {
    fn default() -> Self {
        Self {
            self_name: "自分".to_string(),
            other_name: "相手".to_string(),
            name_plates: vec!["自分".to_string(), "相手".to_string()],
        }
    }
}

impl Talkers {
    pub fn fill_default_value(&mut self) {
        let default = Self::default();
        if self.self_name.is_empty() {
            self.self_name = default.self_name;
        }
        if self.other_name.is_empty() {
            self.other_name = default.other_name;
        }
        if self.name_plates.is_empty() {
            self.name_plates = default.name_plates;
        }
    }
}

/// Carried by a reply line and applied once the line has been shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub score: i32,
    pub end: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("the session is not active")]
    NotActive,
    #[error("still waiting for the last reply")]
    InputDisabled,
    #[error("the message is empty")]
    Empty,
}

/// Runs one training session: reset, then player/llama exchanges until the
/// server reports the end, then the result.
pub struct Coordinator<S> {
    transmitter: Transmitter,
    typewriter: Typewriter<S, Outcome>,
    talkers: Talkers,
    state: SessionState,
    input_enabled: bool,
    reset: Option<Pending<ResponseReset>>,
    reply: Option<Pending<ResponseSendPlayerMessage>>,
    reset_failed: bool,
    result_delay: f32,
    result_countdown: Option<f32>,
    final_score: Option<u32>,
    transcript: Transcript,
}

impl<S: Stage> Coordinator<S> {
    pub fn new(
        transmitter: Transmitter,
        stage: S,
        typing: TypingOptions,
        talkers: Talkers,
        result_delay: f32,
    ) -> Self {
        let typewriter = Typewriter::new(stage, typing, talkers.name_plates.len());
        let mut coordinator = Self {
            transmitter,
            typewriter,
            talkers,
            state: SessionState::default(),
            input_enabled: false,
            reset: None,
            reply: None,
            reset_failed: false,
            result_delay,
            result_countdown: None,
            final_score: None,
            transcript: Transcript::new(),
        };
        coordinator.begin_reset();
        coordinator
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn score(&self) -> u32 {
        self.state.score
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    pub fn is_waiting(&self) -> bool {
        self.reset.is_some() || self.reply.is_some()
    }

    /// A line is on the message box or still queued for it.
    pub fn is_typing(&self) -> bool {
        !self.typewriter.is_idle()
    }

    pub fn reset_failed(&self) -> bool {
        self.reset_failed
    }

    /// The score shown on the result screen, once the delay after the end
    /// has passed.
    pub fn final_score(&self) -> Option<u32> {
        self.final_score
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn talkers(&self) -> &Talkers {
        &self.talkers
    }

    pub fn server_url(&self) -> &str {
        self.transmitter.server_url()
    }

    pub fn stage(&self) -> &S {
        self.typewriter.stage()
    }

    pub fn stage_mut(&mut self) -> &mut S {
        self.typewriter.stage_mut()
    }

    /// Asks the server for a new session after a failed reset. Nothing is
    /// retried automatically.
    pub fn retry_reset(&mut self) -> bool {
        if self.state.phase != Phase::Resetting || self.reset.is_some() {
            return false;
        }
        self.begin_reset();
        true
    }

    pub fn submit(&mut self, message: &str) -> Result<(), SubmitError> {
        if self.state.phase != Phase::Active {
            return Err(SubmitError::NotActive);
        }
        if !self.input_enabled {
            return Err(SubmitError::InputDisabled);
        }
        if message.trim().is_empty() {
            return Err(SubmitError::Empty);
        }

        self.input_enabled = false;
        let line = DialogueLine::new(
            self.talkers.self_name.clone(),
            SELF_SLOT,
            message,
            SELF_FACE_TYPE,
        );
        self.show(line);

        self.reply = Some(self.transmitter.send_player_message(&RequestSendPlayerMessage {
            message: message.to_string(),
        }));
        Ok(())
    }

    pub fn tick(&mut self, delta: f32) {
        if let Some(settled) = self.reset.as_ref().and_then(Pending::poll) {
            self.reset = None;
            self.on_reset(settled);
        }

        if let Some(settled) = self.reply.as_ref().and_then(Pending::poll) {
            self.reply = None;
            self.on_reply(settled);
        }

        if let Some(remaining) = self.result_countdown.as_mut() {
            *remaining -= delta;
            if *remaining <= 0.0 {
                self.result_countdown = None;
                self.final_score = Some(self.state.score);
                self.transcript.score = Some(self.state.score);
                log::info!("session finished, score {}", self.state.score);
            }
        }

        for outcome in self.typewriter.tick(delta) {
            self.on_reply_shown(outcome);
        }
    }

    fn begin_reset(&mut self) {
        log::info!("reset session on {}", self.transmitter.server_url());
        self.state = SessionState::default();
        self.input_enabled = false;
        self.reset_failed = false;
        self.final_score = None;
        self.result_countdown = None;
        self.transcript.clear();
        self.reset = Some(self.transmitter.reset(&RequestReset {}));
    }

    fn show(&mut self, line: DialogueLine<Outcome>) {
        self.transcript
            .record(&line.talker_name, line.slot, &line.message, line.face_type);
        self.typewriter.enqueue(line);
    }

    fn on_reset(&mut self, settled: Settled<ResponseReset>) {
        if !settled.success || !settled.response.result {
            log::error!("Failed to reset session.");
            self.reset_failed = true;
            return;
        }

        let ResponseReset {
            first_message,
            face_type,
            ..
        } = settled.response;
        self.state.score = 0;
        self.state.phase = Phase::Active;
        self.input_enabled = true;
        let line = DialogueLine::new(
            self.talkers.other_name.clone(),
            OTHER_SLOT,
            first_message,
            face_type,
        );
        self.show(line);
    }

    fn on_reply(&mut self, settled: Settled<ResponseSendPlayerMessage>) {
        if !settled.success {
            log::error!("Failed to send message.");
            self.input_enabled = true;
            return;
        }

        let ResponseSendPlayerMessage {
            message,
            face_type,
            score,
            end,
        } = settled.response;
        let line = DialogueLine::new(
            self.talkers.other_name.clone(),
            OTHER_SLOT,
            message,
            face_type,
        )
        .with_notify(Outcome { score, end });
        self.show(line);
    }

    fn on_reply_shown(&mut self, outcome: Outcome) {
        if outcome.score < 0 {
            log::warn!("negative score delta {} ignored", outcome.score);
        }
        let delta = u32::try_from(outcome.score).unwrap_or(0);
        self.state.score = self.state.score.saturating_add(delta);

        if outcome.end {
            self.state.phase = Phase::Ended;
            self.input_enabled = false;
            self.result_countdown = Some(self.result_delay);
        } else {
            self.input_enabled = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::llm::transmitter::tests::MockTransport;
    use crate::llm::{RESET_ENDPOINT, SEND_MESSAGE_ENDPOINT};
    use crate::sys::dialogue::tests::{Call, RecordStage};

    const RESET_OK: &str = r#"{"result":true,"first_message":"Hello","face_type":1}"#;

    fn coordinator(mock: &Arc<MockTransport>) -> Coordinator<RecordStage> {
        let transmitter = Transmitter::inline("http://localhost:5000", mock.clone());
        let typing = TypingOptions {
            seconds_per_character: 0.25,
            interval_for_each_message: 1.0,
        };
        Coordinator::new(transmitter, RecordStage::default(), typing, Talkers::default(), 2.0)
    }

    fn run(coordinator: &mut Coordinator<RecordStage>, seconds: f32) {
        let mut elapsed = 0.0;
        while elapsed < seconds {
            coordinator.tick(0.25);
            elapsed += 0.25;
        }
    }

    #[test]
    fn full_session() {
        let mock = MockTransport::new();
        mock.reply(RESET_ENDPOINT, 200, RESET_OK);
        let mut c = coordinator(&mock);
        assert_eq!(c.phase(), Phase::Resetting);

        c.tick(0.0);
        assert_eq!(c.phase(), Phase::Active);
        assert_eq!(c.score(), 0);
        let opening = &c.transcript().content[0];
        assert_eq!((opening.message.as_str(), opening.face_type), ("Hello", 1));
        assert!(c.stage().calls.contains(&Call::Face(1)));
        assert!(c.stage().calls.contains(&Call::Message("Hello".to_string())));

        mock.reply(
            SEND_MESSAGE_ENDPOINT,
            200,
            r#"{"message":"Hi there","face_type":2,"score":10,"end":false}"#,
        );
        c.submit("Hi").unwrap();
        assert!(!c.input_enabled());
        assert_eq!(c.submit("again"), Err(SubmitError::InputDisabled));
        assert_eq!(c.transcript().content[1].message, "Hi");
        assert_eq!(c.transcript().content[1].slot, SELF_SLOT);

        c.tick(0.0);
        // reply is queued but the score waits for it to be shown
        assert_eq!(c.score(), 0);
        assert_eq!(c.transcript().content[2].message, "Hi there");
        assert!(c.is_typing());

        run(&mut c, 20.0);
        assert!(!c.is_typing());
        assert_eq!(c.score(), 10);
        assert_eq!(c.phase(), Phase::Active);
        assert!(c.input_enabled());

        mock.reply(
            SEND_MESSAGE_ENDPOINT,
            200,
            r#"{"message":"Bye","face_type":0,"score":5,"end":true}"#,
        );
        c.submit("See you").unwrap();
        while c.phase() != Phase::Ended {
            c.tick(0.25);
        }
        assert_eq!(c.score(), 15);
        assert_eq!(c.final_score(), None);
        assert!(!c.input_enabled());

        run(&mut c, 2.5);
        assert_eq!(c.final_score(), Some(15));
        assert_eq!(c.transcript().score, Some(15));
        assert_eq!(c.submit("more"), Err(SubmitError::NotActive));

        assert_eq!(
            mock.requests()
                .into_iter()
                .map(|(_, body)| body)
                .collect::<Vec<_>>(),
            vec![
                "{}".to_string(),
                r#"{"message":"Hi"}"#.to_string(),
                r#"{"message":"See you"}"#.to_string()
            ]
        );
    }

    #[test]
    fn failed_reset_waits_for_manual_retry() {
        let mock = MockTransport::new();
        mock.reply(RESET_ENDPOINT, 500, "down");
        let mut c = coordinator(&mock);

        run(&mut c, 5.0);
        assert_eq!(c.phase(), Phase::Resetting);
        assert!(c.reset_failed());
        assert_eq!(c.submit("Hi"), Err(SubmitError::NotActive));
        assert_eq!(mock.requests().len(), 1);

        mock.reply(RESET_ENDPOINT, 200, RESET_OK);
        assert!(c.retry_reset());
        c.tick(0.0);
        assert_eq!(c.phase(), Phase::Active);
        assert!(!c.reset_failed());
        assert!(!c.retry_reset());
    }

    #[test]
    fn reset_result_false_is_a_failure() {
        let mock = MockTransport::new();
        mock.reply(
            RESET_ENDPOINT,
            200,
            r#"{"result":false,"first_message":"","face_type":0}"#,
        );
        let mut c = coordinator(&mock);
        c.tick(0.0);
        assert_eq!(c.phase(), Phase::Resetting);
        assert!(c.reset_failed());
        assert!(c.transcript().content.is_empty());
    }

    #[test]
    fn failed_send_reenables_input() {
        let mock = MockTransport::new();
        mock.reply(RESET_ENDPOINT, 200, RESET_OK);
        let mut c = coordinator(&mock);
        c.tick(0.0);

        mock.reply(SEND_MESSAGE_ENDPOINT, 200, "not json");
        c.submit("Hi").unwrap();
        c.tick(0.0);
        assert!(c.input_enabled());
        assert!(!c.is_waiting());

        run(&mut c, 20.0);
        assert_eq!(c.score(), 0);
        assert_eq!(c.phase(), Phase::Active);
        // opening line and the player's line only
        assert_eq!(c.transcript().content.len(), 2);
    }

    #[test]
    fn negative_delta_never_lowers_score() {
        let mock = MockTransport::new();
        mock.reply(RESET_ENDPOINT, 200, RESET_OK);
        mock.reply(
            SEND_MESSAGE_ENDPOINT,
            200,
            r#"{"message":"ok","face_type":0,"score":10,"end":false}"#,
        );
        mock.reply(
            SEND_MESSAGE_ENDPOINT,
            200,
            r#"{"message":"hmm","face_type":3,"score":-4,"end":false}"#,
        );
        let mut c = coordinator(&mock);
        c.tick(0.0);

        c.submit("one").unwrap();
        run(&mut c, 20.0);
        c.submit("two").unwrap();
        run(&mut c, 20.0);
        assert_eq!(c.score(), 10);
    }

    #[test]
    fn blank_message_is_rejected() {
        let mock = MockTransport::new();
        mock.reply(RESET_ENDPOINT, 200, RESET_OK);
        let mut c = coordinator(&mock);
        c.tick(0.0);

        assert_eq!(c.submit("  \n"), Err(SubmitError::Empty));
        assert!(c.input_enabled());
        assert_eq!(mock.requests().len(), 1);
    }
}
