use std::collections::VecDeque;

use super::pronounce::{self, Viseme};

pub const SELF_SLOT: usize = 0;
pub const OTHER_SLOT: usize = 1;

/// A line waiting to be typed out. `notify` is handed back to the owner of
/// the [`Typewriter`] once the line has been shown and its interval elapsed.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueLine<N> {
    pub talker_name: String,
    pub slot: usize,
    pub message: String,
    pub face_type: i32,
    pub notify: Option<N>,
}

impl<N> DialogueLine<N> {
    pub fn new(
        talker_name: impl Into<String>,
        slot: usize,
        message: impl Into<String>,
        face_type: i32,
    ) -> Self {
        Self {
            talker_name: talker_name.into(),
            slot,
            message: message.into(),
            face_type,
            notify: None,
        }
    }

    pub fn with_notify(mut self, notify: N) -> Self {
        self.notify = Some(notify);
        self
    }

    pub fn is_other(&self) -> bool {
        self.slot > SELF_SLOT
    }
}

#[derive(Debug)]
pub struct MessageQueue<N> {
    lines: VecDeque<DialogueLine<N>>,
}

impl<N> Default for MessageQueue<N> {
    fn default() -> Self {
        Self {
            lines: VecDeque::new(),
        }
    }
}

impl<N> MessageQueue<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, line: DialogueLine<N>) {
        self.lines.push_back(line);
    }

    pub fn dequeue(&mut self) -> Option<DialogueLine<N>> {
        self.lines.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    TypeSelf,
    TypeOther,
}

/// What the sequencer drives on the host side: message box, name plate,
/// avatar and sound effects.
pub trait Stage {
    fn set_face_type(&mut self, face_type: i32);

    /// `plate` is `None` when the speaker slot has no name plate.
    fn set_name(&mut self, talker_name: &str, plate: Option<usize>);

    fn set_message(&mut self, message: &str);

    fn set_visible(&mut self, count: usize);

    fn set_pronounce(&mut self, viseme: Viseme);

    fn play_cue(&mut self, cue: Cue);

    fn set_next_icon(&mut self, visible: bool);

    fn line_finished(&mut self, _talker_name: &str, _message: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub struct TypingOptions {
    #[serde(default)]
    pub seconds_per_character: f32,
    #[serde(default)]
    pub interval_for_each_message: f32,
}

impl Default for TypingOptions {
    fn default() -> Self {
        Self {
            seconds_per_character: 0.05,
            interval_for_each_message: 2.0,
        }
    }
}

impl TypingOptions {
    pub fn fill_default_value(&mut self) {
        let default = Self::default();
        if self.seconds_per_character <= 0.0 {
            self.seconds_per_character = default.seconds_per_character;
        }
        if self.interval_for_each_message <= 0.0 {
            self.interval_for_each_message = default.interval_for_each_message;
        }
    }
}

#[derive(Debug)]
enum Phase<N> {
    Waiting,
    Typing {
        line: DialogueLine<N>,
        shown: usize,
        total: usize,
        remaining: f32,
    },
    Holding {
        line: DialogueLine<N>,
        remaining: f32,
    },
}

/// Drains the queue one line at a time and reveals it character by
/// character. Driven by [`Typewriter::tick`]; time left over from one step
/// carries into the next within the same tick.
pub struct Typewriter<S, N> {
    stage: S,
    queue: MessageQueue<N>,
    phase: Phase<N>,
    options: TypingOptions,
    name_plates: usize,
}

impl<S: Stage, N> Typewriter<S, N> {
    pub fn new(stage: S, options: TypingOptions, name_plates: usize) -> Self {
        Self {
            stage,
            queue: MessageQueue::new(),
            phase: Phase::Waiting,
            options,
            name_plates,
        }
    }

    pub fn enqueue(&mut self, line: DialogueLine<N>) {
        log::debug!("enqueue [{}] {}", line.talker_name, line.message);
        self.queue.enqueue(line);
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut S {
        &mut self.stage
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Waiting) && self.queue.is_empty()
    }

    /// Advances by `delta` seconds and returns the notifications of lines
    /// that finished during this tick, in display order.
    pub fn tick(&mut self, delta: f32) -> Vec<N> {
        let mut budget = delta.max(0.0);
        let mut fired = Vec::new();

        loop {
            match std::mem::replace(&mut self.phase, Phase::Waiting) {
                Phase::Waiting => {
                    let Some(line) = self.queue.dequeue() else {
                        break;
                    };
                    self.begin(line);
                }
                Phase::Typing {
                    line,
                    shown,
                    total,
                    remaining,
                } => {
                    if remaining > budget {
                        self.phase = Phase::Typing {
                            line,
                            shown,
                            total,
                            remaining: remaining - budget,
                        };
                        break;
                    }
                    budget -= remaining;

                    if shown < total {
                        self.reveal(&line, shown + 1);
                        self.phase = Phase::Typing {
                            line,
                            shown: shown + 1,
                            total,
                            remaining: self.options.seconds_per_character,
                        };
                    } else {
                        if line.is_other() {
                            self.stage.set_pronounce(Viseme::Idle);
                        }
                        self.stage.set_next_icon(true);
                        self.phase = Phase::Holding {
                            line,
                            remaining: self.options.interval_for_each_message,
                        };
                    }
                }
                Phase::Holding { line, remaining } => {
                    if remaining > budget {
                        self.phase = Phase::Holding {
                            line,
                            remaining: remaining - budget,
                        };
                        break;
                    }
                    budget -= remaining;

                    self.stage.line_finished(&line.talker_name, &line.message);
                    if let Some(notify) = line.notify {
                        fired.push(notify);
                    }
                }
            }
        }

        fired
    }

    fn begin(&mut self, line: DialogueLine<N>) {
        self.stage.set_face_type(line.face_type);
        let plate = (line.slot < self.name_plates).then_some(line.slot);
        self.stage.set_name(&line.talker_name, plate);
        self.stage.set_next_icon(false);
        self.stage.set_message(&line.message);

        let total = line.message.chars().count();
        self.reveal(&line, 0);
        self.phase = Phase::Typing {
            line,
            shown: 0,
            total,
            remaining: self.options.seconds_per_character,
        };
    }

    fn reveal(&mut self, line: &DialogueLine<N>, count: usize) {
        self.stage.set_visible(count);
        if line.is_other() {
            // step 0 reveals nothing
            let revealed = count
                .checked_sub(1)
                .and_then(|index| pronounce::classify_at(&line.message, index));
            if let Some(viseme) = revealed {
                self.stage.set_pronounce(viseme);
            }
            self.stage.play_cue(Cue::TypeOther);
        } else {
            self.stage.play_cue(Cue::TypeSelf);
        }
    }
}
