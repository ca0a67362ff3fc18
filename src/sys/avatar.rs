use std::fmt::Display;

use super::pronounce::Viseme;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Emotion {
    #[default]
    Neutral,
    Happy,
    Sad,
    Angry,
    Surprised,
}

impl Emotion {
    /// Maps a server face code. Negative codes keep the current expression.
    pub fn from_face_type(face_type: i32) -> Option<Self> {
        match face_type {
            f if f < 0 => None,
            1 => Some(Emotion::Happy),
            2 => Some(Emotion::Sad),
            3 => Some(Emotion::Angry),
            4 => Some(Emotion::Surprised),
            _ => Some(Emotion::Neutral),
        }
    }
}

impl Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Emotion::Neutral => "Neutral",
            Emotion::Happy => "Happy",
            Emotion::Sad => "Sad",
            Emotion::Angry => "Angry",
            Emotion::Surprised => "Surprised",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Emotion(Emotion),
    Pronounce(Viseme),
}

/// Expression and mouth state of the other speaker.
///
/// Setters only record the request; [`Avatar::update`] turns it into
/// animator triggers once per tick.
#[derive(Debug, Clone, Default)]
pub struct Avatar {
    current_emotion: Emotion,
    previous_emotion: Emotion,
    pronounce: Option<Viseme>,
    mouth: Option<Viseme>,
}

impl Avatar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_face_type(&mut self, face_type: i32) {
        if let Some(emotion) = Emotion::from_face_type(face_type) {
            self.current_emotion = emotion;
        }
    }

    pub fn set_pronounce(&mut self, viseme: Viseme) {
        self.pronounce = Some(viseme);
    }

    pub fn emotion(&self) -> Emotion {
        self.previous_emotion
    }

    /// Mouth shape after the last update, `None` before any pronunciation.
    pub fn mouth(&self) -> Viseme {
        self.mouth.unwrap_or(Viseme::Idle)
    }

    pub fn update(&mut self) -> Vec<Trigger> {
        let mut triggers = Vec::with_capacity(2);

        if let Some(viseme) = self.pronounce.take() {
            self.mouth = Some(viseme);
            triggers.push(Trigger::Pronounce(viseme));
        }

        if self.previous_emotion != self.current_emotion {
            log::debug!("avatar emotion {} -> {}", self.previous_emotion, self.current_emotion);
            self.previous_emotion = self.current_emotion;
            triggers.push(Trigger::Emotion(self.current_emotion));
        }

        triggers
    }
}
