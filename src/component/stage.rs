use crate::sys::{
    avatar::Avatar,
    dialogue::{Cue, Stage},
    pronounce::Viseme,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedLine {
    pub talker_name: String,
    pub message: String,
}

/// Terminal side of the message box. The typewriter writes into it, the
/// render pass reads from it.
#[derive(Debug, Default)]
pub struct TuiStage {
    pub avatar: Avatar,
    pub talker_name: String,
    pub plate: Option<usize>,
    pub message: String,
    pub visible: usize,
    pub next_icon: bool,
    pub cue: Option<Cue>,
    pub cue_count: usize,
    pub history: Vec<FinishedLine>,
}

impl TuiStage {
    pub fn new() -> Self {
        Self {
            avatar: Avatar::new(),
            ..Default::default()
        }
    }

    pub fn visible_text(&self) -> String {
        self.message.chars().take(self.visible).collect()
    }

    /// Once per frame, after the session tick.
    pub fn update(&mut self) {
        let triggers = self.avatar.update();
        if !triggers.is_empty() {
            log::trace!("animator triggers {triggers:?}");
        }
    }
}

impl Stage for TuiStage {
    fn set_face_type(&mut self, face_type: i32) {
        self.avatar.set_face_type(face_type);
    }

    fn set_name(&mut self, talker_name: &str, plate: Option<usize>) {
        self.talker_name = talker_name.to_string();
        self.plate = plate;
    }

    fn set_message(&mut self, message: &str) {
        self.message = message.to_string();
        self.visible = 0;
    }

    fn set_visible(&mut self, count: usize) {
        self.visible = count;
    }

    fn set_pronounce(&mut self, viseme: Viseme) {
        self.avatar.set_pronounce(viseme);
    }

    fn play_cue(&mut self, cue: Cue) {
        self.cue = Some(cue);
        self.cue_count += 1;
    }

    fn set_next_icon(&mut self, visible: bool) {
        self.next_icon = visible;
    }

    fn line_finished(&mut self, talker_name: &str, message: &str) {
        self.history.push(FinishedLine {
            talker_name: talker_name.to_string(),
            message: message.to_string(),
        });
    }
}
