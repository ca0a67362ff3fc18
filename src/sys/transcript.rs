use std::path::Path;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Entry {
    pub time: String,
    pub talker_name: String,
    pub slot: usize,
    pub message: String,
    pub face_type: i32,
}

/// Everything handed to the message box during a session.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transcript {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default)]
    pub content: Vec<Entry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, talker_name: &str, slot: usize, message: &str, face_type: i32) {
        self.content.push(Entry {
            time: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            talker_name: talker_name.to_string(),
            slot,
            message: message.to_string(),
            face_type,
        });
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.score = None;
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("toml::to_string_pretty err:{e}"))?;
        std::fs::write(path, contents)
            .map_err(|e| anyhow::anyhow!("save to file `{}` err:{e}", path.display()))?;
        log::info!("transcript saved to {}", path.display());
        Ok(())
    }

    #[cfg(test)]
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|_| anyhow::anyhow!("transcript file `{}` not found", path.display()))?;
        Ok(toml::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.toml");

        let mut transcript = Transcript::new();
        transcript.record("相手", 1, "こんにちは", 1);
        transcript.record("自分", 0, "Hi", -1);
        transcript.score = Some(30);
        transcript.save(&path).unwrap();

        let loaded = Transcript::load(&path).unwrap();
        assert_eq!(loaded, transcript);
        assert_eq!(loaded.content[0].talker_name, "相手");
        assert_eq!(loaded.content[1].face_type, -1);
    }

    #[test]
    fn unfinished_session_has_no_score() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.toml");

        let mut transcript = Transcript::new();
        transcript.record("自分", 0, "Hi", -1);
        transcript.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("score"));
        assert_eq!(Transcript::load(&path).unwrap().score, None);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Transcript::load(dir.path().join("nope.toml")).is_err());
    }
}
