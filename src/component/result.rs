use handlebars::Handlebars;
use ratatui::{
    layout::{Alignment, Rect},
    style::Stylize,
    text::{Line, Text},
    widgets::{Block, Paragraph},
    Frame,
};

const RESULT_TEMPLATE_NAME: &str = "result";
pub const DEFAULT_RESULT_TEMPLATE: &str = "Score: {{score}}";

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ResultOptions {
    /// seconds between the last reply and the result screen
    #[serde(default)]
    pub delay: f32,
    #[serde(default)]
    pub template: String,
}

impl Default for ResultOptions {
    fn default() -> Self {
        Self {
            delay: 2.0,
            template: DEFAULT_RESULT_TEMPLATE.to_string(),
        }
    }
}

impl ResultOptions {
    pub fn fill_default_value(&mut self) {
        let default = Self::default();
        if self.delay <= 0.0 {
            self.delay = default.delay;
        }
        if self.template.is_empty() {
            self.template = default.template;
        }
    }
}

pub struct ResultPanel {
    registry: Handlebars<'static>,
}

impl ResultPanel {
    pub fn new(template: &str) -> anyhow::Result<Self> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string(RESULT_TEMPLATE_NAME, template)
            .map_err(|e| anyhow::anyhow!("result template err:{e}"))?;
        Ok(Self { registry })
    }

    pub fn render_text(&self, score: u32, turns: usize) -> String {
        let data = serde_json::json!({ "score": score, "turns": turns });
        self.registry
            .render(RESULT_TEMPLATE_NAME, &data)
            .unwrap_or_else(|e| {
                log::warn!("result template render err:{e}");
                score.to_string()
            })
    }

    pub fn render(&self, score: u32, turns: usize, frame: &mut Frame, area: Rect) {
        let mut text = Text::default();
        text.extend([Line::raw(""), Line::raw("RESULT").bold(), Line::raw("")]);
        text.extend(Text::raw(self.render_text(score, turns)).lines);
        text.extend([Line::raw(""), Line::raw("[Ctrl+S save] [Esc+Esc quit]").dark_gray()]);

        let paragraph = Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(Block::bordered().title("Result").yellow());
        frame.render_widget(paragraph, area);
    }
}
