use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use chat::{Input, Output};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    widgets::{Block, Paragraph, Tabs},
    Frame, Terminal,
};

use crate::sys::{dialogue::SELF_SLOT, Coordinator, Phase};
use result::ResultPanel;
use stage::TuiStage;

pub mod chat;
pub mod result;
pub mod stage;

/// Frame interval of the run loop.
const TICK: Duration = Duration::from_millis(16);

pub struct App {
    pub coordinator: Coordinator<TuiStage>,
    pub chat: chat::ChatComponent,
    result: ResultPanel,
    transcript_path: PathBuf,
    status: String,
}

impl App {
    pub fn new(coordinator: Coordinator<TuiStage>, result: ResultPanel, transcript_path: PathBuf) -> Self {
        Self {
            coordinator,
            chat: chat::ChatComponent::new(),
            result,
            transcript_path,
            status: String::new(),
        }
    }

    fn status_line(&self) -> String {
        if !self.status.is_empty() {
            return self.status.clone();
        }
        match self.coordinator.phase() {
            Phase::Resetting if self.coordinator.reset_failed() => format!(
                "could not reach {} [Ctrl+R retry]",
                self.coordinator.server_url()
            ),
            Phase::Resetting => format!("connecting to {} ...", self.coordinator.server_url()),
            Phase::Active if self.coordinator.is_waiting() => "waiting for reply ...".to_string(),
            Phase::Active if !self.coordinator.input_enabled() && self.coordinator.is_typing() => {
                format!("{} is talking ...", self.coordinator.talkers().other_name)
            }
            Phase::Active if !self.coordinator.input_enabled() => "...".to_string(),
            Phase::Active => "your turn".to_string(),
            Phase::Ended => "session finished".to_string(),
        }
    }

    pub fn render(&mut self, f: &mut Frame) {
        let vertical = Layout::vertical([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(5),
            Constraint::Max(6),
            Constraint::Length(1),
            Constraint::Length(1),
        ]);

        let [tabs_area, main_area, message_area, input_area, help_area, status_area] =
            vertical.areas(f.size());

        let selected = match self.coordinator.phase() {
            Phase::Resetting => 0,
            Phase::Active => 1,
            Phase::Ended => 2,
        };
        let tabs = Tabs::new(vec!["Reset", "Talk", "Result"])
            .select(selected)
            .padding("[", "]")
            .block(Block::bordered().title(format!(" Score {} ", self.coordinator.score())));
        f.render_widget(tabs, tabs_area);

        let horizontal = Layout::horizontal([Constraint::Length(24), Constraint::Min(20)]);
        let [avatar_area, log_area] = horizontal.areas(main_area);

        let stage = self.coordinator.stage();
        chat::render_avatar(stage, f, avatar_area);

        match self.coordinator.final_score() {
            Some(score) => {
                let turns = self
                    .coordinator
                    .transcript()
                    .content
                    .iter()
                    .filter(|e| e.slot == SELF_SLOT)
                    .count();
                self.result.render(score, turns, f, log_area);
            }
            None => {
                let self_name = self.coordinator.talkers().self_name.clone();
                self.chat
                    .messages
                    .render(&stage.history, &self_name, f, log_area);
            }
        }

        chat::render_message_box(stage, &self.coordinator.talkers().name_plates, f, message_area);

        self.chat
            .render(self.coordinator.input_enabled(), f, input_area);

        let help_message =
            Paragraph::new("help: [Ctrl+J send] [Ctrl+R retry reset] [Ctrl+S save] [Esc+Esc quit]");
        f.render_widget(help_message, help_area);

        f.render_widget(Paragraph::new(self.status_line()), status_area);
    }

    fn handle_output(&mut self, output: Output) -> bool {
        match output {
            Output::Exit => return false,
            Output::Submit(message) => {
                self.status = match self.coordinator.submit(&message) {
                    Ok(()) => String::new(),
                    Err(e) => e.to_string(),
                };
            }
            Output::Retry => {
                if self.coordinator.retry_reset() {
                    self.status.clear();
                }
            }
            Output::Save => {
                self.status = match self.coordinator.transcript().save(&self.transcript_path) {
                    Ok(()) => format!("saved to {}", self.transcript_path.display()),
                    Err(e) => {
                        log::error!("{e:#}");
                        format!("{e}")
                    }
                };
            }
            Output::Normal => {}
        }
        true
    }

    pub fn run_loop(mut self) -> anyhow::Result<()> {
        // setup terminal
        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let mut main_loop = || -> anyhow::Result<()> {
            let mut last = Instant::now();

            loop {
                terminal.draw(|f| self.render(f))?;

                if event::poll(TICK)? {
                    let can_submit = self.coordinator.phase() == Phase::Active
                        && self.coordinator.input_enabled();
                    let output = self
                        .chat
                        .handler_input(Input::Event(event::read()?), can_submit);
                    if !self.handle_output(output) {
                        break;
                    }
                }

                let now = Instant::now();
                let delta = now.duration_since(last).as_secs_f32();
                last = now;

                self.coordinator.tick(delta);
                self.coordinator.stage_mut().update();
            }
            Ok(())
        };

        let r = main_loop();

        // restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
        r
    }
}
