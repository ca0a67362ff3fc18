use crossterm::event::{Event, KeyCode, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Position;
use ratatui::style::{Color, Style, Stylize};
use ratatui::{
    layout::{Alignment, Rect},
    text::{Line, Span, Text},
    widgets::{Block, Paragraph, Wrap},
    Frame,
};
use tui_textarea::TextArea;

use super::stage::{FinishedLine, TuiStage};
use crate::sys::{avatar::Emotion, dialogue::Cue, pronounce::Viseme};

/// Scrollable log of the lines that have finished typing.
pub struct MessagesComponent {
    cursor: (u16, u16),
    last_mouse_event: MouseEvent,
    lock_on_bottom: bool,
    area: Rect,
    active: bool,
}

impl MessagesComponent {
    pub fn new() -> Self {
        Self {
            cursor: (0, 0),
            lock_on_bottom: true,
            active: true,
            area: Rect::default(),
            last_mouse_event: MouseEvent {
                row: 0,
                column: 0,
                kind: MouseEventKind::Moved,
                modifiers: KeyModifiers::empty(),
            },
        }
    }

    fn update_active(&mut self, event: MouseEvent) {
        if event.kind == MouseEventKind::Down(MouseButton::Left) {
            self.active = self.area.contains(Position::new(event.column, event.row))
        }
        if event.kind == MouseEventKind::Drag(MouseButton::Left) && self.active {
            self.move_scroll(event);
        }
        self.last_mouse_event = event;
    }

    pub fn render(&mut self, history: &[FinishedLine], self_name: &str, frame: &mut Frame, area: Rect) {
        self.area = area;
        let mut text = Text::default();
        for line in history {
            let style = if line.talker_name == self_name {
                Style::new().fg(Color::Yellow)
            } else {
                Style::new().fg(Color::Cyan)
            };
            text.extend([Line::styled(format!("{}:", line.talker_name), style.bold())]);

            // wide chars take two cells
            let max_len = (self.area.width.max(3) - 2) as usize;
            let mut s = String::with_capacity(max_len);
            let mut len = 0;
            for c in line.message.chars() {
                if c == '\n' {
                    text.extend([Line::styled(std::mem::take(&mut s), style)]);
                    len = 0;
                    continue;
                }
                s.push(c);
                len += if c.is_ascii() { 1 } else { 2 };
                if len >= max_len {
                    text.extend([Line::styled(std::mem::take(&mut s), style)]);
                    len = 0;
                }
            }
            text.extend([Line::styled(s, style)]);
        }

        let line_n = text.lines.len();
        let max_line = area.height.saturating_sub(2) as usize;
        if line_n > max_line {
            let max_cursor = (line_n - max_line) as u16;
            if self.cursor.0 >= max_cursor {
                self.lock_on_bottom = true;
            }
            if self.lock_on_bottom {
                self.cursor.0 = max_cursor;
            }
        } else {
            self.cursor.0 = 0;
        }

        let paragraph = Paragraph::new(text)
            .block(Block::bordered().title("Log").gray())
            .scroll(self.cursor);
        frame.render_widget(paragraph, area);
    }

    pub fn move_scroll(&mut self, event: MouseEvent) {
        let (delta_y, delta_x) = (
            event.row as i16 - self.last_mouse_event.row as i16,
            event.column as i16 - self.last_mouse_event.column as i16,
        );
        if delta_x != 0 {
            self.cursor.1 = (self.cursor.1 as i16 - delta_x).max(0) as u16;
        }
        if delta_y != 0 {
            self.cursor.0 = (self.cursor.0 as i16 - delta_y).max(0) as u16;
            self.lock_on_bottom = false;
        }
    }

    pub fn handler_input(&mut self, event: MouseEvent) {
        match event.kind {
            MouseEventKind::ScrollDown => {
                self.cursor.0 += 3;
            }
            MouseEventKind::ScrollUp => {
                self.cursor.0 = self.cursor.0.max(3) - 3;
                self.lock_on_bottom = false;
            }
            _ => {}
        }
        self.update_active(event);
    }

    pub fn lock_on_bottom(&mut self) {
        self.lock_on_bottom = true;
    }
}

fn eyes(emotion: Emotion) -> &'static str {
    match emotion {
        Emotion::Neutral => "o   o",
        Emotion::Happy => "^   ^",
        Emotion::Sad => ";   ;",
        Emotion::Angry => ">   <",
        Emotion::Surprised => "O   O",
    }
}

fn mouth(viseme: Viseme) -> &'static str {
    match viseme {
        Viseme::A => " [ ] ",
        Viseme::I => " === ",
        Viseme::U => "  o  ",
        Viseme::E => " \\_/ ",
        Viseme::O => "  O  ",
        Viseme::Idle => "  -  ",
    }
}

pub fn render_avatar(stage: &TuiStage, frame: &mut Frame, area: Rect) {
    let emotion = stage.avatar.emotion();
    let viseme = stage.avatar.mouth();
    let text = Text::from(vec![
        Line::raw(""),
        Line::raw("+-------+"),
        Line::raw(format!("| {} |", eyes(emotion))),
        Line::raw(format!("| {} |", mouth(viseme))),
        Line::raw("+-------+"),
        Line::raw(""),
        Line::styled(format!("{emotion} / {viseme}"), Style::new().dark_gray()),
    ]);
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(Block::bordered().title("Llama").gray());
    frame.render_widget(paragraph, area);
}

pub fn render_message_box(stage: &TuiStage, plates: &[String], frame: &mut Frame, area: Rect) {
    let mut title = vec![Span::raw(" ")];
    if let Some(plate) = stage.plate.and_then(|i| plates.get(i)) {
        let color = if stage.plate == Some(0) {
            Color::Yellow
        } else {
            Color::Cyan
        };
        title.push(Span::styled(format!("[{plate}]"), Style::new().fg(Color::Black).bg(color)));
        title.push(Span::raw(" "));
    }
    title.push(Span::raw(stage.talker_name.clone()).bold());
    title.push(Span::raw(" "));

    let mut body = Text::raw(stage.visible_text());
    if stage.next_icon {
        if body.lines.is_empty() {
            body.lines.push(Line::default());
        }
        if let Some(last) = body.lines.last_mut() {
            last.spans.push(Span::raw(" ▼").slow_blink());
        }
    }

    let cue = match stage.cue {
        Some(Cue::TypeOther) => Span::raw(format!("♪{}", stage.cue_count % 10)).cyan(),
        Some(Cue::TypeSelf) => Span::raw(format!("♪{}", stage.cue_count % 10)).yellow(),
        None => Span::raw(""),
    };

    let paragraph = Paragraph::new(body)
        .wrap(Wrap { trim: false })
        .block(
            Block::bordered()
                .title(Line::from(title))
                .title_bottom(Line::from(cue).alignment(Alignment::Right)),
        );
    frame.render_widget(paragraph, area);
}

#[derive(Debug)]
pub enum Input {
    Event(Event),
}

#[derive(Debug, PartialEq, Eq)]
pub enum Output {
    Exit,
    Submit(String),
    Retry,
    Save,
    Normal,
}

pub struct ChatComponent {
    pub messages: MessagesComponent,
    input: TextArea<'static>,
    exit_n: u8,
}

impl ChatComponent {
    pub fn new() -> Self {
        Self {
            messages: MessagesComponent::new(),
            input: Self::new_textarea(),
            exit_n: 0,
        }
    }

    fn new_textarea() -> TextArea<'static> {
        TextArea::default()
    }

    pub fn render(&mut self, enabled: bool, frame: &mut Frame, area: Rect) {
        let block = if enabled {
            Block::bordered().title("Input").gray()
        } else {
            Block::bordered().title("Input (waiting)").dark_gray()
        };
        self.input.set_block(block);
        frame.render_widget(&self.input, area);
    }

    fn take_message(&mut self) -> String {
        let mut new_textarea = Self::new_textarea();
        std::mem::swap(&mut self.input, &mut new_textarea);
        new_textarea.into_lines().join("\n")
    }

    /// `can_submit` keeps the typed text in the box while a reply is pending.
    pub fn handler_input(&mut self, input: Input, can_submit: bool) -> Output {
        log::trace!("input {input:?}");
        let Input::Event(event) = input;

        let output = match event {
            Event::Key(key)
                if key.code == KeyCode::Char('j') && key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                if can_submit {
                    let message = self.take_message();
                    self.messages.lock_on_bottom();
                    Output::Submit(message)
                } else {
                    Output::Normal
                }
            }
            Event::Key(key)
                if key.code == KeyCode::Char('r') && key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                Output::Retry
            }
            Event::Key(key)
                if key.code == KeyCode::Char('s') && key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                Output::Save
            }
            Event::Key(key) if key.code == KeyCode::Esc => {
                self.exit_n += 2;
                if self.exit_n >= 3 {
                    return Output::Exit;
                }
                Output::Normal
            }
            Event::Key(key) => {
                self.input.input(key);
                Output::Normal
            }
            Event::Mouse(event) => {
                self.messages.handler_input(event);
                Output::Normal
            }
            _ => Output::Normal,
        };

        self.exit_n = self.exit_n.max(1) - 1;
        output
    }
}
