use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use devtools_console::config::DEFAULT_PORT;
use devtools_console::{
    CacheStats, ConsoleFilter, ConsolePresenter, LogEntry, PresentedMessage,
};
use eyre::Result;
use ratatui::{
    style::Stylize,
    symbols::border,
    text::Line,
    widgets::{Block, ListState, Paragraph},
    DefaultTerminal, Frame,
};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::http::{clear_console, fetch_console, fetch_highlight_stats};
use super::state::{console_lines, Focus};
use super::views::bottom_bar::controls_line;
use super::views::console::render_console_panel;
use super::views::inspect::render_inspect_popup;
use super::widgets::formatters::format_time_ago;

#[derive(Debug, Parser)]
pub struct ConsoleArgs {
    /// Port of the console server
    #[arg(long, env = "DEVTOOLS_CONSOLE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

pub(crate) struct App {
    entries: Vec<Arc<LogEntry>>,
    presenter: ConsolePresenter,
    messages: Vec<PresentedMessage>,
    highlight_stats: Option<CacheStats>,
    error: Option<String>,
    exit: bool,
    last_refresh: Instant,
    last_successful_fetch: Option<Instant>,
    port: u16,
    last_render_duration: Duration,
    list_state: ListState,
    focus: Focus,
    paused: bool,
    inspected: Option<Arc<LogEntry>>,
    agent: ureq::Agent,
}

impl ConsoleArgs {
    pub fn run(&self) -> Result<()> {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_connect(Some(Duration::from_millis(2000)))
            .timeout_recv_body(Some(Duration::from_millis(1500)))
            .build()
            .into();

        let mut app = App {
            entries: Vec::new(),
            presenter: ConsolePresenter::new(),
            messages: Vec::new(),
            highlight_stats: None,
            error: None,
            exit: false,
            last_refresh: Instant::now(),
            last_successful_fetch: None,
            port: self.port,
            last_render_duration: Duration::from_millis(0),
            list_state: ListState::default().with_selected(Some(0)),
            focus: Focus::Console,
            paused: false,
            inspected: None,
            agent,
        };

        tracing::info!(port = self.port, "attaching console");

        let mut terminal = ratatui::init();
        let app_result = app.run(&mut terminal);
        ratatui::restore();
        app_result.map_err(|e| eyre::eyre!("TUI error: {}", e))
    }
}

impl App {
    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> io::Result<()> {
        const REFRESH_INTERVAL: Duration = Duration::from_millis(200);

        self.refresh_data();

        while !self.exit {
            if !self.paused && self.last_refresh.elapsed() >= REFRESH_INTERVAL {
                self.refresh_data();
            }

            let render_start = Instant::now();
            terminal.draw(|frame| self.draw(frame))?;
            self.last_render_duration = render_start.elapsed();

            self.handle_events()?;
        }
        Ok(())
    }

    fn refresh_data(&mut self) {
        match fetch_console(&self.agent, self.port) {
            Ok(console) => {
                self.entries = console.entries.into_iter().map(Arc::new).collect();
                self.presenter.sync(&self.entries);
                self.error = None;
                self.last_successful_fetch = Some(Instant::now());
                self.highlight_stats = fetch_highlight_stats(&self.agent, self.port);
                self.rebuild();
            }
            Err(e) => {
                tracing::debug!(error = %e, "console fetch failed");
                self.error = Some(format!("Failed to fetch console: {}", e));
            }
        }
        self.last_refresh = Instant::now();
    }

    /// Re-derives rows after entries, filter or expand states changed.
    fn rebuild(&mut self) {
        self.messages = self.presenter.present(&self.entries);
        let line_count = self.line_count();
        match self.list_state.selected() {
            Some(selected) if selected >= line_count && line_count > 0 => {
                self.list_state.select(Some(line_count - 1))
            }
            None if line_count > 0 => self.list_state.select(Some(0)),
            _ => {}
        }
    }

    fn line_count(&self) -> usize {
        self.messages.iter().map(|m| m.rows.len()).sum()
    }

    fn draw(&mut self, frame: &mut Frame) {
        self.render_ui(frame);
    }

    fn handle_events(&mut self) -> io::Result<()> {
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press {
                    self.handle_key_event(key_event);
                }
            }
        }
        Ok(())
    }

    fn handle_key_event(&mut self, key_event: KeyEvent) {
        match key_event.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => self.exit(),
            KeyCode::Char('p') | KeyCode::Char('P') => self.toggle_pause(),
            KeyCode::Char('i') | KeyCode::Char('I') => self.toggle_inspect(),
            KeyCode::Esc if self.focus == Focus::Inspect => self.toggle_inspect(),
            KeyCode::Up | KeyCode::Char('k') => self.select_previous(),
            KeyCode::Down | KeyCode::Char('j') => self.select_next(),
            KeyCode::Enter | KeyCode::Char(' ') => self.toggle_selected(),
            KeyCode::Char('a') => self.set_filter(ConsoleFilter::All),
            KeyCode::Char('w') => self.set_filter(ConsoleFilter::Warnings),
            KeyCode::Char('e') => self.set_filter(ConsoleFilter::Errors),
            KeyCode::Char('c') => self.clear(),
            _ => {}
        }
    }

    fn select_previous(&mut self) {
        if self.line_count() > 0 {
            let i = match self.list_state.selected() {
                Some(i) => i.saturating_sub(1),
                None => 0,
            };
            self.list_state.select(Some(i));
            self.follow_inspect();
        }
    }

    fn select_next(&mut self) {
        let line_count = self.line_count();
        if line_count > 0 {
            let i = match self.list_state.selected() {
                Some(i) => (i + 1).min(line_count - 1),
                None => 0,
            };
            self.list_state.select(Some(i));
            self.follow_inspect();
        }
    }

    fn selected_entry(&self) -> Option<Arc<LogEntry>> {
        let selected = self.list_state.selected()?;
        let id = console_lines(&self.messages).get(selected)?.message.entry_id;
        self.entries.iter().find(|entry| entry.id == id).cloned()
    }

    // Update inspected entry if the inspect popup is open
    fn follow_inspect(&mut self) {
        if self.focus == Focus::Inspect {
            self.inspected = self.selected_entry();
        }
    }

    fn toggle_selected(&mut self) {
        let Some(selected) = self.list_state.selected() else {
            return;
        };
        let target = console_lines(&self.messages)
            .get(selected)
            .filter(|line| line.row.collapsible)
            .map(|line| (line.message.entry_id, line.row.key.clone()));
        if let Some((entry_id, key)) = target {
            let collapsed = self.presenter.toggle(entry_id, &key);
            tracing::debug!(entry_id, key = %key, collapsed, "row toggled");
            self.rebuild();
        }
    }

    fn set_filter(&mut self, filter: ConsoleFilter) {
        self.presenter.set_filter(filter);
        self.list_state.select(Some(0));
        self.rebuild();
    }

    fn clear(&mut self) {
        match clear_console(&self.agent, self.port) {
            Ok(()) => {
                self.entries.clear();
                self.presenter.sync(&self.entries);
                self.inspected = None;
                self.focus = Focus::Console;
                self.rebuild();
            }
            Err(e) => self.error = Some(format!("Failed to clear console: {}", e)),
        }
    }

    fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    fn toggle_inspect(&mut self) {
        if self.focus == Focus::Inspect {
            self.focus = Focus::Console;
            self.inspected = None;
        } else if let Some(entry) = self.selected_entry() {
            self.inspected = Some(entry);
            self.focus = Focus::Inspect;
        }
    }

    fn exit(&mut self) {
        self.exit = true;
    }
}

impl App {
    fn render_ui(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let title = Line::from(" Devtools Console ".bold());

        let refresh_status = if self.paused {
            "⏸ PAUSED ".to_string()
        } else if let Some(last_fetch) = self.last_successful_fetch {
            let ago = format_time_ago(last_fetch.elapsed().as_nanos() as u64);
            if self.error.is_some() {
                format!("⚠ {} ", ago)
            } else {
                format!("🔄 {} ", ago)
            }
        } else {
            String::new()
        };

        let mut block = Block::bordered()
            .title(title.centered())
            .title_bottom(controls_line(self.focus, refresh_status).centered())
            .border_set(border::THICK);

        if let Some(stats) = self.highlight_stats {
            block = block.title(
                Line::from(format!(
                    " highlight: {} hits / {} misses / {} pending ",
                    stats.hits, stats.misses, stats.pending
                ))
                .cyan()
                .right_aligned(),
            );
        }

        #[cfg(feature = "dev")]
        {
            let render_time_text = format!(" {}ms ", self.last_render_duration.as_millis());
            block = block.title_bottom(Line::from(render_time_text).cyan().right_aligned());
        }

        if let Some(ref error_msg) = self.error {
            if self.last_successful_fetch.is_none() {
                let error_text = vec![
                    Line::from(""),
                    Line::from("Error").red().bold().centered(),
                    Line::from(""),
                    Line::from(error_msg.as_str()).red().centered(),
                    Line::from(""),
                    Line::from(format!(
                        "Make sure the console server is running on http://127.0.0.1:{}",
                        self.port
                    ))
                    .yellow()
                    .centered(),
                ];

                frame.render_widget(Paragraph::new(error_text).block(block), area);
                return;
            }
        }

        let inner_area = block.inner(area);
        frame.render_widget(block, area);

        render_console_panel(
            &self.messages,
            self.presenter.filter(),
            inner_area,
            frame,
            &mut self.list_state,
            self.focus == Focus::Console,
        );

        // Render inspect popup on top of everything if open
        if self.focus == Focus::Inspect {
            if let Some(ref entry) = self.inspected {
                render_inspect_popup(entry, area, frame);
            }
        }
    }
}
