use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;

use crate::history::{HistoryCache, HistoryFilter};
use crate::models::HistoryEntry;
use crate::render::{entry_detail, truncate};

struct BrowserState<'a> {
    history: &'a HistoryCache,
    filter: HistoryFilter,
    visible: Vec<&'a HistoryEntry>,
    selected: usize,
    scroll_offset: u16,
}

impl<'a> BrowserState<'a> {
    fn new(history: &'a HistoryCache, filter: HistoryFilter) -> Self {
        Self {
            history,
            filter,
            visible: history.filter(filter),
            selected: 0,
            scroll_offset: 0,
        }
    }

    fn current_entry(&self) -> Option<&HistoryEntry> {
        self.visible.get(self.selected).copied()
    }

    fn cycle_filter(&mut self) {
        self.filter = self.filter.next();
        self.visible = self.history.filter(self.filter);
        self.selected = 0;
        self.scroll_offset = 0;
    }

    fn next(&mut self) {
        if !self.visible.is_empty() && self.selected < self.visible.len() - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }
}

pub fn run_browse(history: &HistoryCache, filter: HistoryFilter) -> Result<()> {
    if history.is_empty() {
        println!("No analysis data found. Start by scanning a job!");
        return Ok(());
    }

    let mut state = BrowserState::new(history, filter);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut BrowserState,
) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
                KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
                KeyCode::Char('f') => state.cycle_filter(),
                _ => {}
            }
            list_state.select(if state.visible.is_empty() { None } else { Some(state.selected) });
        }
    }
    Ok(())
}

fn verdict_style(entry: &HistoryEntry) -> Style {
    if entry.is_real() {
        Style::default().fg(Color::Green)
    } else if entry.risk_level == "critical" {
        Style::default().fg(Color::Magenta)
    } else {
        Style::default().fg(Color::Red)
    }
}

fn draw(frame: &mut Frame, state: &BrowserState, list_state: &mut ListState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(35),
            Constraint::Percentage(65),
        ])
        .split(frame.area());

    // Left panel: entries under the active filter
    let items: Vec<ListItem> = state
        .visible
        .iter()
        .map(|entry| {
            let marker = if entry.is_real() { "+" } else { "!" };
            let line = format!("{} {} | {}", marker, truncate(&entry.title, 28), truncate(&entry.company, 18));
            ListItem::new(line).style(verdict_style(entry))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " History [{}] ({}/{}) ",
            state.filter.label(),
            state.visible.len(),
            state.history.len()
        )))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: result card
    let detail = build_detail(state);
    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(" Result "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));

    frame.render_widget(detail_widget, chunks[1]);

    // Footer help
    let help_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let help = Paragraph::new(" j/k:navigate  J/K:scroll  f:filter  q:quit")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, help_area[1]);
}

fn build_detail(state: &BrowserState) -> Text<'static> {
    let Some(entry) = state.current_entry() else {
        return Text::raw(format!("No {} entries", state.filter.label()));
    };

    let mut lines: Vec<Line> = Vec::new();
    let body = entry_detail(entry);
    let mut body_lines = body.lines();

    // Title line in bold, verdict line colored
    if let Some(title) = body_lines.next() {
        lines.push(Line::from(Span::styled(
            title.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
    }
    for line in body_lines {
        if line.starts_with("Verdict:") {
            lines.push(Line::from(Span::styled(line.to_string(), verdict_style(entry))));
        } else {
            lines.push(Line::from(line.to_string()));
        }
    }

    Text::from(lines)
}
