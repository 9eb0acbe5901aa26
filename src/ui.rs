use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::debug;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use std::{io, time::Duration};
use textwrap::wrap;
use tui_input::{backend::crossterm::EventHandler, Input};

use tgcrm::crm::{Priority, SearchResults, TaskStatus, Workspace};
use tgcrm::{ChatSnapshot, ChatTarget, Client, ClientStatus, Config, Roster};
use tgcrm::Direction as MessageDirection;

// Export types needed by main module
pub use ratatui::Terminal;
pub use ratatui::backend::CrosstermBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Dashboard,
    Clients,
    Deals,
    Tasks,
    Settings,
}

impl Tab {
    const ALL: [Tab; 5] = [Tab::Dashboard, Tab::Clients, Tab::Deals, Tab::Tasks, Tab::Settings];

    fn label(&self) -> &'static str {
        match self {
            Tab::Dashboard => "Dashboard",
            Tab::Clients => "Clients",
            Tab::Deals => "Deals",
            Tab::Tasks => "Tasks",
            Tab::Settings => "Settings",
        }
    }

    fn index(&self) -> usize {
        Tab::ALL.iter().position(|t| t == self).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Sidebar,
    List,
    Search,
    Chat,
}

/// What the main loop should do after a key press.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    Quit,
    OpenChat(ChatTarget),
    CloseChat,
    Send(String),
}

/// Everything the UI renders that it does not own itself.
pub struct ViewData<'a> {
    pub roster: &'a Roster,
    pub workspace: &'a Workspace,
    pub chat: &'a ChatSnapshot,
    pub config: &'a Config,
}

impl<'a> ViewData<'a> {
    fn results(&self, query: &str) -> SearchResults<'a> {
        self.workspace.search(query, &self.roster.clients)
    }
}

pub struct DashboardUI {
    active_tab: Tab,
    focus: Focus,
    search: Input,
    selected_client: usize,
    chat_input: Input,
    last_send_seq: u64,
}

impl DashboardUI {
    pub fn new() -> Self {
        DashboardUI {
            active_tab: Tab::Dashboard,
            focus: Focus::Sidebar,
            search: Input::default(),
            selected_client: 0,
            chat_input: Input::default(),
            last_send_seq: 0,
        }
    }

    /// Pick up the outcome of a finished send: the draft is cleared after a
    /// success and left as typed after a failure.
    pub fn sync_chat(&mut self, chat: &ChatSnapshot) {
        if chat.send_seq != self.last_send_seq {
            self.last_send_seq = chat.send_seq;
            self.chat_input = Input::new(chat.draft.clone());
        }
    }

    fn next_focus(&self, chat_open: bool) -> Focus {
        match self.focus {
            Focus::Sidebar => Focus::List,
            Focus::List => Focus::Search,
            Focus::Search if chat_open => Focus::Chat,
            Focus::Search | Focus::Chat => Focus::Sidebar,
        }
    }

    pub fn handle_input(&mut self, view: &ViewData) -> Result<Option<UiAction>> {
        if !event::poll(Duration::from_millis(10))? {
            return Ok(None);
        }
        let Event::Key(key) = event::read()? else {
            return Ok(None);
        };
        if key.kind != KeyEventKind::Press {
            return Ok(None);
        }
        Ok(self.handle_key(key, view))
    }

    fn handle_key(&mut self, key: KeyEvent, view: &ViewData) -> Option<UiAction> {
        let chat_open = view.chat.target.is_some();

        match key.code {
            KeyCode::Esc => {
                // Innermost first: leave the search box, then the chat, then quit
                if self.focus == Focus::Search {
                    self.focus = Focus::List;
                    return None;
                }
                if chat_open {
                    self.focus = Focus::List;
                    return Some(UiAction::CloseChat);
                }
                return Some(UiAction::Quit);
            }
            KeyCode::Tab => {
                self.focus = self.next_focus(chat_open);
                return None;
            }
            _ => {}
        }

        match self.focus {
            Focus::Search => {
                if key.code == KeyCode::Enter {
                    self.focus = Focus::List;
                    self.selected_client = 0;
                } else {
                    self.search.handle_event(&Event::Key(key));
                    self.selected_client = 0;
                }
            }
            Focus::Chat => {
                if view.chat.sending {
                    // Read-only while a send is in flight
                    return None;
                }
                if key.code == KeyCode::Enter {
                    if !self.chat_input.value().is_empty() {
                        return Some(UiAction::Send(self.chat_input.value().to_string()));
                    }
                } else {
                    self.chat_input.handle_event(&Event::Key(key));
                }
            }
            Focus::Sidebar => match key.code {
                KeyCode::Up => {
                    let i = self.active_tab.index();
                    self.active_tab = Tab::ALL[(i + Tab::ALL.len() - 1) % Tab::ALL.len()];
                }
                KeyCode::Down => {
                    let i = self.active_tab.index();
                    self.active_tab = Tab::ALL[(i + 1) % Tab::ALL.len()];
                }
                KeyCode::Enter | KeyCode::Right => self.focus = Focus::List,
                KeyCode::Char('/') => self.focus = Focus::Search,
                _ => {}
            },
            Focus::List => match key.code {
                KeyCode::Char('/') => self.focus = Focus::Search,
                KeyCode::Left => self.focus = Focus::Sidebar,
                KeyCode::Up => {
                    self.selected_client = self.selected_client.saturating_sub(1);
                }
                KeyCode::Down => {
                    let count = view.results(self.search.value()).clients.len();
                    if self.selected_client + 1 < count {
                        self.selected_client += 1;
                    }
                }
                KeyCode::Enter if self.active_tab == Tab::Clients => {
                    let results = view.results(self.search.value());
                    if let Some(client) = results.clients.get(self.selected_client) {
                        match client.chat_target() {
                            Some(target) => {
                                debug!("UI: opening chat with {}", client.display_name);
                                self.chat_input = Input::default();
                                self.focus = Focus::Chat;
                                return Some(UiAction::OpenChat(target));
                            }
                            None => debug!("UI: {} has no Telegram chat", client.display_name),
                        }
                    }
                }
                _ => {}
            },
        }

        None
    }

    pub fn draw<B: Backend>(&self, frame: &mut Frame<B>, view: &ViewData) {
        let size = frame.size();

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(20),      // Sidebar
                Constraint::Min(20),         // Main area
            ])
            .split(size);

        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),       // Search bar
                Constraint::Min(5),          // Active view
                Constraint::Length(1),       // Help line
            ])
            .split(chunks[1]);

        self.draw_sidebar(frame, chunks[0]);

        // Search bar
        let search_block = Block::default()
            .title("Search clients, deals, tasks (/)")
            .borders(Borders::ALL)
            .border_style(self.focus_style(Focus::Search));
        frame.render_widget(Paragraph::new(self.search.value()).block(search_block), main_chunks[0]);

        let results = view.results(self.search.value());

        // Content, with the chat window beside it when open
        let content_area = if view.chat.target.is_some() {
            let split = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(main_chunks[1]);
            self.draw_chat(frame, split[1], view.chat);
            split[0]
        } else {
            main_chunks[1]
        };

        match self.active_tab {
            Tab::Dashboard => draw_dashboard(frame, content_area, view, &results),
            Tab::Clients => self.draw_clients(frame, content_area, &results),
            Tab::Deals => draw_deals(frame, content_area, view.workspace, &results),
            Tab::Tasks => draw_tasks(frame, content_area, &results),
            Tab::Settings => draw_settings(frame, content_area, view),
        }

        let help = Paragraph::new(Line::from(vec![Span::styled(
            "ESC close/quit | TAB focus | ↑↓ select | ENTER open/send | / search",
            Style::default().fg(Color::Gray),
        )]));
        frame.render_widget(help, main_chunks[2]);

        // Cursor follows whichever text field has focus
        match self.focus {
            Focus::Search => frame.set_cursor(
                main_chunks[0].x + self.search.cursor() as u16 + 1,
                main_chunks[0].y + 1,
            ),
            Focus::Chat if view.chat.target.is_some() => {
                let area = main_chunks[1];
                let chat_x = area.x + area.width / 2;
                frame.set_cursor(
                    chat_x + self.chat_input.cursor() as u16 + 1,
                    area.y + area.height.saturating_sub(2),
                );
            }
            _ => {}
        }
    }

    fn focus_style(&self, focus: Focus) -> Style {
        if self.focus == focus {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        }
    }

    fn draw_sidebar<B: Backend>(&self, frame: &mut Frame<B>, area: Rect) {
        let items: Vec<ListItem> = Tab::ALL
            .iter()
            .map(|tab| {
                let marker = if *tab == self.active_tab { "> " } else { "  " };
                ListItem::new(format!("{}{}", marker, tab.label()))
            })
            .collect();

        let sidebar = List::new(items).block(
            Block::default()
                .title("TG CRM")
                .borders(Borders::ALL)
                .border_style(self.focus_style(Focus::Sidebar)),
        );
        frame.render_widget(sidebar, area);
    }

    fn draw_clients<B: Backend>(&self, frame: &mut Frame<B>, area: Rect, results: &SearchResults) {
        let items: Vec<ListItem> = results
            .clients
            .iter()
            .enumerate()
            .map(|(i, client)| {
                let marker = if i == self.selected_client { ">" } else { " " };
                let tags = if client.tags.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", client.tags.join(", "))
                };
                let content = format!(
                    "{} ({}) {} {} · {}{} · {}",
                    marker,
                    client.avatar_initial,
                    client.display_name,
                    client.handle,
                    client.status,
                    tags,
                    client.last_seen
                );
                ListItem::new(content).style(client_style(client))
            })
            .collect();

        let title = format!("Clients ({})", results.clients.len());
        let list = List::new(items).block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(self.focus_style(Focus::List)),
        );
        frame.render_widget(list, area);
    }

    fn draw_chat<B: Backend>(&self, frame: &mut Frame<B>, area: Rect, chat: &ChatSnapshot) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(3)])
            .split(area);

        let title = chat
            .target
            .as_ref()
            .map(|t| t.title.clone())
            .unwrap_or_default();
        let block = Block::default().title(title).borders(Borders::ALL);

        if chat.loading {
            frame.render_widget(Paragraph::new("Loading messages...").block(block), chunks[0]);
        } else if chat.messages.is_empty() {
            frame.render_widget(
                Paragraph::new("No messages yet.\nStart the conversation with this client.")
                    .block(block)
                    .wrap(Wrap { trim: true }),
                chunks[0],
            );
        } else {
            let wrap_width = chunks[0].width.saturating_sub(2).max(1) as usize;
            let items: Vec<ListItem> = chat
                .messages
                .iter()
                .flat_map(|m| {
                    let mut lines = Vec::new();
                    if m.direction == MessageDirection::Incoming {
                        if let Some(name) = &m.sender_name {
                            lines.push((name.clone(), Style::default().fg(Color::Cyan)));
                        }
                    }
                    let body = format!("{}  {}", m.text, m.timestamp);
                    let style = match m.direction {
                        MessageDirection::Outgoing => Style::default().fg(Color::Blue),
                        MessageDirection::Incoming => Style::default(),
                    };
                    for line in wrap(&body, wrap_width) {
                        let text = match m.direction {
                            MessageDirection::Outgoing => format!("{:>width$}", line, width = wrap_width),
                            MessageDirection::Incoming => line.into_owned(),
                        };
                        lines.push((text, style));
                    }
                    lines.into_iter().map(|(text, style)| ListItem::new(text).style(style))
                })
                .collect();

            let mut list_state = ListState::default();
            if !items.is_empty() {
                list_state.select(Some(items.len() - 1));
            }
            let list = List::new(items).block(block).highlight_style(Style::default());
            frame.render_stateful_widget(list, chunks[0], &mut list_state);
        }

        let input_title = if chat.sending { "Sending..." } else { "Message" };
        let input = Paragraph::new(self.chat_input.value()).block(
            Block::default()
                .title(input_title)
                .borders(Borders::ALL)
                .border_style(self.focus_style(Focus::Chat)),
        );
        frame.render_widget(input, chunks[1]);
    }
}

fn client_style(client: &Client) -> Style {
    match client.status {
        ClientStatus::Active => Style::default().fg(Color::Green),
        ClientStatus::New => Style::default().fg(Color::Cyan),
        ClientStatus::Inactive => Style::default().fg(Color::DarkGray),
        ClientStatus::Other(_) => Style::default(),
    }
}

fn priority_style(priority: Priority) -> Style {
    match priority {
        Priority::High => Style::default().fg(Color::Red),
        Priority::Medium => Style::default().fg(Color::Yellow),
        Priority::Low => Style::default().fg(Color::Gray),
    }
}

fn draw_dashboard<B: Backend>(f: &mut Frame<B>, area: Rect, view: &ViewData, results: &SearchResults) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(3)])
        .split(area);

    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(rows[0]);

    let stats = view.roster.stats;
    let loaded = view.roster.loaded;
    let card_values = [
        ("Total clients", stats.total_clients),
        ("Active clients", stats.active_clients),
        ("Messages", stats.total_messages),
        ("Today", stats.today_messages),
    ];
    for (i, (label, value)) in card_values.iter().enumerate() {
        let text = if loaded { value.to_string() } else { "…".to_string() };
        let card = Paragraph::new(Line::from(Span::styled(
            text,
            Style::default().add_modifier(Modifier::BOLD),
        )))
        .block(Block::default().title(*label).borders(Borders::ALL));
        f.render_widget(card, cards[i]);
    }

    let lower = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);

    let deals: Vec<ListItem> = results
        .deals
        .iter()
        .take(3)
        .map(|d| ListItem::new(format!("{} · {} ₽ · {}", d.client, d.amount, d.stage)))
        .collect();
    f.render_widget(
        List::new(deals).block(Block::default().title("Active deals").borders(Borders::ALL)),
        lower[0],
    );

    let mut open: Vec<_> = results.tasks.iter().filter(|t| t.is_open()).collect();
    open.sort_by_key(|t| t.priority);
    let tasks: Vec<ListItem> = open
        .iter()
        .map(|t| ListItem::new(format!("{} · {}", t.title, t.due)).style(priority_style(t.priority)))
        .collect();
    f.render_widget(
        List::new(tasks).block(Block::default().title("Open tasks").borders(Borders::ALL)),
        lower[1],
    );
}

fn draw_deals<B: Backend>(f: &mut Frame<B>, area: Rect, workspace: &Workspace, results: &SearchResults) {
    let summary = workspace.pipeline();
    let items: Vec<ListItem> = results
        .deals
        .iter()
        .map(|d| {
            ListItem::new(format!(
                "{:<20} {:>9} ₽  {:<12} {:>3}%  {}",
                d.client, d.amount, d.stage, d.probability, d.channel
            ))
        })
        .collect();
    let stages = summary
        .per_stage
        .iter()
        .map(|(stage, n)| format!("{} {}", stage, n))
        .collect::<Vec<_>>()
        .join(" | ");
    let title = format!("Deals · weighted {} ₽ · {}", summary.weighted_total, stages);
    f.render_widget(
        List::new(items).block(Block::default().title(title).borders(Borders::ALL)),
        area,
    );
}

fn draw_tasks<B: Backend>(f: &mut Frame<B>, area: Rect, results: &SearchResults) {
    let items: Vec<ListItem> = results
        .tasks
        .iter()
        .map(|t| {
            let check = if t.status == TaskStatus::Completed { "[x]" } else { "[ ]" };
            ListItem::new(format!(
                "{} {:<32} {:<16} {:<12} {}",
                check, t.title, t.due, t.assignee, t.status
            ))
            .style(priority_style(t.priority))
        })
        .collect();
    f.render_widget(
        List::new(items).block(Block::default().title("Tasks").borders(Borders::ALL)),
        area,
    );
}

fn draw_settings<B: Backend>(f: &mut Frame<B>, area: Rect, view: &ViewData) {
    let config = view.config;
    let mut lines = vec![
        Line::from(format!("Bridge endpoint: {}", config.endpoint)),
        Line::from(format!("Chat poll interval: {} ms", config.poll_interval_ms)),
        Line::from(format!("Roster refresh interval: {} ms", config.roster_interval_ms)),
        Line::from(format!(
            "Request timeout: {}",
            config
                .request_timeout_secs
                .map(|s| format!("{} s", s))
                .unwrap_or_else(|| "none".to_string())
        )),
        Line::from(format!("Log file: {}", config.log_file.display())),
        Line::from(""),
        Line::from(Span::styled("Connected channels", Style::default().add_modifier(Modifier::BOLD))),
    ];
    for channel in &view.workspace.channels {
        lines.push(Line::from(format!(
            "  {} · {:?} · {} · {}",
            channel.name,
            channel.kind,
            channel.audience,
            if channel.active { "active" } else { "paused" }
        )));
    }
    f.render_widget(
        Paragraph::new(lines)
            .block(Block::default().title("Settings").borders(Borders::ALL))
            .wrap(Wrap { trim: false }),
        area,
    );
}

pub fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

pub fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn open_chat(sending: bool) -> ChatSnapshot {
        ChatSnapshot {
            target: Some(ChatTarget::new(100, "Alexander")),
            sending,
            ..ChatSnapshot::default()
        }
    }

    #[test]
    fn test_esc_leaves_search_before_closing_chat() {
        let roster = Roster::default();
        let workspace = Workspace::sample();
        let config = Config::default();
        let chat = open_chat(false);
        let view = ViewData { roster: &roster, workspace: &workspace, chat: &chat, config: &config };

        let mut ui = DashboardUI::new();
        ui.focus = Focus::Search;
        assert_eq!(ui.handle_key(key(KeyCode::Esc), &view), None);
        assert_eq!(ui.focus, Focus::List);
        assert_eq!(ui.handle_key(key(KeyCode::Esc), &view), Some(UiAction::CloseChat));
    }

    #[test]
    fn test_esc_without_chat_quits() {
        let roster = Roster::default();
        let workspace = Workspace::sample();
        let config = Config::default();
        let chat = ChatSnapshot::default();
        let view = ViewData { roster: &roster, workspace: &workspace, chat: &chat, config: &config };

        let mut ui = DashboardUI::new();
        assert_eq!(ui.handle_key(key(KeyCode::Esc), &view), Some(UiAction::Quit));
    }

    #[test]
    fn test_chat_input_read_only_while_sending() {
        let roster = Roster::default();
        let workspace = Workspace::sample();
        let config = Config::default();
        let mut ui = DashboardUI::new();
        ui.focus = Focus::Chat;

        let busy = open_chat(true);
        let view = ViewData { roster: &roster, workspace: &workspace, chat: &busy, config: &config };
        assert_eq!(ui.handle_key(key(KeyCode::Char('x')), &view), None);
        assert_eq!(ui.handle_key(key(KeyCode::Enter), &view), None);
        assert_eq!(ui.chat_input.value(), "");

        let idle = open_chat(false);
        let view = ViewData { roster: &roster, workspace: &workspace, chat: &idle, config: &config };
        ui.handle_key(key(KeyCode::Char('x')), &view);
        assert_eq!(
            ui.handle_key(key(KeyCode::Enter), &view),
            Some(UiAction::Send("x".to_string()))
        );
    }

    #[test]
    fn test_sync_chat_takes_draft_after_send_completes() {
        let mut ui = DashboardUI::new();
        ui.chat_input = Input::new("hello".to_string());

        let mut chat = open_chat(false);
        ui.sync_chat(&chat);
        assert_eq!(ui.chat_input.value(), "hello");

        chat.send_seq = 1;
        ui.sync_chat(&chat);
        assert_eq!(ui.chat_input.value(), "");
    }
}
