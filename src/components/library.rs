use super::Component;
use crate::event::AppMsg;
use crate::model::Cape;
use crate::state::DoubleAction;
use crate::widgets::common::focused_block;
use crate::widgets::theme::get_theme;
use crossterm::event::KeyCode;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget},
};

/// What the list shows for one cape.
#[derive(Debug, Clone, PartialEq)]
pub struct CapeRow {
    pub identifier: String,
    pub name: String,
    pub author: String,
    pub version: f64,
    pub cursor_count: usize,
    pub hidpi: bool,
}

impl CapeRow {
    pub fn from_cape(cape: &Cape) -> Self {
        Self {
            identifier: cape.identifier().to_string(),
            name: cape.name().to_string(),
            author: cape.author().to_string(),
            version: cape.version(),
            cursor_count: cape.cursor_count(),
            hidpi: cape.is_hidpi(),
        }
    }
}

#[derive(Debug, Default)]
pub struct LibraryState {
    pub rows: Vec<CapeRow>,
    pub applied: Option<String>,
    /// What Enter does with the selected cape.
    pub double_action: DoubleAction,
    list_state: ListState,
    scroll_state: ScrollbarState,
}

impl LibraryState {
    /// Replaces the rows, keeping the selection on the same cape when it is
    /// still present.
    pub fn set_rows(&mut self, rows: Vec<CapeRow>) {
        let selected = self.selected().map(|r| r.identifier.clone());
        self.rows = rows;

        let index = selected
            .and_then(|id| self.rows.iter().position(|r| r.identifier == id))
            .or(if self.rows.is_empty() { None } else { Some(0) })
            .map(|i| i.min(self.rows.len().saturating_sub(1)));
        self.list_state.select(index);
    }

    pub fn set_applied(&mut self, applied: Option<String>) {
        self.applied = applied;
    }

    pub fn selected(&self) -> Option<&CapeRow> {
        self.list_state.selected().and_then(|i| self.rows.get(i))
    }

    fn select_next(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) if i + 1 < self.rows.len() => i + 1,
            Some(i) => i,
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    fn select_previous(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let i = self.list_state.selected().map_or(0, |i| i.saturating_sub(1));
        self.list_state.select(Some(i));
    }
}

impl Component for LibraryState {
    fn update(&mut self, msg: &AppMsg) -> Option<AppMsg> {
        let AppMsg::Key(key) = msg else {
            return None;
        };

        match key.code {
            KeyCode::Down | KeyCode::Char('j') => self.select_next(),
            KeyCode::Up | KeyCode::Char('k') => self.select_previous(),
            KeyCode::Enter => {
                let action = self.double_action;
                return self.selected().map(|r| match action {
                    DoubleAction::Apply => AppMsg::ApplyRequested(r.identifier.clone()),
                    DoubleAction::Edit => AppMsg::EditRequested(r.identifier.clone()),
                });
            }
            KeyCode::Char('e') => {
                return self.selected().map(|r| AppMsg::EditRequested(r.identifier.clone()));
            }
            KeyCode::Char('x') | KeyCode::Delete => {
                return self.selected().map(|r| AppMsg::RemoveRequested(r.identifier.clone()));
            }
            KeyCode::Char('r') => return Some(AppMsg::RestoreRequested),
            KeyCode::Char('d') => return Some(AppMsg::DumpRequested),
            _ => {}
        }
        None
    }

    fn render(&mut self, area: Rect, buf: &mut Buffer, is_focused: bool) {
        let theme = get_theme();
        let title = format!("Library ({})", self.rows.len());
        let block = focused_block(&title, is_focused);

        let items: Vec<ListItem> = self
            .rows
            .iter()
            .map(|row| {
                let applied = self.applied.as_deref() == Some(row.identifier.as_str());
                let marker = if applied {
                    Span::styled("● ", Style::default().fg(theme.applied_marker))
                } else {
                    Span::raw("  ")
                };
                let mut detail = format!(
                    "  {} · v{:.1} · {} cursors",
                    row.author, row.version, row.cursor_count
                );
                if row.hidpi {
                    detail.push_str(" · HiDPI");
                }
                ListItem::new(Line::from(vec![
                    marker,
                    Span::styled(row.name.clone(), Style::default().fg(theme.text_primary)),
                    Span::styled(detail, Style::default().fg(theme.text_secondary)),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .bg(theme.selection_bg)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");

        StatefulWidget::render(list, area, buf, &mut self.list_state);

        self.scroll_state = self
            .scroll_state
            .content_length(self.rows.len())
            .position(self.list_state.selected().unwrap_or(0));
        let scrollbar = Scrollbar::default().orientation(ScrollbarOrientation::VerticalRight);
        StatefulWidget::render(scrollbar, area, buf, &mut self.scroll_state);
    }
}
