use super::Component;
use crate::event::AppMsg;
use crate::widgets::common::focused_block;
use crate::widgets::theme::get_theme;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Gauge, Paragraph, Widget},
};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum DumpStatus {
    Idle,
    Running,
    Completed(PathBuf),
    Cancelled,
    Failed(String),
}

#[derive(Debug)]
pub struct StatusState {
    pub status: DumpStatus,
    pub applied_name: Option<String>,
    pub scale: f32,
    pub current: usize,
    pub total: usize,
}

impl Default for StatusState {
    fn default() -> Self {
        Self {
            status: DumpStatus::Idle,
            applied_name: None,
            scale: 1.0,
            current: 0,
            total: 0,
        }
    }
}

impl StatusState {
    pub fn is_running(&self) -> bool {
        self.status == DumpStatus::Running
    }

    fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.current as f64 / self.total as f64).clamp(0.0, 1.0)
    }
}

impl Component for StatusState {
    fn update(&mut self, msg: &AppMsg) -> Option<AppMsg> {
        match msg {
            AppMsg::DumpStarted => {
                self.status = DumpStatus::Running;
                self.current = 0;
                self.total = 0;
            }
            AppMsg::DumpProgress(current, total) => {
                self.current = *current;
                self.total = *total;
            }
            AppMsg::DumpCompleted(path) => self.status = DumpStatus::Completed(path.clone()),
            AppMsg::DumpCancelled => self.status = DumpStatus::Cancelled,
            AppMsg::DumpFailed(error) => self.status = DumpStatus::Failed(error.clone()),
            _ => {}
        }
        None
    }

    fn render(&mut self, area: Rect, buf: &mut Buffer, is_focused: bool) {
        let theme = get_theme();
        let block = focused_block("Status", is_focused);
        let inner = block.inner(area);
        block.render(area, buf);

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(inner);

        let applied = match &self.applied_name {
            Some(name) => Span::styled(name.clone(), Style::default().fg(theme.applied_marker)),
            None => Span::styled("system cursors", Style::default().fg(theme.text_secondary)),
        };
        let (dump_text, dump_color) = match &self.status {
            DumpStatus::Idle => ("Dump: idle".to_string(), theme.status_idle),
            DumpStatus::Running => (
                format!("Dump: {}/{}", self.current, self.total),
                theme.status_running,
            ),
            DumpStatus::Completed(path) => {
                (format!("Dump: saved {}", path.display()), theme.status_completed)
            }
            DumpStatus::Cancelled => ("Dump: cancelled".to_string(), theme.status_idle),
            DumpStatus::Failed(e) => (format!("Dump: failed ({})", e), theme.status_failed),
        };

        let lines = vec![
            Line::from(vec![Span::raw("Applied: "), applied]),
            Line::from(format!("Scale: {:.2}", self.scale)),
            Line::from(Span::styled(dump_text, Style::default().fg(dump_color))),
        ];
        Paragraph::new(lines).render(chunks[0], buf);

        if self.is_running() {
            Gauge::default()
                .gauge_style(Style::default().fg(theme.status_running))
                .ratio(self.ratio())
                .label(format!("{}/{}", self.current, self.total))
                .render(chunks[1], buf);
        } else {
            Paragraph::new(vec![
                Line::from("Enter open · e details · r restore · x remove"),
                Line::from("d dump · Tab focus · q quit"),
            ])
            .style(Style::default().fg(theme.text_secondary))
            .render(chunks[1], buf);
        }
    }
}
