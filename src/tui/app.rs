//! TUI application state and main event loop

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind};
use futures::StreamExt;
use ratatui::DefaultTerminal;
use tokio::task::JoinHandle;

use super::ui;
use crate::lifecycle::{LifecycleController, OpStatus, Operation};
use crate::models::{TokenId, TokenRecord};
use crate::tokens::Expiry;

/// Countdown refresh interval
const TICK: Duration = Duration::from_secs(1);

/// Everything the UI needs to draw one token.
pub struct TokenView {
    pub record: TokenRecord,
    pub expiry: Expiry,
    pub refresh: OpStatus,
    pub revoke: OpStatus,
}

/// Application state
pub struct App {
    controller: Arc<LifecycleController>,
    /// Whether the app should exit
    pub should_exit: bool,
    /// Index of the highlighted token
    pub selected: usize,
    /// Last local error, shown in the status bar
    pub notice: Option<String>,
    /// Refresh/revoke tasks started from the UI
    tasks: Vec<JoinHandle<()>>,
}

impl App {
    pub fn new(controller: Arc<LifecycleController>) -> Self {
        Self {
            controller,
            should_exit: false,
            selected: 0,
            notice: None,
            tasks: Vec::new(),
        }
    }

    /// Current tokens with their expiry and operation status.
    pub fn views(&self) -> Vec<TokenView> {
        self.controller
            .tokens()
            .into_iter()
            .map(|record| TokenView {
                expiry: self.controller.expiry(&record),
                refresh: self.controller.status(record.id, Operation::Refresh),
                revoke: self.controller.status(record.id, Operation::Revoke),
                record,
            })
            .collect()
    }

    fn selected_id(&self) -> Option<TokenId> {
        self.controller.tokens().get(self.selected).map(|t| t.id)
    }

    /// Keep the selection inside the list after tokens disappear.
    fn clamp_selection(&mut self) {
        let len = self.controller.tokens().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_exit = true,
            KeyCode::Char('j') | KeyCode::Down => {
                self.selected = self.selected.saturating_add(1);
                self.clamp_selection();
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Char('r') => self.start(Operation::Refresh),
            KeyCode::Char('v') => self.start(Operation::Revoke),
            KeyCode::Char('d') => self.delete_selected(),
            _ => {}
        }
    }

    /// Start an operation on the selected token unless one is already running.
    fn start(&mut self, op: Operation) {
        let Some(id) = self.selected_id() else {
            return;
        };
        if self.controller.status(id, op) == OpStatus::Loading {
            return;
        }

        self.tasks.retain(|h| !h.is_finished());
        let controller = Arc::clone(&self.controller);
        self.tasks.push(tokio::spawn(async move {
            match op {
                Operation::Refresh => controller.refresh(id).await,
                Operation::Revoke => controller.revoke(id).await,
            };
        }));
    }

    fn delete_selected(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };
        match self.controller.delete(id) {
            Ok(()) => self.notice = None,
            Err(e) => self.notice = Some(format!("Failed to delete token: {}", e)),
        }
        self.clamp_selection();
    }

    /// Cancel in-flight operations and pending status resets.
    pub fn teardown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.controller.shutdown();
    }
}

/// Run the TUI until the user quits.
pub async fn run(controller: Arc<LifecycleController>) -> Result<()> {
    let mut app = App::new(controller);
    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, &mut app).await;
    ratatui::restore();
    app.teardown();
    result
}

async fn run_app(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(TICK);
    let mut status = app.controller.subscribe();

    while !app.should_exit {
        app.clamp_selection();
        let views = app.views();
        terminal.draw(|frame| ui::render(frame, app, &views))?;

        tokio::select! {
            _ = tick.tick() => {}
            // Redraw on every status transition; lagging just means one redraw for many
            event = status.recv() => {
                if let Ok(event) = event {
                    tracing::debug!("Token {} {} -> {:?}", event.id, event.op, event.status);
                }
            }
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) => app.handle_key(key),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => app.should_exit = true,
            },
        }
    }

    Ok(())
}
