//! UI loop and notification board.
//!
//! The board is owned by a single task, the UI loop. Anything that blocks
//! (focus requests, window scans, reloading the mapping) is sent to the
//! blocking pool, and its result comes back to the loop as a [`UiEvent`].
//! Workers never see the board.

use anyhow::{Context, Result};
use notifier_ipc::{CardSummary, HookPayload, Request, Response, WindowEntry};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::CardsConfig;
use crate::focus::activate::{WindowActivator, WindowId};
use crate::focus::connection::Connector;
use crate::focus::enumerate::WindowSearch;
use crate::focus::error::FocusError;
use crate::focus::mapping::ConfigError;
use crate::focus::{FocusOutcome, FocusReport, FocusService};
use crate::notification::Card;

/// How often expired cards and status lines are swept
const SWEEP_INTERVAL: Duration = Duration::from_millis(500);

/// Blocking focus operations the UI loop hands to workers.
pub trait FocusBackend: Send + Sync + 'static {
    fn focus_project(&self, payload: &HookPayload) -> FocusReport;
    fn focus_window(&self, window: WindowId) -> FocusReport;
    fn open_editor_windows(&self) -> Result<Vec<WindowEntry>, FocusError>;
    fn reload(&self) -> Result<(), ConfigError>;
}

impl<C, S> FocusBackend for FocusService<C, S>
where
    C: Connector + 'static,
    C::Handle: WindowActivator,
    S: WindowSearch + 'static,
{
    fn focus_project(&self, payload: &HookPayload) -> FocusReport {
        FocusService::focus_project(self, payload)
    }

    fn focus_window(&self, window: WindowId) -> FocusReport {
        FocusService::focus_window(self, window)
    }

    fn open_editor_windows(&self) -> Result<Vec<WindowEntry>, FocusError> {
        FocusService::open_editor_windows(self)
    }

    fn reload(&self) -> Result<(), ConfigError> {
        FocusService::reload(self)
    }
}

type Reply = oneshot::Sender<Response>;

/// Messages processed by the UI loop
#[derive(Debug)]
pub enum UiEvent {
    /// Request from an IPC client
    Request { request: Request, reply: Reply },
    /// A focus worker finished
    FocusFinished {
        report: FocusReport,
        reply: Option<Reply>,
    },
    /// An editor window scan finished
    ShortcutsScanned {
        result: Result<Vec<WindowEntry>, String>,
        reply: Option<Reply>,
    },
    /// A worker produced a plain response
    Deliver { response: Response, reply: Reply },
    Shutdown,
}

/// Transient feedback line under the cards
#[derive(Debug, Clone)]
struct Status {
    message: String,
    ok: bool,
    shown: Instant,
}

/// Cards on screen, newest first, plus the status line and shortcut bar.
#[derive(Debug)]
pub struct Board {
    cards: VecDeque<Card>,
    next_id: u64,
    status: Option<Status>,
    shortcuts: Vec<WindowEntry>,
    config: CardsConfig,
}

impl Board {
    pub fn new(config: CardsConfig) -> Self {
        Self {
            cards: VecDeque::new(),
            next_id: 1,
            status: None,
            shortcuts: Vec::new(),
            config,
        }
    }

    /// Put a new card on top. Returns its id.
    pub fn add(&mut self, payload: HookPayload) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.cards.push_front(Card::new(id, payload));
        while self.cards.len() > self.config.max_cards.max(1) {
            self.cards.pop_back();
        }
        id
    }

    pub fn card(&self, id: u64) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.cards.len();
        self.cards.retain(|c| c.id != id);
        self.cards.len() != before
    }

    pub fn clear_all(&mut self) {
        self.cards.clear();
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn set_status(&mut self, message: String, ok: bool, now: Instant) {
        self.status = Some(Status {
            message,
            ok,
            shown: now,
        });
    }

    /// Status line if it has not timed out yet, with its success flag.
    pub fn status(&self, now: Instant) -> Option<(&str, bool)> {
        let ttl = Duration::from_secs(self.config.status_secs);
        self.status
            .as_ref()
            .filter(|s| now.duration_since(s.shown) < ttl)
            .map(|s| (s.message.as_str(), s.ok))
    }

    /// Drop timed-out cards and status. Returns the number of cards removed.
    pub fn expire(&mut self, now: Instant) -> usize {
        let ttl = Duration::from_secs(self.config.auto_dismiss_secs);
        let before = self.cards.len();
        self.cards.retain(|c| now.duration_since(c.created) < ttl);

        let status_ttl = Duration::from_secs(self.config.status_secs);
        if self
            .status
            .as_ref()
            .is_some_and(|s| now.duration_since(s.shown) >= status_ttl)
        {
            self.status = None;
        }
        before - self.cards.len()
    }

    pub fn set_shortcuts(&mut self, entries: Vec<WindowEntry>) {
        self.shortcuts = entries;
    }

    pub fn shortcuts(&self) -> &[WindowEntry] {
        &self.shortcuts
    }

    pub fn summaries(&self) -> Vec<CardSummary> {
        self.cards.iter().map(Card::summary).collect()
    }
}

/// Sender side used by the IPC server to talk to the UI loop
#[derive(Debug, Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl UiHandle {
    /// Send a request and wait for its response.
    pub async fn request(&self, request: Request) -> Result<Response> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(UiEvent::Request { request, reply })
            .map_err(|_| anyhow::anyhow!("UI loop has stopped"))?;
        rx.await.context("UI loop dropped the request")
    }

    pub fn shutdown(&self) {
        // Nothing to do if the loop is already gone.
        let _ = self.tx.send(UiEvent::Shutdown);
    }
}

/// The UI loop: owns the board, dispatches blocking work to workers.
pub struct Ui {
    board: Board,
    focus: Arc<dyn FocusBackend>,
    permits: Arc<Semaphore>,
    tx: mpsc::UnboundedSender<UiEvent>,
    rx: mpsc::UnboundedReceiver<UiEvent>,
}

impl Ui {
    pub fn new(config: CardsConfig, focus: Arc<dyn FocusBackend>, max_concurrent: usize) -> (Self, UiHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ui = Self {
            board: Board::new(config),
            focus,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            tx: tx.clone(),
            rx,
        };
        (ui, UiHandle { tx })
    }

    /// Run until `Shutdown` or until every handle is dropped.
    pub async fn run(mut self) {
        info!("UI loop started");
        self.spawn_scan(None);

        let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                event = self.rx.recv() => {
                    let Some(event) = event else { break };
                    if !self.handle(event) {
                        break;
                    }
                }
                _ = sweep.tick() => {
                    let removed = self.board.expire(Instant::now());
                    if removed > 0 {
                        debug!(removed, remaining = self.board.len(), "Cards auto-dismissed");
                    }
                }
            }
        }
        info!("UI loop stopped");
    }

    /// Apply one event. Returns `false` to stop the loop.
    fn handle(&mut self, event: UiEvent) -> bool {
        match event {
            UiEvent::Request { request, reply } => self.handle_request(request, reply),
            UiEvent::FocusFinished { report, reply } => {
                let ok = report.outcome.is_success();
                self.board.set_status(report.message.clone(), ok, Instant::now());
                if let Some(reply) = reply {
                    send(reply, Response::FocusStatus { ok, message: report.message });
                }
            }
            UiEvent::ShortcutsScanned { result, reply } => {
                let response = match result {
                    Ok(entries) => {
                        self.board.set_shortcuts(entries.clone());
                        Response::Windows { entries }
                    }
                    Err(message) => {
                        self.board.set_status(message.clone(), false, Instant::now());
                        Response::Error { message }
                    }
                };
                if let Some(reply) = reply {
                    send(reply, response);
                }
            }
            UiEvent::Deliver { response, reply } => send(reply, response),
            UiEvent::Shutdown => return false,
        }
        true
    }

    fn handle_request(&mut self, request: Request, reply: Reply) {
        debug!(?request, "UI request");
        match request {
            Request::Notify { payload } => {
                let mut payload = match HookPayload::from_raw(payload) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(error = %e, "Rejected hook payload");
                        send(
                            reply,
                            Response::Error {
                                message: format!("invalid hook payload: {e}"),
                            },
                        );
                        return;
                    }
                };
                payload.normalize(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
                let id = self.board.add(payload);
                if let Some(card) = self.board.card(id) {
                    info!(card = id, sound = card.sound, title = %card.title, cards = self.board.len(), "Notification shown");
                }
                send(reply, Response::Ack { card_id: Some(id) });
            }
            Request::Focus { card_id } => match self.board.card(card_id) {
                Some(card) => {
                    let payload = card.payload.clone();
                    self.spawn_focus(FocusJob::Project(payload), reply);
                }
                None => send(
                    reply,
                    Response::Error {
                        message: format!("no card {card_id}"),
                    },
                ),
            },
            Request::FocusProject { cwd } => {
                let mut payload = HookPayload {
                    cwd,
                    ..Default::default()
                };
                payload.normalize(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
                self.spawn_focus(FocusJob::Project(payload), reply);
            }
            Request::FocusWindow { window_id } => self.spawn_focus(FocusJob::Window(window_id), reply),
            Request::ListWindows => self.spawn_scan(Some(reply)),
            Request::Dismiss { card_id } => {
                let response = if self.board.dismiss(card_id) {
                    Response::Ack { card_id: Some(card_id) }
                } else {
                    Response::Error {
                        message: format!("no card {card_id}"),
                    }
                };
                send(reply, response);
            }
            Request::ClearAll => {
                self.board.clear_all();
                send(reply, Response::Ack { card_id: None });
            }
            Request::Reload => self.spawn_reload(reply),
            Request::Status => {
                let status = self.board.status(Instant::now()).map(|(m, _)| m.to_string());
                send(
                    reply,
                    Response::Cards {
                        cards: self.board.summaries(),
                        status,
                        shortcuts: self.board.shortcuts().to_vec(),
                    },
                );
            }
        }
    }

    fn spawn_focus(&self, job: FocusJob, reply: Reply) {
        let focus = self.focus.clone();
        let permits = self.permits.clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let report = match tokio::task::spawn_blocking(move || job.run(focus.as_ref())).await {
                Ok(report) => report,
                Err(e) => {
                    error!(error = %e, "Focus worker panicked");
                    FocusReport {
                        outcome: FocusOutcome::ActivationFailed(e.to_string()),
                        message: "Focus failed".to_string(),
                    }
                }
            };
            let _ = tx.send(UiEvent::FocusFinished {
                report,
                reply: Some(reply),
            });
        });
    }

    fn spawn_scan(&self, reply: Option<Reply>) {
        let focus = self.focus.clone();
        let permits = self.permits.clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let result = match tokio::task::spawn_blocking(move || focus.open_editor_windows()).await {
                Ok(Ok(entries)) => Ok(entries),
                Ok(Err(e)) => {
                    warn!(error = %e, "Editor window scan failed");
                    Err(e.to_string())
                }
                Err(e) => Err(format!("scan worker failed: {e}")),
            };
            let _ = tx.send(UiEvent::ShortcutsScanned { result, reply });
        });
    }

    fn spawn_reload(&self, reply: Reply) {
        let focus = self.focus.clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let response = match tokio::task::spawn_blocking(move || focus.reload()).await {
                Ok(Ok(())) => Response::Ack { card_id: None },
                Ok(Err(e)) => {
                    warn!(error = %e, "Reload failed, keeping previous focus mapping");
                    Response::Error { message: e.to_string() }
                }
                Err(e) => Response::Error {
                    message: format!("reload worker failed: {e}"),
                },
            };
            let _ = tx.send(UiEvent::Deliver { response, reply });
        });
    }
}

/// Work item for a focus worker
enum FocusJob {
    Project(HookPayload),
    Window(WindowId),
}

impl FocusJob {
    fn run(self, focus: &dyn FocusBackend) -> FocusReport {
        match self {
            Self::Project(payload) => focus.focus_project(&payload),
            Self::Window(window) => focus.focus_window(window),
        }
    }
}

fn send(reply: Reply, response: Response) {
    if reply.send(response).is_err() {
        debug!("Client went away before the response was ready");
    }
}
