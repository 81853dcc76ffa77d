//! The interactive console loop: reads operator commands, routes them through
//! the guard, and prints whatever the mounted list screen renders.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use client_core::{
    FormSurface, GuardDecision, HttpApi, PaginatedResourceController, Resource, RouteGuard,
    SessionAuthority, SessionStatus,
};
use shared::{
    domain::{Customer, Order, OrderId, OrderStatus},
    protocol::{LoginRequest, RegisterRequest},
};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    commands::{self, parse_command, ConsoleCommand, Fields},
    events::{describe_auth_failure, UiEvent},
    render::{render_list, TableRow},
    routes::{Navigator, Route},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryMove {
    Push,
    Replace,
    Stay,
}

enum ListScreen {
    Customers(PaginatedResourceController<Customer, HttpApi>),
    Orders(PaginatedResourceController<Order, HttpApi>),
}

/// A mounted list screen. Dropping it detaches the controller so responses
/// still in flight cannot touch state after the operator has moved on.
struct ScreenHandle {
    list: ListScreen,
    watcher: JoinHandle<()>,
}

impl ScreenHandle {
    fn customers(api: &Arc<HttpApi>, seq: u64, events: &mpsc::UnboundedSender<UiEvent>) -> Self {
        let (controller, watcher) = mount::<Customer>(api, seq, events);
        Self {
            list: ListScreen::Customers(controller),
            watcher,
        }
    }

    fn orders(api: &Arc<HttpApi>, seq: u64, events: &mpsc::UnboundedSender<UiEvent>) -> Self {
        let (controller, watcher) = mount::<Order>(api, seq, events);
        Self {
            list: ListScreen::Orders(controller),
            watcher,
        }
    }

    fn change_page(&self, delta: i32) -> Result<()> {
        match &self.list {
            ListScreen::Customers(c) => spawn_change_page(c, delta),
            ListScreen::Orders(c) => spawn_change_page(c, delta),
        }
    }

    fn refresh(&self) {
        match &self.list {
            ListScreen::Customers(c) => spawn_refresh(c),
            ListScreen::Orders(c) => spawn_refresh(c),
        }
    }

    fn open_create_form(&self) {
        match &self.list {
            ListScreen::Customers(c) => c.open_create_form(),
            ListScreen::Orders(c) => c.open_create_form(),
        }
    }

    fn open_edit_form(&self, raw_id: &str) -> Result<()> {
        match &self.list {
            ListScreen::Customers(c) => open_listed_record(c, raw_id),
            ListScreen::Orders(c) => open_listed_record(c, raw_id),
        }
    }

    fn close_form(&self) {
        match &self.list {
            ListScreen::Customers(c) => c.close_form(),
            ListScreen::Orders(c) => c.close_form(),
        }
    }

    fn save(&self, fields: &Fields) -> Result<()> {
        match &self.list {
            ListScreen::Customers(c) => match c.snapshot().form {
                FormSurface::Closed => bail!("no form open; use `new` or `edit <id>` first"),
                FormSurface::Create => {
                    let draft = commands::customer_draft(fields)?;
                    let c = c.clone();
                    tokio::spawn(async move { log_mutation("create", c.create(&draft).await) });
                }
                FormSurface::Edit(id) => {
                    let patch = commands::customer_patch(fields)?;
                    let c = c.clone();
                    tokio::spawn(async move { log_mutation("update", c.update(&id, &patch).await) });
                }
            },
            ListScreen::Orders(c) => match c.snapshot().form {
                FormSurface::Closed => bail!("no form open; use `new` or `edit <id>` first"),
                FormSurface::Create => {
                    let draft = commands::new_order(fields)?;
                    let c = c.clone();
                    tokio::spawn(async move { log_mutation("create", c.create(&draft).await) });
                }
                FormSurface::Edit(id) => {
                    let patch = commands::order_patch(fields)?;
                    let c = c.clone();
                    tokio::spawn(async move { log_mutation("update", c.update(&id, &patch).await) });
                }
            },
        }
        Ok(())
    }

    fn set_order_status(&self, id: String, status: OrderStatus) -> Result<()> {
        let ListScreen::Orders(c) = &self.list else {
            bail!("order status can only be changed from the orders screen");
        };
        let c = c.clone();
        tokio::spawn(async move {
            log_mutation(
                "update status",
                c.update_status(&OrderId::new(id), status).await,
            )
        });
        Ok(())
    }
}

impl Drop for ScreenHandle {
    fn drop(&mut self) {
        match &self.list {
            ListScreen::Customers(c) => c.detach(),
            ListScreen::Orders(c) => c.detach(),
        }
        self.watcher.abort();
    }
}

fn mount<R: TableRow>(
    api: &Arc<HttpApi>,
    seq: u64,
    events: &mpsc::UnboundedSender<UiEvent>,
) -> (PaginatedResourceController<R, HttpApi>, JoinHandle<()>) {
    let controller = PaginatedResourceController::<R, HttpApi>::new(Arc::clone(api));
    let watcher = spawn_watcher(&controller, seq, events.clone());
    spawn_refresh(&controller);
    (controller, watcher)
}

/// Renders every state change and escalates authorization loss to the loop.
fn spawn_watcher<R: TableRow>(
    controller: &PaginatedResourceController<R, HttpApi>,
    seq: u64,
    events: mpsc::UnboundedSender<UiEvent>,
) -> JoinHandle<()> {
    let mut updates = controller.subscribe();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let (text, lost) = {
                let state = updates.borrow_and_update();
                let lost = [&state.error, &state.mutation_error]
                    .into_iter()
                    .flatten()
                    .find(|error| error.requires_reauth())
                    .cloned();
                (render_list(&*state), lost)
            };
            if let Some(error) = lost {
                let _ = events.send(UiEvent::AuthorizationLost(error));
            }
            if events.send(UiEvent::Render { screen: seq, text }).is_err() {
                break;
            }
        }
    })
}

fn spawn_refresh<R: Resource>(controller: &PaginatedResourceController<R, HttpApi>) {
    let controller = controller.clone();
    tokio::spawn(async move {
        let outcome = controller.refresh().await;
        debug!(collection = R::COLLECTION, ?outcome, "refresh finished");
    });
}

fn spawn_change_page<R: Resource>(
    controller: &PaginatedResourceController<R, HttpApi>,
    delta: i32,
) -> Result<()> {
    let state = controller.snapshot();
    let target = i64::from(state.page) + i64::from(delta);
    if target < 1 || target > i64::from(state.total_pages) {
        bail!("no page {target}; {} has {} page(s)", R::COLLECTION, state.total_pages);
    }
    let controller = controller.clone();
    tokio::spawn(async move {
        let outcome = controller.change_page(delta).await;
        debug!(collection = R::COLLECTION, delta, ?outcome, "page change finished");
    });
    Ok(())
}

fn open_listed_record<R: Resource>(
    controller: &PaginatedResourceController<R, HttpApi>,
    raw_id: &str,
) -> Result<()> {
    let id = controller
        .snapshot()
        .items
        .iter()
        .map(|item| item.id().clone())
        .find(|id| id.to_string() == raw_id)
        .ok_or_else(|| anyhow!("no {} '{raw_id}' on this page", R::SINGULAR))?;
    controller.open_edit_form(id);
    Ok(())
}

fn log_mutation<T: std::fmt::Debug>(verb: &str, result: Result<T, shared::error::ApiError>) {
    match result {
        Ok(outcome) => debug!(verb, ?outcome, "mutation finished"),
        Err(error) => debug!(verb, message = %error.message, "mutation rejected"),
    }
}

pub struct Console {
    api: Arc<HttpApi>,
    session: Arc<SessionAuthority>,
    guard: RouteGuard,
    navigator: Navigator,
    screen: Option<ScreenHandle>,
    screen_seq: u64,
    events_tx: mpsc::UnboundedSender<UiEvent>,
    events_rx: mpsc::UnboundedReceiver<UiEvent>,
}

impl Console {
    pub fn new(api: Arc<HttpApi>, session: Arc<SessionAuthority>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            guard: RouteGuard::new(Arc::clone(&session)),
            api,
            session,
            navigator: Navigator::new(Route::Dashboard),
            screen: None,
            screen_seq: 0,
            events_tx,
            events_rx,
        }
    }

    pub async fn run<I>(mut self, input: I) -> Result<()>
    where
        I: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        say("Checking session...");
        self.enter(Route::Dashboard, HistoryMove::Stay).await;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.context("failed to read console input")? else {
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_command(&line) {
                        Ok(ConsoleCommand::Quit) => break,
                        Ok(command) => {
                            if let Err(err) = self.handle(command).await {
                                say(&format!("{err:#}"));
                            }
                        }
                        Err(err) => say(&format!("{err:#}")),
                    }
                }
                Some(event) = self.events_rx.recv() => self.handle_event(event).await,
            }
        }

        self.screen = None;
        info!("console closed");
        Ok(())
    }

    async fn handle(&mut self, command: ConsoleCommand) -> Result<()> {
        match command {
            ConsoleCommand::Login(request) => self.spawn_login(request),
            ConsoleCommand::Register(request) => self.spawn_register(request),
            ConsoleCommand::Logout => self.sign_out("Signed out.").await,
            ConsoleCommand::Go(route) => self.enter(route, HistoryMove::Push).await,
            ConsoleCommand::Back => {
                let route = self
                    .navigator
                    .back()
                    .context("already at the first screen")?;
                self.enter(route, HistoryMove::Stay).await;
            }
            ConsoleCommand::Next => self.list()?.change_page(1)?,
            ConsoleCommand::Prev => self.list()?.change_page(-1)?,
            ConsoleCommand::Refresh => self.list()?.refresh(),
            ConsoleCommand::New => self.list()?.open_create_form(),
            ConsoleCommand::Edit(id) => self.list()?.open_edit_form(&id)?,
            ConsoleCommand::Save(fields) => self.list()?.save(&fields)?,
            ConsoleCommand::Cancel => self.list()?.close_form(),
            ConsoleCommand::SetStatus { id, status } => self.list()?.set_order_status(id, status)?,
            ConsoleCommand::Help => say(commands::HELP),
            ConsoleCommand::Quit => {}
        }
        Ok(())
    }

    async fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Render { screen, text } => {
                if screen == self.screen_seq && self.screen.is_some() {
                    say(&text);
                }
            }
            UiEvent::Info(message) => say(&message),
            UiEvent::SignedIn => {
                self.session.login();
                self.enter(Route::Dashboard, HistoryMove::Replace).await;
            }
            UiEvent::Registered => {
                say("Account created. Sign in to continue.");
                self.enter(Route::SignIn, HistoryMove::Push).await;
            }
            UiEvent::AuthorizationLost(error) => {
                if self.session.status() == SessionStatus::Authenticated {
                    warn!(message = %error.message, "server rejected the session");
                    self.sign_out(&format!("Session ended: {}", error.message))
                        .await;
                }
            }
        }
    }

    fn list(&self) -> Result<&ScreenHandle> {
        self.screen
            .as_ref()
            .ok_or_else(|| anyhow!("not on a list screen; try `go customers` or `go orders`"))
    }

    /// Protected routes go through the guard; a redirect always replaces the
    /// current history entry.
    async fn enter(&mut self, route: Route, movement: HistoryMove) {
        let (route, movement) = if route.is_protected() {
            match self.guard.admit().await {
                GuardDecision::Render => (route, movement),
                GuardDecision::Redirect { to, replace } => {
                    info!(from = %route, to, "redirecting to sign-in");
                    let movement = if replace { HistoryMove::Replace } else { movement };
                    (Route::parse(to).unwrap_or(Route::SignIn), movement)
                }
                GuardDecision::Defer => {
                    say("Still checking your session; try again shortly.");
                    return;
                }
            }
        } else {
            (route, movement)
        };

        match movement {
            HistoryMove::Push => self.navigator.push(route),
            HistoryMove::Replace => self.navigator.replace(route),
            HistoryMove::Stay => {}
        }
        self.show(route);
    }

    fn show(&mut self, route: Route) {
        self.screen = None;
        self.screen_seq += 1;
        debug!(route = %route, seq = self.screen_seq, "showing screen");

        match route {
            Route::SignIn => say("Sign in: login <username> <password>   (new here? go signup)"),
            Route::SignUp => {
                say("Sign up: register <first_name> <username> <password> [last_name]")
            }
            Route::Dashboard => say(
                "== Order Management System ==\nDashboard: go customers | go orders | logout",
            ),
            Route::Customers => {
                self.screen = Some(ScreenHandle::customers(
                    &self.api,
                    self.screen_seq,
                    &self.events_tx,
                ));
            }
            Route::Orders => {
                self.screen = Some(ScreenHandle::orders(
                    &self.api,
                    self.screen_seq,
                    &self.events_tx,
                ));
            }
        }
    }

    /// The remote logout runs in the background; the loop moves to sign-in
    /// without waiting for it.
    async fn sign_out(&mut self, notice: &str) {
        self.screen = None;
        self.session.logout();
        self.enter(Route::SignIn, HistoryMove::Replace).await;
        say(notice);
    }

    fn spawn_login(&self, request: LoginRequest) {
        let api = Arc::clone(&self.api);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let event = match api.login(&request).await {
                Ok(()) => UiEvent::SignedIn,
                Err(failure) => {
                    warn!(username = %request.username, error = %failure, "sign-in failed");
                    UiEvent::Info(describe_auth_failure(&failure))
                }
            };
            let _ = events.send(event);
        });
    }

    fn spawn_register(&self, request: RegisterRequest) {
        let api = Arc::clone(&self.api);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let event = match api.register(&request).await {
                Ok(()) => UiEvent::Registered,
                Err(failure) => {
                    warn!(username = %request.username, error = %failure, "sign-up failed");
                    UiEvent::Info(describe_auth_failure(&failure))
                }
            };
            let _ = events.send(event);
        });
    }
}

fn say(text: &str) {
    println!("{text}");
}
