use crate::actions::TaskActions;
use crate::api::{NameQuery, TaskAction};
use crate::assistant::{Conversation, SUGGESTIONS};
use crate::cache::{QueryKey, QuerySnapshot, Trigger};
use crate::config::Config;
use crate::debounce::{Debouncer, SEARCH_DEBOUNCE};
use crate::error::ApiError;
use crate::models::{
    AssistantReply, CheckResult, Client, ClientPending, Collaborator, CollaboratorCount,
    DashboardSummary, Items, Task, TaskPage, TimeseriesPoint, TypeCount,
};
use crate::picker::{Directory, Picker, PickerView};
use crate::queries::{Queries, DIRECTORY_LIMIT};
use crate::query::{FinishedFilter, PageInfo, TaskQuery};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::widgets::{ListState, TableState};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub const TOP_COLLABORATORS_LIMIT: u32 = 10;
pub const PENDING_CLIENTS_LIMIT: u32 = 5;
const STATUS_TTL: Duration = Duration::from_secs(6);
const CACHE_IDLE: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    Tasks,
    Metrics,
    Clients,
    Collaborators,
}

impl Screen {
    pub const ALL: [Screen; 4] = [
        Screen::Tasks,
        Screen::Metrics,
        Screen::Clients,
        Screen::Collaborators,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Screen::Tasks => "Tareas",
            Screen::Metrics => "Métricas",
            Screen::Clients => "Clientes",
            Screen::Collaborators => "Colaboradores",
        }
    }

    fn index(self) -> usize {
        Screen::ALL.iter().position(|&s| s == self).unwrap_or(0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
    Picking,
    Detail,
    Assistant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Error,
}

/// Results coming back from spawned work.
#[derive(Debug)]
pub enum AppEvent {
    ActionFinished {
        id: u64,
        action: TaskAction,
        result: Result<CheckResult, ApiError>,
    },
    AssistantReplied(Result<AssistantReply, ApiError>),
}

/// Everything the current frame reads from the cache.
#[derive(Default)]
pub struct Snapshots {
    pub tasks: QuerySnapshot<TaskPage>,
    pub summary: QuerySnapshot<DashboardSummary>,
    pub timeseries: QuerySnapshot<Items<TimeseriesPoint>>,
    pub by_type: QuerySnapshot<Items<TypeCount>>,
    pub by_collaborator: QuerySnapshot<Items<CollaboratorCount>>,
    pub by_client_pending: QuerySnapshot<Items<ClientPending>>,
    pub clients: QuerySnapshot<Items<Client>>,
    pub collaborators: QuerySnapshot<Items<Collaborator>>,
    pub picker: Option<PickerView>,
}

impl Snapshots {
    pub fn is_fetching(&self) -> bool {
        self.tasks.is_fetching
            || self.summary.is_fetching
            || self.timeseries.is_fetching
            || self.by_type.is_fetching
            || self.by_collaborator.is_fetching
            || self.by_client_pending.is_fetching
            || self.clients.is_fetching
            || self.collaborators.is_fetching
    }
}

pub struct App {
    pub screen: Screen,
    pub input_mode: InputMode,
    pub query: TaskQuery,
    pub search_input: String,
    pub table_state: TableState,
    pub directory_state: ListState,
    pub directory_filter: String,
    pub picker: Option<Picker>,
    pub client_label: Option<String>,
    pub collaborator_label: Option<String>,
    pub selected_task: Option<Task>,
    pub conversation: Conversation,
    pub assistant_input: String,
    pub show_suggestions: bool,
    pub suggestion_state: ListState,
    pub status: Option<(String, StatusKind, Instant)>,
    pub snapshots: Snapshots,
    pub metrics_days: u32,
    pub dashboard_days: u32,
    shown_page: Option<Arc<TaskPage>>,
    last_task_key: Option<QueryKey>,
    search_debouncer: Debouncer<String>,
    next_trigger: Option<Trigger>,
    queries: Queries,
    actions: TaskActions,
    events_tx: UnboundedSender<AppEvent>,
    events_rx: UnboundedReceiver<AppEvent>,
}

impl App {
    pub fn new(queries: Queries, config: &Config) -> App {
        let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
        let actions = TaskActions::new(queries.api().clone(), queries.cache().clone());
        let mut table_state = TableState::default();
        table_state.select(Some(0));
        let mut suggestion_state = ListState::default();
        suggestion_state.select(Some(0));
        let mut query = TaskQuery::default();
        query.set_finished(FinishedFilter::parse(&config.finished));
        App {
            screen: Screen::Tasks,
            input_mode: InputMode::Normal,
            query,
            search_input: String::new(),
            table_state,
            directory_state: ListState::default(),
            directory_filter: String::new(),
            picker: None,
            client_label: None,
            collaborator_label: None,
            selected_task: None,
            conversation: Conversation::new(),
            assistant_input: String::new(),
            show_suggestions: false,
            suggestion_state,
            status: None,
            snapshots: Snapshots::default(),
            metrics_days: config.metrics_days,
            dashboard_days: config.dashboard_days,
            shown_page: None,
            last_task_key: None,
            search_debouncer: Debouncer::new(SEARCH_DEBOUNCE),
            next_trigger: Some(Trigger::Mount),
            queries,
            actions,
            events_tx,
            events_rx,
        }
    }

    /// Rows on screen: the current page, or the previous one while it loads.
    pub fn visible_page(&self) -> Option<&Arc<TaskPage>> {
        self.snapshots.tasks.data.as_ref().or(self.shown_page.as_ref())
    }

    pub fn visible_tasks(&self) -> &[Task] {
        self.visible_page()
            .map(|page| page.items.as_slice())
            .unwrap_or(&[])
    }

    /// Typed search text not yet applied to the query.
    pub fn search_pending(&self) -> bool {
        self.search_debouncer.is_pending()
    }

    pub fn page_info(&self) -> PageInfo {
        PageInfo::new(&self.query, self.visible_page().map(Arc::as_ref))
    }

    pub fn selected_row(&self) -> Option<&Task> {
        self.table_state
            .selected()
            .and_then(|i| self.visible_tasks().get(i))
    }

    /// Clients or collaborators matching the local name filter.
    pub fn directory_rows(&self) -> Vec<(u64, String)> {
        let needle = self.directory_filter.to_lowercase();
        let rows: Vec<(u64, String)> = match self.screen {
            Screen::Clients => self
                .snapshots
                .clients
                .data
                .as_ref()
                .map(|l| l.items.iter().map(|c| (c.id, c.name.clone())).collect())
                .unwrap_or_default(),
            Screen::Collaborators => self
                .snapshots
                .collaborators
                .data
                .as_ref()
                .map(|l| l.items.iter().map(|c| (c.id, c.name.clone())).collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        rows.into_iter()
            .filter(|(_, name)| needle.is_empty() || name.to_lowercase().contains(&needle))
            .take(DIRECTORY_LIMIT as usize)
            .collect()
    }

    /// Per-frame bookkeeping: debounced search, spawned results, cache reads.
    pub fn tick(&mut self, now: Instant) {
        if let Some(q) = self.search_debouncer.poll(now) {
            if q != self.query.q() {
                self.query.set_q(q);
                self.table_state.select(Some(0));
            }
        }

        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(event, now);
        }

        let expired = matches!(
            &self.status,
            Some((_, _, at)) if now.saturating_duration_since(*at) >= STATUS_TTL
        );
        if expired {
            self.status = None;
        }

        self.sync(now);
        let evicted = self.queries.cache().evict_idle(CACHE_IDLE, now);
        if evicted > 0 {
            tracing::debug!(evicted, cached = self.queries.cache().len(), "dropped idle queries");
        }
    }

    fn sync(&mut self, now: Instant) {
        let trigger = self.next_trigger.take().unwrap_or(Trigger::Tick);
        let queries = &self.queries;
        let mut snaps = Snapshots::default();

        match self.screen {
            Screen::Tasks => {
                // a different filter or page is a fresh mount of the list
                let key = Queries::task_key(&self.query);
                let task_trigger = match trigger {
                    Trigger::Tick if self.last_task_key.as_ref() != Some(&key) => Trigger::Mount,
                    other => other,
                };
                self.last_task_key = Some(key);
                snaps.tasks = queries.tasks(&self.query, task_trigger, now);
                snaps.summary = queries.summary(trigger, now);
                if let Some(page) = &snaps.tasks.data {
                    self.shown_page = Some(page.clone());
                }
            }
            Screen::Metrics => {
                let days = self.metrics_days;
                snaps.summary = queries.summary(trigger, now);
                snaps.timeseries = queries.timeseries(days, trigger, now);
                snaps.by_type = queries.by_type(days, trigger, now);
                snaps.by_collaborator =
                    queries.by_collaborator(days, TOP_COLLABORATORS_LIMIT, trigger, now);
                snaps.by_client_pending = queries.by_client_pending(
                    self.dashboard_days,
                    PENDING_CLIENTS_LIMIT,
                    trigger,
                    now,
                );
            }
            Screen::Clients => {
                snaps.clients = queries.clients(&directory_query(), trigger, now);
            }
            Screen::Collaborators => {
                snaps.collaborators = queries.collaborators(&directory_query(), trigger, now);
            }
        }

        if let Some(picker) = self.picker.as_mut() {
            snaps.picker = Some(picker.observe(queries, now));
        }

        self.snapshots = snaps;
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_tasks().len();
        match self.table_state.selected() {
            _ if len == 0 => self.table_state.select(None),
            Some(i) if i >= len => self.table_state.select(Some(len - 1)),
            None => self.table_state.select(Some(0)),
            _ => {}
        }
    }

    fn apply_event(&mut self, event: AppEvent, now: Instant) {
        match event {
            AppEvent::ActionFinished { id, action, result } => match result {
                Ok(result) => {
                    let verb = match action {
                        TaskAction::CheckIn => "Check-in",
                        TaskAction::CheckOut => "Check-out",
                    };
                    self.set_status(
                        format!("{} registrado para la tarea #{}", verb, id),
                        StatusKind::Info,
                        now,
                    );
                    if let Some(task) = self.selected_task.as_mut().filter(|t| t.id == result.id) {
                        task.check_in = result.check_in;
                        task.check_out = result.check_out;
                        task.finished = result.finished;
                    }
                }
                Err(err) => {
                    self.set_status(
                        format!("Error en la tarea #{}: {}", id, err),
                        StatusKind::Error,
                        now,
                    );
                }
            },
            AppEvent::AssistantReplied(result) => self.conversation.finish(result),
        }
    }

    fn set_status(&mut self, message: String, kind: StatusKind, now: Instant) {
        self.status = Some((message, kind, now));
    }

    fn switch_screen(&mut self, screen: Screen) {
        if self.screen != screen {
            self.screen = screen;
            self.directory_filter.clear();
            self.directory_state.select(Some(0));
            self.next_trigger = Some(Trigger::Mount);
        }
    }

    pub fn refresh(&mut self) {
        self.next_trigger = Some(Trigger::Refresh);
    }

    pub fn next(&mut self) {
        let len = self.current_len();
        if len == 0 {
            return;
        }
        let state = self.current_state();
        let i = match state {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.select_current(i);
    }

    pub fn previous(&mut self) {
        let len = self.current_len();
        if len == 0 {
            return;
        }
        let i = match self.current_state() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.select_current(i);
    }

    fn current_len(&self) -> usize {
        match self.screen {
            Screen::Tasks => self.visible_tasks().len(),
            Screen::Clients | Screen::Collaborators => self.directory_rows().len(),
            Screen::Metrics => 0,
        }
    }

    fn current_state(&self) -> Option<usize> {
        match self.screen {
            Screen::Tasks => self.table_state.selected(),
            _ => self.directory_state.selected(),
        }
    }

    fn select_current(&mut self, i: usize) {
        match self.screen {
            Screen::Tasks => self.table_state.select(Some(i)),
            _ => self.directory_state.select(Some(i)),
        }
    }

    pub fn next_page(&mut self) {
        let info = self.page_info();
        if self.query.next_page(&info) {
            self.table_state.select(Some(0));
        }
    }

    pub fn previous_page(&mut self) {
        let info = self.page_info();
        if self.query.prev_page(&info) {
            self.table_state.select(Some(0));
        }
    }

    pub fn clear_filters(&mut self) {
        self.query.clear();
        self.client_label = None;
        self.collaborator_label = None;
        self.search_input.clear();
        self.search_debouncer.cancel();
        self.table_state.select(Some(0));
    }

    /// Spawns the PATCH; the outcome arrives as an `AppEvent`.
    pub fn run_action(&mut self, id: u64, action: TaskAction) {
        let actions = self.actions.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = actions.run(id, action).await;
            let _ = tx.send(AppEvent::ActionFinished { id, action, result });
        });
    }

    pub fn send_to_assistant(&mut self, text: &str) {
        let Some(outgoing) = self.conversation.begin(text) else {
            return;
        };
        self.assistant_input.clear();
        let api = self.queries.api().clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = api.ask_assistant(&outgoing.message, &outgoing.history).await;
            let _ = tx.send(AppEvent::AssistantReplied(result));
        });
    }

    fn apply_picker(&mut self) {
        let Some(picker) = self.picker.take() else {
            return;
        };
        let items = self
            .snapshots
            .picker
            .as_ref()
            .map(|view| view.items.as_slice())
            .unwrap_or(&[]);
        let selection = picker.selection(items);
        let label = selection.and_then(|id| items.iter().find(|e| e.id == id).map(|e| e.name.clone()));
        match picker.directory {
            Directory::Clients => {
                self.query.set_client(selection);
                self.client_label = label;
            }
            Directory::Collaborators => {
                self.query.set_collaborator(selection);
                self.collaborator_label = label;
            }
        }
        self.table_state.select(Some(0));
    }

    fn picker_len(&self) -> usize {
        self.snapshots
            .picker
            .as_ref()
            .map(|view| view.items.len())
            .unwrap_or(0)
    }

    /// Returns `true` when the app should quit.
    pub fn handle_input(&mut self, key: KeyEvent, now: Instant) -> bool {
        match self.input_mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('q') => return true,
                KeyCode::Tab => {
                    let i = (self.screen.index() + 1) % Screen::ALL.len();
                    self.switch_screen(Screen::ALL[i]);
                }
                KeyCode::BackTab => {
                    let i = (self.screen.index() + Screen::ALL.len() - 1) % Screen::ALL.len();
                    self.switch_screen(Screen::ALL[i]);
                }
                KeyCode::Char(c @ '1'..='4') => {
                    let i = c as usize - '1' as usize;
                    self.switch_screen(Screen::ALL[i]);
                }
                KeyCode::Char('j') | KeyCode::Down => self.next(),
                KeyCode::Char('k') | KeyCode::Up => self.previous(),
                KeyCode::Char('r') => self.refresh(),
                KeyCode::Char('a') => self.input_mode = InputMode::Assistant,
                KeyCode::Char('/') if self.screen != Screen::Metrics => {
                    self.input_mode = InputMode::Search;
                }
                _ if self.screen == Screen::Tasks => self.handle_tasks_key(key),
                _ => {}
            },

            InputMode::Search => match key.code {
                KeyCode::Enter | KeyCode::Esc => self.input_mode = InputMode::Normal,
                KeyCode::Char(c) => self.edit_search(Some(c), now),
                KeyCode::Backspace => self.edit_search(None, now),
                _ => {}
            },

            InputMode::Picking => match key.code {
                KeyCode::Esc => {
                    self.picker = None;
                    self.input_mode = InputMode::Normal;
                }
                KeyCode::Enter => {
                    self.apply_picker();
                    self.input_mode = InputMode::Normal;
                }
                KeyCode::Down => {
                    let len = self.picker_len();
                    if let Some(picker) = self.picker.as_mut() {
                        picker.next(len);
                    }
                }
                KeyCode::Up => {
                    let len = self.picker_len();
                    if let Some(picker) = self.picker.as_mut() {
                        picker.previous(len);
                    }
                }
                KeyCode::Char(c) => {
                    if let Some(picker) = self.picker.as_mut() {
                        picker.push_char(c, now);
                    }
                }
                KeyCode::Backspace => {
                    if let Some(picker) = self.picker.as_mut() {
                        picker.backspace(now);
                    }
                }
                _ => {}
            },

            InputMode::Detail => match key.code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => {
                    self.selected_task = None;
                    self.input_mode = InputMode::Normal;
                }
                KeyCode::Char('i') => {
                    if let Some(id) = self.selected_task.as_ref().map(|t| t.id) {
                        self.run_action(id, TaskAction::CheckIn);
                    }
                }
                KeyCode::Char('o') => {
                    if let Some(id) = self.selected_task.as_ref().map(|t| t.id) {
                        self.run_action(id, TaskAction::CheckOut);
                    }
                }
                _ => {}
            },

            InputMode::Assistant => self.handle_assistant_key(key),
        }
        false
    }

    fn handle_tasks_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('n') | KeyCode::Right => self.next_page(),
            KeyCode::Char('p') | KeyCode::Left => self.previous_page(),
            KeyCode::Char('f') => {
                let next = self.query.finished().cycle();
                self.query.set_finished(next);
                self.table_state.select(Some(0));
            }
            KeyCode::Char('s') => {
                self.query.cycle_limit();
                self.table_state.select(Some(0));
            }
            KeyCode::Char('c') => {
                self.picker = Some(Picker::new(Directory::Clients));
                self.input_mode = InputMode::Picking;
            }
            KeyCode::Char('l') => {
                self.picker = Some(Picker::new(Directory::Collaborators));
                self.input_mode = InputMode::Picking;
            }
            KeyCode::Char('x') => self.clear_filters(),
            KeyCode::Enter => {
                if let Some(task) = self.selected_row().cloned() {
                    self.selected_task = Some(task);
                    self.input_mode = InputMode::Detail;
                }
            }
            KeyCode::Char('i') => {
                if let Some(id) = self.selected_row().map(|t| t.id) {
                    self.run_action(id, TaskAction::CheckIn);
                }
            }
            KeyCode::Char('o') => {
                if let Some(id) = self.selected_row().map(|t| t.id) {
                    self.run_action(id, TaskAction::CheckOut);
                }
            }
            _ => {}
        }
    }

    fn edit_search(&mut self, c: Option<char>, now: Instant) {
        match self.screen {
            Screen::Tasks => {
                match c {
                    Some(c) => self.search_input.push(c),
                    None => {
                        self.search_input.pop();
                    }
                }
                self.search_debouncer.push(self.search_input.clone(), now);
            }
            Screen::Clients | Screen::Collaborators => {
                match c {
                    Some(c) => self.directory_filter.push(c),
                    None => {
                        self.directory_filter.pop();
                    }
                }
                self.directory_state.select(Some(0));
            }
            Screen::Metrics => {}
        }
    }

    fn handle_assistant_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('l') {
            self.conversation.clear();
            return;
        }
        match key.code {
            KeyCode::Esc => self.input_mode = InputMode::Normal,
            KeyCode::Tab => self.show_suggestions = !self.show_suggestions,
            KeyCode::Down if self.show_suggestions => {
                let i = self.suggestion_state.selected().map_or(0, |i| (i + 1) % SUGGESTIONS.len());
                self.suggestion_state.select(Some(i));
            }
            KeyCode::Up if self.show_suggestions => {
                let i = match self.suggestion_state.selected() {
                    Some(0) | None => SUGGESTIONS.len() - 1,
                    Some(i) => i - 1,
                };
                self.suggestion_state.select(Some(i));
            }
            KeyCode::Enter => {
                if self.assistant_input.trim().is_empty() && self.show_suggestions {
                    let i = self.suggestion_state.selected().unwrap_or(0);
                    self.send_to_assistant(SUGGESTIONS[i]);
                } else {
                    let text = self.assistant_input.clone();
                    self.send_to_assistant(&text);
                }
            }
            KeyCode::Char(c) => self.assistant_input.push(c),
            KeyCode::Backspace => {
                self.assistant_input.pop();
            }
            _ => {}
        }
    }
}

fn directory_query() -> NameQuery {
    NameQuery {
        q: String::new(),
        limit: DIRECTORY_LIMIT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::cache::QueryCache;
    use httpmock::prelude::*;
    use serde_json::json;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app(base: &str) -> App {
        let api = ApiClient::new(base, None, Duration::from_secs(5)).expect("client");
        App::new(Queries::new(api, QueryCache::new()), &Config::default())
    }

    /// Ticks until `done` holds; fetches settle on spawned tasks.
    async fn tick_until(app: &mut App, done: impl Fn(&App) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                app.tick(Instant::now());
                if done(app) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("settle in time");
    }

    #[tokio::test]
    async fn test_tasks_screen_loads_page_and_paginates() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/tasks").query_param("offset", "40");
            then.status(200).json_body(json!({
                "items": (41..=57).map(|id| json!({ "id": id })).collect::<Vec<_>>(),
                "pagination": { "total": 57, "limit": 20, "offset": 40 }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/tasks").query_param("offset", "0");
            then.status(200).json_body(json!({
                "items": (1..=20).map(|id| json!({ "id": id })).collect::<Vec<_>>(),
                "pagination": { "total": 57, "limit": 20, "offset": 0 }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/tasks").query_param("offset", "20");
            then.status(200).json_body(json!({
                "items": (21..=40).map(|id| json!({ "id": id })).collect::<Vec<_>>(),
                "pagination": { "total": 57, "limit": 20, "offset": 20 }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/dashboard/summary");
            then.status(200).json_body(json!({ "total": 57, "pending": 30, "finished": 27 }));
        });

        let mut app = app(&server.url("/api"));
        tick_until(&mut app, |a| {
            a.snapshots.tasks.data.is_some() && a.snapshots.summary.data.is_some()
        })
        .await;
        assert_eq!(app.visible_tasks().len(), 20);
        assert!(!app.page_info().can_prev());

        app.handle_input(key(KeyCode::Char('n')), Instant::now());
        tick_until(&mut app, |a| a.page_info().offset == 20).await;
        app.handle_input(key(KeyCode::Char('n')), Instant::now());
        tick_until(&mut app, |a| a.page_info().offset == 40).await;

        let info = app.page_info();
        assert_eq!(app.query.offset(), 40);
        assert!(!info.can_next());
        assert!(info.can_prev());
        assert_eq!(info.range_text(), "Mostrando 41-57 de 57");

        // no page past the end
        app.handle_input(key(KeyCode::Char('n')), Instant::now());
        assert_eq!(app.query.offset(), 40);
    }

    #[tokio::test]
    async fn test_returning_to_a_stale_page_revalidates_it() {
        let server = MockServer::start_async().await;
        let first = server.mock(|when, then| {
            when.method(GET).path("/api/tasks").query_param("offset", "0");
            then.status(200).json_body(json!({
                "items": (1..=20).map(|id| json!({ "id": id })).collect::<Vec<_>>(),
                "pagination": { "total": 57, "limit": 20, "offset": 0 }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/tasks").query_param("offset", "20");
            then.status(200).json_body(json!({
                "items": (21..=40).map(|id| json!({ "id": id })).collect::<Vec<_>>(),
                "pagination": { "total": 57, "limit": 20, "offset": 20 }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/dashboard/summary");
            then.status(200).json_body(json!({ "total": 57, "pending": 30, "finished": 27 }));
        });

        let mut app = app(&server.url("/api"));
        tick_until(&mut app, |a| a.snapshots.tasks.data.is_some()).await;
        app.handle_input(key(KeyCode::Char('n')), Instant::now());
        tick_until(&mut app, |a| a.page_info().offset == 20).await;
        assert_eq!(first.calls_async().await, 1);

        // page 0 comes back into view past its 5 s freshness window
        app.handle_input(key(KeyCode::Char('p')), Instant::now());
        app.tick(Instant::now() + Duration::from_secs(10));
        assert!(app.snapshots.tasks.is_fetching);
        assert_eq!(app.page_info().offset, 0);

        tokio::time::timeout(Duration::from_secs(5), async {
            while first.calls_async().await < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("page 0 refetched");
    }

    #[tokio::test]
    async fn test_same_page_within_window_is_not_refetched_on_return() {
        let server = MockServer::start_async().await;
        let first = server.mock(|when, then| {
            when.method(GET).path("/api/tasks").query_param("offset", "0");
            then.status(200).json_body(json!({
                "items": (1..=20).map(|id| json!({ "id": id })).collect::<Vec<_>>(),
                "pagination": { "total": 57, "limit": 20, "offset": 0 }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/tasks").query_param("offset", "20");
            then.status(200).json_body(json!({
                "items": [], "pagination": { "total": 57, "limit": 20, "offset": 20 }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/dashboard/summary");
            then.status(200).json_body(json!({ "total": 57 }));
        });

        let mut app = app(&server.url("/api"));
        tick_until(&mut app, |a| a.snapshots.tasks.data.is_some()).await;
        app.handle_input(key(KeyCode::Char('n')), Instant::now());
        tick_until(&mut app, |a| a.page_info().offset == 20).await;
        app.handle_input(key(KeyCode::Char('p')), Instant::now());
        app.tick(Instant::now());
        assert!(!app.snapshots.tasks.is_fetching);
        assert_eq!(first.calls_async().await, 1);
    }

    #[tokio::test]
    async fn test_filter_keys_reset_offset() {
        let mut app = app("http://127.0.0.1:9/api");
        let info = PageInfo {
            total: Some(100),
            limit: 20,
            offset: 0,
            rows: 20,
        };
        app.query.next_page(&info);
        assert_eq!(app.query.offset(), 20);

        app.handle_input(key(KeyCode::Char('f')), Instant::now());
        assert_eq!(app.query.finished(), FinishedFilter::Pending);
        assert_eq!(app.query.offset(), 0);

        app.query.next_page(&info);
        app.handle_input(key(KeyCode::Char('s')), Instant::now());
        assert_eq!(app.query.limit(), 50);
        assert_eq!(app.query.offset(), 0);

        app.handle_input(key(KeyCode::Char('x')), Instant::now());
        assert_eq!(app.query, TaskQuery::default());
    }

    #[tokio::test]
    async fn test_search_is_debounced_before_touching_the_query() {
        let mut app = app("http://127.0.0.1:9/api");
        let t0 = Instant::now();
        app.handle_input(key(KeyCode::Char('/')), t0);
        assert_eq!(app.input_mode, InputMode::Search);
        for c in "red".chars() {
            app.handle_input(key(KeyCode::Char(c)), t0);
        }
        app.handle_input(key(KeyCode::Enter), t0);

        app.tick(t0 + Duration::from_millis(100));
        assert_eq!(app.query.q(), "");
        app.tick(t0 + Duration::from_millis(300));
        assert_eq!(app.query.q(), "red");
        assert_eq!(app.search_input, "red");
    }

    #[tokio::test]
    async fn test_check_in_result_updates_open_detail_and_status() {
        let server = MockServer::start_async().await;
        let patch = server.mock(|when, then| {
            when.method(PATCH).path("/api/tasks/42/check-in");
            then.status(200).json_body(json!({
                "ok": true, "id": 42, "checkIn": "2024-01-01T10:00:00Z",
                "checkOut": null, "finished": false
            }));
        });
        let mut app = app(&server.url("/api"));
        app.selected_task = Some(Task {
            id: 42,
            ..Task::default()
        });
        app.input_mode = InputMode::Detail;

        app.handle_input(key(KeyCode::Char('i')), Instant::now());
        let event = tokio::time::timeout(Duration::from_secs(5), app.events_rx.recv())
            .await
            .expect("event in time")
            .expect("event");
        app.apply_event(event, Instant::now());

        patch.assert_async().await;
        let task = app.selected_task.as_ref().expect("detail open");
        assert_eq!(task.check_in.as_deref(), Some("2024-01-01T10:00:00Z"));
        assert!(matches!(app.status, Some((_, StatusKind::Info, _))));
    }

    #[tokio::test]
    async fn test_directory_filter_is_case_insensitive() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/clients");
            then.status(200).json_body(json!({
                "items": [
                    { "id": 1, "name": "Terminal de Transportes" },
                    { "id": 2, "name": "Acme" }
                ]
            }));
        });
        let mut app = app(&server.url("/api"));
        app.handle_input(key(KeyCode::Char('3')), Instant::now());
        assert_eq!(app.screen, Screen::Clients);
        tick_until(&mut app, |a| a.snapshots.clients.data.is_some()).await;
        assert_eq!(app.directory_rows().len(), 2);

        app.handle_input(key(KeyCode::Char('/')), Instant::now());
        for c in "TERM".chars() {
            app.handle_input(key(KeyCode::Char(c)), Instant::now());
        }
        assert_eq!(app.directory_rows(), vec![(1, "Terminal de Transportes".to_string())]);
    }

    #[test]
    fn test_configured_finished_filter_is_the_starting_state() {
        let api = ApiClient::new("http://127.0.0.1:9/api", None, Duration::from_secs(5)).expect("client");
        let config = Config {
            finished: "false".to_string(),
            ..Config::default()
        };
        let app = App::new(Queries::new(api, QueryCache::new()), &config);
        assert_eq!(app.query.finished(), FinishedFilter::Pending);
    }

    #[tokio::test]
    async fn test_assistant_ignores_empty_input() {
        let mut app = app("http://127.0.0.1:9/api");
        app.handle_input(key(KeyCode::Char('a')), Instant::now());
        assert_eq!(app.input_mode, InputMode::Assistant);
        app.handle_input(key(KeyCode::Enter), Instant::now());
        assert!(!app.conversation.is_pending());
        assert_eq!(app.conversation.messages().len(), 1);

        app.handle_input(key(KeyCode::Esc), Instant::now());
        assert_eq!(app.input_mode, InputMode::Normal);
    }
}
