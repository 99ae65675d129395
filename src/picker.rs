//! Typeahead filter over clients or collaborators.

use crate::api::NameQuery;
use crate::cache::Trigger;
use crate::debounce::{Debouncer, SEARCH_DEBOUNCE};
use crate::queries::{Queries, DIRECTORY_LIMIT};
use ratatui::widgets::ListState;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Directory {
    Clients,
    Collaborators,
}

impl Directory {
    pub fn title(self) -> &'static str {
        match self {
            Directory::Clients => "Cliente",
            Directory::Collaborators => "Colaborador",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub id: u64,
    pub name: String,
}

#[derive(Clone, Debug, Default)]
pub struct PickerView {
    pub items: Vec<DirectoryEntry>,
    pub is_fetching: bool,
    pub error: Option<String>,
}

pub struct Picker {
    pub directory: Directory,
    pub state: ListState,
    input: String,
    applied: String,
    debouncer: Debouncer<String>,
    last: Vec<DirectoryEntry>,
    mounted: bool,
}

impl Picker {
    pub fn new(directory: Directory) -> Self {
        let mut state = ListState::default();
        state.select(Some(0));
        Picker {
            directory,
            state,
            input: String::new(),
            applied: String::new(),
            debouncer: Debouncer::new(SEARCH_DEBOUNCE),
            last: Vec::new(),
            mounted: false,
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// The search string the backend was last asked for.
    pub fn applied(&self) -> &str {
        &self.applied
    }

    pub fn push_char(&mut self, c: char, now: Instant) {
        self.input.push(c);
        self.debouncer.push(self.input.clone(), now);
    }

    pub fn backspace(&mut self, now: Instant) {
        if self.input.pop().is_some() {
            self.debouncer.push(self.input.clone(), now);
        }
    }

    fn name_query(&self) -> NameQuery {
        NameQuery {
            q: self.applied.clone(),
            limit: DIRECTORY_LIMIT,
        }
    }

    /// Reads the current result set; previous results stay while a new search loads.
    pub fn observe(&mut self, queries: &Queries, now: Instant) -> PickerView {
        let mut trigger = if self.mounted { Trigger::Tick } else { Trigger::Mount };
        self.mounted = true;
        if let Some(q) = self.debouncer.poll(now) {
            if q != self.applied {
                self.applied = q;
                self.state.select(Some(0));
                trigger = Trigger::Mount;
            }
        }

        let query = self.name_query();
        let (items, is_fetching, error) = match self.directory {
            Directory::Clients => {
                let snap = queries.clients(&query, trigger, now);
                let items = snap.data.as_ref().map(|list| {
                    list.items
                        .iter()
                        .map(|c| DirectoryEntry {
                            id: c.id,
                            name: c.name.clone(),
                        })
                        .collect::<Vec<_>>()
                });
                (items, snap.is_fetching, snap.error)
            }
            Directory::Collaborators => {
                let snap = queries.collaborators(&query, trigger, now);
                let items = snap.data.as_ref().map(|list| {
                    list.items
                        .iter()
                        .map(|c| DirectoryEntry {
                            id: c.id,
                            name: c.name.clone(),
                        })
                        .collect::<Vec<_>>()
                });
                (items, snap.is_fetching, snap.error)
            }
        };
        if let Some(items) = items {
            self.last = items;
        }
        PickerView {
            items: self.last.clone(),
            is_fetching,
            error,
        }
    }

    pub fn next(&mut self, len: usize) {
        let total = len + 1;
        let i = match self.state.selected() {
            Some(i) if i + 1 < total => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self, len: usize) {
        let total = len + 1;
        let i = match self.state.selected() {
            Some(0) | None => total - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    /// Row 0 is "Todos" (no filter).
    pub fn selection(&self, items: &[DirectoryEntry]) -> Option<u64> {
        match self.state.selected() {
            Some(0) | None => None,
            Some(i) => items.get(i - 1).map(|e| e.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::cache::QueryCache;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::watch;

    async fn wait_settled(rx: &mut watch::Receiver<u64>) {
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("settle in time")
            .expect("cache alive");
    }

    #[tokio::test]
    async fn test_typing_fetches_once_after_debounce() {
        let server = MockServer::start_async().await;
        let directory = server.mock(|when, then| {
            when.method(GET)
                .path("/api/collaborators")
                .query_param("limit", "200");
            then.status(200).json_body(json!({
                "items": [{ "id": 1, "name": "Ana" }, { "id": 2, "name": "Luis" }]
            }));
        });

        let api = ApiClient::new(&server.url("/api"), None, Duration::from_secs(5)).expect("client");
        let queries = Queries::new(api, QueryCache::new());
        let mut rx = queries.cache().subscribe();
        let mut picker = Picker::new(Directory::Collaborators);
        let t0 = Instant::now();

        picker.observe(&queries, t0);
        wait_settled(&mut rx).await;
        assert_eq!(picker.observe(&queries, t0).items.len(), 2);

        picker.push_char('a', t0);
        picker.push_char('n', t0 + Duration::from_millis(100));
        let during = picker.observe(&queries, t0 + Duration::from_millis(350));
        assert_eq!(during.items.len(), 2);
        assert_eq!(picker.applied(), "");
        assert_eq!(queries.cache().len(), 1);
        assert_eq!(directory.calls_async().await, 1);

        let fired = picker.observe(&queries, t0 + Duration::from_millis(400));
        assert!(fired.is_fetching);
        // previous results stay visible during the refetch
        assert_eq!(fired.items.len(), 2);
        assert_eq!(picker.applied(), "an");
        wait_settled(&mut rx).await;

        let after = picker.observe(&queries, t0 + Duration::from_millis(500));
        assert!(!after.is_fetching);
        assert_eq!(queries.cache().len(), 2);
        assert_eq!(directory.calls_async().await, 2);
    }

    #[test]
    fn test_selection_row_zero_means_all() {
        let items = vec![
            DirectoryEntry {
                id: 10,
                name: "Acme".to_string(),
            },
            DirectoryEntry {
                id: 11,
                name: "Globex".to_string(),
            },
        ];
        let mut picker = Picker::new(Directory::Clients);
        assert_eq!(picker.selection(&items), None);
        picker.next(items.len());
        assert_eq!(picker.selection(&items), Some(10));
        picker.next(items.len());
        picker.next(items.len());
        assert_eq!(picker.selection(&items), None);
        picker.previous(items.len());
        assert_eq!(picker.selection(&items), Some(11));
    }
}
