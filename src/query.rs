//! Task list filter state and the pagination arithmetic around it.

use crate::models::TaskPage;

pub const PAGE_SIZES: [u64; 4] = [10, 20, 50, 100];
pub const DEFAULT_PAGE_SIZE: u64 = 20;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FinishedFilter {
    #[default]
    Any,
    Pending,
    Finished,
}

impl FinishedFilter {
    /// Only the exact strings `"true"` and `"false"` select a filter.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "true" => FinishedFilter::Finished,
            "false" => FinishedFilter::Pending,
            _ => FinishedFilter::Any,
        }
    }

    pub fn as_param(self) -> Option<&'static str> {
        match self {
            FinishedFilter::Any => None,
            FinishedFilter::Pending => Some("false"),
            FinishedFilter::Finished => Some("true"),
        }
    }

    pub fn cycle(self) -> Self {
        match self {
            FinishedFilter::Any => FinishedFilter::Pending,
            FinishedFilter::Pending => FinishedFilter::Finished,
            FinishedFilter::Finished => FinishedFilter::Any,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FinishedFilter::Any => "Todos",
            FinishedFilter::Pending => "Pendientes",
            FinishedFilter::Finished => "Finalizadas",
        }
    }
}

/// Filters and paging for GET /tasks. Every filter setter resets `offset`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TaskQuery {
    q: String,
    finished: FinishedFilter,
    client_id: Option<u64>,
    collaborator_id: Option<u64>,
    limit: u64,
    offset: u64,
}

impl Default for TaskQuery {
    fn default() -> Self {
        TaskQuery {
            q: String::new(),
            finished: FinishedFilter::Any,
            client_id: None,
            collaborator_id: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl TaskQuery {
    pub fn q(&self) -> &str {
        &self.q
    }

    pub fn finished(&self) -> FinishedFilter {
        self.finished
    }

    pub fn client_id(&self) -> Option<u64> {
        self.client_id
    }

    pub fn collaborator_id(&self) -> Option<u64> {
        self.collaborator_id
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn set_q(&mut self, q: impl Into<String>) {
        self.q = q.into();
        self.offset = 0;
    }

    pub fn set_finished(&mut self, finished: FinishedFilter) {
        self.finished = finished;
        self.offset = 0;
    }

    pub fn set_client(&mut self, client_id: Option<u64>) {
        self.client_id = client_id;
        self.offset = 0;
    }

    pub fn set_collaborator(&mut self, collaborator_id: Option<u64>) {
        self.collaborator_id = collaborator_id;
        self.offset = 0;
    }

    /// Zero is not a page size; it falls back to the default.
    pub fn set_limit(&mut self, limit: u64) {
        self.limit = if limit == 0 { DEFAULT_PAGE_SIZE } else { limit };
        self.offset = 0;
    }

    pub fn cycle_limit(&mut self) {
        let next = PAGE_SIZES
            .iter()
            .position(|&size| size == self.limit)
            .map(|i| PAGE_SIZES[(i + 1) % PAGE_SIZES.len()])
            .unwrap_or(DEFAULT_PAGE_SIZE);
        self.set_limit(next);
    }

    pub fn clear(&mut self) {
        *self = TaskQuery::default();
    }

    pub fn next_page(&mut self, info: &PageInfo) -> bool {
        if !info.can_next() {
            return false;
        }
        self.offset = info.next_offset();
        true
    }

    pub fn prev_page(&mut self, info: &PageInfo) -> bool {
        if !info.can_prev() {
            return false;
        }
        self.offset = info.prev_offset();
        true
    }

    /// Query string pairs; filters at their unset value are left out entirely.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        let q = self.q.trim();
        if !q.is_empty() {
            params.push(("q", q.to_string()));
        }
        if let Some(finished) = self.finished.as_param() {
            params.push(("finished", finished.to_string()));
        }
        if let Some(id) = self.client_id {
            params.push(("clientId", id.to_string()));
        }
        if let Some(id) = self.collaborator_id {
            params.push(("collaboratorId", id.to_string()));
        }
        params.push(("limit", self.limit.to_string()));
        params.push(("offset", self.offset.to_string()));
        params
    }
}

/// Where a loaded page sits in the full result set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageInfo {
    pub total: Option<u64>,
    pub limit: u64,
    pub offset: u64,
    pub rows: usize,
}

impl PageInfo {
    pub fn new(query: &TaskQuery, page: Option<&TaskPage>) -> Self {
        match page {
            Some(page) => PageInfo {
                total: page.pagination.total,
                limit: page
                    .pagination
                    .limit
                    .filter(|&l| l > 0)
                    .unwrap_or(query.limit),
                offset: page.pagination.offset.unwrap_or(query.offset),
                rows: page.items.len(),
            },
            None => PageInfo {
                total: None,
                limit: query.limit,
                offset: query.offset,
                rows: 0,
            },
        }
    }

    /// Without a total, a full page is taken as a hint that more rows exist.
    pub fn can_next(&self) -> bool {
        match self.total {
            Some(total) => self.offset + self.limit < total,
            None => self.rows as u64 >= self.limit && self.limit > 0,
        }
    }

    pub fn can_prev(&self) -> bool {
        self.offset > 0
    }

    pub fn next_offset(&self) -> u64 {
        self.offset + self.limit
    }

    pub fn prev_offset(&self) -> u64 {
        self.offset.saturating_sub(self.limit)
    }

    pub fn range_text(&self) -> String {
        match self.total {
            Some(0) => "Mostrando 0 de 0".to_string(),
            Some(total) => {
                let from = (self.offset + 1).min(total);
                let to = (self.offset + self.limit).min(total);
                format!("Mostrando {}-{} de {}", from, to, total)
            }
            None if self.rows == 0 => "Mostrando 0".to_string(),
            None => format!(
                "Mostrando {}-{}",
                self.offset + 1,
                self.offset + self.rows as u64
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Pagination, Task};

    fn page(total: Option<u64>, limit: u64, offset: u64, rows: usize) -> TaskPage {
        TaskPage {
            items: vec![Task::default(); rows],
            pagination: Pagination {
                total,
                limit: Some(limit),
                offset: Some(offset),
            },
        }
    }

    fn param<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_default_params_only_carry_paging() {
        let params = TaskQuery::default().to_params();
        assert_eq!(
            params,
            vec![("limit", "20".to_string()), ("offset", "0".to_string())]
        );
    }

    #[test]
    fn test_finished_only_sent_for_exact_true_or_false() {
        for raw in ["", "TRUE", "yes", "1", "false ", "all"] {
            let mut query = TaskQuery::default();
            query.set_finished(FinishedFilter::parse(raw));
            assert_eq!(param(&query.to_params(), "finished"), None, "raw={raw:?}");
        }

        let mut query = TaskQuery::default();
        query.set_finished(FinishedFilter::parse("true"));
        assert_eq!(param(&query.to_params(), "finished"), Some("true"));
        query.set_finished(FinishedFilter::parse("false"));
        assert_eq!(param(&query.to_params(), "finished"), Some("false"));
    }

    #[test]
    fn test_set_filters_are_serialised_with_backend_names() {
        let mut query = TaskQuery::default();
        query.set_q("  impresora ");
        query.set_client(Some(4));
        query.set_collaborator(Some(9));
        let params = query.to_params();
        assert_eq!(param(&params, "q"), Some("impresora"));
        assert_eq!(param(&params, "clientId"), Some("4"));
        assert_eq!(param(&params, "collaboratorId"), Some("9"));
    }

    #[test]
    fn test_blank_search_is_omitted() {
        let mut query = TaskQuery::default();
        query.set_q("   ");
        assert_eq!(param(&query.to_params(), "q"), None);
    }

    #[test]
    fn test_every_filter_change_resets_offset() {
        let changes: Vec<fn(&mut TaskQuery)> = vec![
            |q| q.set_q("x"),
            |q| q.set_finished(FinishedFilter::Finished),
            |q| q.set_client(Some(1)),
            |q| q.set_collaborator(Some(2)),
            |q| q.set_limit(50),
            |q| q.cycle_limit(),
        ];
        for change in changes {
            let mut query = TaskQuery::default();
            let info = PageInfo::new(&query, Some(&page(Some(500), 20, 0, 20)));
            assert!(query.next_page(&info));
            assert!(query.next_page(&PageInfo::new(
                &query,
                Some(&page(Some(500), 20, 20, 20))
            )));
            assert_eq!(query.offset(), 40);
            change(&mut query);
            assert_eq!(query.offset(), 0);
        }
    }

    #[test]
    fn test_last_partial_page() {
        let query = TaskQuery::default();
        let info = PageInfo::new(&query, Some(&page(Some(57), 20, 40, 17)));
        assert!(!info.can_next());
        assert!(info.can_prev());
        assert_eq!(info.range_text(), "Mostrando 41-57 de 57");
    }

    #[test]
    fn test_first_page_and_empty_results() {
        let query = TaskQuery::default();
        let info = PageInfo::new(&query, Some(&page(Some(57), 20, 0, 20)));
        assert!(info.can_next());
        assert!(!info.can_prev());
        assert_eq!(info.range_text(), "Mostrando 1-20 de 57");

        let empty = PageInfo::new(&query, Some(&page(Some(0), 20, 0, 0)));
        assert!(!empty.can_next());
        assert_eq!(empty.range_text(), "Mostrando 0 de 0");
    }

    #[test]
    fn test_unknown_total_uses_full_page_heuristic() {
        let query = TaskQuery::default();
        let full = PageInfo::new(&query, Some(&page(None, 20, 0, 20)));
        assert!(full.can_next());
        assert_eq!(full.range_text(), "Mostrando 1-20");

        let partial = PageInfo::new(&query, Some(&page(None, 20, 20, 7)));
        assert!(!partial.can_next());
    }

    #[test]
    fn test_retreat_never_goes_negative() {
        let info = PageInfo {
            total: Some(100),
            limit: 50,
            offset: 20,
            rows: 50,
        };
        assert_eq!(info.prev_offset(), 0);
        assert_eq!(info.next_offset(), 70);
    }

    #[test]
    fn test_cycle_limit_walks_fixed_sizes() {
        let mut query = TaskQuery::default();
        query.cycle_limit();
        assert_eq!(query.limit(), 50);
        query.cycle_limit();
        assert_eq!(query.limit(), 100);
        query.cycle_limit();
        assert_eq!(query.limit(), 10);
        query.set_limit(0);
        assert_eq!(query.limit(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_clear_restores_defaults() {
        let mut query = TaskQuery::default();
        query.set_q("abc");
        query.set_limit(100);
        query.clear();
        assert_eq!(query, TaskQuery::default());
    }
}
