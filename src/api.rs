use crate::config::Config;
use crate::error::ApiError;
use crate::models::{
    AssistantReply, AssistantRequest, CheckResult, Client, ClientPending, Collaborator,
    CollaboratorCount, DashboardSummary, HistoryEntry, Items, TaskPage, TimeseriesPoint,
    TypeCount,
};
use crate::query::TaskQuery;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// One configured HTTP client shared by every service call.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

/// Parameters for the client and collaborator lists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct NameQuery {
    pub q: String,
    pub limit: u64,
}

impl NameQuery {
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        let q = self.q.trim();
        if !q.is_empty() {
            params.push(("q", q.to_string()));
        }
        if self.limit > 0 {
            params.push(("limit", self.limit.to_string()));
        }
        params
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskAction {
    CheckIn,
    CheckOut,
}

impl TaskAction {
    pub fn path_segment(self) -> &'static str {
        match self {
            TaskAction::CheckIn => "check-in",
            TaskAction::CheckOut => "check-out",
        }
    }
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(ApiClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(&config.api_url, config.api_key.clone(), config.request_timeout())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {}", key)),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let res = builder.send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }
        let bytes = res.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::from_str("{}")?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub(crate) fn tasks_request(&self, query: &TaskQuery) -> RequestBuilder {
        self.request(Method::GET, "/tasks").query(&query.to_params())
    }

    /// GET /tasks
    pub async fn fetch_tasks(&self, query: &TaskQuery) -> Result<TaskPage, ApiError> {
        tracing::debug!(params = ?query.to_params(), "fetching tasks");
        self.send(self.tasks_request(query)).await
    }

    /// PATCH /tasks/:id/check-in or /check-out, no body.
    pub async fn patch_task(&self, id: u64, action: TaskAction) -> Result<CheckResult, ApiError> {
        let path = format!("/tasks/{}/{}", id, action.path_segment());
        self.send(self.request(Method::PATCH, &path)).await
    }

    pub async fn fetch_clients(&self, query: &NameQuery) -> Result<Items<Client>, ApiError> {
        self.send(self.request(Method::GET, "/clients").query(&query.to_params()))
            .await
    }

    pub async fn fetch_collaborators(
        &self,
        query: &NameQuery,
    ) -> Result<Items<Collaborator>, ApiError> {
        self.send(
            self.request(Method::GET, "/collaborators")
                .query(&query.to_params()),
        )
        .await
    }

    pub async fn fetch_summary(&self) -> Result<DashboardSummary, ApiError> {
        self.send(self.request(Method::GET, "/dashboard/summary"))
            .await
    }

    pub async fn fetch_timeseries(&self, days: u32) -> Result<Items<TimeseriesPoint>, ApiError> {
        self.send(
            self.request(Method::GET, "/dashboard/timeseries")
                .query(&[("days", days)]),
        )
        .await
    }

    pub async fn fetch_by_type(&self, days: u32) -> Result<Items<TypeCount>, ApiError> {
        self.send(
            self.request(Method::GET, "/dashboard/by-type")
                .query(&[("days", days)]),
        )
        .await
    }

    pub async fn fetch_by_collaborator(
        &self,
        days: u32,
        limit: u32,
    ) -> Result<Items<CollaboratorCount>, ApiError> {
        self.send(
            self.request(Method::GET, "/dashboard/by-collaborator")
                .query(&[("days", days), ("limit", limit)]),
        )
        .await
    }

    pub async fn fetch_by_client_pending(
        &self,
        days: u32,
        limit: u32,
    ) -> Result<Items<ClientPending>, ApiError> {
        self.send(
            self.request(Method::GET, "/dashboard/by-client-pending")
                .query(&[("days", days), ("limit", limit)]),
        )
        .await
    }

    /// POST /assistant with the question and the recent conversation.
    pub async fn ask_assistant(
        &self,
        message: &str,
        history: &[HistoryEntry],
    ) -> Result<AssistantReply, ApiError> {
        let body = AssistantRequest { message, history };
        self.send(self.request(Method::POST, "/assistant").json(&body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::query::FinishedFilter;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, None, Duration::from_secs(5)).expect("client")
    }

    #[test]
    fn test_tasks_request_omits_unset_filters() {
        let api = client("http://localhost:3000/api/");
        let mut query = TaskQuery::default();
        query.set_finished(FinishedFilter::parse("maybe"));
        let request = api.tasks_request(&query).build().expect("request");

        assert_eq!(request.url().path(), "/api/tasks");
        let keys: Vec<String> = request
            .url()
            .query_pairs()
            .map(|(k, _)| k.into_owned())
            .collect();
        assert_eq!(keys, vec!["limit", "offset"]);
    }

    #[tokio::test]
    async fn test_fetch_tasks_sends_filters_and_parses_page() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/tasks")
                .query_param("finished", "false")
                .query_param("clientId", "3")
                .query_param("limit", "20")
                .query_param("offset", "0");
            then.status(200).json_body(json!({
                "items": [{ "id": 10, "description": "Tarea X", "finished": false }],
                "pagination": { "total": 1, "limit": 20, "offset": 0 }
            }));
        });

        let api = client(&server.url("/api"));
        let mut query = TaskQuery::default();
        query.set_finished(FinishedFilter::Pending);
        query.set_client(Some(3));
        let page = api.fetch_tasks(&query).await.expect("page");

        mock.assert_async().await;
        assert_eq!(page.items[0].description.as_deref(), Some("Tarea X"));
        assert_eq!(page.pagination.total, Some(1));
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/dashboard/summary");
            then.status(503).body("database down");
        });

        let api = client(&server.url("/api"));
        let err = api.fetch_summary().await.expect_err("status error");
        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status.as_u16(), 503);
                assert_eq!(body, "database down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_json_is_a_decode_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/clients");
            then.status(200).body("<html>oops</html>");
        });

        let api = client(&server.url("/api"));
        let err = api
            .fetch_clients(&NameQuery::default())
            .await
            .expect_err("decode error");
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_patch_check_in_uses_action_path_and_bearer_key() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(PATCH)
                .path("/api/tasks/42/check-in")
                .header("authorization", "Bearer k-123");
            then.status(200).json_body(json!({
                "ok": true, "id": 42, "checkIn": "2024-01-01T10:00:00Z",
                "checkOut": null, "finished": false
            }));
        });

        let api = ApiClient::new(
            &server.url("/api"),
            Some("k-123".to_string()),
            Duration::from_secs(5),
        )
        .expect("client");
        let result = api.patch_task(42, TaskAction::CheckIn).await.expect("patch");

        mock.assert_async().await;
        assert!(result.ok);
        assert_eq!(result.check_in.as_deref(), Some("2024-01-01T10:00:00Z"));
    }

    #[tokio::test]
    async fn test_collaborators_search_sends_q_and_limit() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/collaborators")
                .query_param("q", "ana")
                .query_param("limit", "200");
            then.status(200)
                .json_body(json!({ "items": [{ "id": 1, "name": "Ana" }] }));
        });

        let api = client(&server.url("/api"));
        let list = api
            .fetch_collaborators(&NameQuery {
                q: "ana".to_string(),
                limit: 200,
            })
            .await
            .expect("collaborators");

        mock.assert_async().await;
        assert_eq!(list.items[0].name, "Ana");
    }

    #[tokio::test]
    async fn test_dashboard_breakdowns_send_window_params() {
        let server = MockServer::start_async().await;
        let by_collab = server.mock(|when, then| {
            when.method(GET)
                .path("/api/dashboard/by-collaborator")
                .query_param("days", "30")
                .query_param("limit", "10");
            then.status(200).json_body(json!({
                "items": [{ "collaboratorId": 2, "collaboratorName": "Luis", "total": 8 }]
            }));
        });

        let api = client(&server.url("/api"));
        let items = api.fetch_by_collaborator(30, 10).await.expect("items");

        by_collab.assert_async().await;
        assert_eq!(items.items[0].collaborator_name.as_deref(), Some("Luis"));
        assert_eq!(items.items[0].total, 8);
    }

    #[tokio::test]
    async fn test_assistant_posts_message_and_history() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/assistant").json_body(json!({
                "message": "¿Cuántos pendientes?",
                "history": [{ "role": "user", "content": "¿Cuántos pendientes?" }]
            }));
            then.status(200)
                .json_body(json!({ "reply": "Hay **12** pendientes.", "meta": {} }));
        });

        let api = client(&server.url("/api"));
        let history = vec![HistoryEntry {
            role: Role::User,
            content: "¿Cuántos pendientes?".to_string(),
        }];
        let reply = api
            .ask_assistant("¿Cuántos pendientes?", &history)
            .await
            .expect("reply");

        mock.assert_async().await;
        assert_eq!(reply.reply.as_deref(), Some("Hay **12** pendientes."));
    }
}
