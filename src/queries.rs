//! Cached reads, one per backend resource, each with its refresh policy.

use crate::api::{ApiClient, NameQuery};
use crate::cache::{QueryCache, QueryKey, QueryPolicy, QuerySnapshot, Trigger};
use crate::models::{
    Client, ClientPending, Collaborator, CollaboratorCount, DashboardSummary, Items, TaskPage,
    TimeseriesPoint, TypeCount,
};
use crate::query::TaskQuery;
use std::time::{Duration, Instant};

pub const TASKS: &str = "tasks";
pub const DASHBOARD: &str = "dashboard";
const SUMMARY: &str = "dashboard/summary";
const TIMESERIES: &str = "dashboard/timeseries";
const BY_TYPE: &str = "dashboard/by-type";
const BY_COLLABORATOR: &str = "dashboard/by-collaborator";
const BY_CLIENT_PENDING: &str = "dashboard/by-client-pending";
const CLIENTS: &str = "clients";
const COLLABORATORS: &str = "collaborators";

pub const DIRECTORY_LIMIT: u64 = 200;

pub const TASKS_POLICY: QueryPolicy = QueryPolicy {
    stale_time: Duration::from_secs(5),
    refetch_interval: Some(Duration::from_secs(15)),
};

pub const SUMMARY_POLICY: QueryPolicy = QueryPolicy {
    stale_time: Duration::from_secs(10),
    refetch_interval: None,
};

pub const BREAKDOWN_POLICY: QueryPolicy = QueryPolicy {
    stale_time: Duration::ZERO,
    refetch_interval: Some(Duration::from_secs(30)),
};

pub const DIRECTORY_POLICY: QueryPolicy = QueryPolicy {
    stale_time: Duration::from_secs(5 * 60),
    refetch_interval: None,
};

#[derive(Clone)]
pub struct Queries {
    api: ApiClient,
    cache: QueryCache,
}

impl Queries {
    pub fn new(api: ApiClient, cache: QueryCache) -> Self {
        Queries { api, cache }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn task_key(query: &TaskQuery) -> QueryKey {
        QueryKey::new(TASKS, &query.to_params())
    }

    pub fn tasks(&self, query: &TaskQuery, trigger: Trigger, now: Instant) -> QuerySnapshot<TaskPage> {
        let api = self.api.clone();
        let query = query.clone();
        self.cache.observe(
            &Self::task_key(&query),
            &TASKS_POLICY,
            trigger,
            now,
            move || async move { api.fetch_tasks(&query).await },
        )
    }

    pub fn clients(
        &self,
        query: &NameQuery,
        trigger: Trigger,
        now: Instant,
    ) -> QuerySnapshot<Items<Client>> {
        let api = self.api.clone();
        let query = query.clone();
        self.cache.observe(
            &QueryKey::new(CLIENTS, &query.to_params()),
            &DIRECTORY_POLICY,
            trigger,
            now,
            move || async move { api.fetch_clients(&query).await },
        )
    }

    pub fn collaborators(
        &self,
        query: &NameQuery,
        trigger: Trigger,
        now: Instant,
    ) -> QuerySnapshot<Items<Collaborator>> {
        let api = self.api.clone();
        let query = query.clone();
        self.cache.observe(
            &QueryKey::new(COLLABORATORS, &query.to_params()),
            &DIRECTORY_POLICY,
            trigger,
            now,
            move || async move { api.fetch_collaborators(&query).await },
        )
    }

    pub fn summary(&self, trigger: Trigger, now: Instant) -> QuerySnapshot<DashboardSummary> {
        let api = self.api.clone();
        self.cache.observe(
            &QueryKey::simple(SUMMARY),
            &SUMMARY_POLICY,
            trigger,
            now,
            move || async move { api.fetch_summary().await },
        )
    }

    pub fn timeseries(
        &self,
        days: u32,
        trigger: Trigger,
        now: Instant,
    ) -> QuerySnapshot<Items<TimeseriesPoint>> {
        let api = self.api.clone();
        self.cache.observe(
            &QueryKey::new(TIMESERIES, &[("days", days.to_string())]),
            &SUMMARY_POLICY,
            trigger,
            now,
            move || async move { api.fetch_timeseries(days).await },
        )
    }

    pub fn by_type(&self, days: u32, trigger: Trigger, now: Instant) -> QuerySnapshot<Items<TypeCount>> {
        let api = self.api.clone();
        self.cache.observe(
            &QueryKey::new(BY_TYPE, &[("days", days.to_string())]),
            &BREAKDOWN_POLICY,
            trigger,
            now,
            move || async move { api.fetch_by_type(days).await },
        )
    }

    pub fn by_collaborator(
        &self,
        days: u32,
        limit: u32,
        trigger: Trigger,
        now: Instant,
    ) -> QuerySnapshot<Items<CollaboratorCount>> {
        let api = self.api.clone();
        self.cache.observe(
            &QueryKey::new(
                BY_COLLABORATOR,
                &[("days", days.to_string()), ("limit", limit.to_string())],
            ),
            &BREAKDOWN_POLICY,
            trigger,
            now,
            move || async move { api.fetch_by_collaborator(days, limit).await },
        )
    }

    pub fn by_client_pending(
        &self,
        days: u32,
        limit: u32,
        trigger: Trigger,
        now: Instant,
    ) -> QuerySnapshot<Items<ClientPending>> {
        let api = self.api.clone();
        self.cache.observe(
            &QueryKey::new(
                BY_CLIENT_PENDING,
                &[("days", days.to_string()), ("limit", limit.to_string())],
            ),
            &BREAKDOWN_POLICY,
            trigger,
            now,
            move || async move { api.fetch_by_client_pending(days, limit).await },
        )
    }
}
