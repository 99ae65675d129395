use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// Task (ticket) as listed by GET /tasks
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Task {
    #[serde(deserialize_with = "lenient_u64")]
    pub id: u64,
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_opt_u64")]
    pub client_id: Option<u64>,
    pub client_name: Option<String>,
    #[serde(deserialize_with = "lenient_opt_u64")]
    pub collaborator_id: Option<u64>,
    pub collaborator_name: Option<String>,
    #[serde(deserialize_with = "lenient_opt_u64")]
    pub type_id: Option<u64>,
    pub type_name: Option<String>,
    pub date: Option<String>,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub finished: bool,
    #[serde(deserialize_with = "lenient_string")]
    pub ticket: Option<String>,
    #[serde(deserialize_with = "lenient_opt_u64")]
    pub status_id: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Finished,
}

impl TaskStatus {
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pendiente",
            TaskStatus::InProgress => "En progreso",
            TaskStatus::Finished => "Finalizada",
        }
    }
}

impl Task {
    /// `finished` is authoritative; check-in only distinguishes started work.
    pub fn status(&self) -> TaskStatus {
        if self.finished {
            TaskStatus::Finished
        } else if self.check_in.is_some() {
            TaskStatus::InProgress
        } else {
            TaskStatus::Pending
        }
    }

    pub fn client(&self) -> Labelled {
        Labelled::from_parts(self.client_name.as_deref(), self.client_id)
    }

    pub fn collaborator(&self) -> Labelled {
        Labelled::from_parts(self.collaborator_name.as_deref(), self.collaborator_id)
    }

    pub fn kind(&self) -> Labelled {
        Labelled::from_parts(self.type_name.as_deref(), self.type_id)
    }
}

/// A reference that may or may not have been resolved to a display name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Labelled {
    Resolved(String),
    Unresolved(u64),
    Missing,
}

impl Labelled {
    pub fn from_parts(name: Option<&str>, id: Option<u64>) -> Self {
        match (name.map(str::trim).filter(|n| !n.is_empty()), id) {
            (Some(name), _) => Labelled::Resolved(name.to_string()),
            (None, Some(id)) => Labelled::Unresolved(id),
            (None, None) => Labelled::Missing,
        }
    }
}

impl fmt::Display for Labelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Labelled::Resolved(name) => f.write_str(name),
            Labelled::Unresolved(id) => write!(f, "#{}", id),
            Labelled::Missing => f.write_str("-"),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Pagination {
    #[serde(deserialize_with = "lenient_opt_u64")]
    pub total: Option<u64>,
    #[serde(deserialize_with = "lenient_opt_u64")]
    pub limit: Option<u64>,
    #[serde(deserialize_with = "lenient_opt_u64")]
    pub offset: Option<u64>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TaskPage {
    #[serde(deserialize_with = "null_as_default")]
    pub items: Vec<Task>,
    #[serde(deserialize_with = "null_as_default")]
    pub pagination: Pagination,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Client {
    #[serde(deserialize_with = "lenient_u64")]
    pub id: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Collaborator {
    #[serde(deserialize_with = "lenient_u64")]
    pub id: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
}

/// `{ items: [...] }` envelope shared by list endpoints.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Items<T> {
    #[serde(default = "Vec::new", deserialize_with = "null_as_default")]
    pub items: Vec<T>,
}

impl<T> Default for Items<T> {
    fn default() -> Self {
        Items { items: Vec::new() }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardSummary {
    #[serde(deserialize_with = "lenient_u64")]
    pub total: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub pending: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub finished: u64,
    #[serde(deserialize_with = "lenient_opt_u64")]
    pub in_progress: Option<u64>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeseriesPoint {
    #[serde(deserialize_with = "null_as_default")]
    pub day: String,
    #[serde(deserialize_with = "lenient_u64")]
    pub total: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub pending: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub finished: u64,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeCount {
    #[serde(deserialize_with = "lenient_opt_u64")]
    pub type_id: Option<u64>,
    pub type_name: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    pub total: u64,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CollaboratorCount {
    #[serde(deserialize_with = "lenient_opt_u64")]
    pub collaborator_id: Option<u64>,
    pub collaborator_name: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    pub total: u64,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientPending {
    #[serde(deserialize_with = "lenient_opt_u64")]
    pub client_id: Option<u64>,
    pub client_name: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    pub pending: u64,
}

// Body of PATCH /tasks/:id/check-in and /check-out
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckResult {
    #[serde(deserialize_with = "lenient_bool")]
    pub ok: bool,
    #[serde(deserialize_with = "lenient_u64")]
    pub id: u64,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub finished: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct AssistantRequest<'a> {
    pub message: &'a str,
    pub history: &'a [HistoryEntry],
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AssistantReply {
    pub reply: Option<String>,
    pub meta: Option<serde_json::Value>,
}

// Some backends serialise booleans as 0/1 or "true"/"false".
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(b)) => b,
        Some(serde_json::Value::Number(n)) => n.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Some(serde_json::Value::String(s)) => matches!(s.as_str(), "true" | "1"),
        _ => false,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// Counts from SQL aggregates may arrive as strings; null or garbage reads as absent.
fn count_from(value: Option<serde_json::Value>) -> Option<u64> {
    match value? {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        serde_json::Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f.round() as u64)
            })
        }
        _ => None,
    }
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(count_from(value).unwrap_or(0))
}

fn lenient_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(count_from(value))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
