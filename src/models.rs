use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::dates::{self, DateError};

/// Workflow status of an activity. Serialized with the department's labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "Pendente", alias = "Pending")]
    Pending,
    #[serde(rename = "Em aberto", alias = "Open")]
    Open,
    #[serde(rename = "Em preparação", alias = "InPreparation")]
    InPreparation,
    #[serde(rename = "Em andamento", alias = "InProgress")]
    InProgress,
    #[serde(rename = "Concluído", alias = "Completed")]
    Completed,
    #[serde(rename = "Concluído em atraso", alias = "CompletedLate")]
    CompletedLate,
    #[serde(rename = "Aprovado", alias = "Approved")]
    Approved,
    #[serde(rename = "Rejeitado", alias = "Rejected")]
    Rejected,
}

impl Status {
    pub const ALL: [Status; 8] = [
        Status::Pending,
        Status::Open,
        Status::InPreparation,
        Status::InProgress,
        Status::Completed,
        Status::CompletedLate,
        Status::Approved,
        Status::Rejected,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Status::Pending => "Pendente",
            Status::Open => "Em aberto",
            Status::InPreparation => "Em preparação",
            Status::InProgress => "Em andamento",
            Status::Completed => "Concluído",
            Status::CompletedLate => "Concluído em atraso",
            Status::Approved => "Aprovado",
            Status::Rejected => "Rejeitado",
        }
    }

    fn code(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Open => "open",
            Status::InPreparation => "in-preparation",
            Status::InProgress => "in-progress",
            Status::Completed => "completed",
            Status::CompletedLate => "completed-late",
            Status::Approved => "approved",
            Status::Rejected => "rejected",
        }
    }

    /// `Completed` and `CompletedLate` close an activity; every other status
    /// leaves it pending.
    pub fn is_completed(self) -> bool {
        matches!(self, Status::Completed | Status::CompletedLate)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Status {
    type Err = String;

    /// Accepts the display label or the kebab-case code, ignoring case.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let wanted = value.to_lowercase();
        Status::ALL
            .into_iter()
            .find(|status| {
                status.label().to_lowercase() == wanted
                    || status.code() == wanted
                    || status.code().replace('-', "") == wanted
            })
            .ok_or_else(|| format!("unknown status `{value}`"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    #[serde(rename = "Alta", alias = "High")]
    High,
    #[serde(rename = "Média", alias = "Medium")]
    Medium,
    #[serde(rename = "Baixa", alias = "Low")]
    Low,
    Normal,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::High => "Alta",
            Priority::Medium => "Média",
            Priority::Low => "Baixa",
            Priority::Normal => "Normal",
        }
    }

    /// Sort rank; lower comes first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
            Priority::Normal => 4,
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "alta" | "high" => Ok(Priority::High),
            "média" | "media" | "medium" => Ok(Priority::Medium),
            "baixa" | "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            other => Err(format!("unknown priority `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub id: String,
    #[serde(alias = "NomeCompleto")]
    pub name: String,
    #[serde(default, alias = "EmailPrincipal")]
    pub email: String,
    #[serde(default, alias = "Departamento")]
    pub department: String,
}

impl Collaborator {
    /// Placeholder for a record that only carried the collaborator id.
    /// [`crate::store::InMemoryStore::from_snapshot`] swaps it for the full
    /// entry when the id is known.
    pub fn unresolved(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            email: String::new(),
            department: String::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn display_name(&self) -> &str {
        if self.is_resolved() {
            &self.name
        } else {
            &self.id
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    #[serde(alias = "nome")]
    pub name: String,
    #[serde(default, alias = "subcategorias")]
    pub subcategories: Vec<String>,
}

/// A trackable unit of work: obligation, agenda item, payment, forwarded
/// request or checklist entry.
///
/// Decoding goes through [`RawActivity`], so malformed dates and unknown
/// labels never fail a whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawActivity")]
pub struct ActivityRecord {
    pub id: String,
    pub title: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsible: Option<Collaborator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester: Option<Collaborator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_deadline: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_deadline: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
}

impl ActivityRecord {
    pub fn new(title: impl Into<String>, category: impl Into<String>, status: Status) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            category: category.into(),
            subcategory: None,
            status,
            priority: None,
            description: None,
            responsible: None,
            requester: None,
            reference_date: None,
            legal_deadline: None,
            company_deadline: None,
            completed_at: None,
            starts_at: None,
            ends_at: None,
        }
    }

    /// Records the completion and picks `Completed` or `CompletedLate` by
    /// comparing the completion date with the company deadline.
    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        self.completed_at = Some(at);
        self.status = match self.company_deadline {
            Some(deadline) if at.date_naive() > deadline => Status::CompletedLate,
            _ => Status::Completed,
        };
    }

    pub fn responsible_name(&self) -> &str {
        self.responsible
            .as_ref()
            .map(Collaborator::display_name)
            .unwrap_or("N/A")
    }
}

/// Field changes for an existing activity. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub responsible: Option<Collaborator>,
    pub company_deadline: Option<NaiveDate>,
    pub legal_deadline: Option<NaiveDate>,
    pub reference_date: Option<NaiveDate>,
}

impl ActivityPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(self, record: &mut ActivityRecord) {
        if let Some(title) = self.title {
            record.title = title;
        }
        if let Some(description) = self.description {
            record.description = (!description.trim().is_empty()).then_some(description);
        }
        if let Some(status) = self.status {
            record.status = status;
            if !status.is_completed() {
                record.completed_at = None;
            }
        }
        if let Some(priority) = self.priority {
            record.priority = Some(priority);
        }
        if let Some(responsible) = self.responsible {
            record.responsible = Some(responsible);
        }
        if let Some(deadline) = self.company_deadline {
            record.company_deadline = Some(deadline);
        }
        if let Some(deadline) = self.legal_deadline {
            record.legal_deadline = Some(deadline);
        }
        if let Some(reference) = self.reference_date {
            record.reference_date = Some(reference);
        }
    }
}

/// Wire shape of an activity. Accepts both the camelCase field names and the
/// legacy Portuguese ones; every date is still a string here. Collaborators
/// may be a full object or a bare id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActivity {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "titulo")]
    pub title: String,
    #[serde(default, alias = "categoria")]
    pub category: String,
    #[serde(default, alias = "subcategoria")]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "Prioridade")]
    pub priority: Option<String>,
    #[serde(default, alias = "descricao")]
    pub description: Option<String>,
    #[serde(default, alias = "responsavel_FK", deserialize_with = "collaborator_ref")]
    pub responsible: Option<Collaborator>,
    #[serde(default, alias = "Solicitante_FK", deserialize_with = "collaborator_ref")]
    pub requester: Option<Collaborator>,
    #[serde(default, alias = "DataReferencia", deserialize_with = "loose_text")]
    pub reference_date: Option<String>,
    #[serde(default, alias = "PrazoLegal", deserialize_with = "loose_text")]
    pub legal_deadline: Option<String>,
    #[serde(default, alias = "PrazoLimiteEmpresa", deserialize_with = "loose_text")]
    pub company_deadline: Option<String>,
    #[serde(
        default,
        alias = "DataConclusao",
        alias = "actualSubmissionDate",
        alias = "completionTimestamp",
        deserialize_with = "loose_text"
    )]
    pub completed_at: Option<String>,
    #[serde(default, alias = "DataInicio", deserialize_with = "loose_text")]
    pub starts_at: Option<String>,
    #[serde(default, alias = "DataFim", deserialize_with = "loose_text")]
    pub ends_at: Option<String>,
}

impl From<RawActivity> for ActivityRecord {
    fn from(raw: RawActivity) -> Self {
        let id = raw.id;
        let date = |field: &str, value: Option<String>| {
            lenient(&id, field, value.as_deref().map(dates::parse_date))
        };
        let instant = |field: &str, value: Option<String>| {
            lenient(&id, field, value.as_deref().map(dates::parse_instant))
        };

        let reference_date = date("referenceDate", raw.reference_date);
        let legal_deadline = date("legalDeadline", raw.legal_deadline);
        let company_deadline = date("companyDeadline", raw.company_deadline);
        let completed_at = instant("completedAt", raw.completed_at);
        let starts_at = instant("startsAt", raw.starts_at);
        let ends_at = instant("endsAt", raw.ends_at);

        let status = match raw.status.as_deref().map(str::parse::<Status>) {
            Some(Ok(status)) => status,
            Some(Err(err)) => {
                warn!(activity = %id, "{err}; treating as pending");
                Status::Pending
            }
            None => Status::Pending,
        };

        let priority = match raw.priority.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => match value.parse::<Priority>() {
                Ok(priority) => Some(priority),
                Err(err) => {
                    warn!(activity = %id, "{err}; ignoring");
                    None
                }
            },
        };

        Self {
            id,
            title: raw.title,
            category: raw.category,
            subcategory: raw.subcategory.filter(|s| !s.trim().is_empty()),
            status,
            priority,
            description: raw.description.filter(|s| !s.trim().is_empty()),
            responsible: raw.responsible,
            requester: raw.requester,
            reference_date,
            legal_deadline,
            company_deadline,
            completed_at,
            starts_at,
            ends_at,
        }
    }
}

/// Keeps non-string date values as their JSON text so the per-record parser
/// rejects them instead of the whole document.
fn loose_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CollaboratorRef {
    Id(String),
    Full(Collaborator),
}

fn collaborator_ref<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Collaborator>, D::Error> {
    Ok(match Option::<CollaboratorRef>::deserialize(deserializer)? {
        Some(CollaboratorRef::Full(collaborator)) => Some(collaborator),
        Some(CollaboratorRef::Id(id)) if !id.trim().is_empty() => {
            Some(Collaborator::unresolved(id.trim()))
        }
        _ => None,
    })
}

fn lenient<T>(id: &str, field: &str, parsed: Option<Result<Option<T>, DateError>>) -> Option<T> {
    match parsed {
        Some(Ok(value)) => value,
        Some(Err(err)) => {
            warn!(activity = %id, field, "{err}; treating as absent");
            None
        }
        None => None,
    }
}

/// Compliance percentage, or `"N/A"` when nothing has been completed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComplianceRate {
    Percentage(f64),
    NotAvailable,
}

impl Serialize for ComplianceRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ComplianceRate::Percentage(value) => serializer.serialize_f64(*value),
            ComplianceRate::NotAvailable => serializer.serialize_str("N/A"),
        }
    }
}

impl fmt::Display for ComplianceRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplianceRate::Percentage(value) => write!(f, "{value:.1}%"),
            ComplianceRate::NotAvailable => f.write_str("N/A"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBucket {
    pub month: String,
    pub on_time: usize,
    pub late: usize,
    pub overdue_unfulfilled: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total: usize,
    pub pending_count: usize,
    pub on_time_count: usize,
    pub overdue_or_at_risk_count: usize,
    pub compliance_rate: ComplianceRate,
    pub status_distribution: IndexMap<Status, usize>,
    pub delivery_trend: Vec<MonthlyBucket>,
    pub critical_items: Vec<ActivityRecord>,
}

impl DashboardMetrics {
    pub fn completed_count(&self) -> usize {
        self.total - self.pending_count
    }
}
