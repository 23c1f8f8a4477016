//! Action templates: successful state-changing actions remembered as
//! few-shot examples for future requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use engram_storage::time_utils;

/// Kind of business action. Serialized as a plain string so unknown action
/// types survive round-trips.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    CreateInvoice,
    CreateProposal,
    SendEmail,
    CreateTask,
    CreateCalendarEvent,
    Other(String),
}

impl ActionType {
    pub fn as_str(&self) -> &str {
        match self {
            ActionType::CreateInvoice => "create_invoice",
            ActionType::CreateProposal => "create_proposal",
            ActionType::SendEmail => "send_email",
            ActionType::CreateTask => "create_task",
            ActionType::CreateCalendarEvent => "create_calendar_event",
            ActionType::Other(s) => s,
        }
    }

    /// Only state-changing actions become templates. Read/search actions
    /// are excluded by construction.
    pub fn is_state_changing(&self) -> bool {
        !matches!(self, ActionType::Other(_))
    }
}

impl From<String> for ActionType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "create_invoice" => ActionType::CreateInvoice,
            "create_proposal" => ActionType::CreateProposal,
            "send_email" => ActionType::SendEmail,
            "create_task" => ActionType::CreateTask,
            "create_calendar_event" => ActionType::CreateCalendarEvent,
            _ => ActionType::Other(s),
        }
    }
}

impl From<ActionType> for String {
    fn from(t: ActionType) -> Self {
        t.as_str().to_string()
    }
}

/// A line item on an invoice or proposal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
}

/// Structured payload of a completed action, one shape per action type
/// with a free-form fallback for anything the executor adds later.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ActionData {
    Invoice {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        customer: Option<String>,
        #[serde(default)]
        items: Vec<LineItem>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        due_date: Option<String>,
    },
    Proposal {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default)]
        items: Vec<LineItem>,
    },
    Email {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subject: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
    },
    Task {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        due_date: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assignee: Option<String>,
    },
    CalendarEvent {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<String>,
        #[serde(default)]
        attendees: Vec<String>,
    },
    Freeform(Value),
}

/// A remembered successful action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionTemplate {
    /// Unique identifier for this template
    pub id: String,

    /// Company (tenant) scope
    pub company_id: String,

    /// User who performed the action
    pub user_id: String,

    pub action_type: ActionType,

    /// What the user was trying to achieve, in one sentence
    pub intent_description: String,

    /// The literal request that led to the successful action
    pub example_request: String,

    pub action_data: ActionData,

    /// Vector embedding of the example request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_dim: Option<usize>,

    /// How many times this template matched a later request (monotonic)
    #[serde(default)]
    pub success_count: u32,

    /// Unix timestamp in milliseconds when this template was created
    pub created_at: i64,
}

impl ActionTemplate {
    pub fn new(
        company_id: impl Into<String>,
        user_id: impl Into<String>,
        action_type: ActionType,
        intent_description: impl Into<String>,
        example_request: impl Into<String>,
        action_data: ActionData,
    ) -> Self {
        Self {
            id: format!("template-{}", uuid::Uuid::new_v4()),
            company_id: company_id.into(),
            user_id: user_id.into(),
            action_type,
            intent_description: intent_description.into(),
            example_request: example_request.into(),
            action_data,
            embedding: None,
            embedding_model: None,
            embedding_dim: None,
            success_count: 1,
            created_at: time_utils::now_ms(),
        }
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>, model: String) -> Self {
        self.embedding_dim = Some(embedding.len());
        self.embedding = Some(embedding);
        self.embedding_model = Some(model);
        self
    }
}
