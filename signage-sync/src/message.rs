//! Frames on the "schedule" channel: `{action, payload|data}`.
//!
//! Outgoing frames are a tagged enum. Incoming frames are read from a loose JSON
//! value since the server uses both `payload` and `data`, and puts `status` either
//! at the top level or inside the body.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncError;
use crate::wire::WireSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushAction {
    #[default]
    Create,
    Update,
}

impl PushAction {
    pub fn as_str(self) -> &'static str {
        match self {
            PushAction::Create => "create",
            PushAction::Update => "update",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_recurring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<String>,
    pub time_slots: Vec<WireSlot>,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub branch_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchQuery {
    pub branch_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "camelCase")]
pub enum OutgoingMessage {
    Create(PushPayload),
    Update(PushPayload),
    GetByBranchIds(BranchQuery),
}

impl OutgoingMessage {
    pub fn push(action: PushAction, payload: PushPayload) -> Self {
        match action {
            PushAction::Create => OutgoingMessage::Create(payload),
            PushAction::Update => OutgoingMessage::Update(payload),
        }
    }

    pub fn to_frame(&self) -> Result<String, SyncError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    /// Acknowledgement of a pushed schedule.
    PushAck {
        action: PushAction,
        schedule_id: Option<String>,
        chunk_index: Option<usize>,
    },
    PushError {
        action: PushAction,
        message: String,
        chunk_index: Option<usize>,
    },
    /// Body of a `getByBranchIds` response, still in server shape.
    Snapshot(Value),
    PullError { message: String },
    /// Some other action multiplexed on the channel.
    Other { action: String },
}

impl IncomingMessage {
    pub fn parse(text: &str) -> Result<Self, SyncError> {
        let frame: Value =
            serde_json::from_str(text).map_err(|e| SyncError::MalformedFrame(e.to_string()))?;
        let Some(obj) = frame.as_object() else {
            return Err(SyncError::MalformedFrame("frame is not an object".into()));
        };
        let action = obj
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::MalformedFrame("missing action".into()))?;

        let body = obj
            .get("payload")
            .or_else(|| obj.get("data"))
            .cloned()
            .unwrap_or(Value::Null);

        let failed = [obj.get("status"), body.get("status")]
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .any(|s| s.eq_ignore_ascii_case("error"));
        let message = || {
            [obj.get("message"), body.get("message"), obj.get("error"), body.get("error")]
                .into_iter()
                .flatten()
                .find_map(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| "server reported an error".to_string())
        };
        let chunk_index = ["chunkIndex", "chunk_index"]
            .iter()
            .find_map(|k| body.get(*k).or_else(|| obj.get(*k)))
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok());

        let push_action = match action {
            "create" => Some(PushAction::Create),
            "update" => Some(PushAction::Update),
            _ => None,
        };

        Ok(match (push_action, action) {
            (Some(action), _) if failed => IncomingMessage::PushError {
                action,
                message: message(),
                chunk_index,
            },
            (Some(action), _) => IncomingMessage::PushAck {
                action,
                schedule_id: ["id", "scheduleId", "_id"]
                    .iter()
                    .find_map(|k| body.get(*k))
                    .and_then(|v| match v {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    }),
                chunk_index,
            },
            (None, "getByBranchIds") if failed => IncomingMessage::PullError { message: message() },
            (None, "getByBranchIds") => IncomingMessage::Snapshot(body.clone()),
            (None, other) => IncomingMessage::Other {
                action: other.to_string(),
            },
        })
    }
}
