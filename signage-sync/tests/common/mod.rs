#![allow(dead_code)]

use serde_json::{json, Value};
use signage_core::SlotStore;
use signage_sync::{SyncClient, SyncError, SyncEvent, Transport};

/// Collects frames and plays a server that stitches chunks back together.
#[derive(Default)]
pub struct EchoServer {
    pub outbox: Vec<String>,
    stored: Vec<Value>,
    pending: Vec<Value>,
}

impl Transport for EchoServer {
    fn is_open(&self) -> bool {
        true
    }

    fn send(&mut self, frame: String) -> Result<(), SyncError> {
        let v: Value = serde_json::from_str(&frame)?;
        let payload = &v["payload"];
        match v["action"].as_str() {
            Some("create") | Some("update") => {
                self.pending
                    .extend(payload["timeSlots"].as_array().cloned().unwrap_or_default());
                let last = payload["chunkIndex"].as_u64() == payload["totalChunks"].as_u64().map(|n| n - 1);
                if last {
                    self.stored = std::mem::take(&mut self.pending);
                    self.outbox.push(
                        json!({"action": v["action"], "status": "success", "payload": {"id": "sch-1"}})
                            .to_string(),
                    );
                }
            }
            Some("getByBranchIds") => {
                // Rules carry their slots as a JSON string, as the real server does.
                let slots = Value::Array(self.stored.clone()).to_string();
                self.outbox.push(
                    json!({"action": "getByBranchIds", "data": [{"id": "sch-1", "timeSlots": slots}]})
                        .to_string(),
                );
            }
            _ => {}
        }
        Ok(())
    }
}

pub fn deliver(client: &mut SyncClient, server: &mut EchoServer, store: &mut SlotStore) -> Vec<SyncEvent> {
    std::mem::take(&mut server.outbox)
        .iter()
        .map(|frame| client.handle_incoming(frame, store).unwrap())
        .collect()
}
