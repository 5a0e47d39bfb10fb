//! Diagnostic dump of the whole relay.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sysinfo::{ProcessesToUpdate, System};

use crate::relay::RelayDump;
use crate::state::AppState;

/// Memory held by this process, in bytes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub rss: u64,
    pub virtual_memory: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStats {
    pub uptime_seconds: f64,
    /// `None` when the platform does not expose process statistics.
    pub memory_usage: Option<MemoryUsage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugReport {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub relay: RelayDump,
    pub server_stats: ServerStats,
}

pub async fn debug_report(State(state): State<AppState>) -> Json<DebugReport> {
    let relay = state.relay.lock().await.dump();
    Json(DebugReport {
        timestamp: Utc::now(),
        relay,
        server_stats: ServerStats {
            uptime_seconds: state.uptime_seconds(),
            memory_usage: memory_usage(),
        },
    })
}

fn memory_usage() -> Option<MemoryUsage> {
    let pid = match sysinfo::get_current_pid() {
        Ok(pid) => pid,
        Err(e) => {
            tracing::debug!("Process statistics unavailable: {}", e);
            return None;
        }
    };
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).map(|process| MemoryUsage {
        rss: process.memory(),
        virtual_memory: process.virtual_memory(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use cardlink_shared::ClientMessage;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_report_flattens_relay_state() {
        let state = AppState::new(Config::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        {
            let mut relay = state.relay.lock().await;
            let conn = relay.connect(tx);
            relay.dispatch(
                conn,
                ClientMessage::Register {
                    user_id: "u1".to_string(),
                    user_name: Some("Alice".to_string()),
                },
            );
        }

        let Json(report) = debug_report(State(state)).await;
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["connectedClients"], serde_json::json!(["u1"]));
        assert_eq!(json["onlineUsersByName"]["Alice"], "u1");
        assert_eq!(json["totalConnections"], 1);
        assert_eq!(json["connectionsByUser"]["u1"]["open"], serde_json::json!([true]));
        assert!(json["activePair"].is_null());
        assert!(json["serverStats"]["uptimeSeconds"].as_f64().unwrap() >= 0.0);
        let memory = &json["serverStats"]["memoryUsage"];
        assert!(memory.is_null() || memory["rss"].is_u64());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_memory_usage_reports_resident_set() {
        if let Some(usage) = memory_usage() {
            assert!(usage.rss > 0);
            assert!(usage.virtual_memory >= usage.rss);
        }
    }
}
