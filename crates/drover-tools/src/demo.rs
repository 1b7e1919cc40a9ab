//! Demo backend with a static target table.
//!
//! Returns simulated, deterministic diagnostic results so the full
//! orchestrator flow can run without real infrastructure. Used by tests
//! and offline sessions.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::backend::{BackendError, DiagnosticInfo, ExecutionBackend};

/// Simulated execution backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct DemoBackend;

fn target_info(target: &str) -> Option<Value> {
    match target {
        "localhost" => Some(json!({
            "type": "host",
            "hostname": "localhost",
            "ip": "127.0.0.1",
            "os": "linux",
            "status": "online",
        })),
        "demo-host-1" => Some(json!({
            "type": "host",
            "hostname": "demo-host-1.example.com",
            "ip": "10.0.1.10",
            "os": "Ubuntu 22.04",
            "status": "online",
        })),
        "demo-service-1" => Some(json!({
            "type": "service",
            "name": "api-gateway",
            "endpoint": "https://api.example.com",
            "port": 443,
            "status": "healthy",
        })),
        _ => None,
    }
}

fn host_diagnostics() -> Vec<DiagnosticInfo> {
    vec![
        DiagnosticInfo {
            name: "ping".into(),
            description: "Send ICMP ping to host".into(),
            target_type: "host".into(),
            parameters: json!({"type": "object", "properties": {"count": {"type": "integer"}}}),
        },
        DiagnosticInfo {
            name: "dns_lookup".into(),
            description: "Resolve DNS records for host".into(),
            target_type: "host".into(),
            parameters: json!({"type": "object", "properties": {"record_type": {"type": "string"}}}),
        },
        DiagnosticInfo {
            name: "log_tail".into(),
            description: "Tail recent log lines from host".into(),
            target_type: "host".into(),
            parameters: json!({"type": "object", "properties": {"lines": {"type": "integer"}}}),
        },
    ]
}

fn service_diagnostics() -> Vec<DiagnosticInfo> {
    vec![DiagnosticInfo {
        name: "service_status".into(),
        description: "Check service health and uptime".into(),
        target_type: "service".into(),
        parameters: json!({"type": "object"}),
    }]
}

#[async_trait]
impl ExecutionBackend for DemoBackend {
    async fn resolve_target(&self, target: &str) -> Result<Value, BackendError> {
        target_info(target)
            .ok_or_else(|| BackendError::new(format!("unknown target: {target}"), "target_not_found"))
    }

    async fn list_diagnostics(&self, target: &str) -> Result<Vec<DiagnosticInfo>, BackendError> {
        let info = target_info(target)
            .ok_or_else(|| BackendError::new(format!("unknown target: {target}"), "target_not_found"))?;
        match info["type"].as_str() {
            Some("service") => Ok(service_diagnostics()),
            _ => Ok(host_diagnostics()),
        }
    }

    async fn run_diagnostic(
        &self,
        action: &str,
        target: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, BackendError> {
        let info = target_info(target)
            .ok_or_else(|| BackendError::new(format!("unknown target: {target}"), "target_not_found"))?;

        match action {
            "ping" => {
                let count = args.get("count").and_then(Value::as_u64).unwrap_or(4);
                Ok(json!({
                    "target": target,
                    "ip": info.get("ip").cloned().unwrap_or(Value::Null),
                    "packets_sent": count,
                    "packets_received": count,
                    "packet_loss_pct": 0.0,
                    "rtt_avg_ms": 1.2,
                }))
            }
            "dns_lookup" => {
                let record_type = args
                    .get("record_type")
                    .and_then(Value::as_str)
                    .unwrap_or("A");
                Ok(json!({
                    "target": target,
                    "record_type": record_type,
                    "records": [info.get("ip").cloned().unwrap_or(json!("10.0.0.1"))],
                }))
            }
            "log_tail" => {
                let lines = args.get("lines").and_then(Value::as_u64).unwrap_or(50);
                Ok(json!({
                    "target": target,
                    "lines": lines,
                    "log": format!("[demo] last {lines} lines for {target}"),
                }))
            }
            "service_status" => Ok(json!({
                "target": target,
                "status": info.get("status").cloned().unwrap_or(json!("unknown")),
                "uptime_seconds": 86_400,
            })),
            other => Err(BackendError::new(
                format!("unknown diagnostic: {other}"),
                "unknown_diagnostic",
            )),
        }
    }

    async fn run_shell(&self, command: &str, target: &str) -> Result<Value, BackendError> {
        let _ = target_info(target)
            .ok_or_else(|| BackendError::new(format!("unknown target: {target}"), "target_not_found"))?;
        Ok(json!({
            "exit_code": 0,
            "stdout": format!("[demo] $ {command}\n(simulated output for {target})\n"),
            "stderr": "",
        }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_known_target() {
        let info = DemoBackend.resolve_target("localhost").await.unwrap();
        assert_eq!(info["os"], "linux");
    }

    #[tokio::test]
    async fn resolve_unknown_target_fails_typed() {
        let err = DemoBackend.resolve_target("nope").await.unwrap_err();
        assert_eq!(err.code, "target_not_found");
    }

    #[tokio::test]
    async fn diagnostics_differ_by_target_type() {
        let host = DemoBackend.list_diagnostics("demo-host-1").await.unwrap();
        let service = DemoBackend.list_diagnostics("demo-service-1").await.unwrap();
        assert!(host.iter().any(|d| d.name == "ping"));
        assert!(service.iter().any(|d| d.name == "service_status"));
    }

    #[tokio::test]
    async fn ping_respects_count() {
        let mut args = Map::new();
        let _ = args.insert("count".into(), json!(2));
        let out = DemoBackend
            .run_diagnostic("ping", "localhost", &args)
            .await
            .unwrap();
        assert_eq!(out["packets_sent"], 2);
        assert_eq!(out["packet_loss_pct"], 0.0);
    }

    #[tokio::test]
    async fn unknown_diagnostic_fails_typed() {
        let err = DemoBackend
            .run_diagnostic("flux", "localhost", &Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, "unknown_diagnostic");
    }

    #[tokio::test]
    async fn shell_is_simulated() {
        let out = DemoBackend.run_shell("uptime", "localhost").await.unwrap();
        assert_eq!(out["exit_code"], 0);
        assert!(out["stdout"].as_str().unwrap().contains("uptime"));
    }
}
