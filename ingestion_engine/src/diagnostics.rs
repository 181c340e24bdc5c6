//! Diagnostics files written on persistent gaps. Never load-bearing for
//! correctness; purely an operator aid when ingestion can't fully reconcile.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

fn diagnostics_dir() -> PathBuf {
    PathBuf::from(std::env::var("INGESTION_DIAGNOSTICS_DIR").unwrap_or_else(|_| "diagnostics".to_string()))
}

fn write_json(prefix: &str, address: &str, payload: &serde_json::Value) {
    let dir = diagnostics_dir();
    if let Err(e) = fs::create_dir_all(&dir) {
        warn!(error = %e, "could not create diagnostics dir");
        return;
    }
    let filename = format!("{prefix}-{address}-{}.json", Utc::now().timestamp());
    let path = dir.join(filename);
    if let Err(e) = fs::write(&path, serde_json::to_vec_pretty(payload).unwrap_or_default()) {
        warn!(error = %e, path = %path.display(), "failed to write diagnostics file");
    }
}

pub fn write_legit_missing(address: &str, signatures: &[String]) {
    write_json(
        "legit-missing",
        address,
        &serde_json::json!({ "address": address, "unresolved_signatures": signatures }),
    );
}

pub fn write_reconcile(address: &str, signatures: &[String]) {
    write_json(
        "reconcile",
        address,
        &serde_json::json!({ "address": address, "gap_signatures": signatures }),
    );
}

pub fn write_cap_compare(address: &str, rpc_count: usize, capped_count: usize) {
    write_json(
        "cap-compare",
        address,
        &serde_json::json!({
            "address": address,
            "rpc_signature_count": rpc_count,
            "capped_signature_count": capped_count,
        }),
    );
}
