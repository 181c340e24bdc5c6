//! File writers for first-buyer reports and the mint-participants manifest (C15).

use chrono::Utc;
use csv::Writer;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::first_buyers::{first_buy_date, FirstBuyer};
use crate::mint_participants::MintParticipant;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

const MINT_PARTICIPANTS_CSV_HEADER: &[&str] = &[
    "wallet",
    "mint",
    "cutoffTs",
    "buyTs",
    "buyIso",
    "signature",
    "tokenAmount",
    "stakeSol",
    "tokenAccountsCount",
    "txCountScanned",
    "walletCreatedAtTs",
    "walletCreatedAtIso",
    "accountAgeDays",
    "creationScanMode",
    "creationScanPages",
    "runScannedAtIso",
    "runSource",
];

/// Appends `participants` to a JSONL or CSV manifest, skipping rows whose
/// `(wallet, signature)` key is already present. `run_source` is a free-text
/// label (e.g. the invoking flow's name) recorded on every new row.
pub fn append_mint_participants_manifest(
    path: &Path,
    participants: &[MintParticipant],
    format: ManifestFormat,
    run_source: &str,
) -> Result<usize, ReportError> {
    let existing_keys = load_existing_manifest_keys(path, format)?;
    let fresh: Vec<&MintParticipant> = participants
        .iter()
        .filter(|p| !existing_keys.contains(&(p.wallet.clone(), p.signature.clone())))
        .collect();

    if fresh.is_empty() {
        debug!(path = %path.display(), "mint-participants manifest: nothing new to append");
        return Ok(0);
    }

    let scanned_at = Utc::now().to_rfc3339();
    match format {
        ManifestFormat::Jsonl => append_jsonl(path, &fresh, &scanned_at, run_source)?,
        ManifestFormat::Csv => append_csv(path, &fresh, &scanned_at, run_source)?,
    }
    Ok(fresh.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Jsonl,
    Csv,
}

impl ManifestFormat {
    /// Parses the `mint_participants.output` config value. `"none"` has no
    /// representation here; callers should skip writing entirely in that case.
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s {
            "jsonl" => Some(ManifestFormat::Jsonl),
            "csv" => Some(ManifestFormat::Csv),
            _ => None,
        }
    }
}

fn load_existing_manifest_keys(
    path: &Path,
    format: ManifestFormat,
) -> Result<HashSet<(String, String)>, ReportError> {
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let contents = std::fs::read_to_string(path)?;
    let mut keys = HashSet::new();

    match format {
        ManifestFormat::Jsonl => {
            for line in contents.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
                    if let (Some(wallet), Some(signature)) =
                        (value.get("wallet").and_then(|v| v.as_str()), value.get("signature").and_then(|v| v.as_str()))
                    {
                        keys.insert((wallet.to_string(), signature.to_string()));
                    }
                }
            }
        }
        ManifestFormat::Csv => {
            let mut reader = csv::Reader::from_reader(contents.as_bytes());
            for record in reader.records().flatten() {
                if let (Some(wallet), Some(signature)) = (record.get(0), record.get(5)) {
                    keys.insert((wallet.to_string(), signature.to_string()));
                }
            }
        }
    }
    Ok(keys)
}

fn append_jsonl(
    path: &Path,
    rows: &[&MintParticipant],
    scanned_at: &str,
    run_source: &str,
) -> Result<(), ReportError> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    for row in rows {
        let value = serde_json::json!({
            "wallet": row.wallet,
            "mint": row.mint,
            "cutoffTs": row.cutoff_ts,
            "buyTs": row.buy_ts,
            "signature": row.signature,
            "tokenAmount": row.token_amount.to_string(),
            "stakeSol": row.stake_sol.to_string(),
            "tokenAccountsCount": row.token_accounts_count,
            "txCountScanned": row.tx_count_scanned,
            "walletCreatedAtTs": row.wallet_created_at_ts,
            "accountAgeDays": row.account_age_days,
            "creationScanMode": row.creation_scan_mode.as_str(),
            "runScannedAtIso": scanned_at,
            "runSource": run_source,
        });
        writeln!(file, "{}", value)?;
    }
    Ok(())
}

fn append_csv(
    path: &Path,
    rows: &[&MintParticipant],
    scanned_at: &str,
    run_source: &str,
) -> Result<(), ReportError> {
    let needs_header = !path.exists();
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    let mut wtr = Writer::from_writer(&mut file);
    if needs_header {
        wtr.write_record(MINT_PARTICIPANTS_CSV_HEADER)?;
    }
    for row in rows {
        let buy_iso = tx_mapper::timestamp_to_datetime(row.buy_ts).to_rfc3339();
        let created_iso = row
            .wallet_created_at_ts
            .map(|ts| tx_mapper::timestamp_to_datetime(ts).to_rfc3339())
            .unwrap_or_default();
        wtr.write_record(&[
            row.wallet.clone(),
            row.mint.clone(),
            row.cutoff_ts.to_string(),
            row.buy_ts.to_string(),
            buy_iso,
            row.signature.clone(),
            row.token_amount.to_string(),
            row.stake_sol.to_string(),
            row.token_accounts_count.to_string(),
            row.tx_count_scanned.to_string(),
            row.wallet_created_at_ts.map(|t| t.to_string()).unwrap_or_default(),
            created_iso,
            row.account_age_days.map(|d| format!("{d:.2}")).unwrap_or_default(),
            row.creation_scan_mode.as_str().to_string(),
            String::new(),
            scanned_at.to_string(),
            run_source.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(serde::Serialize)]
struct FirstBuyerRow<'a> {
    rank: usize,
    wallet_address: &'a str,
    first_buy_timestamp: i64,
    first_buy_date: String,
    first_buy_signature: &'a str,
    token_amount: String,
}

pub fn first_buyers_json(buyers: &[FirstBuyer]) -> Result<String, ReportError> {
    let rows: Vec<FirstBuyerRow> = buyers
        .iter()
        .enumerate()
        .map(|(i, b)| FirstBuyerRow {
            rank: i + 1,
            wallet_address: &b.wallet,
            first_buy_timestamp: b.first_buy_timestamp,
            first_buy_date: first_buy_date(b).to_rfc3339(),
            first_buy_signature: &b.first_buy_signature,
            token_amount: b.token_amount.to_string(),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

pub fn first_buyers_csv(buyers: &[FirstBuyer]) -> Result<String, ReportError> {
    let mut wtr = Writer::from_writer(Cursor::new(Vec::new()));
    wtr.write_record(["rank", "walletAddress", "firstBuyTimestamp", "firstBuyDate", "firstBuySignature", "tokenAmount"])?;
    for (i, b) in buyers.iter().enumerate() {
        wtr.write_record(&[
            (i + 1).to_string(),
            b.wallet.clone(),
            b.first_buy_timestamp.to_string(),
            first_buy_date(b).to_rfc3339(),
            b.first_buy_signature.clone(),
            b.token_amount.to_string(),
        ])?;
    }
    let data = wtr
        .into_inner()
        .map_err(|e| ReportError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?
        .into_inner();
    String::from_utf8(data).map_err(|e| ReportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

pub fn first_buyers_markdown(buyers: &[FirstBuyer]) -> String {
    let mut out = String::from("| rank | wallet | first buy | signature | amount |\n|---|---|---|---|---|\n");
    if buyers.is_empty() {
        warn!("first_buyers_markdown called with no buyers");
    }
    for (i, b) in buyers.iter().enumerate() {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            i + 1,
            b.wallet,
            first_buy_date(b).to_rfc3339(),
            b.first_buy_signature,
            b.token_amount
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn buyer(wallet: &str) -> FirstBuyer {
        FirstBuyer {
            wallet: wallet.to_string(),
            first_buy_timestamp: 1_700_000_000,
            first_buy_signature: "sig1".to_string(),
            token_amount: Decimal::new(5, 0),
        }
    }

    #[test]
    fn json_report_ranks_in_input_order() {
        let json = first_buyers_json(&[buyer("a"), buyer("b")]).unwrap();
        assert!(json.contains("\"rank\": 1"));
        assert!(json.contains("\"rank\": 2"));
    }

    #[test]
    fn csv_report_has_fixed_header() {
        let csv = first_buyers_csv(&[buyer("a")]).unwrap();
        assert!(csv.starts_with("rank,walletAddress,firstBuyTimestamp,firstBuyDate,firstBuySignature,tokenAmount"));
    }

    #[test]
    fn markdown_report_includes_a_row_per_buyer() {
        let md = first_buyers_markdown(&[buyer("a"), buyer("b")]);
        assert_eq!(md.matches('|').count(), 5 * 2 + 5 * 2);
    }

    #[test]
    fn manifest_format_none_has_no_representation() {
        assert_eq!(ManifestFormat::from_config_str("jsonl"), Some(ManifestFormat::Jsonl));
        assert_eq!(ManifestFormat::from_config_str("csv"), Some(ManifestFormat::Csv));
        assert_eq!(ManifestFormat::from_config_str("none"), None);
    }
}
