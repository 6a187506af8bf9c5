//! Extraction orchestration
//!
//! Builds the Tally export envelope per group, issues the HTTP call with a
//! bounded timeout, and hands the response body to the normalizer. Network
//! and protocol failures are classified and logged but never propagate: a
//! failed group contributes zero records and the cycle carries on.

use chrono::{NaiveDate, Utc};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Duration;

use tallysync_config::Config;
use tallysync_parser::{normalize, AccountRecord, AccountType};

use crate::error::CoreError;
use crate::store::Store;

/// The two fixed ledger groups extracted each cycle
pub const DEBTOR_GROUP: &str = "Sundry Debtors";
pub const CREDITOR_GROUP: &str = "Sundry Creditors";

/// Start of the export date range
const FISCAL_YEAR_START: &str = "01-04-2023";

/// Upstream request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// What one extraction cycle did, for logging and the `--once` exit path
#[derive(Debug, Clone, Default)]
pub struct CycleSummary {
    pub debtors_count: usize,
    pub creditors_count: usize,
    pub total_debtors: f64,
    pub total_creditors: f64,
    pub persisted: bool,
}

/// Holds the HTTP client and the upstream/diagnostic settings for a cycle.
/// Passed explicitly wherever extraction runs; there is no ambient state.
pub struct Extractor {
    client: reqwest::Client,
    upstream_url: String,
    dump_dir: PathBuf,
}

impl Extractor {
    pub fn new(config: &Config) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            upstream_url: config.upstream.url.clone(),
            dump_dir: config.storage.dump_dir.clone(),
        })
    }

    /// Fetch and normalize one ledger group. Total: every failure mode is
    /// logged under its category and yields an empty result.
    pub async fn extract_group(&self, group_name: &str) -> Vec<AccountRecord> {
        info!("attempting to fetch data for group: {}", group_name);
        let request_body = build_request(group_name, Utc::now().date_naive());

        let response = match self
            .client
            .post(&self.upstream_url)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(request_body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                error!("timeout fetching {}: {}", group_name, e);
                return Vec::new();
            }
            Err(e) if e.is_connect() => {
                error!("connection error for {}: {}", group_name, e);
                return Vec::new();
            }
            Err(e) => {
                error!("request error for {}: {}", group_name, e);
                return Vec::new();
            }
        };

        let status = response.status();
        if !status.is_success() {
            error!("upstream returned HTTP {} for {}", status, group_name);
            return Vec::new();
        }
        info!("HTTP status: {} for {}", status, group_name);

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                error!("failed reading response body for {}: {}", group_name, e);
                return Vec::new();
            }
        };

        if body.trim().is_empty() {
            warn!("no data returned for {}", group_name);
            return Vec::new();
        }

        normalize(&body, group_name, &self.dump_dir)
    }

    /// Run one full extraction cycle: both groups, concatenated into one
    /// batch, persisted only when non-empty. A storage failure aborts this
    /// cycle's persistence and nothing else.
    pub async fn run_cycle(&self, store: &Store) -> CycleSummary {
        info!("starting data extraction");

        let debtors = self.extract_group(DEBTOR_GROUP).await;
        let creditors = self.extract_group(CREDITOR_GROUP).await;

        let mut summary = CycleSummary {
            debtors_count: debtors.len(),
            creditors_count: creditors.len(),
            total_debtors: balance_total(&debtors, AccountType::Debtor),
            total_creditors: balance_total(&creditors, AccountType::Creditor),
            persisted: false,
        };

        let mut batch = debtors;
        batch.extend(creditors);

        if batch.is_empty() {
            warn!(
                "no data extracted; check that the Tally server is running with a company \
                 loaded and that ledgers exist under '{}' or '{}' with non-zero balances",
                DEBTOR_GROUP, CREDITOR_GROUP
            );
        } else {
            match store.replace_all(&batch) {
                Ok(_) => summary.persisted = true,
                Err(e) => error!("database save error: {}", e),
            }
        }

        info!(
            "summary: {} debtors (₹{:.2}), {} creditors (₹{:.2})",
            summary.debtors_count,
            summary.total_debtors,
            summary.creditors_count,
            summary.total_creditors
        );
        info!("extraction complete");
        summary
    }
}

fn balance_total(records: &[AccountRecord], account_type: AccountType) -> f64 {
    records
        .iter()
        .filter(|r| r.account_type == account_type)
        .map(|r| r.balance)
        .sum()
}

/// Render the Tally collection-export envelope for one group.
fn build_request(group_name: &str, to_date: NaiveDate) -> String {
    format!(
        r#"<ENVELOPE>
    <HEADER>
        <VERSION>1</VERSION>
        <TALLYREQUEST>Export</TALLYREQUEST>
        <TYPE>Collection</TYPE>
        <ID>LedgerUnderGroup</ID>
    </HEADER>
    <BODY>
        <DESC>
            <STATICVARIABLES>
                <SVEXPORTFORMAT>$$SysName:XML</SVEXPORTFORMAT>
                <SVFROMDATE>{from}</SVFROMDATE>
                <SVTODATE>{to}</SVTODATE>
            </STATICVARIABLES>
            <TDL>
                <TDLMESSAGE>
                    <COLLECTION NAME="LedgerUnderGroup" ISMODIFY="No">
                        <TYPE>Ledger</TYPE>
                        <FETCH>Name, ClosingBalance, Parent, BillDate</FETCH>
                        <FILTER>GroupFilter</FILTER>
                    </COLLECTION>
                    <SYSTEM TYPE="Formulae" NAME="GroupFilter">$Parent = "{group}"</SYSTEM>
                </TDLMESSAGE>
            </TDL>
        </DESC>
    </BODY>
</ENVELOPE>"#,
        from = FISCAL_YEAR_START,
        to = to_date.format("%d-%m-%Y"),
        group = group_name
    )
}

// ==================== Tests ====================
