//! NYC Open Data (Socrata) feeds: 311 service requests, expense budget,
//! City Council legislation, and the Mayor's Management Report.
//!
//! Socrata rows are kept as loose JSON because field names drift across
//! dataset revisions; pickers try the known aliases in order.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::{pick_f64, pick_str};
use crate::NYC_OPEN_DATA_BASE;
use crate::text::{format_change_percent, format_currency, truncate};

pub const SERVICE_REQUESTS_DATASET: &str = "erm2-nwe9";
pub const BUDGET_DATASET: &str = "mwzb-yiwb";
pub const LEGISLATION_DATASET: &str = "6ctv-n46c";
pub const MMR_DATASET: &str = "2jrp-puwz";

/// Fetch rows from a Socrata dataset with the given SoQL params.
pub async fn fetch_rows(
    client: &Client,
    dataset: &str,
    params: &[(&str, String)],
) -> Result<Vec<Value>> {
    let mut url = Url::parse(&format!("{NYC_OPEN_DATA_BASE}/{dataset}.json"))
        .context("invalid Socrata URL")?;
    url.query_pairs_mut()
        .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));

    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .await
        .with_context(|| format!("NYC Open Data request for {dataset} failed"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("NYC Open Data API error: {status}");
    }
    let rows: Vec<Value> = response
        .json()
        .await
        .with_context(|| format!("invalid NYC Open Data rows for {dataset}"))?;
    debug!("Fetched {} rows from {dataset}", rows.len());
    Ok(rows)
}

// ── 311 service requests ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintCount {
    #[serde(rename = "type")]
    pub complaint_type: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgencySummary {
    pub agency: String,
    pub count: u64,
    pub top_types: Vec<ComplaintCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentRequest {
    pub complaint_type: String,
    pub descriptor: String,
    pub agency: String,
    pub status: String,
    pub created_date: String,
    pub borough: String,
    pub location_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequestsPayload {
    pub updated_at: DateTime<Utc>,
    pub period: String,
    pub total_complaints: u64,
    pub top_complaint_types: Vec<ComplaintCount>,
    pub top_agencies: Vec<AgencySummary>,
    pub recent_requests: Vec<RecentRequest>,
    pub source: String,
    pub dataset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceRequestsPayload {
    pub fn fallback(error: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            updated_at: now,
            period: "Last 7 days".to_string(),
            total_complaints: 0,
            top_complaint_types: Vec::new(),
            top_agencies: Vec::new(),
            recent_requests: Vec::new(),
            source: "nyc-open-data".to_string(),
            dataset: "311-service-requests".to_string(),
            error: Some(error.into()),
        }
    }
}

/// Aggregated complaint counts for the last 7 days plus the 20 most recent
/// individual requests. A failed recent-requests fetch costs only the
/// detail view.
pub async fn fetch_311(
    client: &Client,
    now: DateTime<Utc>,
) -> Result<(Vec<Value>, Vec<Value>)> {
    let since = now
        .checked_sub_days(Days::new(7))
        .unwrap_or(now)
        .format("%Y-%m-%d")
        .to_string();
    let aggregated = fetch_rows(
        client,
        SERVICE_REQUESTS_DATASET,
        &[
            ("$select", "complaint_type,agency,count(*)".to_string()),
            ("$where", format!("created_date>'{since}'")),
            ("$group", "complaint_type,agency".to_string()),
            ("$order", "count DESC".to_string()),
            ("$limit", "50".to_string()),
        ],
    )
    .await?;

    let recent = match fetch_rows(
        client,
        SERVICE_REQUESTS_DATASET,
        &[
            ("$limit", "20".to_string()),
            ("$order", "created_date DESC".to_string()),
        ],
    )
    .await
    {
        Ok(rows) => rows,
        Err(e) => {
            warn!("311 recent-requests fetch failed: {e:#}");
            Vec::new()
        }
    };

    Ok((aggregated, recent))
}

pub fn normalize_311(
    aggregated: &[Value],
    recent: &[Value],
    now: DateTime<Utc>,
) -> ServiceRequestsPayload {
    let mut by_type: Vec<(String, u64)> = Vec::new();
    let mut by_agency: Vec<(String, u64, Vec<ComplaintCount>)> = Vec::new();
    let mut total_complaints: u64 = 0;

    for row in aggregated {
        let complaint_type = non_empty_or(pick_str(row, &["complaint_type"]), "Other");
        let agency = non_empty_or(pick_str(row, &["agency"]), "Unknown");
        let count = pick_f64(row, &["count"]) as u64;
        total_complaints += count;

        match by_type.iter_mut().find(|(t, _)| *t == complaint_type) {
            Some((_, c)) => *c += count,
            None => by_type.push((complaint_type.clone(), count)),
        }
        match by_agency.iter_mut().find(|(a, _, _)| *a == agency) {
            Some((_, c, types)) => {
                *c += count;
                types.push(ComplaintCount {
                    complaint_type,
                    count,
                });
            }
            None => by_agency.push((
                agency,
                count,
                vec![ComplaintCount {
                    complaint_type,
                    count,
                }],
            )),
        }
    }

    by_type.sort_by(|a, b| b.1.cmp(&a.1));
    let top_complaint_types = by_type
        .into_iter()
        .take(15)
        .map(|(complaint_type, count)| ComplaintCount {
            complaint_type,
            count,
        })
        .collect();

    by_agency.sort_by(|a, b| b.1.cmp(&a.1));
    let top_agencies = by_agency
        .into_iter()
        .take(10)
        .map(|(agency, count, mut types)| {
            types.sort_by(|a, b| b.count.cmp(&a.count));
            types.truncate(3);
            AgencySummary {
                agency,
                count,
                top_types: types,
            }
        })
        .collect();

    let recent_requests = recent
        .iter()
        .take(10)
        .map(|row| RecentRequest {
            complaint_type: non_empty_or(pick_str(row, &["complaint_type"]), "Unknown"),
            descriptor: pick_str(row, &["descriptor"]),
            agency: pick_str(row, &["agency"]),
            status: pick_str(row, &["status"]),
            created_date: format_short_datetime(&pick_str(row, &["created_date"])),
            borough: pick_str(row, &["borough"]),
            location_type: pick_str(row, &["location_type"]),
        })
        .collect();

    ServiceRequestsPayload {
        updated_at: now,
        period: "Last 7 days".to_string(),
        total_complaints,
        top_complaint_types,
        top_agencies,
        recent_requests,
        source: "nyc-open-data".to_string(),
        dataset: "311-service-requests".to_string(),
        error: None,
    }
}

// ── Expense budget ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetCategory {
    pub name: String,
    pub adopted: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgencyBudget {
    pub agency: String,
    pub fiscal_year: String,
    pub adopted_budget: String,
    pub modified_budget: String,
    pub adopted_raw: f64,
    pub modified_raw: f64,
    pub change: String,
    pub top_categories: Vec<BudgetCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetPayload {
    pub updated_at: DateTime<Utc>,
    pub fiscal_year: String,
    pub total_adopted: String,
    pub total_modified: String,
    pub items: Vec<AgencyBudget>,
    pub source: String,
    pub dataset: String,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BudgetPayload {
    pub fn fallback(error: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            updated_at: now,
            fiscal_year: String::new(),
            total_adopted: String::new(),
            total_modified: String::new(),
            items: Vec::new(),
            source: "nyc-open-data".to_string(),
            dataset: "expense-budget".to_string(),
            count: 0,
            error: Some(error.into()),
        }
    }
}

pub async fn fetch_budget(client: &Client) -> Result<Vec<Value>> {
    fetch_rows(
        client,
        BUDGET_DATASET,
        &[
            ("$limit", "500".to_string()),
            ("$order", "fiscal_year DESC".to_string()),
        ],
    )
    .await
}

pub fn normalize_budget(rows: &[Value], now: DateTime<Utc>) -> BudgetPayload {
    struct Agg {
        agency: String,
        fiscal_year: String,
        adopted: f64,
        modified: f64,
        categories: Vec<(String, f64)>,
    }

    let mut agencies: Vec<Agg> = Vec::new();
    let mut latest_fiscal_year = String::new();

    for row in rows {
        let agency = non_empty_or(pick_str(row, &["agency_name", "agency"]), "Unknown");
        let fiscal_year = pick_str(row, &["fiscal_year", "publication_date"]);
        let adopted = pick_f64(
            row,
            &["adopted_budget_amount", "adopted_budget", "adopted"],
        );
        let modified = pick_f64(
            row,
            &[
                "current_modified_budget_amount",
                "current_modified_budget",
                "modified",
            ],
        );
        let budget_code = pick_str(
            row,
            &["budget_code_name", "unit_appropriation_name", "budget_code"],
        );

        if fiscal_year > latest_fiscal_year {
            latest_fiscal_year = fiscal_year.clone();
        }

        let agg = match agencies.iter_mut().find(|a| a.agency == agency) {
            Some(agg) => agg,
            None => {
                agencies.push(Agg {
                    agency,
                    fiscal_year,
                    adopted: 0.0,
                    modified: 0.0,
                    categories: Vec::new(),
                });
                agencies.last_mut().expect("just pushed")
            }
        };
        agg.adopted += adopted;
        agg.modified += modified;
        if !budget_code.is_empty() && (adopted > 0.0 || modified > 0.0) {
            agg.categories.push((budget_code, adopted));
        }
    }

    agencies.retain(|a| a.adopted > 0.0);
    agencies.sort_by(|a, b| {
        b.adopted
            .partial_cmp(&a.adopted)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    agencies.truncate(20);

    let total_adopted: f64 = agencies.iter().map(|a| a.adopted).sum();
    let total_modified: f64 = agencies.iter().map(|a| a.modified).sum();

    let items: Vec<AgencyBudget> = agencies
        .into_iter()
        .map(|mut agg| {
            agg.categories.sort_by(|a, b| {
                b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
            });
            AgencyBudget {
                adopted_budget: format_currency(agg.adopted),
                modified_budget: format_currency(agg.modified),
                change: format_change_percent(agg.adopted, agg.modified),
                adopted_raw: agg.adopted,
                modified_raw: agg.modified,
                top_categories: agg
                    .categories
                    .into_iter()
                    .take(3)
                    .map(|(name, adopted)| BudgetCategory {
                        name,
                        adopted: format_currency(adopted),
                    })
                    .collect(),
                agency: agg.agency,
                fiscal_year: agg.fiscal_year,
            }
        })
        .collect();

    BudgetPayload {
        updated_at: now,
        fiscal_year: latest_fiscal_year,
        total_adopted: format_currency(total_adopted),
        total_modified: format_currency(total_modified),
        count: items.len(),
        items,
        source: "nyc-open-data".to_string(),
        dataset: "expense-budget".to_string(),
        error: None,
    }
}

// ── City Council legislation ───────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegislationItem {
    pub intro_number: String,
    pub name: String,
    pub status: String,
    pub intro_date: String,
    pub sponsor: String,
    pub committee: String,
    pub local_law: String,
    pub enactment_date: String,
    pub is_local_law: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegislationPayload {
    pub updated_at: DateTime<Utc>,
    pub local_laws: Vec<LegislationItem>,
    pub pending_bills: Vec<LegislationItem>,
    pub source: String,
    pub dataset: String,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LegislationPayload {
    pub fn fallback(error: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            updated_at: now,
            local_laws: Vec::new(),
            pending_bills: Vec::new(),
            source: "nyc-open-data".to_string(),
            dataset: "city-council-legislation".to_string(),
            count: 0,
            error: Some(error.into()),
        }
    }
}

pub async fn fetch_legislation(client: &Client) -> Result<Vec<Value>> {
    fetch_rows(
        client,
        LEGISLATION_DATASET,
        &[
            ("$limit", "50".to_string()),
            ("$order", "intro_date DESC".to_string()),
        ],
    )
    .await
}

pub fn normalize_legislation(rows: &[Value], now: DateTime<Utc>) -> LegislationPayload {
    let items: Vec<LegislationItem> = rows
        .iter()
        .map(|row| {
            let local_law = pick_str(row, &["local_law", "local_law_number"]);
            LegislationItem {
                intro_number: pick_str(row, &["int_no", "intro_number", "file_number"]),
                name: truncate(&pick_str(row, &["name", "title", "local_law"]), 150),
                status: pick_str(row, &["status", "current_status"]),
                intro_date: format_short_date(&pick_str(
                    row,
                    &["intro_date", "introduced_date"],
                )),
                sponsor: pick_str(row, &["sponsor", "prime_sponsor"]),
                committee: pick_str(row, &["committee"]),
                enactment_date: format_short_date(&pick_str(row, &["enactment_date"])),
                is_local_law: !local_law.is_empty(),
                local_law,
            }
        })
        .filter(|item| !item.name.is_empty())
        .collect();

    let count = items.len();
    let local_laws = items
        .iter()
        .filter(|i| i.is_local_law)
        .take(10)
        .cloned()
        .collect();
    let pending_bills = items
        .iter()
        .filter(|i| !i.is_local_law)
        .take(15)
        .cloned()
        .collect();

    LegislationPayload {
        updated_at: now,
        local_laws,
        pending_bills,
        source: "nyc-open-data".to_string(),
        dataset: "city-council-legislation".to_string(),
        count,
        error: None,
    }
}

// ── Mayor's Management Report ──────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MmrMetric {
    pub indicator: String,
    pub actual: String,
    pub target: String,
    pub fiscal_year: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgencyMetrics {
    pub agency: String,
    pub fiscal_year: String,
    pub metrics: Vec<MmrMetric>,
    pub metric_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MmrPayload {
    pub updated_at: DateTime<Utc>,
    pub items: Vec<AgencyMetrics>,
    pub source: String,
    pub dataset: String,
    pub count: usize,
    pub total_records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MmrPayload {
    pub fn fallback(error: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            updated_at: now,
            items: Vec::new(),
            source: "nyc-open-data".to_string(),
            dataset: "mayors-management-report".to_string(),
            count: 0,
            total_records: 0,
            error: Some(error.into()),
        }
    }
}

pub async fn fetch_mmr(client: &Client) -> Result<Vec<Value>> {
    fetch_rows(
        client,
        MMR_DATASET,
        &[
            ("$limit", "100".to_string()),
            ("$order", "fiscal_year DESC".to_string()),
        ],
    )
    .await
}

pub fn normalize_mmr(rows: &[Value], now: DateTime<Utc>) -> MmrPayload {
    let mut agencies: Vec<(String, String, Vec<MmrMetric>)> = Vec::new();

    for row in rows {
        let agency = non_empty_or(pick_str(row, &["agency_name", "agency"]), "Unknown Agency");
        let indicator = pick_str(row, &["indicator_name", "indicator"]);
        let fiscal_year = pick_str(row, &["fiscal_year"]);
        let actual = pick_str(row, &["actual", "value"]);
        let target = pick_str(row, &["target"]);

        let entry = match agencies.iter_mut().find(|(a, _, _)| *a == agency) {
            Some(entry) => entry,
            None => {
                agencies.push((agency, fiscal_year.clone(), Vec::new()));
                agencies.last_mut().expect("just pushed")
            }
        };
        if !indicator.is_empty() && !actual.is_empty() {
            entry.2.push(MmrMetric {
                indicator,
                actual,
                target,
                fiscal_year,
            });
        }
    }

    let items: Vec<AgencyMetrics> = agencies
        .into_iter()
        .filter(|(_, _, metrics)| !metrics.is_empty())
        .take(15)
        .map(|(agency, fiscal_year, metrics)| AgencyMetrics {
            agency,
            fiscal_year,
            metric_count: metrics.len(),
            metrics: metrics.into_iter().take(5).collect(),
        })
        .collect();

    MmrPayload {
        updated_at: now,
        count: items.len(),
        items,
        source: "nyc-open-data".to_string(),
        dataset: "mayors-management-report".to_string(),
        total_records: rows.len(),
        error: None,
    }
}

// ── Shared helpers ─────────────────────────────────────────────

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// "Jan 5, 2026"; empty stays empty, unparseable passes through.
fn format_short_date(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    match parse_timestamp(raw) {
        Some(dt) => dt.format("%b %-d, %Y").to_string(),
        None => raw.to_string(),
    }
}

/// "Jan 5, 2:03 PM" for the recent-requests detail view.
fn format_short_datetime(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    match parse_timestamp(raw) {
        Some(dt) => dt.format("%b %-d, %-I:%M %p").to_string(),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap()
    }

    #[test]
    fn aggregates_311_by_type_and_agency() {
        let aggregated = vec![
            json!({"complaint_type": "Noise", "agency": "NYPD", "count": "120"}),
            json!({"complaint_type": "Noise", "agency": "DEP", "count": "30"}),
            json!({"complaint_type": "Heat", "agency": "HPD", "count": "80"}),
            json!({"agency": "NYPD", "count": "5"}),
        ];
        let payload = normalize_311(&aggregated, &[], now());
        assert_eq!(payload.total_complaints, 235);
        assert_eq!(payload.top_complaint_types[0].complaint_type, "Noise");
        assert_eq!(payload.top_complaint_types[0].count, 150);
        assert_eq!(payload.top_agencies[0].agency, "NYPD");
        assert_eq!(payload.top_agencies[0].count, 125);
        // The blank complaint type groups under "Other".
        assert!(payload
            .top_complaint_types
            .iter()
            .any(|c| c.complaint_type == "Other" && c.count == 5));
    }

    #[test]
    fn recent_311_requests_are_capped_and_formatted() {
        let recent: Vec<Value> = (0..15)
            .map(|i| {
                json!({
                    "complaint_type": "Noise",
                    "descriptor": format!("d{i}"),
                    "agency": "NYPD",
                    "status": "Open",
                    "created_date": "2026-08-29T14:05:00.000",
                    "borough": "QUEENS",
                    "location_type": "Street"
                })
            })
            .collect();
        let payload = normalize_311(&[], &recent, now());
        assert_eq!(payload.recent_requests.len(), 10);
        assert_eq!(payload.recent_requests[0].created_date, "Aug 29, 2:05 PM");
    }

    #[test]
    fn budget_groups_and_ranks_agencies() {
        let rows = vec![
            json!({"agency_name": "DOE", "fiscal_year": "2026", "adopted_budget_amount": "30000000000", "current_modified_budget_amount": "31000000000", "budget_code_name": "Schools"}),
            json!({"agency_name": "DOE", "fiscal_year": "2026", "adopted_budget_amount": "1000000000", "current_modified_budget_amount": "900000000", "budget_code_name": "Admin"}),
            json!({"agency_name": "DOT", "fiscal_year": "2026", "adopted_budget_amount": "2000000000", "current_modified_budget_amount": "2000000000", "budget_code_name": "Roads"}),
            json!({"agency_name": "Empty Agency", "fiscal_year": "2026", "adopted_budget_amount": "0", "current_modified_budget_amount": "0"}),
        ];
        let payload = normalize_budget(&rows, now());
        assert_eq!(payload.items.len(), 2);
        assert_eq!(payload.items[0].agency, "DOE");
        assert_eq!(payload.items[0].adopted_budget, "$31.00B");
        assert_eq!(payload.items[0].top_categories[0].name, "Schools");
        assert_eq!(payload.fiscal_year, "2026");
        assert_eq!(payload.total_adopted, "$33.00B");
        assert_eq!(payload.items[0].change, "+2.9%");
    }

    #[test]
    fn legislation_splits_laws_from_bills() {
        let long_name = "A ".repeat(120);
        let rows = vec![
            json!({"int_no": "Int 100", "name": "Rent stabilization expansion", "status": "Enacted", "local_law": "LL 12", "intro_date": "2026-03-01"}),
            json!({"int_no": "Int 101", "name": long_name, "status": "Committee", "intro_date": "2026-04-15"}),
            json!({"int_no": "Int 102", "status": "Committee"}),
        ];
        let payload = normalize_legislation(&rows, now());
        assert_eq!(payload.count, 2);
        assert_eq!(payload.local_laws.len(), 1);
        assert!(payload.local_laws[0].is_local_law);
        assert_eq!(payload.local_laws[0].intro_date, "Mar 1, 2026");
        assert_eq!(payload.pending_bills.len(), 1);
        assert!(payload.pending_bills[0].name.ends_with("..."));
    }

    #[test]
    fn mmr_caps_metrics_and_keeps_first_seen_order() {
        let mut rows: Vec<Value> = (0..8)
            .map(|i| {
                json!({
                    "agency_name": "NYPD",
                    "indicator_name": format!("ind{i}"),
                    "fiscal_year": "2026",
                    "actual": "10"
                })
            })
            .collect();
        rows.push(json!({"agency_name": "FDNY", "indicator_name": "response", "fiscal_year": "2026", "actual": "4:30"}));
        rows.push(json!({"agency_name": "No Metrics Dept", "fiscal_year": "2026"}));

        let payload = normalize_mmr(&rows, now());
        assert_eq!(payload.items.len(), 2);
        assert_eq!(payload.items[0].agency, "NYPD");
        assert_eq!(payload.items[0].metrics.len(), 5);
        assert_eq!(payload.items[0].metric_count, 8);
        assert_eq!(payload.items[1].agency, "FDNY");
        assert_eq!(payload.total_records, 10);
    }
}
