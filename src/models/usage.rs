use serde::Serialize;

/// Charges aggregated per UTC day and per hostname of the charge source
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEntry {
    /// `YYYY-MM-DD`
    pub date: String,
    pub hostname: Option<String>,
    /// Dollars
    pub total_amount: f64,
    pub count: i64,
}
