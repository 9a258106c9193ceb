use std::collections::BTreeMap;

use url::Url;

use crate::models::{Charge, UsageEntry};

/// Extracts the hostname of a charge source URL.
///
/// Missing, unparseable and host-less sources all land in the `None` bucket.
pub fn source_hostname(source: Option<&str>) -> Option<String> {
    let url = Url::parse(source?).ok()?;
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_string())
}

/// Aggregates charges by UTC calendar date and source hostname.
///
/// Output is ordered by ascending date, then ascending hostname within a date
/// (the `None` hostname sorts first). Totals are converted from cents to
/// dollars.
pub fn aggregate_usage(charges: &[Charge]) -> Vec<UsageEntry> {
    // (date, hostname) -> (cents, count); BTreeMap gives the final order for free
    let mut groups: BTreeMap<(String, Option<String>), (i64, i64)> = BTreeMap::new();

    for charge in charges {
        let date = charge.timestamp.format("%Y-%m-%d").to_string();
        let hostname = source_hostname(charge.source.as_deref());

        let entry = groups.entry((date, hostname)).or_insert((0, 0));
        entry.0 += charge.amount;
        entry.1 += 1;
    }

    groups
        .into_iter()
        .map(|((date, hostname), (cents, count))| UsageEntry {
            date,
            hostname,
            total_amount: cents as f64 / 100.0,
            count,
        })
        .collect()
}
