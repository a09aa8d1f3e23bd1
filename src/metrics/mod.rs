// src/metrics/mod.rs
//
// Typed client records and the summary metrics / chart series derived from them.
// Everything here is a pure function of its input.

use serde::Serialize;

use crate::process::utils::{capitalize, coerce_amount, first_word};
use crate::process::RawRow;

pub mod memo;

pub const COL_CLIENT: &str = "Clients";
pub const COL_PRODUCTS: &str = "No. of Products";
pub const COL_PRICE: &str = "Price";
pub const COL_STATUS: &str = "Status";
pub const COL_EMAIL: &str = "Email";

const FALLBACK_LABEL: &str = "Client";
const UNKNOWN_STATUS: &str = "unknown";

/// Known order states; matching ignores case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Delivered,
    InProgress,
    Pending,
    Other,
}

impl StatusKind {
    pub fn classify(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "delivered" => StatusKind::Delivered,
            "in progress" => StatusKind::InProgress,
            "pending" => StatusKind::Pending,
            _ => StatusKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientRecord {
    pub name: String,
    pub email: String,
    pub product_count: u64,
    pub price_amount: u64,
    pub status: String,
}

impl ClientRecord {
    /// Coerce one raw row. Unparseable numbers become 0.
    pub fn from_row(row: &RawRow) -> Self {
        ClientRecord {
            name: row.get(COL_CLIENT).to_string(),
            email: row.get(COL_EMAIL).to_string(),
            product_count: coerce_amount(row.get(COL_PRODUCTS)),
            price_amount: coerce_amount(row.get(COL_PRICE)),
            status: row.get(COL_STATUS).to_string(),
        }
    }

    pub fn status_kind(&self) -> StatusKind {
        StatusKind::classify(&self.status)
    }

    /// Short chart label: first word of the client name.
    pub fn label(&self) -> &str {
        first_word(&self.name, FALLBACK_LABEL)
    }
}

pub fn to_client_records(rows: &[RawRow]) -> Vec<ClientRecord> {
    rows.iter().map(ClientRecord::from_row).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub total_clients: u64,
    pub total_products: u64,
    pub total_revenue: u64,
    pub delivered_count: u64,
    pub in_progress_count: u64,
    pub pending_count: u64,
    /// Delivered share in percent, rounded to one decimal; 0 with no clients.
    pub conversion_rate: f64,
    pub average_products: u64,
}

impl Metrics {
    /// `conversion_rate` formatted with exactly one fractional digit.
    pub fn conversion_rate_display(&self) -> String {
        format!("{:.1}", self.conversion_rate)
    }
}

pub fn compute(records: &[ClientRecord]) -> Metrics {
    let mut m = Metrics {
        total_clients: records.len() as u64,
        ..Metrics::default()
    };

    for r in records {
        m.total_products = m.total_products.saturating_add(r.product_count);
        m.total_revenue = m.total_revenue.saturating_add(r.price_amount);
        match r.status_kind() {
            StatusKind::Delivered => m.delivered_count += 1,
            StatusKind::InProgress => m.in_progress_count += 1,
            StatusKind::Pending => m.pending_count += 1,
            StatusKind::Other => {}
        }
    }

    if m.total_clients > 0 {
        let rate = m.delivered_count as f64 / m.total_clients as f64 * 100.0;
        m.conversion_rate = (rate * 10.0).round() / 10.0;
        m.average_products =
            (m.total_products as f64 / m.total_clients as f64).round() as u64;
    }
    m
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub name: String,
    pub value: u64,
}

pub type ChartSeries = Vec<ChartPoint>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeriesSet {
    /// One point per record, in record order.
    pub revenue: ChartSeries,
    /// One point per record, in record order.
    pub products: ChartSeries,
    /// One point per distinct lower-cased status, in first-seen order.
    pub status: ChartSeries,
}

pub fn to_series(records: &[ClientRecord]) -> SeriesSet {
    let revenue = records
        .iter()
        .map(|r| ChartPoint {
            name: r.label().to_string(),
            value: r.price_amount,
        })
        .collect();

    let products = records
        .iter()
        .map(|r| ChartPoint {
            name: r.label().to_string(),
            value: r.product_count,
        })
        .collect();

    // Vec keeps first-seen order; status cardinality is tiny.
    let mut counts: Vec<(String, u64)> = Vec::new();
    for r in records {
        let key = match r.status.trim().to_lowercase() {
            s if s.is_empty() => UNKNOWN_STATUS.to_string(),
            s => s,
        };
        match counts.iter_mut().find(|(k, _)| *k == key) {
            Some((_, n)) => *n += 1,
            None => counts.push((key, 1)),
        }
    }
    let status = counts
        .into_iter()
        .map(|(key, value)| ChartPoint {
            name: capitalize(&key),
            value,
        })
        .collect();

    SeriesSet {
        revenue,
        products,
        status,
    }
}

/// Records, metrics and series for one row snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Derived {
    pub records: Vec<ClientRecord>,
    pub metrics: Metrics,
    pub series: SeriesSet,
}

impl Derived {
    pub fn from_rows(rows: &[RawRow]) -> Self {
        let records = to_client_records(rows);
        let metrics = compute(&records);
        let series = to_series(&records);
        Derived {
            records,
            metrics,
            series,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::parse;

    fn row(name: &str, products: &str, price: &str, status: &str) -> RawRow {
        [
            (COL_CLIENT, name),
            (COL_PRODUCTS, products),
            (COL_PRICE, price),
            (COL_STATUS, status),
            (COL_EMAIL, "x@example.com"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn example_sheet_metrics() {
        let rows = parse(
            "Clients,No. of Products,Price,Status,Email
Acme Co,3,₹1500,Delivered,a@x.com
Beta Ltd,0,₹0,Pending,b@x.com",
        );
        let m = compute(&to_client_records(&rows));
        assert_eq!(m.total_clients, 2);
        assert_eq!(m.total_products, 3);
        assert_eq!(m.total_revenue, 1500);
        assert_eq!(m.delivered_count, 1);
        assert_eq!(m.in_progress_count, 0);
        assert_eq!(m.pending_count, 1);
        assert_eq!(m.conversion_rate_display(), "50.0");
        assert_eq!(m.average_products, 2);
    }

    #[test]
    fn empty_input_is_all_zero() {
        let m = compute(&[]);
        assert_eq!(m, Metrics::default());
        assert_eq!(m.conversion_rate, 0.0);
        assert_eq!(m.conversion_rate_display(), "0.0");
        assert_eq!(to_series(&[]), SeriesSet::default());
    }

    #[test]
    fn coercion_never_goes_negative_or_fails() {
        let rows = vec![
            row("A", "abc", "₹1,200", "delivered"),
            row("B", "", "", "DELIVERED"),
            row("C", "-4", "n/a", "In Progress"),
        ];
        let records = to_client_records(&rows);
        assert_eq!(records[0].price_amount, 1200);
        assert_eq!(records[0].product_count, 0);
        assert_eq!(records[1].price_amount, 0);
        assert_eq!(records[1].product_count, 0);
        assert_eq!(records[2].product_count, 4);
        assert_eq!(records[2].price_amount, 0);

        let m = compute(&records);
        assert_eq!(m.total_revenue, 1200);
        assert_eq!(m.delivered_count, 2);
        assert_eq!(m.in_progress_count, 1);
    }

    #[test]
    fn decimal_prices_keep_their_whole_part() {
        let rows = vec![
            row("A", "2.5", "₹1500.00", "Delivered"),
            row("B", "1", "₹1,250.75", "Pending"),
        ];
        let records = to_client_records(&rows);
        assert_eq!(records[0].price_amount, 1500);
        assert_eq!(records[0].product_count, 2);
        assert_eq!(records[1].price_amount, 1250);
        assert_eq!(compute(&records).total_revenue, 2750);
    }

    #[test]
    fn blank_line_in_sheet_counts_as_a_client() {
        let rows = parse("Clients,Status\nAcme,Delivered\n\nBeta,Pending\n");
        let records = to_client_records(&rows);
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].name, "");

        let m = compute(&records);
        assert_eq!(m.total_clients, 3);
        assert_eq!(m.conversion_rate_display(), "33.3");

        let s = to_series(&records);
        assert!(s
            .status
            .contains(&ChartPoint { name: "Unknown".into(), value: 1 }));
    }

    #[test]
    fn conversion_rate_rounds_to_one_decimal() {
        let rows = vec![
            row("A", "1", "1", "Delivered"),
            row("B", "1", "1", "pending"),
            row("C", "1", "1", "shipped"),
        ];
        let m = compute(&to_client_records(&rows));
        assert_eq!(m.conversion_rate, 33.3);
        assert_eq!(m.conversion_rate_display(), "33.3");

        let rows = vec![
            row("A", "1", "1", "Delivered"),
            row("B", "1", "1", "Delivered"),
            row("C", "1", "1", "pending"),
        ];
        let m = compute(&to_client_records(&rows));
        assert_eq!(m.conversion_rate_display(), "66.7");
    }

    #[test]
    fn unknown_statuses_are_excluded_from_counts() {
        let rows = vec![row("A", "1", "1", "Cancelled"), row("B", "1", "1", "")];
        let m = compute(&to_client_records(&rows));
        assert_eq!(m.delivered_count + m.in_progress_count + m.pending_count, 0);
        assert_eq!(m.conversion_rate, 0.0);
    }

    #[test]
    fn series_keep_record_order_and_duplicates() {
        let rows = vec![
            row("Acme Co", "3", "₹1500", "Delivered"),
            row("Acme Co", "2", "₹700", "Pending"),
            row("", "1", "₹10", "pending"),
        ];
        let s = to_series(&to_client_records(&rows));
        assert_eq!(s.revenue.len(), 3);
        assert_eq!(s.products.len(), 3);
        assert_eq!(
            s.revenue,
            vec![
                ChartPoint { name: "Acme".into(), value: 1500 },
                ChartPoint { name: "Acme".into(), value: 700 },
                ChartPoint { name: "Client".into(), value: 10 },
            ]
        );
        assert_eq!(s.products[0].value, 3);
        assert_eq!(s.products[2].value, 1);
    }

    #[test]
    fn status_histogram_groups_case_insensitively() {
        let rows = vec![
            row("A", "1", "1", "Delivered"),
            row("B", "1", "1", "in progress"),
            row("C", "1", "1", "DELIVERED"),
            row("D", "1", "1", ""),
            row("E", "1", "1", "In Progress"),
        ];
        let s = to_series(&to_client_records(&rows));
        assert_eq!(
            s.status,
            vec![
                ChartPoint { name: "Delivered".into(), value: 2 },
                ChartPoint { name: "In progress".into(), value: 2 },
                ChartPoint { name: "Unknown".into(), value: 1 },
            ]
        );
        assert!(s.status.iter().all(|p| p.name != "Pending"));
    }

    #[test]
    fn status_kind_classification() {
        assert_eq!(StatusKind::classify(" Delivered "), StatusKind::Delivered);
        assert_eq!(StatusKind::classify("IN PROGRESS"), StatusKind::InProgress);
        assert_eq!(StatusKind::classify("pending"), StatusKind::Pending);
        assert_eq!(StatusKind::classify("lost"), StatusKind::Other);
    }

    #[test]
    fn derived_is_repeatable() {
        let rows = vec![row("A", "2", "₹5", "Delivered")];
        assert_eq!(Derived::from_rows(&rows), Derived::from_rows(&rows));
    }
}
