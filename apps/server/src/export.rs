//! Export rendering: CSV, spreadsheet-flavoured CSV and printable HTML.
//!
//! Pure functions from repository rows to strings; the export routes only
//! set headers around them.
//!
//! ```text
//! Vec<ExportSaleRow> ──► sales_csv(Comma)       text/csv
//!                    ──► sales_csv(Spreadsheet) BOM + ';' (spreadsheet locale)
//!                    ──► sales_report_html      printable report
//! SaleDetail         ──► ticket_html            printable ticket
//! ```

use chrono::{NaiveDate, Utc};

use invenstore_core::{Money, Tenant};
use invenstore_db::{ExportSaleRow, SaleDetail};

const UTF8_BOM: &str = "\u{feff}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvFlavor {
    /// Plain CSV, comma separated.
    Comma,
    /// UTF-8 BOM and `;` separators, with subtotal and discount columns.
    Spreadsheet,
}

impl CsvFlavor {
    fn separator(&self) -> char {
        match self {
            CsvFlavor::Comma => ',',
            CsvFlavor::Spreadsheet => ';',
        }
    }
}

/// Quotes a field when it contains the separator, a quote or a newline.
pub fn csv_field(value: &str, separator: char) -> String {
    if value.contains(separator) || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn money(cents: i64) -> String {
    Money::from_cents(cents).to_decimal_string()
}

pub fn sales_csv(rows: &[ExportSaleRow], flavor: CsvFlavor) -> String {
    let sep = flavor.separator();
    let mut out = String::new();

    let header: &[&str] = match flavor {
        CsvFlavor::Comma => &["id", "date", "time", "user", "customer", "total", "payment_type"],
        CsvFlavor::Spreadsheet => &[
            "id", "date", "time", "user", "customer", "subtotal", "discount", "total", "payment_type",
        ],
    };

    if flavor == CsvFlavor::Spreadsheet {
        out.push_str(UTF8_BOM);
    }
    out.push_str(&header.join(&sep.to_string()));
    out.push('\n');

    for row in rows {
        let mut fields = vec![
            row.id.clone(),
            row.created_at.format("%Y-%m-%d").to_string(),
            row.created_at.format("%H:%M:%S").to_string(),
            row.user_name.clone(),
            row.customer_name.clone().unwrap_or_default(),
        ];
        if flavor == CsvFlavor::Spreadsheet {
            fields.push(money(row.subtotal_cents));
            fields.push(money(row.discount_cents));
        }
        fields.push(money(row.total_cents));
        fields.push(row.payment_type.as_str().to_string());

        let line: Vec<String> = fields.iter().map(|f| csv_field(f, sep)).collect();
        out.push_str(&line.join(&sep.to_string()));
        out.push('\n');
    }

    out
}

/// Escapes text for embedding in HTML element content or attributes.
pub fn html_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const PRINT_STYLE: &str = r#"<style>
body { font-family: Arial, sans-serif; margin: 24px; color: #222; }
h1 { font-size: 20px; margin-bottom: 4px; }
table { width: 100%; border-collapse: collapse; margin-top: 12px; font-size: 12px; }
th, td { border-bottom: 1px solid #ddd; padding: 6px; text-align: left; }
td.num, th.num { text-align: right; }
.muted { color: #666; font-size: 12px; }
.totals { margin-top: 12px; text-align: right; font-weight: bold; }
@media print { .no-print { display: none; } }
</style>"#;

pub fn sales_report_html(
    store: &Tenant,
    start: NaiveDate,
    end: NaiveDate,
    rows: &[ExportSaleRow],
) -> String {
    let total: Money = rows.iter().map(|r| Money::from_cents(r.total_cents)).sum();

    let mut body = String::new();
    for row in rows {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"num\">{}</td><td>{}</td></tr>\n",
            row.created_at.format("%Y-%m-%d %H:%M"),
            html_escape(&row.user_name),
            html_escape(row.customer_name.as_deref().unwrap_or("-")),
            html_escape(row.payment_type.as_str()),
            Money::from_cents(row.total_cents),
            html_escape(&row.id[..8.min(row.id.len())]),
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>Sales report - {store}</title>
{style}
</head>
<body>
<h1>{store}</h1>
<div class="muted">Sales from {start} to {end} &middot; generated {generated}</div>
<table>
<thead><tr><th>Date</th><th>User</th><th>Customer</th><th>Payment</th><th class="num">Total</th><th>Sale</th></tr></thead>
<tbody>
{body}</tbody>
</table>
<div class="totals">{count} sales &middot; {total}</div>
<button class="no-print" onclick="window.print()">Print</button>
</body>
</html>
"#,
        store = html_escape(&store.name),
        style = PRINT_STYLE,
        start = start,
        end = end,
        generated = Utc::now().format("%Y-%m-%d %H:%M UTC"),
        body = body,
        count = rows.len(),
        total = total,
    )
}

pub fn ticket_html(store: &Tenant, sale: &SaleDetail) -> String {
    let mut lines = String::new();
    for item in &sale.items {
        lines.push_str(&format!(
            "<tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>\n",
            html_escape(&item.product_name),
            item.item.quantity,
            Money::from_cents(item.item.unit_price_cents),
            Money::from_cents(item.item.subtotal_cents),
        ));
    }

    let header_lines: String = [store.address.as_deref(), store.phone.as_deref()]
        .into_iter()
        .flatten()
        .map(|l| format!("<div class=\"muted\">{}</div>\n", html_escape(l)))
        .collect();

    let customer = sale
        .customer_name
        .as_deref()
        .map(|c| format!("<div>Customer: {}</div>\n", html_escape(c)))
        .unwrap_or_default();

    let split = if sale.sale.payment_type == invenstore_core::PaymentType::Mixed {
        format!(
            "<div>Cash: {} &middot; Credit: {}</div>\n",
            Money::from_cents(sale.sale.cash_amount_cents),
            Money::from_cents(sale.sale.credit_amount_cents),
        )
    } else {
        String::new()
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>Ticket {id}</title>
{style}
</head>
<body onload="window.print()">
<h1>{store}</h1>
{header_lines}<div class="muted">Ticket {id} &middot; {date}</div>
<div>Cashier: {cashier}</div>
{customer}<table>
<thead><tr><th>Product</th><th class="num">Qty</th><th class="num">Price</th><th class="num">Subtotal</th></tr></thead>
<tbody>
{lines}</tbody>
</table>
<div class="totals">Total: {total}</div>
<div>Payment: {payment}</div>
{split}</body>
</html>
"#,
        id = html_escape(&sale.sale.id),
        style = PRINT_STYLE,
        store = html_escape(&store.name),
        header_lines = header_lines,
        date = sale.sale.created_at.format("%Y-%m-%d %H:%M"),
        cashier = html_escape(sale.user_name.as_deref().unwrap_or("-")),
        customer = customer,
        lines = lines,
        total = Money::from_cents(sale.sale.total_cents),
        payment = sale.sale.payment_type,
        split = split,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use invenstore_core::{PaymentType, SubscriptionStatus};

    fn row(customer: Option<&str>) -> ExportSaleRow {
        ExportSaleRow {
            id: "0f8fad5b-d9cb-469f-a165-70867728950e".into(),
            created_at: chrono::DateTime::parse_from_rfc3339("2024-05-01T14:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
            user_name: "Ana".into(),
            customer_name: customer.map(str::to_string),
            subtotal_cents: 1_250,
            discount_cents: 0,
            total_cents: 1_250,
            payment_type: PaymentType::Cash,
        }
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain", ','), "plain");
        assert_eq!(csv_field("a,b", ','), "\"a,b\"");
        assert_eq!(csv_field("a,b", ';'), "a,b");
        assert_eq!(csv_field("say \"hi\"", ','), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines", ';'), "\"two\nlines\"");
    }

    #[test]
    fn test_sales_csv_comma() {
        let csv = sales_csv(&[row(Some("Pérez, Juan"))], CsvFlavor::Comma);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("id,date,time,user,customer,total,payment_type"));
        assert_eq!(
            lines.next(),
            Some("0f8fad5b-d9cb-469f-a165-70867728950e,2024-05-01,14:30:00,Ana,\"Pérez, Juan\",12.50,cash")
        );
    }

    #[test]
    fn test_sales_csv_spreadsheet() {
        let csv = sales_csv(&[row(None)], CsvFlavor::Spreadsheet);
        assert!(csv.starts_with(UTF8_BOM));
        let data = csv.lines().nth(1).unwrap();
        assert_eq!(data.split(';').count(), 9);
        assert!(data.contains(";12.50;0.00;12.50;cash"));
    }

    #[test]
    fn test_html_escaping() {
        assert_eq!(
            html_escape("<script>alert('x')</script> & \"y\""),
            "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; &quot;y&quot;"
        );

        let store = Tenant {
            id: "t".into(),
            name: "<b>Tienda</b>".into(),
            owner_name: None,
            phone: None,
            address: None,
            subscription_status: SubscriptionStatus::Active,
            created_at: Utc::now(),
        };
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let html = sales_report_html(&store, day, day, &[row(Some("<img src=x>"))]);
        assert!(html.contains("&lt;b&gt;Tienda&lt;/b&gt;"));
        assert!(!html.contains("<img src=x>"));
        assert!(html.contains("$12.50"));
    }
}
