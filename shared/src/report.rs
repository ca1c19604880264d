//! HTML documents for stage handovers and the full order report
//!
//! Pure projections of an [`OrderSnapshot`]; nothing here touches storage.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::checklists::{material_reconciliation, section_label};
use crate::models::{
    ChecklistItem, Formula, Order, OrderLabels, StageData, StageInstance, StageKey,
};

/// Everything needed to render documents for one order
#[derive(Debug, Clone, Serialize)]
pub struct OrderSnapshot {
    pub order: Order,
    pub labels: OrderLabels,
    pub formula: Formula,
    pub stages: Vec<StageInstance>,
    pub data: StageData,
}

impl OrderSnapshot {
    pub fn stage(&self, key: StageKey) -> Option<&StageInstance> {
        self.stages.iter().find(|s| s.stage_key == key)
    }
}

const STAGE_STYLE: &str = "\
body{font-family:Arial,Helvetica,sans-serif;font-size:12px;color:#222;margin:24px}\
h1{font-size:20px;margin:0 0 12px}h2{font-size:15px;margin:18px 0 6px;border-bottom:1px solid #999}\
h3{font-size:13px;margin:12px 0 4px}\
table{border-collapse:collapse;width:100%;margin-bottom:8px}\
th,td{border:1px solid #999;padding:4px 6px;text-align:left;vertical-align:top}\
th{background:#eee}.num{text-align:right}\
.instructions{background:#f6f6f6;border:1px solid #ccc;padding:8px;margin:8px 0}\
.warn{color:#a00;font-weight:bold}.footer{margin-top:24px;font-size:10px;color:#666}";

const REPORT_STYLE: &str = "\
body{font-family:Arial,Helvetica,sans-serif;font-size:11px;margin:16px}\
h1{font-size:18px}h2{font-size:14px;margin-top:16px}h3{font-size:12px}\
table{border-collapse:collapse;width:100%}\
th,td{border:1px solid #bbb;padding:3px 5px;text-align:left}";

/// Escape text for inclusion in HTML
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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

fn opt(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => escape_html(v),
        _ => "-".to_string(),
    }
}

fn qty(value: Decimal) -> String {
    value.normalize().to_string()
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Render the handover document for one stage
pub fn render_stage_document(
    snapshot: &OrderSnapshot,
    stage: StageKey,
    generated_at: DateTime<Utc>,
) -> String {
    let order = &snapshot.order;
    let mut html = String::new();

    let _ = write!(
        html,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{} - {}</title><style>{}\
         </style></head><body>",
        escape_html(&order.order_number),
        stage.label(),
        STAGE_STYLE
    );
    let _ = write!(
        html,
        "<h1>{} &mdash; Stage {} of {}: {}</h1>",
        escape_html(&order.order_number),
        stage.index() + 1,
        StageKey::ALL.len(),
        stage.label()
    );

    html.push_str(&order_header_block(snapshot));

    let _ = write!(
        html,
        "<div class=\"instructions\"><p><strong>Instructions:</strong> {}</p><p>\
         <strong>Handover:</strong> {}</p></div>",
        stage.instruction(),
        stage.handover_note()
    );

    html.push_str(&stage_status_block(snapshot.stage(stage)));

    html.push_str("<h2>Formula Components</h2>");
    html.push_str(&formula_table(&snapshot.formula));

    let _ = write!(html, "<h2>{} Details</h2>", stage.label());
    html.push_str(&stage_detail_block(snapshot, stage));

    let _ = write!(
        html,
        "<p class=\"footer\">Generated {} UTC</p></body></html>",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    html
}

/// Render the complete order report covering every stage
pub fn render_full_report(snapshot: &OrderSnapshot, generated_at: DateTime<Utc>) -> String {
    let order = &snapshot.order;
    let mut html = String::new();

    let _ = write!(
        html,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{} - Order Report</title>\
         <style>{}</style></head><body>",
        escape_html(&order.order_number),
        REPORT_STYLE
    );
    let _ = write!(
        html,
        "<h1>Manufacturing Order Report: {}</h1>",
        escape_html(&order.order_number)
    );
    html.push_str(&order_header_block(snapshot));

    html.push_str("<h2>Formula Components</h2>");
    html.push_str(&formula_table(&snapshot.formula));

    for stage in StageKey::ALL {
        let _ = write!(
            html,
            "<h2>{}. {}</h2>",
            stage.index() + 1,
            stage.label()
        );
        html.push_str(&stage_status_block(snapshot.stage(stage)));
        html.push_str(&stage_detail_block(snapshot, stage));
    }

    let _ = write!(
        html,
        "<p>Generated {} UTC</p></body></html>",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    html
}

fn order_header_block(snapshot: &OrderSnapshot) -> String {
    let order = &snapshot.order;
    let labels = &snapshot.labels;
    let due = order
        .due_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string());

    let rows = [
        ("Order Number", escape_html(&order.order_number)),
        ("Customer", opt(labels.customer_name.as_deref())),
        ("Product", opt(labels.product_name.as_deref())),
        ("Formula", escape_html(&snapshot.formula.name)),
        ("Location", opt(labels.location_name.as_deref())),
        ("Container Size", opt(labels.container_size.as_deref())),
        ("Batch Size", qty(order.batch_size)),
        ("Priority", order.priority.to_string()),
        ("Due Date", due),
        ("Order Status", order.fulfillment_status.to_string()),
        ("Order Notes", opt(order.notes.as_deref())),
    ];

    let mut html = String::from("<table class=\"header\">");
    for (label, value) in rows {
        let _ = write!(html, "<tr><th>{}</th><td>{}</td></tr>", label, value);
    }
    html.push_str("</table>");
    html
}

fn stage_status_block(stage: Option<&StageInstance>) -> String {
    match stage {
        Some(s) => format!(
            "<table class=\"status\"><tr><th>Status</th><th>Started</th><th>Completed</th>\
             <th>Notes</th></tr>\
             <tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr></table>",
            s.status,
            timestamp(s.started_at),
            timestamp(s.completed_at),
            opt(s.notes.as_deref())
        ),
        None => "<p class=\"warn\">Stage record missing</p>".to_string(),
    }
}

fn formula_table(formula: &Formula) -> String {
    if formula.components.is_empty() {
        return "<p>No components defined.</p>".to_string();
    }

    let mut html = String::from(
        "<table><tr><th>#</th><th>Component</th><th class=\"num\">Quantity</th><th>Unit</th>\
         <th>Notes</th></tr>",
    );
    for (i, c) in formula.components.iter().enumerate() {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td class=\"num\">{}</td><td>{}</td><td>{}</td></tr>",
            i + 1,
            escape_html(&c.name),
            qty(c.quantity),
            escape_html(&c.unit),
            opt(c.notes.as_deref())
        );
    }
    html.push_str("</table>");
    html
}

/// Stage-specific detail block
pub fn stage_detail_block(snapshot: &OrderSnapshot, stage: StageKey) -> String {
    let data = &snapshot.data;
    match stage {
        StageKey::Sourcing => sourcing_block(data),
        StageKey::Receipt => receipt_block(data),
        StageKey::Preparation => preparation_block(data),
        StageKey::Quality => quality_block(data),
        StageKey::Packaging | StageKey::Dispatch => checklist_block(stage, data.checklist(stage)),
        StageKey::Delivering => delivery_block(data),
    }
}

fn sourcing_block(data: &StageData) -> String {
    if data.components.is_empty() {
        return "<p>No sourcing components.</p>".to_string();
    }
    let mut html = String::from(
        "<table><tr><th>Component</th><th>Type</th><th class=\"num\">Required</th><th>Unit</th>\
         <th>Notes</th></tr>",
    );
    for c in &data.components {
        let kind = if c.product_id.is_some() { "Stock" } else { "Manual" };
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td class=\"num\">{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&c.name),
            kind,
            qty(c.required_quantity),
            escape_html(&c.unit),
            opt(c.notes.as_deref())
        );
    }
    html.push_str("</table>");
    html
}

fn receipt_block(data: &StageData) -> String {
    if data.components.is_empty() {
        return "<p>No components to receive.</p>".to_string();
    }
    let mut html = String::from(
        "<table><tr><th>Component</th><th class=\"num\">Required</th><th>Unit</th><th>Receipt</th>\
         <th>Receipt Notes</th></tr>",
    );
    for c in &data.components {
        let _ = write!(
            html,
            "<tr><td>{}</td><td class=\"num\">{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&c.name),
            qty(c.required_quantity),
            escape_html(&c.unit),
            c.receipt_status,
            opt(c.receipt_notes.as_deref())
        );
    }
    html.push_str("</table>");
    html
}

fn preparation_block(data: &StageData) -> String {
    if data.measurements.is_empty() {
        return "<p>No measurements recorded.</p>".to_string();
    }
    let mut html = String::from("<table><tr><th>Measurement</th><th>Value</th></tr>");
    for m in &data.measurements {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td></tr>",
            escape_html(&m.field_name),
            opt(Some(m.field_value.as_str()))
        );
    }
    html.push_str("</table>");
    html
}

fn quality_block(data: &StageData) -> String {
    if data.quality_items.is_empty() {
        return "<p>No quality checklist.</p>".to_string();
    }
    let mut html = String::new();
    let mut current_section: Option<&str> = None;
    for item in &data.quality_items {
        if current_section != Some(item.section.as_str()) {
            if current_section.is_some() {
                html.push_str("</table>");
            }
            let _ = write!(
                html,
                "<h3>{}</h3><table><tr><th>Check</th><th>Result</th><th>Notes</th></tr>",
                escape_html(&item.section)
            );
            current_section = Some(item.section.as_str());
        }
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&item.item_text),
            item.status,
            opt(item.notes.as_deref())
        );
    }
    html.push_str("</table>");
    html
}

fn checklist_block(stage: StageKey, items: &[ChecklistItem]) -> String {
    if items.is_empty() {
        return "<p>No checklist recorded.</p>".to_string();
    }
    let mut html = String::new();
    let mut current_section: Option<&str> = None;
    for item in items {
        if current_section != Some(item.section.as_str()) {
            if current_section.is_some() {
                html.push_str("</table>");
            }
            let _ = write!(
                html,
                "<h3>{}</h3><table><tr><th>Item</th><th>Value</th><th>Notes</th></tr>",
                escape_html(section_label(&item.section))
            );
            current_section = Some(item.section.as_str());
        }
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&item.item_text),
            opt(Some(item.display_value().as_str())),
            opt(item.notes.as_deref())
        );
    }
    html.push_str("</table>");

    let lines = material_reconciliation(stage, items);
    if !lines.is_empty() {
        html.push_str(
            "<h3>Material Reconciliation</h3><table><tr><th>Material</th>\
             <th class=\"num\">Issued</th>\
             <th class=\"num\">Used</th><th class=\"num\">Rejected</th>\
             <th class=\"num\">Returned</th>\
             <th class=\"num\">Variance</th></tr>",
        );
        for line in lines {
            let variance = if line.is_balanced() {
                qty(line.variance)
            } else {
                format!("<span class=\"warn\">{}</span>", qty(line.variance))
            };
            let _ = write!(
                html,
                "<tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td>\
                 <td class=\"num\">{}</td>\
                 <td class=\"num\">{}</td><td class=\"num\">{}</td></tr>",
                line.material,
                qty(line.issued),
                qty(line.used),
                qty(line.rejected),
                qty(line.returned),
                variance
            );
        }
        html.push_str("</table>");
    }
    html
}

fn delivery_block(data: &StageData) -> String {
    let Some(delivery) = &data.delivery else {
        return "<p>No delivery information recorded.</p>".to_string();
    };
    format!(
        "<table><tr><th>Recipient</th><td>{}</td></tr><tr><th>Phone</th><td>{}</td></tr>\
         <tr><th>Delivered At</th><td>{}</td></tr><tr><th>Customer Notes</th><td>{}</td></tr>\
         <tr><th>Proof Photo</th><td>{}</td></tr></table>",
        opt(delivery.recipient_name.as_deref()),
        opt(delivery.recipient_phone.as_deref()),
        timestamp(delivery.delivered_at),
        opt(delivery.customer_notes.as_deref()),
        opt(delivery.photo_path.as_deref())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<b>\"A&B\"</b> it's"),
            "&lt;b&gt;&quot;A&amp;B&quot;&lt;/b&gt; it&#39;s"
        );
    }

    #[test]
    fn test_opt_blank_is_dash() {
        assert_eq!(opt(None), "-");
        assert_eq!(opt(Some("   ")), "-");
        assert_eq!(opt(Some("<x>")), "&lt;x&gt;");
    }

    #[test]
    fn test_quantity_formatting() {
        assert_eq!(qty(Decimal::new(5000, 3)), "5");
        assert_eq!(qty(Decimal::new(25, 1)), "2.5");
    }
}
