pub mod table;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::report::{ReportRow, ResultSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
    Xml,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            "xml" => Some(Self::Xml),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".csv") {
        return Some(OutputFormat::Csv);
    }
    if lower.ends_with(".xml") {
        return Some(OutputFormat::Xml);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

// serializes as a JSON object in header order
struct RowRecord<'a>(&'a ReportRow);

impl Serialize for RowRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, value) in self.0.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

pub fn render(format: OutputFormat, rows: &ResultSet) -> Vec<u8> {
    match format {
        OutputFormat::Text => render_text(rows),
        OutputFormat::Json => render_json(rows),
        OutputFormat::Csv => render_csv(rows),
        OutputFormat::Xml => render_xml(rows),
    }
}

/// Aligned table with display labels, no colour.
pub fn render_text(rows: &ResultSet) -> Vec<u8> {
    let mut out = table::render_table(rows.header(), rows.rows(), false);
    out.push('\n');
    out.into_bytes()
}

pub fn render_json(rows: &ResultSet) -> Vec<u8> {
    let records: Vec<RowRecord<'_>> = rows.rows().iter().map(RowRecord).collect();
    serde_json::to_vec_pretty(&records).unwrap_or_else(|_| b"[]\n".to_vec())
}

/// Raw values, quoted where needed so the file survives embedded delimiters.
pub fn render_csv(rows: &ResultSet) -> Vec<u8> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    let mut write_all = || -> Result<(), csv::Error> {
        writer.write_record(rows.header())?;
        for row in rows.rows() {
            writer.write_record(row.values())?;
        }
        writer.flush()?;
        Ok(())
    };
    if let Err(e) = write_all() {
        tracing::warn!(target: "reportwatch.output", error = %e, "csv export incomplete");
    }
    writer.into_inner().unwrap_or_default()
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

pub fn render_xml(rows: &ResultSet) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    out.push('\n');
    out.push_str("<report>\n");
    for row in rows.rows() {
        out.push_str("  <row>\n");
        for (column, value) in row.iter() {
            out.push_str(&format!(
                "    <field name=\"{}\">{}</field>\n",
                escape_xml(column),
                escape_xml(value)
            ));
        }
        out.push_str("  </row>\n");
    }
    out.push_str("</report>\n");
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RowPolicy;

    fn sample() -> ResultSet {
        ResultSet::parse(
            "store_id,uptime_last_hour,uptime_last_day\ns<1>,42.4,3.5\n",
            b',',
            RowPolicy::Strict,
        )
        .unwrap()
    }

    #[test]
    fn format_parse_and_inference() {
        assert_eq!(OutputFormat::parse(" JSON "), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("html"), None);
        assert_eq!(infer_format_from_path("out/report.CSV"), Some(OutputFormat::Csv));
        assert_eq!(infer_format_from_path("report"), None);
    }

    #[test]
    fn json_keeps_header_order() {
        let json = String::from_utf8(render_json(&sample())).unwrap();
        let store = json.find("store_id").unwrap();
        let hour = json.find("uptime_last_hour").unwrap();
        let day = json.find("uptime_last_day").unwrap();
        assert!(store < hour && hour < day);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["uptime_last_hour"], "42.4");
    }

    #[test]
    fn csv_export_round_trips_raw_values() {
        let csv = String::from_utf8(render_csv(&sample())).unwrap();
        assert_eq!(
            csv,
            "store_id,uptime_last_hour,uptime_last_day\ns<1>,42.4,3.5\n"
        );
    }

    #[test]
    fn xml_escapes_values() {
        let xml = String::from_utf8(render_xml(&sample())).unwrap();
        assert!(xml.contains("<field name=\"store_id\">s&lt;1&gt;</field>"));
    }

    #[test]
    fn text_uses_display_labels() {
        let text = String::from_utf8(render_text(&sample())).unwrap();
        assert!(text.contains("uptime last hour"));
        assert!(text.contains("42 min"));
        assert!(text.contains("3h 30m"));
    }
}
