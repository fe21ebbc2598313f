use crate::category::Category;
use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

const SENTINEL: &str = "NA";

/// A flattened spreadsheet row: `satellite_name` first, then one
/// `<category>_<field>` column per stored field.
#[derive(Debug, Serialize)]
pub struct Row {
    pub headers: Vec<String>,
    pub values: Vec<String>,
}

/// Flattens one satellite's per-category field maps into a single row.
/// Null-like values become the literal "NA"; nested objects are rendered as
/// compact JSON.
pub fn flatten_row(
    satellite_name: &str,
    combined: &BTreeMap<Category, serde_json::Map<String, Value>>,
) -> Row {
    let mut headers = vec!["satellite_name".to_string()];
    let mut values = vec![satellite_name.to_string()];

    for category in Category::ALL {
        let Some(data) = combined.get(&category) else {
            continue;
        };
        for (field, value) in data {
            headers.push(format!("{}_{}", category, field));
            values.push(render_cell(value));
        }
    }

    Row { headers, values }
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => SENTINEL.to_string(),
        Value::String(s) if s.is_empty() || s == "null" || s == "None" => SENTINEL.to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        // composite fields such as mass/cost breakdowns
        nested => serde_json::to_string(nested).unwrap_or_else(|_| SENTINEL.to_string()),
    }
}

/// Append-only push to a Google Sheets worksheet. Repeated uploads for the
/// same satellite create duplicate rows.
pub struct SheetsClient {
    endpoint: String,
    spreadsheet_id: String,
    range: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct AppendRequest<'a> {
    values: Vec<&'a [String]>,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: String, range: String, token: String) -> Self {
        Self {
            endpoint: "https://sheets.googleapis.com".to_string(),
            spreadsheet_id,
            range,
            token,
            client: reqwest::Client::new(),
        }
    }

    /// Appends the row's values (optionally preceded by its header row). On
    /// failure the offending row payload is carried in the error so the user
    /// can inspect what was rejected.
    pub async fn append(&self, row: &Row, with_headers: bool) -> Result<()> {
        let mut values: Vec<&[String]> = Vec::new();
        if with_headers {
            values.push(&row.headers);
        }
        values.push(&row.values);

        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}:append?valueInputOption=RAW",
            self.endpoint, self.spreadsheet_id, self.range
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .timeout(Duration::from_secs(30))
            .json(&AppendRequest { values })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::SheetPush {
                status: response.status().to_string(),
                row: serde_json::to_string(row)?,
            });
        }

        tracing::info!(
            spreadsheet = self.spreadsheet_id,
            range = self.range,
            columns = row.values.len(),
            "row appended"
        );

        Ok(())
    }
}
