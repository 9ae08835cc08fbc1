use super::client::NeoClient;
use crate::{
    plugin::Inlet,
    report::Record,
};
use eyre::Result;
use futures::{
    future::BoxFuture,
    FutureExt as _,
};
use serde::Deserialize;
use url::form_urlencoded;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QueryData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Body of `GET /db/query`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QueryResponse {
    pub success: bool,
    pub reason: String,
    pub data: QueryData,
}

/// Table names end up inside SQL, so only plain identifiers (optionally schema qualified) pass.
pub(super) fn validate_table(table: &str) -> Result<()> {
    eyre::ensure!(
        !table.is_empty() && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.'),
        "invalid table name {table:?}"
    );
    Ok(())
}

fn count_query(table: &str) -> String {
    let sql = format!("SELECT count(*) FROM {table}");
    let q: String = form_urlencoded::byte_serialize(sql.as_bytes()).collect();
    format!("/db/query?q={q}")
}

/// Row count of every configured table, one `SELECT count(*)` per table and sample.
pub struct TableRowsInlet {
    client: NeoClient,
    tables: Vec<String>,
}

impl TableRowsInlet {
    pub fn new(client: NeoClient, tables: Vec<String>) -> Result<Self> {
        for table in &tables {
            validate_table(table)?;
        }
        Ok(Self { client, tables })
    }
}

impl Inlet for TableRowsInlet {
    fn sample(&mut self) -> BoxFuture<'_, Result<Vec<Record>>> {
        async move {
            let mut records = Vec::with_capacity(self.tables.len());
            for table in &self.tables {
                let rsp: QueryResponse = self.client.get_json(&count_query(table)).await?;
                eyre::ensure!(rsp.success, "count of {table} failed: {}", rsp.reason);
                let Some(cell) = rsp.data.rows.first().and_then(|row| row.first()) else {
                    continue;
                };
                let count = cell
                    .as_f64()
                    .ok_or_else(|| eyre::eyre!("count of {table} is not a number: {cell}"))?;
                records.push(Record::new(format!("table_rows_{table}"), count, 0));
            }
            Ok(records)
        }
        .boxed()
    }
}
