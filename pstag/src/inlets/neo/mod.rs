//! Sources scraping the machbase-neo HTTP API.

mod client;
mod counter;
mod statz;

pub use client::{
    NeoAddr,
    NeoClient,
    REQUEST_TIMEOUT,
};
pub use counter::{
    QueryResponse,
    TableRowsInlet,
};
pub use statz::{
    NeoStatz,
    StatzInlet,
};

use crate::plugin::Inlet;
use eyre::Result;

fn split_addr<'a>(name: &str, args: &'a [String]) -> Result<(&'a str, &'a [String])> {
    match args.split_first() {
        Some((addr, rest)) if !addr.trim().is_empty() => Ok((addr.trim(), rest)),
        _ => eyre::bail!("{name} requires the neo http address"),
    }
}

pub fn statz(args: &[String]) -> Result<Box<dyn Inlet>> {
    let (addr, rest) = split_addr("in-neo-statz", args)?;
    eyre::ensure!(rest.is_empty(), "in-neo-statz takes only the address, got {args:?}");
    Ok(Box::new(StatzInlet::new(NeoClient::new(addr)?)))
}

/// `args[0]` is the neo address, every following argument a table (comma separated lists are
/// split as well).
pub fn table_rows_counter(args: &[String]) -> Result<Box<dyn Inlet>> {
    let (addr, rest) = split_addr("in-neo-table-rows-counter", args)?;
    let tables = rest
        .iter()
        .flat_map(|arg| arg.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    Ok(Box::new(TableRowsInlet::new(NeoClient::new(addr)?, tables)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_required() {
        assert!(statz(&[]).is_err());
        assert!(statz(&[" ".into()]).is_err());
        assert!(statz(&["tcp://127.0.0.1:5654".into()]).is_ok());
        assert!(statz(&["tcp://127.0.0.1:5654".into(), "extra".into()]).is_err());
    }

    #[test]
    fn table_counter_validates_tables() {
        let addr = "unix:///tmp/neo.sock".to_string();
        assert!(table_rows_counter(&[addr.clone()]).is_ok());
        assert!(table_rows_counter(&[addr.clone(), "EXAMPLE, TAG_2".into()]).is_ok());
        assert!(table_rows_counter(&[addr, "bad table".into()]).is_err());
    }
}
