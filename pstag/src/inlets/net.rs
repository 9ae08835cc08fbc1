use super::{
    single_arg,
    slug,
};
use crate::{
    filter::Filter,
    plugin::Inlet,
    report::Record,
};
use eyre::{
    Context as _,
    Result,
};
use futures::{
    future::BoxFuture,
    FutureExt as _,
};
use std::path::PathBuf;
use sysinfo::Networks;

const SNMP: &str = "/proc/net/snmp";

pub fn net(args: &[String]) -> Result<Box<dyn Inlet>> {
    let filter = Filter::parse(single_arg("in-net", args)?);
    Ok(Box::new(NetInlet { filter, networks: None }))
}

pub fn proto(args: &[String]) -> Result<Box<dyn Inlet>> {
    let filter = Filter::parse(&single_arg("in-proto", args)?.to_ascii_lowercase());
    Ok(Box::new(ProtoInlet {
        filter,
        path: PathBuf::from(SNMP),
    }))
}

/// Cumulative traffic counters per network interface.
pub struct NetInlet {
    filter: Filter,
    networks: Option<Networks>,
}

impl Inlet for NetInlet {
    fn open(&mut self) -> BoxFuture<'_, Result<()>> {
        self.networks = Some(Networks::new_with_refreshed_list());
        async { Ok(()) }.boxed()
    }

    fn sample(&mut self) -> BoxFuture<'_, Result<Vec<Record>>> {
        let networks = self.networks.get_or_insert_with(Networks::new_with_refreshed_list);
        networks.refresh();

        let mut ifaces: Vec<_> = networks
            .iter()
            .filter(|(name, _)| self.filter.matches(name))
            .collect();
        ifaces.sort_by(|a, b| a.0.cmp(b.0));

        let mut records = Vec::with_capacity(ifaces.len() * 6);
        for (name, data) in ifaces {
            let prefix = format!("net_{}", slug(name));
            records.extend([
                Record::new(format!("{prefix}_bytes_recv"), data.total_received() as f64, 0),
                Record::new(format!("{prefix}_bytes_sent"), data.total_transmitted() as f64, 0),
                Record::new(format!("{prefix}_packets_recv"), data.total_packets_received() as f64, 0),
                Record::new(format!("{prefix}_packets_sent"), data.total_packets_transmitted() as f64, 0),
                Record::new(format!("{prefix}_errin"), data.total_errors_on_received() as f64, 0),
                Record::new(format!("{prefix}_errout"), data.total_errors_on_transmitted() as f64, 0),
            ]);
        }
        async move { Ok(records) }.boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        self.networks = None;
        async { Ok(()) }.boxed()
    }
}

/// Per protocol counters from `/proc/net/snmp`.
pub struct ProtoInlet {
    filter: Filter,
    path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ProtoCounter {
    pub proto: String,
    pub counter: String,
    pub value: f64,
}

/// The table comes in line pairs: a header line naming the counters followed by a line with
/// their values, both prefixed with `<Proto>:`.
pub(crate) fn parse_snmp(text: &str) -> Vec<ProtoCounter> {
    let mut out = Vec::new();
    let mut lines = text.lines();
    while let (Some(header), Some(values)) = (lines.next(), lines.next()) {
        let (Some((proto, names)), Some((proto_v, values))) = (header.split_once(':'), values.split_once(':')) else {
            continue;
        };
        if proto != proto_v {
            warn!(proto, "mismatched snmp table rows");
            continue;
        }
        let proto = proto.trim().to_ascii_lowercase();
        for (counter, value) in names.split_whitespace().zip(values.split_whitespace()) {
            let Ok(value) = value.parse::<f64>() else {
                continue;
            };
            out.push(ProtoCounter {
                proto: proto.clone(),
                counter: counter.to_ascii_lowercase(),
                value,
            });
        }
    }
    out
}

impl Inlet for ProtoInlet {
    fn open(&mut self) -> BoxFuture<'_, Result<()>> {
        async move {
            eyre::ensure!(cfg!(target_os = "linux"), "in-proto is only supported on linux");
            tokio::fs::metadata(&self.path)
                .await
                .wrap_err_with(|| format!("cannot read {}", self.path.display()))?;
            Ok(())
        }
        .boxed()
    }

    fn sample(&mut self) -> BoxFuture<'_, Result<Vec<Record>>> {
        async move {
            let text = tokio::fs::read_to_string(&self.path)
                .await
                .wrap_err_with(|| format!("cannot read {}", self.path.display()))?;
            Ok(parse_snmp(&text)
                .into_iter()
                .filter(|c| self.filter.matches(&c.proto))
                .map(|c| Record::new(format!("proto_{}_{}", c.proto, c.counter), c.value, 0))
                .collect())
        }
        .boxed()
    }
}
