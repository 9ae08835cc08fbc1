use super::{
    no_args,
    slug,
};
use crate::{
    plugin::Inlet,
    report::Record,
};
use eyre::Result;
use futures::{
    future::BoxFuture,
    FutureExt as _,
};
use sysinfo::{
    Components,
    CpuRefreshKind,
    RefreshKind,
    System,
};

fn percent(part: u64, total: u64) -> f64 {
    if total > 0 {
        part as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

pub fn cpu(args: &[String]) -> Result<Box<dyn Inlet>> {
    no_args("in-cpu", args)?;
    Ok(Box::new(CpuInlet { system: System::new() }))
}

pub fn load(args: &[String]) -> Result<Box<dyn Inlet>> {
    no_args("in-load", args)?;
    Ok(Box::new(LoadInlet))
}

pub fn mem(args: &[String]) -> Result<Box<dyn Inlet>> {
    no_args("in-mem", args)?;
    Ok(Box::new(MemInlet { system: System::new() }))
}

pub fn sensor(args: &[String]) -> Result<Box<dyn Inlet>> {
    no_args("in-sensor", args)?;
    Ok(Box::new(SensorInlet { components: None }))
}

pub fn host(args: &[String]) -> Result<Box<dyn Inlet>> {
    no_args("in-host", args)?;
    Ok(Box::new(HostInlet { cpus: 0 }))
}

/// Global CPU usage. Usage is a delta between two refreshes, so `open` takes the first one.
pub struct CpuInlet {
    system: System,
}

impl Inlet for CpuInlet {
    fn open(&mut self) -> BoxFuture<'_, Result<()>> {
        self.system.refresh_cpu_usage();
        async { Ok(()) }.boxed()
    }

    fn sample(&mut self) -> BoxFuture<'_, Result<Vec<Record>>> {
        self.system.refresh_cpu_usage();
        let usage = self.system.global_cpu_usage() as f64;
        async move { Ok(vec![Record::new("cpu_percent", usage, 2)]) }.boxed()
    }
}

pub struct LoadInlet;

impl Inlet for LoadInlet {
    fn sample(&mut self) -> BoxFuture<'_, Result<Vec<Record>>> {
        let load = System::load_average();
        async move {
            Ok(vec![
                Record::new("load1", load.one, 2),
                Record::new("load5", load.five, 2),
                Record::new("load15", load.fifteen, 2),
            ])
        }
        .boxed()
    }
}

pub struct MemInlet {
    system: System,
}

impl Inlet for MemInlet {
    fn sample(&mut self) -> BoxFuture<'_, Result<Vec<Record>>> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        let used = self.system.used_memory();
        let swap_total = self.system.total_swap();
        let swap_used = self.system.used_swap();
        let records = vec![
            Record::new("mem_total", total as f64, 0),
            Record::new("mem_used", used as f64, 0),
            Record::new("mem_available", self.system.available_memory() as f64, 0),
            Record::new("mem_used_percent", percent(used, total), 2),
            Record::new("swap_total", swap_total as f64, 0),
            Record::new("swap_used", swap_used as f64, 0),
            Record::new("swap_used_percent", percent(swap_used, swap_total), 2),
        ];
        async move { Ok(records) }.boxed()
    }
}

/// Temperatures of every hardware component `sysinfo` can see, in degrees Celsius.
pub struct SensorInlet {
    components: Option<Components>,
}

impl Inlet for SensorInlet {
    fn open(&mut self) -> BoxFuture<'_, Result<()>> {
        self.components = Some(Components::new_with_refreshed_list());
        async { Ok(()) }.boxed()
    }

    fn sample(&mut self) -> BoxFuture<'_, Result<Vec<Record>>> {
        let components = self.components.get_or_insert_with(Components::new_with_refreshed_list);
        components.refresh();
        let records = components
            .iter()
            .filter(|c| c.temperature().is_finite())
            .map(|c| Record::new(format!("sensor_{}", slug(c.label())), c.temperature() as f64, 1))
            .collect();
        async move { Ok(records) }.boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        self.components = None;
        async { Ok(()) }.boxed()
    }
}

pub struct HostInlet {
    cpus: usize,
}

impl Inlet for HostInlet {
    fn open(&mut self) -> BoxFuture<'_, Result<()>> {
        let system = System::new_with_specifics(RefreshKind::new().with_cpu(CpuRefreshKind::new()));
        self.cpus = system.cpus().len();
        async { Ok(()) }.boxed()
    }

    fn sample(&mut self) -> BoxFuture<'_, Result<Vec<Record>>> {
        let records = vec![
            Record::new("host_uptime", System::uptime() as f64, 0),
            Record::new("host_boot_time", System::boot_time() as f64, 0),
            Record::new("host_cpus", self.cpus as f64, 0),
        ];
        async move { Ok(records) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_handles_zero_total() {
        assert_eq!(percent(5, 0), 0.0);
        assert_eq!(percent(1, 4), 25.0);
    }

    #[tokio::test]
    async fn memory_records_are_complete() {
        let mut inlet = mem(&[]).unwrap();
        inlet.open().await.unwrap();
        let names: Vec<_> = inlet.sample().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "mem_total",
                "mem_used",
                "mem_available",
                "mem_used_percent",
                "swap_total",
                "swap_used",
                "swap_used_percent"
            ]
        );
    }

    #[tokio::test]
    async fn host_reports_at_least_one_cpu() {
        let mut inlet = host(&[]).unwrap();
        inlet.open().await.unwrap();
        let records = inlet.sample().await.unwrap();
        let cpus = records.iter().find(|r| r.name == "host_cpus").unwrap();
        assert!(cpus.value >= 1.0);
    }

    #[test]
    fn flags_reject_arguments() {
        assert!(cpu(&["--all".into()]).is_err());
        assert!(load(&[]).is_ok());
    }
}
