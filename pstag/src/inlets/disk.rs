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
use sysinfo::Disks;

const DISKSTATS: &str = "/proc/diskstats";
const SECTOR_SIZE: u64 = 512;

pub fn disk(args: &[String]) -> Result<Box<dyn Inlet>> {
    let filter = Filter::parse(single_arg("in-disk", args)?);
    Ok(Box::new(DiskInlet { filter, disks: None }))
}

pub fn diskio(args: &[String]) -> Result<Box<dyn Inlet>> {
    let filter = Filter::parse(single_arg("in-diskio", args)?);
    Ok(Box::new(DiskIoInlet {
        filter,
        path: PathBuf::from(DISKSTATS),
    }))
}

/// Space usage per mount point.
pub struct DiskInlet {
    filter: Filter,
    disks: Option<Disks>,
}

impl DiskInlet {
    fn selected(&self, mount: &str) -> bool {
        self.filter.matches(mount) || self.filter.matches(&format!("{}/", mount.trim_end_matches('/')))
    }
}

impl Inlet for DiskInlet {
    fn open(&mut self) -> BoxFuture<'_, Result<()>> {
        self.disks = Some(Disks::new_with_refreshed_list());
        async { Ok(()) }.boxed()
    }

    fn sample(&mut self) -> BoxFuture<'_, Result<Vec<Record>>> {
        let mut disks = self.disks.take().unwrap_or_else(Disks::new_with_refreshed_list);
        // mounts come and go, so the list is rebuilt on every sample
        disks.refresh_list();

        let mut records = Vec::new();
        let mut seen = Vec::new();
        for disk in disks.iter() {
            let mount = disk.mount_point().to_string_lossy().to_string();
            if seen.contains(&mount) || !self.selected(&mount) {
                continue;
            }
            let total = disk.total_space();
            let used = total.saturating_sub(disk.available_space());
            let used_percent = if total > 0 {
                used as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            let prefix = format!("disk_{}", slug(&mount));
            records.push(Record::new(format!("{prefix}_total"), total as f64, 0));
            records.push(Record::new(format!("{prefix}_used"), used as f64, 0));
            records.push(Record::new(format!("{prefix}_used_percent"), used_percent, 2));
            seen.push(mount);
        }
        self.disks = Some(disks);
        async move { Ok(records) }.boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        self.disks = None;
        async { Ok(()) }.boxed()
    }
}

/// Cumulative I/O counters per block device, read from `/proc/diskstats`.
pub struct DiskIoInlet {
    filter: Filter,
    path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DiskStat {
    pub name: String,
    pub reads: u64,
    pub sectors_read: u64,
    pub writes: u64,
    pub sectors_written: u64,
}

pub(crate) fn parse_diskstats(text: &str) -> Vec<DiskStat> {
    text.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 {
                return None;
            }
            let num = |idx: usize| fields[idx].parse::<u64>().ok();
            Some(DiskStat {
                name: fields[2].to_string(),
                reads: num(3)?,
                sectors_read: num(5)?,
                writes: num(7)?,
                sectors_written: num(9)?,
            })
        })
        .collect()
}

impl Inlet for DiskIoInlet {
    fn open(&mut self) -> BoxFuture<'_, Result<()>> {
        async move {
            eyre::ensure!(cfg!(target_os = "linux"), "in-diskio is only supported on linux");
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
            let mut records = Vec::new();
            for stat in parse_diskstats(&text) {
                if !self.filter.matches(&stat.name) {
                    continue;
                }
                let prefix = format!("diskio_{}", slug(&stat.name));
                records.push(Record::new(
                    format!("{prefix}_read_bytes"),
                    (stat.sectors_read * SECTOR_SIZE) as f64,
                    0,
                ));
                records.push(Record::new(
                    format!("{prefix}_write_bytes"),
                    (stat.sectors_written * SECTOR_SIZE) as f64,
                    0,
                ));
                records.push(Record::new(format!("{prefix}_read_count"), stat.reads as f64, 0));
                records.push(Record::new(format!("{prefix}_write_count"), stat.writes as f64, 0));
            }
            Ok(records)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "\
   8       0 sda 10490 2366 1080124 4012 8833 9121 455672 12620 0 10612 16633 0 0 0 0
   8       1 sda1 10332 2366 1070810 3965 8817 9121 455672 12604 0 10556 16570 0 0 0 0
 259       0 nvme0n1 200 0 4000 10 50 0 800 5 0 20 15
   7       0 loop0 broken line
";

    #[test]
    fn parses_diskstats() {
        let stats = parse_diskstats(SAMPLE);
        assert_eq!(stats.len(), 3);
        assert_eq!(
            stats[0],
            DiskStat {
                name: "sda".into(),
                reads: 10490,
                sectors_read: 1080124,
                writes: 8833,
                sectors_written: 455672,
            }
        );
        assert_eq!(stats[2].name, "nvme0n1");
    }

    #[tokio::test]
    async fn diskio_filters_devices() {
        let dir = temp_dir::TempDir::new().unwrap();
        let path = dir.child("diskstats");
        std::fs::write(&path, SAMPLE).unwrap();

        let mut inlet = DiskIoInlet {
            filter: Filter::parse("sda,nvme*"),
            path,
        };
        let names: Vec<_> = inlet.sample().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "diskio_sda_read_bytes",
                "diskio_sda_write_bytes",
                "diskio_sda_read_count",
                "diskio_sda_write_count",
                "diskio_nvme0n1_read_bytes",
                "diskio_nvme0n1_write_bytes",
                "diskio_nvme0n1_read_count",
                "diskio_nvme0n1_write_count",
            ]
        );
    }

    #[test]
    fn disk_mount_filter_tolerates_trailing_slash() {
        let inlet = DiskInlet {
            filter: Filter::parse("/,/mnt/disk/"),
            disks: None,
        };
        assert!(inlet.selected("/"));
        assert!(inlet.selected("/mnt/disk"));
        assert!(!inlet.selected("/boot"));
    }
}
