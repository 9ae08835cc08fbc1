use super::required_arg;
use crate::{
    plugin::Outlet,
    report::Report,
};
use eyre::{
    Context as _,
    OptionExt as _,
    Result,
};
use futures::{
    future::BoxFuture,
    FutureExt as _,
};
use std::path::PathBuf;
use tokio::{
    fs::OpenOptions,
    io::{
        AsyncWrite,
        AsyncWriteExt as _,
    },
};

const STDOUT: &str = "-";

pub fn factory(args: &[String]) -> Result<Box<dyn Outlet>> {
    let target = required_arg("out-file", args)?;
    Ok(Box::new(FileOutlet::new(target)))
}

/// Appends one line per report to a file, or to stdout for `-`.
pub struct FileOutlet {
    path: Option<PathBuf>,
    writer: Option<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl FileOutlet {
    pub fn new(target: &str) -> Self {
        Self {
            path: (target != STDOUT).then(|| PathBuf::from(target)),
            writer: None,
        }
    }
}

impl Outlet for FileOutlet {
    fn open(&mut self) -> BoxFuture<'_, Result<()>> {
        async move {
            let writer: Box<dyn AsyncWrite + Send + Unpin> = match &self.path {
                None => Box::new(tokio::io::stdout()),
                Some(path) => Box::new(
                    OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(path)
                        .await
                        .wrap_err_with(|| format!("failed to open {}", path.display()))?,
                ),
            };
            self.writer = Some(writer);
            Ok(())
        }
        .boxed()
    }

    fn write<'a>(&'a mut self, report: &'a Report) -> BoxFuture<'a, Result<()>> {
        async move {
            let writer = self.writer.as_mut().ok_or_eyre("output is not open")?;
            let line = format!("{report}\n");
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await?;
            Ok(())
        }
        .boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        async move {
            if let Some(mut writer) = self.writer.take() {
                writer.flush().await?;
                writer.shutdown().await?;
            }
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Record;
    use chrono::{
        DateTime,
        Utc,
    };
    use pretty_assertions::assert_eq;

    fn report(value: f64) -> Report {
        let ts = DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Report::new(ts, vec![Record::new("cpu_percent", value, 1)])
    }

    #[tokio::test]
    async fn appends_lines() {
        let dir = temp_dir::TempDir::new().unwrap();
        let path = dir.child("out.log");
        std::fs::write(&path, "existing\n").unwrap();

        let mut outlet = factory(&[path.display().to_string()]).unwrap();
        outlet.open().await.unwrap();
        outlet.write(&report(1.24)).await.unwrap();
        outlet.write(&report(2.0)).await.unwrap();
        outlet.close().await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "existing\n\
             2025-03-01T12:00:00.000Z cpu_percent=1.2\n\
             2025-03-01T12:00:00.000Z cpu_percent=2.0\n"
        );
    }

    #[tokio::test]
    async fn write_before_open_fails() {
        let mut outlet = FileOutlet::new("-");
        assert!(outlet.write(&report(1.0)).await.is_err());
        outlet.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_fails_for_missing_directory() {
        let dir = temp_dir::TempDir::new().unwrap();
        let path = dir.child("missing").join("out.log");
        let mut outlet = FileOutlet::new(&path.display().to_string());
        assert!(outlet.open().await.is_err());
    }
}
