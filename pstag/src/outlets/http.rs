use super::required_arg;
use crate::{
    plugin::Outlet,
    report::{
        Report,
        TimeFormat,
    },
};
use eyre::{
    Context as _,
    Result,
};
use futures::{
    future::BoxFuture,
    FutureExt as _,
};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use url::Url;

const TIMEOUT: Duration = Duration::from_secs(5);

pub fn factory(args: &[String]) -> Result<Box<dyn Outlet>> {
    let addr = required_arg("out-http", args)?;
    Ok(Box::new(HttpOutlet::new(addr)?))
}

/// POSTs every report as CSV, e.g. to `http://localhost:5654/db/write/EXAMPLE?timeformat=s`.
///
/// The epoch resolution of the rows follows the URL's `timeformat` query, nanoseconds when absent.
#[derive(Debug)]
pub struct HttpOutlet {
    url: Url,
    time_format: TimeFormat,
    client: reqwest::Client,
}

impl HttpOutlet {
    pub fn new(addr: &str) -> Result<Self> {
        let url = Url::parse(addr).wrap_err_with(|| format!("invalid output address {addr:?}"))?;
        eyre::ensure!(
            matches!(url.scheme(), "http" | "https"),
            "unsupported scheme in output address {addr:?}"
        );
        let time_format = match url.query_pairs().find(|(key, _)| key == "timeformat") {
            Some((_, value)) => value
                .parse::<TimeFormat>()
                .map_err(|_| eyre::eyre!("unsupported timeformat {value:?} in {addr:?}"))?,
            None => TimeFormat::default(),
        };
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .no_proxy()
            .build()
            .wrap_err("failed to build http client")?;
        Ok(Self {
            url,
            time_format,
            client,
        })
    }

    pub fn time_format(&self) -> TimeFormat {
        self.time_format
    }
}

impl Outlet for HttpOutlet {
    fn write<'a>(&'a mut self, report: &'a Report) -> BoxFuture<'a, Result<()>> {
        async move {
            if report.is_empty() {
                return Ok(());
            }
            let rsp = self
                .client
                .post(self.url.clone())
                .header(CONTENT_TYPE, "text/csv")
                .body(report.to_csv(self.time_format))
                .send()
                .await?;
            let status = rsp.status();
            if !status.is_success() {
                let body = rsp.text().await.unwrap_or_default();
                eyre::bail!("{} returned {status}: {}", self.url, body.trim());
            }
            Ok(())
        }
        .boxed()
    }
}
