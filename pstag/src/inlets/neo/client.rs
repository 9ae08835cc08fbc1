use bytes::Bytes;
use eyre::{
    Context as _,
    Result,
};
use http_body_util::{
    BodyExt as _,
    Empty,
};
use hyper::{
    header,
    Method,
    Request,
};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use std::{
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};
use tokio::net::UnixStream;
use url::Url;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Host header sent over the unix socket, the server does not look at it.
const UNIX_HOST: &str = "local.local";

/// Where the neo HTTP API listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NeoAddr {
    Http(Url),
    Unix(PathBuf),
}

impl NeoAddr {
    /// Accepts `unix:///path/to.sock`, `tcp://host:port` and `http(s)://host:port`.
    pub fn parse(addr: &str) -> Result<Self> {
        let addr = addr.trim();
        if let Some(path) = addr.strip_prefix("unix://") {
            eyre::ensure!(!path.is_empty(), "empty unix socket path in {addr:?}");
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        let rewritten = match addr.strip_prefix("tcp://") {
            Some(rest) => format!("http://{rest}"),
            None => addr.to_string(),
        };
        let url = Url::parse(&rewritten).wrap_err_with(|| format!("invalid neo address {addr:?}"))?;
        eyre::ensure!(
            matches!(url.scheme(), "http" | "https"),
            "unsupported scheme in neo address {addr:?}"
        );
        Ok(Self::Http(url))
    }
}

/// Minimal JSON-over-HTTP client for the neo API. Every request is bounded by [`REQUEST_TIMEOUT`].
#[derive(Debug, Clone)]
pub struct NeoClient {
    addr: NeoAddr,
    http: reqwest::Client,
}

impl NeoClient {
    pub fn new(addr: &str) -> Result<Self> {
        let addr = NeoAddr::parse(addr)?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .wrap_err("failed to build http client")?;
        Ok(Self { addr, http })
    }

    /// `GET`s `path_and_query` (e.g. `/db/statz`) and decodes the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T> {
        match &self.addr {
            NeoAddr::Http(base) => {
                let url = base
                    .join(path_and_query)
                    .wrap_err_with(|| format!("invalid request path {path_and_query:?}"))?;
                let rsp = self.http.get(url).send().await?.error_for_status()?;
                Ok(rsp.json().await?)
            }
            NeoAddr::Unix(path) => tokio::time::timeout(REQUEST_TIMEOUT, get_unix(path, path_and_query))
                .await
                .wrap_err_with(|| format!("request to {} timed out", path.display()))?,
        }
    }
}

async fn get_unix<T: DeserializeOwned>(socket: &Path, path_and_query: &str) -> Result<T> {
    let stream = UnixStream::connect(socket)
        .await
        .wrap_err_with(|| format!("failed to dial {}", socket.display()))?;
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(err) = conn.await {
            debug!("neo connection closed: {err}");
        }
    });

    let req = Request::builder()
        .method(Method::GET)
        .uri(path_and_query)
        .header(header::HOST, UNIX_HOST)
        .header(header::ACCEPT, "application/json")
        .body(Empty::<Bytes>::new())?;
    let rsp = sender.send_request(req).await?;
    let status = rsp.status();
    let body = rsp.into_body().collect().await?.to_bytes();
    eyre::ensure!(
        status.is_success(),
        "{path_and_query} returned {status}: {}",
        String::from_utf8_lossy(&body)
    );
    serde_json::from_slice(&body).wrap_err_with(|| format!("invalid response from {path_and_query}"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::{
        io::{
            AsyncReadExt as _,
            AsyncWriteExt as _,
        },
        net::UnixListener,
    };

    /// Serves `body` as a JSON response to every connection on `socket`. Returns the request
    /// lines seen so far through the join handle once `connections` requests were served.
    pub(crate) fn serve_json(
        socket: &Path,
        body: &'static str,
        connections: usize,
    ) -> tokio::task::JoinHandle<Vec<String>> {
        let listener = UnixListener::bind(socket).unwrap();
        tokio::spawn(async move {
            let mut seen = Vec::new();
            for _ in 0..connections {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let request = String::from_utf8_lossy(&buf).to_string();
                seen.push(request.lines().next().unwrap_or_default().to_string());
                let rsp = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(rsp.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
            seen
        })
    }

    #[test]
    fn parses_addresses() {
        assert_eq!(
            NeoAddr::parse("unix:///var/run/neo.sock").unwrap(),
            NeoAddr::Unix(PathBuf::from("/var/run/neo.sock"))
        );
        assert_eq!(
            NeoAddr::parse("tcp://127.0.0.1:5654").unwrap(),
            NeoAddr::Http(Url::parse("http://127.0.0.1:5654").unwrap())
        );
        assert_eq!(
            NeoAddr::parse(" https://neo.local ").unwrap(),
            NeoAddr::Http(Url::parse("https://neo.local").unwrap())
        );
        assert!(NeoAddr::parse("unix://").is_err());
        assert!(NeoAddr::parse("ftp://neo.local").is_err());
        assert!(NeoAddr::parse("").is_err());
    }

    #[tokio::test]
    async fn get_json_over_unix_socket() {
        let dir = temp_dir::TempDir::new().unwrap();
        let socket = dir.child("neo.sock");
        let server = serve_json(&socket, r#"{"success":true}"#, 1);

        let client = NeoClient::new(&format!("unix://{}", socket.display())).unwrap();
        let value: serde_json::Value = client.get_json("/db/statz").await.unwrap();
        assert_eq!(value["success"], serde_json::Value::Bool(true));
        assert_eq!(server.await.unwrap(), vec!["GET /db/statz HTTP/1.1".to_string()]);
    }
}
