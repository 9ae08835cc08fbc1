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
    OptionExt as _,
    Result,
};
use futures::{
    future::BoxFuture,
    FutureExt as _,
};
use rumqttc::{
    AsyncClient,
    Event,
    MqttOptions,
    Outgoing,
    QoS,
};
use std::time::Duration;
use strum::{
    Display,
    EnumString,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const DEFAULT_PORT: u16 = 1883;
const KEEP_ALIVE: Duration = Duration::from_secs(30);
const REQUEST_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(3);

pub fn factory(args: &[String]) -> Result<Box<dyn Outlet>> {
    let addr = required_arg("out-mqtt", args)?;
    Ok(Box::new(MqttOutlet::new(MqttTarget::parse(addr)?)))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Payload {
    #[default]
    Csv,
    Json,
}

/// `tcp://host:port/<topic>[:csv|:json]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttTarget {
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub payload: Payload,
}

impl MqttTarget {
    pub fn parse(addr: &str) -> Result<Self> {
        let rest = addr
            .trim()
            .strip_prefix("tcp://")
            .ok_or_else(|| eyre::eyre!("mqtt address must start with tcp://, got {addr:?}"))?;
        let (server, topic) = rest
            .split_once('/')
            .ok_or_else(|| eyre::eyre!("mqtt address has no topic: {addr:?}"))?;

        let (host, port) = match server.rsplit_once(':') {
            Some((host, port)) => (
                host,
                port.parse::<u16>()
                    .wrap_err_with(|| format!("invalid mqtt port in {addr:?}"))?,
            ),
            None => (server, DEFAULT_PORT),
        };
        eyre::ensure!(!host.is_empty(), "mqtt address has no host: {addr:?}");

        let (topic, payload) = match topic.rsplit_once(':') {
            Some((topic, format)) => (
                topic,
                format
                    .parse::<Payload>()
                    .map_err(|_| eyre::eyre!("unsupported mqtt payload format {format:?}"))?,
            ),
            None => (topic, Payload::default()),
        };
        eyre::ensure!(!topic.is_empty(), "mqtt address has no topic: {addr:?}");

        Ok(Self {
            host: host.to_string(),
            port,
            topic: topic.to_string(),
            payload,
        })
    }
}

struct Connection {
    client: AsyncClient,
    /// Set once a disconnect is queued; the event loop then exits on the next error.
    closing: CancellationToken,
    token: CancellationToken,
    event_loop: JoinHandle<()>,
}

/// Publishes every report with QoS 1 to one topic.
///
/// Publishing never waits for the broker: when the client's request queue is full (the broker is
/// down or slow) the report is dropped with a warning instead of throttling the other outlets.
/// `close` flushes what is queued and disconnects, giving up after a few seconds.
pub struct MqttOutlet {
    target: MqttTarget,
    conn: Option<Connection>,
}

impl MqttOutlet {
    pub fn new(target: MqttTarget) -> Self {
        Self { target, conn: None }
    }

    fn encode(&self, report: &Report) -> String {
        match self.target.payload {
            Payload::Csv => report.to_csv(TimeFormat::Ns),
            Payload::Json => report.to_json_rows(TimeFormat::Ns).to_string(),
        }
    }
}

impl Outlet for MqttOutlet {
    fn open(&mut self) -> BoxFuture<'_, Result<()>> {
        let client_id = format!("neo-cat-{}", std::process::id());
        let mut options = MqttOptions::new(client_id, &self.target.host, self.target.port);
        options.set_keep_alive(KEEP_ALIVE);
        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);

        let closing = CancellationToken::new();
        let token = CancellationToken::new();
        let event_loop = tokio::spawn({
            let closing = closing.clone();
            let token = token.clone();
            let broker = format!("{}:{}", self.target.host, self.target.port);
            async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        event = event_loop.poll() => match event {
                            // requests are written in order, so everything published before the
                            // disconnect is on the wire
                            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                            Ok(event) => trace!(?event, "mqtt event"),
                            Err(err) if closing.is_cancelled() => {
                                debug!(%broker, "mqtt connection closed: {err}");
                                break;
                            }
                            Err(err) => {
                                warn!(%broker, "mqtt connection error: {err}");
                                tokio::select! {
                                    _ = token.cancelled() => break,
                                    _ = closing.cancelled() => break,
                                    _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                                }
                            }
                        },
                    }
                }
                trace!(%broker, "mqtt event loop exited");
            }
        });

        self.conn = Some(Connection {
            client,
            closing,
            token,
            event_loop,
        });
        async { Ok(()) }.boxed()
    }

    fn write<'a>(&'a mut self, report: &'a Report) -> BoxFuture<'a, Result<()>> {
        async move {
            if report.is_empty() {
                return Ok(());
            }
            let payload = self.encode(report);
            let conn = self.conn.as_ref().ok_or_eyre("output is not open")?;
            if let Err(err) = conn
                .client
                .try_publish(&self.target.topic, QoS::AtLeastOnce, false, payload)
            {
                warn!(topic = %self.target.topic, "mqtt queue is full, dropping report: {err}");
            }
            Ok(())
        }
        .boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        async move {
            let Some(Connection {
                client,
                closing,
                token,
                mut event_loop,
            }) = self.conn.take()
            else {
                return Ok(());
            };
            closing.cancel();
            if let Err(err) = client.try_disconnect() {
                debug!("mqtt disconnect: {err}");
                token.cancel();
            }
            let joined = match tokio::time::timeout(CLOSE_TIMEOUT, &mut event_loop).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(topic = %self.target.topic, "mqtt did not flush in time, closing anyway");
                    token.cancel();
                    event_loop.await
                }
            };
            if let Err(err) = joined {
                error!("mqtt event loop failed: {err}");
            }
            Ok(())
        }
        .boxed()
    }
}
