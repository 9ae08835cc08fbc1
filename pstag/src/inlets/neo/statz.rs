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

pub(super) const STATZ_PATH: &str = "/db/statz";

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MqttStatz {
    pub bytes_received: i64,
    pub bytes_sent: i64,
    pub clients_connected: i64,
    pub clients_disconnected: i64,
    pub clients_max: i64,
    pub clients_total: i64,
    pub inflight: i64,
    pub inflight_dropped: i64,
    pub messages_received: i64,
    pub messages_sent: i64,
    pub packets_received: i64,
    pub packets_sent: i64,
    pub retained: i64,
    pub subscriptions: i64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MemStatz {
    pub heap_in_use: i64,
    pub gc_pause_total_ns: i64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerStatz {
    pub mem: MemStatz,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionStatz {
    pub appenders: i64,
    pub appenders_used: i64,
    pub conns: i64,
    pub conns_used: i64,
    pub raw_conns: i64,
    pub stmts: i64,
    pub stmts_used: i64,
}

/// Body of `GET /db/statz`. Sections or counters missing from the response read as zero.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NeoStatz {
    pub mqtt: MqttStatz,
    pub neo: ServerStatz,
    pub sess: SessionStatz,
}

impl NeoStatz {
    pub fn to_records(&self) -> Vec<Record> {
        let Self { mqtt, neo, sess } = self;
        [
            ("statz_mqtt_bytes_recv", mqtt.bytes_received),
            ("statz_mqtt_bytes_sent", mqtt.bytes_sent),
            ("statz_mqtt_clients_connected", mqtt.clients_connected),
            ("statz_mqtt_clients_disconnected", mqtt.clients_disconnected),
            ("statz_mqtt_clients_max", mqtt.clients_max),
            ("statz_mqtt_clients_total", mqtt.clients_total),
            ("statz_mqtt_inflight", mqtt.inflight),
            ("statz_mqtt_inflight_dropped", mqtt.inflight_dropped),
            ("statz_mqtt_messages_recv", mqtt.messages_received),
            ("statz_mqtt_messages_sent", mqtt.messages_sent),
            ("statz_mqtt_packets_recv", mqtt.packets_received),
            ("statz_mqtt_packets_sent", mqtt.packets_sent),
            ("statz_mqtt_retained", mqtt.retained),
            ("statz_mqtt_subscriptions", mqtt.subscriptions),
            ("statz_mem_heap_in_use", neo.mem.heap_in_use),
            ("statz_mem_gc_pause_ns", neo.mem.gc_pause_total_ns),
            ("statz_sess_appenders", sess.appenders),
            ("statz_sess_appenders_used", sess.appenders_used),
            ("statz_sess_conns", sess.conns),
            ("statz_sess_conns_used", sess.conns_used),
            ("statz_sess_raw_conns", sess.raw_conns),
            ("statz_sess_stmts", sess.stmts),
            ("statz_sess_stmts_used", sess.stmts_used),
        ]
        .into_iter()
        .map(|(name, value)| Record::new(name, value as f64, 0))
        .collect()
    }
}

pub struct StatzInlet {
    client: NeoClient,
}

impl StatzInlet {
    pub fn new(client: NeoClient) -> Self {
        Self { client }
    }
}

impl Inlet for StatzInlet {
    fn sample(&mut self) -> BoxFuture<'_, Result<Vec<Record>>> {
        async move {
            let statz: NeoStatz = self.client.get_json(STATZ_PATH).await?;
            Ok(statz.to_records())
        }
        .boxed()
    }
}
