use clap::Parser;
use std::path::PathBuf;

/// Host telemetry sidecar for machbase-neo
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version = version(), about, long_about = None)]
pub struct Args {
    /// Configuration file, used instead of `config.yaml` in the config directory.
    #[clap(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Sampling interval, e.g. `10s` or `1m 30s`.
    #[clap(long, value_name = "DURATION")]
    pub interval: Option<String>,

    /// Prepended to every reported record name.
    #[clap(long = "tag-prefix", value_name = "PREFIX")]
    pub tag_prefix: Option<String>,

    /// Table the reports are appended to over MQTT.
    #[clap(long = "table-name", value_name = "TABLE")]
    pub table_name: Option<String>,

    /// Address of the neo HTTP API, `unix://`, `tcp://` or `http://`. May be a comma separated
    /// list, the first unix socket wins.
    #[clap(long = "neo-http", value_name = "ADDR", env = "MACHBASE_NEO_HTTP")]
    pub neo_http: Option<String>,

    /// Also write every report to this file, `-` for stdout.
    #[clap(long = "out-file", value_name = "PATH")]
    pub out_file: Option<String>,

    /// Also POST every report to this URL.
    #[clap(long = "out-http", value_name = "URL")]
    pub out_http: Option<String>,

    /// Enables debug mode.
    ///  - every report is printed to stdout
    #[clap(long = "debug", action)]
    pub debug: bool,

    /// Logs at debug level.
    #[clap(long = "verbose", action)]
    pub verbose: bool,

    /// Writes the process id to this file.
    #[clap(long, value_name = "FILE")]
    pub pid: Option<PathBuf>,

    /// Prints the available inlets and outlets and exits.
    #[clap(long = "list-plugins", action)]
    pub list_plugins: bool,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            let strings = [
                ("interval", &self.interval),
                ("tag_prefix", &self.tag_prefix),
                ("table_name", &self.table_name),
                ("neo_http", &self.neo_http),
                ("out_file", &self.out_file),
                ("out_http", &self.out_http),
            ];
            for (key, value) in strings {
                if let Some(value) = value {
                    cache.insert(key.to_string(), value.clone().into());
                }
            }
            if self.debug {
                cache.insert("debug".to_string(), true.into());
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let author = clap::crate_authors!();
    let config_dir_path = crate::get_config_dir().display().to_string();
    let data_dir_path = crate::get_data_dir().display().to_string();

    format!(
        "{version}\n\
Authors: {author}

Config directory: {config_dir_path}
Data directory: {data_dir_path}",
        version = env!("CARGO_PKG_VERSION"),
    )
}
