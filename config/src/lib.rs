#[macro_use]
extern crate tracing;

mod app_config;
mod args;

pub use app_config::{
    get_config_dir,
    get_data_dir,
    AppConfig,
};
pub use args::{
    version,
    Args,
};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");
const CONFIG_FILE: &str = "config.yaml";
const ENV_PREFIX: &str = "NEO_CAT";

/// Everything the sidecar reads at start up and on reload.
///
/// Layered lowest to highest: built-in defaults, `config.yaml` (or `--config`), `NEO_CAT_*`
/// environment variables, command line arguments.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(flatten)]
    pub app_config: AppConfig,

    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub tag_prefix: String,
    #[serde(default)]
    pub table_name: String,

    #[serde(default)]
    pub in_cpu: bool,
    #[serde(default)]
    pub in_load: bool,
    #[serde(default)]
    pub in_mem: bool,
    #[serde(default)]
    pub in_host: bool,
    #[serde(default)]
    pub in_sensor: bool,
    #[serde(default)]
    pub in_proto: String,
    #[serde(default)]
    pub in_disk: String,
    #[serde(default)]
    pub in_diskio: String,
    #[serde(default)]
    pub in_net: String,
    #[serde(default)]
    pub in_table_rows_counter: String,

    #[serde(default)]
    pub neo_http: String,
    #[serde(default)]
    pub mqtt_addr: String,
    #[serde(default)]
    pub out_file: String,
    #[serde(default)]
    pub out_http: String,

    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for Settings {
    fn default() -> Self {
        serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config")
    }
}

impl Settings {
    pub fn new(args: &Args) -> Result<Self, config::ConfigError> {
        let config_dir = get_config_dir();
        let config_file = args.config.clone().unwrap_or_else(|| config_dir.join(CONFIG_FILE));
        Self::load(&config_dir, &get_data_dir(), &config_file, args)
    }

    fn load(config_dir: &Path, data_dir: &Path, config_file: &Path, args: &Args) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .set_default("data_dir", data_dir.display().to_string())?
            .set_default("config_dir", config_dir.display().to_string())?
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml))
            .add_source(
                config::File::from(config_file)
                    .format(config::FileFormat::Yaml)
                    // an explicit --config must exist
                    .required(args.config.is_some()),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .add_source(args.clone());

        let settings: Self = builder.build()?.try_deserialize()?;
        debug!(file = %config_file.display(), "settings loaded");
        Ok(settings)
    }

    pub fn config_dir(&self) -> &Path {
        &self.app_config.config_dir
    }

    /// The neo HTTP address to scrape, if any.
    ///
    /// `neo_http` may carry a comma separated list (as `MACHBASE_NEO_HTTP` does); a unix socket is
    /// preferred, otherwise the first entry is used.
    pub fn neo_http_addr(&self) -> Option<&str> {
        let entries = || self.neo_http.split(',').map(str::trim).filter(|s| !s.is_empty());
        entries()
            .find(|addr| addr.starts_with("unix://"))
            .or_else(|| entries().next())
    }

    /// Tables counted by `in-neo-table-rows-counter`.
    pub fn table_rows_counter_tables(&self) -> Vec<String> {
        self.in_table_rows_counter
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
