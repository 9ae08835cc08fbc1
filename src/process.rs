use neo_cat_config::Settings;
use neo_cat_pstag::{
    BuiltinInlet,
    BuiltinOutlet,
    Pipeline,
    PipelineConfig,
    PipelineError,
    PluginSpec,
    Registry,
};
use tokio::sync::Mutex;

/// Inlets and outlets a [`Settings`] asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessPlan {
    pub inlets: Vec<PluginSpec>,
    pub outlets: Vec<PluginSpec>,
}

fn non_blank(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|v| !v.is_empty())
}

impl ProcessPlan {
    pub fn from_settings(settings: &Settings) -> Self {
        let mut inlets = Vec::new();
        let flags = [
            (settings.in_load, BuiltinInlet::Load),
            (settings.in_cpu, BuiltinInlet::Cpu),
            (settings.in_mem, BuiltinInlet::Mem),
            (settings.in_host, BuiltinInlet::Host),
            (settings.in_sensor, BuiltinInlet::Sensor),
        ];
        inlets.extend(
            flags
                .into_iter()
                .filter(|(on, _)| *on)
                .map(|(_, inlet)| PluginSpec::from(inlet)),
        );

        let lists = [
            (&settings.in_proto, BuiltinInlet::Proto),
            (&settings.in_disk, BuiltinInlet::Disk),
            (&settings.in_diskio, BuiltinInlet::DiskIo),
            (&settings.in_net, BuiltinInlet::Net),
        ];
        for (value, inlet) in lists {
            let Some(value) = non_blank(value) else {
                continue;
            };
            if inlet == BuiltinInlet::Proto && cfg!(target_os = "macos") {
                debug!("in-proto is not available on macos");
                continue;
            }
            inlets.push(PluginSpec::from(inlet).arg(value));
        }

        if let Some(addr) = settings.neo_http_addr() {
            inlets.push(PluginSpec::from(BuiltinInlet::NeoStatz).arg(addr));
            let tables = settings.table_rows_counter_tables();
            if !tables.is_empty() {
                inlets.push(
                    PluginSpec::from(BuiltinInlet::NeoTableRowsCounter)
                        .arg(addr)
                        .args(tables),
                );
            }
        }

        let mut outlets = Vec::new();
        if let Some(table) = non_blank(&settings.table_name) {
            let addr = format!("tcp://{}/db/append/{table}:csv", settings.mqtt_addr.trim());
            outlets.push(PluginSpec::from(BuiltinOutlet::Mqtt).arg(addr));
        }
        if settings.debug {
            outlets.push(PluginSpec::from(BuiltinOutlet::File).arg("-"));
        }
        if let Some(path) = non_blank(&settings.out_file) {
            // debug already prints to stdout
            if !(settings.debug && path == "-") {
                outlets.push(PluginSpec::from(BuiltinOutlet::File).arg(path));
            }
        }
        if let Some(url) = non_blank(&settings.out_http) {
            outlets.push(PluginSpec::from(BuiltinOutlet::Http).arg(url));
        }

        Self { inlets, outlets }
    }
}

/// Starts, stops and restarts the one pipeline the sidecar runs.
pub struct ProcessController<'r> {
    registry: &'r Registry,
    pipeline: Mutex<Option<Pipeline>>,
}

impl ProcessController<'static> {
    pub fn global() -> Self {
        Self::new(Registry::global())
    }
}

impl<'r> ProcessController<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            pipeline: Mutex::new(None),
        }
    }

    pub async fn running(&self) -> bool {
        self.pipeline.lock().await.as_ref().is_some_and(Pipeline::running)
    }

    /// Builds a pipeline from `settings` and runs it.
    pub async fn start(&self, settings: &Settings) -> Result<(), PipelineError> {
        let config = PipelineConfig::parse(settings.interval.as_deref())?
            .with_tag_prefix(settings.tag_prefix.trim())
            .with_channel_capacity(settings.channel_capacity);

        let mut slot = self.pipeline.lock().await;
        if slot.as_ref().is_some_and(Pipeline::running) {
            return Err(PipelineError::AlreadyRunning);
        }

        let plan = ProcessPlan::from_settings(settings);
        debug!(?plan, "starting process");
        let pipeline = Pipeline::from_specs(self.registry, config, &plan.inlets, &plan.outlets)?;
        pipeline.run().await?;
        *slot = Some(pipeline);
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), PipelineError> {
        match self.pipeline.lock().await.take() {
            Some(pipeline) => pipeline.stop().await,
            None => Ok(()),
        }
    }

    pub async fn restart(&self, settings: &Settings) -> Result<(), PipelineError> {
        if let Err(err) = self.stop().await {
            warn!("process did not stop cleanly: {err}");
        }
        self.start(settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_cat_pstag::{
        ArgDefault,
        FnInlet,
        Inlet,
        Record,
    };
    use pretty_assertions::assert_eq;

    fn specs(items: &[(&str, &[&str])]) -> Vec<PluginSpec> {
        items
            .iter()
            .map(|(name, args)| PluginSpec::new(name).args(args.iter().copied()))
            .collect()
    }

    fn quiet() -> Settings {
        Settings {
            in_cpu: false,
            in_load: false,
            in_mem: false,
            in_host: false,
            ..Settings::default()
        }
    }

    #[test]
    fn defaults_enable_the_host_inlets() {
        let plan = ProcessPlan::from_settings(&Settings::default());
        assert_eq!(
            plan,
            ProcessPlan {
                inlets: specs(&[("in-load", &[]), ("in-cpu", &[]), ("in-mem", &[]), ("in-host", &[])]),
                outlets: Vec::new(),
            }
        );
    }

    #[test]
    fn lists_neo_and_outputs() {
        let settings = Settings {
            in_disk: "/,/mnt/disk".into(),
            in_net: " eth0 ".into(),
            in_diskio: "  ".into(),
            neo_http: "tcp://127.0.0.1:5654,unix:///tmp/neo.sock".into(),
            in_table_rows_counter: "EXAMPLE,TAG".into(),
            table_name: "EXAMPLE".into(),
            debug: true,
            out_file: "-".into(),
            out_http: "http://localhost:5654/db/write/EXAMPLE".into(),
            ..quiet()
        };
        let plan = ProcessPlan::from_settings(&settings);
        assert_eq!(
            plan.inlets,
            specs(&[
                ("in-disk", &["/,/mnt/disk"]),
                ("in-net", &["eth0"]),
                ("in-neo-statz", &["unix:///tmp/neo.sock"]),
                ("in-neo-table-rows-counter", &["unix:///tmp/neo.sock", "EXAMPLE", "TAG"]),
            ])
        );
        assert_eq!(
            plan.outlets,
            specs(&[
                ("out-mqtt", &["tcp://127.0.0.1:5653/db/append/EXAMPLE:csv"]),
                ("out-file", &["-"]),
                ("out-http", &["http://localhost:5654/db/write/EXAMPLE"]),
            ])
        );
    }

    #[test]
    fn proto_is_skipped_on_macos() {
        let settings = Settings {
            in_proto: "tcp,udp".into(),
            ..quiet()
        };
        let plan = ProcessPlan::from_settings(&settings);
        if cfg!(target_os = "macos") {
            assert!(plan.inlets.is_empty());
        } else {
            assert_eq!(plan.inlets, specs(&[("in-proto", &["tcp,udp"])]));
        }
    }

    #[test]
    fn table_counter_needs_a_neo_address() {
        let settings = Settings {
            in_table_rows_counter: "EXAMPLE".into(),
            ..quiet()
        };
        assert!(ProcessPlan::from_settings(&settings).inlets.is_empty());
    }

    fn fake_registry() -> Registry {
        let registry = Registry::new();
        for name in ["in-load", "in-cpu", "in-mem", "in-host"] {
            registry.register_inlet_with(
                name,
                |_: &[String]| -> eyre::Result<Box<dyn Inlet>> {
                    Ok(FnInlet::boxed(|| Ok(vec![Record::new("fake", 1.0, 0)])))
                },
                ArgDefault::Flag(false),
                name,
            );
        }
        registry
    }

    #[tokio::test(start_paused = true)]
    async fn start_stop_restart() {
        let registry = fake_registry();
        let controller = ProcessController::new(&registry);
        let settings = Settings::default();

        controller.start(&settings).await.unwrap();
        assert!(controller.running().await);
        assert_eq!(
            controller.start(&settings).await.unwrap_err().to_string(),
            "process is already running"
        );

        controller.restart(&settings).await.unwrap();
        assert!(controller.running().await);

        controller.stop().await.unwrap();
        assert!(!controller.running().await);
        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn start_rejects_bad_intervals() {
        let registry = fake_registry();
        let controller = ProcessController::new(&registry);

        let settings = Settings {
            interval: None,
            ..Settings::default()
        };
        assert_eq!(
            controller.start(&settings).await.unwrap_err().to_string(),
            "interval not configured"
        );

        let settings = Settings {
            interval: Some("fast".into()),
            ..Settings::default()
        };
        assert_eq!(
            controller.start(&settings).await.unwrap_err().to_string(),
            r#"interval "fast" is wrong value"#
        );
        assert!(!controller.running().await);
    }

    #[tokio::test]
    async fn unknown_inlets_fail_the_start() {
        let registry = Registry::new();
        let controller = ProcessController::new(&registry);
        let err = controller.start(&Settings::default()).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnknownInlet(_)));
        assert!(!controller.running().await);
    }
}
