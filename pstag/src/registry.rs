use crate::{
    error::PipelineError,
    inlets,
    outlets,
    plugin::{
        Inlet,
        Outlet,
    },
};
use derive_more::Debug;
use eyre::Result;
use std::{
    collections::HashMap,
    fmt::Write as _,
    sync::{
        Arc,
        RwLock,
        RwLockReadGuard,
        RwLockWriteGuard,
    },
};
use strum::{
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
};

pub type InletFactory = Arc<dyn Fn(&[String]) -> Result<Box<dyn Inlet>> + Send + Sync>;
pub type OutletFactory = Arc<dyn Fn(&[String]) -> Result<Box<dyn Outlet>> + Send + Sync>;

/// What a plugin expects on the command line: a switch or a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgDefault {
    Flag(bool),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct InletReg {
    pub name: String,
    #[debug(skip)]
    pub factory: InletFactory,
    pub arg_default: ArgDefault,
    pub help: String,
}

#[derive(Debug, Clone)]
pub struct OutletReg {
    pub name: String,
    #[debug(skip)]
    pub factory: OutletFactory,
    pub arg_default: ArgDefault,
    pub help: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
pub enum BuiltinInlet {
    #[strum(serialize = "in-cpu")]
    Cpu,
    #[strum(serialize = "in-load")]
    Load,
    #[strum(serialize = "in-mem")]
    Mem,
    #[strum(serialize = "in-disk")]
    Disk,
    #[strum(serialize = "in-diskio")]
    DiskIo,
    #[strum(serialize = "in-net")]
    Net,
    #[strum(serialize = "in-proto")]
    Proto,
    #[strum(serialize = "in-sensor")]
    Sensor,
    #[strum(serialize = "in-host")]
    Host,
    #[strum(serialize = "in-neo-statz")]
    NeoStatz,
    #[strum(serialize = "in-neo-table-rows-counter")]
    NeoTableRowsCounter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
pub enum BuiltinOutlet {
    #[strum(serialize = "out-file")]
    File,
    #[strum(serialize = "out-http")]
    Http,
    #[strum(serialize = "out-mqtt")]
    Mqtt,
}

/// A plugin reference as it comes out of the configuration: a registry name and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSpec {
    pub name: String,
    pub args: Vec<String>,
}

impl PluginSpec {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().to_string(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl From<BuiltinInlet> for PluginSpec {
    fn from(value: BuiltinInlet) -> Self {
        Self::new(value)
    }
}

impl From<BuiltinOutlet> for PluginSpec {
    fn from(value: BuiltinOutlet) -> Self {
        Self::new(value)
    }
}

#[derive(Default)]
struct Inner {
    inlets: HashMap<String, InletReg>,
    inlet_names: Vec<String>,
    outlets: HashMap<String, OutletReg>,
    outlet_names: Vec<String>,
}

/// Catalog of inlet and outlet factories, keyed by name.
///
/// Registration may happen from several threads; names keep the order of their first
/// registration, and registering a name again replaces its descriptor in place.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

lazy_static::lazy_static! {
    static ref GLOBAL: Registry = Registry::with_builtins();
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, populated with the built-in plugins on first use.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_builtins();
        registry
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register_inlet(&self, reg: InletReg) {
        let mut inner = self.write();
        if !inner.inlets.contains_key(&reg.name) {
            inner.inlet_names.push(reg.name.clone());
        }
        inner.inlets.insert(reg.name.clone(), reg);
    }

    pub fn register_inlet_with<F>(&self, name: impl AsRef<str>, factory: F, arg_default: ArgDefault, help: &str)
    where
        F: Fn(&[String]) -> Result<Box<dyn Inlet>> + Send + Sync + 'static,
    {
        self.register_inlet(InletReg {
            name: name.as_ref().to_string(),
            factory: Arc::new(factory),
            arg_default,
            help: help.to_string(),
        });
    }

    pub fn register_outlet(&self, reg: OutletReg) {
        let mut inner = self.write();
        if !inner.outlets.contains_key(&reg.name) {
            inner.outlet_names.push(reg.name.clone());
        }
        inner.outlets.insert(reg.name.clone(), reg);
    }

    pub fn register_outlet_with<F>(&self, name: impl AsRef<str>, factory: F, arg_default: ArgDefault, help: &str)
    where
        F: Fn(&[String]) -> Result<Box<dyn Outlet>> + Send + Sync + 'static,
    {
        self.register_outlet(OutletReg {
            name: name.as_ref().to_string(),
            factory: Arc::new(factory),
            arg_default,
            help: help.to_string(),
        });
    }

    pub fn create_inlet(&self, name: &str, args: &[String]) -> Result<Box<dyn Inlet>, PipelineError> {
        // The factory runs outside the lock so it may consult the registry itself.
        let factory = self
            .read()
            .inlets
            .get(name)
            .map(|reg| reg.factory.clone())
            .ok_or_else(|| PipelineError::UnknownInlet(name.to_string()))?;
        factory(args).map_err(|reason| PipelineError::InvalidArgs {
            name: name.to_string(),
            reason,
        })
    }

    pub fn create_outlet(&self, name: &str, args: &[String]) -> Result<Box<dyn Outlet>, PipelineError> {
        let factory = self
            .read()
            .outlets
            .get(name)
            .map(|reg| reg.factory.clone())
            .ok_or_else(|| PipelineError::UnknownOutlet(name.to_string()))?;
        factory(args).map_err(|reason| PipelineError::InvalidArgs {
            name: name.to_string(),
            reason,
        })
    }

    pub fn inlet_names(&self) -> Vec<String> {
        self.read().inlet_names.clone()
    }

    pub fn outlet_names(&self) -> Vec<String> {
        self.read().outlet_names.clone()
    }

    pub fn inlet(&self, name: &str) -> Option<InletReg> {
        self.read().inlets.get(name).cloned()
    }

    pub fn outlet(&self, name: &str) -> Option<OutletReg> {
        self.read().outlets.get(name).cloned()
    }

    /// Help text listing every registered plugin, in registration order.
    pub fn usage(&self) -> String {
        let inner = self.read();
        let mut out = String::from("Input Options:\n");
        for reg in inner.inlet_names.iter().filter_map(|n| inner.inlets.get(n)) {
            for line in reg.help.lines() {
                let _ = writeln!(out, "    {line}");
            }
        }
        out.push_str("\nOutput Options:\n");
        for reg in inner.outlet_names.iter().filter_map(|n| inner.outlets.get(n)) {
            for line in reg.help.lines() {
                let _ = writeln!(out, "    {line}");
            }
        }
        out
    }

    fn register_builtins(&self) {
        use ArgDefault::*;

        self.register_inlet_with(
            BuiltinInlet::Cpu,
            inlets::system::cpu,
            Flag(false),
            "--in-cpu                Report CPU usage",
        );
        self.register_inlet_with(
            BuiltinInlet::Load,
            inlets::system::load,
            Flag(false),
            "--in-load               Report load average",
        );
        self.register_inlet_with(
            BuiltinInlet::Mem,
            inlets::system::mem,
            Flag(false),
            "--in-mem                Report memory usage",
        );
        self.register_inlet_with(
            BuiltinInlet::Disk,
            inlets::disk::disk,
            Text(String::new()),
            "--in-disk <path>        Report disk usage by mount point, comma(,) separated,\n                        \
             (e.g. /,/mnt/disk/). Set 'all' for all mount points.",
        );
        self.register_inlet_with(
            BuiltinInlet::DiskIo,
            inlets::disk::diskio,
            Text(String::new()),
            "--in-diskio <dev>       Report disk I/O by dev name, comma(,) separated,\n                        \
             wildcard(*) is allowed (e.g. sda,sdb,sd*)",
        );
        self.register_inlet_with(
            BuiltinInlet::Net,
            inlets::net::net,
            Text(String::new()),
            "--in-net <iface>        Report network I/O, comma(,) separated,\n                        \
             wildcard(*) is allowed (e.g. eth0,en0,enp*)",
        );
        self.register_inlet_with(
            BuiltinInlet::Proto,
            inlets::net::proto,
            Text(String::new()),
            "--in-proto <proto>      Report network I/O by protocol, comma(,) separated\n                        \
             Available: ip,icmp,icmpmsg,tcp,udp,udplite",
        );
        self.register_inlet_with(
            BuiltinInlet::Sensor,
            inlets::system::sensor,
            Flag(false),
            "--in-sensor             Report sensors (temperature, fan speed, etc.)",
        );
        self.register_inlet_with(
            BuiltinInlet::Host,
            inlets::system::host,
            Flag(false),
            "--in-host               Report host information",
        );
        self.register_inlet_with(
            BuiltinInlet::NeoStatz,
            inlets::neo::statz,
            Flag(false),
            "--in-neo-statz          Report machbase-neo statz",
        );
        self.register_inlet_with(
            BuiltinInlet::NeoTableRowsCounter,
            inlets::neo::table_rows_counter,
            Flag(false),
            "--in-neo-table-rows-counter  Report machbase-neo table counter",
        );

        self.register_outlet_with(
            BuiltinOutlet::File,
            outlets::file::factory,
            Text(String::new()),
            "--out-file <path>       Report output to the file",
        );
        self.register_outlet_with(
            BuiltinOutlet::Http,
            outlets::http::factory,
            Text(String::new()),
            "--out-http <addr>       Report output to the HTTP server\n                        \
             e.g. http://localhost:5654/db/write/EXAMPLE?timeformat=s&method=append",
        );
        self.register_outlet_with(
            BuiltinOutlet::Mqtt,
            outlets::mqtt::factory,
            Text(String::new()),
            "--out-mqtt <addr/topic> Report output to the MQTT server.\n                        \
             e.g. tcp://localhost:5653/db/append/EXAMPLE:csv",
        );
    }
}
