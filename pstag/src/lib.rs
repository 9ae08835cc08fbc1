//! # pstag
//!
//! The collection-and-reporting pipeline of the neo-cat sidecar.
//!
//! ## Architecture
//!
//! - **`report`**: [`Record`] and [`Report`], the units exchanged between inlets and outlets
//! - **`plugin`**: the [`Inlet`] and [`Outlet`] capabilities every source and sink implements
//! - **`registry`**: the [`Registry`] mapping plugin names to factories
//! - **`input`**: the [`InputHandler`] that drives one inlet on a fixed interval
//! - **`pipeline`**: the [`Pipeline`] that owns the handlers, the shared channel and the fan-out to outlets
//! - **`inlets`** / **`outlets`**: the built-in sources and sinks
//!
//! ## Usage
//!
//! ```no_run
//! # async fn demo() -> Result<(), neo_cat_pstag::PipelineError> {
//! use neo_cat_pstag::{
//!     Pipeline,
//!     PipelineConfig,
//!     PluginSpec,
//!     Registry,
//! };
//! use std::time::Duration;
//!
//! let config = PipelineConfig::new(Duration::from_secs(10)).with_tag_prefix("host1_");
//! let pipeline = Pipeline::from_specs(
//!     Registry::global(),
//!     config,
//!     &[PluginSpec::new("in-cpu"), PluginSpec::new("in-mem")],
//!     &[PluginSpec::new("out-file").arg("-")],
//! )?;
//! pipeline.run().await?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate tracing;

mod error;
mod filter;
pub mod inlets;
mod input;
pub mod outlets;
mod pipeline;
mod plugin;
mod registry;
mod report;

pub use error::PipelineError;
pub use filter::Filter;
pub use input::InputHandler;
pub use pipeline::{
    Pipeline,
    PipelineConfig,
    PipelineStatus,
    DEFAULT_CHANNEL_CAPACITY,
};
pub use plugin::{
    FnInlet,
    Inlet,
    Outlet,
};
pub use registry::{
    ArgDefault,
    BuiltinInlet,
    BuiltinOutlet,
    InletReg,
    OutletReg,
    PluginSpec,
    Registry,
};
pub use report::{
    Record,
    Report,
    TimeFormat,
};
