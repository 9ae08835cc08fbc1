#[macro_use]
extern crate tracing;

mod app;
mod errors;
mod logging;
mod pid;
pub mod process;

pub use app::App;
pub use errors::init_errors;
pub use logging::init_logging;
pub use neo_cat_config::{
    Args,
    Settings,
};
pub use process::{
    ProcessController,
    ProcessPlan,
};

/// Usage of every registered inlet and outlet.
pub fn list_plugins() -> String {
    neo_cat_pstag::Registry::global().usage()
}
