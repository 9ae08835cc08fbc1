use clap::Parser;
use color_eyre::Result;
use neo_cat::{
    init_errors,
    init_logging,
    list_plugins,
    App,
    Args,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_errors()?;
    let args = Args::parse();
    if args.list_plugins {
        print!("{}", list_plugins());
        return Ok(());
    }
    init_logging(args.verbose)?;
    App::new(args)?.run().await
}
