//! Built-in metric sources.
//!
//! Host statistics come from `sysinfo`; the Linux-only disk I/O and protocol counters are read from
//! the `/proc` tables; the `neo` sources scrape the companion database over HTTP.

pub mod disk;
pub mod neo;
pub mod net;
pub mod system;

use eyre::Result;

fn no_args(name: &str, args: &[String]) -> Result<()> {
    eyre::ensure!(
        args.iter().all(|a| a.trim().is_empty()),
        "{name} takes no arguments, got {args:?}"
    );
    Ok(())
}

fn single_arg<'a>(name: &str, args: &'a [String]) -> Result<&'a str> {
    match args {
        [] => Ok(""),
        [arg] => Ok(arg.trim()),
        _ => eyre::bail!("{name} takes a single comma separated list, got {args:?}"),
    }
}

/// Turns a mount point, device or label into a metric name segment: `/mnt/data` -> `mnt_data`.
pub(crate) fn slug(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("root");
    }
    out
}
