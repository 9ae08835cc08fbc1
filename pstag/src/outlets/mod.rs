//! Built-in report destinations.

pub mod file;
pub mod http;
pub mod mqtt;

use eyre::Result;

fn required_arg<'a>(name: &str, args: &'a [String]) -> Result<&'a str> {
    match args {
        [arg] if !arg.trim().is_empty() => Ok(arg.trim()),
        [] | [_] => eyre::bail!("{name} requires an address"),
        _ => eyre::bail!("{name} takes a single address, got {args:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_arity() {
        assert_eq!(required_arg("out-file", &[" - ".into()]).unwrap(), "-");
        assert!(required_arg("out-file", &[]).is_err());
        assert!(required_arg("out-file", &["".into()]).is_err());
        assert!(required_arg("out-file", &["a".into(), "b".into()]).is_err());
    }
}
