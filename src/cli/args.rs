use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};

/// Flags that take no value.
const SWITCHES: &[&str] = &["--inactive", "--json", "-h", "--help"];

/// `<command> [positional...] [--flag value | --switch]...`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub command: String,
    pub positional: Vec<String>,
    flags: HashMap<String, String>,
    switches: Vec<String>,
}

impl CliArgs {
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut out = CliArgs::default();
        let mut i = 0;
        while i < args.len() {
            let a = args[i].as_str();
            if SWITCHES.contains(&a) {
                out.switches.push(a.to_string());
                i += 1;
                continue;
            }
            if let Some(name) = a.strip_prefix("--") {
                if let Some((k, v)) = name.split_once('=') {
                    out.flags.insert(k.to_string(), v.to_string());
                    i += 1;
                    continue;
                }
                if i + 1 >= args.len() { bail!("--{} requires a value", name); }
                out.flags.insert(name.to_string(), args[i + 1].clone());
                i += 2;
                continue;
            }
            if out.command.is_empty() {
                out.command = a.to_string();
            } else {
                out.positional.push(a.to_string());
            }
            i += 1;
        }
        Ok(out)
    }

    pub fn flag(&self, name: &str) -> Option<&str> { self.flags.get(name).map(String::as_str) }

    pub fn switch(&self, name: &str) -> bool { self.switches.iter().any(|s| s == name) }

    pub fn wants_help(&self) -> bool { self.switch("-h") || self.switch("--help") || self.command == "help" }

    /// Positional argument `idx`, named `what` in the error.
    pub fn arg(&self, idx: usize, what: &str) -> Result<&str> {
        self.positional
            .get(idx)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("{} requires <{}>", self.command, what))
    }

    pub fn parsed_flag<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>> {
        match self.flag(name) {
            None => Ok(None),
            Some(v) => v.trim().parse::<T>().map(Some).map_err(|_| anyhow!("invalid value for --{}: '{}'", name, v)),
        }
    }
}
