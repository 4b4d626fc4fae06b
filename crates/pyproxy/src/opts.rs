//! Command line options of the `pyproxy` binary.

use crate::{Address, PythonVersion, Target};
use anyhow::{anyhow, bail, Context as _};
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug)]
pub struct Opts {
    /// The process to inspect.
    pub pid: u32,
    /// The version of the interpreter running in the process.
    pub python: PythonVersion,
    /// The data model of the process.
    pub target: Target,
    /// The module the interpreter is loaded from.
    pub module: String,
    /// Statically specified symbols.
    pub symbols: Vec<(String, Address)>,
    /// Files to load symbol tables from.
    pub symbol_files: Vec<PathBuf>,
    /// Files to load layout tables from.
    pub layout_files: Vec<PathBuf>,
    /// Maximum number of elements to walk in any one list.
    pub limit: Option<usize>,
}

/// Parse commandline options.
pub fn opts() -> anyhow::Result<Opts> {
    let m = app().get_matches();

    let pid = m
        .value_of("pid")
        .ok_or_else(|| anyhow!("missing `--pid`"))?
        .parse()
        .context("bad `--pid`")?;

    let python = m
        .value_of("python")
        .unwrap_or("3.7")
        .parse()
        .context("bad `--python`")?;

    let target = match m.value_of("data-model") {
        Some(model) => parse_data_model(model)?,
        None => Target::host(),
    };

    let module = match m.value_of("module") {
        Some(module) => module.to_string(),
        None => format!("python{}", python),
    };

    let mut symbols = Vec::new();

    for symbol in m.values_of("symbol").into_iter().flatten() {
        symbols.push(parse_symbol(symbol).with_context(|| format!("bad `--symbol {}`", symbol))?);
    }

    let limit = match m.value_of("limit") {
        Some(limit) => Some(limit.parse().context("bad `--limit`")?),
        None => None,
    };

    Ok(Opts {
        pid,
        python,
        target,
        module,
        symbols,
        symbol_files: paths(&m, "symbols"),
        layout_files: paths(&m, "layouts"),
        limit,
    })
}

/// Parse the name of a data model.
fn parse_data_model(model: &str) -> anyhow::Result<Target> {
    Ok(match model {
        "lp64" => Target::lp64(),
        "llp64" => Target::llp64(),
        "ilp32" => Target::ilp32(),
        other => bail!(
            "bad `--data-model` `{}`, expected one of lp64, llp64 or ilp32",
            other
        ),
    })
}

/// Parse a `name=address` symbol.
fn parse_symbol(symbol: &str) -> anyhow::Result<(String, Address)> {
    let mut it = symbol.splitn(2, '=');

    let (name, address) = match (it.next(), it.next()) {
        (Some(name), Some(address)) if !name.is_empty() => (name, address),
        _ => bail!("expected `name=address`"),
    };

    Ok((name.to_string(), address.parse()?))
}

fn paths(m: &clap::ArgMatches<'_>, name: &str) -> Vec<PathBuf> {
    m.values_of(name)
        .into_iter()
        .flatten()
        .map(PathBuf::from)
        .collect()
}

fn app() -> clap::App<'static, 'static> {
    use clap::{App, Arg};

    App::new("pyproxy")
        .version(VERSION)
        .about("Inspects the interpreters of a running python process")
        .arg(
            Arg::with_name("pid")
                .help("The process to inspect.")
                .takes_value(true)
                .required(true)
                .long("pid")
                .short("p"),
        )
        .arg(
            Arg::with_name("python")
                .help("Version of the python interpreter, like `3.7`.")
                .takes_value(true)
                .long("python"),
        )
        .arg(
            Arg::with_name("module")
                .help("Module the interpreter is loaded from, defaults to `python<version>`.")
                .takes_value(true)
                .long("module")
                .short("m"),
        )
        .arg(
            Arg::with_name("symbol")
                .help("Address of a static symbol in the module, like `_PyRuntime=0x7f00ab00`.")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .long("symbol")
                .short("s"),
        )
        .arg(
            Arg::with_name("symbols")
                .help("Load a symbol table from the given JSON file.")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .long("symbols"),
        )
        .arg(
            Arg::with_name("layouts")
                .help("Load struct layouts from the given JSON file, overriding built-in ones.")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .long("layouts"),
        )
        .arg(
            Arg::with_name("limit")
                .help("Give up walking any list after this many elements.")
                .takes_value(true)
                .long("limit"),
        )
        .arg(
            Arg::with_name("data-model")
                .help("Data model of the process: lp64 (64-bit unix), llp64 (64-bit windows) or ilp32. Defaults to the host.")
                .takes_value(true)
                .possible_values(&["lp64", "llp64", "ilp32"])
                .long("data-model"),
        )
}

#[cfg(test)]
mod tests {
    use super::{parse_data_model, parse_symbol};
    use crate::{Address, Target, Width};

    #[test]
    fn test_parse_symbol() {
        assert_eq!(
            ("_PyRuntime".to_string(), Address::new(0x7f00ab00)),
            parse_symbol("_PyRuntime=0x7f00ab00").unwrap()
        );
        assert!(parse_symbol("_PyRuntime").is_err());
        assert!(parse_symbol("=0x10").is_err());
        assert!(parse_symbol("interp_head=zz").is_err());
    }

    #[test]
    fn test_parse_data_model() {
        assert_eq!(Target::lp64(), parse_data_model("lp64").unwrap());
        assert_eq!(Target::ilp32(), parse_data_model("ilp32").unwrap());

        let llp64 = parse_data_model("llp64").unwrap();
        assert_eq!((Width::W64, Width::W32), (llp64.pointer, llp64.long));

        assert!(parse_data_model("64").is_err());
    }
}
