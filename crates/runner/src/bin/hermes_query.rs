//! Inspect a storage directory without a settings file
//!
//! `hermes-query <csv|sqlite|columnar> <DIR> <CONTAINER> [TABLE] [--limit N]`

use std::path::PathBuf;

use anyhow::{Context, bail};
use hermes_runner::{DEFAULT_QUERY_LIMIT, run_query};
use hermes_storage::BackendKind;

fn print_help() {
    eprintln!(
        r#"hermes-query - list or print stored market data

USAGE:
    hermes-query <BACKEND> <DIR> <CONTAINER> [TABLE] [--limit N]

ARGS:
    <BACKEND>    csv, sqlite or columnar
    <DIR>        Backend directory (e.g. mytrade/db/sqlite)
    <CONTAINER>  Exchange container (e.g. SHFE); ignored by csv
    [TABLE]      Instrument to print; tables are listed when omitted

OPTIONS:
    --limit <N>  Records to print, newest last (default: 10)
    --help       Print this help message
"#
    );
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut positional = Vec::new();
    let mut limit = DEFAULT_QUERY_LIMIT;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--limit" => {
                i += 1;
                limit = args
                    .get(i)
                    .context("--limit requires a value")?
                    .parse()
                    .context("--limit expects a number")?;
            }
            other if other.starts_with("--") => {
                print_help();
                bail!("Unknown option: {other}");
            }
            value => positional.push(value.to_string()),
        }
        i += 1;
    }

    if !(3..=4).contains(&positional.len()) {
        print_help();
        bail!("expected BACKEND DIR CONTAINER [TABLE], got {} arguments", positional.len());
    }
    let kind: BackendKind = positional[0].parse()?;
    let dir = PathBuf::from(&positional[1]);
    let table = positional.get(3).map(String::as_str);

    let mut stdout = std::io::stdout().lock();
    run_query(kind, &dir, &positional[2], table, limit, &mut stdout)?;
    Ok(())
}
