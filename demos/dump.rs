use std::{env, process};

use anyhow::Context;
use jfif_markers::{ByteSource, FileSource, Options};

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_module("jfif_markers", log::LevelFilter::Debug)
        .parse_default_env()
        .init();

    let args = env::args().skip(1).collect::<Vec<_>>();
    let (path, options) = match &*args {
        [path] => (path, Options::new()),
        [flag, path] if flag == "--lenient" => (
            path,
            Options::new()
                .require_scan(false)
                .allow_trailing_data(true),
        ),
        _ => {
            eprintln!("usage: dump [--lenient] <file.jpg>");
            process::exit(1);
        }
    };

    let jpeg = FileSource::new(path).load()?;
    let document = jfif_markers::parse_with(&jpeg, &options)
        .with_context(|| format!("failed to parse '{path}'"))?;
    print!("{document}");

    Ok(())
}
