//! Dumps the OpenAPI document of the rig telemetry API.
//!
//!   generate_openapi                  print to stdout
//!   generate_openapi --output FILE    write FILE, creating parent directories

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use rig_telemetry::api::handlers::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<()> {
    let target = output_target(std::env::args().skip(1))?;

    let doc = ApiDoc::openapi();
    let json = doc.to_pretty_json().context("serialising OpenAPI document")?;

    match target {
        Some(path) => {
            write_document(&path, &json)?;
            eprintln!("{} paths written to {}", doc.paths.paths.len(), path.display());
        }
        None => {
            let mut out = io::stdout().lock();
            out.write_all(json.as_bytes()).context("writing to stdout")?;
            out.write_all(b"\n").context("writing to stdout")?;
        }
    }

    Ok(())
}

fn output_target(mut args: impl Iterator<Item = String>) -> Result<Option<PathBuf>> {
    let mut target = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--output" | "-o" => match args.next() {
                Some(path) => target = Some(PathBuf::from(path)),
                None => bail!("{arg} needs a file path"),
            },
            other => bail!("unexpected argument `{other}`"),
        }
    }
    Ok(target)
}

fn write_document(path: &Path, json: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}
