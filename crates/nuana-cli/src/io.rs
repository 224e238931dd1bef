//! JSON Lines input/output.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Read one value per non-empty line, stopping after `limit` values.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path, limit: Option<u64>) -> Result<Vec<T>> {
    let file = std::fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut out = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        if limit.is_some_and(|n| out.len() as u64 >= n) {
            tracing::info!(limit = ?limit, "max_events reached");
            break;
        }
        let line = line.with_context(|| format!("{}:{}: read failed", path.display(), lineno + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid JSON", path.display(), lineno + 1))?;
        out.push(value);
    }
    Ok(out)
}

/// Write one value per line to `output`, or stdout.
pub fn write_jsonl<'a, T, I>(output: Option<&PathBuf>, values: I) -> Result<()>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(
            std::fs::File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut w = BufWriter::new(sink);
    for value in values {
        serde_json::to_writer(&mut w, value)?;
        w.write_all(b"\n")?;
    }
    w.flush()?;
    Ok(())
}

/// Pretty JSON to `output`, or stdout.
pub fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
