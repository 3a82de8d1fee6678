use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use mes_algo::BendersConfig;

pub fn handle(out: Option<&Path>) -> Result<()> {
    let text = BendersConfig::default().to_toml_string()?;
    match out {
        Some(path) => {
            fs::write(path, &text).with_context(|| format!("writing {}", path.display()))?;
            println!("Default configuration written to {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}
