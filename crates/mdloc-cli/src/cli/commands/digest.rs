//! `mdloc digest` – print the content address of a URL.

use anyhow::Result;
use mdloc_core::naming;

pub fn run_digest(url: &str) -> Result<()> {
    println!("{}  {}", naming::url_digest(url), url);
    Ok(())
}
