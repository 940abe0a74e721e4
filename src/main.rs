mod cli;
mod config;
mod diag;
mod entry;
mod metadata;
mod modsconfig;
#[cfg(test)]
mod testfs;
mod verse;
mod xml;

use anyhow::Result;

fn main() -> Result<()> {
    cli::run()
}
