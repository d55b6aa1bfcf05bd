//! `deplab version` command.

use clap::Args;
use deplab_core::build_info::BuildInfo;

#[derive(Args, Debug)]
pub struct VersionArgs;

pub async fn execute(_args: VersionArgs) -> Result<(), Box<dyn std::error::Error>> {
    let build = BuildInfo::current();
    println!("{} version {}", build.name, build.version);
    println!("{}", build.url);
    Ok(())
}
