use anyhow::Result;
use feedflow_core::layout::{PackageDirectory, requested_directories};
use tokio_util::sync::CancellationToken;

use crate::Context;

/// Resolve the configured packages and print what would be installed.
pub async fn plan(ctx: &Context) -> Result<()> {
    let installer = ctx.installer();
    let Some(set) = installer.plan(&ctx.options, &CancellationToken::new()).await? else {
        println!("Nothing to install.");
        return Ok(());
    };

    let target = &ctx.options.package_directory;
    for package in set.packages() {
        let layout = PackageDirectory::new(target, &package.identity, &ctx.options.platform)?;
        let marker = if layout.path.exists() { "=" } else { "+" };
        println!("{marker} {}", package.identity);
    }
    println!("{} package(s) in the install set.", set.len());

    let directories = requested_directories(&set, &ctx.options)?;
    if !directories.is_empty() {
        println!();
        println!("Package directories:");
        for dir in &directories {
            println!("  {}", dir.name);
            println!("    content: {}", dir.content_path.display());
            println!("    lib:     {}", dir.lib_path.display());
        }
    }
    Ok(())
}
