use anyhow::Result;

use crate::Context;

/// Report whether the package directory reflects the configuration.
pub async fn status(ctx: &Context) -> Result<()> {
    let target = &ctx.options.package_directory;
    let current = ctx.reconciler().is_current(&ctx.options).await?;

    println!("Config:    {}", ctx.config_path.display());
    println!("Packages:  {}", target.display());
    println!("Cache:     {}", ctx.cache_dir.display());
    println!(
        "State:     {}",
        if current { "up to date" } else { "out of date" }
    );

    let mut installed = Vec::new();
    match tokio::fs::read_dir(target).await {
        Ok(mut entries) => {
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !name.starts_with('.') && entry.file_type().await?.is_dir() {
                    installed.push(name);
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    installed.sort();

    println!("Installed: {}", installed.len());
    for name in &installed {
        println!("  {name}");
    }
    Ok(())
}
