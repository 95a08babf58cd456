use colored::Colorize;
use sh_server::{DEFAULT_WORLD, RESOURCE_PATH_ENV, ServerConfig};

pub fn run() -> Result<(), String> {
    let config = ServerConfig::new();

    println!("  {} {}", "simhost".bold(), env!("CARGO_PKG_VERSION"));
    println!("  Asset cache:    {}", config.cache_dir().display());

    let paths = config.resource_paths();
    if paths.is_empty() {
        println!("  Resource paths: {}", format!("(none; set {RESOURCE_PATH_ENV})").dimmed());
    } else {
        println!("  Resource paths:");
        for path in paths {
            println!("    {}", path.display());
        }
    }

    println!();
    println!("  {}", "Default world".bold().underline());
    for line in DEFAULT_WORLD.lines() {
        println!("    {line}");
    }
    Ok(())
}
