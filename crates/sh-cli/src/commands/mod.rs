pub mod check;
pub mod info;
pub mod run;
pub mod show;

use std::fs;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use sh_scene::SceneRoot;
use sh_sdl::{LoadResult, Tally};
use sh_sdl::diagnostics::render_diagnostics;
use sh_server::{AssetBridge, OfflineClient, ServerConfig};

/// Load a scene file the way the server would, minus network fetches, and
/// print its diagnostics. Returns the scene if there are no errors.
fn load_scene(file: &Path) -> Result<SceneRoot, String> {
    let config = ServerConfig::new();
    let bridge = AssetBridge::new(
        config.cache_dir(),
        config.resource_paths(),
        Arc::new(OfflineClient),
    );
    let result = sh_sdl::load_file(file, &bridge.parser_config());
    print_diagnostics(&result, file);

    if result.has_errors() {
        Err("the scene has errors".into())
    } else {
        Ok(result.root)
    }
}

/// Print diagnostics to stderr using ariadne.
fn print_diagnostics(result: &LoadResult, file: &Path) {
    if result.diagnostics.is_empty() {
        return;
    }

    let source = fs::read_to_string(file).unwrap_or_default();
    let filename = file.display().to_string();
    let color = std::io::stderr().is_terminal();
    eprint!(
        "{}",
        render_diagnostics(&source, &filename, &result.diagnostics, color)
    );
    eprintln!("  {}", Tally::of(&result.diagnostics));
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// Models across every world, plus a bare top-level model.
fn model_count(scene: &SceneRoot) -> usize {
    scene.worlds().iter().map(|w| w.model_count()).sum::<usize>()
        + usize::from(scene.model().is_some())
}
