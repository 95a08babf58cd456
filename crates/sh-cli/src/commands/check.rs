use std::path::Path;

pub fn run(file: &Path) -> Result<(), String> {
    let scene = super::load_scene(file)?;

    println!("  All checks passed for '{}'.", file.display());
    let worlds = scene.world_count();
    let models = super::model_count(&scene);
    println!(
        "  {} world{}, {} model{}",
        worlds,
        super::plural(worlds),
        models,
        super::plural(models)
    );
    if worlds == 0 && scene.model().is_some() {
        println!("  The file holds a bare model; `simhost run` places it in a default world.");
    }

    Ok(())
}
