use std::path::Path;

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

pub fn run(file: &Path, json: bool) -> Result<(), String> {
    let scene = super::load_scene(file)?;

    if json {
        let text = scene
            .to_json()
            .map_err(|e| format!("cannot serialize the scene: {e}"))?;
        println!("{text}");
        return Ok(());
    }

    if let Some(model) = scene.model() {
        println!(
            "  {} '{}' {}",
            "Model".bold(),
            model.name,
            format!("({} links, {} nested models)", model.links.len(), model.models.len()).dimmed()
        );
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "World", "Models", "Lights", "Plugins", "Step (s)", "RTF", "Gravity",
    ]);
    for world in scene.worlds() {
        let plugins: Vec<&str> = world.plugins.iter().map(|p| p.name.as_str()).collect();
        table.add_row(vec![
            world.name.clone(),
            world.model_count().to_string(),
            world.lights.len().to_string(),
            if plugins.is_empty() {
                "-".to_string()
            } else {
                plugins.join(", ")
            },
            world.physics.step_size.to_string(),
            world.physics.real_time_factor.to_string(),
            format!(
                "[{}, {}, {}]",
                world.gravity[0], world.gravity[1], world.gravity[2]
            ),
        ]);
    }

    println!("{table}");
    Ok(())
}
