use std::path::PathBuf;
use std::time::Duration;

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use sh_server::{Server, ServerConfig};

/// Options of `simhost run`.
pub struct RunOptions {
    pub file: Option<PathBuf>,
    pub string: Option<String>,
    pub iterations: u64,
    pub paused: bool,
    pub period_ms: Option<u64>,
    pub record: bool,
    pub record_path: Option<PathBuf>,
    pub cache: Option<PathBuf>,
    pub resource_paths: Vec<PathBuf>,
    pub seed: u64,
}

impl RunOptions {
    fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new().with_seed(self.seed);

        if let Some(text) = &self.string {
            config = config.with_scene_string(text.clone());
        } else if let Some(file) = &self.file {
            config = config.with_scene_file(file);
        }
        if let Some(ms) = self.period_ms {
            config = config.with_update_period(Duration::from_millis(ms));
        }
        if let Some(dir) = &self.cache {
            config = config.with_resource_cache(dir);
        }
        for dir in &self.resource_paths {
            config = config.with_resource_path(dir);
        }
        if self.record {
            // Pin the directory so the summary can name it.
            let dir = self
                .record_path
                .clone()
                .unwrap_or_else(|| config.log_record_path());
            config = config.with_log_record(true).with_log_record_path(dir);
        }
        config
    }
}

pub fn run(opts: &RunOptions) -> Result<(), String> {
    let config = opts.server_config();
    let server = Server::new(&config);

    if let Some(e) = server.init_error() {
        eprintln!("{:?}", miette::Report::new(e.clone()));
        return Err("the server failed to initialize".into());
    }

    tracing::info!(iterations = opts.iterations, "starting");
    if !server.run(true, opts.iterations, opts.paused) {
        return Err("the server refused to run".into());
    }

    let scene_label = match (&opts.string, &opts.file) {
        (Some(_), _) => "inline scene".to_string(),
        (None, Some(file)) => file.display().to_string(),
        (None, None) => "default world".to_string(),
    };
    println!(
        "  {} {} {}",
        "Ran".bold(),
        scene_label,
        format!("({} iterations, seed={})", opts.iterations, opts.seed).dimmed()
    );

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["World", "Iterations", "Entities", "Systems", "Paused"]);
    for index in 0..server.world_count() {
        table.add_row(vec![
            server.world_name(index).unwrap_or_default(),
            display(server.iteration_count(index)),
            display(server.entity_count(index)),
            display(server.system_count(index)),
            display(server.paused(index)),
        ]);
    }
    println!("{table}");

    if config.use_log_record() {
        println!("  Recorded to {}", config.log_record_path().display());
    }

    server.stop();
    Ok(())
}

fn display<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
