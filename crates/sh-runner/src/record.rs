use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sh_scene::{ParamValue, PluginDesc};

use crate::error::{SimError, SimResult};
use crate::system::{System, UpdateContext};

/// File written inside the record directory.
pub const RECORD_FILE_NAME: &str = "state.jsonl";

#[derive(Debug, Serialize)]
struct RecordLine<'a> {
    world: &'a str,
    iteration: u64,
    sim_time: f64,
    entities: usize,
    recorded_at: DateTime<Utc>,
}

/// Writes one JSON line per non-paused step to `<dir>/state.jsonl`.
#[derive(Debug)]
pub struct RecordSystem {
    dir: PathBuf,
    writer: Option<BufWriter<File>>,
    lines: u64,
}

impl RecordSystem {
    /// Plugin name that selects this system in scene files.
    pub const PLUGIN_NAME: &'static str = "record";

    /// Record into `dir`. Nothing touches the disk until the first run.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            writer: None,
            lines: 0,
        }
    }

    /// Build from a `plugin "record" { path "..." }` declaration.
    pub fn from_plugin(plugin: &PluginDesc) -> SimResult<Self> {
        match plugin.params.get("path") {
            Some(ParamValue::String(path)) => Ok(Self::new(path)),
            Some(other) => Err(SimError::InvalidParam {
                plugin: plugin.name.clone(),
                param: "path".into(),
                reason: format!("expected a string, got {other}"),
            }),
            None => Err(SimError::InvalidParam {
                plugin: plugin.name.clone(),
                param: "path".into(),
                reason: "missing".into(),
            }),
        }
    }

    /// Directory being recorded into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the record file.
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(RECORD_FILE_NAME)
    }

    /// Lines written so far.
    pub fn lines_written(&self) -> u64 {
        self.lines
    }
}

impl System for RecordSystem {
    fn name(&self) -> &str {
        Self::PLUGIN_NAME
    }

    fn configure(&mut self, ctx: &mut UpdateContext<'_>) -> SimResult<()> {
        fs::create_dir_all(&self.dir)?;
        let file = File::create(self.file_path())?;
        self.writer = Some(BufWriter::new(file));
        tracing::info!(world = ctx.world_name, path = %self.file_path().display(), "recording");
        Ok(())
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> SimResult<()> {
        if ctx.info.paused {
            return Ok(());
        }
        let Some(writer) = self.writer.as_mut() else {
            return Err(SimError::SystemError("record file is not open".into()));
        };

        let line = RecordLine {
            world: ctx.world_name,
            iteration: ctx.info.iteration,
            sim_time: ctx.info.sim_time.as_secs_f64(),
            entities: ctx.entities.len(),
            recorded_at: Utc::now(),
        };
        serde_json::to_writer(&mut *writer, &line)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        self.lines += 1;
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityStore;
    use crate::system::UpdateInfo;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::time::Duration;

    fn info(iteration: u64, paused: bool) -> UpdateInfo {
        UpdateInfo {
            iteration,
            sim_time: Duration::from_millis(iteration),
            dt: Duration::from_millis(1),
            paused,
        }
    }

    #[test]
    fn from_plugin_requires_string_path() {
        let missing = RecordSystem::from_plugin(&PluginDesc::new("record")).unwrap_err();
        assert!(missing.to_string().contains("missing"));

        let wrong = PluginDesc::new("record").with_param("path", ParamValue::Integer(3));
        assert!(RecordSystem::from_plugin(&wrong).is_err());
    }

    #[test]
    fn writes_one_line_per_unpaused_step() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("nested/rec");
        let mut system = RecordSystem::new(&out);
        let entities = EntityStore::new();
        let mut rng = StdRng::seed_from_u64(0);

        let mut ctx = UpdateContext::new(info(0, false), "w", &entities, &mut rng);
        system.configure(&mut ctx).unwrap();
        for (iteration, paused) in [(1, false), (1, true), (2, false)] {
            let mut ctx = UpdateContext::new(info(iteration, paused), "w", &entities, &mut rng);
            system.update(&mut ctx).unwrap();
        }

        assert_eq!(system.lines_written(), 2);
        let text = fs::read_to_string(out.join(RECORD_FILE_NAME)).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["iteration"], 2);
        assert_eq!(lines[1]["world"], "w");
    }

    #[test]
    fn update_before_configure_fails() {
        let mut system = RecordSystem::new("/nonexistent");
        let entities = EntityStore::new();
        let mut rng = StdRng::seed_from_u64(0);
        let mut ctx = UpdateContext::new(info(1, false), "w", &entities, &mut rng);
        assert!(system.update(&mut ctx).is_err());
    }
}
