use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SceneError, SceneResult};
use crate::model::{LightDesc, ModelDesc, PluginDesc};
use crate::value::ParamValue;

/// Physics stepping parameters of a world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Physics {
    /// Simulated seconds advanced by one step.
    pub step_size: f64,
    /// Target ratio of simulated time to wall-clock time. Zero runs unpaced.
    pub real_time_factor: f64,
}

impl Default for Physics {
    fn default() -> Self {
        Self {
            step_size: 0.001,
            real_time_factor: 1.0,
        }
    }
}

impl Physics {
    /// Simulated time advanced by one step. Saturates at [`Duration::MAX`]
    /// for values [`Physics::validate`] rejects.
    pub fn step_duration(&self) -> Duration {
        to_duration(self.step_size)
    }

    /// Wall-clock period between steps implied by the real-time factor.
    ///
    /// A non-positive real-time factor means "as fast as possible".
    pub fn update_period(&self) -> Duration {
        if self.real_time_factor <= 0.0 {
            return Duration::ZERO;
        }
        to_duration(self.step_size / self.real_time_factor)
    }

    /// Check that the stepping parameters are usable.
    pub fn validate(&self, scope: &str) -> SceneResult<()> {
        if !self.step_size.is_finite() || self.step_size <= 0.0 {
            return Err(SceneError::InvalidValue {
                what: "step_size",
                scope: scope.to_string(),
                reason: format!("expected a positive number, got {}", self.step_size),
            });
        }
        if !self.real_time_factor.is_finite() || self.real_time_factor < 0.0 {
            return Err(SceneError::InvalidValue {
                what: "real_time_factor",
                scope: scope.to_string(),
                reason: format!(
                    "expected a non-negative number, got {}",
                    self.real_time_factor
                ),
            });
        }
        if Duration::try_from_secs_f64(self.step_size).is_err() {
            return Err(SceneError::InvalidValue {
                what: "step_size",
                scope: scope.to_string(),
                reason: format!("{} seconds is too large", self.step_size),
            });
        }
        if self.real_time_factor > 0.0
            && Duration::try_from_secs_f64(self.step_size / self.real_time_factor).is_err()
        {
            return Err(SceneError::InvalidValue {
                what: "real_time_factor",
                scope: scope.to_string(),
                reason: format!(
                    "{} is too small for a step size of {}",
                    self.real_time_factor, self.step_size
                ),
            });
        }
        Ok(())
    }
}

/// Seconds to a duration: NaN and negatives become zero, overflow saturates.
fn to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// One independently steppable world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldDesc {
    /// World name.
    pub name: String,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Gravity vector in m/s².
    pub gravity: [f64; 3],
    /// Stepping parameters.
    pub physics: Physics,
    /// Top-level models, in declaration order.
    #[serde(default)]
    pub models: Vec<ModelDesc>,
    /// Lights placed in the world.
    #[serde(default)]
    pub lights: Vec<LightDesc>,
    /// Systems to attach when the world is instantiated.
    #[serde(default)]
    pub plugins: Vec<PluginDesc>,
    /// Properties the loader did not interpret.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ParamValue>,
}

impl WorldDesc {
    /// Create an empty world with default physics and earth gravity.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            gravity: [0.0, 0.0, -9.8],
            physics: Physics::default(),
            models: Vec::new(),
            lights: Vec::new(),
            plugins: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Insert a model as a direct child of this world.
    ///
    /// This is the composition primitive used when a bare model is wrapped
    /// in a world. Fails if a top-level model with the same name exists.
    pub fn add_model(&mut self, model: ModelDesc) -> SceneResult<()> {
        if self.model_by_name(&model.name).is_some() {
            return Err(SceneError::DuplicateName {
                kind: "model",
                name: model.name,
                scope: self.scope(),
            });
        }
        self.models.push(model);
        Ok(())
    }

    /// Insert a light. Fails if a light with the same name exists.
    pub fn add_light(&mut self, light: LightDesc) -> SceneResult<()> {
        if self.lights.iter().any(|l| l.name == light.name) {
            return Err(SceneError::DuplicateName {
                kind: "light",
                name: light.name,
                scope: self.scope(),
            });
        }
        self.lights.push(light);
        Ok(())
    }

    /// Request a system for this world.
    pub fn add_plugin(&mut self, plugin: PluginDesc) {
        self.plugins.push(plugin);
    }

    /// Find a top-level model by exact name.
    pub fn model_by_name(&self, name: &str) -> Option<&ModelDesc> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Number of top-level models.
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Whether a plugin with the given name is requested.
    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p.name == name)
    }

    /// Collect every validation problem in this world.
    pub fn validate(&self, errors: &mut Vec<SceneError>) {
        let scope = self.scope();
        if self.name.is_empty() {
            errors.push(SceneError::MissingName { kind: "world" });
        }
        if let Err(e) = self.physics.validate(&scope) {
            errors.push(e);
        }

        let mut seen = std::collections::HashSet::new();
        for model in &self.models {
            if !seen.insert(model.name.as_str()) {
                errors.push(SceneError::DuplicateName {
                    kind: "model",
                    name: model.name.clone(),
                    scope: scope.clone(),
                });
            }
            model.validate(&scope, errors);
        }

        let mut seen = std::collections::HashSet::new();
        for light in &self.lights {
            if !seen.insert(light.name.as_str()) {
                errors.push(SceneError::DuplicateName {
                    kind: "light",
                    name: light.name.clone(),
                    scope: scope.clone(),
                });
            }
        }
    }

    fn scope(&self) -> String {
        format!("world \"{}\"", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_physics_runs_in_real_time() {
        let physics = Physics::default();
        assert_eq!(physics.step_duration(), Duration::from_millis(1));
        assert_eq!(physics.update_period(), Duration::from_millis(1));
    }

    #[test]
    fn zero_real_time_factor_is_unpaced() {
        let physics = Physics {
            step_size: 0.01,
            real_time_factor: 0.0,
        };
        assert_eq!(physics.update_period(), Duration::ZERO);
        assert!(physics.validate("world \"w\"").is_ok());
    }

    #[test]
    fn faster_than_real_time_shortens_period() {
        let physics = Physics {
            step_size: 0.004,
            real_time_factor: 2.0,
        };
        assert_eq!(physics.update_period(), Duration::from_millis(2));
    }

    #[test]
    fn oversized_durations_saturate_and_fail_validation() {
        let tiny_rtf = Physics {
            step_size: 0.001,
            real_time_factor: 1e-30,
        };
        assert_eq!(tiny_rtf.update_period(), Duration::MAX);
        let err = tiny_rtf.validate("world \"w\"").unwrap_err();
        assert!(err.to_string().contains("real_time_factor"));

        let huge_step = Physics {
            step_size: 1e300,
            real_time_factor: 1.0,
        };
        assert_eq!(huge_step.step_duration(), Duration::MAX);
        assert!(huge_step.validate("world \"w\"").is_err());

        let infinite = Physics {
            step_size: f64::INFINITY,
            real_time_factor: 1.0,
        };
        assert_eq!(infinite.step_duration(), Duration::MAX);
        assert!(infinite.validate("world \"w\"").is_err());

        let nan = Physics {
            step_size: f64::NAN,
            real_time_factor: 1.0,
        };
        assert_eq!(nan.step_duration(), Duration::ZERO);
    }

    #[test]
    fn add_model_rejects_duplicates() {
        let mut world = WorldDesc::new("default");
        world.add_model(ModelDesc::new("box")).unwrap();
        assert!(world.add_model(ModelDesc::new("box")).is_err());
        assert_eq!(world.model_count(), 1);
    }

    #[test]
    fn validate_reports_bad_step_size() {
        let mut world = WorldDesc::new("default");
        world.physics.step_size = 0.0;
        let mut errors = Vec::new();
        world.validate(&mut errors);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            SceneError::InvalidValue {
                what: "step_size",
                ..
            }
        ));
    }
}
