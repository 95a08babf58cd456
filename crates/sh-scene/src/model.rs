use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{SceneError, SceneResult};
use crate::value::ParamValue;

/// Position and orientation relative to the parent frame.
///
/// Orientation is stored as roll/pitch/yaw in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// Translation `[x, y, z]` in metres.
    pub position: [f64; 3],
    /// Rotation `[roll, pitch, yaw]` in radians.
    pub rotation: [f64; 3],
}

impl Pose {
    /// Build a pose from six numbers `x y z roll pitch yaw`.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [x, y, z, roll, pitch, yaw] => Some(Self {
                position: [*x, *y, *z],
                rotation: [*roll, *pitch, *yaw],
            }),
            _ => None,
        }
    }
}

/// A rigid body inside a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDesc {
    /// Link name, unique within its model.
    pub name: String,
    /// Mass in kilograms.
    pub mass: f64,
    /// Pose relative to the owning model.
    pub pose: Pose,
    /// Properties the loader did not interpret.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ParamValue>,
}

impl LinkDesc {
    /// Create a link with unit mass at the model origin.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mass: 1.0,
            pose: Pose::default(),
            properties: BTreeMap::new(),
        }
    }

    /// Check the link's physical values.
    pub fn validate(&self, scope: &str) -> SceneResult<()> {
        if !self.mass.is_finite() || self.mass < 0.0 {
            return Err(SceneError::InvalidValue {
                what: "mass",
                scope: format!("{scope}, link \"{}\"", self.name),
                reason: format!("expected a non-negative number, got {}", self.mass),
            });
        }
        Ok(())
    }
}

/// A light source placed directly in a world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightDesc {
    /// Light name, unique within its world.
    pub name: String,
    /// Light type: "directional", "point" or "spot".
    pub kind: String,
    /// Pose relative to the world.
    pub pose: Pose,
    /// Properties the loader did not interpret.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ParamValue>,
}

impl LightDesc {
    /// Create a directional light at the origin.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: "directional".to_string(),
            pose: Pose::default(),
            properties: BTreeMap::new(),
        }
    }
}

/// A request to attach an extension module (system) to a world.
///
/// The name selects a constructor in the runner's system registry; the
/// parameters are handed to that constructor unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDesc {
    /// Registered system name, e.g. "record".
    pub name: String,
    /// Parameters for the system constructor.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, ParamValue>,
}

impl PluginDesc {
    /// Create a plugin request with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter, replacing any earlier value for the same key.
    pub fn with_param(mut self, key: impl Into<String>, value: ParamValue) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// A model: a named tree of links and nested models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDesc {
    /// Model name, unique among its siblings.
    pub name: String,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Static models are never moved by physics.
    #[serde(default)]
    pub is_static: bool,
    /// Pose relative to the parent frame.
    #[serde(default)]
    pub pose: Pose,
    /// Where the model was loaded from, if it came from an include.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Rigid bodies of this model.
    #[serde(default)]
    pub links: Vec<LinkDesc>,
    /// Nested child models.
    #[serde(default)]
    pub models: Vec<ModelDesc>,
    /// Systems attached through this model.
    #[serde(default)]
    pub plugins: Vec<PluginDesc>,
    /// Properties the loader did not interpret.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ParamValue>,
}

impl ModelDesc {
    /// Create an empty, non-static model at the origin.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            is_static: false,
            pose: Pose::default(),
            source: None,
            links: Vec::new(),
            models: Vec::new(),
            plugins: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Add a link. Fails if a link with the same name exists.
    pub fn add_link(&mut self, link: LinkDesc) -> SceneResult<()> {
        if self.link_by_name(&link.name).is_some() {
            return Err(SceneError::DuplicateName {
                kind: "link",
                name: link.name,
                scope: format!("model \"{}\"", self.name),
            });
        }
        self.links.push(link);
        Ok(())
    }

    /// Add a nested model. Fails if a child with the same name exists.
    pub fn add_model(&mut self, model: ModelDesc) -> SceneResult<()> {
        if self.model_by_name(&model.name).is_some() {
            return Err(SceneError::DuplicateName {
                kind: "model",
                name: model.name,
                scope: format!("model \"{}\"", self.name),
            });
        }
        self.models.push(model);
        Ok(())
    }

    /// Find a link by exact name.
    pub fn link_by_name(&self, name: &str) -> Option<&LinkDesc> {
        self.links.iter().find(|l| l.name == name)
    }

    /// Find a direct child model by exact name.
    pub fn model_by_name(&self, name: &str) -> Option<&ModelDesc> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Number of scene elements in this subtree: the model itself, its links
    /// and every nested model with its links.
    pub fn element_count(&self) -> usize {
        1 + self.links.len() + self.models.iter().map(ModelDesc::element_count).sum::<usize>()
    }

    /// Collect every validation problem in this subtree.
    pub fn validate(&self, scope: &str, errors: &mut Vec<SceneError>) {
        let here = format!("{scope}, model \"{}\"", self.name);
        if self.name.is_empty() {
            errors.push(SceneError::MissingName { kind: "model" });
        }

        let mut seen = std::collections::HashSet::new();
        for link in &self.links {
            if !seen.insert(link.name.as_str()) {
                errors.push(SceneError::DuplicateName {
                    kind: "link",
                    name: link.name.clone(),
                    scope: here.clone(),
                });
            }
            if let Err(e) = link.validate(&here) {
                errors.push(e);
            }
        }

        let mut seen = std::collections::HashSet::new();
        for child in &self.models {
            if !seen.insert(child.name.as_str()) {
                errors.push(SceneError::DuplicateName {
                    kind: "model",
                    name: child.name.clone(),
                    scope: here.clone(),
                });
            }
            child.validate(&here, errors);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_requires_six_values() {
        assert!(Pose::from_slice(&[1.0, 2.0, 3.0]).is_none());
        let pose = Pose::from_slice(&[1.0, 2.0, 3.0, 0.0, 0.0, 1.5]).unwrap();
        assert_eq!(pose.position, [1.0, 2.0, 3.0]);
        assert_eq!(pose.rotation[2], 1.5);
    }

    #[test]
    fn duplicate_link_rejected() {
        let mut model = ModelDesc::new("box");
        model.add_link(LinkDesc::new("body")).unwrap();
        let err = model.add_link(LinkDesc::new("body")).unwrap_err();
        assert!(matches!(err, SceneError::DuplicateName { kind: "link", .. }));
    }

    #[test]
    fn element_count_is_recursive() {
        let mut arm = ModelDesc::new("arm");
        arm.add_link(LinkDesc::new("upper")).unwrap();
        arm.add_link(LinkDesc::new("lower")).unwrap();

        let mut robot = ModelDesc::new("robot");
        robot.add_link(LinkDesc::new("base")).unwrap();
        robot.add_model(arm).unwrap();

        // robot + base + arm + upper + lower
        assert_eq!(robot.element_count(), 5);
    }

    #[test]
    fn negative_mass_is_reported() {
        let mut model = ModelDesc::new("box");
        let mut link = LinkDesc::new("body");
        link.mass = -2.0;
        model.links.push(link);

        let mut errors = Vec::new();
        model.validate("world \"w\"", &mut errors);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("mass"));
    }
}
