use std::path::{Path, PathBuf};

use sh_scene::{
    LightDesc, LinkDesc, ModelDesc, ParamValue, Physics, PluginDesc, Pose, SceneRoot, WorldDesc,
};

use crate::ast::*;
use crate::config::ParserConfig;
use crate::diagnostics::Diagnostic;

/// Result of compiling an AST into a scene graph.
pub struct CompileResult {
    /// The compiled scene (may be partial if errors occurred).
    pub root: SceneRoot,
    /// Errors and warnings produced during compilation.
    pub diagnostics: Vec<Diagnostic>,
}

/// Compile a parsed file into a [`SceneRoot`].
///
/// `base_dir` is the directory of the file being compiled; relative
/// `include` targets are looked up there first.
pub fn compile(ast: &SourceFile, base_dir: Option<&Path>, config: &ParserConfig) -> CompileResult {
    compile_at_depth(ast, base_dir, config, 0)
}

pub(crate) fn compile_at_depth(
    ast: &SourceFile,
    base_dir: Option<&Path>,
    config: &ParserConfig,
    depth: usize,
) -> CompileResult {
    let mut compiler = Compiler {
        config,
        base_dir,
        depth,
        diagnostics: Vec::new(),
    };
    let root = compiler.compile(ast);
    CompileResult {
        root,
        diagnostics: compiler.diagnostics,
    }
}

struct Compiler<'a> {
    config: &'a ParserConfig,
    base_dir: Option<&'a Path>,
    depth: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Compiler<'_> {
    fn compile(&mut self, ast: &SourceFile) -> SceneRoot {
        let mut root = SceneRoot::new();

        for decl in &ast.elements {
            let element = &decl.node;
            match element.kind.node.as_str() {
                "world" => {
                    if root.model().is_some() {
                        self.mixed_root(&decl.span);
                        continue;
                    }
                    let Some(world) = self.compile_world(element) else {
                        continue;
                    };
                    if root.worlds().iter().any(|w| w.name == world.name) {
                        self.error(
                            decl.span.clone(),
                            format!("duplicate world name \"{}\"", world.name),
                        );
                        continue;
                    }
                    root.add_world(world);
                }
                "model" => {
                    if root.world_count() > 0 {
                        self.mixed_root(&decl.span);
                        continue;
                    }
                    if root.model().is_some() {
                        self.error(
                            decl.span.clone(),
                            "only one top-level model is allowed per file",
                        );
                        continue;
                    }
                    if let Some(model) = self.compile_model(element) {
                        root.set_model(model);
                    }
                }
                other => self.diagnostics.push(
                    Diagnostic::error(
                        element.kind.span.clone(),
                        format!("unexpected `{other}` at top level"),
                    )
                    .with_label("expected `world` or `model`"),
                ),
            }
        }

        root
    }

    // -- Elements --

    fn compile_world(&mut self, element: &Element) -> Option<WorldDesc> {
        let name = self.require_name(element)?;
        let scope = format!("world \"{name}\"");
        let mut world = WorldDesc::new(name);

        for stmt in &element.body {
            match &stmt.node {
                Statement::Description(text) => world.description = text.clone(),
                Statement::Property(prop) => match prop.key.node.as_str() {
                    "gravity" => {
                        if let Some(g) = self.vector3(prop) {
                            world.gravity = g;
                        }
                    }
                    "include" => {
                        if let Some(model) = self.include_property(prop)
                            && let Err(e) = world.add_model(model)
                        {
                            self.error(stmt.span.clone(), e.to_string());
                        }
                    }
                    key => {
                        world
                            .properties
                            .insert(key.to_string(), to_param(&prop.value.node));
                    }
                },
                Statement::Element(inner) => match inner.kind.node.as_str() {
                    "model" | "include" => {
                        let model = if inner.kind.node == "model" {
                            self.compile_model(inner)
                        } else {
                            self.compile_include(inner)
                        };
                        if let Some(model) = model
                            && let Err(e) = world.add_model(model)
                        {
                            self.error(stmt.span.clone(), e.to_string());
                        }
                    }
                    "light" => {
                        if let Some(light) = self.compile_light(inner)
                            && let Err(e) = world.add_light(light)
                        {
                            self.error(stmt.span.clone(), e.to_string());
                        }
                    }
                    "plugin" => {
                        if let Some(plugin) = self.compile_plugin(inner) {
                            world.add_plugin(plugin);
                        }
                    }
                    "physics" => world.physics = self.compile_physics(inner, &scope, &stmt.span),
                    _ => self.unexpected_block(inner, "world"),
                },
            }
        }

        Some(world)
    }

    fn compile_physics(&mut self, element: &Element, scope: &str, span: &Span) -> Physics {
        if let Some(name) = &element.name {
            self.diagnostics.push(Diagnostic::warning(
                name.span.clone(),
                "physics blocks do not take a name",
            ));
        }

        let mut physics = Physics::default();
        for stmt in &element.body {
            match &stmt.node {
                Statement::Property(prop) => match prop.key.node.as_str() {
                    "step_size" => {
                        if let Some(v) = self.number(prop) {
                            physics.step_size = v;
                        }
                    }
                    "real_time_factor" => {
                        if let Some(v) = self.number(prop) {
                            physics.real_time_factor = v;
                        }
                    }
                    other => self.diagnostics.push(Diagnostic::warning(
                        prop.key.span.clone(),
                        format!("unknown physics property `{other}`"),
                    )),
                },
                Statement::Element(inner) => self.unexpected_block(inner, "physics"),
                Statement::Description(_) => {}
            }
        }

        if let Err(e) = physics.validate(scope) {
            self.error(span.clone(), e.to_string());
        }
        physics
    }

    fn compile_model(&mut self, element: &Element) -> Option<ModelDesc> {
        let name = self.require_name(element)?;
        let scope = format!("model \"{name}\"");
        let mut model = ModelDesc::new(name);

        for stmt in &element.body {
            match &stmt.node {
                Statement::Description(text) => model.description = text.clone(),
                Statement::Property(prop) => match prop.key.node.as_str() {
                    "static" => {
                        if let Some(b) = self.boolean(prop) {
                            model.is_static = b;
                        }
                    }
                    "pose" => {
                        if let Some(pose) = self.pose(prop) {
                            model.pose = pose;
                        }
                    }
                    "include" => {
                        if let Some(child) = self.include_property(prop)
                            && let Err(e) = model.add_model(child)
                        {
                            self.error(stmt.span.clone(), e.to_string());
                        }
                    }
                    key => {
                        model
                            .properties
                            .insert(key.to_string(), to_param(&prop.value.node));
                    }
                },
                Statement::Element(inner) => match inner.kind.node.as_str() {
                    "model" | "include" => {
                        let child = if inner.kind.node == "model" {
                            self.compile_model(inner)
                        } else {
                            self.compile_include(inner)
                        };
                        if let Some(child) = child
                            && let Err(e) = model.add_model(child)
                        {
                            self.error(stmt.span.clone(), e.to_string());
                        }
                    }
                    "link" => {
                        if let Some(link) = self.compile_link(inner, &scope, &stmt.span)
                            && let Err(e) = model.add_link(link)
                        {
                            self.error(stmt.span.clone(), e.to_string());
                        }
                    }
                    "plugin" => {
                        if let Some(plugin) = self.compile_plugin(inner) {
                            model.plugins.push(plugin);
                        }
                    }
                    _ => self.unexpected_block(inner, "model"),
                },
            }
        }

        Some(model)
    }

    fn compile_link(&mut self, element: &Element, scope: &str, span: &Span) -> Option<LinkDesc> {
        let name = self.require_name(element)?;
        let mut link = LinkDesc::new(name);

        for stmt in &element.body {
            match &stmt.node {
                Statement::Property(prop) => match prop.key.node.as_str() {
                    "mass" => {
                        if let Some(m) = self.number(prop) {
                            link.mass = m;
                        }
                    }
                    "pose" => {
                        if let Some(pose) = self.pose(prop) {
                            link.pose = pose;
                        }
                    }
                    key => {
                        link.properties
                            .insert(key.to_string(), to_param(&prop.value.node));
                    }
                },
                Statement::Element(inner) => self.unexpected_block(inner, "link"),
                Statement::Description(_) => {}
            }
        }

        if let Err(e) = link.validate(scope) {
            self.error(span.clone(), e.to_string());
        }
        Some(link)
    }

    fn compile_light(&mut self, element: &Element) -> Option<LightDesc> {
        let name = self.require_name(element)?;
        let mut light = LightDesc::new(name);

        for stmt in &element.body {
            match &stmt.node {
                Statement::Property(prop) => match prop.key.node.as_str() {
                    "kind" | "type" => {
                        if let Some(kind) = self.text(prop) {
                            light.kind = kind;
                        }
                    }
                    "pose" => {
                        if let Some(pose) = self.pose(prop) {
                            light.pose = pose;
                        }
                    }
                    key => {
                        light
                            .properties
                            .insert(key.to_string(), to_param(&prop.value.node));
                    }
                },
                Statement::Element(inner) => self.unexpected_block(inner, "light"),
                Statement::Description(_) => {}
            }
        }

        Some(light)
    }

    fn compile_plugin(&mut self, element: &Element) -> Option<PluginDesc> {
        let name = self.require_name(element)?;
        let mut plugin = PluginDesc::new(name);
        if let ParamValue::Map(params) = block_params(element) {
            plugin.params = params;
        }
        Some(plugin)
    }

    // -- Includes --

    /// `include "target"` as a plain property.
    fn include_property(&mut self, prop: &Property) -> Option<ModelDesc> {
        let Value::String(target) = &prop.value.node else {
            self.error(
                prop.value.span.clone(),
                "`include` expects a quoted path or URI",
            );
            return None;
        };
        self.load_include(target, &prop.value.span)
    }

    /// `include "target" { name "..." pose [...] static ... }`.
    fn compile_include(&mut self, element: &Element) -> Option<ModelDesc> {
        let Some(target) = &element.name else {
            self.error(
                element.kind.span.clone(),
                "`include` expects a quoted path or URI",
            );
            return None;
        };
        let mut model = self.load_include(&target.node, &target.span)?;

        for stmt in &element.body {
            match &stmt.node {
                Statement::Property(prop) => match prop.key.node.as_str() {
                    "name" => {
                        if let Some(name) = self.text(prop) {
                            model.name = name;
                        }
                    }
                    "pose" => {
                        if let Some(pose) = self.pose(prop) {
                            model.pose = pose;
                        }
                    }
                    "static" => {
                        if let Some(b) = self.boolean(prop) {
                            model.is_static = b;
                        }
                    }
                    other => self.diagnostics.push(Diagnostic::warning(
                        prop.key.span.clone(),
                        format!("unknown include property `{other}`"),
                    )),
                },
                Statement::Element(inner) => self.unexpected_block(inner, "include"),
                Statement::Description(_) => {}
            }
        }

        Some(model)
    }

    fn load_include(&mut self, target: &str, span: &Span) -> Option<ModelDesc> {
        let Some(path) = self.resolve_include(target) else {
            self.diagnostics.push(
                Diagnostic::error(span.clone(), format!("unable to find \"{target}\""))
                    .with_label("not found locally or through the asset lookup"),
            );
            return None;
        };

        if self.depth >= self.config.max_include_depth() {
            self.error(
                span.clone(),
                format!(
                    "includes nested deeper than {} levels (is there an include cycle?)",
                    self.config.max_include_depth()
                ),
            );
            return None;
        }

        tracing::debug!(include = target, path = %path.display(), "loading include");
        let result = crate::load_file_at_depth(&path, self.config, self.depth + 1);
        let failed = result.has_errors();
        self.diagnostics.extend(
            result
                .diagnostics
                .into_iter()
                .map(|diag| diag.included_from(span.clone(), path.clone())),
        );
        if failed {
            return None;
        }

        let mut root = result.root;
        if root.world_count() > 0 {
            self.error(
                span.clone(),
                format!("{} declares a world; only models can be included", path.display()),
            );
            return None;
        }
        let Some(mut model) = root.take_model() else {
            self.error(span.clone(), format!("{} does not declare a model", path.display()));
            return None;
        };
        model.source = Some(target.to_string());
        Some(model)
    }

    /// URIs go through the URI hook. Paths are tried relative to the
    /// including file, then through the file hook. A directory stands for
    /// the model file inside it.
    fn resolve_include(&self, target: &str) -> Option<PathBuf> {
        let found = if target.contains("://") {
            self.config.find_uri(target)
        } else {
            let local = match self.base_dir {
                Some(dir) => dir.join(target),
                None => PathBuf::from(target),
            };
            if local.exists() {
                Some(local)
            } else {
                self.config.find_file(target)
            }
        };

        found.map(|path| {
            if path.is_dir() {
                path.join(crate::MODEL_FILE_NAME)
            } else {
                path
            }
        })
    }

    // -- Value helpers --

    fn require_name(&mut self, element: &Element) -> Option<String> {
        match &element.name {
            Some(name) => Some(name.node.clone()),
            None => {
                self.diagnostics.push(
                    Diagnostic::error(
                        element.kind.span.clone(),
                        format!("{} is missing a name", element.kind.node),
                    )
                    .with_label("add a quoted name after the keyword"),
                );
                None
            }
        }
    }

    fn number(&mut self, prop: &Property) -> Option<f64> {
        let value = prop.value.node.as_number();
        if value.is_none() {
            self.error(
                prop.value.span.clone(),
                format!("`{}` expects a number", prop.key.node),
            );
        }
        value
    }

    fn boolean(&mut self, prop: &Property) -> Option<bool> {
        if let Value::Boolean(b) = prop.value.node {
            return Some(b);
        }
        self.error(
            prop.value.span.clone(),
            format!("`{}` expects true or false", prop.key.node),
        );
        None
    }

    fn text(&mut self, prop: &Property) -> Option<String> {
        let value = prop.value.node.as_text().map(str::to_string);
        if value.is_none() {
            self.error(
                prop.value.span.clone(),
                format!("`{}` expects a name", prop.key.node),
            );
        }
        value
    }

    fn numbers(&mut self, prop: &Property, count: usize) -> Option<Vec<f64>> {
        match prop.value.node.as_numbers() {
            Some(values) if values.len() == count => Some(values),
            _ => {
                self.error(
                    prop.value.span.clone(),
                    format!("`{}` expects a list of {count} numbers", prop.key.node),
                );
                None
            }
        }
    }

    fn vector3(&mut self, prop: &Property) -> Option<[f64; 3]> {
        self.numbers(prop, 3).map(|v| [v[0], v[1], v[2]])
    }

    fn pose(&mut self, prop: &Property) -> Option<Pose> {
        self.numbers(prop, 6).and_then(|v| Pose::from_slice(&v))
    }

    // -- Diagnostics --

    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(span, message));
    }

    fn unexpected_block(&mut self, element: &Element, parent: &str) {
        self.error(
            element.kind.span.clone(),
            format!("unexpected `{}` block in {parent}", element.kind.node),
        );
    }

    fn mixed_root(&mut self, span: &Span) {
        self.error(span.clone(), sh_scene::SceneError::MixedRoot.to_string());
    }
}

fn to_param(value: &Value) -> ParamValue {
    match value {
        Value::String(s) | Value::Identifier(s) => ParamValue::String(s.clone()),
        Value::Integer(n) => ParamValue::Integer(*n),
        Value::Float(f) => ParamValue::Float(*f),
        Value::Boolean(b) => ParamValue::Boolean(*b),
        Value::List(items) => ParamValue::List(items.iter().map(|v| to_param(&v.node)).collect()),
    }
}

/// Properties of a block as a map; nested blocks become nested maps keyed
/// by their name, or by their kind when unnamed.
fn block_params(element: &Element) -> ParamValue {
    let mut params = std::collections::BTreeMap::new();
    for stmt in &element.body {
        match &stmt.node {
            Statement::Property(prop) => {
                params.insert(prop.key.node.clone(), to_param(&prop.value.node));
            }
            Statement::Element(inner) => {
                let key = inner
                    .name
                    .as_ref()
                    .map_or_else(|| inner.kind.node.clone(), |n| n.node.clone());
                params.insert(key, block_params(inner));
            }
            Statement::Description(_) => {}
        }
    }
    ParamValue::Map(params)
}
