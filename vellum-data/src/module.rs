//! Module loading and the process-wide registry.
//!
//! A module is a named bundle of commands, environments, and a dependency
//! list of other modules. The bundled dictionaries are TOML files embedded
//! into the binary; loading is idempotent and cached process-wide,
//! including negative results.

use crate::descriptor::{Command, Environment};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A loaded module with its command and environment tables.
#[derive(Debug)]
pub struct Module {
    pub name: String,
    /// Modules to load transitively before this one takes effect.
    pub dependencies: Vec<String>,
    pub commands: HashMap<String, Arc<Command>>,
    pub environments: HashMap<String, Arc<Environment>>,
}

#[derive(Debug, Deserialize)]
struct ModuleData {
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    commands: HashMap<String, Command>,
    #[serde(default)]
    environments: HashMap<String, Environment>,
}

/// The dictionaries bundled with the tool.
static BUNDLED: &[(&str, &str)] = &[
    ("tex", include_str!("../data/tex.toml")),
    ("latex", include_str!("../data/latex.toml")),
    ("tikz", include_str!("../data/tikz.toml")),
];

static REGISTRY: Lazy<Mutex<HashMap<String, Option<Arc<Module>>>>> =
    Lazy::new(Mutex::default);

/// Look up a module by name, loading and caching it on first use.
/// Returns `None` for unknown modules and for modules whose dictionary
/// fails to parse; both outcomes are cached.
pub fn load_module(name: &str) -> Option<Arc<Module>> {
    let mut registry = REGISTRY.lock().unwrap();
    if let Some(cached) = registry.get(name) {
        return cached.clone();
    }
    let loaded = bundled_source(name).and_then(|source| parse_module(name, source));
    registry.insert(name.to_string(), loaded.clone());
    loaded
}

fn bundled_source(name: &str) -> Option<&'static str> {
    BUNDLED
        .iter()
        .find(|(bundled, _)| *bundled == name)
        .map(|(_, source)| *source)
}

fn parse_module(name: &str, source: &str) -> Option<Arc<Module>> {
    let data: ModuleData = match toml::from_str(source) {
        Ok(data) => data,
        Err(err) => {
            tracing::warn!(module = name, %err, "malformed module dictionary");
            return None;
        }
    };
    let commands = data
        .commands
        .into_iter()
        .map(|(cmd_name, mut command)| {
            command.name = cmd_name.clone();
            (cmd_name, Arc::new(command))
        })
        .collect();
    let environments = data
        .environments
        .into_iter()
        .map(|(env_name, mut environment)| {
            environment.name = env_name.clone();
            (env_name, Arc::new(environment))
        })
        .collect();
    Some(Arc::new(Module {
        name: name.to_string(),
        dependencies: data.dependencies,
        commands,
        environments,
    }))
}
