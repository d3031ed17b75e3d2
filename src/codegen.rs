/// Model Generation Module
///
/// Writes an engine manifest naming one connection template per database,
/// and drives the external model generator (`sqlacodegen` by default) to
/// materialize mapping classes from an existing schema. The generator is an
/// opaque subprocess: it either exits successfully or the run fails.
use crate::connection_string::{
    build_connection_string_with, build_connection_template, expand_template, CredentialMode,
    Credentials, EnvSource,
};
use crate::core::{DataManagerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{error, info};

/// File name of the manifest written by [`write_engine_manifest`].
pub const MANIFEST_FILE: &str = "engines.toml";

const MANIFEST_HEADER: &str = "# Database engines the application connects to.\n\
# AUTO-GENERATED by `data-manager generate`; edit the configuration and regenerate instead.\n";

/// One database to generate models for. Credential fields name
/// environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelItem {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub schemas: Option<Vec<String>>,
}

impl ModelItem {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.host, &self.user, &self.password, &self.database)
    }

    /// Manifest key for this item.
    pub fn engine_name(&self) -> String {
        format!("{}_engine", self.database)
    }
}

/// External generator program and the flags passed on every run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_flags")]
    pub flags: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            program: default_program(),
            flags: default_flags(),
        }
    }
}

fn default_program() -> String {
    "sqlacodegen".to_string()
}

fn default_flags() -> Vec<String> {
    ["--nojoined", "--noindexes", "--noviews", "--noconstraints"]
        .iter()
        .map(|f| f.to_string())
        .collect()
}

/// A single planned generator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorInvocation {
    pub output: PathBuf,
    pub schema: Option<String>,
    pub url: String,
}

impl GeneratorInvocation {
    /// Builds the subprocess command for this run.
    pub fn command(&self, generator: &GeneratorConfig) -> Command {
        let mut command = Command::new(&generator.program);
        command.arg("--outfile").arg(&self.output);
        command.args(&generator.flags);
        if let Some(schema) = &self.schema {
            command.arg("--schema").arg(schema);
        }
        command.arg(&self.url);
        command
    }

    /// Runs the generator and waits for it to exit.
    ///
    /// # Errors
    ///
    /// `Codegen` if the program cannot start or exits unsuccessfully.
    pub fn run(&self, generator: &GeneratorConfig) -> Result<()> {
        let output = self.command(generator).output().map_err(|e| {
            DataManagerError::Codegen(format!("failed to start `{}`: {}", generator.program, e))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(program = %generator.program, status = %output.status, "model generator failed");
            return Err(DataManagerError::Codegen(format!(
                "`{}` exited with {} writing {}: {}",
                generator.program,
                output.status,
                self.output.display(),
                stderr.trim()
            )));
        }
        info!(output = %self.output.display(), "generated models");
        Ok(())
    }
}

/// Plans one generator run per schema, or a single run over the whole
/// database when the item lists no schemas.
pub fn plan_invocations(item: &ModelItem, orm_dir: &Path, url: &str) -> Vec<GeneratorInvocation> {
    let database = item.database.to_lowercase();
    match &item.schemas {
        Some(schemas) => schemas
            .iter()
            .map(|schema| GeneratorInvocation {
                output: orm_dir.join(format!("{}_{}_models.py", database, schema.to_lowercase())),
                schema: Some(schema.clone()),
                url: url.to_string(),
            })
            .collect(),
        None => vec![GeneratorInvocation {
            output: orm_dir.join(format!("{}_models.py", database)),
            schema: None,
            url: url.to_string(),
        }],
    }
}

/// Connection templates keyed by engine name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineManifest {
    pub generated_at: String,
    pub engines: BTreeMap<String, EngineEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineEntry {
    pub url: String,
}

impl EngineManifest {
    pub fn from_items(items: &[ModelItem]) -> Self {
        EngineManifest {
            generated_at: chrono::Utc::now().to_rfc3339(),
            engines: items
                .iter()
                .map(|item| {
                    (
                        item.engine_name(),
                        EngineEntry {
                            url: build_connection_template(&item.credentials()),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Expands the named engine's template against `env`.
    pub fn url(&self, engine: &str, env: &impl EnvSource) -> Result<String> {
        let entry = self.engines.get(engine).ok_or_else(|| {
            DataManagerError::Config(format!("engine `{}` is not in the manifest", engine))
        })?;
        expand_template(&entry.url, env)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(format!("{}\n{}", MANIFEST_HEADER, toml::to_string(self)?))
    }
}

/// Writes `engines.toml` into `export_dir`, returning its path.
pub fn write_engine_manifest(export_dir: &Path, items: &[ModelItem]) -> Result<PathBuf> {
    fs::create_dir_all(export_dir)?;
    let path = export_dir.join(MANIFEST_FILE);
    fs::write(&path, EngineManifest::from_items(items).to_toml()?)?;
    info!(path = %path.display(), engines = items.len(), "wrote engine manifest");
    Ok(path)
}

pub fn load_engine_manifest(path: &Path) -> Result<EngineManifest> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Outcome of [`generate_db_details`].
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    pub manifest: PathBuf,
    pub generated: Vec<PathBuf>,
}

/// Writes the engine manifest and, when `orm_dir` is given, runs the model
/// generator for every item and schema.
///
/// Credentials are resolved from `env` before any generator runs, so a
/// missing variable fails the call without spawning anything.
pub fn generate_db_details(
    items: &[ModelItem],
    export_dir: &Path,
    orm_dir: Option<&Path>,
    generator: &GeneratorConfig,
    env: &impl EnvSource,
) -> Result<GenerationReport> {
    let manifest = write_engine_manifest(export_dir, items)?;
    let mut report = GenerationReport {
        manifest,
        generated: Vec::new(),
    };

    let orm_dir = match orm_dir {
        Some(dir) => dir,
        None => return Ok(report),
    };

    let mut planned = Vec::new();
    for item in items {
        let url = build_connection_string_with(&item.credentials(), CredentialMode::Environment, env)?;
        planned.extend(plan_invocations(item, orm_dir, &url));
    }

    fs::create_dir_all(orm_dir)?;
    for invocation in planned {
        invocation.run(generator)?;
        report.generated.push(invocation.output);
    }
    Ok(report)
}
