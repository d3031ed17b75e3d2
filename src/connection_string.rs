/// Connection String Module
///
/// Formats credentials into a `postgres://` URI. Each credential is either
/// used literally or treated as the name of an environment variable holding
/// the real value.
use crate::core::{DataManagerError, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Port every generated URI points at.
pub const DEFAULT_PORT: u16 = 5432;

static TEMPLATE_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid template regex"));

/// How credential fields are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialMode {
    /// Fields are the values themselves
    Literal,
    /// Fields name environment variables holding the values
    #[default]
    Environment,
}

/// Source of environment variables.
pub trait EnvSource {
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Host, user, password and database, either literal or variable names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Credentials {
    pub fn new(host: &str, user: &str, password: &str, database: &str) -> Self {
        Credentials {
            host: host.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            database: database.to_string(),
        }
    }

    /// Looks up every field as an environment variable.
    ///
    /// # Errors
    ///
    /// `Config` naming the first variable that is not set.
    pub fn resolve(&self, env: &impl EnvSource) -> Result<Credentials> {
        let lookup = |name: &str| {
            env.var(name).ok_or_else(|| {
                DataManagerError::Config(format!("environment variable `{}` is not set", name))
            })
        };
        Ok(Credentials {
            host: lookup(&self.host)?,
            user: lookup(&self.user)?,
            password: lookup(&self.password)?,
            database: lookup(&self.database)?,
        })
    }
}

fn format_uri(creds: &Credentials) -> String {
    format!(
        "postgres://{}:{}@{}:{}/{}",
        creds.user, creds.password, creds.host, DEFAULT_PORT, creds.database
    )
}

/// Builds a connection URI against the process environment.
///
/// # Examples
///
/// ```
/// use data_manager::connection_string::{build_connection_string, CredentialMode, Credentials};
///
/// let creds = Credentials::new("h", "u", "p", "d");
/// let uri = build_connection_string(&creds, CredentialMode::Literal).unwrap();
/// assert_eq!(uri, "postgres://u:p@h:5432/d");
/// ```
pub fn build_connection_string(creds: &Credentials, mode: CredentialMode) -> Result<String> {
    build_connection_string_with(creds, mode, &ProcessEnv)
}

/// Builds a connection URI, looking variables up in `env` when `mode` asks for it.
pub fn build_connection_string_with(
    creds: &Credentials,
    mode: CredentialMode,
    env: &impl EnvSource,
) -> Result<String> {
    match mode {
        CredentialMode::Literal => Ok(format_uri(creds)),
        CredentialMode::Environment => Ok(format_uri(&creds.resolve(env)?)),
    }
}

/// Builds a URI template whose fields are `${VAR}` references, for storage
/// and expansion at connect time.
pub fn build_connection_template(vars: &Credentials) -> String {
    format_uri(&Credentials {
        host: format!("${{{}}}", vars.host),
        user: format!("${{{}}}", vars.user),
        password: format!("${{{}}}", vars.password),
        database: format!("${{{}}}", vars.database),
    })
}

/// Replaces every `${VAR}` in `template` with the variable's value.
///
/// # Errors
///
/// `Config` naming the first referenced variable that is not set.
pub fn expand_template(template: &str, env: &impl EnvSource) -> Result<String> {
    let mut missing: Option<String> = None;
    let expanded = TEMPLATE_VAR.replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        match env.var(name) {
            Some(value) => value,
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(DataManagerError::Config(format!(
            "environment variable `{}` is not set",
            name
        ))),
        None => Ok(expanded.into_owned()),
    }
}
