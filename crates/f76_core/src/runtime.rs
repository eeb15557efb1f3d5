use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub const DB_ENV_VAR: &str = "F76_DB";
const DB_FILENAME: &str = "fallout.sqlite";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env,
    Repo,
    UserData,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Repo => "repo",
            Self::UserData => "user-data",
        }
    }
}

/// Inputs to database-path resolution, captured once at the process
/// boundary. Extraction code only ever sees the resolved path.
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub flag: Option<PathBuf>,
    pub env_db: Option<PathBuf>,
    pub cwd: PathBuf,
    pub home: Option<PathBuf>,
}

impl ResolutionContext {
    pub fn from_process(flag: Option<PathBuf>) -> Result<Self> {
        let cwd = env::current_dir().context("failed to read current directory")?;
        let env_db = env::var_os(DB_ENV_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        let home = env::var_os("HOME")
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Ok(Self {
            flag,
            env_db,
            cwd,
            home,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedDb {
    pub path: PathBuf,
    pub source: ValueSource,
}

impl ResolvedDb {
    pub fn diagnostics(&self) -> String {
        format!("db_path={} ({})", self.path.display(), self.source.as_str())
    }
}

/// Resolve the database path: flag > F76_DB > repo-relative data/ file
/// (when it already exists) > per-user data directory.
pub fn resolve_db(context: &ResolutionContext) -> ResolvedDb {
    if let Some(path) = &context.flag {
        return ResolvedDb {
            path: path.clone(),
            source: ValueSource::Flag,
        };
    }
    if let Some(path) = &context.env_db {
        return ResolvedDb {
            path: path.clone(),
            source: ValueSource::Env,
        };
    }
    let repo_db = context.cwd.join("data").join(DB_FILENAME);
    if repo_db.exists() {
        return ResolvedDb {
            path: repo_db,
            source: ValueSource::Repo,
        };
    }
    let base = match &context.home {
        Some(home) => home.join(".local").join("share").join("f76"),
        None => context.cwd.join("data"),
    };
    ResolvedDb {
        path: base.join(DB_FILENAME),
        source: ValueSource::UserData,
    }
}
