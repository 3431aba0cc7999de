// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Layout of the export tree.
//!
//! ```text
//! <root>/accounts.json
//! <root>/<shard(account)>/abi.json
//! <root>/<shard(account)>/code.wasm
//! <root>/<shard(account)>/account.json
//! <root>/<shard(account)>/tables/<table>/scopes.json
//! <root>/<shard(account)>/tables/<table>/<shard(scope)>/rows.json
//! <root>/<shard(account)>/tables/<table>/<shard(scope)>/scope.json
//! ```

use crate::error::{TreeError, TreeResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use statemig_models::name::Name;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

const ACCOUNTS_FILE: &str = "accounts.json";
const ABI_FILE: &str = "abi.json";
const CODE_FILE: &str = "code.wasm";
const ACCOUNT_INFO_FILE: &str = "account.json";
const TABLES_DIR: &str = "tables";
const SCOPES_FILE: &str = "scopes.json";
const ROWS_FILE: &str = "rows.json";
const SCOPE_PAYERS_FILE: &str = "scope.json";

/// Sharded directory of `name` under `root`.
///
/// Names of 1 or 2 characters live directly under `root`, names of 3 or 4
/// characters under a 2 character prefix, longer names under two 2 character
/// prefixes.
///
/// ```rust
/// # use statemig_migration_exports::resolve_path;
/// # use std::path::{Path, PathBuf};
/// let path = resolve_path(Path::new("dir"), "abcdefghi").unwrap();
/// assert_eq!(path, PathBuf::from("dir/ab/cd/abcdefghi"));
/// ```
pub fn resolve_path(root: &Path, name: &str) -> TreeResult<PathBuf> {
    let chars: Vec<char> = name.chars().collect();
    let prefix = |range: std::ops::Range<usize>| chars[range].iter().collect::<String>();
    match chars.len() {
        0 => Err(TreeError::InvalidArgument(
            "cannot resolve the path of an empty name".to_string(),
        )),
        1..=2 => Ok(root.join(name)),
        3..=4 => Ok(root.join(prefix(0..2)).join(name)),
        _ => Ok(root.join(prefix(0..2)).join(prefix(2..4)).join(name)),
    }
}

/// Paths of an export tree rooted at one directory
#[derive(Debug, Clone)]
pub struct ExportTree {
    root: PathBuf,
}

impl ExportTree {
    /// Export tree rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ExportTree { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ordered list of every account
    pub fn accounts_file(&self) -> PathBuf {
        self.root.join(ACCOUNTS_FILE)
    }

    /// Sharded directory of an account
    pub fn account_dir(&self, account: Name) -> TreeResult<PathBuf> {
        resolve_path(&self.root, &account.to_string())
    }

    /// JSON schema of a contract account
    pub fn abi_file(&self, account: Name) -> TreeResult<PathBuf> {
        Ok(self.account_dir(account)?.join(ABI_FILE))
    }

    /// Code of a contract account
    pub fn code_file(&self, account: Name) -> TreeResult<PathBuf> {
        Ok(self.account_dir(account)?.join(CODE_FILE))
    }

    /// Permissions and links of an account
    pub fn account_info_file(&self, account: Name) -> TreeResult<PathBuf> {
        Ok(self.account_dir(account)?.join(ACCOUNT_INFO_FILE))
    }

    /// Directory holding one directory per table of the account
    pub fn tables_dir(&self, account: Name) -> TreeResult<PathBuf> {
        Ok(self.account_dir(account)?.join(TABLES_DIR))
    }

    /// Directory of one table
    pub fn table_dir(&self, account: Name, table: Name) -> TreeResult<PathBuf> {
        let table = table.to_string();
        if table.is_empty() {
            return Err(TreeError::InvalidArgument(format!(
                "empty table name for account {}",
                account
            )));
        }
        Ok(self.tables_dir(account)?.join(table))
    }

    /// Scopes of a table, in first-seen order
    pub fn scopes_file(&self, account: Name, table: Name) -> TreeResult<PathBuf> {
        Ok(self.table_dir(account, table)?.join(SCOPES_FILE))
    }

    /// Sharded directory of a scope, under its table
    pub fn scope_dir(&self, account: Name, table: Name, scope: Name) -> TreeResult<PathBuf> {
        resolve_path(&self.table_dir(account, table)?, &scope.to_string())
    }

    /// Rows of a scope
    pub fn rows_file(&self, account: Name, table: Name, scope: Name) -> TreeResult<PathBuf> {
        Ok(self.scope_dir(account, table, scope)?.join(ROWS_FILE))
    }

    /// Optional payers of a scope
    pub fn scope_payers_file(&self, account: Name, table: Name, scope: Name) -> TreeResult<PathBuf> {
        Ok(self.scope_dir(account, table, scope)?.join(SCOPE_PAYERS_FILE))
    }

    /// Tables exported for an account, sorted by name. No tables directory means no tables.
    /// Plain files next to the table directories are ignored.
    pub fn list_tables(&self, account: Name) -> TreeResult<Vec<Name>> {
        let dir = self.tables_dir(account)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(TreeError::Io { path: dir, source }),
        };
        let mut tables = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| TreeError::Io {
                path: dir.clone(),
                source,
            })?;
            let is_dir = entry
                .file_type()
                .map_err(|source| TreeError::Io {
                    path: entry.path(),
                    source,
                })?
                .is_dir();
            if !is_dir {
                warn!("ignoring {:?}: not a table directory", entry.path());
                continue;
            }
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            let table = name.parse::<Name>().map_err(|err| {
                TreeError::InvalidArgument(format!("table directory {:?}: {}", entry.path(), err))
            })?;
            tables.push(table);
        }
        tables.sort();
        Ok(tables)
    }
}

/// Read and parse a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> TreeResult<T> {
    let bytes = read_bytes(path)?;
    serde_json::from_slice(&bytes).map_err(|source| TreeError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a JSON file, `None` if it does not exist
pub fn read_json_opt<T: DeserializeOwned>(path: &Path) -> TreeResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    read_json(path).map(Some)
}

/// Serialize `value` as pretty JSON into `path`, creating parent directories
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> TreeResult<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| TreeError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_bytes(path, &bytes)
}

/// Read a whole file
pub fn read_bytes(path: &Path) -> TreeResult<Vec<u8>> {
    fs::read(path).map_err(|source| TreeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a whole file, creating parent directories
pub fn write_bytes(path: &Path, bytes: &[u8]) -> TreeResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| TreeError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, bytes).map_err(|source| TreeError::Io {
        path: path.to_path_buf(),
        source,
    })
}
