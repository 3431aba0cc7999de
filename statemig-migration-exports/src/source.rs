//! Interface of the service the state is exported from.

use crate::error::SourceError;
use statemig_models::abi::Abi;
use statemig_models::name::Name;
use statemig_models::permission::AccountInfo;
use statemig_models::row::TableRow;

/// A server-streamed answer. The end of the iterator is the end of the stream.
pub type SourceStream<T> = Box<dyn Iterator<Item = Result<T, SourceError>>>;

/// Schema of a contract as stored by the source
#[derive(Debug, Clone, PartialEq)]
pub enum RawAbi {
    /// ledger binary format
    Binary(Vec<u8>),
    /// already parsed
    Json(Abi),
}

/// Scopes requested when streaming rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeSelector {
    /// every scope of the table
    All,
    /// only the listed scopes
    Only(Vec<Name>),
}

/// A row with the scope it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedRow {
    /// scope of the row
    pub scope: Name,
    /// the row
    pub row: TableRow,
}

/// Read access to the state of the source ledger
#[cfg_attr(any(test, feature = "test-exports"), mockall::automock)]
pub trait StateSource {
    /// Every account name
    fn stream_accounts(&self) -> Result<SourceStream<Name>, SourceError>;

    /// Every account with deployed code
    fn stream_contract_accounts(&self) -> Result<SourceStream<Name>, SourceError>;

    /// Code of a contract, `None` if the account has none
    fn fetch_code(&self, account: Name) -> Result<Option<Vec<u8>>, SourceError>;

    /// Schema of a contract, `None` if the account has none
    fn fetch_abi(&self, account: Name) -> Result<Option<RawAbi>, SourceError>;

    /// Rows of a table across the selected scopes
    fn stream_table_rows(
        &self,
        account: Name,
        table: Name,
        scopes: ScopeSelector,
    ) -> Result<SourceStream<ScopedRow>, SourceError>;

    /// Payers of the base and index tables of a scope, if the source tracks them
    fn fetch_scope_payers(
        &self,
        _account: Name,
        _table: Name,
        _scope: Name,
    ) -> Result<Option<Vec<Name>>, SourceError> {
        Ok(None)
    }

    /// Permissions and links of an account, if the source tracks them
    fn fetch_account_permissions(&self, _account: Name) -> Result<Option<AccountInfo>, SourceError> {
        Ok(None)
    }
}
