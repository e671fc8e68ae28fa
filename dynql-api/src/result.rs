use dynql_core::{Error, Result};

/// Outcome of a statement run through `exec`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    rows_affected: u64,
}

impl ExecResult {
    pub(crate) fn new(rows_affected: u64) -> Self {
        Self { rows_affected }
    }

    /// 1 for an applied (or queued) single-item write, 0 otherwise
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Keys are always supplied by the caller; the store never generates one.
    pub fn last_insert_id(&self) -> Result<i64> {
        Err(Error::NotSupported("LastInsertId".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_affected() {
        assert_eq!(ExecResult::new(1).rows_affected(), 1);
        assert_eq!(ExecResult::new(0).rows_affected(), 0);
    }

    #[test]
    fn test_last_insert_id_not_supported() {
        let err = ExecResult::new(1).last_insert_id().unwrap_err();
        assert_eq!(err.code(), "NOT_SUPPORTED");
        assert_eq!(err.to_string(), "LastInsertId is not supported");
    }
}
