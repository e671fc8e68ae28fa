/// Transaction coordinator tests: buffering, atomic commit, rollback

use dynql_api::{params, TxState, Value};
use dynql_core::{Error, StoreOp};
use dynql_test_utils::*;

#[test]
fn test_rollback_leaves_no_trace() {
    let tc = TestConnection::with_test_table();

    let mut tx = tc.conn.begin().unwrap();
    let res = tx
        .exec(
            r#"INSERT INTO "tbltest" VALUE {'id': ?, 'name': ?}"#,
            &params!["1", "test"],
        )
        .unwrap();
    assert_eq!(res.rows_affected(), 1);
    tx.rollback().unwrap();

    let rows = fetch_all(&tc.conn, "SELECT * FROM tbltest", &[]).unwrap();
    assert!(rows.is_empty());
    assert_eq!(tc.store.write_call_count(), 0);
}

#[test]
fn test_commit_inserts() {
    let tc = TestConnection::with_test_table();

    let mut tx = tc.conn.begin().unwrap();
    let r1 = tx
        .exec(r#"INSERT INTO "tbltest" VALUE {'id': ?, 'name': ?}"#, &params!["1", "one"])
        .unwrap();
    let r2 = tx
        .exec(r#"INSERT INTO "tbltest" VALUE {'id': ?, 'name': ?}"#, &params!["2", "two"])
        .unwrap();
    tx.commit().unwrap();

    assert_eq!(r1.rows_affected(), 1);
    assert_eq!(r2.rows_affected(), 1);
    let rows = fetch_all(&tc.conn, "SELECT * FROM tbltest", &[]).unwrap();
    assert_eq!(column_strings(&rows, "id"), vec!["1", "2"]);
    assert_eq!(tc.store.call_count(StoreOp::TransactWrite), 1);
}

#[test]
fn test_update_and_delete_commit_together() {
    let tc = TestConnection::with_test_table();
    tc.seed(&["1", "2"]);

    let mut tx = tc.conn.begin().unwrap();
    let upd = tx
        .exec(r#"UPDATE "tbltest" SET duration=? WHERE "id"=?"#, &params![1.2, "2"])
        .unwrap();
    let del = tx
        .exec(r#"DELETE FROM "tbltest" WHERE "id"=?"#, &params!["1"])
        .unwrap();
    tx.commit().unwrap();

    assert_eq!(upd.rows_affected(), 1);
    assert_eq!(del.rows_affected(), 1);

    let rows = fetch_all(&tc.conn, "SELECT * FROM tbltest", &[]).unwrap();
    assert_eq!(rows.len(), 1);
    assert_string_eq(rows[0].get("id").unwrap(), "2");
    assert_number_eq(rows[0].get("duration").unwrap(), "1.2");
}

#[test]
fn test_equal_transactions_commit_independently() {
    let tc = TestConnection::with_test_table();
    tc.seed(&["1", "2"]);

    for _ in 0..2 {
        let mut tx = tc.conn.begin().unwrap();
        let a = tx
            .exec("UPDATE tbltest SET status = ? WHERE id = ?", &params!["done", "1"])
            .unwrap();
        let b = tx
            .exec("UPDATE tbltest SET status = ? WHERE id = ?", &params!["done", "2"])
            .unwrap();
        tx.commit().unwrap();
        assert_eq!(a.rows_affected() + b.rows_affected(), 2);
    }

    assert_eq!(tc.store.call_count(StoreOp::TransactWrite), 2);
    let rows = fetch_all(&tc.conn, "SELECT * FROM tbltest WHERE status = 'done'", &[]).unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn test_failed_commit_applies_nothing() {
    let tc = TestConnection::with_test_table();
    tc.seed(&["1"]);

    let mut tx = tc.conn.begin().unwrap();
    tx.exec("INSERT INTO tbltest VALUE {'id': '2'}", &[]).unwrap();
    // Key '1' already exists, so the whole batch is cancelled
    tx.exec("INSERT INTO tbltest VALUE {'id': '1'}", &[]).unwrap();
    let err = tx.commit().unwrap_err();

    assert_eq!(err.code(), "TRANSACTION_ERROR");
    assert_eq!(tx.state(), TxState::RolledBack);
    assert_eq!(tc.count("tbltest"), 1);
    assert!(tc.conn.begin().is_ok());
}

#[test]
fn test_missing_key_fails_transaction() {
    let tc = TestConnection::with_test_table();
    tc.seed(&["1"]);

    let mut tx = tc.conn.begin().unwrap();
    tx.exec("UPDATE tbltest SET duration = 9 WHERE id = '1'", &[]).unwrap();
    tx.exec("DELETE FROM tbltest WHERE id = 'ghost'", &[]).unwrap();
    let err = tx.commit().unwrap_err();
    assert_eq!(err.code(), "TRANSACTION_ERROR");

    let rows = fetch_all(&tc.conn, "SELECT * FROM tbltest WHERE id = '1'", &[]).unwrap();
    assert_number_eq(rows[0].get("duration").unwrap(), "0");
}

#[test]
fn test_cancelled_commit_can_be_retried() {
    let tc = TestConnection::with_test_table();

    let mut tx = tc.conn.begin().unwrap();
    tx.exec("INSERT INTO tbltest VALUE {'id': '1'}", &[]).unwrap();
    tc.store
        .fail_next(StoreOp::TransactWrite, Error::Cancelled("deadline exceeded".into()));

    let err = tx.commit().unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(tx.state(), TxState::Open);

    tx.commit().unwrap();
    assert_eq!(tc.count("tbltest"), 1);
}

#[test]
fn test_begin_twice_fails() {
    let tc = TestConnection::with_test_table();
    let _tx = tc.conn.begin().unwrap();
    let err = tc.conn.begin().err().unwrap();
    assert_eq!(err.code(), "TRANSACTION_STATE_ERROR");
}

#[test]
fn test_terminal_state_errors() {
    let tc = TestConnection::with_test_table();
    let mut tx = tc.conn.begin().unwrap();
    tx.exec("INSERT INTO tbltest VALUE {'id': '1'}", &[]).unwrap();
    tx.commit().unwrap();

    let err = tx.exec("INSERT INTO tbltest VALUE {'id': '2'}", &[]).unwrap_err();
    assert_eq!(err.code(), "TRANSACTION_STATE_ERROR");
    assert_eq!(tx.rollback().unwrap_err().code(), "TRANSACTION_STATE_ERROR");
    assert_eq!(tx.commit().unwrap_err().code(), "TRANSACTION_STATE_ERROR");
    assert_eq!(tc.count("tbltest"), 1);
}

#[test]
fn test_dropped_transaction_is_discarded() {
    let tc = TestConnection::with_test_table();
    {
        let mut tx = tc.conn.begin().unwrap();
        tx.exec("INSERT INTO tbltest VALUE {'id': '1'}", &[]).unwrap();
    }
    assert_eq!(tc.count("tbltest"), 0);
    assert_eq!(tc.store.write_call_count(), 0);
    assert!(tc.conn.begin().is_ok());
}

#[test]
fn test_reads_run_outside_transaction() {
    let tc = TestConnection::with_test_table();
    tc.seed(&["1"]);

    let mut tx = tc.conn.begin().unwrap();
    let err = tx.exec("SELECT * FROM tbltest", &[]).unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    // Autocommit reads on the same connection still see committed state only
    tx.exec("DELETE FROM tbltest WHERE id = '1'", &[]).unwrap();
    let rows = fetch_all(&tc.conn, "SELECT * FROM tbltest", &[]).unwrap();
    assert_eq!(rows.len(), 1);
    tx.rollback().unwrap();
}

#[test]
fn test_last_insert_id_not_supported_in_transaction() {
    let tc = TestConnection::with_test_table();
    let mut tx = tc.conn.begin().unwrap();
    let res = tx
        .exec("INSERT INTO tbltest VALUE {'id': ?}", &[Value::from("1")])
        .unwrap();
    assert_eq!(res.last_insert_id().unwrap_err().code(), "NOT_SUPPORTED");
    tx.rollback().unwrap();
}
