//! Property tests for transaction atomicity
//!
//! - rollback of any batch leaves the table unchanged
//! - commit of a batch of new keys adds exactly that batch in one store call
//! - a batch that collides with an existing key applies nothing

use dynql_api::{params, TxState};
use dynql_core::StoreOp;
use dynql_test_utils::*;
use proptest::prelude::*;
use std::collections::HashSet;

const SEEDED: &[&str] = &["k0", "k1", "k2"];

fn new_ids() -> impl Strategy<Value = HashSet<String>> {
    // Letters only, so never equal to a seeded key
    proptest::collection::hash_set("[a-z]{1,8}", 1..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_rollback_keeps_item_count(ids in new_ids(), update_seeded in any::<bool>()) {
        let tc = TestConnection::with_test_table();
        tc.seed(SEEDED);
        let writes_before = tc.store.write_call_count();

        let mut tx = tc.conn.begin().unwrap();
        for id in &ids {
            tx.exec("INSERT INTO tbltest VALUE {'id': ?}", &params![id.as_str()]).unwrap();
        }
        if update_seeded {
            tx.exec("DELETE FROM tbltest WHERE id = 'k0'", &[]).unwrap();
        }
        prop_assert_eq!(tx.len(), ids.len() + usize::from(update_seeded));
        tx.rollback().unwrap();

        prop_assert_eq!(tx.state(), TxState::RolledBack);
        prop_assert_eq!(tc.count("tbltest"), SEEDED.len());
        prop_assert_eq!(tc.store.write_call_count(), writes_before);
    }

    #[test]
    fn prop_commit_adds_whole_batch(ids in new_ids()) {
        let tc = TestConnection::with_test_table();
        tc.seed(SEEDED);

        let mut tx = tc.conn.begin().unwrap();
        for id in &ids {
            tx.exec("INSERT INTO tbltest VALUE {'id': ?}", &params![id.as_str()]).unwrap();
        }
        tx.commit().unwrap();

        prop_assert_eq!(tc.count("tbltest"), SEEDED.len() + ids.len());
        prop_assert_eq!(tc.store.call_count(StoreOp::TransactWrite), 1);
    }

    #[test]
    fn prop_colliding_batch_applies_nothing(ids in new_ids(), seeded in 0..SEEDED.len()) {
        let tc = TestConnection::with_test_table();
        tc.seed(SEEDED);

        let mut tx = tc.conn.begin().unwrap();
        for id in &ids {
            tx.exec("INSERT INTO tbltest VALUE {'id': ?}", &params![id.as_str()]).unwrap();
        }
        tx.exec("INSERT INTO tbltest VALUE {'id': ?}", &params![SEEDED[seeded]]).unwrap();
        let err = tx.commit().unwrap_err();

        prop_assert_eq!(err.code(), "TRANSACTION_ERROR");
        prop_assert_eq!(tc.count("tbltest"), SEEDED.len());
    }
}
