use creme_crm::db::establish_connection_pool;

mod common;

#[test]
fn database_file_lives_with_the_test() {
    let path = {
        let test_db = common::TestDb::new("creme_lifecycle.db");
        assert!(test_db.pool().get().is_ok());
        assert!(test_db.path().exists());
        test_db.path().clone()
    };
    assert!(!path.exists());
}

#[test]
fn in_memory_pool_shares_one_connection() {
    let pool = establish_connection_pool(":memory:").expect("memory pool");
    assert_eq!(pool.max_size(), 1);
    assert!(pool.get().is_ok());
}
