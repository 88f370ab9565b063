//! Property tests over the full store and retrieve path.

mod common;

use proptest::prelude::*;

use ledgervault_testkit::{FileParams, TestFixture};

use common::store;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn stored_files_come_back_unchanged(params: FileParams) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let data = rt.block_on(async {
            let owner = TestFixture::new();
            let policy = owner.create_policy("Finance", &[owner.identity()]);
            let owner_store = store(&owner, owner.create_index());

            let mut tx = owner_store.begin();
            let id = owner_store
                .store_file(&mut tx, policy, &params.name, &params.data)
                .unwrap();
            tx.commit().await.unwrap();

            owner_store
                .retrieve_file(id, &owner.reader, None)
                .await
                .unwrap()
        });

        prop_assert_eq!(data, params.data);
    }
}
