//! Property tests over the service write path.

use proptest::prelude::*;
use setwise_core::DEFAULT_GROUP;
use setwise_storage::StorageGateway;
use setwise_test_utils::assertions::assert_exclusive_columns;
use setwise_test_utils::fixtures::service_with_memory_cache;
use setwise_test_utils::generators::{arb_key, arb_typed_value};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime should build")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Any sequence of typed writes to one key leaves exactly the column the
    /// final type selects, and reads return the last value written.
    #[test]
    fn prop_writes_keep_columns_exclusive(
        key in arb_key(),
        writes in prop::collection::vec(arb_typed_value(), 1..6),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let (service, storage, _cache) = service_with_memory_cache();

            for (ty, value) in &writes {
                let record = service
                    .set(&key, value.clone(), *ty, DEFAULT_GROUP)
                    .await
                    .unwrap();
                assert_exclusive_columns(&record);

                // Warm the cache between writes so invalidation is exercised.
                assert_eq!(&service.get(&key, "").await.unwrap(), value);
            }

            let stored = storage.find_by_key(&key).await.unwrap().unwrap();
            assert_exclusive_columns(&stored);
            let (last_ty, _) = writes.last().unwrap();
            assert_eq!(stored.setting_type, *last_ty);
        });
    }
}
