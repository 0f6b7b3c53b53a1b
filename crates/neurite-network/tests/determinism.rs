//! Buffered updates give identical results for any worker count.

use std::sync::Arc;

use neurite_network::BufferedUpdate;
use neurite_pool::WorkerPool;
use neurite_test_utils::fixtures::random_network;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn buffered_result_is_independent_of_workers(
        seed in any::<u64>(),
        units in 1usize..300,
        fan_in in 0usize..6,
        workers in 1usize..5,
        chunk in 1usize..64,
    ) {
        let mut inline = random_network(seed, units, fan_in);
        let mut parallel = random_network(seed, units, fan_in);
        let pool = Arc::new(WorkerPool::with_workers(workers).unwrap());
        parallel.set_action(Box::new(BufferedUpdate::parallel(pool).with_chunk_size(chunk)));

        for _ in 0..5 {
            inline.update().unwrap();
            parallel.update().unwrap();
        }
        prop_assert_eq!(inline.values(), parallel.values());
    }
}

#[test]
fn same_seed_same_network() {
    let a = random_network(7, 50, 3);
    let b = random_network(7, 50, 3);
    assert_eq!(a.values(), b.values());
    assert_eq!(a.connection_count(), b.connection_count());
    assert_eq!(a.connection_count(), 150);
}
