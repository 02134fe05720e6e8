use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

use securepool_nullables::{NullClock, NullProvider};
use securepool_types::WalletAddress;
use securepool_wallet_core::{
    reconcile, EventHub, ProviderSnapshot, Session, SessionStore, StoreConfig,
};

fn snapshot() -> impl Strategy<Value = ProviderSnapshot> {
    (any::<bool>(), proptest::option::of("0x[0-9a-f]{4,16}")).prop_map(|(logged_in, addr)| {
        ProviderSnapshot {
            logged_in,
            address: addr.map(|a| WalletAddress::parse(a).expect("generated address is valid")),
        }
    })
}

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("runtime")
}

proptest! {
    #[test]
    fn reconciled_session_is_always_valid(snap in snapshot()) {
        let r = reconcile(&snap);
        match &r.session {
            Session::Connected { address } => {
                prop_assert!(snap.logged_in);
                prop_assert_eq!(Some(address), snap.address.as_ref());
            }
            Session::Disconnected => prop_assert!(!snap.is_qualifying()),
        }
        prop_assert_eq!(r.force_disconnect, snap.logged_in && snap.address.is_none());
    }

    #[test]
    fn every_subscriber_sees_the_same_ordered_stream(
        snaps in proptest::collection::vec(snapshot(), 1..32),
    ) {
        let hub = EventHub::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        for snap in &snaps {
            hub.emit(snap.clone());
        }

        let mut seen = Vec::new();
        while let Some(event) = a.try_recv() {
            let other = b.try_recv();
            prop_assert_eq!(Some(&event), other.as_ref());
            seen.push(event);
        }
        prop_assert!(b.try_recv().is_none());
        prop_assert_eq!(seen.len(), snaps.len());
        for (i, (event, snap)) in seen.iter().zip(&snaps).enumerate() {
            prop_assert_eq!(event.seq, i as u64 + 1);
            prop_assert_eq!(&event.snapshot, snap);
        }
        prop_assert_eq!(hub.last_seq(), snaps.len() as u64);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn store_fed_arbitrary_events_only_publishes_valid_sessions(
        snaps in proptest::collection::vec(snapshot(), 1..24),
    ) {
        paused_runtime().block_on(async {
            let provider = NullProvider::new();
            let store = SessionStore::init(
                Arc::new(provider.clone()),
                StoreConfig::default(),
                Arc::new(NullClock::default()),
            );

            let mut rx = store.watch();
            let history = tokio::spawn(async move {
                let mut seen = vec![rx.borrow_and_update().clone()];
                while rx.changed().await.is_ok() {
                    seen.push(rx.borrow_and_update().clone());
                }
                seen
            });

            let mut heals = 0;
            for snap in &snaps {
                provider.emit(snap.clone());
                tokio::time::sleep(Duration::from_millis(1)).await;

                prop_assert_eq!(store.session(), reconcile(snap).session);
                if snap.logged_in && snap.address.is_none() {
                    heals += 1;
                }
                prop_assert_eq!(provider.disconnect_calls(), heals);
            }

            store.teardown().await;
            drop(store);
            let seen = history.await.expect("history task");

            for session in &seen {
                if let Session::Connected { address } = session {
                    prop_assert!(snaps.iter().any(|s| s.is_qualifying()
                        && s.address.as_ref() == Some(address)));
                }
            }
            prop_assert_eq!(seen.last(), Some(&Session::Disconnected));
            Ok::<(), TestCaseError>(())
        })?;
    }
}
