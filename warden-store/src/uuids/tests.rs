// SPDX-License-Identifier: MIT OR Apache-2.0

use uuid::Uuid;

use crate::uuids::{MappingResult, UuidCacheStore};

#[tokio::test]
async fn one_to_one_mappings() {
    crate::assert_all_stores!(|store| async {
        let alice = Uuid::from_u128(1);
        let bob = Uuid::from_u128(2);

        assert!(store.save_mapping("alice", alice).await.unwrap().is_clean());
        assert!(store.save_mapping("alice", alice).await.unwrap().is_clean());
        assert_eq!(store.uuid_for("alice").await.unwrap(), Some(alice));
        assert_eq!(
            store.username_for(alice).await.unwrap(),
            Some("alice".to_string())
        );

        // Renaming drops the old name.
        assert_eq!(
            store.save_mapping("alicia", alice).await.unwrap(),
            MappingResult {
                previous_username: Some("alice".into()),
                displaced: None,
            }
        );
        assert_eq!(store.uuid_for("alice").await.unwrap(), None);
        assert_eq!(
            store.username_for(alice).await.unwrap(),
            Some("alicia".to_string())
        );

        // Taking over a name displaces its previous owner.
        assert_eq!(
            store.save_mapping("alicia", bob).await.unwrap(),
            MappingResult {
                previous_username: None,
                displaced: Some(alice),
            }
        );
        assert_eq!(store.uuid_for("alicia").await.unwrap(), Some(bob));
        assert_eq!(store.username_for(alice).await.unwrap(), None);
    });
}
