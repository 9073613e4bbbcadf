// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::users::{UserData, UserStore};

#[tokio::test]
async fn upsert_and_delete() {
    crate::assert_all_stores!(|store| async {
        let id = Uuid::from_u128(42);
        assert_eq!(store.user_data(id).await.unwrap(), None);

        let data = UserData {
            username: Some("notch".into()),
            primary_group: "default".into(),
        };
        store.upsert_user(id, &data).await.unwrap();
        assert_eq!(store.user_data(id).await.unwrap(), Some(data));

        let data = UserData {
            username: None,
            primary_group: "vip".into(),
        };
        store.upsert_user(id, &data).await.unwrap();
        assert_eq!(store.user_data(id).await.unwrap(), Some(data));
        assert_eq!(store.user_ids().await.unwrap(), BTreeSet::from([id]));

        assert!(store.delete_user(id).await.unwrap());
        assert!(!store.delete_user(id).await.unwrap());
        assert!(store.user_ids().await.unwrap().is_empty());
    });
}
