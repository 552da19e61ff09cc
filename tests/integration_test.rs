mod common;

use common::*;
use inventory_query::prelude::*;
use inventory_query::{Dialect, ParameterSet, SchemaSync};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

#[cfg(feature = "sqlite")]
mod sqlite_tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    async fn seed(items: &Repository<Item, SqliteBackend>, scope: &OwnerScope, count: i32) {
        for i in 1..=count {
            items
                .add(scope, &Item::named(&format!("Item {:02}", i), i))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_round_trip_by_key() {
        let provider = sqlite_provider().await;
        let items = provider.repository::<Item>().unwrap();
        let scope = OwnerScope::unscoped();

        let record = Item {
            id: 0,
            name: "Hex bolt M6".to_string(),
            sku: "HB-M6".to_string(),
            quantity: 120,
            price: Decimal::new(1999, 2),
            status: ItemStatus::Discontinued,
            tags: vec!["metric".to_string(), "zinc plated".to_string()],
            received_at: Utc::now(),
            owner_id: None,
        };

        let stored = items.add(&scope, &record).await.unwrap();
        assert!(stored.id > 0);
        assert_eq!(stored, Item { id: stored.id, ..record.clone() });

        let fetched = items.get(&scope, stored.id).await.unwrap().unwrap();
        assert_eq!(fetched, Item { id: stored.id, ..record });
    }

    #[tokio::test]
    async fn test_decimal_keeps_full_precision() {
        let provider = sqlite_provider().await;
        let items = provider.repository::<Item>().unwrap();
        let scope = OwnerScope::unscoped();

        let mut record = Item::named("gantry crane", 1);
        record.price = Decimal::from_str("123456789012345.678").unwrap();
        let stored = items.add(&scope, &record).await.unwrap();
        assert_eq!(stored.price, record.price);

        let fetched = items.get(&scope, stored.id).await.unwrap().unwrap();
        assert_eq!(fetched.price, record.price);

        let mut cheap = Item::named("shim", 1);
        cheap.price = Decimal::from_str("-0.125").unwrap();
        items.add(&scope, &cheap).await.unwrap();

        let page = items
            .page(&scope, &PageRequest::new(1, 10).sort_by("price", SortDirection::Desc))
            .await
            .unwrap();
        let names: Vec<_> = page.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["gantry crane", "shim"]);

        let above = items
            .find(&scope, &Predicate::gt("price", serde_json::json!("123456789012345.677")))
            .await
            .unwrap();
        assert_eq!(above, vec![fetched]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let provider = sqlite_provider().await;
        let items = provider.repository::<Item>().unwrap();
        let scope = OwnerScope::unscoped();

        let mut item = items.add(&scope, &Item::named("washer", 10)).await.unwrap();
        item.quantity = 4;
        item.tags = vec!["steel".to_string()];
        items.update(&scope, &item).await.unwrap();
        assert_eq!(items.get(&scope, item.id).await.unwrap(), Some(item.clone()));

        let missing = Item { id: 999, ..item.clone() };
        let err = items.update(&scope, &missing).await.unwrap_err();
        assert!(matches!(err, QueryError::RecordNotFound { ref key, .. } if key == "999"));

        items.delete(&scope, item.id).await.unwrap();
        assert_eq!(items.get(&scope, item.id).await.unwrap(), None);
        let err = items.delete(&scope, item.id).await.unwrap_err();
        assert!(matches!(err, QueryError::RecordNotFound { .. }));
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let provider = sqlite_provider().await;
        let items = provider.repository::<Item>().unwrap();
        let (owner_a, owner_b) = (Uuid::new_v4(), Uuid::new_v4());
        let scope_a = OwnerScope::owned_by(owner_a);
        let scope_b = OwnerScope::owned_by(owner_b);

        let a1 = items.add(&scope_a, &Item::named("a1", 1)).await.unwrap();
        items.add(&scope_a, &Item::named("a2", 2)).await.unwrap();
        items.add(&scope_b, &Item::named("b1", 3)).await.unwrap();
        assert_eq!(a1.owner_id, Some(owner_a));

        assert_eq!(items.list(&scope_a).await.unwrap().len(), 2);
        assert_eq!(items.list(&scope_b).await.unwrap().len(), 1);
        assert_eq!(items.list(&OwnerScope::unscoped()).await.unwrap().len(), 3);
        assert_eq!(items.count(&scope_a, None).await.unwrap(), 2);

        assert_eq!(items.get(&scope_b, a1.id).await.unwrap(), None);
        assert!(items.get(&scope_a, a1.id).await.unwrap().is_some());
        assert!(items.get(&OwnerScope::unscoped(), a1.id).await.unwrap().is_some());

        let err = items.update(&scope_b, &a1).await.unwrap_err();
        assert!(matches!(err, QueryError::RecordNotFound { .. }));
        let err = items.delete(&scope_b, a1.id).await.unwrap_err();
        assert!(matches!(err, QueryError::RecordNotFound { .. }));

        let page = items.page(&scope_b, &PageRequest::new(1, 10)).await.unwrap();
        assert_eq!(page.total_items, 1);
        assert_eq!(page.items[0].name, "b1");

        let found = items
            .find(&scope_b, &Predicate::like("name", "a%"))
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_pagination() {
        let provider = sqlite_provider().await;
        let items = provider.repository::<Item>().unwrap();
        let scope = OwnerScope::unscoped();
        seed(&items, &scope, 25).await;

        let first = items.page(&scope, &PageRequest::new(1, 10)).await.unwrap();
        assert_eq!(first.total_items, 25);
        assert_eq!(first.page_number, 1);
        assert_eq!(first.page_size, 10);
        assert_eq!(first.total_pages(), 3);
        assert_eq!(
            first.items.iter().map(|i| i.id).collect::<Vec<_>>(),
            (1..=10).collect::<Vec<i64>>()
        );

        let last = items.page(&scope, &PageRequest::new(3, 10)).await.unwrap();
        assert_eq!(last.items.len(), 5);
        assert_eq!(last.items[0].name, "Item 21");

        let beyond = items.page(&scope, &PageRequest::new(4, 10)).await.unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total_items, 25);

        let defaults = items.page(&scope, &PageRequest::new(0, 0)).await.unwrap();
        assert_eq!((defaults.page_number, defaults.page_size), (1, 10));

        let clamped = items.page(&scope, &PageRequest::new(1, 5000)).await.unwrap();
        assert_eq!(clamped.page_size, 100);
        assert_eq!(clamped.items.len(), 25);
    }

    #[tokio::test]
    async fn test_sorting_and_unknown_sort_key() {
        let provider = sqlite_provider().await;
        let items = provider.repository::<Item>().unwrap();
        let scope = OwnerScope::unscoped();
        seed(&items, &scope, 12).await;

        let by_name = items
            .page(&scope, &PageRequest::new(1, 3).sort_by("name", SortDirection::Desc))
            .await
            .unwrap();
        assert_eq!(
            by_name.items.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            vec!["Item 12", "Item 11", "Item 10"]
        );

        let ids = |page: Page<Item>| page.items.into_iter().map(|i| i.id).collect::<Vec<_>>();
        let unsorted = items.page(&scope, &PageRequest::new(1, 5)).await.unwrap();
        let unknown = items
            .page(&scope, &PageRequest::new(1, 5).sort_by("sku\"; --", SortDirection::Asc))
            .await
            .unwrap();
        assert_eq!(ids(unknown), ids(unsorted));

        let descending = items
            .page(&scope, &PageRequest::new(1, 2).sort_by("unknown", SortDirection::Desc))
            .await
            .unwrap();
        assert_eq!(ids(descending), vec![12, 11]);
    }

    #[tokio::test]
    async fn test_two_parameter_predicate() {
        let provider = sqlite_provider().await;
        let items = provider.repository::<Item>().unwrap();
        let scope = OwnerScope::unscoped();

        items.add(&scope, &Item::named("bolt", 5)).await.unwrap();
        let wanted = items.add(&scope, &Item::named("bolt", 20)).await.unwrap();
        items.add(&scope, &Item::named("nut", 20)).await.unwrap();

        let predicate = Predicate::eq("name", "bolt").and(Predicate::gt("quantity", 10));
        let filter = predicate
            .translate(&Item::table().unwrap(), Dialect::Sqlite)
            .unwrap();
        assert_eq!(filter.params.len(), 2);

        let found = items.find(&scope, &predicate).await.unwrap();
        assert_eq!(found, vec![wanted]);

        let count = items.count(&scope, Some(&predicate)).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_predicate_operators() {
        let provider = sqlite_provider().await;
        let items = provider.repository::<Item>().unwrap();
        let scope = OwnerScope::unscoped();

        let mut retired = Item::named("bracket", 1);
        retired.status = ItemStatus::Discontinued;
        retired.price = Decimal::new(1250, 2);
        items.add(&scope, &retired).await.unwrap();
        items.add(&scope, &Item::named("bolt", 2)).await.unwrap();
        items.add(&scope, &Item::named("nut", 3)).await.unwrap();

        let like = items.find(&scope, &Predicate::like("name", "b%")).await.unwrap();
        assert_eq!(like.len(), 2);

        let members = items
            .find(&scope, &Predicate::is_in("name", ["nut", "washer"]))
            .await
            .unwrap();
        assert_eq!(members.len(), 1);

        let discontinued = items
            .find(&scope, &Predicate::eq("status", "Discontinued"))
            .await
            .unwrap();
        assert_eq!(discontinued[0].name, "bracket");

        let pricey = items
            .find(&scope, &Predicate::gt("price", serde_json::json!("10.00")))
            .await
            .unwrap();
        assert_eq!(pricey.len(), 1);

        let either = Predicate::eq("name", "nut").or(Predicate::lt("quantity", 2));
        assert_eq!(items.find(&scope, &either).await.unwrap().len(), 2);

        let first = items
            .find_first(&scope, &Predicate::ne("name", "bracket"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.name, "bolt");

        let err = items
            .find(&scope, &Predicate::eq("colour", "red"))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Translation(_)));
    }

    #[tokio::test]
    async fn test_sync_scenario() {
        let provider = sqlite_provider().await;
        assert_eq!(provider.sync_report().tables_created, vec!["Items", "Categories"]);
        assert!(provider.sync_report().columns_added.is_empty());

        let again = SchemaSync::new(provider.executor().clone(), Arc::new(generator()))
            .run()
            .await
            .unwrap();
        assert!(again.is_empty());

        let items = provider.repository::<Item>().unwrap();
        let stored = items
            .add(&OwnerScope::unscoped(), &Item::named("only", 1))
            .await
            .unwrap();
        assert_eq!(items.list(&OwnerScope::unscoped()).await.unwrap(), vec![stored]);
    }

    #[tokio::test]
    async fn test_schema_evolution_adds_columns() {
        init_tracing();
        let backend = SqliteBackend::memory().await.unwrap();
        backend
            .execute(
                "CREATE TABLE \"Items\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"name\" TEXT)",
                &[],
            )
            .await
            .unwrap();
        backend
            .execute("INSERT INTO \"Items\" (\"name\") VALUES ('legacy')", &[])
            .await
            .unwrap();

        let provider = StorageProvider::with_backend(backend, &StoreConfig::default(), generator())
            .await
            .unwrap();
        let report = provider.sync_report();
        assert_eq!(report.tables_created, vec!["Categories"]);
        assert_eq!(
            report
                .columns_added
                .iter()
                .map(|(_, column)| column.as_str())
                .collect::<Vec<_>>(),
            vec!["sku", "quantity", "price", "status", "tags", "received_at", "owner_id"]
        );

        let items = provider.repository::<Item>().unwrap();
        let legacy = items.list(&OwnerScope::unscoped()).await.unwrap().remove(0);
        assert_eq!(legacy.name, "legacy");
        assert_eq!(legacy.sku, "");
        assert_eq!(legacy.quantity, 0);
        assert_eq!(legacy.price, Decimal::ZERO);
        assert_eq!(legacy.status, ItemStatus::Active);
        assert!(legacy.tags.is_empty());
        assert_eq!(legacy.received_at, DateTime::<Utc>::default());
        assert_eq!(legacy.owner_id, None);
    }

    #[tokio::test]
    async fn test_uuid_key_generated() {
        let provider = sqlite_provider().await;
        let categories = provider.repository::<Category>().unwrap();
        let scope = OwnerScope::unscoped();

        let stored = categories
            .add(&scope, &Category { name: "Fasteners".to_string(), ..Default::default() })
            .await
            .unwrap();
        assert!(!stored.id.is_nil());
        assert_eq!(stored.description, None);

        let fetched = categories.get(&scope, stored.id).await.unwrap();
        assert_eq!(fetched, Some(stored.clone()));

        let undescribed = categories
            .find(&scope, &Predicate::is_null("description"))
            .await
            .unwrap();
        assert_eq!(undescribed, vec![stored]);
    }

    #[tokio::test]
    async fn test_text_key_generated_when_empty() {
        init_tracing();
        let generator = SchemaGenerator::new().with::<Location>().unwrap();
        let provider: StorageProvider<SqliteBackend> =
            StorageProvider::connect(&StoreConfig::default(), generator).await.unwrap();
        let locations = provider.repository::<Location>().unwrap();
        let scope = OwnerScope::unscoped();

        let first = locations
            .add(&scope, &Location { aisle: "A1".to_string(), ..Default::default() })
            .await
            .unwrap();
        let second = locations
            .add(&scope, &Location { aisle: "A2".to_string(), ..Default::default() })
            .await
            .unwrap();
        assert!(!first.code.is_empty());
        assert_ne!(first.code, second.code);

        let named = locations
            .add(&scope, &Location { code: "B-07".to_string(), aisle: "B".to_string() })
            .await
            .unwrap();
        assert_eq!(named.code, "B-07");

        let fetched = locations.get(&scope, first.code.clone()).await.unwrap();
        assert_eq!(fetched, Some(first));
        assert_eq!(locations.count(&scope, None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_database_default_timestamp_matches_bound_form() {
        let provider = sqlite_provider().await;
        let items = provider.repository::<Item>().unwrap();
        let scope = OwnerScope::unscoped();

        provider
            .executor()
            .execute("INSERT INTO \"Items\" (\"name\") VALUES ('raw')", &ParameterSet::new())
            .await
            .unwrap();

        let stored = provider
            .executor()
            .scalar("SELECT \"received_at\" FROM \"Items\"", &ParameterSet::new())
            .await
            .unwrap()
            .unwrap();
        let text = stored.as_str().unwrap().to_string();
        assert_eq!(text.len(), "2024-01-01T00:00:00.000000000Z".len());
        assert!(text.ends_with("000000Z"));

        let raw = items.list(&scope).await.unwrap().remove(0);
        let same = items
            .find(&scope, &Predicate::eq("received_at", serde_json::json!(raw.received_at)))
            .await
            .unwrap();
        assert_eq!(same, vec![raw.clone()]);

        let later = Predicate::gt("received_at", serde_json::json!(raw.received_at));
        assert!(items.find(&scope, &later).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_first_or_add() {
        let provider = sqlite_provider().await;
        let categories = provider.repository::<Category>().unwrap();
        let scope = OwnerScope::unscoped();
        let lookup = Predicate::eq("name", "Tools");
        let record = Category {
            name: "Tools".to_string(),
            description: Some("Hand tools".to_string()),
            ..Default::default()
        };

        let first = categories.first_or_add(&scope, &lookup, &record).await.unwrap();
        let second = categories.first_or_add(&scope, &lookup, &record).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(categories.count(&scope, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_min_timestamp_stored_as_floor() {
        let provider = sqlite_provider().await;
        let items = provider.repository::<Item>().unwrap();
        let scope = OwnerScope::unscoped();

        let mut item = Item::named("ancient", 1);
        item.received_at = DateTime::<Utc>::MIN_UTC;
        let stored = items.add(&scope, &item).await.unwrap();
        assert_eq!(stored.received_at, Dialect::Sqlite.min_timestamp());
    }

    #[tokio::test]
    async fn test_unregistered_entity() {
        #[derive(Debug, Default, Serialize, Deserialize)]
        struct Stray {
            id: i64,
        }

        impl Entity for Stray {
            fn describe() -> TableBuilder {
                TableBuilder::new("Strays").key("id", FieldType::Int64)
            }
        }

        let provider = sqlite_provider().await;
        assert!(matches!(
            provider.repository::<Stray>(),
            Err(QueryError::Schema(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let result =
            StorageProvider::<SqliteBackend>::connect(&StoreConfig::new(""), generator()).await;
        assert!(matches!(result, Err(QueryError::Config(_))));
    }
}

#[cfg(feature = "postgres")]
mod postgres_tests {
    use super::*;
    use chrono::{DateTime, SubsecRound, Utc};

    fn config() -> StoreConfig {
        StoreConfig::new(
            std::env::var("INVENTORY_DB_URL")
                .unwrap_or_else(|_| "postgresql://localhost/inventory_query_test".to_string()),
        )
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running
    async fn test_postgres_round_trip_and_scope() {
        init_tracing();
        let provider: StorageProvider<PostgresBackend> =
            StorageProvider::connect(&config(), generator()).await.unwrap();
        let items = provider.repository::<Item>().unwrap();
        let owner = Uuid::new_v4();
        let scope = OwnerScope::owned_by(owner);

        let mut record = Item::named("pg bolt", 7);
        record.price = Decimal::new(1234, 3);
        record.tags = vec!["a".to_string(), "b".to_string()];
        record.received_at = "2024-03-01T08:30:00.123456789Z".parse::<DateTime<Utc>>().unwrap();
        let stored = items.add(&scope, &record).await.unwrap();
        assert_eq!(stored.owner_id, Some(owner));

        let fetched = items.get(&scope, stored.id).await.unwrap().unwrap();
        assert_eq!(fetched.price, Decimal::new(1234, 3));
        assert_eq!(fetched.tags, record.tags);
        assert_eq!(fetched.received_at, record.received_at.trunc_subsecs(6));

        let same_instant = items
            .find(&scope, &Predicate::eq("received_at", serde_json::json!(record.received_at)))
            .await
            .unwrap();
        assert_eq!(same_instant.len(), 1);

        let page = items
            .page(&scope, &PageRequest::new(1, 10).sort_by("name", SortDirection::Asc))
            .await
            .unwrap();
        assert_eq!(page.total_items, 1);

        items.delete(&scope, stored.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running
    async fn test_postgres_sync_is_idempotent() {
        init_tracing();
        let provider: StorageProvider<PostgresBackend> =
            StorageProvider::connect(&config(), generator()).await.unwrap();

        let again = SchemaSync::new(provider.executor().clone(), Arc::new(generator()))
            .run()
            .await
            .unwrap();
        assert!(again.is_empty());
    }
}
