use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aws_catalog_sync::catalog::{CatalogConnection, EntityMutation, MockCatalogClient};
use aws_catalog_sync::cloud::{
    BucketRecord, ClusterRecord, DbInstanceRecord, MockEksApi, MockEksApiFactory, MockRdsApi,
    MockRdsApiFactory, MockS3Api, MockS3ApiFactory,
};
use aws_catalog_sync::config::{ProviderKind, ProviderSettings};
use aws_catalog_sync::credentials::{AwsCredentials, MockCredentialResolver};
use aws_catalog_sync::error::SyncError;
use aws_catalog_sync::fetch::{Page, RetryPolicy};
use aws_catalog_sync::provider::{Provider, RunOptions};
use aws_catalog_sync::providers::{EksClusterProvider, RdsInstanceProvider, S3BucketProvider};
use aws_catalog_sync::tags::ResourceTag;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn settings(kind: ProviderKind) -> ProviderSettings {
    ProviderSettings {
        kind,
        account_id: Some("111122223333".to_string()),
        role_name: Some("ReadOnly".to_string()),
        region: Some("us-east-1".to_string()),
        role_arn: None,
        external_id: None,
        owner_tag: None,
        provider_id: None,
        use_temporary_credentials: false,
    }
}

fn static_credentials() -> MockCredentialResolver {
    let mut resolver = MockCredentialResolver::new();
    resolver.expect_resolve().returning(|_, _| {
        Ok(AwsCredentials {
            access_key_id: "AKIATEST".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: None,
        })
    });
    resolver
}

/// Two bucket pages tagged for a known group must land in the catalog as a
/// single full mutation keyed by the provider name, with the exact wire
/// shape asserted.
#[tokio::test]
async fn bucket_run_applies_one_full_mutation_for_all_pages() {
    let mut api = MockS3Api::new();
    api.expect_list_buckets()
        .withf(|page_size, cursor| *page_size == 100 && cursor.is_none())
        .return_once(|_, _| {
            Ok(Page::new(
                vec![BucketRecord {
                    name: Some("my-bucket-1".to_string()),
                }],
                Some("page-2".to_string()),
            ))
        });
    api.expect_list_buckets()
        .withf(|_, cursor| cursor.as_deref() == Some("page-2"))
        .return_once(|_, _| {
            Ok(Page::last(vec![BucketRecord {
                name: Some("my-bucket-2".to_string()),
            }]))
        });
    api.expect_bucket_tags()
        .times(2)
        .returning(|_| Ok(vec![ResourceTag::new("owner", "team-a")]));

    let mut factory = MockS3ApiFactory::new();
    factory
        .expect_connect()
        .withf(|credentials, region| {
            credentials.access_key_id == "AKIATEST" && region == "us-east-1"
        })
        .return_once(move |_, _| Ok(Box::new(api)));

    let entity = |bucket: &str| {
        json!({
            "apiVersion": "backstage.io/v1beta1",
            "kind": "Resource",
            "metadata": {
                "name": format!("arn-aws-s3---{bucket}"),
                "title": bucket,
                "labels": { "owner": "team-a" },
                "annotations": {
                    "amazonaws.com/account-id": "111122223333",
                    "amazonaws.com/s3-bucket-arn": format!("arn:aws:s3:::{bucket}"),
                    "backstage.io/managed-by-location": "aws:111122223333:us-east-1",
                    "backstage.io/managed-by-origin-location": "aws:111122223333:us-east-1",
                    "backstage.io/view-url": format!("https://s3.console.aws.amazon.com/s3/buckets/{bucket}")
                }
            },
            "spec": { "type": "s3-bucket", "owner": "team-a" }
        })
    };
    let expected = json!({
        "type": "full",
        "entities": [
            { "entity": entity("my-bucket-1"), "locationKey": "aws-s3-bucket-111122223333-0" },
            { "entity": entity("my-bucket-2"), "locationKey": "aws-s3-bucket-111122223333-0" },
        ]
    });

    let mut catalog = MockCatalogClient::new();
    catalog
        .expect_list_groups()
        .return_once(|| Ok(vec!["team-a".to_string()]));
    catalog
        .expect_apply_mutation()
        .withf(move |mutation| {
            serde_json::to_value(mutation).expect("mutation should serialize") == expected
        })
        .return_once(|_| Ok(()));

    let mut provider = S3BucketProvider::from_config(
        &settings(ProviderKind::S3Bucket),
        Arc::new(static_credentials()),
        Arc::new(factory),
        RunOptions::default(),
    )
    .expect("settings should be valid");
    let connection: CatalogConnection = Arc::new(catalog);
    provider.attach(connection);

    let summary = provider.run(None).await.expect("run should succeed");
    assert_eq!(summary.provider, "aws-s3-bucket-111122223333-0");
    assert_eq!(summary.entities, 2);
    assert_eq!(summary.pages, 2);
}

/// A failure on any page must leave the catalog untouched.
#[tokio::test]
async fn failed_page_fetch_applies_no_mutation() {
    let mut api = MockS3Api::new();
    api.expect_list_buckets()
        .withf(|_, cursor| cursor.is_none())
        .return_once(|_, _| {
            Ok(Page::new(
                vec![BucketRecord {
                    name: Some("my-bucket-1".to_string()),
                }],
                Some("page-2".to_string()),
            ))
        });
    api.expect_list_buckets()
        .withf(|_, cursor| cursor.as_deref() == Some("page-2"))
        .return_once(|_, _| Err(SyncError::fetch("access denied on page two")));
    api.expect_bucket_tags().returning(|_| Ok(vec![]));

    let mut factory = MockS3ApiFactory::new();
    factory
        .expect_connect()
        .return_once(move |_, _| Ok(Box::new(api)));

    let mut catalog = MockCatalogClient::new();
    catalog.expect_list_groups().return_once(|| Ok(vec![]));
    catalog.expect_apply_mutation().times(0);

    let mut provider = S3BucketProvider::from_config(
        &settings(ProviderKind::S3Bucket),
        Arc::new(static_credentials()),
        Arc::new(factory),
        RunOptions::default(),
    )
    .expect("settings should be valid");
    let connection: CatalogConnection = Arc::new(catalog);
    provider.attach(connection);

    let err = provider
        .run(None)
        .await
        .expect_err("second page fails the run");
    assert!(matches!(err, SyncError::Fetch { .. }));
}

#[tokio::test]
async fn running_before_attach_is_reported_as_not_initialized() {
    let provider = S3BucketProvider::from_config(
        &settings(ProviderKind::S3Bucket),
        Arc::new(MockCredentialResolver::new()),
        Arc::new(MockS3ApiFactory::new()),
        RunOptions::default(),
    )
    .expect("settings should be valid");

    let err = provider
        .run(None)
        .await
        .expect_err("no connection attached");
    assert!(matches!(err, SyncError::NotInitialized));
}

/// Throttled listings retry within the run and still produce one mutation.
#[tokio::test]
async fn throttled_listing_retries_and_completes_the_run() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let mut api = MockS3Api::new();
    api.expect_list_buckets().times(2).returning(move |_, _| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(SyncError::throttled("slow down"))
        } else {
            Ok(Page::last(vec![BucketRecord {
                name: Some("my-bucket-1".to_string()),
            }]))
        }
    });
    api.expect_bucket_tags().return_once(|_| Ok(vec![]));

    let mut factory = MockS3ApiFactory::new();
    factory
        .expect_connect()
        .return_once(move |_, _| Ok(Box::new(api)));

    let mut catalog = MockCatalogClient::new();
    catalog.expect_list_groups().return_once(|| Ok(vec![]));
    catalog
        .expect_apply_mutation()
        .withf(|mutation| mutation.entities.len() == 1)
        .return_once(|_| Ok(()));

    let options = RunOptions {
        retry: RetryPolicy {
            base_delay: Duration::from_millis(1),
            ..RetryPolicy::default()
        },
        ..RunOptions::default()
    };
    let mut provider = S3BucketProvider::from_config(
        &settings(ProviderKind::S3Bucket),
        Arc::new(static_credentials()),
        Arc::new(factory),
        options,
    )
    .expect("settings should be valid");
    let connection: CatalogConnection = Arc::new(catalog);
    provider.attach(connection);

    let summary = provider.run(None).await.expect("retry should recover");
    assert_eq!(summary.entities, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cancelled_runs_stop_at_the_page_boundary_without_writing() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut api = MockS3Api::new();
    api.expect_list_buckets().times(0);
    let mut factory = MockS3ApiFactory::new();
    factory
        .expect_connect()
        .return_once(move |_, _| Ok(Box::new(api)));

    let mut catalog = MockCatalogClient::new();
    catalog.expect_list_groups().return_once(|| Ok(vec![]));
    catalog.expect_apply_mutation().times(0);

    let options = RunOptions {
        cancel: cancel.clone(),
        ..RunOptions::default()
    };
    let mut provider = S3BucketProvider::from_config(
        &settings(ProviderKind::S3Bucket),
        Arc::new(static_credentials()),
        Arc::new(factory),
        options,
    )
    .expect("settings should be valid");
    let connection: CatalogConnection = Arc::new(catalog);
    provider.attach(connection);

    let err = provider.run(None).await.expect_err("cancelled");
    assert!(matches!(err, SyncError::Cancelled));
}

/// Listings return names only; every non-blank name costs one describe call.
#[tokio::test]
async fn cluster_run_describes_each_listed_name_and_skips_blanks() {
    let mut api = MockEksApi::new();
    api.expect_list_cluster_names()
        .withf(|page_size, cursor| *page_size == 25 && cursor.is_none())
        .return_once(|_, _| {
            Ok(Page::last(vec![
                "prod".to_string(),
                String::new(),
                "staging".to_string(),
            ]))
        });
    api.expect_describe_cluster()
        .withf(|name| name == "prod")
        .return_once(|name| {
            Ok(ClusterRecord {
                name: name.to_string(),
                arn: Some("arn:aws:eks:us-east-1:111122223333:cluster/prod".to_string()),
                role_arn: None,
                tags: vec![ResourceTag::new("owner", "team-a")],
            })
        });
    api.expect_describe_cluster()
        .withf(|name| name == "staging")
        .return_once(|name| {
            Ok(ClusterRecord {
                name: name.to_string(),
                ..ClusterRecord::default()
            })
        });

    let mut factory = MockEksApiFactory::new();
    factory
        .expect_connect()
        .return_once(move |_, _| Ok(Box::new(api)));

    let mut catalog = MockCatalogClient::new();
    catalog
        .expect_list_groups()
        .return_once(|| Ok(vec!["team-a".to_string()]));
    catalog
        .expect_apply_mutation()
        .withf(|mutation| {
            mutation.mutation_type == EntityMutation::FULL
                && mutation.entities.len() == 2
                && mutation
                    .entities
                    .iter()
                    .all(|entry| entry.location_key == "aws-eks-cluster-111122223333-0")
                && mutation.entities[0].entity.metadata.name == "prod"
                && mutation.entities[0].entity.spec.owner == "team-a"
                && mutation.entities[1].entity.metadata.name == "staging"
                && mutation.entities[1].entity.spec.owner == "unknown"
        })
        .return_once(|_| Ok(()));

    let mut provider = EksClusterProvider::from_config(
        &settings(ProviderKind::EksCluster),
        Arc::new(static_credentials()),
        Arc::new(factory),
        RunOptions::default(),
    )
    .expect("settings should be valid");
    let connection: CatalogConnection = Arc::new(catalog);
    provider.attach(connection);

    let summary = provider.run(None).await.expect("run should succeed");
    assert_eq!(summary.provider, "aws-eks-cluster-111122223333-0");
    assert_eq!(summary.entities, 2);
}

/// Records without identifying fields are skipped, the per-run region
/// override drives both the connection and the annotations, and the
/// configured provider id lands in the name.
#[tokio::test]
async fn database_run_skips_incomplete_records_and_honors_overrides() {
    let mut api = MockRdsApi::new();
    api.expect_describe_db_instances()
        .withf(|page_size, cursor| *page_size == 100 && cursor.is_none())
        .return_once(|_, _| {
            Ok(Page::last(vec![
                DbInstanceRecord {
                    instance_id: Some("orders-db".to_string()),
                    instance_arn: Some(
                        "arn:aws:rds:eu-west-1:111122223333:db:orders-db".to_string(),
                    ),
                    engine: Some("postgres".to_string()),
                    ..DbInstanceRecord::default()
                },
                DbInstanceRecord::default(),
            ]))
        });

    let mut factory = MockRdsApiFactory::new();
    factory
        .expect_connect()
        .withf(|_, region| region == "eu-west-1")
        .return_once(move |_, _| Ok(Box::new(api)));

    let mut catalog = MockCatalogClient::new();
    catalog.expect_list_groups().return_once(|| Ok(vec![]));
    catalog
        .expect_apply_mutation()
        .withf(|mutation| {
            mutation.entities.len() == 1
                && mutation.entities[0].entity.metadata.name == "orders-db"
                && mutation.entities[0]
                    .entity
                    .metadata
                    .annotations
                    .get("backstage.io/managed-by-location")
                    .map(String::as_str)
                    == Some("aws:111122223333:eu-west-1")
                && mutation.entities[0].location_key == "aws-rds-provider-111122223333-main"
        })
        .return_once(|_| Ok(()));

    let mut entry = settings(ProviderKind::RdsInstance);
    entry.provider_id = Some("main".to_string());
    let mut provider = RdsInstanceProvider::from_config(
        &entry,
        Arc::new(static_credentials()),
        Arc::new(factory),
        RunOptions::default(),
    )
    .expect("settings should be valid");
    let connection: CatalogConnection = Arc::new(catalog);
    provider.attach(connection);

    let summary = provider
        .run(Some("eu-west-1"))
        .await
        .expect("run should succeed");
    assert_eq!(summary.provider, "aws-rds-provider-111122223333-main");
    assert_eq!(summary.entities, 1);
}

#[tokio::test]
async fn credential_failure_aborts_the_run_before_any_fetch() {
    let mut resolver = MockCredentialResolver::new();
    resolver
        .expect_resolve()
        .return_once(|_, _| Err(SyncError::auth("role assumption denied")));

    let mut factory = MockS3ApiFactory::new();
    factory.expect_connect().times(0);

    let mut catalog = MockCatalogClient::new();
    catalog.expect_list_groups().return_once(|| Ok(vec![]));
    catalog.expect_apply_mutation().times(0);

    let mut provider = S3BucketProvider::from_config(
        &settings(ProviderKind::S3Bucket),
        Arc::new(resolver),
        Arc::new(factory),
        RunOptions::default(),
    )
    .expect("settings should be valid");
    let connection: CatalogConnection = Arc::new(catalog);
    provider.attach(connection);

    let err = provider.run(None).await.expect_err("credentials fail");
    assert!(matches!(err, SyncError::Auth { .. }));
}

#[tokio::test]
async fn temporary_credentials_are_requested_when_configured() {
    let mut resolver = MockCredentialResolver::new();
    resolver
        .expect_resolve()
        .withf(|identity, temporary| {
            *temporary
                && identity.account_id == "111122223333"
                && identity.assume_role_arn() == "arn:aws:iam::111122223333:role/ReadOnly"
        })
        .return_once(|_, _| {
            Ok(AwsCredentials {
                access_key_id: "ASIATEMP".to_string(),
                secret_access_key: "secret".to_string(),
                session_token: Some("token".to_string()),
            })
        });

    let mut api = MockS3Api::new();
    api.expect_list_buckets()
        .return_once(|_, _| Ok(Page::last(vec![])));
    let mut factory = MockS3ApiFactory::new();
    factory
        .expect_connect()
        .withf(|credentials, _| credentials.session_token.as_deref() == Some("token"))
        .return_once(move |_, _| Ok(Box::new(api)));

    let mut catalog = MockCatalogClient::new();
    catalog.expect_list_groups().return_once(|| Ok(vec![]));
    catalog
        .expect_apply_mutation()
        .withf(|mutation| mutation.entities.is_empty())
        .return_once(|_| Ok(()));

    let mut entry = settings(ProviderKind::S3Bucket);
    entry.use_temporary_credentials = true;
    let mut provider = S3BucketProvider::from_config(
        &entry,
        Arc::new(resolver),
        Arc::new(factory),
        RunOptions::default(),
    )
    .expect("settings should be valid");
    let connection: CatalogConnection = Arc::new(catalog);
    provider.attach(connection);

    let summary = provider.run(None).await.expect("run should succeed");
    assert_eq!(summary.entities, 0);
}

/// An account with nothing to report still replaces its previous entity
/// set, and a catalog rejection surfaces as a catalog error.
#[tokio::test]
async fn empty_result_sets_still_apply_and_catalog_rejections_surface() {
    let mut api = MockS3Api::new();
    api.expect_list_buckets()
        .return_once(|_, _| Ok(Page::last(vec![])));
    let mut factory = MockS3ApiFactory::new();
    factory
        .expect_connect()
        .return_once(move |_, _| Ok(Box::new(api)));

    let mut catalog = MockCatalogClient::new();
    catalog.expect_list_groups().return_once(|| Ok(vec![]));
    catalog
        .expect_apply_mutation()
        .withf(|mutation| {
            mutation.mutation_type == EntityMutation::FULL && mutation.entities.is_empty()
        })
        .return_once(|_| Err(SyncError::catalog("mutation rejected: HTTP 500")));

    let mut provider = S3BucketProvider::from_config(
        &settings(ProviderKind::S3Bucket),
        Arc::new(static_credentials()),
        Arc::new(factory),
        RunOptions::default(),
    )
    .expect("settings should be valid");
    let connection: CatalogConnection = Arc::new(catalog);
    provider.attach(connection);

    let err = provider.run(None).await.expect_err("catalog rejects");
    assert!(matches!(err, SyncError::Catalog { .. }));
}

/// Names that truncate to the same slug are still all emitted; the
/// collision is logged, not fixed up.
#[tokio::test]
async fn truncation_collisions_still_emit_both_entities() {
    let long_a = format!("{}-alpha", "a".repeat(70));
    let long_b = format!("{}-beta", "a".repeat(70));

    let mut api = MockS3Api::new();
    let page = vec![
        BucketRecord {
            name: Some(long_a.clone()),
        },
        BucketRecord {
            name: Some(long_b.clone()),
        },
    ];
    api.expect_list_buckets()
        .return_once(move |_, _| Ok(Page::last(page)));
    api.expect_bucket_tags().times(2).returning(|_| Ok(vec![]));

    let mut factory = MockS3ApiFactory::new();
    factory
        .expect_connect()
        .return_once(move |_, _| Ok(Box::new(api)));

    let mut catalog = MockCatalogClient::new();
    catalog.expect_list_groups().return_once(|| Ok(vec![]));
    catalog
        .expect_apply_mutation()
        .withf(move |mutation| {
            mutation.entities.len() == 2
                && mutation.entities[0].entity.metadata.name
                    == mutation.entities[1].entity.metadata.name
                && mutation.entities[0].entity.metadata.title
                    != mutation.entities[1].entity.metadata.title
        })
        .return_once(|_| Ok(()));

    let mut provider = S3BucketProvider::from_config(
        &settings(ProviderKind::S3Bucket),
        Arc::new(static_credentials()),
        Arc::new(factory),
        RunOptions::default(),
    )
    .expect("settings should be valid");
    let connection: CatalogConnection = Arc::new(catalog);
    provider.attach(connection);

    let summary = provider.run(None).await.expect("run should succeed");
    assert_eq!(summary.entities, 2);
}

#[test]
fn missing_required_settings_fail_provider_construction() {
    let mut incomplete = settings(ProviderKind::S3Bucket);
    incomplete.account_id = None;

    let err = S3BucketProvider::from_config(
        &incomplete,
        Arc::new(MockCredentialResolver::new()),
        Arc::new(MockS3ApiFactory::new()),
        RunOptions::default(),
    )
    .expect_err("account id is required");
    assert!(err.to_string().contains("account_id"));
}
