//! Integration tests against a real Postgres instance, driven by
//! `sqlx::test` (each test gets its own migrated, isolated database).
//! Run with `DATABASE_URL` pointing at a scratch Postgres server.

use sqlx::PgPool;
use tessera_core::domain::{GuaranteeEvaluationMode, ResourceType, UserRole};
use tessera_db::repo::assets::NewAsset;
use tessera_db::repo::{AssetRepo, TeamRepo, UserRepo};

#[sqlx::test(migrations = "./migrations")]
async fn team_create_and_lookup_roundtrips(pool: PgPool) {
    let teams = TeamRepo::new(pool);
    let team = teams
        .create("Payments", serde_json::json!({"slack": "#payments"}))
        .await
        .unwrap();
    assert_eq!(team.name, "Payments");

    let fetched = teams.get(team.id).await.unwrap();
    assert_eq!(fetched.id, team.id);
}

#[sqlx::test(migrations = "./migrations")]
async fn team_name_uniqueness_is_case_insensitive(pool: PgPool) {
    let teams = TeamRepo::new(pool);
    teams.create("Growth", serde_json::json!({})).await.unwrap();
    let err = teams.create("growth", serde_json::json!({})).await;
    assert!(err.is_err());
}

#[sqlx::test(migrations = "./migrations")]
async fn asset_owner_must_belong_to_owner_team_is_enforced_above_this_layer(pool: PgPool) {
    let teams = TeamRepo::new(pool.clone());
    let users = UserRepo::new(pool.clone());
    let assets = AssetRepo::new(pool);

    let team = teams.create("Data Platform", serde_json::json!({})).await.unwrap();
    let user = users
        .create("alice@example.com", "Alice", None, UserRole::User, Some(team.id))
        .await
        .unwrap();

    let asset = assets
        .create(NewAsset {
            fqn: "warehouse.public.orders",
            owner_team: team.id,
            owner_user: Some(user.id),
            environment: "production",
            resource_type: ResourceType::Model,
            guarantee_evaluation_mode: GuaranteeEvaluationMode::Automatic,
            metadata: serde_json::json!({}),
        })
        .await
        .unwrap();

    assert!(asset.check_owner_invariant(user.team_id));
}

#[sqlx::test(migrations = "./migrations")]
async fn soft_deleted_asset_is_excluded_from_lookups(pool: PgPool) {
    let teams = TeamRepo::new(pool.clone());
    let assets = AssetRepo::new(pool);
    let team = teams.create("Analytics", serde_json::json!({})).await.unwrap();

    let asset = assets
        .create(NewAsset {
            fqn: "warehouse.public.events",
            owner_team: team.id,
            owner_user: None,
            environment: "production",
            resource_type: ResourceType::Source,
            guarantee_evaluation_mode: GuaranteeEvaluationMode::Manual,
            metadata: serde_json::json!({}),
        })
        .await
        .unwrap();

    assets.soft_delete(asset.id).await.unwrap();
    assert!(assets.get(asset.id).await.is_err());
}
