// tests/card_set_tests.rs

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use studyshare::{config::Config, routes, state::AppState};

async fn spawn_app() -> String {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("Failed to parse SQLite options")
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("Failed to open in-memory SQLite database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "card_set_test_secret".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        seed_demo_data: false,
        seed_data_dir: "seed_data".to_string(),
    };

    let state = AppState { pool, config };
    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

async fn register_user(client: &reqwest::Client, address: &str) -> (i64, String) {
    let name = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let body: serde_json::Value = client
        .post(&format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "name": name,
            "email": format!("{}@example.com", name),
            "password": "password123",
            "visibility": "PUBLIC",
            "role": "USER",
            "description": "test user"
        }))
        .send()
        .await
        .expect("Register failed")
        .json()
        .await
        .unwrap();
    (
        body["user"]["id"].as_i64().unwrap(),
        body["token"].as_str().unwrap().to_string(),
    )
}

async fn create_module(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    owner_ids: &[i64],
    visibility: &str,
) -> i64 {
    let module: serde_json::Value = client
        .post(&format!("{}/api/modules", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "name": "Module",
            "description": "",
            "visibility": visibility,
            "score": 0,
            "owner_ids": owner_ids,
            "root_directory": { "name": "Root", "visibility": visibility }
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    module["id"].as_i64().unwrap()
}

async fn create_card_set(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    module_id: i64,
    visibility: &str,
) -> i64 {
    let response = client
        .post(&format!("{}/api/card-sets", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "name": "Quiz",
            "visibility": visibility,
            "score": 0,
            "card_count": 0,
            "module_id": module_id
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let card_set: serde_json::Value = response.json().await.unwrap();
    card_set["id"].as_i64().unwrap()
}

fn card_json(card_set_id: i64, status: &str) -> serde_json::Value {
    serde_json::json!({
        "question": { "text": "question?", "document_id": null },
        "answer": { "text": "answer", "document_id": null },
        "wrong_answers": ["w1", "w2"],
        "status": status,
        "flagged": false,
        "card_set_id": card_set_id
    })
}

async fn create_card(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    card_set_id: i64,
    status: &str,
) -> serde_json::Value {
    let form = reqwest::multipart::Form::new()
        .text("card", card_json(card_set_id, status).to_string());
    let response = client
        .post(&format!("{}/api/cards", address))
        .header("Authorization", format!("Bearer {}", token))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    response.json().await.unwrap()
}

async fn get_json(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    path: &str,
) -> serde_json::Value {
    client
        .get(&format!("{}{}", address, path))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn create_card_set_reports_missing_fields() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (user_id, token) = register_user(&client, &address).await;
    let module_id = create_module(&client, &address, &token, &[user_id], "PRIVATE").await;

    let response = client
        .post(&format!("{}/api/card-sets", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "name": "Quiz",
            "visibility": "PRIVATE",
            "module_id": module_id
            // score and card_count missing
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("score"));
    assert!(message.contains("card_count"));
}

#[tokio::test]
async fn scores_propagate_from_cards_to_module() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (user_id, token) = register_user(&client, &address).await;
    let module_id = create_module(&client, &address, &token, &[user_id], "PRIVATE").await;
    let card_set_id = create_card_set(&client, &address, &token, module_id, "PRIVATE").await;

    // GOOD (4) + BAD (1) of 8 possible points -> 62.5% -> 63.
    create_card(&client, &address, &token, card_set_id, "GOOD").await;
    create_card(&client, &address, &token, card_set_id, "BAD").await;

    let card_set = get_json(
        &client,
        &address,
        &token,
        &format!("/api/card-sets/{}", card_set_id),
    )
    .await;
    assert_eq!(card_set["card_count"], 2);
    assert_eq!(card_set["score"], 63);

    let module = get_json(&client, &address, &token, &format!("/api/modules/{}", module_id)).await;
    assert_eq!(module["score"], 63);
    assert_eq!(module["card_set_count"], 1);
}

#[tokio::test]
async fn module_score_averages_non_empty_card_sets() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (user_id, token) = register_user(&client, &address).await;
    let module_id = create_module(&client, &address, &token, &[user_id], "PRIVATE").await;

    // Set one: GOOD,GOOD,GOOD,GOOD,UNDONE -> 16/20 -> 80.
    let set_one = create_card_set(&client, &address, &token, module_id, "PRIVATE").await;
    for status in ["GOOD", "GOOD", "GOOD", "GOOD", "UNDONE"] {
        create_card(&client, &address, &token, set_one, status).await;
    }

    // Set two: a single GOOD card -> 100.
    let set_two = create_card_set(&client, &address, &token, module_id, "PRIVATE").await;
    create_card(&client, &address, &token, set_two, "GOOD").await;

    // Set three stays empty and is excluded from the average.
    create_card_set(&client, &address, &token, module_id, "PRIVATE").await;

    let module = get_json(&client, &address, &token, &format!("/api/modules/{}", module_id)).await;
    assert_eq!(module["score"], 90);
    assert_eq!(module["card_set_count"], 3);
}

#[tokio::test]
async fn card_status_update_recomputes_scores_and_delete_restores_them() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (user_id, token) = register_user(&client, &address).await;
    let module_id = create_module(&client, &address, &token, &[user_id], "PRIVATE").await;
    let card_set_id = create_card_set(&client, &address, &token, module_id, "PRIVATE").await;

    let card = create_card(&client, &address, &token, card_set_id, "UNDONE").await;
    let card_id = card["id"].as_i64().unwrap();

    // Upgrade UNDONE -> GOOD: a single card set scores 100.
    let form = reqwest::multipart::Form::new()
        .text("card", card_json(card_set_id, "GOOD").to_string());
    let response = client
        .put(&format!("{}/api/cards/{}", address, card_id))
        .header("Authorization", format!("Bearer {}", token))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let card_set = get_json(
        &client,
        &address,
        &token,
        &format!("/api/card-sets/{}", card_set_id),
    )
    .await;
    assert_eq!(card_set["score"], 100);

    // Deleting the card empties the set: count and scores drop to zero.
    let response = client
        .delete(&format!("{}/api/cards/{}", address, card_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let card_set = get_json(
        &client,
        &address,
        &token,
        &format!("/api/card-sets/{}", card_set_id),
    )
    .await;
    assert_eq!(card_set["card_count"], 0);
    assert_eq!(card_set["score"], 0);

    let module = get_json(&client, &address, &token, &format!("/api/modules/{}", module_id)).await;
    assert_eq!(module["score"], 0);
}

#[tokio::test]
async fn card_validation_rejects_missing_and_oversized_fields() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (user_id, token) = register_user(&client, &address).await;
    let module_id = create_module(&client, &address, &token, &[user_id], "PRIVATE").await;
    let card_set_id = create_card_set(&client, &address, &token, module_id, "PRIVATE").await;

    // Missing `flagged`.
    let mut incomplete = card_json(card_set_id, "UNDONE");
    incomplete.as_object_mut().unwrap().remove("flagged");
    let form = reqwest::multipart::Form::new().text("card", incomplete.to_string());
    let response = client
        .post(&format!("{}/api/cards", address))
        .header("Authorization", format!("Bearer {}", token))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("flagged"));

    // Five wrong answers are one too many.
    let mut too_many = card_json(card_set_id, "UNDONE");
    too_many["wrong_answers"] = serde_json::json!(["a", "b", "c", "d", "e"]);
    let form = reqwest::multipart::Form::new().text("card", too_many.to_string());
    let response = client
        .post(&format!("{}/api/cards", address))
        .header("Authorization", format!("Bearer {}", token))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("wrong_answers"));
}

#[tokio::test]
async fn non_owner_cannot_create_cards_in_a_public_module() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (owner_id, owner_token) = register_user(&client, &address).await;
    let (_, other_token) = register_user(&client, &address).await;
    let module_id = create_module(&client, &address, &owner_token, &[owner_id], "PUBLIC").await;
    let card_set_id = create_card_set(&client, &address, &owner_token, module_id, "PUBLIC").await;

    let form = reqwest::multipart::Form::new()
        .text("card", card_json(card_set_id, "UNDONE").to_string());
    let response = client
        .post(&format!("{}/api/cards", address))
        .header("Authorization", format!("Bearer {}", other_token))
        .multipart(form)
        .send()
        .await
        .unwrap();

    // Public visibility grants reads, never writes.
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn copying_a_card_set_resets_progress_and_duplicates_documents() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (owner_id, owner_token) = register_user(&client, &address).await;
    let (copier_id, copier_token) = register_user(&client, &address).await;

    let source_module_id =
        create_module(&client, &address, &owner_token, &[owner_id], "PUBLIC").await;
    let source_set_id =
        create_card_set(&client, &address, &owner_token, source_module_id, "PUBLIC").await;

    // One card carries a question image.
    let image_bytes: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    let form = reqwest::multipart::Form::new()
        .text("card", card_json(source_set_id, "GOOD").to_string())
        .part(
            "question_image",
            reqwest::multipart::Part::bytes(image_bytes.to_vec())
                .file_name("question.png")
                .mime_str("image/png")
                .unwrap(),
        );
    let response = client
        .post(&format!("{}/api/cards", address))
        .header("Authorization", format!("Bearer {}", owner_token))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let source_card: serde_json::Value = response.json().await.unwrap();
    let source_document_id = source_card["question"]["document_id"].as_i64().unwrap();

    create_card(&client, &address, &owner_token, source_set_id, "BAD").await;

    // The copier copies the public set into their own module.
    let target_module_id =
        create_module(&client, &address, &copier_token, &[copier_id], "PRIVATE").await;
    let response = client
        .post(&format!(
            "{}/api/card-sets/{}/copy/{}",
            address, source_set_id, target_module_id
        ))
        .header("Authorization", format!("Bearer {}", copier_token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let copy: serde_json::Value = response.json().await.unwrap();

    assert_eq!(copy["name"], "(COPY) Quiz");
    assert_eq!(copy["visibility"], "PRIVATE");
    assert_eq!(copy["score"], 0);
    assert_eq!(copy["card_count"], 2);
    assert_eq!(copy["origin_card_set_id"].as_i64().unwrap(), source_set_id);

    let copied_cards: Vec<serde_json::Value> = client
        .get(&format!(
            "{}/api/card-sets/{}/cards",
            address,
            copy["id"].as_i64().unwrap()
        ))
        .header("Authorization", format!("Bearer {}", copier_token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(copied_cards.len(), 2);
    for card in &copied_cards {
        assert_eq!(card["status"], "UNDONE");
        assert_eq!(card["flagged"], false);
    }

    // The image was copied into a fresh document with identical bytes.
    let copied_document_id = copied_cards
        .iter()
        .find_map(|c| c["question"]["document_id"].as_i64())
        .expect("copied card should carry a question document");
    assert_ne!(copied_document_id, source_document_id);

    let copied_bytes = client
        .get(&format!(
            "{}/api/files/documents/{}",
            address, copied_document_id
        ))
        .header("Authorization", format!("Bearer {}", copier_token))
        .send()
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(copied_bytes.as_ref(), image_bytes);
}

#[tokio::test]
async fn copying_a_private_card_set_requires_source_access() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (owner_id, owner_token) = register_user(&client, &address).await;
    let (copier_id, copier_token) = register_user(&client, &address).await;

    let source_module_id =
        create_module(&client, &address, &owner_token, &[owner_id], "PRIVATE").await;
    let source_set_id =
        create_card_set(&client, &address, &owner_token, source_module_id, "PRIVATE").await;
    let target_module_id =
        create_module(&client, &address, &copier_token, &[copier_id], "PRIVATE").await;

    let response = client
        .post(&format!(
            "{}/api/card-sets/{}/copy/{}",
            address, source_set_id, target_module_id
        ))
        .header("Authorization", format!("Bearer {}", copier_token))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn deleting_a_card_set_updates_the_module() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (user_id, token) = register_user(&client, &address).await;
    let module_id = create_module(&client, &address, &token, &[user_id], "PRIVATE").await;
    let card_set_id = create_card_set(&client, &address, &token, module_id, "PRIVATE").await;
    create_card(&client, &address, &token, card_set_id, "GOOD").await;

    let response = client
        .delete(&format!("{}/api/card-sets/{}", address, card_set_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let response = client
        .get(&format!("{}/api/card-sets/{}", address, card_set_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let module = get_json(&client, &address, &token, &format!("/api/modules/{}", module_id)).await;
    assert_eq!(module["card_set_count"], 0);
    assert_eq!(module["score"], 0);
}
