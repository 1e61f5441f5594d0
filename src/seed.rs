// src/seed.rs
//
// Demo dataset for local development, gated by SEED_DEMO_DATA. Sample
// documents are loaded from the seed-data directory on disk; a missing file
// is logged and skipped so the seeder works without the assets.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::file::FileType;
use crate::utils::hash::hash_password;

const DEMO_USER_EMAIL: &str = "tabea@studyshare.dev";

/// Creates two demo users sharing a geography module with a card set, a
/// subdirectory and a sample file. Skipped entirely if the demo user exists.
pub async fn seed_demo_data(pool: &SqlitePool, seed_data_dir: &str) -> Result<(), AppError> {
    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(DEMO_USER_EMAIL)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        tracing::info!("Demo data already present, skipping seeding.");
        return Ok(());
    }

    tracing::info!("Seeding demo data...");
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    let tabea = insert_user(
        &mut tx,
        "Tabea",
        DEMO_USER_EMAIL,
        "Studies geography and shares her flash cards.",
    )
    .await?;
    let julian = insert_user(
        &mut tx,
        "Julian",
        "julian@studyshare.dev",
        "Mostly here for the quizzes.",
    )
    .await?;

    let (module_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO modules (name, description, visibility, score, creator_id, created_at)
        VALUES ('Geography', 'Regions, countries and capitals.', 'PUBLIC', 0, ?, ?)
        RETURNING id
        "#,
    )
    .bind(tabea)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    let (root_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO directories (name, visibility, creator_id, parent_id, module_id, created_at)
        VALUES ('Geography Directory', 'PUBLIC', ?, NULL, ?, ?)
        RETURNING id
        "#,
    )
    .bind(tabea)
    .bind(module_id)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE modules SET root_directory_id = ? WHERE id = ?")
        .bind(root_id)
        .bind(module_id)
        .execute(&mut *tx)
        .await?;

    for user_id in [tabea, julian] {
        sqlx::query("INSERT INTO module_owners (module_id, user_id) VALUES (?, ?)")
            .bind(module_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }

    let (sub_directory_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO directories (name, visibility, creator_id, parent_id, module_id, created_at)
        VALUES ('Geographic Regions', 'PUBLIC', ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(tabea)
    .bind(root_id)
    .bind(module_id)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    // Sample file, if the asset is on disk.
    if let Some(data) = load_seed_file(seed_data_dir, "countries_and_capitals.pdf") {
        let (document_id,): (i64,) = sqlx::query_as(
            "INSERT INTO documents (data, file_type) VALUES (?, 'PDF') RETURNING id",
        )
        .bind(data)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO files
                (name, visibility, file_type, creator_id, module_id, directory_id, document_id, created_at)
            VALUES ('Countries and Capitals', 'PUBLIC', ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(FileType::Pdf)
        .bind(tabea)
        .bind(module_id)
        .bind(sub_directory_id)
        .bind(document_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    let (card_set_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO card_sets (name, visibility, score, card_count, module_id, creator_id, created_at)
        VALUES ('Geography Quiz', 'PUBLIC', 0, 0, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(module_id)
    .bind(tabea)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    let cards = [
        (
            "What is the capital of France?",
            "Paris",
            vec!["Lyon", "Marseille", "Nice"],
        ),
        (
            "Which is the longest river on Earth?",
            "The Nile",
            vec!["The Amazon", "The Danube"],
        ),
        (
            "On which continent is the Atacama Desert?",
            "South America",
            vec!["Africa", "Asia", "Australia", "Europe"],
        ),
    ];

    for (question, answer, wrong) in cards {
        sqlx::query(
            r#"
            INSERT INTO cards
                (card_set_id, question_text, answer_text, wrong_answers,
                 status, flagged, creator_id, created_at)
            VALUES (?, ?, ?, ?, 'UNDONE', FALSE, ?, ?)
            "#,
        )
        .bind(card_set_id)
        .bind(question)
        .bind(answer)
        .bind(serde_json::to_string(&wrong)?)
        .bind(tabea)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        r#"
        UPDATE card_sets
        SET card_count = (SELECT COUNT(*) FROM cards WHERE card_set_id = card_sets.id)
        WHERE id = ?
        "#,
    )
    .bind(card_set_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE modules SET
            card_set_count = (SELECT COUNT(*) FROM card_sets WHERE module_id = modules.id),
            file_count = (SELECT COUNT(*) FROM files WHERE module_id = modules.id)
        WHERE id = ?
        "#,
    )
    .bind(module_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!("Demo data seeded successfully.");
    Ok(())
}

async fn insert_user(
    tx: &mut sqlx::SqliteConnection,
    name: &str,
    email: &str,
    description: &str,
) -> Result<i64, AppError> {
    let hashed = hash_password("password123")?;

    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO users (name, email, password, visibility, role, description, created_at)
        VALUES (?, ?, ?, 'PUBLIC', 'USER', ?, ?)
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(email)
    .bind(hashed)
    .bind(description)
    .bind(Utc::now())
    .fetch_one(tx)
    .await?;

    Ok(id)
}

/// The filesystem blob loader used only for seeding: returns the file's
/// bytes, or None when it is absent.
fn load_seed_file(seed_data_dir: &str, file_name: &str) -> Option<Vec<u8>> {
    let path = std::path::Path::new(seed_data_dir).join(file_name);
    match std::fs::read(&path) {
        Ok(data) => Some(data),
        Err(e) => {
            tracing::warn!("Seed asset {:?} not loaded: {}", path, e);
            None
        }
    }
}
