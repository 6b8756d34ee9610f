use std::sync::Arc;

use argon2::password_hash::{PasswordHasher, SaltString, rand_core::OsRng};
use argon2::{Algorithm, Argon2, Params, Version};
use axum::body::Bytes;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::TestServer;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mediadesk_core::types::{CastMember, MediaKind};
use mediadesk_metadata::provider::MetadataProvider;
use mediadesk_metadata::{FetchedMedia, MetadataError};
use mediadesk_server::auth::AdminCredentials;
use mediadesk_server::routes::build_router;
use mediadesk_server::state::AppState;
use serde_json::{Value, json};

const USERNAME: &str = "admin";
const PASSWORD: &str = "admin123";

/// Returns a fixed record for ID 27205 and nothing else.
struct StubProvider;

#[async_trait::async_trait]
impl MetadataProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn fetch(
        &self,
        provider_id: &str,
        kind: MediaKind,
    ) -> Result<FetchedMedia, MetadataError> {
        if provider_id != "27205" {
            return Err(MetadataError::NotFound);
        }
        Ok(FetchedMedia {
            title: Some("Inception".into()),
            description: Some("A thief who steals corporate secrets".into()),
            thumbnail: Some("https://image.tmdb.org/t/p/original/poster.jpg".into()),
            release_date: Some("2010-07-15".into()),
            language: Some("en".into()),
            rating: Some(8.4),
            cast: vec![CastMember {
                name: "Leonardo DiCaprio".into(),
                character: Some("Cobb".into()),
                image: None,
            }],
            total_seasons: (kind == MediaKind::Tv).then_some(3),
        })
    }
}

/// Low-cost argon2 parameters so each request's verification stays fast.
fn cheap_hash(password: &str) -> String {
    let argon = Argon2::new(
        Algorithm::Argon2id,
        Version::V0x13,
        Params::new(8, 1, 1, None).unwrap(),
    );
    let salt = SaltString::generate(&mut OsRng);
    argon
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string()
}

async fn build_app(metadata: Option<Arc<dyn MetadataProvider>>) -> TestServer {
    let pool = mediadesk_db::connect(":memory:").await.unwrap();
    mediadesk_db::migrate::run(&pool).await.unwrap();

    let admin = AdminCredentials::new(USERNAME, cheap_hash(PASSWORD)).unwrap();
    let state = AppState {
        db: pool,
        admin: Arc::new(admin),
        metadata,
    };

    TestServer::new(build_router(state)).unwrap()
}

/// Create a test server with an in-memory SQLite database and a stub provider.
async fn test_app() -> TestServer {
    build_app(Some(Arc::new(StubProvider))).await
}

fn basic(username: &str, password: &str) -> HeaderValue {
    let encoded = STANDARD.encode(format!("{username}:{password}"));
    HeaderValue::from_str(&format!("Basic {encoded}")).unwrap()
}

fn auth() -> (HeaderName, HeaderValue) {
    (header::AUTHORIZATION, basic(USERNAME, PASSWORD))
}

fn movie_body(title: &str) -> Value {
    json!({
        "type": "movie",
        "title": title,
        "description": "A heist inside dreams",
        "release_date": "2010-07-16",
        "language": "en",
        "rating": 8.8,
        "cast": [{ "name": "Leonardo DiCaprio", "character": "Cobb", "image": null }],
        "video_links": { "video_1080p": "https://cdn.example/inception-1080.mp4" },
        "download_links": {
            "download_720p": { "url": "https://cdn.example/inception-720.mkv", "file_type": "webrip" }
        }
    })
}

fn tv_body(title: &str) -> Value {
    json!({
        "type": "tv",
        "title": title,
        "total_seasons": 2,
        "seasons": {}
    })
}

async fn create(server: &TestServer, body: &Value) -> Value {
    let (name, value) = auth();
    let resp = server
        .post("/admin/media")
        .add_header(name, value)
        .json(body)
        .await;
    resp.assert_status(StatusCode::CREATED);
    resp.json()
}

async fn post_episode(server: &TestServer, id: i64, body: Value) -> Value {
    let (name, value) = auth();
    let resp = server
        .post(&format!("/admin/episode/{id}"))
        .add_header(name, value)
        .json(&body)
        .await;
    resp.assert_status_ok();
    resp.json()
}

fn episode(season: u32, number: u32, name: &str) -> Value {
    json!({
        "season_number": season,
        "episode_number": number,
        "episode_name": name,
        "video_links": { "video_720p": format!("https://cdn.example/s{season}e{number}.mp4") },
    })
}

// ---------------------------------------------------------------------------
// Health and public API
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let server = test_app().await;
    let resp = server.get("/health").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn create_then_get_round_trip() {
    let server = test_app().await;
    let created = create(&server, &movie_body("Inception")).await;
    let id = created["id"].as_i64().unwrap();

    let resp = server.get(&format!("/api/media/{id}")).await;
    resp.assert_status_ok();
    let fetched: Value = resp.json();

    assert_eq!(fetched, created);
    assert_eq!(fetched["type"], "movie");
    assert_eq!(fetched["title"], "Inception");
    assert_eq!(fetched["rating"], 8.8);
    assert_eq!(fetched["cast"][0]["character"], "Cobb");
    assert_eq!(
        fetched["video_links"]["video_1080p"],
        "https://cdn.example/inception-1080.mp4"
    );
    assert_eq!(
        fetched["download_links"]["download_720p"]["file_type"],
        "webrip"
    );
}

#[tokio::test]
async fn get_missing_media_returns_404() {
    let server = test_app().await;
    let resp = server.get("/api/media/999").await;
    resp.assert_status(StatusCode::NOT_FOUND);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn malformed_path_and_query_use_error_envelope() {
    let server = test_app().await;

    let resp = server.get("/api/media/abc").await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "bad_request");

    let resp = server.get("/api/media?type=podcast").await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "bad_request");

    let (name, value) = auth();
    let resp = server
        .get("/admin/edit/not-a-number")
        .add_header(name, value)
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn list_filters_by_type() {
    let server = test_app().await;
    create(&server, &movie_body("Heat")).await;
    create(&server, &tv_body("Dark")).await;
    create(&server, &movie_body("Ronin")).await;

    let all: Value = server.get("/api/media").await.json();
    let titles: Vec<&str> = all
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Heat", "Dark", "Ronin"]);

    let shows: Value = server.get("/api/media?type=tv").await.json();
    let shows = shows.as_array().unwrap();
    assert_eq!(shows.len(), 1);
    assert_eq!(shows[0]["title"], "Dark");
    assert_eq!(shows[0]["total_seasons"], 2);
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_requires_credentials() {
    let server = test_app().await;

    let resp = server.post("/admin/media").json(&movie_body("Heat")).await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.header(header::WWW_AUTHENTICATE),
        "Basic realm=\"Login Required\""
    );
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "unauthorized");

    let resp = server.get("/admin").await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_credentials_are_rejected() {
    let server = test_app().await;

    for (username, password) in [(USERNAME, "wrong"), ("someone", PASSWORD)] {
        let resp = server
            .delete("/admin/media/1")
            .add_header(header::AUTHORIZATION, basic(username, password))
            .await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.header(header::WWW_AUTHENTICATE),
            "Basic realm=\"Login Required\""
        );
    }

    let resp = server
        .get("/admin/search")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer not-basic"),
        )
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Admin media API
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_json_returns_400() {
    let server = test_app().await;
    let (name, value) = auth();
    let resp = server
        .post("/admin/media")
        .add_header(name, value)
        .bytes(Bytes::from_static(b"{not json"))
        .content_type("application/json")
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn invalid_media_is_rejected() {
    let server = test_app().await;

    let mut missing_title = movie_body("   ");
    missing_title["title"] = json!("   ");
    let mut bad_rating = movie_body("Heat");
    bad_rating["rating"] = json!(11);
    let mut bad_date = movie_body("Heat");
    bad_date["release_date"] = json!("16/07/2010");
    let mut unknown_type = movie_body("Heat");
    unknown_type["type"] = json!("podcast");

    for body in [missing_title, bad_rating, bad_date, unknown_type] {
        let (name, value) = auth();
        let resp = server
            .post("/admin/media")
            .add_header(name, value)
            .json(&body)
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
    }

    let all: Value = server.get("/api/media").await.json();
    assert!(all.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn update_replaces_record() {
    let server = test_app().await;
    let created = create(&server, &movie_body("Inception")).await;
    let id = created["id"].as_i64().unwrap();

    let (name, value) = auth();
    let resp = server
        .put(&format!("/admin/media/{id}"))
        .add_header(name, value)
        .json(&json!({ "type": "movie", "title": "Inception (Director's Cut)" }))
        .await;
    resp.assert_status_ok();
    let updated: Value = resp.json();

    assert_eq!(updated["id"], id);
    assert_eq!(updated["title"], "Inception (Director's Cut)");
    assert_eq!(updated["description"], Value::Null);
    assert_eq!(updated["cast"], json!([]));
    assert_eq!(updated["video_links"], json!({}));

    let (name, value) = auth();
    let resp = server
        .put("/admin/media/999")
        .add_header(name, value)
        .json(&movie_body("Ghost"))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_media_then_missing() {
    let server = test_app().await;
    let created = create(&server, &movie_body("Heat")).await;
    let id = created["id"].as_i64().unwrap();

    let (name, value) = auth();
    let resp = server
        .delete(&format!("/admin/media/{id}"))
        .add_header(name, value)
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["deleted"], true);

    server
        .get(&format!("/api/media/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let (name, value) = auth();
    let resp = server
        .delete(&format!("/admin/media/{id}"))
        .add_header(name, value)
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Episodes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_episode_creates_season() {
    let server = test_app().await;
    let show = create(&server, &tv_body("Dark")).await;
    let id = show["id"].as_i64().unwrap();

    let result = post_episode(&server, id, episode(1, 1, "Secrets")).await;
    assert_eq!(result["outcome"], "inserted");
    assert_eq!(result["season"]["season_number"], 1);
    assert_eq!(result["season"]["total_episodes"], 1);

    let stored: Value = server.get(&format!("/api/media/{id}")).await.json();
    let season = &stored["seasons"]["season_1"];
    assert_eq!(season["total_episodes"], 1);
    assert_eq!(season["episodes"][0]["episode_name"], "Secrets");
    assert_eq!(
        season["episodes"][0]["video_720p"],
        "https://cdn.example/s1e1.mp4"
    );
}

#[tokio::test]
async fn episode_updates_in_place_and_appends_in_order() {
    let server = test_app().await;
    let show = create(&server, &tv_body("Dark")).await;
    let id = show["id"].as_i64().unwrap();

    post_episode(&server, id, episode(1, 2, "Lies")).await;
    post_episode(&server, id, episode(1, 1, "Secrets")).await;
    post_episode(&server, id, episode(1, 3, "Past and Present")).await;

    // Same number again, through the alias route.
    let (name, value) = auth();
    let resp = server
        .post(&format!("/admin/update_episode/{id}"))
        .add_header(name, value)
        .json(&episode(1, 1, "Secrets (Extended)"))
        .await;
    resp.assert_status_ok();
    let result: Value = resp.json();
    assert_eq!(result["outcome"], "updated");
    assert_eq!(result["season"]["total_episodes"], 3);

    let stored: Value = server.get(&format!("/api/media/{id}")).await.json();
    let names: Vec<&str> = stored["seasons"]["season_1"]["episodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["episode_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Lies", "Secrets (Extended)", "Past and Present"]);
}

#[tokio::test]
async fn episode_validation_and_missing_targets() {
    let server = test_app().await;
    let movie = create(&server, &movie_body("Heat")).await;
    let movie_id = movie["id"].as_i64().unwrap();
    let show = create(&server, &tv_body("Dark")).await;
    let show_id = show["id"].as_i64().unwrap();

    let (name, value) = auth();
    let resp = server
        .post(&format!("/admin/episode/{show_id}"))
        .add_header(name, value)
        .json(&json!({ "season_number": 1, "episode_name": "No number" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    for target in [movie_id, 999] {
        let (name, value) = auth();
        let resp = server
            .post(&format!("/admin/episode/{target}"))
            .add_header(name, value)
            .json(&episode(1, 1, "Pilot"))
            .await;
        resp.assert_status(StatusCode::NOT_FOUND);
    }
}

// ---------------------------------------------------------------------------
// Metadata lookup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tmdb_fetch_returns_reshaped_metadata() {
    let server = test_app().await;
    let (name, value) = auth();
    let resp = server
        .post("/admin/tmdb_fetch")
        .add_header(name, value)
        .json(&json!({ "tmdb_id": 27205, "media_type": "movie" }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["title"], "Inception");
    assert_eq!(body["cast"][0]["name"], "Leonardo DiCaprio");
    assert!(body.get("total_seasons").is_none());

    let (name, value) = auth();
    let resp = server
        .post("/admin/tmdb_fetch")
        .add_header(name, value)
        .json(&json!({ "tmdb_id": "27205", "media_type": "tv" }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["total_seasons"], 3);
}

#[tokio::test]
async fn tmdb_fetch_errors() {
    let server = test_app().await;

    let (name, value) = auth();
    let resp = server
        .post("/admin/tmdb_fetch")
        .add_header(name, value)
        .json(&json!({ "media_type": "movie" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let (name, value) = auth();
    let resp = server
        .post("/admin/tmdb_fetch")
        .add_header(name, value)
        .json(&json!({ "tmdb_id": 1, "media_type": "movie" }))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);

    let unconfigured = build_app(None).await;
    let (name, value) = auth();
    let resp = unconfigured
        .post("/admin/tmdb_fetch")
        .add_header(name, value)
        .json(&json!({ "tmdb_id": 27205, "media_type": "movie" }))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_pages_render() {
    let server = test_app().await;
    create(&server, &movie_body("Heat")).await;

    for path in ["/admin", "/admin/add_movie", "/admin/add_tv", "/admin/search"] {
        let (name, value) = auth();
        let resp = server.get(path).add_header(name, value).await;
        resp.assert_status_ok();
        let html = resp.text();
        assert!(html.starts_with("<!DOCTYPE html>"), "{path}");
        assert!(!html.contains("{{"), "{path}");
    }

    let (name, value) = auth();
    let dashboard = server.get("/admin").add_header(name, value).await.text();
    assert!(dashboard.contains("<strong>1</strong>Movies"));
    assert!(dashboard.contains("<strong>0</strong>TV shows"));
}

#[tokio::test]
async fn edit_page_escapes_and_404s() {
    let server = test_app().await;
    let created = create(&server, &movie_body("<b>Heat</b> & Co")).await;
    let id = created["id"].as_i64().unwrap();

    let (name, value) = auth();
    let resp = server
        .get(&format!("/admin/edit/{id}"))
        .add_header(name, value)
        .await;
    resp.assert_status_ok();
    let html = resp.text();
    assert!(html.contains("&lt;b&gt;Heat&lt;/b&gt; &amp; Co"));
    assert!(!html.contains("<b>Heat</b>"));

    let (name, value) = auth();
    let resp = server.get("/admin/edit/999").add_header(name, value).await;
    resp.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn add_episode_page_requires_tv() {
    let server = test_app().await;
    let movie = create(&server, &movie_body("Heat")).await;
    let show = create(&server, &tv_body("Dark")).await;
    let show_id = show["id"].as_i64().unwrap();
    post_episode(&server, show_id, episode(1, 1, "Secrets")).await;

    let (name, value) = auth();
    let resp = server
        .get(&format!("/admin/add_episode/{show_id}"))
        .add_header(name, value)
        .await;
    resp.assert_status_ok();
    assert!(resp.text().contains("Season 1 (1 episodes)"));

    let (name, value) = auth();
    let resp = server
        .get(&format!("/admin/add_episode/{}", movie["id"]))
        .add_header(name, value)
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);
}
