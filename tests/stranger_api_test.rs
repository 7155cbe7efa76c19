//! HTTP tests for the stranger game API. No database needed.

use actix_web::{http::StatusCode, test, web::Data, App};
use engage::app_config::GameConfig;
use engage::stranger::{default_topics, GameRegistry};
use serde_json::Value;

macro_rules! app {
    ($registry:expr) => {
        test::init_service(
            App::new()
                .app_data($registry.clone())
                .configure(engage::web::configure),
        )
        .await
    };
}

fn registry() -> Data<GameRegistry> {
    Data::new(GameRegistry::new(default_topics(), GameConfig::default()))
}

#[actix_rt::test]
async fn test_full_round_over_http() {
    let registry = registry();
    let app = app!(registry);

    let req = test::TestRequest::post().uri("/stranger").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(res).await;
    assert_eq!(created["state"], "setup");
    assert_eq!(created["num_players"], 4);
    let id = created["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/stranger/{}/players", id))
        .set_json(serde_json::json!({ "num_players": 3 }))
        .to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(view["num_players"], 3);

    let req = test::TestRequest::post()
        .uri(&format!("/stranger/{}/start", id))
        .to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(view["state"], "reveal");
    assert_eq!(view["current_player"], 1);
    assert!(view["role"].is_null(), "Role hidden until revealed");

    let mut strangers = 0;
    for player in 1..=3 {
        let req = test::TestRequest::post()
            .uri(&format!("/stranger/{}/reveal", id))
            .to_request();
        let view: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(view["current_player"], player);
        match view["role"]["role"].as_str() {
            Some("stranger") => strangers += 1,
            Some("insider") => assert!(view["role"]["topic"]["description"].is_string()),
            other => panic!("unexpected role {:?}", other),
        }

        let req = test::TestRequest::post()
            .uri(&format!("/stranger/{}/next", id))
            .to_request();
        let view: Value = test::call_and_read_body_json(&app, req).await;
        assert!(view["role"].is_null());
        assert!(view["final_results"].is_null(), "Answer hidden before the end");
    }
    assert_eq!(strangers, 1);

    let req = test::TestRequest::get()
        .uri(&format!("/stranger/{}", id))
        .to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(view["state"], "discuss");

    let req = test::TestRequest::post()
        .uri(&format!("/stranger/{}/end", id))
        .to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(view["state"], "end");
    let stranger = view["final_results"]["stranger"].as_u64().unwrap();
    assert!((1..=3).contains(&stranger));
    assert!(view["final_results"]["topic"]["image_url"].is_string());

    let req = test::TestRequest::post()
        .uri(&format!("/stranger/{}/reset", id))
        .to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(view["state"], "setup");
    assert_eq!(view["num_players"], 4);
}

#[actix_rt::test]
async fn test_invalid_requests() {
    let registry = registry();
    let app = app!(registry);
    let (id, _) = registry.create();

    let req = test::TestRequest::post()
        .uri(&format!("/stranger/{}/players", id))
        .set_json(serde_json::json!({ "num_players": 11 }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri(&format!("/stranger/{}/reveal", id))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CONFLICT, "Cannot reveal during setup");

    let req = test::TestRequest::post()
        .uri(&format!("/stranger/{}/dance", id))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri(&format!("/stranger/{}", uuid::Uuid::new_v4()))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::delete()
        .uri(&format!("/stranger/{}", id))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(registry.is_empty());
}
