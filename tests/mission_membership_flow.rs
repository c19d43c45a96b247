mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{spawn_app, token_for};

#[tokio::test]
async fn join_request_is_accepted_and_levels_are_enforced() -> Result<()> {
    let t = spawn_app().await?;
    let u1 = token_for("U1", "Uma", "org/ops");
    let u2 = token_for("U2", "Ugo", "org/ops");
    let u3 = token_for("U3", "Una", "org/lab");
    t.register(&u2).await?;

    // 1. Create mission Alpha as U1
    let (status, mission) = t
        .call("POST", "/missions", Some(&u1), Some(json!({"name": "Alpha", "description": "test"})))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(mission["status"], "created");
    assert_eq!(mission["exported"], false);
    assert_eq!(mission["members"], json!([{"user_id": "U1", "permission": "ADMIN"}]));
    assert_eq!(mission["creator"]["id"], "U1");
    let id = mission["id"].as_str().unwrap().to_string();

    // 2. U2 requests to join
    let (status, _) = t.call("POST", &format!("/missions/{id}/join-requests"), Some(&u2), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, mission) = t.call("GET", &format!("/missions/{id}"), Some(&u1), None).await?;
    assert_eq!(mission["join_requests"], json!(["U2"]));

    // 3. U1 accepts with MEMBER
    let (status, access) = t
        .call(
            "POST",
            &format!("/missions/{id}/join-requests/U2"),
            Some(&u1),
            Some(json!({"permission": "MEMBER"})),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(access["permission"], "MEMBER");

    let (_, mission) = t.call("GET", &format!("/missions/{id}"), Some(&u1), None).await?;
    assert_eq!(mission["join_requests"], json!([]));
    assert_eq!(
        mission["members"],
        json!([
            {"user_id": "U1", "permission": "ADMIN"},
            {"user_id": "U2", "permission": "MEMBER"}
        ])
    );

    // 4. U2 holds MEMBER, which is below ADMIN
    let (status, body) = t.call("PUT", &format!("/missions/{id}/export"), Some(&u2), Some(json!({"exported": true}))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    // 5. U3 is no member at all
    let (status, body) = t.call("GET", &format!("/missions/{id}/access"), Some(&u3), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, access) = t.call("GET", &format!("/missions/{id}/access"), Some(&u2), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(access["permission"], "MEMBER");

    Ok(())
}

#[tokio::test]
async fn update_export_and_level_changes() -> Result<()> {
    let t = spawn_app().await?;
    let u1 = token_for("U1", "Uma", "org/ops");
    let u2 = token_for("U2", "Ugo", "org/ops");
    t.register(&u2).await?;

    let (_, mission) = t.call("POST", "/missions", Some(&u1), Some(json!({"name": "Alpha"}))).await?;
    let id = mission["id"].as_str().unwrap().to_string();

    let (status, access) = t
        .call("POST", &format!("/missions/{id}/members"), Some(&u1), Some(json!({"user_id": "U2"})))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(access["permission"], "MEMBER");

    let (status, _) = t
        .call("PUT", &format!("/missions/{id}"), Some(&u2), Some(json!({"name": "Beta"})))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .call("PUT", &format!("/missions/{id}/members/U2"), Some(&u1), Some(json!({"permission": "WRITE"})))
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, updated) = t
        .call("PUT", &format!("/missions/{id}"), Some(&u2), Some(json!({"name": "Beta"})))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Beta");
    assert_eq!(updated["status"], "updated");

    let (status, exported) = t
        .call("PUT", &format!("/missions/{id}/export"), Some(&u1), Some(json!({"exported": true})))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(exported["exported"], true);

    let (status, access) = t.call("GET", &format!("/missions/{id}/access/U2"), Some(&u1), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(access["permission"], "WRITE");

    Ok(())
}

#[tokio::test]
async fn listings_names_and_batch() -> Result<()> {
    let t = spawn_app().await?;
    let u1 = token_for("U1", "Uma", "org/ops");
    let u2 = token_for("U2", "Ugo", "org/ops");

    let (_, alpha) = t.call("POST", "/missions", Some(&u1), Some(json!({"name": "Alpha"}))).await?;
    let (_, beta) = t.call("POST", "/missions", Some(&u2), Some(json!({"name": "Beta"}))).await?;

    let (status, names) = t.call("GET", "/missions/names", Some(&u1), None).await?;
    assert_eq!(status, StatusCode::OK);
    let mut names: Vec<String> = serde_json::from_value(names)?;
    names.sort();
    assert_eq!(names, vec!["Alpha".to_string(), "Beta".to_string()]);

    let (_, all) = t.call("GET", "/missions", Some(&u1), None).await?;
    assert_eq!(all.as_array().map(Vec::len), Some(2));

    let (_, mine) = t.call("GET", "/missions/mine", Some(&u1), None).await?;
    assert_eq!(mine.as_array().map(Vec::len), Some(1));
    assert_eq!(mine[0]["id"], alpha["id"]);

    let (status, batch) = t
        .call("POST", "/missions/batch", Some(&u1), Some(json!({"ids": [alpha["id"], beta["id"]]})))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(batch.as_array().map(Vec::len), Some(2));

    Ok(())
}

#[tokio::test]
async fn leaving_and_removing_members() -> Result<()> {
    let t = spawn_app().await?;
    let u1 = token_for("U1", "Uma", "org/ops");
    let u2 = token_for("U2", "Ugo", "org/ops");
    let u3 = token_for("U3", "Una", "org/lab");
    t.register(&u2).await?;
    t.register(&u3).await?;

    let (_, mission) = t.call("POST", "/missions", Some(&u1), Some(json!({"name": "Alpha"}))).await?;
    let id = mission["id"].as_str().unwrap().to_string();
    for user in ["U2", "U3"] {
        t.call("POST", &format!("/missions/{id}/members"), Some(&u1), Some(json!({"user_id": user})))
            .await?;
    }

    let (status, _) = t.call("DELETE", &format!("/missions/{id}/members/U3"), Some(&u2), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.call("DELETE", &format!("/missions/{id}/members/U2"), Some(&u2), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = t.call("DELETE", &format!("/missions/{id}/members/U3"), Some(&u1), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, mission) = t.call("GET", &format!("/missions/{id}"), Some(&u1), None).await?;
    assert_eq!(mission["members"], json!([{"user_id": "U1", "permission": "ADMIN"}]));

    Ok(())
}

#[tokio::test]
async fn cancel_and_reject_join_requests() -> Result<()> {
    let t = spawn_app().await?;
    let u1 = token_for("U1", "Uma", "org/ops");
    let u2 = token_for("U2", "Ugo", "org/ops");

    let (_, mission) = t.call("POST", "/missions", Some(&u1), Some(json!({"name": "Alpha"}))).await?;
    let id = mission["id"].as_str().unwrap().to_string();

    t.call("POST", &format!("/missions/{id}/join-requests"), Some(&u2), None).await?;
    let (status, _) = t.call("DELETE", &format!("/missions/{id}/join-requests"), Some(&u2), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, mission) = t.call("GET", &format!("/missions/{id}"), Some(&u1), None).await?;
    assert_eq!(mission["join_requests"], json!([]));

    t.call("POST", &format!("/missions/{id}/join-requests"), Some(&u2), None).await?;
    let (status, _) = t.call("DELETE", &format!("/missions/{id}/join-requests/U2"), Some(&u1), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, mission) = t.call("GET", &format!("/missions/{id}"), Some(&u1), None).await?;
    assert_eq!(mission["join_requests"], json!([]));
    assert_eq!(mission["members"].as_array().map(Vec::len), Some(1));

    Ok(())
}
