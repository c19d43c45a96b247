use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::events::ActivityEntry;
use crate::models;
use crate::routes::{activity, groups, health, missions, users};

#[derive(OpenApi)]
#[openapi(
	paths(
		health::health,
		activity::list_activity,
		missions::list_missions,
		missions::list_mission_names,
		missions::list_my_missions,
		missions::get_missions_by_ids,
		missions::get_mission,
		missions::create_mission,
		missions::update_mission,
		missions::set_export,
		missions::my_access,
		missions::user_access,
		missions::request_join,
		missions::cancel_join_request,
		missions::accept_join_request,
		missions::reject_join_request,
		missions::add_member,
		missions::change_member_permission,
		missions::remove_member,
		groups::list_groups,
		groups::list_group_names,
		groups::list_my_groups,
		groups::get_groups_by_ids,
		groups::get_group,
		groups::create_group,
		groups::update_group,
		groups::my_access,
		groups::user_access,
		groups::request_join,
		groups::cancel_join_request,
		groups::accept_join_request,
		groups::reject_join_request,
		groups::add_member,
		groups::change_member_role,
		groups::remove_member,
		users::register_me,
		users::list_users,
		users::search_users,
		users::get_user
	),
	components(
		schemas(
			health::HealthResponse,
			ActivityEntry,
			models::IdsRequest,
			models::access::MissionPermission,
			models::access::GroupRole,
			models::resource::ResourceStatus,
			models::user::Identity,
			models::user::User,
			models::mission::Mission,
			models::mission::MissionMember,
			models::mission::MissionCreateRequest,
			models::mission::MissionUpdateRequest,
			models::mission::ExportRequest,
			models::mission::MissionGrantRequest,
			models::mission::MissionAddMemberRequest,
			models::mission::MissionAccess,
			models::group::Group,
			models::group::GroupMember,
			models::group::GroupCreateRequest,
			models::group::GroupUpdateRequest,
			models::group::GroupGrantRequest,
			models::group::GroupAddMemberRequest,
			models::group::GroupAccess
		)
	),
	tags(
		(name = "Missions", description = "Missions and their membership"),
		(name = "Groups", description = "Groups and their membership"),
		(name = "Users", description = "Identities known to the service"),
		(name = "Activity", description = "Audit trail of write operations"),
		(name = "Health", description = "Liveness and database reachability")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	ensure_security_components(&mut doc);
	ensure_global_security(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn ensure_security_components(doc: &mut Value) {
	let Some(root) = doc.as_object_mut() else { return; };
	let Some(components) = root
		.entry("components")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
	else {
		return;
	};
	let Some(schemes) = components
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
	else {
		return;
	};

	schemes.insert(
		"bearerAuth".to_string(),
		json!({
			"type": "http",
			"scheme": "bearer",
			"bearerFormat": "JWT"
		}),
	);
}

fn ensure_global_security(doc: &mut Value) {
	if let Some(root) = doc.as_object_mut() {
		root.entry("security").or_insert_with(|| json!([{ "bearerAuth": [] }]));
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn document_carries_bearer_scheme_and_membership_paths() {
		let doc = serde_json::to_value(build_openapi(9000).unwrap()).unwrap();

		assert_eq!(doc["components"]["securitySchemes"]["bearerAuth"]["scheme"], "bearer");
		assert_eq!(doc["servers"][0]["url"], "http://localhost:9000");
		assert!(doc["paths"]["/missions/{id}/join-requests/{user_id}"]["post"].is_object());
		assert!(doc["paths"]["/groups/{id}/members/{user_id}"]["delete"].is_object());
		assert!(doc["paths"].get("/groups/{id}/export").is_none());
	}
}
