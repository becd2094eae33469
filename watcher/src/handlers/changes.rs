use actix_web::{web, HttpRequest, HttpResponse};
use tracing::{error, info, warn};

use drivesync_models::change::DriveChange;
use drivesync_utils::unique_queue::QueueItem;

use crate::errors::ServiceError;
use crate::AppState;

const HEADER_RESOURCE_ID: &str = "X-Goog-Resource-Id";
const HEADER_RESOURCE_STATE: &str = "X-Goog-Resource-State";

/// Drive change notification handler
/// POST /api/hooks/drive/{site_key}
///
/// Notifications carry no payload worth reading; everything we need is in the
/// two X-Goog headers. Malformed notifications are acknowledged with 200 so
/// the provider does not keep redelivering them.
pub async fn handle_drive_notification(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let site_key = path.into_inner();
    let site = state
        .site_by_key(&site_key)
        .ok_or_else(|| ServiceError::NotFound(format!("no site registered for hook key {}", site_key)))?;

    let resource_id = req
        .headers()
        .get(HEADER_RESOURCE_ID)
        .and_then(|v| v.to_str().ok());
    let resource_state = req
        .headers()
        .get(HEADER_RESOURCE_STATE)
        .and_then(|v| v.to_str().ok());

    let (resource_id, resource_state) = match (resource_id, resource_state) {
        (Some(id), Some(state)) => (id, state),
        _ => {
            warn!(
                site = %site.config.name,
                "notification without resource headers, ignoring"
            );
            return Ok(HttpResponse::Ok().json(serde_json::json!({
                "status": "ignored"
            })));
        }
    };

    // The provider opens every new channel with a "sync" handshake.
    if resource_state == "sync" {
        info!(site = %site.config.name, resource = %resource_id, "watch channel handshake");
        return Ok(HttpResponse::Ok().json(serde_json::json!({
            "status": "acknowledged"
        })));
    }

    // TODO: notice "trash" and "remove" states; today a deleted document just
    // fails its metadata lookup later and gets dropped.

    let document_id = state
        .store
        .get_resource_document(resource_id)
        .await
        .map_err(|err| {
            error!("cannot resolve resource {} to a document: {}", resource_id, err);
            ServiceError::from(err)
        })?;

    let folder_path = state
        .store
        .get_document_folder(&document_id)
        .await
        .map_err(|err| {
            error!("no folder recorded for document {}: {}", document_id, err);
            ServiceError::from(err)
        })?;

    info!(
        site = %site.config.name,
        document = %document_id,
        folder = %folder_path,
        state = %resource_state,
        resource = %resource_id,
        "queuing file change"
    );

    site.queue
        .push(QueueItem {
            key: document_id.clone(),
            value: DriveChange {
                document_id,
                path: folder_path,
            },
        })
        .await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "accepted"
    })))
}
