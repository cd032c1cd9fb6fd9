use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_extra::extract::Multipart;
use serde_json::{json, Value};

use crate::config::AppState;
use crate::domain::cart::{CartSummary, NewCartItem};
use crate::domain::catalog::{Location, ServiceKind};
use crate::domain::pricing::{quote, PrintMode, QuoteInput, Sides, UserType};
use crate::error::AppError;
use crate::handlers::upload::{read_upload, UploadForm};
use crate::middleware::auth::AuthUser;
use crate::repositories::{cart_repo, catalog_repo};
use crate::utils::money::format_rupees;
use crate::utils::storage::StorageError;

// Print options sent next to the uploaded file
fn quote_input_from(form: &UploadForm, pages: u32) -> Result<QuoteInput, AppError> {
    let service = form
        .field("service")
        .and_then(ServiceKind::parse)
        .ok_or_else(|| AppError::validation("Unknown or missing service"))?;
    let print_mode = match form.field("print_mode") {
        Some(raw) => PrintMode::parse(raw).ok_or_else(|| AppError::validation("Unknown print mode"))?,
        None => PrintMode::Bw,
    };
    let sides = match form.field("sides") {
        Some(raw) => Sides::parse(raw).ok_or_else(|| AppError::validation("Unknown sides option"))?,
        None => Sides::Single,
    };
    let copies = form.parsed::<u32>("copies")?.unwrap_or(1);

    Ok(QuoteInput {
        service,
        print_mode,
        sides,
        pages,
        copies,
        color_pages: form.field("color_pages").map(str::to_string),
    })
}

// Canonical name of an active location, matched case-insensitively
pub(crate) fn resolve_location(requested: Option<&str>, active: &[Location]) -> Result<Option<String>, AppError> {
    match requested {
        Some(name) => active
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name.trim()))
            .map(|l| Some(l.name.clone()))
            .ok_or_else(|| AppError::validation(format!("Unknown location: {}", name))),
        None => Ok(None),
    }
}

/// Add a print job to the cart
#[utoipa::path(
    post,
    path = "/api/cart",
    tag = "Cart",
    summary = "Add item to cart",
    description = "Multipart upload: `file` plus `service`, `print_mode`, `sides`, `copies`, `color_pages`, `pages`, `location`",
    request_body(content_type = "multipart/form-data", content = String),
    responses(
        (status = 201, description = "Item added", body = serde_json::Value),
        (status = 400, description = "Invalid file or print options"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn add_to_cart(
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let form = read_upload(multipart, state.config.max_upload_bytes()).await?;
    let (file_name, kind) = form.document()?;

    let pages = form
        .page_count(kind)?
        .ok_or_else(|| AppError::validation("Page count could not be detected, please enter it"))?;

    let input = quote_input_from(&form, pages)?;
    let user_type = UserType::for_role(auth.role);
    let pricing = catalog_repo::load_pricing(&state.db).await?;
    let price = quote(pricing.table(user_type), &input)?;

    let active = catalog_repo::list_active_locations(&state.db).await?;
    let location = resolve_location(form.field("location"), &active)?;

    let file_path = state.storage.save_temp(file_name, &form.content)?;

    let new_item = NewCartItem {
        user_id: auth.user_id,
        service: input.service,
        file_path: file_path.clone(),
        file_name: file_name.to_string(),
        pages,
        copies: input.copies,
        print_mode: input.print_mode,
        sides: input.sides,
        color_pages: input.color_pages.clone(),
        location,
        price_paise: price.total,
    };

    let item = match cart_repo::insert_item(&state.db, &new_item).await {
        Ok(item) => item,
        Err(e) => {
            if let Err(cleanup) = state.storage.delete(&file_path) {
                tracing::warn!("Could not remove orphan upload {}: {}", file_path, cleanup);
            }
            return Err(e);
        }
    };

    tracing::info!(
        "🛒 Cart item {} added for user {} ({} pages x {}, {})",
        item.id,
        auth.user_id,
        pages,
        input.copies,
        format_rupees(price.total)
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Added to cart",
            "data": {
                "item": item,
                "price_display": format_rupees(price.total),
                "quote": price
            }
        })),
    ))
}

/// Items currently in the cart
#[utoipa::path(
    get,
    path = "/api/cart",
    tag = "Cart",
    summary = "View cart",
    responses(
        (status = 200, description = "Cart contents", body = CartSummary),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_cart(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let items = cart_repo::list_unlocked(&state.db, auth.user_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": CartSummary::new(items)
    })))
}

/// Remove an item from the cart
#[utoipa::path(
    delete,
    path = "/api/cart/{item_id}",
    tag = "Cart",
    summary = "Remove cart item",
    params(
        ("item_id" = i32, Path, description = "Cart item ID")
    ),
    responses(
        (status = 200, description = "Item removed", body = serde_json::Value),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Item not found"),
        (status = 409, description = "Item is part of a checkout in progress")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn remove_cart_item(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(item_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let removed = match cart_repo::delete_unlocked(&state.db, item_id, auth.user_id).await? {
        Some(item) => item,
        None => {
            return match cart_repo::find_owned(&state.db, item_id, auth.user_id).await? {
                Some(item) if item.is_locked() => Err(AppError::conflict(
                    "This item is part of a checkout in progress",
                )),
                _ => Err(AppError::not_found("Cart item not found")),
            };
        }
    };

    match state.storage.delete(&removed.file_path) {
        Ok(_) => {}
        Err(StorageError::NotFound(path)) => {
            tracing::warn!("Temp file {} was already gone for cart item {}", path, removed.id);
        }
        Err(e) => {
            tracing::error!("Could not delete temp file for cart item {}: {}", removed.id, e);
        }
    }

    Ok(Json(json!({
        "success": true,
        "message": "Item removed from cart",
        "data": { "id": removed.id }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn form(fields: &[(&str, &str)]) -> UploadForm {
        UploadForm {
            file_name: Some("notes.pdf".to_string()),
            content_type: Some("application/pdf".to_string()),
            content: b"%PDF".to_vec(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_options_default_to_single_sided_bw() {
        let input = quote_input_from(&form(&[("service", "Printing")]), 10).unwrap();
        assert_eq!(input.print_mode, PrintMode::Bw);
        assert_eq!(input.sides, Sides::Single);
        assert_eq!(input.copies, 1);
        assert_eq!(input.pages, 10);
    }

    #[test]
    fn test_unknown_options_are_rejected() {
        assert!(quote_input_from(&form(&[]), 10).is_err());
        assert!(quote_input_from(&form(&[("service", "Lamination")]), 10).is_err());
        assert!(quote_input_from(&form(&[("service", "Printing"), ("sides", "triple")]), 10).is_err());
        assert!(quote_input_from(&form(&[("service", "Printing"), ("copies", "-1")]), 10).is_err());
    }

    #[test]
    fn test_custom_mode_carries_colour_pages() {
        let input = quote_input_from(
            &form(&[
                ("service", "Custom Printing"),
                ("print_mode", "custom"),
                ("color_pages", "1-3,7"),
                ("copies", "2"),
            ]),
            12,
        )
        .unwrap();
        assert_eq!(input.print_mode, PrintMode::Custom);
        assert_eq!(input.color_pages.as_deref(), Some("1-3,7"));
        assert_eq!(input.copies, 2);
    }

    #[test]
    fn test_location_is_canonicalised() {
        let active = vec![
            Location { id: 1, name: "Main Campus".to_string() },
            Location { id: 2, name: "City Centre".to_string() },
        ];
        assert_eq!(
            resolve_location(Some("main campus"), &active).unwrap().as_deref(),
            Some("Main Campus")
        );
        assert_eq!(resolve_location(None, &active).unwrap(), None);
        assert!(resolve_location(Some("Airport"), &active).is_err());
    }
}
