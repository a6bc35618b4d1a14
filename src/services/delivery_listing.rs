//! Read side: delivery listing, detail and operation history

use std::collections::HashMap;

use sea_orm::{
    sea_query::{CaseStatement, Expr, Func, SimpleExpr},
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select,
};
use tracing::debug;

use crate::entities::{
    customers, deliveries, delivery_items, delivery_operations, operation_items, products,
    prelude::{Customers, Deliveries, DeliveryItems, DeliveryOperations, OperationItems, Products},
};
use crate::error::DeliveryError;
use crate::models::actor::Actor;
use crate::models::delivery::{
    DeliveryItemResponse, DeliveryListEntry, DeliveryListQuery, DeliveryListResponse,
    DeliveryResponse, DeliveryState,
};
use crate::models::operation::OperationResponse;

/// Fixed listing page size
pub const PAGE_SIZE: u64 = 20;

/// Sales users only see the deliveries they created; anything else is
/// reported as missing rather than forbidden.
pub fn ensure_visible(actor: &Actor, delivery: &deliveries::Model) -> Result<(), DeliveryError> {
    match actor.visibility_scope() {
        Some(user_id) if delivery.created_by != user_id => {
            Err(DeliveryError::delivery_not_found(delivery.id))
        }
        _ => Ok(()),
    }
}

/// Row offset of a 1-based page. Must fit a signed 64-bit `OFFSET`.
fn page_offset(page: u64) -> Result<u64, DeliveryError> {
    page.checked_sub(1)
        .and_then(|p| p.checked_mul(PAGE_SIZE))
        .filter(|offset| i64::try_from(*offset).is_ok())
        .ok_or_else(|| DeliveryError::validation("page out of range"))
}

/// Paginated, filtered, role-scoped listing
pub async fn list_deliveries(
    db: &DatabaseConnection,
    actor: &Actor,
    query: &DeliveryListQuery,
) -> Result<DeliveryListResponse, DeliveryError> {
    query.validate().map_err(DeliveryError::Validation)?;
    let page = query.page.unwrap_or(1);
    let offset = page_offset(page)?;

    let mut select = Deliveries::find();

    if let Some(state) = query.state {
        select = select.filter(deliveries::Column::State.eq(state.to_string()));
    }

    match query.scheduled {
        Some(true) => select = select.filter(deliveries::Column::ScheduledDate.is_not_null()),
        Some(false) => select = select.filter(deliveries::Column::ScheduledDate.is_null()),
        None => {}
    }

    if let Some(user_id) = actor.visibility_scope() {
        select = select.filter(deliveries::Column::CreatedBy.eq(user_id));
    }

    if let Some(text) = query.search_text() {
        let customer_ids = search_customers(db, text).await?;
        if customer_ids.is_empty() {
            debug!(search = %text, "No customer matches search, returning empty page");
            return Ok(empty_page(page));
        }
        select = select.filter(deliveries::Column::CustomerId.is_in(customer_ids));
    }

    let total = select.clone().count(db).await?;

    let rows = apply_listing_order(select)
        .offset(offset)
        .limit(PAGE_SIZE)
        .all(db)
        .await?;

    let ids: Vec<i32> = rows.iter().map(|d| d.id).collect();
    let mut items_by_delivery = items_with_names(db, &ids).await?;
    let customer_names = customer_names(db, rows.iter().filter_map(|d| d.customer_id)).await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let last_operation = latest_operation(db, row.id).await?;
        entries.push(DeliveryListEntry {
            id: row.id,
            delivery_type: row.delivery_type,
            state: row.state,
            order_date: row.order_date,
            scheduled_date: row.scheduled_date,
            store_id: row.store_id,
            customer_id: row.customer_id,
            customer_name: row.customer_id.and_then(|id| customer_names.get(&id).cloned()),
            supplier_id: row.supplier_id,
            product_summary: row.product_summary,
            created_by: row.created_by,
            items: items_by_delivery.remove(&row.id).unwrap_or_default(),
            last_operation,
        });
    }

    Ok(DeliveryListResponse {
        deliveries: entries,
        total,
        page,
        page_size: PAGE_SIZE,
    })
}

fn empty_page(page: u64) -> DeliveryListResponse {
    DeliveryListResponse {
        deliveries: Vec::new(),
        total: 0,
        page,
        page_size: PAGE_SIZE,
    }
}

/// Customer ids whose name or phone contains `text` (case-insensitive)
pub async fn search_customers<C: ConnectionTrait>(
    conn: &C,
    text: &str,
) -> Result<Vec<i32>, DeliveryError> {
    let pattern = format!("%{}%", text.to_lowercase());
    let ids = Customers::find()
        .select_only()
        .column(customers::Column::Id)
        .filter(
            Condition::any()
                .add(Expr::expr(Func::lower(Expr::col(customers::Column::Name))).like(pattern.clone()))
                .add(Expr::expr(Func::lower(Expr::col(customers::Column::Phone))).like(pattern)),
        )
        .into_tuple::<i32>()
        .all(conn)
        .await?;
    Ok(ids)
}

/// Pending rows first, by scheduled date (unscheduled last) then order date,
/// oldest first. Every other state follows, newest order date first.
fn apply_listing_order(select: Select<Deliveries>) -> Select<Deliveries> {
    let pending = || deliveries::Column::State.eq(DeliveryState::Pending.to_string());
    let key = |case: CaseStatement| -> SimpleExpr { case.into() };

    select
        .order_by(key(Expr::case(pending(), Expr::val(0)).finally(Expr::val(1))), Order::Asc)
        .order_by(
            key(Expr::case(
                Condition::all()
                    .add(pending())
                    .add(deliveries::Column::ScheduledDate.is_null()),
                Expr::val(1),
            )
            .finally(Expr::val(0))),
            Order::Asc,
        )
        .order_by(
            key(Expr::case(pending(), Expr::col(deliveries::Column::ScheduledDate))),
            Order::Asc,
        )
        .order_by(
            key(Expr::case(pending(), Expr::col(deliveries::Column::OrderDate))),
            Order::Asc,
        )
        .order_by(deliveries::Column::OrderDate, Order::Desc)
        .order_by(key(Expr::case(pending(), Expr::col(deliveries::Column::Id))), Order::Asc)
        .order_by(deliveries::Column::Id, Order::Desc)
}

/// Detail view of one delivery, scoped to the caller
pub async fn get_delivery(
    db: &DatabaseConnection,
    actor: &Actor,
    delivery_id: i32,
) -> Result<DeliveryResponse, DeliveryError> {
    let delivery = Deliveries::find_by_id(delivery_id)
        .one(db)
        .await?
        .ok_or_else(|| DeliveryError::delivery_not_found(delivery_id))?;
    ensure_visible(actor, &delivery)?;

    delivery_detail(db, delivery).await
}

/// Assemble the detail view for an already loaded delivery
pub async fn delivery_detail<C: ConnectionTrait>(
    conn: &C,
    delivery: deliveries::Model,
) -> Result<DeliveryResponse, DeliveryError> {
    let customer = match delivery.customer_id {
        Some(id) => Customers::find_by_id(id).one(conn).await?,
        None => None,
    };
    let items = items_with_names(conn, &[delivery.id])
        .await?
        .remove(&delivery.id)
        .unwrap_or_default();
    let operations = operation_history(conn, delivery.id).await?;

    Ok(DeliveryResponse::from_parts(delivery, customer, items, operations))
}

/// Operation history of a delivery, scoped to the caller
pub async fn operations_for(
    db: &DatabaseConnection,
    actor: &Actor,
    delivery_id: i32,
) -> Result<Vec<OperationResponse>, DeliveryError> {
    let delivery = Deliveries::find_by_id(delivery_id)
        .one(db)
        .await?
        .ok_or_else(|| DeliveryError::delivery_not_found(delivery_id))?;
    ensure_visible(actor, &delivery)?;

    operation_history(db, delivery_id).await
}

/// All operations of a delivery, oldest first, each with its items
pub async fn operation_history<C: ConnectionTrait>(
    conn: &C,
    delivery_id: i32,
) -> Result<Vec<OperationResponse>, DeliveryError> {
    let operations = DeliveryOperations::find()
        .filter(delivery_operations::Column::DeliveryId.eq(delivery_id))
        .order_by(delivery_operations::Column::CreatedAt, Order::Asc)
        .order_by(delivery_operations::Column::Id, Order::Asc)
        .all(conn)
        .await?;

    let ids: Vec<i32> = operations.iter().map(|op| op.id).collect();
    let mut items_by_operation = operation_items_for(conn, ids).await?;

    Ok(operations
        .into_iter()
        .map(|op| {
            let items = items_by_operation.remove(&op.id).unwrap_or_default();
            OperationResponse::from_parts(op, items)
        })
        .collect())
}

/// Last known disposition: the most recent operation by timestamp
pub async fn latest_operation<C: ConnectionTrait>(
    conn: &C,
    delivery_id: i32,
) -> Result<Option<OperationResponse>, DeliveryError> {
    let Some(operation) = DeliveryOperations::find()
        .filter(delivery_operations::Column::DeliveryId.eq(delivery_id))
        .order_by(delivery_operations::Column::CreatedAt, Order::Desc)
        .order_by(delivery_operations::Column::Id, Order::Desc)
        .one(conn)
        .await?
    else {
        return Ok(None);
    };

    let items = operation_items_for(conn, vec![operation.id])
        .await?
        .remove(&operation.id)
        .unwrap_or_default();
    Ok(Some(OperationResponse::from_parts(operation, items)))
}

async fn operation_items_for<C: ConnectionTrait>(
    conn: &C,
    operation_ids: Vec<i32>,
) -> Result<HashMap<i32, Vec<operation_items::Model>>, DeliveryError> {
    if operation_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = OperationItems::find()
        .filter(operation_items::Column::OperationId.is_in(operation_ids))
        .order_by(operation_items::Column::Id, Order::Asc)
        .all(conn)
        .await?;

    let mut grouped: HashMap<i32, Vec<operation_items::Model>> = HashMap::new();
    for row in rows {
        grouped.entry(row.operation_id).or_default().push(row);
    }
    Ok(grouped)
}

/// Ledger lines of several deliveries, with catalogue names where known
async fn items_with_names<C: ConnectionTrait>(
    conn: &C,
    delivery_ids: &[i32],
) -> Result<HashMap<i32, Vec<DeliveryItemResponse>>, DeliveryError> {
    if delivery_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = DeliveryItems::find()
        .filter(delivery_items::Column::DeliveryId.is_in(delivery_ids.to_vec()))
        .order_by(delivery_items::Column::Id, Order::Asc)
        .all(conn)
        .await?;

    let skus: Vec<String> = rows.iter().map(|r| r.product_sku.clone()).collect();
    let names = product_names(conn, &skus).await?;

    let mut grouped: HashMap<i32, Vec<DeliveryItemResponse>> = HashMap::new();
    for row in rows {
        let name = names.get(&row.product_sku).cloned();
        grouped
            .entry(row.delivery_id)
            .or_default()
            .push(DeliveryItemResponse::from_model(row, name));
    }
    Ok(grouped)
}

/// Catalogue names keyed by SKU; unknown SKUs are simply absent
pub async fn product_names<C: ConnectionTrait>(
    conn: &C,
    skus: &[String],
) -> Result<HashMap<String, String>, DeliveryError> {
    if skus.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = Products::find()
        .filter(products::Column::Sku.is_in(skus.to_vec()))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|p| (p.sku, p.name)).collect())
}

async fn customer_names<C: ConnectionTrait>(
    conn: &C,
    ids: impl Iterator<Item = i32>,
) -> Result<HashMap<i32, String>, DeliveryError> {
    let ids: Vec<i32> = ids.collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = Customers::find()
        .filter(customers::Column::Id.is_in(ids))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|c| (c.id, c.name)).collect())
}
