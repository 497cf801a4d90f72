//! Customer handlers
//!
//! HTTP handlers for customer management endpoints. Every route requires an
//! admin session.

use crate::dto::customer::{
    CustomerCreateRequest, CustomerResponse, CustomerSearchParams, CustomerUpdateRequest,
};
use crate::dto::{ApiResponse, PaginationParams};
use crate::handlers::costs::customer_costs;
use actix_web::{web, HttpResponse};
use relaybill_auth::AdminUser;
use relaybill_core::traits::{CustomerRepository, Repository};
use relaybill_core::AppError;
use relaybill_db::PgCustomerRepository;
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// List customers with pagination and an optional search fragment
///
/// GET /api/v1/customers
#[instrument(skip(pool, _admin))]
pub async fn list_customers(
    pool: web::Data<PgPool>,
    query: web::Query<PaginationParams>,
    search: web::Query<CustomerSearchParams>,
    _admin: AdminUser,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Pagination validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    debug!(
        page = query.page,
        per_page = query.per_page,
        q = ?search.query(),
        "Listing customers"
    );

    let repo = PgCustomerRepository::new(pool.get_ref().clone());
    let (customers, total) = repo
        .search(search.query(), query.limit(), query.offset())
        .await?;

    let response_data: Vec<CustomerResponse> = customers.into_iter().map(Into::into).collect();

    Ok(HttpResponse::Ok().json(query.paginate(response_data, total)))
}

/// Create a customer
///
/// POST /api/v1/customers
#[instrument(skip(pool, admin, req))]
pub async fn create_customer(
    pool: web::Data<PgPool>,
    admin: AdminUser,
    req: web::Json<CustomerCreateRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Customer creation validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let customer = req.to_customer();
    debug!(email = %customer.email, "Creating customer");

    let repo = PgCustomerRepository::new(pool.get_ref().clone());

    if repo.find_by_email(&customer.email).await?.is_some() {
        warn!(email = %customer.email, "Customer creation failed: duplicate email");
        return Err(AppError::AlreadyExists(format!(
            "Customer with email {} already exists",
            customer.email
        )));
    }

    let created = repo.create(&customer).await?;

    info!(
        id = created.id,
        admin = %admin.user_id,
        "Customer created successfully"
    );

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        CustomerResponse::from(created),
        "Customer created successfully",
    )))
}

/// Get a single customer
///
/// GET /api/v1/customers/{id}
#[instrument(skip(pool, _admin))]
pub async fn get_customer(
    pool: web::Data<PgPool>,
    path: web::Path<i32>,
    _admin: AdminUser,
) -> Result<HttpResponse, AppError> {
    let customer_id = path.into_inner();

    let repo = PgCustomerRepository::new(pool.get_ref().clone());
    let customer = repo
        .find_by_id(customer_id)
        .await?
        .ok_or_else(|| AppError::CustomerNotFound(customer_id.to_string()))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(CustomerResponse::from(customer))))
}

/// Update a customer
///
/// PUT /api/v1/customers/{id}
#[instrument(skip(pool, admin, req))]
pub async fn update_customer(
    pool: web::Data<PgPool>,
    path: web::Path<i32>,
    admin: AdminUser,
    req: web::Json<CustomerUpdateRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Customer update validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let customer_id = path.into_inner();
    let repo = PgCustomerRepository::new(pool.get_ref().clone());

    let mut customer = repo
        .find_by_id(customer_id)
        .await?
        .ok_or_else(|| AppError::CustomerNotFound(customer_id.to_string()))?;

    req.apply(&mut customer);
    let updated = repo.update(&customer).await?;

    info!(
        id = updated.id,
        admin = %admin.user_id,
        "Customer updated successfully"
    );

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        CustomerResponse::from(updated),
        "Customer updated successfully",
    )))
}

/// Delete a customer
///
/// DELETE /api/v1/customers/{id}
#[instrument(skip(pool, admin))]
pub async fn delete_customer(
    pool: web::Data<PgPool>,
    path: web::Path<i32>,
    admin: AdminUser,
) -> Result<HttpResponse, AppError> {
    let customer_id = path.into_inner();

    let repo = PgCustomerRepository::new(pool.get_ref().clone());
    if !repo.delete(customer_id).await? {
        return Err(AppError::CustomerNotFound(customer_id.to_string()));
    }

    info!(id = customer_id, admin = %admin.user_id, "Customer deleted");
    Ok(HttpResponse::NoContent().finish())
}

/// Configure customer routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/customers")
            .route("", web::get().to(list_customers))
            .route("", web::post().to(create_customer))
            .route("/{id}", web::get().to(get_customer))
            .route("/{id}", web::put().to(update_customer))
            .route("/{id}", web::delete().to(delete_customer))
            .route("/{id}/costs", web::get().to(customer_costs)),
    );
}
