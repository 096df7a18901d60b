use mongodb::bson::{self, doc, oid::ObjectId};
use validator::Validate;

use crate::core::errors::{AppError, AppResult, ErrorContext};
use crate::db::scope::TransactionScope;
use crate::domain::dto::object_id;
use crate::domain::dto::reviews::SubmitReviewRequest;
use crate::domain::entities::{OrderStatus, Review};
use crate::domain::models::auth::AuthenticatedUser;
use crate::repositories::{ListOptions, Page, Repositories};
use crate::services::callers::{customer_of, id_of};
use crate::services::orchestration::finish;

pub struct ReviewService {
    repos: Repositories,
}

impl ReviewService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Reviews a completed order and folds the score into the health
    /// unit's rating, both in one scope. Two concurrent submissions for the
    /// same unit conflict in storage instead of losing an update.
    pub async fn submit(&self, user: &AuthenticatedUser, request: SubmitReviewRequest) -> AppResult<Review> {
        request.validate()?;
        let customer = customer_of(&self.repos, user).await?;
        let customer_id = id_of(customer.id)?;
        let order_id = object_id(&request.order, "order")?;

        let mut scope = self.repos.begin().await?;
        let result = self.submit_in(&mut scope, customer_id, order_id, request).await;
        let review = finish(scope, result).await?;
        log::info!("Review {:?} stored for health unit {}", review.id, review.health_unit);
        Ok(review)
    }

    async fn submit_in(
        &self,
        scope: &mut TransactionScope,
        customer_id: ObjectId,
        order_id: ObjectId,
        request: SubmitReviewRequest,
    ) -> AppResult<Review> {
        let order = self.repos.orders.retrieve(&order_id.to_hex(), Some(&mut *scope)).await?;
        if !order.belongs_to_customer(&customer_id) {
            return Err(AppError::NotFound("orders document not found".to_string()));
        }
        if order.status != OrderStatus::Completed {
            return Err(AppError::InvalidParameter("Only completed orders can be reviewed".to_string()));
        }

        let existing = self
            .repos
            .reviews
            .query_list(doc! { "order": order_id }, &ListOptions::page(1, 1), Some(&mut *scope))
            .await?;
        if existing.total_documents > 0 {
            return Err(AppError::DuplicateKey("This order has already been reviewed".to_string()));
        }

        let mut review = Review::new(order.health_unit, customer_id, request.rating);
        review.order = Some(order_id);
        review.comment = request.comment;
        let review = self.repos.reviews.create(review, Some(&mut *scope)).await?;

        let unit = self
            .repos
            .health_units
            .retrieve(&order.health_unit.to_hex(), Some(&mut *scope))
            .await?;
        let rating = bson::to_bson(&unit.rating.with_score(review.rating)).context("Failed to encode rating")?;
        self.repos
            .health_units
            .update_by_id(&order.health_unit.to_hex(), doc! { "rating": rating }, Some(&mut *scope))
            .await?;

        Ok(review)
    }

    pub async fn list_for_health_unit(&self, health_unit: &str, options: &ListOptions) -> AppResult<Page<Review>> {
        let health_unit = object_id(health_unit, "healthUnit")?;
        self.repos
            .reviews
            .query_list(doc! { "healthUnit": health_unit }, options, None)
            .await
    }
}
