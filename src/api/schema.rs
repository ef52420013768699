//! Query and Mutation roots
//!
//! A flat field map: each field translates into one or more outbound calls
//! through the request context. No custom directives, no subscriptions.

use async_graphql::{Context, EmptySubscription, Object, Result, Schema};
use chrono::NaiveDate;

use crate::api::field_error;
use crate::context::RequestContext;
use crate::errors::DomainError;
use crate::ledger::{statement, transfers};
use crate::models::{
    CreateTransferInput, IdentityUser, ProjectRole, Transfer, TransferFilter, UserGrant,
};

pub type ApiSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema() -> ApiSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription).finish()
}

fn month_key(month: &str) -> std::result::Result<(), DomainError> {
    let well_formed = month.len() == 7
        && NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d").is_ok();
    if well_formed {
        Ok(())
    } else {
        Err(DomainError::InvalidInput(format!(
            "month {} is not YYYY-MM",
            month
        )))
    }
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Single transfer read from the ledger (source of truth).
    async fn transfer(&self, ctx: &Context<'_>, id: String) -> Result<Transfer> {
        let rc = ctx.data::<RequestContext>()?;
        transfers::get(rc.sheets.as_ref(), &id)
            .await
            .map_err(|e| field_error("transfer", e))
    }

    /// Filtered, paginated listing served from the relational mirror.
    async fn transfers(
        &self,
        ctx: &Context<'_>,
        filter: Option<TransferFilter>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Transfer>> {
        let rc = ctx.data::<RequestContext>()?;
        let limit = limit.unwrap_or(50).min(500);
        rc.mirror
            .query(&filter.unwrap_or_default(), limit, offset.unwrap_or(0))
            .await
            .map_err(|e| field_error("transfers", e))
    }

    async fn users(&self, ctx: &Context<'_>, query: String) -> Result<Vec<IdentityUser>> {
        let rc = ctx.data::<RequestContext>()?;
        rc.identity
            .search_users(&query)
            .await
            .map_err(|e| field_error("users", e))
    }

    async fn project_roles(&self, ctx: &Context<'_>) -> Result<Vec<ProjectRole>> {
        let rc = ctx.data::<RequestContext>()?;
        rc.identity
            .project_roles()
            .await
            .map_err(|e| field_error("projectRoles", e))
    }

    async fn grants(&self, ctx: &Context<'_>, project: String) -> Result<Vec<UserGrant>> {
        let rc = ctx.data::<RequestContext>()?;
        rc.identity
            .search_grants(&project)
            .await
            .map_err(|e| field_error("grants", e))
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn create_transfer(
        &self,
        ctx: &Context<'_>,
        input: CreateTransferInput,
    ) -> Result<Transfer> {
        let rc = ctx.data::<RequestContext>()?;
        transfers::create(rc, input)
            .await
            .map_err(|e| field_error("createTransfer", e))
    }

    async fn assign_driver(
        &self,
        ctx: &Context<'_>,
        transfer_id: String,
        driver_id: String,
    ) -> Result<Transfer> {
        let rc = ctx.data::<RequestContext>()?;
        transfers::assign_driver(rc, &transfer_id, &driver_id)
            .await
            .map_err(|e| field_error("assignDriver", e))
    }

    async fn mark_confirmed(&self, ctx: &Context<'_>, transfer_id: String) -> Result<Transfer> {
        let rc = ctx.data::<RequestContext>()?;
        transfers::mark_confirmed(rc, &transfer_id)
            .await
            .map_err(|e| field_error("markConfirmed", e))
    }

    async fn cancel_transfer(
        &self,
        ctx: &Context<'_>,
        transfer_id: String,
        caller_id: String,
    ) -> Result<Transfer> {
        let rc = ctx.data::<RequestContext>()?;
        transfers::cancel_transfer(rc, &transfer_id, &caller_id)
            .await
            .map_err(|e| field_error("cancelTransfer", e))
    }

    async fn terminate_transfer(
        &self,
        ctx: &Context<'_>,
        transfer_id: String,
    ) -> Result<Transfer> {
        let rc = ctx.data::<RequestContext>()?;
        transfers::terminate_transfer(rc, &transfer_id)
            .await
            .map_err(|e| field_error("terminateTransfer", e))
    }

    async fn mark_completed(&self, ctx: &Context<'_>, transfer_id: String) -> Result<Transfer> {
        let rc = ctx.data::<RequestContext>()?;
        transfers::mark_completed(rc, &transfer_id)
            .await
            .map_err(|e| field_error("markCompleted", e))
    }

    /// Full resync of one derived statement sheet; returns its row count.
    async fn sync_monthly_sheet(
        &self,
        ctx: &Context<'_>,
        customer_id: String,
        month: String,
    ) -> Result<i32> {
        let rc = ctx.data::<RequestContext>()?;
        month_key(&month).map_err(|e| field_error("syncMonthlySheet", e))?;
        let customer_name = rc.identity.display_name(&rc.cache, &customer_id).await;
        let rows = statement::sync_monthly_sheet(
            rc.sheets.as_ref(),
            &customer_id,
            customer_name.as_deref(),
            &month,
        )
        .await
        .map_err(|e| field_error("syncMonthlySheet", e))?;
        Ok(rows as i32)
    }

    // ===== Identity v2 user lifecycle passthroughs =====

    async fn deactivate_user(&self, ctx: &Context<'_>, user_id: String) -> Result<bool> {
        let rc = ctx.data::<RequestContext>()?;
        rc.identity
            .deactivate_user(&user_id)
            .await
            .map(|()| true)
            .map_err(|e| field_error("deactivateUser", e))
    }

    async fn reactivate_user(&self, ctx: &Context<'_>, user_id: String) -> Result<bool> {
        let rc = ctx.data::<RequestContext>()?;
        rc.identity
            .reactivate_user(&user_id)
            .await
            .map(|()| true)
            .map_err(|e| field_error("reactivateUser", e))
    }

    async fn lock_user(&self, ctx: &Context<'_>, user_id: String) -> Result<bool> {
        let rc = ctx.data::<RequestContext>()?;
        rc.identity
            .lock_user(&user_id)
            .await
            .map(|()| true)
            .map_err(|e| field_error("lockUser", e))
    }

    async fn unlock_user(&self, ctx: &Context<'_>, user_id: String) -> Result<bool> {
        let rc = ctx.data::<RequestContext>()?;
        rc.identity
            .unlock_user(&user_id)
            .await
            .map(|()| true)
            .map_err(|e| field_error("unlockUser", e))
    }

    async fn delete_user(&self, ctx: &Context<'_>, user_id: String) -> Result<bool> {
        let rc = ctx.data::<RequestContext>()?;
        rc.identity
            .delete_user(&user_id)
            .await
            .map(|()| true)
            .map_err(|e| field_error("deleteUser", e))
    }
}
