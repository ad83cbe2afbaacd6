//! Credit queries and consumption.
//!
//! Available credits are handed out first-in-first-used: oldest purchase first,
//! credit id as the tie-break. Consumption is a single conditional UPDATE, so the
//! check "is it still unconsumed?" and the write happen in one statement and a credit
//! can never be spent twice.

use crate::{
    entities::{Credit, ReportArea, credit},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, prelude::*, sea_query::Expr};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Retrieves unconsumed credits, optionally limited to those that can pay for `area`.
///
/// Universal credits are always eligible when an area is given.
///
/// # Errors
/// Returns an error if the database query fails.
#[instrument(skip(db))]
pub async fn available_credits<C>(db: &C, area: Option<ReportArea>) -> Result<Vec<credit::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Credit::find().filter(credit::Column::Consumed.eq(false));
    if let Some(area) = area {
        query = query.filter(credit::Column::ReportArea.is_in([area, ReportArea::Universal]));
    }

    let credits = query
        .order_by_asc(credit::Column::PurchaseDate)
        .order_by_asc(credit::Column::Id)
        .all(db)
        .await?;
    debug!("Found {} available credit(s)", credits.len());
    Ok(credits)
}

/// Marks a credit consumed by `profile_id`.
///
/// # Errors
/// Returns `CreditNotFound` for an unknown id and `CreditAlreadyConsumed` if the
/// credit was spent before this call.
#[instrument(skip(db))]
pub(crate) async fn consume_credit<C>(
    db: &C,
    credit_id: Uuid,
    profile_id: Uuid,
    now: DateTime<Utc>,
) -> Result<credit::Model>
where
    C: ConnectionTrait,
{
    let updated = Credit::update_many()
        .col_expr(credit::Column::Consumed, Expr::value(true))
        .col_expr(credit::Column::ConsumedDate, Expr::value(Some(now)))
        .col_expr(credit::Column::UserProfileId, Expr::value(Some(profile_id)))
        .filter(credit::Column::Id.eq(credit_id))
        .filter(credit::Column::Consumed.eq(false))
        .exec(db)
        .await?
        .rows_affected;

    let credit = Credit::find_by_id(credit_id)
        .one(db)
        .await?
        .ok_or(Error::CreditNotFound { credit_id })?;

    if updated == 0 {
        warn!("Credit {} was already consumed", credit_id);
        return Err(Error::CreditAlreadyConsumed { credit_id });
    }

    info!(
        "Consumed {} credit {} for profile {}",
        credit.report_area.as_str(),
        credit_id,
        profile_id
    );
    Ok(credit)
}

/// Retrieves a credit by its id.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_credit_by_id<C>(db: &C, credit_id: Uuid) -> Result<Option<credit::Model>>
where
    C: ConnectionTrait,
{
    Credit::find_by_id(credit_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves every credit granted by a purchase record, ordered by `sequence`.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn credits_for_record<C>(db: &C, record_id: Uuid) -> Result<Vec<credit::Model>>
where
    C: ConnectionTrait,
{
    Credit::find()
        .filter(credit::Column::PurchaseRecordId.eq(record_id))
        .order_by_asc(credit::Column::Sequence)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Unconsumed credits of one purchase record.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn available_credits_for_record<C>(db: &C, record_id: Uuid) -> Result<Vec<credit::Model>>
where
    C: ConnectionTrait,
{
    let credits = credits_for_record(db, record_id).await?;
    Ok(credits.into_iter().filter(|c| !c.consumed).collect())
}

/// Consumed credits of one purchase record.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn consumed_credits_for_record<C>(db: &C, record_id: Uuid) -> Result<Vec<credit::Model>>
where
    C: ConnectionTrait,
{
    let credits = credits_for_record(db, record_id).await?;
    Ok(credits.into_iter().filter(|c| c.consumed).collect())
}

/// Credits a profile has spent, most recently consumed first.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn credits_consumed_by_profile<C>(db: &C, profile_id: Uuid) -> Result<Vec<credit::Model>>
where
    C: ConnectionTrait,
{
    Credit::find()
        .filter(credit::Column::UserProfileId.eq(profile_id))
        .order_by_desc(credit::Column::ConsumedDate)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Counts available credits per report area.
///
/// Areas with no credits are left out.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn credit_summary<C>(db: &C) -> Result<BTreeMap<ReportArea, usize>>
where
    C: ConnectionTrait,
{
    let mut summary = BTreeMap::new();
    for credit in available_credits(db, None).await? {
        *summary.entry(credit.report_area).or_insert(0) += 1;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::purchase::insert_purchase;
    use crate::test_utils::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_available_credits_excludes_consumed() -> Result<()> {
        let db = setup_test_db().await?;
        let base = Utc::now();

        let mut newest = sample_purchase("TXN-C");
        newest.purchase_date = base;
        let mut oldest = sample_purchase("TXN-A");
        oldest.purchase_date = base - Duration::hours(2);
        let mut middle = sample_purchase("TXN-B");
        middle.purchase_date = base - Duration::hours(1);

        let (_, newest_credits) = insert_purchase(&db, &newest).await?;
        let (_, oldest_credits) = insert_purchase(&db, &oldest).await?;
        let (_, middle_credits) = insert_purchase(&db, &middle).await?;

        consume_credit(&db, middle_credits[0].id, Uuid::new_v4(), base).await?;

        let available = available_credits(&db, None).await?;
        assert_eq!(available.len(), 2);
        assert_eq!(available[0].id, oldest_credits[0].id);
        assert_eq!(available[1].id, newest_credits[0].id);
        assert!(available.iter().all(|c| !c.consumed));
        Ok(())
    }

    #[tokio::test]
    async fn test_available_credits_tie_break_on_id() -> Result<()> {
        let db = setup_test_db().await?;

        let mut purchase = sample_purchase("TXN-TIE");
        purchase.credit_amount = 4;
        let (_, mut credits) = insert_purchase(&db, &purchase).await?;
        credits.sort_by_key(|c| c.id);

        let available = available_credits(&db, None).await?;
        let expected: Vec<Uuid> = credits.iter().map(|c| c.id).collect();
        let actual: Vec<Uuid> = available.iter().map(|c| c.id).collect();
        assert_eq!(actual, expected);
        Ok(())
    }

    #[tokio::test]
    async fn test_available_credits_area_filter_includes_universal() -> Result<()> {
        let db = setup_test_db().await?;

        let mut career = sample_purchase("TXN-CAREER");
        career.report_area = Some(ReportArea::Career);
        let mut health = sample_purchase("TXN-HEALTH");
        health.report_area = Some(ReportArea::Health);
        let mut any = sample_purchase("TXN-ANY");
        any.report_area = None;
        insert_purchase(&db, &career).await?;
        insert_purchase(&db, &health).await?;
        insert_purchase(&db, &any).await?;

        let for_career = available_credits(&db, Some(ReportArea::Career)).await?;
        assert_eq!(for_career.len(), 2);
        assert!(for_career.iter().all(|c| c.covers(ReportArea::Career)));
        assert!(
            for_career
                .iter()
                .all(|c| c.report_area != ReportArea::Health)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_consume_sets_all_fields() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, credits) = insert_purchase(&db, &sample_purchase("TXN-1")).await?;
        let profile = Uuid::new_v4();
        let now = Utc::now();

        let consumed = consume_credit(&db, credits[0].id, profile, now).await?;
        assert!(consumed.consumed);
        assert!(consumed.consumed_date.is_some());
        assert_eq!(consumed.user_profile_id, Some(profile));
        Ok(())
    }

    #[tokio::test]
    async fn test_consume_twice_fails_and_keeps_first_profile() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, credits) = insert_purchase(&db, &sample_purchase("TXN-1")).await?;
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let spent = consume_credit(&db, credits[0].id, first, Utc::now()).await?;
        let result = consume_credit(&db, credits[0].id, second, Utc::now()).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::CreditAlreadyConsumed { credit_id } if credit_id == credits[0].id
        ));

        let stored = get_credit_by_id(&db, credits[0].id).await?.unwrap();
        assert_eq!(stored, spent);
        assert_eq!(stored.user_profile_id, Some(first));
        Ok(())
    }

    #[tokio::test]
    async fn test_consume_unknown_credit() -> Result<()> {
        let db = setup_test_db().await?;
        let missing = Uuid::new_v4();

        let result = consume_credit(&db, missing, Uuid::new_v4(), Utc::now()).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::CreditNotFound { credit_id } if credit_id == missing
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_record_derived_queries() -> Result<()> {
        let db = setup_test_db().await?;
        let mut purchase = sample_purchase("TXN-PACK");
        purchase.credit_amount = 3;
        let (record, credits) = insert_purchase(&db, &purchase).await?;
        let profile = Uuid::new_v4();

        consume_credit(&db, credits[1].id, profile, Utc::now()).await?;

        let available = available_credits_for_record(&db, record.id).await?;
        let consumed = consumed_credits_for_record(&db, record.id).await?;
        assert_eq!(available.len(), 2);
        assert_eq!(consumed.len(), 1);
        assert_eq!(consumed[0].id, credits[1].id);

        let by_profile = credits_consumed_by_profile(&db, profile).await?;
        assert_eq!(by_profile.len(), 1);
        assert_eq!(by_profile[0].id, credits[1].id);
        Ok(())
    }

    #[tokio::test]
    async fn test_credits_for_record_keeps_mint_order_past_ten() -> Result<()> {
        let db = setup_test_db().await?;
        let mut purchase = sample_purchase("TXN-BIG");
        purchase.credit_amount = 12;
        let (record, minted) = insert_purchase(&db, &purchase).await?;

        let listed = credits_for_record(&db, record.id).await?;
        let ids: Vec<&str> = listed.iter().map(|c| c.transaction_id.as_str()).collect();
        let expected: Vec<String> = (0..12).map(|i| format!("TXN-BIG#{i}")).collect();
        assert_eq!(ids, expected);
        assert_eq!(listed, minted);

        consume_credit(&db, listed[2].id, Uuid::new_v4(), Utc::now()).await?;
        let available = available_credits_for_record(&db, record.id).await?;
        assert_eq!(available.len(), 11);
        assert_eq!(available[1].transaction_id, "TXN-BIG#1");
        assert_eq!(available[2].transaction_id, "TXN-BIG#3");
        Ok(())
    }

    #[tokio::test]
    async fn test_credit_summary_counts_per_area() -> Result<()> {
        let db = setup_test_db().await?;

        let mut general = sample_purchase("TXN-G");
        general.credit_amount = 2;
        let mut finances = sample_purchase("TXN-F");
        finances.report_area = Some(ReportArea::Finances);
        insert_purchase(&db, &general).await?;
        let (_, spent) = insert_purchase(&db, &finances).await?;
        consume_credit(&db, spent[0].id, Uuid::new_v4(), Utc::now()).await?;

        let summary = credit_summary(&db).await?;
        assert_eq!(summary.get(&ReportArea::General), Some(&2));
        assert_eq!(summary.get(&ReportArea::Finances), None);
        Ok(())
    }
}
