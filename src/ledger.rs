use crate::authority::{AuthorityClient, AuthorityLookup};
use crate::db::{DbPool, queries};
use crate::error::Result;
use crate::models::PurchaseRecord;

const SECONDS_PER_DAY: i64 = 86_400;

/// Local cache of purchase authentications, backed by the purchase authority.
///
/// Records are never deleted: a forced refresh overwrites the cached row.
#[derive(Debug, Clone)]
pub struct PurchaseLedger {
    authority: AuthorityClient,
    /// None = cached records never expire
    ttl_days: Option<i64>,
}

impl PurchaseLedger {
    pub fn new(authority: AuthorityClient, ttl_days: Option<i64>) -> Self {
        Self { authority, ttl_days }
    }

    /// Authenticate a purchase code, preferring the local cache unless `force_refresh`.
    ///
    /// Returns `Ok(None)` when the authority does not know the code or reports a
    /// sale without a usable product. No connection is held while the authority
    /// is being queried.
    pub async fn resolve(
        &self,
        pool: &DbPool,
        purchase_code: &str,
        force_refresh: bool,
    ) -> Result<Option<PurchaseRecord>> {
        if !force_refresh {
            let conn = pool.get()?;
            if let Some(record) = queries::get_purchase_record(&conn, purchase_code)?
                && self.is_fresh(&record, queries::now())
            {
                tracing::debug!(purchase_code = %purchase_code, "Purchase record served from cache");
                return Ok(Some(record));
            }
        }

        let sale = match self.authority.lookup(purchase_code).await? {
            AuthorityLookup::Found(sale) => sale,
            AuthorityLookup::NotFound => {
                tracing::info!(purchase_code = %purchase_code, "Purchase code unknown to authority");
                return Ok(None);
            }
        };

        let Some(record) = sale.into_record(purchase_code, queries::now()) else {
            tracing::warn!(
                purchase_code = %purchase_code,
                "Authority returned a sale without product id or name"
            );
            return Ok(None);
        };

        let conn = pool.get()?;
        queries::upsert_purchase_record(&conn, &record)?;
        tracing::info!(
            purchase_code = %purchase_code,
            product_id = %record.product_id,
            "Purchase record refreshed from authority"
        );

        Ok(Some(record))
    }

    fn is_fresh(&self, record: &PurchaseRecord, now: i64) -> bool {
        match self.ttl_days {
            Some(days) => {
                now.saturating_sub(record.cached_at) < days.saturating_mul(SECONDS_PER_DAY)
            }
            None => true,
        }
    }
}
