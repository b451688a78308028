use tally_core::NaturalKey;
use tally_storage::{TransactionFilter, TransactionStore};

/// Whether a transaction with this natural key is already stored, either as
/// its own row or folded into a monthly aggregate.
///
/// A failed lookup is reported and treated as "not a duplicate": a stray
/// duplicate row can be cleaned up later, a dropped transaction cannot.
pub async fn exists<S>(store: &S, key: &NaturalKey) -> bool
where
    S: TransactionStore + ?Sized,
{
    let found = match store
        .find_matching(&TransactionFilter::natural_key(key))
        .await
    {
        Ok(Some(_)) => Ok(true),
        Ok(None) => store.is_merged(key).await,
        Err(e) => Err(e),
    };
    match found {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(error = %e, "duplicate check failed, assuming new transaction");
            false
        }
    }
}
