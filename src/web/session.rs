use std::time::Duration;

use tide::sessions::MemoryStore;
use tide::Request;

use crate::models::itinerary::Itinerary;

const ITINERARY_KEY: &str = "itinerary";

/// The visitor's itinerary, seeded on their first request.
pub(super) fn itinerary(req: &Request<crate::State>) -> Itinerary {
    req.session()
        .get(ITINERARY_KEY)
        .unwrap_or_else(Itinerary::seeded)
}

pub(super) fn store_itinerary(
    req: &mut Request<crate::State>,
    itinerary: &Itinerary,
) -> Result<(), serde_json::Error> {
    req.session_mut().insert(ITINERARY_KEY, itinerary)
}

/// Drops expired sessions and returns how many are left.
async fn prune_expired(store: &MemoryStore) -> anyhow::Result<usize> {
    store.cleanup().await?;
    Ok(store.count().await)
}

/// Prunes expired sessions from `store` every `every`, forever.
pub async fn expire_sessions(store: MemoryStore, every: Duration) {
    loop {
        async_std::task::sleep(every).await;
        match prune_expired(&store).await {
            Ok(remaining) => tracing::debug!(remaining, "pruned expired sessions"),
            Err(err) => tracing::warn!(error = %err, "failed to prune expired sessions"),
        }
    }
}
