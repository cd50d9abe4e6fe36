// src/fanout.rs
use std::future::Future;

use tokio::task::JoinSet;

/// Spawn every branch, wait for all of them, and return results by slot
/// index (not arrival order).
///
/// A slot is `None` only when its task was aborted or panicked. Dropping the
/// returned future drops the `JoinSet`, which aborts the branches still in
/// flight.
pub async fn join_in_slot_order<T, F>(branches: Vec<F>) -> Vec<Option<T>>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let mut set = JoinSet::new();
    let mut out: Vec<Option<T>> = Vec::with_capacity(branches.len());

    for (slot, branch) in branches.into_iter().enumerate() {
        out.push(None);
        set.spawn(async move { (slot, branch.await) });
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((slot, value)) => {
                if let Some(cell) = out.get_mut(slot) {
                    *cell = Some(value);
                }
            }
            Err(e) => tracing::warn!(error = %e, "fan-out branch did not complete"),
        }
    }

    out
}
