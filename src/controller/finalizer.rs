//! Finalizer handling for ParadeDB deletion
//!
//! Owned objects carry controller owner references and are removed by the
//! garbage collector, so cleanup only marks the instance as Deleting and
//! records the deletion before the finalizer is released.

use kube::ResourceExt;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use tracing::info;

use crate::controller::client::ResourceClient;
use crate::controller::context::Context;
use crate::controller::error::Result;
use crate::controller::status;
use crate::crd::{ParadeDB, ParadeDBPhase};

/// Finalizer guarding ParadeDB deletion
pub const FINALIZER: &str = "database.paradedb.io/finalizer";

/// Check if the finalizer is present
pub fn has_finalizer(db: &ParadeDB) -> bool {
    db.finalizers().iter().any(|f| f == FINALIZER)
}

/// Append the finalizer, keeping any finalizers set by others
pub async fn add_finalizer<C: ResourceClient>(client: &C, db: &ParadeDB) -> Result<ParadeDB> {
    let mut finalizers = db.finalizers().to_vec();
    finalizers.push(FINALIZER.to_string());
    let updated = client.set_finalizers(db, finalizers).await?;
    info!("Added finalizer");
    Ok(updated)
}

/// Remove only this operator's finalizer
pub async fn remove_finalizer<C: ResourceClient>(client: &C, db: &ParadeDB) -> Result<ParadeDB> {
    let finalizers: Vec<String> = db
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != FINALIZER)
        .cloned()
        .collect();
    let updated = client.set_finalizers(db, finalizers).await?;
    info!("Removed finalizer");
    Ok(updated)
}

/// Handle a ParadeDB whose deletion was requested
///
/// Any failed write aborts the pass before the finalizer is removed; the
/// next notification retries from the start.
pub async fn finalize<C: ResourceClient>(db: &ParadeDB, ctx: &Context<C>) -> Result<Action> {
    if !has_finalizer(db) {
        return Ok(Action::await_change());
    }
    info!("Handling deletion");

    let db = if db.phase() == Some(ParadeDBPhase::Deleting) {
        db.clone()
    } else {
        ctx.client
            .update_status(db, &status::with_phase(db, ParadeDBPhase::Deleting))
            .await?
    };

    ctx.events
        .publish(
            &db,
            EventType::Normal,
            "Deleted",
            format!("ParadeDB {} is being deleted", db.name_any()),
        )
        .await;

    remove_finalizer(ctx.client.as_ref(), &db).await?;
    Ok(Action::await_change())
}
