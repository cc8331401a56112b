//! The mutator pipeline (§4, "Mutator chain → explicit list with CanHandle gate"): three
//! mutators run in registration order over every object before submission.

pub mod dependencies;
pub mod deploy;
pub mod external_secrets;

use mlp_types::Object;

use crate::client::{BoxFuture, Getter};
use crate::Result;

pub use dependencies::DependenciesMutator;
pub use deploy::DeployMutator;
pub use external_secrets::ExternalSecretsMutator;

/// A single step in the mutator pipeline.
///
/// Mutators avoid virtual dispatch over a fixed enum of kinds; instead each one gates itself with
/// `can_handle` and the applier/driver calls `mutate` only when that gate passes. Calling `mutate`
/// directly on an unhandled kind still returns `UnsupportedKind`, which is what the per-mutator
/// unit tests exercise.
pub trait Mutator: Send + Sync {
    /// Reports whether this mutator has anything to do for `kind`.
    fn can_handle(&self, kind: &str) -> bool;

    /// Mutates `obj` in place. `getter` is the live-cluster lookup some mutators need (the Deploy
    /// mutator's remote fetch).
    fn mutate<'a>(&'a self, obj: &'a mut Object, getter: &'a dyn Getter) -> BoxFuture<'a, Result<()>>;
}

/// Runs every mutator whose `can_handle` gate passes, in registration order, each seeing the
/// previous mutator's output (§4.5 "Ordering note").
pub async fn run_pipeline(
    mutators: &[Box<dyn Mutator>],
    obj: &mut Object,
    getter: &dyn Getter,
) -> Result<()> {
    let kind = obj.kind()?.to_string();
    for m in mutators {
        if m.can_handle(&kind) {
            m.mutate(obj, getter).await?;
        }
    }
    Ok(())
}
