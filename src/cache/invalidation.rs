//! Maps completed write operations to the cache keys they make untrustworthy.
//!
//! The mapping is pure: callers run it strictly after a write succeeds and
//! apply the resulting predicates before reporting the write complete, so a
//! subsequent read sees Stale rather than a value known to be outdated.

use crate::cache::key::CacheKey;

/// A completed write against the remote data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    CreateProduct,
    UpdateProduct { id: u64 },
    DeleteProduct { id: u64 },
    UpdateUser { id: u64 },
}

/// Selects the cache keys a write invalidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPredicate {
    /// Exactly one key.
    Exact(CacheKey),
    /// Every product list key, filtered or not.
    AllProductLists,
}

impl KeyPredicate {
    pub fn matches(&self, key: &CacheKey) -> bool {
        match self {
            KeyPredicate::Exact(target) => key == target,
            KeyPredicate::AllProductLists => key.is_product_list(),
        }
    }
}

impl WriteOp {
    /// The predicates to invalidate once this write has succeeded.
    ///
    /// Creating or deleting a product changes list cardinality; updating one
    /// may change aggregate list fields, so lists go stale alongside the
    /// detail key. User updates touch only that user.
    pub fn invalidations(&self) -> Vec<KeyPredicate> {
        match self {
            WriteOp::CreateProduct | WriteOp::DeleteProduct { .. } => {
                vec![KeyPredicate::AllProductLists]
            }
            WriteOp::UpdateProduct { id } => vec![
                KeyPredicate::Exact(CacheKey::Product(*id)),
                KeyPredicate::AllProductLists,
            ],
            WriteOp::UpdateUser { id } => {
                vec![KeyPredicate::Exact(CacheKey::User(*id))]
            }
        }
    }
}
