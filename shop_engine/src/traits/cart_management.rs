use chrono::{DateTime, Utc};

use crate::{
    db_types::{Cart, OwnerId},
    traits::StoreError,
};

#[allow(async_fn_in_trait)]
pub trait CartManagement {
    async fn fetch_cart(&self, owner_id: &OwnerId) -> Result<Option<Cart>, StoreError>;

    /// Saves the cart and returns the stored copy, with its new `version`.
    ///
    /// A cart that has never been saved (`version == 0`) is inserted. Otherwise the write only succeeds if the stored
    /// version still equals `cart.version`. Losing either race fails with `VersionConflict`.
    async fn save_cart(&self, cart: &Cart) -> Result<Cart, StoreError>;

    /// Deletes carts that are empty and have not been touched since `older_than`. Returns the number removed.
    async fn sweep_empty_carts(&self, older_than: DateTime<Utc>) -> Result<u64, StoreError>;
}
