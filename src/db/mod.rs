pub mod academies;
pub mod profiles;
pub mod sessions;
pub mod tasks;
pub mod users;

pub use academies::*;
pub use profiles::*;
pub use sessions::*;
pub use tasks::*;
pub use users::*;

/// bcrypt cost for new password hashes. Tests hash a lot of passwords.
#[cfg(not(test))]
pub(crate) const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
pub(crate) const HASH_COST: u32 = 4;
