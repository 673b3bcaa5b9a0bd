pub mod checker;
pub mod principal;

pub use checker::{Owned, Permission, PermissionChecker, PermissionMap};
pub use principal::{Principal, RequestScope};
