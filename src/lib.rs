//! `ad-security` reads and edits the security descriptors of directory objects.
//!
//! A descriptor is decoded from the bytes of the object's `nTSecurityDescriptor`
//! attribute, queried or edited in memory, then encoded and written back:
//!
//! ```
//! use ad_security::descriptor::SecurityDescriptor;
//! use ad_security::mask::SEC_ADS_GENERIC_READ;
//! use ad_security::rights::{add_right, query_right, Inherited, RightType};
//! use ad_security::sid::Sid;
//!
//! let user: Sid = "S-1-5-21-1004336348-1177238915-682003330-1105".parse().unwrap();
//! let mut sd = SecurityDescriptor::new();
//! add_right(&mut sd, &user, SEC_ADS_GENERIC_READ, None, true);
//!
//! let state = query_right(&sd, &user, SEC_ADS_GENERIC_READ, None);
//! assert!(state.get(Inherited::No, RightType::Allow));
//!
//! let bytes = sd.to_bytes().unwrap();
//! assert_eq!(SecurityDescriptor::from_bytes(&bytes).unwrap(), sd);
//! ```

pub mod acl;
pub mod descriptor;
pub mod directory;
pub mod error;
pub mod guid;
pub mod mask;
#[cfg(windows)]
pub mod native;
pub mod policy;
pub mod rights;
pub mod schema;
pub mod sid;

pub use crate::error::{Error, Result};
