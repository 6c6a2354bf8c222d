//! Rule-based request authorization with ordered voters and fail-closed
//! decisions.
//!
//! Applications register *voters*, each a rule that may allow, deny, or
//! abstain for a given (context, action) pair. A [`Roles`] registry holds the
//! voters in registration order; asking it whether a request may perform an
//! action polls the voters sequentially and returns the first definite
//! verdict. When every voter abstains, access is denied.
//!
//! Two registration idioms are supported and share the same evaluation
//! mechanism:
//!
//! * [`Roles::register`] appends a *global* voter that is consulted for every
//!   action and may inspect the action name itself;
//! * [`Roles::register_for`] binds a voter to a single [`ActionName`]. A
//!   later registration for the same name replaces the earlier rule without
//!   adding a second voting slot.
//!
//! # Example
//!
//! ```
//! use veto::{voter, Decision, Roles};
//!
//! #[derive(Clone)]
//! struct Visitor {
//!     role: Option<String>,
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let roles = Roles::new();
//!
//! roles.register_for(
//!     "access home page".parse()?,
//!     voter::from_fn(|_: &Visitor, _| Decision::Allow),
//! );
//!
//! roles.register_for(
//!     "access admin page".parse()?,
//!     voter::from_fn(|v: &Visitor, _| Decision::from(v.role.as_deref() == Some("admin"))),
//! );
//!
//! let admin = Visitor { role: Some("admin".into()) };
//! let guest = Visitor { role: None };
//!
//! let admin_page: veto::ActionName = "access admin page".parse()?;
//! assert!(roles.evaluate(&admin, &admin_page).await?);
//! assert!(!roles.evaluate(&guest, &admin_page).await?);
//!
//! // No voter claims this action, so the decision fails closed.
//! let unclaimed: veto::ActionName = "delete everything".parse()?;
//! assert!(!roles.evaluate(&admin, &unclaimed).await?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod action;
mod decision;
mod roles;
pub mod voter;

pub use action::{ActionName, ActionNameRef, InvalidActionName};
pub use decision::Decision;
pub use roles::{RoleTester, Roles, VoterError};
pub use voter::{BoxError, Voter};
