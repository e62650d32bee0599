/// Router Module Index
///
/// Routes are split by access level so each group gets exactly one gate chain
/// applied at the module boundary (see `create_router`).

/// Routes open to any client.
pub mod public;

/// Routes behind a valid identity token.
pub mod authenticated;

/// Routes behind a valid identity token whose user record has the `admin` role.
pub mod admin;
