//! Policy layer deciding whether and what to pay on behalf of the proxy.
//!
//! [`naive::NaiveTreasurer`] always pays the first offered requirement;
//! [`remote::RemotePolicyTreasurer`] defers the decision to a remote
//! authorization service. Both implement [`treasurer::Treasurer`], which
//! delegates payload construction to a [`proxy_wallet::Wallet`].

mod error;
mod naive;
mod remote;
mod treasurer;

pub use error::TreasurerError;
pub use naive::NaiveTreasurer;
pub use remote::RemotePolicyTreasurer;
pub use treasurer::{Authorization, BoxFuture, PaymentStatus, RequestContext, Treasurer};
