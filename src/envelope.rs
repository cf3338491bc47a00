//! Envelope contract for user messages.
//!
//! Each direction of a protocol is modelled as one enum whose variants
//! are the individual messages. The engine never inspects message
//! contents; it only needs to know which variant is set so the
//! dispatcher can route it.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A direction's top-level message enum.
///
/// Generated bindings (or hand-written ones, as in the test suites)
/// implement this for their `ClientToServer` and `ServerToClient`
/// enums. `variant` returns `None` when no message is set, which
/// mirrors a decoded envelope whose choice field was absent; the
/// dispatcher drops those.
pub trait Envelope: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// All variant names this envelope can carry, in declaration order.
    const VARIANTS: &'static [&'static str];

    /// The name of the variant currently set, or `None` if unset.
    fn variant(&self) -> Option<&'static str>;

    /// Construct an envelope holding the named variant with all fields
    /// defaulted, or `None` if the name is not one of [`VARIANTS`].
    ///
    /// [`VARIANTS`]: Envelope::VARIANTS
    fn empty(variant: &str) -> Option<Self>;
}
