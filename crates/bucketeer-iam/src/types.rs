//! Identity domain types.

/// An access key pair issued for a principal.
///
/// The secret is only ever available at creation time; it is handed to the
/// caller once and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKey {
    /// The server-assigned key identifier.
    pub id: String,
    /// The secret half of the pair.
    pub secret: String,
}
