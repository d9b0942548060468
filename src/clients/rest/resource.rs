//! The catalogue of Postmen API resources.

use std::fmt;

/// A Postmen API resource collection.
///
/// Usable anywhere a resource path is accepted.
///
/// # Example
///
/// ```rust
/// use postmen_api::Resource;
///
/// assert_eq!(Resource::Labels.as_ref(), "/labels");
/// assert_eq!(Resource::CancelLabels.to_string(), "/cancel-labels");
/// assert_eq!(Resource::Labels.item("123"), "/labels/123");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Shipping labels.
    Labels,
    /// Shipping rate quotes.
    Rates,
    /// End-of-day manifests.
    Manifests,
    /// Label cancellations.
    CancelLabels,
    /// Address validations.
    AddressValidations,
    /// Carrier shipper accounts.
    ShipperAccounts,
}

impl Resource {
    /// Every resource, in catalogue order.
    pub const ALL: [Self; 6] = [
        Self::Labels,
        Self::Rates,
        Self::Manifests,
        Self::CancelLabels,
        Self::AddressValidations,
        Self::ShipperAccounts,
    ];

    /// Returns the collection path.
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Labels => "/labels",
            Self::Rates => "/rates",
            Self::Manifests => "/manifests",
            Self::CancelLabels => "/cancel-labels",
            Self::AddressValidations => "/address-validations",
            Self::ShipperAccounts => "/shipper-accounts",
        }
    }

    /// Returns the path of one item of the collection.
    #[must_use]
    pub fn item(&self, id: &str) -> String {
        format!("{}/{}", self.path(), id.trim_start_matches('/'))
    }
}

impl AsRef<str> for Resource {
    fn as_ref(&self) -> &str {
        self.path()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
