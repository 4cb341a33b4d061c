//! Product table for units that do not report their capabilities.
//!
//! Units that predate the capability protocol answer the product request
//! and then stay silent. Their protocols and record formats are looked up
//! here by product id and, where a model changed formats between firmware
//! releases, by software version.
//!
//! [`ProductTable::builtin`] carries the known legacy units. Tests and
//! applications can build their own table and hand it to the builder.
//!
//! Entry strings list protocols in profile order, each followed by the
//! datatypes it uses:
//!
//! ```text
//! L001 A010 A100 D100 A200 D200 D100 A300 D300 A500 D501
//! ```

use navlink_core::Result;

use crate::capability::{parse_capability_list, ProtocolCapability};

/// One row of the product table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductEntry {
    pub product_id: u16,
    /// Model name, for logs.
    pub name: &'static str,
    /// Lowest software version (hundredths) this row applies to.
    pub min_version: Option<i16>,
    /// Highest software version (hundredths) this row applies to.
    pub max_version: Option<i16>,
    /// Capability list, e.g. `"L001 A010 A100 D100"`.
    pub protocols: &'static str,
}

impl ProductEntry {
    pub fn matches(&self, product_id: u16, software_version: i16) -> bool {
        self.product_id == product_id
            && self.min_version.map_or(true, |v| software_version >= v)
            && self.max_version.map_or(true, |v| software_version <= v)
    }
}

/// Lookup table from product id and software version to capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductTable {
    entries: Vec<ProductEntry>,
}

impl ProductTable {
    pub fn new(entries: Vec<ProductEntry>) -> Self {
        ProductTable { entries }
    }

    /// A table with no entries: every silent unit is unknown.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in table of legacy units.
    pub fn builtin() -> Self {
        Self::new(BUILTIN_PRODUCTS.to_vec())
    }

    /// Add a row. Rows added later are consulted after existing ones.
    pub fn with_entry(mut self, entry: ProductEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn entries(&self) -> &[ProductEntry] {
        &self.entries
    }

    /// The first row matching the product id and software version.
    pub fn find(&self, product_id: u16, software_version: i16) -> Option<&ProductEntry> {
        self.entries
            .iter()
            .find(|e| e.matches(product_id, software_version))
    }

    /// Parsed capabilities for a unit, or `None` if no row matches.
    pub fn capabilities(
        &self,
        product_id: u16,
        software_version: i16,
    ) -> Result<Option<Vec<ProtocolCapability>>> {
        match self.find(product_id, software_version) {
            Some(entry) => {
                tracing::debug!(
                    product_id,
                    software_version,
                    model = entry.name,
                    "Capabilities from product table"
                );
                parse_capability_list(entry.protocols).map(Some)
            }
            None => Ok(None),
        }
    }
}

const fn any(product_id: u16, name: &'static str, protocols: &'static str) -> ProductEntry {
    ProductEntry {
        product_id,
        name,
        min_version: None,
        max_version: None,
        protocols,
    }
}

const fn versions(
    product_id: u16,
    name: &'static str,
    min_version: Option<i16>,
    max_version: Option<i16>,
    protocols: &'static str,
) -> ProductEntry {
    ProductEntry {
        product_id,
        name,
        min_version,
        max_version,
        protocols,
    }
}

const L1_BASIC: &str = "L001 A010 A100 D100 A200 D200 D100 A300 D300 A400 D400 A500 D500";
const L2_AVIATION: &str = "L002 A011 A100 D150 A200 D201 D150 A400 D450 A500 D550";

static BUILTIN_PRODUCTS: &[ProductEntry] = &[
    any(7, "GPS 75", "L001 A010 A100 D100 A200 D200 D100 A500 D500"),
    any(13, "GPS 75", L1_BASIC),
    any(14, "GPS 55", "L001 A010 A100 D100 A200 D200 D100 A400 D400 A500 D500"),
    any(15, "GPS 55 AVD", "L001 A010 A100 D151 A200 D200 D151 A400 D151 A500 D500"),
    any(18, "GPS 65", L1_BASIC),
    any(20, "GPS 150", L2_AVIATION),
    any(22, "GPS 95 AVD", "L001 A010 A100 D152 A200 D200 D152 A300 D300 A400 D152 A500 D500"),
    any(23, "GPS 75", "L001 A010 A100 D100 A200 D201 D100 A300 D300 A400 D400 A500 D500"),
    any(24, "GPS 95", "L001 A010 A100 D100 A200 D201 D100 A300 D300 A400 D400 A500 D500"),
    any(25, "GPS 85", L1_BASIC),
    versions(29, "GPSMAP 205", None, Some(399), "L001 A010 A100 D101 A200 D201 D101 A300 D300 A400 D101 A500 D500"),
    versions(29, "GPSMAP 205", Some(400), None, "L001 A010 A100 D102 A200 D201 D102 A300 D300 A400 D102 A500 D500"),
    any(31, "GPS 40", "L001 A010 A100 D100 A200 D201 D100 A300 D300 A500 D500"),
    any(33, "GPS 150", L2_AVIATION),
    any(34, "GPS 155", L2_AVIATION),
    any(35, "GPS 65", L1_BASIC),
    versions(36, "GPS 95 AVD", None, Some(299), "L001 A010 A100 D152 A200 D200 D152 A300 D300 A400 D152 A500 D500"),
    versions(36, "GPS 95 AVD", Some(300), None, "L001 A010 A100 D152 A200 D200 D152 A300 D300 A500 D500"),
    any(39, "GPS 38", "L001 A010 A100 D151 A200 D201 D151 A300 D300 A500 D500"),
    any(41, "GPS 38", "L001 A010 A100 D100 A200 D201 D100 A300 D300 A500 D500"),
    any(42, "GPSCOM 170", L1_BASIC),
    any(44, "GPSMAP 205", "L001 A010 A100 D101 A200 D201 D101 A300 D300 A400 D101 A500 D500"),
    any(45, "GPS 89", "L001 A010 A100 D152 A200 D201 D152 A300 D300 A500 D500"),
    any(47, "GPS 45", "L001 A010 A100 D100 A200 D201 D100 A300 D300 A500 D500"),
    any(48, "GPS 45 XL", "L001 A010 A100 D154 A200 D201 D154 A300 D300 A500 D501"),
    any(49, "GPSMAP 210", "L001 A010 A100 D102 A200 D201 D102 A300 D300 A400 D102 A500 D501"),
    any(50, "GPS 89", "L001 A010 A100 D152 A200 D201 D152 A300 D300 A500 D501"),
    any(52, "GNC 250", "L002 A011 A100 D150 A200 D201 D150 A400 D450 A500 D550"),
    any(53, "GPS 92", "L001 A010 A100 D152 A200 D201 D152 A300 D300 A500 D501"),
    any(55, "GPS 120 Chinese", "L001 A010 A100 D100 A200 D201 D100 A300 D300 A500 D501"),
    any(56, "GPS 38 Chinese", "L001 A010 A100 D100 A200 D201 D100 A300 D300 A500 D501"),
    any(59, "GPS 40 Chinese", "L001 A010 A100 D100 A200 D201 D100 A300 D300 A500 D501"),
    any(61, "GPS 38 Japanese", "L001 A010 A100 D100 A200 D201 D100 A300 D300 A500 D501"),
    any(62, "GPS 38", "L001 A010 A100 D100 A200 D201 D100 A300 D300 A500 D501"),
    any(64, "GNC 250 XL", "L002 A011 A100 D150 A200 D201 D150 A400 D450 A500 D551"),
    any(71, "GPS 120 XL", "L001 A010 A100 D155 A200 D201 D155 A300 D300 A500 D501"),
    any(72, "GPS 12", "L001 A010 A100 D104 A200 D201 D104 A300 D300 A500 D501"),
    any(73, "GPS 12 XL", "L001 A010 A100 D103 A200 D201 D103 A300 D300 A500 D501"),
    any(74, "GPS 120", "L001 A010 A100 D100 A200 D201 D100 A300 D300 A500 D500"),
    any(76, "GPSMAP 215", "L001 A010 A100 D102 A200 D201 D102 A300 D300 A400 D102 A500 D501"),
    versions(77, "GPS 12", None, Some(300), "L001 A010 A100 D100 A200 D201 D100 A300 D300 A400 D400 A500 D501"),
    versions(77, "GPS 12", Some(301), Some(349), "L001 A010 A100 D103 A200 D201 D103 A300 D300 A400 D403 A500 D501"),
    versions(77, "GPS 12", Some(350), Some(360), "L001 A010 A100 D103 A200 D201 D103 A300 D300 A500 D501"),
    versions(77, "GPS 12", Some(361), None, "L001 A010 A100 D103 A200 D201 D103 A300 D300 A400 D403 A500 D501"),
    any(87, "GPS 12", "L001 A010 A100 D103 A200 D201 D103 A300 D300 A400 D403 A500 D501"),
    any(88, "GPSMAP 215", "L001 A010 A100 D102 A200 D201 D102 A300 D300 A400 D102 A500 D501"),
    any(95, "GPS 126", "L001 A010 A100 D103 A200 D201 D103 A300 D300 A400 D403 A500 D501"),
    any(96, "GPS 12", "L001 A010 A100 D103 A200 D201 D103 A300 D300 A400 D403 A500 D501"),
    any(97, "GPS II Plus", "L001 A010 A100 D103 A200 D201 D103 A300 D300 A500 D501"),
    any(98, "GNC 300", "L002 A011 A100 D150 A200 D201 D150 A400 D450 A500 D551"),
    any(100, "GPS 126 Chinese", "L001 A010 A100 D103 A200 D201 D103 A300 D300 A400 D403 A500 D501"),
    any(105, "GPS 12 Arabic", "L001 A010 A100 D103 A200 D201 D103 A300 D300 A400 D403 A500 D501"),
    any(106, "GPS 128", "L001 A010 A100 D103 A200 D201 D103 A300 D300 A400 D403 A500 D501"),
    any(112, "GPS 92", "L001 A010 A100 D152 A200 D201 D152 A300 D300 A500 D501"),
];
