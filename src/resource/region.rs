//! Google Cloud regions and multi-regions

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;

macro_rules! regions {
    ($($variant:ident => ($continent:expr, $id:expr, $description:expr),)+) => {
        /// Canonical set of Google Cloud regions
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum Region {
            $($variant,)+
        }

        impl Region {
            pub const ALL: &'static [Region] = &[$(Region::$variant,)+];

            pub fn continent(self) -> &'static str {
                match self {
                    $(Region::$variant => $continent,)+
                }
            }

            /// Region identifier, e.g. `us-west1`
            pub fn id(self) -> &'static str {
                match self {
                    $(Region::$variant => $id,)+
                }
            }

            pub fn description(self) -> &'static str {
                match self {
                    $(Region::$variant => $description,)+
                }
            }
        }
    };
}

regions! {
    UsWest1 => ("North America", "us-west1", "Oregon"),
    UsWest2 => ("North America", "us-west2", "Los Angeles"),
    UsWest3 => ("North America", "us-west3", "Salt Lake City"),
    UsWest4 => ("North America", "us-west4", "Las Vegas"),
    UsCentral1 => ("North America", "us-central1", "Iowa"),
    UsCentral2 => ("North America", "us-central2", "Oklahoma (private Google Cloud region)"),
    NorthamericaNortheast1 => ("North America", "northamerica-northeast1", "Montréal"),
    NorthamericaNortheast2 => ("North America", "northamerica-northeast2", "Toronto"),
    NorthamericaSouth1 => ("North America", "northamerica-south1", "Queretaro"),
    UsEast1 => ("North America", "us-east1", "South Carolina"),
    UsEast4 => ("North America", "us-east4", "Northern Virginia"),
    UsEast5 => ("North America", "us-east5", "Columbus"),
    UsSouth1 => ("North America", "us-south1", "Dallas"),
    SouthamericaWest1 => ("South America", "southamerica-west1", "Santiago"),
    SouthamericaEast1 => ("South America", "southamerica-east1", "São Paulo"),
    EuropeWest2 => ("Europe", "europe-west2", "London"),
    EuropeWest1 => ("Europe", "europe-west1", "Belgium"),
    EuropeWest4 => ("Europe", "europe-west4", "Netherlands"),
    EuropeWest8 => ("Europe", "europe-west8", "Milan"),
    EuropeSouthwest1 => ("Europe", "europe-southwest1", "Madrid"),
    EuropeWest9 => ("Europe", "europe-west9", "Paris"),
    EuropeWest12 => ("Europe", "europe-west12", "Turin"),
    EuropeWest10 => ("Europe", "europe-west10", "Berlin"),
    EuropeWest3 => ("Europe", "europe-west3", "Frankfurt"),
    EuropeNorth1 => ("Europe", "europe-north1", "Finland"),
    EuropeNorth2 => ("Europe", "europe-north2", "Stockholm"),
    EuropeCentral2 => ("Europe", "europe-central2", "Warsaw"),
    EuropeWest6 => ("Europe", "europe-west6", "Zürich"),
    MeCentral1 => ("Middle East", "me-central1", "Doha"),
    MeCentral2 => ("Middle East", "me-central2", "Dammam"),
    MeWest1 => ("Middle East", "me-west1", "Tel Aviv"),
    AsiaSouth1 => ("Asia", "asia-south1", "Mumbai"),
    AsiaSouth2 => ("Asia", "asia-south2", "Delhi"),
    AsiaSoutheast1 => ("Asia", "asia-southeast1", "Singapore"),
    AsiaSoutheast2 => ("Asia", "asia-southeast2", "Jakarta"),
    AsiaEast2 => ("Asia", "asia-east2", "Hong Kong"),
    AsiaEast1 => ("Asia", "asia-east1", "Taiwan"),
    AsiaNortheast1 => ("Asia", "asia-northeast1", "Tokyo"),
    AsiaNortheast2 => ("Asia", "asia-northeast2", "Osaka"),
    AsiaNortheast3 => ("Asia", "asia-northeast3", "Seoul"),
    AustraliaSoutheast1 => ("Australia", "australia-southeast1", "Sydney"),
    AustraliaSoutheast2 => ("Australia", "australia-southeast2", "Melbourne"),
    AfricaSouth1 => ("Africa", "africa-south1", "Johannesburg"),
}

impl Region {
    /// Look up a region by id, ignoring case
    pub fn from_id(region_id: &str) -> Result<Self> {
        let normalized = region_id.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.id() == normalized)
            .ok_or_else(|| Error::not_found(format!("region '{}'", region_id)))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Multi-region locations (Firestore, Spanner)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MultiRegion {
    Eur3,
    Nam5,
    Nam7,
}

impl MultiRegion {
    pub const ALL: &'static [MultiRegion] = &[MultiRegion::Eur3, MultiRegion::Nam5, MultiRegion::Nam7];

    pub fn id(self) -> &'static str {
        match self {
            Self::Eur3 => "eur3",
            Self::Nam5 => "nam5",
            Self::Nam7 => "nam7",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Eur3 => "Europe",
            Self::Nam5 => "United States (Central)",
            Self::Nam7 => "United States (Central and East)",
        }
    }

    /// Regions that accept read-write traffic
    pub fn read_write_regions(self) -> &'static [Region] {
        match self {
            Self::Eur3 => &[Region::EuropeWest1, Region::EuropeWest4],
            Self::Nam5 => &[Region::UsCentral1, Region::UsCentral2],
            Self::Nam7 => &[Region::UsCentral1, Region::UsEast4],
        }
    }

    /// Tie-breaking witness region
    pub fn witness_region(self) -> Region {
        match self {
            Self::Eur3 => Region::EuropeNorth1,
            Self::Nam5 => Region::UsEast1,
            Self::Nam7 => Region::UsCentral2,
        }
    }

    pub fn from_id(multi_region_id: &str) -> Result<Self> {
        let normalized = multi_region_id.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.id() == normalized)
            .ok_or_else(|| Error::not_found(format!("multi-region '{}'", multi_region_id)))
    }
}

impl fmt::Display for MultiRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}
