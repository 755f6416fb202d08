use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const START_YEAR: u16 = 2000;
pub const END_YEAR: u16 = 2024;

/// One country-year observation from the statistics CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectivityRecord {
    pub country: String,
    /// ISO alpha-3, uppercase as given in the source.
    pub country_code: String,
    pub year: u16,
    /// Share of population online, percent in [0, 100].
    pub internet_penetration: f64,
    /// USD, >= 0.
    pub gdp_per_capita: f64,
    /// Absent in the source for some rows; any fallback is applied at
    /// render time, never here.
    pub population: Option<u64>,
    pub region: Region,
}

/// The seven fixed World Bank region categories used by the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    EastAsiaPacific,
    EuropeCentralAsia,
    LatinAmericaCaribbean,
    MiddleEastNorthAfrica,
    NorthAmerica,
    SouthAsia,
    SubSaharanAfrica,
}

impl Region {
    pub const ALL: [Region; 7] = [
        Region::EastAsiaPacific,
        Region::EuropeCentralAsia,
        Region::LatinAmericaCaribbean,
        Region::MiddleEastNorthAfrica,
        Region::NorthAmerica,
        Region::SouthAsia,
        Region::SubSaharanAfrica,
    ];

    pub fn parse(s: &str) -> Option<Region> {
        match s.trim().to_lowercase().as_str() {
            "east asia & pacific" | "east asia and pacific" => Some(Region::EastAsiaPacific),
            "europe & central asia" | "europe and central asia" => Some(Region::EuropeCentralAsia),
            "latin america & caribbean" | "latin america and caribbean" => {
                Some(Region::LatinAmericaCaribbean)
            }
            "middle east & north africa" | "middle east and north africa" => {
                Some(Region::MiddleEastNorthAfrica)
            }
            "north america" => Some(Region::NorthAmerica),
            "south asia" => Some(Region::SouthAsia),
            "sub-saharan africa" | "sub saharan africa" => Some(Region::SubSaharanAfrica),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Region::EastAsiaPacific => "East Asia & Pacific",
            Region::EuropeCentralAsia => "Europe & Central Asia",
            Region::LatinAmericaCaribbean => "Latin America & Caribbean",
            Region::MiddleEastNorthAfrica => "Middle East & North Africa",
            Region::NorthAmerica => "North America",
            Region::SouthAsia => "South Asia",
            Region::SubSaharanAfrica => "Sub-Saharan Africa",
        }
    }
}

/// One country boundary from the topology source. Property keys are
/// lowercased at load so name extraction is case-insensitive.
#[derive(Debug, Clone)]
pub struct CountryFeature {
    /// Verbatim feature id: an ISO code or numeric text, scheme decided
    /// by whichever boundary file was configured.
    pub id: String,
    pub properties: HashMap<String, String>,
    pub geometry: MultiPolygon<f64>,
}

impl CountryFeature {
    /// Display name: first non-empty candidate property, in a fixed order.
    pub fn display_name(&self) -> Option<&str> {
        const CANDIDATES: [&str; 5] = ["name", "name_en", "name_long", "admin", "name_sort"];
        CANDIDATES
            .iter()
            .filter_map(|k| self.properties.get(*k))
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }
}

/// Output of resolution for one feature. `record: None` is the normal
/// "no data" outcome, rendered with the neutral fill.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedPair<'a> {
    pub feature: &'a CountryFeature,
    pub record: Option<&'a ConnectivityRecord>,
}

/// year -> records for that year, in CSV order. Built once, read-only after.
pub type YearIndex = BTreeMap<u16, Vec<ConnectivityRecord>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_parse_accepts_ampersand_and_word_forms() {
        assert_eq!(
            Region::parse("East Asia & Pacific"),
            Some(Region::EastAsiaPacific)
        );
        assert_eq!(
            Region::parse("sub-saharan africa"),
            Some(Region::SubSaharanAfrica)
        );
        assert_eq!(Region::parse("Oceania"), None);
    }

    #[test]
    fn display_name_prefers_candidates_in_order() {
        let mut props = HashMap::new();
        props.insert("name_long".to_string(), "Republic of Ireland".to_string());
        props.insert("name".to_string(), "Ireland".to_string());
        let feature = CountryFeature {
            id: "IRL".to_string(),
            properties: props,
            geometry: MultiPolygon::new(vec![]),
        };
        assert_eq!(feature.display_name(), Some("Ireland"));
    }

    #[test]
    fn display_name_skips_empty_values() {
        let mut props = HashMap::new();
        props.insert("name".to_string(), "  ".to_string());
        props.insert("admin".to_string(), "France".to_string());
        let feature = CountryFeature {
            id: "250".to_string(),
            properties: props,
            geometry: MultiPolygon::new(vec![]),
        };
        assert_eq!(feature.display_name(), Some("France"));
    }
}
