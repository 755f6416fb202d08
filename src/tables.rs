use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Hand-curated lookup tables driving the resolution cascade. These are
/// configuration, not logic: widening them never changes the algorithm,
/// and a TOML file named in `[input] tables` swaps any section wholesale.
#[derive(Debug, Clone, Deserialize)]
pub struct LookupTables {
    /// UN M49 numeric code (decimal text, no leading zeros) -> ISO alpha-3.
    #[serde(default)]
    pub numeric_to_alpha3: HashMap<String, String>,
    /// Alternate codes / abbreviations / informal names per alpha-3 code,
    /// inserted as extra lookup keys for the same record.
    #[serde(default)]
    pub code_aliases: Vec<CodeAlias>,
    /// Alternate English names and demonyms -> canonical lowercase name key.
    #[serde(default)]
    pub name_aliases: Vec<NameAlias>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeAlias {
    pub code: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NameAlias {
    pub from: String,
    pub to: String,
}

const NUMERIC_TO_ALPHA3: &[(&str, &str)] = &[
    ("4", "AFG"),
    ("8", "ALB"),
    ("12", "DZA"),
    ("24", "AGO"),
    ("32", "ARG"),
    ("36", "AUS"),
    ("40", "AUT"),
    ("50", "BGD"),
    ("56", "BEL"),
    ("68", "BOL"),
    ("76", "BRA"),
    ("100", "BGR"),
    ("104", "MMR"),
    ("116", "KHM"),
    ("120", "CMR"),
    ("124", "CAN"),
    ("144", "LKA"),
    ("152", "CHL"),
    ("156", "CHN"),
    ("170", "COL"),
    ("180", "COD"),
    ("203", "CZE"),
    ("204", "BEN"),
    ("218", "ECU"),
    ("231", "ETH"),
    ("246", "FIN"),
    ("250", "FRA"),
    ("276", "DEU"),
    ("288", "GHA"),
    ("300", "GRC"),
    ("320", "GTM"),
    ("348", "HUN"),
    ("356", "IND"),
    ("360", "IDN"),
    ("364", "IRN"),
    ("368", "IRQ"),
    ("372", "IRL"),
    ("376", "ISR"),
    ("380", "ITA"),
    ("384", "CIV"),
    ("392", "JPN"),
    ("398", "KAZ"),
    ("404", "KEN"),
    ("410", "KOR"),
    ("418", "LAO"),
    ("458", "MYS"),
    ("484", "MEX"),
    ("504", "MAR"),
    ("524", "NPL"),
    ("528", "NLD"),
    ("554", "NZL"),
    ("566", "NGA"),
    ("578", "NOR"),
    ("586", "PAK"),
    ("604", "PER"),
    ("608", "PHL"),
    ("616", "POL"),
    ("620", "PRT"),
    ("642", "ROU"),
    ("643", "RUS"),
    ("682", "SAU"),
    ("702", "SGP"),
    ("704", "VNM"),
    ("710", "ZAF"),
    ("724", "ESP"),
    ("752", "SWE"),
    ("756", "CHE"),
    ("764", "THA"),
    ("784", "ARE"),
    ("792", "TUR"),
    ("804", "UKR"),
    ("818", "EGY"),
    ("826", "GBR"),
    ("834", "TZA"),
    ("840", "USA"),
    ("858", "URY"),
    ("862", "VEN"),
];

const CODE_ALIASES: &[(&str, &[&str])] = &[
    ("USA", &["us", "america", "united states of america"]),
    ("GBR", &["uk", "gb", "great britain", "britain"]),
    ("KOR", &["south korea", "republic of korea"]),
    ("RUS", &["russian federation"]),
    ("CHN", &["prc", "people's republic of china"]),
    ("ARE", &["uae", "united arab emirates"]),
    ("COD", &["drc", "dr congo"]),
    ("CZE", &["czechia"]),
    ("DEU", &["frg"]),
    ("VNM", &["viet nam"]),
    ("TUR", &["turkiye"]),
    ("NLD", &["holland"]),
    ("CIV", &["cote d'ivoire"]),
    ("IRN", &["islamic republic of iran"]),
    ("CHE", &["swiss confederation"]),
];

const NAME_ALIASES: &[(&str, &str)] = &[
    ("united states of america", "united states"),
    ("russian federation", "russia"),
    ("great britain", "united kingdom"),
    ("republic of korea", "south korea"),
    ("korea, rep.", "south korea"),
    ("viet nam", "vietnam"),
    ("czechia", "czech republic"),
    ("myanmar (burma)", "myanmar"),
    ("democratic republic of the congo", "dr congo"),
    ("cote d'ivoire", "ivory coast"),
    ("turkiye", "turkey"),
    ("islamic republic of iran", "iran"),
    ("syrian arab republic", "syria"),
    ("lao pdr", "laos"),
    ("slovak republic", "slovakia"),
    ("kyrgyz republic", "kyrgyzstan"),
    ("brunei darussalam", "brunei"),
    ("cabo verde", "cape verde"),
];

impl LookupTables {
    /// Built-in tables covering the dataset's country list.
    pub fn builtin() -> Self {
        LookupTables {
            numeric_to_alpha3: NUMERIC_TO_ALPHA3
                .iter()
                .map(|(n, c)| (n.to_string(), c.to_string()))
                .collect(),
            code_aliases: CODE_ALIASES
                .iter()
                .map(|(code, aliases)| CodeAlias {
                    code: code.to_string(),
                    aliases: aliases.iter().map(|a| a.to_string()).collect(),
                })
                .collect(),
            name_aliases: NAME_ALIASES
                .iter()
                .map(|(from, to)| NameAlias {
                    from: from.to_string(),
                    to: to.to_string(),
                })
                .collect(),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read tables file: {:?}", path))?;
        let tables: LookupTables =
            toml::from_str(&content).with_context(|| "Failed to parse tables TOML")?;
        Ok(tables)
    }

    /// Translate a numeric feature id to its alpha-3 code. Accepts any
    /// decimal spelling ("076" and "76" both hit Brazil).
    pub fn alpha3_for_numeric(&self, id: &str) -> Option<&str> {
        let canonical = id.trim().parse::<u64>().ok()?.to_string();
        self.numeric_to_alpha3.get(&canonical).map(|s| s.as_str())
    }

    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        self.name_aliases
            .iter()
            .find(|a| a.from == name)
            .map(|a| a.to.as_str())
    }
}
