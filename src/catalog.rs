use serde::Serialize;

pub const ANYWHERE: &str = "Anywhere";

pub const THEMES: &[&str] = &[
    "art galleries",
    "bar hopping",
    "beachgoing",
    "exploring",
    "extreme sports",
    "hiking",
    "history and heritage",
    "kayaking",
    "live music",
    "nature",
    "relaxation at a resort",
    "road trips",
    "sightseeing on a bus",
    "spa days",
    "sports fandom",
    "theme parks",
    "tragedy tourism",
    "wildlife",
];

pub const DEFAULT_THEME: &str = "sightseeing on a bus";

pub const REGIONS: &[(&str, &[&str])] = &[
    (ANYWHERE, &[ANYWHERE]),
    ("East Asia", &["China", "Hong Kong", "Macao", "Japan", "South Korea", "Taiwan"]),
    ("Central Asia", &["Kazakhstan", "Kyrgyzstan", "Tajikistan", "Turkmenistan", "Uzbekistan"]),
    ("South Asia", &["Maldives", "India", "Bangladesh", "Pakistan", "Nepal", "Bhutan"]),
    (
        "Southeast Asia",
        &["Thailand", "Vietnam", "Cambodia", "Indonesia", "Laos", "Malaysia", "Myanmar", "Singapore"],
    ),
    (
        "Europe",
        &[
            "Albania", "Andorra", "Austria", "Belarus", "Belgium", "Bulgaria", "Croatia", "Czechia",
            "Estonia", "Finland", "France", "Germany", "Greece", "Hungary", "Iceland", "Ireland",
            "Italy", "Latvia", "Lithuania", "Luxembourg", "Moldova", "Montenegro", "Netherlands",
            "Norway", "Poland", "Portugal", "Russia", "Serbia", "Slovakia", "Slovenia", "Spain",
            "Switzerland", "Transnistria", "Ukraine", "United Kingdom",
        ],
    ),
    (
        "USA",
        &[
            "US Northwest", "US Northeast", "US Southwest", "US Southeast", "US Midwest", "Texas",
            "Florida", "Alaska", "Hawaii",
        ],
    ),
    (
        "Canada",
        &["Atlantic Canada", "Newfoundland", "Ontario", "Quebec", "Western Canada", "Arctic Canada"],
    ),
    (
        "Caribbean",
        &[
            "Bahamas", "Cuba", "Dominican Republic", "Jamaica", "Puerto Rico", "Saint Lucia",
            "Barbados", "Antigua and Barbuda", "Saint Kitts and Nevis", "Grenada", "Dominica",
            "Trinidad and Tobago", "Saint Vincent and the Grenadines",
        ],
    ),
    (
        "Central America",
        &["Mexico", "Costa Rica", "Panama", "Guatemala", "Belize", "El Salvador", "Honduras", "Nicaragua"],
    ),
    ("Oceania", &["Australia", "New Zealand", "Fiji", "New Caledonia", "Vanuatu", "Easter Island"]),
    (
        "South America",
        &[
            "Argentina", "Bolivia", "Brazil", "Chile", "Colombia", "Ecuador", "Guyana", "Paraguay",
            "Peru", "Suriname", "Uruguay", "Venezuela",
        ],
    ),
    ("Middle East", &["Bahrain", "Qatar", "UAE", "Turkey"]),
    ("North Africa", &["Algeria", "Egypt", "Libya", "Morocco", "Tunisia"]),
    (
        "Sub-Saharan Africa",
        &["South Africa", "Ethiopia", "Kenya", "Mozambique", "Namibia", "Nigeria", "Rwanda", "Tanzania"],
    ),
    (
        "Insular Africa",
        &["Cape Verde", "Equatorial Guinea", "Madagascar", "Mauritius", "Sao Tome and Principe", "Seychelles"],
    ),
    (
        "Other",
        &["Bermuda", "Mallorca", "Tenerife", "Falkland Islands", "Antarctica", "Faroe Islands", "Greenland"],
    ),
];

pub fn destinations_for(region: &str) -> Option<&'static [&'static str]> {
    REGIONS.iter().find(|(r, _)| *r == region).map(|(_, d)| *d)
}

pub fn is_theme(theme: &str) -> bool {
    THEMES.iter().any(|t| *t == theme)
}

/// Destination shown first when a region is picked. Oceania leads with
/// Australia, every other region with its first entry.
pub fn default_destination(region: &str) -> Option<&'static str> {
    let list = destinations_for(region)?;
    if region == "Oceania" && list.contains(&"Australia") {
        return Some("Australia");
    }
    list.first().copied()
}

#[derive(Debug, Serialize)]
pub struct RegionEntry {
    pub region: &'static str,
    pub destinations: &'static [&'static str],
}

#[derive(Debug, Serialize)]
pub struct Catalog {
    pub themes: &'static [&'static str],
    pub default_theme: &'static str,
    pub regions: Vec<RegionEntry>,
}

pub fn catalog() -> Catalog {
    Catalog {
        themes: THEMES,
        default_theme: DEFAULT_THEME,
        regions: REGIONS
            .iter()
            .map(|&(region, destinations)| RegionEntry { region, destinations })
            .collect(),
    }
}
