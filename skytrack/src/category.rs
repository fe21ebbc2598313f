use crate::Error;
use agent::structured::ResponseField;
use std::time::Duration;

/// The three information domains collected per satellite.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    BasicInfo,
    TechnicalSpecs,
    LaunchCostInfo,
}

/// Bounded retry for transient upstream failures.
#[derive(Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

/// Everything that distinguishes one category agent from another: the prompt
/// role, the response fields, the retry policy, and whether the provider's
/// native web search is enabled on top of the search tools.
pub struct Descriptor {
    pub expertise: &'static str,
    pub goal: &'static str,
    pub fields: Vec<ResponseField>,
    pub retry: Option<RetryPolicy>,
    pub provider_web_search: bool,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::BasicInfo,
        Category::TechnicalSpecs,
        Category::LaunchCostInfo,
    ];

    /// The key used in the store document and in spreadsheet column names.
    pub fn key(&self) -> &'static str {
        match self {
            Category::BasicInfo => "basic_info",
            Category::TechnicalSpecs => "technical_specs",
            Category::LaunchCostInfo => "launch_cost_info",
        }
    }

    pub fn descriptor(&self) -> Descriptor {
        match self {
            Category::BasicInfo => Descriptor {
                expertise: "satellite basic information expert",
                goal: "comprehensive basic information about the given satellite",
                fields: basic_info_fields(),
                // absorbs transient rate limiting from the upstream model
                retry: Some(RetryPolicy {
                    attempts: 3,
                    base: Duration::from_secs(4),
                    cap: Duration::from_secs(60),
                }),
                provider_web_search: true,
            },
            Category::TechnicalSpecs => Descriptor {
                expertise: "satellite technology expert",
                goal: "comprehensive technical specifications and details about the given satellite",
                fields: technical_specs_fields(),
                retry: None,
                provider_web_search: false,
            },
            Category::LaunchCostInfo => Descriptor {
                expertise: "satellite launch cost expert",
                goal: "comprehensive launch cost and mission information about the given satellite",
                fields: launch_cost_fields(),
                retry: None,
                provider_web_search: false,
            },
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "basic_info" => Ok(Category::BasicInfo),
            "technical_specs" => Ok(Category::TechnicalSpecs),
            "launch_cost_info" => Ok(Category::LaunchCostInfo),
            other => Err(Error::UnknownCategory(other.to_string())),
        }
    }
}

fn basic_info_fields() -> Vec<ResponseField> {
    vec![
        ResponseField::new("altitude", "Orbital altitude in kilometers"),
        ResponseField::new("altitude_source", "Source URL for altitude information"),
        ResponseField::new("orbital_life_years", "Orbital lifetime in years"),
        ResponseField::new("orbital_life_source", "Source URL for orbital lifetime information"),
        ResponseField::new("launch_orbit_classification", "Orbit classification (LEO, MEO, GEO, etc.)"),
        ResponseField::new("orbit_classification_source", "Source URL for orbit classification information"),
        ResponseField::new("number_of_payloads", "Number of payloads on the satellite"),
        ResponseField::new("payloads_source", "Source URL for payload information"),
    ]
}

fn technical_specs_fields() -> Vec<ResponseField> {
    vec![
        ResponseField::new("satellite_type", "The type of satellite (Communication/ Earth Observation / Experimental / Navigation / Science & Exploration)"),
        ResponseField::new("satellite_type_source", "URL of the source for satellite type information"),
        ResponseField::new("satellite_application", "Detailed description of the satellite's application"),
        ResponseField::new("application_source", "URL of the source for satellite application information"),
        ResponseField::new("sensor_specs", "Object containing sensor specifications (spectral bands and spatial resolution)"),
        ResponseField::new("sensor_specs_source", "URL of the source for sensor specifications"),
        ResponseField::new("technological_breakthroughs", "Notable technological breakthroughs of the satellite"),
        ResponseField::new("breakthrough_source", "URL of the source for technological breakthroughs"),
    ]
}

fn launch_cost_fields() -> Vec<ResponseField> {
    vec![
        ResponseField::new("launch_cost", "Launch cost in USD"),
        ResponseField::new("launch_cost_source", "Source URL for launch cost data"),
        ResponseField::new("launch_vehicle", "Launch vehicle used"),
        ResponseField::new("launch_vehicle_source", "Source URL for launch vehicle information"),
        ResponseField::new("launch_date", "Launch date"),
        ResponseField::new("launch_date_source", "Source URL for launch date information"),
        ResponseField::new("launch_site", "Launch site"),
        ResponseField::new("launch_site_source", "Source URL for launch site information"),
        ResponseField::new("launch_mass", "JSON object containing max_leo and actual_mass"),
        ResponseField::new("launch_mass_source", "Source URL for launch mass information"),
        ResponseField::new("launch_success", "Launch success status (1 for success, 0 for failure)"),
        ResponseField::new("launch_success_source", "Source URL for launch success information"),
        ResponseField::new("vehicle_reusability", "Vehicle reusability status (1 for reusable, 0 for not)"),
        ResponseField::new("reusability_details", "Details about vehicle reusability"),
        ResponseField::new("reusability_source", "Source URL for reusability information"),
        ResponseField::new("mission_cost", "JSON object containing all cost components"),
        ResponseField::new("mission_cost_source", "Source URL for mission cost information"),
    ]
}
