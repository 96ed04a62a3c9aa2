/// Column-name constants for the panel and its derived views.
/// Single source of truth for every DataFrame built by the crate.

// ── Panel columns ───────────────────────────────────────────────────────────
pub mod panel {
    pub const YEAR: &str = "year";
    pub const DISTRICT: &str = "district";
    pub const FARMER_NAME: &str = "farmer_name";
    pub const AREA_HARVESTED: &str = "area_harvested";
    pub const PRODUCTION: &str = "production";
    pub const YIELD: &str = "yield";
    pub const RAINFALL: &str = "rainfall";
    pub const TEMPERATURE: &str = "temperature";
    pub const FERTILIZER_USE: &str = "fertilizer_use";
    pub const PESTICIDE_USE: &str = "pesticide_use";
    pub const LABOR_COST: &str = "labor_cost";
    pub const FARMER_COUNT: &str = "farmer_count";
    pub const REGION: &str = "region";
}

// ── Reduction suffixes (`{field}_{suffix}`) ─────────────────────────────────
pub mod reduction {
    pub const MEAN: &str = "mean";
    pub const SUM: &str = "sum";
    pub const STD: &str = "std";
}

// ── Region values ───────────────────────────────────────────────────────────
pub mod region {
    pub const NORTH: &str = "North";
    pub const SOUTH: &str = "South";
    pub const EAST: &str = "East";
    pub const WEST: &str = "West";

    pub const ALL: [&str; 4] = [NORTH, SOUTH, EAST, WEST];
}
